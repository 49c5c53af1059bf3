//! Account endpoints: registration, login, and the online/offline listings
//! served from the durable status column.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::auth::jwt;
use crate::auth::middleware::Claims;
use crate::db::store;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct CreateUserResponse {
    pub user_id: i64,
    pub username: String,
}

/// POST /api/users — Create an account.
/// Duplicate usernames are rejected with 409.
pub async fn create_user(
    State(state): State<AppState>,
    Json(body): Json<CreateUserRequest>,
) -> Result<Json<CreateUserResponse>, StatusCode> {
    if body.username.is_empty() || body.password.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let db = state.db.clone();
    let username = body.username.clone();
    let password_hash = jwt::hash_password(&body.password);

    let created = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        let existing = store::get_user_by_username(&conn, &username)
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        if existing.is_some() {
            return Err(StatusCode::CONFLICT);
        }
        store::create_user(&conn, &username, &password_hash)
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
    })
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)??;

    tracing::info!(user_id = created.id, username = %created.username, "User created");

    Ok(Json(CreateUserResponse {
        user_id: created.id,
        username: created.username,
    }))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: i64,
    pub username: String,
    pub access_token: String,
}

/// POST /api/login — Verify credentials and issue an access token.
/// Unknown users and wrong passwords both answer 401.
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, StatusCode> {
    let db = state.db.clone();
    let username = body.username.clone();

    let user = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        store::get_user_by_username(&conn, &username).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
    })
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)??;

    let Some(user) = user else {
        return Err(StatusCode::UNAUTHORIZED);
    };

    if user.password_hash != jwt::hash_password(&body.password) {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let access_token = jwt::issue_access_token(&state.jwt_secret, user.id, &user.username)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    tracing::info!(user_id = user.id, username = %user.username, "User logged in");

    Ok(Json(LoginResponse {
        user_id: user.id,
        username: user.username,
        access_token,
    }))
}

#[derive(Debug, Serialize)]
pub struct UserSummaryResponse {
    pub id: i64,
    pub username: String,
}

/// GET /api/users/online — Users whose persisted status is "online". JWT
/// auth required.
pub async fn list_online_users(
    State(state): State<AppState>,
    _claims: Claims,
) -> Result<Json<Vec<UserSummaryResponse>>, StatusCode> {
    list_by_status(state, "online").await
}

/// GET /api/users/offline — Users whose persisted status is "offline". JWT
/// auth required.
pub async fn list_offline_users(
    State(state): State<AppState>,
    _claims: Claims,
) -> Result<Json<Vec<UserSummaryResponse>>, StatusCode> {
    list_by_status(state, "offline").await
}

async fn list_by_status(
    state: AppState,
    status: &'static str,
) -> Result<Json<Vec<UserSummaryResponse>>, StatusCode> {
    let db = state.db.clone();
    let users = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        store::list_users_by_status(&conn, status).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
    })
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)??;

    Ok(Json(
        users
            .into_iter()
            .map(|u| UserSummaryResponse {
                id: u.id,
                username: u.username,
            })
            .collect(),
    ))
}
