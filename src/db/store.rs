//! Query helpers over the SQLite schema. Callers hold the connection lock
//! (inside tokio::task::spawn_blocking when called from async context).

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};

use crate::db::models::{Message, User, UserSummary};

/// Insert a new user. The username carries a UNIQUE constraint; violations
/// surface as rusqlite constraint errors for the caller to map.
pub fn create_user(
    conn: &Connection,
    username: &str,
    password_hash: &str,
) -> Result<User, rusqlite::Error> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO users (username, password_hash, status, created_at) VALUES (?1, ?2, 'offline', ?3)",
        rusqlite::params![username, password_hash, now],
    )?;
    let id = conn.last_insert_rowid();

    Ok(User {
        id,
        username: username.to_string(),
        password_hash: password_hash.to_string(),
        status: "offline".to_string(),
        created_at: now,
    })
}

pub fn get_user_by_username(
    conn: &Connection,
    username: &str,
) -> Result<Option<User>, rusqlite::Error> {
    conn.query_row(
        "SELECT id, username, password_hash, status, created_at FROM users WHERE username = ?1",
        rusqlite::params![username],
        |row| {
            Ok(User {
                id: row.get(0)?,
                username: row.get(1)?,
                password_hash: row.get(2)?,
                status: row.get(3)?,
                created_at: row.get(4)?,
            })
        },
    )
    .optional()
}

pub fn get_user_by_id(conn: &Connection, id: i64) -> Result<Option<User>, rusqlite::Error> {
    conn.query_row(
        "SELECT id, username, password_hash, status, created_at FROM users WHERE id = ?1",
        rusqlite::params![id],
        |row| {
            Ok(User {
                id: row.get(0)?,
                username: row.get(1)?,
                password_hash: row.get(2)?,
                status: row.get(3)?,
                created_at: row.get(4)?,
            })
        },
    )
    .optional()
}

/// List users whose durable status column matches ("online" / "offline").
pub fn list_users_by_status(
    conn: &Connection,
    status: &str,
) -> Result<Vec<UserSummary>, rusqlite::Error> {
    let mut stmt =
        conn.prepare("SELECT id, username FROM users WHERE status = ?1 ORDER BY username")?;
    let rows = stmt.query_map(rusqlite::params![status], |row| {
        Ok(UserSummary {
            id: row.get(0)?,
            username: row.get(1)?,
        })
    })?;
    rows.collect()
}

/// Persist the derived presence state. Called by the presence notifier on
/// online/offline transitions.
pub fn update_user_status(
    conn: &Connection,
    user_id: i64,
    status: &str,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "UPDATE users SET status = ?2 WHERE id = ?1",
        rusqlite::params![user_id, status],
    )?;
    Ok(())
}

/// Persist a private message. Persistence is a precondition for delivery:
/// the router only fans out after this returns Ok.
pub fn create_message(
    conn: &Connection,
    sender_id: i64,
    receiver_id: i64,
    content: &str,
) -> Result<Message, rusqlite::Error> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO messages (sender_id, receiver_id, content, created_at) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![sender_id, receiver_id, content, now],
    )?;
    let id = conn.last_insert_rowid();

    Ok(Message {
        id,
        sender_id,
        receiver_id,
        content: content.to_string(),
        created_at: now,
    })
}
