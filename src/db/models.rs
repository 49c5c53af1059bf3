/// Database row types for all tables.
/// These correspond 1:1 to the SQLite schema defined in migrations.rs.

/// User record in the users table
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub status: String,
    pub created_at: String,
}

/// Persisted private message
#[derive(Debug, Clone)]
pub struct Message {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub content: String,
    pub created_at: String,
}

/// Slim row for the online/offline user listings
#[derive(Debug, Clone)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
}
