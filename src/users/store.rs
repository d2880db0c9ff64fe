//! Identity store operations against the users table.
//!
//! All writes are upserts keyed by user_id: a user record is created the
//! first time any flow mentions the id and updated in place afterwards,
//! never deleted. These are blocking rusqlite calls — run them under
//! tokio::task::spawn_blocking.

use chrono::Utc;
use uuid::Uuid;

use crate::db::models::User;
use crate::db::DbPool;

type StoreResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

const USER_COLUMNS: &str =
    "user_id, phone, display_name, avatar_url, last_connection_id, last_active_at, created_at, updated_at";

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        user_id: row.get(0)?,
        phone: row.get(1)?,
        display_name: row.get(2)?,
        avatar_url: row.get(3)?,
        last_connection_id: row.get(4)?,
        last_active_at: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

/// Upsert the identity for a joining connection: refresh phone, the
/// last-known connection id, and the last-active timestamp.
pub fn upsert_on_join(
    db: &DbPool,
    user_id: &str,
    phone: &str,
    connection_id: &str,
) -> StoreResult<()> {
    let conn = db.lock().map_err(|e| format!("DB lock error: {}", e))?;
    let now = Utc::now().to_rfc3339();

    conn.execute(
        "INSERT INTO users (user_id, phone, display_name, last_connection_id, last_active_at, created_at, updated_at)
         VALUES (?1, ?2, '', ?3, ?4, ?4, ?4)
         ON CONFLICT(user_id) DO UPDATE SET
             phone = ?2, last_connection_id = ?3, last_active_at = ?4, updated_at = ?4",
        rusqlite::params![user_id, phone, connection_id, now],
    )?;

    Ok(())
}

/// Refresh last_active_at for the identity bound to a just-closed
/// connection. The presence entry is gone by the time this runs, so the
/// lookup goes through the persisted last-known connection id.
pub fn touch_last_active_by_connection(db: &DbPool, connection_id: &str) -> StoreResult<()> {
    let conn = db.lock().map_err(|e| format!("DB lock error: {}", e))?;
    let now = Utc::now().to_rfc3339();

    conn.execute(
        "UPDATE users SET last_active_at = ?1, updated_at = ?1 WHERE last_connection_id = ?2",
        rusqlite::params![now, connection_id],
    )?;

    Ok(())
}

/// Upsert display name and avatar URL (profile setup).
pub fn set_profile(
    db: &DbPool,
    user_id: &str,
    display_name: &str,
    avatar_url: &str,
) -> StoreResult<()> {
    let conn = db.lock().map_err(|e| format!("DB lock error: {}", e))?;
    let now = Utc::now().to_rfc3339();

    conn.execute(
        "INSERT INTO users (user_id, phone, display_name, avatar_url, created_at, updated_at)
         VALUES (?1, '', ?2, ?3, ?4, ?4)
         ON CONFLICT(user_id) DO UPDATE SET
             display_name = ?2, avatar_url = ?3, updated_at = ?4",
        rusqlite::params![user_id, display_name, avatar_url, now],
    )?;

    Ok(())
}

/// Look up a user by id.
pub fn get_by_user_id(db: &DbPool, user_id: &str) -> StoreResult<Option<User>> {
    let conn = db.lock().map_err(|e| format!("DB lock error: {}", e))?;

    let result = conn.query_row(
        &format!("SELECT {} FROM users WHERE user_id = ?1", USER_COLUMNS),
        [user_id],
        row_to_user,
    );

    match result {
        Ok(user) => Ok(Some(user)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Find the user for a verified phone number, creating a bare record
/// (UUIDv7 id, empty display name) on first sign-in.
pub fn find_or_create_by_phone(db: &DbPool, phone: &str) -> StoreResult<User> {
    let conn = db.lock().map_err(|e| format!("DB lock error: {}", e))?;

    let result = conn.query_row(
        &format!(
            "SELECT {} FROM users WHERE phone = ?1 ORDER BY created_at LIMIT 1",
            USER_COLUMNS
        ),
        [phone],
        row_to_user,
    );

    match result {
        Ok(user) => Ok(user),
        Err(rusqlite::Error::QueryReturnedNoRows) => {
            let user_id = Uuid::now_v7().to_string();
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO users (user_id, phone, display_name, created_at, updated_at)
                 VALUES (?1, ?2, '', ?3, ?3)",
                rusqlite::params![user_id, phone, now],
            )?;
            Ok(User {
                user_id,
                phone: phone.to_string(),
                display_name: String::new(),
                avatar_url: None,
                last_connection_id: None,
                last_active_at: None,
                created_at: now.clone(),
                updated_at: now,
            })
        }
        Err(e) => Err(e.into()),
    }
}
