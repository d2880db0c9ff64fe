/// User record in the users table, per the schema in migrations.rs.
/// `last_connection_id` is the transport id of the most recent live
/// connection; it is kept so a disconnect can refresh `last_active_at`
/// after the in-memory presence entry is already gone.
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: String,
    pub phone: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub last_connection_id: Option<String>,
    pub last_active_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}
