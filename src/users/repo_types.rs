use sqlx::FromRow;

/// User row in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,                 // assigned by the store
    pub email: String,           // unique, lowercased
    pub hashed_password: String, // Argon2 PHC string, never exposed
    pub is_active: bool,
}

/// Row contents before the store assigns an id.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub hashed_password: String,
    pub is_active: bool,
}
