use sqlx::FromRow;

/// User record in the database.
#[derive(Debug, FromRow)]
pub struct User {
    pub id: i64,               // assigned by the store, monotonic
    pub email: String,         // unique, lowercased
    pub name: String,          // display name
    pub password_hash: String, // Argon2 PHC string
}
