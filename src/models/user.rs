//! Represents an account that can log in to the gallery.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

/// Access level bound to a user and carried into a session.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Client,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Client => "client",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A row of the `users` table.
///
/// Users are only ever created by startup seeding; nothing updates or deletes
/// them afterwards.
#[derive(Clone, FromRow, Debug)]
pub struct User {
    /// Store-assigned identity.
    pub id: i64,

    /// Unique login name.
    pub username: String,

    /// Argon2 PHC string. Rows written by older deployments may hold a bcrypt
    /// hash or the raw password instead.
    pub password: String,

    pub role: Role,
}
