//! Authenticator: checks a username/password pair and produces the binding
//! that a session is established with.
//!
//! There is no lockout, throttling or attempt counting.

use crate::{
    errors::{GalleryError, GalleryResult},
    services::{
        credential_store::CredentialStore,
        password::{PasswordMode, StoredPassword, constant_time_eq, verify_bcrypt, verify_hash},
        session::SessionBinding,
    },
};
use tracing::{info, warn};

#[derive(Clone)]
pub struct Authenticator {
    credentials: CredentialStore,
    mode: PasswordMode,
}

impl Authenticator {
    pub fn new(credentials: CredentialStore, mode: PasswordMode) -> Self {
        Self { credentials, mode }
    }

    /// Verify `password` for `username`.
    ///
    /// Fails with `UserNotFound` when no such user exists and with
    /// `InvalidPassword` when the password does not verify.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> GalleryResult<SessionBinding> {
        let Some(user) = self.credentials.find_by_username(username).await? else {
            warn!(username, "login failed: unknown user");
            return Err(GalleryError::UserNotFound);
        };

        let verified = match StoredPassword::parse(&user.password) {
            StoredPassword::Hash(hash) => verify_hash(&hash, password),
            StoredPassword::Bcrypt(hash) => verify_bcrypt(hash, password),
            StoredPassword::Plaintext(stored) => match self.mode {
                PasswordMode::Hashed => {
                    warn!(
                        username,
                        "stored password is not a hash; rejecting (set password mode to legacy-plaintext to accept it)"
                    );
                    false
                }
                PasswordMode::LegacyPlaintext => {
                    warn!(username, "comparing against a plain-text stored password");
                    constant_time_eq(stored.as_bytes(), password.as_bytes())
                }
            },
        };

        if !verified {
            warn!(username, "login failed: incorrect password");
            return Err(GalleryError::InvalidPassword);
        }

        info!(username, user_id = user.id, role = %user.role, "login succeeded");
        Ok(SessionBinding {
            username: user.username,
            role: user.role,
        })
    }
}
