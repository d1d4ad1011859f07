//! Password hashing and verification.
//!
//! New passwords are always stored as Argon2 PHC strings. Bcrypt hashes
//! (`$2a$`, `$2b$`, `$2y$`) written by earlier deployments still verify.
//! Rows that hold anything else are legacy plain text; whether those may
//! still log in is an explicit [`PasswordMode`] choice made in configuration.

use crate::errors::{GalleryError, GalleryResult};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use clap::ValueEnum;
use password_hash::{PasswordHash, SaltString};
use subtle::ConstantTimeEq;

const BCRYPT_PREFIXES: [&str; 3] = ["$2a$", "$2b$", "$2y$"];

/// How stored values that are not password hashes are treated at login.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum PasswordMode {
    /// Only Argon2 and bcrypt hashes verify. Plain-text rows can never log in.
    #[default]
    Hashed,
    /// Plain-text rows are compared directly against the supplied password.
    LegacyPlaintext,
}

/// A stored password column, classified.
pub enum StoredPassword<'a> {
    Hash(PasswordHash<'a>),
    Bcrypt(&'a str),
    Plaintext(&'a str),
}

impl<'a> StoredPassword<'a> {
    pub fn parse(stored: &'a str) -> Self {
        if BCRYPT_PREFIXES.iter().any(|p| stored.starts_with(p)) {
            return StoredPassword::Bcrypt(stored);
        }
        match PasswordHash::new(stored) {
            Ok(hash) => StoredPassword::Hash(hash),
            Err(_) => StoredPassword::Plaintext(stored),
        }
    }
}

/// Hash `password` with Argon2 and a fresh random salt.
pub fn hash_password(password: &str) -> GalleryResult<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes)
        .map_err(|e| GalleryError::PasswordHash(e.to_string()))?;
    let salt =
        SaltString::encode_b64(&salt_bytes).map_err(|e| GalleryError::PasswordHash(e.to_string()))?;
    let phc = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| GalleryError::PasswordHash(e.to_string()))?
        .to_string();
    Ok(phc)
}

/// Check `password` against a parsed PHC hash.
pub fn verify_hash(hash: &PasswordHash<'_>, password: &str) -> bool {
    Argon2::default()
        .verify_password(password.as_bytes(), hash)
        .is_ok()
}

/// Check `password` against a bcrypt hash. Malformed hashes never verify.
pub fn verify_bcrypt(hash: &str, password: &str) -> bool {
    match bcrypt::verify(password, hash) {
        Ok(ok) => ok,
        Err(err) => {
            tracing::warn!("stored bcrypt hash could not be checked: {}", err);
            false
        }
    }
}

/// Byte comparison whose running time does not depend on where the inputs
/// first differ. Length differences still return early.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}
