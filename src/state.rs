//! Shared state injected into every handler.

use crate::services::{
    artwork_service::ArtworkService, authenticator::Authenticator,
    credential_store::CredentialStore, file_store::FileStore, password::PasswordMode,
    session::SessionCodec,
};
use axum::extract::FromRef;
use sqlx::SqlitePool;
use std::sync::Arc;
use time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<SqlitePool>,
    pub artworks: ArtworkService,
    pub authenticator: Authenticator,
    pub sessions: SessionCodec,
    pub files: FileStore,
}

impl AppState {
    pub fn new(
        db: Arc<SqlitePool>,
        files: FileStore,
        secret_key: &str,
        password_mode: PasswordMode,
        session_ttl: Duration,
    ) -> Self {
        let credentials = CredentialStore::new(db.clone());
        Self {
            artworks: ArtworkService::new(db.clone(), files.clone()),
            authenticator: Authenticator::new(credentials, password_mode),
            sessions: SessionCodec::new(secret_key, session_ttl),
            files,
            db,
        }
    }
}

impl FromRef<AppState> for SessionCodec {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}
