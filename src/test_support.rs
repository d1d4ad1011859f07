//! Fixtures shared by the unit tests.

use crate::{
    db,
    models::user::Role,
    services::{
        artwork_service::ArtworkService,
        credential_store::CredentialStore,
        file_store::FileStore,
        password::PasswordMode,
        session::{DEFAULT_SESSION_TTL, SessionBinding, SessionContext},
    },
    state::AppState,
};
use anyhow::Result;
use sqlx::SqlitePool;
use std::sync::Arc;
use tempfile::TempDir;

pub const TEST_SECRET: &str = "test-secret-key";

/// A migrated SQLite database and an upload directory, both inside a
/// temporary directory that lives as long as the value.
pub struct TestEnv {
    _dir: TempDir,
    pub db: Arc<SqlitePool>,
    pub files: FileStore,
}

impl TestEnv {
    pub async fn new() -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let pool = db::open_in(dir.path(), "gallery.db").await?;
        let files = FileStore::new(dir.path().join("uploads"));
        Ok(Self {
            db: Arc::new(pool),
            files,
            _dir: dir,
        })
    }

    pub fn credentials(&self) -> CredentialStore {
        CredentialStore::new(self.db.clone())
    }

    pub fn artworks(&self) -> ArtworkService {
        ArtworkService::new(self.db.clone(), self.files.clone())
    }

    pub fn state(&self, mode: PasswordMode) -> AppState {
        AppState::new(
            self.db.clone(),
            self.files.clone(),
            TEST_SECRET,
            mode,
            DEFAULT_SESSION_TTL,
        )
    }
}

pub fn admin_session() -> SessionContext {
    SessionContext::bound(SessionBinding {
        username: "admin".into(),
        role: Role::Admin,
    })
}

pub fn client_session() -> SessionContext {
    SessionContext::bound(SessionBinding {
        username: "visitor".into(),
        role: Role::Client,
    })
}
