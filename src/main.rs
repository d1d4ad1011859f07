use anyhow::{Context, Result};
use axum::Router;
use std::{io::ErrorKind, sync::Arc};
use tokio::{fs, net::TcpListener};
use tracing_subscriber::EnvFilter;

mod config;
mod db;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
mod state;
#[cfg(test)]
mod test_support;

use config::AppConfig;
use models::user::Role;
use services::{
    credential_store::CredentialStore, file_store::FileStore, password::PasswordMode,
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = AppConfig::from_env_and_args()?;

    tracing::info!("Starting gallery with config: {:?}", cfg);
    if cfg.password_mode == PasswordMode::LegacyPlaintext {
        tracing::warn!(
            "password mode is legacy-plaintext: stored passwords that are not hashes will be compared as plain text"
        );
    }

    // --- Ensure upload directory exists ---
    fs::create_dir_all(&cfg.upload_dir)
        .await
        .with_context(|| format!("creating upload directory {}", cfg.upload_dir))?;

    // --- Initialize SQLite, schema and seeded accounts ---
    let db = Arc::new(db::connect(&cfg.database_url).await?);
    db::run_migrations(&db).await?;
    seed_accounts(&CredentialStore::new(db.clone()), &cfg).await?;

    if migrate {
        tracing::info!("Database migration complete.");
        return Ok(()); // exit after migration
    }

    // --- Build router ---
    let state = state::AppState::new(
        db,
        FileStore::new(&cfg.upload_dir),
        &cfg.secret_key,
        cfg.password_mode,
        time::Duration::seconds(cfg.session_ttl_secs),
    );
    let app: Router = routes::routes::routes(cfg.max_upload_bytes).with_state(state);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Seed the administrator (and optional client) accounts. Existing usernames
/// are left untouched, so this runs on every startup.
async fn seed_accounts(credentials: &CredentialStore, cfg: &AppConfig) -> Result<()> {
    match cfg.admin_password.as_deref() {
        Some(password) => {
            let created = credentials
                .seed_administrator(&cfg.admin_username, password)
                .await
                .context("seeding administrator")?;
            if created {
                tracing::info!(username = %cfg.admin_username, "seeded administrator");
            } else {
                tracing::debug!(username = %cfg.admin_username, "administrator already present");
            }
        }
        None => tracing::warn!(
            "GALLERY_ADMIN_PASSWORD is not set; no administrator seeded"
        ),
    }

    if let (Some(username), Some(password)) =
        (cfg.client_username.as_deref(), cfg.client_password.as_deref())
    {
        let created = credentials
            .seed_user(username, password, Role::Client)
            .await
            .context("seeding client account")?;
        if created {
            tracing::info!(username, "seeded client account");
        }
    }

    Ok(())
}
