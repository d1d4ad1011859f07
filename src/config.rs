use crate::services::password::PasswordMode;
use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use std::{env, fmt};

const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;
const DEFAULT_SESSION_TTL_SECS: i64 = 2 * 60 * 60;

/// Centralized application configuration.
/// Combines environment variables (and a `.env` file) with CLI arguments.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub upload_dir: String,
    pub database_url: String,
    /// Key for signing session cookies.
    pub secret_key: String,
    pub admin_username: String,
    /// When unset, no administrator is seeded.
    pub admin_password: Option<String>,
    pub client_username: Option<String>,
    pub client_password: Option<String>,
    pub password_mode: PasswordMode,
    pub max_upload_bytes: usize,
    /// Lifetime of a login session, in seconds.
    pub session_ttl_secs: i64,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Art gallery content-management service")]
pub struct Args {
    /// Host to bind to (overrides GALLERY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides GALLERY_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where uploaded images are stored (overrides GALLERY_UPLOAD_DIR)
    #[arg(long)]
    pub upload_dir: Option<String>,

    /// Database URL (overrides GALLERY_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// How stored passwords that are not hashes are treated (overrides GALLERY_PASSWORD_MODE)
    #[arg(long, value_enum)]
    pub password_mode: Option<PasswordMode>,

    /// Apply the schema, seed accounts and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", path.display());
        }
        let args = Args::parse();
        let migrate = args.migrate;
        let cfg = Self::from_sources(args, |key| env::var(key).ok())?;
        Ok((cfg, migrate))
    }

    /// Merge parsed arguments over values looked up through `var`.
    pub fn from_sources(args: Args, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        // --- Environment fallback ---
        let env_host = var("GALLERY_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let env_port = match var("GALLERY_PORT") {
            Some(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing GALLERY_PORT value `{}`", value))?,
            None => 5000,
        };
        let env_uploads = var("GALLERY_UPLOAD_DIR").unwrap_or_else(|| "./uploads".into());
        let env_db =
            var("GALLERY_DATABASE_URL").unwrap_or_else(|| "sqlite://./data/gallery.db".into());
        let env_mode = match var("GALLERY_PASSWORD_MODE") {
            Some(value) => PasswordMode::from_str(&value, true)
                .map_err(|err| anyhow::anyhow!(err))
                .with_context(|| format!("parsing GALLERY_PASSWORD_MODE value `{}`", value))?,
            None => PasswordMode::default(),
        };
        let max_upload_bytes = match var("GALLERY_MAX_UPLOAD_BYTES") {
            Some(value) => value
                .parse::<usize>()
                .with_context(|| format!("parsing GALLERY_MAX_UPLOAD_BYTES value `{}`", value))?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        let session_ttl_secs = match var("GALLERY_SESSION_TTL_SECS") {
            Some(value) => value
                .parse::<i64>()
                .with_context(|| format!("parsing GALLERY_SESSION_TTL_SECS value `{}`", value))?,
            None => DEFAULT_SESSION_TTL_SECS,
        };
        if session_ttl_secs <= 0 {
            bail!("GALLERY_SESSION_TTL_SECS must be positive");
        }

        let secret_key = var("GALLERY_SECRET_KEY").unwrap_or_default();
        if secret_key.trim().is_empty() {
            bail!("GALLERY_SECRET_KEY must be set to a non-empty value");
        }

        let client_username = var("GALLERY_CLIENT_USERNAME").filter(|v| !v.trim().is_empty());
        let client_password = var("GALLERY_CLIENT_PASSWORD").filter(|v| !v.is_empty());
        if client_username.is_some() != client_password.is_some() {
            bail!("GALLERY_CLIENT_USERNAME and GALLERY_CLIENT_PASSWORD must be set together");
        }

        // --- Merge ---
        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            upload_dir: args.upload_dir.unwrap_or(env_uploads),
            database_url: args.database_url.unwrap_or(env_db),
            secret_key,
            admin_username: var("GALLERY_ADMIN_USERNAME")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| "admin".into()),
            admin_password: var("GALLERY_ADMIN_PASSWORD").filter(|v| !v.is_empty()),
            client_username,
            client_password,
            password_mode: args.password_mode.unwrap_or(env_mode),
            max_upload_bytes,
            session_ttl_secs,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("upload_dir", &self.upload_dir)
            .field("database_url", &self.database_url)
            .field("secret_key", &"<redacted>")
            .field("admin_username", &self.admin_username)
            .field("admin_password", &self.admin_password.as_ref().map(|_| "<redacted>"))
            .field("client_username", &self.client_username)
            .field("client_password", &self.client_password.as_ref().map(|_| "<redacted>"))
            .field("password_mode", &self.password_mode)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("session_ttl_secs", &self.session_ttl_secs)
            .finish()
    }
}
