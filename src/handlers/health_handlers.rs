//! Health & readiness handlers.
//!
//! - GET /healthz  -> liveness, never touches I/O
//! - GET /readyz   -> readiness: the users/artworks schema answers and the
//!   upload directory accepts writes

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::{collections::BTreeMap, path::Path};
use tokio::fs;
use uuid::Uuid;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: &'static str,
    checks: BTreeMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}

impl CheckStatus {
    fn from_result(result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self {
                ok: true,
                error: None,
            },
            Err(error) => Self {
                ok: false,
                error: Some(error),
            },
        }
    }
}

/// `GET /healthz`
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

/// `GET /readyz`
///
/// HTTP 200 when every check passes, HTTP 503 otherwise. The body lists each
/// check with its error.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let mut checks = BTreeMap::new();
    checks.insert(
        "sqlite",
        CheckStatus::from_result(check_schema(&state).await),
    );
    checks.insert(
        "uploads",
        CheckStatus::from_result(check_upload_dir(&state.files.base_path).await),
    );

    let ready = checks.values().all(|c| c.ok);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = ReadyResponse {
        status: if ready { "ok" } else { "error" },
        checks,
    };
    (status, Json(body))
}

async fn check_schema(state: &AppState) -> Result<(), String> {
    sqlx::query_scalar::<_, i64>(
        "SELECT (SELECT COUNT(*) FROM users) + (SELECT COUNT(*) FROM artworks)",
    )
    .fetch_one(&*state.db)
    .await
    .map(|_| ())
    .map_err(|e| format!("error: {}", e))
}

async fn check_upload_dir(dir: &Path) -> Result<(), String> {
    let probe = dir.join(format!(".readyz-{}", Uuid::new_v4()));
    let written = fs::write(&probe, b"readyz").await;
    let read_back = match written {
        Ok(()) => fs::read(&probe).await,
        Err(e) => return Err(format!("could not write probe file: {}", e)),
    };
    let _ = fs::remove_file(&probe).await;
    match read_back {
        Ok(bytes) if bytes == b"readyz" => Ok(()),
        Ok(_) => Err("probe file content mismatch".to_string()),
        Err(e) => Err(format!("could not read probe file: {}", e)),
    }
}
