use axum::{
    Json,
    extract::multipart::MultipartError,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::{fmt, io};
use thiserror::Error;

/// Where authentication and authorization failures send the caller.
pub const LOGIN_PATH: &str = "/login";

/// Failures produced by the gallery services.
#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("user not found")]
    UserNotFound,
    #[error("incorrect password")]
    InvalidPassword,
    #[error("access denied, administrator login required")]
    AccessDenied,
    #[error("artwork {0} not found")]
    NotFound(i64),
    #[error("image `{0}` not found")]
    FileNotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
    #[error("session encoding failed: {0}")]
    Session(String),
    #[error(transparent)]
    Storage(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type GalleryResult<T> = Result<T, GalleryError>;

impl GalleryError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

/// A lightweight wrapper for general errors that keeps the message local.
///
/// When `redirect` is set the response becomes a `303 See Other` pointing at
/// that location, with the message kept in the JSON body as a flash.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
    pub redirect: Option<String>,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
            redirect: None,
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    /// Send the caller back to the login entry point with a flash message.
    pub fn to_login(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::SEE_OTHER,
            message: msg.into(),
            redirect: Some(LOGIN_PATH.to_string()),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16(),
            "redirect": self.redirect,
        }));

        let mut response = (self.status, body).into_response();
        if let Some(location) = self.redirect.as_deref() {
            if let Ok(value) = HeaderValue::from_str(location) {
                response.headers_mut().insert(header::LOCATION, value);
            }
        }
        response
    }
}

impl From<GalleryError> for AppError {
    fn from(err: GalleryError) -> Self {
        match err {
            GalleryError::UserNotFound
            | GalleryError::InvalidPassword
            | GalleryError::AccessDenied => AppError::to_login(err.to_string()),
            GalleryError::NotFound(_) | GalleryError::FileNotFound(_) => {
                AppError::not_found(err.to_string())
            }
            GalleryError::Validation(msg) => AppError::bad_request(msg),
            other => {
                tracing::error!(error = %other, "request failed");
                AppError::internal(other.to_string())
            }
        }
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::new(err.status(), err.body_text())
    }
}
