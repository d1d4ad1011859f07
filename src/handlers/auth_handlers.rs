//! Login and logout.
//!
//! Failures never reach the caller as errors of the process: they become a
//! redirect back to `/login` with the reason in the body.

use crate::{
    errors::{AppError, LOGIN_PATH},
    handlers::see_other,
    models::user::Role,
    services::session::{SessionCodec, SessionContext},
    state::AppState,
};
use axum::{
    Form, Json,
    extract::State,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use serde_json::json;

pub const ADMIN_DASHBOARD_PATH: &str = "/admin-dashboard";

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// `GET /login`: who the current session belongs to, if anyone.
pub async fn login_page(session: SessionContext) -> impl IntoResponse {
    let binding = session.binding();
    Json(json!({
        "authenticated": session.is_authenticated(),
        "admin": session.is_admin(),
        "username": binding.map(|b| b.username.clone()),
        "role": binding.map(|b| b.role),
        "login": LOGIN_PATH,
    }))
}

/// `POST /login`: verify credentials and establish the session cookie.
///
/// Administrators land on the dashboard, clients on the gallery.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<(CookieJar, Response), AppError> {
    let binding = state
        .authenticator
        .authenticate(&form.username, &form.password)
        .await?;
    let cookie = state.sessions.session_cookie(&binding)?;

    let (location, message) = match binding.role {
        Role::Admin => (ADMIN_DASHBOARD_PATH, "welcome, administrator"),
        Role::Client => ("/", "welcome"),
    };
    let response = see_other(
        location,
        json!({ "message": message, "username": binding.username, "role": binding.role }),
    );
    Ok((jar.add(cookie), response))
}

/// `POST /logout`: drop the session and expire its cookie.
pub async fn logout(mut session: SessionContext, jar: CookieJar) -> (CookieJar, Response) {
    let was = session.binding().map(|b| b.username.clone());
    session.clear();
    if let Some(username) = was {
        tracing::info!(username = %username, "logged out");
    }

    let response = see_other("/", json!({ "message": "logged out" }));
    (jar.add(SessionCodec::removal_cookie()), response)
}
