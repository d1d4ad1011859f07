//! Defines routes for the gallery.
//!
//! ## Structure
//! - **Public**
//!   - `GET  /`: list artworks
//!   - `GET  /uploads/{filename}`: serve an uploaded image
//!   - `GET  /login`, `POST /login`, `POST /logout`: session handling
//!
//! - **Administrator** (session must carry the `admin` role)
//!   - `GET  /admin-dashboard`: list artworks
//!   - `POST /admin-dashboard`: upload a new artwork (multipart)
//!   - `GET  /edit/{id}`: fetch one artwork
//!   - `POST /edit/{id}`: update an artwork (multipart, image optional)
//!   - `POST /delete/{id}`: delete an artwork
//!
//! Rejected admin requests are redirected to `/login`.

use crate::{
    handlers::{
        admin_handlers::{create_artwork, dashboard, delete_artwork, edit_form, update_artwork},
        auth_handlers::{login, login_page, logout},
        gallery_handlers::{home, uploaded_file},
        health_handlers::{healthz, readyz},
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Build and return the router for all gallery routes.
///
/// `max_upload_bytes` caps request bodies so multipart image uploads larger
/// than the default limit still go through.
pub fn routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // public
        .route("/", get(home))
        .route("/uploads/{filename}", get(uploaded_file))
        .route("/login", get(login_page).post(login))
        .route("/logout", post(logout))
        // administrator
        .route("/admin-dashboard", get(dashboard).post(create_artwork))
        .route("/edit/{id}", get(edit_form).post(update_artwork))
        .route("/delete/{id}", post(delete_artwork))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}
