pub mod admin_handlers;
pub mod auth_handlers;
pub mod gallery_handlers;
pub mod health_handlers;

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

/// `303 See Other` to `location`, with `body` kept as the flash payload.
pub(crate) fn see_other(location: &'static str, body: serde_json::Value) -> Response {
    let mut response = (StatusCode::SEE_OTHER, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::LOCATION, HeaderValue::from_static(location));
    response
}
