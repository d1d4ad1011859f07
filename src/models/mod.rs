//! Core data models for the gallery.
//!
//! These entities map cleanly to the `users` and `artworks` tables via
//! `sqlx::FromRow` and serialize naturally as JSON via `serde`.

pub mod artwork;
pub mod user;
