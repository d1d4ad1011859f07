//! Represents an artwork shown in the gallery.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A single artwork record.
///
/// The struct stores metadata plus the reference to the image file, not the
/// image bytes themselves.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq, Eq)]
pub struct Artwork {
    /// Store-assigned identity; listing order follows it.
    pub id: i64,

    pub title: String,

    /// Filename of the image inside the upload directory.
    pub image: String,

    pub description: String,

    /// Creation date as entered by the administrator (free-form text).
    pub creation_date: String,
}
