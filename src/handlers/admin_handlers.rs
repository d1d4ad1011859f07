//! Administrator handlers: dashboard, create, edit and delete.
//!
//! Every handler checks the session before reading the request body, and the
//! service checks it again before touching storage.

use crate::{
    errors::AppError,
    handlers::{auth_handlers::ADMIN_DASHBOARD_PATH, see_other},
    models::artwork::Artwork,
    services::{
        artwork_service::{ArtworkChanges, ImageUpload, NewArtwork},
        session::SessionContext,
    },
    state::AppState,
};
use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Multipart fields of the artwork forms. Unknown fields are ignored.
#[derive(Debug, Default)]
pub struct ArtworkForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub creation_date: Option<String>,
    pub image: Option<ImageUpload>,
}

impl ArtworkForm {
    /// Read the form. An `image` part without a filename or without bytes
    /// counts as no image.
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = ArtworkForm::default();
        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            match name.as_str() {
                "title" => form.title = Some(field.text().await?),
                "description" => form.description = Some(field.text().await?),
                "creation_date" => form.creation_date = Some(field.text().await?),
                "image" => {
                    let filename = field.file_name().map(str::to_string).unwrap_or_default();
                    let bytes = field.bytes().await?;
                    if !filename.is_empty() && !bytes.is_empty() {
                        form.image = Some(ImageUpload::new(bytes, filename));
                    }
                }
                _ => {}
            }
        }
        Ok(form)
    }

    fn into_new(self) -> Result<(NewArtwork, ImageUpload), AppError> {
        let missing = |field: &str| AppError::bad_request(format!("{} is required", field));
        let new = NewArtwork {
            title: self.title.ok_or_else(|| missing("title"))?,
            description: self.description.ok_or_else(|| missing("description"))?,
            creation_date: self.creation_date.ok_or_else(|| missing("creation_date"))?,
        };
        let image = self.image.ok_or_else(|| missing("image"))?;
        Ok((new, image))
    }

    fn into_changes(self) -> (ArtworkChanges, Option<ImageUpload>) {
        (
            ArtworkChanges {
                title: self.title,
                description: self.description,
                creation_date: self.creation_date,
            },
            self.image,
        )
    }
}

/// `GET /admin-dashboard`
pub async fn dashboard(
    State(state): State<AppState>,
    session: SessionContext,
) -> Result<Json<Vec<Artwork>>, AppError> {
    Ok(Json(state.artworks.list_for_admin(&session).await?))
}

/// `POST /admin-dashboard`: upload a new artwork.
pub async fn create_artwork(
    State(state): State<AppState>,
    session: SessionContext,
    multipart: Multipart,
) -> Result<Response, AppError> {
    session.require_admin()?;
    let (new, image) = ArtworkForm::from_multipart(multipart).await?.into_new()?;
    let artwork = state.artworks.create(&session, new, image).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "artwork added", "artwork": artwork })),
    )
        .into_response())
}

/// `GET /edit/{id}`: the artwork being edited.
pub async fn edit_form(
    State(state): State<AppState>,
    session: SessionContext,
    Path(id): Path<i64>,
) -> Result<Json<Artwork>, AppError> {
    session.require_admin()?;
    Ok(Json(state.artworks.get(id).await?))
}

/// `POST /edit/{id}`: change fields and optionally replace the image.
pub async fn update_artwork(
    State(state): State<AppState>,
    session: SessionContext,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    session.require_admin()?;
    let (changes, image) = ArtworkForm::from_multipart(multipart).await?.into_changes();
    let artwork = state.artworks.update(&session, id, changes, image).await?;
    Ok(see_other(
        ADMIN_DASHBOARD_PATH,
        json!({ "message": "artwork updated", "artwork": artwork }),
    ))
}

/// `POST /delete/{id}`
pub async fn delete_artwork(
    State(state): State<AppState>,
    session: SessionContext,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let artwork = state.artworks.delete(&session, id).await?;
    Ok(see_other(
        ADMIN_DASHBOARD_PATH,
        json!({ "message": "artwork deleted", "artwork": artwork }),
    ))
}
