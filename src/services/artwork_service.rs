//! ArtworkService: artwork records in SQLite, image payloads in the
//! [`FileStore`].
//!
//! Writes are two-phase: the image is stored first, then the row that
//! references it is committed. If the database write fails, the new file is
//! removed again. Because the file store never overwrites, that rollback can
//! only ever touch the file this request wrote. A crash between the two
//! phases can still leave an orphaned file behind, and images replaced by an
//! update or left by a delete are not removed.

use crate::{
    errors::{GalleryError, GalleryResult},
    models::artwork::Artwork,
    services::{
        file_store::{FileStore, sanitize_filename},
        session::SessionContext,
    },
};
use bytes::Bytes;
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::sync::Arc;
use tracing::info;

const ARTWORK_COLUMNS: &str = "id, title, image, description, creation_date";

/// Fields required to create an artwork.
#[derive(Clone, Debug)]
pub struct NewArtwork {
    pub title: String,
    pub description: String,
    pub creation_date: String,
}

/// Fields an update may change. `None` keeps the stored value.
#[derive(Clone, Debug, Default)]
pub struct ArtworkChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub creation_date: Option<String>,
}

/// Uploaded image bytes plus the filename the client sent.
#[derive(Clone, Debug)]
pub struct ImageUpload {
    pub bytes: Bytes,
    pub original_filename: String,
}

impl ImageUpload {
    pub fn new(bytes: impl Into<Bytes>, original_filename: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            original_filename: original_filename.into(),
        }
    }

    /// Validate the upload and derive its storage name.
    fn storage_name(&self) -> GalleryResult<String> {
        if self.bytes.is_empty() {
            return Err(GalleryError::validation("image is required"));
        }
        sanitize_filename(&self.original_filename)
    }
}

/// Validated update fields; `None` keeps the stored value.
struct RowChanges<'a> {
    title: Option<&'a str>,
    description: Option<&'a str>,
    creation_date: Option<&'a str>,
    image: Option<&'a str>,
}

fn required<'a>(field: &str, value: &'a str) -> GalleryResult<&'a str> {
    if value.trim().is_empty() {
        Err(GalleryError::validation(format!("{} is required", field)))
    } else {
        Ok(value)
    }
}

fn optional<'a>(field: &str, value: Option<&'a str>) -> GalleryResult<Option<&'a str>> {
    value.map(|v| required(field, v)).transpose()
}

#[derive(Clone)]
pub struct ArtworkService {
    /// Shared SQLite connection pool used for metadata operations.
    pub db: Arc<SqlitePool>,

    pub files: FileStore,
}

impl ArtworkService {
    pub fn new(db: Arc<SqlitePool>, files: FileStore) -> Self {
        Self { db, files }
    }

    /// Every artwork in insertion order. Public.
    pub async fn list(&self) -> GalleryResult<Vec<Artwork>> {
        let rows = sqlx::query_as::<_, Artwork>(&format!(
            "SELECT {} FROM artworks ORDER BY id ASC",
            ARTWORK_COLUMNS
        ))
        .fetch_all(&*self.db)
        .await?;
        Ok(rows)
    }

    /// Same listing as [`ArtworkService::list`], for the admin dashboard.
    pub async fn list_for_admin(&self, session: &SessionContext) -> GalleryResult<Vec<Artwork>> {
        session.require_admin()?;
        self.list().await
    }

    /// Fetch one artwork by id.
    pub async fn get(&self, id: i64) -> GalleryResult<Artwork> {
        sqlx::query_as::<_, Artwork>(&format!(
            "SELECT {} FROM artworks WHERE id = ?",
            ARTWORK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&*self.db)
        .await?
        .ok_or(GalleryError::NotFound(id))
    }

    /// Store the image and insert the artwork row that references it.
    pub async fn create(
        &self,
        session: &SessionContext,
        new: NewArtwork,
        image: ImageUpload,
    ) -> GalleryResult<Artwork> {
        let admin = session.require_admin()?;
        let title = required("title", &new.title)?;
        let description = required("description", &new.description)?;
        let creation_date = required("creation_date", &new.creation_date)?;
        let name = image.storage_name()?;

        let reference = self.files.save(&image.bytes, &name).await?;

        let inserted = sqlx::query_as::<_, Artwork>(&format!(
            "INSERT INTO artworks (title, image, description, creation_date)
             VALUES (?, ?, ?, ?)
             RETURNING {}",
            ARTWORK_COLUMNS
        ))
        .bind(title)
        .bind(&reference)
        .bind(description)
        .bind(creation_date)
        .fetch_one(&*self.db)
        .await;

        match inserted {
            Ok(artwork) => {
                info!(id = artwork.id, image = %artwork.image, by = %admin.username, "artwork created");
                Ok(artwork)
            }
            Err(err) => {
                self.files.remove(&reference).await;
                Err(GalleryError::Storage(err))
            }
        }
    }

    /// Change any subset of the fields and optionally replace the image.
    ///
    /// A new image is stored before any lock is taken. The read-modify-write
    /// of the row then runs in a `BEGIN IMMEDIATE` transaction, so concurrent
    /// updates queue on the write lock instead of failing to upgrade a read
    /// lock. Without a new image the stored reference is kept as is.
    pub async fn update(
        &self,
        session: &SessionContext,
        id: i64,
        changes: ArtworkChanges,
        image: Option<ImageUpload>,
    ) -> GalleryResult<Artwork> {
        let admin = session.require_admin()?;
        let title = optional("title", changes.title.as_deref())?;
        let description = optional("description", changes.description.as_deref())?;
        let creation_date = optional("creation_date", changes.creation_date.as_deref())?;
        let image_name = image.as_ref().map(ImageUpload::storage_name).transpose()?;

        // a missing id must not leave a file behind
        self.get(id).await?;

        let new_reference = match (&image, &image_name) {
            (Some(upload), Some(name)) => Some(self.files.save(&upload.bytes, name).await?),
            _ => None,
        };

        let fields = RowChanges {
            title,
            description,
            creation_date,
            image: new_reference.as_deref(),
        };
        match self.write_changes(id, fields).await {
            Ok(artwork) => {
                info!(
                    id,
                    image_replaced = new_reference.is_some(),
                    by = %admin.username,
                    "artwork updated"
                );
                Ok(artwork)
            }
            Err(err) => {
                if let Some(reference) = &new_reference {
                    self.files.remove(reference).await;
                }
                Err(err)
            }
        }
    }

    async fn write_changes(&self, id: i64, fields: RowChanges<'_>) -> GalleryResult<Artwork> {
        let mut tx = self.db.begin_with("BEGIN IMMEDIATE").await?;
        let current = fetch_in(&mut tx, id).await?;

        let merged = Artwork {
            id,
            title: fields.title.map_or(current.title, str::to_string),
            image: fields.image.map_or(current.image, str::to_string),
            description: fields.description.map_or(current.description, str::to_string),
            creation_date: fields
                .creation_date
                .map_or(current.creation_date, str::to_string),
        };
        write_in(tx, &merged).await
    }

    /// Remove the artwork row and return what was deleted. The image file is
    /// left on disk.
    pub async fn delete(&self, session: &SessionContext, id: i64) -> GalleryResult<Artwork> {
        let admin = session.require_admin()?;
        let deleted = sqlx::query_as::<_, Artwork>(&format!(
            "DELETE FROM artworks WHERE id = ? RETURNING {}",
            ARTWORK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&*self.db)
        .await?
        .ok_or(GalleryError::NotFound(id))?;

        info!(id, image = %deleted.image, by = %admin.username, "artwork deleted");
        Ok(deleted)
    }
}

async fn fetch_in(tx: &mut Transaction<'_, Sqlite>, id: i64) -> GalleryResult<Artwork> {
    sqlx::query_as::<_, Artwork>(&format!(
        "SELECT {} FROM artworks WHERE id = ?",
        ARTWORK_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(GalleryError::NotFound(id))
}

async fn write_in(mut tx: Transaction<'_, Sqlite>, artwork: &Artwork) -> GalleryResult<Artwork> {
    let updated = sqlx::query_as::<_, Artwork>(&format!(
        "UPDATE artworks
         SET title = ?, image = ?, description = ?, creation_date = ?
         WHERE id = ?
         RETURNING {}",
        ARTWORK_COLUMNS
    ))
    .bind(&artwork.title)
    .bind(&artwork.image)
    .bind(&artwork.description)
    .bind(&artwork.creation_date)
    .bind(artwork.id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(GalleryError::NotFound(artwork.id))?;
    tx.commit().await?;
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{TestEnv, admin_session, client_session};
    use anyhow::Result;

    fn sample() -> NewArtwork {
        NewArtwork {
            title: "T".into(),
            description: "D".into(),
            creation_date: "2024-01-01".into(),
        }
    }

    fn png(bytes: &'static [u8]) -> ImageUpload {
        ImageUpload::new(Bytes::from_static(bytes), "x.png")
    }

    #[tokio::test]
    async fn create_then_list_round_trips() -> Result<()> {
        let env = TestEnv::new().await?;
        let service = env.artworks();
        let before = service.list().await?;

        let created = service.create(&admin_session(), sample(), png(b"\x89PNG-bytes")).await?;

        let after = service.list().await?;
        assert_eq!(after.len(), before.len() + 1);
        let listed = after.last().expect("new artwork listed");
        assert_eq!(listed, &created);
        assert_eq!(listed.title, "T");
        assert_eq!(listed.description, "D");
        assert_eq!(listed.creation_date, "2024-01-01");
        assert_eq!(listed.image, "x.png");
        assert_eq!(
            env.files.read(&listed.image).await?,
            Bytes::from_static(b"\x89PNG-bytes")
        );
        Ok(())
    }

    #[tokio::test]
    async fn list_follows_insertion_order() -> Result<()> {
        let env = TestEnv::new().await?;
        let service = env.artworks();
        for title in ["first", "second", "third"] {
            let new = NewArtwork {
                title: title.into(),
                ..sample()
            };
            service.create(&admin_session(), new, png(b"img")).await?;
        }

        let titles: Vec<String> = service.list().await?.into_iter().map(|a| a.title).collect();
        assert_eq!(titles, vec!["first", "second", "third"]);
        Ok(())
    }

    #[tokio::test]
    async fn same_filename_uploads_keep_both_images() -> Result<()> {
        let env = TestEnv::new().await?;
        let service = env.artworks();
        let first = service.create(&admin_session(), sample(), png(b"one")).await?;
        let second = service.create(&admin_session(), sample(), png(b"two")).await?;

        assert_ne!(first.image, second.image);
        assert_eq!(env.files.read(&first.image).await?, Bytes::from_static(b"one"));
        assert_eq!(env.files.read(&second.image).await?, Bytes::from_static(b"two"));
        Ok(())
    }

    #[tokio::test]
    async fn non_admin_sessions_cannot_write() -> Result<()> {
        let env = TestEnv::new().await?;
        let service = env.artworks();
        let existing = service.create(&admin_session(), sample(), png(b"keep")).await?;
        let before = service.list().await?;

        for session in [SessionContext::anonymous(), client_session()] {
            assert!(matches!(
                service.create(&session, sample(), png(b"new")).await,
                Err(GalleryError::AccessDenied)
            ));
            assert!(matches!(
                service
                    .update(
                        &session,
                        existing.id,
                        ArtworkChanges {
                            title: Some("hijacked".into()),
                            ..Default::default()
                        },
                        Some(png(b"evil")),
                    )
                    .await,
                Err(GalleryError::AccessDenied)
            ));
            assert!(matches!(
                service.delete(&session, existing.id).await,
                Err(GalleryError::AccessDenied)
            ));
            assert!(matches!(
                service.list_for_admin(&session).await,
                Err(GalleryError::AccessDenied)
            ));
        }

        assert_eq!(service.list().await?, before);
        let stored: Vec<_> = std::fs::read_dir(&env.files.base_path)?.collect();
        assert_eq!(stored.len(), 1, "rejected writes must not touch the disk");
        Ok(())
    }

    #[tokio::test]
    async fn update_without_image_keeps_reference() -> Result<()> {
        let env = TestEnv::new().await?;
        let service = env.artworks();
        let created = service.create(&admin_session(), sample(), png(b"orig")).await?;

        let updated = service
            .update(
                &admin_session(),
                created.id,
                ArtworkChanges {
                    title: Some("New title".into()),
                    description: Some("New description".into()),
                    creation_date: Some("2025-05-05".into()),
                },
                None,
            )
            .await?;

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.image, created.image);
        assert_eq!(updated.title, "New title");
        assert_eq!(updated.description, "New description");
        assert_eq!(updated.creation_date, "2025-05-05");
        assert_eq!(service.get(created.id).await?, updated);
        Ok(())
    }

    #[tokio::test]
    async fn update_with_image_replaces_reference() -> Result<()> {
        let env = TestEnv::new().await?;
        let service = env.artworks();
        let created = service.create(&admin_session(), sample(), png(b"orig")).await?;

        let updated = service
            .update(
                &admin_session(),
                created.id,
                ArtworkChanges::default(),
                Some(ImageUpload::new(Bytes::from_static(b"fresh"), "new one.jpg")),
            )
            .await?;

        assert_eq!(updated.image, "new_one.jpg");
        assert_eq!(updated.title, created.title);
        assert_eq!(env.files.read(&updated.image).await?, Bytes::from_static(b"fresh"));
        // the replaced image stays behind as an orphan
        assert_eq!(env.files.read(&created.image).await?, Bytes::from_static(b"orig"));
        Ok(())
    }

    #[tokio::test]
    async fn update_missing_artwork_is_not_found_and_writes_nothing() -> Result<()> {
        let env = TestEnv::new().await?;
        let service = env.artworks();

        assert!(matches!(
            service
                .update(&admin_session(), 42, ArtworkChanges::default(), Some(png(b"x")))
                .await,
            Err(GalleryError::NotFound(42))
        ));
        assert!(!env.files.base_path.join("x.png").exists());
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_updates_all_commit() -> Result<()> {
        const IMAGE_LEN: usize = 512 * 1024;
        let env = TestEnv::new().await?;
        let service = env.artworks();
        let created = service.create(&admin_session(), sample(), png(b"orig")).await?;

        let mut tasks = tokio::task::JoinSet::new();
        for n in 0u8..5 {
            let service = service.clone();
            let id = created.id;
            tasks.spawn(async move {
                let image = ImageUpload::new(vec![n; IMAGE_LEN], format!("v{}.png", n));
                let changes = ArtworkChanges {
                    title: Some(format!("title {}", n)),
                    ..Default::default()
                };
                service.update(&admin_session(), id, changes, Some(image)).await
            });
        }

        let mut written = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            written.push(joined??);
        }
        assert_eq!(written.len(), 5);

        let stored = service.get(created.id).await?;
        assert!(written.iter().any(|a| a.title == stored.title && a.image == stored.image));
        for artwork in &written {
            assert_eq!(env.files.read(&artwork.image).await?.len(), IMAGE_LEN);
        }
        Ok(())
    }

    #[tokio::test]
    async fn delete_then_get_is_not_found() -> Result<()> {
        let env = TestEnv::new().await?;
        let service = env.artworks();
        let created = service.create(&admin_session(), sample(), png(b"bye")).await?;

        let deleted = service.delete(&admin_session(), created.id).await?;
        assert_eq!(deleted, created);

        assert!(matches!(service.get(created.id).await, Err(GalleryError::NotFound(_))));
        assert!(matches!(
            service.delete(&admin_session(), created.id).await,
            Err(GalleryError::NotFound(_))
        ));
        assert!(service.list().await?.is_empty());
        // the image file is left on disk
        assert_eq!(env.files.read(&created.image).await?, Bytes::from_static(b"bye"));
        Ok(())
    }

    #[tokio::test]
    async fn missing_fields_are_validation_errors() -> Result<()> {
        let env = TestEnv::new().await?;
        let service = env.artworks();

        let blank_title = NewArtwork {
            title: "   ".into(),
            ..sample()
        };
        assert!(matches!(
            service.create(&admin_session(), blank_title, png(b"x")).await,
            Err(GalleryError::Validation(_))
        ));
        assert!(matches!(
            service
                .create(&admin_session(), sample(), ImageUpload::new(Bytes::new(), "x.png"))
                .await,
            Err(GalleryError::Validation(_))
        ));
        assert!(matches!(
            service
                .create(&admin_session(), sample(), ImageUpload::new(Bytes::from_static(b"x"), "../.."))
                .await,
            Err(GalleryError::Validation(_))
        ));

        let created = service.create(&admin_session(), sample(), png(b"x")).await?;
        assert!(matches!(
            service
                .update(
                    &admin_session(),
                    created.id,
                    ArtworkChanges {
                        description: Some(String::new()),
                        ..Default::default()
                    },
                    None,
                )
                .await,
            Err(GalleryError::Validation(_))
        ));
        assert_eq!(service.list().await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn failed_insert_removes_the_new_file() -> Result<()> {
        let env = TestEnv::new().await?;
        let service = env.artworks();
        sqlx::query("DROP TABLE artworks").execute(&*env.db).await?;

        assert!(matches!(
            service.create(&admin_session(), sample(), png(b"x")).await,
            Err(GalleryError::Storage(_))
        ));
        assert!(!env.files.base_path.join("x.png").exists());
        Ok(())
    }
}
