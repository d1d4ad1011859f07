//! FileStore: image payloads on local disk.
//!
//! Every file lives directly under `base_path` with a sanitized name. Saves
//! never overwrite: when a name is taken, a short random suffix is inserted
//! before the extension, so two uploads called `photo.png` end up as two
//! distinct files.

use crate::errors::{GalleryError, GalleryResult};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tokio::{
    fs::{self, File, OpenOptions},
    io::AsyncWriteExt,
};
use tracing::debug;
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

const MAX_NAME_ATTEMPTS: usize = 8;
const MAX_FILENAME_LEN: usize = 200;
/// `-` plus eight hex digits.
const SUFFIX_LEN: usize = 9;

#[derive(Clone, Debug)]
pub struct FileStore {
    /// Directory holding every uploaded image.
    pub base_path: PathBuf,
}

/// Reduce an uploaded filename to something safe to use as a storage key.
///
/// - decomposes Unicode and drops everything outside ASCII
/// - turns path separators into whitespace, then joins whitespace runs with `_`
/// - keeps only `[A-Za-z0-9_.-]`
/// - strips leading and trailing `.` and `_`
///
/// The result is a single path component that is never `.` or `..`. An input
/// with nothing usable left is a validation error.
pub fn sanitize_filename(name: &str) -> GalleryResult<String> {
    let ascii: String = name.nfkd().filter(char::is_ascii).collect();
    let spaced = ascii.replace(['/', '\\'], " ");
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    let trimmed = kept.trim_matches(|c| c == '.' || c == '_');

    if trimmed.is_empty() {
        return Err(GalleryError::validation(format!(
            "image filename `{}` has no usable characters",
            name
        )));
    }

    Ok(truncate_keeping_extension(trimmed, MAX_FILENAME_LEN))
}

fn truncate_keeping_extension(name: &str, max: usize) -> String {
    if name.len() <= max {
        return name.to_string();
    }
    let (stem, ext) = split_extension(name);
    let cut = if ext.len() < max / 2 {
        format!("{}{}", &stem[..max - ext.len()], ext)
    } else {
        name[..max].to_string()
    };
    cut.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// Split `photo.final.png` into (`photo.final`, `.png`).
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(pos) if pos > 0 => name.split_at(pos),
        _ => (name, ""),
    }
}

impl FileStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Map a stored reference to its path, refusing anything the sanitizer
    /// would have changed.
    fn resolve(&self, reference: &str) -> GalleryResult<PathBuf> {
        match sanitize_filename(reference) {
            Ok(clean) if clean == reference => Ok(self.base_path.join(reference)),
            _ => Err(GalleryError::FileNotFound(reference.to_string())),
        }
    }

    /// Reserve a free name derived from `sanitized_name`.
    ///
    /// The reservation is an empty file created with `create_new`, which makes
    /// the check-and-claim atomic even with concurrent uploads.
    async fn reserve_name(&self, sanitized_name: &str) -> GalleryResult<(String, PathBuf)> {
        let (stem, ext) = match split_extension(sanitized_name) {
            (_, ext) if ext.len() + SUFFIX_LEN >= MAX_FILENAME_LEN => (sanitized_name, ""),
            parts => parts,
        };
        let stem = &stem[..stem.len().min(MAX_FILENAME_LEN - SUFFIX_LEN - ext.len())];
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let candidate = if attempt == 0 {
                sanitized_name.to_string()
            } else {
                let suffix = Uuid::new_v4().simple().to_string();
                format!("{}-{}{}", stem, &suffix[..SUFFIX_LEN - 1], ext)
            };
            let path = self.base_path.join(&candidate);
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(_) => return Ok((candidate, path)),
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    debug!("image name {} taken, trying another", candidate);
                }
                Err(err) => return Err(GalleryError::Io(err)),
            }
        }
        Err(GalleryError::Io(io::Error::new(
            ErrorKind::AlreadyExists,
            format!("no free name for `{}`", sanitized_name),
        )))
    }

    /// Persist `bytes` and return the reference under which they were stored.
    ///
    /// - Reserves a non-colliding name.
    /// - Writes to a temporary file and fsyncs it.
    /// - Renames the temporary file over the reservation.
    ///
    /// On any failure the temporary file and the reservation are removed.
    pub async fn save(&self, bytes: &[u8], sanitized_name: &str) -> GalleryResult<String> {
        if sanitize_filename(sanitized_name)? != sanitized_name {
            return Err(GalleryError::validation(format!(
                "image filename `{}` is not sanitized",
                sanitized_name
            )));
        }
        fs::create_dir_all(&self.base_path).await?;

        let (reference, final_path) = self.reserve_name(sanitized_name).await?;
        let tmp_path = self.base_path.join(format!(".tmp-{}", Uuid::new_v4()));

        if let Err(err) = write_synced(&tmp_path, bytes).await {
            let _ = fs::remove_file(&tmp_path).await;
            let _ = fs::remove_file(&final_path).await;
            return Err(GalleryError::Io(err));
        }

        if let Err(err) = fs::rename(&tmp_path, &final_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            let _ = fs::remove_file(&final_path).await;
            return Err(GalleryError::Io(err));
        }

        debug!(
            "stored {} bytes at {}",
            bytes.len(),
            final_path.display()
        );
        Ok(reference)
    }

    /// Read the whole payload behind `reference`.
    #[cfg(test)]
    pub async fn read(&self, reference: &str) -> GalleryResult<bytes::Bytes> {
        let path = self.resolve(reference)?;
        match fs::read(&path).await {
            Ok(data) => Ok(bytes::Bytes::from(data)),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(GalleryError::FileNotFound(reference.to_string()))
            }
            Err(err) => Err(GalleryError::Io(err)),
        }
    }

    /// Open the payload behind `reference` for streaming.
    pub async fn open(&self, reference: &str) -> GalleryResult<File> {
        let path = self.resolve(reference)?;
        File::open(&path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                GalleryError::FileNotFound(reference.to_string())
            } else {
                GalleryError::Io(err)
            }
        })
    }

    /// Best-effort removal, used to roll back a save whose database write
    /// failed.
    pub async fn remove(&self, reference: &str) {
        let Ok(path) = self.resolve(reference) else {
            return;
        };
        match fs::remove_file(&path).await {
            Ok(_) => debug!("removed image {}", path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("image {} already missing", path.display());
            }
            Err(err) => debug!("failed to remove image {}: {}", path.display(), err),
        }
    }
}

async fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(path).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_all().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use bytes::Bytes;
    use tempfile::tempdir;

    #[test]
    fn sanitizer_strips_traversal_and_unsafe_characters() {
        assert_eq!(sanitize_filename("../../etc/passwd").unwrap(), "etc_passwd");
        assert_eq!(
            sanitize_filename("..\\..\\windows\\win.ini").unwrap(),
            "windows_win.ini"
        );
        assert_eq!(sanitize_filename("My cool movie.mov").unwrap(), "My_cool_movie.mov");
        assert_eq!(sanitize_filename("i contain cool \u{fc}ml\u{e4}uts.txt").unwrap(), "i_contain_cool_umlauts.txt");
        assert_eq!(sanitize_filename("x.png").unwrap(), "x.png");
        assert_eq!(sanitize_filename("<script>.png").unwrap(), "script.png");
        assert_eq!(sanitize_filename("._hidden_.jpg").unwrap(), "hidden_.jpg");
    }

    #[test]
    fn sanitizer_rejects_names_with_nothing_left() {
        for name in ["", "..", "/", "\u{2603}", " . _ "] {
            assert!(
                matches!(sanitize_filename(name), Err(GalleryError::Validation(_))),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn long_names_keep_their_extension() {
        let long = format!("{}.png", "a".repeat(500));
        let clean = sanitize_filename(&long).unwrap();
        assert_eq!(clean.len(), MAX_FILENAME_LEN);
        assert!(clean.ends_with(".png"));
    }

    #[tokio::test]
    async fn save_then_read_round_trips() -> Result<()> {
        let dir = tempdir()?;
        let store = FileStore::new(dir.path().join("uploads"));

        let reference = store.save(b"pixels", "x.png").await?;
        assert_eq!(reference, "x.png");
        assert_eq!(store.read(&reference).await?, Bytes::from_static(b"pixels"));
        Ok(())
    }

    #[tokio::test]
    async fn colliding_names_do_not_overwrite() -> Result<()> {
        let dir = tempdir()?;
        let store = FileStore::new(dir.path());

        let first = store.save(b"first", "x.png").await?;
        let second = store.save(b"second", "x.png").await?;

        assert_ne!(first, second);
        assert!(second.starts_with("x-") && second.ends_with(".png"));
        assert_eq!(store.read(&first).await?, Bytes::from_static(b"first"));
        assert_eq!(store.read(&second).await?, Bytes::from_static(b"second"));
        Ok(())
    }

    #[tokio::test]
    async fn save_refuses_unsanitized_names() -> Result<()> {
        let dir = tempdir()?;
        let store = FileStore::new(dir.path());
        assert!(matches!(
            store.save(b"x", "../escape.png").await,
            Err(GalleryError::Validation(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn reads_outside_the_directory_are_not_found() -> Result<()> {
        let dir = tempdir()?;
        let store = FileStore::new(dir.path().join("uploads"));
        std::fs::write(dir.path().join("secret.txt"), b"nope")?;

        assert!(matches!(
            store.read("../secret.txt").await,
            Err(GalleryError::FileNotFound(_))
        ));
        assert!(matches!(
            store.read("missing.png").await,
            Err(GalleryError::FileNotFound(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn remove_is_best_effort() -> Result<()> {
        let dir = tempdir()?;
        let store = FileStore::new(dir.path());
        let reference = store.save(b"bytes", "gone.png").await?;

        store.remove(&reference).await;
        store.remove(&reference).await;
        assert!(matches!(
            store.read(&reference).await,
            Err(GalleryError::FileNotFound(_))
        ));
        Ok(())
    }
}
