//! On-disk image storage
//!
//! Generated images land in one output directory shared by every session,
//! named `{session_id}_{index}.png`. Files are created new and never
//! overwritten, so a name clash surfaces as an error instead of clobbering
//! another session's image.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::GenerationError;

static FILE_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}_[0-9]+\.png$")
        .unwrap()
});

/// Image bytes read back from storage
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub name: String,
    pub data: Vec<u8>,
    /// SHA-256 of the bytes, hex encoded
    pub etag: String,
}

/// Output directory for generated images
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    /// Open the store, creating the directory if absent
    pub async fn open(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        if fs::try_exists(&dir).await? {
            debug!("Using image directory {}", dir.display());
        } else {
            fs::create_dir_all(&dir).await?;
            info!("Created image directory {}", dir.display());
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name for a session's `index`-th generation
    pub fn file_name(session_id: &Uuid, index: usize) -> String {
        format!("{}_{}.png", session_id, index)
    }

    /// Whether `name` is a file name this store could have produced
    pub fn is_valid_file_name(name: &str) -> bool {
        FILE_NAME_REGEX.is_match(name)
    }

    /// Compute SHA-256 hash of data
    fn compute_hash(data: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data);
        hex::encode(hasher.finalize())
    }

    /// Fail with `Collision` if `name` is already taken
    pub async fn ensure_available(&self, name: &str) -> Result<(), GenerationError> {
        if fs::try_exists(self.dir.join(name)).await? {
            warn!("Image {} already exists in {}", name, self.dir.display());
            return Err(GenerationError::Collision(name.to_string()));
        }
        Ok(())
    }

    /// Write a new file. Fails with `Collision` if the name is taken.
    ///
    /// The bytes go to a hidden temp file first and are moved into place
    /// with a no-clobber rename, so the final name only ever holds a
    /// complete image.
    pub async fn write_new(&self, name: &str, data: Vec<u8>) -> Result<PathBuf, GenerationError> {
        let dir = self.dir.clone();
        let path = self.dir.join(name);
        let target = path.clone();
        let len = data.len();

        tokio::task::spawn_blocking(move || persist_new(&dir, &target, &data))
            .await
            .map_err(|e| GenerationError::Join(e.to_string()))?
            .map_err(|e| {
                if e.kind() == ErrorKind::AlreadyExists {
                    warn!("Refusing to overwrite existing image {}", path.display());
                    GenerationError::Collision(name.to_string())
                } else {
                    GenerationError::Io(e)
                }
            })?;

        debug!("Wrote image {} ({} bytes)", path.display(), len);
        Ok(path)
    }

    /// Read a stored image by file name
    pub async fn read(&self, name: &str) -> std::io::Result<Option<ImageFile>> {
        if !Self::is_valid_file_name(name) {
            return Ok(None);
        }

        match fs::read(self.dir.join(name)).await {
            Ok(data) => Ok(Some(ImageFile {
                name: name.to_string(),
                etag: Self::compute_hash(&data),
                data,
            })),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Write `data` to a temp file in `dir`, then link it to `target`.
/// The temp file is removed on every failure path when it drops.
fn persist_new(dir: &Path, target: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut tmp = tempfile::Builder::new()
        .prefix(".imaged-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist_noclobber(target).map_err(|e| e.error)?;
    Ok(())
}
