//! Cover image hosting.
//!
//! Posts carry images as base64 `data:` URLs. An [`ImageHost`] turns one into
//! a public URL on upload and can later destroy what it issued.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use readshelf_http::AppError;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Extensions an uploaded image may be stored under, with their media type.
const IMAGE_TYPES: [(&str, &str); 4] = [
    ("jpg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
];

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("image must be a base64 encoded data URL")]
    InvalidDataUrl,

    #[error("unsupported image type {0}")]
    UnsupportedType(String),

    #[error("image {0} not found")]
    NotFound(String),

    #[error("image storage failed: {0}")]
    Io(#[from] io::Error),
}

impl From<ImageError> for AppError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::InvalidDataUrl | ImageError::UnsupportedType(_) => AppError::validation(
                vec![serde_json::json!({ "field": "image", "error": "invalid" })],
                err.to_string(),
            ),
            ImageError::NotFound(_) => AppError::not_found(err.to_string()),
            ImageError::Io(err) => AppError::Internal(err.into()),
        }
    }
}

/// Where cover images live.
#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Store a `data:image/...;base64,` payload and return its public URL.
    async fn upload(&self, data_url: &str) -> Result<String, ImageError>;

    /// Id of an image this host issued, or `None` for foreign URLs.
    fn public_id(&self, url: &str) -> Option<String>;

    async fn destroy(&self, public_id: &str) -> Result<(), ImageError>;
}

/// Decoded image held by [`LocalImageHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

enum Backing {
    Memory(RwLock<HashMap<String, StoredImage>>),
    /// One `{id}.{ext}` file per image.
    Disk(PathBuf),
}

/// Self-hosted image host. Images are served back at `{base_url}/{id}.{ext}`
/// and kept either in process memory or in a directory that outlives
/// restarts.
pub struct LocalImageHost {
    base_url: String,
    backing: Backing,
}

impl LocalImageHost {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            backing: Backing::Memory(RwLock::new(HashMap::new())),
        }
    }

    /// Host that writes images under `dir`, creating it on first upload.
    pub fn with_dir(base_url: &str, dir: impl Into<PathBuf>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            backing: Backing::Disk(dir.into()),
        }
    }

    /// Look up an image by its file name (`{id}.{ext}`).
    pub async fn fetch(&self, file: &str) -> Result<Option<StoredImage>, ImageError> {
        let Some((id, content_type)) = parse_file_name(file) else {
            return Ok(None);
        };

        match &self.backing {
            Backing::Memory(images) => Ok(images
                .read()
                .await
                .get(id)
                .filter(|image| image.content_type == content_type)
                .cloned()),
            Backing::Disk(dir) => match tokio::fs::read(dir.join(file)).await {
                Ok(bytes) => Ok(Some(StoredImage {
                    content_type: content_type.to_string(),
                    bytes,
                })),
                Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
                Err(err) => Err(err.into()),
            },
        }
    }

    pub async fn image_count(&self) -> Result<usize, ImageError> {
        match &self.backing {
            Backing::Memory(images) => Ok(images.read().await.len()),
            Backing::Disk(dir) => {
                let mut entries = match tokio::fs::read_dir(dir).await {
                    Ok(entries) => entries,
                    Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(0),
                    Err(err) => return Err(err.into()),
                };
                let mut count = 0;
                while let Some(entry) = entries.next_entry().await? {
                    if entry.file_name().to_str().and_then(parse_file_name).is_some() {
                        count += 1;
                    }
                }
                Ok(count)
            }
        }
    }
}

#[async_trait]
impl ImageHost for LocalImageHost {
    async fn upload(&self, data_url: &str) -> Result<String, ImageError> {
        let (content_type, bytes) = decode_data_url(data_url)?;
        let (extension, content_type) = extension_for(&content_type)?;
        let id = Uuid::new_v4().simple().to_string();
        let size = bytes.len();

        match &self.backing {
            Backing::Memory(images) => {
                images.write().await.insert(
                    id.clone(),
                    StoredImage {
                        content_type: content_type.to_string(),
                        bytes,
                    },
                );
            }
            Backing::Disk(dir) => {
                tokio::fs::create_dir_all(dir).await?;
                tokio::fs::write(dir.join(format!("{id}.{extension}")), bytes).await?;
            }
        }

        tracing::debug!(image_id = %id, content_type, size, "image stored");
        Ok(format!("{}/{id}.{extension}", self.base_url))
    }

    fn public_id(&self, url: &str) -> Option<String> {
        let file = url.strip_prefix(&self.base_url)?.strip_prefix('/')?;
        let (id, _) = file.split_once('.')?;
        (!id.is_empty() && !id.contains('/')).then(|| id.to_string())
    }

    async fn destroy(&self, public_id: &str) -> Result<(), ImageError> {
        let removed = match &self.backing {
            Backing::Memory(images) => images.write().await.remove(public_id).is_some(),
            Backing::Disk(dir) => {
                let mut removed = false;
                if is_image_id(public_id) {
                    for (extension, _) in IMAGE_TYPES {
                        let path = dir.join(format!("{public_id}.{extension}"));
                        match tokio::fs::remove_file(path).await {
                            Ok(()) => removed = true,
                            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                            Err(err) => return Err(err.into()),
                        }
                    }
                }
                removed
            }
        };

        if removed {
            Ok(())
        } else {
            Err(ImageError::NotFound(public_id.to_string()))
        }
    }
}

fn is_image_id(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// Split `{id}.{ext}` into the id and the media type for `ext`.
fn parse_file_name(file: &str) -> Option<(&str, &'static str)> {
    let (id, extension) = file.split_once('.')?;
    if !is_image_id(id) {
        return None;
    }
    IMAGE_TYPES
        .iter()
        .find(|(known, _)| *known == extension)
        .map(|(_, content_type)| (id, *content_type))
}

fn decode_data_url(data_url: &str) -> Result<(String, Vec<u8>), ImageError> {
    let rest = data_url
        .strip_prefix("data:")
        .ok_or(ImageError::InvalidDataUrl)?;
    let (meta, payload) = rest.split_once(',').ok_or(ImageError::InvalidDataUrl)?;
    let content_type = meta
        .strip_suffix(";base64")
        .ok_or(ImageError::InvalidDataUrl)?;
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|_| ImageError::InvalidDataUrl)?;
    if bytes.is_empty() {
        return Err(ImageError::InvalidDataUrl);
    }
    Ok((content_type.to_ascii_lowercase(), bytes))
}

/// Storage extension and canonical media type for an uploaded content type.
/// Only raster formats are accepted; anything a browser could run as a
/// document, such as SVG, is refused.
fn extension_for(content_type: &str) -> Result<(&'static str, &'static str), ImageError> {
    let content_type = match content_type {
        "image/jpg" => "image/jpeg",
        other => other,
    };
    IMAGE_TYPES
        .iter()
        .find(|(_, known)| *known == content_type)
        .copied()
        .ok_or_else(|| ImageError::UnsupportedType(content_type.to_string()))
}
