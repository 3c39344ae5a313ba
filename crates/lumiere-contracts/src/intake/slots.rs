use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::ImageFormat;
use thiserror::Error;

use super::data_url::encode_data_url;

pub const PORTRAIT_CAPACITY: usize = 1;
pub const PRODUCT_CAPACITY: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0} is not a recognised image")]
pub struct NotAnImage(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    pub id: String,
    pub source: PathBuf,
    pub preview: String,
    pub data_url: String,
}

impl UploadedImage {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            std::fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
        Self::from_bytes(path, &bytes)
    }

    /// Builds an upload from raw bytes. The format is sniffed from the content
    /// first, then the file extension; anything else is refused.
    pub fn from_bytes(source: impl Into<PathBuf>, bytes: &[u8]) -> Result<Self> {
        let source = source.into();
        let Some(mime_type) = sniff_mime_type(&source, bytes) else {
            return Err(NotAnImage(source.display().to_string()).into());
        };
        let preview = source
            .file_name()
            .and_then(|name| name.to_str())
            .filter(|name| !name.is_empty())
            .unwrap_or("upload")
            .to_string();
        Ok(Self {
            id: short_upload_id(),
            source,
            preview,
            data_url: encode_data_url(mime_type, bytes),
        })
    }
}

/// One intake slot. A single slot always holds the newest upload; a multiple
/// slot appends and truncates to `capacity`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSlot {
    capacity: usize,
    multiple: bool,
    images: Vec<UploadedImage>,
}

impl UploadSlot {
    pub fn portrait() -> Self {
        Self::new(PORTRAIT_CAPACITY, false)
    }

    pub fn products() -> Self {
        Self::new(PRODUCT_CAPACITY, true)
    }

    pub fn new(capacity: usize, multiple: bool) -> Self {
        Self {
            capacity: capacity.max(1),
            multiple,
            images: Vec::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_multiple(&self) -> bool {
        self.multiple
    }

    pub fn images(&self) -> &[UploadedImage] {
        &self.images
    }

    pub fn first(&self) -> Option<&UploadedImage> {
        self.images.first()
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn accepts_more(&self) -> bool {
        if self.multiple {
            self.images.len() < self.capacity
        } else {
            self.images.is_empty()
        }
    }

    /// Returns how many of `incoming` were kept.
    pub fn add(&mut self, incoming: Vec<UploadedImage>) -> usize {
        if incoming.is_empty() {
            return 0;
        }
        if !self.multiple {
            self.images = incoming.into_iter().take(1).collect();
            return 1;
        }
        let before = self.images.len();
        self.images.extend(incoming);
        self.images.truncate(self.capacity);
        self.images.len().saturating_sub(before)
    }

    pub fn remove(&mut self, id: &str) -> Option<UploadedImage> {
        let idx = self.images.iter().position(|image| image.id == id)?;
        Some(self.images.remove(idx))
    }

    pub fn clear(&mut self) {
        self.images.clear();
    }

    pub fn data_urls(&self) -> Vec<String> {
        self.images
            .iter()
            .map(|image| image.data_url.clone())
            .collect()
    }
}

fn sniff_mime_type(path: &Path, bytes: &[u8]) -> Option<&'static str> {
    image::guess_format(bytes)
        .ok()
        .or_else(|| ImageFormat::from_path(path).ok())
        .map(|format| format.to_mime_type())
        .filter(|mime| mime.starts_with("image/"))
}

fn short_upload_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..9].to_string()
}
