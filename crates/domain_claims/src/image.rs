//! Claim image intake

use std::path::Path;

use crate::claim::ImageReference;
use crate::error::{ClaimError, ValidationError};

/// An uploaded vehicle image held in memory
#[derive(Clone, PartialEq, Eq)]
pub struct ClaimImage {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for ClaimImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaimImage")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("size_bytes", &self.bytes.len())
            .finish()
    }
}

impl ClaimImage {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Reads an image from disk, inferring the content type from the extension
    pub async fn read_from_path(path: impl AsRef<Path>) -> Result<Self, ClaimError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|source| ClaimError::ImageUnreadable {
            path: path.display().to_string(),
            source,
        })?;

        let content_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        Ok(Self::new(file_name, content_type, bytes))
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Checks the content type and size against the intake limit
    pub fn validate(&self, max_bytes: u64) -> Result<(), ValidationError> {
        if !self.content_type.trim().to_ascii_lowercase().starts_with("image/") {
            return Err(ValidationError::UnsupportedImage(self.content_type.clone()));
        }
        if self.size_bytes() > max_bytes {
            return Err(ValidationError::ImageTooLarge {
                size_bytes: self.size_bytes(),
                limit_bytes: max_bytes,
            });
        }
        Ok(())
    }

    /// The persisted form of this image
    pub fn reference(&self) -> ImageReference {
        ImageReference {
            file_name: self.file_name.clone(),
            content_type: self.content_type.clone(),
            size_bytes: self.size_bytes(),
        }
    }
}
