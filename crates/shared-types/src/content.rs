//! # Product Contents
//!
//! A content is one named attachment of a product: integrity metadata plus
//! exactly one byte source. Byte sources are opened lazily; the returned
//! reader releases the underlying resource when dropped.

use std::path::{Path, PathBuf};
use std::pin::Pin;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt};
use url::Url;

use crate::dates::{now_millis, truncate_to_millis};
use crate::errors::ProductError;

/// Reader over a content's bytes.
pub type ContentReader = Pin<Box<dyn AsyncRead + Send>>;

/// Metadata carried alongside content bytes.
///
/// `length` and `sha256` describe the bytes but are never pre-verified;
/// consumers recompute them when it matters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDescriptor {
    /// MIME type.
    pub content_type: String,
    /// Declared byte count.
    pub length: u64,
    /// Last modification time.
    pub last_modified: DateTime<Utc>,
    /// Lowercase hex SHA-256 of the bytes, when known.
    pub sha256: Option<String>,
}

impl ContentDescriptor {
    /// Descriptor without a known digest.
    pub fn new(content_type: impl Into<String>, length: u64, last_modified: DateTime<Utc>) -> Self {
        Self {
            content_type: content_type.into(),
            length,
            last_modified: truncate_to_millis(last_modified),
            sha256: None,
        }
    }
}

/// Where a content's bytes come from.
#[derive(Debug, Clone)]
pub enum ContentSource {
    /// Externally resolvable reference. `file:` URLs are readable locally.
    Url(Url),
    /// Bytes held in memory.
    Bytes(Bytes),
    /// Local file.
    File(PathBuf),
}

/// One named attachment of a product.
#[derive(Debug, Clone)]
pub struct Content {
    /// Metadata.
    pub descriptor: ContentDescriptor,
    /// Byte source.
    pub source: ContentSource,
}

impl Content {
    /// In-memory content; length and digest are computed from the bytes.
    pub fn from_bytes(content_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        let mut descriptor = ContentDescriptor::new(content_type, bytes.len() as u64, now_millis());
        descriptor.sha256 = Some(sha256_hex(&bytes));
        Self {
            descriptor,
            source: ContentSource::Bytes(bytes),
        }
    }

    /// Reference content. The digest stays unknown unless set by the caller.
    pub fn from_url(descriptor: ContentDescriptor, url: Url) -> Self {
        Self {
            descriptor,
            source: ContentSource::Url(url),
        }
    }

    /// File-backed content using the file's size and modification time.
    pub async fn from_file(
        path: impl AsRef<Path>,
        content_type: impl Into<String>,
    ) -> Result<Self, ProductError> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        let modified = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| now_millis());
        Ok(Self {
            descriptor: ContentDescriptor::new(content_type, metadata.len(), modified),
            source: ContentSource::File(path.to_path_buf()),
        })
    }

    /// The reference URL, for URL content.
    pub fn url(&self) -> Option<&Url> {
        match &self.source {
            ContentSource::Url(url) => Some(url),
            _ => None,
        }
    }

    /// Open the bytes for reading.
    ///
    /// Fails with `RemoteContent` for URL content that is not a `file:` URL.
    pub async fn open(&self) -> Result<ContentReader, ProductError> {
        match &self.source {
            ContentSource::Bytes(bytes) => Ok(Box::pin(std::io::Cursor::new(bytes.clone()))),
            ContentSource::File(path) => open_file(path).await,
            ContentSource::Url(url) if url.scheme() == "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|_| ProductError::RemoteContent(url.to_string()))?;
                open_file(&path).await
            }
            ContentSource::Url(url) => Err(ProductError::RemoteContent(url.to_string())),
        }
    }

    /// Read all bytes into memory.
    pub async fn read_all(&self) -> Result<Bytes, ProductError> {
        if let ContentSource::Bytes(bytes) = &self.source {
            return Ok(bytes.clone());
        }
        let mut reader = self.open().await?;
        let mut buffer = Vec::with_capacity(self.descriptor.length.min(1 << 20) as usize);
        reader.read_to_end(&mut buffer).await?;
        Ok(Bytes::from(buffer))
    }
}

async fn open_file(path: &Path) -> Result<ContentReader, ProductError> {
    let file = tokio::fs::File::open(path).await?;
    Ok(Box::pin(file))
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
