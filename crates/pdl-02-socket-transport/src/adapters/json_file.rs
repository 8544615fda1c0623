//! # JSON File Storage
//!
//! One directory per product under a root:
//!
//! ```text
//! <root>/<source>_<type>_<code>_<updateMillis>/
//!     product.json
//!     contents/<n>-<path>
//! ```
//!
//! Embedded contents other than the self content are written next to the
//! document and referenced by `file:` URLs; the self content stays inline.
//! A product exists once `product.json` is in place. A directory without
//! it is the remains of an interrupted store and is replaced by the next
//! store of that id.

use std::io;
use std::path::{Path, PathBuf};

use pdl_01_product_io::{ProductDocument, ProductIoError};
use shared_types::{Content, ContentSource, Product, ProductId};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use url::Url;

use crate::domain::errors::StorageError;
use crate::ports::outbound::ProductStorage;

const PRODUCT_FILE: &str = "product.json";
const CONTENTS_DIR: &str = "contents";

/// Products stored as JSON documents on disk.
#[derive(Debug, Clone)]
pub struct JsonFileProductStorage {
    root: PathBuf,
}

impl JsonFileProductStorage {
    /// Open (creating if needed) a storage rooted at `root`.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        tokio::fs::create_dir_all(root.as_ref()).await?;
        let root = tokio::fs::canonicalize(root.as_ref()).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding `id`.
    pub fn product_dir(&self, id: &ProductId) -> PathBuf {
        self.root.join(format!(
            "{}_{}_{}_{}",
            safe_name(id.source()),
            safe_name(id.product_type()),
            safe_name(id.code()),
            id.update_time().timestamp_millis()
        ))
    }

    async fn write_product(&self, dir: &Path, mut product: Product) -> Result<(), StorageError> {
        let contents_dir = dir.join(CONTENTS_DIR);
        for (index, (path, content)) in product.contents.iter_mut().enumerate() {
            if path.is_empty() || matches!(content.source, ContentSource::Url(_)) {
                continue;
            }
            tokio::fs::create_dir_all(&contents_dir).await?;
            let file = contents_dir.join(format!("{index}-{}", safe_name(path)));
            copy_content(content, &file).await?;
            let url = Url::from_file_path(&file).map_err(|_| {
                io::Error::new(io::ErrorKind::InvalidInput, "content path is not absolute")
            })?;
            content.source = ContentSource::Url(url);
        }

        let document = ProductDocument::from_product(&product).await?;
        let json = serde_json::to_vec(&document).map_err(ProductIoError::from)?;
        let staged = dir.join(format!("{PRODUCT_FILE}.tmp"));
        tokio::fs::write(&staged, json).await?;
        tokio::fs::rename(&staged, dir.join(PRODUCT_FILE)).await?;
        Ok(())
    }

    /// Point `file:` URLs inside `dir` back at local files.
    fn localize(&self, dir: &Path, product: &mut Product) {
        for content in product.contents.values_mut() {
            if let ContentSource::Url(url) = &content.source {
                if url.scheme() != "file" {
                    continue;
                }
                if let Ok(path) = url.to_file_path() {
                    if path.starts_with(dir) {
                        content.source = ContentSource::File(path);
                    }
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl ProductStorage for JsonFileProductStorage {
    async fn has_product(&self, id: &ProductId) -> Result<bool, StorageError> {
        Ok(tokio::fs::try_exists(self.product_dir(id).join(PRODUCT_FILE)).await?)
    }

    async fn store_product(&self, product: Product) -> Result<ProductId, StorageError> {
        let id = product.id.clone();
        let dir = self.product_dir(&id);
        if let Err(e) = tokio::fs::create_dir(&dir).await {
            if e.kind() != io::ErrorKind::AlreadyExists {
                return Err(e.into());
            }
            if self.has_product(&id).await? {
                return Err(StorageError::AlreadyExists(id));
            }
            warn!(dir = %dir.display(), "replacing incomplete product directory");
            tokio::fs::remove_dir_all(&dir).await?;
            match tokio::fs::create_dir(&dir).await {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    return Err(StorageError::AlreadyExists(id));
                }
                Err(e) => return Err(e.into()),
            }
        }

        if let Err(error) = self.write_product(&dir, product).await {
            if let Err(cleanup) = tokio::fs::remove_dir_all(&dir).await {
                debug!(dir = %dir.display(), error = %cleanup, "unable to remove partial product");
            }
            return Err(error);
        }
        debug!(product = %id, dir = %dir.display(), "stored product");
        Ok(id)
    }

    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>, StorageError> {
        let dir = self.product_dir(id);
        let json = match tokio::fs::read(dir.join(PRODUCT_FILE)).await {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let document: ProductDocument =
            serde_json::from_slice(&json).map_err(ProductIoError::from)?;
        let mut product = document.into_product()?;
        self.localize(&dir, &mut product);
        Ok(Some(product))
    }
}

async fn copy_content(content: &Content, target: &Path) -> Result<(), StorageError> {
    let mut reader = content.open().await.map_err(ProductIoError::from)?;
    let mut file = tokio::fs::File::create(target).await?;
    tokio::io::copy(&mut reader, &mut file).await?;
    file.flush().await?;
    Ok(())
}

/// Filesystem-safe, collision-free rendering of an id component.
fn safe_name(value: &str) -> String {
    let mut name = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'.' => name.push(byte as char),
            _ => name.push_str(&format!("%{byte:02X}")),
        }
    }
    if name.starts_with('.') {
        name.replace_range(..1, "%2E");
    }
    name
}
