//! # Object Adapters
//!
//! Replay a materialized [`Product`] as events, and rebuild one from events.

use bytes::Bytes;
use sha2::{Digest, Sha256};
use shared_types::{
    Content, ContentDescriptor, ContentReader, ContentSource, Product, ProductId,
    SignatureVersion,
};
use tokio::io::AsyncReadExt;
use url::Url;

use crate::domain::errors::{ProductIoError, Result};
use crate::ports::inbound::ProductSource;
use crate::ports::outbound::{end_stream, Completion, ContentBody, ProductSink};

const READ_CHUNK: usize = 64 * 1024;

// =============================================================================
// SOURCE
// =============================================================================

/// Emits the events of an in-memory product.
///
/// URL content is emitted as a reference; every other content is opened
/// and streamed.
pub struct ObjectProductSource<'a> {
    product: &'a Product,
}

impl<'a> ObjectProductSource<'a> {
    pub fn new(product: &'a Product) -> Self {
        Self { product }
    }
}

#[async_trait::async_trait]
impl ProductSource for ObjectProductSource<'_> {
    async fn stream_to(&mut self, sink: &mut dyn ProductSink) -> Result<()> {
        let product = self.product;
        let id = &product.id;
        sink.on_begin(id, &product.status, product.tracker_url.as_ref())
            .await?;
        let result = replay_body(product, &mut *sink).await;
        end_stream(sink, id, result).await
    }
}

async fn replay_body(product: &Product, sink: &mut dyn ProductSink) -> Result<()> {
    let id = &product.id;
    for (name, value) in &product.properties {
        sink.on_property(id, name, value).await?;
    }
    for (relation, uris) in &product.links {
        for uri in uris {
            sink.on_link(id, relation, uri).await?;
        }
    }
    for (path, content) in &product.contents {
        let body = match &content.source {
            ContentSource::Url(url) => ContentBody::Url(url.clone()),
            _ => ContentBody::Stream(content.open().await?),
        };
        sink.on_content(id, path, content.descriptor.clone(), body)
            .await?;
    }
    sink.on_signature_version(id, product.signature_version)
        .await?;
    if let Some(signature) = &product.signature {
        sink.on_signature(id, signature).await?;
    }
    Ok(())
}

// =============================================================================
// SINK
// =============================================================================

/// Rebuilds a [`Product`] from events.
///
/// Streamed content is read into memory; its length is checked against the
/// descriptor and its SHA-256 computed (and checked, when declared).
#[derive(Debug, Default)]
pub struct ObjectProductSink {
    building: Option<Product>,
    finished: Option<Product>,
}

impl ObjectProductSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// The rebuilt product, once the stream completed.
    pub fn take_product(&mut self) -> Option<Product> {
        self.finished.take()
    }

    fn product(&mut self) -> Result<&mut Product> {
        self.building
            .as_mut()
            .ok_or(ProductIoError::UnexpectedEvent("event before begin"))
    }
}

#[async_trait::async_trait]
impl ProductSink for ObjectProductSink {
    async fn on_begin(
        &mut self,
        id: &ProductId,
        status: &str,
        tracker_url: Option<&Url>,
    ) -> Result<()> {
        if self.building.is_some() {
            return Err(ProductIoError::UnexpectedEvent("begin while building"));
        }
        let mut product = Product::new(id.clone());
        product.status = status.to_string();
        product.tracker_url = tracker_url.cloned();
        self.building = Some(product);
        self.finished = None;
        Ok(())
    }

    async fn on_property(&mut self, _id: &ProductId, name: &str, value: &str) -> Result<()> {
        self.product()?
            .properties
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    async fn on_link(&mut self, _id: &ProductId, relation: &str, uri: &Url) -> Result<()> {
        self.product()?.add_link(relation, uri.clone());
        Ok(())
    }

    async fn on_content(
        &mut self,
        _id: &ProductId,
        path: &str,
        descriptor: ContentDescriptor,
        body: ContentBody,
    ) -> Result<()> {
        let content = match body {
            ContentBody::Url(url) => Content::from_url(descriptor, url),
            ContentBody::Stream(mut reader) => {
                let (bytes, sha256) = read_verified(path, &descriptor, &mut reader).await?;
                let mut descriptor = descriptor;
                descriptor.sha256 = Some(sha256);
                Content {
                    descriptor,
                    source: ContentSource::Bytes(bytes),
                }
            }
        };
        self.product()?.contents.insert(path.to_string(), content);
        Ok(())
    }

    async fn on_signature_version(
        &mut self,
        _id: &ProductId,
        version: SignatureVersion,
    ) -> Result<()> {
        self.product()?.signature_version = version;
        Ok(())
    }

    async fn on_signature(&mut self, _id: &ProductId, signature: &str) -> Result<()> {
        self.product()?.signature = Some(signature.to_string());
        Ok(())
    }

    async fn on_end(&mut self, _id: &ProductId, completion: Completion) -> Result<()> {
        let product = self
            .building
            .take()
            .ok_or(ProductIoError::UnexpectedEvent("end before begin"))?;
        if completion == Completion::Complete {
            self.finished = Some(product);
        }
        Ok(())
    }
}

/// Read a content stream fully, checking it against its descriptor.
pub(crate) async fn read_verified(
    path: &str,
    descriptor: &ContentDescriptor,
    reader: &mut ContentReader,
) -> Result<(Bytes, String)> {
    let mut hasher = Sha256::new();
    let mut bytes = Vec::with_capacity(descriptor.length.min(1 << 20) as usize);
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        hasher.update(&chunk[..n]);
        bytes.extend_from_slice(&chunk[..n]);
        if bytes.len() as u64 > descriptor.length {
            break;
        }
    }

    let actual = bytes.len() as u64;
    if actual != descriptor.length {
        return Err(ProductIoError::ContentLengthMismatch {
            path: path.to_string(),
            declared: descriptor.length,
            actual,
        });
    }
    let computed = hex::encode(hasher.finalize());
    if let Some(declared) = &descriptor.sha256 {
        if !declared.eq_ignore_ascii_case(&computed) {
            return Err(ProductIoError::ContentDigestMismatch {
                path: path.to_string(),
                declared: declared.clone(),
                computed,
            });
        }
    }
    Ok((Bytes::from(bytes), computed))
}
