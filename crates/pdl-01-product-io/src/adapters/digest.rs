//! # Digest Sink
//!
//! Computes the canonical product digest from an event stream. Embedded
//! content is hashed incrementally, so signing a large product never holds
//! its contents in memory.

use sha2::{Digest, Sha256};
use shared_types::{ContentDescriptor, Product, ProductId, SignatureVersion};
use tokio::io::AsyncReadExt;
use url::Url;

use crate::adapters::object::ObjectProductSource;
use crate::domain::digest::{ContentReference, DigestContent, DigestInput};
use crate::domain::errors::{ProductIoError, Result};
use crate::ports::inbound::ProductSource;
use crate::ports::outbound::{Completion, ContentBody, ProductSink};

const HASH_CHUNK: usize = 64 * 1024;

/// Sink producing the digest a product signature covers.
#[derive(Debug)]
pub struct DigestProductSink {
    version: SignatureVersion,
    input: Option<DigestInput>,
    digest: Option<Vec<u8>>,
}

impl DigestProductSink {
    /// Digest with the algorithm of `version`.
    pub fn new(version: SignatureVersion) -> Self {
        Self {
            version,
            input: None,
            digest: None,
        }
    }

    /// The digest, once the stream completed.
    pub fn digest(&self) -> Option<&[u8]> {
        self.digest.as_deref()
    }

    fn input(&mut self) -> Result<&mut DigestInput> {
        self.input
            .as_mut()
            .ok_or(ProductIoError::UnexpectedEvent("event before begin"))
    }
}

#[async_trait::async_trait]
impl ProductSink for DigestProductSink {
    async fn on_begin(
        &mut self,
        id: &ProductId,
        status: &str,
        _tracker_url: Option<&Url>,
    ) -> Result<()> {
        self.input = Some(DigestInput::new(id, status));
        self.digest = None;
        Ok(())
    }

    async fn on_property(&mut self, _id: &ProductId, name: &str, value: &str) -> Result<()> {
        self.input()?
            .properties
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    async fn on_link(&mut self, _id: &ProductId, relation: &str, uri: &Url) -> Result<()> {
        self.input()?
            .links
            .entry(relation.to_string())
            .or_default()
            .push(uri.to_string());
        Ok(())
    }

    async fn on_content(
        &mut self,
        _id: &ProductId,
        path: &str,
        descriptor: ContentDescriptor,
        body: ContentBody,
    ) -> Result<()> {
        let reference = match body {
            ContentBody::Url(url) => ContentReference::Url(url.to_string()),
            ContentBody::Stream(mut reader) => {
                let mut hasher = Sha256::new();
                let mut chunk = vec![0u8; HASH_CHUNK];
                let mut actual = 0u64;
                loop {
                    let n = reader.read(&mut chunk).await?;
                    if n == 0 {
                        break;
                    }
                    actual += n as u64;
                    hasher.update(&chunk[..n]);
                }
                if actual != descriptor.length {
                    return Err(ProductIoError::ContentLengthMismatch {
                        path: path.to_string(),
                        declared: descriptor.length,
                        actual,
                    });
                }
                ContentReference::Embedded(hex::encode(hasher.finalize()))
            }
        };
        self.input()?.contents.insert(
            path.to_string(),
            DigestContent {
                content_type: descriptor.content_type,
                length: descriptor.length,
                reference,
            },
        );
        Ok(())
    }

    async fn on_signature_version(
        &mut self,
        _id: &ProductId,
        _version: SignatureVersion,
    ) -> Result<()> {
        Ok(())
    }

    async fn on_signature(&mut self, _id: &ProductId, _signature: &str) -> Result<()> {
        Ok(())
    }

    async fn on_end(&mut self, _id: &ProductId, completion: Completion) -> Result<()> {
        let input = self
            .input
            .take()
            .ok_or(ProductIoError::UnexpectedEvent("end before begin"))?;
        if completion == Completion::Complete {
            self.digest = Some(input.digest(self.version));
        }
        Ok(())
    }
}

/// Canonical digest of `product` under `version`.
pub async fn product_digest(product: &Product, version: SignatureVersion) -> Result<Vec<u8>> {
    let mut sink = DigestProductSink::new(version);
    ObjectProductSource::new(product)
        .stream_to(&mut sink)
        .await?;
    sink.digest
        .ok_or(ProductIoError::UnexpectedEvent("digest stream did not complete"))
}
