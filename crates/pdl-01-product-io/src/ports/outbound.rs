//! # Outbound Ports (Driven Ports / SPI)
//!
//! The event sink a product source pushes into.
//!
//! ## Event Order
//!
//! ```text
//! on_begin
//!   (on_property | on_link)*
//!   on_content*
//!   on_signature_version?
//!   on_signature?
//! on_end
//! ```
//!
//! `on_end` is called exactly once for every `on_begin` the source
//! delivered, including when the source fails part way through.

use shared_types::{ContentDescriptor, ContentReader, ProductId, SignatureVersion};
use url::Url;

use crate::domain::errors::Result;

/// Bytes of one content as seen by a sink.
pub enum ContentBody {
    /// Externally resolvable reference; no bytes follow.
    Url(Url),
    /// Byte stream. It must be consumed or dropped before `on_content`
    /// returns.
    Stream(ContentReader),
}

impl std::fmt::Debug for ContentBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentBody::Url(url) => f.debug_tuple("Url").field(url).finish(),
            ContentBody::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// How the stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Every event was delivered.
    Complete,
    /// The source failed; earlier events describe a partial product.
    Failed,
}

/// Consumer of one product's event stream.
#[async_trait::async_trait]
pub trait ProductSink: Send {
    /// First event.
    async fn on_begin(
        &mut self,
        id: &ProductId,
        status: &str,
        tracker_url: Option<&Url>,
    ) -> Result<()>;

    /// One property.
    async fn on_property(&mut self, id: &ProductId, name: &str, value: &str) -> Result<()>;

    /// One link; repeated relations accumulate in order.
    async fn on_link(&mut self, id: &ProductId, relation: &str, uri: &Url) -> Result<()>;

    /// One content.
    async fn on_content(
        &mut self,
        id: &ProductId,
        path: &str,
        descriptor: ContentDescriptor,
        body: ContentBody,
    ) -> Result<()>;

    /// Version the signature was produced with.
    async fn on_signature_version(&mut self, id: &ProductId, version: SignatureVersion)
        -> Result<()>;

    /// Base64 signature.
    async fn on_signature(&mut self, id: &ProductId, signature: &str) -> Result<()>;

    /// Last event.
    async fn on_end(&mut self, id: &ProductId, completion: Completion) -> Result<()>;
}

/// Deliver `on_end` for a stream whose body finished with `result`.
///
/// A failed stream still ends the sink; an error from that `on_end` is
/// logged and the original error returned.
pub(crate) async fn end_stream(
    sink: &mut dyn ProductSink,
    id: &ProductId,
    result: Result<()>,
) -> Result<()> {
    match result {
        Ok(()) => sink.on_end(id, Completion::Complete).await,
        Err(error) => {
            if let Err(end_error) = sink.on_end(id, Completion::Failed).await {
                tracing::debug!(
                    product_id = %id,
                    error = %end_error,
                    "sink failed to end after stream error"
                );
            }
            Err(error)
        }
    }
}
