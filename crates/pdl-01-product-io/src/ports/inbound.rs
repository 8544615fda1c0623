//! # Inbound Ports (Driving Ports / API)
//!
//! A product source drives one sink through one product's events.

use crate::domain::errors::Result;
use crate::ports::outbound::ProductSink;

/// Producer of one product's event stream.
#[async_trait::async_trait]
pub trait ProductSource: Send {
    /// Push every event of the product into `sink`, once.
    ///
    /// # Errors
    /// * `MalformedInput` - the id or status is absent or unparsable
    /// * `TruncatedContent` - embedded bytes end before the declared length
    async fn stream_to(&mut self, sink: &mut dyn ProductSink) -> Result<()>;
}
