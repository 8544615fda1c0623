//! # Inbound Ports (Driving Ports / API)

use shared_types::Product;

use crate::sender::{SendError, SendOutcome};

/// Delivers products to a remote receiver.
#[async_trait::async_trait]
pub trait ProductSender: Send + Sync {
    /// Send one product.
    ///
    /// # Errors
    /// * `SendError::Rejected` - the receiver answered `RECEIVE_ERROR`
    async fn send_product(&self, product: &Product) -> Result<SendOutcome, SendError>;
}
