//! # Inbound Ports (Driving Ports / API)

use shared_types::Product;

use crate::domain::entities::{VerificationMode, VerificationOutcome};
use crate::domain::errors::VerificationError;

/// Signature policy applied to received products.
#[async_trait::async_trait]
pub trait ProductSignatureApi: Send + Sync {
    /// Active mode.
    fn mode(&self) -> VerificationMode;

    /// Apply the policy to `product`.
    ///
    /// Only enforce mode returns an error.
    async fn verify_product(
        &self,
        product: &Product,
    ) -> Result<VerificationOutcome, VerificationError>;
}
