//! Receiver-side adapter: lets the socket receiver consult the verifier.

use pdl_02_socket_transport::{ProductVerifier, VerificationRejected};
use shared_types::Product;

use crate::ports::inbound::ProductSignatureApi;
use crate::service::SignatureVerifier;

#[async_trait::async_trait]
impl ProductVerifier for SignatureVerifier {
    async fn verify(&self, product: &Product) -> Result<(), VerificationRejected> {
        self.verify_product(product)
            .await
            .map(|_| ())
            .map_err(|error| VerificationRejected {
                reason: error.to_string(),
            })
    }
}
