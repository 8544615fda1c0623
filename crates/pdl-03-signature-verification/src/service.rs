//! # Signature Verification Service
//!
//! Implements `ProductSignatureApi` over a keychain.
//!
//! | Mode | Candidates validate | None validate | No candidates |
//! |------|--------------------|---------------|---------------|
//! | off | skipped | skipped | skipped |
//! | test | logged | logged | logged |
//! | enforce | accepted | `VerificationFailed` | accepted only with `allow_unknown_signer` |

use shared_types::Product;
use tracing::{debug, info};

use crate::domain::entities::{ProductKeyChain, VerificationMode, VerificationOutcome};
use crate::domain::errors::VerificationError;
use crate::domain::signing::verify_product_signature;
use crate::ports::inbound::ProductSignatureApi;

/// Verifier built once at startup and shared read-only.
#[derive(Debug, Clone, Default)]
pub struct SignatureVerifier {
    mode: VerificationMode,
    allow_unknown_signer: bool,
    keychain: ProductKeyChain,
}

impl SignatureVerifier {
    pub fn new(mode: VerificationMode, allow_unknown_signer: bool, keychain: ProductKeyChain) -> Self {
        Self {
            mode,
            allow_unknown_signer,
            keychain,
        }
    }

    /// A verifier that never checks.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn keychain(&self) -> &ProductKeyChain {
        &self.keychain
    }

    pub fn allow_unknown_signer(&self) -> bool {
        self.allow_unknown_signer
    }

    /// Run the keychain check regardless of mode.
    pub async fn check(&self, product: &Product) -> Result<VerificationOutcome, VerificationError> {
        let candidates = self.keychain.candidates(&product.id);
        if candidates.is_empty() {
            if self.allow_unknown_signer {
                return Ok(VerificationOutcome::UnknownSignerAllowed);
            }
            return Err(VerificationError::NoCandidateKeys(product.id.clone()));
        }

        let matched =
            verify_product_signature(product, candidates.iter().map(|key| &key.key)).await?;
        match matched.and_then(|index| candidates.get(index)) {
            Some(key) => Ok(VerificationOutcome::Verified {
                key: key.name.clone(),
            }),
            None => Err(VerificationError::VerificationFailed(product.id.clone())),
        }
    }
}

#[async_trait::async_trait]
impl ProductSignatureApi for SignatureVerifier {
    fn mode(&self) -> VerificationMode {
        self.mode
    }

    async fn verify_product(
        &self,
        product: &Product,
    ) -> Result<VerificationOutcome, VerificationError> {
        match self.mode {
            VerificationMode::Disabled => Ok(VerificationOutcome::Skipped),
            VerificationMode::Test => {
                let passed = match self.check(product).await {
                    Ok(outcome) => {
                        info!(product = %product.id, ?outcome, "signature test passed");
                        true
                    }
                    Err(error) => {
                        info!(product = %product.id, %error, "signature test failed");
                        false
                    }
                };
                Ok(VerificationOutcome::Tested { passed })
            }
            VerificationMode::Enforce => {
                let outcome = self.check(product).await?;
                debug!(product = %product.id, ?outcome, "signature accepted");
                Ok(outcome)
            }
        }
    }
}
