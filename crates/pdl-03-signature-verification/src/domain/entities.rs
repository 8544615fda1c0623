//! # Verification Entities
//!
//! Policy mode, keychain and outcomes.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use shared_crypto::PublicKey;
use shared_types::ProductId;

use crate::domain::errors::VerificationError;

// =============================================================================
// MODE
// =============================================================================

/// How strictly signatures are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerificationMode {
    /// No checks.
    #[default]
    Disabled,
    /// Checks are run and logged but never reject.
    Test,
    /// Products without a valid signature are rejected.
    Enforce,
}

impl VerificationMode {
    /// Parse a configuration value: `off`, `test`, anything else enforces.
    pub fn from_config(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "off" => VerificationMode::Disabled,
            "test" => VerificationMode::Test,
            _ => VerificationMode::Enforce,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationMode::Disabled => "off",
            VerificationMode::Test => "test",
            VerificationMode::Enforce => "enforce",
        }
    }
}

impl FromStr for VerificationMode {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_config(s))
    }
}

impl fmt::Display for VerificationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// KEYCHAIN
// =============================================================================

/// A trusted public key and the products it may sign.
///
/// Empty `sources` or `types` lists match any value.
#[derive(Debug, Clone)]
pub struct ProductKey {
    pub name: String,
    pub key: PublicKey,
    pub sources: Vec<String>,
    pub types: Vec<String>,
}

impl ProductKey {
    /// Key that applies to every product.
    pub fn new(name: impl Into<String>, key: PublicKey) -> Self {
        Self {
            name: name.into(),
            key,
            sources: Vec::new(),
            types: Vec::new(),
        }
    }

    /// Load key material in any supported format (DER, PEM, OpenSSH).
    pub fn from_bytes(name: impl Into<String>, bytes: &[u8]) -> Result<Self, VerificationError> {
        let name = name.into();
        match PublicKey::from_bytes(bytes) {
            Ok(key) => Ok(Self::new(name, key)),
            Err(source) => Err(VerificationError::MalformedKey { name, source }),
        }
    }

    pub fn with_sources(mut self, sources: Vec<String>) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_types(mut self, types: Vec<String>) -> Self {
        self.types = types;
        self
    }

    /// Whether this key may have signed `id`.
    pub fn is_candidate(&self, id: &ProductId) -> bool {
        (self.sources.is_empty() || self.sources.iter().any(|s| s == id.source()))
            && (self.types.is_empty() || self.types.iter().any(|t| t == id.product_type()))
    }
}

/// Configured trusted keys.
#[derive(Debug, Clone, Default)]
pub struct ProductKeyChain {
    keys: Vec<ProductKey>,
}

impl ProductKeyChain {
    pub fn new(keys: Vec<ProductKey>) -> Self {
        Self { keys }
    }

    pub fn push(&mut self, key: ProductKey) {
        self.keys.push(key);
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Keys that apply to `id`, in configuration order.
    pub fn candidates(&self, id: &ProductId) -> Vec<&ProductKey> {
        self.keys.iter().filter(|key| key.is_candidate(id)).collect()
    }
}

// =============================================================================
// OUTCOME
// =============================================================================

/// Result of a verification that did not reject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// Verification is disabled.
    Skipped,
    /// The named key validated the signature.
    Verified { key: String },
    /// No key applies and unknown signers are allowed.
    UnknownSignerAllowed,
    /// Test mode: the check ran and was only logged.
    Tested { passed: bool },
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::dates::from_millis;

    fn id(source: &str, product_type: &str) -> ProductId {
        ProductId::new(source, product_type, "code", from_millis(0).unwrap())
    }

    fn key() -> PublicKey {
        PublicKey::from_bytes(include_bytes!("../../../shared-crypto/testdata/rsa_public.pem"))
            .unwrap()
    }

    #[test]
    fn test_mode_from_config() {
        assert_eq!(VerificationMode::from_config("off"), VerificationMode::Disabled);
        assert_eq!(VerificationMode::from_config(" TEST "), VerificationMode::Test);
        assert_eq!(VerificationMode::from_config("enforce"), VerificationMode::Enforce);
        assert_eq!(VerificationMode::from_config("yes please"), VerificationMode::Enforce);
        assert_eq!("off".parse::<VerificationMode>().unwrap().to_string(), "off");
    }

    #[test]
    fn test_candidate_filters() {
        let any = ProductKey::new("any", key());
        let us = ProductKey::new("us", key()).with_sources(vec!["us".into()]);
        let shakemap = ProductKey::new("shakemap", key())
            .with_sources(vec!["us".into(), "ci".into()])
            .with_types(vec!["shakemap".into()]);

        assert!(any.is_candidate(&id("nc", "origin")));
        assert!(us.is_candidate(&id("us", "origin")));
        assert!(!us.is_candidate(&id("nc", "origin")));
        assert!(shakemap.is_candidate(&id("ci", "shakemap")));
        assert!(!shakemap.is_candidate(&id("ci", "origin")));

        let chain = ProductKeyChain::new(vec![any, us, shakemap]);
        let names: Vec<_> = chain
            .candidates(&id("us", "shakemap"))
            .iter()
            .map(|k| k.name.as_str())
            .collect();
        assert_eq!(names, ["any", "us", "shakemap"]);
        assert_eq!(chain.candidates(&id("nc", "origin")).len(), 1);
    }

    #[test]
    fn test_malformed_key_named() {
        let result = ProductKey::from_bytes("broken", b"-----BEGIN PUBLIC KEY-----\nAAAA\n");
        assert!(matches!(
            result,
            Err(VerificationError::MalformedKey { name, .. }) if name == "broken"
        ));
    }
}
