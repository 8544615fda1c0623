//! # Node Configuration
//!
//! Loaded from a TOML file; every field has a default.
//!
//! ```toml
//! [receiver]
//! name = "receiver"
//! bind_addr = "0.0.0.0:11235"
//! read_timeout_secs = 30          # 0 waits forever
//! size_limit_bytes = 104857600    # 0 = unlimited
//!
//! [storage]
//! kind = "memory"                 # or "json-file"
//! directory = "./data/products"
//!
//! [signatures]
//! mode = "off"                    # off | test | enforce
//! allow_unknown_signer = false
//!
//! [[signatures.keys]]
//! name = "example"
//! path = "keys/example.pub"       # DER, PEM or OpenSSH
//! sources = ["us"]
//! types = []
//! ```
//!
//! Relative key and storage paths resolve against the config file's
//! directory.

use std::fs;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use pdl_02_socket_transport::{ReceiverConfig, DEFAULT_PORT};
use pdl_03_signature_verification::{ProductKey, ProductKeyChain, VerificationMode};
use serde::Deserialize;
use thiserror::Error;

/// Default payload cap: 100 MiB.
pub const DEFAULT_SIZE_LIMIT: u64 = 100 * 1024 * 1024;

/// Complete node configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub receiver: ReceiverSection,
    pub storage: StorageSection,
    pub signatures: SignaturesSection,
    /// Directory of the loaded file.
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

/// `[receiver]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReceiverSection {
    pub name: String,
    pub bind_addr: SocketAddr,
    pub read_timeout_secs: u64,
    pub size_limit_bytes: u64,
}

impl Default for ReceiverSection {
    fn default() -> Self {
        Self {
            name: "receiver".to_string(),
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            read_timeout_secs: 30,
            size_limit_bytes: DEFAULT_SIZE_LIMIT,
        }
    }
}

/// Storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageKind {
    #[default]
    Memory,
    JsonFile,
}

/// `[storage]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub kind: StorageKind,
    pub directory: PathBuf,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            kind: StorageKind::Memory,
            directory: PathBuf::from("./data/products"),
        }
    }
}

/// `[signatures]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SignaturesSection {
    /// `off`, `test`, anything else enforces.
    pub mode: String,
    pub allow_unknown_signer: bool,
    pub keys: Vec<KeySection>,
}

impl Default for SignaturesSection {
    fn default() -> Self {
        Self {
            mode: "off".to_string(),
            allow_unknown_signer: false,
            keys: Vec::new(),
        }
    }
}

/// `[[signatures.keys]]`
#[derive(Debug, Clone, Deserialize)]
pub struct KeySection {
    pub name: String,
    pub path: PathBuf,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub types: Vec<String>,
}

/// Errors that can occur during config loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("Failed to read {path}: {error}")]
    Io {
        path: String,
        #[source]
        error: io::Error,
    },

    /// TOML parsing error.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A keychain entry could not be loaded.
    #[error("Failed to load key '{name}': {reason}")]
    Key { name: String, reason: String },
}

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|error| ConfigError::Io {
            path: path.display().to_string(),
            error,
        })?;
        let mut config = Self::parse(&content)?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Resolve `path` against the config file's directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    pub fn receiver_config(&self) -> ReceiverConfig {
        let section = &self.receiver;
        ReceiverConfig {
            name: section.name.clone(),
            bind_addr: section.bind_addr,
            read_timeout: (section.read_timeout_secs > 0)
                .then(|| Duration::from_secs(section.read_timeout_secs)),
            size_limit: (section.size_limit_bytes > 0).then_some(section.size_limit_bytes),
        }
    }

    pub fn verification_mode(&self) -> VerificationMode {
        VerificationMode::from_config(&self.signatures.mode)
    }

    /// Read every configured key file.
    pub fn load_keychain(&self) -> Result<ProductKeyChain, ConfigError> {
        let mut keychain = ProductKeyChain::default();
        for entry in &self.signatures.keys {
            let path = self.resolve(&entry.path);
            let bytes = fs::read(&path).map_err(|error| ConfigError::Io {
                path: path.display().to_string(),
                error,
            })?;
            let key = ProductKey::from_bytes(&entry.name, &bytes)
                .map_err(|e| ConfigError::Key {
                    name: entry.name.clone(),
                    reason: e.to_string(),
                })?
                .with_sources(entry.sources.clone())
                .with_types(entry.types.clone());
            keychain.push(key);
        }
        Ok(keychain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSA_PUBLIC: &[u8] = include_bytes!("../../shared-crypto/testdata/rsa_public.pem");

    #[test]
    fn test_defaults() {
        let config = NodeConfig::parse("").unwrap();
        assert_eq!(config.receiver.bind_addr.port(), 11235);
        assert_eq!(config.storage.kind, StorageKind::Memory);
        assert_eq!(config.verification_mode(), VerificationMode::Disabled);

        let receiver = config.receiver_config();
        assert_eq!(receiver.read_timeout, Some(Duration::from_secs(30)));
        assert_eq!(receiver.size_limit, Some(DEFAULT_SIZE_LIMIT));
    }

    #[test]
    fn test_full_file() {
        let config = NodeConfig::parse(
            r#"
            [receiver]
            name = "hub"
            bind_addr = "127.0.0.1:2000"
            read_timeout_secs = 0
            size_limit_bytes = 0

            [storage]
            kind = "json-file"
            directory = "/var/lib/pdl"

            [signatures]
            mode = "enforce"
            allow_unknown_signer = true

            [[signatures.keys]]
            name = "us"
            path = "keys/us.pem"
            sources = ["us"]
            "#,
        )
        .unwrap();

        let receiver = config.receiver_config();
        assert_eq!(receiver.name, "hub");
        assert_eq!(receiver.bind_addr, "127.0.0.1:2000".parse().unwrap());
        assert_eq!(receiver.read_timeout, None);
        assert_eq!(receiver.size_limit, None);
        assert_eq!(config.storage.kind, StorageKind::JsonFile);
        assert_eq!(config.verification_mode(), VerificationMode::Enforce);
        assert!(config.signatures.allow_unknown_signer);
        assert_eq!(config.signatures.keys[0].sources, ["us"]);
        assert!(config.signatures.keys[0].types.is_empty());
    }

    #[test]
    fn test_bad_toml() {
        assert!(matches!(
            NodeConfig::parse("[receiver]\nbind_addr = 5"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            NodeConfig::load("/nonexistent/pdl.toml"),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_keys_resolve_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("keys")).unwrap();
        fs::write(dir.path().join("keys/us.pem"), RSA_PUBLIC).unwrap();
        fs::write(dir.path().join("keys/bad.pem"), b"ssh-ed25519 AAAA").unwrap();
        let file = dir.path().join("pdl.toml");
        fs::write(
            &file,
            "[[signatures.keys]]\nname = \"us\"\npath = \"keys/us.pem\"\ntypes = [\"origin\"]\n",
        )
        .unwrap();

        let config = NodeConfig::load(&file).unwrap();
        let keychain = config.load_keychain().unwrap();
        assert_eq!(keychain.len(), 1);

        fs::write(
            &file,
            "[[signatures.keys]]\nname = \"bad\"\npath = \"keys/bad.pem\"\n",
        )
        .unwrap();
        let config = NodeConfig::load(&file).unwrap();
        assert!(matches!(
            config.load_keychain(),
            Err(ConfigError::Key { name, .. }) if name == "bad"
        ));
    }
}
