//! # Node Container
//!
//! Builds the receiver and its collaborators from a `NodeConfig`.
//!
//! ## Wiring
//!
//! ```text
//! SocketProductReceiver ──verify──→ SignatureVerifier (keychain)
//!          │
//!          └──store──→ InMemoryProductStorage | JsonFileProductStorage
//! ```

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use pdl_01_product_io::{read_product, ProductIoError};
use pdl_02_socket_transport::{
    InMemoryProductStorage, JsonFileProductStorage, ProductSender, ProductStorage, SendError,
    SendOutcome, SenderConfig, SocketProductReceiver, SocketProductSender, StorageError,
    TransportError,
};
use pdl_03_signature_verification::{ProductSignatureApi, SignatureVerifier};
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::{ConfigError, NodeConfig, StorageKind};

/// Errors from building or running a node.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("storage setup failed: {0}")]
    Storage(#[from] StorageError),

    #[error("receiver failed: {0}")]
    Transport(#[from] TransportError),

    #[error("unable to read product file {path}: {source}")]
    ProductFile {
        path: String,
        #[source]
        source: ProductIoError,
    },

    #[error(transparent)]
    Send(#[from] SendError),
}

/// Initialized node services.
pub struct NodeContainer {
    pub config: NodeConfig,
    pub storage: Arc<dyn ProductStorage>,
    pub verifier: Arc<SignatureVerifier>,
    pub receiver: Arc<SocketProductReceiver>,
}

impl NodeContainer {
    /// Open storage, load the keychain and build the receiver.
    pub async fn build(config: NodeConfig) -> Result<Self, NodeError> {
        let storage: Arc<dyn ProductStorage> = match config.storage.kind {
            StorageKind::Memory => Arc::new(InMemoryProductStorage::new()),
            StorageKind::JsonFile => {
                let directory = config.resolve(&config.storage.directory);
                Arc::new(JsonFileProductStorage::open(directory).await?)
            }
        };

        let verifier = Arc::new(SignatureVerifier::new(
            config.verification_mode(),
            config.signatures.allow_unknown_signer,
            config.load_keychain()?,
        ));

        let receiver = Arc::new(
            SocketProductReceiver::new(config.receiver_config(), Arc::clone(&storage))
                .with_verifier(verifier.clone()),
        );

        info!(
            storage = ?config.storage.kind,
            signatures = %verifier.mode(),
            keys = verifier.keychain().len(),
            "Node container initialized"
        );

        Ok(Self {
            config,
            storage,
            verifier,
            receiver,
        })
    }

    /// Bind the configured receiver address.
    pub async fn bind(&self) -> Result<TcpListener, NodeError> {
        Ok(self.receiver.bind().await?)
    }

    /// Serve connections on `listener` until `shutdown` resolves.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<(), NodeError>
    where
        F: Future<Output = ()> + Send,
    {
        Arc::clone(&self.receiver).run(listener, shutdown).await?;
        Ok(())
    }
}

/// Read a product file (XML or JSON) and send it.
pub async fn send_file(config: SenderConfig, path: &Path) -> Result<SendOutcome, NodeError> {
    let file_error = |source: ProductIoError| NodeError::ProductFile {
        path: path.display().to_string(),
        source,
    };
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| file_error(e.into()))?;
    let product = read_product(file).await.map_err(file_error)?;

    info!(product = %product.id, host = %config.host, port = config.port, "Sending product");
    let sender = SocketProductSender::new(config);
    Ok(sender.send_product(&product).await?)
}
