//! # Socket Product Receiver
//!
//! Accepts connections and stores the product each one carries.
//!
//! ## Connection Flow
//!
//! 1. Read up to three bytes. `PDL` selects versioned mode; anything else is
//!    legacy mode and the bytes are replayed in front of the payload.
//! 2. Versioned: read the version and product id, lock the id, and answer
//!    `ALREADY_HAVE_PRODUCT` (done) or `UNKNOWN_PRODUCT`.
//! 3. Decode the payload (size-limited), lock the id in legacy mode, verify,
//!    and store.
//! 4. Reply with the status: framed in versioned mode, raw bytes in legacy
//!    mode. The lock is released after the reply.
//!
//! Every read waits at most `read_timeout`.

use std::future::Future;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use pdl_01_product_io::read_product;
use shared_types::ProductId;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::domain::config::ReceiverConfig;
use crate::domain::errors::{StorageError, TransportError};
use crate::domain::locks::{ProductLockGuard, ProductLocks};
use crate::domain::protocol::{
    read_string, receive_error, stored_status, write_string, ALREADY_HAVE_PRODUCT,
    MAX_HANDSHAKE_FIELD, PROTOCOL_MARKER, PROTOCOL_VERSION_0_1, UNKNOWN_PRODUCT,
};
use crate::limits::{SizeLimitReader, TimeoutReader};
use crate::ports::outbound::{ProductStorage, ProductVerifier};


/// Pause after a failed accept.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// How a connection ended successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// The product was stored.
    Stored(ProductId),
    /// The product was already in storage.
    AlreadyHave(ProductId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Legacy,
    Versioned,
}

/// Socket receiver.
pub struct SocketProductReceiver {
    config: ReceiverConfig,
    storage: Arc<dyn ProductStorage>,
    verifier: Option<Arc<dyn ProductVerifier>>,
    locks: ProductLocks,
}

impl SocketProductReceiver {
    pub fn new(config: ReceiverConfig, storage: Arc<dyn ProductStorage>) -> Self {
        Self {
            config,
            storage,
            verifier: None,
            locks: ProductLocks::new(),
        }
    }

    /// Check every product with `verifier` before storing it.
    pub fn with_verifier(mut self, verifier: Arc<dyn ProductVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Share a lock table with other receivers writing to the same storage.
    pub fn with_locks(mut self, locks: ProductLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn config(&self) -> &ReceiverConfig {
        &self.config
    }

    pub fn locks(&self) -> &ProductLocks {
        &self.locks
    }

    /// Bind the configured address.
    pub async fn bind(&self) -> Result<TcpListener, TransportError> {
        Ok(TcpListener::bind(self.config.bind_addr).await?)
    }

    /// Accept connections until `shutdown` resolves, one task per connection.
    ///
    /// Connections already accepted run to completion after shutdown.
    pub async fn run<F>(self: Arc<Self>, listener: TcpListener, shutdown: F) -> Result<(), TransportError>
    where
        F: Future<Output = ()> + Send,
    {
        tokio::pin!(shutdown);
        info!(
            receiver = %self.config.name,
            addr = %listener.local_addr()?,
            "Receiver listening"
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(receiver = %self.config.name, "Receiver stopped");
                    return Ok(());
                }
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(error) => {
                            warn!(receiver = %self.config.name, %error, "accept failed");
                            tokio::time::sleep(ACCEPT_BACKOFF).await;
                            continue;
                        }
                    };
                    debug!(receiver = %self.config.name, %peer, "accepted connection");
                    let receiver = Arc::clone(&self);
                    tokio::spawn(async move {
                        // outcome already logged and replied to
                        let _ = receiver.handle_connection(stream, &peer.to_string()).await;
                    });
                }
            }
        }
    }

    /// Run one connection to completion, always attempting a status reply.
    pub async fn handle_connection<S>(
        &self,
        stream: S,
        peer: &str,
    ) -> Result<ReceiveOutcome, TransportError>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin,
    {
        let (read_half, mut writer) = tokio::io::split(stream);
        let mut reader = TimeoutReader::new(read_half, self.config.read_timeout);
        let mut mode = Mode::Legacy;
        let mut lock = None;

        let result = self
            .receive(&mut reader, &mut writer, &mut mode, &mut lock, peer)
            .await;

        let status = match &result {
            Ok(ReceiveOutcome::Stored(id)) => {
                info!(receiver = %self.config.name, peer, product = %id, "stored product");
                stored_status(id)
            }
            Ok(ReceiveOutcome::AlreadyHave(id)) => {
                info!(receiver = %self.config.name, peer, product = %id, "already have product");
                ALREADY_HAVE_PRODUCT.to_string()
            }
            Err(error) => {
                warn!(receiver = %self.config.name, peer, %error, "unable to receive product");
                receive_error(&error.to_string())
            }
        };
        if let Err(error) = send_status(&mut writer, mode, &status).await {
            warn!(receiver = %self.config.name, peer, %error, "unable to send status");
        }
        if let Err(error) = writer.shutdown().await {
            debug!(receiver = %self.config.name, peer, %error, "shutdown failed");
        }
        drop(lock);
        result
    }

    async fn receive<R, W>(
        &self,
        reader: &mut R,
        writer: &mut W,
        mode: &mut Mode,
        lock: &mut Option<ProductLockGuard>,
        peer: &str,
    ) -> Result<ReceiveOutcome, TransportError>
    where
        R: AsyncRead + Send + Unpin,
        W: AsyncWrite + Send + Unpin,
    {
        let prefix = read_prefix(reader).await?;
        let (prefix, handshake_id) = if prefix.as_slice() == PROTOCOL_MARKER {
            *mode = Mode::Versioned;
            let id = self.handshake(reader, peer).await?;
            *lock = Some(self.locks.acquire(&id).await);
            if self.storage.has_product(&id).await? {
                return Ok(ReceiveOutcome::AlreadyHave(id));
            }
            send_status(writer, Mode::Versioned, UNKNOWN_PRODUCT).await?;
            (Vec::new(), Some(id))
        } else {
            debug!(receiver = %self.config.name, peer, "legacy connection");
            (prefix, None)
        };

        let payload = SizeLimitReader::new(
            Cursor::new(prefix).chain(&mut *reader),
            self.config.size_limit,
        );
        let product = read_product(payload).await?;

        match handshake_id {
            Some(expected) if expected != product.id => {
                return Err(TransportError::IdMismatch {
                    expected,
                    actual: product.id,
                });
            }
            Some(_) => {}
            None => *lock = Some(self.locks.acquire(&product.id).await),
        }

        if let Some(verifier) = &self.verifier {
            verifier
                .verify(&product)
                .await
                .map_err(|rejected| TransportError::Rejected(rejected.to_string()))?;
        }

        let id = product.id.clone();
        match self.storage.store_product(product).await {
            Ok(stored) => Ok(ReceiveOutcome::Stored(stored)),
            Err(StorageError::AlreadyExists(_)) => Ok(ReceiveOutcome::AlreadyHave(id)),
            Err(error) => Err(error.into()),
        }
    }

    /// Version and product id, after the marker.
    async fn handshake<R>(&self, reader: &mut R, peer: &str) -> Result<ProductId, TransportError>
    where
        R: AsyncRead + Send + Unpin,
    {
        let version = match read_string(reader, MAX_HANDSHAKE_FIELD).await {
            Err(TransportError::FieldTooLong { .. }) => {
                return Err(TransportError::BadProtocolVersion)
            }
            other => other?,
        };
        if version != PROTOCOL_VERSION_0_1 {
            return Err(TransportError::UnsupportedVersion(version));
        }
        let id = read_string(reader, MAX_HANDSHAKE_FIELD).await?;
        debug!(receiver = %self.config.name, peer, %version, product = %id, "handshake");
        id.parse().map_err(TransportError::InvalidProductId)
    }
}

/// Up to `PROTOCOL_MARKER.len()` leading bytes; fewer only at end of stream.
async fn read_prefix<R>(reader: &mut R) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = vec![0u8; PROTOCOL_MARKER.len()];
    let mut filled = 0;
    while filled < prefix.len() {
        let n = reader.read(&mut prefix[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    prefix.truncate(filled);
    Ok(prefix)
}

async fn send_status<W>(writer: &mut W, mode: Mode, status: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    match mode {
        Mode::Versioned => write_string(writer, status).await?,
        Mode::Legacy => writer.write_all(status.as_bytes()).await?,
    }
    writer.flush().await
}
