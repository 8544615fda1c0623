//! # Socket Product Sender
//!
//! Client side of the transport. In versioned mode the product id is
//! announced first and the payload is only written when the receiver
//! answers `UNKNOWN_PRODUCT`. The payload ends with a write half-close,
//! after which the receiver's status is read.

use std::io;

use pdl_01_product_io::{write_product, ProductEncoding, ProductIoError};
use shared_types::Product;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::domain::config::SenderConfig;
use crate::domain::errors::TransportError;
use crate::domain::protocol::{
    read_string, write_string, ALREADY_HAVE_PRODUCT, MAX_STATUS_FIELD, PROTOCOL_MARKER,
    PROTOCOL_VERSION_0_1, RECEIVE_ERROR, UNKNOWN_PRODUCT,
};
use crate::limits::TimeoutReader;
use crate::ports::inbound::ProductSender;

/// Result of a delivery the receiver accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The receiver already had the product.
    AlreadyHave,
    /// The product was transferred; `status` is the receiver's reply.
    Sent { status: String },
}

/// Errors from sending a product.
#[derive(Debug, Error)]
pub enum SendError {
    /// The connection could not be opened
    #[error("unable to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Connecting took longer than the connect timeout
    #[error("connection to {addr} timed out")]
    ConnectTimeout { addr: String },

    /// The product could not be encoded
    #[error("product encoding failed: {0}")]
    Encode(#[source] ProductIoError),

    /// A framed reply could not be read
    #[error("protocol error: {0}")]
    Protocol(#[from] TransportError),

    /// The receiver answered with `RECEIVE_ERROR`
    #[error("receiver rejected product: {0}")]
    Rejected(String),

    /// The receiver answered something this sender does not understand
    #[error("unexpected reply '{0}'")]
    UnexpectedReply(String),

    /// Socket failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<ProductIoError> for SendError {
    fn from(error: ProductIoError) -> Self {
        match error {
            ProductIoError::Io(io) => SendError::Io(io),
            other => SendError::Encode(other),
        }
    }
}

/// Sends products to one receiver.
#[derive(Debug, Clone)]
pub struct SocketProductSender {
    config: SenderConfig,
}

impl SocketProductSender {
    pub fn new(config: SenderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SenderConfig {
        &self.config
    }

    fn addr(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    async fn connect(&self) -> Result<TcpStream, SendError> {
        let addr = self.addr();
        match tokio::time::timeout(self.config.connect_timeout, TcpStream::connect(&addr)).await {
            Err(_) => Err(SendError::ConnectTimeout { addr }),
            Ok(Err(source)) => Err(SendError::Connect { addr, source }),
            Ok(Ok(stream)) => Ok(stream),
        }
    }

    /// Send `product` over an already open connection.
    pub async fn send_over<S>(&self, stream: S, product: &Product) -> Result<SendOutcome, SendError>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin,
    {
        // a JSON document is built in full, so it can fail before anything is announced
        let document = match self.config.encoding {
            ProductEncoding::Json => Some(
                write_product(product, ProductEncoding::Json, Vec::new())
                    .await
                    .map_err(SendError::Encode)?,
            ),
            ProductEncoding::Xml => None,
        };

        let (read_half, mut writer) = tokio::io::split(stream);
        let mut reader = TimeoutReader::new(read_half, self.config.read_timeout);

        if self.config.versioned {
            writer.write_all(PROTOCOL_MARKER).await?;
            write_string(&mut writer, PROTOCOL_VERSION_0_1).await?;
            write_string(&mut writer, &product.id.to_string()).await?;
            writer.flush().await?;

            let reply = read_string(&mut reader, MAX_STATUS_FIELD).await?;
            debug!(product = %product.id, %reply, "handshake reply");
            match reply.as_str() {
                ALREADY_HAVE_PRODUCT => return Ok(SendOutcome::AlreadyHave),
                UNKNOWN_PRODUCT => {}
                _ if reply.starts_with(RECEIVE_ERROR) => return Err(SendError::Rejected(reply)),
                _ => return Err(SendError::UnexpectedReply(reply)),
            }
        }

        let written = match &document {
            Some(document) => write_document(&mut writer, document).await,
            None => self.write_payload(&mut writer, product).await,
        };
        if let Err(error) = written {
            // end the payload so the receiver stops waiting for it
            if let Err(shutdown) = writer.shutdown().await {
                debug!(product = %product.id, error = %shutdown, "shutdown failed");
            }
            let status = self.read_status(&mut reader).await;
            return match (error, status) {
                (SendError::Encode(error), _) => Err(SendError::Encode(error)),
                // a receiver that stopped reading usually says why
                (_, Ok(status)) if status.starts_with(RECEIVE_ERROR) => {
                    Err(SendError::Rejected(status))
                }
                (error, _) => Err(error),
            };
        }

        let status = self.read_status(&mut reader).await?;
        if status.starts_with(RECEIVE_ERROR) {
            return Err(SendError::Rejected(status));
        }
        if status == ALREADY_HAVE_PRODUCT {
            return Ok(SendOutcome::AlreadyHave);
        }
        info!(product = %product.id, %status, "sent product");
        Ok(SendOutcome::Sent { status })
    }

    /// Stream the XML encoding of `product`, then half-close.
    async fn write_payload<W>(&self, writer: &mut W, product: &Product) -> Result<(), SendError>
    where
        W: AsyncWrite + Send + Unpin,
    {
        let buffered = BufWriter::new(&mut *writer);
        let mut buffered = write_product(product, ProductEncoding::Xml, buffered).await?;
        buffered.flush().await?;
        drop(buffered);
        writer.shutdown().await?;
        Ok(())
    }

    async fn read_status<R>(&self, reader: &mut R) -> Result<String, SendError>
    where
        R: AsyncRead + Send + Unpin,
    {
        if self.config.versioned {
            return Ok(read_string(reader, MAX_STATUS_FIELD).await?);
        }
        let mut raw = Vec::new();
        reader
            .take(u64::from(MAX_STATUS_FIELD))
            .read_to_end(&mut raw)
            .await?;
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }
}

async fn write_document<W>(writer: &mut W, document: &[u8]) -> Result<(), SendError>
where
    W: AsyncWrite + Send + Unpin,
{
    writer.write_all(document).await?;
    writer.shutdown().await?;
    Ok(())
}

#[async_trait::async_trait]
impl ProductSender for SocketProductSender {
    async fn send_product(&self, product: &Product) -> Result<SendOutcome, SendError> {
        let stream = self.connect().await?;
        debug!(addr = %self.addr(), product = %product.id, "connected");
        self.send_over(stream, product).await
    }
}
