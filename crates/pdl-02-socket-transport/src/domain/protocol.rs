//! # Wire Protocol
//!
//! ## Versioned Mode
//!
//! ```text
//! sender                                  receiver
//!   "PDL" str(version) str(product id)  ->
//!                                       <-  str(ALREADY_HAVE_PRODUCT)   (done)
//!                                       <-  str(UNKNOWN_PRODUCT)
//!   product document, then half-close   ->
//!                                       <-  str(status)
//! ```
//!
//! `str(x)` is a 4-byte big-endian length followed by UTF-8 bytes.
//!
//! ## Legacy Mode
//!
//! No marker and no handshake: the sender writes the document and the
//! receiver answers with the raw status bytes.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::domain::errors::TransportError;

/// Leading bytes of a versioned connection.
pub const PROTOCOL_MARKER: &[u8; 3] = b"PDL";

/// The only supported protocol version.
pub const PROTOCOL_VERSION_0_1: &str = "0.1";

/// Length cap for the version and product id strings.
pub const MAX_HANDSHAKE_FIELD: u32 = 1024;

/// Length cap for status replies read by the sender.
pub const MAX_STATUS_FIELD: u32 = 64 * 1024;

/// Handshake reply: the receiver already has the product.
pub const ALREADY_HAVE_PRODUCT: &str = "ALREADY_HAVE_PRODUCT";

/// Handshake reply: the receiver wants the product.
pub const UNKNOWN_PRODUCT: &str = "UNKNOWN_PRODUCT";

/// Prefix of an error reply.
pub const RECEIVE_ERROR: &str = "RECEIVE_ERROR";

/// Prefix of a success status.
pub const STORED: &str = "STORED";

/// Error reply for `message`.
pub fn receive_error(message: &str) -> String {
    format!("{RECEIVE_ERROR} '{message}'")
}

/// Success status for a stored product.
pub fn stored_status(id: &impl std::fmt::Display) -> String {
    format!("{STORED} '{id}'")
}

/// Read a length-prefixed string of at most `max` bytes.
///
/// The length is checked before anything is allocated.
pub async fn read_string<R>(reader: &mut R, max: u32) -> Result<String, TransportError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let length = reader.read_u32().await?;
    if length > max {
        return Err(TransportError::FieldTooLong {
            max,
            actual: length,
        });
    }
    let mut bytes = vec![0u8; length as usize];
    reader.read_exact(&mut bytes).await?;
    String::from_utf8(bytes).map_err(|_| TransportError::InvalidUtf8)
}

/// Write a length-prefixed string.
pub async fn write_string<W>(writer: &mut W, value: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let length = u32::try_from(value.len()).map_err(|_| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "string too long to frame")
    })?;
    writer.write_u32(length).await?;
    writer.write_all(value.as_bytes()).await
}
