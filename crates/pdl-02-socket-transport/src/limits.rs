//! # Read Limits
//!
//! Reader wrappers enforcing the receiver's size limit and read timeout.
//! Both fail with an `io::Error`, so limits surface through any decoder
//! reading from them and can be recognized afterwards.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use std::time::Duration;

use pin_project_lite::pin_project;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::time::{Instant, Sleep};

/// Carried inside the `io::Error` of a reader that went over its limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("product exceeds size limit of {limit} bytes")]
pub struct SizeLimitExceeded {
    pub limit: u64,
}

pin_project! {
    /// Fails once more than `limit` bytes have been read.
    pub struct SizeLimitReader<R> {
        #[pin]
        inner: R,
        limit: Option<u64>,
        consumed: u64,
    }
}

impl<R> SizeLimitReader<R> {
    /// `None` disables the limit.
    pub fn new(inner: R, limit: Option<u64>) -> Self {
        Self {
            inner,
            limit,
            consumed: 0,
        }
    }

    /// Bytes read so far.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }
}

impl<R: AsyncRead> AsyncRead for SizeLimitReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.project();
        if let Some(limit) = *this.limit {
            if *this.consumed > limit {
                return Poll::Ready(Err(size_limit_error(limit)));
            }
        }
        let before = buf.filled().len();
        ready!(this.inner.poll_read(cx, buf))?;
        *this.consumed += (buf.filled().len() - before) as u64;
        match *this.limit {
            Some(limit) if *this.consumed > limit => {
                // an erroring read must leave the buffer as it found it
                buf.set_filled(before);
                Poll::Ready(Err(size_limit_error(limit)))
            }
            _ => Poll::Ready(Ok(())),
        }
    }
}

fn size_limit_error(limit: u64) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, SizeLimitExceeded { limit })
}

pin_project! {
    /// Fails a read that waits longer than `timeout` for data.
    pub struct TimeoutReader<R> {
        #[pin]
        inner: R,
        timeout: Option<Duration>,
        deadline: Option<Pin<Box<Sleep>>>,
    }
}

impl<R> TimeoutReader<R> {
    /// `None` disables the timeout.
    pub fn new(inner: R, timeout: Option<Duration>) -> Self {
        Self {
            inner,
            timeout,
            deadline: None,
        }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: AsyncRead> AsyncRead for TimeoutReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.project();
        if let Poll::Ready(result) = this.inner.poll_read(cx, buf) {
            *this.deadline = None;
            return Poll::Ready(result);
        }
        let Some(timeout) = *this.timeout else {
            return Poll::Pending;
        };
        let deadline = this
            .deadline
            .get_or_insert_with(|| Box::pin(tokio::time::sleep_until(Instant::now() + timeout)));
        ready!(deadline.as_mut().poll(cx));
        *this.deadline = None;
        Poll::Ready(Err(io::Error::new(
            io::ErrorKind::TimedOut,
            "read timed out",
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_size_limit() {
        let mut exact = SizeLimitReader::new(&b"12345"[..], Some(5));
        let mut out = Vec::new();
        exact.read_to_end(&mut out).await.unwrap();
        assert_eq!(exact.consumed(), 5);

        let mut over = SizeLimitReader::new(&b"123456"[..], Some(5));
        let error = over.read_to_end(&mut Vec::new()).await.unwrap_err();
        let inner = error.get_ref().and_then(|e| e.downcast_ref::<SizeLimitExceeded>());
        assert_eq!(inner, Some(&SizeLimitExceeded { limit: 5 }));

        let mut unlimited = SizeLimitReader::new(&b"123456"[..], None);
        unlimited.read_to_end(&mut Vec::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_size_limit_error_fills_nothing() {
        let mut over = SizeLimitReader::new(&b"0123456789"[..], Some(4));
        let mut buf = [0u8; 16];
        let mut read_buf = ReadBuf::new(&mut buf);
        let result = std::future::poll_fn(|cx| Pin::new(&mut over).poll_read(cx, &mut read_buf)).await;
        assert!(result.is_err());
        assert!(read_buf.filled().is_empty());

        // later reads keep failing without touching the buffer
        let mut again = [0u8; 4];
        assert!(over.read(&mut again).await.is_err());
    }

    #[tokio::test]
    async fn test_timeout_fires_on_silence() {
        let (_client, server) = tokio::io::duplex(64);
        let mut reader = TimeoutReader::new(server, Some(Duration::from_millis(20)));
        let error = reader.read_u8().await.unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::TimedOut);
    }

    #[tokio::test]
    async fn test_timeout_resets_after_data() {
        let (mut client, server) = tokio::io::duplex(64);
        let mut reader = TimeoutReader::new(server, Some(Duration::from_millis(200)));
        let writer = tokio::spawn(async move {
            for byte in 0..3u8 {
                tokio::time::sleep(Duration::from_millis(100)).await;
                client.write_u8(byte).await.unwrap();
            }
            client
        });
        for expected in 0..3u8 {
            assert_eq!(reader.read_u8().await.unwrap(), expected);
        }
        drop(writer.await.unwrap());
    }
}
