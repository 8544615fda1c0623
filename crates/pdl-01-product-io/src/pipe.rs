//! # Content Pipe
//!
//! Bounded byte handoff between the task decoding a document and the sink
//! consuming an embedded content.
//!
//! The writer pushes chunks with backpressure; the reader is an
//! [`AsyncRead`]. How the writer went away decides what the reader sees
//! once buffered chunks are drained:
//!
//! | Writer | Reader observes |
//! |--------|-----------------|
//! | `finish()` | EOF |
//! | `abort(reason)` | error carrying `reason` |
//! | dropped | `UnexpectedEof` |

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::mpsc;

/// Chunks buffered between writer and reader.
pub const CONTENT_PIPE_CAPACITY: usize = 16;

#[derive(Debug, Default)]
struct PipeState {
    finished: bool,
    aborted: Option<String>,
}

/// The reader was dropped; further writes are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipeClosed;

/// Create a pipe buffering at most `capacity` chunks.
pub fn content_pipe(capacity: usize) -> (PipeWriter, PipeReader) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    let state = Arc::new(Mutex::new(PipeState::default()));
    (
        PipeWriter {
            sender,
            state: Arc::clone(&state),
        },
        PipeReader {
            receiver,
            current: Bytes::new(),
            state,
        },
    )
}

/// Producing half.
#[derive(Debug)]
pub struct PipeWriter {
    sender: mpsc::Sender<Bytes>,
    state: Arc<Mutex<PipeState>>,
}

impl PipeWriter {
    /// Push a chunk, waiting while the pipe is full.
    pub async fn write(&self, chunk: Bytes) -> Result<(), PipeClosed> {
        if chunk.is_empty() {
            return Ok(());
        }
        self.sender.send(chunk).await.map_err(|_| PipeClosed)
    }

    /// End the stream normally.
    pub fn finish(self) {
        self.state.lock().finished = true;
    }

    /// End the stream with an error.
    pub fn abort(self, reason: impl Into<String>) {
        self.state.lock().aborted = Some(reason.into());
    }
}

/// Consuming half.
#[derive(Debug)]
pub struct PipeReader {
    receiver: mpsc::Receiver<Bytes>,
    current: Bytes,
    state: Arc<Mutex<PipeState>>,
}

impl AsyncRead for PipeReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }
        loop {
            if !this.current.is_empty() {
                let n = buf.remaining().min(this.current.len());
                buf.put_slice(&this.current.split_to(n));
                return Poll::Ready(Ok(()));
            }
            match ready!(this.receiver.poll_recv(cx)) {
                Some(chunk) => this.current = chunk,
                None => {
                    let state = this.state.lock();
                    return Poll::Ready(match (&state.aborted, state.finished) {
                        (Some(reason), _) => Err(io::Error::other(reason.clone())),
                        (None, true) => Ok(()),
                        (None, false) => Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            "content ended before it was complete",
                        )),
                    });
                }
            }
        }
    }
}
