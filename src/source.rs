//! Byte source trait for the link driver.

use crate::error::Result;

/// Abstraction over the raw byte link to the vehicle interface board.
///
/// Sources cover live serial devices, replay files and test fixtures, and
/// handle their own timing internally. Reads return whatever bytes are
/// available, with no framing assumptions; the driver's frame decoder
/// handles arbitrary chunk boundaries.
#[async_trait::async_trait]
pub trait ByteSource: Send + 'static {
    /// Read the next chunk of raw bytes.
    ///
    /// Returns:
    /// - `Ok(Some(bytes))` - a nonempty chunk arrived
    /// - `Ok(None)` - the link closed (normal termination)
    /// - `Err(e)` - transient or fatal read failure
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>>;

    /// Write raw bytes back to the link, e.g. a resync request.
    async fn send(&mut self, bytes: &[u8]) -> Result<()>;
}

/// Replays canned chunks, for tests and offline decoding.
pub struct ChunkSource {
    chunks: std::collections::VecDeque<Vec<u8>>,
    hold_open: bool,
    sent: std::sync::Arc<std::sync::Mutex<Vec<Vec<u8>>>>,
}

impl ChunkSource {
    pub fn new(chunks: impl IntoIterator<Item = Vec<u8>>) -> Self {
        ChunkSource {
            chunks: chunks.into_iter().collect(),
            hold_open: false,
            sent: std::sync::Arc::default(),
        }
    }

    /// Pend forever instead of closing once the chunks run out, mimicking
    /// an idle live link.
    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    /// Shared view of bytes written back through the source. Stays valid
    /// after the source is handed to a driver.
    pub fn sent_log(&self) -> std::sync::Arc<std::sync::Mutex<Vec<Vec<u8>>>> {
        self.sent.clone()
    }
}

#[async_trait::async_trait]
impl ByteSource for ChunkSource {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        match self.chunks.pop_front() {
            Some(chunk) => Ok(Some(chunk)),
            None if self.hold_open => std::future::pending().await,
            None => Ok(None),
        }
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(bytes.to_vec());
        Ok(())
    }
}
