//! Trait abstraction for the outbound side of the link to enable testing

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{trace, warn};

use crate::error::{HohError, Result};

/// Destination of encoded outbound frames
#[async_trait]
pub trait FrameSink: Send {
    /// Transmit one complete frame
    async fn send_frame(&mut self, frame: &[u8]) -> Result<()>;
}

/// Transmit a batch of frames in order.
///
/// A failed frame is logged and skipped; the rest of the batch is still
/// attempted so one bad write never stalls the control loop.
///
/// # Returns
///
/// * `usize` - Number of frames the sink accepted
pub async fn send_frames(sink: &mut dyn FrameSink, frames: Vec<Vec<u8>>) -> usize {
    let mut sent = 0;
    for frame in frames {
        match sink.send_frame(&frame).await {
            Ok(()) => sent += 1,
            Err(e) => warn!("Failed to send frame: {}", e),
        }
    }
    sent
}

/// Writes frames to any async byte stream (the serial port's write half)
pub struct StreamSink<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin + Send> StreamSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> FrameSink for StreamSink<W> {
    async fn send_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.writer
            .write_all(frame)
            .await
            .map_err(|e| HohError::Serial(format!("Failed to write frame: {}", e)))?;

        self.writer
            .flush()
            .await
            .map_err(|e| HohError::Serial(format!("Failed to flush serial port: {}", e)))?;

        trace!("Sent frame '{}' ({} bytes)", char::from(frame.get(2).copied().unwrap_or(0)), frame.len());
        Ok(())
    }
}

/// Sink used when no link is configured; frames are counted and dropped
#[derive(Debug, Default)]
pub struct DiscardSink {
    sent: u64,
}

impl DiscardSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }
}

#[async_trait]
impl FrameSink for DiscardSink {
    async fn send_frame(&mut self, _frame: &[u8]) -> Result<()> {
        self.sent += 1;
        Ok(())
    }
}
