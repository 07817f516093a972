//! # Serial Communication Module
//!
//! Byte-stream link to the companion application.
//!
//! This module handles:
//! - Opening the serial port (8N1, no flow control)
//! - Re-framing the inbound byte stream into candidate frames
//! - Forwarding inbound frames to the control loop over a channel
//! - Writing outbound frames whole

pub mod assembler;
pub mod sink;

pub use assembler::FrameAssembler;
pub use sink::{send_frames, DiscardSink, FrameSink, StreamSink};

use tokio::io::{AsyncRead, AsyncReadExt, ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, info, warn};

use crate::error::{HohError, Result};

/// Serial link handler
pub struct SerialLink {
    /// Serial port handle
    port: SerialStream,
    /// Device path (e.g., /dev/ttyUSB0)
    device_path: String,
}

impl std::fmt::Debug for SerialLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLink")
            .field("device_path", &self.device_path)
            .finish_non_exhaustive()
    }
}

impl SerialLink {
    /// Open the link on the first path that works
    ///
    /// # Arguments
    ///
    /// * `paths` - Device paths to try, in order
    /// * `baud_rate` - Line speed
    ///
    /// # Returns
    ///
    /// * `Result<SerialLink>` - Connected serial port or error
    ///
    /// # Errors
    ///
    /// Returns [`HohError::SerialPortNotFound`] if none of the paths can be opened
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use hoh_control::serial::SerialLink;
    ///
    /// # #[tokio::main]
    /// # async fn main() -> anyhow::Result<()> {
    /// let link = SerialLink::open_with_paths(&["/dev/ttyUSB0"], 115200)?;
    /// println!("Connected to {}", link.device_path());
    /// # Ok(())
    /// # }
    /// ```
    pub fn open_with_paths(paths: &[&str], baud_rate: u32) -> Result<Self> {
        for path in paths {
            debug!("Trying to open serial port: {}", path);

            match open_port(path, baud_rate) {
                Ok(port) => {
                    info!("Opened serial link at {} ({} baud)", path, baud_rate);
                    return Ok(Self {
                        port,
                        device_path: path.to_string(),
                    });
                }
                Err(e) => warn!("Failed to open {}: {}", path, e),
            }
        }

        Err(HohError::SerialPortNotFound(paths.join(", ")))
    }

    /// Get the device path of the opened serial port
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Split into a reader for [`read_frames`] and a frame sink.
    pub fn into_split(self) -> (ReadHalf<SerialStream>, StreamSink<WriteHalf<SerialStream>>) {
        let (reader, writer) = tokio::io::split(self.port);
        (reader, StreamSink::new(writer))
    }
}

/// Open a specific serial port with 8N1 settings
fn open_port(path: &str, baud_rate: u32) -> Result<SerialStream> {
    let port = tokio_serial::new(path, baud_rate)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::None)
        .open_native_async()
        .map_err(|e| HohError::Serial(format!("Failed to open {}: {}", path, e)))?;

    Ok(port)
}

/// Read the inbound stream and forward each candidate frame.
///
/// Returns when the stream ends or the receiving side is gone.
///
/// # Errors
///
/// Returns error if reading from the stream fails
pub async fn read_frames<R>(mut reader: R, frames: mpsc::Sender<Vec<u8>>) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut assembler = FrameAssembler::new();
    let mut buf = [0u8; 256];

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            info!("Serial link closed");
            return Ok(());
        }

        assembler.extend(&buf[..n]);
        while let Some(frame) = assembler.next_frame() {
            if frames.send(frame).await.is_err() {
                debug!("Frame receiver dropped, stopping reader");
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_with_invalid_paths_returns_error() {
        let invalid_paths = &["/dev/nonexistent0", "/dev/nonexistent1"];
        let result = SerialLink::open_with_paths(invalid_paths, 115200);

        match result {
            Err(HohError::SerialPortNotFound(msg)) => {
                assert!(msg.contains("/dev/nonexistent0"));
                assert!(msg.contains("/dev/nonexistent1"));
            }
            other => panic!("Expected SerialPortNotFound error, got: {:?}", other),
        }
    }

    #[test]
    fn test_open_with_empty_paths_returns_error() {
        let empty_paths: &[&str] = &[];
        assert!(matches!(
            SerialLink::open_with_paths(empty_paths, 115200),
            Err(HohError::SerialPortNotFound(_))
        ));
    }

    #[test]
    fn test_open_port_with_invalid_path_returns_error() {
        match open_port("/dev/nonexistent_serial_device_12345", 115200) {
            Err(HohError::Serial(msg)) => {
                assert!(msg.contains("/dev/nonexistent_serial_device_12345"));
                assert!(msg.contains("Failed to open"));
            }
            other => panic!("Expected Serial error, got: {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_read_frames_forwards_split_frames() {
        let reader = tokio_test::io::Builder::new()
            .read(&[0x00, 0xFF, 0x03])
            .read(&[0x78, 0x84, 0xFF, 0x04, 0x70])
            .read(&[0x00, 0x8B])
            .build();
        let (tx, mut rx) = mpsc::channel(8);

        read_frames(reader, tx).await.unwrap();

        assert_eq!(rx.recv().await, Some(vec![0xFF, 0x03, 0x78, 0x84]));
        assert_eq!(rx.recv().await, Some(vec![0xFF, 0x04, 0x70, 0x00, 0x8B]));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_read_frames_stops_when_receiver_dropped() {
        let reader = tokio_test::io::Builder::new()
            .read(&[0xFF, 0x03, 0x78, 0x84])
            .build();
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        assert!(read_frames(reader, tx).await.is_ok());
    }

    #[tokio::test]
    async fn test_read_error_is_reported() {
        let reader = tokio_test::io::Builder::new()
            .read_error(std::io::Error::new(std::io::ErrorKind::Other, "unplugged"))
            .build();
        let (tx, _rx) = mpsc::channel(1);

        assert!(matches!(read_frames(reader, tx).await, Err(HohError::Io(_))));
    }

    #[test]
    #[ignore] // Run with: cargo test -- --ignored
    fn test_open_with_real_hardware() {
        match SerialLink::open_with_paths(&["/dev/ttyUSB0", "/dev/ttyACM0"], 115200) {
            Ok(link) => println!("Opened serial link at: {}", link.device_path()),
            Err(_) => println!("No serial hardware detected (this is OK for CI/CD)"),
        }
    }
}
