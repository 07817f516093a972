//! # Frame Assembler
//!
//! Re-frames the inbound byte stream. Bytes before a header are discarded;
//! once a header and length byte are in, the assembler waits for the
//! remaining `length - 1` bytes and hands out the complete frame.
//!
//! A header whose length no command can have, or a complete candidate whose
//! checksum fails, is treated as a stray `0xFF`: the assembler drops that
//! one byte and searches for the next header, so a real frame right behind
//! line noise is never held back.

use bytes::{Buf, BytesMut};
use tracing::trace;

use crate::protocol::checksum::verify;
use crate::protocol::frame::{HEADER, MAX_COMMAND_FRAME_SIZE, MAX_FRAME_SIZE, MIN_FRAME_SIZE};

/// Incremental splitter of a byte stream into candidate frames.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    buffer: BytesMut,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(MAX_FRAME_SIZE),
        }
    }

    /// Append received bytes.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Bytes held but not yet returned as a frame.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Take the next complete frame, if one is buffered.
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        loop {
            match self.buffer.iter().position(|&b| b == HEADER) {
                Some(0) => {}
                Some(skip) => {
                    trace!("Discarding {} bytes before header", skip);
                    self.buffer.advance(skip);
                }
                None => {
                    self.buffer.clear();
                    return None;
                }
            }

            let declared = usize::from(*self.buffer.get(1)?);
            let total = declared + 1;
            if !(MIN_FRAME_SIZE..=MAX_COMMAND_FRAME_SIZE).contains(&total) {
                // cannot be a command frame, resync on the next header
                self.buffer.advance(1);
                continue;
            }

            if self.buffer.len() < total {
                return None;
            }

            if !verify(&self.buffer[..total]) {
                trace!("Checksum failed on {} byte candidate, resyncing", total);
                self.buffer.advance(1);
                continue;
            }
            return Some(self.buffer.split_to(total).to_vec());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STOP: [u8; 4] = [0xFF, 0x03, 0x78, 0x84];
    const CPM: [u8; 5] = [0xFF, 0x04, 0x70, 0x00, 0x8B];

    #[test]
    fn test_single_frame() {
        let mut asm = FrameAssembler::new();
        asm.extend(&STOP);
        assert_eq!(asm.next_frame(), Some(STOP.to_vec()));
        assert_eq!(asm.next_frame(), None);
        assert_eq!(asm.pending(), 0);
    }

    #[test]
    fn test_frame_split_across_reads() {
        let mut asm = FrameAssembler::new();
        asm.extend(&CPM[..2]);
        assert_eq!(asm.next_frame(), None);
        asm.extend(&CPM[2..]);
        assert_eq!(asm.next_frame(), Some(CPM.to_vec()));
    }

    #[test]
    fn test_back_to_back_frames() {
        let mut asm = FrameAssembler::new();
        let mut stream = CPM.to_vec();
        stream.extend_from_slice(&STOP);
        asm.extend(&stream);
        assert_eq!(asm.next_frame(), Some(CPM.to_vec()));
        assert_eq!(asm.next_frame(), Some(STOP.to_vec()));
    }

    #[test]
    fn test_leading_garbage_discarded() {
        let mut asm = FrameAssembler::new();
        asm.extend(&[0x00, 0x12, 0x34]);
        assert_eq!(asm.next_frame(), None);
        assert_eq!(asm.pending(), 0);

        asm.extend(&[0x55]);
        asm.extend(&STOP);
        assert_eq!(asm.next_frame(), Some(STOP.to_vec()));
    }

    #[test]
    fn test_stray_header_before_stop() {
        let mut asm = FrameAssembler::new();
        asm.extend(&[0xFF, 0xFF, 0x03, 0x78, 0x84]);
        assert_eq!(asm.next_frame(), Some(STOP.to_vec()));
        assert_eq!(asm.pending(), 0);
    }

    #[test]
    fn test_oversized_length_resyncs() {
        let mut asm = FrameAssembler::new();
        asm.extend(&[0xFF, 0x20, 0x00]);
        asm.extend(&CPM);
        assert_eq!(asm.next_frame(), Some(CPM.to_vec()));
    }

    #[test]
    fn test_bad_checksum_candidate_resyncs() {
        let mut asm = FrameAssembler::new();
        // declares a plausible length but the checksum is wrong
        asm.extend(&[0xFF, 0x03, 0x78, 0x00]);
        asm.extend(&STOP);
        assert_eq!(asm.next_frame(), Some(STOP.to_vec()));
        assert_eq!(asm.next_frame(), None);
    }

    #[test]
    fn test_largest_command_frame_passes() {
        let limits = [0xFF, 0x08, 0x6C, 0x14, 0x14, 0x14, 0x14, 0x14, 0x27];
        let mut asm = FrameAssembler::new();
        asm.extend(&limits);
        assert_eq!(asm.next_frame(), Some(limits.to_vec()));
    }

    #[test]
    fn test_impossible_length_resyncs() {
        let mut asm = FrameAssembler::new();
        asm.extend(&[0xFF, 0x01]);
        asm.extend(&STOP);
        assert_eq!(asm.next_frame(), Some(STOP.to_vec()));
    }
}
