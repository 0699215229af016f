//! Command/response frame codec.
//!
//! One logical frame is a header word followed by `len / 4` payload words,
//! all pushed through the same data register. The header packs the command
//! code into the low half-word and the payload length in bytes into the high
//! half-word, so the length is always a multiple of the FIFO word size by
//! construction.

use thiserror::Error;

/// FIFO word size in bytes.
pub const WORD_SIZE: usize = 4;

/// Largest payload representable by the 16-bit length field, in words.
pub const MAX_PAYLOAD_WORDS: usize = (u16::MAX as usize) / WORD_SIZE;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("payload of {words} words does not fit the 16-bit length field")]
    PayloadTooLong { words: usize },
}

/// Command codes understood on the wire.
///
/// Unknown codes are preserved rather than rejected: the dispatch path counts
/// and drops them, and a test peer can emit them freely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandCode {
    /// Read one sector into a physical destination address.
    ReadSector,
    /// Unsolicited notification: total medium size in sectors.
    ReportSize,
    Other(u16),
}

impl CommandCode {
    pub fn raw(self) -> u16 {
        match self {
            CommandCode::ReadSector => 0x0001,
            CommandCode::ReportSize => 0x0002,
            CommandCode::Other(code) => code,
        }
    }

    pub fn from_raw(code: u16) -> Self {
        match code {
            0x0001 => CommandCode::ReadSector,
            0x0002 => CommandCode::ReportSize,
            other => CommandCode::Other(other),
        }
    }
}

/// The leading word of a frame: `{code, payload length in bytes}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub code: CommandCode,
    pub len: u16,
}

impl FrameHeader {
    pub fn pack(self) -> u32 {
        u32::from(self.code.raw()) | (u32::from(self.len) << 16)
    }

    pub fn unpack(word: u32) -> Self {
        Self {
            code: CommandCode::from_raw((word & 0xFFFF) as u16),
            len: (word >> 16) as u16,
        }
    }

    /// Number of payload words following the header.
    ///
    /// The length field counts bytes; hardware only moves whole words, so a
    /// length that is not a multiple of four is rounded down when draining.
    pub fn payload_words(self) -> usize {
        usize::from(self.len) / WORD_SIZE
    }
}

/// One complete command or response frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    header: FrameHeader,
    payload: Vec<u32>,
}

impl Frame {
    pub fn new(code: CommandCode, payload: Vec<u32>) -> Result<Self, FrameError> {
        if payload.len() > MAX_PAYLOAD_WORDS {
            return Err(FrameError::PayloadTooLong {
                words: payload.len(),
            });
        }
        let len = (payload.len() * WORD_SIZE) as u16;
        Ok(Self {
            header: FrameHeader { code, len },
            payload,
        })
    }

    /// A frame with no payload words.
    pub fn empty(code: CommandCode) -> Self {
        Self {
            header: FrameHeader { code, len: 0 },
            payload: Vec::new(),
        }
    }

    pub(crate) fn from_parts(header: FrameHeader, payload: Vec<u32>) -> Self {
        debug_assert_eq!(payload.len(), header.payload_words());
        Self { header, payload }
    }

    /// Request to read one sector into `dest_paddr`.
    pub fn read_sector(sector: u32, dest_paddr: u32) -> Self {
        Self {
            header: FrameHeader {
                code: CommandCode::ReadSector,
                len: (2 * WORD_SIZE) as u16,
            },
            payload: vec![sector, dest_paddr],
        }
    }

    /// Unsolicited size report, as the peer would send it.
    pub fn report_size(sectors: u32) -> Self {
        Self {
            header: FrameHeader {
                code: CommandCode::ReportSize,
                len: WORD_SIZE as u16,
            },
            payload: vec![sectors],
        }
    }

    pub fn code(&self) -> CommandCode {
        self.header.code
    }

    pub fn header(&self) -> FrameHeader {
        self.header
    }

    pub fn payload(&self) -> &[u32] {
        &self.payload
    }

    /// Sector count carried by a [`CommandCode::ReportSize`] frame.
    pub fn report_size_sectors(&self) -> Option<u32> {
        if self.header.code != CommandCode::ReportSize {
            return None;
        }
        self.payload.first().copied()
    }

    /// `(sector, dest_paddr)` carried by a [`CommandCode::ReadSector`] frame.
    pub fn read_sector_args(&self) -> Option<(u32, u32)> {
        if self.header.code != CommandCode::ReadSector {
            return None;
        }
        match self.payload.as_slice() {
            [sector, paddr, ..] => Some((*sector, *paddr)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_packs_code_low_and_length_high() {
        let header = FrameHeader {
            code: CommandCode::ReadSector,
            len: 8,
        };
        assert_eq!(header.pack(), 0x0008_0001);
        assert_eq!(FrameHeader::unpack(0x0008_0001), header);
    }

    #[test]
    fn zero_length_frame_has_no_payload_words() {
        let frame = Frame::empty(CommandCode::ReadSector);
        assert_eq!(frame.header().len, 0);
        assert_eq!(frame.header().payload_words(), 0);
        assert!(frame.payload().is_empty());
    }

    #[test]
    fn read_sector_frame_carries_sector_and_destination() {
        let frame = Frame::read_sector(0x1122_3344, 0xAABB_CCDD);
        assert_eq!(frame.header().len, 8);
        assert_eq!(frame.read_sector_args(), Some((0x1122_3344, 0xAABB_CCDD)));
    }

    #[test]
    fn unknown_codes_round_trip_through_the_header() {
        let header = FrameHeader::unpack(0x0000_BEEF);
        assert_eq!(header.code, CommandCode::Other(0xBEEF));
        assert_eq!(header.code.raw(), 0xBEEF);
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let err = Frame::new(CommandCode::Other(9), vec![0; MAX_PAYLOAD_WORDS + 1]).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLong { .. }));
    }

    #[test]
    fn report_size_parse_rejects_other_codes() {
        let frame = Frame::read_sector(1, 2);
        assert_eq!(frame.report_size_sectors(), None);
        assert_eq!(Frame::report_size(42).report_size_sectors(), Some(42));
    }
}
