//! Block-request to command-channel adapter.
//!
//! Translates one block request (direction, start sector, sector count, a
//! scatter list of physical segments) into a sequence of single-sector
//! remote-read commands, each fully acknowledged before the next goes out.
//! The request is borrowed for the duration of the call and never retained.

use std::sync::Arc;

use pxi_channel::{Channel, ChannelError, Frame};
use thiserror::Error;

use crate::geometry::{DiskGeometry, SECTOR_SIZE};

/// Upper bound on the unit (minor) numbers [`PxiDisk::open`] accepts.
pub const UNIT_COUNT: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

/// One contiguous physical buffer of a block request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    /// Physical destination address the peer DMAs into.
    pub paddr: u32,
    /// Segment length in bytes. Only whole sectors are transferred; a
    /// trailing partial sector is ignored.
    pub len: u32,
}

/// A borrowed block-layer request.
#[derive(Debug, Clone, Copy)]
pub struct BlockRequest<'a> {
    pub direction: Direction,
    pub start_sector: u64,
    /// Declared total, checked against what the segment list actually covers.
    pub sector_count: u32,
    pub segments: &'a [Segment],
}

/// Per-request failure status reported up to the block layer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BlkError {
    #[error("no such unit {0}")]
    NoSuchUnit(u32),

    /// Write support does not exist on the peer side. Refusing the request
    /// outright is deliberate: pretending success would lose data silently.
    #[error("write support is not implemented")]
    WriteUnsupported,

    /// The segment list does not cover the declared sector count.
    #[error("segments cover {consumed} sectors, request declared {declared}")]
    SegmentMismatch { consumed: u32, declared: u32 },

    /// A sector index or destination address overflowed the 32-bit wire
    /// fields.
    #[error("sector {0} does not fit the command's 32-bit sector field")]
    SectorOutOfRange(u64),

    #[error("segment address overflow")]
    AddressOverflow,

    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// Block-device surface over an attached command channel.
///
/// Holds a handle to the channel; every unit in the platform's unit range
/// maps to the same medium.
#[derive(Debug, Clone)]
pub struct PxiDisk {
    channel: Arc<Channel>,
}

impl PxiDisk {
    pub fn new(channel: Arc<Channel>) -> Self {
        Self { channel }
    }

    /// Open lifecycle hook. Validates the unit number only.
    pub fn open(&self, unit: u32) -> Result<(), BlkError> {
        if unit >= UNIT_COUNT {
            return Err(BlkError::NoSuchUnit(unit));
        }
        Ok(())
    }

    /// Release lifecycle hook. Nothing to tear down per-opener.
    pub fn release(&self) {}

    pub fn sector_size(&self) -> u32 {
        SECTOR_SIZE
    }

    pub fn geometry(&self) -> DiskGeometry {
        DiskGeometry {
            reported_sectors: self.channel.capacity_sectors(),
        }
    }

    /// Capacity in sectors: the peer-reported value, or the compiled-in
    /// fallback while no size report has arrived.
    pub fn capacity_sectors(&self) -> u64 {
        self.geometry().capacity_sectors()
    }

    /// Dispatch one block request. Returns the bytes actually transferred.
    ///
    /// Sectors are issued strictly in ascending order, one command per
    /// sector, each acknowledged before the next; there is no pipelining and
    /// no partial retry. After all segments are walked, the consumed total
    /// must equal the declared `sector_count` or the request fails with an
    /// I/O-kind status.
    pub fn transfer(&self, req: &BlockRequest<'_>) -> Result<u64, BlkError> {
        match req.direction {
            Direction::Read => self.read_request(req),
            Direction::Write => {
                tracing::warn!(
                    start_sector = req.start_sector,
                    sectors = req.sector_count,
                    "rejecting write request; write support is not implemented"
                );
                Err(BlkError::WriteUnsupported)
            }
        }
    }

    fn read_request(&self, req: &BlockRequest<'_>) -> Result<u64, BlkError> {
        let mut consumed: u32 = 0;
        let mut bytes: u64 = 0;

        for segment in req.segments {
            let sectors = segment.len / SECTOR_SIZE;
            for k in 0..sectors {
                let sector64 = req.start_sector + u64::from(consumed);
                let sector =
                    u32::try_from(sector64).map_err(|_| BlkError::SectorOutOfRange(sector64))?;
                let dest = segment
                    .paddr
                    .checked_add(k * SECTOR_SIZE)
                    .ok_or(BlkError::AddressOverflow)?;

                self.channel
                    .send(&Frame::read_sector(sector, dest), true)?;

                consumed += 1;
                bytes += u64::from(SECTOR_SIZE);
            }
        }

        if consumed != req.sector_count {
            tracing::warn!(
                consumed,
                declared = req.sector_count,
                "segment list does not match the request's sector count"
            );
            return Err(BlkError::SegmentMismatch {
                consumed,
                declared: req.sector_count,
            });
        }
        Ok(bytes)
    }
}
