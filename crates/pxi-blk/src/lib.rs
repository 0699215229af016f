//! Remote block device over the inter-processor command channel.
//!
//! The co-processor owns the storage peripheral; this crate turns block
//! requests into sequences of single-sector read commands on a
//! `pxi-channel` [`pxi_channel::Channel`] and reports a single status back
//! per request.

#![forbid(unsafe_code)]

pub mod adapter;
pub mod geometry;

pub use adapter::{BlkError, BlockRequest, Direction, PxiDisk, Segment, UNIT_COUNT};
pub use geometry::{DiskGeometry, FALLBACK_CAPACITY_SECTORS, SECTOR_SIZE};
