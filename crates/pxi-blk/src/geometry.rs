//! Disk geometry.
//!
//! Sector size is fixed by the protocol. Capacity is learned from the peer's
//! unsolicited size report; until one arrives we fall back to a compiled-in
//! constant, kept deliberately separate from the channel's "unknown until
//! reported" state so callers can tell the two apart.

/// Fixed sector size of the remote medium, in bytes.
pub const SECTOR_SIZE: u32 = 512;

/// Capacity assumed before the peer's first size report (a 16 GB card).
pub const FALLBACK_CAPACITY_SECTORS: u64 = 31_586_304;

/// Reported or assumed geometry of the remote medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskGeometry {
    /// Peer-reported capacity, if a size report has arrived.
    pub reported_sectors: Option<u64>,
}

impl DiskGeometry {
    /// Capacity in sectors, falling back to
    /// [`FALLBACK_CAPACITY_SECTORS`] when nothing has been reported yet.
    pub fn capacity_sectors(&self) -> u64 {
        self.reported_sectors.unwrap_or(FALLBACK_CAPACITY_SECTORS)
    }

    pub fn capacity_bytes(&self) -> u64 {
        self.capacity_sectors() * u64::from(SECTOR_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreported_geometry_falls_back_to_the_constant() {
        let geo = DiskGeometry {
            reported_sectors: None,
        };
        assert_eq!(geo.capacity_sectors(), FALLBACK_CAPACITY_SECTORS);
    }

    #[test]
    fn reported_geometry_wins_over_the_fallback() {
        let geo = DiskGeometry {
            reported_sectors: Some(1024),
        };
        assert_eq!(geo.capacity_sectors(), 1024);
        assert_eq!(geo.capacity_bytes(), 1024 * 512);
    }
}
