use std::sync::Arc;

use pxi_blk::{BlkError, BlockRequest, Direction, PxiDisk, Segment, FALLBACK_CAPACITY_SECTORS};
use pxi_channel::sim::{PeerMode, SimPeer};
use pxi_channel::{Channel, ChannelConfig, ChannelError, CommandCode, IrqBridge, WaitPolicy};

fn setup(mode: PeerMode) -> (SimPeer, Arc<Channel>, PxiDisk) {
    let peer = SimPeer::new(mode);
    let channel = Arc::new(
        Channel::attach(
            Box::new(peer.clone()),
            ChannelConfig {
                wait: WaitPolicy::bounded(64),
                ..ChannelConfig::default()
            },
        )
        .expect("attach"),
    );
    let disk = PxiDisk::new(channel.clone());
    (peer, channel, disk)
}

/// Extract `(sector, dest_paddr)` pairs from everything the peer received.
fn read_commands(peer: &SimPeer) -> Vec<(u32, u32)> {
    peer.commands()
        .iter()
        .map(|frame| frame.read_sector_args().expect("read-sector frame"))
        .collect()
}

#[test]
fn three_sector_read_issues_one_command_per_sector() {
    let (peer, _channel, disk) = setup(PeerMode::Echo);
    let segments = [Segment {
        paddr: 0x2000_0000,
        len: 1536,
    }];

    let bytes = disk
        .transfer(&BlockRequest {
            direction: Direction::Read,
            start_sector: 100,
            sector_count: 3,
            segments: &segments,
        })
        .expect("transfer");

    assert_eq!(bytes, 1536);
    assert_eq!(
        read_commands(&peer),
        vec![
            (100, 0x2000_0000),
            (101, 0x2000_0200),
            (102, 0x2000_0400),
        ]
    );
}

#[test]
fn multi_segment_read_advances_sector_and_address_per_segment() {
    let (peer, _channel, disk) = setup(PeerMode::Echo);
    let segments = [
        Segment {
            paddr: 0x2000_0000,
            len: 1024,
        },
        Segment {
            paddr: 0x3000_0000,
            len: 512,
        },
    ];

    let bytes = disk
        .transfer(&BlockRequest {
            direction: Direction::Read,
            start_sector: 7,
            sector_count: 3,
            segments: &segments,
        })
        .expect("transfer");

    assert_eq!(bytes, 3 * 512);
    assert_eq!(
        read_commands(&peer),
        vec![(7, 0x2000_0000), (8, 0x2000_0200), (9, 0x3000_0000)]
    );
}

#[test]
fn trailing_partial_sector_bytes_are_ignored() {
    let (peer, _channel, disk) = setup(PeerMode::Echo);
    let segments = [Segment {
        paddr: 0x2000_0000,
        len: 1600, // 3 sectors + 64 stray bytes
    }];

    let bytes = disk
        .transfer(&BlockRequest {
            direction: Direction::Read,
            start_sector: 0,
            sector_count: 3,
            segments: &segments,
        })
        .expect("transfer");

    assert_eq!(bytes, 1536);
    assert_eq!(read_commands(&peer).len(), 3);
}

#[test]
fn segment_shortfall_is_an_io_failure_after_the_issued_commands() {
    let (peer, _channel, disk) = setup(PeerMode::Echo);
    let segments = [Segment {
        paddr: 0x2000_0000,
        len: 1536,
    }];

    let err = disk
        .transfer(&BlockRequest {
            direction: Direction::Read,
            start_sector: 0,
            sector_count: 4,
            segments: &segments,
        })
        .unwrap_err();

    assert_eq!(
        err,
        BlkError::SegmentMismatch {
            consumed: 3,
            declared: 4
        }
    );
    // The three sectors that did fit were issued; no further commands follow.
    assert_eq!(read_commands(&peer).len(), 3);
}

#[test]
fn write_requests_are_refused_without_touching_the_wire() {
    let (peer, _channel, disk) = setup(PeerMode::Echo);
    let segments = [Segment {
        paddr: 0x2000_0000,
        len: 512,
    }];

    let err = disk
        .transfer(&BlockRequest {
            direction: Direction::Write,
            start_sector: 0,
            sector_count: 1,
            segments: &segments,
        })
        .unwrap_err();

    assert_eq!(err, BlkError::WriteUnsupported);
    assert!(peer.commands().is_empty());
    assert_eq!(peer.doorbells(), 0);
}

#[test]
fn sector_beyond_the_wire_field_is_rejected_before_sending() {
    let (peer, _channel, disk) = setup(PeerMode::Echo);
    let segments = [Segment {
        paddr: 0x2000_0000,
        len: 512,
    }];

    let err = disk
        .transfer(&BlockRequest {
            direction: Direction::Read,
            start_sector: u64::from(u32::MAX) + 1,
            sector_count: 1,
            segments: &segments,
        })
        .unwrap_err();

    assert!(matches!(err, BlkError::SectorOutOfRange(_)));
    assert!(peer.commands().is_empty());
}

#[test]
fn unacknowledged_read_surfaces_the_channel_stall() {
    let (peer, _channel, disk) = setup(PeerMode::Silent);
    let segments = [Segment {
        paddr: 0x2000_0000,
        len: 1024,
    }];

    let err = disk
        .transfer(&BlockRequest {
            direction: Direction::Read,
            start_sector: 0,
            sector_count: 2,
            segments: &segments,
        })
        .unwrap_err();

    assert_eq!(
        err,
        BlkError::Channel(ChannelError::ResponseStalled(CommandCode::ReadSector))
    );
    // The stall happened on the first sector; the second was never issued.
    assert_eq!(peer.commands().len(), 1);
}

#[test]
fn capacity_tracks_the_peers_size_report() {
    let (peer, channel, disk) = setup(PeerMode::Echo);
    let bridge = IrqBridge::new(channel);

    assert_eq!(disk.capacity_sectors(), FALLBACK_CAPACITY_SECTORS);
    assert_eq!(disk.geometry().reported_sectors, None);

    peer.inject_report_size(31_586_304);
    bridge.handle();

    assert_eq!(disk.capacity_sectors(), 31_586_304);
    assert_eq!(disk.geometry().reported_sectors, Some(31_586_304));
}

#[test]
fn open_validates_the_unit_number() {
    let (_peer, _channel, disk) = setup(PeerMode::Echo);

    assert_eq!(disk.open(0), Ok(()));
    assert_eq!(disk.open(15), Ok(()));
    assert_eq!(disk.open(16), Err(BlkError::NoSuchUnit(16)));
    disk.release();

    assert_eq!(disk.sector_size(), 512);
}
