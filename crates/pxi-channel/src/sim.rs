//! Simulated peer processor for tests.
//!
//! [`SimPeer`] implements [`RegisterWindow`] over a pair of in-memory FIFOs
//! and a scripted co-processor behind them. Clone the handle before boxing it
//! into a channel so the test can keep inspecting the peer afterwards:
//!
//! ```
//! use pxi_channel::sim::{PeerMode, SimPeer};
//! use pxi_channel::{Channel, ChannelConfig};
//!
//! let peer = SimPeer::new(PeerMode::Echo);
//! let channel = Channel::attach(Box::new(peer.clone()), ChannelConfig::default()).unwrap();
//! # let _ = (channel, peer.doorbells());
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::frame::{Frame, FrameHeader};
use crate::regs::{
    CntFlags, RegisterWindow, SyncFlags, FIFO_DEPTH, REG_CNT, REG_RECV, REG_SEND, REG_SYNC,
};

/// How the scripted peer services the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerMode {
    /// Drain and decode every frame, acknowledging each with a zero-length
    /// echo of its command code (the hardware protocol's acknowledgement).
    Echo,
    /// Drain and decode frames but never send anything back.
    Silent,
    /// Do not service the link at all: the send FIFO fills up and stays full.
    Wedged,
}

#[derive(Debug)]
struct Inner {
    mode: PeerMode,
    /// Driver-to-peer FIFO (the driver's send direction).
    send: VecDeque<u32>,
    /// Peer-to-driver FIFO (the driver's receive direction).
    recv: VecDeque<u32>,
    /// Enable bits latched by the last CNT write.
    cnt_enables: CntFlags,
    /// SYNC latch, minus the self-clearing trigger bit.
    sync: SyncFlags,
    doorbells: u64,
    /// Fully decoded frames the peer has received, in arrival order.
    commands: Vec<Frame>,
    /// Frame currently being reassembled from the word stream.
    partial: Option<(FrameHeader, Vec<u32>)>,
}

impl Inner {
    fn status(&self) -> CntFlags {
        let mut flags = self.cnt_enables;
        if self.send.is_empty() {
            flags |= CntFlags::SEND_FIFO_EMPTY;
        }
        if self.send.len() >= FIFO_DEPTH {
            flags |= CntFlags::SEND_FIFO_FULL;
        }
        if self.recv.is_empty() {
            flags |= CntFlags::RECV_FIFO_EMPTY;
        }
        if self.recv.len() >= FIFO_DEPTH {
            flags |= CntFlags::RECV_FIFO_FULL;
        }
        flags
    }

    fn enqueue_recv_frame(&mut self, frame: &Frame) {
        self.recv.push_back(frame.header().pack());
        self.recv.extend(frame.payload().iter().copied());
    }

    /// Consume the driver's send FIFO, reassembling frames word by word.
    fn service(&mut self) {
        if self.mode == PeerMode::Wedged {
            return;
        }

        while let Some(word) = self.send.pop_front() {
            let (header, mut payload) = match self.partial.take() {
                Some(partial) => partial,
                None => {
                    let header = FrameHeader::unpack(word);
                    if header.payload_words() == 0 {
                        self.complete(header, Vec::new());
                        continue;
                    }
                    self.partial = Some((header, Vec::with_capacity(header.payload_words())));
                    continue;
                }
            };

            payload.push(word);
            if payload.len() == header.payload_words() {
                self.complete(header, payload);
            } else {
                self.partial = Some((header, payload));
            }
        }
    }

    fn complete(&mut self, header: FrameHeader, payload: Vec<u32>) {
        let frame = Frame::from_parts(header, payload);
        if self.mode == PeerMode::Echo {
            self.enqueue_recv_frame(&Frame::empty(frame.code()));
        }
        self.commands.push(frame);
    }
}

/// Clone-able handle to a scripted peer. See the module docs.
#[derive(Debug, Clone)]
pub struct SimPeer(Arc<Mutex<Inner>>);

impl SimPeer {
    pub fn new(mode: PeerMode) -> Self {
        Self(Arc::new(Mutex::new(Inner {
            mode,
            send: VecDeque::new(),
            recv: VecDeque::new(),
            cnt_enables: CntFlags::empty(),
            sync: SyncFlags::empty(),
            doorbells: 0,
            commands: Vec::new(),
            partial: None,
        })))
    }

    pub fn set_mode(&self, mode: PeerMode) {
        let mut inner = self.0.lock().unwrap();
        inner.mode = mode;
        inner.service();
    }

    /// Deliver a complete frame into the driver's receive FIFO.
    pub fn inject_frame(&self, frame: &Frame) {
        self.0.lock().unwrap().enqueue_recv_frame(frame);
    }

    /// Deliver an unsolicited size report, as the co-processor would.
    pub fn inject_report_size(&self, sectors: u32) {
        self.inject_frame(&Frame::report_size(sectors));
    }

    /// Seed raw words into the driver's receive FIFO (stale pre-reset data).
    pub fn preload_recv_words(&self, words: &[u32]) {
        self.0.lock().unwrap().recv.extend(words.iter().copied());
    }

    /// Frames the peer has fully received, in arrival order.
    pub fn commands(&self) -> Vec<Frame> {
        self.0.lock().unwrap().commands.clone()
    }

    pub fn doorbells(&self) -> u64 {
        self.0.lock().unwrap().doorbells
    }

    /// Full synthesized CNT value, enables plus FIFO status.
    pub fn cnt_flags(&self) -> CntFlags {
        self.0.lock().unwrap().status()
    }

    pub fn sync_flags(&self) -> SyncFlags {
        self.0.lock().unwrap().sync
    }

    pub fn send_fifo_len(&self) -> usize {
        self.0.lock().unwrap().send.len()
    }

    pub fn recv_fifo_len(&self) -> usize {
        self.0.lock().unwrap().recv.len()
    }
}

impl RegisterWindow for SimPeer {
    fn read(&mut self, offset: u32) -> u32 {
        let mut inner = self.0.lock().unwrap();
        match offset {
            REG_SYNC => inner.sync.bits(),
            REG_CNT => inner.status().bits(),
            REG_RECV => inner.recv.pop_front().unwrap_or(0),
            // Reading the send data register is not meaningful; float low.
            _ => 0,
        }
    }

    fn write(&mut self, offset: u32, value: u32) {
        let mut inner = self.0.lock().unwrap();
        match offset {
            REG_SYNC => {
                let flags = SyncFlags::from_bits_truncate(value);
                if flags.contains(SyncFlags::TRIGGER_PEER) {
                    inner.doorbells += 1;
                }
                inner.sync = flags - SyncFlags::TRIGGER_PEER;
            }
            REG_CNT => {
                let flags = CntFlags::from_bits_truncate(value);
                if flags.contains(CntFlags::SEND_FIFO_FLUSH) {
                    inner.send.clear();
                }
                inner.cnt_enables = flags
                    & (CntFlags::SEND_FIFO_EMPTY_IRQ
                        | CntFlags::RECV_FIFO_NOT_EMPTY_IRQ
                        | CntFlags::FIFO_ENABLE);
            }
            REG_SEND => {
                // Hardware drops words pushed into a full FIFO.
                if inner.send.len() < FIFO_DEPTH {
                    inner.send.push_back(value);
                }
                inner.service();
            }
            _ => {}
        }
    }
}
