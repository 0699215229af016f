//! Send/receive primitives over the register window.
//!
//! This layer is deliberately dumb: probes never fail, `push`/`pop` touch the
//! data registers unconditionally, and there are no timeouts. Flow control
//! (gating on the probes, bounding the wait) belongs to the channel above.

use crate::regs::{
    CntFlags, RegisterWindow, SyncFlags, REG_CNT, REG_RECV, REG_SEND, REG_SYNC,
};

/// Words drained from the receive side during [`FifoTransport::reset`].
///
/// Twice the hardware FIFO depth; anything still pending after that is not
/// stale data but a live (misbehaving) peer.
const RESET_DRAIN_WORDS: usize = 32;

pub struct FifoTransport {
    window: Box<dyn RegisterWindow>,
}

impl FifoTransport {
    pub fn new(window: Box<dyn RegisterWindow>) -> Self {
        Self { window }
    }

    fn cnt(&mut self) -> CntFlags {
        CntFlags::from_bits_truncate(self.window.read(REG_CNT))
    }

    pub fn send_fifo_empty(&mut self) -> bool {
        self.cnt().contains(CntFlags::SEND_FIFO_EMPTY)
    }

    pub fn send_fifo_full(&mut self) -> bool {
        self.cnt().contains(CntFlags::SEND_FIFO_FULL)
    }

    pub fn recv_fifo_empty(&mut self) -> bool {
        self.cnt().contains(CntFlags::RECV_FIFO_EMPTY)
    }

    pub fn recv_fifo_full(&mut self) -> bool {
        self.cnt().contains(CntFlags::RECV_FIFO_FULL)
    }

    /// Write one word to the send FIFO. The caller must have observed
    /// `!send_fifo_full()`.
    pub fn push(&mut self, word: u32) {
        self.window.write(REG_SEND, word);
    }

    /// Read one word from the receive FIFO. The caller must have observed
    /// `!recv_fifo_empty()`.
    pub fn pop(&mut self) -> u32 {
        self.window.read(REG_RECV)
    }

    /// Assert the peer's interrupt line to announce new data.
    pub fn ring_doorbell(&mut self) {
        let sync = self.window.read(REG_SYNC);
        self.window
            .write(REG_SYNC, sync | SyncFlags::TRIGGER_PEER.bits());
    }

    /// Bring both FIFO directions to a known-clean state and arm interrupts.
    ///
    /// Flushes the send FIFO, drains up to [`RESET_DRAIN_WORDS`] stale words
    /// from the receive side, then enables the FIFO block, the local
    /// receive-not-empty interrupt and the peer's doorbell interrupt. Must be
    /// called exactly once during attach, before the first command.
    pub fn reset(&mut self) {
        self.window.write(REG_SYNC, 0);
        self.window.write(REG_CNT, CntFlags::SEND_FIFO_FLUSH.bits());

        for _ in 0..RESET_DRAIN_WORDS {
            if self.recv_fifo_empty() {
                break;
            }
            self.pop();
        }

        self.window.write(
            REG_CNT,
            (CntFlags::SEND_FIFO_EMPTY_IRQ
                | CntFlags::RECV_FIFO_NOT_EMPTY_IRQ
                | CntFlags::FIFO_ENABLE)
                .bits(),
        );
        self.window
            .write(REG_SYNC, SyncFlags::IRQ_ENABLE.bits());
    }

    /// Mask both interrupt sources ahead of releasing the window.
    pub fn disable_irqs(&mut self) {
        self.window.write(REG_CNT, CntFlags::FIFO_ENABLE.bits());
        self.window.write(REG_SYNC, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regs::{CntFlags, SyncFlags};
    use crate::sim::{PeerMode, SimPeer};

    #[test]
    fn reset_leaves_both_fifos_empty_and_irqs_armed() {
        let peer = SimPeer::new(PeerMode::Wedged);
        peer.preload_recv_words(&[0xDEAD_BEEF, 0x1234_5678]);

        let mut fifo = FifoTransport::new(Box::new(peer.clone()));
        fifo.reset();

        assert!(fifo.send_fifo_empty());
        assert!(fifo.recv_fifo_empty());
        assert!(peer
            .cnt_flags()
            .contains(CntFlags::SEND_FIFO_EMPTY_IRQ | CntFlags::RECV_FIFO_NOT_EMPTY_IRQ));
        assert!(peer.cnt_flags().contains(CntFlags::FIFO_ENABLE));
        assert!(peer.sync_flags().contains(SyncFlags::IRQ_ENABLE));
    }

    #[test]
    fn reset_gives_up_draining_a_replenishing_receive_side() {
        let peer = SimPeer::new(PeerMode::Wedged);
        peer.preload_recv_words(&vec![0u32; 40]);

        let mut fifo = FifoTransport::new(Box::new(peer.clone()));
        fifo.reset();

        // 32 stale words drained, the rest left for the caller to notice.
        assert!(!fifo.recv_fifo_empty());
        assert_eq!(peer.recv_fifo_len(), 8);
    }

    #[test]
    fn doorbell_sets_the_trigger_bit_without_clobbering_sync() {
        let peer = SimPeer::new(PeerMode::Wedged);
        let mut fifo = FifoTransport::new(Box::new(peer.clone()));

        fifo.reset();
        fifo.ring_doorbell();

        assert_eq!(peer.doorbells(), 1);
        assert!(peer.sync_flags().contains(SyncFlags::IRQ_ENABLE));
    }

    #[test]
    fn pushed_words_show_up_on_the_probes() {
        let peer = SimPeer::new(PeerMode::Wedged);
        let mut fifo = FifoTransport::new(Box::new(peer.clone()));
        fifo.reset();

        assert!(fifo.send_fifo_empty());
        fifo.push(0xCAFE_F00D);
        assert!(!fifo.send_fifo_empty());
        assert!(!fifo.send_fifo_full());

        for word in 1..16 {
            fifo.push(word);
        }
        assert!(fifo.send_fifo_full());
    }
}
