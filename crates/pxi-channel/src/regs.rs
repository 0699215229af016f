//! Register layout of the inter-processor FIFO block.
//!
//! The channel hardware exposes four 32-bit registers in a small MMIO window:
//! a sync/doorbell register, a control/status register and one data register
//! per FIFO direction. Everything above this module goes through
//! [`RegisterWindow`], so device code never hardcodes how the window is
//! mapped.

use bitflags::bitflags;

/// Default physical base of the channel register window.
pub const REGS_BASE: u32 = 0x1016_3000;
/// Size of the register window in bytes.
pub const REGS_SIZE: u32 = 0x10;

pub const REG_SYNC: u32 = 0x0;
pub const REG_CNT: u32 = 0x4;
pub const REG_SEND: u32 = 0x8;
pub const REG_RECV: u32 = 0xC;

/// Hardware FIFO depth, in words, per direction.
pub const FIFO_DEPTH: usize = 16;

bitflags! {
    /// Bits of the control/status (`CNT`) register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CntFlags: u32 {
        const SEND_FIFO_EMPTY = 1 << 0;
        const SEND_FIFO_FULL = 1 << 1;
        const SEND_FIFO_EMPTY_IRQ = 1 << 2;
        const SEND_FIFO_FLUSH = 1 << 3;
        const RECV_FIFO_EMPTY = 1 << 8;
        const RECV_FIFO_FULL = 1 << 9;
        const RECV_FIFO_NOT_EMPTY_IRQ = 1 << 10;
        const FIFO_ERROR_ACK = 1 << 14;
        const FIFO_ENABLE = 1 << 15;
    }
}

bitflags! {
    /// Bits of the sync (`SYNC`) register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SyncFlags: u32 {
        /// Doorbell: asserts the interrupt line on the peer processor.
        const TRIGGER_PEER = 1 << 29;
        /// Allows the peer's doorbell to assert our interrupt line.
        const IRQ_ENABLE = 1 << 31;
    }
}

/// Word-level view of the mapped FIFO registers.
///
/// Reads are `&mut self` because reading the receive data register pops a
/// word from the hardware queue: reads may have side effects.
pub trait RegisterWindow: Send {
    fn read(&mut self, offset: u32) -> u32;
    fn write(&mut self, offset: u32, value: u32);
}

/// [`RegisterWindow`] over a raw MMIO mapping.
pub struct MappedWindow {
    base: *mut u32,
}

// The window is only ever driven from behind the channel's exchange lock.
unsafe impl Send for MappedWindow {}

impl MappedWindow {
    /// # Safety
    ///
    /// `base` must point to a live, uncached mapping of the channel register
    /// window, at least [`REGS_SIZE`] bytes long and word-aligned, and must
    /// remain valid for the lifetime of the returned value.
    pub unsafe fn new(base: *mut u32) -> Self {
        Self { base }
    }
}

impl RegisterWindow for MappedWindow {
    fn read(&mut self, offset: u32) -> u32 {
        debug_assert!(offset < REGS_SIZE && offset % 4 == 0);
        unsafe { self.base.add(offset as usize / 4).read_volatile() }
    }

    fn write(&mut self, offset: u32, value: u32) {
        debug_assert!(offset < REGS_SIZE && offset % 4 == 0);
        unsafe { self.base.add(offset as usize / 4).write_volatile(value) }
    }
}
