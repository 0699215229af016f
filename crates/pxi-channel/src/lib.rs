//! Inter-processor command channel for a dual-core platform where a
//! co-processor owns the storage peripheral.
//!
//! The two cores exchange fixed-size words through a hardware FIFO pair plus
//! an interrupt line. This crate implements the general-purpose core's side:
//! the register window ([`regs`]), the word-level transport ([`fifo`]), the
//! frame codec ([`frame`]) and the lock-serialized command/response engine
//! ([`channel`]) with its interrupt bridge ([`irq`]).
//!
//! Block I/O on top of this lives in the `pxi-blk` crate.

pub mod channel;
pub mod error;
pub mod fifo;
pub mod frame;
pub mod irq;
pub mod regs;
pub mod sim;
pub mod wait;

pub use channel::{Channel, ChannelConfig, ChannelStats, IrqOutcome};
pub use error::{AttachError, ChannelError};
pub use frame::{CommandCode, Frame, FrameHeader};
pub use irq::IrqBridge;
pub use regs::{MappedWindow, RegisterWindow};
pub use wait::WaitPolicy;
