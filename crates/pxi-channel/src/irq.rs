//! Interrupt-side glue.
//!
//! The platform's interrupt plumbing owns an [`IrqBridge`] and invokes
//! [`IrqBridge::handle`] whenever the peer's doorbell asserts our line. The
//! bridge is a two-state machine (idle / dispatching); all the actual work
//! lives in [`Channel::handle_irq`], which never blocks: frames are handed
//! off through a bounded queue and applied later from schedulable context by
//! [`Channel::drain_notifications`].
//!
//! Detach order matters: mask the interrupt source (via [`Channel::detach`])
//! before dropping the bridge and releasing the register window.

use std::sync::Arc;

use crate::channel::{Channel, IrqOutcome};

#[derive(Debug, Clone)]
pub struct IrqBridge {
    channel: Arc<Channel>,
}

impl IrqBridge {
    pub fn new(channel: Arc<Channel>) -> Self {
        Self { channel }
    }

    /// Service one doorbell interrupt. Safe to call spuriously.
    pub fn handle(&self) -> IrqOutcome {
        self.channel.handle_irq()
    }
}
