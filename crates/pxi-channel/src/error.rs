use thiserror::Error;

use crate::frame::{CommandCode, FrameError};

/// Failures surfaced by the command channel.
///
/// Every wait on the wire is bounded by the channel's
/// [`crate::wait::WaitPolicy`], so a stalled peer becomes one of these
/// instead of a hung caller.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChannelError {
    /// The peer stopped draining the send FIFO.
    #[error("send FIFO stayed full; peer is not draining it")]
    SendStalled,

    /// No response frame arrived within the wait policy's bounds.
    #[error("timed out waiting for a response to {0:?}")]
    ResponseStalled(CommandCode),

    /// A frame header declared more payload words than the peer delivered.
    #[error("frame {code:?} truncated: {received} of {expected} payload words arrived")]
    TruncatedFrame {
        code: CommandCode,
        expected: usize,
        received: usize,
    },

    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Failures while bringing the channel up.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AttachError {
    /// The register window could not be acquired or mapped by the embedder.
    #[error("register window unavailable: {0}")]
    WindowUnavailable(&'static str),

    /// The post-reset FIFO state still reports pending words: the peer is
    /// flooding the link or the window does not point at the FIFO block.
    #[error("FIFO reset left stale words in the hardware queues")]
    ResetFailed,
}
