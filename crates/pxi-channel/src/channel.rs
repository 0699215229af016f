//! The lock-serialized command/response engine.
//!
//! One mutex guards the whole send/receive exchange: at most one command is
//! in flight, FIFO words of different frames never interleave on the wire,
//! and a caller awaiting a response owns the receive side until that
//! response (or a stall verdict) arrives. Frames that show up mid-wait but
//! answer nobody are routed to the notification path rather than popped and
//! discarded word-blind: every frame is drained completely, header plus
//! declared payload, before the next header word is interpreted.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::{Mutex, MutexGuard};

use crate::error::{AttachError, ChannelError};
use crate::fifo::FifoTransport;
use crate::frame::{CommandCode, Frame, FrameHeader};
use crate::regs::RegisterWindow;
use crate::wait::WaitPolicy;

/// Construction-time knobs for a channel.
#[derive(Debug, Clone, Copy)]
pub struct ChannelConfig {
    /// Bound on every hardware wait (send slot, response header, payload).
    pub wait: WaitPolicy,
    /// Capacity of the interrupt-to-dispatch notification queue. Frames
    /// arriving while the queue is full are dropped and counted.
    pub inbox_depth: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            wait: WaitPolicy::default(),
            inbox_depth: 8,
        }
    }
}

/// Peer-reported values cached from unsolicited notifications.
#[derive(Debug, Default)]
struct PeerState {
    /// Medium size in sectors. `None` until the first size report arrives;
    /// callers that need a number regardless hold their own fallback.
    capacity_sectors: Option<u64>,
}

/// Diagnostic counters. Monotonic; never reset while attached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Interrupts that found the receive FIFO empty.
    pub spurious_irqs: u64,
    /// Frames discarded: unrecognized codes, codec failures, inbox overflow.
    pub dropped_frames: u64,
    /// Recognized unsolicited notifications applied to cached state.
    pub notifications: u64,
}

#[derive(Debug, Default)]
struct Counters {
    spurious_irqs: AtomicU64,
    dropped_frames: AtomicU64,
    notifications: AtomicU64,
}

/// What an interrupt invocation did. See [`Channel::handle_irq`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqOutcome {
    /// A frame was pulled off the FIFO and queued for dispatch.
    Queued,
    /// The receive FIFO was empty; nothing to do.
    Spurious,
    /// A synchronous exchange holds the channel; its caller will drain the
    /// frame itself. No FIFO access was made.
    Busy,
    /// A frame was pulled but could not be kept (queue full or truncated).
    Dropped,
}

/// An attached command channel.
///
/// Owned value, constructed by [`Channel::attach`] and shared by handle
/// (`Arc<Channel>`) between the block adapter and the platform's interrupt
/// plumbing. Nothing here is global; dropping the channel after
/// [`Channel::detach`] releases everything.
///
/// Detaching (or dropping) while a command is in flight is an unsupported
/// state transition: `detach` blocks on the exchange lock, so the in-flight
/// exchange finishes or stalls out first, but the peer may still believe the
/// command is outstanding.
pub struct Channel {
    exchange: Mutex<FifoTransport>,
    wait: WaitPolicy,
    state: Mutex<PeerState>,
    inbox_tx: SyncSender<Frame>,
    inbox_rx: Mutex<Receiver<Frame>>,
    counters: Counters,
    dispatching: AtomicBool,
}

impl Channel {
    /// Reset the FIFO pair and bring the channel up.
    ///
    /// Fails with [`AttachError::ResetFailed`] when the post-reset probes
    /// still report pending words (wrong window, or a peer flooding the
    /// link).
    pub fn attach(
        window: Box<dyn RegisterWindow>,
        config: ChannelConfig,
    ) -> Result<Self, AttachError> {
        let mut fifo = FifoTransport::new(window);
        fifo.reset();
        if !fifo.send_fifo_empty() || !fifo.recv_fifo_empty() {
            return Err(AttachError::ResetFailed);
        }

        let (inbox_tx, inbox_rx) = sync_channel(config.inbox_depth.max(1));
        tracing::info!("pxi channel attached");
        Ok(Self {
            exchange: Mutex::new(fifo),
            wait: config.wait,
            state: Mutex::new(PeerState::default()),
            inbox_tx,
            inbox_rx: Mutex::new(inbox_rx),
            counters: Counters::default(),
            dispatching: AtomicBool::new(false),
        })
    }

    /// Mask the interrupt sources ahead of releasing the register window.
    ///
    /// Blocks until any in-flight exchange has finished.
    pub fn detach(&self) {
        let mut fifo = self.lock_exchange();
        fifo.disable_irqs();
        tracing::info!("pxi channel detached");
    }

    /// Send one command frame, optionally awaiting its response.
    ///
    /// The whole exchange happens under the channel lock: concurrent callers
    /// queue up and their frames are totally ordered on the wire. A response
    /// is the next received frame echoing the command's code; recognized
    /// notifications arriving in between are applied, anything else is
    /// dropped and counted.
    pub fn send(
        &self,
        frame: &Frame,
        await_response: bool,
    ) -> Result<Option<Frame>, ChannelError> {
        let mut fifo = self.lock_exchange();

        self.wait
            .wait_until(|| !fifo.send_fifo_full())
            .map_err(|_| ChannelError::SendStalled)?;
        fifo.push(frame.header().pack());

        // One doorbell per frame: the peer drains the remaining words itself
        // once woken.
        fifo.ring_doorbell();

        for &word in frame.payload() {
            self.wait
                .wait_until(|| !fifo.send_fifo_full())
                .map_err(|_| ChannelError::SendStalled)?;
            fifo.push(word);
        }

        if !await_response {
            return Ok(None);
        }

        loop {
            let received = self
                .recv_frame(&mut fifo)
                .map_err(|err| match err {
                    RecvError::NoHeader => ChannelError::ResponseStalled(frame.code()),
                    RecvError::Truncated {
                        code,
                        expected,
                        received,
                    } => ChannelError::TruncatedFrame {
                        code,
                        expected,
                        received,
                    },
                })?;
            if received.code() == frame.code() {
                return Ok(Some(received));
            }
            self.dispatch(received);
        }
    }

    /// Interrupt bridge entry point: called when the peer rings our side.
    ///
    /// Never blocks. If a synchronous exchange holds the channel the frame is
    /// left in the FIFO for that caller to drain ([`IrqOutcome::Busy`]);
    /// otherwise one complete frame is popped and handed to the bounded
    /// notification queue, to be applied by [`Channel::drain_notifications`]
    /// from a schedulable context.
    pub fn handle_irq(&self) -> IrqOutcome {
        // Two-state bridge: Idle -> Dispatching on entry, back on return.
        // Reentry while dispatching is treated like contention.
        if self.dispatching.swap(true, Ordering::Acquire) {
            return IrqOutcome::Busy;
        }
        let outcome = self.pump_one();
        self.dispatching.store(false, Ordering::Release);
        outcome
    }

    fn pump_one(&self) -> IrqOutcome {
        let Ok(mut fifo) = self.exchange.try_lock() else {
            return IrqOutcome::Busy;
        };
        if fifo.recv_fifo_empty() {
            self.counters.spurious_irqs.fetch_add(1, Ordering::Relaxed);
            return IrqOutcome::Spurious;
        }

        let frame = match self.recv_frame(&mut fifo) {
            Ok(frame) => frame,
            Err(_) => {
                self.counters.dropped_frames.fetch_add(1, Ordering::Relaxed);
                return IrqOutcome::Dropped;
            }
        };
        drop(fifo);

        match self.inbox_tx.try_send(frame) {
            Ok(()) => IrqOutcome::Queued,
            Err(TrySendError::Full(frame)) | Err(TrySendError::Disconnected(frame)) => {
                tracing::warn!(code = ?frame.code(), "notification queue full, dropping frame");
                self.counters.dropped_frames.fetch_add(1, Ordering::Relaxed);
                IrqOutcome::Dropped
            }
        }
    }

    /// Apply queued notification frames to the cached peer state.
    ///
    /// Runs in ordinary (schedulable) context; returns how many frames were
    /// processed.
    pub fn drain_notifications(&self) -> usize {
        let rx = self.inbox_rx.lock().expect("mutex poisoned");
        let mut processed = 0;
        while let Ok(frame) = rx.try_recv() {
            self.dispatch(frame);
            processed += 1;
        }
        processed
    }

    /// Last peer-reported medium size, in sectors.
    ///
    /// `None` until the first size report has arrived. Pending notifications
    /// are drained first so an already-delivered report is never missed.
    pub fn capacity_sectors(&self) -> Option<u64> {
        self.drain_notifications();
        self.state
            .lock()
            .expect("mutex poisoned")
            .capacity_sectors
    }

    pub fn stats(&self) -> ChannelStats {
        ChannelStats {
            spurious_irqs: self.counters.spurious_irqs.load(Ordering::Relaxed),
            dropped_frames: self.counters.dropped_frames.load(Ordering::Relaxed),
            notifications: self.counters.notifications.load(Ordering::Relaxed),
        }
    }

    fn lock_exchange(&self) -> MutexGuard<'_, FifoTransport> {
        self.exchange.lock().expect("mutex poisoned")
    }

    /// Pop one complete frame: header word plus every declared payload word.
    fn recv_frame(&self, fifo: &mut FifoTransport) -> Result<Frame, RecvError> {
        self.wait
            .wait_until(|| !fifo.recv_fifo_empty())
            .map_err(|_| RecvError::NoHeader)?;
        let header = FrameHeader::unpack(fifo.pop());

        let mut payload = Vec::with_capacity(header.payload_words());
        for received in 0..header.payload_words() {
            self.wait
                .wait_until(|| !fifo.recv_fifo_empty())
                .map_err(|_| RecvError::Truncated {
                    code: header.code,
                    expected: header.payload_words(),
                    received,
                })?;
            payload.push(fifo.pop());
        }
        Ok(Frame::from_parts(header, payload))
    }

    /// Route one received frame that answers no outstanding command.
    fn dispatch(&self, frame: Frame) {
        match frame.code() {
            CommandCode::ReportSize => match frame.report_size_sectors() {
                Some(sectors) => {
                    tracing::debug!(sectors, "peer reported medium size");
                    self.state
                        .lock()
                        .expect("mutex poisoned")
                        .capacity_sectors = Some(u64::from(sectors));
                    self.counters.notifications.fetch_add(1, Ordering::Relaxed);
                }
                None => {
                    self.counters.dropped_frames.fetch_add(1, Ordering::Relaxed);
                }
            },
            code => {
                tracing::debug!(?code, "dropping unrecognized frame");
                self.counters.dropped_frames.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("wait", &self.wait)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

enum RecvError {
    NoHeader,
    Truncated {
        code: CommandCode,
        expected: usize,
        received: usize,
    },
}
