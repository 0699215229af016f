//! Bounded busy-wait policy.
//!
//! The hardware has no completion interrupt for "FIFO slot freed" or
//! "response word arrived"; the expected latencies are far below a scheduler
//! tick, so the driver spins. The spin is bounded and injectable so that a
//! silent peer turns into an error instead of a hung caller, and so tests can
//! simulate a non-responding peer deterministically.

use std::time::{Duration, Instant};

/// Returned when the condition never became true within the policy's bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stalled;

/// How long to spin on a hardware condition before giving up.
#[derive(Debug, Clone, Copy)]
pub struct WaitPolicy {
    max_spins: u32,
    timeout: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        // Generous for real hardware: the peer services a command in
        // microseconds unless it has wedged entirely.
        Self {
            max_spins: 1_000_000,
            timeout: Duration::from_millis(500),
        }
    }
}

impl WaitPolicy {
    pub fn new(max_spins: u32, timeout: Duration) -> Self {
        Self { max_spins, timeout }
    }

    /// A policy that polls at most `max_spins` times and never consults the
    /// clock. Useful in tests where the simulated peer either responds
    /// immediately or not at all.
    pub fn bounded(max_spins: u32) -> Self {
        Self {
            max_spins,
            timeout: Duration::MAX,
        }
    }

    /// Spin until `ready` returns true.
    ///
    /// `ready` is polled once before any spinning, so a condition that
    /// already holds costs a single probe.
    pub fn wait_until(&self, mut ready: impl FnMut() -> bool) -> Result<(), Stalled> {
        if ready() {
            return Ok(());
        }

        let deadline = Instant::now().checked_add(self.timeout);
        for spin in 1..self.max_spins {
            std::hint::spin_loop();
            if ready() {
                return Ok(());
            }
            // Consulting the clock every iteration would dominate the spin.
            if spin % 64 == 0 {
                if let Some(deadline) = deadline {
                    if Instant::now() >= deadline {
                        return Err(Stalled);
                    }
                }
            }
        }
        Err(Stalled)
    }
}
