//! Background radio sampling.
//!
//! Spawns a thread that owns the `Radio`, publishes the latest frame over a
//! bounded channel and records when the last good frame arrived so the
//! control loop can fall back to `Secure` when the link goes quiet.
//!
//! Each `RadioSampler` owns exactly one thread, shut down and joined on drop.

use crossbeam_channel as xch;
use erumby_traits::clock::Clock;
use erumby_traits::{Radio, RadioFrame};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Where the control loop gets its radio frames from.
pub trait FrameSource {
    /// Most recent usable frame, or `None` if the link is down.
    fn latest_frame(&mut self) -> Option<RadioFrame>;
}

impl<F: FnMut() -> Option<RadioFrame>> FrameSource for F {
    fn latest_frame(&mut self) -> Option<RadioFrame> {
        self()
    }
}

pub struct RadioSampler {
    rx: xch::Receiver<RadioFrame>,
    last_frame: Option<RadioFrame>,
    last_ok: Arc<AtomicU64>,
    epoch: Instant,
    clock: Arc<dyn Clock + Send + Sync>,
    failsafe: Duration,
    shutdown: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl RadioSampler {
    /// Poll `radio` every `poll`, waiting at most `timeout` per read. Frames
    /// older than `failsafe` are not returned.
    pub fn spawn<R: Radio + Send + 'static, C: Clock + Send + Sync + 'static>(
        mut radio: R,
        poll: Duration,
        timeout: Duration,
        failsafe: Duration,
        clock: C,
    ) -> Self {
        let clock: Arc<dyn Clock + Send + Sync> = Arc::new(clock);
        let thread_clock = Arc::clone(&clock);
        let (tx, rx) = xch::bounded(1);
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let epoch = clock.now();
        // Stored as ms + 1; 0 means no frame yet.
        let last_ok = Arc::new(AtomicU64::new(0));
        let last_ok_clone = last_ok.clone();

        let join_handle = std::thread::spawn(move || {
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    tracing::debug!("radio sampler received shutdown signal");
                    break;
                }
                match radio.read(timeout) {
                    Ok(frame) => {
                        // Drop the stale frame if the loop has not taken it yet.
                        match tx.try_send(frame) {
                            Ok(()) | Err(xch::TrySendError::Full(_)) => {}
                            Err(xch::TrySendError::Disconnected(_)) => {
                                tracing::debug!("radio consumer disconnected, exiting thread");
                                break;
                            }
                        }
                        let now = thread_clock.ms_since(epoch).saturating_add(1);
                        last_ok_clone.store(now, Ordering::Relaxed);
                    }
                    Err(e) => {
                        tracing::trace!(error = %e, "radio read failed");
                    }
                }
                if shutdown_clone.load(Ordering::Relaxed) {
                    break;
                }
                thread_clock.sleep(poll);
            }
            tracing::trace!("radio sampler thread exiting cleanly");
        });

        Self {
            rx,
            last_frame: None,
            last_ok,
            epoch,
            clock,
            failsafe,
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    /// Milliseconds since the last good frame (or since spawn if none yet).
    pub fn stalled_for_now(&self) -> u64 {
        let now_ms = self.clock.ms_since(self.epoch);
        let seen = self.last_ok.load(Ordering::Relaxed);
        now_ms.saturating_sub(seen.saturating_sub(1))
    }
}

impl FrameSource for RadioSampler {
    fn latest_frame(&mut self) -> Option<RadioFrame> {
        if let Some(f) = self.rx.try_iter().last() {
            self.last_frame = Some(f);
        }
        let failsafe_ms = u64::try_from(self.failsafe.as_millis()).unwrap_or(u64::MAX);
        if self.last_ok.load(Ordering::Relaxed) == 0 || self.stalled_for_now() > failsafe_ms {
            return None;
        }
        self.last_frame
    }
}

impl Drop for RadioSampler {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        // The thread exits after its current read returns (at most `timeout`).
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("radio sampler joined"),
                Err(e) => tracing::warn!(?e, "radio sampler panicked during shutdown"),
            }
        }
    }
}
