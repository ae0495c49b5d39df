use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, TryLockError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;

use crate::reporting::domain::session_reporter::{FeatureBundle, SessionReporter};
use crate::shared::frame::Frame;

/// How long `cancel` waits for the worker before leaving it to finish alone.
const CANCEL_GRACE: Duration = Duration::from_millis(100);

type Snapshot = (Option<Frame>, FeatureBundle);

#[derive(Default)]
struct Counters {
    sent: AtomicUsize,
    failed: AtomicUsize,
}

/// Fire-and-forget side channel that ships the latest snapshot on a fixed tick.
///
/// The frame loop `publish`es into a single-slot mailbox without blocking; a
/// dedicated thread takes whatever is in the slot on each tick and submits it.
/// Failed submissions are logged and dropped; there is no retry queue.
pub struct PeriodicReporter {
    mailbox: Arc<Mutex<Option<Snapshot>>>,
    counters: Arc<Counters>,
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicReporter {
    pub fn spawn(mut reporter: Box<dyn SessionReporter>, interval: Duration) -> Self {
        let mailbox: Arc<Mutex<Option<Snapshot>>> = Arc::new(Mutex::new(None));
        let counters = Arc::new(Counters::default());
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);

        let slot = mailbox.clone();
        let stats = counters.clone();
        let handle = std::thread::spawn(move || {
            let ticker = crossbeam_channel::tick(interval.max(Duration::from_millis(1)));
            loop {
                crossbeam_channel::select! {
                    recv(stop_rx) -> _ => break,
                    recv(ticker) -> _ => {
                        let latest = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
                        let Some((frame, bundle)) = latest else {
                            continue;
                        };
                        match reporter.submit(frame.as_ref(), &bundle) {
                            Ok(ack) => {
                                stats.sent.fetch_add(1, Ordering::Relaxed);
                                log::debug!(
                                    "Session report accepted (local {}, remote {:?})",
                                    bundle.attention_score,
                                    ack.attention_score
                                );
                            }
                            Err(e) => {
                                stats.failed.fetch_add(1, Ordering::Relaxed);
                                log::warn!("Session report dropped: {e}");
                            }
                        }
                    }
                }
            }
            log::debug!("Periodic reporter stopped");
        });

        Self {
            mailbox,
            counters,
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        }
    }

    /// Replaces the pending snapshot. Returns `false` when the slot is busy
    /// or the reporter has been cancelled; the snapshot is then skipped.
    pub fn publish(&self, frame: Option<Frame>, bundle: FeatureBundle) -> bool {
        if self.stop_tx.is_none() {
            return false;
        }
        let mut slot = match self.mailbox.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return false,
        };
        *slot = Some((frame, bundle));
        true
    }

    pub fn reports_sent(&self) -> usize {
        self.counters.sent.load(Ordering::Relaxed)
    }

    pub fn reports_failed(&self) -> usize {
        self.counters.failed.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Stops the ticker without blocking the caller on the network. A
    /// submission still in flight after [`CANCEL_GRACE`] is left to finish on
    /// its detached thread, which exits right after. Idempotent.
    pub fn cancel(&mut self) {
        drop(self.stop_tx.take());
        let Some(handle) = self.handle.take() else {
            return;
        };
        let deadline = Instant::now() + CANCEL_GRACE;
        while !handle.is_finished() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(2));
        }
        if !handle.is_finished() {
            log::debug!("Detaching periodic reporter with a submission in flight");
            return;
        }
        if handle.join().is_err() {
            log::error!("Periodic reporter thread panicked");
        }
    }
}

impl Drop for PeriodicReporter {
    fn drop(&mut self) {
        self.cancel();
    }
}
