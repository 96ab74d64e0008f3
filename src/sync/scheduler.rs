use crate::core::error::{FxError, Result};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60 * 60);
/// Longest accepted cadence. Keeps the timer's deadline arithmetic in range.
pub const MAX_REFRESH_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);
const TICK_CHANNEL_CAPACITY: usize = 16;

/// A refresh notification. Every subscriber sees the same ticks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tick {
    pub sequence: u64,
    pub at: DateTime<Utc>,
}

type Notifier = Arc<Mutex<Option<broadcast::Sender<Tick>>>>;

struct SchedulerState {
    interval: Duration,
    timer: Option<JoinHandle<()>>,
}

/// Fires [`Tick`]s on a fixed cadence while running.
///
/// Stopped until `start_polling`. Starting twice or stopping twice is a no-op.
/// After `shutdown` the tick stream is closed for good and the scheduler
/// cannot be started again.
pub struct RefreshScheduler {
    state: Mutex<SchedulerState>,
    notifier: Notifier,
    sequence: Arc<AtomicU64>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn validate_interval(interval: Duration) -> Result<()> {
    if interval.is_zero() {
        return Err(FxError::MalformedInput(
            "Refresh interval must be greater than zero".to_string(),
        ));
    }
    if interval > MAX_REFRESH_INTERVAL {
        return Err(FxError::MalformedInput(format!(
            "Refresh interval of {interval:?} exceeds the maximum of {MAX_REFRESH_INTERVAL:?}"
        )));
    }
    Ok(())
}

/// Sends one tick. Returns false once the scheduler has shut down.
fn emit(notifier: &Notifier, sequence: &AtomicU64) -> bool {
    let guard = lock(notifier);
    let Some(sender) = guard.as_ref() else {
        return false;
    };
    let tick = Tick {
        sequence: sequence.fetch_add(1, Ordering::SeqCst),
        at: Utc::now(),
    };
    debug!(sequence = tick.sequence, "Refresh tick");
    // No subscribers is fine
    let _ = sender.send(tick);
    true
}

impl RefreshScheduler {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(TICK_CHANNEL_CAPACITY);
        Self {
            state: Mutex::new(SchedulerState {
                interval: DEFAULT_REFRESH_INTERVAL,
                timer: None,
            }),
            notifier: Arc::new(Mutex::new(Some(sender))),
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_interval(interval: Duration) -> Result<Self> {
        validate_interval(interval)?;
        let scheduler = Self::new();
        lock(&scheduler.state).interval = interval;
        Ok(scheduler)
    }

    /// Receiver for all ticks emitted from now on. Already closed after
    /// shutdown.
    pub fn subscribe(&self) -> broadcast::Receiver<Tick> {
        match lock(&self.notifier).as_ref() {
            Some(sender) => sender.subscribe(),
            None => broadcast::channel(1).1,
        }
    }

    pub fn is_active(&self) -> bool {
        lock(&self.state).timer.is_some()
    }

    pub fn interval(&self) -> Duration {
        lock(&self.state).interval
    }

    /// Starts the timer. With `immediate`, one extra tick is sent right away
    /// instead of waiting for the first full interval.
    pub fn start_polling(&self, immediate: bool) {
        if lock(&self.notifier).is_none() {
            warn!("Refresh scheduler was shut down, not starting");
            return;
        }

        let mut state = lock(&self.state);
        if state.timer.is_some() {
            return;
        }

        let period = state.interval;
        let notifier = Arc::clone(&self.notifier);
        let sequence = Arc::clone(&self.sequence);
        state.timer = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !emit(&notifier, &sequence) {
                    break;
                }
            }
        }));
        debug!(?period, "Refresh polling started");

        if immediate {
            let notifier = Arc::clone(&self.notifier);
            let sequence = Arc::clone(&self.sequence);
            tokio::spawn(async move {
                emit(&notifier, &sequence);
            });
        }
    }

    pub fn stop_polling(&self) {
        if let Some(timer) = lock(&self.state).timer.take() {
            timer.abort();
            debug!("Refresh polling stopped");
        }
    }

    /// Changes the cadence. With `restart`, a running timer is restarted on the
    /// new cadence without an immediate tick.
    pub fn set_interval(&self, interval: Duration, restart: bool) -> Result<()> {
        validate_interval(interval)?;
        lock(&self.state).interval = interval;
        if restart && self.is_active() {
            self.stop_polling();
            self.start_polling(false);
        }
        Ok(())
    }

    /// Sends a tick outside the regular cadence.
    pub fn notify(&self) {
        emit(&self.notifier, &self.sequence);
    }

    /// Stops the timer and closes the tick stream.
    pub fn shutdown(&self) {
        self.stop_polling();
        if lock(&self.notifier).take().is_some() {
            debug!("Refresh scheduler shut down");
        }
    }
}

impl Default for RefreshScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
