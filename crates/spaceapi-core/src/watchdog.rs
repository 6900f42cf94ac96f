//! Keepalive watchdog
//!
//! Tracks the last keepalive signal and closes the space once no signal has
//! arrived for longer than the configured timeout.
//!
//! A successful forced close is recorded and not repeated until the next
//! [`KeepaliveWatchdog::signal`]. A failed close is logged and retried on the
//! following poll. Each signal bumps a generation counter; a close that was
//! waiting for the store lock while a signal arrived is dropped.
//!
//! # Example
//!
//! ```rust,ignore
//! use spaceapi_core::{KeepaliveWatchdog, Store, WatchdogConfig};
//!
//! let store = Store::shared("api.json");
//! let watchdog = Arc::new(KeepaliveWatchdog::new(WatchdogConfig::new())?);
//! let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! let task = Arc::clone(&watchdog).spawn(store, shutdown_rx);
//!
//! watchdog.signal();
//! ```

use crate::document::FieldUpdate;
use crate::error::StatusResult;
use crate::store::{Store, StoreHandle};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Default interval between expiry checks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default time without a signal before the space is closed
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Watchdog errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WatchdogError {
    /// Invalid configuration
    #[error("invalid watchdog configuration: {0}")]
    InvalidConfiguration(String),
}

/// Watchdog timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogConfig {
    /// Interval between expiry checks
    pub poll_interval: Duration,
    /// Time without a signal before the space is closed
    pub timeout: Duration,
}

impl WatchdogConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With poll interval
    ///
    /// # Errors
    /// `WatchdogError::InvalidConfiguration` if the interval is zero
    pub fn with_poll_interval(mut self, interval: Duration) -> Result<Self, WatchdogError> {
        if interval.is_zero() {
            return Err(WatchdogError::InvalidConfiguration(
                "poll_interval must be non-zero".to_string(),
            ));
        }
        self.poll_interval = interval;
        Ok(self)
    }

    /// With timeout
    ///
    /// # Errors
    /// `WatchdogError::InvalidConfiguration` if the timeout is zero
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, WatchdogError> {
        if timeout.is_zero() {
            return Err(WatchdogError::InvalidConfiguration(
                "timeout must be non-zero".to_string(),
            ));
        }
        self.timeout = timeout;
        Ok(self)
    }

    /// Check the interval/timeout relation
    ///
    /// # Errors
    /// `WatchdogError::InvalidConfiguration` if the poll interval exceeds the timeout
    pub fn validate(&self) -> Result<(), WatchdogError> {
        if self.poll_interval > self.timeout {
            return Err(WatchdogError::InvalidConfiguration(format!(
                "poll_interval {:?} exceeds timeout {:?}",
                self.poll_interval, self.timeout
            )));
        }
        Ok(())
    }
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Result of a single expiry check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Signal seen within the timeout
    Live,
    /// Timeout exceeded; space closed by this poll
    Closed,
    /// Timeout exceeded; space already closed since the last signal
    AlreadyClosed,
    /// Timeout exceeded but a signal arrived before the close was written
    Signalled,
    /// Timeout exceeded; closing failed and will be retried
    Failed,
}

/// Signal bookkeeping, guarded as one unit
#[derive(Debug)]
struct Heartbeat {
    last_seen: Instant,
    generation: u64,
    closed: bool,
}

/// Keepalive watchdog state, shared by the keepalive endpoint and the loop
#[derive(Debug)]
pub struct KeepaliveWatchdog {
    config: WatchdogConfig,
    heartbeat: Mutex<Heartbeat>,
}

impl KeepaliveWatchdog {
    /// Create watchdog; the timer starts now
    ///
    /// # Errors
    /// `WatchdogError::InvalidConfiguration` if the config does not validate
    pub fn new(config: WatchdogConfig) -> Result<Self, WatchdogError> {
        config.validate()?;
        Ok(Self {
            config,
            heartbeat: Mutex::new(Heartbeat {
                last_seen: Instant::now(),
                generation: 0,
                closed: false,
            }),
        })
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &WatchdogConfig {
        &self.config
    }

    /// Record a keepalive signal
    pub fn signal(&self) {
        let mut heartbeat = self.heartbeat.lock();
        heartbeat.last_seen = Instant::now();
        heartbeat.generation = heartbeat.generation.wrapping_add(1);
        heartbeat.closed = false;
        drop(heartbeat);
        tracing::debug!("keepalive signal received");
    }

    /// Time of the last signal (or of construction)
    #[must_use]
    pub fn last_seen(&self) -> Instant {
        self.heartbeat.lock().last_seen
    }

    /// Whether the timeout has elapsed at `now`
    #[must_use]
    pub fn is_expired(&self, now: Instant) -> bool {
        self.expired_at(self.last_seen(), now)
    }

    fn expired_at(&self, last_seen: Instant, now: Instant) -> bool {
        now.saturating_duration_since(last_seen) > self.config.timeout
    }

    fn generation(&self) -> u64 {
        self.heartbeat.lock().generation
    }

    /// Run one expiry check at `now`, closing the space if it has expired
    ///
    /// The signal generation is captured before waiting for the store lock
    /// and re-checked under it; a newer signal cancels the close.
    pub fn poll(&self, store: &Store, now: Instant) -> PollOutcome {
        let generation = {
            let heartbeat = self.heartbeat.lock();
            if !self.expired_at(heartbeat.last_seen, now) {
                return PollOutcome::Live;
            }
            if heartbeat.closed {
                return PollOutcome::AlreadyClosed;
            }
            heartbeat.generation
        };

        let closed = store.mutate(|document| -> StatusResult<bool> {
            if self.generation() != generation {
                return Ok(false);
            }
            document.apply(&FieldUpdate::close());
            Ok(true)
        });

        match closed {
            Ok(true) => {
                let mut heartbeat = self.heartbeat.lock();
                if heartbeat.generation == generation {
                    heartbeat.closed = true;
                }
                drop(heartbeat);
                tracing::warn!(
                    timeout_secs = self.config.timeout.as_secs(),
                    "keepalive timeout reached, space set to closed"
                );
                PollOutcome::Closed
            }
            Ok(false) => {
                tracing::debug!("keepalive arrived while closing, close skipped");
                PollOutcome::Signalled
            }
            Err(e) => {
                tracing::error!(error = %e, "keepalive timeout reached but closing failed");
                PollOutcome::Failed
            }
        }
    }

    /// Spawn the polling loop on the current tokio runtime
    pub fn spawn(self: Arc<Self>, store: StoreHandle, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(store, shutdown))
    }

    /// Poll until `shutdown` turns true
    ///
    /// If the shutdown sender is dropped the loop keeps running.
    pub async fn run(self: Arc<Self>, store: StoreHandle, mut shutdown: watch::Receiver<bool>) {
        let period = self.config.poll_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut listening = true;

        tracing::info!(
            poll_interval_ms = period.as_millis() as u64,
            timeout_secs = self.config.timeout.as_secs(),
            "keepalive watchdog started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let watchdog = Arc::clone(&self);
                    let store = Arc::clone(&store);
                    let now = Instant::now();
                    let polled = tokio::task::spawn_blocking(move || watchdog.poll(&store, now)).await;
                    if let Err(e) = polled {
                        tracing::error!(error = %e, "keepalive poll task failed");
                    }
                }
                changed = shutdown.changed(), if listening => {
                    if changed.is_err() {
                        listening = false;
                    } else if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("keepalive watchdog stopped");
    }
}
