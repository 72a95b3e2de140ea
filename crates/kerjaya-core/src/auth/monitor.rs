//! Idle detection for an authenticated session.
//!
//! Front ends publish qualifying input on an `ActivityBus`. While an
//! `InactivityMonitor` is started it holds one subscription to that bus and one
//! countdown task; each activity event pushes the deadline back to the full
//! timeout. When the deadline passes the expiry callback runs once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace};

/// Idle period before a session expires (10 minutes).
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_millis(600_000);

/// Buffered activity events per subscriber. Overflow only means the
/// countdown resets once for the whole burst.
const ACTIVITY_BUFFER_SIZE: usize = 64;

/// User input that counts as activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityEvent {
    PointerMove,
    KeyPress,
    PrimaryClick,
}

/// Fan-out point for user input. Clone is cheap; all clones share subscribers.
#[derive(Clone)]
pub struct ActivityBus {
    tx: broadcast::Sender<ActivityEvent>,
}

impl ActivityBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(ACTIVITY_BUFFER_SIZE);
        Self { tx }
    }

    pub fn publish(&self, event: ActivityEvent) {
        // No subscribers just means nobody is counting down
        let _ = self.tx.send(event);
    }

    /// Number of attached listeners.
    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }

    fn subscribe(&self) -> broadcast::Receiver<ActivityEvent> {
        self.tx.subscribe()
    }
}

impl Default for ActivityBus {
    fn default() -> Self {
        Self::new()
    }
}

struct Countdown {
    armed: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

pub struct InactivityMonitor {
    bus: ActivityBus,
    timeout: Duration,
    countdown: Option<Countdown>,
}

impl InactivityMonitor {
    pub fn new(bus: ActivityBus, timeout: Duration) -> Self {
        Self {
            bus,
            timeout,
            countdown: None,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Begin counting down. Any countdown already pending is cancelled first,
    /// so at most one timer and one subscription exist at a time.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start<F>(&mut self, on_expire: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.stop();

        let armed = Arc::new(AtomicBool::new(true));
        let activity = self.bus.subscribe();
        let task = tokio::spawn(countdown(
            self.timeout,
            activity,
            armed.clone(),
            Box::new(on_expire),
        ));

        debug!(timeout_ms = self.timeout.as_millis() as u64, "Inactivity countdown started");
        self.countdown = Some(Countdown { armed, task });
    }

    /// Cancel the countdown and detach from the activity bus. Safe to call
    /// repeatedly or before `start`.
    pub fn stop(&mut self) {
        if let Some(countdown) = self.countdown.take() {
            countdown.armed.store(false, Ordering::SeqCst);
            countdown.task.abort();
            debug!("Inactivity countdown stopped");
        }
    }

    /// True while a countdown is pending and has not yet fired.
    pub fn is_running(&self) -> bool {
        self.countdown
            .as_ref()
            .map(|c| c.armed.load(Ordering::SeqCst))
            .unwrap_or(false)
    }
}

impl Drop for InactivityMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn countdown(
    timeout: Duration,
    mut activity: broadcast::Receiver<ActivityEvent>,
    armed: Arc<AtomicBool>,
    on_expire: Box<dyn FnOnce() + Send>,
) {
    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);
    let mut listening = true;

    loop {
        tokio::select! {
            () = &mut deadline => break,
            event = activity.recv(), if listening => match event {
                Ok(event) => {
                    trace!(?event, "Activity, resetting idle countdown");
                    deadline.as_mut().reset(Instant::now() + timeout);
                }
                Err(RecvError::Lagged(_)) => {
                    deadline.as_mut().reset(Instant::now() + timeout);
                }
                Err(RecvError::Closed) => listening = false,
            },
        }
    }

    // stop() clears the flag, so a cancelled countdown can never fire
    if armed.swap(false, Ordering::SeqCst) {
        info!("Idle timeout reached");
        on_expire();
    }
}
