//! Recurring page timers.
//!
//! Auto-save and refresh timers run as tokio tasks that post a [`Tick`] to
//! the shell's event channel; the shell then calls into the active page.
//! Cancelling a timer is explicit, through [`TimerHandle::stop`] or by
//! dropping the handle.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, trace};

/// Which page timer fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Contact form auto-save.
    ContactAutosave,
    /// Medical form auto-save.
    MedicalAutosave,
    /// Home dashboard refresh.
    HomeRefresh,
    /// Location status refresh.
    LocationRefresh,
}

impl fmt::Display for TimerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ContactAutosave => write!(f, "contact-autosave"),
            Self::MedicalAutosave => write!(f, "medical-autosave"),
            Self::HomeRefresh => write!(f, "home-refresh"),
            Self::LocationRefresh => write!(f, "location-refresh"),
        }
    }
}

/// One timer firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// The timer that fired.
    pub kind: TimerKind,
}

/// Sending half of the tick channel.
pub type TickSender = mpsc::Sender<Tick>;

/// Receiving half of the tick channel.
pub type TickReceiver = mpsc::Receiver<Tick>;

/// Create a tick channel.
#[must_use]
pub fn channel() -> (TickSender, TickReceiver) {
    mpsc::channel(32)
}

/// Handle to a running periodic timer.
///
/// Dropping the handle stops the timer.
pub struct TimerHandle {
    kind: TimerKind,
    stop_signal: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl TimerHandle {
    /// The timer kind.
    #[must_use]
    pub fn kind(&self) -> TimerKind {
        self.kind
    }

    /// Signal the timer to stop and cancel its task.
    pub fn stop(&mut self) {
        self.stop_signal.store(true, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
            debug!(timer = %self.kind, "Timer stopped");
        }
    }

    /// Check if the stop signal has been sent.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stop_signal.load(Ordering::SeqCst)
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle")
            .field("kind", &self.kind)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// Start a timer that posts a tick every `period`, first after one period.
///
/// Must be called from within a tokio runtime. A tick is skipped if the
/// shell has fallen behind; the timer ends once the receiver is gone.
#[must_use]
pub fn spawn_periodic(kind: TimerKind, period: Duration, tx: TickSender) -> TimerHandle {
    let stop_signal = Arc::new(AtomicBool::new(false));
    let signal = Arc::clone(&stop_signal);

    let task = tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if signal.load(Ordering::SeqCst) {
                break;
            }
            match tx.try_send(Tick { kind }) {
                Ok(()) => trace!(timer = %kind, "Tick"),
                Err(TrySendError::Full(_)) => trace!(timer = %kind, "Tick skipped, shell busy"),
                Err(TrySendError::Closed(_)) => break,
            }
        }
    });

    debug!(timer = %kind, period = ?period, "Timer started");
    TimerHandle {
        kind,
        stop_signal,
        task: Some(task),
    }
}
