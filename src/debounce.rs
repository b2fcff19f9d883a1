//! Cancel-and-reschedule timer for a single watched input.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::debug;

/// Runs a callback once its input has been quiet for a fixed delay.
///
/// At most one callback is pending. Scheduling again before the delay has
/// elapsed aborts the pending callback and starts a new delay window, so a
/// burst of changes results in a single callback for the last one. Values
/// are never compared: re-scheduling with an unchanged value still fires.
///
/// # Example
///
/// ```rust,no_run
/// use polyglot_check::Debouncer;
/// use std::time::Duration;
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let debouncer = Debouncer::new(Duration::from_millis(1000));
///     for path in ["/opt/g", "/opt/gr", "/opt/graal"] {
///         debouncer.schedule(move || println!("checking {path}"));
///     }
///     // only "checking /opt/graal" is printed
///     tokio::time::sleep(Duration::from_millis(1500)).await;
/// }
/// ```
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    runtime: Handle,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    /// Create a debouncer on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn new(delay: Duration) -> Self {
        Self::with_runtime(delay, Handle::current())
    }

    /// Create a debouncer whose timers run on `runtime`.
    pub fn with_runtime(delay: Duration, runtime: Handle) -> Self {
        Self {
            delay,
            runtime,
            pending: Mutex::new(None),
        }
    }

    /// The fixed quiet interval.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Replace any pending callback with `callback`, due after the delay.
    ///
    /// Never blocks; the wait happens on the runtime.
    pub fn schedule<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let delay = self.delay;
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = pending.take() {
            if !previous.is_finished() {
                debug!("pending check superseded");
            }
            previous.abort();
        }
        *pending = Some(self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            callback();
        }));
    }

    /// Drop the pending callback, if any.
    pub fn cancel(&self) {
        let pending = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = pending {
            task.abort();
        }
    }

    /// Whether a callback is waiting for its delay to elapse.
    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
