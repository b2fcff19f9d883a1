//! The verification-and-provisioning engine.

use crate::provision::ProvisionCoordinator;
use crate::state::{Snapshot, StateObserver, StateStore};
use crate::status::error_code;
use crate::{CapabilityProbe, Debouncer, EngineOptions, Language, StatusCode};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info};

/// Work executed on the background lane, strictly in order.
#[derive(Debug)]
enum Task {
    /// Probe `path`; the result only lands if `generation` is still current.
    Probe { path: PathBuf, generation: u64 },
    /// Install a language if it is still the missing-language request.
    Install(Language),
}

/// Owns the state, the debounce timer and the single background lane.
///
/// Every method except [`Engine::shutdown`] returns immediately: state
/// changes are applied under a short lock and published to the observer,
/// and slow work is handed to the lane. The lane runs one task at a time, so
/// at most one probe or install process is alive.
///
/// # Example
///
/// ```rust,no_run
/// use polyglot_check::{Engine, EngineOptions, Language, Snapshot};
///
/// #[tokio::main]
/// async fn main() {
///     let engine = Engine::start(EngineOptions::default(), |snapshot: &Snapshot| {
///         println!("working={} missing={:?}", snapshot.working, snapshot.missing_language);
///     });
///
///     engine.set_install_path("/opt/graalvm");
///     engine.set_language_intent(Language::Ruby, true);
///     tokio::time::sleep(std::time::Duration::from_secs(5)).await;
///     println!("{}", engine.status().description());
///
///     engine.shutdown().await.unwrap();
/// }
/// ```
pub struct Engine {
    options: EngineOptions,
    store: Arc<StateStore>,
    debouncer: Debouncer,
    coordinator: Arc<ProvisionCoordinator>,
    tasks: mpsc::UnboundedSender<Task>,
    closing: Arc<AtomicBool>,
    lane: JoinHandle<()>,
}

impl Engine {
    /// Start the engine and its background lane.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn start(options: EngineOptions, observer: impl StateObserver) -> Self {
        let store = Arc::new(StateStore::new(Box::new(observer)));
        let probe = CapabilityProbe::new(&options);
        let coordinator = Arc::new(ProvisionCoordinator::new(
            options.layout.clone(),
            options.poll_interval,
            store.clone(),
            probe.clone(),
        ));
        let closing = Arc::new(AtomicBool::new(false));
        let (tasks, rx) = mpsc::unbounded_channel();

        let lane = tokio::spawn(run_lane(
            rx,
            store.clone(),
            probe,
            coordinator.clone(),
            closing.clone(),
        ));

        Self {
            debouncer: Debouncer::new(options.debounce),
            options,
            store,
            coordinator,
            tasks,
            closing,
            lane,
        }
    }

    /// The options the engine was started with.
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Point the engine at a new candidate installation.
    ///
    /// The current capabilities become unknown at once and a probe is
    /// scheduled after the debounce delay. Further changes within the delay
    /// replace the pending probe.
    ///
    /// The probe targets whatever path is current when the delay elapses,
    /// so concurrent edits always end with the newest path being probed.
    pub fn set_install_path(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        let generation = self.store.change_path(Some(&path));
        debug!(path = %path.display(), generation, "probe scheduled");

        let tasks = self.tasks.clone();
        let store = self.store.clone();
        self.debouncer.schedule(move || {
            let (path, generation) = store.current_path();
            let Some(path) = path else {
                debug!("installation cleared, probe dropped");
                return;
            };
            if tasks.send(Task::Probe { path, generation }).is_err() {
                error!("background lane is gone, probe dropped");
            }
        });
    }

    /// Forget the installation. Nothing is probed for an absent path.
    pub fn clear_install_path(&self) {
        self.debouncer.cancel();
        self.store.change_path(None);
    }

    /// Select or deselect the sample for `language`.
    ///
    /// A selection the latest capabilities cannot honor is cleared again and
    /// raised as the missing-language request.
    pub fn set_language_intent(&self, language: Language, selected: bool) {
        self.store.update(|s| {
            s.intents.set(language, selected);
            s.reconcile();
        });
    }

    /// Queue an install of the outstanding missing language.
    ///
    /// Returns false when there is nothing to install or an install is
    /// already running.
    pub fn install_missing(&self) -> bool {
        let snapshot = self.store.snapshot();
        let Some(language) = snapshot.missing_language else {
            return false;
        };
        if snapshot.install.is_running() {
            return false;
        }
        self.enqueue(Task::Install(language))
    }

    /// Make `language` the missing-language request and queue its install.
    pub fn request_install(&self, language: Language) -> bool {
        self.store.update(|s| s.missing_language = Some(language));
        self.enqueue(Task::Install(language))
    }

    /// Stop the running install, or hide the output panel if none runs.
    pub fn stop(&self) {
        self.coordinator.stop();
    }

    /// The current state.
    pub fn snapshot(&self) -> Snapshot {
        self.store.snapshot()
    }

    /// Health of the current installation.
    pub fn status(&self) -> StatusCode {
        let snapshot = self.store.snapshot();
        error_code(
            &self.options.layout,
            snapshot.install_path.as_deref(),
            snapshot.capabilities.as_deref(),
        )
    }

    /// Stop all work and wait for the background lane to finish.
    ///
    /// A running install is killed and queued tasks are dropped. Fails only
    /// if the lane itself panicked or was aborted.
    pub async fn shutdown(self) -> Result<(), JoinError> {
        let Engine {
            debouncer,
            coordinator,
            tasks,
            closing,
            lane,
            ..
        } = self;

        closing.store(true, Ordering::Release);
        debouncer.cancel();
        coordinator.kill_active();
        drop(tasks);

        lane.await.map_err(|e| {
            error!(error = %e, "background lane failed");
            e
        })
    }

    fn enqueue(&self, task: Task) -> bool {
        debug!(?task, "task queued");
        match self.tasks.send(task) {
            Ok(()) => true,
            Err(_) => {
                error!("background lane is gone, task dropped");
                false
            }
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("options", &self.options)
            .field("closing", &self.closing.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

async fn run_lane(
    mut rx: mpsc::UnboundedReceiver<Task>,
    store: Arc<StateStore>,
    probe: CapabilityProbe,
    coordinator: Arc<ProvisionCoordinator>,
    closing: Arc<AtomicBool>,
) {
    while let Some(task) = rx.recv().await {
        if closing.load(Ordering::Acquire) {
            break;
        }
        match task {
            Task::Probe { path, generation } => {
                run_probe(&store, &probe, path, generation).await;
            }
            Task::Install(language) => {
                if let Some(state) = coordinator.install(language).await {
                    info!(%language, state = state.description(), "install request handled");
                }
            }
        }
    }
    debug!("background lane stopped");
}

async fn run_probe(store: &StateStore, probe: &CapabilityProbe, path: PathBuf, generation: u64) {
    if !store.update_if_current(generation, |s| s.working = true) {
        debug!(path = %path.display(), "stale probe skipped");
        return;
    }

    let caps = Arc::new(probe.probe(&path).await);
    let applied = store.update_if_current(generation, |s| {
        s.capabilities = Some(caps);
        s.working = false;
        s.reconcile();
    });
    if !applied {
        debug!(path = %path.display(), "stale probe result dropped");
        store.update(|s| s.working = false);
    }
}
