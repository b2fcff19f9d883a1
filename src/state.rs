//! Observable state shared with the collaborator.

use crate::status::{reconcile_languages, LanguageIntents};
use crate::{Capabilities, InstallState, Language};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Immutable view of everything the collaborator displays.
///
/// A fresh snapshot is handed to the [`StateObserver`] after every change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Candidate installation root.
    pub install_path: Option<PathBuf>,

    /// Latest probe result for `install_path`; `None` while unknown.
    pub capabilities: Option<Arc<Capabilities>>,

    /// Samples the user opted into.
    pub intents: LanguageIntents,

    /// The single outstanding missing-language request.
    pub missing_language: Option<Language>,

    /// A probe is running.
    pub working: bool,

    /// The install output panel should be shown.
    pub output_visible: bool,

    /// Live installer transcript.
    pub process_output: String,

    /// State of the latest install attempt.
    pub install: InstallState,
}

impl Snapshot {
    /// Whether the sample for `lang` may be offered; false while it is the
    /// outstanding missing-language request.
    pub fn is_selectable(&self, lang: Language) -> bool {
        self.missing_language != Some(lang)
    }

    /// Whether any sample is selected.
    pub fn any_sample(&self) -> bool {
        self.intents.any()
    }

    /// Whether `lang` is reported available by the latest snapshot.
    pub fn is_installed(&self, lang: Language) -> bool {
        self.capabilities
            .as_deref()
            .is_some_and(|caps| caps.is_available(lang))
    }

    /// Clear unmet intents and raise the first of them as the request.
    pub(crate) fn reconcile(&mut self) {
        let result = reconcile_languages(&self.intents, self.capabilities.as_deref());
        for lang in result.cleared {
            self.intents.set(lang, false);
        }
        if let Some(missing) = result.missing {
            self.missing_language = Some(missing);
        }
    }
}

/// Receives a snapshot after every state change.
///
/// Called synchronously on the thread that made the change, while the state
/// lock is held, so snapshots arrive in order. Implementations must return
/// quickly and must not call back into the engine.
///
/// Any `Fn(&Snapshot) + Send + Sync` closure is an observer.
pub trait StateObserver: Send + Sync + 'static {
    /// The state changed; `snapshot` is the new state.
    fn state_changed(&self, snapshot: &Snapshot);
}

impl<F> StateObserver for F
where
    F: Fn(&Snapshot) + Send + Sync + 'static,
{
    fn state_changed(&self, snapshot: &Snapshot) {
        self(snapshot)
    }
}

struct Inner {
    snapshot: Snapshot,
    /// Bumped on every path change; probe results carry the value they
    /// were started with and are dropped once it is outdated.
    generation: u64,
}

/// Lock-protected state plus its observer.
pub(crate) struct StateStore {
    inner: Mutex<Inner>,
    observer: Box<dyn StateObserver>,
}

impl StateStore {
    pub(crate) fn new(observer: Box<dyn StateObserver>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                snapshot: Snapshot::default(),
                generation: 0,
            }),
            observer,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        self.lock().snapshot.clone()
    }

    /// Current path together with its generation.
    pub(crate) fn current_path(&self) -> (Option<PathBuf>, u64) {
        let inner = self.lock();
        (inner.snapshot.install_path.clone(), inner.generation)
    }

    /// Apply `f` and publish the result.
    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut Snapshot) -> R) -> R {
        let mut inner = self.lock();
        let result = f(&mut inner.snapshot);
        self.observer.state_changed(&inner.snapshot);
        result
    }

    /// Apply `f` only if no path change happened since `generation`.
    pub(crate) fn update_if_current(&self, generation: u64, f: impl FnOnce(&mut Snapshot)) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation {
            return false;
        }
        f(&mut inner.snapshot);
        self.observer.state_changed(&inner.snapshot);
        true
    }

    /// Switch to a new path, invalidating the current capabilities.
    pub(crate) fn change_path(&self, path: Option<&Path>) -> u64 {
        let mut inner = self.lock();
        inner.generation += 1;
        inner.snapshot.install_path = path.map(Path::to_path_buf);
        inner.snapshot.capabilities = None;
        self.observer.state_changed(&inner.snapshot);
        inner.generation
    }
}
