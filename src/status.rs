//! Pure reconciliation of probe results into status and language decisions.

use crate::{Capabilities, Language, RuntimeLayout};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Health of the current installation, ordered by its numeric code.
///
/// The code is derived on demand from the install path and the latest
/// capability snapshot; it is never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StatusCode {
    /// Everything required is present.
    Healthy = 0,
    /// No path, or the path holds no launcher.
    LauncherMissing = 1,
    /// The launcher has no worker threads support.
    WorkerThreadsMissing = 3,
    /// The current path has not been probed yet.
    ProbePending = 4,
    /// The launcher does not expose host interop.
    HostInteropMissing = 5,
}

impl StatusCode {
    /// Numeric code: 0 healthy, 1, 3, 4 or 5 otherwise.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Whether the installation is usable.
    pub fn is_healthy(self) -> bool {
        self == Self::Healthy
    }

    /// User-facing guidance for this status.
    ///
    /// ```rust
    /// use polyglot_check::StatusCode;
    ///
    /// assert_eq!(StatusCode::ProbePending.description(), "Checking the installation");
    /// ```
    pub fn description(self) -> &'static str {
        match self {
            Self::Healthy => "Installation is ready",
            Self::LauncherMissing => "Select an installation directory that contains bin/node",
            Self::WorkerThreadsMissing => "The launcher does not support worker threads; use a newer release",
            Self::ProbePending => "Checking the installation",
            Self::HostInteropMissing => "The launcher cannot access host objects; use a polyglot-enabled release",
        }
    }
}

/// Compute the status of `path` given the latest snapshot.
///
/// Rules are evaluated in priority order and the first match wins:
///
/// 1. no path, or no `bin/<launcher>` under it → [`StatusCode::LauncherMissing`]
/// 2. no snapshot yet → [`StatusCode::ProbePending`]
/// 3. host interop type is not `"object"` → [`StatusCode::HostInteropMissing`]
/// 4. worker threads type is not `"object"` → [`StatusCode::WorkerThreadsMissing`]
/// 5. otherwise → [`StatusCode::Healthy`]
pub fn error_code(
    layout: &RuntimeLayout,
    path: Option<&Path>,
    capabilities: Option<&Capabilities>,
) -> StatusCode {
    let Some(path) = path else {
        return StatusCode::LauncherMissing;
    };
    if !layout.has_launcher(path) {
        return StatusCode::LauncherMissing;
    }
    let Some(caps) = capabilities else {
        return StatusCode::ProbePending;
    };
    if !caps.has_host_interop() {
        return StatusCode::HostInteropMissing;
    }
    if !caps.has_worker_threads() {
        return StatusCode::WorkerThreadsMissing;
    }
    StatusCode::Healthy
}

/// The sample languages the user opted into.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageIntents {
    selected: BTreeSet<Language>,
}

impl LanguageIntents {
    /// Whether the sample for `lang` is selected.
    pub fn is_selected(&self, lang: Language) -> bool {
        self.selected.contains(&lang)
    }

    /// Select or deselect `lang`. Languages without a sample are ignored.
    pub fn set(&mut self, lang: Language, selected: bool) {
        if !lang.has_sample() {
            return;
        }
        if selected {
            self.selected.insert(lang);
        } else {
            self.selected.remove(&lang);
        }
    }

    /// Whether any sample is selected.
    pub fn any(&self) -> bool {
        !self.selected.is_empty()
    }

    /// Selected languages in evaluation order.
    pub fn iter(&self) -> impl Iterator<Item = Language> + '_ {
        self.selected.iter().copied()
    }
}

/// Outcome of reconciling intents against a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Intents that must be cleared because the language is unavailable.
    pub cleared: Vec<Language>,
    /// The language to raise as the missing-language request.
    pub missing: Option<Language>,
}

/// Decide which selected samples cannot be honored.
///
/// Every selected language the snapshot reports unavailable is cleared; the
/// first of them in evaluation order becomes the single missing-language
/// request. Nothing is decided while the snapshot is unknown.
pub fn reconcile_languages(
    intents: &LanguageIntents,
    capabilities: Option<&Capabilities>,
) -> Reconciliation {
    let Some(caps) = capabilities else {
        return Reconciliation::default();
    };

    let cleared: Vec<Language> = Language::samples()
        .filter(|lang| intents.is_selected(*lang) && !caps.is_available(*lang))
        .collect();
    let missing = cleared.first().copied();

    Reconciliation { cleared, missing }
}
