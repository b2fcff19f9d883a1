//! Lifecycle of a single install attempt.

use crate::provision::ProvisionError;
use crate::Language;

/// State of the most recent install attempt.
///
/// An attempt moves `Idle → Running → {Succeeded, Failed, Cancelled}`; a new
/// request starts over at `Running`.
///
/// # Example
///
/// ```rust
/// use polyglot_check::{InstallState, Language};
///
/// fn describe(state: &InstallState) -> String {
///     match state {
///         InstallState::Failed { language, error } => {
///             format!("{} failed: {} ({})", language, error, error.fix_suggestion())
///         }
///         other => other.description().to_string(),
///     }
/// }
///
/// assert_eq!(describe(&InstallState::Running { language: Language::Js }), "Installing");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum InstallState {
    /// No install was requested yet.
    #[default]
    Idle,

    /// The installer is running.
    Running {
        /// The language being installed.
        language: Language,
    },

    /// The installer exited with code 0 and the installation was re-probed.
    Succeeded {
        /// The language that was installed.
        language: Language,
    },

    /// The install could not start or the installer reported failure.
    Failed {
        /// The language that was requested.
        language: Language,
        /// What went wrong.
        error: ProvisionError,
    },

    /// The installer was stopped on request.
    Cancelled {
        /// The language that was requested.
        language: Language,
    },
}

impl InstallState {
    /// Short human-readable description of the state.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Running { .. } => "Installing",
            Self::Succeeded { .. } => "Installation complete",
            Self::Failed { .. } => "Installation failed",
            Self::Cancelled { .. } => "Installation cancelled",
        }
    }

    /// Whether an installer is currently running.
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }

    /// The language of the current or last attempt.
    pub fn language(&self) -> Option<Language> {
        match self {
            Self::Idle => None,
            Self::Running { language }
            | Self::Succeeded { language }
            | Self::Failed { language, .. }
            | Self::Cancelled { language } => Some(*language),
        }
    }
}
