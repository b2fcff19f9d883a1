//! Error types for install attempts.
//!
//! Every variant carries an actionable fix suggestion. Install errors are
//! recorded in [`InstallState::Failed`](crate::InstallState) and in the live
//! output; they are never returned to the caller that requested the install.

use std::path::PathBuf;
use thiserror::Error;

/// Reasons an install attempt failed.
///
/// # Example
///
/// ```rust
/// use polyglot_check::ProvisionError;
///
/// fn report(error: &ProvisionError) {
///     eprintln!("Installation failed: {}", error);
///     eprintln!("To fix: {}", error.fix_suggestion());
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ProvisionError {
    /// No installation path is set.
    #[error("No installation selected")]
    NoInstallPath {
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// The installer binary is missing from the installation.
    #[error("{} not found", .installer.display())]
    InstallerNotFound {
        /// Path where the installer was expected.
        installer: PathBuf,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// The installer exists but could not be started.
    #[error("Cannot start installer: {message}")]
    Launch {
        /// Description of the launch failure.
        message: String,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// Reading the installer output failed.
    #[error("Installer output could not be read: {message}")]
    Io {
        /// Description of the I/O failure.
        message: String,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// The installer exited with a non-zero code.
    #[error("{command} finished with code {code}")]
    ExitCode {
        /// The command line that was run.
        command: String,
        /// Exit code reported by the installer.
        code: i32,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },
}

impl ProvisionError {
    /// Get an actionable suggestion for fixing this error.
    pub fn fix_suggestion(&self) -> &str {
        match self {
            Self::NoInstallPath { fix } => fix,
            Self::InstallerNotFound { fix, .. } => fix,
            Self::Launch { fix, .. } => fix,
            Self::Io { fix, .. } => fix,
            Self::ExitCode { fix, .. } => fix,
        }
    }
}
