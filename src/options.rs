//! Engine configuration.
//!
//! This module provides [`EngineOptions`] and [`RuntimeLayout`], which
//! describe where the launcher and installer live inside an installation and
//! how the background lane paces its work.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Executable names inside an installation's `bin/` directory.
///
/// # Example
///
/// ```rust
/// use polyglot_check::RuntimeLayout;
/// use std::path::Path;
///
/// let layout = RuntimeLayout::default();
/// assert_eq!(
///     layout.launcher_path(Path::new("/opt/runtime")),
///     Path::new("/opt/runtime/bin/node"),
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeLayout {
    /// Launcher that runs the diagnostic payload.
    ///
    /// Default: `node`
    pub launcher: String,

    /// Component installer that adds languages.
    ///
    /// Default: `gu`
    pub installer: String,
}

impl RuntimeLayout {
    /// `<root>/bin/<launcher>`
    pub fn launcher_path(&self, root: &Path) -> PathBuf {
        root.join("bin").join(&self.launcher)
    }

    /// `<root>/bin/<installer>`
    pub fn installer_path(&self, root: &Path) -> PathBuf {
        root.join("bin").join(&self.installer)
    }

    /// True when `root` holds a launcher binary.
    pub fn has_launcher(&self, root: &Path) -> bool {
        self.launcher_path(root).is_file()
    }
}

impl Default for RuntimeLayout {
    fn default() -> Self {
        Self {
            launcher: "node".to_string(),
            installer: "gu".to_string(),
        }
    }
}

/// Configuration options for the verification-and-provisioning engine.
///
/// # Default Behavior
///
/// Path edits settle for one second before a probe is scheduled, the output
/// read loop polls for process termination every 100 ms, and a probe that
/// has not finished after a minute is killed. Installs never time out.
///
/// # Example
///
/// ```rust
/// use polyglot_check::EngineOptions;
/// use std::time::Duration;
///
/// let opts = EngineOptions {
///     debounce: Duration::from_millis(250),
///     ..Default::default()
/// };
/// assert_eq!(opts.poll_interval, Duration::from_millis(100));
/// ```
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Names of the launcher and installer executables.
    pub layout: RuntimeLayout,

    /// Quiet interval after the last path change before a probe runs.
    ///
    /// Default: 1 second
    pub debounce: Duration,

    /// Upper bound of the termination poll performed after each output chunk.
    ///
    /// Default: 100 milliseconds
    pub poll_interval: Duration,

    /// Kill the diagnostic process if it runs longer than this.
    ///
    /// `None` lets a probe run indefinitely. Default: 60 seconds
    pub probe_timeout: Option<Duration>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            layout: RuntimeLayout::default(),
            debounce: Duration::from_millis(1000),
            poll_interval: Duration::from_millis(100),
            probe_timeout: Some(Duration::from_secs(60)),
        }
    }
}
