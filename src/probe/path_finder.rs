//! Locating a candidate installation on this machine.

use crate::RuntimeLayout;
use std::path::{Path, PathBuf};

/// Environment variables that commonly point at a runtime root.
const HOME_VARIABLES: &[&str] = &["GRAALVM_HOME", "JAVA_HOME"];

/// Find the root of an installation that ships the launcher.
///
/// Checks the root directories named by `GRAALVM_HOME` and `JAVA_HOME`
/// first, then looks the launcher up on `PATH` via the `which` crate and
/// returns the directory two levels above the resolved binary
/// (`<root>/bin/<launcher>`).
///
/// # Returns
///
/// `Some(PathBuf)` if a root with `bin/<launcher>` is found, `None` otherwise.
pub fn find_install_root(layout: &RuntimeLayout) -> Option<PathBuf> {
    for variable in HOME_VARIABLES {
        if let Some(root) = std::env::var_os(variable).map(PathBuf::from) {
            if layout.has_launcher(&root) {
                return Some(root);
            }
        }
    }

    let launcher = which::which(&layout.launcher).ok()?;
    // Follow symlinks such as /usr/bin/node -> /opt/runtime/bin/node
    let launcher = std::fs::canonicalize(&launcher).unwrap_or(launcher);
    root_of(&launcher).filter(|root| layout.has_launcher(root))
}

fn root_of(launcher: &Path) -> Option<PathBuf> {
    launcher.parent()?.parent().map(Path::to_path_buf)
}
