//! Running the diagnostic payload against an installation.

use super::parser::parse_report;
use super::script::launcher_args;
use crate::{Capabilities, EngineOptions, OutputSink, ProbeError, ProcessHandle, RuntimeLayout};
use std::io;
use std::path::Path;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Runs the diagnostic payload and decodes its report.
///
/// # Example
///
/// ```rust,no_run
/// use polyglot_check::{CapabilityProbe, EngineOptions};
/// use std::path::Path;
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let probe = CapabilityProbe::new(&EngineOptions::default());
///     let caps = probe.probe(Path::new("/opt/graalvm")).await;
///     match caps.launcher_error {
///         Some(error) => println!("probe failed: {error}"),
///         None => println!("worker threads: {:?}", caps.worker_threads_type_name),
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CapabilityProbe {
    layout: RuntimeLayout,
    poll_interval: Duration,
    timeout: Option<Duration>,
}

impl CapabilityProbe {
    /// Build a probe from the engine options.
    pub fn new(options: &EngineOptions) -> Self {
        Self {
            layout: options.layout.clone(),
            poll_interval: options.poll_interval,
            timeout: options.probe_timeout,
        }
    }

    /// Probe the installation rooted at `root`.
    ///
    /// Never fails: a missing launcher, a launch or read error, a timeout or
    /// an undecodable report all produce a snapshot with `launcher_error`
    /// set. A missing launcher is detected without spawning anything.
    pub async fn probe(&self, root: &Path) -> Capabilities {
        match self.run(root).await {
            Ok(caps) => {
                info!(
                    root = %root.display(),
                    java = ?caps.embedded_host_type_name,
                    worker_threads = ?caps.worker_threads_type_name,
                    "probe finished"
                );
                caps
            }
            Err(e) => {
                warn!(root = %root.display(), error = %e, "probe failed");
                e.into()
            }
        }
    }

    async fn run(&self, root: &Path) -> Result<Capabilities, ProbeError> {
        let launcher = self.layout.launcher_path(root);
        if !launcher.is_file() {
            return Err(ProbeError::LauncherMissing(launcher.display().to_string()));
        }

        let mut handle = ProcessHandle::start(&launcher, &launcher_args())
            .map_err(|e| ProbeError::Io(e.to_string()))?
            .with_poll_interval(self.poll_interval);

        let drained = match self.timeout {
            Some(limit) => match timeout(limit, drain(&mut handle)).await {
                Ok(drained) => drained,
                Err(_) => {
                    handle.kill();
                    return Err(ProbeError::Timeout(limit.as_millis()));
                }
            },
            None => drain(&mut handle).await,
        };

        let (output, exit_code) = drained.map_err(|e| ProbeError::Io(e.to_string()))?;
        debug!(launcher = %launcher.display(), exit_code, bytes = output.len(), "diagnostic exited");

        parse_report(&output)
    }
}

async fn drain(handle: &mut ProcessHandle) -> io::Result<(String, i32)> {
    let mut sink = OutputSink::new();
    while let Some(chunk) = handle.next_chunk().await? {
        sink.append(&chunk);
    }
    let exit_code = handle.wait().await?;
    Ok((sink.into_text(), exit_code))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_launcher_fast_path() {
        let probe = CapabilityProbe::new(&EngineOptions::default());
        let caps = probe.probe(Path::new("/nonexistent/runtime")).await;
        assert_eq!(
            caps.launcher_error.as_deref(),
            Some("/nonexistent/runtime/bin/node not found")
        );
        assert!(caps.embedded_host_type_name.is_none());
        assert!(caps.language_available.is_empty());
    }

    #[tokio::test]
    async fn test_missing_launcher_is_deterministic() {
        let probe = CapabilityProbe::new(&EngineOptions::default());
        let first = probe.probe(Path::new("/nonexistent/runtime")).await;
        let second = probe.probe(Path::new("/nonexistent/runtime")).await;
        assert_eq!(first, second);
    }
}
