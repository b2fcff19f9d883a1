//! Running the installer for the outstanding missing language.

use crate::provision::{InstallState, ProvisionError};
use crate::state::StateStore;
use crate::{CapabilityProbe, KillSwitch, Language, LaunchError, OutputSink, ProcessHandle, RuntimeLayout};
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

enum Outcome {
    Completed,
    Cancelled,
}

/// Where the current install stands with respect to its process.
#[derive(Debug, Default)]
enum Active {
    #[default]
    Idle,
    /// Accepted and published as running, installer not spawned yet.
    Starting { stop_requested: bool },
    Running(KillSwitch),
}

/// Drives one install at a time and publishes its transcript.
///
/// `install` runs only on the background lane; `stop` may be called from
/// anywhere and only touches the kill switch of the active process. A stop
/// that arrives before the installer is spawned is held and applied as soon
/// as the process exists.
pub(crate) struct ProvisionCoordinator {
    layout: RuntimeLayout,
    poll_interval: Duration,
    store: Arc<StateStore>,
    probe: CapabilityProbe,
    active: Mutex<Active>,
}

impl ProvisionCoordinator {
    pub(crate) fn new(
        layout: RuntimeLayout,
        poll_interval: Duration,
        store: Arc<StateStore>,
        probe: CapabilityProbe,
    ) -> Self {
        Self {
            layout,
            poll_interval,
            store,
            probe,
            active: Mutex::new(Active::Idle),
        }
    }

    fn active_slot(&self) -> MutexGuard<'_, Active> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install `language` if it is still the missing-language request.
    ///
    /// Returns `None` when the request was withdrawn or already served while
    /// the task was queued.
    pub(crate) async fn install(&self, language: Language) -> Option<InstallState> {
        if self.store.snapshot().missing_language != Some(language) {
            debug!(%language, "install no longer requested, skipped");
            return None;
        }
        let (path, generation) = self.store.current_path();

        let store = self.store.clone();
        let mut sink = OutputSink::with_publisher(move |text| {
            store.update(|s| s.process_output = text.to_string());
        });
        let Some(root) = path else {
            let error = ProvisionError::NoInstallPath {
                fix: "Select an installation directory first".to_string(),
            };
            sink.reset(&error.to_string());
            self.store.update(|s| s.output_visible = true);
            return Some(self.fail(language, error));
        };

        let installer = self.layout.installer_path(&root);
        let command = format!("{} install {}", installer.display(), language.id());
        info!(%language, installer = %installer.display(), "install started");
        sink.reset(&format!("Running {command}\n"));
        *self.active_slot() = Active::Starting {
            stop_requested: false,
        };
        self.store.update(|s| {
            s.install = InstallState::Running { language };
            s.output_visible = true;
        });

        let outcome = self.run(&installer, language, &command, &mut sink).await;
        *self.active_slot() = Active::Idle;

        let state = match outcome {
            Ok(Outcome::Completed) => {
                info!(%language, "install finished");
                self.complete(language, &root, generation).await;
                InstallState::Succeeded { language }
            }
            Ok(Outcome::Cancelled) => {
                info!(%language, "install cancelled");
                sink.append(&format!("\n\n{command} cancelled"));
                let state = InstallState::Cancelled { language };
                self.store.update(|s| s.install = state.clone());
                state
            }
            Err(error) => {
                sink.append(&format!("\n\n{error}"));
                self.fail(language, error)
            }
        };
        Some(state)
    }

    async fn run(
        &self,
        installer: &Path,
        language: Language,
        command: &str,
        sink: &mut OutputSink,
    ) -> Result<Outcome, ProvisionError> {
        if !installer.is_file() {
            return Err(ProvisionError::InstallerNotFound {
                installer: installer.to_path_buf(),
                fix: format!("Use a runtime release that ships bin/{}", self.layout.installer),
            });
        }

        let mut handle = ProcessHandle::start(installer, &["install", language.id()])
            .map_err(|e| match e {
                LaunchError::NotFound { program } => ProvisionError::InstallerNotFound {
                    installer: program,
                    fix: format!("Use a runtime release that ships bin/{}", self.layout.installer),
                },
                other => ProvisionError::Launch {
                    message: other.to_string(),
                    fix: "Check that the installer is executable".to_string(),
                },
            })?
            .with_poll_interval(self.poll_interval);

        if self.arm(handle.kill_switch()) {
            debug!(%language, "stop requested before the installer started");
            handle.kill();
        }
        let streamed = stream(&mut handle, sink).await;
        *self.active_slot() = Active::Idle;

        let code = streamed.map_err(|e| ProvisionError::Io {
            message: e.to_string(),
            fix: "Retry the installation".to_string(),
        })?;

        if code == 0 {
            return Ok(Outcome::Completed);
        }
        if handle.was_killed() {
            return Ok(Outcome::Cancelled);
        }
        Err(ProvisionError::ExitCode {
            command: command.to_string(),
            code,
            fix: "See the installer output for details".to_string(),
        })
    }

    /// Publish the kill switch of the spawned installer. Returns true when a
    /// stop was requested while it was starting.
    fn arm(&self, switch: KillSwitch) -> bool {
        let mut active = self.active_slot();
        let stop_requested = matches!(*active, Active::Starting { stop_requested: true });
        *active = Active::Running(switch);
        stop_requested
    }

    async fn complete(&self, language: Language, root: &Path, generation: u64) {
        self.store.update(|s| {
            s.missing_language = None;
            s.working = true;
        });

        let caps = Arc::new(self.probe.probe(root).await);
        if !self
            .store
            .update_if_current(generation, |s| s.capabilities = Some(caps))
        {
            debug!(%language, "installation changed during install, probe result dropped");
        }

        self.store.update(|s| {
            s.working = false;
            s.intents.set(language, true);
            s.reconcile();
            s.output_visible = false;
            s.install = InstallState::Succeeded { language };
        });
    }

    fn fail(&self, language: Language, error: ProvisionError) -> InstallState {
        warn!(%language, error = %error, "install failed");
        let state = InstallState::Failed { language, error };
        self.store.update(|s| s.install = state.clone());
        state
    }

    /// Kill the active installer, or hide the output panel when none runs.
    pub(crate) fn stop(&self) {
        if self.request_kill() {
            debug!("install stop requested");
            return;
        }
        self.store.update(|s| s.output_visible = false);
    }

    /// Kill the active installer, if any, without touching the state.
    pub(crate) fn kill_active(&self) {
        self.request_kill();
    }

    fn request_kill(&self) -> bool {
        match &mut *self.active_slot() {
            Active::Running(switch) => {
                switch.kill();
                true
            }
            Active::Starting { stop_requested } => {
                *stop_requested = true;
                true
            }
            Active::Idle => false,
        }
    }
}

async fn stream(handle: &mut ProcessHandle, sink: &mut OutputSink) -> io::Result<i32> {
    while let Some(chunk) = handle.next_chunk().await? {
        sink.append(&chunk);
    }
    handle.wait().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Snapshot;
    use crate::EngineOptions;
    use std::fs;

    fn coordinator() -> ProvisionCoordinator {
        let options = EngineOptions::default();
        let store = Arc::new(StateStore::new(Box::new(|_: &Snapshot| {})));
        ProvisionCoordinator::new(
            options.layout.clone(),
            options.poll_interval,
            store,
            CapabilityProbe::new(&options),
        )
    }

    #[tokio::test]
    async fn test_skipped_when_not_requested() {
        let coordinator = coordinator();
        assert_eq!(coordinator.install(Language::Js).await, None);
        assert_eq!(coordinator.store.snapshot().install, InstallState::Idle);
    }

    #[tokio::test]
    async fn test_no_install_path() {
        let coordinator = coordinator();
        coordinator.store.update(|s| s.missing_language = Some(Language::Ruby));

        let state = coordinator.install(Language::Ruby).await;
        assert!(matches!(
            state,
            Some(InstallState::Failed {
                error: ProvisionError::NoInstallPath { .. },
                ..
            })
        ));
        let snapshot = coordinator.store.snapshot();
        assert_eq!(snapshot.process_output, "No installation selected");
        assert_eq!(snapshot.missing_language, Some(Language::Ruby));
    }

    #[tokio::test]
    async fn test_missing_installer_fails_without_spawning() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("bin")).unwrap();
        let coordinator = coordinator();
        coordinator.store.change_path(Some(dir.path()));
        coordinator.store.update(|s| s.missing_language = Some(Language::Js));

        let state = coordinator.install(Language::Js).await;

        let installer = dir.path().join("bin").join("gu");
        assert_eq!(
            state,
            Some(InstallState::Failed {
                language: Language::Js,
                error: ProvisionError::InstallerNotFound {
                    installer: installer.clone(),
                    fix: "Use a runtime release that ships bin/gu".to_string(),
                },
            })
        );
        let snapshot = coordinator.store.snapshot();
        assert!(snapshot.output_visible);
        assert!(snapshot
            .process_output
            .ends_with(&format!("{} not found", installer.display())));
        assert_eq!(snapshot.missing_language, Some(Language::Js));
    }

    #[test]
    fn test_stop_without_active_process_hides_output() {
        let coordinator = coordinator();
        coordinator.store.update(|s| s.output_visible = true);
        coordinator.stop();
        assert!(!coordinator.store.snapshot().output_visible);
    }

    #[test]
    fn test_stop_while_starting_is_applied_once_spawned() {
        let coordinator = coordinator();
        coordinator.store.update(|s| s.output_visible = true);
        *coordinator.active_slot() = Active::Starting {
            stop_requested: false,
        };

        coordinator.stop();
        assert!(coordinator.store.snapshot().output_visible);

        let (switch, _rx) = KillSwitch::new();
        assert!(coordinator.arm(switch.clone()));
        assert!(!switch.is_killed());

        coordinator.stop();
        assert!(switch.is_killed());
        assert!(coordinator.store.snapshot().output_visible);
    }

    #[test]
    fn test_arm_without_pending_stop() {
        let coordinator = coordinator();
        *coordinator.active_slot() = Active::Starting {
            stop_requested: false,
        };
        let (switch, _rx) = KillSwitch::new();
        assert!(!coordinator.arm(switch));
        assert!(matches!(*coordinator.active_slot(), Active::Running(_)));
    }
}
