//! End-to-end engine tests against a fake installation.
//!
//! Each test builds a temporary installation whose `bin/node` is a shell
//! script printing a diagnostic report and whose `bin/gu` simulates the
//! component installer. A language counts as available when
//! `<root>/lang/<id>` exists; the successful installer creates that file.

#![cfg(unix)]

use polyglot_check::{
    CapabilityProbe, Engine, EngineOptions, InstallState, Language, ProvisionError, Snapshot,
    StatusCode,
};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc::{self, UnboundedReceiver};

// Scripts are written and executed in the same process; running the tests
// one at a time keeps a concurrent fork from holding a script open for
// writing while it is exec'd.
static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(PoisonError::into_inner)
}

const INSTALLER_OK: &str = r#"#!/bin/sh
root=$(dirname "$0")/..
echo "Downloading component $2"
mkdir -p "$root/lang"
touch "$root/lang/$2"
echo "Installed $2"
"#;

const INSTALLER_FAIL: &str = r#"#!/bin/sh
echo "Error: no component $2 in catalog" >&2
exit 2
"#;

const INSTALLER_HANG: &str = r#"#!/bin/sh
echo "Downloading component $2"
exec sleep 30
"#;

fn launcher_script(java: &str, worker_threads: &str, delay_secs: u32) -> String {
    format!(
        r#"#!/bin/sh
root=$(dirname "$0")/..
echo probe >> "$root/probes.log"
sleep {delay_secs}
avail() {{ if [ -e "$root/lang/$1" ]; then echo true; else echo false; fi; }}
echo "Polyglot diagnostic"
echo "{{\"launcher\":null,\"java\":\"{java}\",\"js\":$(avail js),\"ruby\":$(avail ruby),\"R\":$(avail R),\"python\":$(avail python),\"worker_threads\":\"{worker_threads}\"}}"
"#
    )
}

fn write_executable(path: &Path, content: &str) {
    fs::write(path, content).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

struct Installation {
    dir: TempDir,
}

impl Installation {
    fn new(launcher: &str, installer: Option<&str>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("bin");
        fs::create_dir(&bin).unwrap();
        write_executable(&bin.join("node"), launcher);
        if let Some(installer) = installer {
            write_executable(&bin.join("gu"), installer);
        }
        Self { dir }
    }

    fn healthy(installer: Option<&str>) -> Self {
        Self::new(&launcher_script("object", "object", 0), installer)
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn provide(&self, lang: &str) {
        fs::create_dir_all(self.root().join("lang")).unwrap();
        fs::write(self.root().join("lang").join(lang), "").unwrap();
    }

    fn probe_count(&self) -> usize {
        fs::read_to_string(self.root().join("probes.log"))
            .map(|log| log.lines().count())
            .unwrap_or(0)
    }
}

fn options() -> EngineOptions {
    EngineOptions {
        debounce: Duration::from_millis(50),
        poll_interval: Duration::from_millis(20),
        probe_timeout: Some(Duration::from_secs(10)),
        ..Default::default()
    }
}

fn start_engine() -> (Engine, UnboundedReceiver<Snapshot>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let engine = Engine::start(options(), move |snapshot: &Snapshot| {
        let _ = tx.send(snapshot.clone());
    });
    (engine, rx)
}

async fn wait_for(
    rx: &mut UnboundedReceiver<Snapshot>,
    what: &str,
    condition: impl Fn(&Snapshot) -> bool,
) -> Snapshot {
    let result = tokio::time::timeout(Duration::from_secs(15), async {
        while let Some(snapshot) = rx.recv().await {
            if condition(&snapshot) {
                return Some(snapshot);
            }
        }
        None
    })
    .await;

    match result {
        Ok(Some(snapshot)) => snapshot,
        Ok(None) => panic!("observer closed while waiting for {what}"),
        Err(_) => panic!("timed out waiting for {what}"),
    }
}

async fn probed(rx: &mut UnboundedReceiver<Snapshot>) -> Snapshot {
    wait_for(rx, "probe result", |s| s.capabilities.is_some() && !s.working).await
}

#[tokio::test]
async fn test_missing_worker_threads_reports_code_3() {
    let _guard = serial();
    let install = Installation::new(&launcher_script("object", "undefined", 0), None);
    let (engine, mut rx) = start_engine();

    engine.set_install_path(install.root());
    assert_eq!(engine.status(), StatusCode::ProbePending);

    let snapshot = probed(&mut rx).await;
    let caps = snapshot.capabilities.unwrap();
    assert_eq!(caps.worker_threads_type_name.as_deref(), Some("undefined"));
    assert_eq!(engine.status(), StatusCode::WorkerThreadsMissing);
    assert_eq!(engine.status().code(), 3);

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_missing_host_interop_outranks_worker_threads() {
    let _guard = serial();
    let install = Installation::new(&launcher_script("undefined", "undefined", 0), None);
    let (engine, mut rx) = start_engine();

    engine.set_install_path(install.root());
    probed(&mut rx).await;
    assert_eq!(engine.status(), StatusCode::HostInteropMissing);

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_healthy_installation_probes_deterministically() {
    let _guard = serial();
    let install = Installation::healthy(None);
    install.provide("ruby");

    let probe = CapabilityProbe::new(&options());
    let first = probe.probe(install.root()).await;
    let second = probe.probe(install.root()).await;

    assert_eq!(first, second);
    assert_eq!(first.launcher_error, None);
    assert!(first.is_available(Language::Ruby));
    assert!(!first.is_available(Language::Js));
    assert!(!first.is_available(Language::Python));
    assert_eq!(
        polyglot_check::error_code(&options().layout, Some(install.root()), Some(&first)),
        StatusCode::Healthy
    );
}

#[tokio::test]
async fn test_install_missing_language_succeeds() {
    let _guard = serial();
    let install = Installation::healthy(Some(INSTALLER_OK));
    let (engine, mut rx) = start_engine();

    engine.set_install_path(install.root());
    let snapshot = probed(&mut rx).await;
    assert!(!snapshot.is_installed(Language::Js));

    engine.set_language_intent(Language::Js, true);
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.missing_language, Some(Language::Js));
    assert!(!snapshot.intents.is_selected(Language::Js));
    assert!(!snapshot.is_selectable(Language::Js));

    assert!(engine.install_missing());
    let running = wait_for(&mut rx, "install start", |s| s.install.is_running()).await;
    assert!(running.output_visible);
    assert!(running.process_output.starts_with(&format!(
        "Running {} install js\n",
        install.root().join("bin").join("gu").display()
    )));

    let done = wait_for(&mut rx, "install result", |s| {
        matches!(s.install, InstallState::Succeeded { .. })
    })
    .await;
    assert_eq!(done.install, InstallState::Succeeded { language: Language::Js });
    assert_eq!(done.missing_language, None);
    assert!(done.intents.is_selected(Language::Js));
    assert!(done.is_installed(Language::Js));
    assert!(!done.output_visible);
    assert!(!done.working);
    assert!(done.process_output.contains("Installed js"));
    assert_eq!(install.probe_count(), 2);
    assert_eq!(engine.status(), StatusCode::Healthy);

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_failed_install_keeps_request() {
    let _guard = serial();
    let install = Installation::healthy(Some(INSTALLER_FAIL));
    let (engine, mut rx) = start_engine();

    engine.set_install_path(install.root());
    probed(&mut rx).await;
    engine.set_language_intent(Language::Js, true);
    assert!(engine.install_missing());

    let done = wait_for(&mut rx, "install failure", |s| {
        matches!(s.install, InstallState::Failed { .. })
    })
    .await;

    let last_line = done.process_output.lines().last().unwrap();
    assert!(last_line.contains("finished with code 2"), "{last_line}");
    assert!(done.process_output.contains("Error: no component js in catalog"));
    assert!(matches!(
        done.install,
        InstallState::Failed {
            language: Language::Js,
            error: ProvisionError::ExitCode { code: 2, .. },
        }
    ));
    assert_eq!(done.missing_language, Some(Language::Js));
    assert!(!done.intents.is_selected(Language::Js));
    assert!(done.output_visible);
    assert_eq!(install.probe_count(), 1);

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_stop_cancels_running_install() {
    let _guard = serial();
    let install = Installation::healthy(Some(INSTALLER_HANG));
    let (engine, mut rx) = start_engine();

    engine.set_install_path(install.root());
    probed(&mut rx).await;
    engine.set_language_intent(Language::R, true);
    assert!(engine.install_missing());

    wait_for(&mut rx, "installer output", |s| {
        s.process_output.contains("Downloading component R")
    })
    .await;
    assert!(!engine.install_missing());
    engine.stop();

    let done = wait_for(&mut rx, "cancellation", |s| {
        matches!(s.install, InstallState::Cancelled { .. })
    })
    .await;
    assert!(done.process_output.ends_with("install R cancelled"));
    assert_eq!(done.missing_language, Some(Language::R));
    assert!(done.output_visible);

    engine.stop();
    assert!(!engine.snapshot().output_visible);

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_rapid_path_changes_probe_only_the_last() {
    let _guard = serial();
    let first = Installation::healthy(None);
    let second = Installation::healthy(None);
    let last = Installation::healthy(None);
    let (engine, mut rx) = start_engine();

    engine.set_install_path(first.root());
    engine.set_install_path(second.root());
    engine.set_install_path(last.root());

    let snapshot = probed(&mut rx).await;
    assert_eq!(snapshot.install_path.as_deref(), Some(last.root()));
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(first.probe_count(), 0);
    assert_eq!(second.probe_count(), 0);
    assert_eq!(last.probe_count(), 1);

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_superseded_probe_result_is_dropped() {
    let _guard = serial();
    let slow = Installation::new(&launcher_script("object", "undefined", 1), None);
    let fast = Installation::healthy(None);
    let (engine, mut rx) = start_engine();

    engine.set_install_path(slow.root());
    wait_for(&mut rx, "slow probe start", |s| s.working).await;
    engine.set_install_path(fast.root());

    let snapshot = probed(&mut rx).await;
    assert_eq!(snapshot.install_path.as_deref(), Some(fast.root()));
    let caps = snapshot.capabilities.unwrap();
    assert_eq!(caps.worker_threads_type_name.as_deref(), Some("object"));
    assert_eq!(engine.status(), StatusCode::Healthy);
    assert_eq!(slow.probe_count(), 1);

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_missing_installer_reports_not_found() {
    let _guard = serial();
    let install = Installation::healthy(None);
    let (engine, mut rx) = start_engine();

    engine.set_install_path(install.root());
    probed(&mut rx).await;
    engine.set_language_intent(Language::Ruby, true);
    assert_eq!(engine.snapshot().missing_language, Some(Language::Ruby));
    assert!(engine.install_missing());

    let done = wait_for(&mut rx, "install failure", |s| {
        matches!(s.install, InstallState::Failed { .. })
    })
    .await;
    assert!(done.process_output.ends_with(&format!(
        "{} not found",
        install.root().join("bin").join("gu").display()
    )));
    assert!(done.output_visible);
    assert_eq!(done.missing_language, Some(Language::Ruby));

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_hanging_launcher_is_killed_after_timeout() {
    let _guard = serial();
    let install = Installation::new("#!/bin/sh\nexec sleep 30\n", None);
    let probe = CapabilityProbe::new(&EngineOptions {
        probe_timeout: Some(Duration::from_millis(300)),
        ..options()
    });

    let started = std::time::Instant::now();
    let caps = probe.probe(install.root()).await;

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(
        caps.launcher_error.as_deref(),
        Some("diagnostic timed out after 300 ms")
    );
    assert!(caps.embedded_host_type_name.is_none());
    assert!(caps.language_available.is_empty());
    assert_eq!(
        polyglot_check::error_code(&options().layout, Some(install.root()), Some(&caps)),
        StatusCode::HostInteropMissing
    );
}

#[tokio::test]
async fn test_explicit_install_request_without_intent() {
    let _guard = serial();
    let install = Installation::healthy(Some(INSTALLER_OK));
    let (engine, mut rx) = start_engine();

    engine.set_install_path(install.root());
    let snapshot = probed(&mut rx).await;
    assert!(!snapshot.intents.any());
    assert!(!snapshot.is_installed(Language::Ruby));

    assert!(engine.request_install(Language::Ruby));
    assert_eq!(engine.snapshot().missing_language, Some(Language::Ruby));

    let done = wait_for(&mut rx, "install result", |s| {
        matches!(s.install, InstallState::Succeeded { .. })
    })
    .await;
    assert_eq!(done.install, InstallState::Succeeded { language: Language::Ruby });
    assert_eq!(done.missing_language, None);
    assert!(done.intents.is_selected(Language::Ruby));
    assert!(done.is_installed(Language::Ruby));
    assert!(!done.output_visible);
    assert_eq!(engine.status(), StatusCode::Healthy);

    engine.shutdown().await.unwrap();
}
