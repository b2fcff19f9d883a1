//! # polyglot-check
//!
//! Verification and provisioning for polyglot runtime installations.
//!
//! Given the root directory of a runtime installation, this crate runs a
//! diagnostic payload through the installation's launcher to learn which
//! embedded languages and host features it exposes, derives a status code
//! from the result, and drives the installation's component installer when
//! a language the user selected is missing.
//!
//! ## Features
//!
//! - `CapabilityProbe` runs the diagnostic and decodes its report into
//!   `Capabilities`
//! - `error_code()` maps an installation and its capabilities to a `StatusCode`
//! - `Engine` debounces path changes, serializes probes and installs on one
//!   background lane, and publishes every change as a `Snapshot`
//! - `ProcessHandle` and `OutputSink` stream child process output as text
//!
//! ## Example
//!
//! ```rust,no_run
//! use polyglot_check::{error_code, CapabilityProbe, EngineOptions};
//! use std::path::Path;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let options = EngineOptions::default();
//!     let root = Path::new("/opt/graalvm");
//!
//!     let caps = CapabilityProbe::new(&options).probe(root).await;
//!     let status = error_code(&options.layout, Some(root), Some(&caps));
//!     println!("{}: {}", status.code(), status.description());
//! }
//! ```

mod capabilities;
mod debounce;
mod engine;
mod language;
mod options;
mod output;
mod probe;
mod process;
mod provision;
mod state;
mod status;

pub use capabilities::{Capabilities, ProbeError, PRESENT_MARKER};
pub use debounce::Debouncer;
pub use engine::Engine;
pub use language::Language;
pub use options::{EngineOptions, RuntimeLayout};
pub use output::OutputSink;
pub use probe::{find_install_root, CapabilityProbe};
pub use process::{KillSwitch, LaunchError, ProcessHandle, DEFAULT_POLL_INTERVAL};
pub use provision::{InstallState, ProvisionError};
pub use state::{Snapshot, StateObserver};
pub use status::{error_code, reconcile_languages, LanguageIntents, Reconciliation, StatusCode};
