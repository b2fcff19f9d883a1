//! Capability snapshot produced by a probe.

use crate::Language;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Type name the probe reports for a host-provided identifier that is present.
pub const PRESENT_MARKER: &str = "object";

/// Typed reasons a probe could not produce a capability report.
///
/// Probe failures never propagate as errors; they end up as the
/// [`Capabilities::launcher_error`] message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ProbeError {
    /// The launcher binary is missing from the installation.
    #[error("{0} not found")]
    LauncherMissing(String),

    /// The launcher could not be started or its output could not be read.
    #[error("{0}")]
    Io(String),

    /// The diagnostic did not finish in time and was killed.
    #[error("diagnostic timed out after {0} ms")]
    Timeout(u128),

    /// The output did not contain a decodable report line.
    #[error("cannot decode diagnostic output: {0}")]
    Decode(String),
}

impl ProbeError {
    /// Short human-readable category.
    ///
    /// ```rust
    /// use polyglot_check::ProbeError;
    ///
    /// let error = ProbeError::Decode("expected value".to_string());
    /// assert_eq!(error.description(), "Diagnostic output could not be decoded");
    /// ```
    pub fn description(&self) -> &'static str {
        match self {
            Self::LauncherMissing(_) => "Launcher not found",
            Self::Io(_) => "Launcher could not be run",
            Self::Timeout(_) => "Diagnostic timed out",
            Self::Decode(_) => "Diagnostic output could not be decoded",
        }
    }
}

/// What a completed probe learned about an installation.
///
/// A snapshot is produced once per probe and replaced as a whole, never
/// edited. When `launcher_error` is set the other fields are empty.
///
/// # Example
///
/// ```rust
/// use polyglot_check::{Capabilities, Language};
///
/// let caps = Capabilities::failed("/opt/runtime/bin/node not found");
/// assert!(caps.launcher_error.is_some());
/// assert!(!caps.is_available(Language::Js));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Set when the diagnostic could not run or its output was unusable.
    pub launcher_error: Option<String>,

    /// `typeof` of the host interop object, `"object"` when present.
    pub embedded_host_type_name: Option<String>,

    /// `typeof` of the worker threads module, `"object"` when present.
    pub worker_threads_type_name: Option<String>,

    /// Round-trip evaluation result for each probed language.
    pub language_available: BTreeMap<Language, bool>,
}

impl Capabilities {
    /// A snapshot recording only a failure message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            launcher_error: Some(message.into()),
            ..Default::default()
        }
    }

    /// Whether `lang` evaluated correctly. Unreported languages are unavailable.
    pub fn is_available(&self, lang: Language) -> bool {
        self.language_available.get(&lang).copied().unwrap_or(false)
    }

    /// Host interop identifier reported as present.
    pub fn has_host_interop(&self) -> bool {
        self.embedded_host_type_name.as_deref() == Some(PRESENT_MARKER)
    }

    /// Worker threads module reported as present.
    pub fn has_worker_threads(&self) -> bool {
        self.worker_threads_type_name.as_deref() == Some(PRESENT_MARKER)
    }
}

impl From<ProbeError> for Capabilities {
    fn from(error: ProbeError) -> Self {
        Self::failed(error.to_string())
    }
}
