//! Decoding of the diagnostic report line.

use crate::{Capabilities, Language, ProbeError};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Wire shape of the report. Every field is optional; unknown fields are ignored.
#[derive(Debug, Deserialize)]
struct ProbeRecord {
    launcher: Option<String>,
    java: Option<String>,
    worker_threads: Option<String>,
    js: Option<bool>,
    ruby: Option<bool>,
    #[serde(rename = "R")]
    r: Option<bool>,
    python: Option<bool>,
}

impl ProbeRecord {
    fn language(&self, lang: Language) -> Option<bool> {
        match lang {
            Language::Js => self.js,
            Language::Ruby => self.ruby,
            Language::R => self.r,
            Language::Python => self.python,
        }
    }
}

/// Decode the diagnostic output into a capability snapshot.
///
/// The report is the last line of `output` that starts with `{`; anything
/// printed before or around it is ignored. A report whose `launcher` field
/// is set describes a failure and yields a failed snapshot.
///
/// # Returns
///
/// `Err(ProbeError::Decode)` if no report line exists or it is not a valid
/// report object.
pub(crate) fn parse_report(output: &str) -> Result<Capabilities, ProbeError> {
    let line = output
        .lines()
        .map(str::trim)
        .rev()
        .find(|line| line.starts_with('{'))
        .ok_or_else(|| ProbeError::Decode(no_report_message(output)))?;

    let record: ProbeRecord =
        serde_json::from_str(line).map_err(|e| ProbeError::Decode(format!("{e} in `{line}`")))?;

    if let Some(message) = record.launcher {
        return Ok(Capabilities::failed(message));
    }

    let language_available: BTreeMap<Language, bool> = Language::all()
        .filter_map(|lang| record.language(lang).map(|available| (lang, available)))
        .collect();

    Ok(Capabilities {
        launcher_error: None,
        embedded_host_type_name: record.java,
        worker_threads_type_name: record.worker_threads,
        language_available,
    })
}

fn no_report_message(output: &str) -> String {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        "no output".to_string()
    } else {
        format!("no report line in `{trimmed}`")
    }
}
