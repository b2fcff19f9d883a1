//! Embedded languages the diagnostic payload knows about.

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

/// An embedded language a polyglot runtime may expose.
///
/// Every variant is probed by the diagnostic payload. Only the languages with
/// a sample ([`Language::has_sample`]) carry a user-intent flag and can be
/// raised as a missing-language request.
///
/// # Example
///
/// ```rust
/// use polyglot_check::Language;
///
/// for lang in Language::all() {
///     println!("{}: {}", lang.display_name(), lang.id());
/// }
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::EnumIter,
)]
pub enum Language {
    /// JavaScript (`js`)
    #[serde(rename = "js")]
    Js,
    /// Ruby (`ruby`)
    #[serde(rename = "ruby")]
    Ruby,
    /// R (`R`)
    #[serde(rename = "R")]
    R,
    /// Python (`python`), probed but without a sample
    #[serde(rename = "python")]
    Python,
}

impl Language {
    /// The language id understood by the runtime and by the installer.
    ///
    /// ```rust
    /// use polyglot_check::Language;
    ///
    /// assert_eq!(Language::Js.id(), "js");
    /// assert_eq!(Language::R.id(), "R");
    /// ```
    pub fn id(&self) -> &'static str {
        match self {
            Self::Js => "js",
            Self::Ruby => "ruby",
            Self::R => "R",
            Self::Python => "python",
        }
    }

    /// Human-readable name for messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Js => "JavaScript",
            Self::Ruby => "Ruby",
            Self::R => "R",
            Self::Python => "Python",
        }
    }

    /// Whether the language has a sample the user can opt into.
    pub fn has_sample(&self) -> bool {
        !matches!(self, Self::Python)
    }

    /// Look a language up by its runtime id. Ids are case-sensitive (`R`, not `r`).
    pub fn from_id(id: &str) -> Option<Self> {
        Self::all().find(|lang| lang.id() == id)
    }

    /// Iterator over every probed language, in evaluation order.
    pub fn all() -> impl Iterator<Item = Self> {
        <Self as IntoEnumIterator>::iter()
    }

    /// Iterator over the languages that carry a sample intent flag.
    pub fn samples() -> impl Iterator<Item = Self> {
        Self::all().filter(Language::has_sample)
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}
