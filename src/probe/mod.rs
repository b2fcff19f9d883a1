//! Capability probing.
//!
//! This module contains everything needed to learn what an installation can
//! do:
//!
//! - `find_install_root`: locate a candidate installation
//! - `CapabilityProbe`: run the diagnostic payload through the launcher
//! - `parse_report`: decode the single JSON report line

mod capability_probe;
mod parser;
mod path_finder;
mod script;

pub use capability_probe::CapabilityProbe;
pub use path_finder::find_install_root;
