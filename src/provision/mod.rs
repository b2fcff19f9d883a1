//! Installing missing languages.
//!
//! The installer runs on the background lane, one request at a time. Its
//! merged output is streamed into the published transcript while it runs,
//! and a successful install is followed by a fresh probe.

mod coordinator;
mod errors;
mod progress;

pub(crate) use coordinator::ProvisionCoordinator;
pub use errors::ProvisionError;
pub use progress::InstallState;
