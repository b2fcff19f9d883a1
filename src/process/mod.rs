//! Process execution with streamed, incrementally decoded output.
//!
//! This module provides [`ProcessHandle`], the single way the crate runs the
//! launcher and the installer:
//!
//! - `ProcessHandle::start`: spawn with stdout and stderr piped
//! - `next_chunk` / `output`: lazy sequence of decoded text chunks
//! - `kill` / [`KillSwitch`]: cooperative, idempotent cancellation
//! - `wait`: exit code, awaited only on the background lane

mod decoder;
mod runner;

pub use runner::{KillSwitch, LaunchError, ProcessHandle, DEFAULT_POLL_INTERVAL};
