//! Child process lifecycle: spawn, stream output, cancel, reap.

use super::decoder::Utf8StreamDecoder;
use futures::Stream;
use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::watch;
use tracing::debug;

const READ_BUFFER_SIZE: usize = 1024;

/// Default upper bound for the termination poll after each output chunk.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A process could not be started.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LaunchError {
    /// The executable does not exist.
    #[error("{} not found", .program.display())]
    NotFound {
        /// Path that was looked up.
        program: PathBuf,
    },

    /// The executable exists but spawning it failed.
    #[error("cannot start {}: {source}", .program.display())]
    Spawn {
        /// Path of the executable.
        program: PathBuf,
        /// Underlying OS error.
        source: io::Error,
    },
}

/// Cloneable handle for requesting termination of a running process.
///
/// Requests are idempotent and may be issued from any thread, before, during
/// or after the process runs. The owning [`ProcessHandle`] notices the request
/// inside its read loop and kills the child.
#[derive(Debug, Clone)]
pub struct KillSwitch {
    tx: Arc<watch::Sender<bool>>,
}

impl KillSwitch {
    pub(crate) fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { tx: Arc::new(tx) }, rx)
    }

    /// Request termination.
    pub fn kill(&self) {
        self.tx.send_replace(true);
    }

    /// Whether termination has been requested.
    pub fn is_killed(&self) -> bool {
        *self.tx.borrow()
    }
}

enum ReadEvent {
    Stdout(io::Result<usize>),
    Stderr(io::Result<usize>),
    Kill(bool),
}

enum PollEvent {
    Exited(io::Result<ExitStatus>),
    Kill(bool),
    Elapsed,
}

/// An exclusively owned, running child process.
///
/// Output from stdout and stderr is merged chunk by chunk and decoded
/// incrementally. The output sequence is finite and cannot be restarted.
///
/// # Example
///
/// ```rust,no_run
/// use polyglot_check::ProcessHandle;
/// use std::path::Path;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let mut handle = ProcessHandle::start(Path::new("/bin/echo"), &["hello"])?;
/// while let Some(chunk) = handle.next_chunk().await? {
///     print!("{chunk}");
/// }
/// let code = handle.wait().await?;
/// assert_eq!(code, 0);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ProcessHandle {
    program: PathBuf,
    child: Child,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    stdout_decoder: Utf8StreamDecoder,
    stderr_decoder: Utf8StreamDecoder,
    kill_switch: KillSwitch,
    kill_rx: watch::Receiver<bool>,
    kill_sent: bool,
    kill_closed: bool,
    status: Option<ExitStatus>,
    poll_interval: Duration,
}

impl ProcessHandle {
    /// Spawn `program` with `args`, stdin closed and both output streams piped.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<S: AsRef<OsStr>>(program: &Path, args: &[S]) -> Result<Self, LaunchError> {
        if !program.is_file() {
            return Err(LaunchError::NotFound {
                program: program.to_path_buf(),
            });
        }

        let mut command = Command::new(program);
        command
            .args(args)
            .kill_on_drop(true)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command.spawn().map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                LaunchError::NotFound {
                    program: program.to_path_buf(),
                }
            } else {
                LaunchError::Spawn {
                    program: program.to_path_buf(),
                    source,
                }
            }
        })?;

        debug!(program = %program.display(), pid = ?child.id(), "process started");

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (kill_switch, kill_rx) = KillSwitch::new();

        Ok(Self {
            program: program.to_path_buf(),
            child,
            stdout,
            stderr,
            stdout_decoder: Utf8StreamDecoder::new(),
            stderr_decoder: Utf8StreamDecoder::new(),
            kill_switch,
            kill_rx,
            kill_sent: false,
            kill_closed: false,
            status: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    /// Override the post-chunk termination poll bound.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Path of the running executable.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// A switch that kills this process from outside the read loop.
    pub fn kill_switch(&self) -> KillSwitch {
        self.kill_switch.clone()
    }

    /// Whether a kill was delivered while the process was still running.
    pub fn was_killed(&self) -> bool {
        self.kill_sent
    }

    /// Kill the child now. Safe to call repeatedly and after exit.
    pub fn kill(&mut self) {
        self.kill_switch.kill();
        self.deliver_kill();
    }

    fn deliver_kill(&mut self) {
        if self.kill_sent || self.status.is_some() {
            return;
        }
        match self.child.start_kill() {
            Ok(()) => {
                self.kill_sent = true;
                debug!(program = %self.program.display(), "kill delivered");
            }
            Err(e) => debug!(program = %self.program.display(), error = %e, "kill not delivered"),
        }
    }

    fn kill_armed(&self) -> bool {
        !self.kill_sent && !self.kill_closed
    }

    fn on_kill_signal(&mut self, sender_alive: bool) {
        if !sender_alive {
            // Every switch is gone; no request can arrive any more.
            self.kill_closed = true;
            return;
        }
        if *self.kill_rx.borrow_and_update() {
            self.deliver_kill();
        }
    }

    /// Next decoded chunk of merged stdout/stderr output.
    ///
    /// Returns `Ok(None)` once both streams reached EOF. After every chunk a
    /// bounded wait for process termination runs, so pending kill requests
    /// are acted upon while output is still flowing.
    pub async fn next_chunk(&mut self) -> io::Result<Option<String>> {
        loop {
            if self.stdout.is_none() && self.stderr.is_none() {
                return Ok(None);
            }

            let mut out_buf = [0u8; READ_BUFFER_SIZE];
            let mut err_buf = [0u8; READ_BUFFER_SIZE];
            let kill_armed = self.kill_armed();

            let event = tokio::select! {
                read = read_some(&mut self.stdout, &mut out_buf) => ReadEvent::Stdout(read),
                read = read_some(&mut self.stderr, &mut err_buf) => ReadEvent::Stderr(read),
                changed = self.kill_rx.changed(), if kill_armed => ReadEvent::Kill(changed.is_ok()),
            };

            let text = match event {
                ReadEvent::Kill(sender_alive) => {
                    self.on_kill_signal(sender_alive);
                    continue;
                }
                ReadEvent::Stdout(Ok(0)) => {
                    self.stdout = None;
                    self.stdout_decoder.finish()
                }
                ReadEvent::Stderr(Ok(0)) => {
                    self.stderr = None;
                    self.stderr_decoder.finish()
                }
                ReadEvent::Stdout(Ok(n)) => {
                    let text = self.stdout_decoder.decode(&out_buf[..n]);
                    self.poll_termination().await;
                    text
                }
                ReadEvent::Stderr(Ok(n)) => {
                    let text = self.stderr_decoder.decode(&err_buf[..n]);
                    self.poll_termination().await;
                    text
                }
                ReadEvent::Stdout(Err(e)) | ReadEvent::Stderr(Err(e)) => {
                    if e.kind() == io::ErrorKind::Interrupted {
                        continue;
                    }
                    return Err(e);
                }
            };

            if !text.is_empty() {
                return Ok(Some(text));
            }
        }
    }

    /// The output as a lazy stream of decoded chunks.
    ///
    /// The stream ends at EOF or after the first I/O error.
    pub fn output(&mut self) -> impl Stream<Item = io::Result<String>> + '_ {
        futures::stream::unfold(Some(self), |state| async move {
            let handle = state?;
            match handle.next_chunk().await {
                Ok(Some(chunk)) => Some((Ok(chunk), Some(handle))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }

    async fn poll_termination(&mut self) {
        if self.status.is_some() {
            return;
        }
        let kill_armed = self.kill_armed();

        let event = tokio::select! {
            status = self.child.wait() => PollEvent::Exited(status),
            changed = self.kill_rx.changed(), if kill_armed => PollEvent::Kill(changed.is_ok()),
            _ = tokio::time::sleep(self.poll_interval) => PollEvent::Elapsed,
        };

        match event {
            PollEvent::Exited(Ok(status)) => self.status = Some(status),
            PollEvent::Exited(Err(e)) => {
                debug!(program = %self.program.display(), error = %e, "termination poll failed")
            }
            PollEvent::Kill(sender_alive) => self.on_kill_signal(sender_alive),
            PollEvent::Elapsed => {}
        }
    }

    /// Wait for the process to exit and return its exit code.
    ///
    /// A process ended by a signal reports `128 + signal` on Unix.
    pub async fn wait(&mut self) -> io::Result<i32> {
        loop {
            if let Some(status) = self.status {
                return Ok(exit_code(status));
            }
            let kill_armed = self.kill_armed();

            let event = tokio::select! {
                status = self.child.wait() => PollEvent::Exited(status),
                changed = self.kill_rx.changed(), if kill_armed => PollEvent::Kill(changed.is_ok()),
            };

            match event {
                PollEvent::Exited(status) => {
                    let status = status?;
                    debug!(program = %self.program.display(), ?status, "process exited");
                    self.status = Some(status);
                }
                PollEvent::Kill(sender_alive) => self.on_kill_signal(sender_alive),
                PollEvent::Elapsed => {}
            }
        }
    }
}

async fn read_some<R: AsyncRead + Unpin>(stream: &mut Option<R>, buf: &mut [u8]) -> io::Result<usize> {
    match stream {
        Some(reader) => reader.read(buf).await,
        None => std::future::pending().await,
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}
