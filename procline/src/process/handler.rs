//! The caller-facing child process handler.
//!
//! A [`Handler`] owns one child at a time. Output is read by a background
//! task into a private queue and only moves into the receive buffer when
//! the caller asks for it with [`Handler::receive`] or
//! [`Handler::await_receive`]. Sending a message clears the buffer, so
//! after a `send` + `await_receive` exchange the buffer holds only the
//! reply to that message.

use std::process::ExitStatus;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, ChildStdout};
use tracing::{debug, info, warn};

use super::options::HandlerOptions;
use super::queue::{self, strip_line_ending, LineQueue, Readiness};
use super::reader::spawn_line_reader;
use crate::error::{Error, Result};

/// Where a handler is in its child's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerState {
    /// Never launched.
    Unstarted,
    /// Launched and not yet observed to have exited.
    Running,
    /// A liveness query saw the child exit.
    Exited,
}

#[derive(Debug)]
struct RunningChild {
    child: Child,
    /// `None` once the caller has closed the child's input.
    stdin: Option<ChildStdin>,
}

#[derive(Debug)]
enum Lifecycle {
    Unstarted,
    Running(RunningChild),
    Exited,
}

/// Manages a single child process and its line-oriented stdout.
///
/// # Example
///
/// ```rust,no_run
/// use procline::{Handler, HandlerOptions};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> procline::Result<()> {
///     let mut handler = Handler::new(HandlerOptions::new("cat").terminator("\n"));
///     handler.launch()?;
///
///     handler.send("ping").await?;
///     handler.await_receive(Duration::from_secs(2)).await?;
///     assert_eq!(handler.receive_buffer(), ["ping"]);
///
///     handler.terminate()?;
///     Ok(())
/// }
/// ```
///
/// Dropping a handler does not stop its child; call
/// [`terminate`](Self::terminate) first.
#[derive(Debug)]
pub struct Handler {
    options: HandlerOptions,
    lifecycle: Lifecycle,
    /// Queue of the most recent launch. Outlives the child so output
    /// written just before exit can still be received.
    queue: Option<LineQueue>,
    receive_buffer: Vec<String>,
    last_exit_code: Option<i32>,
}

impl Handler {
    /// Create a handler. Nothing is spawned until [`launch`](Self::launch).
    pub fn new(options: HandlerOptions) -> Self {
        Self {
            options,
            lifecycle: Lifecycle::Unstarted,
            queue: None,
            receive_buffer: Vec::new(),
            last_exit_code: None,
        }
    }

    /// Launch parameters.
    pub const fn options(&self) -> &HandlerOptions {
        &self.options
    }

    /// Lifecycle state as of the last operation.
    pub const fn state(&self) -> HandlerState {
        match self.lifecycle {
            Lifecycle::Unstarted => HandlerState::Unstarted,
            Lifecycle::Running(_) => HandlerState::Running,
            Lifecycle::Exited => HandlerState::Exited,
        }
    }

    /// Lines received since the last successful send, line endings stripped.
    pub fn receive_buffer(&self) -> &[String] {
        &self.receive_buffer
    }

    /// Exit code seen by the most recent [`is_alive`](Self::is_alive) call.
    ///
    /// This is not kept up to date on its own. A child killed by a signal
    /// reports the negated signal number.
    pub const fn last_exit_code(&self) -> Option<i32> {
        self.last_exit_code
    }

    /// OS process id of the running child.
    pub fn pid(&self) -> Option<u32> {
        match self.lifecycle {
            Lifecycle::Running(ref running) => running.child.id(),
            _ => None,
        }
    }

    /// Spawn the child and start reading its stdout.
    ///
    /// Fails with [`Error::AlreadyRunning`] if the previous child has not
    /// exited. A child that has exited (even if nobody asked yet) may be
    /// replaced; any of its output still queued is discarded.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn launch(&mut self) -> Result<()> {
        if self.is_alive()? {
            return Err(Error::AlreadyRunning { pid: self.pid() });
        }

        let mut child = self.options.command()?.spawn().map_err(|source| Error::Spawn {
            program: self.options.program.clone(),
            source,
        })?;
        let pid = child.id();

        let (stdin, stdout) = take_pipes(&mut child)?;

        let (tx, queue) = queue::channel();
        spawn_line_reader(stdout, tx, pid);

        info!(program = %self.options.program, ?pid, "launched child process");

        self.queue = Some(queue);
        self.lifecycle = Lifecycle::Running(RunningChild {
            child,
            stdin: Some(stdin),
        });
        Ok(())
    }

    /// Write `text` plus the terminator to the child and flush.
    ///
    /// Clears the receive buffer once the write succeeds. A failed write is
    /// returned and leaves the buffer as it was.
    ///
    /// Does nothing unless the handler is [`HandlerState::Running`]. That
    /// state only changes when [`is_alive`](Self::is_alive) observes the
    /// exit, so a child that has exited but was not polled yet is still
    /// written to, and the write fails with [`Error::Io`] (broken pipe).
    pub async fn send(&mut self, text: &str) -> Result<()> {
        let Lifecycle::Running(ref mut running) = self.lifecycle else {
            return Ok(());
        };
        let Some(ref mut stdin) = running.stdin else {
            return Err(Error::InputClosed);
        };

        let payload = self.options.frame(text);
        stdin.write_all(payload.as_bytes()).await?;
        stdin.flush().await?;
        debug!(bytes = payload.len(), "sent message to child");

        self.receive_buffer.clear();
        Ok(())
    }

    /// Close the child's stdin so it reads end-of-file.
    ///
    /// Sends fail with [`Error::InputClosed`] until the next launch.
    pub fn close_input(&mut self) {
        if let Lifecycle::Running(ref mut running) = self.lifecycle {
            if running.stdin.take().is_some() {
                debug!(pid = ?running.child.id(), "closed child stdin");
            }
        }
    }

    /// Move one queued line into the receive buffer without waiting.
    ///
    /// Returns `false` if nothing was queued.
    pub fn receive(&mut self) -> bool {
        let Some(line) = self.queue.as_mut().and_then(LineQueue::try_take) else {
            return false;
        };
        self.receive_buffer.push(strip_line_ending(&line).to_owned());
        true
    }

    /// Wait up to `timeout` for output, then drain everything queued.
    ///
    /// Returns how many lines were moved into the buffer. Fails with
    /// [`Error::Timeout`] and leaves the buffer untouched if nothing arrived
    /// in time. Once the child's stdout has closed and everything has been
    /// drained, no more output can arrive and the call fails immediately.
    pub async fn await_receive(&mut self, timeout: Duration) -> Result<usize> {
        let Some(queue) = self.queue.as_mut() else {
            tokio::time::sleep(timeout).await;
            return Err(Error::Timeout(timeout));
        };

        match queue.ready(timeout).await {
            Readiness::Ready => {}
            Readiness::Closed => {
                debug!("child stdout closed with nothing left to receive");
                return Err(Error::Timeout(timeout));
            }
            Readiness::TimedOut => {
                debug!(?timeout, "no child output before deadline");
                return Err(Error::Timeout(timeout));
            }
        }

        let mut drained = 0;
        while self.receive() {
            drained += 1;
        }
        Ok(drained)
    }

    /// Ask the child to stop (SIGTERM on Unix) without waiting for it.
    ///
    /// The exit is observed by a later [`is_alive`](Self::is_alive) call.
    pub fn terminate(&mut self) -> Result<()> {
        let Lifecycle::Running(ref mut running) = self.lifecycle else {
            return Ok(());
        };
        info!(pid = ?running.child.id(), "terminating child process");
        request_termination(&mut running.child)
    }

    /// Poll the child without blocking and refresh the last exit code.
    pub fn is_alive(&mut self) -> Result<bool> {
        let status = match self.lifecycle {
            Lifecycle::Unstarted => {
                self.last_exit_code = None;
                return Ok(false);
            }
            Lifecycle::Exited => return Ok(false),
            Lifecycle::Running(ref mut running) => running.child.try_wait()?,
        };

        match status {
            Some(status) => {
                let code = exit_code(status);
                info!(code, "child process exited");
                self.last_exit_code = Some(code);
                self.lifecycle = Lifecycle::Exited;
                Ok(false)
            }
            None => {
                self.last_exit_code = None;
                Ok(true)
            }
        }
    }
}

/// Detach the stdio pipes, killing the child if one is missing.
fn take_pipes(child: &mut Child) -> Result<(ChildStdin, ChildStdout)> {
    let missing = match (child.stdin.take(), child.stdout.take()) {
        (Some(stdin), Some(stdout)) => return Ok((stdin, stdout)),
        (None, _) => "stdin",
        (_, None) => "stdout",
    };

    if let Err(e) = child.start_kill() {
        warn!(pid = ?child.id(), error = %e, "failed to kill child with missing {missing}");
    }
    Err(Error::MissingPipe(missing))
}

#[cfg(unix)]
fn request_termination(child: &mut Child) -> Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    // No id means the child has already been reaped.
    let Some(pid) = child.id() else {
        return Ok(());
    };
    let pid = i32::try_from(pid)
        .map_err(|_| Error::Io(std::io::Error::other("pid out of range")))?;

    match kill(Pid::from_raw(pid), Signal::SIGTERM) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(errno) => Err(Error::Io(errno.into())),
    }
}

#[cfg(not(unix))]
fn request_termination(child: &mut Child) -> Result<()> {
    child.start_kill().map_err(Error::Io)
}

fn exit_code(status: ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    status.code().unwrap_or(-1)
}
