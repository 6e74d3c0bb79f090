//! Error types for the child process handler.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised by a [`Handler`](crate::Handler).
///
/// Operations on a handler that was never launched do not error; they are
/// silent no-ops. Everything listed here is a real failure and is returned
/// to the caller as-is, never retried.
#[derive(Debug, Error)]
pub enum Error {
    /// No output arrived before the deadline passed.
    #[error("timed out after {0:?} waiting for child output")]
    Timeout(Duration),

    /// `launch` was called while the previous child is still running.
    #[error("child process is still running (pid {pid:?})")]
    AlreadyRunning {
        /// OS process id of the running child, if still known.
        pid: Option<u32>,
    },

    /// The executable could not be started.
    #[error("failed to spawn process: {program}")]
    Spawn {
        /// Program that was being launched.
        program: String,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// A stdio pipe we asked for was not handed back by the spawn.
    #[error("child {0} was not captured")]
    MissingPipe(&'static str),

    /// `send` after the child's input was closed.
    #[error("child input is closed")]
    InputClosed,

    /// Writing to, polling, or signalling the child failed.
    #[error("child process I/O failed")]
    Io(#[from] io::Error),

    /// The handler options are unusable.
    #[error("invalid handler configuration: {0}")]
    Config(String),
}

impl Error {
    /// Whether this is the wait-deadline error from `await_receive`.
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}
