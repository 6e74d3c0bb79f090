//! Procline - drive a line-oriented child process from Rust.
//!
//! A [`Handler`] launches an executable, captures its stdout one line at a
//! time on a background task, writes messages to its stdin, and waits with
//! a deadline for the replies.

pub mod error;
pub mod process;

pub use error::{Error, Result};
pub use process::{Handler, HandlerOptions, HandlerState};
