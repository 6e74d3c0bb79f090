//! Child process handling with asynchronous line capture.
//!
//! This module launches a single child process, forwards its stdout line by
//! line into a private queue from a background task, and lets the caller
//! write to its stdin and wait for replies.

mod handler;
mod options;
mod queue;
mod reader;

pub use handler::{Handler, HandlerState};
pub use options::HandlerOptions;
