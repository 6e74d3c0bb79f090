//! Delivery queue between a reader task and its handler.
//!
//! Each launch gets its own unbounded channel, so output from one child can
//! never be consumed by another handler.

use std::time::Duration;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::time::timeout;

/// Producer half, owned by the reader task.
pub(crate) type LineSender = mpsc::UnboundedSender<String>;

/// Outcome of waiting for the queue to have data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Readiness {
    /// At least one line can be taken without waiting.
    Ready,
    /// The reader is gone and every line has been taken.
    Closed,
    /// Nothing arrived in time.
    TimedOut,
}

/// Consumer half, owned by the handler.
#[derive(Debug)]
pub(crate) struct LineQueue {
    rx: mpsc::UnboundedReceiver<String>,
    /// Line pulled off the channel while waiting, handed out first.
    peeked: Option<String>,
}

/// Create a connected sender/queue pair.
pub(crate) fn channel() -> (LineSender, LineQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (tx, LineQueue { rx, peeked: None })
}

impl LineQueue {
    /// Take the next raw line without waiting.
    pub(crate) fn try_take(&mut self) -> Option<String> {
        if let Some(line) = self.peeked.take() {
            return Some(line);
        }
        match self.rx.try_recv() {
            Ok(line) => Some(line),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Wait up to `wait` for a line to become available. Nothing is consumed.
    pub(crate) async fn ready(&mut self, wait: Duration) -> Readiness {
        if self.peeked.is_some() {
            return Readiness::Ready;
        }
        match timeout(wait, self.rx.recv()).await {
            Ok(Some(line)) => {
                self.peeked = Some(line);
                Readiness::Ready
            }
            Ok(None) => Readiness::Closed,
            Err(_) => Readiness::TimedOut,
        }
    }
}

/// Strip one trailing line ending (`\n` or `\r\n`).
pub(crate) fn strip_line_ending(line: &str) -> &str {
    line.strip_suffix('\n')
        .map_or(line, |rest| rest.strip_suffix('\r').unwrap_or(rest))
}
