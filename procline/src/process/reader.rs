//! Background task that forwards a child's stdout into its line queue.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use super::queue::LineSender;

/// Spawn a task that reads `stdout` line by line until EOF.
///
/// Each line is sent with its line ending intact; a final chunk without a
/// newline is sent as-is. Bytes that are not valid UTF-8 are replaced
/// rather than ending the stream. The task stops early if the queue's
/// receiving side has been dropped.
pub(crate) fn spawn_line_reader<R>(stdout: R, tx: LineSender, pid: Option<u32>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stdout);
        let mut buf = Vec::new();
        let mut forwarded = 0usize;

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => {
                    debug!(?pid, forwarded, "child stdout closed");
                    break;
                }
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf).into_owned();
                    trace!(?pid, line = line.trim_end(), "child output");
                    if tx.send(line).is_err() {
                        debug!(?pid, "line queue dropped, stopping reader");
                        break;
                    }
                    forwarded += 1;
                }
                Err(e) => {
                    warn!(?pid, error = %e, "error reading child stdout");
                    break;
                }
            }
        }
    })
}
