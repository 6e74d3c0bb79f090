//! CLI command execution.
//!
//! Relays each line typed on stdin to the child and prints whatever the
//! child answers within the wait window.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use procline::Handler;

use super::args::Cli;

/// How long the child gets to exit on its own, and then again after SIGTERM.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);
const SHUTDOWN_POLL: Duration = Duration::from_millis(50);

/// Execute the CLI.
pub async fn execute(cli: Cli) -> Result<()> {
    let options = cli
        .handler_options()
        .context("Failed to load handler options")?;
    let program = options.program.clone();

    let mut handler = Handler::new(options);
    handler
        .launch()
        .with_context(|| format!("Failed to launch {program}"))?;

    let mut input = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = input.next_line().await.context("Failed to read stdin")? {
        if !handler.is_alive()? {
            warn!("child exited, ignoring remaining input");
            break;
        }

        handler
            .send(&line)
            .await
            .context("Failed to write to child")?;

        if !receive_and_print(&mut handler, cli.timeout).await? {
            debug!("no reply within {:?}", cli.timeout);
        }
    }

    handler.close_input();
    wait_for_exit(&mut handler).await?;

    // Output written just before exit.
    while receive_and_print(&mut handler, cli.timeout).await? {}

    match handler.last_exit_code() {
        Some(code) => {
            info!(code, "child finished");
            eprintln!("Child exited with code {code}");
        }
        None => eprintln!("Child is still running after {SHUTDOWN_GRACE:?}; leaving it behind"),
    }

    Ok(())
}

/// Wait for output and print the newly received lines.
///
/// Returns `false` if nothing arrived in time.
async fn receive_and_print(handler: &mut Handler, timeout: Duration) -> Result<bool> {
    match handler.await_receive(timeout).await {
        Ok(count) => {
            let buffer = handler.receive_buffer();
            for line in &buffer[buffer.len() - count..] {
                println!("{line}");
            }
            Ok(true)
        }
        Err(e) if e.is_timeout() => Ok(false),
        Err(e) => Err(e).context("Failed to receive from child"),
    }
}

/// Give the child a grace period to exit, then ask it to terminate.
async fn wait_for_exit(handler: &mut Handler) -> Result<()> {
    if poll_until_exited(handler).await? {
        return Ok(());
    }

    handler.terminate().context("Failed to terminate child")?;
    poll_until_exited(handler).await?;
    Ok(())
}

async fn poll_until_exited(handler: &mut Handler) -> Result<bool> {
    let deadline = Instant::now() + SHUTDOWN_GRACE;
    while handler.is_alive()? {
        if Instant::now() >= deadline {
            return Ok(false);
        }
        tokio::time::sleep(SHUTDOWN_POLL).await;
    }
    Ok(true)
}
