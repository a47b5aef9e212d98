//! Terminal watch loop.
//!
//! [`run`] drives a [`PollerHandle`] from user input until a shutdown future
//! resolves. Input arrives on a channel rather than from tokio's stdin so the
//! loop never owns a blocking read: [`stdin_lines`] does the reading on a
//! plain thread, which the process can exit without joining.

use std::future::Future;
use std::io::BufRead;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::poller::{PollState, PollerHandle};

/// Lines buffered between the stdin thread and the loop.
const INPUT_BUFFER: usize = 8;

/// Spawn a thread that forwards stdin lines until EOF or until the receiver
/// is dropped.
///
/// # Errors
///
/// Returns an error if the thread cannot be spawned.
pub fn stdin_lines() -> std::io::Result<mpsc::Receiver<String>> {
    let (tx, rx) = mpsc::channel(INPUT_BUFFER);
    std::thread::Builder::new()
        .name("flighttrack-stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.blocking_send(line).is_err() {
                    break;
                }
            }
            debug!("Stdin reader finished");
        })?;
    Ok(rx)
}

/// Show every state published by `handle`, refresh on each input line, and
/// stop the poller once `shutdown` resolves.
///
/// Closed input only disables manual refresh; the loop keeps running until
/// `shutdown` or the poller ends.
pub async fn run<S, F>(
    handle: PollerHandle,
    mut input: mpsc::Receiver<String>,
    shutdown: S,
    mut show: F,
) where
    S: Future<Output = ()>,
    F: FnMut(&PollState),
{
    let mut states = handle.subscribe();
    let mut input_open = true;
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = states.borrow_and_update().clone();
                show(&state);
            }
            line = input.recv(), if input_open => {
                if line.is_some() {
                    handle.refresh();
                } else {
                    input_open = false;
                }
            }
            () = &mut shutdown => {
                info!("Shutdown requested, stopping");
                break;
            }
        }
    }

    handle.stop().await;
}
