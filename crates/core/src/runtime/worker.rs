//! Serial request worker. The orchestrator is not shareable across tasks,
//! so it lives inside one task that drains the input channel in order.

use std::time::Instant;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::Orchestrator;
use crate::io::input::{self, InputReceiver, InputSender};
use crate::io::output::{self, OutputSender, Turn};

const CHANNEL_BUFFER: usize = 32;

/// Front-end side of a running worker.
pub struct WorkerHandle {
    pub input: InputSender,
    pub output: output::OutputReceiver,
    pub task: JoinHandle<()>,
}

/// Move `orchestrator` into a task and process requests one at a time until
/// `token` is cancelled or every input sender is dropped.
pub fn spawn(orchestrator: Orchestrator, token: CancellationToken) -> WorkerHandle {
    let (input_tx, input_rx) = input::channel(CHANNEL_BUFFER);
    let (output_tx, output_rx) = output::channel(CHANNEL_BUFFER);
    let task = tokio::spawn(run(orchestrator, input_rx, output_tx, token));
    WorkerHandle {
        input: input_tx,
        output: output_rx,
        task,
    }
}

async fn run(
    mut orchestrator: Orchestrator,
    mut input_rx: InputReceiver,
    output_tx: OutputSender,
    token: CancellationToken,
) {
    tracing::debug!(model = orchestrator.model(), "worker started");
    loop {
        let request = tokio::select! {
            _ = token.cancelled() => break,
            r = input_rx.recv() => match r {
                Some(r) => r,
                None => break,
            },
        };

        if request.cancel.is_cancelled() {
            tracing::debug!(request_id = %request.id, "skipping withdrawn request");
            continue;
        }

        // Perception is the only await in `process`, so dropping it here
        // leaves memory and the reasoning chain untouched.
        let start = Instant::now();
        let turn = tokio::select! {
            _ = token.cancelled() => break,
            _ = request.cancel.cancelled() => {
                tracing::debug!(request_id = %request.id, "request withdrawn in flight");
                continue;
            }
            result = orchestrator.process(&request.text) => match result {
                Ok(response) => Turn::completed(request.id, response),
                Err(e) => {
                    tracing::warn!(request_id = %request.id, error = %e, "request failed");
                    Turn::failed(request.id, e.to_string(), start.elapsed().as_secs_f64())
                }
            },
        };

        if output_tx.send(turn).await.is_err() {
            break;
        }
    }
    tracing::debug!("worker stopped");
}
