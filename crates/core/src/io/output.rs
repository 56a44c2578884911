use tokio::sync::mpsc;
use uuid::Uuid;

use crate::types::AgentResponse;

/// How one request ended.
#[derive(Debug, Clone)]
pub enum TurnOutcome {
    Completed(AgentResponse),
    /// The pipeline aborted; `execution_time` covers the stages that ran.
    Failed { error: String, execution_time: f64 },
}

/// An outbound reply to deliver to the user.
#[derive(Debug, Clone)]
pub struct Turn {
    pub request_id: Uuid,
    pub outcome: TurnOutcome,
}

impl Turn {
    pub fn completed(request_id: Uuid, response: AgentResponse) -> Self {
        Self {
            request_id,
            outcome: TurnOutcome::Completed(response),
        }
    }

    pub fn failed(request_id: Uuid, error: impl Into<String>, execution_time: f64) -> Self {
        Self {
            request_id,
            outcome: TurnOutcome::Failed {
                error: error.into(),
                execution_time,
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, TurnOutcome::Completed(_))
    }
}

/// Output channel sender: the worker pushes replies here.
pub type OutputSender = mpsc::Sender<Turn>;
/// Output channel receiver: front-ends consume from here.
pub type OutputReceiver = mpsc::Receiver<Turn>;

/// Create an output channel with the given buffer size.
pub fn channel(buffer: usize) -> (OutputSender, OutputReceiver) {
    mpsc::channel(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_turn_keeps_partial_time() {
        let id = Uuid::new_v4();
        let turn = Turn::failed(id, "boom", 0.25);
        assert!(!turn.is_success());
        assert_eq!(turn.request_id, id);
        match turn.outcome {
            TurnOutcome::Failed { error, execution_time } => {
                assert_eq!(error, "boom");
                assert_eq!(execution_time, 0.25);
            }
            TurnOutcome::Completed(_) => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn channel_send_recv() {
        let (tx, mut rx) = channel(4);
        tx.send(Turn::failed(Uuid::new_v4(), "x", 0.0)).await.unwrap();
        assert!(!rx.recv().await.unwrap().is_success());
    }
}
