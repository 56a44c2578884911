use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// One line of user text queued for the pipeline.
#[derive(Debug, Clone)]
pub struct Request {
    pub id: Uuid,
    pub text: String,
    /// Cancelling this drops the request whether it is queued or in flight.
    pub cancel: CancellationToken,
}

impl Request {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            cancel: CancellationToken::new(),
        }
    }
}

/// Handle kept by the submitter of a cancellable request.
#[derive(Debug, Clone)]
pub struct Ticket {
    pub id: Uuid,
    pub cancel: CancellationToken,
}

/// Input channel sender: front-ends push requests here.
pub type InputSender = mpsc::Sender<Request>;
/// Input channel receiver: the worker consumes from here.
pub type InputReceiver = mpsc::Receiver<Request>;

/// Create an input channel with the given buffer size.
pub fn channel(buffer: usize) -> (InputSender, InputReceiver) {
    mpsc::channel(buffer)
}

/// Queue user text; returns the request id for matching the reply.
pub async fn submit_text(
    tx: &InputSender,
    text: impl Into<String>,
) -> Result<Uuid, mpsc::error::SendError<Request>> {
    let request = Request::new(text);
    let id = request.id;
    tx.send(request).await?;
    Ok(id)
}

/// Queue user text without waiting for buffer space. The returned ticket
/// can withdraw the request later; a full buffer is reported as an error.
pub fn try_submit_text(
    tx: &InputSender,
    text: impl Into<String>,
) -> Result<Ticket, mpsc::error::TrySendError<Request>> {
    let request = Request::new(text);
    let ticket = Ticket {
        id: request.id,
        cancel: request.cancel.clone(),
    };
    tx.try_send(request)?;
    Ok(ticket)
}
