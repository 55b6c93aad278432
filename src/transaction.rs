//! Transaction pipeline.
//!
//! All command writes go through a single transaction task to ensure:
//! - At most one transport write is in flight at any time
//! - Frames reach the wire in submission order
//! - Every accepted request produces exactly one [`Completion`]
//!
//! The command characteristic rejects a write while another is pending, so
//! the loop is deliberately sequential: take a request off the intake
//! queue, encode it, await the transport, report the outcome, repeat. The
//! intake queue is unbounded; callers enqueue freely while a write is
//! outstanding and the queue preserves their order.
//!
//! ```text
//! submit() ──► intake queue ──► transaction loop ──► transport.write().await
//!                                      │
//!                    completions ◄─────┘  (one per accepted request)
//! ```

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::HubwireError;
use crate::protocol::{CommandRequest, ProtocolVersion, TransactionId};
use crate::transport::CommandTransport;

/// Outcome of one submitted request, correlated by the caller's id.
///
/// Completions arrive in submission order, one per accepted request.
#[derive(Debug)]
pub enum Completion {
    /// The transport acknowledged the write; the hub has the frame.
    Sent {
        /// Id of the resolved request.
        id: TransactionId,
    },
    /// The transport rejected or failed the write. The pipeline moves on to
    /// the next request; whether to retry is the caller's decision.
    FailedToSend {
        /// Id of the resolved request.
        id: TransactionId,
        /// What the transport reported.
        error: HubwireError,
    },
}

impl Completion {
    /// The transaction id this completion resolves.
    pub fn id(&self) -> TransactionId {
        match self {
            Completion::Sent { id } | Completion::FailedToSend { id, .. } => *id,
        }
    }

    /// Whether the write reached the hub.
    pub fn is_sent(&self) -> bool {
        matches!(self, Completion::Sent { .. })
    }
}

/// One accepted request: the frame bound for the wire plus its id.
struct Transaction {
    id: TransactionId,
    frame: Bytes,
}

impl Transaction {
    /// Accept a request under the session dialect, encoding it eagerly.
    ///
    /// Returns `None` when the dialect does not carry the command; the
    /// request is dropped without a completion, since a frame the hub would
    /// misread must never reach the wire.
    fn accept(request: CommandRequest, version: ProtocolVersion) -> Option<Self> {
        let command_id = request.command.id();
        if !version.supports(command_id) {
            warn!(
                "dropping {:?} (transaction {}): not supported by {:?} hub",
                command_id, request.id, version
            );
            return None;
        }
        Some(Self {
            id: request.id,
            frame: request.command.encode(version),
        })
    }
}

/// Spawn the transaction task for one session.
///
/// Returns the intake sender, the completion stream, and the task handle.
/// The task ends when every intake sender is dropped (after draining the
/// queue) or when the completion receiver is dropped.
pub(crate) fn spawn_transaction_task<T: CommandTransport>(
    transport: T,
    version: ProtocolVersion,
) -> (
    mpsc::UnboundedSender<CommandRequest>,
    mpsc::UnboundedReceiver<Completion>,
    JoinHandle<()>,
) {
    let (request_tx, request_rx) = mpsc::unbounded_channel();
    let (completion_tx, completion_rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(transaction_loop(transport, version, request_rx, completion_tx));
    (request_tx, completion_rx, task)
}

async fn transaction_loop<T: CommandTransport>(
    transport: T,
    version: ProtocolVersion,
    mut requests: mpsc::UnboundedReceiver<CommandRequest>,
    completions: mpsc::UnboundedSender<Completion>,
) {
    while let Some(request) = requests.recv().await {
        let Some(transaction) = Transaction::accept(request, version) else {
            continue;
        };

        // The single point where frames meet the transport. Suspending on
        // the write here is what keeps at most one in flight.
        let completion = match transport.write(transaction.frame).await {
            Ok(()) => Completion::Sent { id: transaction.id },
            Err(error) => {
                debug!("write for transaction {} failed: {}", transaction.id, error);
                Completion::FailedToSend {
                    id: transaction.id,
                    error,
                }
            }
        };

        if completions.send(completion).is_err() {
            // Nobody is listening for outcomes anymore.
            debug!("completion receiver dropped, stopping transaction loop");
            break;
        }
    }
}
