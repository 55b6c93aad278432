//! Event dispatch.
//!
//! The dispatch task turns raw notification buffers into typed [`Event`]s,
//! one outbound event per buffer, in delivery order. A buffer that fails to
//! classify or decode becomes [`Event::ProtocolError`] carrying the bytes
//! verbatim; the stream continues with the next notification either way.
//!
//! Dispatch runs independently of the transaction pipeline. A hub may
//! notify at any moment, including while a command write is outstanding,
//! and those events must not queue behind the write.

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::protocol::{decode_event, Event};

/// Spawn the dispatch task for one session.
///
/// Returns the notification intake sender and the task handle. Decoded
/// events go to `events`, which the session shares with its own
/// announcements. The task ends when every intake sender is dropped or when
/// the event receiver goes away.
pub(crate) fn spawn_dispatch_task(
    events: mpsc::UnboundedSender<Event>,
) -> (mpsc::UnboundedSender<Bytes>, JoinHandle<()>) {
    let (notify_tx, notify_rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(dispatch_loop(notify_rx, events));
    (notify_tx, task)
}

async fn dispatch_loop(
    mut notifications: mpsc::UnboundedReceiver<Bytes>,
    events: mpsc::UnboundedSender<Event>,
) {
    while let Some(buffer) = notifications.recv().await {
        let event = match decode_event(&buffer) {
            Ok(event) => event,
            Err(error) => {
                warn!("undecodable notification: {}", error);
                Event::ProtocolError(error)
            }
        };
        if events.send(event).is_err() {
            debug!("event receiver dropped, stopping dispatch loop");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;
    use crate::protocol::StatusFlags;

    #[tokio::test]
    async fn test_dispatch_decodes_in_delivery_order() {
        let (event_tx, mut events) = mpsc::unbounded_channel();
        let (notify_tx, _task) = spawn_dispatch_task(event_tx);

        notify_tx
            .send(Bytes::from_static(&[0x80, 0x40, 0x00, 0x00, 0x00]))
            .unwrap();
        notify_tx.send(Bytes::from_static(&[0x81, b'o', b'k'])).unwrap();

        assert_eq!(
            events.recv().await.unwrap(),
            Event::StatusReport {
                flags: StatusFlags::USER_PROGRAM_RUNNING
            }
        );
        assert_eq!(
            events.recv().await.unwrap(),
            Event::WriteStdout {
                payload: Bytes::from_static(b"ok")
            }
        );
    }

    #[tokio::test]
    async fn test_undecodable_buffer_becomes_protocol_error_and_stream_survives() {
        let (event_tx, mut events) = mpsc::unbounded_channel();
        let (notify_tx, _task) = spawn_dispatch_task(event_tx);

        notify_tx.send(Bytes::from_static(&[0xFF, 0x00])).unwrap();
        notify_tx.send(Bytes::from_static(&[0x81, b'!'])).unwrap();

        assert_eq!(
            events.recv().await.unwrap(),
            Event::ProtocolError(DecodeError::new(
                "unknown event type: 0xff",
                Bytes::from_static(&[0xFF, 0x00])
            ))
        );
        // The bad buffer cost nothing but itself.
        assert_eq!(
            events.recv().await.unwrap(),
            Event::WriteStdout {
                payload: Bytes::from_static(b"!")
            }
        );
    }

    #[tokio::test]
    async fn test_dispatch_ends_when_intake_closes() {
        let (event_tx, mut events) = mpsc::unbounded_channel();
        let (notify_tx, task) = spawn_dispatch_task(event_tx);

        notify_tx.send(Bytes::from_static(&[0x81])).unwrap();
        drop(notify_tx);

        assert!(events.recv().await.is_some());
        assert!(events.recv().await.is_none());
        task.await.unwrap();
    }
}
