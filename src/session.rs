//! Session lifecycle and wiring.
//!
//! [`Session::start`] is the integration point: hand it the transport's
//! write half plus the negotiated [`Profile`] and get back the engine and
//! the [`SessionBus`] the application consumes. One session serves exactly
//! one connected hub; reconnecting means negotiating again and starting a
//! fresh session.

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::capabilities::Profile;
use crate::dispatch;
use crate::error::{HubwireError, Result};
use crate::protocol::{CommandRequest, Event, ProtocolVersion};
use crate::transaction::{self, Completion};
use crate::transport::CommandTransport;

/// Consumer side of a session: the two outbound streams.
///
/// Both streams are unbounded and independently ordered. Completions arrive
/// in submission order; events arrive in transport-delivery order. Neither
/// waits for the other.
pub struct SessionBus {
    /// One completion per accepted request.
    pub completions: mpsc::UnboundedReceiver<Completion>,
    /// Typed events, including protocol errors.
    pub events: mpsc::UnboundedReceiver<Event>,
}

/// Order-preserving intake for raw notification buffers.
///
/// The transport integrator calls [`NotifySink::notify`] once per received
/// notification, in delivery order. Clones share the same intake queue; the
/// dispatcher keeps running until every clone is dropped or the session is
/// closed.
#[derive(Clone)]
pub struct NotifySink {
    tx: mpsc::UnboundedSender<Bytes>,
}

impl NotifySink {
    /// Deliver one notification buffer to the dispatcher.
    ///
    /// Never blocks. Returns [`HubwireError::Closed`] once the session has
    /// shut down.
    pub fn notify(&self, buffer: impl Into<Bytes>) -> Result<()> {
        self.tx.send(buffer.into()).map_err(|_| HubwireError::Closed)
    }
}

/// A running protocol engine for one connected hub.
///
/// # Example
///
/// ```
/// use hubwire::{negotiate, Command, CommandRequest, HubIdentity, LoopbackTransport, Session};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> hubwire::Result<()> {
/// let identity = HubIdentity {
///     firmware_version: "3.2.0".to_string(),
///     product_id: 0x0080,
///     product_version: 0x0000,
/// };
/// let profile = negotiate(None, &identity)?;
///
/// let (transport, mut hub_frames) = LoopbackTransport::new();
/// let (session, mut bus) = Session::start(transport, profile);
///
/// session.submit(CommandRequest::new(1, Command::StartRepl))?;
/// assert_eq!(bus.completions.recv().await.unwrap().id(), 1);
/// assert_eq!(hub_frames.recv().await.unwrap().as_ref(), &[0x02]);
///
/// session.close().await;
/// # Ok(())
/// # }
/// ```
pub struct Session {
    requests: mpsc::UnboundedSender<CommandRequest>,
    notify: NotifySink,
    profile: Profile,
    transaction_task: JoinHandle<()>,
    dispatch_task: JoinHandle<()>,
}

impl Session {
    /// Start the engine for one connected hub.
    ///
    /// On a Current-dialect profile the hub's capability announcement is
    /// the first event on the bus, so consumers learn the session limits
    /// the same way they learn everything else.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime; both pipeline tasks are
    /// spawned onto the current one.
    pub fn start<T: CommandTransport>(transport: T, profile: Profile) -> (Self, SessionBus) {
        // 1. Event stream, shared by the dispatcher and the session's own
        //    announcements.
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        // 2. Announce the negotiated limits. Legacy hubs never reported
        //    any, so there is nothing to announce there.
        if profile.version == ProtocolVersion::Current {
            let announcement = Event::HubCapabilities(profile.capabilities.clone());
            let _ = event_tx.send(announcement);
        }

        // 3. Outbound pipeline.
        let (requests, completions, transaction_task) =
            transaction::spawn_transaction_task(transport, profile.version);

        // 4. Inbound pipeline.
        let (notify_tx, dispatch_task) = dispatch::spawn_dispatch_task(event_tx);

        debug!(
            "session started: {:?} dialect, max_write_size={}",
            profile.version, profile.capabilities.max_write_size
        );

        let session = Session {
            requests,
            notify: NotifySink { tx: notify_tx },
            profile,
            transaction_task,
            dispatch_task,
        };
        let bus = SessionBus {
            completions,
            events: event_rx,
        };
        (session, bus)
    }

    /// Enqueue one request; its completion arrives on the bus.
    ///
    /// Never blocks. Intake is unbounded FIFO, so callers may submit freely
    /// while an earlier write is still on the wire. Returns
    /// [`HubwireError::Closed`] once the engine has shut down.
    pub fn submit(&self, request: CommandRequest) -> Result<()> {
        self.requests
            .send(request)
            .map_err(|_| HubwireError::Closed)
    }

    /// Handle for the transport integrator to push notification buffers
    /// through, one call per notification.
    pub fn notify_sink(&self) -> NotifySink {
        self.notify.clone()
    }

    /// The profile this session was negotiated with.
    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Shut down the session.
    ///
    /// Stops accepting requests, lets the transaction loop drain whatever
    /// was already queued (their completions still reach the bus), then
    /// stops the dispatcher. Notifications not yet decoded at that point
    /// are discarded.
    pub async fn close(self) {
        let Session {
            requests,
            notify,
            profile: _,
            transaction_task,
            dispatch_task,
        } = self;

        drop(requests);
        drop(notify);
        let _ = transaction_task.await;

        // Integrator-held sink clones may outlive the session, so the
        // dispatcher will not necessarily end on its own.
        dispatch_task.abort();
        let _ = dispatch_task.await;
        debug!("session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{Capabilities, CapabilityFlags};
    use crate::protocol::Command;
    use crate::transport::LoopbackTransport;

    fn current_profile() -> Profile {
        Profile {
            version: ProtocolVersion::Current,
            capabilities: Capabilities {
                max_write_size: 244,
                flags: CapabilityFlags::HAS_REPL,
                max_user_program_size: 512 * 1024,
            },
        }
    }

    fn legacy_profile() -> Profile {
        Profile {
            version: ProtocolVersion::Legacy,
            capabilities: Capabilities::legacy_defaults(),
        }
    }

    #[tokio::test]
    async fn test_current_session_announces_capabilities_first() {
        let (transport, _frames) = LoopbackTransport::new();
        let (session, mut bus) = Session::start(transport, current_profile());

        let sink = session.notify_sink();
        sink.notify(vec![0x81, b'x']).unwrap();

        // The announcement precedes anything the hub sends.
        let first = bus.events.recv().await.unwrap();
        assert_eq!(
            first,
            Event::HubCapabilities(current_profile().capabilities)
        );
        let second = bus.events.recv().await.unwrap();
        assert_eq!(
            second,
            Event::WriteStdout {
                payload: Bytes::from_static(b"x")
            }
        );
    }

    #[tokio::test]
    async fn test_legacy_session_announces_nothing() {
        let (transport, _frames) = LoopbackTransport::new();
        let (session, mut bus) = Session::start(transport, legacy_profile());

        session.notify_sink().notify(vec![0x81, b'x']).unwrap();
        let first = bus.events.recv().await.unwrap();
        assert_eq!(
            first,
            Event::WriteStdout {
                payload: Bytes::from_static(b"x")
            }
        );
    }

    #[tokio::test]
    async fn test_submit_flows_to_transport_and_completion() {
        let (transport, mut frames) = LoopbackTransport::new();
        let (session, mut bus) = Session::start(transport, current_profile());

        session
            .submit(CommandRequest::new(42, Command::StopUserProgram))
            .unwrap();

        assert_eq!(frames.recv().await.unwrap().as_ref(), &[0x00]);
        assert_eq!(bus.completions.recv().await.unwrap().id(), 42);
    }

    #[tokio::test]
    async fn test_close_drains_queued_requests() {
        let (transport, mut frames) = LoopbackTransport::new();
        let (session, mut bus) = Session::start(transport, current_profile());

        for id in 0..3u32 {
            session
                .submit(CommandRequest::new(id, Command::StartRepl))
                .unwrap();
        }
        session.close().await;

        for id in 0..3u32 {
            assert_eq!(frames.recv().await.unwrap().as_ref(), &[0x02]);
            assert_eq!(bus.completions.recv().await.unwrap().id(), id);
        }
        assert!(bus.completions.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_notify_fails_after_close() {
        let (transport, _frames) = LoopbackTransport::new();
        let (session, _bus) = Session::start(transport, current_profile());

        let sink = session.notify_sink();
        session.close().await;

        let err = sink.notify(vec![0x81]).unwrap_err();
        assert!(matches!(err, HubwireError::Closed));
    }

    #[tokio::test]
    async fn test_profile_is_retained() {
        let (transport, _frames) = LoopbackTransport::new();
        let (session, _bus) = Session::start(transport, legacy_profile());
        assert_eq!(session.profile().version, ProtocolVersion::Legacy);
        assert_eq!(session.profile().capabilities.max_write_size, 20);
    }
}
