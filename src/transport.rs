//! Transport interface.
//!
//! The engine does not own a connection. Outbound it drives exactly one
//! primitive, [`CommandTransport::write`]; inbound the integrator pushes
//! raw notification buffers through the [`NotifySink`](crate::NotifySink)
//! handle. Everything else about the link (discovery, pairing,
//! subscription, reconnects) belongs to the integrating application, which
//! is also where platform BLE or serial stacks live.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::{HubwireError, Result};

/// Boxed future alias used at the transport seam.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Write half of the hub's command characteristic.
///
/// The engine guarantees at most one `write` call is pending at any time;
/// the returned future is awaited to completion before the next frame is
/// looked at. An implementation that still detects an overlapping write
/// (some other party sharing the characteristic) should return
/// [`HubwireError::Busy`].
pub trait CommandTransport: Send + Sync + 'static {
    /// Write one encoded frame with response. The future resolves `Ok` once
    /// the device acknowledged the write, or `Err` once the transport gave
    /// up on it.
    fn write(&self, frame: Bytes) -> BoxFuture<'_, Result<()>>;
}

/// Channel-backed transport for tests and demos.
///
/// Every frame the engine writes lands on the paired receiver, and the
/// write resolves successfully as soon as the frame is queued. Dropping the
/// receiver makes subsequent writes fail with [`HubwireError::Closed`],
/// which is the cheapest way to exercise failure paths.
///
/// # Example
///
/// ```
/// use bytes::Bytes;
/// use hubwire::{CommandTransport, LoopbackTransport};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let (transport, mut frames) = LoopbackTransport::new();
/// transport.write(Bytes::from_static(&[0x02])).await.unwrap();
/// assert_eq!(frames.recv().await.unwrap().as_ref(), &[0x02]);
/// # }
/// ```
pub struct LoopbackTransport {
    frames: mpsc::UnboundedSender<Bytes>,
}

impl LoopbackTransport {
    /// Create a transport plus the receiver observing every written frame.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Bytes>) {
        let (frames, receiver) = mpsc::unbounded_channel();
        (Self { frames }, receiver)
    }
}

impl CommandTransport for LoopbackTransport {
    fn write(&self, frame: Bytes) -> BoxFuture<'_, Result<()>> {
        let outcome = self
            .frames
            .send(frame)
            .map_err(|_| HubwireError::Closed);
        Box::pin(async move { outcome })
    }
}
