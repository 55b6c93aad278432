//! # hubwire
//!
//! Host-side command/event protocol engine for embedded hubs that expose a
//! pair of byte-stream characteristics: one written with command frames,
//! one notifying event frames.
//!
//! This crate owns the protocol layer only. A platform integration (BLE
//! stack, serial bridge, test harness) supplies the transport write half
//! and feeds received notifications in; the engine handles encoding,
//! decoding, write serialization, and completion correlation.
//!
//! ## Architecture
//!
//! - **Outbound** ([`Session::submit`]): requests enter an unbounded FIFO
//!   and a dedicated task puts them on the wire one at a time, never
//!   starting a write before the previous one resolved. Each accepted
//!   request yields exactly one [`Completion`].
//! - **Inbound** ([`NotifySink::notify`]): each notification buffer decodes
//!   into one typed [`Event`], with undecodable buffers surfacing as
//!   [`Event::ProtocolError`] instead of tearing the session down.
//! - **Negotiation** ([`negotiate`]): runs once per connection before the
//!   session starts and decides between the Current and Legacy dialects.
//!
//! ## Example
//!
//! ```ignore
//! use hubwire::{negotiate, Command, CommandRequest, HubIdentity, Session};
//!
//! #[tokio::main]
//! async fn main() -> hubwire::Result<()> {
//!     // capabilities_read and identity come from device discovery.
//!     let profile = negotiate(capabilities_read.as_deref(), &identity)?;
//!     let (session, mut bus) = Session::start(transport, profile);
//!
//!     session.submit(CommandRequest::new(1, Command::StartRepl))?;
//!     while let Some(event) = bus.events.recv().await {
//!         println!("{:?}", event);
//!     }
//!     Ok(())
//! }
//! ```

pub mod capabilities;
pub mod error;
pub mod protocol;
pub mod transaction;
pub mod transport;

mod dispatch;
mod session;

pub use capabilities::{negotiate, Capabilities, CapabilityFlags, HubIdentity, Profile};
pub use error::{DecodeError, HubwireError, Result};
pub use protocol::{
    Command, CommandId, CommandRequest, Event, EventId, ProtocolVersion, StatusFlags,
    TransactionId,
};
pub use session::{NotifySink, Session, SessionBus};
pub use transaction::Completion;
pub use transport::{BoxFuture, CommandTransport, LoopbackTransport};
