//! Wire protocol vocabulary: command encoding and event decoding.
//!
//! Commands and events share one frame shape (1-byte discriminator, then a
//! payload) but flow over different characteristics and draw their
//! discriminators from disjoint ranges: commands from `0x00..=0x7F`, events
//! from `0x80..=0xFF`. Either side of the codec rejects the other side's
//! discriminators outright.

mod command;
mod event;

pub use command::{Command, CommandId, CommandRequest, ProtocolVersion, TransactionId};
pub use event::{
    classify_event, decode_event, decode_status_report, decode_write_app_data,
    decode_write_stdout, Event, EventId, StatusFlags, STATUS_REPORT_MIN_LEN,
};
