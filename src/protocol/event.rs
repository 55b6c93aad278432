//! Event classification and decoding.
//!
//! Event frame structure (1-byte discriminator + payload):
//! ```text
//! ┌───────────────┬────────────────────────────┐
//! │ Event ID      │ Payload                    │
//! │ 1 byte        │ 0..n bytes, event-specific │
//! └───────────────┴────────────────────────────┘
//! ```
//! Event IDs occupy `0x80..=0xFF`; the high bit distinguishes them from
//! command discriminators (see [`super::command`]).
//!
//! Decoding is two-phase: [`classify_event`] inspects only the leading
//! discriminator byte, then a per-type decoder parses the payload. An
//! unknown discriminator short-circuits before any payload parsing. Every
//! failure is a [`DecodeError`] carrying the buffer verbatim; a hostile or
//! buggy hub can never panic this path or tear the session down.

use bytes::Bytes;

use crate::capabilities::Capabilities;
use crate::error::DecodeError;

/// Wire discriminator for each event.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventId {
    /// Hub status flags snapshot.
    StatusReport = 0x80,
    /// Chunk of the running program's standard output.
    WriteStdout = 0x81,
    /// Write into a host-visible application data buffer.
    WriteAppData = 0x82,
}

impl EventId {
    /// All event discriminators, in wire order.
    pub const ALL: [EventId; 3] = [
        EventId::StatusReport,
        EventId::WriteStdout,
        EventId::WriteAppData,
    ];

    /// Map a discriminator byte to its event type, if known.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x80 => Some(EventId::StatusReport),
            0x81 => Some(EventId::WriteStdout),
            0x82 => Some(EventId::WriteAppData),
            _ => None,
        }
    }
}

bitflags::bitflags! {
    /// Hub status bits carried by [`Event::StatusReport`].
    ///
    /// Each report is a full snapshot, not a delta. Bits the hub sets that
    /// this build does not know are preserved verbatim, so newer firmware
    /// stays readable.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct StatusFlags: u32 {
        /// Battery voltage is low; shutdown is approaching.
        const BATTERY_LOW_VOLTAGE_WARNING = 1 << 0;
        /// Battery voltage forced a shutdown.
        const BATTERY_LOW_VOLTAGE_SHUTDOWN = 1 << 1;
        /// Battery current draw is too high.
        const BATTERY_HIGH_CURRENT = 1 << 2;
        /// The hub is advertising for a connection.
        const BLE_ADVERTISING = 1 << 3;
        /// The radio link quality is poor.
        const BLE_LOW_SIGNAL = 1 << 4;
        /// The power button is currently pressed.
        const POWER_BUTTON_PRESSED = 1 << 5;
        /// A user program is running.
        const USER_PROGRAM_RUNNING = 1 << 6;
        /// The hub is powering off.
        const SHUTDOWN = 1 << 7;
        /// A shutdown was requested but has not completed.
        const SHUTDOWN_REQUESTED = 1 << 8;
    }
}

/// A typed inbound event, plus the two locally synthesized variants.
///
/// [`Event::HubCapabilities`] and [`Event::ProtocolError`] never appear on
/// the wire: the first announces the negotiated limits when a session
/// starts, the second wraps a notification that failed to decode.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Event {
    /// Snapshot of the hub's status bits.
    StatusReport {
        /// Current status flags.
        flags: StatusFlags,
    },
    /// A chunk of the running program's standard output.
    WriteStdout {
        /// Output bytes, possibly empty.
        payload: Bytes,
    },
    /// A write into a host-visible application data buffer.
    WriteAppData {
        /// Buffer contents, possibly empty.
        payload: Bytes,
    },
    /// The connected hub's negotiated limits, emitted once at session
    /// start on Current-dialect sessions.
    HubCapabilities(Capabilities),
    /// A notification that could not be classified or decoded. Informative,
    /// never fatal; the stream continues with the next notification.
    ProtocolError(DecodeError),
}

/// Minimum status report frame length: discriminator plus 4 flag bytes.
pub const STATUS_REPORT_MIN_LEN: usize = 5;

/// Classify a notification buffer by its leading discriminator byte.
///
/// Returns `None` for an empty buffer or an unknown discriminator. Payload
/// bytes are not examined; a truncated status report still classifies as
/// [`EventId::StatusReport`] and fails later, in its decoder.
pub fn classify_event(buffer: &[u8]) -> Option<EventId> {
    buffer.first().copied().and_then(EventId::from_byte)
}

/// Decode the payload of a status report frame.
///
/// The flag field is fixed-width Little Endian. Frames shorter than
/// [`STATUS_REPORT_MIN_LEN`] fail; bytes beyond the flag field are ignored
/// so reports from newer firmware that append fields keep decoding.
pub fn decode_status_report(buffer: &[u8]) -> Result<StatusFlags, DecodeError> {
    if buffer.len() < STATUS_REPORT_MIN_LEN {
        return Err(DecodeError::new(
            format!(
                "status report too short: {} bytes, expected at least {}",
                buffer.len(),
                STATUS_REPORT_MIN_LEN
            ),
            Bytes::copy_from_slice(buffer),
        ));
    }
    let flags = u32::from_le_bytes([buffer[1], buffer[2], buffer[3], buffer[4]]);
    Ok(StatusFlags::from_bits_retain(flags))
}

/// Decode the payload of a stdout frame: everything after the discriminator.
pub fn decode_write_stdout(buffer: &[u8]) -> Result<Bytes, DecodeError> {
    match buffer.split_first() {
        Some((_, payload)) => Ok(Bytes::copy_from_slice(payload)),
        None => Err(DecodeError::new("empty notification", Bytes::new())),
    }
}

/// Decode the payload of an app data frame: everything after the
/// discriminator.
pub fn decode_write_app_data(buffer: &[u8]) -> Result<Bytes, DecodeError> {
    match buffer.split_first() {
        Some((_, payload)) => Ok(Bytes::copy_from_slice(payload)),
        None => Err(DecodeError::new("empty notification", Bytes::new())),
    }
}

/// Decode a full notification buffer into a typed event.
///
/// This is the classify-then-decode composition the dispatcher runs for
/// every notification. It never produces [`Event::HubCapabilities`] or
/// [`Event::ProtocolError`]; those are synthesized elsewhere.
///
/// # Example
///
/// ```
/// use hubwire::protocol::{decode_event, Event};
///
/// let event = decode_event(&[0x81, 0x68, 0x69]).unwrap();
/// assert!(matches!(event, Event::WriteStdout { payload } if payload.as_ref() == b"hi"));
///
/// let err = decode_event(&[0xFF, 0x00]).unwrap_err();
/// assert_eq!(err.raw.as_ref(), &[0xFF, 0x00]);
/// ```
pub fn decode_event(buffer: &[u8]) -> Result<Event, DecodeError> {
    match classify_event(buffer) {
        Some(EventId::StatusReport) => Ok(Event::StatusReport {
            flags: decode_status_report(buffer)?,
        }),
        Some(EventId::WriteStdout) => Ok(Event::WriteStdout {
            payload: decode_write_stdout(buffer)?,
        }),
        Some(EventId::WriteAppData) => Ok(Event::WriteAppData {
            payload: decode_write_app_data(buffer)?,
        }),
        None => match buffer.first() {
            Some(byte) => Err(DecodeError::new(
                format!("unknown event type: {:#04x}", byte),
                Bytes::copy_from_slice(buffer),
            )),
            None => Err(DecodeError::new("empty notification", Bytes::new())),
        },
    }
}
