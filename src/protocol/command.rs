//! Command encoding.
//!
//! Command frame structure (1-byte discriminator + payload):
//! ```text
//! ┌───────────────┬──────────────────────────────┐
//! │ Command ID    │ Payload                      │
//! │ 1 byte        │ 0..n bytes, command-specific │
//! └───────────────┴──────────────────────────────┘
//! ```
//! All multi-byte integers are Little Endian. Command IDs occupy
//! `0x00..=0x7F` and event IDs occupy `0x80..=0xFF`, so the first byte of
//! any frame identifies its direction unambiguously (see
//! [`super::event`]).
//!
//! Encoding is total: every [`Command`] value encodes under every
//! [`ProtocolVersion`]. Whether a hub speaking a given dialect *accepts*
//! the command is a separate question, answered by
//! [`ProtocolVersion::supports`] and enforced at the transaction pipeline,
//! not here.

use bytes::Bytes;

/// Caller-assigned identifier correlating a request with its completion.
///
/// Opaque to the engine; it only needs to be unique among the caller's
/// outstanding requests.
pub type TransactionId = u32;

/// Wire discriminator for each command.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandId {
    /// Stop the running user program.
    StopUserProgram = 0x00,
    /// Start a stored user program.
    StartUserProgram = 0x01,
    /// Start the interactive REPL.
    StartRepl = 0x02,
    /// Declare the size of an incoming user program download.
    WriteUserProgramMeta = 0x03,
    /// Write a chunk of the user program into hub RAM.
    WriteUserRam = 0x04,
    /// Reboot the hub into firmware-update mode.
    RebootToUpdateMode = 0x05,
    /// Feed bytes to the running program's standard input.
    WriteStdin = 0x06,
    /// Write into an application-defined data buffer on the hub.
    WriteAppData = 0x07,
}

impl CommandId {
    /// All command discriminators, in wire order.
    pub const ALL: [CommandId; 8] = [
        CommandId::StopUserProgram,
        CommandId::StartUserProgram,
        CommandId::StartRepl,
        CommandId::WriteUserProgramMeta,
        CommandId::WriteUserRam,
        CommandId::RebootToUpdateMode,
        CommandId::WriteStdin,
        CommandId::WriteAppData,
    ];
}

/// Framing dialect negotiated once per session.
///
/// Produced by [`negotiate`](crate::capabilities::negotiate) and fixed for
/// the session's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ProtocolVersion {
    /// Older firmware without the capabilities characteristic. Conservative
    /// framing: no slot byte on program start, and the commands introduced
    /// alongside the capabilities read do not exist.
    Legacy,
    /// Firmware that reports its capabilities. Full command set, explicit
    /// slot selection on program start.
    Current,
}

impl ProtocolVersion {
    /// Whether this dialect carries the given command at all.
    ///
    /// [`CommandId::WriteStdin`], [`CommandId::WriteAppData`] and
    /// [`CommandId::RebootToUpdateMode`] postdate the legacy firmware line;
    /// a legacy hub would misinterpret their discriminators, so the
    /// transaction pipeline drops them instead of sending.
    pub fn supports(self, id: CommandId) -> bool {
        match self {
            ProtocolVersion::Current => true,
            ProtocolVersion::Legacy => !matches!(
                id,
                CommandId::WriteStdin | CommandId::WriteAppData | CommandId::RebootToUpdateMode
            ),
        }
    }
}

/// A command addressed to the hub, before encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Command {
    /// Stop the running user program, if any. No payload.
    StopUserProgram,
    /// Start a stored user program.
    ///
    /// Under [`ProtocolVersion::Current`] an explicit `slot` selects which
    /// stored program runs; `None` lets the hub pick its default. The slot
    /// byte does not exist on the wire under [`ProtocolVersion::Legacy`].
    StartUserProgram {
        /// Program slot to run, when the hub stores more than one.
        slot: Option<u8>,
    },
    /// Start the interactive REPL. No payload.
    StartRepl,
    /// Declare the total size of the user program about to be downloaded.
    ///
    /// A `size` of zero invalidates the currently stored program.
    WriteUserProgramMeta {
        /// Total program size in bytes.
        size: u32,
    },
    /// Write a chunk of the user program into hub RAM at `offset`.
    WriteUserRam {
        /// Byte offset into the program download area.
        offset: u32,
        /// Chunk contents.
        payload: Bytes,
    },
    /// Reboot the hub into firmware-update mode. No payload.
    RebootToUpdateMode,
    /// Feed bytes to the running program's standard input.
    WriteStdin {
        /// Bytes for the program to read.
        payload: Bytes,
    },
    /// Write into an application-defined data buffer on the hub at `offset`.
    WriteAppData {
        /// Byte offset into the application buffer.
        offset: u32,
        /// Bytes to store.
        payload: Bytes,
    },
}

impl Command {
    /// Wire discriminator for this command.
    pub fn id(&self) -> CommandId {
        match self {
            Command::StopUserProgram => CommandId::StopUserProgram,
            Command::StartUserProgram { .. } => CommandId::StartUserProgram,
            Command::StartRepl => CommandId::StartRepl,
            Command::WriteUserProgramMeta { .. } => CommandId::WriteUserProgramMeta,
            Command::WriteUserRam { .. } => CommandId::WriteUserRam,
            Command::RebootToUpdateMode => CommandId::RebootToUpdateMode,
            Command::WriteStdin { .. } => CommandId::WriteStdin,
            Command::WriteAppData { .. } => CommandId::WriteAppData,
        }
    }

    /// Encode this command into the exact frame for `version`.
    ///
    /// Field values out of the connected hub's range (an offset past its
    /// RAM, a payload above its write size) are the caller's contract;
    /// encoding never inspects them.
    ///
    /// # Example
    ///
    /// ```
    /// use bytes::Bytes;
    /// use hubwire::protocol::{Command, ProtocolVersion};
    ///
    /// let command = Command::WriteStdin {
    ///     payload: Bytes::from_static(b"AB"),
    /// };
    /// let frame = command.encode(ProtocolVersion::Current);
    /// assert_eq!(frame.as_ref(), &[0x06, 0x41, 0x42]);
    /// ```
    pub fn encode(&self, version: ProtocolVersion) -> Bytes {
        let mut frame = Vec::with_capacity(self.encoded_len(version));
        frame.push(self.id() as u8);
        match self {
            Command::StopUserProgram | Command::StartRepl | Command::RebootToUpdateMode => {}
            Command::StartUserProgram { slot } => {
                // The slot byte is a Current-dialect extension; legacy hubs
                // treat any payload after the discriminator as garbage.
                if version == ProtocolVersion::Current {
                    if let Some(slot) = slot {
                        frame.push(*slot);
                    }
                }
            }
            Command::WriteUserProgramMeta { size } => {
                frame.extend_from_slice(&size.to_le_bytes());
            }
            Command::WriteUserRam { offset, payload } => {
                frame.extend_from_slice(&offset.to_le_bytes());
                frame.extend_from_slice(payload);
            }
            Command::WriteStdin { payload } => {
                frame.extend_from_slice(payload);
            }
            Command::WriteAppData { offset, payload } => {
                frame.extend_from_slice(&offset.to_le_bytes());
                frame.extend_from_slice(payload);
            }
        }
        Bytes::from(frame)
    }

    /// Exact encoded frame length for `version`.
    pub fn encoded_len(&self, version: ProtocolVersion) -> usize {
        1 + match self {
            Command::StopUserProgram | Command::StartRepl | Command::RebootToUpdateMode => 0,
            Command::StartUserProgram { slot } => {
                match (version, slot) {
                    (ProtocolVersion::Current, Some(_)) => 1,
                    _ => 0,
                }
            }
            Command::WriteUserProgramMeta { .. } => 4,
            Command::WriteUserRam { payload, .. } => 4 + payload.len(),
            Command::WriteStdin { payload } => payload.len(),
            Command::WriteAppData { payload, .. } => 4 + payload.len(),
        }
    }
}

/// A command submission: caller-chosen transaction id plus the command.
///
/// Immutable once created. The engine echoes `id` back in the completion
/// and never interprets it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CommandRequest {
    /// Caller-assigned correlation id.
    pub id: TransactionId,
    /// The command to send.
    pub command: Command,
}

impl CommandRequest {
    /// Create a request for `command` correlated by `id`.
    pub fn new(id: TransactionId, command: Command) -> Self {
        Self { id, command }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_ids_match_wire_values() {
        assert_eq!(CommandId::StopUserProgram as u8, 0x00);
        assert_eq!(CommandId::StartUserProgram as u8, 0x01);
        assert_eq!(CommandId::StartRepl as u8, 0x02);
        assert_eq!(CommandId::WriteUserProgramMeta as u8, 0x03);
        assert_eq!(CommandId::WriteUserRam as u8, 0x04);
        assert_eq!(CommandId::RebootToUpdateMode as u8, 0x05);
        assert_eq!(CommandId::WriteStdin as u8, 0x06);
        assert_eq!(CommandId::WriteAppData as u8, 0x07);
    }

    #[test]
    fn test_command_ids_stay_below_event_range() {
        for id in CommandId::ALL {
            assert!((id as u8) < 0x80, "{:?} collides with the event range", id);
        }
    }

    #[test]
    fn test_encode_payloadless_commands() {
        for (command, expected) in [
            (Command::StopUserProgram, 0x00),
            (Command::StartRepl, 0x02),
            (Command::RebootToUpdateMode, 0x05),
        ] {
            let frame = command.encode(ProtocolVersion::Current);
            assert_eq!(frame.as_ref(), &[expected]);
        }
    }

    #[test]
    fn test_encode_start_user_program_with_slot() {
        let command = Command::StartUserProgram { slot: Some(3) };
        let frame = command.encode(ProtocolVersion::Current);
        assert_eq!(frame.as_ref(), &[0x01, 0x03]);
    }

    #[test]
    fn test_encode_start_user_program_without_slot() {
        let command = Command::StartUserProgram { slot: None };
        let frame = command.encode(ProtocolVersion::Current);
        assert_eq!(frame.as_ref(), &[0x01]);
    }

    #[test]
    fn test_encode_start_user_program_legacy_ignores_slot() {
        // Legacy framing has no slot byte even when the caller supplies one.
        let command = Command::StartUserProgram { slot: Some(3) };
        let frame = command.encode(ProtocolVersion::Legacy);
        assert_eq!(frame.as_ref(), &[0x01]);
    }

    #[test]
    fn test_encode_write_user_program_meta_little_endian() {
        let command = Command::WriteUserProgramMeta { size: 0x0001_0203 };
        let frame = command.encode(ProtocolVersion::Current);
        assert_eq!(frame.as_ref(), &[0x03, 0x03, 0x02, 0x01, 0x00]);
    }

    #[test]
    fn test_encode_write_user_ram() {
        let command = Command::WriteUserRam {
            offset: 0x100,
            payload: Bytes::from_static(&[0xAA, 0xBB]),
        };
        let frame = command.encode(ProtocolVersion::Current);
        assert_eq!(frame.as_ref(), &[0x04, 0x00, 0x01, 0x00, 0x00, 0xAA, 0xBB]);
    }

    #[test]
    fn test_encode_write_stdin() {
        let command = Command::WriteStdin {
            payload: Bytes::from_static(b"AB"),
        };
        let frame = command.encode(ProtocolVersion::Current);
        assert_eq!(frame.as_ref(), &[0x06, 0x41, 0x42]);
    }

    #[test]
    fn test_encode_write_stdin_empty_payload() {
        // An empty payload is a valid frame: just the discriminator.
        let command = Command::WriteStdin {
            payload: Bytes::new(),
        };
        let frame = command.encode(ProtocolVersion::Current);
        assert_eq!(frame.as_ref(), &[0x06]);
    }

    #[test]
    fn test_encode_write_app_data() {
        let command = Command::WriteAppData {
            offset: 8,
            payload: Bytes::from_static(&[0x01]),
        };
        let frame = command.encode(ProtocolVersion::Current);
        assert_eq!(frame.as_ref(), &[0x07, 0x08, 0x00, 0x00, 0x00, 0x01]);
    }

    #[test]
    fn test_encode_is_total_across_versions() {
        // Every command encodes under every dialect, including the ones a
        // legacy hub never receives. Gating is the pipeline's job.
        let commands = [
            Command::StopUserProgram,
            Command::StartUserProgram { slot: Some(1) },
            Command::StartRepl,
            Command::WriteUserProgramMeta { size: 64 },
            Command::WriteUserRam {
                offset: 0,
                payload: Bytes::from_static(&[1, 2, 3]),
            },
            Command::RebootToUpdateMode,
            Command::WriteStdin {
                payload: Bytes::from_static(b"x"),
            },
            Command::WriteAppData {
                offset: 0,
                payload: Bytes::from_static(b"y"),
            },
        ];
        for version in [ProtocolVersion::Legacy, ProtocolVersion::Current] {
            for command in &commands {
                let frame = command.encode(version);
                assert_eq!(frame[0], command.id() as u8);
                assert_eq!(frame.len(), command.encoded_len(version));
            }
        }
    }

    #[test]
    fn test_legacy_support_gating() {
        for id in CommandId::ALL {
            assert!(ProtocolVersion::Current.supports(id));
        }
        assert!(ProtocolVersion::Legacy.supports(CommandId::StopUserProgram));
        assert!(ProtocolVersion::Legacy.supports(CommandId::StartUserProgram));
        assert!(ProtocolVersion::Legacy.supports(CommandId::StartRepl));
        assert!(ProtocolVersion::Legacy.supports(CommandId::WriteUserProgramMeta));
        assert!(ProtocolVersion::Legacy.supports(CommandId::WriteUserRam));
        assert!(!ProtocolVersion::Legacy.supports(CommandId::RebootToUpdateMode));
        assert!(!ProtocolVersion::Legacy.supports(CommandId::WriteStdin));
        assert!(!ProtocolVersion::Legacy.supports(CommandId::WriteAppData));
    }
}
