//! Capability negotiation.
//!
//! Before any command flows, the session needs to know which dialect the
//! connected hub speaks. Hubs whose firmware exposes the capabilities
//! characteristic report their limits directly and get
//! [`ProtocolVersion::Current`]; hubs without it predate that
//! characteristic and fall back to [`ProtocolVersion::Legacy`] with fixed
//! conservative limits. [`negotiate`] runs exactly once per session and its
//! outcome never changes afterwards.
//!
//! Capabilities characteristic layout (12 bytes, Little Endian):
//! ```text
//! ┌────────────────┬─────────┬───────────────────────┐
//! │ Max Write Size │ Flags   │ Max User Program Size │
//! │ 4 bytes        │ 4 bytes │ 4 bytes               │
//! └────────────────┴─────────┴───────────────────────┘
//! ```

use bytes::Bytes;
use tracing::{debug, error, info};

use crate::error::{DecodeError, Result};
use crate::protocol::ProtocolVersion;

/// Exact width of a capabilities characteristic read: three 4-byte fields.
pub const CAPABILITIES_LEN: usize = 12;

/// Write ceiling assumed for hubs that cannot report one. Matches the
/// unnegotiated ATT payload every link supports.
pub const LEGACY_MAX_WRITE_SIZE: u32 = 20;

/// Program size ceiling assumed for hubs that cannot report one. The
/// smallest download area shipped by any legacy firmware.
pub const LEGACY_MAX_USER_PROGRAM_SIZE: u32 = 16 * 1024;

bitflags::bitflags! {
    /// Feature bits reported in the capabilities read.
    ///
    /// Unknown bits from newer firmware are preserved verbatim.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct CapabilityFlags: u32 {
        /// The hub can run an interactive REPL.
        const HAS_REPL = 1 << 0;
        /// User programs may span multiple files.
        const MULTI_FILE_PROGRAMS = 1 << 1;
        /// User programs may include native machine-code modules.
        const NATIVE_MODULES = 1 << 2;
        /// The hub ships a builtin port-monitoring program.
        const PORT_VIEW = 1 << 3;
    }
}

/// Feature and size limits of the connected hub, fixed per session.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Capabilities {
    /// Largest frame the command characteristic accepts in a single write.
    pub max_write_size: u32,
    /// Feature bits.
    pub flags: CapabilityFlags,
    /// Largest user program the hub can store, in bytes.
    pub max_user_program_size: u32,
}

impl Capabilities {
    /// Fixed conservative limits for hubs without the capabilities
    /// characteristic: 20-byte writes, no feature bits, 16 KiB programs.
    pub fn legacy_defaults() -> Self {
        Self {
            max_write_size: LEGACY_MAX_WRITE_SIZE,
            flags: CapabilityFlags::empty(),
            max_user_program_size: LEGACY_MAX_USER_PROGRAM_SIZE,
        }
    }

    /// Parse a capabilities characteristic read.
    ///
    /// The read must be exactly [`CAPABILITIES_LEN`] bytes. Anything else
    /// means the characteristic is not what this crate understands, and
    /// guessing limits for an unknown firmware is worse than failing.
    pub fn parse(buffer: &[u8]) -> std::result::Result<Self, DecodeError> {
        if buffer.len() != CAPABILITIES_LEN {
            return Err(DecodeError::new(
                format!(
                    "capabilities read has {} bytes, expected {}",
                    buffer.len(),
                    CAPABILITIES_LEN
                ),
                Bytes::copy_from_slice(buffer),
            ));
        }
        let max_write_size = u32::from_le_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]);
        let flags = u32::from_le_bytes([buffer[4], buffer[5], buffer[6], buffer[7]]);
        let max_user_program_size =
            u32::from_le_bytes([buffer[8], buffer[9], buffer[10], buffer[11]]);
        Ok(Self {
            max_write_size,
            flags: CapabilityFlags::from_bits_retain(flags),
            max_user_program_size,
        })
    }
}

/// Identity metadata collected during device discovery.
///
/// Used only for diagnostics when a hub lacks the capabilities
/// characteristic; it never changes the negotiated outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HubIdentity {
    /// Firmware revision string from the device information service.
    pub firmware_version: String,
    /// Product id from the PnP record.
    pub product_id: u16,
    /// Product revision from the PnP record.
    pub product_version: u16,
}

/// Negotiation outcome: the dialect plus the limits every later encode and
/// size check consults. Immutable for the session's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Profile {
    /// Framing dialect to speak.
    pub version: ProtocolVersion,
    /// The connected hub's limits.
    pub capabilities: Capabilities,
}

/// Negotiate the session profile from an attempted capabilities read.
///
/// `Some(buffer)` is a successful characteristic read and selects the
/// Current dialect with the hub's own limits. `None` means the
/// characteristic is absent, which identifies older firmware: the session
/// proceeds on Legacy framing with [`Capabilities::legacy_defaults`], and
/// `identity` is logged so the integrator can tell which device line it is
/// talking to.
///
/// A characteristic that is present but unreadable or malformed is an
/// error, not a fallback: the hub clearly expects Current framing, and
/// sending it legacy frames on guessed limits would corrupt the session.
///
/// # Example
///
/// ```
/// use hubwire::{negotiate, HubIdentity, ProtocolVersion};
///
/// let identity = HubIdentity {
///     firmware_version: "3.2.0".to_string(),
///     product_id: 0x0080,
///     product_version: 0x0000,
/// };
///
/// let mut read = Vec::new();
/// read.extend_from_slice(&244u32.to_le_bytes());
/// read.extend_from_slice(&0b0110u32.to_le_bytes());
/// read.extend_from_slice(&(512 * 1024u32).to_le_bytes());
///
/// let profile = negotiate(Some(&read), &identity).unwrap();
/// assert_eq!(profile.version, ProtocolVersion::Current);
/// assert_eq!(profile.capabilities.max_write_size, 244);
///
/// let profile = negotiate(None, &identity).unwrap();
/// assert_eq!(profile.version, ProtocolVersion::Legacy);
/// assert_eq!(profile.capabilities.max_write_size, 20);
/// ```
pub fn negotiate(capabilities_read: Option<&[u8]>, identity: &HubIdentity) -> Result<Profile> {
    match capabilities_read {
        Some(buffer) => {
            let capabilities = Capabilities::parse(buffer).map_err(|err| {
                error!("malformed capabilities read: {}", err);
                err
            })?;
            debug!(
                "negotiated current dialect: max_write_size={} flags={:?} max_user_program_size={}",
                capabilities.max_write_size, capabilities.flags, capabilities.max_user_program_size
            );
            Ok(Profile {
                version: ProtocolVersion::Current,
                capabilities,
            })
        }
        None => {
            info!(
                "no capabilities characteristic; assuming legacy hub (product {:#06x} rev {} firmware {})",
                identity.product_id, identity.product_version, identity.firmware_version
            );
            Ok(Profile {
                version: ProtocolVersion::Legacy,
                capabilities: Capabilities::legacy_defaults(),
            })
        }
    }
}
