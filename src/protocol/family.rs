//! Device families and their addressing fields.
//!
//! A device belongs to exactly one [`Family`]. Its [`Addressing`] carries the
//! fields the transceiver needs to reach it and is validated on creation.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Highest house code letter accepted by remote-code devices.
const MAX_HOUSE_CODE: char = 'P';

/// Valid unit codes for remote-code devices.
const REMOTE_UNIT_CODES: std::ops::RangeInclusive<u8> = 1..=16;

/// Highest unit code for addressable switches.
const MAX_SWITCH_UNIT_CODE: u8 = 16;

/// Addressable switch ids are 26-bit values.
const MAX_SWITCH_DEVICE_ID: u32 = 0x03FF_FFFF;

// ============================================================================
// Family
// ============================================================================

/// Addressing and command scheme a device belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    /// Code-wheel remotes (ARC): house code letter + unit number.
    RemoteCode,
    /// Self-learning switches (AC): device id + unit number.
    AddressableSwitch,
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RemoteCode => f.write_str("remote_code"),
            Self::AddressableSwitch => f.write_str("addressable_switch"),
        }
    }
}

// ============================================================================
// Addressing
// ============================================================================

/// Concrete RF addressing fields of a resolved device.
///
/// Deserializing goes through the constructors, so ids and house codes are
/// normalized the same way wherever they come from.
///
/// # Format
///
/// ```json
/// { "type": "remote_code", "house_code": "A", "unit_code": 1 }
/// { "type": "addressable_switch", "device_id": "1A2B3C", "unit_code": 0 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", try_from = "RawAddressing")]
pub enum Addressing {
    /// Remote-code device.
    RemoteCode {
        /// House code letter (`A`..=`P`).
        house_code: char,
        /// Unit code (1..=16).
        unit_code: u8,
    },
    /// Addressable switch.
    AddressableSwitch {
        /// Device id as upper-case hex without prefix.
        device_id: String,
        /// Unit code (0..=16).
        unit_code: u8,
    },
}

impl Addressing {
    /// Creates remote-code addressing.
    ///
    /// The house code is accepted in either case.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if either code is out of range.
    pub fn remote_code(house_code: char, unit_code: u8) -> Result<Self> {
        let addressing = Self::RemoteCode {
            house_code: house_code.to_ascii_uppercase(),
            unit_code,
        };
        addressing.validate()?;
        Ok(addressing)
    }

    /// Creates addressable-switch addressing.
    ///
    /// Accepts the id with or without a `0x` prefix.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the id is not hex or either field
    /// is out of range.
    pub fn addressable_switch(device_id: &str, unit_code: u8) -> Result<Self> {
        let trimmed = device_id
            .strip_prefix("0x")
            .or_else(|| device_id.strip_prefix("0X"))
            .unwrap_or(device_id);

        let addressing = Self::AddressableSwitch {
            device_id: trimmed.to_ascii_uppercase(),
            unit_code,
        };
        addressing.validate()?;
        Ok(addressing)
    }

    /// Re-runs the matching constructor on hand-built addressing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if a field is out of range.
    pub fn normalize(self) -> Result<Self> {
        match self {
            Self::RemoteCode {
                house_code,
                unit_code,
            } => Self::remote_code(house_code, unit_code),
            Self::AddressableSwitch {
                device_id,
                unit_code,
            } => Self::addressable_switch(&device_id, unit_code),
        }
    }

    /// Returns the family this addressing belongs to.
    #[inline]
    #[must_use]
    pub fn family(&self) -> Family {
        match self {
            Self::RemoteCode { .. } => Family::RemoteCode,
            Self::AddressableSwitch { .. } => Family::AddressableSwitch,
        }
    }

    /// Checks that every field is within the range the transceiver accepts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::RemoteCode {
                house_code,
                unit_code,
            } => {
                if !('A'..=MAX_HOUSE_CODE).contains(house_code) {
                    return Err(Error::invalid_address(format!(
                        "house code {house_code:?} not in A..={MAX_HOUSE_CODE}"
                    )));
                }
                if !REMOTE_UNIT_CODES.contains(unit_code) {
                    return Err(Error::invalid_address(format!(
                        "remote unit code {unit_code} not in 1..=16"
                    )));
                }
            }
            Self::AddressableSwitch {
                device_id,
                unit_code,
            } => {
                let id = device_id
                    .chars()
                    .all(|c| c.is_ascii_hexdigit())
                    .then(|| u32::from_str_radix(device_id, 16).ok())
                    .flatten()
                    .ok_or_else(|| {
                        Error::invalid_address(format!("device id {device_id:?} is not hex"))
                    })?;
                if id > MAX_SWITCH_DEVICE_ID {
                    return Err(Error::invalid_address(format!(
                        "device id 0x{device_id} exceeds 26 bits"
                    )));
                }
                if *unit_code > MAX_SWITCH_UNIT_CODE {
                    return Err(Error::invalid_address(format!(
                        "switch unit code {unit_code} not in 0..=16"
                    )));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for Addressing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RemoteCode {
                house_code,
                unit_code,
            } => write!(f, "{house_code}{unit_code}"),
            Self::AddressableSwitch {
                device_id,
                unit_code,
            } => write!(f, "0x{device_id}/{unit_code}"),
        }
    }
}

/// Wire shape of [`Addressing`] before validation.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawAddressing {
    RemoteCode { house_code: char, unit_code: u8 },
    AddressableSwitch { device_id: String, unit_code: u8 },
}

impl TryFrom<RawAddressing> for Addressing {
    type Error = Error;

    fn try_from(raw: RawAddressing) -> Result<Self> {
        match raw {
            RawAddressing::RemoteCode {
                house_code,
                unit_code,
            } => Self::remote_code(house_code, unit_code),
            RawAddressing::AddressableSwitch {
                device_id,
                unit_code,
            } => Self::addressable_switch(&device_id, unit_code),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
