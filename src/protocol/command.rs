//! Actions and transceiver primitives.
//!
//! [`Primitive::for_action`] is the single mapping table from a requested
//! [`Action`] on a resolved device to the primitive sent over the link.
//!
//! | Family | On / Open | Off / Close | Stop |
//! |--------|-----------|-------------|------|
//! | `RemoteCode` | `switch-up` | `switch-down` | `stop` |
//! | `AddressableSwitch` | `switch-on` | `switch-off` | `switch-off` |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

use super::family::Addressing;

// ============================================================================
// Action
// ============================================================================

/// Logical action requested by a caller.
///
/// Switch devices use `On`/`Off`, covers use `Open`/`Close`/`Stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Switch on.
    On,
    /// Switch off.
    Off,
    /// Stop a moving cover.
    Stop,
    /// Open a cover.
    Open,
    /// Close a cover.
    Close,
}

impl Action {
    /// Returns the lowercase action name.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
            Self::Stop => "stop",
            Self::Open => "open",
            Self::Close => "close",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = Error;

    /// Parses MQTT/HTTP payloads such as `ON`, `off` or `Stop`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "on" => Ok(Self::On),
            "off" => Ok(Self::Off),
            "stop" => Ok(Self::Stop),
            "open" => Ok(Self::Open),
            "close" => Ok(Self::Close),
            _ => Err(Error::invalid_action(s)),
        }
    }
}

// ============================================================================
// Primitive
// ============================================================================

/// One command understood by the transceiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Primitive {
    /// Remote-code "up" (on / open).
    SwitchUp {
        /// House code letter.
        house_code: char,
        /// Unit code.
        unit_code: u8,
    },
    /// Remote-code "down" (off / close).
    SwitchDown {
        /// House code letter.
        house_code: char,
        /// Unit code.
        unit_code: u8,
    },
    /// Remote-code stop.
    Stop {
        /// House code letter.
        house_code: char,
        /// Unit code.
        unit_code: u8,
    },
    /// Addressable switch on.
    SwitchOn {
        /// Addressing token `0x{device_id}/{unit_code}`.
        token: String,
    },
    /// Addressable switch off.
    SwitchOff {
        /// Addressing token `0x{device_id}/{unit_code}`.
        token: String,
    },
    /// Transceiver status request, sent by the keepalive only.
    StatusProbe,
}

impl Primitive {
    /// Maps an action on a resolved device to its primitive.
    ///
    /// `Stop` has no native meaning for addressable switches and is sent
    /// as `switch-off`.
    #[must_use]
    pub fn for_action(addressing: &Addressing, action: Action) -> Self {
        match addressing {
            Addressing::RemoteCode {
                house_code,
                unit_code,
            } => {
                let (house_code, unit_code) = (*house_code, *unit_code);
                match action {
                    Action::On | Action::Open => Self::SwitchUp {
                        house_code,
                        unit_code,
                    },
                    Action::Off | Action::Close => Self::SwitchDown {
                        house_code,
                        unit_code,
                    },
                    Action::Stop => Self::Stop {
                        house_code,
                        unit_code,
                    },
                }
            }
            Addressing::AddressableSwitch { .. } => {
                let token = addressing.to_string();
                match action {
                    Action::On | Action::Open => Self::SwitchOn { token },
                    Action::Off | Action::Close | Action::Stop => Self::SwitchOff { token },
                }
            }
        }
    }

    /// Returns the primitive name.
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SwitchUp { .. } => "switch-up",
            Self::SwitchDown { .. } => "switch-down",
            Self::Stop { .. } => "stop",
            Self::SwitchOn { .. } => "switch-on",
            Self::SwitchOff { .. } => "switch-off",
            Self::StatusProbe => "status-probe",
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SwitchUp {
                house_code,
                unit_code,
            }
            | Self::SwitchDown {
                house_code,
                unit_code,
            }
            | Self::Stop {
                house_code,
                unit_code,
            } => write!(f, "{} {house_code}{unit_code}", self.name()),
            Self::SwitchOn { token } | Self::SwitchOff { token } => {
                write!(f, "{} {token}", self.name())
            }
            Self::StatusProbe => f.write_str(self.name()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn arc() -> Addressing {
        Addressing::remote_code('A', 1).expect("valid")
    }

    fn ac() -> Addressing {
        Addressing::addressable_switch("123456", 0).expect("valid")
    }

    #[test]
    fn test_remote_code_mapping() {
        let up = Primitive::SwitchUp {
            house_code: 'A',
            unit_code: 1,
        };
        let down = Primitive::SwitchDown {
            house_code: 'A',
            unit_code: 1,
        };

        assert_eq!(Primitive::for_action(&arc(), Action::On), up);
        assert_eq!(Primitive::for_action(&arc(), Action::Open), up);
        assert_eq!(Primitive::for_action(&arc(), Action::Off), down);
        assert_eq!(Primitive::for_action(&arc(), Action::Close), down);
        assert_eq!(
            Primitive::for_action(&arc(), Action::Stop),
            Primitive::Stop {
                house_code: 'A',
                unit_code: 1
            }
        );
    }

    #[test]
    fn test_addressable_switch_mapping() {
        let token = "0x123456/0".to_string();
        let on = Primitive::SwitchOn {
            token: token.clone(),
        };
        let off = Primitive::SwitchOff { token };

        assert_eq!(Primitive::for_action(&ac(), Action::On), on);
        assert_eq!(Primitive::for_action(&ac(), Action::Open), on);
        assert_eq!(Primitive::for_action(&ac(), Action::Off), off);
        assert_eq!(Primitive::for_action(&ac(), Action::Close), off);
        assert_eq!(Primitive::for_action(&ac(), Action::Stop), off);
    }

    #[test]
    fn test_primitive_display() {
        assert_eq!(
            Primitive::for_action(&arc(), Action::Stop).to_string(),
            "stop A1"
        );
        assert_eq!(
            Primitive::for_action(&ac(), Action::On).to_string(),
            "switch-on 0x123456/0"
        );
        assert_eq!(Primitive::StatusProbe.to_string(), "status-probe");
    }

    #[test]
    fn test_action_parse() {
        assert_eq!("ON".parse::<Action>().expect("on"), Action::On);
        assert_eq!(" close ".parse::<Action>().expect("close"), Action::Close);
        match "toggle".parse::<Action>() {
            Err(Error::InvalidAction { action }) => assert_eq!(action, "toggle"),
            other => panic!("Expected InvalidAction, got {other:?}"),
        }
    }
}
