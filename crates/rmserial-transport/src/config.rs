use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default line speed used by the controller firmware.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Flow control mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FlowControl {
    #[default]
    None,
    Hardware,
    Software,
}

/// Parity mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StopBits {
    #[default]
    One,
    OnePointFive,
    Two,
}

impl FromStr for FlowControl {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "hardware" => Ok(Self::Hardware),
            "software" => Ok(Self::Software),
            other => Err(ConfigError::InvalidValue {
                field: "flow_control",
                value: other.to_string(),
                expected: "none, software, or hardware",
            }),
        }
    }
}

impl FromStr for Parity {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "odd" => Ok(Self::Odd),
            "even" => Ok(Self::Even),
            other => Err(ConfigError::InvalidValue {
                field: "parity",
                value: other.to_string(),
                expected: "none, odd, or even",
            }),
        }
    }
}

impl FromStr for StopBits {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1" | "1.0" => Ok(Self::One),
            "1.5" => Ok(Self::OnePointFive),
            "2" | "2.0" => Ok(Self::Two),
            other => Err(ConfigError::InvalidValue {
                field: "stop_bits",
                value: other.to_string(),
                expected: "1, 1.5, or 2",
            }),
        }
    }
}

impl fmt::Display for FlowControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Hardware => "hardware",
            Self::Software => "software",
        })
    }
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Odd => "odd",
            Self::Even => "even",
        })
    }
}

impl fmt::Display for StopBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::One => "1",
            Self::OnePointFive => "1.5",
            Self::Two => "2",
        })
    }
}

macro_rules! string_conversions {
    ($($ty:ty),*) => {
        $(
            impl TryFrom<String> for $ty {
                type Error = ConfigError;

                fn try_from(value: String) -> Result<Self, Self::Error> {
                    value.parse()
                }
            }

            impl From<$ty> for String {
                fn from(value: $ty) -> Self {
                    value.to_string()
                }
            }
        )*
    };
}

string_conversions!(FlowControl, Parity, StopBits);

/// Line settings applied when a device is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialPortConfig {
    pub baud_rate: u32,
    #[serde(default)]
    pub flow_control: FlowControl,
    #[serde(default)]
    pub parity: Parity,
    #[serde(default)]
    pub stop_bits: StopBits,
}

impl SerialPortConfig {
    pub fn new(
        baud_rate: u32,
        flow_control: FlowControl,
        parity: Parity,
        stop_bits: StopBits,
    ) -> Self {
        Self {
            baud_rate,
            flow_control,
            parity,
            stop_bits,
        }
    }

    /// Reject settings that can never open a device.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.baud_rate == 0 {
            return Err(ConfigError::Zero("baud_rate"));
        }
        Ok(())
    }
}

impl Default for SerialPortConfig {
    fn default() -> Self {
        Self::new(
            DEFAULT_BAUD_RATE,
            FlowControl::None,
            Parity::None,
            StopBits::One,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flow_control() {
        assert_eq!("none".parse::<FlowControl>().unwrap(), FlowControl::None);
        assert_eq!(
            "hardware".parse::<FlowControl>().unwrap(),
            FlowControl::Hardware
        );
        assert_eq!(
            "software".parse::<FlowControl>().unwrap(),
            FlowControl::Software
        );
    }

    #[test]
    fn rejects_unknown_flow_control() {
        let err = "rts".parse::<FlowControl>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "the flow_control parameter must be one of: none, software, or hardware (got \"rts\")"
        );
    }

    #[test]
    fn parses_parity() {
        assert_eq!("odd".parse::<Parity>().unwrap(), Parity::Odd);
        assert_eq!("even".parse::<Parity>().unwrap(), Parity::Even);
        assert!("mark".parse::<Parity>().is_err());
    }

    #[test]
    fn parses_stop_bits_aliases() {
        assert_eq!("1".parse::<StopBits>().unwrap(), StopBits::One);
        assert_eq!("1.0".parse::<StopBits>().unwrap(), StopBits::One);
        assert_eq!("1.5".parse::<StopBits>().unwrap(), StopBits::OnePointFive);
        assert_eq!("2".parse::<StopBits>().unwrap(), StopBits::Two);
        assert_eq!("2.0".parse::<StopBits>().unwrap(), StopBits::Two);
        assert!("3".parse::<StopBits>().is_err());
    }

    #[test]
    fn display_roundtrips_through_parse() {
        for sb in [StopBits::One, StopBits::OnePointFive, StopBits::Two] {
            assert_eq!(sb.to_string().parse::<StopBits>().unwrap(), sb);
        }
    }

    #[test]
    fn deserializes_from_strings() {
        let cfg: SerialPortConfig = serde_json::from_str(
            r#"{"baud_rate": 921600, "flow_control": "hardware", "parity": "even", "stop_bits": "2.0"}"#,
        )
        .unwrap();
        assert_eq!(cfg.baud_rate, 921_600);
        assert_eq!(cfg.flow_control, FlowControl::Hardware);
        assert_eq!(cfg.parity, Parity::Even);
        assert_eq!(cfg.stop_bits, StopBits::Two);
    }

    #[test]
    fn deserialize_rejects_bad_parity() {
        let err = serde_json::from_str::<SerialPortConfig>(
            r#"{"baud_rate": 115200, "parity": "space"}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("parity"));
    }

    #[test]
    fn missing_line_settings_default() {
        let cfg: SerialPortConfig = serde_json::from_str(r#"{"baud_rate": 9600}"#).unwrap();
        assert_eq!(cfg.flow_control, FlowControl::None);
        assert_eq!(cfg.parity, Parity::None);
        assert_eq!(cfg.stop_bits, StopBits::One);
    }

    #[test]
    fn zero_baud_rate_is_invalid() {
        let cfg = SerialPortConfig {
            baud_rate: 0,
            ..SerialPortConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::Zero("baud_rate")));
        assert!(SerialPortConfig::default().validate().is_ok());
    }
}
