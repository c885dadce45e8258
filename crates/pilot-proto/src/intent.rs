use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A vehicle action requested by the assistant, or no action at all.
///
/// Wire form matches what the ground station executor consumes:
/// `{"type": "TAKEOFF", "params": {"altitude": 15}}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "params", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandIntent {
    None,
    Arm,
    Disarm,
    Takeoff {
        #[serde(rename = "altitude")]
        altitude_meters: u32,
    },
    Land,
    Rtl,
}

impl CommandIntent {
    /// True for everything except `None`.
    pub fn is_action(&self) -> bool {
        !matches!(self, CommandIntent::None)
    }

    pub fn label(&self) -> &'static str {
        match self {
            CommandIntent::None => "NONE",
            CommandIntent::Arm => "ARM",
            CommandIntent::Disarm => "DISARM",
            CommandIntent::Takeoff { .. } => "TAKEOFF",
            CommandIntent::Land => "LAND",
            CommandIntent::Rtl => "RTL",
        }
    }
}

impl Default for CommandIntent {
    fn default() -> Self {
        CommandIntent::None
    }
}

impl fmt::Display for CommandIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandIntent::Takeoff { altitude_meters } => {
                write!(f, "{} (altitude={}m)", self.label(), altitude_meters)
            }
            other => f.write_str(other.label()),
        }
    }
}

/// Per-request operating mode chosen by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatingMode {
    /// Command-capable.
    Agent,
    /// Read-only.
    Ask,
}

impl OperatingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperatingMode::Agent => "agent",
            OperatingMode::Ask => "ask",
        }
    }
}

impl Default for OperatingMode {
    fn default() -> Self {
        OperatingMode::Ask
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown operating mode {0:?} (expected \"agent\" or \"ask\")")]
pub struct ParseModeError(pub String);

impl FromStr for OperatingMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "agent" => Ok(OperatingMode::Agent),
            "ask" => Ok(OperatingMode::Ask),
            _ => Err(ParseModeError(s.to_string())),
        }
    }
}
