//! Safety gate between an advisory language model and a live vehicle.
//!
//! Everything in here is a pure function of its inputs: telemetry decides
//! whether the vehicle is really connected, assistant text decides which
//! (if any) command was acknowledged, and the operating mode decides whether
//! that command may leave the gate.

pub mod connection;
pub mod dispatch;
pub mod doctor;
pub mod error;
pub mod evaluate;
pub mod extract;
pub mod mode;
pub mod prompt;

pub use connection::{assess, assess_str, is_valid, ConnectionReport, ConnectionState};
pub use dispatch::{dispatch, CommandSink};
pub use error::{Result, ValidationError};
pub use evaluate::{ChatReply, Evaluation, Gate, Prepared};
pub use extract::{extract, try_extract, ExtractPolicy};
pub use mode::{decide, may_execute, ForwardedCommand, GateDecision, READ_ONLY_NOTICE};
pub use prompt::{render_system_prompt, PromptContext};

pub use pilot_proto::{CommandIntent, OperatingMode, TelemetrySnapshot};

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GateConfig {
    /// Mode applied when a request does not name one. Read-only unless set.
    #[serde(default)]
    pub default_mode: OperatingMode,

    /// Highest takeoff altitude (metres) an acknowledgment may request.
    /// Anything above is rejected, never clamped. Default 120.
    pub max_takeoff_alt_m: Option<u32>,
}

impl GateConfig {
    pub fn policy(&self) -> Result<ExtractPolicy> {
        match self.max_takeoff_alt_m {
            None => Ok(ExtractPolicy::default()),
            Some(0) => Err(ValidationError::Config(
                "gate.max_takeoff_alt_m must be at least 1".into(),
            )),
            Some(m) => Ok(ExtractPolicy { max_takeoff_alt_m: m }),
        }
    }
}
