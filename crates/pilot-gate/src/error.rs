use thiserror::Error;

/// Input that the gate refuses to interpret.
///
/// None of these abort a request: the caller gets the error next to a
/// conservative outcome (not connected, no action).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("malformed telemetry: {0}")]
    Telemetry(String),

    #[error("takeoff altitude {raw:?} m rejected: {reason}")]
    Altitude { raw: String, reason: String },

    #[error("invalid operating mode: {0}")]
    Mode(#[from] pilot_proto::ParseModeError),

    #[error("invalid gate config: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ValidationError>;
