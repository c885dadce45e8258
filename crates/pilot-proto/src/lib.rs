pub mod intent;
pub mod telemetry;

pub use intent::{CommandIntent, OperatingMode, ParseModeError};
pub use telemetry::{Attitude, Battery, FlightStatus, Gps, Speed, TelemetrySnapshot};
