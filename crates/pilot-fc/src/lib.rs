pub mod autodetect;
pub mod mav;
pub mod reader;
pub mod state;

use serde::Deserialize;

/// `[fc]` section: the MAVLink link telemetry is read from.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkConfig {
    pub enable: bool,

    /// If true, probe candidate serial ports/bauds and pick the first
    /// that yields an autopilot HEARTBEAT.
    pub autodetect: bool,

    /// When autodetect=false: fixed port config
    pub serial_dev: Option<String>,
    pub baud: Option<u32>,

    /// Autodetect candidates (paths). Example:
    /// ["/dev/ttyACM0","/dev/ttyUSB0","/dev/serial0"]
    pub candidate_devs: Option<Vec<String>>,

    /// Autodetect candidate baud rates (common ArduPilot telemetry values).
    pub candidate_bauds: Option<Vec<u32>>,

    /// Heartbeat wait per probe attempt
    pub heartbeat_timeout_ms: Option<u64>,

    /// MAVLink ids we use (ground station side). 255/190 is the usual GCS pair.
    pub sys_id: u8,
    pub comp_id: u8,

    /// Companion heartbeat send rate. Default 1 Hz.
    pub send_heartbeat_hz: Option<f32>,

    /// How often `fc watch` re-evaluates the connection. Default 1000 ms.
    pub watch_interval_ms: Option<u64>,

    /// Telemetry older than this (since the last autopilot heartbeat) is
    /// discarded before evaluation. Default 3000 ms.
    pub stale_after_ms: Option<u64>,
}
