use pilot_proto::TelemetrySnapshot;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Result, ValidationError};

/// Flight mode string ground stations report before the first heartbeat.
pub const UNKNOWN_MODE: &str = "UNKNOWN";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    NotConnected,
}

impl ConnectionState {
    pub fn of(snapshot: &TelemetrySnapshot) -> Self {
        if is_valid(snapshot) {
            ConnectionState::Connected
        } else {
            ConnectionState::NotConnected
        }
    }

    pub fn is_connected(self) -> bool {
        self == ConnectionState::Connected
    }
}

/// Does the snapshot look like a live vehicle rather than idle defaults?
///
/// Any single live signal is enough: battery voltage, acquired satellites, or
/// a real flight mode. Simulators and disconnected UIs report all zeros.
pub fn is_valid(snapshot: &TelemetrySnapshot) -> bool {
    if snapshot.battery_voltage() > 0.0 {
        return true;
    }
    if snapshot.satellites() > 0 {
        return true;
    }
    let mode = snapshot.flight_mode().trim();
    !mode.is_empty() && mode != UNKNOWN_MODE
}

/// Strict parse of a raw telemetry document. `null` is an empty snapshot.
pub fn parse_snapshot(raw: &Value) -> Result<TelemetrySnapshot> {
    match raw {
        Value::Null => Ok(TelemetrySnapshot::default()),
        Value::Object(_) => TelemetrySnapshot::deserialize(raw)
            .map_err(|e| ValidationError::Telemetry(e.to_string())),
        other => Err(ValidationError::Telemetry(format!(
            "expected an object, got {}",
            json_kind(other)
        ))),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionReport {
    pub state: ConnectionState,
    /// Empty when `issue` is set.
    pub snapshot: TelemetrySnapshot,
    pub issue: Option<ValidationError>,
}

/// Validate a raw telemetry document and derive the connection state.
///
/// Malformed input never fails the request: the error is handed back in
/// `issue` and the vehicle is treated as not connected.
pub fn assess(raw: &Value) -> ConnectionReport {
    match parse_snapshot(raw) {
        Ok(snapshot) => from_snapshot(snapshot),
        Err(e) => rejected(e),
    }
}

/// [`assess`] for a JSON document that has not been parsed yet.
pub fn assess_str(raw: &str) -> ConnectionReport {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => assess(&value),
        Err(e) => rejected(ValidationError::Telemetry(e.to_string())),
    }
}

fn rejected(e: ValidationError) -> ConnectionReport {
    warn!("telemetry rejected, treating vehicle as not connected: {}", e);
    ConnectionReport {
        state: ConnectionState::NotConnected,
        snapshot: TelemetrySnapshot::default(),
        issue: Some(e),
    }
}

pub fn from_snapshot(snapshot: TelemetrySnapshot) -> ConnectionReport {
    let state = ConnectionState::of(&snapshot);
    debug!(
        voltage = snapshot.battery_voltage(),
        sats = snapshot.satellites(),
        mode = snapshot.flight_mode(),
        "connection state {:?}",
        state
    );
    ConnectionReport { state, snapshot, issue: None }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pilot_proto::{Battery, FlightStatus, Gps};
    use serde_json::json;

    fn with_battery(voltage: f32) -> TelemetrySnapshot {
        TelemetrySnapshot {
            battery: Some(Battery { voltage, ..Default::default() }),
            ..Default::default()
        }
    }

    fn with_mode(mode: &str) -> TelemetrySnapshot {
        TelemetrySnapshot {
            status: Some(FlightStatus { mode: mode.into(), armed: false }),
            ..Default::default()
        }
    }

    #[test]
    fn empty_snapshot_is_not_connected() {
        assert!(!is_valid(&TelemetrySnapshot::default()));
        assert_eq!(ConnectionState::of(&TelemetrySnapshot::default()), ConnectionState::NotConnected);
    }

    #[test]
    fn battery_voltage_decides() {
        assert!(!is_valid(&with_battery(0.0)));
        assert!(is_valid(&with_battery(12.6)));
        assert!(!is_valid(&with_battery(f32::NAN)));
    }

    #[test]
    fn satellites_count_regardless_of_battery() {
        let mut snap = with_battery(0.0);
        snap.gps = Some(Gps { satellites: 6, ..Default::default() });
        assert!(is_valid(&snap));

        snap.gps = Some(Gps { satellites: 0, lat: 47.0, lon: 8.0, ..Default::default() });
        assert!(!is_valid(&snap), "coordinates alone are not a live signal");
    }

    #[test]
    fn flight_mode_must_be_real() {
        assert!(!is_valid(&with_mode("UNKNOWN")));
        assert!(!is_valid(&with_mode("")));
        assert!(!is_valid(&with_mode("   ")));
        assert!(is_valid(&with_mode("GUIDED")));
    }

    #[test]
    fn armed_flag_alone_is_not_a_connection() {
        let snap = TelemetrySnapshot {
            status: Some(FlightStatus { mode: String::new(), armed: true }),
            ..Default::default()
        };
        assert!(!is_valid(&snap));
    }

    #[test]
    fn simulator_defaults_are_not_connected() {
        let report = assess(&json!({
            "battery": {"voltage": 0, "current": 0, "remaining": 0},
            "gps": {"latitude": 0, "longitude": 0, "altitude": 0, "satellites": 0, "fix_type": "NoGPS"},
            "status": {"mode": "UNKNOWN", "armed": false}
        }));
        assert_eq!(report.state, ConnectionState::NotConnected);
        assert!(report.issue.is_none());
    }

    #[test]
    fn malformed_telemetry_reports_issue_and_falls_back() {
        let report = assess(&json!({"battery": {"voltage": "12.6"}}));
        assert_eq!(report.state, ConnectionState::NotConnected);
        assert!(matches!(report.issue, Some(ValidationError::Telemetry(_))));
        assert!(report.snapshot.is_empty());

        let report = assess(&json!([1, 2, 3]));
        assert_eq!(report.state, ConnectionState::NotConnected);
        assert!(report.issue.is_some());
    }

    #[test]
    fn null_document_is_empty_not_malformed() {
        let report = assess(&Value::Null);
        assert_eq!(report.state, ConnectionState::NotConnected);
        assert!(report.issue.is_none());
    }

    #[test]
    fn assess_from_text() {
        let report = assess_str(r#"{"gps": {"satellites": 9}}"#);
        assert_eq!(report.state, ConnectionState::Connected);
        assert!(report.issue.is_none());

        let report = assess_str("{not json");
        assert_eq!(report.state, ConnectionState::NotConnected);
        assert!(matches!(report.issue, Some(ValidationError::Telemetry(_))));
    }
}
