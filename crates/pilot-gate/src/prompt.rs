//! System-instruction context for the assistant.
//!
//! When the vehicle is not connected the telemetry section says so outright.
//! A block of zero-valued readings would invite the model to describe them
//! as live data.

use pilot_proto::{OperatingMode, TelemetrySnapshot};
use serde::Serialize;
use std::fmt::Write as _;

use crate::connection::ConnectionState;

pub const CONNECTED_LABEL: &str = "CONNECTED to drone";
pub const NOT_CONNECTED_LABEL: &str = "NOT CONNECTED to drone";
pub const NO_TELEMETRY_SECTION: &str =
    "TELEMETRY: No drone connected. No telemetry data is available. Do not report or estimate any readings.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptContext {
    pub connection_status: String,
    pub telemetry_section: String,
}

impl PromptContext {
    pub fn new(state: ConnectionState, snapshot: &TelemetrySnapshot) -> Self {
        match state {
            ConnectionState::Connected => Self {
                connection_status: CONNECTED_LABEL.to_string(),
                telemetry_section: format!("CURRENT TELEMETRY:\n{}", format_telemetry(snapshot)),
            },
            ConnectionState::NotConnected => Self {
                connection_status: NOT_CONNECTED_LABEL.to_string(),
                telemetry_section: NO_TELEMETRY_SECTION.to_string(),
            },
        }
    }
}

/// One line per telemetry group that is present.
pub fn format_telemetry(snapshot: &TelemetrySnapshot) -> String {
    let mut out = String::new();

    if let Some(b) = &snapshot.battery {
        let _ = writeln!(
            out,
            "Battery: {:.2} V, {:.1} A, {:.0}% remaining",
            b.voltage, b.current, b.remaining
        );
    }
    if let Some(g) = &snapshot.gps {
        let fix = if g.fix_type.is_empty() { "unknown fix" } else { g.fix_type.as_str() };
        let _ = writeln!(
            out,
            "GPS: {} satellites ({}), position {:.6}, {:.6}, altitude {:.1} m",
            g.satellites, fix, g.lat, g.lon, g.alt
        );
    }
    if let Some(s) = &snapshot.status {
        let mode = if s.mode.trim().is_empty() { "UNKNOWN" } else { s.mode.as_str() };
        let _ = writeln!(
            out,
            "Status: mode {}, {}",
            mode,
            if s.armed { "ARMED" } else { "DISARMED" }
        );
    }
    if let Some(a) = &snapshot.attitude {
        let _ = writeln!(
            out,
            "Attitude: roll {:.1} deg, pitch {:.1} deg, yaw {:.1} deg",
            a.roll, a.pitch, a.yaw
        );
    }
    if let Some(v) = &snapshot.speed {
        let _ = writeln!(
            out,
            "Speed: ground {:.1} m/s, air {:.1} m/s, climb {:.1} m/s",
            v.ground_speed, v.air_speed, v.climb_rate
        );
    }

    if out.ends_with('\n') {
        out.pop();
    }
    out
}

const AGENT_MODE_PROMPT: &str = r#"You are an AI assistant for a drone ground control station with COMMAND EXECUTION capabilities.

CAPABILITIES:
- ARM/DISARM the drone
- TAKEOFF to a specified altitude
- LAND the drone
- RTL (Return to Launch)
- Read all telemetry data

CRITICAL SAFETY RULES:
1. ONLY execute a command when the user EXPLICITLY asks for it.
2. Never suggest or execute a command in reply to an informational question.
3. Requests that ARE commands:
   - "arm the drone" -> execute ARM
   - "takeoff to 10 meters" -> execute TAKEOFF
   - "land now" -> execute LAND
4. Requests that are NOT commands (answer only):
   - "what can you do?"
   - "tell me where I am"
   - "are we connected?"
5. When, and only when, executing a command, use exactly one of these phrases:
   - "Arming the drone now."
   - "Disarming the drone."
   - "Taking off to X meters."
   - "Landing the drone."
   - "Returning to launch."
   Never use these phrases in any other context.
6. If the drone is NOT CONNECTED, say so and do not claim to execute anything.

CONNECTION STATUS: {connection_status}

{telemetry_section}

Be helpful but SAFE. Only execute when explicitly asked."#;

const ASK_MODE_PROMPT: &str = r#"You are an AI assistant for a drone ground control station in READ-ONLY mode.

CAPABILITIES:
- Read battery status (voltage, current, remaining %)
- Read GPS position and altitude
- Read flight mode and armed status
- Read attitude and speed
- Explain telemetry data

RESTRICTIONS:
- You CANNOT control the drone.
- You CANNOT execute commands (ARM, DISARM, TAKEOFF, LAND, RTL, mode changes).
- You are in ASK MODE (read-only).

If the user asks you to execute ANY command, respond with:
"{read_only_notice}"

PERSONALITY:
- Helpful and informative
- Explain technical terms simply
- Be concise but thorough
- Be HONEST about connection status

CONNECTION STATUS: {connection_status}

{telemetry_section}

Remember: you can ONLY read data, never execute commands."#;

/// Full system instructions for the given mode.
pub fn render_system_prompt(mode: OperatingMode, ctx: &PromptContext) -> String {
    let template = match mode {
        OperatingMode::Agent => AGENT_MODE_PROMPT,
        OperatingMode::Ask => ASK_MODE_PROMPT,
    };
    template
        .replace("{read_only_notice}", crate::mode::READ_ONLY_NOTICE)
        .replace("{connection_status}", &ctx.connection_status)
        .replace("{telemetry_section}", &ctx.telemetry_section)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pilot_proto::{Battery, FlightStatus, Gps};

    fn live_snapshot() -> TelemetrySnapshot {
        TelemetrySnapshot {
            battery: Some(Battery { voltage: 12.6, current: 3.25, remaining: 87.0 }),
            gps: Some(Gps {
                satellites: 11,
                lat: 47.3977,
                lon: 8.5456,
                alt: 488.0,
                fix_type: "3D".into(),
            }),
            status: Some(FlightStatus { mode: "GUIDED".into(), armed: false }),
            ..Default::default()
        }
    }

    #[test]
    fn not_connected_has_no_readings() {
        // Even with a populated snapshot, a NotConnected state must not leak numbers.
        let ctx = PromptContext::new(ConnectionState::NotConnected, &live_snapshot());
        assert_eq!(ctx.connection_status, "NOT CONNECTED to drone");
        assert_eq!(ctx.telemetry_section, NO_TELEMETRY_SECTION);
        assert!(!ctx.telemetry_section.chars().any(|c| c.is_ascii_digit()));
    }

    #[test]
    fn connected_lists_present_groups() {
        let ctx = PromptContext::new(ConnectionState::Connected, &live_snapshot());
        assert_eq!(ctx.connection_status, "CONNECTED to drone");
        assert!(ctx.telemetry_section.starts_with("CURRENT TELEMETRY:\n"));
        assert!(ctx.telemetry_section.contains("Battery: 12.60 V"));
        assert!(ctx.telemetry_section.contains("GPS: 11 satellites (3D)"));
        assert!(ctx.telemetry_section.contains("Status: mode GUIDED, DISARMED"));
        assert!(!ctx.telemetry_section.contains("Attitude"));
        assert!(!ctx.telemetry_section.ends_with('\n'));
    }

    #[test]
    fn prompts_embed_context() {
        let ctx = PromptContext::new(ConnectionState::NotConnected, &TelemetrySnapshot::default());

        let agent = render_system_prompt(OperatingMode::Agent, &ctx);
        assert!(agent.contains("CONNECTION STATUS: NOT CONNECTED to drone"));
        assert!(agent.contains(NO_TELEMETRY_SECTION));
        assert!(agent.contains("\"Arming the drone now.\""));
        assert!(!agent.contains('{'));

        let ask = render_system_prompt(OperatingMode::Ask, &ctx);
        assert!(ask.contains("READ-ONLY"));
        assert!(ask.contains(crate::mode::READ_ONLY_NOTICE));
        assert!(!ask.contains('{'));
    }

    #[test]
    fn agent_prompt_phrases_are_the_ones_extracted() {
        use crate::extract::extract;
        use pilot_proto::CommandIntent;

        let ctx = PromptContext::new(ConnectionState::Connected, &live_snapshot());
        let agent = render_system_prompt(OperatingMode::Agent, &ctx);
        for (phrase, expected) in [
            ("Arming the drone now.", CommandIntent::Arm),
            ("Disarming the drone.", CommandIntent::Disarm),
            ("Landing the drone.", CommandIntent::Land),
            ("Returning to launch.", CommandIntent::Rtl),
        ] {
            assert!(agent.contains(phrase), "{}", phrase);
            assert_eq!(extract(phrase), expected);
        }
    }
}
