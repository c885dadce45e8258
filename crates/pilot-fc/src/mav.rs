use anyhow::{Context, Result};
use mavlink::{
    common::{
        GpsFixType, MavAutopilot, MavMessage, MavModeFlag, MavState, MavType, HEARTBEAT_DATA,
    },
    error::MessageReadError,
    MavHeader, MavlinkVersion,
};
use pilot_proto::{Attitude, Battery, FlightStatus, Gps, Speed, TelemetrySnapshot};
use std::io::{self, Read, Write};
use std::time::Duration;
use tokio_serial::SerialPort;
use tracing::{debug, info};

/// Upper bound on a single blocking read, so callers get control back on a
/// silent port.
pub const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Read side of the autopilot link. Folds incoming messages into a
/// [`TelemetrySnapshot`]; never sends commands.
pub struct TelemetryLink<P = Box<dyn SerialPort>> {
    port: P,
    hdr: MavHeader,
    seen_heartbeat: bool,
    snapshot: TelemetrySnapshot,
}

impl TelemetryLink {
    pub fn open(dev: &str, baud: u32, sys_id: u8, comp_id: u8) -> Result<Self> {
        let port = tokio_serial::new(dev, baud)
            .timeout(READ_TIMEOUT)
            .open()
            .with_context(|| format!("open fc serial device {}", dev))?;
        info!("fc link open on {} @ {}", dev, baud);

        Ok(Self::from_port(port, sys_id, comp_id))
    }
}

impl<P: Read + Write> TelemetryLink<P> {
    pub fn from_port(port: P, sys_id: u8, comp_id: u8) -> Self {
        Self {
            port,
            hdr: MavHeader { system_id: sys_id, component_id: comp_id, sequence: 0 },
            seen_heartbeat: false,
            snapshot: TelemetrySnapshot::default(),
        }
    }

    /// Read at most one frame. `Ok(None)` when the port timed out or the
    /// frame was not a message we can decode; errors only for a broken port.
    pub fn poll_once(&mut self) -> Result<Option<MavMessage>> {
        let Some(msg) = read_frame(&mut self.port)? else {
            return Ok(None);
        };
        if is_autopilot_heartbeat(&msg) {
            self.seen_heartbeat = true;
        }
        apply_message(&mut self.snapshot, &msg);
        Ok(Some(msg))
    }

    pub fn seen_heartbeat(&self) -> bool {
        self.seen_heartbeat
    }

    pub fn snapshot(&self) -> &TelemetrySnapshot {
        &self.snapshot
    }

    /// Companion heartbeat so the autopilot keeps streaming to us.
    pub fn send_heartbeat(&mut self) -> Result<()> {
        let hb = HEARTBEAT_DATA {
            custom_mode: 0,
            mavtype: MavType::MAV_TYPE_GCS,
            autopilot: MavAutopilot::MAV_AUTOPILOT_INVALID,
            base_mode: MavModeFlag::empty(),
            system_status: MavState::MAV_STATE_ACTIVE,
            mavlink_version: 3,
        };
        self.hdr.sequence = self.hdr.sequence.wrapping_add(1);
        mavlink::write_versioned_msg(&mut self.port, MavlinkVersion::V2, self.hdr, &MavMessage::HEARTBEAT(hb))
            .context("mavlink send heartbeat")?;
        self.port.flush().context("flush fc serial")?;
        Ok(())
    }
}

fn read_frame<R: Read>(port: &mut R) -> Result<Option<MavMessage>> {
    match mavlink::read_versioned_msg::<MavMessage, _>(port, MavlinkVersion::V2) {
        Ok((_hdr, msg)) => Ok(Some(msg)),
        Err(MessageReadError::Io(e))
            if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) =>
        {
            Ok(None)
        }
        Err(MessageReadError::Io(e)) => Err(e).context("fc serial read"),
        Err(MessageReadError::Parse(e)) => {
            debug!("mavlink parse: {}", e);
            Ok(None)
        }
    }
}

/// Heartbeats from other ground stations or companions say nothing about
/// the vehicle.
pub fn is_autopilot_heartbeat(msg: &MavMessage) -> bool {
    matches!(msg, MavMessage::HEARTBEAT(hb) if hb.autopilot != MavAutopilot::MAV_AUTOPILOT_INVALID)
}

/// Fold one message into the snapshot. Returns true if it was telemetry we track.
pub fn apply_message(snap: &mut TelemetrySnapshot, msg: &MavMessage) -> bool {
    match msg {
        MavMessage::HEARTBEAT(hb) => {
            if hb.autopilot == MavAutopilot::MAV_AUTOPILOT_INVALID {
                return false;
            }
            let mode = flight_mode_name(&hb.autopilot, &hb.mavtype, hb.custom_mode);
            let armed = hb.base_mode.contains(MavModeFlag::MAV_MODE_FLAG_SAFETY_ARMED);
            apply_heartbeat(snap, mode, armed);
            true
        }
        MavMessage::SYS_STATUS(s) => {
            apply_sys_status(snap, s.voltage_battery, s.current_battery, s.battery_remaining);
            true
        }
        MavMessage::GPS_RAW_INT(g) => {
            apply_gps_raw(snap, g.satellites_visible, fix_type_name(&g.fix_type), g.lat, g.lon, g.alt);
            true
        }
        MavMessage::GLOBAL_POSITION_INT(p) => {
            apply_position(snap, p.lat, p.lon, p.alt);
            true
        }
        MavMessage::ATTITUDE(a) => {
            apply_attitude(snap, a.roll, a.pitch, a.yaw);
            true
        }
        MavMessage::VFR_HUD(v) => {
            apply_vfr_hud(snap, v.groundspeed, v.airspeed, v.climb);
            true
        }
        _ => false,
    }
}

fn apply_heartbeat(snap: &mut TelemetrySnapshot, mode: String, armed: bool) {
    snap.status = Some(FlightStatus { mode, armed });
}

fn apply_sys_status(snap: &mut TelemetrySnapshot, voltage_mv: u16, current_ca: i16, remaining: i8) {
    let battery = snap.battery.get_or_insert_with(Battery::default);
    // voltage_battery is in millivolts, UINT16_MAX means unknown
    if voltage_mv != u16::MAX {
        battery.voltage = voltage_mv as f32 / 1000.0;
    }
    // current_battery is in centiamps (0.01A), -1 means unknown
    if current_ca != -1 {
        battery.current = current_ca as f32 / 100.0;
    }
    // battery_remaining is percentage 0-100, -1 means unknown
    if (0..=100).contains(&remaining) {
        battery.remaining = remaining as f32;
    }
}

fn apply_gps_raw(
    snap: &mut TelemetrySnapshot,
    satellites_visible: u8,
    fix_type: &str,
    lat_e7: i32,
    lon_e7: i32,
    alt_mm: i32,
) {
    let gps = snap.gps.get_or_insert_with(Gps::default);
    // 255 means unknown
    gps.satellites = if satellites_visible == u8::MAX { 0 } else { satellites_visible as i32 };
    gps.fix_type = fix_type.to_string();
    if lat_e7 != 0 || lon_e7 != 0 {
        gps.lat = lat_e7 as f64 / 1e7;
        gps.lon = lon_e7 as f64 / 1e7;
        gps.alt = alt_mm as f32 / 1000.0;
    }
}

fn apply_position(snap: &mut TelemetrySnapshot, lat_e7: i32, lon_e7: i32, alt_mm: i32) {
    let gps = snap.gps.get_or_insert_with(Gps::default);
    gps.lat = lat_e7 as f64 / 1e7;
    gps.lon = lon_e7 as f64 / 1e7;
    gps.alt = alt_mm as f32 / 1000.0;
}

fn apply_attitude(snap: &mut TelemetrySnapshot, roll_rad: f32, pitch_rad: f32, yaw_rad: f32) {
    snap.attitude = Some(Attitude {
        roll: roll_rad.to_degrees(),
        pitch: pitch_rad.to_degrees(),
        yaw: yaw_rad.to_degrees(),
    });
}

fn apply_vfr_hud(snap: &mut TelemetrySnapshot, groundspeed: f32, airspeed: f32, climb: f32) {
    snap.speed = Some(Speed { ground_speed: groundspeed, air_speed: airspeed, climb_rate: climb });
}

fn fix_type_name(fix: &GpsFixType) -> &'static str {
    match fix {
        GpsFixType::GPS_FIX_TYPE_NO_GPS => "NoGPS",
        GpsFixType::GPS_FIX_TYPE_NO_FIX => "NoFix",
        GpsFixType::GPS_FIX_TYPE_2D_FIX => "2D",
        GpsFixType::GPS_FIX_TYPE_3D_FIX => "3D",
        GpsFixType::GPS_FIX_TYPE_DGPS => "DGPS",
        GpsFixType::GPS_FIX_TYPE_RTK_FLOAT => "RTKFloat",
        GpsFixType::GPS_FIX_TYPE_RTK_FIXED => "RTKFixed",
        #[allow(unreachable_patterns)]
        _ => "Other",
    }
}

/// ArduPilot reports a per-vehicle `custom_mode`; only the copter table is
/// known here, anything else is shown as `MODE(n)`.
fn flight_mode_name(autopilot: &MavAutopilot, mavtype: &MavType, custom_mode: u32) -> String {
    let named = if *autopilot == MavAutopilot::MAV_AUTOPILOT_ARDUPILOTMEGA && is_multirotor(mavtype) {
        copter_mode_name(custom_mode)
    } else {
        None
    };
    named.map(str::to_string).unwrap_or_else(|| format!("MODE({})", custom_mode))
}

fn is_multirotor(mavtype: &MavType) -> bool {
    matches!(
        mavtype,
        MavType::MAV_TYPE_QUADROTOR
            | MavType::MAV_TYPE_COAXIAL
            | MavType::MAV_TYPE_HELICOPTER
            | MavType::MAV_TYPE_HEXAROTOR
            | MavType::MAV_TYPE_OCTOROTOR
            | MavType::MAV_TYPE_TRICOPTER
            | MavType::MAV_TYPE_DODECAROTOR
            | MavType::MAV_TYPE_DECAROTOR
    )
}

/// ArduCopter `custom_mode` numbers.
pub fn copter_mode_name(custom_mode: u32) -> Option<&'static str> {
    Some(match custom_mode {
        0 => "STABILIZE",
        1 => "ACRO",
        2 => "ALT_HOLD",
        3 => "AUTO",
        4 => "GUIDED",
        5 => "LOITER",
        6 => "RTL",
        7 => "CIRCLE",
        9 => "LAND",
        11 => "DRIFT",
        13 => "SPORT",
        14 => "FLIP",
        15 => "AUTOTUNE",
        16 => "POSHOLD",
        17 => "BRAKE",
        18 => "THROW",
        19 => "AVOID_ADSB",
        20 => "GUIDED_NOGPS",
        21 => "SMART_RTL",
        _ => return None,
    })
}
