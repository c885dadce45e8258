use anyhow::Result;
use std::io::{Read, Write};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::mav::{is_autopilot_heartbeat, TelemetryLink};

#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub dev: String,
    pub baud: u32,
    pub hb_seen: bool,
    pub elapsed_ms: u64,
    pub note: String,
}

#[derive(Debug, Clone)]
pub struct AutodetectResult {
    pub chosen: Option<(String, u32)>,
    pub probes: Vec<ProbeResult>,
}

pub fn default_candidate_devs() -> Vec<String> {
    vec![
        "/dev/ttyACM0".into(),
        "/dev/ttyACM1".into(),
        "/dev/ttyUSB0".into(),
        "/dev/ttyUSB1".into(),
        "/dev/serial0".into(),
        "/dev/ttyAMA0".into(),
    ]
}

pub fn default_candidate_bauds() -> Vec<u32> {
    vec![115200, 57600, 921600]
}

/// First (device, baud) on which an autopilot heartbeat shows up.
pub fn autodetect_fc(
    candidate_devs: Vec<String>,
    candidate_bauds: Vec<u32>,
    heartbeat_timeout: Duration,
    sys_id: u8,
    comp_id: u8,
) -> Result<AutodetectResult> {
    let mut probes = Vec::new();

    for dev in candidate_devs {
        for baud in &candidate_bauds {
            let start = Instant::now();
            let mut hb_seen = false;

            let note = match TelemetryLink::open(&dev, *baud, sys_id, comp_id) {
                Ok(mut link) => {
                    hb_seen = wait_for_heartbeat(&mut link, heartbeat_timeout);
                    if hb_seen { "heartbeat".to_string() } else { "no heartbeat".to_string() }
                }
                Err(e) => {
                    warn!("fc autodetect probe failed dev={} baud={} err={:#}", dev, baud, e);
                    format!("open/connect failed: {:#}", e)
                }
            };

            probes.push(ProbeResult {
                dev: dev.clone(),
                baud: *baud,
                hb_seen,
                elapsed_ms: start.elapsed().as_millis() as u64,
                note,
            });

            if hb_seen {
                info!("fc autodetect: OK {} @ {}", dev, baud);
                return Ok(AutodetectResult { chosen: Some((dev, *baud)), probes });
            }
        }
    }

    Ok(AutodetectResult { chosen: None, probes })
}

/// Poll until an autopilot heartbeat arrives or `timeout` passes. Each poll
/// is bounded by the port read timeout, so this overruns `timeout` by at
/// most one read.
pub fn wait_for_heartbeat<P: Read + Write>(link: &mut TelemetryLink<P>, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        match link.poll_once() {
            Ok(Some(msg)) if is_autopilot_heartbeat(&msg) => return true,
            Ok(_) => {}
            Err(e) => {
                debug!("fc autodetect read error: {:#}", e);
                return false;
            }
        }
    }
    false
}
