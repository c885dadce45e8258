use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::mav::{is_autopilot_heartbeat, TelemetryLink};
use crate::state::{lock_status, LinkStatus};

/// Blocking reader loop: sends the companion heartbeat every `hb_interval`,
/// folds incoming frames into `status`, and returns once `stop` is set.
///
/// Reads are bounded by the port timeout, so `stop` is observed within one
/// read even when the autopilot has gone quiet.
pub fn run_reader<P: Read + Write>(
    mut link: TelemetryLink<P>,
    status: &Mutex<LinkStatus>,
    stop: &AtomicBool,
    hb_interval: Duration,
) {
    let mut last_hb_send: Option<Instant> = None;

    while !stop.load(Ordering::Relaxed) {
        if last_hb_send.map_or(true, |t| t.elapsed() >= hb_interval) {
            if let Err(e) = link.send_heartbeat() {
                warn!("fc heartbeat send failed: {:#}", e);
            }
            last_hb_send = Some(Instant::now());
        }

        match link.poll_once() {
            Ok(Some(msg)) => {
                let mut st = lock_status(status);
                st.messages += 1;
                if is_autopilot_heartbeat(&msg) {
                    st.last_heartbeat = Some(Instant::now());
                }
                st.snapshot = link.snapshot().clone();
            }
            Ok(None) => {}
            Err(e) => {
                debug!("fc read: {:#}", e);
                std::thread::sleep(Duration::from_millis(50));
            }
        }
    }
    info!("fc reader stopped");
}
