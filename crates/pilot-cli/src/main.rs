use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use pilot_gate::{
    dispatch, doctor as gate_doctor, ChatReply, CommandSink, ForwardedCommand, Gate, GateConfig,
    GateDecision, Prepared,
};
use pilot_proto::OperatingMode;

use pilot_fc::autodetect::{autodetect_fc, default_candidate_bauds, default_candidate_devs};
use pilot_fc::mav::TelemetryLink;
use pilot_fc::reader::run_reader;
use pilot_fc::state::{lock_status, LinkStatus};
use pilot_fc::LinkConfig;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "pilot", version, about = "Pilot - safety gate between a flight assistant and the vehicle")]
struct Cli {
    #[arg(long)]
    config: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Doctor,
    /// Print the system instructions the assistant would receive.
    Prompt {
        #[arg(long)]
        mode: Option<OperatingMode>,
        /// Telemetry JSON file. Omit for "no telemetry".
        #[arg(long)]
        telemetry: Option<String>,
    },
    /// Gate an assistant response: extract the acknowledged command and decide.
    Evaluate {
        #[arg(long)]
        mode: Option<OperatingMode>,
        #[arg(long)]
        telemetry: Option<String>,
        /// The assistant's reply text.
        #[arg(long)]
        response: String,
        /// Print the chat client reply as JSON.
        #[arg(long)]
        json: bool,
    },
    Fc { #[command(subcommand)] cmd: FcCmd },
}

#[derive(Debug, Subcommand)]
enum FcCmd {
    /// Probe serial ports/bauds for autopilot heartbeats.
    Autodetect,
    /// Read live telemetry and print the connection verdict until Ctrl-C.
    Watch {
        #[arg(long)]
        mode: Option<OperatingMode>,
    },
}

#[derive(Debug, serde::Deserialize)]
struct Config {
    #[serde(default)]
    gate: GateConfig,

    fc: Option<LinkConfig>,
}

fn load_config(path: &str) -> Result<Config> {
    let s = std::fs::read_to_string(path).context("read config")?;
    toml::from_str(&s).context("parse config toml")
}

fn load_telemetry(path: Option<&str>) -> Result<String> {
    match path {
        Some(p) => std::fs::read_to_string(p).with_context(|| format!("read telemetry {}", p)),
        None => Ok("null".to_string()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;
    let gate = Gate::from_config(&cfg.gate).context("gate config")?;

    match cli.cmd {
        Command::Doctor => doctor(&cfg)?,
        Command::Prompt { mode, telemetry } => {
            let mode = mode.unwrap_or(cfg.gate.default_mode);
            let prepared = gate.prepare_str(&load_telemetry(telemetry.as_deref())?, mode);
            report_issue(&prepared);
            println!("{}", prepared.system_prompt);
        }
        Command::Evaluate { mode, telemetry, response, json } => {
            let mode = mode.unwrap_or(cfg.gate.default_mode);
            evaluate(&gate, mode, telemetry.as_deref(), &response, json)?;
        }
        Command::Fc { cmd } => fc_cmd(&cfg, &gate, cmd).await?,
    }
    Ok(())
}

fn doctor(cfg: &Config) -> Result<()> {
    info!("doctor: starting");

    gate_doctor::check_gate(&cfg.gate)?;
    info!("doctor: default mode {}", cfg.gate.default_mode);

    if let Some(fc) = &cfg.fc {
        if fc.enable {
            if fc.autodetect {
                info!("doctor: fc autodetect enabled (OK)");
            } else {
                anyhow::ensure!(fc.serial_dev.as_ref().map(|s| !s.is_empty()).unwrap_or(false), "fc.serial_dev missing");
                anyhow::ensure!(fc.baud.unwrap_or(0) > 0, "fc.baud invalid");
            }
            let hb_ms = fc.heartbeat_timeout_ms.unwrap_or(1500);
            anyhow::ensure!((100..=10_000).contains(&hb_ms), "fc.heartbeat_timeout_ms should be 100..10000");
            anyhow::ensure!(fc.send_heartbeat_hz.unwrap_or(1.0) > 0.0, "fc.send_heartbeat_hz must be > 0");
            anyhow::ensure!(fc.stale_after_ms.unwrap_or(3000) >= 1000, "fc.stale_after_ms should be >= 1000");
        }
    }

    info!("doctor: OK");
    Ok(())
}

fn report_issue(prepared: &Prepared) {
    if let Some(e) = &prepared.report.issue {
        warn!("telemetry: {} (treated as not connected)", e);
    }
}

/// Stand-in executor: this tool has no vehicle command link.
struct DryRunSink;

impl CommandSink for DryRunSink {
    fn execute(&mut self, cmd: &ForwardedCommand) -> Result<String> {
        info!("dry-run: {} approved in {} mode", cmd.intent(), cmd.mode());
        Ok(format!("[dry-run] {} approved, not transmitted", cmd.intent()))
    }
}

fn evaluate(gate: &Gate, mode: OperatingMode, telemetry: Option<&str>, response: &str, json: bool) -> Result<()> {
    let prepared = gate.prepare_str(&load_telemetry(telemetry)?, mode);
    report_issue(&prepared);
    let eval = gate.evaluate(response, mode);

    if json {
        let reply = ChatReply::new(response, &prepared, &eval);
        println!("{}", serde_json::to_string_pretty(&reply).context("encode reply")?);
        return Ok(());
    }

    println!("mode={}", mode);
    println!("connection={}", prepared.context.connection_status);
    println!("intent={}", eval.intent);
    if let Some(e) = &eval.issue {
        println!("rejected={}", e);
    }
    match &eval.decision {
        GateDecision::NoAction => println!("decision=no-action"),
        GateDecision::Forward(_) => {
            println!("decision=forward");
            if let Some(result) = dispatch(&eval.decision, &mut DryRunSink)? {
                println!("result={}", result);
            }
        }
        GateDecision::Suppressed { notice, .. } => {
            println!("decision=suppressed");
            println!("notice={}", notice);
        }
    }
    Ok(())
}

async fn fc_cmd(cfg: &Config, gate: &Gate, cmd: FcCmd) -> Result<()> {
    let fc = cfg.fc.as_ref().context("no [fc] config section")?;
    anyhow::ensure!(fc.enable, "fc.enable=false");

    match cmd {
        FcCmd::Autodetect => {
            let res = run_fc_autodetect(fc)?;
            if let Some((dev, baud)) = res.chosen {
                println!("CHOSEN: {} @ {}", dev, baud);
            } else {
                println!("CHOSEN: none");
            }
            for p in res.probes {
                println!("probe dev={} baud={} hb={} {}ms note={}", p.dev, p.baud, p.hb_seen, p.elapsed_ms, p.note);
            }
            Ok(())
        }
        FcCmd::Watch { mode } => watch(fc, gate, mode.unwrap_or(cfg.gate.default_mode)).await,
    }
}

/// How long `fc watch` waits for the reader to notice the stop flag.
const READER_JOIN_DEADLINE: Duration = Duration::from_secs(2);

async fn watch(fc: &LinkConfig, gate: &Gate, mode: OperatingMode) -> Result<()> {
    let (dev, baud) = resolve_fc_port(fc)?;
    let status = Arc::new(Mutex::new(LinkStatus {
        port: Some(dev.clone()),
        baud: Some(baud),
        ..Default::default()
    }));
    let stop = Arc::new(AtomicBool::new(false));

    let link = TelemetryLink::open(&dev, baud, fc.sys_id, fc.comp_id).context("FC open")?;
    let hb_hz = fc.send_heartbeat_hz.unwrap_or(1.0).max(0.2);
    let hb_interval = Duration::from_secs_f32(1.0 / hb_hz);

    let status2 = status.clone();
    let stop2 = stop.clone();
    let reader = tokio::task::spawn_blocking(move || run_reader(link, &status2, &stop2, hb_interval));

    let stale_after = Duration::from_millis(fc.stale_after_ms.unwrap_or(3000));
    let mut tick = tokio::time::interval(Duration::from_millis(fc.watch_interval_ms.unwrap_or(1000).max(100)));

    loop {
        tokio::select! {
            _ = tick.tick() => {
                let (snapshot, messages, hb_age) = {
                    let st = lock_status(&status);
                    (st.fresh_snapshot(stale_after), st.messages, st.hb_age())
                };
                let prepared = gate.prepare_snapshot(snapshot, mode);
                println!(
                    "[{} msgs, hb_age={:?}] {}",
                    messages,
                    hb_age,
                    prepared.context.connection_status
                );
                println!("{}", prepared.context.telemetry_section);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("watch: stopping");
                break;
            }
        }
    }

    stop.store(true, Ordering::Relaxed);
    match tokio::time::timeout(READER_JOIN_DEADLINE, reader).await {
        Ok(joined) => joined.context("fc reader task")?,
        Err(_) => warn!("fc reader did not stop within {:?}, exiting anyway", READER_JOIN_DEADLINE),
    }
    Ok(())
}

fn run_fc_autodetect(fc: &LinkConfig) -> Result<pilot_fc::autodetect::AutodetectResult> {
    let devs = fc.candidate_devs.clone().unwrap_or_else(default_candidate_devs);
    let bauds = fc.candidate_bauds.clone().unwrap_or_else(default_candidate_bauds);
    let to_ms = fc.heartbeat_timeout_ms.unwrap_or(1500);
    let timeout = Duration::from_millis(to_ms);

    autodetect_fc(devs, bauds, timeout, fc.sys_id, fc.comp_id)
}

fn resolve_fc_port(fc: &LinkConfig) -> Result<(String, u32)> {
    if fc.autodetect {
        let res = run_fc_autodetect(fc)?;
        if let Some((dev, baud)) = res.chosen {
            return Ok((dev, baud));
        }
        anyhow::bail!("fc autodetect failed: no heartbeat found");
    } else {
        let dev = fc.serial_dev.clone().context("fc.serial_dev missing (autodetect=false)")?;
        let baud = fc.baud.context("fc.baud missing (autodetect=false)")?;
        Ok((dev, baud))
    }
}
