use anyhow::Result;

use crate::GateConfig;

pub fn check_gate(cfg: &GateConfig) -> Result<()> {
    let policy = cfg.policy()?;
    anyhow::ensure!(
        policy.max_takeoff_alt_m <= 10_000,
        "gate.max_takeoff_alt_m implausibly high ({} m)",
        policy.max_takeoff_alt_m
    );
    Ok(())
}
