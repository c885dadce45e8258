use anyhow::Result;
use tracing::info;

use crate::mode::{ForwardedCommand, GateDecision};

/// The vehicle-command execution collaborator.
///
/// Implementations own the actual link to the vehicle. They can only ever be
/// handed a command that already passed the mode gate.
pub trait CommandSink {
    /// Returns a short human-readable result ("Armed", "Landing", ...).
    fn execute(&mut self, cmd: &ForwardedCommand) -> Result<String>;
}

/// Hand a forwarded command to `sink`. Anything else is a no-op.
pub fn dispatch<S: CommandSink + ?Sized>(decision: &GateDecision, sink: &mut S) -> Result<Option<String>> {
    let Some(cmd) = decision.forwarded() else {
        return Ok(None);
    };
    info!("dispatching {}", cmd.intent());
    sink.execute(cmd).map(Some)
}
