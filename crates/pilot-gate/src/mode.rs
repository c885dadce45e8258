use pilot_proto::{CommandIntent, OperatingMode};
use serde::Serialize;
use tracing::{debug, warn};

/// Shown to the operator when a command is suppressed in Ask mode.
pub const READ_ONLY_NOTICE: &str = "I'm currently in Ask Mode (read-only) and cannot execute commands. \
To control the drone, please switch to Agent Mode using the mode selector at the bottom of the chat window.";

/// A command that passed the mode gate.
///
/// Only [`decide`] can build one, and [`crate::CommandSink`] accepts nothing
/// else, so there is no path to the executor around the gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForwardedCommand {
    intent: CommandIntent,
    mode: OperatingMode,
}

impl ForwardedCommand {
    pub fn intent(&self) -> CommandIntent {
        self.intent
    }

    /// Mode the command was approved under. Always `Agent`.
    pub fn mode(&self) -> OperatingMode {
        self.mode
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    NoAction,
    Forward(ForwardedCommand),
    /// Policy outcome, not an error: the caller should relay `notice`.
    Suppressed {
        intent: CommandIntent,
        notice: &'static str,
    },
}

impl GateDecision {
    pub fn forwarded(&self) -> Option<&ForwardedCommand> {
        match self {
            GateDecision::Forward(cmd) => Some(cmd),
            _ => None,
        }
    }

    pub fn is_suppressed(&self) -> bool {
        matches!(self, GateDecision::Suppressed { .. })
    }
}

pub fn may_execute(mode: OperatingMode, intent: &CommandIntent) -> bool {
    intent.is_action() && mode == OperatingMode::Agent
}

pub fn decide(mode: OperatingMode, intent: CommandIntent) -> GateDecision {
    if !intent.is_action() {
        return GateDecision::NoAction;
    }
    if may_execute(mode, &intent) {
        debug!("gate: forwarding {} ({} mode)", intent, mode);
        GateDecision::Forward(ForwardedCommand { intent, mode })
    } else {
        warn!("gate: suppressed {} in {} mode", intent, mode);
        GateDecision::Suppressed { intent, notice: READ_ONLY_NOTICE }
    }
}
