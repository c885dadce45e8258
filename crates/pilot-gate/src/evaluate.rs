use pilot_proto::{CommandIntent, OperatingMode, TelemetrySnapshot};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::connection::{self, ConnectionReport};
use crate::error::{Result, ValidationError};
use crate::extract::{try_extract, ExtractPolicy};
use crate::mode::{decide, GateDecision};
use crate::prompt::{render_system_prompt, PromptContext};
use crate::GateConfig;

/// Request-scoped evaluation. Holds only immutable policy, so one instance
/// can serve any number of concurrent requests.
#[derive(Debug, Clone, Default)]
pub struct Gate {
    policy: ExtractPolicy,
}

/// Everything the prompt-template collaborator needs for one request.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub mode: OperatingMode,
    pub report: ConnectionReport,
    pub context: PromptContext,
    pub system_prompt: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub intent: CommandIntent,
    pub decision: GateDecision,
    /// Set when an acknowledgment was found but refused.
    pub issue: Option<ValidationError>,
}

impl Gate {
    pub fn new(policy: ExtractPolicy) -> Self {
        Self { policy }
    }

    pub fn from_config(cfg: &GateConfig) -> Result<Self> {
        Ok(Self::new(cfg.policy()?))
    }

    pub fn policy(&self) -> &ExtractPolicy {
        &self.policy
    }

    /// Validate raw telemetry and build the prompt context for `mode`.
    pub fn prepare(&self, raw_telemetry: &Value, mode: OperatingMode) -> Prepared {
        self.prepare_report(connection::assess(raw_telemetry), mode)
    }

    /// Same as [`Gate::prepare`] for an unparsed JSON document.
    pub fn prepare_str(&self, raw_telemetry: &str, mode: OperatingMode) -> Prepared {
        self.prepare_report(connection::assess_str(raw_telemetry), mode)
    }

    /// Same as [`Gate::prepare`] for telemetry that is already typed.
    pub fn prepare_snapshot(&self, snapshot: TelemetrySnapshot, mode: OperatingMode) -> Prepared {
        self.prepare_report(connection::from_snapshot(snapshot), mode)
    }

    fn prepare_report(&self, report: ConnectionReport, mode: OperatingMode) -> Prepared {
        let context = PromptContext::new(report.state, &report.snapshot);
        let system_prompt = render_system_prompt(mode, &context);
        info!(
            "prepared {} mode request ({})",
            mode, context.connection_status
        );
        Prepared { mode, report, context, system_prompt }
    }

    /// Extract the acknowledged command from assistant text and gate it.
    pub fn evaluate(&self, response_text: &str, mode: OperatingMode) -> Evaluation {
        match try_extract(response_text, &self.policy) {
            Ok(intent) => Evaluation { intent, decision: decide(mode, intent), issue: None },
            Err(e) => {
                warn!("acknowledgment refused: {}", e);
                Evaluation {
                    intent: CommandIntent::None,
                    decision: GateDecision::NoAction,
                    issue: Some(e),
                }
            }
        }
    }
}

/// Response shape the ground station chat client consumes.
///
/// `command` is only populated for a forwarded command, so a client that
/// executes whatever it finds there still cannot act in Ask mode.
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub success: bool,
    pub response: String,
    pub mode: OperatingMode,
    pub connected: bool,
    pub command: Option<CommandIntent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ChatReply {
    pub fn new(response_text: &str, prepared: &Prepared, eval: &Evaluation) -> Self {
        let mut warnings = Vec::new();
        if let Some(e) = &prepared.report.issue {
            warnings.push(e.to_string());
        }
        if let Some(e) = &eval.issue {
            warnings.push(e.to_string());
        }

        let notice = match &eval.decision {
            GateDecision::Suppressed { notice, .. } => Some(notice.to_string()),
            _ => None,
        };

        Self {
            success: true,
            response: response_text.to_string(),
            mode: prepared.mode,
            connected: prepared.report.state.is_connected(),
            command: eval.decision.forwarded().map(|c| c.intent()),
            notice,
            warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn connected_agent_request_forwards_takeoff() {
        let gate = Gate::default();
        let prepared = gate.prepare(&json!({"battery": {"voltage": 12.4}}), OperatingMode::Agent);
        assert!(prepared.report.state.is_connected());
        assert!(prepared.system_prompt.contains("CONNECTED to drone"));

        let text = "Taking off to 15 meters.";
        let eval = gate.evaluate(text, OperatingMode::Agent);
        assert_eq!(eval.intent, CommandIntent::Takeoff { altitude_meters: 15 });

        let reply = ChatReply::new(text, &prepared, &eval);
        let wire = serde_json::to_value(&reply).unwrap();
        assert_eq!(wire["command"], json!({"type": "TAKEOFF", "params": {"altitude": 15}}));
        assert_eq!(wire["connected"], json!(true));
        assert!(wire.get("notice").is_none());
    }

    #[test]
    fn ask_mode_reply_carries_notice_and_no_command() {
        let gate = Gate::default();
        let prepared = gate.prepare(&json!({}), OperatingMode::Ask);
        let text = "Landing the drone.";
        let eval = gate.evaluate(text, OperatingMode::Ask);
        assert_eq!(eval.intent, CommandIntent::Land);
        assert!(eval.decision.is_suppressed());

        let reply = ChatReply::new(text, &prepared, &eval);
        assert_eq!(reply.command, None);
        assert_eq!(reply.notice.as_deref(), Some(crate::mode::READ_ONLY_NOTICE));
        assert!(!reply.connected);
    }

    #[test]
    fn refused_altitude_surfaces_as_warning() {
        let gate = Gate::new(ExtractPolicy { max_takeoff_alt_m: 50 });
        let prepared = gate.prepare(&json!({"gps": {"satellites": 8}}), OperatingMode::Agent);
        let text = "Taking off to 80 meters.";
        let eval = gate.evaluate(text, OperatingMode::Agent);
        assert_eq!(eval.decision, GateDecision::NoAction);
        assert!(matches!(eval.issue, Some(ValidationError::Altitude { .. })));

        let reply = ChatReply::new(text, &prepared, &eval);
        assert_eq!(reply.command, None);
        assert_eq!(reply.warnings.len(), 1);
    }

    #[test]
    fn malformed_telemetry_prepares_not_connected_prompt() {
        let gate = Gate::default();
        let prepared = gate.prepare(&json!({"gps": {"satellites": "many"}}), OperatingMode::Agent);
        assert!(!prepared.report.state.is_connected());
        assert!(prepared.report.issue.is_some());
        assert!(prepared.system_prompt.contains("NOT CONNECTED to drone"));
    }

    #[test]
    fn config_ceiling_flows_into_policy() {
        let cfg = GateConfig { max_takeoff_alt_m: Some(30), ..Default::default() };
        let gate = Gate::from_config(&cfg).unwrap();
        assert_eq!(gate.policy().max_takeoff_alt_m, 30);

        let bad = GateConfig { max_takeoff_alt_m: Some(0), ..Default::default() };
        assert!(matches!(Gate::from_config(&bad), Err(ValidationError::Config(_))));
    }
}
