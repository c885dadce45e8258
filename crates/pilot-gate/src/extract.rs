//! Turns assistant text into a [`CommandIntent`].
//!
//! Only the fixed acknowledgment phrases the assistant is instructed to use
//! while executing count. Mentioning an action ("I can land the drone",
//! "what does arming do?") is not an acknowledgment. A missed command is
//! acceptable here, an invented one is not.

use once_cell::sync::Lazy;
use pilot_proto::CommandIntent;
use regex::Regex;
use tracing::{debug, warn};

use crate::error::{Result, ValidationError};

pub const ARM_PHRASE: &str = "arming the drone now";
pub const DISARM_PHRASE: &str = "disarming the drone";
pub const LAND_PHRASE: &str = "landing the drone";
pub const RTL_PHRASE: &str = "returning to launch";

// Any text mentioning a disarm cancels an arm acknowledgment, since
// "disarming the drone now" contains the arm phrase verbatim.
const ARM_EXCLUSION: &str = "disarm";

// ASCII digits only; `\d` would also admit non-ASCII numerals. The unit must
// end at whitespace, punctuation or end of text, so "15 m/s" is not a height.
static TAKEOFF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"taking off to ([0-9]+)\s*(?:meters?|m)(?:[\s.,;:!?)]|$)").expect("valid takeoff regex")
});

pub const DEFAULT_MAX_TAKEOFF_ALT_M: u32 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractPolicy {
    pub max_takeoff_alt_m: u32,
}

impl Default for ExtractPolicy {
    fn default() -> Self {
        Self { max_takeoff_alt_m: DEFAULT_MAX_TAKEOFF_ALT_M }
    }
}

/// Infallible form: a rejected acknowledgment becomes `None`.
///
/// Uses the default policy, so a well-formed takeoff phrase above
/// [`DEFAULT_MAX_TAKEOFF_ALT_M`] ("Taking off to 150 meters.") is inaction,
/// not a clamped takeoff. Use [`try_extract`] to see why.
pub fn extract(response_text: &str) -> CommandIntent {
    match try_extract(response_text, &ExtractPolicy::default()) {
        Ok(intent) => intent,
        Err(e) => {
            warn!("acknowledgment rejected, no action: {}", e);
            CommandIntent::None
        }
    }
}

/// Match the acknowledgment phrases case-insensitively.
///
/// When several phrases appear the first in this order wins:
/// arm, disarm, takeoff, land, return to launch. An out-of-range takeoff
/// altitude is an error rather than a fall-through.
pub fn try_extract(response_text: &str, policy: &ExtractPolicy) -> Result<CommandIntent> {
    let text = response_text.to_lowercase();

    let intent = if text.contains(ARM_PHRASE) && !text.contains(ARM_EXCLUSION) {
        CommandIntent::Arm
    } else if text.contains(DISARM_PHRASE) {
        CommandIntent::Disarm
    } else if let Some(altitude_meters) = takeoff_altitude(&text, policy)? {
        CommandIntent::Takeoff { altitude_meters }
    } else if text.contains(LAND_PHRASE) {
        CommandIntent::Land
    } else if text.contains(RTL_PHRASE) {
        CommandIntent::Rtl
    } else {
        CommandIntent::None
    };

    debug!("extracted intent {}", intent);
    Ok(intent)
}

fn takeoff_altitude(text: &str, policy: &ExtractPolicy) -> Result<Option<u32>> {
    let Some(caps) = TAKEOFF_RE.captures(text) else {
        return Ok(None);
    };
    let raw = &caps[1];
    let reject = |reason: String| ValidationError::Altitude { raw: raw.to_string(), reason };

    let alt: u32 = raw
        .parse()
        .map_err(|_| reject("not representable as an unsigned 32-bit integer".into()))?;
    if alt == 0 {
        return Err(reject("must be above ground level".into()));
    }
    if alt > policy.max_takeoff_alt_m {
        return Err(reject(format!("exceeds the {} m ceiling", policy.max_takeoff_alt_m)));
    }
    Ok(Some(alt))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_phrases_map_to_intents() {
        assert_eq!(extract("Arming the drone now."), CommandIntent::Arm);
        assert_eq!(extract("I am disarming the drone."), CommandIntent::Disarm);
        assert_eq!(
            extract("Taking off to 15 meters."),
            CommandIntent::Takeoff { altitude_meters: 15 }
        );
        assert_eq!(extract("Landing the drone."), CommandIntent::Land);
        assert_eq!(extract("Returning to launch."), CommandIntent::Rtl);
    }

    #[test]
    fn informational_text_is_no_action() {
        for text in [
            "What can you do?",
            "Are we connected?",
            "I can arm the drone, take off, land, or return to launch (RTL).",
            "To land, switch to LAND mode.",
            "Arming means the motors are enabled.",
            "",
        ] {
            assert_eq!(extract(text), CommandIntent::None, "{:?}", text);
        }
    }

    #[test]
    fn disarm_is_not_misread_as_arm() {
        assert_eq!(extract("Disarming the drone now."), CommandIntent::Disarm);
        // Arm phrase plus any mention of disarm cancels the arm.
        assert_eq!(
            extract("Arming the drone now. You can disarm later."),
            CommandIntent::None
        );
    }

    #[test]
    fn matching_ignores_case() {
        assert_eq!(extract("ARMING THE DRONE NOW"), CommandIntent::Arm);
        assert_eq!(extract("ReTuRnInG To LaUnCh"), CommandIntent::Rtl);
    }

    #[test]
    fn takeoff_units() {
        assert_eq!(extract("Taking off to 10m."), CommandIntent::Takeoff { altitude_meters: 10 });
        assert_eq!(extract("taking off to 5 m"), CommandIntent::Takeoff { altitude_meters: 5 });
        assert_eq!(extract("Taking off to 1 meter."), CommandIntent::Takeoff { altitude_meters: 1 });
        assert_eq!(extract("Taking off to 20 feet."), CommandIntent::None);
        assert_eq!(extract("Taking off to 20 minutes from now"), CommandIntent::None);
    }

    #[test]
    fn speed_units_are_not_altitudes() {
        assert_eq!(extract("Taking off to 15 m/s climb rate."), CommandIntent::None);
        assert_eq!(extract("Taking off to 15 meters/second"), CommandIntent::None);
        assert_eq!(extract("Taking off to 15 mph"), CommandIntent::None);
        assert_eq!(extract("Taking off to 15 m"), CommandIntent::Takeoff { altitude_meters: 15 });
        assert_eq!(extract("Taking off to 15m, hold on."), CommandIntent::Takeoff { altitude_meters: 15 });
        assert_eq!(extract("(taking off to 8 meters)"), CommandIntent::Takeoff { altitude_meters: 8 });
    }

    #[test]
    fn above_default_ceiling_is_inaction() {
        assert_eq!(extract("Taking off to 150 meters."), CommandIntent::None);
        assert_eq!(extract("Taking off to 120 meters."), CommandIntent::Takeoff { altitude_meters: 120 });
        let wide = ExtractPolicy { max_takeoff_alt_m: 200 };
        assert_eq!(
            try_extract("Taking off to 150 meters.", &wide),
            Ok(CommandIntent::Takeoff { altitude_meters: 150 })
        );
    }

    #[test]
    fn takeoff_without_number_falls_through() {
        assert_eq!(extract("Taking off to ten meters."), CommandIntent::None);
        assert_eq!(
            extract("Taking off to cruise height, then returning to launch."),
            CommandIntent::Rtl
        );
    }

    #[test]
    fn negative_altitude_never_matches() {
        assert_eq!(extract("Taking off to -5 meters."), CommandIntent::None);
    }

    #[test]
    fn out_of_range_altitude_is_rejected() {
        let policy = ExtractPolicy { max_takeoff_alt_m: 100 };
        assert!(matches!(
            try_extract("Taking off to 150 meters.", &policy),
            Err(ValidationError::Altitude { .. })
        ));
        assert!(matches!(
            try_extract("Taking off to 0 meters.", &policy),
            Err(ValidationError::Altitude { .. })
        ));
        assert!(matches!(
            try_extract("Taking off to 99999999999 meters.", &policy),
            Err(ValidationError::Altitude { .. })
        ));
        assert_eq!(
            try_extract("Taking off to 100 meters.", &policy),
            Ok(CommandIntent::Takeoff { altitude_meters: 100 })
        );
        // The infallible form resolves to inaction.
        assert_eq!(extract("Taking off to 5000 meters."), CommandIntent::None);
    }

    #[test]
    fn rejected_altitude_does_not_fall_through_to_land() {
        let policy = ExtractPolicy::default();
        assert!(try_extract("Taking off to 900 meters, then landing the drone.", &policy).is_err());
    }

    #[test]
    fn precedence_is_fixed() {
        assert_eq!(
            extract("Arming the drone now. After that, landing the drone."),
            CommandIntent::Arm
        );
        assert_eq!(
            extract("Disarming the drone, then taking off to 10 meters."),
            CommandIntent::Disarm
        );
        assert_eq!(
            extract("Taking off to 12 meters and later landing the drone."),
            CommandIntent::Takeoff { altitude_meters: 12 }
        );
        assert_eq!(
            extract("Returning to launch, then landing the drone."),
            CommandIntent::Land
        );
    }

    #[test]
    fn repeated_extraction_is_stable() {
        let text = "Taking off to 15 meters.";
        assert_eq!(extract(text), extract(text));
    }
}
