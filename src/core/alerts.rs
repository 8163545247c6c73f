//! Load-cap alerts.

use serde::Serialize;

use crate::core::balance::{DemotionOrder, Limits};
use crate::core::classify::Loads;

/// A cap that is currently exceeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleAlert {
    /// Too many first-time plus repeat subjects.
    RegularOverCap {
        load: usize,
        cap: usize,
        rule: &'static str,
    },
    /// Too many intensification subjects. Never auto-corrected.
    IntensificationOverCap { load: usize, cap: usize },
}

impl RuleAlert {
    /// Human-readable message.
    pub fn message(&self) -> String {
        match self {
            Self::RegularOverCap { load, cap, rule } => format!(
                "Regular load over the cap: {load}/{cap}. {rule} Run auto-adjust to apply it."
            ),
            Self::IntensificationOverCap { load, cap } => {
                format!("Intensification load over the cap: {load}/{cap}.")
            }
        }
    }
}

/// Alerts for the given loads.
pub fn alerts(
    loads: Loads,
    limits: &Limits,
    order: DemotionOrder,
    student_grade: Option<u8>,
) -> Vec<RuleAlert> {
    let mut out = Vec::new();
    if loads.regular > limits.regular_cap {
        out.push(RuleAlert::RegularOverCap {
            load: loads.regular,
            cap: limits.regular_cap,
            rule: order.describe(student_grade, limits),
        });
    }
    if loads.intensification > limits.intensification_cap {
        out.push(RuleAlert::IntensificationOverCap {
            load: loads.intensification,
            cap: limits.intensification_cap,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_alerts_at_cap() {
        let loads = Loads {
            regular: 12,
            intensification: 4,
        };
        assert!(alerts(loads, &Limits::default(), DemotionOrder::default(), Some(3)).is_empty());
    }

    #[test]
    fn test_both_alerts() {
        let loads = Loads {
            regular: 14,
            intensification: 5,
        };
        let found = alerts(loads, &Limits::default(), DemotionOrder::default(), Some(3));
        assert_eq!(found.len(), 2);
        assert!(found[0].message().contains("14/12"));
        assert!(found[1].message().contains("5/4"));
    }

    #[test]
    fn test_regular_alert_names_terminal_rule() {
        let loads = Loads {
            regular: 13,
            intensification: 0,
        };
        let found = alerts(
            loads,
            &Limits::default(),
            DemotionOrder::RepeatFirstInTerminalGrade,
            Some(6),
        );
        assert!(found[0].message().contains("terminal grade"));
    }

    #[test]
    fn test_alert_serializes_with_kind() {
        let alert = RuleAlert::IntensificationOverCap { load: 6, cap: 4 };
        let value = serde_json::to_value(&alert).unwrap();
        assert_eq!(value["kind"], "intensification_over_cap");
        assert_eq!(value["load"], 6);
    }
}
