//! Translation of the throttle-reason bitmask into operator-facing findings.

/// Hardware power brake asserted
pub const REASON_HW_POWER_BRAKE: u64 = 0x0080;
/// Hardware thermal slowdown
pub const REASON_HW_THERMAL: u64 = 0x0040;
/// Driver (software) thermal slowdown
pub const REASON_SW_THERMAL: u64 = 0x0020;
/// Generic hardware slowdown
pub const REASON_HW_SLOWDOWN: u64 = 0x0008;
/// Software power cap
pub const REASON_SW_POWER_CAP: u64 = 0x0004;

/// Bits that mark a sample as throttled in the history graph.
/// `REASON_SW_POWER_CAP` is left out: a capped GPU is reported but not
/// counted as throttled.
pub const THROTTLED_MASK: u64 =
    REASON_HW_POWER_BRAKE | REASON_HW_THERMAL | REASON_SW_THERMAL | REASON_HW_SLOWDOWN;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Ok,
    Warning,
    Critical,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Finding {
    Ok,
    PowerLimit,
    Overheating,
    Hot,
    Capped,
    Throttled,
}

/// Problem findings in report order
const CHECKS: [Finding; 5] = [
    Finding::PowerLimit,
    Finding::Overheating,
    Finding::Hot,
    Finding::Capped,
    Finding::Throttled,
];

impl Finding {
    pub fn label(self) -> &'static str {
        match self {
            Finding::Ok => "OK",
            Finding::PowerLimit => "POWER LIMIT",
            Finding::Overheating => "OVERHEATING",
            Finding::Hot => "HOT",
            Finding::Capped => "CAPPED",
            Finding::Throttled => "THROTTLED",
        }
    }

    pub fn detail(self) -> &'static str {
        match self {
            Finding::Ok => "no throttling",
            Finding::PowerLimit => "GPU wants more power but is limited by power delivery",
            Finding::Overheating => "Hardware thermal protection activated",
            Finding::Hot => "Driver thermal throttling",
            Finding::Capped => "Software power limit reached",
            Finding::Throttled => "General hardware slowdown",
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            Finding::Ok => Severity::Ok,
            Finding::PowerLimit | Finding::Overheating => Severity::Critical,
            Finding::Hot | Finding::Capped | Finding::Throttled => Severity::Warning,
        }
    }

    /// The reason bit this finding decodes, `None` for the all-clear
    pub fn bit(self) -> Option<u64> {
        match self {
            Finding::Ok => None,
            Finding::PowerLimit => Some(REASON_HW_POWER_BRAKE),
            Finding::Overheating => Some(REASON_HW_THERMAL),
            Finding::Hot => Some(REASON_SW_THERMAL),
            Finding::Capped => Some(REASON_SW_POWER_CAP),
            Finding::Throttled => Some(REASON_HW_SLOWDOWN),
        }
    }

    /// `"LABEL: detail"`
    pub fn text(self) -> String {
        format!("{}: {}", self.label(), self.detail())
    }
}

/// Decodes every set reason bit, in report order. All matching findings are
/// returned; an empty mask (or one with only unrecognised bits) yields
/// exactly `[Finding::Ok]`.
pub fn diagnose(mask: u64) -> Vec<Finding> {
    let found: Vec<Finding> = CHECKS
        .iter()
        .copied()
        .filter(|f| f.bit().is_some_and(|bit| mask & bit != 0))
        .collect();

    if found.is_empty() {
        vec![Finding::Ok]
    } else {
        found
    }
}

/// Worst severity across a diagnosis
pub fn worst_severity(findings: &[Finding]) -> Severity {
    findings
        .iter()
        .map(|f| f.severity())
        .max()
        .unwrap_or(Severity::Ok)
}

/// Full diagnosis text, entries joined by `" | "`
pub fn describe(mask: u64) -> String {
    diagnose(mask)
        .into_iter()
        .map(Finding::text)
        .collect::<Vec<_>>()
        .join(" | ")
}

pub fn is_throttled(mask: u64) -> bool {
    mask & THROTTLED_MASK != 0
}

/// Single abbreviated code for the compact layout. First match wins in the
/// order PWR > THM > HOT > CAP; hardware slowdown has no code.
pub fn compact_code(mask: u64) -> Option<(&'static str, Severity)> {
    if mask & REASON_HW_POWER_BRAKE != 0 {
        Some(("PWR", Severity::Critical))
    } else if mask & REASON_HW_THERMAL != 0 {
        Some(("THM", Severity::Critical))
    } else if mask & REASON_SW_THERMAL != 0 {
        Some(("HOT", Severity::Warning))
    } else if mask & REASON_SW_POWER_CAP != 0 {
        Some(("CAP", Severity::Warning))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_mask_is_ok() {
        assert_eq!(diagnose(0), vec![Finding::Ok]);
        assert_eq!(describe(0), "OK: no throttling");
        assert!(!is_throttled(0));
        assert_eq!(worst_severity(&diagnose(0)), Severity::Ok);
    }

    #[test]
    fn test_multiple_bits_in_report_order() {
        let findings = diagnose(0x00A8);
        let labels: Vec<&str> = findings.iter().map(|f| f.label()).collect();
        assert_eq!(labels, vec!["POWER LIMIT", "HOT", "THROTTLED"]);
        assert!(is_throttled(0x00A8));
        assert_eq!(worst_severity(&findings), Severity::Critical);
    }

    #[test]
    fn test_capped_alone_is_not_throttled() {
        assert_eq!(diagnose(0x0004), vec![Finding::Capped]);
        assert!(!is_throttled(0x0004));
        assert_eq!(worst_severity(&diagnose(0x0004)), Severity::Warning);
    }

    #[test]
    fn test_findings_match_set_bits() {
        for mask in 0u64..=0x01FF {
            let findings = diagnose(mask);
            if mask & 0x00EC == 0 {
                assert_eq!(findings, vec![Finding::Ok], "mask {mask:#x}");
                continue;
            }
            for f in &findings {
                let bit = f.bit().unwrap();
                assert_ne!(mask & bit, 0, "mask {mask:#x} reported {f:?}");
            }
            for check in &CHECKS {
                let bit = check.bit().unwrap();
                if mask & bit != 0 {
                    assert!(findings.contains(check), "mask {mask:#x} missed {check:?}");
                }
            }
            let positions: Vec<usize> = findings
                .iter()
                .map(|f| CHECKS.iter().position(|c| c == f).unwrap())
                .collect();
            assert!(positions.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_is_throttled_matches_mask() {
        for mask in 0u64..=0x00FF {
            assert_eq!(is_throttled(mask), mask & 0x00E8 != 0, "mask {mask:#x}");
        }
    }

    #[test]
    fn test_unknown_bits_ignored() {
        assert_eq!(diagnose(0x0001 | 0x0100), vec![Finding::Ok]);
    }

    #[test]
    fn test_describe_joins_entries() {
        assert_eq!(
            describe(0x00C0),
            "POWER LIMIT: GPU wants more power but is limited by power delivery | \
             OVERHEATING: Hardware thermal protection activated"
        );
    }

    #[test]
    fn test_compact_code_first_match_wins() {
        assert_eq!(compact_code(0x00E4), Some(("PWR", Severity::Critical)));
        assert_eq!(compact_code(0x0064), Some(("THM", Severity::Critical)));
        assert_eq!(compact_code(0x0024), Some(("HOT", Severity::Warning)));
        assert_eq!(compact_code(0x0004), Some(("CAP", Severity::Warning)));
        assert_eq!(compact_code(0x0008), None);
        assert_eq!(compact_code(0), None);
    }
}
