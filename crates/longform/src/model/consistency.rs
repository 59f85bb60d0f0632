//! Structured output of the consistency checker.

use serde::{Deserialize, Serialize};

/// Ordered: `None < Minor < Contradiction`.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    None,
    Minor,
    Contradiction,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Minor => "minor",
            Self::Contradiction => "contradiction",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    Contradiction,
    Duplication,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Finding {
    pub kind: FindingKind,
    pub detail: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConsistencyReport {
    pub severity: Severity,
    #[serde(default)]
    pub findings: Vec<Finding>,
}

impl ConsistencyReport {
    pub fn is_clean(&self) -> bool {
        self.severity == Severity::None && self.findings.is_empty()
    }

    /// One human-readable block, stored in the section's `consistency` column.
    pub fn to_notes(&self) -> String {
        let mut out = format!("severity: {}", self.severity.as_str());
        for finding in &self.findings {
            let kind = match finding.kind {
                FindingKind::Contradiction => "contradiction",
                FindingKind::Duplication => "duplication",
                FindingKind::Other => "other",
            };
            out.push_str(&format!("\n- {}: {}", kind, finding.detail));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Contradiction > Severity::Minor);
        assert!(Severity::Minor > Severity::None);
    }

    #[test]
    fn test_report_parses_unknown_finding_kind() {
        let report: ConsistencyReport = serde_json::from_str(
            r#"{"severity":"minor","findings":[{"kind":"tone","detail":"shifts to second person"}]}"#,
        )
        .unwrap();
        assert_eq!(report.severity, Severity::Minor);
        assert_eq!(report.findings[0].kind, FindingKind::Other);
    }

    #[test]
    fn test_notes_rendering() {
        let report = ConsistencyReport {
            severity: Severity::Contradiction,
            findings: vec![Finding {
                kind: FindingKind::Contradiction,
                detail: "says 1998, section 1 says 2001".to_string(),
            }],
        };
        assert_eq!(
            report.to_notes(),
            "severity: contradiction\n- contradiction: says 1998, section 1 says 2001"
        );
        assert!(ConsistencyReport::default().is_clean());
    }
}
