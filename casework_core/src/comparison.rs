//! Oracle comparator: diffs a workflow decision against the oracle's result.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::oracle::OracleOutput;
use crate::state_machine::DeterminationResult;

/// Benefit deltas above this are high severity; at or below, medium.
pub const HIGH_SEVERITY_BENEFIT_DELTA: i64 = 50;

/// Mismatch severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What disagreed, with both sides' values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Mismatch {
    Eligibility {
        runner: DeterminationResult,
        oracle: DeterminationResult,
    },
    BenefitAmount {
        runner: i64,
        oracle: i64,
        delta: i64,
    },
    Citation {
        runner: Vec<String>,
        oracle: Vec<String>,
        missing: Vec<String>,
    },
}

impl Mismatch {
    pub fn severity(&self) -> Severity {
        match self {
            Mismatch::Eligibility { .. } => Severity::Critical,
            Mismatch::BenefitAmount { delta, .. } if *delta > HIGH_SEVERITY_BENEFIT_DELTA => {
                Severity::High
            }
            Mismatch::BenefitAmount { .. } => Severity::Medium,
            Mismatch::Citation { .. } => Severity::Low,
        }
    }

    fn detail(&self) -> String {
        match self {
            Mismatch::Eligibility { runner, oracle } => format!(
                "Runner decided \"{}\" but oracle determined \"{}\"",
                decision_str(*runner),
                decision_str(*oracle)
            ),
            Mismatch::BenefitAmount {
                runner,
                oracle,
                delta,
            } => format!(
                "Benefit amount differs by ${} (runner: ${}, oracle: ${})",
                delta, runner, oracle
            ),
            Mismatch::Citation { missing, .. } => {
                format!("Missing citations: {}", missing.join(", "))
            }
        }
    }
}

fn decision_str(decision: DeterminationResult) -> &'static str {
    match decision {
        DeterminationResult::Approved => "approved",
        DeterminationResult::Denied => "denied",
    }
}

/// One discrepancy. Severity and detail are derived from the kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MismatchRecord {
    #[serde(flatten)]
    pub kind: Mismatch,
    pub severity: Severity,
    pub detail: String,
}

impl MismatchRecord {
    pub fn new(kind: Mismatch) -> Self {
        Self {
            severity: kind.severity(),
            detail: kind.detail(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleComparison {
    pub eligibility_match: bool,
    pub benefit_match: bool,
    pub benefit_delta: i64,
    pub citations_covered: bool,
    pub missing_citations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub comparison: OracleComparison,
    pub mismatches: Vec<MismatchRecord>,
}

/// Compares a runner's decision, benefit and citations with the oracle.
///
/// Each check is independent; failures are appended in the order
/// eligibility, benefit, citation. Extra runner citations are ignored.
pub fn compare_with_oracle(
    runner_decision: DeterminationResult,
    runner_benefit_amount: i64,
    runner_citations: &[String],
    oracle: &OracleOutput,
) -> ComparisonResult {
    let mut mismatches = Vec::new();

    let oracle_decision = if oracle.eligible() {
        DeterminationResult::Approved
    } else {
        DeterminationResult::Denied
    };
    let eligibility_match = runner_decision == oracle_decision;
    if !eligibility_match {
        mismatches.push(MismatchRecord::new(Mismatch::Eligibility {
            runner: runner_decision,
            oracle: oracle_decision,
        }));
    }

    let oracle_benefit = oracle.benefit_amount();
    let benefit_delta = (runner_benefit_amount - oracle_benefit).abs();
    let benefit_match = benefit_delta == 0;
    if !benefit_match {
        mismatches.push(MismatchRecord::new(Mismatch::BenefitAmount {
            runner: runner_benefit_amount,
            oracle: oracle_benefit,
            delta: benefit_delta,
        }));
    }

    let runner_set: BTreeSet<&str> = runner_citations.iter().map(String::as_str).collect();
    let missing_citations: Vec<String> = oracle
        .cited_rules
        .iter()
        .filter(|rule| !runner_set.contains(rule.as_str()))
        .cloned()
        .collect();
    let citations_covered = missing_citations.is_empty();
    if !citations_covered {
        mismatches.push(MismatchRecord::new(Mismatch::Citation {
            runner: runner_citations.to_vec(),
            oracle: oracle.cited_rules.clone(),
            missing: missing_citations.clone(),
        }));
    }

    ComparisonResult {
        comparison: OracleComparison {
            eligibility_match,
            benefit_match,
            benefit_delta,
            citations_covered,
            missing_citations,
        },
        mismatches,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{Determination, FailedTest};

    fn oracle(determination: Determination, cited: &[&str]) -> OracleOutput {
        OracleOutput {
            determination,
            gross_income: 0.0,
            net_income: 0.0,
            deductions: None,
            calculation_steps: Vec::new(),
            cited_rules: cited.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn eligible(benefit_amount: i64) -> OracleOutput {
        oracle(
            Determination::Eligible {
                benefit_amount,
                expedited_eligible: false,
            },
            &["ELIG-GROSS-001"],
        )
    }

    fn citations(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_full_agreement_has_no_mismatches() {
        let result = compare_with_oracle(
            DeterminationResult::Approved,
            298,
            &citations(&["ELIG-GROSS-001", "CFR-273"]),
            &eligible(298),
        );
        assert!(result.mismatches.is_empty());
        assert!(result.comparison.eligibility_match);
        assert!(result.comparison.benefit_match);
        assert!(result.comparison.citations_covered);
    }

    #[test]
    fn test_benefit_delta_severity_boundary() {
        let cites = citations(&["ELIG-GROSS-001"]);

        let result = compare_with_oracle(DeterminationResult::Approved, 248, &cites, &eligible(298));
        assert_eq!(result.comparison.benefit_delta, 50);
        assert_eq!(result.mismatches[0].severity, Severity::Medium);

        let result = compare_with_oracle(DeterminationResult::Approved, 247, &cites, &eligible(298));
        assert_eq!(result.comparison.benefit_delta, 51);
        assert_eq!(result.mismatches[0].severity, Severity::High);
        assert_eq!(
            result.mismatches[0].detail,
            "Benefit amount differs by $51 (runner: $247, oracle: $298)"
        );
    }

    #[test]
    fn test_eligibility_mismatch_is_critical() {
        let denied = oracle(
            Determination::Ineligible {
                reason: "Resources ($3500) exceed limit ($3000)".to_string(),
                failed_tests: vec![FailedTest {
                    test_name: "Resource Test".to_string(),
                    rule_id: "ELIG-RES-001".to_string(),
                    reason: String::new(),
                    actual: 3500.0,
                    limit: 3000.0,
                }],
            },
            &[],
        );
        let result = compare_with_oracle(DeterminationResult::Approved, 0, &[], &denied);
        assert_eq!(result.mismatches.len(), 1);
        assert_eq!(result.mismatches[0].severity, Severity::Critical);
        assert_eq!(
            result.mismatches[0].detail,
            "Runner decided \"approved\" but oracle determined \"denied\""
        );
    }

    #[test]
    fn test_mismatches_co_occur_in_order() {
        let out = oracle(
            Determination::Eligible {
                benefit_amount: 200,
                expedited_eligible: false,
            },
            &["ELIG-GROSS-001", "BEN-CALC-001", "SUA-001"],
        );
        let result = compare_with_oracle(
            DeterminationResult::Denied,
            0,
            &citations(&["ELIG-GROSS-001", "CFR-273"]),
            &out,
        );

        let kinds: Vec<Severity> = result.mismatches.iter().map(|m| m.severity).collect();
        assert_eq!(kinds, vec![Severity::Critical, Severity::High, Severity::Low]);
        assert_eq!(
            result.comparison.missing_citations,
            vec!["BEN-CALC-001".to_string(), "SUA-001".to_string()]
        );
        assert_eq!(result.mismatches[2].detail, "Missing citations: BEN-CALC-001, SUA-001");
    }

    #[test]
    fn test_record_serializes_flat() {
        let record = MismatchRecord::new(Mismatch::BenefitAmount {
            runner: 0,
            oracle: 120,
            delta: 120,
        });
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "benefit_amount");
        assert_eq!(json["severity"], "high");
        assert_eq!(json["delta"], 120);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }
}
