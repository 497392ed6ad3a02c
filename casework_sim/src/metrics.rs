//! Run-level QA metrics.

use std::collections::BTreeMap;

use serde::Serialize;

use casework_core::comparison::Severity;
use casework_core::CaseAction;

use crate::runner::RunResult;
use crate::scenarios::{AppealVariant, Outcome, ScenarioId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    pub approved: usize,
    pub denied: usize,
    pub abandoned: usize,
}

impl OutcomeCounts {
    pub fn total(&self) -> usize {
        self.approved + self.denied + self.abandoned
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SlaCompliance {
    pub on_time: usize,
    pub breached: usize,
    pub breach_rate: f64,
}

/// How often the workflow agreed with the oracle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OracleMetrics {
    pub cases_evaluated: usize,
    pub eligibility_match_rate: f64,
    pub benefit_exact_match_rate: f64,
    pub average_benefit_delta: f64,
    pub mismatch_count: usize,
    pub mismatches_by_severity: BTreeMap<Severity, usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AppealMetrics {
    pub cases_appealed: usize,
    pub favorable_rate: f64,
    pub unfavorable_rate: f64,
    pub remand_rate: f64,
    pub average_time_to_decision: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryError {
    /// `case-<index>`
    pub case_id: String,
    pub error: String,
}

/// Aggregate view of a [`RunResult`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    /// Completed cases (abandoned-by-error cases are listed under `errors`)
    pub total_cases: usize,
    pub by_variant: BTreeMap<String, usize>,
    pub by_outcome: OutcomeCounts,
    pub sla_compliance: SlaCompliance,
    pub average_time_to_decision: f64,

    /// Share of non-abandoned cases that sent a notice
    pub notice_completeness: f64,

    /// Share of events citing at least one policy id
    pub citation_coverage: f64,

    pub errors: Vec<SummaryError>,
    pub oracle_metrics: OracleMetrics,

    /// Present only when the run contains appeal cases
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appeal_metrics: Option<AppealMetrics>,
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

fn mean(sum: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Summarizes a run.
pub fn compute_run_summary(result: &RunResult) -> RunSummary {
    let cases = &result.case_results;

    let mut by_variant: BTreeMap<String, usize> = BTreeMap::new();
    let mut by_outcome = OutcomeCounts::default();
    let mut breached = 0;
    let mut decision_days = 0i64;
    let mut decided = 0;
    let mut total_events = 0;
    let mut cited_events = 0;
    let mut notices_due = 0;
    let mut notices_sent = 0;

    for case in cases {
        *by_variant.entry(case.variant.clone()).or_default() += 1;
        match case.outcome {
            Outcome::Approved => by_outcome.approved += 1,
            Outcome::Denied => by_outcome.denied += 1,
            Outcome::Abandoned => by_outcome.abandoned += 1,
        }
        if !case.sla_breaches.is_empty() {
            breached += 1;
        }
        if let Some(days) = case.time_to_decision_days {
            decision_days += days;
            decided += 1;
        }
        total_events += case.events.len();
        cited_events += case.events.iter().filter(|e| !e.citations.is_empty()).count();

        if case.outcome != Outcome::Abandoned {
            notices_due += 1;
            if case.events.iter().any(|e| e.action == CaseAction::SendNotice) {
                notices_sent += 1;
            }
        }
    }

    let total_cases = cases.len();

    RunSummary {
        total_cases,
        by_variant,
        by_outcome,
        sla_compliance: SlaCompliance {
            on_time: total_cases - breached,
            breached,
            breach_rate: ratio(breached, total_cases),
        },
        average_time_to_decision: mean(decision_days as f64, decided),
        notice_completeness: ratio(notices_sent, notices_due),
        citation_coverage: ratio(cited_events, total_events),
        errors: result
            .errors
            .iter()
            .map(|e| SummaryError {
                case_id: format!("case-{}", e.case_index),
                error: e.message.clone(),
            })
            .collect(),
        oracle_metrics: oracle_metrics(result),
        appeal_metrics: appeal_metrics(result),
    }
}

fn oracle_metrics(result: &RunResult) -> OracleMetrics {
    let mut evaluated = 0;
    let mut eligibility_matches = 0;
    let mut benefit_matches = 0;
    let mut delta_sum = 0i64;
    let mut mismatch_count = 0;
    let mut by_severity: BTreeMap<Severity, usize> = BTreeMap::new();

    for review in result.case_results.iter().filter_map(|c| c.oracle_review.as_ref()) {
        evaluated += 1;
        if review.comparison.eligibility_match {
            eligibility_matches += 1;
        }
        if review.comparison.benefit_match {
            benefit_matches += 1;
        }
        delta_sum += review.comparison.benefit_delta.abs();
        mismatch_count += review.mismatches.len();
        for mismatch in &review.mismatches {
            *by_severity.entry(mismatch.severity).or_default() += 1;
        }
    }

    OracleMetrics {
        cases_evaluated: evaluated,
        eligibility_match_rate: ratio(eligibility_matches, evaluated),
        benefit_exact_match_rate: ratio(benefit_matches, evaluated),
        average_benefit_delta: mean(delta_sum as f64, evaluated),
        mismatch_count,
        mismatches_by_severity: by_severity,
    }
}

fn appeal_metrics(result: &RunResult) -> Option<AppealMetrics> {
    let appeal_variants = ScenarioId::AppealReversal.variant_names();
    let appealed: Vec<_> = result
        .case_results
        .iter()
        .filter(|c| appeal_variants.contains(&c.variant.as_str()))
        .collect();
    if appealed.is_empty() {
        return None;
    }

    let count_of = |variant: AppealVariant| {
        appealed.iter().filter(|c| c.variant == variant.name()).count()
    };
    let decided: Vec<i64> = appealed.iter().filter_map(|c| c.time_to_decision_days).collect();
    let total = appealed.len();

    Some(AppealMetrics {
        cases_appealed: total,
        favorable_rate: ratio(count_of(AppealVariant::FavorableReversal), total),
        unfavorable_rate: ratio(count_of(AppealVariant::UnfavorableUpheld), total),
        remand_rate: ratio(count_of(AppealVariant::RemandReopened), total),
        average_time_to_decision: mean(decided.iter().sum::<i64>() as f64, decided.len()),
    })
}
