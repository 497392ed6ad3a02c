//! Scenario runner - replays scripted timelines through the state machine.
//!
//! Each synthetic case is driven step by step through `transition`. A rejected
//! step abandons that case and is recorded as a [`CaseError`]; the batch keeps
//! going. Completed cases are reviewed against the eligibility oracle.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use casework_core::comparison::{compare_with_oracle, MismatchRecord, OracleComparison};
use casework_core::oracle::{compute_eligibility, OracleInput, OracleOutput};
use casework_core::policy_pack::SlaRule;
use casework_core::state_machine::{
    transition, Actor, CaseAction, CaseData, CaseStatus, DeterminationResult, GuardResult, Role,
    TransitionContext,
};
use casework_core::types::{days_between, simulation_epoch};
use casework_core::{
    validate_citations, CaseId, EventId, PolicyPack, PolicyPackError, RunId, SlaTable, Timestamp,
};

use crate::config::RunConfig;
use crate::generator::{generate, SyntheticCase};
use crate::scenarios::{CaseProfile, Outcome, ScenarioId};
use crate::script::script_for;

/// Benefit the workflow reports to the comparator. The scripted workflow does
/// no benefit math, so every oracle-eligible case is flagged for review.
pub const RUNNER_BENEFIT_AMOUNT: i64 = 0;

const SEED_MIX: u64 = 0x9e3779b97f4a7c15;

fn derive_seed(base: u64, salt: u64) -> u64 {
    base ^ salt.wrapping_add(1).wrapping_mul(SEED_MIX)
}

/// One successful transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseEvent {
    pub event_id: EventId,

    /// Position in the case's event trail, from 0
    pub sequence: u32,

    pub action: CaseAction,
    pub agent_id: String,
    pub role: Role,
    pub from_state: CaseStatus,
    pub to_state: CaseStatus,
    pub timestamp: Timestamp,

    /// Policy ids cited by the action (never empty)
    pub citations: Vec<String>,

    pub guard_results: Vec<GuardResult>,
}

/// An SLA window exceeded somewhere in the event trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlaBreach {
    pub sla_id: String,
    pub elapsed_days: i64,
    pub limit_days: i64,
}

/// Oracle check of a completed case.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OracleReview {
    pub output: OracleOutput,
    pub comparison: OracleComparison,
    pub mismatches: Vec<MismatchRecord>,
}

/// Replay record of one case.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseResult {
    pub case_id: CaseId,
    pub case_index: usize,
    pub variant: String,
    pub applicant_name: String,
    pub final_state: CaseStatus,
    pub outcome: Outcome,
    pub events: Vec<CaseEvent>,
    pub sla_breaches: Vec<SlaBreach>,

    /// Whole days from filing to the last decision-setting action
    pub time_to_decision_days: Option<i64>,

    /// Absent for abandoned cases
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oracle_review: Option<OracleReview>,
}

/// A case abandoned mid-script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("case {case_index} ({variant}): {message}")]
pub struct CaseError {
    pub case_index: usize,
    pub variant: String,
    pub message: String,
}

impl CaseError {
    fn new(case: &SyntheticCase, message: String) -> Self {
        Self {
            case_index: case.case_index,
            variant: case.profile.variant_name().to_string(),
            message,
        }
    }
}

/// Results from one batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunResult {
    pub run_id: RunId,
    pub scenario: ScenarioId,
    pub seed: u64,
    pub policy_pack_id: String,
    pub total_cases: usize,

    /// Completed cases, ordered by case index
    pub case_results: Vec<CaseResult>,

    /// Abandoned cases, ordered by case index
    pub errors: Vec<CaseError>,
}

impl RunResult {
    pub fn passed(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Runs scenario batches against one policy pack.
#[derive(Debug, Clone)]
pub struct ScenarioRunner {
    /// Policy pack shared read-only by every worker
    pack: Arc<PolicyPack>,

    /// Configuration seed
    seed: u64,

    /// Cases per batch
    count: usize,

    /// Worker threads (1 = sequential)
    workers: usize,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(pack: Arc<PolicyPack>, seed: u64) -> Self {
        let defaults = RunConfig::default();
        Self {
            pack,
            seed,
            count: defaults.count,
            workers: defaults.workers,
        }
    }

    /// Builds a runner from a config, loading its policy pack.
    pub fn from_config(config: &RunConfig) -> Result<Self, PolicyPackError> {
        let pack = Arc::new(config.load_pack()?);
        Ok(Self::new(pack, config.seed)
            .with_count(config.count)
            .with_workers(config.workers))
    }

    /// Sets the number of cases per batch.
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    /// Sets the worker count.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn pack(&self) -> &PolicyPack {
        &self.pack
    }

    /// Generates and replays a batch.
    pub fn run(&self, scenario: ScenarioId) -> RunResult {
        info!(
            "Starting scenario: {} (seed={}, cases={}, workers={})",
            scenario.name(),
            self.seed,
            self.count,
            self.workers
        );

        let run_seed = derive_seed(self.seed, scenario as u64);
        let cases = generate(scenario, self.count, self.seed);

        let mut outcomes = if self.workers > 1 && cases.len() > 1 {
            self.run_parallel(run_seed, &cases)
        } else {
            cases.iter().map(|case| self.run_case(run_seed, case)).collect()
        };
        outcomes.sort_by_key(|outcome| match outcome {
            Ok(result) => result.case_index,
            Err(err) => err.case_index,
        });

        let mut case_results = Vec::with_capacity(cases.len());
        let mut errors = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(result) => case_results.push(result),
                Err(err) => errors.push(err),
            }
        }

        if errors.is_empty() {
            info!("{}: {} cases completed", scenario.name(), case_results.len());
        } else {
            warn!(
                "{}: {} completed, {} abandoned",
                scenario.name(),
                case_results.len(),
                errors.len()
            );
        }

        RunResult {
            run_id: RunId::from_seed(run_seed),
            scenario,
            seed: self.seed,
            policy_pack_id: self.pack.id().to_string(),
            total_cases: cases.len(),
            case_results,
            errors,
        }
    }

    /// Spreads cases over a crossbeam worker pool.
    fn run_parallel(
        &self,
        run_seed: u64,
        cases: &[SyntheticCase],
    ) -> Vec<Result<CaseResult, CaseError>> {
        let (job_tx, job_rx) = crossbeam::channel::unbounded::<&SyntheticCase>();
        let (result_tx, result_rx) = crossbeam::channel::unbounded();

        for case in cases {
            if job_tx.send(case).is_err() {
                break;
            }
        }
        drop(job_tx);

        let pool = crossbeam::scope(|scope| {
            for worker in 0..self.workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move |_| {
                    let mut handled = 0usize;
                    for case in job_rx.iter() {
                        if result_tx.send(self.run_case(run_seed, case)).is_err() {
                            break;
                        }
                        handled += 1;
                    }
                    debug!(worker, handled, "worker finished");
                });
            }
        });
        drop(result_tx);

        let mut results: Vec<Result<CaseResult, CaseError>> = result_rx.iter().collect();

        if pool.is_err() {
            error!("A worker thread panicked; unfinished cases are recorded as errors");
            let mut done = vec![false; cases.len()];
            for result in &results {
                let index = match result {
                    Ok(r) => r.case_index,
                    Err(e) => e.case_index,
                };
                done[index] = true;
            }
            for case in cases.iter().filter(|c| !done[c.case_index]) {
                results.push(Err(CaseError::new(case, "worker thread panicked".to_string())));
            }
        }

        results
    }

    /// Replays one case's script, then reviews it against the oracle.
    pub fn run_case(&self, run_seed: u64, case: &SyntheticCase) -> Result<CaseResult, CaseError> {
        let case_seed = derive_seed(run_seed, case.case_index as u64);
        let case_id = CaseId::from_seed(case_seed);
        let filed_at = simulation_epoch();

        let mut data = CaseData::new(
            case.applicant_name.clone(),
            case.household_size,
            filed_at,
            &case.required_verifications,
        );
        data.mark_missing(&case.missing_items);
        if let CaseProfile::AppealReversal {
            denial_reason,
            appeal_reason,
            ..
        } = &case.profile
        {
            data.original_denial_reason = Some(denial_reason.clone());
            data.appeal_reason = Some(appeal_reason.clone());
        }

        let mut state = CaseStatus::Received;
        let mut events: Vec<CaseEvent> = Vec::new();
        let mut decided_at: Option<Timestamp> = None;

        for step in script_for(&case.profile) {
            let at = step.timestamp();
            if let Some(pre) = step.pre {
                pre.apply(&mut data, at);
            }
            if step.action == CaseAction::RequestVerification {
                data.verification_requested_at = Some(at);
            }

            let validation = validate_citations(step.action.citations(), self.pack.rule_index());
            if !validation.valid {
                let message = format!(
                    "{} on day {}: {}",
                    step.action,
                    step.day_offset,
                    validation.error.unwrap_or_default()
                );
                warn!(case = case.case_index, "{}", message);
                return Err(CaseError::new(case, message));
            }

            let ctx = TransitionContext {
                case_id,
                current_state: state,
                actor: Actor::new(step.role, step.agent_id),
                timestamp: at,
                case_data: data.clone(),
                policy: self.pack.facts(),
            };

            let applied = transition(state, step.action, &ctx).map_err(|e| {
                let message = format!("{} on day {}: {}", step.action, step.day_offset, e);
                warn!(case = case.case_index, kind = e.kind(), "{}", message);
                CaseError::new(case, message)
            })?;

            let sequence = events.len() as u32;
            events.push(CaseEvent {
                event_id: EventId::from_seed(derive_seed(case_seed.rotate_left(17), u64::from(sequence))),
                sequence,
                action: step.action,
                agent_id: step.agent_id.to_string(),
                role: step.role,
                from_state: state,
                to_state: applied.new_state,
                timestamp: at,
                citations: step.action.citations().iter().map(|c| c.to_string()).collect(),
                guard_results: applied.guard_results,
            });

            if sets_decision(step.action) {
                decided_at = Some(at);
            }
            state = applied.new_state;
        }

        let outcome = case.profile.outcome();
        let oracle_review = outcome
            .decision()
            .map(|decision| self.review(decision, &case.oracle_input, &events));

        debug!(
            case = case.case_index,
            variant = case.profile.variant_name(),
            final_state = %state,
            events = events.len(),
            "case replayed"
        );

        Ok(CaseResult {
            case_id,
            case_index: case.case_index,
            variant: case.profile.variant_name().to_string(),
            applicant_name: case.applicant_name.clone(),
            final_state: state,
            outcome,
            sla_breaches: sla_breaches(&events, filed_at, &self.pack.sla),
            time_to_decision_days: decided_at.map(|t| days_between(filed_at, t)),
            events,
            oracle_review,
        })
    }

    fn review(
        &self,
        decision: DeterminationResult,
        input: &OracleInput,
        events: &[CaseEvent],
    ) -> OracleReview {
        let output = compute_eligibility(input, &self.pack.rules);

        let mut cited: Vec<String> = Vec::new();
        for citation in events.iter().flat_map(|e| &e.citations) {
            if !cited.contains(citation) {
                cited.push(citation.clone());
            }
        }

        let result = compare_with_oracle(decision, RUNNER_BENEFIT_AMOUNT, &cited, &output);
        OracleReview {
            output,
            comparison: result.comparison,
            mismatches: result.mismatches,
        }
    }
}

/// Actions that set (or reset) the case decision.
fn sets_decision(action: CaseAction) -> bool {
    matches!(
        action,
        CaseAction::Approve
            | CaseAction::Deny
            | CaseAction::VerificationRefused
            | CaseAction::CloseAbandoned
            | CaseAction::ImplementFavorable
            | CaseAction::ImplementUnfavorable
    )
}

/// Actions that count as the first determination for processing timeliness.
fn is_determination(action: CaseAction) -> bool {
    matches!(
        action,
        CaseAction::Approve
            | CaseAction::Deny
            | CaseAction::VerificationRefused
            | CaseAction::CloseAbandoned
    )
}

/// Derives SLA breaches from an event trail.
pub fn sla_breaches(events: &[CaseEvent], filed_at: Timestamp, sla: &SlaTable) -> Vec<SlaBreach> {
    let mut breaches = Vec::new();
    let first = |action: CaseAction| events.iter().find(|e| e.action == action).map(|e| e.timestamp);

    let mut check = |from: Timestamp, to: Timestamp, rule: &SlaRule| {
        let elapsed = days_between(from, to);
        if elapsed > rule.calendar_days {
            breaches.push(SlaBreach {
                sla_id: rule.sla_id.clone(),
                elapsed_days: elapsed,
                limit_days: rule.calendar_days,
            });
        }
    };

    if let Some(determined) = events.iter().find(|e| is_determination(e.action)) {
        check(filed_at, determined.timestamp, &sla.processing.standard);
    }
    if let (Some(appealed), Some(decided)) = (first(CaseAction::AppealFiled), first(CaseAction::RenderDecision)) {
        check(appealed, decided, &sla.appeals.decision);
    }
    if let (Some(decided), Some(implemented)) = (
        first(CaseAction::RenderDecision),
        first(CaseAction::ImplementFavorable),
    ) {
        check(decided, implemented, &sla.appeals.implement_favorable);
    }

    breaches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios::{AppealVariant, MissingDocsVariant};
    use casework_core::comparison::Severity;
    use casework_core::types::add_days;

    fn runner(seed: u64, count: usize) -> ScenarioRunner {
        ScenarioRunner::new(Arc::new(PolicyPack::builtin().unwrap()), seed).with_count(count)
    }

    fn first_of<'a>(result: &'a RunResult, variant: &str) -> &'a CaseResult {
        result
            .case_results
            .iter()
            .find(|c| c.variant == variant)
            .unwrap_or_else(|| panic!("no {} case", variant))
    }

    #[test]
    fn test_missing_docs_batch_completes() {
        let result = runner(42, 100).run(ScenarioId::MissingDocs);

        assert_eq!(result.total_cases, 100);
        assert_eq!(result.case_results.len(), 100);
        assert!(result.passed(), "{:?}", result.errors);

        for case in &result.case_results {
            assert_eq!(case.final_state, CaseStatus::Closed);
            assert!(case.events.iter().all(|e| !e.citations.is_empty()));
        }
        assert!(result
            .case_results
            .iter()
            .any(|c| c.sla_breaches.iter().any(|b| b.sla_id == "SLA-PROC-001")));
    }

    #[test]
    fn test_appeal_batch_completes() {
        let result = runner(7, 60).run(ScenarioId::AppealReversal);
        assert!(result.passed(), "{:?}", result.errors);

        let remand = first_of(&result, AppealVariant::RemandReopened.name());
        assert_eq!(remand.events.len(), 13);
        assert_eq!(remand.outcome, Outcome::Approved);
        // Last decision-setting action is the approve on day 44
        assert_eq!(remand.time_to_decision_days, Some(44));

        let favorable = first_of(&result, AppealVariant::FavorableReversal.name());
        assert_eq!(favorable.time_to_decision_days, Some(47));
        assert!(favorable.sla_breaches.is_empty());
    }

    #[test]
    fn test_on_time_case_shape() {
        let result = runner(42, 50).run(ScenarioId::MissingDocs);
        let case = first_of(&result, MissingDocsVariant::DocsArriveOnTime.name());

        assert_eq!(case.events.len(), 7);
        assert_eq!(case.time_to_decision_days, Some(10));
        assert!(case.sla_breaches.is_empty());
        assert_eq!(case.events[0].from_state, CaseStatus::Received);
        assert_eq!(case.events[0].to_state, CaseStatus::PendingVerification);
        let sequences: Vec<u32> = case.events.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, (0..7).collect::<Vec<u32>>());

        let complete = &case.events[2];
        assert_eq!(complete.action, CaseAction::VerificationComplete);
        assert!(complete.guard_results.iter().all(|g| g.passed));
        assert!(case.oracle_review.is_some());
    }

    #[test]
    fn test_abandoned_case_skips_oracle_and_breaches() {
        let result = runner(42, 50).run(ScenarioId::MissingDocs);
        let case = first_of(&result, MissingDocsVariant::DocsNeverArrive.name());

        assert_eq!(case.outcome, Outcome::Abandoned);
        assert!(case.oracle_review.is_none());
        assert_eq!(case.time_to_decision_days, Some(62));
        assert_eq!(
            case.sla_breaches,
            vec![SlaBreach {
                sla_id: "SLA-PROC-001".to_string(),
                elapsed_days: 62,
                limit_days: 30,
            }]
        );
    }

    #[test]
    fn test_refused_case_flags_oracle_disagreement() {
        let result = runner(42, 100).run(ScenarioId::MissingDocs);
        for case in result.case_results.iter().filter(|c| c.outcome == Outcome::Denied) {
            let review = case.oracle_review.as_ref().unwrap();
            if review.output.eligible() {
                assert!(!review.comparison.eligibility_match);
                assert_eq!(review.mismatches[0].severity, Severity::Critical);
            }
        }
    }

    #[test]
    fn test_same_seed_same_result() {
        let a = runner(42, 40).run(ScenarioId::AppealReversal);
        let b = runner(42, 40).run(ScenarioId::AppealReversal);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn test_worker_pool_matches_sequential() {
        let sequential = runner(9, 40).run(ScenarioId::MissingDocs);
        let pooled = runner(9, 40).with_workers(4).run(ScenarioId::MissingDocs);
        assert_eq!(sequential, pooled);
    }

    #[test]
    fn test_guard_failure_abandons_only_that_case() {
        let mut pack = PolicyPack::builtin().unwrap();
        pack.sla.verification.response_window.calendar_days = 20;
        let runner = ScenarioRunner::new(Arc::new(pack), 42).with_count(100);

        let result = runner.run(ScenarioId::MissingDocs);
        let refused = result
            .case_results
            .iter()
            .filter(|c| c.variant == MissingDocsVariant::ApplicantRefuses.name())
            .count();
        assert_eq!(refused, 0);
        assert!(!result.errors.is_empty());
        assert_eq!(result.case_results.len() + result.errors.len(), 100);
        for err in &result.errors {
            assert_eq!(err.variant, MissingDocsVariant::ApplicantRefuses.name());
            assert!(err.message.contains("guard_sla_ver_min_days"), "{}", err.message);
        }
    }

    #[test]
    fn test_sla_breach_derivation() {
        let pack = PolicyPack::builtin().unwrap();
        let filed = simulation_epoch();
        let event = |action: CaseAction, day: i64| CaseEvent {
            event_id: EventId::from_seed(day as u64),
            sequence: 0,
            action,
            agent_id: String::new(),
            role: Role::System,
            from_state: CaseStatus::Received,
            to_state: CaseStatus::Received,
            timestamp: add_days(filed, day),
            citations: vec!["CFR-273".to_string()],
            guard_results: Vec::new(),
        };

        let events = vec![
            event(CaseAction::Deny, 30),
            event(CaseAction::AppealFiled, 40),
            event(CaseAction::RenderDecision, 101),
            event(CaseAction::ImplementFavorable, 112),
        ];
        let ids: Vec<String> = sla_breaches(&events, filed, &pack.sla)
            .into_iter()
            .map(|b| b.sla_id)
            .collect();
        assert_eq!(ids, vec!["SLA-APP-003", "SLA-APP-004"]);
    }
}
