//! Case workflow state machine.
//!
//! `transition` is a pure function of (state, action, context). It checks the
//! actor's role, looks the pair up in the transition table, evaluates every
//! guard registered for the action and returns either the next state or a
//! [`TransitionError`]. The caller owns the case and applies the new state.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::TransitionError;
use crate::policy_pack::SlaTable;
use crate::types::{CaseId, Timestamp};

/// Lifecycle status of a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseStatus {
    Received,
    PendingVerification,
    ReadyForDetermination,
    DeterminedApproved,
    DeterminedDenied,
    NoticeSent,
    AppealRequested,
    AppealHearingScheduled,
    AppealDecided,
    Implemented,
    Closed,
}

impl CaseStatus {
    pub const ALL: [CaseStatus; 11] = [
        CaseStatus::Received,
        CaseStatus::PendingVerification,
        CaseStatus::ReadyForDetermination,
        CaseStatus::DeterminedApproved,
        CaseStatus::DeterminedDenied,
        CaseStatus::NoticeSent,
        CaseStatus::AppealRequested,
        CaseStatus::AppealHearingScheduled,
        CaseStatus::AppealDecided,
        CaseStatus::Implemented,
        CaseStatus::Closed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::Received => "RECEIVED",
            CaseStatus::PendingVerification => "PENDING_VERIFICATION",
            CaseStatus::ReadyForDetermination => "READY_FOR_DETERMINATION",
            CaseStatus::DeterminedApproved => "DETERMINED_APPROVED",
            CaseStatus::DeterminedDenied => "DETERMINED_DENIED",
            CaseStatus::NoticeSent => "NOTICE_SENT",
            CaseStatus::AppealRequested => "APPEAL_REQUESTED",
            CaseStatus::AppealHearingScheduled => "APPEAL_HEARING_SCHEDULED",
            CaseStatus::AppealDecided => "APPEAL_DECIDED",
            CaseStatus::Implemented => "IMPLEMENTED",
            CaseStatus::Closed => "CLOSED",
        }
    }

    /// True for states with no outgoing transitions.
    pub fn is_terminal(&self) -> bool {
        !has_outgoing_transitions(*self)
    }
}

impl std::fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Actions that drive a case through the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseAction {
    CreateCase,
    RequestVerification,
    ReceiveVerification,
    VerificationComplete,
    VerificationRefused,
    Approve,
    Deny,
    SendNotice,
    Implement,
    CloseCase,
    CloseAbandoned,
    AppealFiled,
    ScheduleHearing,
    RenderDecision,
    ImplementFavorable,
    ImplementUnfavorable,
    ReopenCase,
}

impl CaseAction {
    pub const ALL: [CaseAction; 17] = [
        CaseAction::CreateCase,
        CaseAction::RequestVerification,
        CaseAction::ReceiveVerification,
        CaseAction::VerificationComplete,
        CaseAction::VerificationRefused,
        CaseAction::Approve,
        CaseAction::Deny,
        CaseAction::SendNotice,
        CaseAction::Implement,
        CaseAction::CloseCase,
        CaseAction::CloseAbandoned,
        CaseAction::AppealFiled,
        CaseAction::ScheduleHearing,
        CaseAction::RenderDecision,
        CaseAction::ImplementFavorable,
        CaseAction::ImplementUnfavorable,
        CaseAction::ReopenCase,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CaseAction::CreateCase => "create_case",
            CaseAction::RequestVerification => "request_verification",
            CaseAction::ReceiveVerification => "receive_verification",
            CaseAction::VerificationComplete => "verification_complete",
            CaseAction::VerificationRefused => "verification_refused",
            CaseAction::Approve => "approve",
            CaseAction::Deny => "deny",
            CaseAction::SendNotice => "send_notice",
            CaseAction::Implement => "implement",
            CaseAction::CloseCase => "close_case",
            CaseAction::CloseAbandoned => "close_abandoned",
            CaseAction::AppealFiled => "appeal_filed",
            CaseAction::ScheduleHearing => "schedule_hearing",
            CaseAction::RenderDecision => "render_decision",
            CaseAction::ImplementFavorable => "implement_favorable",
            CaseAction::ImplementUnfavorable => "implement_unfavorable",
            CaseAction::ReopenCase => "reopen_case",
        }
    }

    /// Roles permitted to perform this action.
    pub fn allowed_roles(&self) -> &'static [Role] {
        use CaseAction::*;
        match self {
            CreateCase => &[Role::IntakeClerk, Role::System],
            RequestVerification | ReceiveVerification | VerificationRefused => &[Role::IntakeClerk],
            VerificationComplete | Approve | Deny | SendNotice => &[Role::Caseworker],
            Implement | CloseCase | ScheduleHearing | ImplementFavorable
            | ImplementUnfavorable | ReopenCase => &[Role::Supervisor],
            CloseAbandoned | AppealFiled => &[Role::System],
            RenderDecision => &[Role::Supervisor, Role::HearingOfficer],
        }
    }

    /// Policy ids every event of this action cites. Never empty.
    pub fn citations(&self) -> &'static [&'static str] {
        use CaseAction::*;
        match self {
            CreateCase | Implement | CloseCase | CloseAbandoned => &["CFR-273"],
            RequestVerification => &["VER-MAND-001", "NOT-VER-001"],
            ReceiveVerification | VerificationComplete | VerificationRefused => &["VER-MAND-001"],
            Approve | Deny => &["ELIG-GROSS-001"],
            SendNotice => &["NOT-APPR-001"],
            AppealFiled => &["CFR-273-15", "SLA-APP-001"],
            ScheduleHearing => &["CFR-273-15", "SLA-APP-002"],
            RenderDecision | ImplementUnfavorable | ReopenCase => &["CFR-273-15"],
            ImplementFavorable => &["CFR-273-15", "SLA-APP-004"],
        }
    }

    /// Guards that must all pass before this action is applied.
    pub fn guards(&self) -> &'static [Guard] {
        match self {
            CaseAction::VerificationComplete => &[Guard::VerificationComplete],
            CaseAction::VerificationRefused => &[Guard::SlaVerMinDays],
            CaseAction::AppealFiled => &[Guard::AppealDeadline],
            CaseAction::RenderDecision => &[Guard::HearingNotice],
            _ => &[],
        }
    }
}

impl std::fmt::Display for CaseAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role of the actor attempting an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    IntakeClerk,
    Caseworker,
    Supervisor,
    HearingOfficer,
    System,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::IntakeClerk,
        Role::Caseworker,
        Role::Supervisor,
        Role::HearingOfficer,
        Role::System,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::IntakeClerk => "intake_clerk",
            Role::Caseworker => "caseworker",
            Role::Supervisor => "supervisor",
            Role::HearingOfficer => "hearing_officer",
            Role::System => "system",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sparse transition table.
pub fn next_state(state: CaseStatus, action: CaseAction) -> Option<CaseStatus> {
    use CaseAction as A;
    use CaseStatus as S;

    let next = match (state, action) {
        (S::Received, A::RequestVerification) => S::PendingVerification,
        (S::PendingVerification, A::ReceiveVerification) => S::PendingVerification,
        (S::PendingVerification, A::VerificationComplete) => S::ReadyForDetermination,
        (S::PendingVerification, A::VerificationRefused) => S::DeterminedDenied,
        (S::PendingVerification, A::CloseAbandoned) => S::Closed,
        (S::ReadyForDetermination, A::Approve) => S::DeterminedApproved,
        (S::ReadyForDetermination, A::Deny) => S::DeterminedDenied,
        (S::DeterminedApproved | S::DeterminedDenied, A::SendNotice) => S::NoticeSent,
        (S::NoticeSent, A::Implement) => S::Implemented,
        (S::NoticeSent, A::AppealFiled) => S::AppealRequested,
        (S::AppealRequested, A::ScheduleHearing) => S::AppealHearingScheduled,
        (S::AppealHearingScheduled, A::RenderDecision) => S::AppealDecided,
        (S::AppealDecided, A::ImplementFavorable | A::ImplementUnfavorable) => S::Implemented,
        (S::AppealDecided, A::ReopenCase) => S::ReadyForDetermination,
        (S::Implemented, A::CloseCase) => S::Closed,
        _ => return None,
    };
    Some(next)
}

/// True if the table has at least one entry leaving `state`.
pub fn has_outgoing_transitions(state: CaseStatus) -> bool {
    CaseAction::ALL
        .iter()
        .any(|action| next_state(state, *action).is_some())
}

// ---------------------------------------------------------------------------
// Case data
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeterminationResult {
    Approved,
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppealDecision {
    Favorable,
    Unfavorable,
    Remand,
}

/// Mutable working record of one case.
///
/// Verification lists are only changed through methods, which keep
/// `verified_items` and `missing_items` inside `required_verifications`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseData {
    pub applicant_name: String,
    pub household_size: u32,
    required_verifications: Vec<String>,
    verified_items: Vec<String>,
    missing_items: Vec<String>,
    pub application_filed_at: Timestamp,
    pub verification_requested_at: Option<Timestamp>,
    pub determination_result: Option<DeterminationResult>,
    pub notice_sent_at: Option<Timestamp>,
    pub appeal_filed_at: Option<Timestamp>,
    pub appeal_reason: Option<String>,
    pub hearing_scheduled_at: Option<Timestamp>,
    pub hearing_date: Option<Timestamp>,
    pub appeal_decision: Option<AppealDecision>,
    pub original_denial_reason: Option<String>,
}

impl CaseData {
    pub fn new(
        applicant_name: impl Into<String>,
        household_size: u32,
        application_filed_at: Timestamp,
        required_verifications: &[String],
    ) -> Self {
        let mut required: Vec<String> = Vec::with_capacity(required_verifications.len());
        for item in required_verifications {
            if !required.contains(item) {
                required.push(item.clone());
            }
        }

        Self {
            applicant_name: applicant_name.into(),
            household_size,
            required_verifications: required,
            verified_items: Vec::new(),
            missing_items: Vec::new(),
            application_filed_at,
            verification_requested_at: None,
            determination_result: None,
            notice_sent_at: None,
            appeal_filed_at: None,
            appeal_reason: None,
            hearing_scheduled_at: None,
            hearing_date: None,
            appeal_decision: None,
            original_denial_reason: None,
        }
    }

    pub fn required_verifications(&self) -> &[String] {
        &self.required_verifications
    }

    pub fn verified_items(&self) -> &[String] {
        &self.verified_items
    }

    pub fn missing_items(&self) -> &[String] {
        &self.missing_items
    }

    /// Flags required items as outstanding. Items that are not required or
    /// already verified are ignored.
    pub fn mark_missing<S: AsRef<str>>(&mut self, items: &[S]) {
        for item in items {
            let item = item.as_ref();
            if self.is_required(item)
                && !self.verified_items.iter().any(|v| v == item)
                && !self.missing_items.iter().any(|m| m == item)
            {
                self.missing_items.push(item.to_string());
            }
        }
    }

    /// Records one item as verified. Returns false if it is not required.
    pub fn verify(&mut self, item: &str) -> bool {
        if !self.is_required(item) {
            return false;
        }
        if !self.verified_items.iter().any(|v| v == item) {
            self.verified_items.push(item.to_string());
        }
        self.missing_items.retain(|m| m != item);
        true
    }

    /// Marks every required item verified.
    pub fn verify_all(&mut self) {
        let required = self.required_verifications.clone();
        for item in &required {
            self.verify(item);
        }
    }

    /// Required items not yet verified, in required order.
    pub fn unverified_items(&self) -> Vec<&str> {
        self.required_verifications
            .iter()
            .filter(|item| !self.verified_items.contains(item))
            .map(String::as_str)
            .collect()
    }

    fn is_required(&self, item: &str) -> bool {
        self.required_verifications.iter().any(|r| r == item)
    }
}

// ---------------------------------------------------------------------------
// Transition context & guards
// ---------------------------------------------------------------------------

/// Who is attempting an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub role: Role,
    pub agent_id: String,
}

impl Actor {
    pub fn new(role: Role, agent_id: impl Into<String>) -> Self {
        Self {
            role,
            agent_id: agent_id.into(),
        }
    }
}

/// Read-only policy data the guards consult.
#[derive(Debug, Clone, Copy)]
pub struct PolicyFacts<'a> {
    pub sla: &'a SlaTable,
    pub rule_index: &'a BTreeSet<String>,
}

/// Snapshot for a single transition attempt.
#[derive(Debug, Clone)]
pub struct TransitionContext<'a> {
    pub case_id: CaseId,
    pub current_state: CaseStatus,
    pub actor: Actor,
    pub timestamp: Timestamp,
    pub case_data: CaseData,
    pub policy: PolicyFacts<'a>,
}

/// Outcome of one guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardResult {
    pub guard_name: String,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citation: Option<String>,
}

impl GuardResult {
    fn pass(guard: Guard, citation: Option<&str>) -> Self {
        Self {
            guard_name: guard.name().to_string(),
            passed: true,
            reason: None,
            citation: citation.map(str::to_string),
        }
    }

    fn fail(guard: Guard, reason: String, citation: Option<&str>) -> Self {
        Self {
            guard_name: guard.name().to_string(),
            passed: false,
            reason: Some(reason),
            citation: citation.map(str::to_string),
        }
    }
}

/// Preconditions attached to specific actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Guard {
    /// Every required verification item has been received
    VerificationComplete,
    /// Minimum response window elapsed since the verification request
    SlaVerMinDays,
    /// Appeal filed within the filing deadline after notice
    AppealDeadline,
    /// Hearing scheduled with the minimum advance notice
    HearingNotice,
}

impl Guard {
    pub fn name(&self) -> &'static str {
        match self {
            Guard::VerificationComplete => "guard_verification_complete",
            Guard::SlaVerMinDays => "guard_sla_ver_min_days",
            Guard::AppealDeadline => "guard_appeal_deadline",
            Guard::HearingNotice => "guard_hearing_notice",
        }
    }

    pub fn evaluate(&self, ctx: &TransitionContext<'_>) -> GuardResult {
        let data = &ctx.case_data;
        match self {
            Guard::VerificationComplete => {
                let missing = data.unverified_items();
                if missing.is_empty() {
                    GuardResult::pass(*self, None)
                } else {
                    GuardResult::fail(
                        *self,
                        format!("Missing verified items: {}", missing.join(", ")),
                        None,
                    )
                }
            }
            Guard::SlaVerMinDays => {
                let rule = &ctx.policy.sla.verification.response_window;
                let citation = Some(rule.sla_id.as_str());
                let Some(requested) = data.verification_requested_at else {
                    return GuardResult::fail(
                        *self,
                        "No verification request date recorded".to_string(),
                        citation,
                    );
                };
                let elapsed = ctx.timestamp - requested;
                if elapsed >= chrono::Duration::days(rule.calendar_days) {
                    GuardResult::pass(*self, citation)
                } else {
                    GuardResult::fail(
                        *self,
                        format!(
                            "Only {} of {} required days elapsed since verification request",
                            elapsed.num_days(),
                            rule.calendar_days
                        ),
                        citation,
                    )
                }
            }
            Guard::AppealDeadline => {
                let rule = &ctx.policy.sla.appeals.filing_deadline;
                let citation = Some(rule.sla_id.as_str());
                let Some(notice_sent) = data.notice_sent_at else {
                    return GuardResult::fail(
                        *self,
                        "No notice sent date recorded".to_string(),
                        citation,
                    );
                };
                let elapsed = ctx.timestamp - notice_sent;
                if elapsed <= chrono::Duration::days(rule.calendar_days) {
                    GuardResult::pass(*self, citation)
                } else {
                    GuardResult::fail(
                        *self,
                        format!(
                            "Appeal filed {} days after notice (max {})",
                            elapsed.num_days(),
                            rule.calendar_days
                        ),
                        citation,
                    )
                }
            }
            Guard::HearingNotice => {
                let rule = &ctx.policy.sla.appeals.hearing_notice;
                let citation = Some(rule.sla_id.as_str());
                let (Some(scheduled), Some(hearing)) = (data.hearing_scheduled_at, data.hearing_date)
                else {
                    return GuardResult::fail(
                        *self,
                        "Hearing scheduling date or hearing date not recorded".to_string(),
                        citation,
                    );
                };
                let notice = hearing - scheduled;
                if notice >= chrono::Duration::days(rule.calendar_days) {
                    GuardResult::pass(*self, citation)
                } else {
                    GuardResult::fail(
                        *self,
                        format!(
                            "Hearing only {} days after scheduling (min {})",
                            notice.num_days(),
                            rule.calendar_days
                        ),
                        citation,
                    )
                }
            }
        }
    }
}

/// Runs every guard registered for `action`. No short-circuit.
pub fn check_guards(action: CaseAction, ctx: &TransitionContext<'_>) -> Vec<GuardResult> {
    action.guards().iter().map(|guard| guard.evaluate(ctx)).collect()
}

/// A successful transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transition {
    pub new_state: CaseStatus,
    pub guard_results: Vec<GuardResult>,
}

/// Attempts `action` from `current_state`.
pub fn transition(
    current_state: CaseStatus,
    action: CaseAction,
    ctx: &TransitionContext<'_>,
) -> Result<Transition, TransitionError> {
    if !action.allowed_roles().contains(&ctx.actor.role) {
        return Err(TransitionError::RoleViolation {
            role: ctx.actor.role,
            action,
        });
    }

    let new_state = next_state(current_state, action).ok_or(TransitionError::InvalidTransition {
        state: current_state,
        action,
    })?;

    let guard_results = check_guards(action, ctx);
    let failed: Vec<String> = guard_results
        .iter()
        .filter(|g| !g.passed)
        .map(|g| g.guard_name.clone())
        .collect();

    if !failed.is_empty() {
        return Err(TransitionError::GuardFailure {
            failed,
            guard_results,
        });
    }

    Ok(Transition {
        new_state,
        guard_results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy_pack::PolicyPack;
    use crate::types::{add_days, simulation_epoch};
    use proptest::prelude::*;

    fn items(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn case_data() -> CaseData {
        CaseData::new(
            "Maria Garcia",
            3,
            simulation_epoch(),
            &items(&["identity", "residency", "income"]),
        )
    }

    fn ctx<'a>(
        pack: &'a PolicyPack,
        state: CaseStatus,
        role: Role,
        day: i64,
        data: CaseData,
    ) -> TransitionContext<'a> {
        TransitionContext {
            case_id: CaseId::from_seed(1),
            current_state: state,
            actor: Actor::new(role, "agent-1"),
            timestamp: add_days(simulation_epoch(), day),
            case_data: data,
            policy: pack.facts(),
        }
    }

    #[test]
    fn test_every_action_cites_something() {
        for action in CaseAction::ALL {
            assert!(!action.citations().is_empty(), "{} has no citations", action);
            assert!(!action.allowed_roles().is_empty());
        }
    }

    #[test]
    fn test_only_closed_is_terminal() {
        for state in CaseStatus::ALL {
            assert_eq!(state.is_terminal(), state == CaseStatus::Closed, "{}", state);
        }
    }

    #[test]
    fn test_missing_table_entries_are_invalid_transitions() {
        let pack = PolicyPack::builtin().unwrap();
        for state in CaseStatus::ALL {
            for action in CaseAction::ALL {
                if next_state(state, action).is_some() {
                    continue;
                }
                let role = action.allowed_roles()[0];
                let err = transition(state, action, &ctx(&pack, state, role, 0, case_data()))
                    .unwrap_err();
                assert!(
                    matches!(err, TransitionError::InvalidTransition { .. }),
                    "{} / {} gave {:?}",
                    state,
                    action,
                    err
                );
            }
        }
    }

    #[test]
    fn test_disallowed_roles_are_rejected_in_every_state() {
        let pack = PolicyPack::builtin().unwrap();
        for action in CaseAction::ALL {
            for role in Role::ALL {
                if action.allowed_roles().contains(&role) {
                    continue;
                }
                for state in CaseStatus::ALL {
                    let err = transition(state, action, &ctx(&pack, state, role, 0, case_data()))
                        .unwrap_err();
                    assert_eq!(err, TransitionError::RoleViolation { role, action });
                }
            }
        }
    }

    #[test]
    fn test_error_messages() {
        let pack = PolicyPack::builtin().unwrap();

        let err = transition(
            CaseStatus::Received,
            CaseAction::Approve,
            &ctx(&pack, CaseStatus::Received, Role::IntakeClerk, 0, case_data()),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Role 'intake_clerk' is not permitted to perform 'approve'"
        );

        let err = transition(
            CaseStatus::Received,
            CaseAction::Approve,
            &ctx(&pack, CaseStatus::Received, Role::Caseworker, 0, case_data()),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Action 'approve' is not valid in state 'RECEIVED'"
        );

        let err = transition(
            CaseStatus::Closed,
            CaseAction::CloseCase,
            &ctx(&pack, CaseStatus::Closed, Role::Supervisor, 0, case_data()),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "No transitions defined from state 'CLOSED'");
        assert_eq!(err.kind(), "invalid_transition");
    }

    #[test]
    fn test_happy_path_reaches_closed() {
        let pack = PolicyPack::builtin().unwrap();
        let mut data = case_data();
        let mut state = CaseStatus::Received;

        let steps = [
            (CaseAction::RequestVerification, Role::IntakeClerk),
            (CaseAction::VerificationComplete, Role::Caseworker),
            (CaseAction::Approve, Role::Caseworker),
            (CaseAction::SendNotice, Role::Caseworker),
            (CaseAction::Implement, Role::Supervisor),
            (CaseAction::CloseCase, Role::Supervisor),
        ];

        let mut successes = 0;
        for (day, (action, role)) in steps.into_iter().enumerate() {
            if action == CaseAction::VerificationComplete {
                data.verify_all();
            }
            let result = transition(state, action, &ctx(&pack, state, role, day as i64, data.clone()))
                .unwrap();
            if action == CaseAction::VerificationComplete {
                assert_eq!(result.guard_results.len(), 1);
                assert!(result.guard_results[0].passed);
            }
            state = result.new_state;
            successes += 1;
        }

        assert_eq!(successes, 6);
        assert_eq!(state, CaseStatus::Closed);
    }

    #[test]
    fn test_verification_complete_guard_lists_missing_items() {
        let pack = PolicyPack::builtin().unwrap();
        let mut data = case_data();
        data.verify("identity");
        data.mark_missing(&["residency", "income"]);

        let err = transition(
            CaseStatus::PendingVerification,
            CaseAction::VerificationComplete,
            &ctx(&pack, CaseStatus::PendingVerification, Role::Caseworker, 5, data),
        )
        .unwrap_err();

        assert_eq!(err.to_string(), "Guard(s) failed: guard_verification_complete");
        let results = err.guard_results().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0].reason.as_deref(),
            Some("Missing verified items: residency, income")
        );
    }

    #[test]
    fn test_refusal_requires_response_window() {
        let pack = PolicyPack::builtin().unwrap();
        let mut data = case_data();
        data.verification_requested_at = Some(add_days(simulation_epoch(), 1));

        let err = transition(
            CaseStatus::PendingVerification,
            CaseAction::VerificationRefused,
            &ctx(&pack, CaseStatus::PendingVerification, Role::IntakeClerk, 10, data.clone()),
        )
        .unwrap_err();
        let results = err.guard_results().unwrap();
        assert_eq!(
            results[0].reason.as_deref(),
            Some("Only 9 of 10 required days elapsed since verification request")
        );
        assert_eq!(results[0].citation.as_deref(), Some("SLA-VER-001"));

        let ok = transition(
            CaseStatus::PendingVerification,
            CaseAction::VerificationRefused,
            &ctx(&pack, CaseStatus::PendingVerification, Role::IntakeClerk, 11, data),
        )
        .unwrap();
        assert_eq!(ok.new_state, CaseStatus::DeterminedDenied);
    }

    #[test]
    fn test_refusal_without_request_date_fails() {
        let pack = PolicyPack::builtin().unwrap();
        let err = transition(
            CaseStatus::PendingVerification,
            CaseAction::VerificationRefused,
            &ctx(&pack, CaseStatus::PendingVerification, Role::IntakeClerk, 30, case_data()),
        )
        .unwrap_err();
        assert_eq!(
            err.guard_results().unwrap()[0].reason.as_deref(),
            Some("No verification request date recorded")
        );
    }

    #[test]
    fn test_appeal_deadline() {
        let pack = PolicyPack::builtin().unwrap();
        let mut data = case_data();
        data.notice_sent_at = Some(add_days(simulation_epoch(), 9));

        let ok = transition(
            CaseStatus::NoticeSent,
            CaseAction::AppealFiled,
            &ctx(&pack, CaseStatus::NoticeSent, Role::System, 99, data.clone()),
        );
        assert!(ok.is_ok());

        let err = transition(
            CaseStatus::NoticeSent,
            CaseAction::AppealFiled,
            &ctx(&pack, CaseStatus::NoticeSent, Role::System, 100, data),
        )
        .unwrap_err();
        assert_eq!(
            err.guard_results().unwrap()[0].reason.as_deref(),
            Some("Appeal filed 91 days after notice (max 90)")
        );
    }

    #[test]
    fn test_hearing_notice() {
        let pack = PolicyPack::builtin().unwrap();
        let mut data = case_data();
        data.hearing_scheduled_at = Some(add_days(simulation_epoch(), 27));
        data.hearing_date = Some(add_days(simulation_epoch(), 35));

        let err = transition(
            CaseStatus::AppealHearingScheduled,
            CaseAction::RenderDecision,
            &ctx(&pack, CaseStatus::AppealHearingScheduled, Role::HearingOfficer, 42, data.clone()),
        )
        .unwrap_err();
        assert_eq!(
            err.guard_results().unwrap()[0].reason.as_deref(),
            Some("Hearing only 8 days after scheduling (min 10)")
        );

        data.hearing_date = Some(add_days(simulation_epoch(), 47));
        let ok = transition(
            CaseStatus::AppealHearingScheduled,
            CaseAction::RenderDecision,
            &ctx(&pack, CaseStatus::AppealHearingScheduled, Role::HearingOfficer, 42, data),
        )
        .unwrap();
        assert_eq!(ok.new_state, CaseStatus::AppealDecided);
    }

    #[test]
    fn test_case_data_ignores_unrequired_items() {
        let mut data = case_data();
        data.mark_missing(&["citizenship", "income"]);
        assert_eq!(data.missing_items(), &["income".to_string()]);
        assert!(!data.verify("citizenship"));
        assert!(data.verify("income"));
        assert!(data.missing_items().is_empty());
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&CaseStatus::PendingVerification).unwrap(),
            "\"PENDING_VERIFICATION\""
        );
        assert_eq!(
            serde_json::to_string(&CaseAction::ImplementFavorable).unwrap(),
            "\"implement_favorable\""
        );
        assert_eq!(serde_json::to_string(&Role::HearingOfficer).unwrap(), "\"hearing_officer\"");
    }

    proptest! {
        #[test]
        fn prop_verification_lists_stay_within_required(
            ops in prop::collection::vec((any::<bool>(), 0usize..5), 0..30)
        ) {
            const POOL: [&str; 5] = ["identity", "residency", "income", "citizenship", "resources"];
            let mut data = CaseData::new(
                "Test",
                2,
                simulation_epoch(),
                &items(&["identity", "income", "resources"]),
            );
            for (verify, idx) in ops {
                if verify {
                    data.verify(POOL[idx]);
                } else {
                    data.mark_missing(&[POOL[idx]]);
                }
            }
            for item in data.missing_items().iter().chain(data.verified_items()) {
                prop_assert!(data.required_verifications().contains(item));
            }
            for item in data.missing_items() {
                prop_assert!(!data.verified_items().contains(item));
            }
        }
    }
}
