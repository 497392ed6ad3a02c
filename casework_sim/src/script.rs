//! Scripted case timelines.
//!
//! Each variant replays a fixed list of steps. A step names the day it happens
//! (relative to the simulation epoch), the action, the acting role and agent,
//! and an optional change to the case record applied just before the attempt.

use casework_core::state_machine::{AppealDecision, CaseAction, CaseData, DeterminationResult, Role};
use casework_core::types::{add_days, simulation_epoch};
use casework_core::Timestamp;

use crate::scenarios::{AppealVariant, CaseProfile, MissingDocsVariant};

pub const CLERK: &str = "clerk-1";
pub const WORKER: &str = "worker-1";
pub const SUPERVISOR: &str = "super-1";
pub const HEARING_OFFICER: &str = "officer-1";
pub const SYSTEM: &str = "system";

/// Change to the case record applied before a step's transition is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreMutation {
    /// Every required item has been received
    VerifyAll,
    SetDetermination(DeterminationResult),
    /// Notice date is the step's timestamp
    StampNotice,
    /// Appeal date is the step's timestamp
    StampAppeal,
    /// Scheduled at the step's timestamp for a hearing on `hearing_day`
    ScheduleHearing { hearing_day: i64 },
    Decide(AppealDecision),
}

impl PreMutation {
    pub fn apply(&self, data: &mut CaseData, at: Timestamp) {
        match *self {
            PreMutation::VerifyAll => data.verify_all(),
            PreMutation::SetDetermination(result) => data.determination_result = Some(result),
            PreMutation::StampNotice => data.notice_sent_at = Some(at),
            PreMutation::StampAppeal => data.appeal_filed_at = Some(at),
            PreMutation::ScheduleHearing { hearing_day } => {
                data.hearing_scheduled_at = Some(at);
                data.hearing_date = Some(add_days(simulation_epoch(), hearing_day));
            }
            PreMutation::Decide(decision) => data.appeal_decision = Some(decision),
        }
    }
}

/// One scripted action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptStep {
    /// Days after the simulation epoch
    pub day_offset: i64,
    pub action: CaseAction,
    pub role: Role,
    pub agent_id: &'static str,
    pub pre: Option<PreMutation>,
}

impl ScriptStep {
    const fn new(day_offset: i64, action: CaseAction, role: Role, agent_id: &'static str) -> Self {
        Self {
            day_offset,
            action,
            role,
            agent_id,
            pre: None,
        }
    }

    const fn with(mut self, pre: PreMutation) -> Self {
        self.pre = Some(pre);
        self
    }

    pub fn timestamp(&self) -> Timestamp {
        add_days(simulation_epoch(), self.day_offset)
    }
}

use CaseAction as A;
use Role as R;

const fn clerk(day: i64, action: CaseAction) -> ScriptStep {
    ScriptStep::new(day, action, R::IntakeClerk, CLERK)
}

const fn worker(day: i64, action: CaseAction) -> ScriptStep {
    ScriptStep::new(day, action, R::Caseworker, WORKER)
}

const fn supervisor(day: i64, action: CaseAction) -> ScriptStep {
    ScriptStep::new(day, action, R::Supervisor, SUPERVISOR)
}

const fn system(day: i64, action: CaseAction) -> ScriptStep {
    ScriptStep::new(day, action, R::System, SYSTEM)
}

pub const DOCS_ON_TIME: [ScriptStep; 7] = [
    clerk(1, A::RequestVerification),
    clerk(8, A::ReceiveVerification).with(PreMutation::VerifyAll),
    worker(8, A::VerificationComplete),
    worker(10, A::Approve),
    worker(12, A::SendNotice),
    supervisor(15, A::Implement),
    supervisor(16, A::CloseCase),
];

pub const DOCS_LATE: [ScriptStep; 7] = [
    clerk(1, A::RequestVerification),
    clerk(35, A::ReceiveVerification).with(PreMutation::VerifyAll),
    worker(35, A::VerificationComplete),
    worker(37, A::Approve),
    worker(39, A::SendNotice),
    supervisor(42, A::Implement),
    supervisor(43, A::CloseCase),
];

pub const DOCS_NEVER_ARRIVE: [ScriptStep; 2] = [
    clerk(1, A::RequestVerification),
    system(62, A::CloseAbandoned),
];

pub const APPLICANT_REFUSES: [ScriptStep; 5] = [
    clerk(1, A::RequestVerification),
    clerk(12, A::VerificationRefused),
    worker(14, A::SendNotice),
    supervisor(17, A::Implement),
    supervisor(18, A::CloseCase),
];

/// Denial and notice shared by every appeal timeline.
pub const APPEAL_DENIAL_PHASE: [ScriptStep; 5] = [
    clerk(1, A::RequestVerification),
    clerk(5, A::ReceiveVerification).with(PreMutation::VerifyAll),
    worker(5, A::VerificationComplete),
    worker(7, A::Deny).with(PreMutation::SetDetermination(DeterminationResult::Denied)),
    worker(9, A::SendNotice).with(PreMutation::StampNotice),
];

pub const FAVORABLE_REVERSAL: [ScriptStep; 5] = [
    system(24, A::AppealFiled).with(PreMutation::StampAppeal),
    supervisor(27, A::ScheduleHearing).with(PreMutation::ScheduleHearing { hearing_day: 47 }),
    ScriptStep::new(42, A::RenderDecision, R::HearingOfficer, HEARING_OFFICER)
        .with(PreMutation::Decide(AppealDecision::Favorable)),
    supervisor(47, A::ImplementFavorable),
    supervisor(48, A::CloseCase),
];

pub const UNFAVORABLE_UPHELD: [ScriptStep; 5] = [
    system(29, A::AppealFiled).with(PreMutation::StampAppeal),
    supervisor(33, A::ScheduleHearing).with(PreMutation::ScheduleHearing { hearing_day: 53 }),
    ScriptStep::new(52, A::RenderDecision, R::HearingOfficer, HEARING_OFFICER)
        .with(PreMutation::Decide(AppealDecision::Unfavorable)),
    supervisor(57, A::ImplementUnfavorable),
    supervisor(58, A::CloseCase),
];

pub const REMAND_REOPENED: [ScriptStep; 8] = [
    system(19, A::AppealFiled).with(PreMutation::StampAppeal),
    supervisor(22, A::ScheduleHearing).with(PreMutation::ScheduleHearing { hearing_day: 42 }),
    ScriptStep::new(39, A::RenderDecision, R::HearingOfficer, HEARING_OFFICER)
        .with(PreMutation::Decide(AppealDecision::Remand)),
    supervisor(40, A::ReopenCase),
    worker(44, A::Approve).with(PreMutation::SetDetermination(DeterminationResult::Approved)),
    worker(46, A::SendNotice),
    supervisor(50, A::Implement),
    supervisor(51, A::CloseCase),
];

/// Full step list for a case profile.
pub fn script_for(profile: &CaseProfile) -> Vec<ScriptStep> {
    match profile {
        CaseProfile::MissingDocs { variant } => match variant {
            MissingDocsVariant::DocsArriveOnTime => DOCS_ON_TIME.to_vec(),
            MissingDocsVariant::DocsArriveLate => DOCS_LATE.to_vec(),
            MissingDocsVariant::DocsNeverArrive => DOCS_NEVER_ARRIVE.to_vec(),
            MissingDocsVariant::ApplicantRefuses => APPLICANT_REFUSES.to_vec(),
        },
        CaseProfile::AppealReversal { variant, .. } => {
            let tail: &[ScriptStep] = match variant {
                AppealVariant::FavorableReversal => &FAVORABLE_REVERSAL,
                AppealVariant::UnfavorableUpheld => &UNFAVORABLE_UPHELD,
                AppealVariant::RemandReopened => &REMAND_REOPENED,
            };
            APPEAL_DENIAL_PHASE.iter().chain(tail).copied().collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casework_core::state_machine::{next_state, CaseStatus};

    fn profiles() -> Vec<CaseProfile> {
        let mut all: Vec<CaseProfile> = MissingDocsVariant::ALL
            .iter()
            .map(|&variant| CaseProfile::MissingDocs { variant })
            .collect();
        all.extend(AppealVariant::ALL.iter().map(|&variant| CaseProfile::AppealReversal {
            variant,
            denial_reason: String::new(),
            appeal_reason: String::new(),
        }));
        all
    }

    #[test]
    fn test_every_script_walks_the_table_to_closed() {
        for profile in profiles() {
            let mut state = CaseStatus::Received;
            for step in script_for(&profile) {
                state = next_state(state, step.action)
                    .unwrap_or_else(|| panic!("{}: {} from {}", profile.variant_name(), step.action, state));
                assert!(step.action.allowed_roles().contains(&step.role));
            }
            assert_eq!(state, CaseStatus::Closed, "{}", profile.variant_name());
        }
    }

    #[test]
    fn test_days_never_go_backwards() {
        for profile in profiles() {
            let steps = script_for(&profile);
            assert!(steps.windows(2).all(|w| w[0].day_offset <= w[1].day_offset));
        }
    }

    #[test]
    fn test_hearing_pre_mutation_stamps_both_dates() {
        let mut data = CaseData::new("A B", 1, simulation_epoch(), &[]);
        let at = add_days(simulation_epoch(), 27);
        PreMutation::ScheduleHearing { hearing_day: 47 }.apply(&mut data, at);
        assert_eq!(data.hearing_scheduled_at, Some(at));
        assert_eq!(data.hearing_date, Some(add_days(simulation_epoch(), 47)));
    }

    #[test]
    fn test_appeal_scripts_share_denial_phase() {
        let steps = script_for(&CaseProfile::AppealReversal {
            variant: AppealVariant::RemandReopened,
            denial_reason: String::new(),
            appeal_reason: String::new(),
        });
        assert_eq!(steps.len(), 13);
        assert_eq!(&steps[..5], &APPEAL_DENIAL_PHASE);
    }
}
