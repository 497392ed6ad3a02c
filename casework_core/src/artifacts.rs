//! Case artifacts: the documents a caseworker or hearing officer produces.
//!
//! Each kind has a typed shape. [`validate_artifact`] checks untyped JSON
//! content against the shape for a named kind, then applies the field
//! constraints serde cannot express (non-empty strings and lists).

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ArtifactError;
use crate::state_machine::AppealDecision;

/// Artifact type names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    VerificationRequest,
    DeterminationWorksheet,
    Notice,
    AppealRequest,
    HearingRecord,
    AppealDecision,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 6] = [
        ArtifactKind::VerificationRequest,
        ArtifactKind::DeterminationWorksheet,
        ArtifactKind::Notice,
        ArtifactKind::AppealRequest,
        ArtifactKind::HearingRecord,
        ArtifactKind::AppealDecision,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::VerificationRequest => "verification_request",
            ArtifactKind::DeterminationWorksheet => "determination_worksheet",
            ArtifactKind::Notice => "notice",
            ArtifactKind::AppealRequest => "appeal_request",
            ArtifactKind::HearingRecord => "hearing_record",
            ArtifactKind::AppealDecision => "appeal_decision",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ArtifactKind {
    type Err = ArtifactError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ArtifactKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ArtifactError::UnknownType(s.to_string()))
    }
}

/// Request for documents sent when verification is incomplete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRequest {
    /// At least one item
    pub missing_items: Vec<String>,
    pub deadline: String,
    pub consequences: String,
    pub assistance_obligation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorksheetDeductions {
    pub standard: f64,
    pub earned_income: f64,
    pub dependent_care: f64,
    pub child_support: f64,
    pub medical: f64,
    pub excess_shelter: f64,
}

/// Caseworker's record of the benefit calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeterminationWorksheet {
    pub eligible: bool,
    pub gross_income: f64,
    pub net_income: f64,
    pub benefit_amount: f64,
    pub deductions: WorksheetDeductions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeType {
    Approval,
    Denial,
}

/// Approval or denial notice sent to the applicant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub notice_type: NoticeType,
    pub recipient_name: String,
    pub notice_date: String,
    /// Template field values, keyed by field name
    pub fields: BTreeMap<String, String>,
    pub template_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppealRequest {
    pub appeal_id: String,
    pub case_id: String,
    pub filed_at: String,
    pub reason: String,
    /// May be empty
    pub cited_errors: Vec<String>,
    pub requested_relief: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HearingRecord {
    pub hearing_id: String,
    pub case_id: String,
    pub scheduled_at: String,
    pub hearing_date: String,
    pub attendees: Vec<String>,
    pub evidence_presented: Vec<String>,
    pub findings_of_fact: Vec<String>,
}

/// Hearing officer's written decision on an appeal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppealDecisionRecord {
    pub decision_id: String,
    pub case_id: String,
    pub outcome: AppealDecision,
    pub reasoning: String,
    pub cited_regulations: Vec<String>,
    pub order_text: String,
    pub implementation_deadline: String,
}

/// A validated artifact of any kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Artifact {
    VerificationRequest(VerificationRequest),
    DeterminationWorksheet(DeterminationWorksheet),
    Notice(Notice),
    AppealRequest(AppealRequest),
    HearingRecord(HearingRecord),
    AppealDecision(AppealDecisionRecord),
}

impl Artifact {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Artifact::VerificationRequest(_) => ArtifactKind::VerificationRequest,
            Artifact::DeterminationWorksheet(_) => ArtifactKind::DeterminationWorksheet,
            Artifact::Notice(_) => ArtifactKind::Notice,
            Artifact::AppealRequest(_) => ArtifactKind::AppealRequest,
            Artifact::HearingRecord(_) => ArtifactKind::HearingRecord,
            Artifact::AppealDecision(_) => ArtifactKind::AppealDecision,
        }
    }

    /// Checks the constraints that typing alone does not enforce.
    pub fn validate(&self) -> Result<(), ArtifactError> {
        let check = FieldCheck(self.kind());
        match self {
            Artifact::VerificationRequest(request) => {
                check.non_empty_list("missingItems", &request.missing_items)
            }
            Artifact::DeterminationWorksheet(_) | Artifact::Notice(_) => Ok(()),
            Artifact::AppealRequest(request) => {
                check.non_empty("appealId", &request.appeal_id)?;
                check.non_empty("caseId", &request.case_id)?;
                check.non_empty("filedAt", &request.filed_at)?;
                check.non_empty("reason", &request.reason)?;
                check.non_empty("requestedRelief", &request.requested_relief)
            }
            Artifact::HearingRecord(record) => {
                check.non_empty("hearingId", &record.hearing_id)?;
                check.non_empty("caseId", &record.case_id)?;
                check.non_empty("scheduledAt", &record.scheduled_at)?;
                check.non_empty("hearingDate", &record.hearing_date)?;
                check.non_empty_list("attendees", &record.attendees)
            }
            Artifact::AppealDecision(decision) => {
                check.non_empty("decisionId", &decision.decision_id)?;
                check.non_empty("caseId", &decision.case_id)?;
                check.non_empty("reasoning", &decision.reasoning)?;
                check.non_empty_list("citedRegulations", &decision.cited_regulations)?;
                check.non_empty("orderText", &decision.order_text)?;
                check.non_empty("implementationDeadline", &decision.implementation_deadline)
            }
        }
    }
}

struct FieldCheck(ArtifactKind);

impl FieldCheck {
    fn non_empty(&self, field: &'static str, value: &str) -> Result<(), ArtifactError> {
        if value.is_empty() {
            return Err(self.invalid(field, "must not be empty"));
        }
        Ok(())
    }

    fn non_empty_list(&self, field: &'static str, items: &[String]) -> Result<(), ArtifactError> {
        if items.is_empty() {
            return Err(self.invalid(field, "must contain at least one item"));
        }
        Ok(())
    }

    fn invalid(&self, field: &'static str, reason: &'static str) -> ArtifactError {
        ArtifactError::Invalid {
            kind: self.0,
            field,
            reason,
        }
    }
}

fn decode<T: DeserializeOwned>(kind: ArtifactKind, content: &Value) -> Result<T, ArtifactError> {
    T::deserialize(content).map_err(|source| ArtifactError::Malformed { kind, source })
}

/// Validates `content` as an artifact of the named kind.
///
/// Unknown kind names, content that does not match the kind's shape and
/// content that breaks a field constraint are all returned as errors.
pub fn validate_artifact(kind: &str, content: &Value) -> Result<Artifact, ArtifactError> {
    let kind: ArtifactKind = kind.parse()?;
    let artifact = match kind {
        ArtifactKind::VerificationRequest => Artifact::VerificationRequest(decode(kind, content)?),
        ArtifactKind::DeterminationWorksheet => {
            Artifact::DeterminationWorksheet(decode(kind, content)?)
        }
        ArtifactKind::Notice => Artifact::Notice(decode(kind, content)?),
        ArtifactKind::AppealRequest => Artifact::AppealRequest(decode(kind, content)?),
        ArtifactKind::HearingRecord => Artifact::HearingRecord(decode(kind, content)?),
        ArtifactKind::AppealDecision => Artifact::AppealDecision(decode(kind, content)?),
    };
    artifact.validate()?;
    Ok(artifact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use serde_json::json;

    fn verification_request() -> Value {
        json!({
            "missingItems": ["identity", "gross_nonexempt_income"],
            "deadline": "2026-03-05",
            "consequences": "Application may be denied if documents are not received by the deadline.",
            "assistanceObligation": "The agency will assist you in obtaining required documents."
        })
    }

    fn worksheet(eligible: bool) -> Value {
        json!({
            "eligible": eligible,
            "grossIncome": 2500,
            "netIncome": 1800,
            "benefitAmount": 450,
            "deductions": {
                "standard": 205,
                "earnedIncome": 300,
                "dependentCare": 0,
                "childSupport": 0,
                "medical": 0,
                "excessShelter": 195
            }
        })
    }

    fn appeal_request() -> Value {
        json!({
            "appealId": "appeal-001",
            "caseId": "case-001",
            "filedAt": "2026-02-15",
            "reason": "Incorrect income calculation",
            "citedErrors": ["income_miscalculation", "missing_deduction"],
            "requestedRelief": "Recalculate benefits with correct income"
        })
    }

    fn hearing_record() -> Value {
        json!({
            "hearingId": "hearing-001",
            "caseId": "case-001",
            "scheduledAt": "2026-02-20",
            "hearingDate": "2026-03-10",
            "attendees": ["claimant", "hearing_officer", "caseworker"],
            "evidencePresented": ["pay_stubs", "tax_return"],
            "findingsOfFact": ["Income was $2,400/month"]
        })
    }

    fn appeal_decision() -> Value {
        json!({
            "decisionId": "decision-001",
            "caseId": "case-001",
            "outcome": "favorable",
            "reasoning": "The agency miscalculated earned income deductions",
            "citedRegulations": ["7 CFR 273.9(d)", "7 CFR 273.10(e)"],
            "orderText": "Benefits shall be recalculated from the original application date",
            "implementationDeadline": "2026-04-01"
        })
    }

    fn invalid_field(err: ArtifactError) -> &'static str {
        match err {
            ArtifactError::Invalid { field, .. } => field,
            other => panic!("expected a field constraint error, got {other}"),
        }
    }

    #[test]
    fn test_kind_names_round_trip() {
        for kind in ArtifactKind::ALL {
            assert_eq!(kind.as_str().parse::<ArtifactKind>().unwrap(), kind);
            assert_eq!(serde_json::to_value(kind).unwrap(), kind.as_str());
        }
    }

    #[test]
    fn test_verification_request() {
        let artifact = validate_artifact("verification_request", &verification_request()).unwrap();
        match artifact {
            Artifact::VerificationRequest(request) => assert_eq!(request.missing_items.len(), 2),
            other => panic!("wrong kind: {:?}", other.kind()),
        }

        let mut missing = verification_request();
        missing.as_object_mut().unwrap().remove("missingItems");
        assert!(matches!(
            validate_artifact("verification_request", &missing),
            Err(ArtifactError::Malformed { kind: ArtifactKind::VerificationRequest, .. })
        ));

        let mut empty = verification_request();
        empty["missingItems"] = json!([]);
        let err = validate_artifact("verification_request", &empty).unwrap_err();
        assert_eq!(invalid_field(err), "missingItems");
    }

    #[test]
    fn test_determination_worksheet() {
        let approved = validate_artifact("determination_worksheet", &worksheet(true)).unwrap();
        let Artifact::DeterminationWorksheet(approved) = approved else {
            panic!("wrong kind");
        };
        assert!(approved.eligible);
        assert_relative_eq!(approved.deductions.excess_shelter, 195.0);
        assert!(approved.reason.is_none());

        let mut denied = worksheet(false);
        denied["benefitAmount"] = json!(0);
        denied["reason"] = json!("Gross income exceeds 165% FPL for household size 3");
        let denied = validate_artifact("determination_worksheet", &denied).unwrap();
        let Artifact::DeterminationWorksheet(denied) = denied else {
            panic!("wrong kind");
        };
        assert!(denied.reason.unwrap().starts_with("Gross income"));

        let mut no_deductions = worksheet(true);
        no_deductions.as_object_mut().unwrap().remove("deductions");
        assert!(validate_artifact("determination_worksheet", &no_deductions).is_err());
    }

    #[test]
    fn test_notice_type_is_closed() {
        let approval = json!({
            "noticeType": "approval",
            "recipientName": "Jane Doe",
            "noticeDate": "2026-02-25",
            "fields": {
                "benefit_amount": "$450",
                "certification_period": "2026-03 to 2026-08",
                "fair_hearing_rights": "You have the right to request a fair hearing within 90 days."
            },
            "templateId": "approval-notice"
        });
        let Artifact::Notice(notice) = validate_artifact("notice", &approval).unwrap() else {
            panic!("wrong kind");
        };
        assert_eq!(notice.notice_type, NoticeType::Approval);
        assert_eq!(notice.fields["benefit_amount"], "$450");

        let warning = json!({
            "noticeType": "warning",
            "recipientName": "Jane Doe",
            "noticeDate": "2026-02-25",
            "fields": {},
            "templateId": "test"
        });
        assert!(validate_artifact("notice", &warning).is_err());
    }

    #[test]
    fn test_unknown_and_mismatched_kinds() {
        let err = validate_artifact("unknown_type", &json!({ "foo": "bar" })).unwrap_err();
        assert!(err.kind().is_none());
        assert_eq!(err.to_string(), "Unknown artifact type: unknown_type");

        // Verification request content submitted as a notice
        let err = validate_artifact("notice", &json!({ "missingItems": ["identity"] })).unwrap_err();
        assert_eq!(err.kind(), Some(ArtifactKind::Notice));
    }

    #[test]
    fn test_appeal_request() {
        let Artifact::AppealRequest(request) =
            validate_artifact("appeal_request", &appeal_request()).unwrap()
        else {
            panic!("wrong kind");
        };
        assert_eq!(request.appeal_id, "appeal-001");
        assert_eq!(request.cited_errors.len(), 2);

        let mut no_errors = appeal_request();
        no_errors["citedErrors"] = json!([]);
        assert!(validate_artifact("appeal_request", &no_errors).is_ok());

        let partial = json!({ "appealId": "appeal-001" });
        assert!(validate_artifact("appeal_request", &partial).is_err());

        let mut blank_reason = appeal_request();
        blank_reason["reason"] = json!("");
        let err = validate_artifact("appeal_request", &blank_reason).unwrap_err();
        assert_eq!(invalid_field(err), "reason");
    }

    #[test]
    fn test_hearing_record() {
        let Artifact::HearingRecord(record) =
            validate_artifact("hearing_record", &hearing_record()).unwrap()
        else {
            panic!("wrong kind");
        };
        assert_eq!(record.attendees.len(), 3);

        let mut no_attendees = hearing_record();
        no_attendees["attendees"] = json!([]);
        let err = validate_artifact("hearing_record", &no_attendees).unwrap_err();
        assert_eq!(invalid_field(err), "attendees");

        let mut bare = hearing_record();
        bare["evidencePresented"] = json!([]);
        bare["findingsOfFact"] = json!([]);
        assert!(validate_artifact("hearing_record", &bare).is_ok());
    }

    #[test]
    fn test_appeal_decision_outcomes() {
        for (name, outcome) in [
            ("favorable", AppealDecision::Favorable),
            ("unfavorable", AppealDecision::Unfavorable),
            ("remand", AppealDecision::Remand),
        ] {
            let mut content = appeal_decision();
            content["outcome"] = json!(name);
            let Artifact::AppealDecision(decision) =
                validate_artifact("appeal_decision", &content).unwrap()
            else {
                panic!("wrong kind");
            };
            assert_eq!(decision.outcome, outcome);
        }

        let mut partial_outcome = appeal_decision();
        partial_outcome["outcome"] = json!("partial");
        assert!(validate_artifact("appeal_decision", &partial_outcome).is_err());

        let mut no_regulations = appeal_decision();
        no_regulations["citedRegulations"] = json!([]);
        let err = validate_artifact("appeal_decision", &no_regulations).unwrap_err();
        assert_eq!(invalid_field(err), "citedRegulations");

        let missing = json!({ "decisionId": "decision-001" });
        assert!(validate_artifact("appeal_decision", &missing).is_err());
    }

    #[test]
    fn test_artifact_serializes_with_type_tag() {
        let artifact = validate_artifact("hearing_record", &hearing_record()).unwrap();
        let json = serde_json::to_value(&artifact).unwrap();
        assert_eq!(json["type"], "hearing_record");
        assert_eq!(json["hearingId"], "hearing-001");

        let back: Artifact = serde_json::from_value(json).unwrap();
        assert_eq!(back, artifact);
    }
}
