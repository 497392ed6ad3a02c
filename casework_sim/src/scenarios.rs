//! Casework scenarios and their variants.

use serde::{Deserialize, Serialize};

use casework_core::DeterminationResult;

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioId {
    /// Applicants with outstanding verification documents
    MissingDocs,

    /// Denied applicants who appeal the decision
    AppealReversal,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![ScenarioId::MissingDocs, ScenarioId::AppealReversal]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::MissingDocs => "missing_docs",
            ScenarioId::AppealReversal => "appeal_reversal",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::MissingDocs => {
                "Verification requested; documents arrive on time, late, never, or are refused"
            }
            ScenarioId::AppealReversal => {
                "Denied case appealed; decision favorable, unfavorable, or remanded"
            }
        }
    }

    /// Variant names this scenario can produce.
    pub fn variant_names(&self) -> Vec<&'static str> {
        match self {
            ScenarioId::MissingDocs => MissingDocsVariant::ALL.iter().map(|v| v.name()).collect(),
            ScenarioId::AppealReversal => AppealVariant::ALL.iter().map(|v| v.name()).collect(),
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "missing_docs" | "missing-docs" | "missingdocs" => Ok(ScenarioId::MissingDocs),
            "appeal_reversal" | "appeal-reversal" | "appealreversal" | "appeal" => {
                Ok(ScenarioId::AppealReversal)
            }
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

/// How a case ended, as scripted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Approved,
    Denied,
    Abandoned,
}

impl Outcome {
    /// The decision compared against the oracle; `None` for abandoned cases.
    pub fn decision(&self) -> Option<DeterminationResult> {
        match self {
            Outcome::Approved => Some(DeterminationResult::Approved),
            Outcome::Denied => Some(DeterminationResult::Denied),
            Outcome::Abandoned => None,
        }
    }
}

/// Missing-docs variants with their cumulative draw thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingDocsVariant {
    DocsArriveOnTime,
    DocsArriveLate,
    DocsNeverArrive,
    ApplicantRefuses,
}

impl MissingDocsVariant {
    pub const ALL: [MissingDocsVariant; 4] = [
        MissingDocsVariant::DocsArriveOnTime,
        MissingDocsVariant::DocsArriveLate,
        MissingDocsVariant::DocsNeverArrive,
        MissingDocsVariant::ApplicantRefuses,
    ];

    /// Maps a uniform draw in [0, 1) to a variant (40/20/20/20).
    pub fn from_roll(roll: f64) -> Self {
        if roll < 0.40 {
            MissingDocsVariant::DocsArriveOnTime
        } else if roll < 0.60 {
            MissingDocsVariant::DocsArriveLate
        } else if roll < 0.80 {
            MissingDocsVariant::DocsNeverArrive
        } else {
            MissingDocsVariant::ApplicantRefuses
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MissingDocsVariant::DocsArriveOnTime => "docs_arrive_on_time",
            MissingDocsVariant::DocsArriveLate => "docs_arrive_late",
            MissingDocsVariant::DocsNeverArrive => "docs_never_arrive",
            MissingDocsVariant::ApplicantRefuses => "applicant_refuses",
        }
    }

    pub fn outcome(&self) -> Outcome {
        match self {
            MissingDocsVariant::DocsArriveOnTime | MissingDocsVariant::DocsArriveLate => {
                Outcome::Approved
            }
            MissingDocsVariant::ApplicantRefuses => Outcome::Denied,
            MissingDocsVariant::DocsNeverArrive => Outcome::Abandoned,
        }
    }
}

/// Appeal-reversal variants with their cumulative draw thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppealVariant {
    FavorableReversal,
    UnfavorableUpheld,
    RemandReopened,
}

impl AppealVariant {
    pub const ALL: [AppealVariant; 3] = [
        AppealVariant::FavorableReversal,
        AppealVariant::UnfavorableUpheld,
        AppealVariant::RemandReopened,
    ];

    /// Maps a uniform draw in [0, 1) to a variant (50/30/20).
    pub fn from_roll(roll: f64) -> Self {
        if roll < 0.50 {
            AppealVariant::FavorableReversal
        } else if roll < 0.80 {
            AppealVariant::UnfavorableUpheld
        } else {
            AppealVariant::RemandReopened
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AppealVariant::FavorableReversal => "favorable_reversal",
            AppealVariant::UnfavorableUpheld => "unfavorable_upheld",
            AppealVariant::RemandReopened => "remand_reopened",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.name() == name)
    }

    pub fn outcome(&self) -> Outcome {
        match self {
            AppealVariant::FavorableReversal | AppealVariant::RemandReopened => Outcome::Approved,
            AppealVariant::UnfavorableUpheld => Outcome::Denied,
        }
    }
}

/// Scenario-specific shape of one synthetic case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "scenario", rename_all = "snake_case")]
pub enum CaseProfile {
    MissingDocs {
        variant: MissingDocsVariant,
    },
    AppealReversal {
        variant: AppealVariant,
        denial_reason: String,
        appeal_reason: String,
    },
}

impl CaseProfile {
    pub fn scenario(&self) -> ScenarioId {
        match self {
            CaseProfile::MissingDocs { .. } => ScenarioId::MissingDocs,
            CaseProfile::AppealReversal { .. } => ScenarioId::AppealReversal,
        }
    }

    pub fn variant_name(&self) -> &'static str {
        match self {
            CaseProfile::MissingDocs { variant } => variant.name(),
            CaseProfile::AppealReversal { variant, .. } => variant.name(),
        }
    }

    pub fn outcome(&self) -> Outcome {
        match self {
            CaseProfile::MissingDocs { variant } => variant.outcome(),
            CaseProfile::AppealReversal { variant, .. } => variant.outcome(),
        }
    }
}
