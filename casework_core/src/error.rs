//! Error types for the casework engine.

use std::path::PathBuf;

use thiserror::Error;

use crate::artifacts::ArtifactKind;
use crate::state_machine::{has_outgoing_transitions, CaseAction, CaseStatus, GuardResult, Role};

/// Reasons a transition attempt is rejected.
///
/// All three are returned to the caller as values; the state machine never
/// panics and never mutates case state on rejection.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransitionError {
    /// Actor's role is not on the action's allow-list (no guards were run)
    #[error("Role '{role}' is not permitted to perform '{action}'")]
    RoleViolation { role: Role, action: CaseAction },

    /// No transition table entry for (state, action), including terminal states
    #[error("{}", invalid_transition_message(.state, .action))]
    InvalidTransition { state: CaseStatus, action: CaseAction },

    /// Table entry exists but one or more guards rejected the attempt
    #[error("Guard(s) failed: {}", .failed.join(", "))]
    GuardFailure {
        failed: Vec<String>,
        guard_results: Vec<GuardResult>,
    },
}

impl TransitionError {
    /// Returns the full guard audit trail, if guards were evaluated.
    pub fn guard_results(&self) -> Option<&[GuardResult]> {
        match self {
            Self::GuardFailure { guard_results, .. } => Some(guard_results),
            _ => None,
        }
    }

    /// Short machine-readable kind, used in logs and run exports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RoleViolation { .. } => "role_violation",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::GuardFailure { .. } => "guard_failure",
        }
    }
}

fn invalid_transition_message(state: &CaseStatus, action: &CaseAction) -> String {
    if has_outgoing_transitions(*state) {
        format!("Action '{}' is not valid in state '{}'", action, state)
    } else {
        format!("No transitions defined from state '{}'", state)
    }
}

/// Errors raised while loading a policy pack.
///
/// These are load-time failures; once a pack is loaded nothing downstream can
/// fail because of its contents.
#[derive(Debug, Error)]
pub enum PolicyPackError {
    /// The pack directory lacks one of its four documents
    #[error("Policy pack at {} is missing {document}", .dir.display())]
    MissingDocument { dir: PathBuf, document: String },

    /// A pack document could not be read from disk
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A pack document is not valid JSON or does not match the expected shape
    #[error("Failed to parse {document}: {source}")]
    Parse {
        document: String,
        #[source]
        source: serde_json::Error,
    },
}

impl PolicyPackError {
    /// Creates a parse error for the named document.
    pub fn parse(document: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Parse {
            document: document.into(),
            source,
        }
    }
}

/// Errors raised while validating a case artifact.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// The artifact type name is not one of the known kinds
    #[error("Unknown artifact type: {0}")]
    UnknownType(String),

    /// Content is missing fields or has the wrong shape for its kind
    #[error("Malformed {kind}: {source}")]
    Malformed {
        kind: ArtifactKind,
        #[source]
        source: serde_json::Error,
    },

    /// Content parsed but breaks a field constraint
    #[error("Invalid {kind}: {field} {reason}")]
    Invalid {
        kind: ArtifactKind,
        field: &'static str,
        reason: &'static str,
    },
}

impl ArtifactError {
    /// The artifact kind, when the type name was recognized.
    pub fn kind(&self) -> Option<ArtifactKind> {
        match self {
            Self::UnknownType(_) => None,
            Self::Malformed { kind, .. } | Self::Invalid { kind, .. } => Some(*kind),
        }
    }
}
