//! Casework Core - SNAP Adjudication Engine
//!
//! Pure, synchronous building blocks for a benefits casework simulation:
//! 1. **Policy Pack**: rule tables, SLA windows and citation sources loaded once
//! 2. **State Machine**: role- and guard-checked case status transitions
//! 3. **Eligibility Oracle**: deterministic sixteen-step benefit calculation
//! 4. **Comparator**: classifies disagreements between a workflow and the oracle
//! 5. **Artifacts**: typed case documents and their validation
//!
//! Nothing here performs I/O except [`PolicyPack::load`].

pub mod artifacts;
pub mod citations;
pub mod comparison;
pub mod error;
pub mod oracle;
pub mod policy_pack;
pub mod state_machine;
pub mod types;

// Re-export key types for convenience
pub use artifacts::{validate_artifact, Artifact, ArtifactKind};
pub use citations::{validate_citations, CitationValidation};
pub use comparison::{compare_with_oracle, ComparisonResult, Mismatch, MismatchRecord, OracleComparison, Severity};
pub use error::{ArtifactError, PolicyPackError, TransitionError};
pub use oracle::{compute_eligibility, Determination, OracleInput, OracleOutput};
pub use policy_pack::{PolicyPack, PolicyPackRules, SlaTable, SuaTier, BUILTIN_PACK_ID};
pub use state_machine::{
    transition, Actor, AppealDecision, CaseAction, CaseData, CaseStatus, DeterminationResult,
    GuardResult, PolicyFacts, Role, Transition, TransitionContext,
};
pub use types::{CaseId, EventId, RunId, Timestamp};
