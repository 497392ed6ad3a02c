//! Casework Deterministic Simulation Harness
//!
//! Generates synthetic SNAP applicants from a single 64-bit seed, replays
//! scripted caseworker timelines through the `casework_core` state machine and
//! checks each completed case against the eligibility oracle.
//!
//! # Pipeline
//!
//! ```text
//! seed ──► generator ──► SyntheticCase ──► runner (script + transition)
//!                                               │
//!                              CaseResult ◄─────┤ oracle + comparator
//!                                               ▼
//!                                 RunResult ──► metrics / exporter
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use casework_sim::{compute_run_summary, RunConfig, ScenarioRunner};
//!
//! let runner = ScenarioRunner::from_config(&RunConfig::default())?;
//! let result = runner.run(casework_sim::ScenarioId::MissingDocs);
//! let summary = compute_run_summary(&result);
//! ```

pub mod config;
pub mod exporter;
pub mod generator;
pub mod metrics;
pub mod runner;
pub mod scenarios;
pub mod script;

pub use config::{seed_from_clock, RunConfig};
pub use exporter::{ExportedRun, RunExport};
pub use generator::{generate, SyntheticCase};
pub use metrics::{compute_run_summary, RunSummary};
pub use runner::{CaseError, CaseEvent, CaseResult, OracleReview, RunResult, ScenarioRunner, SlaBreach};
pub use scenarios::{AppealVariant, CaseProfile, MissingDocsVariant, Outcome, ScenarioId};
