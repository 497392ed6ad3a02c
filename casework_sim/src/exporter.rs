//! JSON exporter for run results.
//!
//! Writes every run of a CLI invocation, with its summary, to one file.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::metrics::{compute_run_summary, RunSummary};
use crate::runner::RunResult;

/// One run and its summary.
#[derive(Debug, Clone, Serialize)]
pub struct ExportedRun {
    pub summary: RunSummary,
    pub result: RunResult,
}

/// Complete export.
#[derive(Debug, Clone, Serialize)]
pub struct RunExport {
    /// Tool name and version
    pub generator: String,

    /// Every run, in execution order
    pub runs: Vec<ExportedRun>,

    /// True when no run recorded a case error
    pub passed: bool,
}

impl Default for RunExport {
    fn default() -> Self {
        Self::new()
    }
}

impl RunExport {
    /// Creates a new export container.
    pub fn new() -> Self {
        Self {
            generator: format!("casework-sim {}", env!("CARGO_PKG_VERSION")),
            runs: Vec::new(),
            passed: true,
        }
    }

    /// Adds a run, computing its summary.
    pub fn add_run(&mut self, result: RunResult) {
        self.passed &= result.passed();
        self.runs.push(ExportedRun {
            summary: compute_run_summary(&result),
            result,
        });
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
