//! Citation validation against a pack's rule index.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationValidation {
    pub valid: bool,
    pub invalid: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Checks that `citations` is non-empty and every id is in `rule_index`.
pub fn validate_citations<S: AsRef<str>>(
    citations: &[S],
    rule_index: &BTreeSet<String>,
) -> CitationValidation {
    if citations.is_empty() {
        return CitationValidation {
            valid: false,
            invalid: Vec::new(),
            error: Some("At least one citation is required".to_string()),
        };
    }

    let invalid: Vec<String> = citations
        .iter()
        .map(AsRef::as_ref)
        .filter(|id| !rule_index.contains(*id))
        .map(str::to_string)
        .collect();

    if invalid.is_empty() {
        CitationValidation {
            valid: true,
            invalid,
            error: None,
        }
    } else {
        let error = format!("Unknown ruleIds: {}", invalid.join(", "));
        CitationValidation {
            valid: false,
            invalid,
            error: Some(error),
        }
    }
}
