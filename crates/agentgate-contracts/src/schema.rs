//! Schema validation report types.
//!
//! The schema validator checks payloads at every pipeline boundary: caller
//! params on entry, mapped params per policy, and each phase's output.

use serde::{Deserialize, Serialize};

/// The result of validating one payload against one schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// True only if the payload matched.
    pub passed: bool,
    /// Every violation found. Empty on pass.
    pub failures: Vec<ValidationFailure>,
}

impl ValidationReport {
    pub fn pass() -> Self {
        Self {
            passed: true,
            failures: Vec::new(),
        }
    }

    /// All failures joined into one line for logs and error messages.
    pub fn summary(&self) -> String {
        self.failures
            .iter()
            .map(|f| format!("[{}] {}", f.path, f.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFailure {
    /// JSON pointer into the payload, empty for the root.
    pub path: String,
    pub message: String,
}
