//! Template source type used by the prompt manager.

use serde::{Deserialize, Serialize};

/// A named prompt template and its Jinja2 source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
    /// Template name used for lookup (e.g., `generate/task`).
    pub name: String,

    /// Raw Jinja2 template source.
    pub source: String,
}

impl PromptTemplate {
    /// Create a template from a name and source.
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }
}
