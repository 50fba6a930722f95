//! Generated artifacts.
//!
//! [`GenerationResult`] holds the three strings returned by the provider.
//! Parsing is lenient: any field the provider leaves out (or sends as
//! something other than a non-empty string) is replaced by a fixed
//! placeholder, so a result is always fully populated.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{CoreError, ProviderError};

pub const CODE_PLACEHOLDER: &str = "# Error generating code";
pub const REQUIREMENTS_PLACEHOLDER: &str = "# Error generating requirements";
pub const INSTRUCTIONS_PLACEHOLDER: &str = "Error generating instructions";

/// The three-part artifact produced by one successful generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Generated Python program source.
    pub code: String,

    /// `requirements.txt` content.
    pub requirements: String,

    /// Markdown setup and build guide.
    pub instructions: String,
}

impl GenerationResult {
    /// Interpret a provider response body.
    ///
    /// The body must be valid JSON other than `null`. Object fields that are
    /// missing, `null`, empty or not strings take their placeholders; any
    /// non-object value yields a result made entirely of placeholders.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::MalformedResponse` if the body is not JSON or
    /// is JSON `null`.
    pub fn from_response_text(text: &str) -> Result<Self, ProviderError> {
        let value: serde_json::Value = serde_json::from_str(text.trim())
            .map_err(|e| ProviderError::MalformedResponse(format!("response is not JSON: {e}")))?;

        if value.is_null() {
            return Err(ProviderError::MalformedResponse(
                "response is JSON null".to_owned(),
            ));
        }

        let field = |key: &str, placeholder: &str| -> String {
            value
                .get(key)
                .and_then(serde_json::Value::as_str)
                .filter(|s| !s.is_empty())
                .unwrap_or(placeholder)
                .to_owned()
        };

        Ok(Self {
            code: field("code", CODE_PLACEHOLDER),
            requirements: field("requirements", REQUIREMENTS_PLACEHOLDER),
            instructions: field("instructions", INSTRUCTIONS_PLACEHOLDER),
        })
    }

    /// Returns the content shown on the given tab.
    pub fn artifact(&self, artifact: Artifact) -> &str {
        match artifact {
            Artifact::Code => &self.code,
            Artifact::Requirements => &self.requirements,
            Artifact::Instructions => &self.instructions,
        }
    }

    /// Write every artifact into `dir`, creating it if needed.
    ///
    /// Returns the written paths in tab order.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Io` if the directory or a file cannot be written.
    #[instrument(skip(self))]
    pub fn write_to_dir(&self, dir: &Path) -> Result<Vec<PathBuf>, CoreError> {
        fs::create_dir_all(dir)?;

        let mut written = Vec::with_capacity(Artifact::ALL.len());
        for artifact in Artifact::ALL {
            let path = dir.join(artifact.file_name());
            fs::write(&path, self.artifact(artifact))?;
            debug!(path = %path.display(), "wrote artifact");
            written.push(path);
        }
        Ok(written)
    }
}

/// One tab of the artifact viewer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Artifact {
    #[default]
    Code,
    Requirements,
    Instructions,
}

impl Artifact {
    /// All tabs in display order.
    pub const ALL: [Artifact; 3] = [
        Artifact::Code,
        Artifact::Requirements,
        Artifact::Instructions,
    ];

    /// Tab title.
    pub fn title(self) -> &'static str {
        match self {
            Self::Code => "main.py",
            Self::Requirements => "requirements.txt",
            Self::Instructions => "Instructions",
        }
    }

    /// File name used when saving to disk.
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Code => "main.py",
            Self::Requirements => "requirements.txt",
            Self::Instructions => "INSTRUCTIONS.md",
        }
    }

    /// The tab after this one, wrapping around.
    #[must_use]
    pub fn next(self) -> Self {
        match self {
            Self::Code => Self::Requirements,
            Self::Requirements => Self::Instructions,
            Self::Instructions => Self::Code,
        }
    }

    /// Zero-based tab index.
    pub fn index(self) -> usize {
        match self {
            Self::Code => 0,
            Self::Requirements => 1,
            Self::Instructions => 2,
        }
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}
