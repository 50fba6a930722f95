use thiserror::Error;

/// Errors raised while loading or rendering prompt templates.
#[derive(Debug, Error)]
pub enum PmError {
    #[error("prompt template not found: {0}")]
    TemplateNotFound(String),

    /// Rendering failed, typically on a variable missing from the context.
    #[error("failed to render prompt template {name}: {source}")]
    Render {
        name: String,
        #[source]
        source: minijinja::Error,
    },

    #[error("invalid prompt template {name}: {source}")]
    InvalidTemplate {
        name: String,
        #[source]
        source: minijinja::Error,
    },

    #[error("failed to read prompt templates: {0}")]
    Io(#[from] std::io::Error),
}

impl PmError {
    pub(crate) fn invalid(name: &str, source: minijinja::Error) -> Self {
        Self::InvalidTemplate {
            name: name.to_owned(),
            source,
        }
    }
}
