mod client;
mod config;
mod engine;
mod error;
mod events;
mod gemini;
pub mod prompt;
mod provider;
mod result;
mod session;

pub use client::GenerationClient;
pub use config::{
    ConfigField, ConfigUpdate, Configuration, DEFAULT_CONFIG_YAML, EngineConfig, ProjectConfig,
    PromptsConfig, ProviderConfig, SortingStrategy, load_configuration, load_project_config,
    write_default_config,
};
pub use engine::Engine;
pub use error::{CoreError, GENERATION_FAILURE_MESSAGE, GenerationFailure, ProviderError};
pub use events::{GenerationEvent, GenerationStream};
pub use gemini::GeminiProvider;
pub use provider::GenerationProvider;
pub use result::{
    Artifact, CODE_PLACEHOLDER, GenerationResult, INSTRUCTIONS_PLACEHOLDER,
    REQUIREMENTS_PLACEHOLDER,
};
pub use session::{GenerationSession, GenerationStatus, SessionSnapshot};

pub use pyrtf_pm::{PmError, PromptManager, PromptTemplate};
