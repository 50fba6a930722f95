//! Generation client.
//!
//! Renders the instruction for a [`Configuration`], sends it to the
//! provider once, and interprets the reply. Every failure is logged with its
//! subkind and then collapsed into a single [`GenerationFailure`].

use std::sync::Arc;

use tracing::{error, info, instrument};

use crate::config::Configuration;
use crate::error::{CoreError, GenerationFailure, ProviderError};
use crate::prompt::render_instruction;
use crate::provider::GenerationProvider;
use crate::result::GenerationResult;

/// Turns configurations into generated artifacts through a provider.
#[derive(Debug)]
pub struct GenerationClient {
    prompt_manager: pyrtf_pm::PromptManager,
    provider: Arc<dyn GenerationProvider>,
}

impl GenerationClient {
    /// Create a client from a prompt manager and a provider.
    pub fn new(prompt_manager: pyrtf_pm::PromptManager, provider: Arc<dyn GenerationProvider>) -> Self {
        Self {
            prompt_manager,
            provider,
        }
    }

    /// Render the instruction that [`generate`](Self::generate) would send.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Prompt` if the template cannot be rendered.
    pub fn instruction(&self, config: &Configuration) -> Result<String, CoreError> {
        render_instruction(&self.prompt_manager, config)
    }

    /// Returns the provider used by this client.
    pub fn provider(&self) -> &dyn GenerationProvider {
        self.provider.as_ref()
    }

    /// Generate artifacts for `config` with a single provider request.
    ///
    /// Responses that are valid JSON but miss fields succeed with
    /// placeholders. No retry is attempted.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationFailure`] for prompt rendering errors, transport
    /// errors, non-success statuses and unparseable bodies alike.
    #[instrument(skip_all, fields(provider = self.provider.name(), model = self.provider.model()))]
    pub async fn generate(&self, config: &Configuration) -> Result<GenerationResult, GenerationFailure> {
        let prompt = self.instruction(config).map_err(|e| {
            error!(kind = "prompt", error = %e, "failed to render instruction");
            GenerationFailure::default()
        })?;

        let text = self
            .provider
            .complete(&prompt)
            .await
            .map_err(|e| log_failure(&e))?;

        let result = GenerationResult::from_response_text(&text).map_err(|e| log_failure(&e))?;

        info!(
            code_len = result.code.len(),
            requirements_len = result.requirements.len(),
            instructions_len = result.instructions.len(),
            "generation completed"
        );
        Ok(result)
    }
}

fn log_failure(e: &ProviderError) -> GenerationFailure {
    error!(kind = e.kind(), error = %e, "generation failed");
    GenerationFailure::default()
}
