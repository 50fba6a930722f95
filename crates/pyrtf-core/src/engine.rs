//! Core execution engine.
//!
//! The [`Engine`] is the main entry point for pyrtf-core. It loads settings,
//! builds the prompt manager and provider, and exposes foreground and
//! background generation to the CLI.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, instrument};

use crate::client::GenerationClient;
use crate::config::{Configuration, EngineConfig, ProjectConfig, load_project_config};
use crate::error::{CoreError, GenerationFailure};
use crate::events::{GenerationEvent, GenerationStream};
use crate::gemini::GeminiProvider;
use crate::provider::GenerationProvider;
use crate::result::GenerationResult;

/// Channel buffer size for generation events.
const EVENT_CHANNEL_SIZE: usize = 8;

/// Engine that drives generation requests.
///
/// # Examples
///
/// ```no_run
/// use std::path::PathBuf;
/// use pyrtf_core::{Engine, EngineConfig};
///
/// # async fn example() -> Result<(), pyrtf_core::CoreError> {
/// let config = EngineConfig::builder()
///     .work_dir(PathBuf::from("."))
///     .build();
///
/// let engine = Engine::new(config)?;
/// let result = engine.generate(&engine.default_configuration()).await?;
/// println!("{}", result.code);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Engine {
    /// CLI-level configuration.
    config: EngineConfig,
    /// Project-level settings from `.pyrtf/config.yaml`, with CLI overrides
    /// applied.
    project_config: ProjectConfig,
    /// Generation client, shared with background tasks.
    client: Arc<GenerationClient>,
}

impl Engine {
    /// Create an engine backed by the Gemini provider.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Yaml` or `CoreError::Io` if the settings file is
    /// invalid, `CoreError::Prompt` if templates cannot be loaded, and
    /// `CoreError::Config` if the HTTP client cannot be built.
    #[instrument(skip_all)]
    pub fn new(config: EngineConfig) -> Result<Self, CoreError> {
        let project_config = resolve_project_config(&config)?;
        let provider = GeminiProvider::from_config(&project_config.provider)
            .map_err(|e| CoreError::Config(e.to_string()))?;

        Self::build(config, project_config, Arc::new(provider))
    }

    /// Create an engine with an explicit provider.
    ///
    /// # Errors
    ///
    /// Same as [`Engine::new`], minus provider construction.
    pub fn with_provider(
        config: EngineConfig,
        provider: Arc<dyn GenerationProvider>,
    ) -> Result<Self, CoreError> {
        let project_config = resolve_project_config(&config)?;
        Self::build(config, project_config, provider)
    }

    fn build(
        config: EngineConfig,
        project_config: ProjectConfig,
        provider: Arc<dyn GenerationProvider>,
    ) -> Result<Self, CoreError> {
        let mut pm = pyrtf_pm::PromptManager::new()?;

        for dir in &project_config.prompts.include {
            let resolved = if dir.is_absolute() {
                dir.clone()
            } else {
                config.work_dir().join(dir)
            };
            if resolved.is_dir() {
                pm.load_dir(&resolved)?;
                debug!(dir = %resolved.display(), "loaded custom prompt directory");
            }
        }

        info!(
            work_dir = %config.work_dir().display(),
            provider = provider.name(),
            model = provider.model(),
            "engine ready"
        );

        Ok(Self {
            config,
            project_config,
            client: Arc::new(GenerationClient::new(pm, provider)),
        })
    }

    /// Returns a reference to the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns a reference to the resolved project configuration.
    pub fn project_config(&self) -> &ProjectConfig {
        &self.project_config
    }

    /// Returns the generation client.
    pub fn client(&self) -> &GenerationClient {
        &self.client
    }

    /// Initial form values from the settings file.
    pub fn default_configuration(&self) -> Configuration {
        self.project_config.defaults.clone()
    }

    /// Render the instruction for `config` without contacting the provider.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Prompt` if rendering fails.
    pub fn instruction(&self, config: &Configuration) -> Result<String, CoreError> {
        self.client.instruction(config)
    }

    /// Generate artifacts in the foreground.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationFailure`] on any provider or parse failure.
    pub async fn generate(&self, config: &Configuration) -> Result<GenerationResult, GenerationFailure> {
        self.client.generate(config).await
    }

    /// Run one generation on a background task.
    ///
    /// The returned stream yields [`GenerationEvent::Started`] and then
    /// exactly one terminal event.
    pub fn spawn_generation(&self, config: Configuration) -> GenerationStream {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_SIZE);
        let client = Arc::clone(&self.client);

        tokio::spawn(async move {
            let started = GenerationEvent::Started {
                provider: client.provider().name().to_owned(),
                model: client.provider().model().to_owned(),
            };
            if event_tx.send(started).await.is_err() {
                debug!("generation stream dropped before start");
                return;
            }

            let event = match client.generate(&config).await {
                Ok(result) => GenerationEvent::Completed(result),
                Err(failure) => GenerationEvent::Failed(failure),
            };
            if event_tx.send(event).await.is_err() {
                debug!("generation stream dropped before outcome");
            }
        });

        GenerationStream::new(event_rx)
    }
}

/// Load settings and apply CLI overrides.
fn resolve_project_config(config: &EngineConfig) -> Result<ProjectConfig, CoreError> {
    let mut project_config = load_project_config(&config.config_path())?;

    if let Some(model) = config.model() {
        project_config.provider.model = model.to_owned();
    }
    if let Some(env) = config.api_key_env() {
        project_config.provider.api_key_env = env.to_owned();
    }
    Ok(project_config)
}
