//! Configuration types for pyrtf-core.
//!
//! This module defines the [`Configuration`] record describing the utility to
//! generate, the [`ConfigUpdate`] operation that replaces exactly one of its
//! fields, and the ambient settings: [`EngineConfig`] (CLI-level overrides)
//! and [`ProjectConfig`] (from `.pyrtf/config.yaml`). CLI flags in
//! `EngineConfig` take precedence over values read from `ProjectConfig`.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::error::CoreError;

// ── Target Utility Configuration ─────────────────────────────

/// Description of the RTF-to-PDF utility the provider should generate.
///
/// A `Configuration` is a value: edits produce a new value through
/// [`with_update`](Configuration::with_update) rather than mutating fields in
/// place. Every field has a default, so deserializing a partial document
/// still yields a fully populated record.
///
/// No range checks happen here. Consumers must tolerate values such as a
/// `toc_depth` outside `1..=5`.
///
/// # Examples
///
/// ```
/// use pyrtf_core::{ConfigUpdate, Configuration, SortingStrategy};
///
/// let config = Configuration::default()
///     .with_update(ConfigUpdate::SortingStrategy(SortingStrategy::SeparateFiles));
/// assert_eq!(config.sorting_strategy, SortingStrategy::SeparateFiles);
/// assert_eq!(config.app_name, "RTF Merger Pro");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Configuration {
    /// Display name of the generated application.
    pub app_name: String,

    /// File suffix to scan for (e.g. `.rtf`).
    pub source_extension: String,

    /// Whether the output PDF gets a table of contents.
    #[serde(rename = "includeTOC")]
    pub include_toc: bool,

    /// Table of contents depth, meaningful only when `include_toc` is set.
    pub toc_depth: u8,

    /// How detected documents are ordered and grouped.
    pub sorting_strategy: SortingStrategy,

    /// Detect and handle tables.
    pub handle_tables: bool,

    /// Detect and handle figures.
    pub handle_figures: bool,

    /// Detect and handle listings.
    pub handle_listings: bool,

    /// Prefer the MS Word (win32com) conversion engine.
    pub use_win32_com: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            app_name: "RTF Merger Pro".to_owned(),
            source_extension: ".rtf".to_owned(),
            include_toc: true,
            toc_depth: 3,
            sorting_strategy: SortingStrategy::Combined,
            handle_tables: true,
            handle_figures: true,
            handle_listings: true,
            use_win32_com: true,
        }
    }
}

impl Configuration {
    /// Minimum meaningful table of contents depth.
    pub const MIN_TOC_DEPTH: u8 = 1;

    /// Maximum meaningful table of contents depth.
    pub const MAX_TOC_DEPTH: u8 = 5;

    /// Return a new configuration with exactly the field named by `update`
    /// replaced.
    #[must_use]
    pub fn with_update(&self, update: ConfigUpdate) -> Self {
        let mut next = self.clone();
        match update {
            ConfigUpdate::AppName(v) => next.app_name = v,
            ConfigUpdate::SourceExtension(v) => next.source_extension = v,
            ConfigUpdate::IncludeToc(v) => next.include_toc = v,
            ConfigUpdate::TocDepth(v) => next.toc_depth = v,
            ConfigUpdate::SortingStrategy(v) => next.sorting_strategy = v,
            ConfigUpdate::HandleTables(v) => next.handle_tables = v,
            ConfigUpdate::HandleFigures(v) => next.handle_figures = v,
            ConfigUpdate::HandleListings(v) => next.handle_listings = v,
            ConfigUpdate::UseWin32Com(v) => next.use_win32_com = v,
        }
        next
    }
}

/// Policy for ordering and grouping detected content in the generated PDF.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortingStrategy {
    /// One PDF, all documents sorted by numeric ID.
    #[default]
    Combined,
    /// One PDF per content type.
    SeparateFiles,
    /// One PDF with a section per content type.
    SeparateSections,
}

impl SortingStrategy {
    /// All strategies in display order.
    pub const ALL: [SortingStrategy; 3] = [
        SortingStrategy::Combined,
        SortingStrategy::SeparateFiles,
        SortingStrategy::SeparateSections,
    ];

    /// Human-readable label shown in the form.
    pub fn label(self) -> &'static str {
        match self {
            Self::Combined => "Single Combined PDF (Sorted by ID)",
            Self::SeparateFiles => "Separate PDF Files (Tables.pdf, Figures.pdf...)",
            Self::SeparateSections => "Single PDF with Separated Sections",
        }
    }

    /// The strategy after this one, wrapping around.
    #[must_use]
    pub fn next(self) -> Self {
        match self {
            Self::Combined => Self::SeparateFiles,
            Self::SeparateFiles => Self::SeparateSections,
            Self::SeparateSections => Self::Combined,
        }
    }

    /// The strategy before this one, wrapping around.
    #[must_use]
    pub fn previous(self) -> Self {
        match self {
            Self::Combined => Self::SeparateSections,
            Self::SeparateFiles => Self::Combined,
            Self::SeparateSections => Self::SeparateFiles,
        }
    }
}

impl fmt::Display for SortingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single-field change to a [`Configuration`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigUpdate {
    AppName(String),
    SourceExtension(String),
    IncludeToc(bool),
    TocDepth(u8),
    SortingStrategy(SortingStrategy),
    HandleTables(bool),
    HandleFigures(bool),
    HandleListings(bool),
    UseWin32Com(bool),
}

impl ConfigUpdate {
    /// The field this update replaces.
    pub fn field(&self) -> ConfigField {
        match self {
            Self::AppName(_) => ConfigField::AppName,
            Self::SourceExtension(_) => ConfigField::SourceExtension,
            Self::IncludeToc(_) => ConfigField::IncludeToc,
            Self::TocDepth(_) => ConfigField::TocDepth,
            Self::SortingStrategy(_) => ConfigField::SortingStrategy,
            Self::HandleTables(_) => ConfigField::HandleTables,
            Self::HandleFigures(_) => ConfigField::HandleFigures,
            Self::HandleListings(_) => ConfigField::HandleListings,
            Self::UseWin32Com(_) => ConfigField::UseWin32Com,
        }
    }
}

/// Identifies one [`Configuration`] field, in form order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigField {
    AppName,
    SourceExtension,
    HandleTables,
    HandleFigures,
    HandleListings,
    SortingStrategy,
    IncludeToc,
    TocDepth,
    UseWin32Com,
}

impl ConfigField {
    /// All fields in the order the form presents them.
    pub const ALL: [ConfigField; 9] = [
        ConfigField::AppName,
        ConfigField::SourceExtension,
        ConfigField::HandleTables,
        ConfigField::HandleFigures,
        ConfigField::HandleListings,
        ConfigField::SortingStrategy,
        ConfigField::IncludeToc,
        ConfigField::TocDepth,
        ConfigField::UseWin32Com,
    ];

    /// Form label for this field.
    pub fn label(self) -> &'static str {
        match self {
            Self::AppName => "Application Name",
            Self::SourceExtension => "Extension to Scan",
            Self::HandleTables => "Tables",
            Self::HandleFigures => "Figures",
            Self::HandleListings => "Listings",
            Self::SortingStrategy => "Sorting Strategy",
            Self::IncludeToc => "Include Table of Contents",
            Self::TocDepth => "TOC Depth",
            Self::UseWin32Com => "Use MS Word Engine (win32com)",
        }
    }

    /// Returns whether this field holds free text.
    pub fn is_text(self) -> bool {
        matches!(self, Self::AppName | Self::SourceExtension)
    }

    /// Build the update that stores `value` in this field. `None` for
    /// fields that are not free text.
    pub fn text_update(self, value: String) -> Option<ConfigUpdate> {
        match self {
            Self::AppName => Some(ConfigUpdate::AppName(value)),
            Self::SourceExtension => Some(ConfigUpdate::SourceExtension(value)),
            _ => None,
        }
    }

    /// Render this field's current value in `config` for display.
    pub fn display_value(self, config: &Configuration) -> String {
        let flag = |b: bool| if b { "[x]" } else { "[ ]" }.to_owned();
        match self {
            Self::AppName => config.app_name.clone(),
            Self::SourceExtension => config.source_extension.clone(),
            Self::HandleTables => flag(config.handle_tables),
            Self::HandleFigures => flag(config.handle_figures),
            Self::HandleListings => flag(config.handle_listings),
            Self::SortingStrategy => config.sorting_strategy.label().to_owned(),
            Self::IncludeToc => flag(config.include_toc),
            Self::TocDepth => config.toc_depth.to_string(),
            Self::UseWin32Com => flag(config.use_win32_com),
        }
    }
}

// ── Engine Configuration (CLI-level) ─────────────────────────

/// Engine configuration provided by the CLI layer.
///
/// Contains the working directory and optional overrides for the provider
/// model and API key variable. These take precedence over [`ProjectConfig`]
/// read from `.pyrtf/config.yaml`.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use pyrtf_core::EngineConfig;
///
/// let config = EngineConfig::builder()
///     .work_dir(PathBuf::from("/tmp/project"))
///     .model("gemini-2.5-pro")
///     .build();
/// assert_eq!(config.model(), Some("gemini-2.5-pro"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
pub struct EngineConfig {
    /// Directory holding `.pyrtf/` and the default output directory.
    work_dir: PathBuf,

    /// Override the provider model (takes precedence over config.yaml).
    #[builder(default, setter(strip_option(fallback = model_opt), into))]
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,

    /// Override the API key environment variable name.
    #[builder(default, setter(strip_option(fallback = api_key_env_opt), into))]
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key_env: Option<String>,
}

impl EngineConfig {
    /// Returns the working directory.
    pub fn work_dir(&self) -> &PathBuf {
        &self.work_dir
    }

    /// Returns the model override, if set.
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// Returns the API key environment variable override, if set.
    pub fn api_key_env(&self) -> Option<&str> {
        self.api_key_env.as_deref()
    }

    /// Returns the `.pyrtf` directory path.
    pub fn pyrtf_dir(&self) -> PathBuf {
        self.work_dir.join(".pyrtf")
    }

    /// Returns the path to `config.yaml` inside the `.pyrtf` directory.
    pub fn config_path(&self) -> PathBuf {
        self.pyrtf_dir().join("config.yaml")
    }

    /// Returns the log directory.
    pub fn logs_dir(&self) -> PathBuf {
        self.pyrtf_dir().join("logs")
    }

    /// Returns the default directory generated artifacts are saved to.
    pub fn output_dir(&self) -> PathBuf {
        self.work_dir.join("pyrtf-output")
    }
}

// ── Project Configuration (.pyrtf/config.yaml) ───────────────

/// Project-level settings, deserialized from `.pyrtf/config.yaml`.
///
/// All fields have serde defaults so that missing keys in the YAML file
/// produce valid settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    /// Generation provider settings.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Prompt template search paths.
    #[serde(default)]
    pub prompts: PromptsConfig,

    /// Initial values for the configuration form.
    #[serde(default)]
    pub defaults: Configuration,
}

/// Settings for the Gemini generation provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,

    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// API base URL, without the `/models/...` suffix.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Thinking token budget passed to the model.
    #[serde(default = "default_thinking_budget")]
    pub thinking_budget: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            thinking_budget: default_thinking_budget(),
        }
    }
}

/// Prompt template configuration.
///
/// Templates found in these directories replace built-in templates with the
/// same name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptsConfig {
    /// Additional template directories to search (in order).
    #[serde(default)]
    pub include: Vec<PathBuf>,
}

// ── Default value functions for serde ────────────────────────

fn default_model() -> String {
    "gemini-3-pro-preview".to_owned()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_owned()
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_owned()
}

fn default_thinking_budget() -> u32 {
    2048
}

// ── Config loading ───────────────────────────────────────────

/// Commented default written by `pyrtf init`.
pub const DEFAULT_CONFIG_YAML: &str = r#"# PyRTF2PDF Generator configuration
# Every key is optional.

provider:
  model: gemini-3-pro-preview
  apiKeyEnv: GEMINI_API_KEY
  # baseUrl: https://generativelanguage.googleapis.com/v1beta
  thinkingBudget: 2048

prompts:
  # Directories with template overrides, e.g. generate/task.j2
  include: []

# Initial values for the configuration form.
defaults:
  appName: RTF Merger Pro
  sourceExtension: .rtf
  includeTOC: true
  tocDepth: 3
  sortingStrategy: COMBINED
  handleTables: true
  handleFigures: true
  handleListings: true
  useWin32Com: true
"#;

/// Load [`ProjectConfig`] from a `config.yaml` file.
///
/// If the file does not exist, returns the default configuration.
///
/// # Errors
///
/// Returns `CoreError::Io` if the file exists but cannot be read.
/// Returns `CoreError::Yaml` if the file contains invalid YAML.
pub fn load_project_config(config_path: &Path) -> Result<ProjectConfig, CoreError> {
    if !config_path.exists() {
        return Ok(ProjectConfig::default());
    }
    let content = std::fs::read_to_string(config_path)?;
    if content.trim().is_empty() {
        return Ok(ProjectConfig::default());
    }
    let config: ProjectConfig = serde_yaml::from_str(&content)?;
    Ok(config)
}

/// Write [`DEFAULT_CONFIG_YAML`] to `config_path`, creating parent
/// directories.
///
/// # Errors
///
/// Returns `CoreError::Config` if the file already exists and
/// `CoreError::Io` if it cannot be written.
pub fn write_default_config(config_path: &Path) -> Result<(), CoreError> {
    if config_path.exists() {
        return Err(CoreError::Config(format!(
            "{} already exists",
            config_path.display()
        )));
    }
    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(config_path, DEFAULT_CONFIG_YAML)?;
    Ok(())
}

/// Load a [`Configuration`] from a JSON or YAML file, chosen by extension.
///
/// Missing keys take their defaults.
///
/// # Errors
///
/// Returns `CoreError::Io`, `CoreError::Json` or `CoreError::Yaml` when the
/// file cannot be read or parsed.
pub fn load_configuration(path: &Path) -> Result<Configuration, CoreError> {
    let content = std::fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        Ok(serde_json::from_str(&content)?)
    } else {
        Ok(serde_yaml::from_str(&content)?)
    }
}
