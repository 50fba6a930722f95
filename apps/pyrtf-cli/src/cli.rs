use std::io::Write as _;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use pyrtf_core::{
    ConfigUpdate, Configuration, Engine, EngineConfig, GenerationSession, GenerationStatus,
    SortingStrategy, load_configuration, write_default_config,
};
use tracing::info;

use crate::tui::App;

#[derive(Debug, Parser)]
#[command(
    name = "pyrtf",
    about = "Generate a Windows RTF-to-PDF utility with Gemini"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Open the interactive configuration form and artifact viewer
    Tui {
        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Generate the utility once and print or save the artifacts
    Generate {
        #[command(flatten)]
        engine: EngineArgs,

        #[command(flatten)]
        form: FormArgs,

        /// Write main.py, requirements.txt and INSTRUCTIONS.md into this directory
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Print the result as a JSON object
        #[arg(long, conflicts_with = "out")]
        json: bool,
    },

    /// Print the instruction that would be sent, without calling the provider
    Prompt {
        #[command(flatten)]
        engine: EngineArgs,

        #[command(flatten)]
        form: FormArgs,
    },

    /// Write a default .pyrtf/config.yaml
    Init {
        /// Working directory (defaults to current directory)
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },
}

/// Options shared by every command that builds an engine.
#[derive(Debug, Clone, Args)]
pub struct EngineArgs {
    /// Working directory holding .pyrtf/ (defaults to current directory)
    #[arg(short, long, default_value = ".")]
    pub dir: PathBuf,

    /// Override the Gemini model
    #[arg(short, long)]
    pub model: Option<String>,

    /// Override the environment variable holding the API key
    #[arg(long)]
    pub api_key_env: Option<String>,
}

impl EngineArgs {
    fn engine_config(&self) -> EngineConfig {
        EngineConfig::builder()
            .work_dir(self.dir.clone())
            .model_opt(self.model.clone())
            .api_key_env_opt(self.api_key_env.clone())
            .build()
    }
}

/// Configuration form values given as flags.
///
/// Flags are applied on top of `--config` (or the settings defaults).
#[derive(Debug, Clone, Default, Args)]
pub struct FormArgs {
    /// Load form values from a JSON or YAML file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Application name
    #[arg(long)]
    pub app_name: Option<String>,

    /// File extension to scan for
    #[arg(long)]
    pub extension: Option<String>,

    /// Sorting strategy
    #[arg(long, value_enum)]
    pub strategy: Option<StrategyArg>,

    /// Table of contents depth (1-5)
    #[arg(long)]
    pub toc_depth: Option<u8>,

    /// Do not generate a table of contents
    #[arg(long)]
    pub no_toc: bool,

    /// Do not handle tables
    #[arg(long)]
    pub no_tables: bool,

    /// Do not handle figures
    #[arg(long)]
    pub no_figures: bool,

    /// Do not handle listings
    #[arg(long)]
    pub no_listings: bool,

    /// Prefer a cross-platform engine over MS Word (win32com)
    #[arg(long)]
    pub portable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyArg {
    Combined,
    SeparateFiles,
    SeparateSections,
}

impl From<StrategyArg> for SortingStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Combined => SortingStrategy::Combined,
            StrategyArg::SeparateFiles => SortingStrategy::SeparateFiles,
            StrategyArg::SeparateSections => SortingStrategy::SeparateSections,
        }
    }
}

impl FormArgs {
    /// Build the configuration: file (or `base`), then flags.
    pub fn resolve(&self, base: Configuration) -> Result<Configuration> {
        let mut config = match &self.config {
            Some(path) => load_configuration(path)
                .with_context(|| format!("failed to load configuration: {}", path.display()))?,
            None => base,
        };

        for update in self.updates() {
            config = config.with_update(update);
        }
        Ok(config)
    }

    fn updates(&self) -> Vec<ConfigUpdate> {
        let mut updates = Vec::new();
        if let Some(name) = &self.app_name {
            updates.push(ConfigUpdate::AppName(name.clone()));
        }
        if let Some(ext) = &self.extension {
            updates.push(ConfigUpdate::SourceExtension(ext.clone()));
        }
        if let Some(strategy) = self.strategy {
            updates.push(ConfigUpdate::SortingStrategy(strategy.into()));
        }
        if let Some(depth) = self.toc_depth {
            updates.push(ConfigUpdate::TocDepth(depth));
        }
        if self.no_toc {
            updates.push(ConfigUpdate::IncludeToc(false));
        }
        if self.no_tables {
            updates.push(ConfigUpdate::HandleTables(false));
        }
        if self.no_figures {
            updates.push(ConfigUpdate::HandleFigures(false));
        }
        if self.no_listings {
            updates.push(ConfigUpdate::HandleListings(false));
        }
        if self.portable {
            updates.push(ConfigUpdate::UseWin32Com(false));
        }
        updates
    }
}

/// Where a command's logs go.
#[derive(Debug, Clone)]
pub struct LogContext {
    /// Working directory holding `.pyrtf/`.
    pub work_dir: PathBuf,
    /// Subdirectory name under `.pyrtf/logs/`.
    pub command: &'static str,
    /// Whether to log to stderr as well as the file.
    pub stderr: bool,
}

impl Cli {
    /// Extract the logging context before the command is consumed.
    pub fn log_context(&self) -> LogContext {
        let (work_dir, command, stderr) = match &self.command {
            Commands::Tui { engine } => (engine.dir.clone(), "tui", false),
            Commands::Generate { engine, .. } => (engine.dir.clone(), "generate", true),
            Commands::Prompt { engine, .. } => (engine.dir.clone(), "prompt", true),
            Commands::Init { dir } => (dir.clone(), "init", true),
        };
        LogContext {
            work_dir,
            command,
            stderr,
        }
    }

    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Tui { engine } => run_tui(&engine),
            Commands::Generate {
                engine,
                form,
                out,
                json,
            } => run_generate(&engine, &form, out, json).await,
            Commands::Prompt { engine, form } => run_prompt(&engine, &form),
            Commands::Init { dir } => run_init(dir),
        }
    }
}

fn run_tui(args: &EngineArgs) -> Result<()> {
    let engine = Engine::new(args.engine_config()).context("failed to start engine")?;
    let app = App::new(engine);

    let mut terminal = ratatui::init();
    let outcome = tokio::task::block_in_place(|| app.run(&mut terminal));
    ratatui::restore();
    outcome
}

async fn run_generate(
    args: &EngineArgs,
    form: &FormArgs,
    out: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let engine = Engine::new(args.engine_config()).context("failed to start engine")?;
    let config = form.resolve(engine.default_configuration())?;

    let mut session = GenerationSession::new(config.clone());
    let snapshot = session.invoke(engine.client(), config).await?;

    let result = match (snapshot.status, snapshot.result) {
        (GenerationStatus::Completed, Some(result)) => result,
        _ => bail!(
            "{}",
            snapshot
                .error
                .unwrap_or_else(|| pyrtf_core::GENERATION_FAILURE_MESSAGE.to_owned())
        ),
    };

    if let Some(dir) = out {
        let written = result
            .write_to_dir(&dir)
            .with_context(|| format!("failed to write artifacts to {}", dir.display()))?;
        for path in written {
            println!("wrote {}", path.display());
        }
        return Ok(());
    }

    let mut stdout = std::io::stdout().lock();
    if json {
        serde_json::to_writer_pretty(&mut stdout, &result)?;
        writeln!(stdout)?;
    } else {
        for artifact in pyrtf_core::Artifact::ALL {
            writeln!(stdout, "===== {} =====", artifact.title())?;
            writeln!(stdout, "{}", result.artifact(artifact))?;
            writeln!(stdout)?;
        }
    }
    Ok(())
}

fn run_prompt(args: &EngineArgs, form: &FormArgs) -> Result<()> {
    let engine = Engine::new(args.engine_config()).context("failed to start engine")?;
    let config = form.resolve(engine.default_configuration())?;
    let instruction = engine.instruction(&config)?;
    println!("{instruction}");
    Ok(())
}

fn run_init(dir: PathBuf) -> Result<()> {
    let config = EngineConfig::builder().work_dir(dir).build();
    let path = config.config_path();
    write_default_config(&path)?;
    info!(path = %path.display(), "wrote default configuration");
    println!("created {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_parse_generate_flags_into_configuration() {
        let cli = Cli::parse_from([
            "pyrtf",
            "generate",
            "--app-name",
            "Binder",
            "--strategy",
            "separate-sections",
            "--toc-depth",
            "2",
            "--no-figures",
            "--portable",
        ]);

        let Commands::Generate { form, .. } = cli.command else {
            panic!("expected generate command");
        };
        let config = form
            .resolve(Configuration::default())
            .expect("should resolve");

        assert_eq!(config.app_name, "Binder");
        assert_eq!(config.sorting_strategy, SortingStrategy::SeparateSections);
        assert_eq!(config.toc_depth, 2);
        assert!(!config.handle_figures);
        assert!(config.handle_tables);
        assert!(!config.use_win32_com);
        assert!(config.include_toc);
    }

    #[test]
    fn test_should_apply_flags_over_config_file() {
        let dir = tempfile::TempDir::new().expect("should create temp dir");
        let path = dir.path().join("form.json");
        std::fs::write(&path, r#"{"appName": "From File", "tocDepth": 4}"#)
            .expect("should write file");

        let form = FormArgs {
            config: Some(path),
            no_toc: true,
            ..FormArgs::default()
        };
        let config = form
            .resolve(Configuration::default())
            .expect("should resolve");

        assert_eq!(config.app_name, "From File");
        assert_eq!(config.toc_depth, 4);
        assert!(!config.include_toc);
    }

    #[test]
    fn test_should_fail_for_missing_config_file() {
        let form = FormArgs {
            config: Some(PathBuf::from("/nonexistent/form.json")),
            ..FormArgs::default()
        };
        assert!(form.resolve(Configuration::default()).is_err());
    }

    #[test]
    fn test_should_log_tui_to_file_only() {
        let cli = Cli::parse_from(["pyrtf", "tui", "--dir", "/tmp/work"]);
        let ctx = cli.log_context();

        assert_eq!(ctx.work_dir, PathBuf::from("/tmp/work"));
        assert_eq!(ctx.command, "tui");
        assert!(!ctx.stderr);
    }

    #[test]
    fn test_should_build_engine_config_with_overrides() {
        let args = EngineArgs {
            dir: PathBuf::from("/tmp/work"),
            model: Some("gemini-test".to_owned()),
            api_key_env: None,
        };
        let config = args.engine_config();

        assert_eq!(config.model(), Some("gemini-test"));
        assert!(config.api_key_env().is_none());
        assert_eq!(config.work_dir(), &PathBuf::from("/tmp/work"));
    }

    #[test]
    fn test_should_build_engine_config_without_overrides() {
        let args = EngineArgs {
            dir: PathBuf::from("."),
            model: None,
            api_key_env: Some("MY_KEY".to_owned()),
        };
        let config = args.engine_config();

        assert!(config.model().is_none());
        assert_eq!(config.api_key_env(), Some("MY_KEY"));
    }

    #[test]
    fn test_should_init_default_config() {
        let dir = tempfile::TempDir::new().expect("should create temp dir");
        run_init(dir.path().to_path_buf()).expect("should init");
        assert!(dir.path().join(".pyrtf").join("config.yaml").is_file());
        assert!(run_init(dir.path().to_path_buf()).is_err());
    }
}
