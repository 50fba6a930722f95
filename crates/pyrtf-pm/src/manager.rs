use std::fs;
use std::path::Path;

use minijinja::{Environment, ErrorKind, UndefinedBehavior};
use tracing::{debug, instrument};

use crate::error::PmError;
use crate::template::PromptTemplate;

/// Templates compiled into the binary, registered by [`PromptManager::new`].
const BUILTIN_TEMPLATES: &[(&str, &str)] = &[(
    "generate/task",
    include_str!("../templates/generate/task.j2"),
)];

/// File extensions recognized by [`PromptManager::load_dir`].
const TEMPLATE_EXTENSIONS: &[&str] = &["j2", "jinja"];

/// Manages prompt templates and renders them with context variables.
///
/// A fresh manager already contains the built-in templates. Templates added
/// later under the same name replace the built-in version, which is how
/// user override directories take effect.
#[derive(Debug)]
pub struct PromptManager {
    env: Environment<'static>,
}

impl PromptManager {
    /// Create a manager with the built-in templates registered.
    ///
    /// # Errors
    ///
    /// Returns `PmError::InvalidTemplate` if a built-in template fails to parse.
    pub fn new() -> Result<Self, PmError> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);

        for &(name, source) in BUILTIN_TEMPLATES {
            env.add_template(name, source)
                .map_err(|e| PmError::invalid(name, e))?;
        }

        Ok(Self { env })
    }

    /// Load all `.j2` / `.jinja` templates from a directory, recursively.
    ///
    /// Each file is registered under its path relative to `dir`, with `/`
    /// separators and without the extension, so `generate/task.j2` overrides
    /// the built-in `generate/task`. Returns the number of templates loaded.
    ///
    /// # Errors
    ///
    /// Returns `PmError::Io` if the directory cannot be read and
    /// `PmError::InvalidTemplate` if a file does not parse.
    #[instrument(skip(self))]
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, PmError> {
        let mut templates = Vec::new();
        collect_templates(dir, dir, &mut templates)?;

        let count = templates.len();
        for template in templates {
            self.add_template(template)?;
        }
        debug!(dir = %dir.display(), count, "loaded template directory");
        Ok(count)
    }

    /// Register a single template, replacing any template with the same name.
    ///
    /// # Errors
    ///
    /// Returns `PmError::InvalidTemplate` if the source does not parse.
    pub fn add_template(&mut self, template: PromptTemplate) -> Result<(), PmError> {
        let PromptTemplate { name, source } = template;
        self.env
            .add_template_owned(name.clone(), source)
            .map_err(|e| PmError::invalid(&name, e))
    }

    /// Render a template by name with the given context.
    ///
    /// # Errors
    ///
    /// Returns `PmError::TemplateNotFound` for unknown names and
    /// `PmError::Render` when rendering fails (including references to
    /// undefined variables).
    pub fn render(&self, name: &str, ctx: &serde_json::Value) -> Result<String, PmError> {
        let template = self.env.get_template(name).map_err(|e| match e.kind() {
            ErrorKind::TemplateNotFound => PmError::TemplateNotFound(name.to_owned()),
            _ => PmError::invalid(name, e),
        })?;

        template
            .render(ctx)
            .map_err(|source| PmError::Render {
                name: name.to_owned(),
                source,
            })
    }

    /// Returns whether a template with the given name is registered.
    pub fn has_template(&self, name: &str) -> bool {
        self.env.get_template(name).is_ok()
    }

    /// Returns the names of all registered templates, sorted.
    pub fn list_templates(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .env
            .templates()
            .map(|(name, _)| name.to_owned())
            .collect();
        names.sort();
        names
    }
}

/// Walk `dir` and collect template files as [`PromptTemplate`]s named
/// relative to `root`.
fn collect_templates(
    root: &Path,
    dir: &Path,
    out: &mut Vec<PromptTemplate>,
) -> Result<(), PmError> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();

        if path.is_dir() {
            collect_templates(root, &path, out)?;
            continue;
        }

        let is_template = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| TEMPLATE_EXTENSIONS.contains(&ext));
        if !is_template {
            continue;
        }

        let Ok(relative) = path.with_extension("").strip_prefix(root).map(Path::to_path_buf)
        else {
            continue;
        };
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let source = fs::read_to_string(&path)?;
        out.push(PromptTemplate::new(name, source));
    }
    Ok(())
}
