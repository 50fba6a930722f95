//! Prompt templates for PyRTF2PDF generation.
//!
//! Built-in Jinja templates are compiled in; a settings file may point at
//! directories whose templates replace them by name.

mod error;
mod manager;
mod template;

pub use error::PmError;
pub use manager::PromptManager;
pub use template::PromptTemplate;
