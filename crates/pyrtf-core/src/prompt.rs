//! Instruction rendering.
//!
//! Turns a [`Configuration`] into the template context for `generate/task`
//! and renders it. Phrase selection lives here so that user template
//! overrides only control layout, never which policy sentence applies.

use serde_json::json;
use tracing::warn;

use crate::config::{Configuration, SortingStrategy};
use crate::error::CoreError;

/// Template rendered for a generation request.
pub const GENERATE_TEMPLATE: &str = "generate/task";

pub const SORT_COMBINED_PHRASE: &str = "Merge all detected RTF files into a single sequence based on their numeric ID found in filenames.";
pub const SORT_SEPARATE_FILES_PHRASE: &str =
    "Generate separate PDF files for Tables, Listings, and Figures.";
pub const SORT_SEPARATE_SECTIONS_PHRASE: &str = "Merge into one PDF, but group all Tables first, then Figures, then Listings (or vice versa based on standard reporting).";

pub const ENGINE_WIN32COM_PHRASE: &str = "Use 'pywin32' (win32com.client) to leverage MS Word for high-fidelity RTF to PDF conversion. This is a Windows-only requirement.";
pub const ENGINE_PORTABLE_PHRASE: &str = "Use a cross-platform library if possible, but prioritize 'pywin32' if quality is paramount for RTF.";

const NO_CONTENT_TYPES_PHRASE: &str =
    "No specific content types; treat every matched file as a generic document.";

/// Sorting instruction for a strategy.
pub fn sorting_phrase(strategy: SortingStrategy) -> &'static str {
    match strategy {
        SortingStrategy::Combined => SORT_COMBINED_PHRASE,
        SortingStrategy::SeparateFiles => SORT_SEPARATE_FILES_PHRASE,
        SortingStrategy::SeparateSections => SORT_SEPARATE_SECTIONS_PHRASE,
    }
}

/// Conversion engine hint.
pub fn engine_phrase(use_win32_com: bool) -> &'static str {
    if use_win32_com {
        ENGINE_WIN32COM_PHRASE
    } else {
        ENGINE_PORTABLE_PHRASE
    }
}

/// Describe the enabled content types, e.g. `Detect and handle Tables, Figures.`
pub fn content_types_phrase(config: &Configuration) -> String {
    let types: Vec<&str> = [
        (config.handle_tables, "Tables"),
        (config.handle_figures, "Figures"),
        (config.handle_listings, "Listings"),
    ]
    .into_iter()
    .filter_map(|(enabled, name)| enabled.then_some(name))
    .collect();

    if types.is_empty() {
        NO_CONTENT_TYPES_PHRASE.to_owned()
    } else {
        format!("Detect and handle {}.", types.join(", "))
    }
}

/// Clamp the TOC depth into the meaningful range.
pub fn effective_toc_depth(depth: u8) -> u8 {
    let clamped = depth.clamp(Configuration::MIN_TOC_DEPTH, Configuration::MAX_TOC_DEPTH);
    if clamped != depth {
        warn!(depth, clamped, "toc depth out of range, clamping");
    }
    clamped
}

/// Build the template context for [`GENERATE_TEMPLATE`].
///
/// `toc_depth` is only present when the TOC is enabled.
pub fn build_context(config: &Configuration) -> serde_json::Value {
    let mut context = json!({
        "app_name": config.app_name,
        "source_extension": config.source_extension,
        "content_types": content_types_phrase(config),
        "sorting_instruction": sorting_phrase(config.sorting_strategy),
        "include_toc": config.include_toc,
        "engine_hint": engine_phrase(config.use_win32_com),
    });

    if config.include_toc {
        context["toc_depth"] = json!(effective_toc_depth(config.toc_depth));
    }
    context
}

/// Render the natural-language instruction for `config`.
///
/// # Errors
///
/// Returns `CoreError::Prompt` if the template is missing or fails to render.
pub fn render_instruction(
    pm: &pyrtf_pm::PromptManager,
    config: &Configuration,
) -> Result<String, CoreError> {
    let context = build_context(config);
    Ok(pm.render(GENERATE_TEMPLATE, &context)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigUpdate;

    const SORT_PHRASES: [&str; 3] = [
        SORT_COMBINED_PHRASE,
        SORT_SEPARATE_FILES_PHRASE,
        SORT_SEPARATE_SECTIONS_PHRASE,
    ];

    fn render(config: &Configuration) -> String {
        let pm = pyrtf_pm::PromptManager::new().expect("should create manager");
        render_instruction(&pm, config).expect("should render")
    }

    #[test]
    fn test_should_include_exactly_one_sorting_phrase() {
        for strategy in SortingStrategy::ALL {
            let config =
                Configuration::default().with_update(ConfigUpdate::SortingStrategy(strategy));
            let prompt = render(&config);

            let expected = sorting_phrase(strategy);
            assert_eq!(prompt.matches(expected).count(), 1, "{strategy:?}");
            for other in SORT_PHRASES.iter().filter(|p| **p != expected) {
                assert!(!prompt.contains(other), "{strategy:?} leaked {other}");
            }
        }
    }

    #[test]
    fn test_should_select_engine_phrase() {
        let with_word = render(&Configuration::default());
        assert!(with_word.contains(ENGINE_WIN32COM_PHRASE));
        assert!(!with_word.contains(ENGINE_PORTABLE_PHRASE));

        let portable = render(&Configuration::default().with_update(ConfigUpdate::UseWin32Com(false)));
        assert!(portable.contains(ENGINE_PORTABLE_PHRASE));
        assert!(!portable.contains(ENGINE_WIN32COM_PHRASE));
    }

    #[test]
    fn test_should_include_configured_toc_depth() {
        for depth in 1..=5 {
            let config = Configuration::default().with_update(ConfigUpdate::TocDepth(depth));
            let prompt = render(&config);
            assert!(prompt.contains(&format!("(Depth: {depth})")), "depth {depth}");
        }
    }

    #[test]
    fn test_should_omit_toc_depth_when_disabled() {
        let config = Configuration::default()
            .with_update(ConfigUpdate::IncludeToc(false))
            .with_update(ConfigUpdate::TocDepth(4));
        let prompt = render(&config);

        assert!(!prompt.contains("Depth:"));
        assert!(prompt.contains("No TOC needed."));
        assert!(build_context(&config).get("toc_depth").is_none());
    }

    #[test]
    fn test_should_clamp_out_of_range_toc_depth() {
        let high = render(&Configuration::default().with_update(ConfigUpdate::TocDepth(9)));
        assert!(high.contains("(Depth: 5)"));

        let zero = render(&Configuration::default().with_update(ConfigUpdate::TocDepth(0)));
        assert!(zero.contains("(Depth: 1)"));
    }

    #[test]
    fn test_should_render_name_extension_and_response_format() {
        let config = Configuration::default()
            .with_update(ConfigUpdate::AppName("Report Binder".to_owned()))
            .with_update(ConfigUpdate::SourceExtension(".RTF".to_owned()));
        let prompt = render(&config);

        assert!(prompt.contains("**App Name**: Report Binder"));
        assert!(prompt.contains("files ending in '.RTF'"));
        for key in ["\"code\"", "\"requirements\"", "\"instructions\""] {
            assert!(prompt.contains(key), "missing {key}");
        }
    }

    #[test]
    fn test_should_describe_content_types() {
        let all = Configuration::default();
        assert_eq!(
            content_types_phrase(&all),
            "Detect and handle Tables, Figures, Listings."
        );

        let only_figures = all
            .with_update(ConfigUpdate::HandleTables(false))
            .with_update(ConfigUpdate::HandleListings(false));
        assert_eq!(content_types_phrase(&only_figures), "Detect and handle Figures.");

        let none = only_figures.with_update(ConfigUpdate::HandleFigures(false));
        assert_eq!(content_types_phrase(&none), NO_CONTENT_TYPES_PHRASE);
    }
}
