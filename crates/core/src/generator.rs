//! Markdown generation API.
//!
//! [`MarkdownGenerator`] renders a page to Markdown, rewrites its links into
//! numbered citations, and optionally renders the pruned "fit" subset of the
//! page alongside. [`html_to_markdown`] is the one-call entry point that
//! returns only the fit Markdown.
//!
//! # Example
//!
//! ```rust
//! use fitmark_core::{ConvertConfig, html_to_markdown};
//!
//! let html = r#"<html><body>
//!     <nav><a href="/">Home</a></nav>
//!     <article><p>Ownership rules let Rust make memory safety guarantees without a garbage collector.</p></article>
//! </body></html>"#;
//!
//! let markdown = html_to_markdown(html, &ConvertConfig::default());
//! assert!(markdown.contains("Ownership rules"));
//! assert!(!markdown.contains("Home"));
//! ```

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::Result;
use crate::formatters::citations::link_citations;
use crate::formatters::markdown::{HtmdRenderer, RenderOptions, Renderer};
use crate::pruning::{DEFAULT_THRESHOLD, PruningConfig, PruningFilter, ThresholdType};

const ERROR_PREFIX: &str = "Error: ";

static INDENTED_FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^    ```").unwrap());

/// Everything produced for one document by a single generation call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GenerationResult {
    /// Markdown rendering of the whole page
    pub raw_markdown: String,
    /// `raw_markdown` with links replaced by citation markers
    pub markdown_with_citations: String,
    /// Reference block for the citation markers; empty when citations are off
    pub references_markdown: String,
    /// Markdown rendering of the pruned content; empty without pruning
    pub fit_markdown: String,
    /// The pruned content as HTML; empty without pruning
    pub fit_html: String,
}

impl GenerationResult {
    /// An error-bearing result: the message fills the first two fields
    pub fn error(message: impl Into<String>) -> Self {
        let message = message.into();
        Self { raw_markdown: message.clone(), markdown_with_citations: message, ..Default::default() }
    }

    /// The message of an error-bearing result, `None` for a normal one
    pub fn error_message(&self) -> Option<&str> {
        let is_error = self.raw_markdown.starts_with(ERROR_PREFIX)
            && self.markdown_with_citations == self.raw_markdown
            && self.references_markdown.is_empty()
            && self.fit_markdown.is_empty()
            && self.fit_html.is_empty();
        is_error.then_some(self.raw_markdown.as_str())
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Settings for the one-call conversion entry point.
///
/// Deserializes from JSON with every field optional.
///
/// # Example
///
/// ```rust
/// use fitmark_core::{ConvertConfig, ThresholdType};
///
/// let config: ConvertConfig = serde_json::from_str(r#"{"threshold_type": "dynamic"}"#).unwrap();
/// assert_eq!(config.threshold_type, ThresholdType::Dynamic);
/// assert!(config.use_citations);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    /// Run the pruning filter to produce fit content (default: true)
    pub use_pruning: bool,
    /// Fixed or dynamic thresholding (default: fixed)
    pub threshold_type: ThresholdType,
    /// Base pruning threshold (default: 0.48)
    pub threshold: f64,
    /// Nodes with fewer words score -1 (default: none)
    pub min_word_threshold: Option<usize>,
    /// Rewrite links into citations (default: true)
    pub use_citations: bool,
    /// Base URL for resolving relative links; empty disables resolution
    pub base_url: String,
    /// Options for the renderer
    pub render: RenderOptions,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            use_pruning: true,
            threshold_type: ThresholdType::Fixed,
            threshold: DEFAULT_THRESHOLD,
            min_word_threshold: None,
            use_citations: true,
            base_url: String::new(),
            render: RenderOptions::default(),
        }
    }
}

impl ConvertConfig {
    /// Settings used when converting crawled pages: dynamic threshold at 0.6
    pub fn crawl_defaults() -> Self {
        Self { threshold_type: ThresholdType::Dynamic, threshold: 0.6, ..Self::default() }
    }

    /// Pruning configuration, or `None` when pruning is disabled
    pub fn pruning_config(&self) -> Option<PruningConfig> {
        self.use_pruning.then(|| {
            PruningConfig::builder()
                .threshold_type(self.threshold_type)
                .threshold(self.threshold)
                .min_word_threshold(self.min_word_threshold)
                .build()
        })
    }
}

/// Renders documents to Markdown with citations and fit content.
///
/// Holds only its renderer; every call builds its own filter and citation
/// state, so one generator can serve any number of documents.
#[derive(Debug, Clone, Default)]
pub struct MarkdownGenerator<R: Renderer = HtmdRenderer> {
    renderer: R,
}

impl MarkdownGenerator<HtmdRenderer> {
    /// Create a generator using the default renderer
    pub fn new() -> Self {
        Self { renderer: HtmdRenderer }
    }
}

impl<R: Renderer> MarkdownGenerator<R> {
    /// Create a generator around a custom renderer
    pub fn with_renderer(renderer: R) -> Self {
        Self { renderer }
    }

    /// Generate every Markdown variant for `html`.
    ///
    /// Never fails: any error is logged and folded into
    /// [`GenerationResult::error`] with an `"Error: ..."` message.
    pub fn generate_markdown(
        &self, html: &str, base_url: &str, options: &RenderOptions, pruning: Option<&PruningConfig>, citations: bool,
    ) -> GenerationResult {
        match self.try_generate(html, base_url, options, pruning, citations) {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "markdown generation failed");
                GenerationResult::error(format!("{}{}", ERROR_PREFIX, e))
            }
        }
    }

    fn try_generate(
        &self, html: &str, base_url: &str, options: &RenderOptions, pruning: Option<&PruningConfig>, citations: bool,
    ) -> Result<GenerationResult> {
        let options = options.with_base_url(base_url);

        let raw_markdown = normalize_code_fences(&self.renderer.render(html, &options)?);

        let (markdown_with_citations, references_markdown) = if citations {
            let linked = link_citations(&raw_markdown, base_url);
            let references = linked.references_markdown();
            (linked.text, references)
        } else {
            (raw_markdown.clone(), String::new())
        };

        let (fit_markdown, fit_html) = match pruning {
            Some(config) => {
                let fragments = PruningFilter::with_config(config.clone()).filter_content(html)?;
                let fit_html = wrap_fragments(&fragments);
                let fit_markdown =
                    if fit_html.is_empty() { String::new() } else { self.renderer.render(&fit_html, &options)? };
                (fit_markdown, fit_html)
            }
            None => (String::new(), String::new()),
        };

        debug!(
            raw_len = raw_markdown.len(),
            fit_len = fit_markdown.len(),
            citations,
            "generated markdown"
        );

        Ok(GenerationResult { raw_markdown, markdown_with_citations, references_markdown, fit_markdown, fit_html })
    }
}

/// Replace lines starting with an indented ``` fence by the bare fence
pub fn normalize_code_fences(markdown: &str) -> String {
    INDENTED_FENCE.replace_all(markdown, "```").to_string()
}

/// Wrap each fragment in a `<div>` and join them with newlines
fn wrap_fragments(fragments: &[String]) -> String {
    fragments
        .iter()
        .map(|fragment| format!("<div>{}</div>", fragment))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Convert `html` to its trimmed fit Markdown.
///
/// Builds a fresh generator and filter for the call. Returns an empty string
/// for empty input or when `config.use_pruning` is off.
pub fn html_to_markdown(html: &str, config: &ConvertConfig) -> String {
    if html.is_empty() {
        return String::new();
    }

    let pruning = config.pruning_config();
    let result = MarkdownGenerator::new().generate_markdown(
        html,
        &config.base_url,
        &config.render,
        pruning.as_ref(),
        config.use_citations,
    );

    result.fit_markdown.trim().to_string()
}

#[cfg(all(test, feature = "markdown"))]
mod tests {
    use super::*;
    use crate::FitmarkError;

    const PAGE: &str = r#"<html><body>
        <nav><a href="/home">Home</a></nav>
        <article>
            <h1>Ownership</h1>
            <p>Rust is a language; read <a href="/docs" title="Docs">the docs</a> for more detail on ownership.</p>
        </article>
    </body></html>"#;

    struct FailingRenderer;

    impl Renderer for FailingRenderer {
        fn render(&self, _html: &str, _options: &RenderOptions) -> Result<String> {
            Err(FitmarkError::RenderError("boom".to_string()))
        }
    }

    fn generate(pruning: Option<&PruningConfig>, citations: bool) -> GenerationResult {
        MarkdownGenerator::new().generate_markdown(PAGE, "https://site.com/", &RenderOptions::default(), pruning, citations)
    }

    #[test]
    fn test_generate_all_fields() {
        let config = PruningConfig::default();
        let result = generate(Some(&config), true);

        assert!(result.raw_markdown.contains("Home"));
        assert!(result.raw_markdown.contains("https://site.com/docs"));
        assert!(result.markdown_with_citations.contains("Home⟨1⟩"));
        assert!(result.markdown_with_citations.contains("the docs⟨2⟩"));
        assert!(result.references_markdown.starts_with("\n\n## References\n\n"));
        assert!(result.references_markdown.contains("⟨1⟩ https://site.com/home"));
        assert!(result.references_markdown.contains("⟨2⟩ https://site.com/docs"));

        assert!(result.fit_html.starts_with("<div><article>"));
        assert!(result.fit_markdown.contains("Rust is a language"));
        assert!(!result.fit_markdown.contains("Home"));
    }

    #[test]
    fn test_citations_disabled() {
        let result = generate(None, false);
        assert_eq!(result.markdown_with_citations, result.raw_markdown);
        assert!(result.references_markdown.is_empty());
    }

    #[test]
    fn test_no_pruning_leaves_fit_empty() {
        let result = generate(None, true);
        assert!(!result.raw_markdown.is_empty());
        assert!(result.fit_markdown.is_empty());
        assert!(result.fit_html.is_empty());
    }

    #[test]
    fn test_render_failure_is_contained() {
        let generator = MarkdownGenerator::with_renderer(FailingRenderer);
        let result = generator.generate_markdown(PAGE, "", &RenderOptions::default(), None, true);

        assert_eq!(result.raw_markdown, "Error: Failed to render Markdown: boom");
        assert_eq!(result.markdown_with_citations, result.raw_markdown);
        assert!(result.references_markdown.is_empty());
        assert!(result.fit_markdown.is_empty());
        assert!(result.fit_html.is_empty());
        assert_eq!(result.error_message(), Some("Error: Failed to render Markdown: boom"));
    }

    #[test]
    fn test_successful_result_has_no_error_message() {
        assert_eq!(generate(Some(&PruningConfig::default()), true).error_message(), None);
        assert_eq!(generate(None, false).error_message(), None);

        let cited = GenerationResult {
            raw_markdown: "Error: codes are listed below".to_string(),
            markdown_with_citations: "Error: codes are listed below".to_string(),
            references_markdown: "\n\n## References\n\n".to_string(),
            ..Default::default()
        };
        assert_eq!(cited.error_message(), None);
    }

    #[test]
    fn test_short_text_below_min_words_is_empty() {
        let html = "<html><body><nav>Menu</nav><footer>Footer</footer><p>Too short</p></body></html>";
        let config = ConvertConfig { min_word_threshold: Some(5), ..ConvertConfig::default() };

        let pruning = config.pruning_config();
        let result = MarkdownGenerator::new().generate_markdown(html, "", &config.render, pruning.as_ref(), true);

        assert!(result.fit_html.is_empty());
        assert!(result.fit_markdown.is_empty());
        assert_eq!(html_to_markdown(html, &config), "");
    }

    #[test]
    fn test_html_to_markdown_is_idempotent() {
        let config = ConvertConfig::crawl_defaults();
        let first = html_to_markdown(PAGE, &config);
        let second = html_to_markdown(PAGE, &config);

        assert!(!first.is_empty());
        assert_eq!(first, second);
        assert_eq!(first, first.trim());
    }

    #[test]
    fn test_html_to_markdown_empty_input() {
        assert_eq!(html_to_markdown("", &ConvertConfig::default()), "");
    }

    #[test]
    fn test_html_to_markdown_without_pruning() {
        let config = ConvertConfig { use_pruning: false, ..ConvertConfig::default() };
        assert_eq!(html_to_markdown(PAGE, &config), "");
    }

    #[test]
    fn test_normalize_code_fences() {
        assert_eq!(normalize_code_fences("    ```rust\nlet x = 1;\n    ```\n"), "```rust\nlet x = 1;\n```\n");
        assert_eq!(normalize_code_fences("  ```\n"), "  ```\n");
    }

    #[test]
    fn test_wrap_fragments() {
        let fragments = vec!["<p>a</p>".to_string(), "<p>b</p>".to_string()];
        assert_eq!(wrap_fragments(&fragments), "<div><p>a</p></div>\n<div><p>b</p></div>");
        assert_eq!(wrap_fragments(&[]), "");
    }

    #[test]
    fn test_crawl_defaults() {
        let config = ConvertConfig::crawl_defaults();
        assert_eq!(config.threshold_type, ThresholdType::Dynamic);
        assert!((config.threshold - 0.6).abs() < f64::EPSILON);
        assert!(config.use_citations);

        let pruning = config.pruning_config().unwrap();
        assert_eq!(pruning.threshold_type, ThresholdType::Dynamic);
    }

    #[test]
    fn test_result_to_json() {
        let json = GenerationResult::error("Error: x").to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["raw_markdown"], "Error: x");
        assert_eq!(value["fit_html"], "");
    }
}
