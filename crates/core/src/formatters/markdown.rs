//! HTML to Markdown rendering.
//!
//! [`Renderer`] is the seam the generator renders through; [`HtmdRenderer`]
//! is the default implementation. Rendering is three steps: an HTML pre-pass
//! ([`prepare_html`](crate::preprocess::prepare_html)), conversion, and
//! Markdown post-passes ([`postprocess_markdown`](crate::postprocess::postprocess_markdown)).

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::postprocess::postprocess_markdown;
use crate::preprocess::prepare_html;

/// Tags never rendered
#[cfg(feature = "markdown")]
const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template"];

/// Options controlling how HTML is rendered to Markdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Wrap plain lines at this many characters; 0 disables wrapping
    pub body_width: usize,
    /// Separate blocks with a single line break instead of a blank line
    pub single_line_break: bool,
    /// Render `pre` blocks as fenced code (indented otherwise)
    pub mark_code: bool,
    /// Drop anchors, keeping their text
    pub ignore_links: bool,
    /// Drop images
    pub ignore_images: bool,
    /// Drop emphasis markup, keeping its text
    pub ignore_emphasis: bool,
    /// Wrap link destinations in angle brackets
    pub protect_links: bool,
    /// Also backslash-escape `{`, `}`, `(`, `)`, `#` and `!` found in text
    pub escape_snob: bool,
    /// Base URL for relative `href`/`src` values; set per call by the generator
    #[serde(skip)]
    pub base_url: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            body_width: 0,
            single_line_break: true,
            mark_code: true,
            ignore_links: false,
            ignore_images: false,
            ignore_emphasis: false,
            protect_links: false,
            escape_snob: false,
            base_url: String::new(),
        }
    }
}

impl RenderOptions {
    /// Copy of these options with `base_url` set
    pub fn with_base_url(&self, base_url: &str) -> Self {
        Self { base_url: base_url.to_string(), ..self.clone() }
    }
}

/// Turns an HTML string into Markdown
pub trait Renderer {
    fn render(&self, html: &str, options: &RenderOptions) -> Result<String>;
}

/// Default renderer backed by `htmd`
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmdRenderer;

impl HtmdRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Renderer for HtmdRenderer {
    fn render(&self, html: &str, options: &RenderOptions) -> Result<String> {
        let prepared = prepare_html(html, options);
        let markdown = convert_html(&prepared, options)?;
        Ok(postprocess_markdown(&markdown, options))
    }
}

/// Convert HTML to Markdown using htmd crate
#[cfg(feature = "markdown")]
fn convert_html(html: &str, options: &RenderOptions) -> Result<String> {
    use htmd::options::{CodeBlockFence, CodeBlockStyle, HeadingStyle, Options};

    let code_block_style = if options.mark_code { CodeBlockStyle::Fenced } else { CodeBlockStyle::Indented };

    htmd::HtmlToMarkdown::builder()
        .skip_tags(SKIPPED_TAGS.to_vec())
        .options(Options {
            heading_style: HeadingStyle::Atx,
            code_block_style,
            code_block_fence: CodeBlockFence::Backticks,
            ..Default::default()
        })
        .build()
        .convert(html)
        .map_err(|e| crate::FitmarkError::RenderError(e.to_string()))
}

/// Fallback HTML to text conversion when markdown feature is disabled
#[cfg(not(feature = "markdown"))]
fn convert_html(html: &str, _options: &RenderOptions) -> Result<String> {
    let doc = scraper::Html::parse_document(html);
    Ok(doc.root_element().text().collect::<String>())
}
