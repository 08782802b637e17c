//! Rewriting of inline Markdown links into numbered citations.
//!
//! Every `[text](target "title")` (or image form) in the input is replaced by
//! `text⟨n⟩`, where `n` is assigned on the first sight of each resolved URL.
//! A reference block listing each URL once, in citation order, is built
//! alongside.
//!
//! # Example
//!
//! ```rust
//! use fitmark_core::convert_links_to_citations;
//!
//! let (text, references) =
//!     convert_links_to_citations(r#"See [the docs](/guide "Guide") and [again](/guide)."#, "https://example.com/");
//!
//! assert_eq!(text, "See the docs⟨1⟩ and again⟨1⟩.");
//! assert!(references.contains("⟨1⟩ https://example.com/guide: Guide - the docs"));
//! ```

use std::collections::HashMap;
use std::ops::Range;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::Serialize;
use tracing::debug;
use url::Url;

/// Markdown link or image: optional `!`, `[text]`, `(target "optional title")`
pub const LINK_PATTERN: &str = r#"!?\[([^\]]+)\]\(([^)]+?)(?:\s+"([^"]*)")?\)"#;

static LINK_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(LINK_PATTERN).unwrap());

/// Header that opens the reference block
pub const REFERENCES_HEADER: &str = "\n\n## References\n\n";

/// Targets left untouched by relative resolution
const ABSOLUTE_PREFIXES: &[&str] = &["http://", "https://", "mailto:", "//"];

/// One link or image found in rendered Markdown
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkOccurrence<'a> {
    /// Whether the match was an image (`![...]`)
    pub is_image: bool,
    /// The bracketed link text
    pub text: &'a str,
    /// The raw destination as written
    pub target: &'a str,
    /// The quoted title, if any
    pub title: Option<&'a str>,
    /// Byte range of the whole match in the input
    pub range: Range<usize>,
}

impl<'a> LinkOccurrence<'a> {
    fn from_captures(caps: &Captures<'a>) -> Option<Self> {
        let whole = caps.get(0)?;
        Some(Self {
            is_image: whole.as_str().starts_with('!'),
            text: caps.get(1)?.as_str(),
            target: caps.get(2)?.as_str(),
            title: caps.get(3).map(|m| m.as_str()),
            range: whole.range(),
        })
    }
}

/// Every link and image occurrence in `markdown`, left to right
pub fn find_links(markdown: &str) -> Vec<LinkOccurrence<'_>> {
    LINK_REGEX
        .captures_iter(markdown)
        .filter_map(|caps| LinkOccurrence::from_captures(&caps))
        .collect()
}

/// A numbered reference to a distinct URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CitationEntry {
    /// Citation number, starting at 1 in order of first occurrence
    pub number: usize,
    /// Resolved URL
    pub url: String,
    /// Title and/or link text from the first occurrence, joined by `" - "`
    pub description: String,
}

impl CitationEntry {
    /// Format as a reference line: `⟨n⟩ url: description`
    pub fn to_reference_line(&self) -> String {
        if self.description.is_empty() {
            format!("⟨{}⟩ {}\n", self.number, self.url)
        } else {
            format!("⟨{}⟩ {}: {}\n", self.number, self.url, self.description)
        }
    }
}

/// Output of one citation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Citations {
    /// Markdown with every link replaced by its citation marker
    pub text: String,
    /// Distinct URLs in ascending citation number
    pub entries: Vec<CitationEntry>,
}

impl Citations {
    /// Render the reference block: a header followed by one line per URL
    pub fn references_markdown(&self) -> String {
        let mut out = String::from(REFERENCES_HEADER);
        for entry in &self.entries {
            out.push_str(&entry.to_reference_line());
        }
        out
    }
}

/// Working state threaded through the left-to-right scan
#[derive(Default)]
struct CitationFold {
    output: String,
    last_end: usize,
    numbers: HashMap<String, usize>,
    entries: Vec<CitationEntry>,
    resolved: HashMap<String, String>,
}

impl CitationFold {
    fn resolve(&mut self, target: &str, base_url: &str) -> String {
        if base_url.is_empty() || is_absolute(target) {
            return target.to_string();
        }
        self.resolved
            .entry(target.to_string())
            .or_insert_with(|| resolve_url(base_url, target))
            .clone()
    }

    fn cite(&mut self, url: String, link: &LinkOccurrence<'_>) -> usize {
        if let Some(number) = self.numbers.get(&url) {
            return *number;
        }

        let number = self.entries.len() + 1;
        self.numbers.insert(url.clone(), number);
        self.entries.push(CitationEntry { number, url, description: describe(link.text, link.title) });
        number
    }
}

/// Rewrite every link in `markdown` into a citation marker.
///
/// Relative targets are resolved against `base_url` when it is non-empty.
/// Numbers are assigned per resolved URL on first sight and the description
/// is frozen at that point. Image links collapse to `![text⟨n⟩]`, dropping
/// the image destination.
pub fn link_citations(markdown: &str, base_url: &str) -> Citations {
    let mut state = find_links(markdown)
        .into_iter()
        .fold(CitationFold::default(), |mut state, link| {
            state.output.push_str(&markdown[state.last_end..link.range.start]);

            let target = link.target.strip_prefix('<').and_then(|t| t.strip_suffix('>')).unwrap_or(link.target);
            let url = state.resolve(target, base_url);
            let number = state.cite(url, &link);

            if link.is_image {
                state.output.push_str(&format!("![{}⟨{}⟩]", link.text, number));
            } else {
                state.output.push_str(&format!("{}⟨{}⟩", link.text, number));
            }

            state.last_end = link.range.end;
            state
        });

    state.output.push_str(&markdown[state.last_end..]);
    debug!(citations = state.entries.len(), "converted links to citations");

    Citations { text: state.output, entries: state.entries }
}

/// Rewrite links to citations and return `(text, references_block)`
pub fn convert_links_to_citations(markdown: &str, base_url: &str) -> (String, String) {
    let citations = link_citations(markdown, base_url);
    let references = citations.references_markdown();
    (citations.text, references)
}

/// Whether a target needs no resolution
pub fn is_absolute(target: &str) -> bool {
    ABSOLUTE_PREFIXES.iter().any(|prefix| target.starts_with(prefix))
}

/// Resolve `target` against `base`.
///
/// Root-relative targets are appended to the base with one trailing slash
/// removed; other relative targets use standard URL joining. A base that is
/// not a valid URL leaves the target unchanged.
pub fn resolve_url(base: &str, target: &str) -> String {
    if is_absolute(target) {
        return target.to_string();
    }

    if target.starts_with('/') {
        let base = base.strip_suffix('/').unwrap_or(base);
        return format!("{}{}", base, target);
    }

    Url::parse(base)
        .and_then(|base| base.join(target))
        .map(|url| url.to_string())
        .unwrap_or_else(|_| target.to_string())
}

fn describe(text: &str, title: Option<&str>) -> String {
    let mut parts = Vec::with_capacity(2);

    if let Some(title) = title.filter(|t| !t.is_empty()) {
        parts.push(title);
    }
    if !text.is_empty() && Some(text) != title {
        parts.push(text);
    }

    parts.join(" - ")
}
