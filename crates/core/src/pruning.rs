//! Score-driven pruning of an HTML document down to its main content.
//!
//! The [`PruningFilter`] drops boilerplate tags outright, then walks the body
//! depth-first and removes every subtree whose composite score falls below
//! the threshold. What survives under `<body>` is returned as a list of HTML
//! fragments.
//!
//! # Example
//!
//! ```rust
//! use fitmark_core::{PruningConfig, PruningFilter, ThresholdType};
//!
//! let html = r#"<html><body>
//!     <nav><a href="/">Home</a></nav>
//!     <p>Rust is a systems programming language focused on safety and speed.</p>
//! </body></html>"#;
//!
//! let config = PruningConfig::builder()
//!     .threshold_type(ThresholdType::Dynamic)
//!     .threshold(0.6)
//!     .build();
//! let fragments = PruningFilter::with_config(config).filter_content(html).unwrap();
//!
//! assert_eq!(fragments.len(), 1);
//! assert!(fragments[0].starts_with("<p>"));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::dom_tree::DomTree;
use crate::scoring::{MetricToggles, MetricWeights, ScoreConfig, ScoreMetrics, calculate_score};
use crate::{FitmarkError, Result};

/// Tags removed before scoring, wherever they appear
pub const EXCLUDED_TAGS: &[&str] = &[
    "nav", "footer", "header", "aside", "script", "style", "form", "iframe", "noscript",
];

/// Importance for tags missing from the importance table
pub const DEFAULT_TAG_IMPORTANCE: f64 = 0.7;

/// Default threshold of the convenience entry point
pub const DEFAULT_THRESHOLD: f64 = 0.48;

/// How the removal threshold is chosen for each node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdType {
    /// One cutoff for every node
    #[default]
    Fixed,
    /// The cutoff is relaxed or tightened per node from its tag and ratios
    Dynamic,
}

impl FromStr for ThresholdType {
    type Err = FitmarkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "fixed" => Ok(Self::Fixed),
            "dynamic" => Ok(Self::Dynamic),
            _ => Err(FitmarkError::InvalidConfig(format!(
                "Invalid threshold type: {}. Valid options: fixed, dynamic",
                s
            ))),
        }
    }
}

impl fmt::Display for ThresholdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed => write!(f, "fixed"),
            Self::Dynamic => write!(f, "dynamic"),
        }
    }
}

/// Configuration for the pruning filter
#[derive(Debug, Clone)]
pub struct PruningConfig {
    /// Fixed or dynamic thresholding (default: fixed)
    pub threshold_type: ThresholdType,
    /// Base threshold; nodes scoring below it are removed (default: 0.48)
    pub threshold: f64,
    /// Per-tag importance consulted by the dynamic threshold
    pub tag_importance: HashMap<String, f64>,
    /// Importance for tags missing from `tag_importance` (default: 0.7)
    pub default_tag_importance: f64,
    /// Composite scorer settings
    pub scoring: ScoreConfig,
}

impl Default for PruningConfig {
    fn default() -> Self {
        Self {
            threshold_type: ThresholdType::Fixed,
            threshold: DEFAULT_THRESHOLD,
            tag_importance: default_tag_importance(),
            default_tag_importance: DEFAULT_TAG_IMPORTANCE,
            scoring: ScoreConfig::default(),
        }
    }
}

impl PruningConfig {
    /// Creates a new builder for PruningConfig.
    pub fn builder() -> PruningConfigBuilder {
        PruningConfigBuilder::new()
    }

    /// Importance of a tag for the dynamic threshold
    pub fn importance(&self, tag_name: &str) -> f64 {
        self.tag_importance
            .get(tag_name)
            .copied()
            .unwrap_or(self.default_tag_importance)
    }
}

/// Default per-tag importance
pub fn default_tag_importance() -> HashMap<String, f64> {
    [
        ("article", 1.5),
        ("main", 1.4),
        ("section", 1.3),
        ("p", 1.2),
        ("h1", 1.4),
        ("h2", 1.3),
        ("h3", 1.2),
        ("div", 0.7),
        ("span", 0.6),
    ]
    .into_iter()
    .map(|(tag, importance)| (tag.to_string(), importance))
    .collect()
}

/// Builder for PruningConfig.
///
/// # Example
///
/// ```rust
/// use fitmark_core::{PruningConfig, ThresholdType};
///
/// let config = PruningConfig::builder()
///     .threshold_type(ThresholdType::Dynamic)
///     .threshold(0.6)
///     .min_word_threshold(Some(5))
///     .build();
/// assert_eq!(config.scoring.min_word_threshold, Some(5));
/// ```
pub struct PruningConfigBuilder {
    config: PruningConfig,
}

impl PruningConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self { config: PruningConfig::default() }
    }

    /// Sets fixed or dynamic thresholding.
    pub fn threshold_type(mut self, value: ThresholdType) -> Self {
        self.config.threshold_type = value;
        self
    }

    /// Sets the base threshold.
    pub fn threshold(mut self, value: f64) -> Self {
        self.config.threshold = value;
        self
    }

    /// Sets the minimum word count below which a node is always removed.
    pub fn min_word_threshold(mut self, value: Option<usize>) -> Self {
        self.config.scoring.min_word_threshold = value;
        self
    }

    /// Sets the composite score weights.
    pub fn metric_weights(mut self, value: MetricWeights) -> Self {
        self.config.scoring.weights = value;
        self
    }

    /// Enables or disables individual composite score terms.
    pub fn metric_toggles(mut self, value: MetricToggles) -> Self {
        self.config.scoring.enabled = value;
        self
    }

    /// Replaces the scorer configuration wholesale.
    pub fn scoring(mut self, value: ScoreConfig) -> Self {
        self.config.scoring = value;
        self
    }

    /// Builds the config.
    pub fn build(self) -> PruningConfig {
        self.config
    }
}

impl Default for PruningConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply the dynamic threshold rules to a base threshold.
///
/// The rules compound in a fixed order, each multiplying the running value:
/// important tags (`importance > 1`) relax it by `0.8`, text-dense nodes
/// (`text_ratio > 0.4`) by `0.9`, and link-heavy nodes (`link_ratio > 0.6`)
/// tighten it by `1.2`.
pub fn adjusted_threshold(base: f64, importance: f64, metrics: &ScoreMetrics) -> f64 {
    let mut threshold = base;

    if importance > 1.0 {
        threshold *= 0.8;
    }
    if metrics.text_ratio() > 0.4 {
        threshold *= 0.9;
    }
    if metrics.link_ratio() > 0.6 {
        threshold *= 1.2;
    }

    threshold
}

/// Counters from one pruning walk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneStats {
    /// Nodes scored
    pub visited: usize,
    /// Subtrees removed for scoring below threshold
    pub removed: usize,
}

/// Removes low-value subtrees from a document.
///
/// A filter holds only immutable configuration; each call to
/// [`PruningFilter::filter_content`] parses into its own tree.
#[derive(Debug, Clone, Default)]
pub struct PruningFilter {
    config: PruningConfig,
}

impl PruningFilter {
    /// Creates a filter with default settings (fixed threshold of 0.48).
    pub fn new() -> Self {
        Self { config: PruningConfig::default() }
    }

    /// Creates a filter with a custom configuration.
    pub fn with_config(config: PruningConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PruningConfig {
        &self.config
    }

    /// Prune `html` and return the surviving top-level body children as HTML.
    ///
    /// Fragments keep their document order; children of `<body>` with no
    /// visible text are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`FitmarkError::HtmlParseError`] if no body can be established.
    pub fn filter_content(&self, html: &str) -> Result<Vec<String>> {
        if html.is_empty() {
            return Ok(Vec::new());
        }

        let mut tree = DomTree::parse_with_body(html);
        remove_excluded_tags(&mut tree);

        let body = tree
            .body_id()
            .ok_or_else(|| FitmarkError::HtmlParseError("document has no body".to_string()))?;

        let stats = self.prune_tree(&mut tree, body);

        let fragments: Vec<String> = if tree.is_attached(body) {
            tree.element_children(body)
                .into_iter()
                .filter(|child| tree.text_len(*child) > 0)
                .map(|child| tree.outer_html(child))
                .collect()
        } else {
            Vec::new()
        };

        debug!(
            visited = stats.visited,
            removed = stats.removed,
            fragments = fragments.len(),
            threshold_type = %self.config.threshold_type,
            "pruned document"
        );

        Ok(fragments)
    }

    /// Walk the subtree at `root` depth-first, removing nodes that score
    /// below their threshold.
    ///
    /// A removed node's children are never visited. Surviving nodes have their
    /// element children queued in document order; text nodes are never
    /// candidates.
    pub fn prune_tree(&self, tree: &mut DomTree, root: usize) -> PruneStats {
        let mut stats = PruneStats::default();
        let mut stack = vec![root];

        while let Some(id) = stack.pop() {
            if !tree.get_node(id).is_some_and(|node| node.is_element()) {
                continue;
            }

            stats.visited += 1;
            let metrics = ScoreMetrics::compute(tree, id);
            let result = calculate_score(tree, id, &metrics, &self.config.scoring);
            let threshold = self.threshold_for(&result.tag_name, &metrics);

            if result.final_score < threshold {
                trace!(tag = %result.tag_name, score = result.final_score, threshold, "removing node");
                tree.detach(id);
                stats.removed += 1;
            } else {
                let mut children = tree.element_children(id);
                children.reverse();
                stack.extend(children);
            }
        }

        stats
    }

    /// Threshold a node must reach to be kept
    pub fn threshold_for(&self, tag_name: &str, metrics: &ScoreMetrics) -> f64 {
        match self.config.threshold_type {
            ThresholdType::Fixed => self.config.threshold,
            ThresholdType::Dynamic => adjusted_threshold(self.config.threshold, self.config.importance(tag_name), metrics),
        }
    }
}

/// Detach every element whose tag is in [`EXCLUDED_TAGS`]
fn remove_excluded_tags(tree: &mut DomTree) {
    for id in tree.find_all(EXCLUDED_TAGS) {
        tree.detach(id);
    }
}
