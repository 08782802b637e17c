use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::dom_tree::DomTree;
use crate::{FitmarkError, Result};

/// Class/ID prefixes that mark boilerplate rather than content
pub const NEGATIVE_PATTERNS: &str = r"(?i)^(?:nav|footer|header|sidebar|ads|comment|promo|advert|social|share)";

static NEGATIVE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(NEGATIVE_PATTERNS).unwrap());

/// Penalty applied for each of class and id matching the negative pattern
const CLASS_ID_PENALTY: f64 = 0.5;

/// Weight for tags missing from the tag weight table
pub const DEFAULT_TAG_WEIGHT: f64 = 0.5;

/// Raw measurements of a single element, taken fresh on every visit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScoreMetrics {
    /// Character count of the element's stripped text
    pub text_len: usize,
    /// Byte length of the element's serialized contents
    pub tag_len: usize,
    /// Stripped text length of direct child anchors only
    pub link_text_len: usize,
}

impl ScoreMetrics {
    /// Measure the element at `id` in its current (possibly pruned) state
    pub fn compute(tree: &DomTree, id: usize) -> Self {
        let text_len = tree.text_len(id);
        let tag_len = tree.inner_html(id).len();
        let link_text_len = tree
            .element_children(id)
            .into_iter()
            .filter(|child| tree.tag_name(*child) == Some("a"))
            .map(|anchor| tree.text_len(anchor))
            .sum();

        Self { text_len, tag_len, link_text_len }
    }

    /// Text characters per markup byte, `0` for an empty element
    pub fn text_ratio(&self) -> f64 {
        if self.tag_len > 0 { self.text_len as f64 / self.tag_len as f64 } else { 0.0 }
    }

    /// Share of the text sitting in direct child links, `1` for a text-free element
    pub fn link_ratio(&self) -> f64 {
        if self.text_len > 0 { self.link_text_len as f64 / self.text_len as f64 } else { 1.0 }
    }
}

/// Relative weights of the five composite score terms
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricWeights {
    pub text_density: f64,
    pub link_density: f64,
    pub tag_weight: f64,
    pub class_id_weight: f64,
    pub text_length: f64,
}

impl Default for MetricWeights {
    fn default() -> Self {
        Self { text_density: 0.4, link_density: 0.2, tag_weight: 0.2, class_id_weight: 0.1, text_length: 0.1 }
    }
}

/// Which composite score terms take part in scoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricToggles {
    pub text_density: bool,
    pub link_density: bool,
    pub tag_weight: bool,
    pub class_id_weight: bool,
    pub text_length: bool,
}

impl Default for MetricToggles {
    fn default() -> Self {
        Self { text_density: true, link_density: true, tag_weight: true, class_id_weight: true, text_length: true }
    }
}

/// Configuration for the composite scorer
#[derive(Debug, Clone)]
pub struct ScoreConfig {
    /// Weight of each term in the weighted average
    pub weights: MetricWeights,
    /// Terms switched on
    pub enabled: MetricToggles,
    /// Per-tag weight lookup
    pub tag_weights: HashMap<String, f64>,
    /// Weight for tags missing from `tag_weights`
    pub default_tag_weight: f64,
    /// Elements with fewer words than this score `-1.0`
    pub min_word_threshold: Option<usize>,
    /// Pattern matched against the start of the class list and the id
    pub negative_pattern: Regex,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            weights: MetricWeights::default(),
            enabled: MetricToggles::default(),
            tag_weights: default_tag_weights(),
            default_tag_weight: DEFAULT_TAG_WEIGHT,
            min_word_threshold: None,
            negative_pattern: NEGATIVE_REGEX.clone(),
        }
    }
}

impl ScoreConfig {
    /// Replace the negative class/ID pattern.
    ///
    /// # Errors
    ///
    /// Returns [`FitmarkError::InvalidConfig`] if the pattern is not a valid regex.
    pub fn with_negative_pattern(mut self, pattern: &str) -> Result<Self> {
        self.negative_pattern = Regex::new(pattern)
            .map_err(|e| FitmarkError::InvalidConfig(format!("Invalid negative pattern: {}", e)))?;
        Ok(self)
    }
}

/// Default per-tag weights
pub fn default_tag_weights() -> HashMap<String, f64> {
    [
        ("div", 0.5),
        ("p", 1.0),
        ("article", 1.5),
        ("section", 1.0),
        ("span", 0.3),
        ("li", 0.5),
        ("ul", 0.5),
        ("ol", 0.5),
        ("h1", 1.2),
        ("h2", 1.1),
        ("h3", 1.0),
        ("h4", 0.9),
        ("h5", 0.8),
        ("h6", 0.7),
    ]
    .into_iter()
    .map(|(tag, weight)| (tag.to_string(), weight))
    .collect()
}

/// Breakdown of a composite score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreResult {
    /// The element's tag name
    pub tag_name: String,
    /// Measurements the score was derived from
    pub metrics: ScoreMetrics,
    /// Text density term (before weighting)
    pub text_density: f64,
    /// Link density term (before weighting)
    pub link_density: f64,
    /// Tag weight term (before weighting)
    pub tag_weight: f64,
    /// Raw class/ID adjustment; it is floored at zero when weighted
    pub class_id_weight: f64,
    /// Text length term (before weighting)
    pub text_length: f64,
    /// Set when the minimum word count forced the score to `-1.0`
    pub below_word_threshold: bool,
    /// Final calculated score
    pub final_score: f64,
}

/// Text density: characters of text per byte of markup
pub fn text_density(metrics: &ScoreMetrics) -> f64 {
    metrics.text_ratio()
}

/// Link density term: `1` for link-free text, `0` when all text is link text.
///
/// A text-free element scores `1` here, the same as link-free text.
pub fn link_density(metrics: &ScoreMetrics) -> f64 {
    if metrics.text_len > 0 { 1.0 - metrics.link_ratio() } else { 1.0 }
}

/// Look up the weight of a tag
pub fn tag_weight(tag_name: &str, config: &ScoreConfig) -> f64 {
    config
        .tag_weights
        .get(tag_name)
        .copied()
        .unwrap_or(config.default_tag_weight)
}

/// Class/ID adjustment: `-0.5` for a negative class list, another `-0.5` for a
/// negative id.
///
/// Classes are joined with single spaces and the pattern must match at the
/// start, so `"main nav"` is not penalized while `"nav-main"` is.
pub fn class_id_weight(class: Option<&str>, id: Option<&str>, config: &ScoreConfig) -> f64 {
    let mut weight = 0.0;

    if let Some(class) = class {
        let classes = class.split_whitespace().collect::<Vec<_>>().join(" ");
        if config.negative_pattern.is_match(&classes) {
            weight -= CLASS_ID_PENALTY;
        }
    }

    if let Some(id) = id
        && config.negative_pattern.is_match(id)
    {
        weight -= CLASS_ID_PENALTY;
    }

    weight
}

/// Logarithmic text length term
pub fn text_length_score(metrics: &ScoreMetrics) -> f64 {
    ((metrics.text_len + 1) as f64).ln()
}

/// Number of whitespace-delimited words
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Score the element at `id` from freshly computed metrics
pub fn calculate_score(tree: &DomTree, id: usize, metrics: &ScoreMetrics, config: &ScoreConfig) -> ScoreResult {
    let node = tree.get_node(id);
    let tag_name = node.and_then(|n| n.tag_name()).unwrap_or_default();
    let class = node.and_then(|n| n.attr("class"));
    let element_id = node.and_then(|n| n.attr("id"));
    let words = match config.min_word_threshold {
        Some(_) => word_count(&tree.stripped_text(id)),
        None => 0,
    };

    score_from_parts(tag_name, class, element_id, metrics, words, config)
}

/// Composite score as a pure function of the element's description.
///
/// The five terms are combined as a weighted average over the enabled terms.
/// `words` only matters when a minimum word threshold is configured.
pub fn score_from_parts(
    tag_name: &str, class: Option<&str>, id: Option<&str>, metrics: &ScoreMetrics, words: usize,
    config: &ScoreConfig,
) -> ScoreResult {
    let mut result = ScoreResult {
        tag_name: tag_name.to_string(),
        metrics: *metrics,
        text_density: text_density(metrics),
        link_density: link_density(metrics),
        tag_weight: tag_weight(tag_name, config),
        class_id_weight: class_id_weight(class, id, config),
        text_length: text_length_score(metrics),
        below_word_threshold: false,
        final_score: 0.0,
    };

    if let Some(min_words) = config.min_word_threshold
        && words < min_words
    {
        result.below_word_threshold = true;
        result.final_score = -1.0;
        return result;
    }

    let weights = &config.weights;
    let enabled = &config.enabled;
    let terms = [
        (enabled.text_density, weights.text_density, result.text_density),
        (enabled.link_density, weights.link_density, result.link_density),
        (enabled.tag_weight, weights.tag_weight, result.tag_weight),
        (enabled.class_id_weight, weights.class_id_weight, result.class_id_weight.max(0.0)),
        (enabled.text_length, weights.text_length, result.text_length),
    ];

    let (score, total_weight) = terms
        .iter()
        .filter(|(on, _, _)| *on)
        .fold((0.0, 0.0), |(score, total), (_, weight, value)| (score + weight * value, total + weight));

    result.final_score = if total_weight > 0.0 { score / total_weight } else { 0.0 };
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    fn metrics(text_len: usize, tag_len: usize, link_text_len: usize) -> ScoreMetrics {
        ScoreMetrics { text_len, tag_len, link_text_len }
    }

    #[test]
    fn test_metrics_direct_anchors_only() {
        let tree = DomTree::parse(r#"<div>Intro <a href="/a">one</a><p><a href="/b">nested</a></p></div>"#);
        let div = tree.find_first("div").unwrap();
        let m = ScoreMetrics::compute(&tree, div);

        assert_eq!(m.text_len, "Introonenested".len());
        assert_eq!(m.link_text_len, 3);
        assert_eq!(m.tag_len, tree.inner_html(div).len());
    }

    #[test]
    fn test_tag_len_counts_utf8_bytes() {
        let tree = DomTree::parse("<p>héllo</p>");
        let p = tree.find_first("p").unwrap();
        let m = ScoreMetrics::compute(&tree, p);
        assert_eq!(m.text_len, 5);
        assert_eq!(m.tag_len, 6);
    }

    #[test]
    fn test_ratios_guard_division_by_zero() {
        let empty = metrics(0, 0, 0);
        assert_eq!(empty.text_ratio(), 0.0);
        assert_eq!(empty.link_ratio(), 1.0);
        assert_eq!(text_density(&empty), 0.0);
        assert_eq!(link_density(&empty), 1.0);
    }

    #[test]
    fn test_link_density_all_links() {
        assert_eq!(link_density(&metrics(10, 40, 10)), 0.0);
        assert!((link_density(&metrics(10, 40, 4)) - 0.6).abs() < EPSILON);
    }

    #[test]
    fn test_tag_weight_lookup() {
        let config = ScoreConfig::default();
        assert_eq!(tag_weight("article", &config), 1.5);
        assert_eq!(tag_weight("h4", &config), 0.9);
        assert_eq!(tag_weight("table", &config), DEFAULT_TAG_WEIGHT);
    }

    #[test]
    fn test_class_weight_negative() {
        let config = ScoreConfig::default();
        assert_eq!(class_id_weight(Some("nav-menu"), None, &config), -0.5);
        assert_eq!(class_id_weight(None, Some("Footer"), &config), -0.5);
        assert_eq!(class_id_weight(Some("sidebar left"), Some("comments"), &config), -1.0);
    }

    #[test]
    fn test_class_weight_anchored_at_start() {
        let config = ScoreConfig::default();
        assert_eq!(class_id_weight(Some("main nav"), None, &config), 0.0);
        assert_eq!(class_id_weight(Some("content"), Some("post"), &config), 0.0);
    }

    #[test]
    fn test_custom_negative_pattern() {
        let config = ScoreConfig::default().with_negative_pattern(r"^banner").unwrap();
        assert_eq!(class_id_weight(Some("banner"), None, &config), -0.5);
        assert_eq!(class_id_weight(Some("nav"), None, &config), 0.0);

        let invalid = ScoreConfig::default().with_negative_pattern("(unclosed");
        assert!(matches!(invalid, Err(FitmarkError::InvalidConfig(_))));
    }

    #[test]
    fn test_score_weighted_average() {
        let config = ScoreConfig::default();
        let result = score_from_parts("p", None, None, &metrics(100, 100, 0), 20, &config);

        let expected = 0.4 * 1.0 + 0.2 * 1.0 + 0.2 * 1.0 + 0.1 * 0.0 + 0.1 * 101f64.ln();
        assert!((result.final_score - expected).abs() < EPSILON);
        assert!(!result.below_word_threshold);
    }

    #[test]
    fn test_negative_class_floored_at_zero() {
        let config = ScoreConfig::default();
        let m = metrics(40, 80, 0);
        let plain = score_from_parts("div", None, None, &m, 8, &config);
        let penalized = score_from_parts("div", Some("ads"), Some("nav"), &m, 8, &config);

        assert_eq!(penalized.class_id_weight, -1.0);
        assert_eq!(plain.final_score, penalized.final_score);
    }

    #[test]
    fn test_disabled_terms_leave_the_average() {
        let mut config = ScoreConfig::default();
        config.enabled.text_length = false;
        let result = score_from_parts("p", None, None, &metrics(100, 100, 0), 20, &config);
        assert!((result.final_score - 0.8 / 0.9).abs() < EPSILON);
    }

    #[test]
    fn test_all_terms_disabled_scores_zero() {
        let config = ScoreConfig {
            enabled: MetricToggles {
                text_density: false,
                link_density: false,
                tag_weight: false,
                class_id_weight: false,
                text_length: false,
            },
            ..Default::default()
        };
        let result = score_from_parts("article", None, None, &metrics(500, 600, 0), 90, &config);
        assert_eq!(result.final_score, 0.0);
    }

    #[test]
    fn test_min_word_threshold_forces_removal_score() {
        let config = ScoreConfig { min_word_threshold: Some(5), ..Default::default() };
        let short = score_from_parts("article", None, None, &metrics(200, 200, 0), 4, &config);
        assert_eq!(short.final_score, -1.0);
        assert!(short.below_word_threshold);

        let long = score_from_parts("article", None, None, &metrics(200, 200, 0), 5, &config);
        assert!(long.final_score > 0.0);
    }

    #[test]
    fn test_score_is_deterministic() {
        let config = ScoreConfig::default();
        let m = metrics(57, 133, 12);
        let first = score_from_parts("section", Some("share-bar"), Some("x"), &m, 9, &config);
        let second = score_from_parts("section", Some("share-bar"), Some("x"), &m, 9, &config);
        assert_eq!(first, second);
    }

    #[test]
    fn test_calculate_score_reads_tree() {
        let tree = DomTree::parse(r#"<div class="comment-list" id="c1">Great post, thanks a lot</div>"#);
        let div = tree.find_first("div").unwrap();
        let config = ScoreConfig { min_word_threshold: Some(3), ..Default::default() };
        let m = ScoreMetrics::compute(&tree, div);
        let result = calculate_score(&tree, div, &m, &config);

        assert_eq!(result.tag_name, "div");
        assert_eq!(result.class_id_weight, -0.5);
        assert!(!result.below_word_threshold);
        assert!(result.final_score > 0.0);
    }
}
