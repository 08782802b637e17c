pub mod dom_tree;
pub mod error;
pub mod formatters;
pub mod generator;
pub mod postprocess;
pub mod preprocess;
pub mod pruning;
pub mod scoring;

#[doc(hidden)]
pub use dom_tree::{DomNode, DomTree, NodeData};
pub use error::{FitmarkError, Result};
pub use formatters::{CitationEntry, Citations, LinkOccurrence, convert_links_to_citations, link_citations, resolve_url};
pub use formatters::{HtmdRenderer, RenderOptions, Renderer};
pub use generator::{ConvertConfig, GenerationResult, MarkdownGenerator, html_to_markdown, normalize_code_fences};
pub use postprocess::postprocess_markdown;
pub use preprocess::prepare_html;
pub use pruning::{PruneStats, PruningConfig, PruningConfigBuilder, PruningFilter, ThresholdType, adjusted_threshold};
#[doc(hidden)]
pub use scoring::{
    MetricToggles, MetricWeights, ScoreConfig, ScoreMetrics, ScoreResult, calculate_score, class_id_weight,
    link_density, text_density,
};
