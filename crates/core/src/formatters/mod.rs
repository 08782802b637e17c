pub mod citations;
pub mod markdown;

pub use citations::{CitationEntry, Citations, LinkOccurrence, convert_links_to_citations, link_citations, resolve_url};
pub use markdown::{HtmdRenderer, RenderOptions, Renderer};
