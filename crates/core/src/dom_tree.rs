//! Arena-backed DOM tree used by the pruning walk.
//!
//! HTML is tokenized by `scraper` (html5ever underneath) and then copied into a
//! flat arena of [`DomNode`]s that reference each other by index. Removing a
//! subtree is a single [`DomTree::detach`] on an index, so the walker never
//! holds a pointer into a structure it is mutating.
//!
//! # Example
//!
//! ```rust
//! use fitmark_core::DomTree;
//!
//! let mut tree = DomTree::parse("<body><nav>Menu</nav><p>Hello <b>world</b></p></body>");
//! let body = tree.body_id().unwrap();
//! let nav = tree.find_first("nav").unwrap();
//! tree.detach(nav);
//!
//! assert_eq!(tree.stripped_text(body), "Helloworld");
//! assert_eq!(tree.inner_html(body), "<p>Hello <b>world</b></p>");
//! ```

use scraper::{Html, Node};

/// Elements serialized without a closing tag
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "basefont", "bgsound", "br", "col", "embed", "frame", "hr", "img", "input", "keygen", "link",
    "meta", "param", "source", "track", "wbr",
];

/// Elements whose text children are serialized verbatim
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "script", "style", "xmp", "iframe", "noembed", "noframes", "plaintext", "noscript",
];

/// The payload of a node in the arena
#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    /// The synthetic document root
    Document,
    /// An element with its lowercase tag name and attributes
    Element { tag_name: String, attrs: Vec<(String, String)> },
    /// A text node
    Text(String),
}

/// A node in the DOM arena
#[derive(Debug, Clone)]
pub struct DomNode {
    /// What this node holds
    pub data: NodeData,
    /// Parent node ID (`None` for the root and for detached subtrees)
    pub parent_id: Option<usize>,
    /// Child node IDs in document order
    pub child_ids: Vec<usize>,
}

impl DomNode {
    /// Tag name if this node is an element
    pub fn tag_name(&self) -> Option<&str> {
        match &self.data {
            NodeData::Element { tag_name, .. } => Some(tag_name),
            _ => None,
        }
    }

    /// Value of an attribute if this node is an element carrying it
    pub fn attr(&self, name: &str) -> Option<&str> {
        match &self.data {
            NodeData::Element { attrs, .. } => attrs.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self.data, NodeData::Element { .. })
    }
}

/// A DOM tree stored as an index arena.
///
/// Node IDs stay valid for the lifetime of the tree. Detached nodes remain in
/// the arena but are no longer reachable from the root.
#[derive(Debug, Clone)]
pub struct DomTree {
    nodes: Vec<DomNode>,
    root_id: usize,
}

impl DomTree {
    /// Parse an HTML document into an arena tree.
    ///
    /// Parsing is best-effort and never fails: malformed markup is repaired the
    /// way browsers do. Comments, doctypes and processing instructions are not
    /// copied into the arena.
    pub fn parse(html: &str) -> Self {
        let document = Html::parse_document(html);
        let mut tree = Self {
            nodes: vec![DomNode { data: NodeData::Document, parent_id: None, child_ids: Vec::new() }],
            root_id: 0,
        };

        let mut stack = document.tree.root().children().map(|child| (child, 0)).collect::<Vec<_>>();
        stack.reverse();

        while let Some((node, parent_id)) = stack.pop() {
            let data = match node.value() {
                Node::Element(el) => NodeData::Element {
                    tag_name: el.name().to_lowercase(),
                    attrs: el.attrs().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
                },
                Node::Text(text) => NodeData::Text(text.text.to_string()),
                _ => continue,
            };

            let is_element = matches!(data, NodeData::Element { .. });
            let node_id = tree.add_node(data, parent_id);

            if is_element {
                let mut children = node.children().map(|child| (child, node_id)).collect::<Vec<_>>();
                children.reverse();
                stack.extend(children);
            }
        }

        tree
    }

    /// Parse HTML and guarantee a `<body>` to anchor the walk.
    ///
    /// html5ever synthesizes a body for almost any input; if none is found the
    /// input is wrapped in one and parsed again.
    pub fn parse_with_body(html: &str) -> Self {
        let tree = Self::parse(html);
        if tree.body_id().is_some() { tree } else { Self::parse(&format!("<body>{}</body>", html)) }
    }

    fn add_node(&mut self, data: NodeData, parent_id: usize) -> usize {
        let node_id = self.nodes.len();
        self.nodes.push(DomNode { data, parent_id: Some(parent_id), child_ids: Vec::new() });
        if let Some(parent) = self.nodes.get_mut(parent_id) {
            parent.child_ids.push(node_id);
        }
        node_id
    }

    /// ID of the document root
    pub fn root_id(&self) -> usize {
        self.root_id
    }

    /// ID of the first attached `<body>` element
    pub fn body_id(&self) -> Option<usize> {
        self.find_first("body")
    }

    /// Get a node by ID
    pub fn get_node(&self, id: usize) -> Option<&DomNode> {
        self.nodes.get(id)
    }

    /// Tag name of the node at `id`, if it is an element
    pub fn tag_name(&self, id: usize) -> Option<&str> {
        self.nodes.get(id).and_then(DomNode::tag_name)
    }

    /// Get the parent of a node
    pub fn get_parent(&self, id: usize) -> Option<&DomNode> {
        let parent_id = self.nodes.get(id)?.parent_id?;
        self.nodes.get(parent_id)
    }

    /// Direct element children of a node, in document order
    pub fn element_children(&self, id: usize) -> Vec<usize> {
        self.nodes
            .get(id)
            .map(|node| {
                node.child_ids
                    .iter()
                    .copied()
                    .filter(|child| self.nodes[*child].is_element())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All attached descendants of a node in pre-order, excluding the node itself
    pub fn descendants(&self, id: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack = match self.nodes.get(id) {
            Some(node) => node.child_ids.iter().rev().copied().collect::<Vec<_>>(),
            None => return out,
        };

        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.nodes[current].child_ids.iter().rev().copied());
        }

        out
    }

    /// First attached element with the given tag name, in document order
    pub fn find_first(&self, tag_name: &str) -> Option<usize> {
        self.descendants(self.root_id)
            .into_iter()
            .find(|id| self.tag_name(*id) == Some(tag_name))
    }

    /// All attached elements whose tag is in `tag_names`, in document order
    pub fn find_all(&self, tag_names: &[&str]) -> Vec<usize> {
        self.descendants(self.root_id)
            .into_iter()
            .filter(|id| self.tag_name(*id).is_some_and(|tag| tag_names.contains(&tag)))
            .collect()
    }

    /// Unlink a subtree from its parent.
    ///
    /// The subtree stays in the arena but is no longer reachable from the root.
    /// Detaching an already detached node is a no-op.
    pub fn detach(&mut self, id: usize) {
        let Some(parent_id) = self.nodes.get_mut(id).and_then(|node| node.parent_id.take()) else {
            return;
        };
        if let Some(parent) = self.nodes.get_mut(parent_id) {
            parent.child_ids.retain(|child| *child != id);
        }
    }

    /// Whether the node is still reachable from the root
    pub fn is_attached(&self, id: usize) -> bool {
        let mut current = id;
        loop {
            if current == self.root_id {
                return true;
            }
            match self.nodes.get(current).and_then(|node| node.parent_id) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Concatenation of every descendant text node with surrounding whitespace
    /// trimmed and empty pieces dropped.
    pub fn stripped_text(&self, id: usize) -> String {
        let mut text = String::new();
        let ids = match self.nodes.get(id) {
            Some(DomNode { data: NodeData::Text(_), .. }) => vec![id],
            Some(_) => self.descendants(id),
            None => return text,
        };

        for node_id in ids {
            if let NodeData::Text(content) = &self.nodes[node_id].data {
                text.push_str(content.trim());
            }
        }

        text
    }

    /// Character count of [`DomTree::stripped_text`]
    pub fn text_len(&self, id: usize) -> usize {
        self.stripped_text(id).chars().count()
    }

    /// Serialized markup of a node's children
    pub fn inner_html(&self, id: usize) -> String {
        let mut out = String::new();
        if let Some(node) = self.nodes.get(id) {
            for child in &node.child_ids {
                self.write_node(*child, &mut out);
            }
        }
        out
    }

    /// Serialized markup of a node including its own tags
    pub fn outer_html(&self, id: usize) -> String {
        let mut out = String::new();
        self.write_node(id, &mut out);
        out
    }

    fn write_node(&self, id: usize, out: &mut String) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };

        match &node.data {
            NodeData::Document => {
                for child in &node.child_ids {
                    self.write_node(*child, out);
                }
            }
            NodeData::Text(content) => {
                let raw = node
                    .parent_id
                    .and_then(|parent| self.tag_name(parent))
                    .is_some_and(|tag| RAW_TEXT_ELEMENTS.contains(&tag));
                if raw {
                    out.push_str(content);
                } else {
                    escape_text(content, out);
                }
            }
            NodeData::Element { tag_name, attrs } => {
                out.push('<');
                out.push_str(tag_name);
                for (name, value) in attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    escape_attr(value, out);
                    out.push('"');
                }
                out.push('>');

                if VOID_ELEMENTS.contains(&tag_name.as_str()) {
                    return;
                }

                for child in &node.child_ids {
                    self.write_node(*child, out);
                }

                out.push_str("</");
                out.push_str(tag_name);
                out.push('>');
            }
        }
    }

    /// Get the total number of nodes, detached ones included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the tree holds nothing but its root
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

fn escape_attr(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_builds_body() {
        let tree = DomTree::parse("<p>Fragment only</p>");
        let body = tree.body_id().unwrap();
        assert_eq!(tree.stripped_text(body), "Fragment only");
        assert!(!tree.is_empty());
    }

    #[test]
    fn test_parent_child_relationships() {
        let tree = DomTree::parse(r#"<div class="parent"><p>Child paragraph</p></div>"#);
        let p = tree.find_first("p").unwrap();
        let parent = tree.get_parent(p).unwrap();
        assert_eq!(parent.tag_name(), Some("div"));
        assert_eq!(parent.attr("class"), Some("parent"));
    }

    #[test]
    fn test_comments_are_dropped() {
        let tree = DomTree::parse("<body><!-- hidden --><p>Visible</p></body>");
        let body = tree.body_id().unwrap();
        assert_eq!(tree.inner_html(body), "<p>Visible</p>");
    }

    #[test]
    fn test_stripped_text_trims_each_piece() {
        let tree = DomTree::parse("<div>  Hello  <span> big </span>\n world </div>");
        let div = tree.find_first("div").unwrap();
        assert_eq!(tree.stripped_text(div), "Hellobigworld");
        assert_eq!(tree.text_len(div), 13);
    }

    #[test]
    fn test_detach_removes_subtree() {
        let mut tree = DomTree::parse("<body><div><aside><p>Side</p></aside><p>Main</p></div></body>");
        let aside = tree.find_first("aside").unwrap();
        let side_p = tree.descendants(aside)[0];
        tree.detach(aside);

        assert!(!tree.is_attached(aside));
        assert!(!tree.is_attached(side_p));
        assert_eq!(tree.find_all(&["p"]).len(), 1);

        tree.detach(aside);
        let div = tree.find_first("div").unwrap();
        assert_eq!(tree.inner_html(div), "<p>Main</p>");
    }

    #[test]
    fn test_element_children_skips_text() {
        let tree = DomTree::parse("<div>text <a href=\"/x\">a</a> more <b>b</b></div>");
        let div = tree.find_first("div").unwrap();
        let children: Vec<_> = tree
            .element_children(div)
            .into_iter()
            .filter_map(|id| tree.tag_name(id).map(str::to_string))
            .collect();
        assert_eq!(children, vec!["a", "b"]);
    }

    #[test]
    fn test_serialization_escapes() {
        let tree = DomTree::parse(r#"<p title="a &quot;b&quot;">1 &lt; 2 &amp; 3</p><br><img src="x.png">"#);
        let body = tree.body_id().unwrap();
        assert_eq!(
            tree.inner_html(body),
            r#"<p title="a &quot;b&quot;">1 &lt; 2 &amp; 3</p><br><img src="x.png">"#
        );
    }

    #[test]
    fn test_raw_text_not_escaped() {
        let tree = DomTree::parse("<body><script>if (a < b) {}</script></body>");
        let script = tree.find_first("script").unwrap();
        assert_eq!(tree.outer_html(script), "<script>if (a < b) {}</script>");
    }

    #[test]
    fn test_malformed_markup_is_repaired() {
        let tree = DomTree::parse("<div><p>Unclosed <b>bold</div><p>Next");
        let body = tree.body_id().unwrap();
        assert!(tree.stripped_text(body).contains("Next"));
    }
}
