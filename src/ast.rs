//! The document tree shared by the decoder, the encoder and the transforms.
//!
//! Parent back-references make the node graph cyclic, so the tree is stored
//! as an arena: `Document` owns every `Node`, and `NodeId` indexes into it.
//! Rising to an ancestor is a pointer chase over ids, and replacing a child
//! is a single slot assignment.

use std::fmt;
use std::ops::{Index, IndexMut};

/// Identifier of a node inside a [`Document`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// The semantic role of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeName {
    Root,
    Section,
    Heading,
    P,
    Ul,
    Ol,
    Li,
    Dl,
    Div,
    Dt,
    Dd,
    Blockquote,
    Cite,
    Pre,
    Code,
    Table,
    Thead,
    Tbody,
    Tr,
    Th,
    Td,
    Figure,
    Figcaption,
    Details,
    Summary,
    Html,
    A,
    Img,
    Em,
    Strong,
    Text,
    Raw,
    Empty,
}

impl NodeName {
    /// The lowercase tag for this role, as it appears in output.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeName::Root => "root",
            NodeName::Section => "section",
            NodeName::Heading => "heading",
            NodeName::P => "p",
            NodeName::Ul => "ul",
            NodeName::Ol => "ol",
            NodeName::Li => "li",
            NodeName::Dl => "dl",
            NodeName::Div => "div",
            NodeName::Dt => "dt",
            NodeName::Dd => "dd",
            NodeName::Blockquote => "blockquote",
            NodeName::Cite => "cite",
            NodeName::Pre => "pre",
            NodeName::Code => "code",
            NodeName::Table => "table",
            NodeName::Thead => "thead",
            NodeName::Tbody => "tbody",
            NodeName::Tr => "tr",
            NodeName::Th => "th",
            NodeName::Td => "td",
            NodeName::Figure => "figure",
            NodeName::Figcaption => "figcaption",
            NodeName::Details => "details",
            NodeName::Summary => "summary",
            NodeName::Html => "html",
            NodeName::A => "a",
            NodeName::Img => "img",
            NodeName::Em => "em",
            NodeName::Strong => "strong",
            NodeName::Text => "text",
            NodeName::Raw => "raw",
            NodeName::Empty => "empty",
        }
    }

    /// The rendering kind this role carries when created by the decoder.
    ///
    /// `p`, `li`, `dt` and `dd` are created inline: their children live on
    /// the tag line unless a block child forces the multi-line form.
    pub fn default_kind(&self) -> NodeKind {
        match self {
            NodeName::A
            | NodeName::Img
            | NodeName::Em
            | NodeName::Strong
            | NodeName::Code
            | NodeName::Cite
            | NodeName::Text
            | NodeName::P
            | NodeName::Li
            | NodeName::Dt
            | NodeName::Dd => NodeKind::Inline,
            _ => NodeKind::Block,
        }
    }
}

impl fmt::Display for NodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Governs indentation and line breaks in the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Block,
    Inline,
}

/// Column alignment derived from a table separator row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

impl Align {
    pub fn as_str(&self) -> &'static str {
        match self {
            Align::Left => "left",
            Align::Center => "center",
            Align::Right => "right",
        }
    }
}

/// Insertion-ordered attribute map.
///
/// Attribute emission order is observable in the output, so the entries are
/// kept in a plain `Vec` instead of a hash map. A `None` value stands for a
/// bare key with no `=value` part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttrList {
    entries: Vec<(String, Option<String>)>,
}

impl AttrList {
    /// Creates an empty attribute list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an attribute, updating an existing key in place so its position
    /// in the emission order is preserved.
    pub fn set(&mut self, key: &str, value: Option<&str>) {
        let value = value.map(str::to_string);
        for entry in &mut self.entries {
            if entry.0 == key {
                entry.1 = value;
                return;
            }
        }
        self.entries.push((key.to_string(), value));
    }

    /// Returns the value of a key, if present and non-null.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name == key)
            .and_then(|(_, value)| value.as_deref())
    }

    /// Returns true if the key is present, valued or not.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(name, _)| name == key)
    }

    /// Removes a key and returns its value.
    pub fn remove(&mut self, key: &str) -> Option<Option<String>> {
        let index = self.entries.iter().position(|(name, _)| name == key)?;
        Some(self.entries.remove(index).1)
    }

    /// Iterates over entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_deref()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A single node of the document tree.
#[derive(Debug, Clone)]
pub struct Node {
    pub name: NodeName,
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Depth for headings and sections (1-6) and lists (indent / 2).
    pub level: usize,
    /// Raw text, present only on `text`, `raw`, `figcaption` and the
    /// children of `html` nodes.
    pub text: Option<String>,
    pub attrs: AttrList,
    /// Per-column alignment vector, carried only by `tbody`.
    pub aligns: Vec<Align>,
}

impl Node {
    fn new(name: NodeName, kind: NodeKind) -> Self {
        Node {
            name,
            kind,
            parent: None,
            children: Vec::new(),
            level: 0,
            text: None,
            attrs: AttrList::new(),
            aligns: Vec::new(),
        }
    }
}

/// An arena-backed document tree.
///
/// Created by [`crate::decode`]; the synthetic `root` node is a block of
/// level 0 and is the only node without a parent.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Document {
    /// Creates a document holding only the root node.
    pub fn new() -> Self {
        let mut doc = Document {
            nodes: Vec::new(),
            root: NodeId(0),
        };
        doc.root = doc.push(Node::new(NodeName::Root, NodeKind::Block));
        doc
    }

    /// The synthetic root of the tree.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of nodes allocated in the arena, reachable or not.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    /// Allocates an unattached node with the default kind for its name.
    pub fn new_node(&mut self, name: NodeName) -> NodeId {
        self.push(Node::new(name, name.default_kind()))
    }

    /// Allocates an unattached node with an explicit kind.
    pub fn new_node_with_kind(&mut self, name: NodeName, kind: NodeKind) -> NodeId {
        self.push(Node::new(name, kind))
    }

    /// Allocates a leaf `text` node holding the given literal.
    pub fn new_text(&mut self, text: impl Into<String>) -> NodeId {
        let mut node = Node::new(NodeName::Text, NodeKind::Inline);
        node.text = Some(text.into());
        self.push(node)
    }

    /// Attaches a child at the end of the parent's children, updating the
    /// child's parent reference.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self[child].parent = Some(parent);
        self[parent].children.push(child);
    }

    /// Attaches children in order.
    pub fn append_children(&mut self, parent: NodeId, children: &[NodeId]) {
        for &child in children {
            self.append_child(parent, child);
        }
    }

    /// The last child of a node, if any.
    pub fn last_child(&self, parent: NodeId) -> Option<NodeId> {
        self[parent].children.last().copied()
    }

    /// Appends raw text to a node after removing the inline escapes: a
    /// backslash before any of ``* ` ! [ ] < > ( )`` is dropped. Consecutive
    /// text children coalesce into one node.
    pub fn add_text(&mut self, parent: NodeId, raw: &str) {
        if raw.is_empty() {
            return;
        }
        let unescaped = unescape_markup(raw);
        if let Some(last) = self.last_child(parent) {
            if self[last].name == NodeName::Text {
                self[last]
                    .text
                    .get_or_insert_with(String::new)
                    .push_str(&unescaped);
                return;
            }
        }
        let text = self.new_text(unescaped);
        self.append_child(parent, text);
    }

    /// Deep-copies a subtree and returns the unattached copy.
    pub fn clone_subtree(&mut self, id: NodeId) -> NodeId {
        let mut copy = self[id].clone();
        copy.parent = None;
        copy.children = Vec::new();
        let copy_id = self.push(copy);
        let children = self[id].children.clone();
        for child in children {
            let child_copy = self.clone_subtree(child);
            self.append_child(copy_id, child_copy);
        }
        copy_id
    }

    /// Renders an indented debug listing of a subtree.
    pub fn dump(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.dump_into(id, 0, &mut out);
        out
    }

    fn dump_into(&self, id: NodeId, depth: usize, out: &mut String) {
        let node = &self[id];
        for _ in 0..depth {
            out.push_str("  ");
        }
        out.push_str(node.name.as_str());
        if node.level > 0 {
            out.push_str(&format!(" level={}", node.level));
        }
        if let Some(text) = &node.text {
            out.push_str(&format!(" {:?}", text));
        }
        out.push('\n');
        for &child in &node.children {
            self.dump_into(child, depth + 1, out);
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<NodeId> for Document {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }
}

impl IndexMut<NodeId> for Document {
    fn index_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }
}

/// Removes the inline escapes from decoded text.
pub(crate) fn unescape_markup(raw: &str) -> String {
    let mut text = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(&next) = chars.peek() {
                if matches!(next, '*' | '`' | '!' | '[' | ']' | '<' | '>' | '(' | ')') {
                    text.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        text.push(ch);
    }
    text
}
