//! Line-oriented block parser.
//!
//! The document is split on `\n` and every line is matched against an
//! ordered set of block recognizers; the first match consumes the line.
//! Parsing state is a single cursor node: recognizers attach their output
//! under it and may move it up or down the tree. The per-line dispatch is a
//! plain loop rather than the tail recursion the grammar suggests, so deep
//! documents cannot exhaust the stack.

use crate::ast::{Align, Document, NodeId, NodeName};
use crate::codegen::{escape_text, unescape_href};
use crate::error::{MarkdownError, Result};
use lazy_static::lazy_static;
use regex::Regex;

mod inline;

use inline::parse_inline;

lazy_static! {
    static ref FENCE_RE: Regex = Regex::new(r"^```([A-Za-z0-9_+#-]+)?(?::(\S+))?$").expect("regex");
    static ref MARKER_RE: Regex = Regex::new(r"^:::(?:([a-z]+)(?: (.+))?)?$").expect("regex");
    static ref HTML_RE: Regex =
        Regex::new(r"^ *</?(?:iframe|div|span|p|pre|code|!--)").expect("regex");
    static ref HEADING_RE: Regex = Regex::new(r"^(#+) (.+)$").expect("regex");
    static ref ORDERED_RE: Regex = Regex::new(r"^( *)\d+\. (.+)$").expect("regex");
    static ref UNORDERED_RE: Regex = Regex::new(r"^( *)- (.+)$").expect("regex");
    static ref DEFINITION_RE: Regex = Regex::new(r"^: (.+)$").expect("regex");
    static ref QUOTE_RE: Regex = Regex::new(r"^> (.+)$").expect("regex");
    static ref CAPTION_RE: Regex = Regex::new(r"^Caption: (.+)$").expect("regex");
    static ref ROW_RE: Regex = Regex::new(r"^\|(.*)\|$").expect("regex");
    static ref SPACES_RE: Regex = Regex::new(r"^ +$").expect("regex");
}

/// Parses a complete Markdown document into its AST.
///
/// The decoder is strict: the first syntax violation aborts the parse and
/// the error carries the offending line.
pub fn decode(markdown: &str) -> Result<Document> {
    let mut parser = Parser::new();
    for line in markdown.split('\n') {
        parser.handle_line(line)?;
    }
    Ok(parser.doc)
}

struct Parser {
    doc: Document,
    cursor: NodeId,
    /// Open `html` accumulator; cleared by any non-HTML line.
    html_block: Option<NodeId>,
}

impl Parser {
    fn new() -> Self {
        let doc = Document::new();
        let cursor = doc.root();
        Parser {
            doc,
            cursor,
            html_block: None,
        }
    }

    fn handle_line(&mut self, line: &str) -> Result<()> {
        let html_block = self.html_block.take();

        if let Some(caps) = FENCE_RE.captures(line) {
            if self.doc[self.cursor].name == NodeName::Pre {
                self.cursor = self.doc[self.cursor].parent.expect("pre has a parent");
            } else {
                let pre = self.doc.new_node(NodeName::Pre);
                if let Some(lang) = caps.get(1) {
                    self.doc[pre].attrs.set("lang", Some(lang.as_str()));
                }
                if let Some(path) = caps.get(2) {
                    self.doc[pre].attrs.set("path", Some(path.as_str()));
                }
                self.doc.append_child(self.cursor, pre);
                self.cursor = pre;
            }
            return Ok(());
        }

        if self.doc[self.cursor].name == NodeName::Pre {
            // Stored pre-escaped; the encoder re-emits the lines untouched.
            let text = self.doc.new_text(escape_text(line));
            self.doc.append_child(self.cursor, text);
            return Ok(());
        }

        if let Some(caps) = MARKER_RE.captures(line) {
            return match caps.get(1) {
                None => self.close_details(line),
                Some(name) => {
                    let trailing = caps.get(2).map(|m| m.as_str());
                    self.open_details(name.as_str(), trailing, line)
                }
            };
        }

        if HTML_RE.is_match(line) {
            let html = match html_block {
                Some(id) => id,
                None => {
                    let id = self.doc.new_node(NodeName::Html);
                    self.doc.append_child(self.cursor, id);
                    id
                }
            };
            let raw = self.doc.new_node(NodeName::Raw);
            self.doc[raw].text = Some(line.to_string());
            self.doc.append_child(html, raw);
            self.html_block = Some(html);
            return Ok(());
        }

        if line.is_empty() {
            self.cursor = self.nearest_section();
            return Ok(());
        }

        if let Some(caps) = HEADING_RE.captures(line) {
            return self.heading(caps[1].len(), &caps[2], line);
        }

        if let Some(caps) = ORDERED_RE.captures(line) {
            return self.list_item(NodeName::Ol, caps[1].len(), &caps[2], line);
        }

        if let Some(caps) = UNORDERED_RE.captures(line) {
            return self.list_item(NodeName::Ul, caps[1].len(), &caps[2], line);
        }

        if let Some(caps) = DEFINITION_RE.captures(line) {
            return self.definition(&caps[1], line);
        }

        if let Some(caps) = QUOTE_RE.captures(line) {
            return self.quote(&caps[1], line);
        }

        if let Some(caps) = CAPTION_RE.captures(line) {
            return self.caption(&caps[1], line);
        }

        if let Some(caps) = ROW_RE.captures(line) {
            let inner = caps.get(1).expect("row capture").as_str().to_string();
            return self.row(&inner, line);
        }

        if SPACES_RE.is_match(line) {
            return Err(MarkdownError::whitespace(line));
        }

        self.paragraph(line)
    }

    // --- sections -----------------------------------------------------

    fn heading(&mut self, level: usize, text: &str, line: &str) -> Result<()> {
        self.check_spacing(text, line)?;
        if level > 6 {
            return Err(MarkdownError::sectioning(line));
        }
        let current = self.nearest_section();
        let current_level = self.doc[current].level;
        let parent = if current_level < level {
            if level != current_level + 1 {
                return Err(MarkdownError::sectioning(line));
            }
            current
        } else if current_level == level {
            self.doc[current].parent.expect("non-root section has a parent")
        } else {
            self.rise_to_section_level(current, level - 1, line)?
        };

        let section = self.doc.new_node(NodeName::Section);
        self.doc[section].level = level;
        self.doc.append_child(parent, section);
        let heading = self.doc.new_node(NodeName::Heading);
        self.doc[heading].level = level;
        self.doc.append_child(section, heading);
        let (children, _) = parse_inline(&mut self.doc, text, 0)?;
        self.doc.append_children(heading, &children);
        self.cursor = section;
        Ok(())
    }

    /// Nearest `section` (or `root`) at or above the cursor.
    fn nearest_section(&self) -> NodeId {
        let mut id = self.cursor;
        loop {
            match self.doc[id].name {
                NodeName::Section | NodeName::Root => return id,
                _ => id = self.doc[id].parent.expect("non-root node has a parent"),
            }
        }
    }

    fn rise_to_section_level(&self, from: NodeId, target: usize, line: &str) -> Result<NodeId> {
        let mut id = from;
        loop {
            let node = &self.doc[id];
            if matches!(node.name, NodeName::Section | NodeName::Root) && node.level == target {
                return Ok(id);
            }
            match node.parent {
                Some(parent) => id = parent,
                None => return Err(MarkdownError::sectioning(line)),
            }
        }
    }

    // --- custom blocks ------------------------------------------------

    fn open_details(&mut self, name: &str, trailing: Option<&str>, line: &str) -> Result<()> {
        let (class, summary) = match (name, trailing) {
            ("details", Some(text)) => ("details", text),
            ("message", None) => ("message", "message"),
            ("message", Some("alert")) => ("alert", "alert"),
            _ => return Err(MarkdownError::structure("unknown block marker", line)),
        };
        let details = self.doc.new_node(NodeName::Details);
        self.doc[details].attrs.set("class", Some(class));
        let summary_node = self.doc.new_node(NodeName::Summary);
        self.doc.add_text(summary_node, summary);
        // The body section carries no level: it never renders as <article>
        // and headings inside restart their own section chain.
        let section = self.doc.new_node(NodeName::Section);
        self.doc.append_child(self.cursor, details);
        self.doc.append_child(details, summary_node);
        self.doc.append_child(details, section);
        self.cursor = section;
        Ok(())
    }

    fn close_details(&mut self, line: &str) -> Result<()> {
        let mut id = self.cursor;
        let details = loop {
            if self.doc[id].name == NodeName::Details {
                break id;
            }
            match self.doc[id].parent {
                Some(parent) => id = parent,
                None => return Err(MarkdownError::structure("unmatched block marker", line)),
            }
        };
        self.cursor = self.doc[details].parent.expect("details has a parent");
        Ok(())
    }

    // --- lists --------------------------------------------------------

    fn list_item(&mut self, name: NodeName, indent: usize, text: &str, line: &str) -> Result<()> {
        self.check_spacing(text, line)?;
        if indent % 2 != 0 {
            return Err(MarkdownError::indent(line));
        }
        let depth = indent / 2;
        let list = self.enter_list(name, depth, line)?;
        let item = self.doc.new_node(NodeName::Li);
        self.doc[item].level = depth;
        self.doc.append_child(list, item);
        let (children, _) = parse_inline(&mut self.doc, text, 0)?;
        self.doc.append_children(item, &children);
        self.cursor = list;
        Ok(())
    }

    /// Finds or opens the list a new item of the given kind and depth
    /// belongs to, per the nesting rules.
    fn enter_list(&mut self, name: NodeName, depth: usize, line: &str) -> Result<NodeId> {
        let cursor = self.cursor;
        if !is_list(self.doc[cursor].name) {
            return Ok(self.open_list(cursor, name, depth));
        }

        let current = self.doc[cursor].level;
        if current == depth {
            if self.doc[cursor].name == name {
                return Ok(cursor);
            }
            // Kinds coexist at a depth: the other kind opens a sibling.
            let parent = self.doc[cursor].parent.expect("list has a parent");
            return Ok(self.open_list(parent, name, depth));
        }

        if current + 1 == depth {
            let item = self
                .doc
                .last_child(cursor)
                .filter(|&id| self.doc[id].name == NodeName::Li)
                .ok_or_else(|| MarkdownError::structure("nested list requires an item", line))?;
            return Ok(self.open_list(item, name, depth));
        }

        if current < depth {
            return Err(MarkdownError::indent(line));
        }

        // Dedent: rise to the list at the target depth.
        let mut id = cursor;
        loop {
            let node = &self.doc[id];
            if is_list(node.name) && node.level == depth {
                if node.name == name {
                    return Ok(id);
                }
                let parent = node.parent.expect("list has a parent");
                return Ok(self.open_list(parent, name, depth));
            }
            if !is_list(node.name) && node.name != NodeName::Li {
                return Err(MarkdownError::structure("no enclosing list", line));
            }
            match node.parent {
                Some(parent) => id = parent,
                None => return Err(MarkdownError::structure("no enclosing list", line)),
            }
        }
    }

    fn open_list(&mut self, parent: NodeId, name: NodeName, depth: usize) -> NodeId {
        let list = self.doc.new_node(name);
        self.doc[list].level = depth;
        self.doc.append_child(parent, list);
        list
    }

    // --- definition lists ---------------------------------------------

    fn definition(&mut self, text: &str, line: &str) -> Result<()> {
        self.check_spacing(text, line)?;
        let division = match self.doc.last_child(self.cursor) {
            Some(id) if self.doc[id].name == NodeName::P => {
                // Retroactively turn the paragraph into a dt inside a dl.
                let list = self.doc.new_node(NodeName::Dl);
                let division = self.doc.new_node(NodeName::Div);
                let term = self.doc.new_node(NodeName::Dt);
                let children = std::mem::take(&mut self.doc[id].children);
                self.doc.append_children(term, &children);
                *self.doc[self.cursor]
                    .children
                    .last_mut()
                    .expect("checked last child") = list;
                self.doc[list].parent = Some(self.cursor);
                self.doc.append_child(list, division);
                self.doc.append_child(division, term);
                division
            }
            Some(id) if self.doc[id].name == NodeName::Dl => self
                .doc
                .last_child(id)
                .filter(|&d| self.doc[d].name == NodeName::Div)
                .ok_or_else(|| {
                    MarkdownError::structure("definition list without an entry", line)
                })?,
            _ => return Err(MarkdownError::structure("definition term required", line)),
        };
        let detail = self.doc.new_node(NodeName::Dd);
        let (children, _) = parse_inline(&mut self.doc, text, 0)?;
        self.doc.append_children(detail, &children);
        self.doc.append_child(division, detail);
        Ok(())
    }

    // --- blockquotes --------------------------------------------------

    fn quote(&mut self, text: &str, line: &str) -> Result<()> {
        self.check_spacing(text, line)?;
        let quote = if self.doc[self.cursor].name == NodeName::Blockquote {
            self.cursor
        } else {
            let quote = self.doc.new_node(NodeName::Blockquote);
            self.doc.append_child(self.cursor, quote);
            quote
        };
        let paragraph = self.doc.new_node(NodeName::P);
        self.doc.append_child(quote, paragraph);

        if let Some(rest) = text.strip_prefix("--- ") {
            // Attribution: the first link becomes the citation source.
            let (children, _) = parse_inline(&mut self.doc, rest, 0)?;
            if let Some(href) = self.first_link_href(&children) {
                self.doc[quote].attrs.set("cite", Some(&href));
            }
            self.doc.add_text(paragraph, "--- ");
            let citation = self.doc.new_node(NodeName::Cite);
            self.doc.append_children(citation, &children);
            self.doc.append_child(paragraph, citation);
        } else {
            let (children, _) = parse_inline(&mut self.doc, text, 0)?;
            self.doc.append_children(paragraph, &children);
        }
        self.cursor = quote;
        Ok(())
    }

    fn first_link_href(&self, ids: &[NodeId]) -> Option<String> {
        for &id in ids {
            if self.doc[id].name == NodeName::A {
                if let Some(href) = self.doc[id].attrs.get("href") {
                    return Some(unescape_href(href));
                }
            }
            if let Some(found) = self.first_link_href(&self.doc[id].children.clone()) {
                return Some(found);
            }
        }
        None
    }

    // --- tables -------------------------------------------------------

    fn caption(&mut self, text: &str, line: &str) -> Result<()> {
        self.check_spacing(text, line)?;
        let figure = self.doc.new_node(NodeName::Figure);
        let caption = self.doc.new_node(NodeName::Figcaption);
        self.doc[caption].text = Some(text.to_string());
        let table = self.doc.new_node(NodeName::Table);
        let head = self.doc.new_node(NodeName::Thead);
        self.doc.append_child(self.cursor, figure);
        self.doc.append_child(figure, caption);
        self.doc.append_child(figure, table);
        self.doc.append_child(table, head);
        self.cursor = head;
        Ok(())
    }

    fn row(&mut self, inner: &str, line: &str) -> Result<()> {
        match self.doc[self.cursor].name {
            NodeName::Thead => {
                if !inner.is_empty()
                    && inner.chars().all(|c| matches!(c, ':' | '-' | ' ' | '|'))
                {
                    self.alignment_row(inner, line)
                } else {
                    self.header_row(inner, line)
                }
            }
            NodeName::Tbody => self.body_row(inner, line),
            _ => Err(MarkdownError::structure("Table caption required", line)),
        }
    }

    fn alignment_row(&mut self, inner: &str, line: &str) -> Result<()> {
        let aligns: Vec<Align> = inner.split('|').map(derive_align).collect();
        let head = self.cursor;
        if let Some(first_row) = self.doc[head].children.first().copied() {
            if self.doc[first_row].children.len() != aligns.len() {
                return Err(MarkdownError::structure("column count mismatch", line));
            }
        }
        for row in self.doc[head].children.clone() {
            let cells = self.doc[row].children.clone();
            for (cell, align) in cells.into_iter().zip(&aligns) {
                self.doc[cell].attrs.set("align", Some(align.as_str()));
            }
        }
        let table = self.doc[head].parent.expect("thead has a parent");
        let body = self.doc.new_node(NodeName::Tbody);
        self.doc[body].aligns = aligns;
        self.doc.append_child(table, body);
        self.cursor = body;
        Ok(())
    }

    fn header_row(&mut self, inner: &str, line: &str) -> Result<()> {
        let cells: Vec<&str> = inner.split('|').collect();
        if let Some(first_row) = self.doc[self.cursor].children.first().copied() {
            if self.doc[first_row].children.len() != cells.len() {
                return Err(MarkdownError::structure("column count mismatch", line));
            }
        }
        let row = self.doc.new_node(NodeName::Tr);
        self.doc.append_child(self.cursor, row);
        for cell in cells {
            let cell_node = self.doc.new_node(NodeName::Th);
            self.doc.append_child(row, cell_node);
            let (children, _) = parse_inline(&mut self.doc, cell, 0)?;
            self.doc.append_children(cell_node, &children);
        }
        Ok(())
    }

    fn body_row(&mut self, inner: &str, line: &str) -> Result<()> {
        let cells: Vec<&str> = inner.split('|').collect();
        let aligns = self.doc[self.cursor].aligns.clone();
        if cells.len() != aligns.len() {
            return Err(MarkdownError::structure("column count mismatch", line));
        }
        let row = self.doc.new_node(NodeName::Tr);
        self.doc.append_child(self.cursor, row);
        for (cell, align) in cells.into_iter().zip(aligns) {
            let cell_node = self.doc.new_node(NodeName::Td);
            self.doc[cell_node].attrs.set("align", Some(align.as_str()));
            self.doc.append_child(row, cell_node);
            let (children, _) = parse_inline(&mut self.doc, cell, 0)?;
            self.doc.append_children(cell_node, &children);
        }
        Ok(())
    }

    // --- paragraphs ---------------------------------------------------

    fn paragraph(&mut self, line: &str) -> Result<()> {
        if line.starts_with(' ') || line.ends_with(' ') {
            return Err(MarkdownError::whitespace(line));
        }
        let paragraph = self.doc.new_node(NodeName::P);
        self.doc.append_child(self.cursor, paragraph);
        let (children, _) = parse_inline(&mut self.doc, line, 0)?;
        self.doc.append_children(paragraph, &children);
        Ok(())
    }

    /// A second space after a block marker, or a trailing space, is fatal.
    fn check_spacing(&self, text: &str, line: &str) -> Result<()> {
        if text.starts_with(' ') || text.ends_with(' ') {
            return Err(MarkdownError::whitespace(line));
        }
        Ok(())
    }
}

fn is_list(name: NodeName) -> bool {
    matches!(name, NodeName::Ul | NodeName::Ol)
}

fn derive_align(cell: &str) -> Align {
    let cell = cell.trim();
    let left = cell.starts_with(':');
    let right = cell.ends_with(':');
    match (left, right) {
        (true, false) => Align::Left,
        (false, true) => Align::Right,
        _ => Align::Center,
    }
}
