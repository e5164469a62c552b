//! HTML encoder.
//!
//! A recursive walker over the document tree that emits indented HTML5.
//! Dispatch is by node name first, then by kind; a node shape the dispatcher
//! cannot place is a decoder/encoder drift bug and aborts the walk.

use crate::ast::{AttrList, Document, Node, NodeId, NodeKind, NodeName};
use crate::error::{MarkdownError, Result};

/// Attribute keys that are double-quoted regardless of their value.
const QUOTED_KEYS: &[&str] = &["title", "alt", "cite", "href", "id"];

/// Options controlling HTML output.
#[derive(Debug, Clone, Default)]
pub struct EncodeOptions {
    /// Starting indentation column.
    pub indent: usize,
}

impl EncodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the starting indentation column.
    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }
}

/// Serializes a document to HTML, starting from its root.
pub fn encode(doc: &Document, options: &EncodeOptions) -> Result<String> {
    let mut out = String::new();
    encode_node(doc, doc.root(), options.indent, &mut out)?;
    Ok(out)
}

fn encode_node(doc: &Document, id: NodeId, indent: usize, out: &mut String) -> Result<()> {
    let node = &doc[id];
    match node.name {
        NodeName::Root => encode_children(doc, id, indent, out),

        NodeName::Empty => match node.kind {
            NodeKind::Block => encode_children(doc, id, indent, out),
            // Inline pseudo-containers suppress their children's indentation.
            NodeKind::Inline => encode_children(doc, id, 0, out),
        },

        NodeName::Text => {
            push_pad(out, indent);
            out.push_str(&escape_text_node(node_text(node)?));
            Ok(())
        }

        NodeName::Raw => {
            push_pad(out, indent);
            out.push_str(node_text(node)?);
            Ok(())
        }

        NodeName::Heading => {
            push_pad(out, indent);
            out.push_str(&format!("<h{}", node.level));
            push_attrs(out, &node.attrs);
            out.push('>');
            render_inline_children(doc, id, out)?;
            out.push_str(&format!("</h{}>\n", node.level));
            Ok(())
        }

        NodeName::Section => {
            let tag = if node.level == 1 { "article" } else { "section" };
            encode_block(doc, id, tag, &node.attrs, indent, out)
        }

        NodeName::Pre => encode_pre(doc, id, indent, out),

        NodeName::Th | NodeName::Td | NodeName::Summary => {
            push_pad(out, indent);
            push_open_tag(out, node.name.as_str(), &node.attrs);
            render_inline_children(doc, id, out)?;
            out.push_str("</");
            out.push_str(node.name.as_str());
            out.push_str(">\n");
            Ok(())
        }

        NodeName::Figcaption => {
            push_pad(out, indent);
            push_open_tag(out, "figcaption", &node.attrs);
            out.push_str(&escape_text(node_text(node)?));
            out.push('\n');
            Ok(())
        }

        NodeName::Dt | NodeName::Dd => match node.kind {
            NodeKind::Inline => {
                push_pad(out, indent);
                push_open_tag(out, node.name.as_str(), &node.attrs);
                render_inline_children(doc, id, out)?;
                out.push('\n');
                Ok(())
            }
            NodeKind::Block => {
                encode_block(doc, id, node.name.as_str(), &node.attrs, indent, out)
            }
        },

        NodeName::Details => {
            // The class attribute is decoder-side state only.
            let mut attrs = node.attrs.clone();
            attrs.remove("class");
            encode_block(doc, id, "details", &attrs, indent, out)
        }

        NodeName::P | NodeName::Li => encode_mixed(doc, id, indent, out),

        NodeName::Html => {
            for &child in &node.children {
                push_pad(out, indent);
                out.push_str(node_text(&doc[child])?);
                out.push('\n');
            }
            Ok(())
        }

        NodeName::A
        | NodeName::Em
        | NodeName::Strong
        | NodeName::Code
        | NodeName::Cite
        | NodeName::Img => render_inline_node(doc, id, out),

        NodeName::Blockquote
        | NodeName::Ul
        | NodeName::Ol
        | NodeName::Dl
        | NodeName::Div
        | NodeName::Table
        | NodeName::Thead
        | NodeName::Tbody
        | NodeName::Tr
        | NodeName::Figure => {
            if node.children.is_empty() {
                // Void block element.
                push_pad(out, indent);
                push_open_tag(out, node.name.as_str(), &node.attrs);
                out.push('\n');
                Ok(())
            } else {
                encode_block(doc, id, node.name.as_str(), &node.attrs, indent, out)
            }
        }
    }
}

fn encode_children(doc: &Document, id: NodeId, indent: usize, out: &mut String) -> Result<()> {
    for &child in &doc[id].children {
        encode_node(doc, child, indent, out)?;
    }
    Ok(())
}

fn encode_block(
    doc: &Document,
    id: NodeId,
    tag: &str,
    attrs: &AttrList,
    indent: usize,
    out: &mut String,
) -> Result<()> {
    push_pad(out, indent);
    push_open_tag(out, tag, attrs);
    out.push('\n');
    encode_children(doc, id, indent + 2, out)?;
    push_pad(out, indent);
    out.push_str("</");
    out.push_str(tag);
    out.push_str(">\n");
    Ok(())
}

/// The mixed-inline rule for `p` and `li`: runs of inline children form line
/// groups, block children keep their own block framing, and neither form
/// emits a closing tag.
fn encode_mixed(doc: &Document, id: NodeId, indent: usize, out: &mut String) -> Result<()> {
    let node = &doc[id];
    push_pad(out, indent);
    push_open_tag(out, node.name.as_str(), &node.attrs);

    let children = &node.children;
    if children.is_empty() {
        out.push('\n');
        return Ok(());
    }

    let mut pos = 0;
    let mut first = true;
    while pos < children.len() {
        if doc[children[pos]].kind == NodeKind::Inline {
            let start = pos;
            while pos < children.len() && doc[children[pos]].kind == NodeKind::Inline {
                pos += 1;
            }
            if !first {
                push_pad(out, indent + 2);
            }
            for &inline in &children[start..pos] {
                render_inline_node(doc, inline, out)?;
            }
            out.push('\n');
        } else {
            if first {
                out.push('\n');
            }
            encode_node(doc, children[pos], indent + 2, out)?;
            pos += 1;
        }
        first = false;
    }
    Ok(())
}

fn encode_pre(doc: &Document, id: NodeId, indent: usize, out: &mut String) -> Result<()> {
    let node = &doc[id];
    let lang = node.attrs.get("lang");
    let path = node.attrs.get("path");

    let mut attrs = AttrList::new();
    if let Some(lang) = lang {
        attrs.set("class", Some(lang));
        attrs.set("data-code", Some(lang));
    }
    if let Some(path) = path {
        attrs.set("data-path", Some(path));
    }

    push_pad(out, indent);
    out.push_str("<pre");
    push_attrs(out, &attrs);
    out.push_str("><code translate=no");
    if let Some(lang) = lang {
        out.push_str(" class=language-");
        out.push_str(lang);
    }
    out.push('>');
    // The decoder stored the lines already escaped.
    let mut first = true;
    for &child in &node.children {
        if !first {
            out.push('\n');
        }
        out.push_str(node_text(&doc[child])?);
        first = false;
    }
    out.push_str("</code></pre>\n");
    Ok(())
}

fn render_inline_children(doc: &Document, id: NodeId, out: &mut String) -> Result<()> {
    for &child in &doc[id].children {
        render_inline_node(doc, child, out)?;
    }
    Ok(())
}

fn render_inline_node(doc: &Document, id: NodeId, out: &mut String) -> Result<()> {
    let node = &doc[id];
    match node.name {
        NodeName::Text => {
            out.push_str(&escape_text_node(node_text(node)?));
            Ok(())
        }
        NodeName::A => {
            // The inline parser keeps parens escaped inside destinations.
            let mut attrs = node.attrs.clone();
            if let Some(href) = node.attrs.get("href") {
                let href = unescape_href(href);
                attrs.set("href", Some(&href));
            }
            push_open_tag(out, "a", &attrs);
            render_inline_children(doc, id, out)?;
            out.push_str("</a>");
            Ok(())
        }
        NodeName::Em | NodeName::Strong | NodeName::Code | NodeName::Cite => {
            push_open_tag(out, node.name.as_str(), &node.attrs);
            render_inline_children(doc, id, out)?;
            out.push_str("</");
            out.push_str(node.name.as_str());
            out.push('>');
            Ok(())
        }
        NodeName::Img => {
            push_open_tag(out, "img", &node.attrs);
            Ok(())
        }
        NodeName::Empty if node.kind == NodeKind::Inline => {
            render_inline_children(doc, id, out)
        }
        _ => Err(MarkdownError::generation(format!(
            "cannot render {} inside an inline run",
            node.name
        ))),
    }
}

fn node_text(node: &Node) -> Result<&str> {
    node.text
        .as_deref()
        .ok_or_else(|| MarkdownError::generation(format!("{} node without text", node.name)))
}

// --- escaping and attributes -----------------------------------------

/// HTML-escapes text with the engine's fixed five-character set.
pub(crate) fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Escapes a text node, rendering a bare attribution dash as an em dash.
fn escape_text_node(text: &str) -> String {
    if text == "--- " {
        return String::from("&mdash; ");
    }
    escape_text(text)
}

/// Reverts the escapes the inline parser leaves inside link destinations.
pub(crate) fn unescape_href(href: &str) -> String {
    href.replace("\\(", "(").replace("\\)", ")")
}

fn needs_quotes(value: &str) -> bool {
    value
        .chars()
        .any(|c| matches!(c, ' ' | '"' | '\'' | '`' | '=' | '<' | '>'))
}

fn push_attrs(out: &mut String, attrs: &AttrList) {
    for (key, value) in attrs.iter() {
        if key.starts_with('_') {
            continue;
        }
        if key == "align" {
            if let Some(value) = value {
                out.push_str(" class=align-");
                out.push_str(value);
            }
            continue;
        }
        out.push(' ');
        out.push_str(key);
        match value {
            None => {}
            Some(value) if QUOTED_KEYS.contains(&key) || needs_quotes(value) => {
                out.push_str("=\"");
                out.push_str(value);
                out.push('"');
            }
            Some(value) => {
                out.push('=');
                out.push_str(value);
            }
        }
    }
}

fn push_open_tag(out: &mut String, tag: &str, attrs: &AttrList) {
    out.push('<');
    out.push_str(tag);
    push_attrs(out, attrs);
    out.push('>');
}

fn push_pad(out: &mut String, indent: usize) {
    for _ in 0..indent {
        out.push(' ');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::decode;

    fn render(markdown: &str) -> String {
        let doc = decode(markdown).expect("decode");
        encode(&doc, &EncodeOptions::default()).expect("encode")
    }

    #[test]
    fn escapes_the_fixed_character_set() {
        assert_eq!(
            escape_text(r#"a & <b> "c" 'd'"#),
            "a &amp; &lt;b&gt; &quot;c&quot; &apos;d&apos;"
        );
    }

    #[test]
    fn attribution_dash_becomes_mdash() {
        assert_eq!(escape_text_node("--- "), "&mdash; ");
        assert_eq!(escape_text_node("--- x"), "--- x");
    }

    #[test]
    fn attr_values_quote_only_when_unsafe() {
        let mut attrs = AttrList::new();
        attrs.set("class", Some("note"));
        attrs.set("data-x", Some("a b"));
        let mut out = String::new();
        push_attrs(&mut out, &attrs);
        assert_eq!(out, " class=note data-x=\"a b\"");
    }

    #[test]
    fn reserved_keys_always_quote() {
        let mut attrs = AttrList::new();
        attrs.set("href", Some("x"));
        attrs.set("id", Some("y"));
        let mut out = String::new();
        push_attrs(&mut out, &attrs);
        assert_eq!(out, " href=\"x\" id=\"y\"");
    }

    #[test]
    fn underscore_keys_are_suppressed_and_null_keys_are_bare() {
        let mut attrs = AttrList::new();
        attrs.set("_scratch", Some("x"));
        attrs.set("open", None);
        let mut out = String::new();
        push_attrs(&mut out, &attrs);
        assert_eq!(out, " open");
    }

    #[test]
    fn align_rewrites_to_a_class() {
        let mut attrs = AttrList::new();
        attrs.set("align", Some("left"));
        let mut out = String::new();
        push_attrs(&mut out, &attrs);
        assert_eq!(out, " class=align-left");
    }

    #[test]
    fn top_section_is_an_article() {
        assert_eq!(render("# Title"), "<article>\n  <h1>Title</h1>\n</article>\n");
    }

    #[test]
    fn nested_section_keeps_its_tag() {
        assert_eq!(
            render("# A\n## B"),
            "<article>\n  <h1>A</h1>\n  <section>\n    <h2>B</h2>\n  </section>\n</article>\n"
        );
    }

    #[test]
    fn list_items_are_open_only() {
        assert_eq!(render("- a\n- b"), "<ul>\n  <li>a\n  <li>b\n</ul>\n");
    }

    #[test]
    fn nested_list_indents_inside_the_item() {
        assert_eq!(
            render("- a\n  - b"),
            "<ul>\n  <li>a\n    <ul>\n      <li>b\n    </ul>\n</ul>\n"
        );
    }

    #[test]
    fn pre_emits_language_attributes() {
        assert_eq!(
            render("```js\nx=1\n```"),
            "<pre class=js data-code=js><code translate=no class=language-js>x=1</code></pre>\n"
        );
    }

    #[test]
    fn pre_without_lang_is_bare() {
        assert_eq!(
            render("```\na<b\nc\n```"),
            "<pre><code translate=no>a&lt;b\nc</code></pre>\n"
        );
    }

    #[test]
    fn pre_path_becomes_data_path() {
        assert_eq!(
            render("```js:app.js\nx\n```"),
            "<pre class=js data-code=js data-path=app.js><code translate=no class=language-js>x</code></pre>\n"
        );
    }

    #[test]
    fn details_drops_its_class() {
        assert_eq!(
            render(":::message\nnote\n:::"),
            "<details>\n  <summary>message</summary>\n  <section>\n    <p>note\n  </section>\n</details>\n"
        );
    }

    #[test]
    fn definition_list_renders_open_only_entries() {
        assert_eq!(
            render("Term\n: Definition"),
            "<dl>\n  <div>\n    <dt>Term\n    <dd>Definition\n  </div>\n</dl>\n"
        );
    }

    #[test]
    fn figure_renders_caption_and_aligned_cells() {
        assert_eq!(
            render("Caption: T\n|a|b|\n|:-|-:|\n|1|2|"),
            concat!(
                "<figure>\n",
                "  <figcaption>T\n",
                "  <table>\n",
                "    <thead>\n",
                "      <tr>\n",
                "        <th class=align-left>a</th>\n",
                "        <th class=align-right>b</th>\n",
                "      </tr>\n",
                "    </thead>\n",
                "    <tbody>\n",
                "      <tr>\n",
                "        <td class=align-left>1</td>\n",
                "        <td class=align-right>2</td>\n",
                "      </tr>\n",
                "    </tbody>\n",
                "  </table>\n",
                "</figure>\n",
            )
        );
    }

    #[test]
    fn blockquote_attribution_renders_cite() {
        assert_eq!(
            render("> quoted\n> --- [src](http://x)"),
            concat!(
                "<blockquote cite=\"http://x\">\n",
                "  <p>quoted\n",
                "  <p>&mdash; <cite><a href=\"http://x\">src</a></cite>\n",
                "</blockquote>\n",
            )
        );
    }

    #[test]
    fn html_block_is_verbatim() {
        assert_eq!(
            render("<div class=\"x\">\n  <p>hi</p>\n</div>"),
            "<div class=\"x\">\n  <p>hi</p>\n</div>\n"
        );
    }

    #[test]
    fn image_renders_as_a_void_tag() {
        assert_eq!(
            render("![a pic](img.png)"),
            "<p><img loading=lazy decoding=async src=img.png alt=\"a pic\">\n"
        );
    }

    #[test]
    fn link_href_parens_are_unescaped() {
        assert_eq!(
            render(r"[x](http://e/\(v\))"),
            "<p><a href=\"http://e/(v)\">x</a>\n"
        );
    }

    #[test]
    fn indent_option_shifts_the_output() {
        let doc = decode("- a").unwrap();
        let html = encode(&doc, &EncodeOptions::new().with_indent(2)).unwrap();
        assert_eq!(html, "  <ul>\n    <li>a\n  </ul>\n");
    }

    #[test]
    fn block_node_in_an_inline_run_is_a_generation_error() {
        use crate::ast::{Document, NodeName};
        let mut doc = Document::new();
        let root = doc.root();
        let heading = doc.new_node(NodeName::Heading);
        doc[heading].level = 1;
        doc.append_child(root, heading);
        let list = doc.new_node(NodeName::Ul);
        doc.append_child(heading, list);
        let error = encode(&doc, &EncodeOptions::default()).unwrap_err();
        assert!(matches!(error, MarkdownError::Generation { .. }));
    }
}
