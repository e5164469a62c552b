// Core modules
pub mod ast;
pub mod codegen;
pub mod error;
pub mod parser;
pub mod transform;

// Re-export key types for public API
pub use ast::{Align, AttrList, Document, Node, NodeId, NodeKind, NodeName};
pub use codegen::{encode, EncodeOptions};
pub use error::{MarkdownError, Result};
pub use parser::decode;
pub use transform::{collect_headings, to_toc, traverse, ListStyle, TocOptions, Visitor};

/// Converts a Markdown document straight to HTML.
///
/// This is the one-call entry point for the engine, composing the two
/// pipeline stages:
/// 1. **Decoding:** the block and inline parsers build the document tree
/// 2. **Encoding:** the tree walker serializes it to indented HTML5
///
/// The dialect is strict; the first syntax violation aborts the conversion.
///
/// # Arguments
///
/// * `markdown` - The input Markdown text to convert
///
/// # Returns
///
/// Returns the generated HTML as a String, or the first violation found
///
/// # Examples
///
/// ```
/// let html = strictmark::format("# Title").unwrap();
/// assert_eq!(html, "<article>\n  <h1>Title</h1>\n</article>\n");
/// ```
pub fn format(markdown: &str) -> Result<String> {
    let doc = decode(markdown)?;
    encode(&doc, &EncodeOptions::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_works() {
        let markdown = "# Hello, World!";
        let expected_html = "<article>\n  <h1>Hello, World!</h1>\n</article>\n";
        assert_eq!(format(markdown).unwrap(), expected_html);
    }

    #[test]
    fn end_to_end_scenarios() {
        let scenarios: &[(&str, &str)] = &[
            ("# Title", "<article>\n  <h1>Title</h1>\n</article>\n"),
            ("- a\n- b", "<ul>\n  <li>a\n  <li>b\n</ul>\n"),
            (
                "- a\n  - b",
                "<ul>\n  <li>a\n    <ul>\n      <li>b\n    </ul>\n</ul>\n",
            ),
            (
                "```js\nx=1\n```",
                "<pre class=js data-code=js><code translate=no class=language-js>x=1</code></pre>\n",
            ),
        ];
        for (markdown, expected) in scenarios {
            assert_eq!(
                format(markdown).unwrap(),
                *expected,
                "input: {:?}",
                markdown
            );
        }
    }

    #[test]
    fn failure_scenarios() {
        assert!(matches!(
            format("# H1\n### H3"),
            Err(MarkdownError::Sectioning { .. })
        ));
        assert!(matches!(
            format("-  double space"),
            Err(MarkdownError::Whitespace { .. })
        ));
        assert!(matches!(
            format("| a | b |"),
            Err(MarkdownError::Structure { .. })
        ));
    }

    #[test]
    fn document_walk_reaches_every_attached_node() {
        let doc = decode("# A\n\ntext with *em* and [x](u)\n\n- one\n  - two").unwrap();
        let mut seen = std::collections::HashSet::new();
        let mut stack = vec![doc.root()];
        while let Some(id) = stack.pop() {
            assert!(seen.insert(id), "node visited twice");
            for &child in &doc[id].children {
                assert_eq!(doc[child].parent, Some(id));
                stack.push(child);
            }
        }
        assert!(seen.len() > 5);
    }

    #[test]
    fn section_levels_increase_by_one_along_any_path() {
        let doc = decode("# A\n## B\n### C\n## D\n# E").unwrap();
        fn walk(doc: &Document, id: NodeId, parent_level: usize) {
            for &child in &doc[id].children {
                if doc[child].name == NodeName::Section {
                    assert_eq!(doc[child].level, parent_level + 1);
                    walk(doc, child, doc[child].level);
                } else {
                    walk(doc, child, parent_level);
                }
            }
        }
        walk(&doc, doc.root(), 0);
    }
}
