//! Tree transforms: the plugin visitor and the table-of-contents builder.

use crate::ast::{Document, NodeId, NodeName};
use crate::error::{MarkdownError, Result};

/// A plugin for [`traverse`].
///
/// Both hooks receive the document and a node id and must return a node id:
/// the returned node replaces the visited child in its parent. The defaults
/// are the identity, so a plugin only implements the hook it needs.
pub trait Visitor {
    /// Called before a node's children are visited.
    fn enter(&mut self, doc: &mut Document, node: NodeId) -> NodeId {
        let _ = doc;
        node
    }

    /// Called after a node's children are visited.
    fn leave(&mut self, doc: &mut Document, node: NodeId) -> NodeId {
        let _ = doc;
        node
    }
}

/// Recursively replaces every child with `leave(traverse(enter(child)))`.
///
/// `enter` runs pre-order and `leave` post-order. Returns the root it was
/// given so calls can nest.
pub fn traverse<V: Visitor>(doc: &mut Document, root: NodeId, visitor: &mut V) -> NodeId {
    let mut index = 0;
    while index < doc[root].children.len() {
        let child = doc[root].children[index];
        let entered = visitor.enter(doc, child);
        let walked = traverse(doc, entered, visitor);
        let left = visitor.leave(doc, walked);
        if left != child {
            doc[root].children[index] = left;
            doc[left].parent = Some(root);
        }
        index += 1;
    }
    root
}

/// The list element a table of contents is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListStyle {
    #[default]
    Ordered,
    Unordered,
}

/// Options for [`to_toc`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TocOptions {
    pub list: ListStyle,
}

/// Rebuilds a flat sequence of heading nodes into a nested list tree
/// mirroring their level sequence.
///
/// A level increase of exactly one descends into a fresh list under the
/// current last item; equal levels append siblings; lower levels rise back.
/// The heading content is cloned into each item. Returns the outermost list.
pub fn to_toc(doc: &mut Document, headings: &[NodeId], options: &TocOptions) -> Result<NodeId> {
    let name = match options.list {
        ListStyle::Ordered => NodeName::Ol,
        ListStyle::Unordered => NodeName::Ul,
    };
    let outer = doc.new_node(name);
    let first_level = match headings.first() {
        Some(&id) => doc[id].level,
        None => return Ok(outer),
    };

    let mut stack = vec![outer];
    let mut current = first_level;
    for &heading in headings {
        let level = doc[heading].level;
        if level == current + 1 {
            let list = *stack.last().expect("stack is never empty");
            let item = doc.last_child(list).ok_or_else(|| {
                MarkdownError::structure("heading level jump", doc.dump(heading))
            })?;
            let nested = doc.new_node(name);
            doc.append_child(item, nested);
            stack.push(nested);
            current = level;
        } else if level < current {
            while current > level && stack.len() > 1 {
                stack.pop();
                current -= 1;
            }
            if current != level {
                return Err(MarkdownError::structure(
                    "heading level jump",
                    doc.dump(heading),
                ));
            }
        } else if level != current {
            return Err(MarkdownError::structure(
                "heading level jump",
                doc.dump(heading),
            ));
        }

        let list = *stack.last().expect("stack is never empty");
        let list_level = doc[list].level;
        let item = doc.new_node(NodeName::Li);
        doc[item].level = list_level;
        doc.append_child(list, item);
        let content = doc[heading].children.clone();
        for child in content {
            let copy = doc.clone_subtree(child);
            doc.append_child(item, copy);
        }
    }
    Ok(outer)
}

/// Collects every heading in document order; the usual input to [`to_toc`].
pub fn collect_headings(doc: &Document, root: NodeId) -> Vec<NodeId> {
    let mut found = Vec::new();
    collect_headings_into(doc, root, &mut found);
    found
}

fn collect_headings_into(doc: &Document, id: NodeId, found: &mut Vec<NodeId>) {
    if doc[id].name == NodeName::Heading {
        found.push(id);
    }
    for &child in &doc[id].children {
        collect_headings_into(doc, child, found);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::{encode, EncodeOptions};
    use crate::parser::decode;

    struct Identity;

    impl Visitor for Identity {}

    #[test]
    fn identity_traverse_changes_nothing() {
        let mut doc = decode("# A\n\ntext *em*\n\n- one\n- two").unwrap();
        let before = encode(&doc, &EncodeOptions::default()).unwrap();
        let root = doc.root();
        traverse(&mut doc, root, &mut Identity);
        let after = encode(&doc, &EncodeOptions::default()).unwrap();
        assert_eq!(before, after);
    }

    struct UppercaseText;

    impl Visitor for UppercaseText {
        fn enter(&mut self, doc: &mut Document, node: NodeId) -> NodeId {
            if doc[node].name == NodeName::Text {
                if let Some(text) = doc[node].text.take() {
                    doc[node].text = Some(text.to_uppercase());
                }
            }
            node
        }
    }

    #[test]
    fn enter_hook_rewrites_nodes_in_place() {
        let mut doc = decode("hello *world*").unwrap();
        let root = doc.root();
        traverse(&mut doc, root, &mut UppercaseText);
        let html = encode(&doc, &EncodeOptions::default()).unwrap();
        assert_eq!(html, "<p>HELLO <em>WORLD</em>\n");
    }

    struct ReplaceWithEmpty;

    impl Visitor for ReplaceWithEmpty {
        fn leave(&mut self, doc: &mut Document, node: NodeId) -> NodeId {
            if doc[node].name == NodeName::Blockquote {
                doc.new_node(NodeName::Empty)
            } else {
                node
            }
        }
    }

    #[test]
    fn leave_hook_replaces_the_child_slot() {
        let mut doc = decode("> gone").unwrap();
        let root = doc.root();
        traverse(&mut doc, root, &mut ReplaceWithEmpty);
        let child = doc.last_child(root).unwrap();
        assert_eq!(doc[child].name, NodeName::Empty);
        assert_eq!(doc[child].parent, Some(root));
    }

    #[test]
    fn toc_mirrors_the_level_sequence() {
        let mut doc = decode("# A\n## B\n## C\n# D").unwrap();
        let root = doc.root();
        let headings = collect_headings(&doc, root);
        assert_eq!(headings.len(), 4);
        let toc = to_toc(&mut doc, &headings, &TocOptions::default()).unwrap();
        let html = encode_subtree(&doc, toc);
        assert_eq!(
            html,
            concat!(
                "<ol>\n",
                "  <li>A\n",
                "    <ol>\n",
                "      <li>B\n",
                "      <li>C\n",
                "    </ol>\n",
                "  <li>D\n",
                "</ol>\n",
            )
        );
    }

    #[test]
    fn toc_list_style_is_selectable() {
        let mut doc = decode("# A").unwrap();
        let root = doc.root();
        let headings = collect_headings(&doc, root);
        let toc = to_toc(
            &mut doc,
            &headings,
            &TocOptions {
                list: ListStyle::Unordered,
            },
        )
        .unwrap();
        assert_eq!(doc[toc].name, NodeName::Ul);
    }

    #[test]
    fn toc_rejects_level_jumps() {
        let mut doc = Document::new();
        let shallow = doc.new_node(NodeName::Heading);
        doc[shallow].level = 1;
        let deep = doc.new_node(NodeName::Heading);
        doc[deep].level = 3;
        let error = to_toc(&mut doc, &[shallow, deep], &TocOptions::default()).unwrap_err();
        assert!(matches!(error, MarkdownError::Structure { .. }));
    }

    #[test]
    fn empty_toc_is_an_empty_list() {
        let mut doc = Document::new();
        let toc = to_toc(&mut doc, &[], &TocOptions::default()).unwrap();
        assert!(doc[toc].children.is_empty());
    }

    fn encode_subtree(doc: &Document, id: NodeId) -> String {
        // Hang the subtree under a scratch document root to reuse encode().
        let mut scratch = doc.clone();
        let root = scratch.root();
        scratch[root].children.clear();
        scratch.append_child(root, id);
        encode(&scratch, &EncodeOptions::default()).unwrap()
    }
}
