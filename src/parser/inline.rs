//! Character-by-character inline parser.
//!
//! Converts one line of text into inline nodes. Productions are recognized
//! left to right; text outside any production accumulates in a pending
//! buffer and is flushed as a single `text` node when a production fires or
//! at end of line. Spacing around every delimiter production is policed: two
//! spaces before the trigger, a space right after the opening marker, or two
//! spaces right after the production are all fatal.

use crate::ast::{unescape_markup, Document, NodeId, NodeName};
use crate::error::{MarkdownError, Result};

/// Parses inline content of `line` starting at char index `from`.
///
/// Returns the produced nodes, still unattached, together with the index
/// where scanning stopped.
pub(crate) fn parse_inline(
    doc: &mut Document,
    line: &str,
    from: usize,
) -> Result<(Vec<NodeId>, usize)> {
    let chars: Vec<(usize, char)> = line.char_indices().collect();
    let mut out = Vec::new();
    let mut pending = String::new();
    let mut idx = from;

    while idx < chars.len() {
        let (byte_idx, ch) = chars[idx];
        match ch {
            '\\' if idx + 1 < chars.len() => {
                // The escape stays in the pending text; add_text strips it.
                pending.push(ch);
                pending.push(chars[idx + 1].1);
                idx += 2;
            }
            '*' => {
                flush_text(doc, &mut pending, &mut out);
                let strong = peek(&chars, idx + 1) == Some('*');
                let (node, end) = parse_emphasis(doc, line, &chars, idx, strong)?;
                out.push(node);
                idx = end;
            }
            '`' => {
                flush_text(doc, &mut pending, &mut out);
                let (node, end) = parse_code(doc, line, &chars, idx)?;
                out.push(node);
                idx = end;
            }
            '[' => match scan_bracket(&chars, idx) {
                Some((close, true)) => {
                    flush_text(doc, &mut pending, &mut out);
                    let (node, end) = parse_link(doc, line, &chars, idx, close)?;
                    out.push(node);
                    idx = end;
                }
                Some((close, false)) => {
                    // Bracket pair without a destination stays literal.
                    pending.push_str(slice(line, &chars, idx, close + 1));
                    idx = close + 1;
                }
                None => {
                    pending.push(ch);
                    idx += 1;
                }
            },
            '!' if peek(&chars, idx + 1) == Some('[') => {
                match parse_image(doc, line, &chars, idx)? {
                    Some((node, end)) => {
                        flush_text(doc, &mut pending, &mut out);
                        out.push(node);
                        idx = end;
                    }
                    None => {
                        pending.push(ch);
                        idx += 1;
                    }
                }
            }
            '<' => match parse_angle_link(doc, line, &chars, idx)? {
                Some((node, end)) => {
                    flush_text(doc, &mut pending, &mut out);
                    out.push(node);
                    idx = end;
                }
                None => {
                    // No closing angle: the rest of the line is literal.
                    pending.push_str(&line[byte_idx..]);
                    idx = chars.len();
                }
            },
            'h' if line[byte_idx..].starts_with("http://")
                || line[byte_idx..].starts_with("https://") =>
            {
                match parse_autolink(doc, line, &chars, idx)? {
                    Some((node, end)) => {
                        flush_text(doc, &mut pending, &mut out);
                        out.push(node);
                        idx = end;
                    }
                    None => {
                        pending.push(ch);
                        idx += 1;
                    }
                }
            }
            '>' if peek(&chars, idx + 1) == Some(' ')
                && (idx == from || peek(&chars, idx - 1) == Some(' ')) =>
            {
                guard_before(line, &chars, idx)?;
                flush_text(doc, &mut pending, &mut out);
                let quote = doc.new_node(NodeName::Blockquote);
                let paragraph = doc.new_node(NodeName::P);
                doc.append_child(quote, paragraph);
                let (children, end) = parse_inline(doc, line, idx + 2)?;
                doc.append_children(paragraph, &children);
                out.push(quote);
                idx = end;
            }
            _ => {
                pending.push(ch);
                idx += 1;
            }
        }
    }

    flush_text(doc, &mut pending, &mut out);
    Ok((out, idx))
}

/// Flushes the pending text as a single node, coalescing with a trailing
/// text node from an earlier flush.
fn flush_text(doc: &mut Document, pending: &mut String, out: &mut Vec<NodeId>) {
    if pending.is_empty() {
        return;
    }
    let unescaped = unescape_markup(&std::mem::take(pending));
    if let Some(&last) = out.last() {
        if doc[last].name == NodeName::Text {
            doc[last]
                .text
                .get_or_insert_with(String::new)
                .push_str(&unescaped);
            return;
        }
    }
    let text = doc.new_text(unescaped);
    out.push(text);
}

fn parse_emphasis(
    doc: &mut Document,
    line: &str,
    chars: &[(usize, char)],
    idx: usize,
    strong: bool,
) -> Result<(NodeId, usize)> {
    let marker = if strong { 2 } else { 1 };
    guard_open(line, chars, idx, marker)?;
    let start = idx + marker;
    let close = find_emphasis_close(chars, start, strong).ok_or_else(|| {
        let kind = if strong { "strong" } else { "emphasis" };
        MarkdownError::structure(format!("unmatched {} delimiter", kind), line)
    })?;
    if close == start {
        return Err(MarkdownError::structure("empty emphasis", line));
    }
    let children = parse_spans(doc, line, chars, start, close)?;
    let name = if strong {
        NodeName::Strong
    } else {
        NodeName::Em
    };
    let node = doc.new_node(name);
    doc.append_children(node, &children);
    let end = close + marker;
    guard_after(line, chars, end)?;
    Ok((node, end))
}

/// Finds the closing `*` run for an emphasis opened at `idx`, skipping
/// escapes and complete code spans.
fn find_emphasis_close(chars: &[(usize, char)], mut idx: usize, strong: bool) -> Option<usize> {
    while idx < chars.len() {
        match chars[idx].1 {
            '\\' => idx += 2,
            '`' => match find_char(chars, idx + 1, '`') {
                Some(close) => idx = close + 1,
                None => idx += 1,
            },
            '*' => {
                if !strong || peek(chars, idx + 1) == Some('*') {
                    return Some(idx);
                }
                idx += 1;
            }
            _ => idx += 1,
        }
    }
    None
}

/// Parses the interior of an emphasis or link text: code spans may nest,
/// emphasis may not, everything else is literal.
fn parse_spans(
    doc: &mut Document,
    line: &str,
    chars: &[(usize, char)],
    start: usize,
    end: usize,
) -> Result<Vec<NodeId>> {
    let mut out = Vec::new();
    let mut pending = String::new();
    let mut idx = start;
    while idx < end {
        let ch = chars[idx].1;
        match ch {
            '\\' if idx + 1 < end => {
                pending.push(ch);
                pending.push(chars[idx + 1].1);
                idx += 2;
            }
            '`' => {
                flush_text(doc, &mut pending, &mut out);
                let (node, span_end) = parse_code(doc, line, chars, idx)?;
                if span_end > end {
                    return Err(MarkdownError::structure("unmatched code delimiter", line));
                }
                out.push(node);
                idx = span_end;
            }
            _ => {
                pending.push(ch);
                idx += 1;
            }
        }
    }
    flush_text(doc, &mut pending, &mut out);
    Ok(out)
}

fn parse_code(
    doc: &mut Document,
    line: &str,
    chars: &[(usize, char)],
    idx: usize,
) -> Result<(NodeId, usize)> {
    guard_open(line, chars, idx, 1)?;
    let close = find_char(chars, idx + 1, '`')
        .ok_or_else(|| MarkdownError::structure("unmatched code delimiter", line))?;
    let content = slice(line, chars, idx + 1, close);
    let node = doc.new_node(NodeName::Code);
    doc[node].attrs.set("translate", Some("no"));
    if !content.is_empty() {
        // Code content is literal: escapes are not stripped.
        let text = doc.new_text(content);
        doc.append_child(node, text);
    }
    let end = close + 1;
    guard_after(line, chars, end)?;
    Ok((node, end))
}

fn parse_link(
    doc: &mut Document,
    line: &str,
    chars: &[(usize, char)],
    idx: usize,
    close: usize,
) -> Result<(NodeId, usize)> {
    guard_open(line, chars, idx, 1)?;
    let children = parse_spans(doc, line, chars, idx + 1, close)?;
    let dest_start = close + 2;
    let dest_end = scan_url(chars, dest_start)
        .ok_or_else(|| MarkdownError::structure("unterminated link destination", line))?;
    let href = slice(line, chars, dest_start, dest_end);
    let node = doc.new_node(NodeName::A);
    doc[node].attrs.set("href", Some(href));
    doc.append_children(node, &children);
    let end = dest_end + 1;
    guard_after(line, chars, end)?;
    Ok((node, end))
}

fn parse_angle_link(
    doc: &mut Document,
    line: &str,
    chars: &[(usize, char)],
    idx: usize,
) -> Result<Option<(NodeId, usize)>> {
    let close = match find_char(chars, idx + 1, '>') {
        Some(close) => close,
        None => return Ok(None),
    };
    guard_open(line, chars, idx, 1)?;
    let url = slice(line, chars, idx + 1, close).to_string();
    let node = doc.new_node(NodeName::A);
    doc[node].attrs.set("href", Some(&url));
    let text = doc.new_text(url);
    doc.append_child(node, text);
    let end = close + 1;
    guard_after(line, chars, end)?;
    Ok(Some((node, end)))
}

fn parse_autolink(
    doc: &mut Document,
    line: &str,
    chars: &[(usize, char)],
    idx: usize,
) -> Result<Option<(NodeId, usize)>> {
    let scheme = if line[chars[idx].0..].starts_with("https://") {
        8
    } else {
        7
    };
    // A scheme with nothing after it, or a space right after it, stays text.
    match peek(chars, idx + scheme) {
        None | Some(' ') => return Ok(None),
        Some(_) => {}
    }
    guard_before(line, chars, idx)?;
    let mut end = idx + scheme;
    while end < chars.len() && !matches!(chars[end].1, ' ' | ')') {
        end += 1;
    }
    let url = slice(line, chars, idx, end).to_string();
    let node = doc.new_node(NodeName::A);
    doc[node].attrs.set("href", Some(&url));
    let text = doc.new_text(url);
    doc.append_child(node, text);
    guard_after(line, chars, end)?;
    Ok(Some((node, end)))
}

fn parse_image(
    doc: &mut Document,
    line: &str,
    chars: &[(usize, char)],
    idx: usize,
) -> Result<Option<(NodeId, usize)>> {
    let (close, has_dest) = match scan_bracket(chars, idx + 1) {
        Some(found) => found,
        None => return Ok(None),
    };
    if !has_dest {
        return Ok(None);
    }
    guard_open(line, chars, idx, 2)?;
    let alt = unescape_markup(slice(line, chars, idx + 2, close));
    let src_start = close + 2;
    let mut src_end = src_start;
    while src_end < chars.len() && !matches!(chars[src_end].1, ' ' | ')') {
        src_end += if chars[src_end].1 == '\\' { 2 } else { 1 };
    }
    if src_end >= chars.len() {
        return Err(MarkdownError::structure("unterminated image", line));
    }
    let src = unescape_markup(slice(line, chars, src_start, src_end));

    let mut title = None;
    let end = match chars[src_end].1 {
        ')' => src_end + 1,
        _ => {
            // A space introduces the quoted title.
            let quote_idx = src_end + 1;
            let delimiter = peek(chars, quote_idx)
                .ok_or_else(|| MarkdownError::structure("unterminated image", line))?;
            if delimiter != '\'' && delimiter != '"' {
                return Err(MarkdownError::structure("invalid image title delimiter", line));
            }
            let title_close = find_char(chars, quote_idx + 1, delimiter)
                .ok_or_else(|| MarkdownError::structure("unterminated image title", line))?;
            title = Some(slice(line, chars, quote_idx + 1, title_close).to_string());
            if peek(chars, title_close + 1) != Some(')') {
                return Err(MarkdownError::structure("unterminated image", line));
            }
            title_close + 2
        }
    };

    let node = doc.new_node(NodeName::Img);
    doc[node].attrs.set("loading", Some("lazy"));
    doc[node].attrs.set("decoding", Some("async"));
    doc[node].attrs.set("src", Some(&src));
    doc[node].attrs.set("alt", Some(&alt));
    if let Some(title) = &title {
        doc[node].attrs.set("title", Some(title));
    }
    guard_after(line, chars, end)?;
    Ok(Some((node, end)))
}

/// Finds the bracket matching an opening `[` at `open`, skipping escapes and
/// code spans. One nested balanced pair is allowed; a second level of
/// nesting stops the scan. Returns the closing index and whether a `(`
/// follows it.
fn scan_bracket(chars: &[(usize, char)], open: usize) -> Option<(usize, bool)> {
    let mut depth = 1usize;
    let mut idx = open + 1;
    while idx < chars.len() {
        match chars[idx].1 {
            '\\' => idx += 2,
            '`' => match find_char(chars, idx + 1, '`') {
                Some(close) => idx = close + 1,
                None => idx += 1,
            },
            '[' => {
                if depth == 2 {
                    return None;
                }
                depth += 1;
                idx += 1;
            }
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some((idx, peek(chars, idx + 1) == Some('(')));
                }
                idx += 1;
            }
            _ => idx += 1,
        }
    }
    None
}

/// Scans a link destination up to the closing `)`, keeping escapes intact.
fn scan_url(chars: &[(usize, char)], mut idx: usize) -> Option<usize> {
    while idx < chars.len() {
        match chars[idx].1 {
            '\\' => idx += 2,
            ')' => return Some(idx),
            _ => idx += 1,
        }
    }
    None
}

fn guard_before(line: &str, chars: &[(usize, char)], idx: usize) -> Result<()> {
    if idx >= 2 && chars[idx - 1].1 == ' ' && chars[idx - 2].1 == ' ' {
        return Err(MarkdownError::whitespace(line));
    }
    Ok(())
}

fn guard_open(line: &str, chars: &[(usize, char)], idx: usize, marker: usize) -> Result<()> {
    guard_before(line, chars, idx)?;
    if peek(chars, idx + marker) == Some(' ') {
        return Err(MarkdownError::whitespace(line));
    }
    Ok(())
}

fn guard_after(line: &str, chars: &[(usize, char)], end: usize) -> Result<()> {
    if peek(chars, end) == Some(' ') && peek(chars, end + 1) == Some(' ') {
        return Err(MarkdownError::whitespace(line));
    }
    Ok(())
}

fn peek(chars: &[(usize, char)], idx: usize) -> Option<char> {
    chars.get(idx).map(|&(_, ch)| ch)
}

fn find_char(chars: &[(usize, char)], mut idx: usize, target: char) -> Option<usize> {
    while idx < chars.len() {
        if chars[idx].1 == target {
            return Some(idx);
        }
        idx += 1;
    }
    None
}

fn byte_at(line: &str, chars: &[(usize, char)], idx: usize) -> usize {
    chars.get(idx).map(|&(byte, _)| byte).unwrap_or(line.len())
}

fn slice<'a>(line: &'a str, chars: &[(usize, char)], start: usize, end: usize) -> &'a str {
    &line[byte_at(line, chars, start)..byte_at(line, chars, end)]
}
