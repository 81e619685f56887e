//! Streaming brace/semicolon tokenizer.
//!
//! Turns the flat wire text into a generic nested-array structure (a
//! tree of [`Node`]) with no knowledge of the database grammar; `decode`
//! then walks that tree as a structural interpreter, matching each
//! level against the shape it expects (clock, table name, row key,
//! version fields).

use crate::error::{CodecError, Result};

/// A tokenizer node: a bare run of non-structural characters, or a
/// brace-delimited group of further nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Atom(String),
    Group(Vec<Node>),
}

/// Parse `input` as a single top-level value. The database wire format
/// is always exactly one outer `{...}` group; anything else is a
/// malformed document.
pub fn parse(input: &str) -> Result<Node> {
    let mut nodes = Vec::new();
    parse_into(input, &mut nodes)?;
    let mut iter = nodes.into_iter();
    match (iter.next(), iter.next()) {
        (Some(node @ Node::Group(_)), None) => Ok(node),
        _ => Err(CodecError::MalformedDocument),
    }
}

/// Append the node(s) produced by `input` onto `nodes`: an optional
/// leading atom (text before the first `{`), an optional group (the
/// first balanced brace pair), and a recursive call on whatever follows
/// the group's closing brace.
fn parse_into(input: &str, nodes: &mut Vec<Node>) -> Result<()> {
    match input.find('{') {
        None => {
            if !input.is_empty() {
                nodes.push(Node::Atom(input.to_string()));
            }
            Ok(())
        }
        Some(open_idx) => {
            let prefix = &input[..open_idx];
            if !prefix.is_empty() {
                nodes.push(Node::Atom(prefix.to_string()));
            }
            let close_idx = matching_close(input, open_idx)?;
            let inner = &input[open_idx + 1..close_idx];
            nodes.push(Node::Group(parse_group_children(inner)?));
            parse_into(&input[close_idx + 1..], nodes)
        }
    }
}

/// Parse a brace group's inner content into its children. Each
/// top-level (depth-0) `;`-separated segment contributes exactly one or
/// more nodes; an empty segment still contributes a single empty
/// [`Node::Atom`] so that segment *count* survives even when the
/// segment's text is empty (needed to tell `{}` — zero fields — apart
/// from `{;}` — two empty fields).
/// A wholly empty group (`{}`) is the sole exception: it has zero
/// children, not one.
fn parse_group_children(inner: &str) -> Result<Vec<Node>> {
    if inner.is_empty() {
        return Ok(Vec::new());
    }
    let mut children = Vec::new();
    for segment in split_top_level(inner) {
        let before = children.len();
        parse_into(segment, &mut children)?;
        if children.len() == before {
            children.push(Node::Atom(String::new()));
        }
    }
    Ok(children)
}

/// Index of the `}` matching the `{` at `open_idx`.
fn matching_close(input: &str, open_idx: usize) -> Result<usize> {
    let mut depth = 0i32;
    for (i, b) in input.bytes().enumerate().skip(open_idx) {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i);
                }
            }
            _ => {}
        }
    }
    Err(CodecError::UnclosedBrace)
}

/// Split `input` at `;` characters occurring at brace depth 0.
fn split_top_level(input: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    for (i, ch) in input.char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => depth -= 1,
            ';' if depth == 0 => {
                segments.push(&input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    segments.push(&input[start..]);
    segments
}
