use std::borrow::Cow;

use tracing::debug;
use winnow::prelude::*;
use winnow::ascii::{Caseless, multispace0, space0, space1};
use winnow::combinator::{alt, eof, opt, preceded, repeat};
use winnow::error::ParserError;
use winnow::stream::Stream;
use winnow::token::{literal, rest, take_till};

use crate::edge_type::classify;
use crate::graph::{Graph, NodeHandle};

/// Shape of a single trimmed input line.
#[derive(Debug, Clone, PartialEq)]
pub enum Line<'s> {
    /// Blank, a lone brace, or a `//`/`#` comment.
    Skip,
    /// `digraph`/`graph` header, optionally `strict`.
    Header,
    /// `id [ ... ]` closed on the same line.
    Node { id: Cow<'s, str>, attrs: &'s str },
    /// `a -> b [-> c ...] [ ... ]`; one edge per consecutive pair.
    Edges { ids: Vec<Cow<'s, str>>, attrs: Option<&'s str> },
    /// `id [` with the attribute list continuing on later lines.
    BlockOpen { id: Cow<'s, str>, attrs: &'s str },
    /// A bare identifier with no attributes.
    Bare { id: Cow<'s, str> },
    /// Anything else: subgraphs, rank or global attribute statements.
    Ignored,
}

pub fn classify_line(raw: &str) -> Line<'_> {
    let line = raw.trim();
    if line.is_empty()
        || line == "{"
        || line == "}"
        || line.starts_with("//")
        || line.starts_with('#')
    {
        return Line::Skip;
    }
    let mut input = line;
    statement(&mut input).unwrap_or(Line::Ignored)
}

fn statement<'s>(input: &mut &'s str) -> winnow::Result<Line<'s>> {
    alt((header, node_decl, edge_chain, block_open, bare_node)).parse_next(input)
}

fn header<'s>(input: &mut &'s str) -> winnow::Result<Line<'s>> {
    opt((literal(Caseless("strict")), space1)).parse_next(input)?;
    alt((literal(Caseless("digraph")), literal(Caseless("graph")))).parse_next(input)?;
    alt((space1.void(), "{".void(), eof.void())).parse_next(input)?;
    rest.parse_next(input)?;
    Ok(Line::Header)
}

fn node_decl<'s>(input: &mut &'s str) -> winnow::Result<Line<'s>> {
    let id = statement_id.parse_next(input)?;
    space0.parse_next(input)?;
    "[".parse_next(input)?;
    let Some(end) = closing_bracket(input) else {
        return Err(ParserError::from_input(input));
    };
    let attrs = input.next_slice(end);
    // `]`, then a trailing `;` or comment.
    rest.parse_next(input)?;
    Ok(Line::Node { id, attrs })
}

fn edge_chain<'s>(input: &mut &'s str) -> winnow::Result<Line<'s>> {
    let first = statement_id.parse_next(input)?;
    let targets: Vec<Cow<'s, str>> =
        repeat(1.., preceded((space0, "->", space0), statement_id)).parse_next(input)?;
    space0.parse_next(input)?;
    let attrs = opt(edge_attrs).parse_next(input)?;
    // Trailing `;` or anything else after the attribute list is tolerated.
    rest.parse_next(input)?;

    let mut ids = Vec::with_capacity(targets.len() + 1);
    ids.push(first);
    ids.extend(targets);
    Ok(Line::Edges { ids, attrs })
}

fn edge_attrs<'s>(input: &mut &'s str) -> winnow::Result<&'s str> {
    "[".parse_next(input)?;
    let body = match closing_bracket(input) {
        Some(end) => input.next_slice(end),
        None => rest.parse_next(input)?,
    };
    opt("]").parse_next(input)?;
    Ok(body)
}

fn block_open<'s>(input: &mut &'s str) -> winnow::Result<Line<'s>> {
    let id = statement_id.parse_next(input)?;
    space0.parse_next(input)?;
    "[".parse_next(input)?;
    let attrs = rest.parse_next(input)?;
    if closing_bracket(attrs).is_some() {
        return Err(ParserError::from_input(input));
    }
    Ok(Line::BlockOpen { id, attrs })
}

/// Byte offset of the first `]` outside a quoted string.
fn closing_bracket(s: &str) -> Option<usize> {
    let mut quoted = false;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            ']' if !quoted => return Some(i),
            _ => {}
        }
    }
    None
}

fn bare_node<'s>(input: &mut &'s str) -> winnow::Result<Line<'s>> {
    let id = statement_id.parse_next(input)?;
    (space0, opt(";"), space0, eof).parse_next(input)?;
    Ok(Line::Bare { id })
}

const KEYWORDS: [&str; 6] = ["node", "edge", "graph", "digraph", "subgraph", "strict"];

/// An identifier that may start a statement; unquoted DOT keywords are
/// rejected so `node [shape=box]` is not read as a node named `node`.
fn statement_id<'s>(input: &mut &'s str) -> winnow::Result<Cow<'s, str>> {
    alt((
        quoted_id,
        bare_id
            .verify(|id: &str| !KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(id)))
            .map(Cow::Borrowed),
    ))
    .parse_next(input)
}

/// `"..."` with `\"` escapes. The surrounding quotes are stripped.
fn quoted_id<'s>(input: &mut &'s str) -> winnow::Result<Cow<'s, str>> {
    "\"".parse_next(input)?;
    let mut end = None;
    let mut escaped = false;
    for (i, c) in input.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => {
                end = Some(i);
                break;
            }
            _ => {}
        }
    }
    let Some(end) = end.filter(|&e| e > 0) else {
        return Err(ParserError::from_input(input));
    };
    let body = input.next_slice(end);
    "\"".parse_next(input)?;
    if body.contains("\\\"") {
        Ok(Cow::Owned(body.replace("\\\"", "\"")))
    } else {
        Ok(Cow::Borrowed(body))
    }
}

/// Letters, digits and `._/-`, stopping before an `->` arrow.
fn bare_id<'s>(input: &mut &'s str) -> winnow::Result<&'s str> {
    let mut end = 0;
    let mut chars = input.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        let allowed = c.is_alphanumeric() || matches!(c, '.' | '_' | '/' | '-');
        if !allowed || (c == '-' && matches!(chars.peek(), Some((_, '>')))) {
            break;
        }
        end = i + c.len_utf8();
    }
    if end == 0 {
        return Err(ParserError::from_input(input));
    }
    Ok(input.next_slice(end))
}

/// Finds `label="..."` in an attribute list. `label` must start a word, so
/// `xlabel` and `headlabel` are skipped.
pub fn extract_label(attrs: &str) -> Option<&str> {
    attrs.match_indices("label").find_map(|(at, word)| {
        let starts_word = attrs[..at]
            .chars()
            .next_back()
            .is_none_or(|c| !(c.is_alphanumeric() || c == '_'));
        if !starts_word {
            return None;
        }
        let mut input = &attrs[at + word.len()..];
        label_value(&mut input).ok()
    })
}

fn label_value<'s>(input: &mut &'s str) -> winnow::Result<&'s str> {
    (multispace0, "=", multispace0, "\"").parse_next(input)?;
    let value = take_till(0.., '"').parse_next(input)?;
    "\"".parse_next(input)?;
    Ok(value)
}

#[derive(Debug)]
struct PendingBlock {
    node: NodeHandle,
    attrs: String,
}

/// Accumulates a [`Graph`] one raw line at a time.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    graph: Graph,
    block: Option<PendingBlock>,
    lines: usize,
    self_loops: usize,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line_count(&self) -> usize {
        self.lines
    }

    pub fn push_line(&mut self, raw: &str) {
        self.lines += 1;

        if let Some(block) = self.block.as_mut() {
            block.attrs.push('\n');
            block.attrs.push_str(raw);
            if closes_block(raw) {
                self.close_block();
            }
            return;
        }

        match classify_line(raw) {
            Line::Skip | Line::Header | Line::Ignored => {}
            Line::Node { id, attrs } => {
                let node = self.graph.ensure(&id);
                if let Some(label) = extract_label(attrs) {
                    self.graph.set_label_if_absent(node, label);
                }
            }
            Line::Edges { ids, attrs } => {
                let edge_type = classify(attrs.and_then(extract_label));
                for pair in ids.windows(2) {
                    let from = self.graph.ensure(&pair[0]);
                    let to = self.graph.ensure(&pair[1]);
                    if !self.graph.add_edge(from, to, edge_type) {
                        self.self_loops += 1;
                    }
                }
            }
            Line::BlockOpen { id, attrs } => {
                let node = self.graph.ensure(&id);
                self.block = Some(PendingBlock {
                    node,
                    attrs: attrs.to_string(),
                });
            }
            Line::Bare { id } => {
                self.graph.ensure(&id);
            }
        }
    }

    fn close_block(&mut self) {
        if let Some(block) = self.block.take() {
            if let Some(label) = extract_label(&block.attrs) {
                self.graph.set_label_if_absent(block.node, label);
            }
        }
    }

    /// Completes the parse. An attribute block left open at end of input is
    /// still scanned for a label.
    pub fn finish(mut self) -> Graph {
        self.close_block();
        debug!(
            lines = self.lines,
            nodes = self.graph.len(),
            edges = self.graph.edge_count(),
            self_loops = self.self_loops,
            "graph built"
        );
        self.graph
    }
}

fn closes_block(raw: &str) -> bool {
    let line = raw.trim_end();
    line.strip_suffix(';').unwrap_or(line).trim_end().ends_with(']')
}

/// Splits a byte stream into lines, holding a partial line until the next
/// chunk supplies its newline. A trailing `\r` is dropped.
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &[u8], mut on_line: impl FnMut(&str)) {
        let mut start = 0;
        for (i, &b) in chunk.iter().enumerate() {
            if b != b'\n' {
                continue;
            }
            if self.pending.is_empty() {
                emit(&chunk[start..i], &mut on_line);
            } else {
                self.pending.extend_from_slice(&chunk[start..i]);
                let line = std::mem::take(&mut self.pending);
                emit(&line, &mut on_line);
            }
            start = i + 1;
        }
        self.pending.extend_from_slice(&chunk[start..]);
    }

    /// Emits whatever follows the last newline, if anything.
    pub fn finish(self, mut on_line: impl FnMut(&str)) {
        if !self.pending.is_empty() {
            emit(&self.pending, &mut on_line);
        }
    }
}

fn emit(bytes: &[u8], on_line: &mut impl FnMut(&str)) {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    on_line(&String::from_utf8_lossy(bytes));
}

/// Parses complete DOT text in one go.
pub fn parse_dot(text: &str) -> Graph {
    let mut builder = GraphBuilder::new();
    for line in text.lines() {
        builder.push_line(line);
    }
    builder.finish()
}
