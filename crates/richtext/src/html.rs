//! HTML fragment -> delta conversion.
//!
//! Tags are resolved to formats through the [`FormatTable`], restricted to an
//! [`AllowList`]; anything the table cannot read, or the allow list does not
//! permit, is dropped while its text content is kept. Tags with a registered
//! [`ClipboardMatcher`] are replaced by the matcher's output.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::clipboard::ClipboardMatcher;
use crate::delta::clean::{is_placeholder_break, retain_formats};
use crate::delta::{Attributes, Content, Delta, Op};
use crate::formats::{AllowList, BREAK};
use crate::registry::{Element, FormatTable, Scope};

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([^\s"'=/>]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+)))?"#)
        .expect("valid attribute pattern")
});

const VOID_TAGS: [&str; 13] = [
    "AREA", "BASE", "BR", "COL", "EMBED", "HR", "IMG", "INPUT", "LINK", "META", "SOURCE", "TRACK",
    "WBR",
];
const BLOCK_TAGS: [&str; 12] = [
    "P", "DIV", "H1", "H2", "H3", "H4", "H5", "H6", "BLOCKQUOTE", "PRE", "LI", "ADDRESS",
];
const SKIPPED_TAGS: [&str; 5] = ["SCRIPT", "STYLE", "HEAD", "TITLE", "TEMPLATE"];

// ── Tokenizer ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Open { element: Element, self_closing: bool },
    Close(String),
    Text(String),
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" | "#39" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let num = entity.strip_prefix('#')?;
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse::<u32>().ok()?,
            };
            char::from_u32(code)
        }
    }
}

/// Decode character references; unknown ones are kept verbatim.
pub fn decode_entities(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp + 1..];
        match tail.find(';').filter(|&end| end <= 10) {
            Some(end) => match decode_entity(&tail[..end]) {
                Some(ch) => {
                    out.push(ch);
                    rest = &tail[end + 1..];
                }
                None => {
                    out.push('&');
                    rest = tail;
                }
            },
            None => {
                out.push('&');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

fn parse_tag(inner: &str) -> Option<Token> {
    let inner = inner.trim();
    if let Some(name) = inner.strip_prefix('/') {
        let name = name.trim().split_whitespace().next()?;
        return Some(Token::Close(name.to_ascii_uppercase()));
    }
    let self_closing = inner.ends_with('/');
    let inner = inner.trim_end_matches('/');
    let name_end = inner
        .find(|c: char| c.is_ascii_whitespace())
        .unwrap_or(inner.len());
    let name = &inner[..name_end];
    if name.is_empty() || !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return None;
    }
    let mut element = Element::new(name);
    for caps in ATTRIBUTE.captures_iter(&inner[name_end..]) {
        let value = caps
            .get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map(|m| decode_entities(m.as_str()))
            .unwrap_or_default();
        element.set_attr(&caps[1], value);
    }
    Some(Token::Open {
        element,
        self_closing,
    })
}

fn tokenize(html: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut rest = html;
    while !rest.is_empty() {
        let Some(lt) = rest.find('<') else {
            tokens.push(Token::Text(decode_entities(rest)));
            break;
        };
        if lt > 0 {
            tokens.push(Token::Text(decode_entities(&rest[..lt])));
        }
        rest = &rest[lt..];
        if let Some(comment) = rest.strip_prefix("<!--") {
            rest = comment.find("-->").map_or("", |end| &comment[end + 3..]);
            continue;
        }
        let Some(gt) = rest.find('>') else {
            // Unterminated tag: treat the remainder as text.
            tokens.push(Token::Text(decode_entities(rest)));
            break;
        };
        let inner = &rest[1..gt];
        rest = &rest[gt + 1..];
        if inner.starts_with('!') || inner.starts_with('?') {
            continue;
        }
        match parse_tag(inner) {
            Some(Token::Open {
                element,
                self_closing,
            }) if SKIPPED_TAGS.contains(&element.tag.as_str()) && !self_closing => {
                let close = format!("</{}", element.tag.to_ascii_lowercase());
                let lower = rest.to_ascii_lowercase();
                rest = match lower.find(&close) {
                    Some(pos) => rest[pos..].find('>').map_or("", |gt| &rest[pos + gt + 1..]),
                    None => "",
                };
            }
            Some(token) => tokens.push(token),
            None => tokens.push(Token::Text(decode_entities(&format!("<{inner}>")))),
        }
    }
    tokens
}

// ── Converter ─────────────────────────────────────────────────────────────

#[derive(Debug)]
enum FrameKind {
    Inline(Attributes),
    Block {
        attributes: Attributes,
        had_child_block: bool,
    },
    List,
    Plain,
}

#[derive(Debug)]
struct Frame {
    tag: String,
    kind: FrameKind,
}

pub struct HtmlConverter<'a> {
    table: &'a FormatTable,
    allow: &'a AllowList,
    matchers: &'a [ClipboardMatcher],
}

struct State {
    ops: Vec<Op>,
    frames: Vec<Frame>,
    /// Indices in `ops` of placeholder breaks on the current line.
    pending_breaks: Vec<usize>,
    line_has_content: bool,
    pre_depth: usize,
}

impl<'a> HtmlConverter<'a> {
    pub fn new(
        table: &'a FormatTable,
        allow: &'a AllowList,
        matchers: &'a [ClipboardMatcher],
    ) -> Self {
        Self {
            table,
            allow,
            matchers,
        }
    }

    pub fn convert(&self, html: &str) -> Delta {
        let mut state = State {
            ops: Vec::new(),
            frames: Vec::new(),
            pending_breaks: Vec::new(),
            line_has_content: false,
            pre_depth: 0,
        };
        for token in tokenize(html) {
            match token {
                Token::Text(text) => state.text(&text),
                Token::Open {
                    element,
                    self_closing,
                } => self.open(&mut state, element, self_closing),
                Token::Close(tag) => state.close(&tag),
            }
        }
        while let Some(frame) = state.frames.pop() {
            state.close_frame(frame);
        }
        trim_trailing_newline(&mut state.ops);
        retain_formats(&Delta::from_ops(state.ops), self.allow)
    }

    fn matcher_for(&self, tag: &str) -> Option<&ClipboardMatcher> {
        self.matchers
            .iter()
            .find(|m| m.tag_name.eq_ignore_ascii_case(tag))
    }

    fn open(&self, state: &mut State, mut element: Element, self_closing: bool) {
        let is_void = self_closing || VOID_TAGS.contains(&element.tag.as_str());

        if let Some(matcher) = self.matcher_for(&element.tag) {
            for op in (matcher.matcher)().into_ops() {
                state.push_content(op);
            }
            if !is_void {
                state.frames.push(Frame {
                    tag: element.tag,
                    kind: FrameKind::Plain,
                });
            }
            return;
        }

        match element.tag.as_str() {
            "OL" | "UL" => {
                if !is_void {
                    state.frames.push(Frame {
                        tag: element.tag,
                        kind: FrameKind::List,
                    });
                }
                return;
            }
            "LI" => {
                let kind = state.list_kind();
                element.set_attr("data-list", kind);
            }
            _ => {}
        }

        let mut inline = Attributes::new();
        let mut block = Attributes::new();
        let mut embeds = Vec::new();
        for (def, value) in self.table.read_element(&element, self.allow) {
            match def.scope {
                Scope::Inline => {
                    inline.insert(def.name.clone(), value);
                }
                Scope::Block => {
                    block.insert(def.name.clone(), value);
                }
                Scope::Embed => embeds.push((def.name.clone(), value)),
            }
        }

        let attributes = state.inline_attributes();
        for (kind, value) in embeds {
            state.push_content(Op::Insert {
                insert: Content::embed(kind, value),
                attributes: Some(attributes.clone()),
            });
        }
        if is_void {
            return;
        }

        if BLOCK_TAGS.contains(&element.tag.as_str()) {
            if state.line_has_content || !state.pending_breaks.is_empty() {
                let parent = state.block_attributes();
                state.newline(parent);
            }
            if let Some(FrameKind::Block {
                had_child_block, ..
            }) = state.innermost_block_mut()
            {
                *had_child_block = true;
            }
            let mut merged = state.block_attributes();
            merged.extend(block);
            if element.is("PRE") {
                state.pre_depth += 1;
            }
            state.frames.push(Frame {
                tag: element.tag,
                kind: FrameKind::Block {
                    attributes: merged,
                    had_child_block: false,
                },
            });
        } else {
            state.frames.push(Frame {
                tag: element.tag,
                kind: FrameKind::Inline(inline),
            });
        }
    }
}

impl State {
    fn inline_attributes(&self) -> Attributes {
        let mut out = Attributes::new();
        for frame in &self.frames {
            if let FrameKind::Inline(a) = &frame.kind {
                out.extend(a.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }
        out
    }

    fn block_attributes(&self) -> Attributes {
        self.frames
            .iter()
            .rev()
            .find_map(|f| match &f.kind {
                FrameKind::Block { attributes, .. } => Some(attributes.clone()),
                _ => None,
            })
            .unwrap_or_default()
    }

    fn innermost_block_mut(&mut self) -> Option<&mut FrameKind> {
        self.frames
            .iter_mut()
            .rev()
            .map(|f| &mut f.kind)
            .find(|k| matches!(k, FrameKind::Block { .. }))
    }

    fn list_kind(&self) -> &'static str {
        let list = self
            .frames
            .iter()
            .rev()
            .find(|f| matches!(f.kind, FrameKind::List));
        match list {
            Some(f) if f.tag == "OL" => "ordered",
            _ => "bullet",
        }
    }

    /// Push inline content. A placeholder break is remembered; anything else
    /// promotes the placeholders before it on this line to real breaks.
    fn push_content(&mut self, op: Op) {
        if is_placeholder_break(&op) {
            self.pending_breaks.push(self.ops.len());
            self.ops.push(op);
            return;
        }
        for index in self.pending_breaks.drain(..) {
            self.ops[index] = Op::insert(Content::embed(BREAK, Value::Bool(true)));
        }
        self.line_has_content = true;
        self.ops.push(op);
    }

    fn newline(&mut self, block: Attributes) {
        self.ops.push(Op::Insert {
            insert: Content::Text("\n".to_string()),
            attributes: Some(block),
        });
        self.pending_breaks.clear();
        self.line_has_content = false;
    }

    fn text(&mut self, text: &str) {
        let attributes = self.inline_attributes();
        if self.pre_depth > 0 {
            let mut lines = text.split('\n').peekable();
            while let Some(line) = lines.next() {
                if !line.is_empty() {
                    self.push_content(Op::Insert {
                        insert: Content::Text(line.to_string()),
                        attributes: Some(attributes.clone()),
                    });
                }
                if lines.peek().is_some() {
                    let block = self.block_attributes();
                    self.newline(block);
                }
            }
            return;
        }
        let collapsed = collapse_whitespace(text);
        let collapsed = if self.line_has_content {
            collapsed.as_str()
        } else {
            collapsed.trim_start_matches(' ')
        };
        if collapsed.is_empty() {
            return;
        }
        self.push_content(Op::Insert {
            insert: Content::Text(collapsed.to_string()),
            attributes: Some(attributes),
        });
    }

    fn close(&mut self, tag: &str) {
        let Some(pos) = self.frames.iter().rposition(|f| f.tag == tag) else {
            return;
        };
        while self.frames.len() > pos {
            if let Some(frame) = self.frames.pop() {
                self.close_frame(frame);
            }
        }
    }

    fn close_frame(&mut self, frame: Frame) {
        if let FrameKind::Block {
            attributes,
            had_child_block,
        } = frame.kind
        {
            if frame.tag == "PRE" {
                self.pre_depth = self.pre_depth.saturating_sub(1);
            }
            if self.line_has_content || !self.pending_breaks.is_empty() || !had_child_block {
                self.newline(attributes);
            }
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for ch in text.chars() {
        if ch.is_ascii_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(ch);
            in_space = false;
        }
    }
    out
}

/// Drop one trailing unformatted newline.
fn trim_trailing_newline(ops: &mut Vec<Op>) {
    let Some(Op::Insert {
        insert: Content::Text(s),
        attributes,
    }) = ops.last_mut()
    else {
        return;
    };
    if attributes.as_ref().is_some_and(|a| !a.is_empty()) || !s.ends_with('\n') {
        return;
    }
    s.pop();
    if s.is_empty() {
        ops.pop();
    }
}
