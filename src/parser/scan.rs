//! Text scanning helpers shared by the language parsers.
//!
//! Everything here is a deliberate approximation of parsing: blocks are found
//! by counting braces, not by building a syntax tree.

use regex::Regex;
use std::collections::HashSet;

/// Maximum brace nesting tracked when capturing a block.
///
/// A block that nests deeper than this is truncated at the brace that
/// exceeds the limit. This is a known precision boundary.
pub const MAX_BLOCK_DEPTH: usize = 32;

/// Maps byte offsets to 1-indexed line numbers.
#[derive(Debug, Clone)]
pub struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut starts = vec![0];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                starts.push(i + 1);
            }
        }
        Self { starts }
    }

    /// Line (1-indexed) containing the given byte offset.
    pub fn line_of(&self, offset: usize) -> usize {
        match self.starts.binary_search(&offset) {
            Ok(i) => i + 1,
            Err(i) => i,
        }
    }
}

/// Line (1-indexed) of a byte offset, without building an index.
pub fn line_at(text: &str, offset: usize) -> usize {
    let end = offset.min(text.len());
    text.as_bytes()[..end].iter().filter(|&&b| b == b'\n').count() + 1
}

/// Skip a quoted literal starting at `i` (which holds the quote byte).
/// Returns the index just past the closing quote.
pub(crate) fn skip_quoted(bytes: &[u8], i: usize) -> usize {
    let quote = bytes[i];
    let multiline = quote == b'`';
    let mut j = i + 1;
    while j < bytes.len() {
        match bytes[j] {
            b'\\' => j += 2,
            b'\n' if !multiline => return j,
            b if b == quote => return j + 1,
            _ => j += 1,
        }
    }
    bytes.len()
}

/// Skip a comment starting at `i` if there is one. Returns the index past it.
fn skip_comment(bytes: &[u8], i: usize) -> Option<usize> {
    if bytes[i] != b'/' || i + 1 >= bytes.len() {
        return None;
    }
    match bytes[i + 1] {
        b'/' => {
            let mut j = i + 2;
            while j < bytes.len() && bytes[j] != b'\n' {
                j += 1;
            }
            Some(j)
        }
        b'*' => {
            let mut j = i + 2;
            while j + 1 < bytes.len() {
                if bytes[j] == b'*' && bytes[j + 1] == b'/' {
                    return Some(j + 2);
                }
                j += 1;
            }
            Some(bytes.len())
        }
        _ => None,
    }
}

/// Overwrite `bytes[start..end]` with spaces, keeping newlines.
pub(crate) fn blank(bytes: &mut [u8], start: usize, end: usize) {
    let end = end.min(bytes.len());
    for b in &mut bytes[start.min(end)..end] {
        if *b != b'\n' {
            *b = b' ';
        }
    }
}

/// Copy of `text` with `//`, `/* */` comments and quoted literals blanked.
///
/// Byte offsets and line breaks are preserved, so positions found in the
/// masked text map straight back onto the original.
pub fn mask_literals(text: &str) -> String {
    let source = text.as_bytes();
    let mut out = source.to_vec();
    let mut i = 0;

    while i < source.len() {
        if let Some(next) = skip_comment(source, i) {
            blank(&mut out, i, next);
            i = next;
            continue;
        }
        match source[i] {
            b'"' | b'\'' | b'`' => {
                let next = skip_quoted(source, i);
                blank(&mut out, i, next);
                i = next;
            }
            _ => i += 1,
        }
    }

    // Blanked ranges start and end on ASCII bytes, so this never replaces.
    String::from_utf8_lossy(&out).into_owned()
}

/// Find the end (exclusive) of the brace block opened at `open`.
///
/// String literals and `//`, `/* */` comments are skipped. An unterminated
/// block runs to the end of the text. Nesting beyond [`MAX_BLOCK_DEPTH`]
/// truncates the block at the offending brace.
pub fn block_end(text: &str, open: usize) -> usize {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut i = open;

    while i < bytes.len() {
        if let Some(next) = skip_comment(bytes, i) {
            i = next;
            continue;
        }
        match bytes[i] {
            b'"' | b'\'' | b'`' => {
                i = skip_quoted(bytes, i);
                continue;
            }
            b'{' => {
                depth += 1;
                if depth > MAX_BLOCK_DEPTH {
                    return i;
                }
            }
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return i + 1;
                }
            }
            _ => {}
        }
        i += 1;
    }

    bytes.len()
}

/// Find the first `{` at or after `from` that is outside parentheses,
/// stopping at a `;` (a declaration without a body).
pub fn find_body_open(text: &str, from: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut parens = 0usize;
    let mut i = from;

    while i < bytes.len() {
        if let Some(next) = skip_comment(bytes, i) {
            i = next;
            continue;
        }
        match bytes[i] {
            b'"' | b'\'' | b'`' => {
                i = skip_quoted(bytes, i);
                continue;
            }
            b'(' => parens += 1,
            b')' => parens = parens.saturating_sub(1),
            b'{' if parens == 0 => return Some(i),
            b';' if parens == 0 => return None,
            _ => {}
        }
        i += 1;
    }
    None
}

/// Find the `)` matching the `(` at `open`.
pub fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut i = open;

    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' | b'`' => {
                i = skip_quoted(bytes, i);
                continue;
            }
            b'(' => depth += 1,
            b')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Width of a line's leading whitespace (tabs count as 4).
pub fn indent_width(line: &str) -> usize {
    let mut width = 0;
    for c in line.chars() {
        match c {
            ' ' => width += 1,
            '\t' => width += 4,
            _ => break,
        }
    }
    width
}

/// Byte offset of the start of the line containing `offset`.
pub fn line_start(text: &str, offset: usize) -> usize {
    text[..offset.min(text.len())]
        .rfind('\n')
        .map(|i| i + 1)
        .unwrap_or(0)
}

/// Find the end of an indentation-delimited block (Python-style).
///
/// `colon` is the offset of the `:` ending the header. If code follows the
/// colon on the same line, the block is that remainder. Otherwise the block
/// extends over every following line that is blank or indented deeper than
/// `header_indent`. Returns `(body_start, body_end)`.
pub fn indented_block(text: &str, colon: usize, header_indent: usize) -> (usize, usize) {
    let body_start = colon + 1;
    let line_end = text[body_start..]
        .find('\n')
        .map(|i| body_start + i)
        .unwrap_or(text.len());

    let rest = text[body_start..line_end].trim();
    if !rest.is_empty() && !rest.starts_with('#') {
        return (body_start, line_end);
    }

    let mut end = line_end;
    let mut pos = line_end;
    while pos < text.len() {
        let next_start = pos + 1;
        if next_start > text.len() {
            break;
        }
        let next_end = text[next_start..]
            .find('\n')
            .map(|i| next_start + i)
            .unwrap_or(text.len());
        let line = &text[next_start..next_end];
        let trimmed = line.trim();
        if !trimmed.is_empty() && indent_width(line) <= header_indent {
            break;
        }
        if !trimmed.is_empty() {
            end = next_end;
        }
        pos = next_end;
    }

    (body_start, end)
}

/// Split on `sep` at nesting depth zero, respecting brackets and quotes.
///
/// Empty segments are dropped and each segment is trimmed.
pub fn split_top_level(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut quote: Option<char> = None;
    let mut prev = '\0';

    for (i, c) in s.char_indices() {
        if let Some(q) = quote {
            if c == q && prev != '\\' {
                quote = None;
            }
            prev = c;
            continue;
        }
        match c {
            '"' | '\'' | '`' => quote = Some(c),
            '(' | '[' | '{' | '<' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            '>' if prev != '=' && prev != '-' => depth = depth.saturating_sub(1),
            c if c == sep && depth == 0 => {
                let part = s[start..i].trim();
                if !part.is_empty() {
                    parts.push(part);
                }
                start = i + c.len_utf8();
            }
            _ => {}
        }
        prev = c;
    }

    let last = s[start..].trim();
    if !last.is_empty() {
        parts.push(last);
    }
    parts
}

/// Names inside a generic parameter list, e.g. `T extends Foo, K` -> `[T, K]`.
///
/// Only the leading identifier of each entry is kept and duplicates are
/// removed, preserving order.
pub fn generic_names(list: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    split_top_level(list, ',')
        .into_iter()
        .filter_map(|entry| {
            let entry = entry.trim_start_matches("typename ").trim_start_matches("class ");
            let name: String = entry
                .trim()
                .chars()
                .take_while(|c| c.is_alphanumeric() || *c == '_')
                .collect();
            if name.is_empty() || !seen.insert(name.clone()) {
                None
            } else {
                Some(name)
            }
        })
        .collect()
}

/// A call expression found in a function body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    /// The called name (method name for qualified calls).
    pub name: String,
    /// Receiver identifier for `receiver.name(...)` calls.
    pub receiver: Option<String>,
    /// Separator between receiver and name (`.` or `::`).
    pub separator: &'static str,
    /// Byte offset of the call within the scanned body.
    pub offset: usize,
}

impl CallSite {
    /// The `receiver.name` form of a qualified call.
    pub fn qualified(&self) -> Option<String> {
        self.receiver
            .as_ref()
            .map(|r| format!("{}{}{}", r, self.separator, self.name))
    }
}

lazy_static::lazy_static! {
    static ref CALL_RE: Regex = Regex::new(
        r"(?:\b([A-Za-z_]\w*)\s*(\.|->|::|\?\.)\s*)?\b([A-Za-z_]\w*)\s*(?:<[\w\s,.:*&\[\]]*>\s*)?\("
    )
    .unwrap();
}

/// Words that introduce a declaration rather than a call.
const DECLARATION_WORDS: &[&str] = &["function", "def", "func", "fn", "class", "struct"];

/// Identifier immediately before `pos`, skipping whitespace.
fn preceding_word(text: &str, pos: usize) -> &str {
    let before = text[..pos].trim_end();
    let start = before
        .rfind(|c: char| !(c.is_alphanumeric() || c == '_'))
        .map(|i| i + 1)
        .unwrap_or(0);
    &before[start..]
}

/// Scan a function body for call expressions, in source order.
///
/// `excluded(name, qualified)` filters names such as control-flow keywords;
/// `qualified` is true when the call has a receiver. The body is scanned as
/// given, so callers mask comments and literals first.
pub fn scan_call_sites<F>(body: &str, excluded: F) -> Vec<CallSite>
where
    F: Fn(&str, bool) -> bool,
{
    let mut sites = Vec::new();

    for caps in CALL_RE.captures_iter(body) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(3)) else {
            continue;
        };
        let name = name.as_str();
        let receiver = caps.get(1).map(|m| m.as_str().to_string());
        let separator = match caps.get(2).map(|m| m.as_str()) {
            Some("::") => "::",
            _ => ".",
        };

        let before = body[..whole.start()].trim_end();
        if receiver.is_none() && DECLARATION_WORDS.contains(&preceding_word(body, whole.start())) {
            continue;
        }
        // Chained call on an expression result: report the bare name only.
        let chained = receiver.is_none() && (before.ends_with('.') || before.ends_with("->"));

        if excluded(name, receiver.is_some() || chained) {
            continue;
        }

        sites.push(CallSite {
            name: name.to_string(),
            receiver,
            separator,
            offset: caps.get(3).map(|m| m.start()).unwrap_or(whole.start()),
        });
    }

    sites
}
