//! Quote- and comment-aware text scanning.
//!
//! Every rewriter locates function calls, clause keywords and statement
//! boundaries through these helpers instead of re-implementing bracket and
//! literal tracking. Scanning works on bytes: all structural characters are
//! ASCII, and UTF-8 continuation bytes never collide with them.

use std::ops::ControlFlow;

use regex::{Captures, Regex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Code,
    Single,
    Double,
    Backtick,
    LineComment,
    BlockComment,
}

/// Walk `text` from `start`, calling `f` for every byte that is SQL code
/// (not inside a string literal, quoted identifier, or comment). Opening
/// quotes are reported; the literal body and closing quote are not.
///
/// `start` must itself be outside any literal.
fn for_each_code_byte<F>(text: &str, start: usize, mut f: F)
where
    F: FnMut(usize, u8) -> ControlFlow<()>,
{
    let bytes = text.as_bytes();
    let mut state = State::Code;
    let mut i = start;
    while i < bytes.len() {
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();
        match state {
            State::Code => match b {
                // The opening quote belongs to the code around the literal.
                b'\'' | b'"' | b'`' => {
                    state = match b {
                        b'\'' => State::Single,
                        b'"' => State::Double,
                        _ => State::Backtick,
                    };
                    if f(i, b).is_break() {
                        return;
                    }
                }
                b'-' if next == Some(b'-') => {
                    state = State::LineComment;
                    i += 1;
                }
                b'/' if next == Some(b'*') => {
                    state = State::BlockComment;
                    i += 1;
                }
                _ => {
                    if f(i, b).is_break() {
                        return;
                    }
                }
            },
            State::Single | State::Double | State::Backtick => {
                let quote = match state {
                    State::Single => b'\'',
                    State::Double => b'"',
                    _ => b'`',
                };
                if b == quote {
                    if next == Some(quote) {
                        i += 1;
                    } else {
                        state = State::Code;
                    }
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Code;
                }
            }
            State::BlockComment => {
                if b == b'*' && next == Some(b'/') {
                    state = State::Code;
                    i += 1;
                }
            }
        }
        i += 1;
    }
}

/// Find the index just past the parenthesis closing the group opened right
/// before `start`.
///
/// Parentheses inside literals and comments are ignored. Returns `None` when
/// the group is never closed.
pub fn find_matching_bracket(text: &str, start: usize) -> Option<usize> {
    if start > text.len() {
        return None;
    }
    let mut depth = 1usize;
    let mut found = None;
    for_each_code_byte(text, start, |i, b| {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    found = Some(i + 1);
                    return ControlFlow::Break(());
                }
            }
            _ => {}
        }
        ControlFlow::Continue(())
    });
    found
}

/// Split a function's argument text on top-level commas.
pub fn split_function_args(args: &str) -> Vec<String> {
    split_top_level(args, b',')
}

/// Split on a single-byte separator that sits outside parentheses and literals.
pub fn split_top_level(text: &str, separator: u8) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut last = 0usize;
    for_each_code_byte(text, 0, |i, b| {
        match b {
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            _ if b == separator && depth == 0 => {
                parts.push(text[last..i].trim().to_string());
                last = i + 1;
            }
            _ => {}
        }
        ControlFlow::Continue(())
    });
    parts.push(text[last..].trim().to_string());
    parts
}

/// Per-byte view of which parts of a statement are code, and at which
/// parenthesis depth.
#[derive(Debug, Clone)]
pub struct SqlMask {
    depths: Vec<Option<u32>>,
}

impl SqlMask {
    pub fn new(text: &str) -> Self {
        let mut depths = vec![None; text.len()];
        let mut depth = 0u32;
        for_each_code_byte(text, 0, |i, b| {
            match b {
                b'(' => {
                    depths[i] = Some(depth);
                    depth += 1;
                }
                b')' => {
                    depth = depth.saturating_sub(1);
                    depths[i] = Some(depth);
                }
                _ => depths[i] = Some(depth),
            }
            ControlFlow::Continue(())
        });
        Self { depths }
    }

    pub fn is_code(&self, i: usize) -> bool {
        self.depths.get(i).is_some_and(|d| d.is_some())
    }

    pub fn depth(&self, i: usize) -> Option<u32> {
        self.depths.get(i).copied().flatten()
    }

    /// Start of the innermost parenthesized group containing `i`, or `None`
    /// when `i` sits at depth zero.
    pub fn enclosing_open(&self, text: &str, i: usize) -> Option<usize> {
        let depth = self.depth(i)?;
        if depth == 0 {
            return None;
        }
        let bytes = text.as_bytes();
        (0..i)
            .rev()
            .find(|&j| bytes[j] == b'(' && self.depth(j) == Some(depth - 1))
    }
}

pub(crate) fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'$' | b'#') || b >= 0x80
}

/// Match a possibly multi-word keyword at `i`; words may be separated by
/// any run of whitespace. Returns the end of the match.
fn keyword_at(text: &str, i: usize, keyword: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    if i > 0 && (is_ident_byte(bytes[i - 1]) || bytes[i - 1] == b'.') {
        return None;
    }
    let mut pos = i;
    for (n, word) in keyword.split_whitespace().enumerate() {
        if n > 0 {
            let ws = bytes[pos..].iter().take_while(|b| b.is_ascii_whitespace()).count();
            if ws == 0 {
                return None;
            }
            pos += ws;
        }
        let end = pos + word.len();
        if end > bytes.len() || !bytes[pos..end].eq_ignore_ascii_case(word.as_bytes()) {
            return None;
        }
        pos = end;
    }
    if pos < bytes.len() && is_ident_byte(bytes[pos]) {
        return None;
    }
    Some(pos)
}

/// Find a keyword outside literals at parenthesis depth zero, starting the
/// search at `from`. Returns the keyword's `(start, end)` span.
pub fn find_keyword(text: &str, keyword: &str, from: usize) -> Option<(usize, usize)> {
    let mask = SqlMask::new(text);
    find_keyword_with(&mask, text, keyword, from)
}

pub fn find_keyword_with(
    mask: &SqlMask,
    text: &str,
    keyword: &str,
    from: usize,
) -> Option<(usize, usize)> {
    let first = keyword.as_bytes().first()?.to_ascii_uppercase();
    let bytes = text.as_bytes();
    (from..bytes.len())
        .filter(|&i| bytes[i].to_ascii_uppercase() == first && mask.depth(i) == Some(0))
        .find_map(|i| keyword_at(text, i, keyword).map(|end| (i, end)))
}

/// Earliest top-level occurrence of any of `keywords` at or after `from`,
/// or `text.len()` when none occurs.
pub fn next_clause(mask: &SqlMask, text: &str, from: usize, keywords: &[&str]) -> usize {
    keywords
        .iter()
        .filter_map(|kw| find_keyword_with(mask, text, kw, from).map(|(s, _)| s))
        .min()
        .unwrap_or(text.len())
}

/// Whether `word` occurs as code (any depth) in `text`.
pub fn contains_word(text: &str, word: &str) -> bool {
    let mask = SqlMask::new(text);
    let first = match word.as_bytes().first() {
        Some(b) => b.to_ascii_uppercase(),
        None => return false,
    };
    let bytes = text.as_bytes();
    (0..bytes.len()).any(|i| {
        bytes[i].to_ascii_uppercase() == first && mask.is_code(i) && keyword_at(text, i, word).is_some()
    })
}

/// A located function call: `name(args)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionCall {
    /// Start of the function name.
    pub start: usize,
    /// Index just after the opening parenthesis.
    pub open: usize,
    /// Index just after the closing parenthesis.
    pub end: usize,
}

impl FunctionCall {
    pub fn args<'a>(&self, text: &'a str) -> &'a str {
        &text[self.open..self.end - 1]
    }
}

/// Find the next call of `name` (case-insensitive, outside literals) at or
/// after `from`. Calls whose parenthesis never closes are skipped.
pub fn find_function_call(text: &str, name: &str, from: usize) -> Option<FunctionCall> {
    let mask = SqlMask::new(text);
    let bytes = text.as_bytes();
    let mut i = from;
    while i < bytes.len() {
        if mask.is_code(i) {
            if let Some(name_end) = keyword_at(text, i, name) {
                let ws = bytes[name_end..]
                    .iter()
                    .take_while(|b| b.is_ascii_whitespace())
                    .count();
                let paren = name_end + ws;
                if bytes.get(paren) == Some(&b'(') {
                    if let Some(end) = find_matching_bracket(text, paren + 1) {
                        return Some(FunctionCall {
                            start: i,
                            open: paren + 1,
                            end,
                        });
                    }
                }
            }
        }
        i += 1;
    }
    None
}

/// Replace regex matches that start in code, leaving literal and comment
/// text untouched. The builder may decline a match by returning `None`.
///
/// Returns the rewritten text and the number of replacements made.
pub fn replace_in_code<F>(text: &str, re: &Regex, mut build: F) -> (String, usize)
where
    F: FnMut(&Captures<'_>) -> Option<String>,
{
    let mask = SqlMask::new(text);
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut count = 0;
    for caps in re.captures_iter(text) {
        let m = match caps.get(0) {
            Some(m) => m,
            None => continue,
        };
        if !mask.is_code(m.start()) {
            continue;
        }
        if let Some(replacement) = build(&caps) {
            out.push_str(&text[last..m.start()]);
            out.push_str(&replacement);
            last = m.end();
            count += 1;
        }
    }
    out.push_str(&text[last..]);
    (out, count)
}

/// Skip leading whitespace and comments.
pub fn strip_leading_comments(text: &str) -> &str {
    let mut rest = text.trim_start();
    loop {
        if let Some(after) = rest.strip_prefix("--") {
            rest = match after.find('\n') {
                Some(nl) => after[nl + 1..].trim_start(),
                None => "",
            };
        } else if let Some(after) = rest.strip_prefix("/*") {
            // Optimizer hints are part of the statement, not a comment to skip.
            if after.starts_with('+') {
                return rest;
            }
            rest = match after.find("*/") {
                Some(close) => after[close + 2..].trim_start(),
                None => "",
            };
        } else {
            return rest;
        }
    }
}

/// Prefix every line with `-- `.
pub fn comment_out(text: &str) -> String {
    text.lines()
        .map(|line| format!("-- {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Remove a leading `alias.` qualifier from a column reference.
pub fn unqualify(column: &str) -> &str {
    column.rsplit('.').next().unwrap_or(column).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_bracket_simple() {
        let text = "f(a, g(b), c) + 1";
        assert_eq!(find_matching_bracket(text, 2), Some(13));
    }

    #[test]
    fn test_matching_bracket_ignores_quoted_parens() {
        let text = "f('(', \")\", 'it''s )') tail";
        let end = find_matching_bracket(text, 2).unwrap();
        assert_eq!(&text[..end], "f('(', \")\", 'it''s )')");
    }

    #[test]
    fn test_matching_bracket_ignores_comments() {
        let text = "f(a /* ) */, b -- )\n) x";
        let end = find_matching_bracket(text, 2).unwrap();
        assert_eq!(&text[end..], " x");
    }

    #[test]
    fn test_matching_bracket_unbalanced() {
        assert_eq!(find_matching_bracket("f(a, (b)", 2), None);
        assert_eq!(find_matching_bracket("f(')'", 2), None);
    }

    #[test]
    fn test_split_args() {
        let args = split_function_args("a, f(b, c), 'x,y', \"q,r\"");
        assert_eq!(args, vec!["a", "f(b, c)", "'x,y'", "\"q,r\""]);
        assert!(split_function_args("  ").is_empty());
    }

    #[test]
    fn test_find_keyword_top_level() {
        let sql = "SELECT (SELECT 1 FROM dual) x FROM t WHERE a = 'FROM'";
        let (start, end) = find_keyword(sql, "FROM", 0).unwrap();
        assert_eq!(&sql[start..end], "FROM");
        assert_eq!(&sql[start..], "FROM t WHERE a = 'FROM'");
    }

    #[test]
    fn test_find_multi_word_keyword() {
        let sql = "SELECT * FROM t START  WITH a IS NULL CONNECT\n BY PRIOR id = pid";
        let (start, end) = find_keyword(sql, "CONNECT BY", 0).unwrap();
        assert_eq!(&sql[start..end], "CONNECT\n BY");
        assert!(find_keyword(sql, "CONNECTBY", 0).is_none());
    }

    #[test]
    fn test_keyword_requires_word_boundary() {
        assert!(find_keyword("SELECT fromage FROM t", "FROM", 0).is_some_and(|(s, _)| s == 15));
        assert!(!contains_word("SELECT my_level FROM t", "LEVEL"));
        assert!(contains_word("SELECT level FROM t", "LEVEL"));
    }

    #[test]
    fn test_find_function_call() {
        let sql = "SELECT 'nvl(x)', NVL (a, b) FROM t";
        let call = find_function_call(sql, "NVL", 0).unwrap();
        assert_eq!(call.args(sql), "a, b");
        assert_eq!(&sql[call.start..call.end], "NVL (a, b)");
        assert!(find_function_call(sql, "NVL2", 0).is_none());
    }

    #[test]
    fn test_replace_in_code_skips_literals() {
        let re = Regex::new(r"(?i)\bSYSDATE\b").unwrap();
        let (out, n) = replace_in_code("SELECT SYSDATE, 'SYSDATE' FROM dual", &re, |_| {
            Some("NOW()".to_string())
        });
        assert_eq!(out, "SELECT NOW(), 'SYSDATE' FROM dual");
        assert_eq!(n, 1);
    }

    #[test]
    fn test_enclosing_open() {
        let sql = "SELECT * FROM (SELECT a FROM t WHERE x = 1) q";
        let mask = SqlMask::new(sql);
        let pos = sql.find("x = 1").unwrap();
        assert_eq!(mask.enclosing_open(sql, pos), Some(14));
        assert_eq!(mask.enclosing_open(sql, 0), None);
    }

    #[test]
    fn test_strip_leading_comments() {
        assert_eq!(strip_leading_comments("-- c\n/* d */ SELECT 1"), "SELECT 1");
        assert_eq!(strip_leading_comments("/*+ hint */ x"), "/*+ hint */ x");
    }
}
