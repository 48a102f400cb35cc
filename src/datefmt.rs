//! Date-format mini-language translation.
//!
//! Oracle and PostgreSQL share a picture-string language (`YYYY-MM-DD`),
//! MySQL uses `%`-escapes (`%Y-%m-%d`). Translation is two-phase: every
//! recognized source token is first replaced by an opaque sentinel, longest
//! tokens first, and only then are sentinels expanded to target tokens. A
//! target token is therefore never re-read as source text.

use crate::dialect::Dialect;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormatStyle {
    Oracle,
    Postgres,
    MySql,
}

impl FormatStyle {
    fn of(dialect: Dialect) -> Self {
        match dialect.family() {
            Dialect::MySql => FormatStyle::MySql,
            Dialect::PostgreSql => FormatStyle::Postgres,
            _ => FormatStyle::Oracle,
        }
    }

    fn is_picture(&self) -> bool {
        !matches!(self, FormatStyle::MySql)
    }
}

/// One element across the three languages; an empty string means the
/// language has no equivalent.
struct FormatToken {
    oracle: &'static str,
    postgres: &'static str,
    mysql: &'static str,
    /// Only recognized when reading a MySQL format.
    mysql_alias: bool,
}

impl FormatToken {
    fn get(&self, style: FormatStyle) -> &'static str {
        match style {
            FormatStyle::Oracle => self.oracle,
            FormatStyle::Postgres => self.postgres,
            FormatStyle::MySql => self.mysql,
        }
    }
}

const fn tok(oracle: &'static str, postgres: &'static str, mysql: &'static str) -> FormatToken {
    FormatToken {
        oracle,
        postgres,
        mysql,
        mysql_alias: false,
    }
}

const fn alias(oracle: &'static str, postgres: &'static str, mysql: &'static str) -> FormatToken {
    FormatToken {
        oracle,
        postgres,
        mysql,
        mysql_alias: true,
    }
}

// Earlier rows win when a token is spelled the same in several rows.
const FORMAT_TOKENS: &[FormatToken] = &[
    tok("YYYY", "YYYY", "%Y"),
    tok("RRRR", "YYYY", "%Y"),
    tok("IYYY", "IYYY", "%x"),
    tok("YY", "YY", "%y"),
    tok("MONTH", "MONTH", "%M"),
    tok("MON", "MON", "%b"),
    tok("MM", "MM", "%m"),
    tok("DDD", "DDD", "%j"),
    tok("DD", "DD", "%d"),
    tok("DAY", "DAY", "%W"),
    tok("DY", "DY", "%a"),
    tok("HH24", "HH24", "%H"),
    tok("HH12", "HH12", "%h"),
    tok("HH", "HH", "%h"),
    tok("MI", "MI", "%i"),
    tok("SS", "SS", "%s"),
    tok("FF6", "US", "%f"),
    tok("FF3", "MS", "%f"),
    tok("FF", "US", "%f"),
    tok("AM", "AM", "%p"),
    tok("PM", "PM", "%p"),
    tok("IW", "IW", "%v"),
    tok("Q", "Q", ""),
    tok("FM", "FM", ""),
    alias("MM", "MM", "%c"),
    alias("DD", "DD", "%e"),
    alias("HH24", "HH24", "%k"),
    alias("HH12", "HH12", "%I"),
    alias("HH12", "HH12", "%l"),
    alias("SS", "SS", "%S"),
    alias("HH24:MI:SS", "HH24:MI:SS", "%T"),
    alias("HH12:MI:SS AM", "HH12:MI:SS AM", "%r"),
];

/// Fill-mode style modifiers that simply vanish when the target has no
/// counterpart. Any other unmapped token is kept as written.
const MODIFIERS: &[&str] = &["FM"];

const SENTINEL_OPEN: char = '\u{E000}';
const SENTINEL_CLOSE: char = '\u{E001}';

/// Source tokens for a style, longest first. The first row spelling a
/// token owns it.
fn source_tokens(style: FormatStyle) -> Vec<(&'static str, usize)> {
    let mut tokens: Vec<(&'static str, usize)> = Vec::new();
    for (idx, row) in FORMAT_TOKENS.iter().enumerate() {
        if row.mysql_alias && style != FormatStyle::MySql {
            continue;
        }
        let spelling = row.get(style);
        if !spelling.is_empty() && !tokens.iter().any(|(t, _)| *t == spelling) {
            tokens.push((spelling, idx));
        }
    }
    tokens.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    tokens
}

fn matches_token(rest: &str, token: &str, style: FormatStyle) -> bool {
    match rest.get(..token.len()) {
        Some(head) if style.is_picture() => head.eq_ignore_ascii_case(token),
        Some(head) => head == token,
        None => false,
    }
}

/// Translate a date-format string between dialect format languages.
///
/// Unknown text is kept. Literal text is re-quoted as the target expects:
/// `"T"` in a picture string becomes bare `T` for MySQL, and bare letters in
/// a MySQL format become quoted literals in a picture string.
pub fn convert_date_format(format: &str, source: Dialect, target: Dialect) -> String {
    let from = FormatStyle::of(source);
    let to = FormatStyle::of(target);
    if from == to {
        return format.to_string();
    }

    let tokens = source_tokens(from);
    let mut staged = String::with_capacity(format.len() + 8);
    let mut matched: Vec<(usize, &str)> = Vec::new();
    let mut i = 0;

    // Phase 1: tokens become sentinels, literal text is re-quoted.
    while i < format.len() {
        let rest = &format[i..];

        if from.is_picture() && rest.starts_with('"') {
            let close = rest[1..].find('"').map(|p| p + 1);
            let body = &rest[1..close.unwrap_or(rest.len())];
            if to.is_picture() {
                staged.push('"');
                staged.push_str(body);
                staged.push('"');
            } else {
                staged.push_str(&body.replace('%', "%%"));
            }
            i += close.map(|c| c + 1).unwrap_or(rest.len());
            continue;
        }

        if from == FormatStyle::MySql && rest.starts_with("%%") {
            staged.push('%');
            i += 2;
            continue;
        }

        if let Some(&(token, row)) = tokens.iter().find(|(t, _)| matches_token(rest, t, from)) {
            staged.push(SENTINEL_OPEN);
            staged.push_str(&matched.len().to_string());
            staged.push(SENTINEL_CLOSE);
            matched.push((row, &rest[..token.len()]));
            i += token.len();
            continue;
        }

        let Some(c) = rest.chars().next() else {
            break;
        };
        if from == FormatStyle::MySql && c.is_ascii_alphabetic() {
            let run_len = rest.bytes().take_while(|b| b.is_ascii_alphabetic()).count();
            staged.push('"');
            staged.push_str(&rest[..run_len]);
            staged.push('"');
            i += run_len;
            continue;
        }
        if to == FormatStyle::MySql && c == '%' {
            staged.push_str("%%");
        } else {
            staged.push(c);
        }
        i += c.len_utf8();
    }

    // Phase 2: sentinels become target tokens.
    let mut out = String::with_capacity(staged.len());
    let mut chars = staged.char_indices().peekable();
    while let Some((pos, c)) = chars.next() {
        if c != SENTINEL_OPEN {
            out.push(c);
            continue;
        }
        let body_start = pos + c.len_utf8();
        let body_end = staged[body_start..]
            .find(SENTINEL_CLOSE)
            .map(|p| body_start + p)
            .unwrap_or(staged.len());
        let idx: usize = staged[body_start..body_end].parse().unwrap_or(usize::MAX);
        while chars.peek().is_some_and(|&(p, _)| p <= body_end) {
            chars.next();
        }
        let Some(&(row, original)) = matched.get(idx) else {
            continue;
        };
        let entry = &FORMAT_TOKENS[row];
        let replacement = entry.get(to);
        if replacement.is_empty() {
            if !MODIFIERS.iter().any(|m| m.eq_ignore_ascii_case(original)) {
                out.push_str(original);
            }
        } else if replacement == entry.get(from) {
            out.push_str(original);
        } else {
            out.push_str(replacement);
        }
    }
    out
}
