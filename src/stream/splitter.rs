//! Statement splitting on top-level semicolons.

use crate::dispatcher::{classify, StatementKind};
use crate::scan::strip_leading_comments;

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Code,
    Single,
    Double,
    Backtick,
    LineComment,
    BlockComment,
    /// PostgreSQL `$tag$ ... $tag$` body; holds the full delimiter.
    Dollar(String),
}

/// Lazy iterator over the statements of a script.
///
/// Semicolons inside string literals, quoted identifiers, comments and
/// dollar-quoted bodies do not split. Oracle program units run until a line
/// holding only `/`, so the semicolons of their bodies stay inside. Yielded
/// statements are trimmed, carry no terminator, and comment-only fragments
/// are skipped. Cloning restarts from the clone point.
#[derive(Debug, Clone)]
pub struct StatementSplitter<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> StatementSplitter<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }
}

/// Delimiter of a dollar quote opening at `i` (`$$` or `$tag$`).
fn dollar_delimiter(bytes: &[u8], i: usize) -> Option<usize> {
    let mut j = i + 1;
    while j < bytes.len() && (bytes[j].is_ascii_alphanumeric() || bytes[j] == b'_') {
        j += 1;
    }
    let tag_starts_with_digit = j > i + 1 && bytes[i + 1].is_ascii_digit();
    (bytes.get(j) == Some(&b'$') && !tag_starts_with_digit).then_some(j + 1)
}

/// Whether the line starting at `i` holds only a `/`.
fn slash_line(text: &str, i: usize) -> Option<usize> {
    let rest = &text[i..];
    let line_end = rest.find('\n').map_or(text.len(), |n| i + n + 1);
    (text[i..line_end].trim() == "/").then_some(line_end)
}

/// Oracle-style program units are terminated by a `/` line; without one
/// anywhere ahead, fall back to semicolons.
fn runs_to_slash(rest: &str) -> bool {
    classify(rest) == StatementKind::ProgramUnit && rest.lines().any(|line| line.trim() == "/")
}

impl<'a> Iterator for StatementSplitter<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let text = self.text;
        let bytes = text.as_bytes();
        while self.pos < bytes.len() {
            let start = self.pos;
            let block = runs_to_slash(&text[start..]);
            let mut state = State::Code;
            let mut i = start;
            let mut line_start = true;
            let mut end = None;
            while i < bytes.len() {
                let b = bytes[i];
                let next = bytes.get(i + 1).copied();
                match &state {
                    State::Code => {
                        // Outside a program unit a `/` line is division unless it
                        // opens the statement (a SQL*Plus re-run of the buffer).
                        if line_start && (block || text[start..i].trim().is_empty()) {
                            if let Some(after) = slash_line(text, i) {
                                end = Some((i, after));
                                break;
                            }
                        }
                        match b {
                            b'\'' => state = State::Single,
                            b'"' => state = State::Double,
                            b'`' => state = State::Backtick,
                            b'-' if next == Some(b'-') => {
                                state = State::LineComment;
                                i += 1;
                            }
                            b'/' if next == Some(b'*') => {
                                state = State::BlockComment;
                                i += 1;
                            }
                            b'$' => {
                                if let Some(close) = dollar_delimiter(bytes, i) {
                                    state = State::Dollar(text[i..close].to_string());
                                    i = close - 1;
                                }
                            }
                            b';' if !block => {
                                end = Some((i, i + 1));
                                break;
                            }
                            _ => {}
                        }
                    }
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
                    State::Dollar(delimiter) => {
                        if text[i..].starts_with(delimiter.as_str()) {
                            i += delimiter.len() - 1;
                            state = State::Code;
                        }
                    }
                }
                line_start = bytes[i] == b'\n';
                i += 1;
            }
            let (stmt_end, resume) = end.unwrap_or((bytes.len(), bytes.len()));
            self.pos = resume;
            let statement = text[start..stmt_end].trim();
            if !strip_leading_comments(statement).is_empty() {
                return Some(statement);
            }
        }
        None
    }
}

/// Collect all statements of `sql`.
pub fn split_statements(sql: &str) -> Vec<&str> {
    StatementSplitter::new(sql).collect()
}

/// Cheap upper bound on the statement count, used to pick a strategy
/// before splitting.
pub fn estimate_statement_count(sql: &str) -> usize {
    sql.bytes().filter(|&b| b == b';').count().max(usize::from(!sql.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_split_basic() {
        let stmts = split_statements("SELECT 1; SELECT 2;\n\nSELECT 3");
        assert_eq!(stmts, vec!["SELECT 1", "SELECT 2", "SELECT 3"]);
    }

    #[test]
    fn test_semicolons_in_literals_and_comments() {
        let sql = "SELECT 'a;b' FROM t; -- trailing; comment\nSELECT \"x;y\" /* ; */ FROM u;";
        let stmts = split_statements(sql);
        assert_eq!(
            stmts,
            vec!["SELECT 'a;b' FROM t", "-- trailing; comment\nSELECT \"x;y\" /* ; */ FROM u"]
        );
    }

    #[test]
    fn test_comment_only_fragments_skipped() {
        let stmts = split_statements("-- header\n;\n/* nothing */;\nSELECT 1;\n-- footer");
        assert_eq!(stmts, vec!["SELECT 1"]);
        assert!(split_statements("   ").is_empty());
    }

    #[test]
    fn test_dollar_quoted_body() {
        let sql = "CREATE FUNCTION f() RETURNS int AS $$ BEGIN RETURN 1; END; $$ LANGUAGE plpgsql;\nSELECT f();";
        let stmts = split_statements(sql);
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].ends_with("LANGUAGE plpgsql"));
        assert_eq!(split_statements("SELECT $1; SELECT $2"), vec!["SELECT $1", "SELECT $2"]);
    }

    #[test]
    fn test_program_unit_until_slash() {
        let sql = "CREATE OR REPLACE PROCEDURE p AS\nBEGIN\n  UPDATE t SET a = 1;\n  COMMIT;\nEND;\n/\nSELECT 1 FROM dual;";
        let stmts = split_statements(sql);
        assert_eq!(
            stmts,
            vec![
                "CREATE OR REPLACE PROCEDURE p AS\nBEGIN\n  UPDATE t SET a = 1;\n  COMMIT;\nEND;",
                "SELECT 1 FROM dual"
            ]
        );
    }

    #[test]
    fn test_slash_line_outside_program_unit() {
        assert_eq!(split_statements("SELECT a\n/\nb FROM t;"), vec!["SELECT a\n/\nb FROM t"]);
        assert_eq!(
            split_statements("SELECT 1 FROM dual;\n/\nSELECT 2 FROM dual;"),
            vec!["SELECT 1 FROM dual", "SELECT 2 FROM dual"]
        );
    }

    #[test]
    fn test_iterator_is_restartable() {
        let splitter = StatementSplitter::new("SELECT 1; SELECT 2");
        let first: Vec<_> = splitter.clone().collect();
        let second: Vec<_> = splitter.collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_estimate() {
        assert_eq!(estimate_statement_count("SELECT 1"), 1);
        assert_eq!(estimate_statement_count("SELECT 1; SELECT 2;"), 2);
        assert_eq!(estimate_statement_count(""), 0);
    }
}
