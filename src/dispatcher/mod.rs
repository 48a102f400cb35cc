//! Dialect dispatcher: classifies each statement and runs it through the
//! conversion pipeline.
//!
//! Stages, in order:
//!
//! 1. schema-owner stripping
//! 2. `CONNECT BY` → `WITH RECURSIVE`
//! 3. `MERGE` / upsert normalization
//! 4. sequence DDL and `NEXTVAL`/`CURRVAL` references
//! 5. DDL types, identity columns, storage clauses and `CAST` targets
//! 6. the pattern rewrite registry
//! 7. target post-passes

mod classify;
mod ddl;
mod postpass;

pub use classify::{classify, StatementKind};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::dialect::Dialect;
use crate::hierarchy::convert_hierarchical_query;
use crate::merge::{convert_merge, convert_upsert};
use crate::parser::{SqlParserBackend, StatementParser};
use crate::result::{ConversionContext, ConversionOptions, ConversionResult, WarningKind};
use crate::rewrite::RewriteRegistry;
use crate::scan::{comment_out, replace_in_code, SqlMask};
use crate::sequence::{convert_sequence_references, convert_sequence_statement};
use crate::stream::split_statements;

/// Routes statements through the conversion pipeline.
pub struct Dispatcher {
    parser: Option<Box<dyn StatementParser>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("parser", &self.parser.is_some())
            .finish()
    }
}

static DEFAULT_DISPATCHER: Lazy<Dispatcher> = Lazy::new(Dispatcher::new);

impl Dispatcher {
    /// Dispatcher backed by the `sqlparser` grammar.
    pub fn new() -> Self {
        Self {
            parser: Some(Box::new(SqlParserBackend)),
        }
    }

    /// Classify by leading keywords only.
    pub fn without_parser() -> Self {
        Self { parser: None }
    }

    pub fn with_parser(parser: impl StatementParser + 'static) -> Self {
        Self {
            parser: Some(Box::new(parser)),
        }
    }

    /// Statement kind, confirmed by the parser when it recognizes the shape.
    pub fn classify(&self, sql: &str, dialect: Dialect) -> StatementKind {
        let kind = classify(sql);
        if !matches!(
            kind,
            StatementKind::Select | StatementKind::CreateTable | StatementKind::Drop | StatementKind::DropSequence
        ) {
            return kind;
        }
        self.parser
            .as_ref()
            .and_then(|parser| parser.parse(sql, dialect))
            .map_or(kind, |parsed| StatementKind::from(&parsed))
    }

    /// Convert a script of one or more statements.
    ///
    /// Never fails: anything that could not be converted is reported in the
    /// result's warnings.
    pub fn convert(&self, sql: &str, source: Dialect, target: Dialect, options: &ConversionOptions) -> ConversionResult {
        let mut ctx = ConversionContext::new(options.clone());
        if source == target {
            ctx.rule(format!("No conversion needed: source and target are both {}", source));
            return ctx.into_result(sql.to_string(), source, target);
        }
        let statements = split_statements(sql);
        if statements.is_empty() {
            return ctx.into_result(sql.to_string(), source, target);
        }
        debug!(%source, %target, statements = statements.len(), "converting");
        let converted: Vec<String> = statements
            .iter()
            .map(|statement| self.convert_statement(statement, source, target, &mut ctx))
            .collect();
        let mut out = join_statements(&converted, sql.trim_end().ends_with(';'));
        if options.format_output {
            out = format_sql(&out);
        }
        ctx.into_result(out, source, target)
    }

    /// Run one statement (without terminator) through the pipeline.
    pub fn convert_statement(
        &self,
        statement: &str,
        source: Dialect,
        target: Dialect,
        ctx: &mut ConversionContext,
    ) -> String {
        let kind = self.classify(statement, source);
        debug!(?kind, "statement classified");
        let unsupported_before = unsupported_count(ctx);

        let mut sql = match ctx.options.schema_owner.clone() {
            Some(owner) if !owner.trim().is_empty() => strip_schema_owner(statement, owner.trim(), ctx),
            _ => statement.to_string(),
        };

        if kind == StatementKind::ProgramUnit {
            ctx.warn_with(
                WarningKind::ManualReviewNeeded,
                format!("Procedural code must be ported to {} by hand", target),
                "Token-level rewrites were applied; review control flow, cursors and exception handling",
            );
        }

        if let Some(out) = convert_hierarchical_query(&sql, source, target, ctx) {
            sql = out;
        }

        let upsert = match kind {
            StatementKind::Merge => convert_merge(&sql, source, target, ctx),
            StatementKind::Insert => convert_upsert(&sql, source, target, ctx),
            _ => None,
        };
        if let Some(out) = upsert {
            sql = out;
        }

        if kind.is_sequence_ddl() {
            if let Some(out) = convert_sequence_statement(&sql, source, target, ctx) {
                return out;
            }
        }
        sql = convert_sequence_references(&sql, source, target, ctx);

        sql = ddl::convert_ddl(&sql, kind, source, target, ctx);
        sql = RewriteRegistry::global().apply(&sql, source, target, &mut ctx.applied_rules);
        sql = postpass::apply(&sql, kind, source, target, ctx);

        let unsupported = kind == StatementKind::ProgramUnit || unsupported_count(ctx) > unsupported_before;
        if ctx.options.skip_unsupported_features && unsupported {
            ctx.warn(
                WarningKind::UnsupportedFunction,
                "Statement commented out because it uses features the target cannot express",
            );
            return comment_out(statement);
        }
        sql
    }
}

/// Convert `sql` from `source` to `target` with the default dispatcher.
///
/// ```
/// use sqlmorph::{convert, ConversionOptions, Dialect};
///
/// let result = convert(
///     "SELECT NVL(name, 'n/a') FROM users WHERE ROWNUM <= 10",
///     Dialect::Oracle,
///     Dialect::PostgreSql,
///     &ConversionOptions::default(),
/// );
/// assert_eq!(result.converted_sql, "SELECT COALESCE(name, 'n/a') FROM users LIMIT 10");
/// ```
pub fn convert(sql: &str, source: Dialect, target: Dialect, options: &ConversionOptions) -> ConversionResult {
    DEFAULT_DISPATCHER.convert(sql, source, target, options)
}

fn unsupported_count(ctx: &ConversionContext) -> usize {
    ctx.warnings
        .iter()
        .filter(|w| w.kind == WarningKind::UnsupportedFunction)
        .count()
}

fn strip_schema_owner(sql: &str, owner: &str, ctx: &mut ConversionContext) -> String {
    let pattern = format!(r#"(?i)(?:"{0}"|\b{0}\b)\s*\.\s*"#, regex::escape(owner));
    let re = match Regex::new(&pattern) {
        Ok(re) => re,
        Err(e) => {
            debug!(error = %e, owner, "schema owner pattern rejected");
            return sql.to_string();
        }
    };
    let bytes = sql.as_bytes();
    let (out, n) = replace_in_code(sql, &re, |caps| {
        let start = caps.get(0)?.start();
        // `x.OWNER.` is a column path, not a schema qualifier.
        if start > 0 && bytes[start - 1] == b'.' {
            return None;
        }
        Some(String::new())
    });
    if n > 0 {
        ctx.rule(format!("schema owner {} removed", owner));
    }
    out
}

/// Whether the last line of `sql` ends inside a `--` comment, so that a
/// terminator appended to it would be swallowed.
fn ends_in_line_comment(sql: &str) -> bool {
    let Some(&last) = sql.as_bytes().last() else {
        return false;
    };
    let mask = SqlMask::new(sql);
    !mask.is_code(sql.len() - 1) && !matches!(last, b'\'' | b'"' | b'`') && !sql.ends_with("*/")
}

/// Join converted statements with `;` and a blank line.
pub(crate) fn join_statements(statements: &[String], trailing_semicolon: bool) -> String {
    let mut out = String::new();
    for (i, statement) in statements.iter().enumerate() {
        let statement = statement.trim_end();
        let statement = statement.strip_suffix(';').unwrap_or(statement).trim_end();
        let last = i + 1 == statements.len();
        out.push_str(statement);
        if !last || trailing_semicolon {
            if ends_in_line_comment(statement) {
                out.push('\n');
            }
            out.push(';');
        }
        if !last {
            out.push_str("\n\n");
        }
    }
    out
}

/// Trim trailing whitespace, collapse blank-line runs, drop leading and
/// trailing blank lines.
fn format_sql(sql: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut previous_blank = true;
    for line in sql.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            if !previous_blank {
                lines.push("");
            }
            previous_blank = true;
        } else {
            lines.push(line);
            previous_blank = false;
        }
    }
    while lines.last() == Some(&"") {
        lines.pop();
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParsedStatement;
    use pretty_assertions::assert_eq;

    fn run(sql: &str, source: Dialect, target: Dialect) -> ConversionResult {
        convert(sql, source, target, &ConversionOptions::default())
    }

    #[test]
    fn test_identity_conversion() {
        for dialect in Dialect::ALL {
            let sql = "SELECT NVL(a, 1) FROM dual WHERE ROWNUM <= 3;\n";
            let result = run(sql, dialect, dialect);
            assert_eq!(result.converted_sql, sql);
            assert_eq!(result.applied_rules.len(), 1);
            assert!(result.warnings.is_empty());
        }
    }

    #[test]
    fn test_multi_statement_join() {
        let result = run(
            "SELECT SYSDATE FROM dual;\nSELECT NVL(a, 0) FROM t;",
            Dialect::Oracle,
            Dialect::PostgreSql,
        );
        assert_eq!(
            result.converted_sql,
            "SELECT CURRENT_TIMESTAMP;\n\nSELECT COALESCE(a, 0) FROM t;"
        );
    }

    #[test]
    fn test_no_trailing_semicolon_kept_absent() {
        let result = run("SELECT NVL(a, 0) FROM t", Dialect::Oracle, Dialect::MySql);
        assert_eq!(result.converted_sql, "SELECT IFNULL(a, 0) FROM t");
    }

    #[test]
    fn test_schema_owner_stripped() {
        let options = ConversionOptions {
            schema_owner: Some("hr".to_string()),
            ..Default::default()
        };
        let result = convert(
            "SELECT e.name FROM HR.employees e JOIN \"HR\".depts d ON e.dept = d.id WHERE e.note = 'HR.x'",
            Dialect::Oracle,
            Dialect::PostgreSql,
            &options,
        );
        assert_eq!(
            result.converted_sql,
            "SELECT e.name FROM employees e JOIN depts d ON e.dept = d.id WHERE e.note = 'HR.x'"
        );
        assert!(result.applied_rules.contains(&"schema owner hr removed".to_string()));
    }

    #[test]
    fn test_program_unit_flagged() {
        let result = run(
            "CREATE OR REPLACE PROCEDURE p AS\nBEGIN\n  UPDATE t SET d = SYSDATE;\nEND;\n/\n",
            Dialect::Oracle,
            Dialect::PostgreSql,
        );
        assert!(result
            .warnings
            .iter()
            .any(|w| w.kind == WarningKind::ManualReviewNeeded));
        assert!(result.converted_sql.contains("SET d = CURRENT_TIMESTAMP"));
    }

    #[test]
    fn test_skip_unsupported_comments_out() {
        let options = ConversionOptions {
            skip_unsupported_features: true,
            ..Default::default()
        };
        let result = convert(
            "SELECT MONTHS_BETWEEN(a, b) FROM t;\nSELECT 1 FROM dual;",
            Dialect::Oracle,
            Dialect::MySql,
            &options,
        );
        assert_eq!(
            result.converted_sql,
            "-- SELECT MONTHS_BETWEEN(a, b) FROM t\n;\n\nSELECT 1 FROM dual;"
        );
    }

    #[test]
    fn test_strict_mode_escalates() {
        let options = ConversionOptions {
            strict_mode: true,
            ..Default::default()
        };
        let result = convert("SELECT MONTHS_BETWEEN(a, b) FROM t", Dialect::Oracle, Dialect::PostgreSql, &options);
        assert!(result.has_errors());
    }

    #[test]
    fn test_format_output() {
        assert_eq!(format_sql("\n\nSELECT 1   \n\n\n\nFROM t  \n\n"), "SELECT 1\n\nFROM t");
        let options = ConversionOptions {
            format_output: false,
            ..Default::default()
        };
        let result = convert("SELECT 1 FROM dual   ", Dialect::Oracle, Dialect::PostgreSql, &options);
        assert_eq!(result.converted_sql, "SELECT 1");
    }

    #[test]
    fn test_join_after_line_comment() {
        let joined = join_statements(&["SELECT 1 -- one".to_string(), "SELECT 2".to_string()], true);
        assert_eq!(joined, "SELECT 1 -- one\n;\n\nSELECT 2;");
        assert_eq!(join_statements(&[], true), "");
    }

    struct AlwaysSelect;

    impl StatementParser for AlwaysSelect {
        fn parse(&self, _sql: &str, _dialect: Dialect) -> Option<ParsedStatement> {
            Some(ParsedStatement::Select)
        }
    }

    #[test]
    fn test_parser_confirms_kind() {
        let dispatcher = Dispatcher::with_parser(AlwaysSelect);
        assert_eq!(dispatcher.classify("DROP TABLE t", Dialect::MySql), StatementKind::Select);
        assert_eq!(dispatcher.classify("INSERT INTO t VALUES (1)", Dialect::MySql), StatementKind::Insert);
        let plain = Dispatcher::without_parser();
        assert_eq!(plain.classify("DROP TABLE t", Dialect::MySql), StatementKind::Drop);
        assert_eq!(
            Dispatcher::new().classify("DROP SEQUENCE s", Dialect::PostgreSql),
            StatementKind::DropSequence
        );
    }
}
