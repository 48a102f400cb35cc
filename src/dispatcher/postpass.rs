//! Target-specific passes that run after the rewrite registry: pagination,
//! optimizer hints, pseudo-columns and constructs with no target equivalent.

use once_cell::sync::Lazy;
use regex::Regex;

use super::classify::StatementKind;
use crate::dialect::{Dialect, DialectPair};
use crate::result::{ConversionContext, WarningKind};
use crate::scan::{
    find_keyword, find_keyword_with, find_matching_bracket, is_ident_byte, next_clause, replace_in_code, SqlMask,
};

pub(crate) fn apply(
    sql: &str,
    kind: StatementKind,
    source: Dialect,
    target: Dialect,
    ctx: &mut ConversionContext,
) -> String {
    let pair = DialectPair::new(source, target);
    if pair.same_family() {
        return sql.to_string();
    }
    let mut out = sql.to_string();
    if source.is_oracle_family() {
        out = rownum_paging(&out, ctx);
        out = remaining_rownum(&out, ctx);
        out = strip_optimizer_hints(&out, ctx);
        if kind.is_dml() {
            out = rowid_pseudo_column(&out, target, ctx);
        }
        flag_outer_join_operator(&out, ctx);
    }
    if target.is_oracle_family() {
        out = limit_to_oracle(&out, target, ctx);
        if source == Dialect::PostgreSql {
            out = ctid_to_rowid(&out, ctx);
        }
    }
    if source == Dialect::MySql {
        out = strip_index_hints(&out, ctx);
    }
    if target == Dialect::MySql {
        flag_pipe_concatenation(&out, ctx);
    }
    scan_unsupported(&out, source, target, ctx);
    out
}

static ROWNUM_PREDICATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\bROWNUM\s*(?P<op><=|<|=)\s*(?P<n>\d+)\b|\b(?P<rn>\d+)\s*(?P<rop>>=|>)\s*ROWNUM\b|\bROWNUM\s+BETWEEN\s+(?P<lo>\d+)\s+AND\s+(?P<hi>\d+)\b",
    )
    .expect("valid rownum predicate pattern")
});

/// `(limit, offset)` for a ROWNUM predicate, or `None` when it cannot be
/// expressed as a page.
fn page_bounds(caps: &regex::Captures<'_>) -> Option<(u64, Option<u64>)> {
    let number = |name: &str| caps.name(name).and_then(|m| m.as_str().parse::<u64>().ok());
    if let (Some(lo), Some(hi)) = (number("lo"), number("hi")) {
        if hi < lo {
            return None;
        }
        let offset = (lo > 1).then(|| lo - 1);
        return Some((hi - lo.max(1) + 1, offset));
    }
    let (op, n) = match (caps.name("op"), caps.name("rop")) {
        (Some(op), _) => (op.as_str(), number("n")?),
        (None, Some(op)) => (op.as_str(), number("rn")?),
        (None, None) => return None,
    };
    match op {
        "<=" | ">=" => Some((n, None)),
        "<" | ">" => Some((n.saturating_sub(1), None)),
        "=" if n == 1 => Some((1, None)),
        _ => None,
    }
}

fn ends_with_keyword(text: &str, keyword: &str) -> bool {
    let bytes = text.as_bytes();
    let len = keyword.len();
    bytes.len() >= len
        && bytes[bytes.len() - len..].eq_ignore_ascii_case(keyword.as_bytes())
        && (bytes.len() == len || !is_ident_byte(bytes[bytes.len() - len - 1]))
}

fn starts_with_keyword(text: &str, keyword: &str) -> bool {
    let bytes = text.as_bytes();
    let len = keyword.len();
    bytes.len() >= len
        && bytes[..len].eq_ignore_ascii_case(keyword.as_bytes())
        && (bytes.len() == len || !is_ident_byte(bytes[len]))
}

/// The span to cut so that the predicate at `start..end` disappears from
/// its WHERE clause, or `None` when it is not a plain conjunct.
fn predicate_span(text: &str, start: usize, end: usize) -> Option<(usize, usize)> {
    let before = text[..start].trim_end();
    let after = &text[end..];
    let after_trimmed = after.trim_start();
    if ends_with_keyword(before, "AND") {
        let cut = before[..before.len() - 3].trim_end().len();
        return Some((cut, end));
    }
    if !ends_with_keyword(before, "WHERE") {
        return None;
    }
    if starts_with_keyword(after_trimmed, "AND") {
        let rest = &after_trimmed[3..];
        let skip = (after.len() - after_trimmed.len()) + 3 + (rest.len() - rest.trim_start().len());
        return Some((start, end + skip));
    }
    if starts_with_keyword(after_trimmed, "OR") {
        return None;
    }
    let cut = before[..before.len() - 5].trim_end().len();
    Some((cut, end))
}

const WHERE_END: &[&str] = &[
    "GROUP BY", "HAVING", "ORDER BY", "UNION", "INTERSECT", "EXCEPT", "MINUS", "CONNECT BY", "START WITH", "FETCH",
];

/// Whether position `at` of `scope` lies directly in a WHERE clause whose
/// top level is a pure conjunction. A sibling `OR` means dropping the
/// predicate would change which rows match.
fn in_conjunctive_where(scope: &str, at: usize) -> bool {
    let mask = SqlMask::new(scope);
    if mask.depth(at) != Some(0) {
        return false;
    }
    let mut where_end = None;
    let mut from = 0;
    while let Some((start, end)) = find_keyword_with(&mask, scope, "WHERE", from) {
        if start >= at {
            break;
        }
        where_end = Some(end);
        from = end;
    }
    let Some(where_end) = where_end else {
        return false;
    };
    let clause_end = next_clause(&mask, scope, where_end, WHERE_END);
    find_keyword_with(&mask, scope, "OR", where_end).is_none_or(|(or, _)| or >= clause_end)
}

/// Start of the query (top level or subquery) containing `pos`, skipping
/// parenthesized groups that are not themselves queries.
fn query_scope_start(mask: &SqlMask, sql: &str, pos: usize) -> usize {
    let mut at = pos;
    while let Some(open) = mask.enclosing_open(sql, at) {
        let inner = sql[open + 1..].trim_start();
        if starts_with_keyword(inner, "SELECT") || starts_with_keyword(inner, "WITH") {
            return open + 1;
        }
        at = open;
    }
    0
}

/// Turn `ROWNUM` page predicates into `LIMIT`/`OFFSET` on the innermost
/// query that contains them.
fn rownum_paging(sql: &str, ctx: &mut ConversionContext) -> String {
    let mut current = sql.to_string();
    let mut from = 0;
    loop {
        let mask = SqlMask::new(&current);
        let found = ROWNUM_PREDICATE_RE
            .captures_iter(&current)
            .find(|caps| caps.get(0).is_some_and(|m| m.start() >= from && mask.is_code(m.start())));
        let Some(caps) = found else {
            break;
        };
        let Some(whole) = caps.get(0) else {
            break;
        };
        let (start, end) = (whole.start(), whole.end());
        let (scope_start, scope_end) = match mask.enclosing_open(&current, start) {
            Some(open) => match find_matching_bracket(&current, open + 1) {
                Some(close) => (open + 1, close - 1),
                None => break,
            },
            None => (0, current.len()),
        };
        let span = if in_conjunctive_where(&current[scope_start..scope_end], start - scope_start) {
            predicate_span(&current, start, end)
        } else {
            None
        };
        let (Some((limit, offset)), Some((cut_start, cut_end))) = (page_bounds(&caps), span) else {
            from = end;
            continue;
        };

        if find_keyword(&current[scope_start..scope_end], "ORDER BY", 0).is_some() {
            ctx.warn_with(
                WarningKind::PartialSupport,
                "ROWNUM was evaluated before ORDER BY; LIMIT applies after sorting",
                "Check that the page still selects the intended rows",
            );
        }
        let clause = match offset {
            Some(offset) => format!(" LIMIT {} OFFSET {}", limit, offset),
            None => format!(" LIMIT {}", limit),
        };
        let body = format!("{}{}", &current[..cut_start], &current[cut_end..scope_end]);
        let body = body.trim_end();
        let next = format!("{}{}{}", body, clause, &current[scope_end..]);
        from = body.len() + clause.len();
        current = next;
        ctx.rule("ROWNUM → LIMIT/OFFSET");
    }
    current
}

static ROWNUM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bROWNUM\b").expect("valid rownum pattern"));

/// ROWNUM left in a select list becomes `ROW_NUMBER() OVER ()`; anywhere
/// else it is flagged.
fn remaining_rownum(sql: &str, ctx: &mut ConversionContext) -> String {
    let mask = SqlMask::new(sql);
    let mut numbered = 0;
    let mut flagged = 0;
    let (out, _) = replace_in_code(sql, &ROWNUM_RE, |caps| {
        let pos = caps.get(0)?.start();
        let scope_start = query_scope_start(&mask, sql, pos);
        if find_keyword(&sql[scope_start..pos], "WHERE", 0).is_some() {
            flagged += 1;
            return None;
        }
        numbered += 1;
        Some("ROW_NUMBER() OVER ()".to_string())
    });
    if numbered > 0 {
        ctx.warn_with(
            WarningKind::PartialSupport,
            "ROWNUM in the select list replaced by ROW_NUMBER() OVER ()",
            "Add an ORDER BY inside OVER () for deterministic numbering",
        );
        ctx.rule("ROWNUM → ROW_NUMBER() OVER ()");
    }
    if flagged > 0 {
        ctx.warn_with(
            WarningKind::ManualReviewNeeded,
            "ROWNUM predicate could not be converted to LIMIT/OFFSET",
            "Wrap the query and filter on ROW_NUMBER() OVER (...)",
        );
    }
    out
}

static HINT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)/\*\+.*?\*/\s*").expect("valid hint pattern"));

fn strip_optimizer_hints(sql: &str, ctx: &mut ConversionContext) -> String {
    let mask = SqlMask::new(sql);
    let bytes = sql.as_bytes();
    let mut out = String::with_capacity(sql.len());
    let mut last = 0;
    let mut removed = 0;
    for m in HINT_RE.find_iter(sql) {
        // The comment itself is never code; the byte before it must be.
        let in_code = m.start() == 0
            || (mask.is_code(m.start() - 1) && !matches!(bytes[m.start() - 1], b'\'' | b'"' | b'`'));
        if in_code {
            out.push_str(&sql[last..m.start()]);
            last = m.end();
            removed += 1;
        }
    }
    out.push_str(&sql[last..]);
    if removed > 0 {
        ctx.info(WarningKind::SyntaxDifference, "Oracle optimizer hints removed");
        ctx.rule("optimizer hints removed");
    }
    out
}

static ROWID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bROWID\b").expect("valid rowid pattern"));

fn rowid_pseudo_column(sql: &str, target: Dialect, ctx: &mut ConversionContext) -> String {
    if target == Dialect::PostgreSql {
        let (out, n) = replace_in_code(sql, &ROWID_RE, |_| Some("ctid".to_string()));
        if n > 0 {
            ctx.warn_with(
                WarningKind::PartialSupport,
                "ROWID replaced by ctid",
                "ctid changes on UPDATE and VACUUM FULL; do not store it",
            );
            ctx.rule("ROWID → ctid");
        }
        return out;
    }
    let mask = SqlMask::new(sql);
    if ROWID_RE.find_iter(sql).any(|m| mask.is_code(m.start())) {
        ctx.warn_with(
            WarningKind::UnsupportedFunction,
            format!("ROWID has no {} equivalent", target),
            "Use the primary key instead",
        );
    }
    sql.to_string()
}

static OUTER_JOIN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(\s*\+\s*\)").expect("valid outer join pattern"));

fn flag_outer_join_operator(sql: &str, ctx: &mut ConversionContext) {
    let mask = SqlMask::new(sql);
    if OUTER_JOIN_RE.find_iter(sql).any(|m| mask.is_code(m.start())) {
        ctx.warn_with(
            WarningKind::ManualReviewNeeded,
            "Oracle (+) outer join operator is not supported",
            "Rewrite as ANSI LEFT/RIGHT OUTER JOIN ... ON",
        );
    }
}

static LIMIT_KEYWORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bLIMIT\b").expect("valid limit pattern"));

static LIMIT_CLAUSE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^LIMIT\s+(?P<n>[^\s;]+)(?:\s+OFFSET\s+(?P<o>[^\s;]+)(?:\s+ROWS?)?)?\s*$")
        .expect("valid limit clause pattern")
});

/// `LIMIT n [OFFSET m]` at the end of a query: `FETCH NEXT` on Oracle, a
/// ROWNUM wrapper on Tibero.
fn limit_to_oracle(sql: &str, target: Dialect, ctx: &mut ConversionContext) -> String {
    let mut current = sql.to_string();
    let mut from = 0;
    loop {
        let mask = SqlMask::new(&current);
        let Some(limit_start) = LIMIT_KEYWORD_RE
            .find_iter(&current)
            .map(|m| m.start())
            .find(|&s| s >= from && mask.is_code(s))
        else {
            break;
        };
        let (scope_start, scope_end) = match mask.enclosing_open(&current, limit_start) {
            Some(open) => match find_matching_bracket(&current, open + 1) {
                Some(close) => (open + 1, close - 1),
                None => break,
            },
            None => (0, current.len()),
        };
        let clause = &current[limit_start..scope_end];
        let Some(caps) = LIMIT_CLAUSE_RE.captures(clause) else {
            if clause[5..].trim_start().starts_with(|c: char| c.is_ascii_digit()) {
                ctx.warn(
                    WarningKind::ManualReviewNeeded,
                    format!("LIMIT clause could not be converted for {}", target),
                );
            }
            from = limit_start + 5;
            continue;
        };
        let count = caps.name("n").map_or("", |m| m.as_str()).to_string();
        let offset = caps.name("o").map(|m| m.as_str().to_string());
        let query = current[scope_start..limit_start].trim_end().to_string();

        let replacement = if target == Dialect::Tibero {
            let wrapped = match offset {
                None => format!("SELECT * FROM ({}) WHERE ROWNUM <= {}", query.trim_start(), count),
                Some(offset) => {
                    let upper = match (count.parse::<u64>(), offset.parse::<u64>()) {
                        (Ok(n), Ok(o)) => (n + o).to_string(),
                        _ => format!("{} + {}", offset, count),
                    };
                    format!(
                        "SELECT * FROM (SELECT paged.*, ROWNUM AS rn FROM ({}) paged WHERE ROWNUM <= {}) WHERE rn > {}",
                        query.trim_start(),
                        upper,
                        offset
                    )
                }
            };
            ctx.rule("LIMIT/OFFSET → ROWNUM wrapper");
            let leading = &query[..query.len() - query.trim_start().len()];
            format!("{}{}", leading, wrapped)
        } else {
            let fetch = if count.eq_ignore_ascii_case("ALL") {
                String::new()
            } else {
                format!("FETCH NEXT {} ROWS ONLY", count)
            };
            let rendered = match offset {
                Some(offset) if fetch.is_empty() => format!("OFFSET {} ROWS", offset),
                Some(offset) => format!("OFFSET {} ROWS {}", offset, fetch),
                None => fetch,
            };
            ctx.rule("LIMIT/OFFSET → OFFSET/FETCH");
            format!("{} {}", query, rendered)
        };
        let next = format!("{}{}{}", &current[..scope_start], replacement, &current[scope_end..]);
        from = scope_start + replacement.len();
        current = next;
    }
    current
}

static CTID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bctid\b").expect("valid ctid pattern"));

fn ctid_to_rowid(sql: &str, ctx: &mut ConversionContext) -> String {
    let (out, n) = replace_in_code(sql, &CTID_RE, |_| Some("ROWID".to_string()));
    if n > 0 {
        ctx.warn(WarningKind::PartialSupport, "ctid replaced by ROWID; physical row addresses differ");
        ctx.rule("ctid → ROWID");
    }
    out
}

static INDEX_HINT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s*\b(?:USE|FORCE|IGNORE)\s+(?:INDEX|KEY)(?:\s+FOR\s+(?:JOIN|ORDER\s+BY|GROUP\s+BY))?\s*\([^)]*\)")
        .expect("valid index hint pattern")
});

fn strip_index_hints(sql: &str, ctx: &mut ConversionContext) -> String {
    let (out, n) = replace_in_code(sql, &INDEX_HINT_RE, |_| Some(String::new()));
    if n > 0 {
        ctx.info(WarningKind::SyntaxDifference, "MySQL index hints removed");
        ctx.rule("index hints removed");
    }
    out
}

fn flag_pipe_concatenation(sql: &str, ctx: &mut ConversionContext) {
    let mask = SqlMask::new(sql);
    let concatenates = sql
        .match_indices("||")
        .any(|(i, _)| mask.is_code(i));
    if concatenates {
        ctx.warn_with(
            WarningKind::PartialSupport,
            "|| is logical OR in MySQL unless PIPES_AS_CONCAT is enabled",
            "Use CONCAT(a, b) or set sql_mode PIPES_AS_CONCAT",
        );
    }
}

/// A construct with no equivalent on some targets.
struct Unsupported {
    source: Dialect,
    targets: &'static [Dialect],
    name: &'static str,
    pattern: &'static str,
    suggestion: &'static str,
}

const NOT_ORACLE: &[Dialect] = &[Dialect::PostgreSql, Dialect::MySql];
const NOT_POSTGRES: &[Dialect] = &[Dialect::MySql, Dialect::Oracle, Dialect::Tibero];
const NOT_MYSQL: &[Dialect] = &[Dialect::PostgreSql, Dialect::Oracle, Dialect::Tibero];

const UNSUPPORTED: &[Unsupported] = &[
    Unsupported {
        source: Dialect::Oracle,
        targets: NOT_ORACLE,
        name: "MONTHS_BETWEEN",
        pattern: r"(?i)\bMONTHS_BETWEEN\s*\(",
        suggestion: "Compute the month difference with date arithmetic (AGE on PostgreSQL, TIMESTAMPDIFF on MySQL)",
    },
    Unsupported {
        source: Dialect::Oracle,
        targets: NOT_ORACLE,
        name: "DBMS_* package",
        pattern: r"(?i)\bDBMS_\w+",
        suggestion: "Replace the package call with target-native functionality",
    },
    Unsupported {
        source: Dialect::Oracle,
        targets: NOT_ORACLE,
        name: "UTL_* package",
        pattern: r"(?i)\bUTL_\w+",
        suggestion: "Replace the package call with target-native functionality",
    },
    Unsupported {
        source: Dialect::Oracle,
        targets: NOT_ORACLE,
        name: "hierarchical pseudo-column",
        pattern: r"(?i)\b(?:CONNECT_BY_ROOT|CONNECT_BY_ISLEAF|CONNECT_BY_ISCYCLE|SYS_CONNECT_BY_PATH)\b",
        suggestion: "Compute the value inside a WITH RECURSIVE query",
    },
    Unsupported {
        source: Dialect::Oracle,
        targets: &[Dialect::PostgreSql],
        name: "LAST_DAY",
        pattern: r"(?i)\bLAST_DAY\s*\(",
        suggestion: "(DATE_TRUNC('month', d) + INTERVAL '1 month' - INTERVAL '1 day')::date",
    },
    Unsupported {
        source: Dialect::PostgreSql,
        targets: NOT_POSTGRES,
        name: "DISTINCT ON",
        pattern: r"(?i)\bDISTINCT\s+ON\b",
        suggestion: "Use ROW_NUMBER() OVER (PARTITION BY ...) and keep row 1",
    },
    Unsupported {
        source: Dialect::PostgreSql,
        targets: NOT_POSTGRES,
        name: "generate_series",
        pattern: r"(?i)\bgenerate_series\s*\(",
        suggestion: "Use a recursive CTE or a numbers table",
    },
    Unsupported {
        source: Dialect::PostgreSql,
        targets: NOT_POSTGRES,
        name: "ARRAY_AGG",
        pattern: r"(?i)\bARRAY_AGG\s*\(",
        suggestion: "Aggregate into a delimited string or JSON array instead",
    },
    Unsupported {
        source: Dialect::PostgreSql,
        targets: NOT_POSTGRES,
        name: "UNNEST",
        pattern: r"(?i)\bUNNEST\s*\(",
        suggestion: "Use JSON_TABLE or a join against a numbers table",
    },
    Unsupported {
        source: Dialect::MySql,
        targets: NOT_MYSQL,
        name: "FOUND_ROWS",
        pattern: r"(?i)\bFOUND_ROWS\s*\(|\bSQL_CALC_FOUND_ROWS\b",
        suggestion: "Run a separate COUNT(*) query or use COUNT(*) OVER ()",
    },
    Unsupported {
        source: Dialect::MySql,
        targets: NOT_MYSQL,
        name: "FIELD",
        pattern: r"(?i)\bFIELD\s*\(",
        suggestion: "Use a CASE expression for custom ordering",
    },
    Unsupported {
        source: Dialect::MySql,
        targets: NOT_MYSQL,
        name: "FIND_IN_SET",
        pattern: r"(?i)\bFIND_IN_SET\s*\(",
        suggestion: "Split the list or normalize the column",
    },
];

static UNSUPPORTED_PATTERNS: Lazy<Vec<(&'static Unsupported, Regex)>> = Lazy::new(|| {
    UNSUPPORTED
        .iter()
        .map(|u| (u, Regex::new(u.pattern).expect("valid unsupported construct pattern")))
        .collect()
});

/// Warn once per construct that the target cannot express.
fn scan_unsupported(sql: &str, source: Dialect, target: Dialect, ctx: &mut ConversionContext) {
    let mask = SqlMask::new(sql);
    for (construct, re) in UNSUPPORTED_PATTERNS.iter() {
        if construct.source != source.family() || !construct.targets.contains(&target) {
            continue;
        }
        if re.find_iter(sql).any(|m| mask.is_code(m.start())) {
            ctx.warn_with(
                WarningKind::UnsupportedFunction,
                format!("{} has no {} equivalent", construct.name, target),
                construct.suggestion,
            );
        }
    }
}
