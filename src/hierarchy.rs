//! `START WITH ... CONNECT BY` to recursive CTE.
//!
//! The statement is cut into top-level clauses, the `PRIOR` equality gives
//! the parent/child columns, and pseudo-columns (`LEVEL`,
//! `SYS_CONNECT_BY_PATH`, `CONNECT_BY_ROOT`, `CONNECT_BY_ISLEAF`) become
//! columns carried through the CTE. Anything outside that shape is handed
//! back with a commented template and a manual-review warning.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::debug;

use crate::dialect::Dialect;
use crate::result::{ConversionContext, WarningKind};
use crate::scan::{
    contains_word, find_function_call, find_keyword, find_keyword_with, replace_in_code, split_function_args,
    unqualify, SqlMask,
};

const CTE: &str = "hierarchy";

static LEVEL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bLEVEL\b").expect("valid level pattern"));

static ROOT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\bCONNECT_BY_ROOT(?:\s+([\w$#."]+)|\s*\(\s*([\w$#."]+)\s*\))"#).expect("valid root pattern")
});

static ISLEAF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bCONNECT_BY_ISLEAF\b").expect("valid isleaf pattern"));

static PRIOR_LEFT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)^\s*PRIOR\s+([\w$#."]+)\s*=\s*([\w$#."]+)\s*$"#).expect("valid prior pattern")
});

static PRIOR_RIGHT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)^\s*([\w$#."]+)\s*=\s*PRIOR\s+([\w$#."]+)\s*$"#).expect("valid prior pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Clause {
    From,
    Where,
    StartWith,
    ConnectBy,
    GroupBy,
    OrderBy,
    OrderSiblingsBy,
}

impl Clause {
    const ALL: [(Clause, &'static str); 7] = [
        (Clause::From, "FROM"),
        (Clause::Where, "WHERE"),
        (Clause::StartWith, "START WITH"),
        (Clause::ConnectBy, "CONNECT BY"),
        (Clause::GroupBy, "GROUP BY"),
        (Clause::OrderBy, "ORDER BY"),
        (Clause::OrderSiblingsBy, "ORDER SIBLINGS BY"),
    ];
}

/// A hierarchical `SELECT` cut into its clauses.
#[derive(Debug)]
struct HierarchicalQuery<'a> {
    select_list: &'a str,
    table: &'a str,
    alias: Option<&'a str>,
    where_clause: Option<&'a str>,
    start_with: Option<&'a str>,
    connect_by: &'a str,
    nocycle: bool,
    group_by: Option<&'a str>,
    order_by: Option<&'a str>,
    order_siblings: bool,
}

impl HierarchicalQuery<'_> {
    /// Name rows of the driving table are referenced by.
    fn table_ref(&self) -> &str {
        self.alias.unwrap_or_else(|| unqualify(self.table))
    }

    fn from_text(&self) -> String {
        match self.alias {
            Some(alias) => format!("{} {}", self.table, alias),
            None => self.table.to_string(),
        }
    }
}

fn parse(sql: &str) -> Result<HierarchicalQuery<'_>, String> {
    let mask = SqlMask::new(sql);
    let (select_start, select_end) =
        find_keyword_with(&mask, sql, "SELECT", 0).ok_or_else(|| "no top-level SELECT".to_string())?;
    if !sql[..select_start].trim().is_empty() {
        return Err("statement does not start with SELECT".into());
    }

    let mut marks: Vec<(Clause, usize, usize)> = Clause::ALL
        .iter()
        .filter_map(|(clause, kw)| find_keyword_with(&mask, sql, kw, select_end).map(|(s, e)| (*clause, s, e)))
        .collect();
    marks.sort_by_key(|(_, start, _)| *start);

    let body = |clause: Clause| -> Option<&str> {
        let i = marks.iter().position(|(c, _, _)| *c == clause)?;
        let end = marks.get(i + 1).map(|(_, s, _)| *s).unwrap_or(sql.len());
        Some(sql[marks[i].2..end].trim())
    };

    let from = body(Clause::From).ok_or_else(|| "no FROM clause".to_string())?;
    if marks.first().map(|(c, _, _)| *c) != Some(Clause::From) {
        return Err("clauses appear before FROM".into());
    }
    let select_list = sql[select_end..marks[0].1].trim();
    let connect_raw = body(Clause::ConnectBy).ok_or_else(|| "no top-level CONNECT BY".to_string())?;

    if from.contains(',') || from.contains('(') || contains_word(from, "JOIN") {
        return Err("CONNECT BY over a join or subquery".into());
    }
    let words: Vec<&str> = from.split_whitespace().collect();
    let (table, alias) = match words.as_slice() {
        [table] => (*table, None),
        [table, alias] => (*table, Some(*alias)),
        [table, kw, alias] if kw.eq_ignore_ascii_case("AS") => (*table, Some(*alias)),
        _ => return Err(format!("unsupported FROM clause: {}", from)),
    };

    let (nocycle, connect_by) = match find_keyword(connect_raw, "NOCYCLE", 0) {
        Some((0, end)) => (true, connect_raw[end..].trim()),
        _ => (false, connect_raw),
    };

    let order_siblings = body(Clause::OrderSiblingsBy);
    Ok(HierarchicalQuery {
        select_list,
        table,
        alias,
        where_clause: body(Clause::Where),
        start_with: body(Clause::StartWith),
        connect_by,
        nocycle,
        group_by: body(Clause::GroupBy),
        order_by: order_siblings.or_else(|| body(Clause::OrderBy)),
        order_siblings: order_siblings.is_some(),
    })
}

/// Split on top-level `AND`.
fn split_and(text: &str) -> Vec<&str> {
    let mask = SqlMask::new(text);
    let mut parts = Vec::new();
    let mut last = 0;
    let mut from = 0;
    while let Some((start, end)) = find_keyword_with(&mask, text, "AND", from) {
        parts.push(text[last..start].trim());
        last = end;
        from = end;
    }
    parts.push(text[last..].trim());
    parts
}

/// The `PRIOR` equality: `(parent column, child column)`.
fn prior_columns(term: &str) -> Option<(String, String)> {
    if let Some(caps) = PRIOR_LEFT_RE.captures(term) {
        return Some((unqualify(&caps[1]).to_string(), unqualify(&caps[2]).to_string()));
    }
    PRIOR_RIGHT_RE
        .captures(term)
        .map(|caps| (unqualify(&caps[2]).to_string(), unqualify(&caps[1]).to_string()))
}

/// Pseudo-columns found in the outer clauses, carried as CTE columns.
#[derive(Debug, Default)]
struct PseudoColumns {
    /// `(expression, separator)` per `path_n` column.
    paths: Vec<(String, String)>,
    /// Column per `root_<column>`.
    roots: Vec<String>,
    is_leaf: bool,
}

impl PseudoColumns {
    fn rewrite(&mut self, text: &str, leaf_expr: &str) -> String {
        let mut current = text.to_string();
        while let Some(call) = find_function_call(&current, "SYS_CONNECT_BY_PATH", 0) {
            let args = split_function_args(call.args(&current));
            let (column, separator) = match args.as_slice() {
                [column, separator] => (column.clone(), separator.clone()),
                _ => break,
            };
            let index = match self.paths.iter().position(|p| *p == (column.clone(), separator.clone())) {
                Some(i) => i,
                None => {
                    self.paths.push((column, separator));
                    self.paths.len() - 1
                }
            };
            current.replace_range(call.start..call.end, &format!("path_{}", index + 1));
        }

        let (out, _) = replace_in_code(&current, &ROOT_RE, |caps: &Captures<'_>| {
            let column = caps.get(1).or_else(|| caps.get(2))?.as_str().to_string();
            let name = format!("root_{}", unqualify(&column).trim_matches('"'));
            if !self.roots.contains(&column) {
                self.roots.push(column);
            }
            Some(name)
        });
        let (out, leaves) = replace_in_code(&out, &ISLEAF_RE, |_| Some(leaf_expr.to_string()));
        self.is_leaf |= leaves > 0;
        let (out, _) = replace_in_code(&out, &LEVEL_RE, |_| Some("level".to_string()));
        out
    }
}

fn qualify(column: &str, table_ref: &str) -> String {
    let simple = column
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'$' | b'#'));
    if simple {
        format!("{}.{}", table_ref, column)
    } else {
        column.to_string()
    }
}

/// Convert a hierarchical query for a target without `CONNECT BY`.
///
/// Returns `None` when the statement has no `CONNECT BY` or the pair needs
/// no conversion (Oracle family on both sides).
pub fn convert_hierarchical_query(
    sql: &str,
    source: Dialect,
    target: Dialect,
    ctx: &mut ConversionContext,
) -> Option<String> {
    if !source.is_oracle_family() || target.is_oracle_family() || !contains_word(sql, "CONNECT BY") {
        return None;
    }
    let statement = sql.trim().trim_end_matches(';').trim_end();
    let converted = parse(statement).and_then(|query| render(&query, target, ctx));
    match converted {
        Ok(out) => {
            ctx.rule("CONNECT BY → WITH RECURSIVE");
            ctx.warn(
                WarningKind::SyntaxDifference,
                "Hierarchical query converted from CONNECT BY to a recursive CTE",
            );
            Some(out)
        }
        Err(reason) => {
            debug!(%reason, "hierarchical query left for manual conversion");
            ctx.warn_with(
                WarningKind::ManualReviewNeeded,
                format!("CONNECT BY query could not be converted automatically: {}", reason),
                "Rewrite as WITH RECURSIVE using the template above the statement",
            );
            Some(format!("{}\n{}", manual_template(), statement))
        }
    }
}

fn render(query: &HierarchicalQuery<'_>, target: Dialect, ctx: &mut ConversionContext) -> Result<String, String> {
    if query.table.eq_ignore_ascii_case("DUAL") && !contains_word(query.connect_by, "PRIOR") {
        return render_row_generator(query, ctx);
    }

    let terms = split_and(query.connect_by);
    let mut prior = None;
    let mut extra = Vec::new();
    for term in terms {
        if contains_word(term, "PRIOR") {
            if prior.is_some() {
                return Err("more than one PRIOR condition".into());
            }
            prior = Some(prior_columns(term).ok_or_else(|| format!("unsupported PRIOR condition: {}", term))?);
        } else {
            extra.push(term);
        }
    }
    let (parent, child) = prior.ok_or_else(|| "CONNECT BY without PRIOR".to_string())?;
    if contains_word(query.select_list, "PRIOR") {
        return Err("PRIOR in the select list".into());
    }

    let t = query.table_ref();
    let outer = query.alias.unwrap_or(CTE);
    let leaf_expr = format!(
        "CASE WHEN NOT EXISTS (SELECT 1 FROM {} leaf WHERE leaf.{} = {}.{}) THEN 1 ELSE 0 END",
        query.table, child, outer, parent
    );

    let mut pseudo = PseudoColumns::default();
    let select_list = pseudo.rewrite(query.select_list, &leaf_expr);
    let where_clause = query.where_clause.map(|w| pseudo.rewrite(w, &leaf_expr));
    let group_by = query.group_by.map(|g| pseudo.rewrite(g, &leaf_expr));
    let order_by = query.order_by.map(|o| pseudo.rewrite(o, &leaf_expr));

    let mut base_cols = vec![format!("{}.*", t), "1 AS level".to_string()];
    let mut rec_cols = vec![format!("{}.*", t), format!("{}.level + 1", CTE)];
    for (i, (column, separator)) in pseudo.paths.iter().enumerate() {
        let column = qualify(column, t);
        let name = format!("path_{}", i + 1);
        if target == Dialect::MySql {
            base_cols.push(format!("CAST(CONCAT({}, {}) AS CHAR(4000)) AS {}", separator, column, name));
            rec_cols.push(format!("CONCAT({}.{}, {}, {})", CTE, name, separator, column));
        } else {
            base_cols.push(format!("CAST({} || {} AS TEXT) AS {}", separator, column, name));
            rec_cols.push(format!("{}.{} || {} || {}", CTE, name, separator, column));
        }
    }
    for column in &pseudo.roots {
        let name = format!("root_{}", unqualify(column).trim_matches('"'));
        base_cols.push(format!("{} AS {}", qualify(column, t), name));
        rec_cols.push(format!("{}.{}", CTE, name));
    }

    let mut join = format!("{}.{} = {}.{}", t, child, CTE, parent);
    for term in &extra {
        let (term, _) = replace_in_code(term, &LEVEL_RE, |_| Some(format!("({}.level + 1)", CTE)));
        if !contains_word(&term, CTE) {
            ctx.warn(
                WarningKind::PartialSupport,
                format!("CONNECT BY condition '{}' moved into the recursive join; check column qualification", term),
            );
        }
        join.push_str(" AND ");
        join.push_str(&term);
    }

    let mut out = format!("WITH RECURSIVE {} AS (\n", CTE);
    out.push_str(&format!("    SELECT {}\n    FROM {}\n", base_cols.join(", "), query.from_text()));
    match query.start_with {
        Some(cond) => out.push_str(&format!("    WHERE {}\n", cond)),
        None => ctx.warn(
            WarningKind::PerformanceWarning,
            "No START WITH clause; every row starts a hierarchy",
        ),
    }
    out.push_str("    UNION ALL\n");
    out.push_str(&format!(
        "    SELECT {}\n    FROM {}\n    JOIN {} ON {}\n)\n",
        rec_cols.join(", "),
        query.from_text(),
        CTE,
        join
    ));

    let mut final_select = format!("SELECT {} FROM {}", select_list, CTE);
    if let Some(alias) = query.alias {
        final_select.push(' ');
        final_select.push_str(alias);
    }
    if let Some(w) = where_clause {
        final_select.push_str(&format!(" WHERE {}", w));
    }
    if let Some(g) = group_by {
        final_select.push_str(&format!(" GROUP BY {}", g));
    }
    if let Some(o) = order_by {
        final_select.push_str(&format!(" ORDER BY {}", o));
    }
    if query.alias.is_none() {
        final_select = requalify(&final_select, unqualify(query.table));
    }
    out.push_str(&final_select);

    if query.nocycle {
        ctx.warn_with(
            WarningKind::PartialSupport,
            "NOCYCLE has no direct equivalent; cyclic data will recurse until the depth limit",
            "Track visited keys in a path column and stop when a key repeats",
        );
    }
    if query.order_siblings {
        ctx.warn(
            WarningKind::PartialSupport,
            "ORDER SIBLINGS BY converted to a plain ORDER BY; hierarchical order is not preserved",
        );
    }
    ctx.info(
        WarningKind::PerformanceWarning,
        format!("Index {}.{} to keep the recursive join fast", unqualify(query.table), child),
    );
    Ok(out)
}

/// Point `table.` qualifiers of the outer query at the CTE.
fn requalify(text: &str, table: &str) -> String {
    let Ok(re) = Regex::new(&format!(r"(?i)\b{}\.", regex::escape(table))) else {
        return text.to_string();
    };
    replace_in_code(text, &re, |_| Some(format!("{}.", CTE))).0
}

/// `SELECT LEVEL ... FROM DUAL CONNECT BY LEVEL <= n` as a counting CTE.
fn render_row_generator(query: &HierarchicalQuery<'_>, ctx: &mut ConversionContext) -> Result<String, String> {
    if !contains_word(query.connect_by, "LEVEL") {
        return Err("row generator without a LEVEL bound".into());
    }
    let (bound, _) = replace_in_code(query.connect_by, &LEVEL_RE, |_| Some("level + 1".to_string()));
    let (select_list, _) = replace_in_code(query.select_list, &LEVEL_RE, |_| Some("level".to_string()));
    let mut out = format!(
        "WITH RECURSIVE {cte} (level) AS (\n    SELECT 1\n    UNION ALL\n    SELECT level + 1 FROM {cte} WHERE {bound}\n)\nSELECT {select} FROM {cte}",
        cte = CTE,
        bound = bound,
        select = select_list
    );
    if let Some(w) = query.where_clause {
        out.push_str(&format!(" WHERE {}", replace_in_code(w, &LEVEL_RE, |_| Some("level".into())).0));
    }
    if let Some(o) = query.order_by {
        out.push_str(&format!(" ORDER BY {}", replace_in_code(o, &LEVEL_RE, |_| Some("level".into())).0));
    }
    ctx.info(
        WarningKind::PerformanceWarning,
        "Recursive row generators are bounded by the server's recursion depth limit",
    );
    Ok(out)
}

fn manual_template() -> String {
    [
        "-- MANUAL CONVERSION REQUIRED: hierarchical query",
        "-- WITH RECURSIVE hierarchy AS (",
        "--     SELECT t.*, 1 AS level FROM <table> t WHERE <start condition>",
        "--     UNION ALL",
        "--     SELECT t.*, h.level + 1 FROM <table> t JOIN hierarchy h ON t.<child column> = h.<parent column>",
        "-- )",
        "-- SELECT ... FROM hierarchy",
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn convert(sql: &str, target: Dialect) -> (String, ConversionContext) {
        let mut ctx = ConversionContext::default();
        let out = convert_hierarchical_query(sql, Dialect::Oracle, target, &mut ctx).unwrap();
        (out, ctx)
    }

    #[test]
    fn test_employee_hierarchy() {
        let (out, ctx) = convert(
            "SELECT id, name FROM employees START WITH manager_id IS NULL CONNECT BY PRIOR id = manager_id",
            Dialect::PostgreSql,
        );
        assert_eq!(
            out,
            "WITH RECURSIVE hierarchy AS (\n    SELECT employees.*, 1 AS level\n    FROM employees\n    WHERE manager_id IS NULL\n    UNION ALL\n    SELECT employees.*, hierarchy.level + 1\n    FROM employees\n    JOIN hierarchy ON employees.manager_id = hierarchy.id\n)\nSELECT id, name FROM hierarchy"
        );
        assert!(ctx.warnings.iter().any(|w| w.kind == WarningKind::SyntaxDifference));
        assert_eq!(ctx.applied_rules, vec!["CONNECT BY → WITH RECURSIVE".to_string()]);
    }

    #[test]
    fn test_clause_order_and_prior_side() {
        let (out, _) = convert(
            "SELECT id FROM employees CONNECT BY manager_id = PRIOR id START WITH manager_id IS NULL",
            Dialect::MySql,
        );
        assert!(out.contains("WHERE manager_id IS NULL\n"));
        assert!(out.contains("ON employees.manager_id = hierarchy.id"));
    }

    #[test]
    fn test_pseudo_columns() {
        let (out, _) = convert(
            "SELECT e.id, LEVEL, SYS_CONNECT_BY_PATH(e.name, '/') AS path, CONNECT_BY_ROOT e.name AS top, CONNECT_BY_ISLEAF \
             FROM employees e START WITH e.manager_id IS NULL CONNECT BY PRIOR e.id = e.manager_id ORDER BY LEVEL",
            Dialect::PostgreSql,
        );
        assert!(out.contains("CAST('/' || e.name AS TEXT) AS path_1"));
        assert!(out.contains("hierarchy.path_1 || '/' || e.name"));
        assert!(out.contains("e.name AS root_name"));
        assert!(out.contains(
            "SELECT e.id, level, path_1 AS path, root_name AS top, CASE WHEN NOT EXISTS (SELECT 1 FROM employees leaf WHERE leaf.manager_id = e.id) THEN 1 ELSE 0 END FROM hierarchy e ORDER BY level"
        ));
    }

    #[test]
    fn test_mysql_path_is_widened() {
        let (out, _) = convert(
            "SELECT SYS_CONNECT_BY_PATH(name, '>') FROM cat START WITH parent IS NULL CONNECT BY PRIOR id = parent",
            Dialect::MySql,
        );
        assert!(out.contains("CAST(CONCAT('>', cat.name) AS CHAR(4000)) AS path_1"));
        assert!(out.contains("CONCAT(hierarchy.path_1, '>', cat.name)"));
    }

    #[test]
    fn test_row_generator() {
        let (out, _) = convert("SELECT LEVEL AS n FROM dual CONNECT BY LEVEL <= 10", Dialect::PostgreSql);
        assert_eq!(
            out,
            "WITH RECURSIVE hierarchy (level) AS (\n    SELECT 1\n    UNION ALL\n    SELECT level + 1 FROM hierarchy WHERE level + 1 <= 10\n)\nSELECT level AS n FROM hierarchy"
        );
    }

    #[test]
    fn test_nocycle_and_siblings_warn() {
        let (out, ctx) = convert(
            "SELECT id FROM t START WITH pid IS NULL CONNECT BY NOCYCLE PRIOR id = pid ORDER SIBLINGS BY id",
            Dialect::PostgreSql,
        );
        assert!(out.ends_with("ORDER BY id"));
        let partial = ctx.warnings.iter().filter(|w| w.kind == WarningKind::PartialSupport).count();
        assert_eq!(partial, 2);
    }

    #[test]
    fn test_level_bound_in_connect_by() {
        let (out, _) = convert(
            "SELECT id FROM t START WITH pid IS NULL CONNECT BY PRIOR id = pid AND LEVEL <= 3",
            Dialect::PostgreSql,
        );
        assert!(out.contains("ON t.pid = hierarchy.id AND (hierarchy.level + 1) <= 3"));
    }

    #[test]
    fn test_join_falls_back_to_template() {
        let sql = "SELECT e.id FROM employees e, depts d START WITH e.mgr IS NULL CONNECT BY PRIOR e.id = e.mgr";
        let (out, ctx) = convert(sql, Dialect::PostgreSql);
        assert!(out.starts_with("-- MANUAL CONVERSION REQUIRED"));
        assert!(out.ends_with(sql));
        assert_eq!(ctx.warnings[0].kind, WarningKind::ManualReviewNeeded);
    }

    #[test]
    fn test_not_applicable() {
        let mut ctx = ConversionContext::default();
        let sql = "SELECT id FROM t START WITH pid IS NULL CONNECT BY PRIOR id = pid";
        assert!(convert_hierarchical_query(sql, Dialect::Oracle, Dialect::Tibero, &mut ctx).is_none());
        assert!(convert_hierarchical_query("SELECT 1 FROM t", Dialect::Oracle, Dialect::MySql, &mut ctx).is_none());
    }
}
