//! Upsert normalization: `MERGE INTO` ⇄ `INSERT ... ON CONFLICT` ⇄
//! `INSERT ... ON DUPLICATE KEY UPDATE`.
//!
//! `MERGE` is parsed into a [`MergeParseResult`] and rendered for the
//! target. Upserts written for PostgreSQL or MySQL are parsed into an
//! [`UpsertStatement`]; between those two the translation is mechanical,
//! and toward Oracle only the single-row, single-key case becomes a `MERGE`.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::dialect::Dialect;
use crate::result::{ConversionContext, WarningKind};
use crate::scan::{
    find_keyword, find_keyword_with, find_matching_bracket, replace_in_code, split_function_args,
    split_top_level, strip_leading_comments, unqualify, SqlMask,
};

static EXCLUDED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\bEXCLUDED\s*\.\s*("?[\w$#]+"?)"#).expect("valid excluded pattern"));

static VALUES_FN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\bVALUES\s*\(\s*([\w$#"`]+)\s*\)"#).expect("valid values pattern"));

/// A parsed `MERGE` statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeParseResult {
    pub target_table: String,
    pub target_alias: Option<String>,
    /// Table name, `DUAL`, or the parenthesized subquery as written.
    pub source_expression: String,
    pub source_alias: Option<String>,
    pub on_condition: String,
    /// `(column, expression)` pairs of `WHEN MATCHED THEN UPDATE SET`.
    pub update_set: Option<Vec<(String, String)>>,
    /// `WHEN MATCHED AND c` and `UPDATE ... WHERE c`, combined.
    pub update_where: Option<String>,
    pub insert_columns: Option<Vec<String>>,
    pub insert_values: Option<Vec<String>>,
    pub insert_where: Option<String>,
    pub using_dual: bool,
    pub source_select: Option<String>,
    pub has_delete: bool,
    pub delete_condition: Option<String>,
}

impl MergeParseResult {
    fn target_ref(&self) -> &str {
        self.target_alias.as_deref().unwrap_or_else(|| unqualify(&self.target_table))
    }

    fn source_ref(&self) -> Option<&str> {
        if self.using_dual {
            return None;
        }
        match (&self.source_alias, &self.source_select) {
            (Some(alias), _) => Some(alias),
            (None, None) => Some(unqualify(&self.source_expression)),
            (None, Some(_)) => None,
        }
    }

    /// Source as it appears after `FROM`/`JOIN`.
    fn source_from(&self) -> String {
        match &self.source_alias {
            Some(alias) => format!("{} {}", self.source_expression, alias),
            None => self.source_expression.clone(),
        }
    }

    fn target_from(&self) -> String {
        match &self.target_alias {
            Some(alias) => format!("{} {}", self.target_table, alias),
            None => self.target_table.clone(),
        }
    }
}

fn is_identifier(text: &str) -> bool {
    !text.is_empty()
        && text
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'$' | b'#' | b'"' | b'`'))
}

fn unquote(text: &str) -> &str {
    text.trim_matches(|c| c == '"' || c == '`')
}

/// `name`, `name alias` or `name AS alias`.
fn split_name_alias(text: &str) -> Result<(String, Option<String>), String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    match words.as_slice() {
        [name] => Ok((name.to_string(), None)),
        [name, alias] => Ok((name.to_string(), Some(alias.to_string()))),
        [name, kw, alias] if kw.eq_ignore_ascii_case("AS") => Ok((name.to_string(), Some(alias.to_string()))),
        _ => Err(format!("cannot read table reference '{}'", text.trim())),
    }
}

/// Split `lhs = rhs` on the first top-level `=` that is not part of
/// `<=`, `>=`, `!=` or `:=`.
fn split_equality(term: &str) -> Option<(&str, &str)> {
    let bytes = term.as_bytes();
    let mask = SqlMask::new(term);
    let at = (0..bytes.len()).find(|&i| {
        bytes[i] == b'='
            && mask.depth(i) == Some(0)
            && (i == 0 || !matches!(bytes[i - 1], b'<' | b'>' | b'!' | b':'))
            && bytes.get(i + 1) != Some(&b'=')
    })?;
    Some((term[..at].trim(), term[at + 1..].trim()))
}

fn parse_assignments(text: &str) -> Result<Vec<(String, String)>, String> {
    split_top_level(text, b',')
        .into_iter()
        .map(|item| {
            split_equality(&item)
                .map(|(col, expr)| (col.to_string(), expr.to_string()))
                .ok_or_else(|| format!("cannot read assignment '{}'", item))
        })
        .collect()
}

/// Split on top-level `AND`.
fn conjuncts(text: &str) -> Vec<&str> {
    let mask = SqlMask::new(text);
    let mut parts = Vec::new();
    let mut last = 0;
    while let Some((start, end)) = find_keyword_with(&mask, text, "AND", last) {
        parts.push(text[last..start].trim());
        last = end;
    }
    parts.push(text[last..].trim());
    parts
}

/// The column of `qualifier.column`, when `side` is exactly that.
fn column_of(side: &str, qualifier: &str) -> Option<String> {
    let (q, column) = side.split_once('.')?;
    (q.trim().eq_ignore_ascii_case(qualifier) && is_identifier(column.trim())).then(|| column.trim().to_string())
}

/// Parenthesized text starting at `text[0]`: `(inner, rest)`.
fn parenthesized(text: &str) -> Option<(&str, &str)> {
    if !text.starts_with('(') {
        return None;
    }
    let end = find_matching_bracket(text, 1)?;
    Some((&text[1..end - 1], &text[end..]))
}

/// Parse `MERGE INTO ... USING ... ON (...) WHEN ...`.
pub fn parse_merge(sql: &str) -> Result<MergeParseResult, String> {
    let sql = strip_leading_comments(sql).trim().trim_end_matches(';').trim_end();
    let mask = SqlMask::new(sql);
    match find_keyword_with(&mask, sql, "MERGE", 0) {
        Some((0, _)) => {}
        _ => return Err("not a MERGE statement".into()),
    }
    let (_, into_end) = find_keyword_with(&mask, sql, "INTO", 0).ok_or("MERGE without INTO")?;
    let (using_start, using_end) = find_keyword_with(&mask, sql, "USING", into_end).ok_or("MERGE without USING")?;
    let (on_start, on_end) = find_keyword_with(&mask, sql, "ON", using_end).ok_or("MERGE without ON")?;

    let mut merge = MergeParseResult::default();
    let (table, alias) = split_name_alias(&sql[into_end..using_start])?;
    merge.target_table = table;
    merge.target_alias = alias;

    let source = sql[using_end..on_start].trim();
    if let Some((inner, rest)) = parenthesized(source) {
        let rest = rest.trim();
        let alias = rest
            .strip_prefix("AS ")
            .or_else(|| rest.strip_prefix("as "))
            .unwrap_or(rest)
            .trim();
        merge.source_expression = format!("({})", inner.trim());
        merge.source_select = Some(inner.trim().to_string());
        merge.source_alias = (!alias.is_empty()).then(|| alias.to_string());
        merge.using_dual = false;
    } else {
        let (name, alias) = split_name_alias(source)?;
        merge.using_dual = name.eq_ignore_ascii_case("DUAL");
        merge.source_expression = name;
        merge.source_alias = alias;
    }

    let mut when: Vec<(bool, usize, usize)> = Vec::new();
    for (matched, keyword) in [(true, "WHEN MATCHED"), (false, "WHEN NOT MATCHED")] {
        let mut from = on_end;
        while let Some((start, end)) = find_keyword_with(&mask, sql, keyword, from) {
            when.push((matched, start, end));
            from = end;
        }
    }
    when.sort_by_key(|(_, start, _)| *start);
    let first_when = when.first().map(|(_, start, _)| *start).ok_or("MERGE without WHEN clauses")?;

    let on_text = sql[on_end..first_when].trim();
    merge.on_condition = match parenthesized(on_text) {
        Some((inner, rest)) if rest.trim().is_empty() => inner.trim().to_string(),
        _ => on_text.to_string(),
    };

    for (i, (matched, _, end)) in when.iter().enumerate() {
        let stop = when.get(i + 1).map(|(_, start, _)| *start).unwrap_or(sql.len());
        let body = sql[*end..stop].trim();
        let (then_start, then_end) = find_keyword(body, "THEN", 0).ok_or("WHEN clause without THEN")?;
        let guard = body[..then_start].trim();
        let guard = match find_keyword(guard, "AND", 0) {
            Some((0, and_end)) => Some(guard[and_end..].trim().to_string()),
            _ if guard.is_empty() => None,
            _ => return Err(format!("unexpected text before THEN: {}", guard)),
        };
        let action = body[then_end..].trim();
        if *matched {
            parse_matched(action, guard, &mut merge)?;
        } else {
            parse_not_matched(action, guard, &mut merge)?;
        }
    }
    Ok(merge)
}

fn and_join(a: Option<String>, b: Option<String>) -> Option<String> {
    match (a, b) {
        (Some(a), Some(b)) => Some(format!("({}) AND ({})", a, b)),
        (a, b) => a.or(b),
    }
}

fn parse_matched(action: &str, guard: Option<String>, merge: &mut MergeParseResult) -> Result<(), String> {
    if let Some((0, _)) = find_keyword(action, "DELETE", 0) {
        merge.has_delete = true;
        merge.delete_condition = guard;
        return Ok(());
    }
    let (_, set_end) = match find_keyword(action, "UPDATE SET", 0) {
        Some((0, end)) => (0, end),
        _ => return Err(format!("unsupported WHEN MATCHED action: {}", action)),
    };
    let rest = &action[set_end..];
    let delete = find_keyword(rest, "DELETE WHERE", 0);
    let before_delete = delete.map(|(start, _)| start).unwrap_or(rest.len());
    let where_kw = find_keyword(&rest[..before_delete], "WHERE", 0);
    let set_stop = where_kw.map(|(start, _)| start).unwrap_or(before_delete);

    merge.update_set = Some(parse_assignments(&rest[..set_stop])?);
    let update_where = where_kw.map(|(_, end)| rest[end..before_delete].trim().to_string());
    merge.update_where = and_join(guard, update_where);
    if let Some((_, end)) = delete {
        merge.has_delete = true;
        merge.delete_condition = Some(rest[end..].trim().to_string());
    }
    Ok(())
}

fn parse_not_matched(action: &str, guard: Option<String>, merge: &mut MergeParseResult) -> Result<(), String> {
    let (_, insert_end) = match find_keyword(action, "INSERT", 0) {
        Some((0, end)) => (0, end),
        _ => return Err(format!("unsupported WHEN NOT MATCHED action: {}", action)),
    };
    let mut rest = action[insert_end..].trim_start();
    if let Some((inner, after)) = parenthesized(rest) {
        merge.insert_columns = Some(split_function_args(inner));
        rest = after.trim_start();
    }
    let (_, values_end) = match find_keyword(rest, "VALUES", 0) {
        Some((0, end)) => (0, end),
        _ => return Err("WHEN NOT MATCHED INSERT without VALUES".into()),
    };
    let (inner, after) = parenthesized(rest[values_end..].trim_start()).ok_or("malformed VALUES list")?;
    merge.insert_values = Some(split_function_args(inner));
    let after = after.trim();
    let insert_where = match find_keyword(after, "WHERE", 0) {
        Some((0, end)) => Some(after[end..].trim().to_string()),
        _ if after.is_empty() => None,
        _ => return Err(format!("unexpected text after VALUES: {}", after)),
    };
    merge.insert_where = and_join(guard, insert_where);
    Ok(())
}

/// Infer the conflict columns from `ON` equalities between target and
/// source; fall back to a name heuristic over the inserted columns.
fn infer_conflict_columns(merge: &MergeParseResult, ctx: &mut ConversionContext) -> Option<Vec<String>> {
    let target_ref = merge.target_ref();
    let source_ref = merge.source_ref();
    let mut keys = Vec::new();
    for term in conjuncts(&merge.on_condition) {
        let term = term.trim_start_matches('(').trim_end_matches(')');
        let Some((lhs, rhs)) = split_equality(term) else {
            keys.clear();
            break;
        };
        let target_side = |side: &str| {
            column_of(side, target_ref).or_else(|| (merge.using_dual && is_identifier(side)).then(|| side.to_string()))
        };
        let source_side = |side: &str| match source_ref {
            Some(r) => column_of(side, r).is_some(),
            None => column_of(side, target_ref).is_none(),
        };
        let key = match (target_side(lhs), target_side(rhs)) {
            (Some(col), _) if source_side(rhs) => Some(col),
            (_, Some(col)) if source_side(lhs) => Some(col),
            _ => None,
        };
        match key {
            Some(col) => keys.push(col),
            None => {
                keys.clear();
                break;
            }
        }
    }
    if !keys.is_empty() {
        return Some(keys);
    }
    let guessed = merge.insert_columns.as_deref().and_then(guess_key)?;
    ctx.warn_with(
        WarningKind::PartialSupport,
        format!("Conflict column '{}' guessed from its name", guessed),
        "Confirm the column carries a PRIMARY KEY or UNIQUE constraint",
    );
    Some(vec![guessed])
}

fn guess_key(columns: &[String]) -> Option<String> {
    columns
        .iter()
        .find(|c| {
            let name = unquote(unqualify(c)).to_ascii_lowercase();
            name == "id" || name.ends_with("_id") || matches!(name.as_str(), "code" | "key" | "uuid")
        })
        .map(|c| unqualify(c).to_string())
}

/// Rewrite `qualifier.column` references in `text`.
fn rewrite_qualified<F>(text: &str, qualifier: &str, mut build: F) -> String
where
    F: FnMut(&str) -> String,
{
    let Ok(re) = Regex::new(&format!(r#"(?i)\b{}\s*\.\s*("?[\w$#]+"?)"#, regex::escape(qualifier))) else {
        return text.to_string();
    };
    replace_in_code(text, &re, |caps| Some(build(caps.get(1)?.as_str()))).0
}

/// Maps a source column reference to the inserted target column it feeds.
fn source_to_target(merge: &MergeParseResult) -> Vec<(String, String)> {
    let (Some(columns), Some(values), Some(source_ref)) =
        (&merge.insert_columns, &merge.insert_values, merge.source_ref())
    else {
        return Vec::new();
    };
    columns
        .iter()
        .zip(values)
        .filter_map(|(col, val)| column_of(val, source_ref).map(|src| (src.to_ascii_lowercase(), unqualify(col).to_string())))
        .collect()
}

/// Convert a `MERGE` for a target that has none (PostgreSQL, MySQL).
///
/// Returns `None` when the statement is not a `MERGE` or the target is in
/// the Oracle family.
pub fn convert_merge(sql: &str, source: Dialect, target: Dialect, ctx: &mut ConversionContext) -> Option<String> {
    if target.is_oracle_family() || source.family() == target.family() {
        return None;
    }
    let trimmed = strip_leading_comments(sql);
    if !matches!(find_keyword(trimmed, "MERGE", 0), Some((0, _))) {
        return None;
    }
    let merge = match parse_merge(sql) {
        Ok(merge) => merge,
        Err(reason) => {
            debug!(%reason, "MERGE left for manual conversion");
            ctx.warn_with(
                WarningKind::ManualReviewNeeded,
                format!("MERGE could not be converted automatically: {}", reason),
                "Split into UPDATE and INSERT statements",
            );
            return Some(format!(
                "-- MANUAL CONVERSION REQUIRED: MERGE\n{}",
                sql.trim().trim_end_matches(';')
            ));
        }
    };
    debug!(?merge, %target, "converting MERGE");

    if merge.has_delete {
        let condition = merge.delete_condition.as_deref().unwrap_or("<matched rows>");
        ctx.warn_with(
            WarningKind::PartialSupport,
            "WHEN MATCHED ... DELETE has no upsert equivalent and was not converted",
            format!(
                "Run a separate DELETE FROM {} WHERE {} after the upsert",
                merge.target_table, condition
            ),
        );
    }

    let out = match (merge.update_set.is_some(), merge.insert_values.is_some(), target) {
        (true, true, Dialect::MySql) | (false, true, Dialect::MySql) => render_mysql_upsert(&merge, ctx),
        (true, true, _) | (false, true, _) => render_postgres_upsert(&merge, ctx),
        (true, false, Dialect::MySql) => render_mysql_update(&merge, ctx),
        (true, false, _) => render_postgres_update(&merge, ctx),
        (false, false, _) => {
            ctx.warn(
                WarningKind::ManualReviewNeeded,
                "MERGE has neither an UPDATE nor an INSERT branch",
            );
            format!("-- MANUAL CONVERSION REQUIRED: MERGE\n{}", sql.trim().trim_end_matches(';'))
        }
    };
    Some(out)
}

/// `INSERT` head plus the rows clause shared by both upsert renderings.
fn insert_head(merge: &MergeParseResult, keyword: &str, alias: Option<&str>, ctx: &mut ConversionContext) -> String {
    let values = merge.insert_values.clone().unwrap_or_default().join(", ");
    let mut out = format!("{} {}", keyword, merge.target_table);
    if let Some(alias) = alias {
        out.push_str(&format!(" AS {}", alias));
    }
    if let Some(columns) = &merge.insert_columns {
        let columns: Vec<&str> = columns.iter().map(|c| unqualify(c)).collect();
        out.push_str(&format!(" ({})", columns.join(", ")));
    }
    if merge.using_dual {
        out.push_str(&format!(" VALUES ({})", values));
        if let Some(w) = &merge.insert_where {
            ctx.warn(
                WarningKind::PartialSupport,
                format!("Insert condition '{}' dropped for a single-row upsert", w),
            );
        }
    } else {
        out.push_str(&format!(" SELECT {} FROM {}", values, merge.source_from()));
        if let Some(w) = &merge.insert_where {
            out.push_str(&format!(" WHERE {}", w));
        }
    }
    out
}

fn render_postgres_upsert(merge: &MergeParseResult, ctx: &mut ConversionContext) -> String {
    let keys = infer_conflict_columns(merge, ctx);
    let mut out = insert_head(merge, "INSERT INTO", merge.target_alias.as_deref(), ctx);
    let conflict = match &keys {
        Some(keys) => format!(" ON CONFLICT ({})", keys.join(", ")),
        None if merge.update_set.is_none() => " ON CONFLICT".to_string(),
        None => {
            ctx.warn_with(
                WarningKind::ManualReviewNeeded,
                format!("Cannot infer the conflict column from ON ({})", merge.on_condition),
                "Name the unique column(s) in ON CONFLICT",
            );
            " ON CONFLICT (/* conflict column */)".to_string()
        }
    };
    out.push_str(&conflict);

    let Some(set) = &merge.update_set else {
        ctx.rule("MERGE → INSERT ... ON CONFLICT DO NOTHING");
        out.push_str(" DO NOTHING");
        return out;
    };
    let mapping = source_to_target(merge);
    let excluded = |text: &str| match merge.source_ref() {
        Some(source_ref) => rewrite_qualified(text, source_ref, |col| {
            let target_col = mapping
                .iter()
                .find(|(src, _)| *src == col.to_ascii_lowercase())
                .map(|(_, t)| t.clone())
                .unwrap_or_else(|| col.to_string());
            format!("EXCLUDED.{}", target_col)
        }),
        None => text.to_string(),
    };
    let assignments: Vec<String> = set
        .iter()
        .map(|(col, expr)| format!("{} = {}", unqualify(col), excluded(expr)))
        .collect();
    out.push_str(&format!(" DO UPDATE SET {}", assignments.join(", ")));
    if let Some(w) = &merge.update_where {
        out.push_str(&format!(" WHERE {}", excluded(w)));
    }
    ctx.rule("MERGE → INSERT ... ON CONFLICT DO UPDATE");
    out
}

fn render_mysql_upsert(merge: &MergeParseResult, ctx: &mut ConversionContext) -> String {
    let keys = infer_conflict_columns(merge, ctx);
    let Some(set) = &merge.update_set else {
        ctx.rule("MERGE → INSERT IGNORE");
        ctx.info(
            WarningKind::PartialSupport,
            "INSERT IGNORE also suppresses errors other than duplicate keys",
        );
        return insert_head(merge, "INSERT IGNORE INTO", None, ctx);
    };
    let mut out = insert_head(merge, "INSERT INTO", None, ctx);

    let mapping = source_to_target(merge);
    let target_ref = merge.target_ref().to_string();
    let rewrite = |text: &str| {
        let text = match merge.source_ref() {
            Some(source_ref) => rewrite_qualified(text, source_ref, |col| {
                let target_col = mapping
                    .iter()
                    .find(|(src, _)| *src == col.to_ascii_lowercase())
                    .map(|(_, t)| t.clone())
                    .unwrap_or_else(|| col.to_string());
                format!("VALUES({})", target_col)
            }),
            None => text.to_string(),
        };
        rewrite_qualified(&text, &target_ref, |col| col.to_string())
    };
    let condition = merge.update_where.as_deref().map(|w| rewrite(w));
    if condition.is_some() {
        ctx.warn(
            WarningKind::PartialSupport,
            "Update condition folded into each assignment with IF()",
        );
    }
    let assignments: Vec<String> = set
        .iter()
        .map(|(col, expr)| {
            let col = unqualify(col);
            match &condition {
                Some(cond) => format!("{col} = IF({cond}, {}, {col})", rewrite(expr)),
                None => format!("{} = {}", col, rewrite(expr)),
            }
        })
        .collect();
    out.push_str(&format!(" ON DUPLICATE KEY UPDATE {}", assignments.join(", ")));

    match keys {
        Some(keys) => ctx.info(
            WarningKind::SyntaxDifference,
            format!("ON DUPLICATE KEY UPDATE relies on a unique index over ({})", keys.join(", ")),
        ),
        None => {
            ctx.warn_with(
                WarningKind::ManualReviewNeeded,
                format!("Cannot infer a unique key from ON ({})", merge.on_condition),
                "Make sure a PRIMARY KEY or UNIQUE index matches the ON condition",
            );
            out = format!("-- requires a unique key matching: {}\n{}", merge.on_condition, out);
        }
    }
    ctx.rule("MERGE → INSERT ... ON DUPLICATE KEY UPDATE");
    out
}

fn render_postgres_update(merge: &MergeParseResult, ctx: &mut ConversionContext) -> String {
    let set = merge.update_set.clone().unwrap_or_default();
    let assignments: Vec<String> = set
        .iter()
        .map(|(col, expr)| format!("{} = {}", unqualify(col), expr))
        .collect();
    let mut out = format!("UPDATE {} SET {}", merge.target_from(), assignments.join(", "));
    if !merge.using_dual {
        out.push_str(&format!(" FROM {}", merge.source_from()));
    }
    out.push_str(&format!(" WHERE {}", merge.on_condition));
    if let Some(w) = &merge.update_where {
        out.push_str(&format!(" AND ({})", w));
    }
    ctx.rule("MERGE → UPDATE ... FROM");
    out
}

fn render_mysql_update(merge: &MergeParseResult, ctx: &mut ConversionContext) -> String {
    let target_ref = merge.target_ref();
    let set = merge.update_set.clone().unwrap_or_default();
    let assignments: Vec<String> = set
        .iter()
        .map(|(col, expr)| format!("{}.{} = {}", target_ref, unqualify(col), expr))
        .collect();
    let mut out = format!("UPDATE {}", merge.target_from());
    if merge.using_dual {
        out.push_str(&format!(" SET {} WHERE {}", assignments.join(", "), merge.on_condition));
    } else {
        out.push_str(&format!(
            " JOIN {} ON {} SET {}",
            merge.source_from(),
            merge.on_condition,
            assignments.join(", ")
        ));
        if merge.update_where.is_some() {
            out.push_str(" WHERE ");
        }
    }
    if let Some(w) = &merge.update_where {
        if merge.using_dual {
            out.push_str(&format!(" AND ({})", w));
        } else {
            out.push_str(w);
        }
    }
    ctx.rule("MERGE → UPDATE ... JOIN");
    out
}

/// What happens on a key conflict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertAction {
    /// Plain `INSERT IGNORE`.
    Ignore,
    /// `ON CONFLICT ... DO NOTHING`.
    Nothing,
    /// `DO UPDATE SET` / `ON DUPLICATE KEY UPDATE`.
    Update {
        assignments: Vec<(String, String)>,
        condition: Option<String>,
    },
}

/// An `INSERT` carrying conflict handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertStatement {
    pub table: String,
    pub alias: Option<String>,
    pub columns: Vec<String>,
    /// `VALUES (...)` or `SELECT ...`, as written.
    pub rows: String,
    /// `ON CONFLICT (a, b)` columns; empty for MySQL.
    pub conflict_columns: Vec<String>,
    pub action: UpsertAction,
    pub returning: Option<String>,
}

impl UpsertStatement {
    /// The single `VALUES` row, when that is all the statement inserts.
    fn single_row(&self) -> Option<Vec<String>> {
        let rows = self.rows.trim();
        let (_, end) = find_keyword(rows, "VALUES", 0).filter(|(s, _)| *s == 0)?;
        let (inner, rest) = parenthesized(rows[end..].trim_start())?;
        rest.trim().is_empty().then(|| split_function_args(inner))
    }
}

/// Parse an upsert; `None` for a plain `INSERT` or anything else.
pub fn parse_upsert(sql: &str) -> Option<UpsertStatement> {
    let sql = strip_leading_comments(sql).trim().trim_end_matches(';').trim_end();
    let mask = SqlMask::new(sql);
    let (_, mut pos) = find_keyword_with(&mask, sql, "INSERT", 0).filter(|(s, _)| *s == 0)?;
    let ignore = match find_keyword_with(&mask, sql, "IGNORE", pos) {
        Some((start, end)) if sql[pos..start].trim().is_empty() => {
            pos = end;
            true
        }
        _ => false,
    };
    let (into_start, into_end) = find_keyword_with(&mask, sql, "INTO", pos)?;
    if !sql[pos..into_start].trim().is_empty() {
        return None;
    }

    let rest = sql[into_end..].trim_start();
    let name_len = rest
        .find(|c: char| c.is_whitespace() || c == '(')
        .unwrap_or(rest.len());
    let table = rest[..name_len].to_string();
    let mut rest = rest[name_len..].trim_start();

    let mut alias = None;
    if let Some((0, as_end)) = find_keyword(rest, "AS", 0) {
        let after = rest[as_end..].trim_start();
        let len = after.find(|c: char| c.is_whitespace() || c == '(').unwrap_or(after.len());
        alias = Some(after[..len].to_string());
        rest = after[len..].trim_start();
    }

    let mut columns = Vec::new();
    if let Some((inner, after)) = parenthesized(rest) {
        if !matches!(find_keyword(inner.trim_start(), "SELECT", 0), Some((0, _))) {
            columns = split_function_args(inner);
            rest = after.trim_start();
        }
    }

    let conflict = find_keyword(rest, "ON CONFLICT", 0);
    let duplicate = find_keyword(rest, "ON DUPLICATE KEY UPDATE", 0);
    let (rows_end, action, conflict_columns, returning) = match (conflict, duplicate) {
        (Some((start, end)), _) => {
            let (tail, returning) = split_returning(&rest[end..]);
            let mut tail = tail.trim_start();
            let mut conflict_columns = Vec::new();
            if let Some((inner, after)) = parenthesized(tail) {
                conflict_columns = split_function_args(inner);
                tail = after.trim_start();
            }
            if let Some((0, _)) = find_keyword(tail, "ON CONSTRAINT", 0) {
                return None;
            }
            let action = if let Some((0, _)) = find_keyword(tail, "DO NOTHING", 0) {
                UpsertAction::Nothing
            } else {
                let (_, set_end) = find_keyword(tail, "DO UPDATE SET", 0).filter(|(s, _)| *s == 0)?;
                let body = &tail[set_end..];
                let (set_text, condition) = match find_keyword(body, "WHERE", 0) {
                    Some((s, e)) => (&body[..s], Some(body[e..].trim().to_string())),
                    None => (body, None),
                };
                UpsertAction::Update {
                    assignments: parse_assignments(set_text).ok()?,
                    condition,
                }
            };
            (start, action, conflict_columns, returning)
        }
        (None, Some((start, end))) => {
            let assignments = parse_assignments(&rest[end..]).ok()?;
            (
                start,
                UpsertAction::Update {
                    assignments,
                    condition: None,
                },
                Vec::new(),
                None,
            )
        }
        (None, None) if ignore => (rest.len(), UpsertAction::Ignore, Vec::new(), None),
        (None, None) => return None,
    };

    Some(UpsertStatement {
        table,
        alias,
        columns,
        rows: rest[..rows_end].trim().to_string(),
        conflict_columns,
        action,
        returning,
    })
}

fn split_returning(text: &str) -> (&str, Option<String>) {
    match find_keyword(text, "RETURNING", 0) {
        Some((start, end)) => (&text[..start], Some(text[end..].trim().to_string())),
        None => (text, None),
    }
}

/// Convert `INSERT ... ON CONFLICT`, `ON DUPLICATE KEY UPDATE` and
/// `INSERT IGNORE` for another dialect.
///
/// Returns `None` for plain inserts and same-family pairs.
pub fn convert_upsert(sql: &str, source: Dialect, target: Dialect, ctx: &mut ConversionContext) -> Option<String> {
    if source.family() == target.family() || source.is_oracle_family() {
        return None;
    }
    let upsert = parse_upsert(sql)?;
    debug!(?upsert, %target, "converting upsert");
    let out = match target.family() {
        Dialect::PostgreSql => upsert_to_postgres(&upsert, ctx),
        Dialect::MySql => upsert_to_mysql(&upsert, ctx),
        _ => upsert_to_merge(&upsert, sql, ctx),
    };
    Some(out)
}

fn columns_clause(upsert: &UpsertStatement) -> String {
    if upsert.columns.is_empty() {
        String::new()
    } else {
        format!(" ({})", upsert.columns.join(", "))
    }
}

fn upsert_to_postgres(upsert: &UpsertStatement, ctx: &mut ConversionContext) -> String {
    let mut out = format!("INSERT INTO {}{} {}", upsert.table, columns_clause(upsert), upsert.rows);
    match &upsert.action {
        UpsertAction::Ignore | UpsertAction::Nothing => {
            ctx.rule("INSERT IGNORE → ON CONFLICT DO NOTHING");
            out.push_str(" ON CONFLICT DO NOTHING");
        }
        UpsertAction::Update { assignments, .. } => {
            let key = guess_key(&upsert.columns);
            match &key {
                Some(key) => {
                    ctx.warn_with(
                        WarningKind::PartialSupport,
                        format!("Conflict column '{}' guessed from its name", key),
                        "Confirm the column carries a PRIMARY KEY or UNIQUE constraint",
                    );
                    out.push_str(&format!(" ON CONFLICT ({})", key));
                }
                None => {
                    ctx.warn_with(
                        WarningKind::ManualReviewNeeded,
                        "Cannot infer the conflict column for ON DUPLICATE KEY UPDATE",
                        "Name the unique column(s) in ON CONFLICT",
                    );
                    out.push_str(" ON CONFLICT (/* conflict column */)");
                }
            }
            let set: Vec<String> = assignments
                .iter()
                .map(|(col, expr)| {
                    let (expr, _) = replace_in_code(expr, &VALUES_FN_RE, |caps| {
                        Some(format!("EXCLUDED.{}", caps.get(1)?.as_str().trim_matches('`')))
                    });
                    format!("{} = {}", col.trim_matches('`'), expr)
                })
                .collect();
            out.push_str(&format!(" DO UPDATE SET {}", set.join(", ")));
            ctx.rule("ON DUPLICATE KEY UPDATE → ON CONFLICT DO UPDATE");
        }
    }
    out
}

fn upsert_to_mysql(upsert: &UpsertStatement, ctx: &mut ConversionContext) -> String {
    if upsert.returning.is_some() {
        ctx.warn(WarningKind::UnsupportedFunction, "RETURNING is not supported by MySQL and was dropped");
    }
    match &upsert.action {
        UpsertAction::Ignore | UpsertAction::Nothing => {
            ctx.rule("ON CONFLICT DO NOTHING → INSERT IGNORE");
            ctx.info(
                WarningKind::PartialSupport,
                "INSERT IGNORE also suppresses errors other than duplicate keys",
            );
            format!("INSERT IGNORE INTO {}{} {}", upsert.table, columns_clause(upsert), upsert.rows)
        }
        UpsertAction::Update { assignments, condition } => {
            let target_ref = upsert.alias.clone().unwrap_or_else(|| unqualify(&upsert.table).to_string());
            let rewrite = |text: &str| {
                let (text, _) = replace_in_code(text, &EXCLUDED_RE, |caps| {
                    Some(format!("VALUES({})", caps.get(1)?.as_str()))
                });
                rewrite_qualified(&text, &target_ref, |col| col.to_string())
            };
            let condition = condition.as_deref().map(|c| rewrite(c));
            if condition.is_some() {
                ctx.warn(
                    WarningKind::PartialSupport,
                    "Update condition folded into each assignment with IF()",
                );
            }
            let set: Vec<String> = assignments
                .iter()
                .map(|(col, expr)| match &condition {
                    Some(cond) => format!("{col} = IF({cond}, {}, {col})", rewrite(expr)),
                    None => format!("{} = {}", col, rewrite(expr)),
                })
                .collect();
            if !upsert.conflict_columns.is_empty() {
                ctx.info(
                    WarningKind::SyntaxDifference,
                    format!(
                        "ON DUPLICATE KEY UPDATE relies on a unique index over ({})",
                        upsert.conflict_columns.join(", ")
                    ),
                );
            }
            ctx.rule("ON CONFLICT DO UPDATE → ON DUPLICATE KEY UPDATE");
            format!(
                "INSERT INTO {}{} {} ON DUPLICATE KEY UPDATE {}",
                upsert.table,
                columns_clause(upsert),
                upsert.rows,
                set.join(", ")
            )
        }
    }
}

/// The single-row, single-key case as an Oracle `MERGE`; a stub otherwise.
fn upsert_to_merge(upsert: &UpsertStatement, original: &str, ctx: &mut ConversionContext) -> String {
    let key = match upsert.conflict_columns.as_slice() {
        [key] => Some(key.clone()),
        [] => guess_key(&upsert.columns).inspect(|key| {
            ctx.warn_with(
                WarningKind::PartialSupport,
                format!("Merge key '{}' guessed from its name", key),
                "Confirm the column carries a PRIMARY KEY or UNIQUE constraint",
            );
        }),
        _ => None,
    };
    let (Some(key), Some(values)) = (key, upsert.single_row()) else {
        ctx.warn_with(
            WarningKind::ManualReviewNeeded,
            "Only single-row upserts on one key column convert to MERGE",
            "Rewrite as MERGE INTO ... USING (SELECT ... FROM DUAL) ... ON (...)",
        );
        return format!(
            "-- MANUAL CONVERSION REQUIRED: rewrite as MERGE INTO ... USING ... ON (...)\n{}",
            original.trim().trim_end_matches(';')
        );
    };
    if upsert.columns.len() != values.len() || !upsert.columns.iter().any(|c| c.eq_ignore_ascii_case(&key)) {
        ctx.warn(WarningKind::ManualReviewNeeded, "Upsert column list does not match its values");
        return format!(
            "-- MANUAL CONVERSION REQUIRED: rewrite as MERGE INTO ... USING ... ON (...)\n{}",
            original.trim().trim_end_matches(';')
        );
    }

    let selected: Vec<String> = upsert
        .columns
        .iter()
        .zip(&values)
        .map(|(col, val)| format!("{} AS {}", val, col))
        .collect();
    let mut out = format!(
        "MERGE INTO {} tgt\nUSING (SELECT {} FROM DUAL) src\nON (tgt.{key} = src.{key})",
        upsert.table,
        selected.join(", "),
        key = key
    );

    if let UpsertAction::Update { assignments, condition } = &upsert.action {
        let table_ref = upsert.alias.clone().unwrap_or_else(|| unqualify(&upsert.table).to_string());
        let rewrite = |text: &str| {
            let (text, _) = replace_in_code(text, &EXCLUDED_RE, |caps| Some(format!("src.{}", caps.get(1)?.as_str())));
            let (text, _) = replace_in_code(&text, &VALUES_FN_RE, |caps| {
                Some(format!("src.{}", caps.get(1)?.as_str().trim_matches('`')))
            });
            rewrite_qualified(&text, &table_ref, |col| format!("tgt.{}", col))
        };
        let set: Vec<String> = assignments
            .iter()
            .filter(|(col, _)| {
                let is_key = unquote(col).eq_ignore_ascii_case(&key);
                if is_key {
                    ctx.info(
                        WarningKind::SyntaxDifference,
                        format!("Assignment to merge key {} removed", col),
                    );
                }
                !is_key
            })
            .map(|(col, expr)| format!("tgt.{} = {}", unquote(col), rewrite(expr)))
            .collect();
        if !set.is_empty() {
            out.push_str(&format!("\nWHEN MATCHED THEN UPDATE SET {}", set.join(", ")));
            if let Some(cond) = condition {
                out.push_str(&format!(" WHERE {}", rewrite(cond)));
            }
        }
    }
    let src_values: Vec<String> = upsert.columns.iter().map(|c| format!("src.{}", c)).collect();
    out.push_str(&format!(
        "\nWHEN NOT MATCHED THEN INSERT ({}) VALUES ({})",
        upsert.columns.join(", "),
        src_values.join(", ")
    ));
    if upsert.returning.is_some() {
        ctx.warn(WarningKind::UnsupportedFunction, "RETURNING is not supported by MERGE and was dropped");
    }
    ctx.rule("upsert → MERGE INTO");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const BASIC: &str = "MERGE INTO t USING s ON (t.id = s.id) \
        WHEN MATCHED THEN UPDATE SET v = s.v \
        WHEN NOT MATCHED THEN INSERT (id,v) VALUES (s.id,s.v)";

    fn merge_to(sql: &str, target: Dialect) -> (String, ConversionContext) {
        let mut ctx = ConversionContext::default();
        let out = convert_merge(sql, Dialect::Oracle, target, &mut ctx).unwrap();
        (out, ctx)
    }

    #[test]
    fn test_parse_merge() {
        let merge = parse_merge(BASIC).unwrap();
        assert_eq!(merge.target_table, "t");
        assert_eq!(merge.source_expression, "s");
        assert_eq!(merge.on_condition, "t.id = s.id");
        assert_eq!(merge.update_set, Some(vec![("v".to_string(), "s.v".to_string())]));
        assert_eq!(merge.insert_columns, Some(vec!["id".to_string(), "v".to_string()]));
        assert!(!merge.using_dual);
        assert!(!merge.has_delete);
    }

    #[test]
    fn test_merge_to_postgres() {
        let (out, ctx) = merge_to(BASIC, Dialect::PostgreSql);
        assert_eq!(
            out,
            "INSERT INTO t (id, v) SELECT s.id, s.v FROM s ON CONFLICT (id) DO UPDATE SET v = EXCLUDED.v"
        );
        assert!(ctx.warnings.is_empty());
    }

    #[test]
    fn test_merge_to_mysql() {
        let (out, _) = merge_to(BASIC, Dialect::MySql);
        assert_eq!(
            out,
            "INSERT INTO t (id, v) SELECT s.id, s.v FROM s ON DUPLICATE KEY UPDATE v = VALUES(v)"
        );
    }

    #[test]
    fn test_merge_using_dual() {
        let sql = "MERGE INTO accounts a USING dual ON (a.acct_no = 42) \
            WHEN MATCHED THEN UPDATE SET a.balance = a.balance + 10 \
            WHEN NOT MATCHED THEN INSERT (acct_no, balance) VALUES (42, 10)";
        let (out, _) = merge_to(sql, Dialect::PostgreSql);
        assert_eq!(
            out,
            "INSERT INTO accounts AS a (acct_no, balance) VALUES (42, 10) ON CONFLICT (acct_no) DO UPDATE SET balance = a.balance + 10"
        );
        let (out, _) = merge_to(sql, Dialect::MySql);
        assert_eq!(
            out,
            "INSERT INTO accounts (acct_no, balance) VALUES (42, 10) ON DUPLICATE KEY UPDATE balance = balance + 10"
        );
    }

    #[test]
    fn test_merge_using_subquery_composite_key() {
        let sql = "MERGE INTO stock t USING (SELECT wh, sku, qty FROM incoming) x \
            ON (t.wh = x.wh AND t.sku = x.sku) \
            WHEN MATCHED THEN UPDATE SET t.qty = t.qty + x.qty \
            WHEN NOT MATCHED THEN INSERT (wh, sku, qty) VALUES (x.wh, x.sku, x.qty)";
        let (out, _) = merge_to(sql, Dialect::PostgreSql);
        assert_eq!(
            out,
            "INSERT INTO stock AS t (wh, sku, qty) SELECT x.wh, x.sku, x.qty FROM (SELECT wh, sku, qty FROM incoming) x ON CONFLICT (wh, sku) DO UPDATE SET qty = t.qty + EXCLUDED.qty"
        );
    }

    #[test]
    fn test_merge_delete_branch_warns() {
        let sql = "MERGE INTO t USING s ON (t.id = s.id) \
            WHEN MATCHED THEN UPDATE SET v = s.v DELETE WHERE s.gone = 1 \
            WHEN NOT MATCHED THEN INSERT (id, v) VALUES (s.id, s.v)";
        let merge = parse_merge(sql).unwrap();
        assert!(merge.has_delete);
        assert_eq!(merge.delete_condition.as_deref(), Some("s.gone = 1"));
        let (_, ctx) = merge_to(sql, Dialect::PostgreSql);
        assert_eq!(ctx.warnings[0].kind, WarningKind::PartialSupport);
    }

    #[test]
    fn test_merge_heuristic_key() {
        let sql = "MERGE INTO t USING s ON (t.a > s.b) \
            WHEN MATCHED THEN UPDATE SET v = s.v \
            WHEN NOT MATCHED THEN INSERT (user_id, v) VALUES (s.user_id, s.v)";
        let (out, ctx) = merge_to(sql, Dialect::PostgreSql);
        assert!(out.contains("ON CONFLICT (user_id)"));
        assert_eq!(ctx.warnings[0].kind, WarningKind::PartialSupport);
    }

    #[test]
    fn test_merge_no_key_placeholder() {
        let sql = "MERGE INTO t USING s ON (t.a > s.b) \
            WHEN MATCHED THEN UPDATE SET v = s.v \
            WHEN NOT MATCHED THEN INSERT (name, v) VALUES (s.name, s.v)";
        let (out, ctx) = merge_to(sql, Dialect::PostgreSql);
        assert!(out.contains("ON CONFLICT (/* conflict column */)"));
        assert!(ctx.warnings.iter().any(|w| w.kind == WarningKind::ManualReviewNeeded));
    }

    #[test]
    fn test_update_only_and_insert_only() {
        let update = "MERGE INTO t USING s ON (t.id = s.id) WHEN MATCHED THEN UPDATE SET v = s.v";
        let (out, _) = merge_to(update, Dialect::PostgreSql);
        assert_eq!(out, "UPDATE t SET v = s.v FROM s WHERE t.id = s.id");
        let (out, _) = merge_to(update, Dialect::MySql);
        assert_eq!(out, "UPDATE t JOIN s ON t.id = s.id SET t.v = s.v");

        let insert = "MERGE INTO t USING s ON (t.id = s.id) WHEN NOT MATCHED THEN INSERT (id) VALUES (s.id)";
        let (out, _) = merge_to(insert, Dialect::PostgreSql);
        assert_eq!(out, "INSERT INTO t (id) SELECT s.id FROM s ON CONFLICT (id) DO NOTHING");
        let (out, _) = merge_to(insert, Dialect::MySql);
        assert_eq!(out, "INSERT IGNORE INTO t (id) SELECT s.id FROM s");
    }

    #[test]
    fn test_update_where_on_mysql_uses_if() {
        let sql = "MERGE INTO t USING s ON (t.id = s.id) \
            WHEN MATCHED THEN UPDATE SET v = s.v WHERE s.v > t.v \
            WHEN NOT MATCHED THEN INSERT (id, v) VALUES (s.id, s.v)";
        let (out, _) = merge_to(sql, Dialect::MySql);
        assert!(out.ends_with("ON DUPLICATE KEY UPDATE v = IF(VALUES(v) > v, VALUES(v), v)"));
        let (out, _) = merge_to(sql, Dialect::PostgreSql);
        assert!(out.ends_with("DO UPDATE SET v = EXCLUDED.v WHERE EXCLUDED.v > t.v"));
    }

    #[test]
    fn test_unparseable_merge_is_stubbed() {
        let (out, ctx) = merge_to("MERGE INTO t USING s ON (t.id = s.id)", Dialect::PostgreSql);
        assert!(out.starts_with("-- MANUAL CONVERSION REQUIRED: MERGE"));
        assert_eq!(ctx.warnings[0].kind, WarningKind::ManualReviewNeeded);
    }

    #[test]
    fn test_postgres_upsert_to_mysql() {
        let mut ctx = ConversionContext::default();
        let out = convert_upsert(
            "INSERT INTO t (id, v) VALUES (1, 'a') ON CONFLICT (id) DO UPDATE SET v = EXCLUDED.v",
            Dialect::PostgreSql,
            Dialect::MySql,
            &mut ctx,
        )
        .unwrap();
        assert_eq!(out, "INSERT INTO t (id, v) VALUES (1, 'a') ON DUPLICATE KEY UPDATE v = VALUES(v)");

        let out = convert_upsert(
            "INSERT INTO t (id) VALUES (1) ON CONFLICT DO NOTHING",
            Dialect::PostgreSql,
            Dialect::MySql,
            &mut ctx,
        )
        .unwrap();
        assert_eq!(out, "INSERT IGNORE INTO t (id) VALUES (1)");
    }

    #[test]
    fn test_mysql_upsert_to_postgres() {
        let mut ctx = ConversionContext::default();
        let out = convert_upsert(
            "INSERT INTO t (id, v) VALUES (1, 2) ON DUPLICATE KEY UPDATE v = VALUES(v) + 1",
            Dialect::MySql,
            Dialect::PostgreSql,
            &mut ctx,
        )
        .unwrap();
        assert_eq!(out, "INSERT INTO t (id, v) VALUES (1, 2) ON CONFLICT (id) DO UPDATE SET v = EXCLUDED.v + 1");

        let out = convert_upsert("INSERT IGNORE INTO t VALUES (1)", Dialect::MySql, Dialect::PostgreSql, &mut ctx).unwrap();
        assert_eq!(out, "INSERT INTO t VALUES (1) ON CONFLICT DO NOTHING");
    }

    #[test]
    fn test_upsert_to_merge() {
        let mut ctx = ConversionContext::default();
        let out = convert_upsert(
            "INSERT INTO t (id, v) VALUES (1, 'a') ON CONFLICT (id) DO UPDATE SET v = EXCLUDED.v",
            Dialect::PostgreSql,
            Dialect::Oracle,
            &mut ctx,
        )
        .unwrap();
        assert_eq!(
            out,
            "MERGE INTO t tgt\nUSING (SELECT 1 AS id, 'a' AS v FROM DUAL) src\nON (tgt.id = src.id)\nWHEN MATCHED THEN UPDATE SET tgt.v = src.v\nWHEN NOT MATCHED THEN INSERT (id, v) VALUES (src.id, src.v)"
        );

        let out = convert_upsert(
            "INSERT INTO t (id, v) VALUES (1, 'a'), (2, 'b') ON CONFLICT (id) DO NOTHING",
            Dialect::PostgreSql,
            Dialect::Oracle,
            &mut ctx,
        )
        .unwrap();
        assert!(out.starts_with("-- MANUAL CONVERSION REQUIRED"));
    }

    #[test]
    fn test_plain_insert_is_not_an_upsert() {
        assert!(parse_upsert("INSERT INTO t (a) VALUES (1)").is_none());
        assert!(parse_upsert("INSERT INTO t (a) SELECT a FROM s").is_none());
    }
}
