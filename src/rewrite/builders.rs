//! Replacement builders shared by the per-pair rule sets.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::datatype::{convert_data_type, mysql_cast_type, split_type};
use crate::datefmt::convert_date_format;
use crate::dialect::Dialect;
use crate::scan::{find_keyword, is_ident_byte, split_function_args, SqlMask};

/// Parenthesize an operand unless it is a single token.
fn operand(expr: &str) -> String {
    let expr = expr.trim();
    if expr.contains(char::is_whitespace) {
        format!("({})", expr)
    } else {
        expr.to_string()
    }
}

fn is_null(arg: &str) -> bool {
    arg.trim().eq_ignore_ascii_case("NULL")
}

/// Body of a simple `'...'` literal.
fn string_literal(arg: &str) -> Option<&str> {
    let arg = arg.trim();
    (arg.len() >= 2 && arg.starts_with('\'') && arg.ends_with('\'')).then(|| &arg[1..arg.len() - 1])
}

fn integer_literal(arg: &str) -> Option<i64> {
    let arg = arg.trim();
    let arg = string_literal(arg).unwrap_or(arg);
    arg.trim().parse().ok()
}

/// `DECODE(e, s1, r1, ..., [default])` as a searched `CASE`.
pub fn decode_to_case(args: &[String]) -> Option<String> {
    if args.len() < 3 {
        return None;
    }
    let expr = operand(&args[0]);
    let mut case = String::from("CASE");
    let mut rest = args[1..].chunks_exact(2);
    for pair in rest.by_ref() {
        if is_null(&pair[0]) {
            case.push_str(&format!(" WHEN {} IS NULL THEN {}", expr, pair[1]));
        } else {
            case.push_str(&format!(" WHEN {} = {} THEN {}", expr, pair[0], pair[1]));
        }
    }
    if let [default] = rest.remainder() {
        case.push_str(&format!(" ELSE {}", default));
    }
    case.push_str(" END");
    Some(case)
}

pub fn nvl2_to_case(args: &[String]) -> Option<String> {
    let [expr, not_null, null] = args else {
        return None;
    };
    Some(format!(
        "CASE WHEN {} IS NOT NULL THEN {} ELSE {} END",
        operand(expr),
        not_null,
        null
    ))
}

pub fn if_to_case(args: &[String]) -> Option<String> {
    let [condition, then, otherwise] = args else {
        return None;
    };
    Some(format!("CASE WHEN {} THEN {} ELSE {} END", condition, then, otherwise))
}

pub fn to_number_postgres(args: &[String]) -> Option<String> {
    let [expr] = args else {
        return None;
    };
    Some(format!("CAST({} AS NUMERIC)", expr))
}

pub fn to_number_mysql(args: &[String]) -> Option<String> {
    let [expr] = args else {
        return None;
    };
    Some(format!("CAST({} AS DECIMAL(65,30))", expr))
}

pub fn instr_to_strpos(args: &[String]) -> Option<String> {
    let [haystack, needle] = args else {
        return None;
    };
    Some(format!("STRPOS({}, {})", haystack, needle))
}

pub fn add_months_postgres(args: &[String]) -> Option<String> {
    let [date, months] = args else {
        return None;
    };
    Some(match integer_literal(months) {
        Some(n) => format!("({} + INTERVAL '{} months')", date, n),
        None => format!("({} + ({}) * INTERVAL '1 month')", date, months),
    })
}

pub fn add_months_mysql(args: &[String]) -> Option<String> {
    let [date, months] = args else {
        return None;
    };
    Some(format!("DATE_ADD({}, INTERVAL {} MONTH)", date, months))
}

/// Oracle `LISTAGG(expr[, sep]) WITHIN GROUP (ORDER BY ...)`.
pub fn listagg_to_string_agg(args: &[String], order_by: Option<&str>) -> Option<String> {
    let (expr, separator) = listagg_args(args)?;
    Some(match order_by {
        Some(order) => format!("STRING_AGG({}, {} ORDER BY {})", expr, separator, order),
        None => format!("STRING_AGG({}, {})", expr, separator),
    })
}

pub fn listagg_to_group_concat(args: &[String], order_by: Option<&str>) -> Option<String> {
    let (expr, separator) = listagg_args(args)?;
    Some(match order_by {
        Some(order) => format!("GROUP_CONCAT({} ORDER BY {} SEPARATOR {})", expr, order, separator),
        None => format!("GROUP_CONCAT({} SEPARATOR {})", expr, separator),
    })
}

fn listagg_args(args: &[String]) -> Option<(&str, &str)> {
    match args {
        [expr] => Some((expr, "''")),
        [expr, separator] => {
            // ON OVERFLOW clauses have no counterpart and are dropped.
            let separator = match find_keyword(separator, "ON OVERFLOW", 0) {
                Some((start, _)) => separator[..start].trim(),
                None => separator.as_str(),
            };
            Some((expr, separator))
        }
        _ => None,
    }
}

/// PostgreSQL `STRING_AGG(expr, sep [ORDER BY ...])` split into its parts.
fn string_agg_parts(args: &[String]) -> Option<(&str, &str, Option<&str>)> {
    let [expr, tail] = args else {
        return None;
    };
    match find_keyword(tail, "ORDER BY", 0) {
        Some((start, end)) => Some((expr, tail[..start].trim(), Some(tail[end..].trim()))),
        None => Some((expr, tail.trim(), None)),
    }
}

pub fn string_agg_to_listagg(args: &[String]) -> Option<String> {
    let (expr, separator, order) = string_agg_parts(args)?;
    Some(format!(
        "LISTAGG({}, {}) WITHIN GROUP (ORDER BY {})",
        expr,
        separator,
        order.unwrap_or("NULL")
    ))
}

pub fn string_agg_to_group_concat(args: &[String]) -> Option<String> {
    let (expr, separator, order) = string_agg_parts(args)?;
    Some(match order {
        Some(order) => format!("GROUP_CONCAT({} ORDER BY {} SEPARATOR {})", expr, order, separator),
        None => format!("GROUP_CONCAT({} SEPARATOR {})", expr, separator),
    })
}

/// MySQL `GROUP_CONCAT([DISTINCT] e1[, e2...] [ORDER BY ...] [SEPARATOR s])`.
struct GroupConcat {
    distinct: bool,
    exprs: Vec<String>,
    order_by: Option<String>,
    separator: String,
}

fn parse_group_concat(args: &[String]) -> Option<GroupConcat> {
    if args.is_empty() {
        return None;
    }
    let mut text = args.join(", ");
    let mut separator = "','".to_string();
    if let Some((start, end)) = find_keyword(&text, "SEPARATOR", 0) {
        separator = text[end..].trim().to_string();
        text.truncate(start);
    }
    let mut order_by = None;
    if let Some((start, end)) = find_keyword(&text, "ORDER BY", 0) {
        order_by = Some(text[end..].trim().to_string());
        text.truncate(start);
    }
    let mut body = text.trim();
    let distinct = find_keyword(body, "DISTINCT", 0).is_some_and(|(start, _)| start == 0);
    if distinct {
        body = body["DISTINCT".len()..].trim_start();
    }
    let exprs = split_function_args(body);
    if exprs.is_empty() {
        return None;
    }
    Some(GroupConcat {
        distinct,
        exprs,
        order_by,
        separator,
    })
}

pub fn group_concat_to_string_agg(args: &[String]) -> Option<String> {
    let gc = parse_group_concat(args)?;
    let expr = gc.exprs.join(" || ");
    // STRING_AGG only accepts text.
    let expr = if gc.exprs.len() == 1 && string_literal(&expr).is_none() {
        format!("CAST({} AS TEXT)", expr)
    } else {
        expr
    };
    let distinct = if gc.distinct { "DISTINCT " } else { "" };
    Some(match gc.order_by {
        Some(order) => format!("STRING_AGG({}{}, {} ORDER BY {})", distinct, expr, gc.separator, order),
        None => format!("STRING_AGG({}{}, {})", distinct, expr, gc.separator),
    })
}

pub fn group_concat_to_listagg(args: &[String]) -> Option<String> {
    let gc = parse_group_concat(args)?;
    let distinct = if gc.distinct { "DISTINCT " } else { "" };
    Some(format!(
        "LISTAGG({}{}, {}) WITHIN GROUP (ORDER BY {})",
        distinct,
        gc.exprs.join(" || "),
        gc.separator,
        gc.order_by.as_deref().unwrap_or("NULL")
    ))
}

static INTERVAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^INTERVAL\s+(.+?)\s+(MICROSECOND|SECOND|MINUTE|HOUR|DAY|WEEK|MONTH|QUARTER|YEAR)$")
        .expect("valid interval pattern")
});

/// A MySQL `INTERVAL n UNIT` argument normalized to a base unit.
struct Interval {
    amount: String,
    literal: Option<i64>,
    unit: &'static str,
    multiplier: i64,
}

fn parse_interval(arg: &str) -> Option<Interval> {
    let caps = INTERVAL_RE.captures(arg.trim())?;
    let amount = caps.get(1)?.as_str().trim();
    let (unit, multiplier) = match caps.get(2)?.as_str().to_ascii_uppercase().as_str() {
        "MICROSECOND" => ("microsecond", 1),
        "SECOND" => ("second", 1),
        "MINUTE" => ("minute", 1),
        "HOUR" => ("hour", 1),
        "DAY" => ("day", 1),
        "WEEK" => ("day", 7),
        "MONTH" => ("month", 1),
        "QUARTER" => ("month", 3),
        "YEAR" => ("year", 1),
        _ => return None,
    };
    Some(Interval {
        amount: string_literal(amount).unwrap_or(amount).to_string(),
        literal: integer_literal(amount),
        unit,
        multiplier,
    })
}

fn scaled(interval: &Interval) -> String {
    match (interval.literal, interval.multiplier) {
        (Some(n), m) => (n * m).to_string(),
        (None, 1) => operand(&interval.amount),
        (None, m) => format!("{} * {}", operand(&interval.amount), m),
    }
}

fn date_arith_postgres(args: &[String], op: char) -> Option<String> {
    let [date, interval] = args else {
        return None;
    };
    let interval = parse_interval(interval)?;
    Some(match interval.literal {
        Some(n) => format!(
            "({} {} INTERVAL '{} {}s')",
            date,
            op,
            n * interval.multiplier,
            interval.unit
        ),
        None => format!(
            "({} {} ({}) * INTERVAL '{} {}')",
            date, op, interval.amount, interval.multiplier, interval.unit
        ),
    })
}

fn date_arith_oracle(args: &[String], op: char) -> Option<String> {
    let [date, interval] = args else {
        return None;
    };
    let interval = parse_interval(interval)?;
    let amount = scaled(&interval);
    Some(match interval.unit {
        "month" | "year" => {
            let months = if interval.unit == "year" {
                match interval.literal {
                    Some(n) => (n * 12).to_string(),
                    None => format!("{} * 12", operand(&amount)),
                }
            } else {
                amount
            };
            let signed = if op == '-' {
                format!("-{}", operand(&months))
            } else {
                months
            };
            format!("ADD_MONTHS({}, {})", date, signed)
        }
        "microsecond" => format!("({} {} NUMTODSINTERVAL({} / 1000000, 'SECOND'))", date, op, amount),
        unit => format!(
            "({} {} NUMTODSINTERVAL({}, '{}'))",
            date,
            op,
            amount,
            unit.to_ascii_uppercase()
        ),
    })
}

pub fn date_add_postgres(args: &[String]) -> Option<String> {
    date_arith_postgres(args, '+')
}

pub fn date_sub_postgres(args: &[String]) -> Option<String> {
    date_arith_postgres(args, '-')
}

pub fn date_add_oracle(args: &[String]) -> Option<String> {
    date_arith_oracle(args, '+')
}

pub fn date_sub_oracle(args: &[String]) -> Option<String> {
    date_arith_oracle(args, '-')
}

/// Number picture strings (`'999.99'`, `'FM0000'`) are not date formats.
fn is_number_format(format: &str) -> bool {
    format.contains(['9', '0'])
}

fn has_time_part(picture: &str) -> bool {
    let upper = picture.to_ascii_uppercase();
    ["HH", "MI", "SS", "FF", "US", "MS"].iter().any(|t| upper.contains(t))
}

/// Convert the format argument of a `NAME(value, 'format')` call.
fn with_format(name: &str, args: &[String], source: Dialect, target: Dialect) -> Option<String> {
    let [value, format] = args else {
        return None;
    };
    let inner = string_literal(format)?;
    if is_number_format(inner) {
        return None;
    }
    Some(format!(
        "{}({}, '{}')",
        name,
        value,
        convert_date_format(inner, source, target)
    ))
}

pub fn to_char_oracle_to_postgres(args: &[String]) -> Option<String> {
    with_format("TO_CHAR", args, Dialect::Oracle, Dialect::PostgreSql)
}

pub fn to_char_postgres_to_oracle(args: &[String]) -> Option<String> {
    with_format("TO_CHAR", args, Dialect::PostgreSql, Dialect::Oracle)
}

pub fn to_timestamp_postgres_to_oracle(args: &[String]) -> Option<String> {
    with_format("TO_TIMESTAMP", args, Dialect::PostgreSql, Dialect::Oracle)
}

/// Oracle `TO_DATE` keeps the time of day; PostgreSQL needs `TO_TIMESTAMP` for that.
pub fn to_date_oracle_to_postgres(args: &[String]) -> Option<String> {
    let [_, format] = args else {
        return None;
    };
    let name = if string_literal(format).is_some_and(has_time_part) {
        "TO_TIMESTAMP"
    } else {
        "TO_DATE"
    };
    with_format(name, args, Dialect::Oracle, Dialect::PostgreSql)
}

fn to_char_to_date_format(args: &[String], source: Dialect) -> Option<String> {
    match args {
        [value] => Some(format!("CAST({} AS CHAR)", value)),
        _ => with_format("DATE_FORMAT", args, source, Dialect::MySql),
    }
}

pub fn to_char_oracle_to_mysql(args: &[String]) -> Option<String> {
    to_char_to_date_format(args, Dialect::Oracle)
}

pub fn to_char_postgres_to_mysql(args: &[String]) -> Option<String> {
    to_char_to_date_format(args, Dialect::PostgreSql)
}

pub fn to_date_oracle_to_mysql(args: &[String]) -> Option<String> {
    with_format("STR_TO_DATE", args, Dialect::Oracle, Dialect::MySql)
}

pub fn to_date_postgres_to_mysql(args: &[String]) -> Option<String> {
    with_format("STR_TO_DATE", args, Dialect::PostgreSql, Dialect::MySql)
}

pub fn date_format_to_postgres(args: &[String]) -> Option<String> {
    with_format("TO_CHAR", args, Dialect::MySql, Dialect::PostgreSql)
}

pub fn date_format_to_oracle(args: &[String]) -> Option<String> {
    with_format("TO_CHAR", args, Dialect::MySql, Dialect::Oracle)
}

pub fn str_to_date_postgres(args: &[String]) -> Option<String> {
    let [_, format] = args else {
        return None;
    };
    let name = match string_literal(format) {
        Some(f) if f.contains(['H', 'h', 'i', 's', 'S', 'T', 'f', 'k', 'l', 'r']) => "TO_TIMESTAMP",
        _ => "TO_DATE",
    };
    with_format(name, args, Dialect::MySql, Dialect::PostgreSql)
}

pub fn str_to_date_oracle(args: &[String]) -> Option<String> {
    with_format("TO_DATE", args, Dialect::MySql, Dialect::Oracle)
}

/// `x IS [NOT] TRUE` and bare boolean literals as Oracle numbers.
pub fn boolean_literal_oracle(caps: &Captures<'_>) -> Option<String> {
    let value = if caps.get(2)?.as_str().eq_ignore_ascii_case("TRUE") {
        "1"
    } else {
        "0"
    };
    Some(match caps.get(1) {
        Some(is) if is.as_str().to_ascii_uppercase().contains("NOT") => format!("<> {}", value),
        Some(_) => format!("= {}", value),
        None => value.to_string(),
    })
}

/// Start of the operand that ends just before `pos` (a `::` cast operator).
fn cast_operand_start(text: &str, mask: &SqlMask, pos: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let end = text[..pos].trim_end().len();
    let last = end.checked_sub(1)?;
    let mut start = match bytes[last] {
        b')' if mask.is_code(last) => {
            let depth = mask.depth(last);
            (0..last).rev().find(|&j| bytes[j] == b'(' && mask.depth(j) == depth)?
        }
        b'\'' | b'"' if !mask.is_code(last) => {
            let quote = bytes[last];
            (0..last).rev().find(|&j| bytes[j] == quote && mask.is_code(j))?
        }
        b if is_ident_byte(b) || b == b'.' => end,
        _ => return None,
    };
    while start > 0 && (is_ident_byte(bytes[start - 1]) || bytes[start - 1] == b'.') {
        start -= 1;
    }
    (start < end).then_some(start)
}

/// PostgreSQL `expr::type` casts as `CAST(expr AS type)` for `target`.
fn rewrite_pg_casts(sql: &str, target: Dialect) -> Option<String> {
    let mut current = sql.to_string();
    let mut from = 0;
    let mut changed = false;
    loop {
        let mask = SqlMask::new(&current);
        let bytes = current.as_bytes();
        let Some(pos) = (from..bytes.len().saturating_sub(1))
            .find(|&i| bytes[i] == b':' && bytes[i + 1] == b':' && mask.is_code(i))
        else {
            break;
        };
        let type_start = pos + 2;
        let parsed = cast_operand_start(&current, &mask, pos)
            .and_then(|start| split_type(&current[type_start..]).map(|(ty, rest)| (start, ty, rest.len())));
        let Some((start, type_text, rest_len)) = parsed else {
            from = pos + 2;
            continue;
        };
        let mapped = convert_data_type(type_text, Dialect::PostgreSql, target).sql;
        let cast_type = match target {
            Dialect::MySql => mysql_cast_type(&mapped),
            _ if mapped == "CLOB" => "VARCHAR2(4000)".to_string(),
            _ => mapped,
        };
        let replacement = format!("CAST({} AS {})", current[start..pos].trim(), cast_type);
        let end = current.len() - rest_len;
        current.replace_range(start..end, &replacement);
        changed = true;
        from = start;
    }
    changed.then_some(current)
}

pub fn pg_casts_to_oracle(sql: &str) -> Option<String> {
    rewrite_pg_casts(sql, Dialect::Oracle)
}

pub fn pg_casts_to_mysql(sql: &str) -> Option<String> {
    rewrite_pg_casts(sql, Dialect::MySql)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_decode_with_default_and_null() {
        let out = decode_to_case(&args(&["status", "'A'", "'Active'", "NULL", "'None'", "'Other'"]));
        assert_eq!(
            out.as_deref(),
            Some("CASE WHEN status = 'A' THEN 'Active' WHEN status IS NULL THEN 'None' ELSE 'Other' END")
        );
        assert!(decode_to_case(&args(&["a", "b"])).is_none());
    }

    #[test]
    fn test_listagg() {
        let out = listagg_to_string_agg(&args(&["name", "', '"]), Some("name"));
        assert_eq!(out.as_deref(), Some("STRING_AGG(name, ', ' ORDER BY name)"));
        let out = listagg_to_group_concat(&args(&["name", "','"]), None);
        assert_eq!(out.as_deref(), Some("GROUP_CONCAT(name SEPARATOR ',')"));
    }

    #[test]
    fn test_group_concat_parsing() {
        let out = group_concat_to_string_agg(&args(&["DISTINCT name ORDER BY name DESC SEPARATOR ';'"]));
        assert_eq!(
            out.as_deref(),
            Some("STRING_AGG(DISTINCT CAST(name AS TEXT), ';' ORDER BY name DESC)")
        );
        let out = group_concat_to_listagg(&args(&["name"]));
        assert_eq!(out.as_deref(), Some("LISTAGG(name, ',') WITHIN GROUP (ORDER BY NULL)"));
    }

    #[test]
    fn test_date_add_postgres() {
        assert_eq!(
            date_add_postgres(&args(&["created", "INTERVAL 3 DAY"])).as_deref(),
            Some("(created + INTERVAL '3 days')")
        );
        assert_eq!(
            date_sub_postgres(&args(&["d", "INTERVAL n MONTH"])).as_deref(),
            Some("(d - (n) * INTERVAL '1 month')")
        );
        assert_eq!(
            date_add_postgres(&args(&["d", "INTERVAL 1 QUARTER"])).as_deref(),
            Some("(d + INTERVAL '3 months')")
        );
    }

    #[test]
    fn test_date_add_oracle() {
        assert_eq!(
            date_add_oracle(&args(&["d", "INTERVAL 2 HOUR"])).as_deref(),
            Some("(d + NUMTODSINTERVAL(2, 'HOUR'))")
        );
        assert_eq!(
            date_sub_oracle(&args(&["d", "INTERVAL 1 YEAR"])).as_deref(),
            Some("ADD_MONTHS(d, -12)")
        );
    }

    #[test]
    fn test_to_char_formats() {
        assert_eq!(
            to_char_oracle_to_mysql(&args(&["hired", "'YYYY-MM-DD'"])).as_deref(),
            Some("DATE_FORMAT(hired, '%Y-%m-%d')")
        );
        assert!(to_char_oracle_to_mysql(&args(&["amount", "'999.99'"])).is_none());
        assert_eq!(
            to_date_oracle_to_postgres(&args(&["s", "'YYYY-MM-DD HH24:MI'"])).as_deref(),
            Some("TO_TIMESTAMP(s, 'YYYY-MM-DD HH24:MI')")
        );
    }

    #[test]
    fn test_pg_casts() {
        assert_eq!(
            pg_casts_to_mysql("SELECT id::text, (a + b)::integer FROM t").as_deref(),
            Some("SELECT CAST(id AS CHAR), CAST((a + b) AS SIGNED) FROM t")
        );
        assert_eq!(
            pg_casts_to_oracle("SELECT '2024-01-01'::date, x::varchar(10)::int FROM t").as_deref(),
            Some("SELECT CAST('2024-01-01' AS DATE), CAST(CAST(x AS VARCHAR2(10)) AS NUMBER(10)) FROM t")
        );
        assert!(pg_casts_to_oracle("SELECT 'a::b' FROM t").is_none());
    }
}
