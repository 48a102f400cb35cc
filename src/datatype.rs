//! Column data-type mapping between dialects.
//!
//! A type is read as `BASE[(precision[, scale])] [suffix...] [[]]` by one
//! anchored pattern, looked up in the table for its dialect pair, and
//! re-rendered according to the rule's [`PrecisionPolicy`].

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::dialect::{Dialect, DialectPair};
use crate::result::{ConversionWarning, Severity, WarningKind};
use crate::scan::find_matching_bracket;

/// How a declared precision/scale carries over to the target type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrecisionPolicy {
    /// Keep the declared precision verbatim.
    Preserve,
    /// The target type takes no precision.
    Drop,
    /// Re-render the numbers on the target type, clamped to `max` and
    /// defaulting to `default` when none was declared.
    Convert {
        max: Option<u32>,
        default: Option<u32>,
    },
    /// Pick an integer width from the declared precision (Oracle `NUMBER`).
    MapToIntegerByPrecision,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeMappingRule {
    pub source_type: &'static str,
    pub target_type: &'static str,
    pub policy: PrecisionPolicy,
    /// Behavioural difference worth reporting even when the mapping applies.
    pub caveat: Option<&'static str>,
}

const fn rule(source_type: &'static str, target_type: &'static str, policy: PrecisionPolicy) -> TypeMappingRule {
    TypeMappingRule {
        source_type,
        target_type,
        policy,
        caveat: None,
    }
}

const fn noted(
    source_type: &'static str,
    target_type: &'static str,
    policy: PrecisionPolicy,
    caveat: &'static str,
) -> TypeMappingRule {
    TypeMappingRule {
        source_type,
        target_type,
        policy,
        caveat: Some(caveat),
    }
}

const fn convert(max: u32, default: u32) -> PrecisionPolicy {
    PrecisionPolicy::Convert {
        max: Some(max),
        default: Some(default),
    }
}

const fn clamp(max: u32) -> PrecisionPolicy {
    PrecisionPolicy::Convert {
        max: Some(max),
        default: None,
    }
}

use PrecisionPolicy::{Drop, MapToIntegerByPrecision, Preserve};

const ORACLE_TO_POSTGRES: &[TypeMappingRule] = &[
    rule("VARCHAR2", "VARCHAR", clamp(10485760)),
    rule("NVARCHAR2", "VARCHAR", clamp(10485760)),
    rule("VARCHAR", "VARCHAR", clamp(10485760)),
    rule("CHAR", "CHAR", clamp(10485760)),
    rule("NCHAR", "CHAR", clamp(10485760)),
    rule("NUMBER", "NUMERIC", MapToIntegerByPrecision),
    rule("INTEGER", "INTEGER", Drop),
    rule("INT", "INTEGER", Drop),
    rule("SMALLINT", "SMALLINT", Drop),
    rule("FLOAT", "DOUBLE PRECISION", Drop),
    rule("BINARY_FLOAT", "REAL", Drop),
    rule("BINARY_DOUBLE", "DOUBLE PRECISION", Drop),
    noted("DATE", "TIMESTAMP(0)", Drop, "Oracle DATE carries a time of day; mapped to TIMESTAMP(0)"),
    rule("TIMESTAMP", "TIMESTAMP", Preserve),
    rule("TIMESTAMP WITH TIME ZONE", "TIMESTAMPTZ", Preserve),
    noted(
        "TIMESTAMP WITH LOCAL TIME ZONE",
        "TIMESTAMPTZ",
        Preserve,
        "session time zone normalization differs from TIMESTAMPTZ",
    ),
    rule("CLOB", "TEXT", Drop),
    rule("NCLOB", "TEXT", Drop),
    rule("LONG", "TEXT", Drop),
    rule("BLOB", "BYTEA", Drop),
    rule("RAW", "BYTEA", Drop),
    rule("LONG RAW", "BYTEA", Drop),
    rule("XMLTYPE", "XML", Drop),
    rule("INTERVAL", "INTERVAL", Drop),
    noted("ROWID", "TEXT", Drop, "ROWID values are not portable"),
];

const ORACLE_TO_MYSQL: &[TypeMappingRule] = &[
    rule("VARCHAR2", "VARCHAR", convert(16383, 255)),
    rule("NVARCHAR2", "VARCHAR", convert(16383, 255)),
    rule("VARCHAR", "VARCHAR", convert(16383, 255)),
    rule("CHAR", "CHAR", clamp(255)),
    rule("NCHAR", "CHAR", clamp(255)),
    rule("NUMBER", "DECIMAL", MapToIntegerByPrecision),
    rule("INTEGER", "INT", Drop),
    rule("INT", "INT", Drop),
    rule("SMALLINT", "SMALLINT", Drop),
    rule("FLOAT", "DOUBLE", Drop),
    rule("BINARY_FLOAT", "FLOAT", Drop),
    rule("BINARY_DOUBLE", "DOUBLE", Drop),
    rule("DATE", "DATETIME", Drop),
    rule("TIMESTAMP", "DATETIME", clamp(6)),
    noted(
        "TIMESTAMP WITH TIME ZONE",
        "TIMESTAMP",
        clamp(6),
        "MySQL TIMESTAMP stores UTC and drops the zone offset",
    ),
    noted(
        "TIMESTAMP WITH LOCAL TIME ZONE",
        "TIMESTAMP",
        clamp(6),
        "MySQL TIMESTAMP stores UTC and drops the zone offset",
    ),
    rule("CLOB", "LONGTEXT", Drop),
    rule("NCLOB", "LONGTEXT", Drop),
    rule("LONG", "LONGTEXT", Drop),
    rule("BLOB", "LONGBLOB", Drop),
    rule("RAW", "VARBINARY", convert(65535, 255)),
    rule("LONG RAW", "LONGBLOB", Drop),
    noted("XMLTYPE", "LONGTEXT", Drop, "XML is stored as plain text"),
    noted("ROWID", "VARCHAR(18)", Drop, "ROWID values are not portable"),
];

const POSTGRES_TO_ORACLE: &[TypeMappingRule] = &[
    rule("VARCHAR", "VARCHAR2", convert(4000, 4000)),
    rule("CHARACTER VARYING", "VARCHAR2", convert(4000, 4000)),
    rule("TEXT", "CLOB", Drop),
    rule("CHAR", "CHAR", clamp(2000)),
    rule("CHARACTER", "CHAR", clamp(2000)),
    rule("SMALLINT", "NUMBER(5)", Drop),
    rule("INT2", "NUMBER(5)", Drop),
    rule("INTEGER", "NUMBER(10)", Drop),
    rule("INT", "NUMBER(10)", Drop),
    rule("INT4", "NUMBER(10)", Drop),
    rule("BIGINT", "NUMBER(19)", Drop),
    rule("INT8", "NUMBER(19)", Drop),
    rule("SMALLSERIAL", "NUMBER(5)", Drop),
    rule("SERIAL", "NUMBER(10)", Drop),
    rule("BIGSERIAL", "NUMBER(19)", Drop),
    rule("NUMERIC", "NUMBER", clamp(38)),
    rule("DECIMAL", "NUMBER", clamp(38)),
    rule("REAL", "BINARY_FLOAT", Drop),
    rule("FLOAT4", "BINARY_FLOAT", Drop),
    rule("DOUBLE PRECISION", "BINARY_DOUBLE", Drop),
    rule("FLOAT8", "BINARY_DOUBLE", Drop),
    noted("BOOLEAN", "NUMBER(1)", Drop, "booleans are stored as 0/1"),
    noted("BOOL", "NUMBER(1)", Drop, "booleans are stored as 0/1"),
    rule("DATE", "DATE", Drop),
    rule("TIMESTAMP", "TIMESTAMP", Preserve),
    rule("TIMESTAMP WITHOUT TIME ZONE", "TIMESTAMP", Preserve),
    rule("TIMESTAMPTZ", "TIMESTAMP WITH TIME ZONE", Preserve),
    rule("TIMESTAMP WITH TIME ZONE", "TIMESTAMP WITH TIME ZONE", Preserve),
    noted("TIME", "INTERVAL DAY TO SECOND", Drop, "Oracle has no time-of-day type"),
    rule("INTERVAL", "INTERVAL DAY TO SECOND", Drop),
    rule("BYTEA", "BLOB", Drop),
    noted("UUID", "RAW(16)", Drop, "UUIDs are stored as raw bytes"),
    noted("JSON", "CLOB", Drop, "add an IS JSON check constraint"),
    noted("JSONB", "CLOB", Drop, "add an IS JSON check constraint"),
    rule("XML", "XMLTYPE", Drop),
];

const POSTGRES_TO_MYSQL: &[TypeMappingRule] = &[
    rule("VARCHAR", "VARCHAR", convert(16383, 255)),
    rule("CHARACTER VARYING", "VARCHAR", convert(16383, 255)),
    rule("TEXT", "LONGTEXT", Drop),
    rule("CHAR", "CHAR", clamp(255)),
    rule("CHARACTER", "CHAR", clamp(255)),
    rule("SMALLINT", "SMALLINT", Drop),
    rule("INT2", "SMALLINT", Drop),
    rule("INTEGER", "INT", Drop),
    rule("INT", "INT", Drop),
    rule("INT4", "INT", Drop),
    rule("BIGINT", "BIGINT", Drop),
    rule("INT8", "BIGINT", Drop),
    rule("SMALLSERIAL", "SMALLINT", Drop),
    rule("SERIAL", "INT", Drop),
    rule("BIGSERIAL", "BIGINT", Drop),
    rule("NUMERIC", "DECIMAL", clamp(65)),
    rule("DECIMAL", "DECIMAL", clamp(65)),
    rule("REAL", "FLOAT", Drop),
    rule("FLOAT4", "FLOAT", Drop),
    rule("DOUBLE PRECISION", "DOUBLE", Drop),
    rule("FLOAT8", "DOUBLE", Drop),
    rule("BOOLEAN", "TINYINT(1)", Drop),
    rule("BOOL", "TINYINT(1)", Drop),
    rule("DATE", "DATE", Drop),
    rule("TIMESTAMP", "DATETIME", clamp(6)),
    rule("TIMESTAMP WITHOUT TIME ZONE", "DATETIME", clamp(6)),
    noted("TIMESTAMPTZ", "TIMESTAMP", clamp(6), "MySQL TIMESTAMP stores UTC and drops the zone offset"),
    noted(
        "TIMESTAMP WITH TIME ZONE",
        "TIMESTAMP",
        clamp(6),
        "MySQL TIMESTAMP stores UTC and drops the zone offset",
    ),
    rule("TIME", "TIME", clamp(6)),
    rule("BYTEA", "LONGBLOB", Drop),
    rule("UUID", "CHAR(36)", Drop),
    rule("JSON", "JSON", Drop),
    noted("JSONB", "JSON", Drop, "JSONB indexing operators are not available"),
    noted("INTERVAL", "VARCHAR(64)", Drop, "MySQL has no interval column type"),
];

const MYSQL_TO_POSTGRES: &[TypeMappingRule] = &[
    rule("VARCHAR", "VARCHAR", clamp(10485760)),
    rule("CHAR", "CHAR", clamp(10485760)),
    rule("TINYTEXT", "TEXT", Drop),
    rule("TEXT", "TEXT", Drop),
    rule("MEDIUMTEXT", "TEXT", Drop),
    rule("LONGTEXT", "TEXT", Drop),
    rule("TINYINT", "SMALLINT", Drop),
    rule("SMALLINT", "SMALLINT", Drop),
    rule("MEDIUMINT", "INTEGER", Drop),
    rule("INT", "INTEGER", Drop),
    rule("INTEGER", "INTEGER", Drop),
    rule("BIGINT", "BIGINT", Drop),
    rule("DECIMAL", "NUMERIC", Preserve),
    rule("NUMERIC", "NUMERIC", Preserve),
    rule("FLOAT", "REAL", Drop),
    rule("DOUBLE", "DOUBLE PRECISION", Drop),
    rule("DOUBLE PRECISION", "DOUBLE PRECISION", Drop),
    rule("BOOLEAN", "BOOLEAN", Drop),
    rule("BOOL", "BOOLEAN", Drop),
    rule("BIT", "BIT", Preserve),
    rule("DATE", "DATE", Drop),
    rule("DATETIME", "TIMESTAMP", Preserve),
    rule("TIMESTAMP", "TIMESTAMPTZ", Preserve),
    rule("TIME", "TIME", Preserve),
    rule("YEAR", "SMALLINT", Drop),
    rule("TINYBLOB", "BYTEA", Drop),
    rule("BLOB", "BYTEA", Drop),
    rule("MEDIUMBLOB", "BYTEA", Drop),
    rule("LONGBLOB", "BYTEA", Drop),
    rule("BINARY", "BYTEA", Drop),
    rule("VARBINARY", "BYTEA", Drop),
    rule("JSON", "JSONB", Drop),
    noted("ENUM", "VARCHAR(255)", Drop, "add a CHECK constraint listing the allowed values"),
    noted("SET", "TEXT", Drop, "SET membership semantics are lost"),
];

const MYSQL_TO_ORACLE: &[TypeMappingRule] = &[
    rule("VARCHAR", "VARCHAR2", convert(4000, 4000)),
    rule("CHAR", "CHAR", clamp(2000)),
    rule("TINYTEXT", "VARCHAR2(255)", Drop),
    rule("TEXT", "CLOB", Drop),
    rule("MEDIUMTEXT", "CLOB", Drop),
    rule("LONGTEXT", "CLOB", Drop),
    rule("TINYINT", "NUMBER(3)", Drop),
    rule("SMALLINT", "NUMBER(5)", Drop),
    rule("MEDIUMINT", "NUMBER(7)", Drop),
    rule("INT", "NUMBER(10)", Drop),
    rule("INTEGER", "NUMBER(10)", Drop),
    rule("BIGINT", "NUMBER(19)", Drop),
    rule("DECIMAL", "NUMBER", clamp(38)),
    rule("NUMERIC", "NUMBER", clamp(38)),
    rule("FLOAT", "BINARY_FLOAT", Drop),
    rule("DOUBLE", "BINARY_DOUBLE", Drop),
    rule("DOUBLE PRECISION", "BINARY_DOUBLE", Drop),
    noted("BOOLEAN", "NUMBER(1)", Drop, "booleans are stored as 0/1"),
    noted("BOOL", "NUMBER(1)", Drop, "booleans are stored as 0/1"),
    rule("BIT", "RAW", clamp(2000)),
    rule("DATE", "DATE", Drop),
    rule("DATETIME", "TIMESTAMP", Preserve),
    rule("TIMESTAMP", "TIMESTAMP", Preserve),
    noted("TIME", "INTERVAL DAY TO SECOND", Drop, "Oracle has no time-of-day type"),
    rule("YEAR", "NUMBER(4)", Drop),
    rule("TINYBLOB", "BLOB", Drop),
    rule("BLOB", "BLOB", Drop),
    rule("MEDIUMBLOB", "BLOB", Drop),
    rule("LONGBLOB", "BLOB", Drop),
    rule("BINARY", "RAW", clamp(2000)),
    rule("VARBINARY", "RAW", clamp(2000)),
    noted("JSON", "CLOB", Drop, "add an IS JSON check constraint"),
    noted("ENUM", "VARCHAR2(255)", Drop, "add a CHECK constraint listing the allowed values"),
    noted("SET", "VARCHAR2(4000)", Drop, "SET membership semantics are lost"),
];

static TYPE_TABLES: Lazy<HashMap<DialectPair, HashMap<&'static str, TypeMappingRule>>> = Lazy::new(|| {
    let tables: [(Dialect, Dialect, &[TypeMappingRule]); 6] = [
        (Dialect::Oracle, Dialect::PostgreSql, ORACLE_TO_POSTGRES),
        (Dialect::Oracle, Dialect::MySql, ORACLE_TO_MYSQL),
        (Dialect::PostgreSql, Dialect::Oracle, POSTGRES_TO_ORACLE),
        (Dialect::PostgreSql, Dialect::MySql, POSTGRES_TO_MYSQL),
        (Dialect::MySql, Dialect::PostgreSql, MYSQL_TO_POSTGRES),
        (Dialect::MySql, Dialect::Oracle, MYSQL_TO_ORACLE),
    ];
    tables
        .into_iter()
        .map(|(source, target, rules)| {
            let by_name = rules.iter().map(|r| (r.source_type, *r)).collect();
            (DialectPair::new(source, target), by_name)
        })
        .collect()
});

static TYPE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?ix)^\s*
        (?P<base>[a-z_][a-z0-9_]*(?:\s+(?:precision|varying|raw))?)
        (?:\s*\(\s*(?P<p>\d+|\*)\s*(?:,\s*(?P<s>-?\d+)\s*)?(?:(?:byte|char)\s*)?\))?
        (?P<suffix>(?:\s+(?:unsigned|zerofill|with\s+local\s+time\s+zone|with\s+time\s+zone|without\s+time\s+zone))*)
        (?P<array>\s*\[\s*\])?",
    )
    .expect("valid type pattern")
});

/// Type rule lookup for a pair; Tibero shares Oracle's tables.
pub fn type_rule(source: Dialect, target: Dialect, base: &str) -> Option<&'static TypeMappingRule> {
    TYPE_TABLES
        .get(&DialectPair::new(source, target).family())
        .and_then(|table| table.get(base))
}

/// A data type split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedType {
    /// Upper-cased base name, words separated by one space.
    pub base: String,
    pub precision: Option<String>,
    pub scale: Option<i64>,
    /// Non-numeric argument list, e.g. the values of `ENUM('a','b')`.
    pub args: Option<String>,
    pub unsigned: bool,
    pub zerofill: bool,
    pub time_zone: Option<TimeZoneSuffix>,
    pub array: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeZoneSuffix {
    With,
    WithLocal,
    Without,
}

impl ParsedType {
    /// Table key: base name plus any time-zone suffix.
    fn key(&self) -> String {
        match self.time_zone {
            Some(TimeZoneSuffix::With) => format!("{} WITH TIME ZONE", self.base),
            Some(TimeZoneSuffix::WithLocal) => format!("{} WITH LOCAL TIME ZONE", self.base),
            Some(TimeZoneSuffix::Without) => format!("{} WITHOUT TIME ZONE", self.base),
            None => self.base.clone(),
        }
    }

    fn precision_number(&self) -> Option<u32> {
        match self.precision.as_deref() {
            Some("*") => Some(38),
            Some(p) => p.parse().ok(),
            None => None,
        }
    }

    fn precision_text(&self) -> Option<String> {
        let p = self.precision.as_ref()?;
        Some(match self.scale {
            Some(s) => format!("({},{})", p, s),
            None => format!("({})", p),
        })
    }
}

/// Split the leading data type off a column definition.
///
/// Returns the type text and the remainder (constraints, defaults).
pub fn split_type(definition: &str) -> Option<(&str, &str)> {
    let caps = TYPE_RE.captures(definition)?;
    let mut end = caps.get(0)?.end();
    let base = caps.name("base")?.as_str().to_ascii_uppercase();
    if caps.name("p").is_none() && matches!(base.as_str(), "ENUM" | "SET") {
        let rest = &definition[end..];
        let ws = rest.len() - rest.trim_start().len();
        if rest.trim_start().starts_with('(') {
            if let Some(close) = find_matching_bracket(definition, end + ws + 1) {
                end = close;
            }
        }
    }
    Some((definition[..end].trim(), &definition[end..]))
}

pub fn parse_type(type_text: &str) -> Option<ParsedType> {
    let (head, rest) = split_type(type_text)?;
    if !rest.trim().is_empty() {
        return None;
    }
    let caps = TYPE_RE.captures(head)?;
    let base = caps
        .name("base")?
        .as_str()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_uppercase();
    let matched = caps.get(0)?.end();
    let args = head[matched..]
        .trim()
        .strip_prefix('(')
        .and_then(|a| a.strip_suffix(')'))
        .map(str::to_string);
    let suffix = caps
        .name("suffix")
        .map(|s| s.as_str().to_ascii_uppercase())
        .unwrap_or_default();
    let time_zone = if suffix.contains("WITHOUT") {
        Some(TimeZoneSuffix::Without)
    } else if suffix.contains("LOCAL") {
        Some(TimeZoneSuffix::WithLocal)
    } else if suffix.contains("WITH") {
        Some(TimeZoneSuffix::With)
    } else {
        None
    };
    Some(ParsedType {
        base,
        precision: caps.name("p").map(|p| p.as_str().to_string()),
        scale: caps.name("s").and_then(|s| s.as_str().parse().ok()),
        args,
        unsigned: suffix.contains("UNSIGNED"),
        zerofill: suffix.contains("ZEROFILL"),
        time_zone,
        array: caps.name("array").is_some(),
    })
}

/// A converted type with the notes collected along the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedType {
    pub sql: String,
    pub warnings: Vec<ConversionWarning>,
}

impl MappedType {
    fn unchanged(type_text: &str) -> Self {
        Self {
            sql: type_text.trim().to_string(),
            warnings: Vec::new(),
        }
    }
}

/// Convert a column data type from `source` to `target`.
///
/// Unknown types pass through unchanged with a `data-type-mismatch` warning.
pub fn convert_data_type(type_text: &str, source: Dialect, target: Dialect) -> MappedType {
    if DialectPair::new(source, target).same_family() {
        return MappedType::unchanged(type_text);
    }
    let Some(parsed) = parse_type(type_text) else {
        return MappedType {
            sql: type_text.trim().to_string(),
            warnings: vec![ConversionWarning::new(
                WarningKind::DataTypeMismatch,
                Severity::Warning,
                format!("Could not parse data type '{}'", type_text.trim()),
            )],
        };
    };

    let mut warnings = Vec::new();

    // TINYINT(1) is MySQL's boolean spelling.
    if source == Dialect::MySql && parsed.base == "TINYINT" && parsed.precision.as_deref() == Some("1") {
        let sql = if target == Dialect::PostgreSql { "BOOLEAN" } else { "NUMBER(1)" };
        return MappedType {
            sql: sql.to_string(),
            warnings,
        };
    }

    let key = parsed.key();
    let rule = match type_rule(source, target, &key) {
        Some(rule) => rule,
        None => match type_rule(source, target, &parsed.base) {
            Some(rule) if parsed.time_zone.is_some() => {
                warnings.push(ConversionWarning::new(
                    WarningKind::PartialSupport,
                    Severity::Info,
                    format!("Time zone qualifier of {} dropped for {}", parsed.base, target),
                ));
                rule
            }
            Some(rule) => rule,
            None => {
                return MappedType {
                    sql: type_text.trim().to_string(),
                    warnings: vec![ConversionWarning::new(
                        WarningKind::DataTypeMismatch,
                        Severity::Warning,
                        format!("No {} mapping for data type {}", target, key),
                    )
                    .with_suggestion("Choose an equivalent target type manually")],
                };
            }
        },
    };

    let mut sql = render(rule, &parsed, target, &mut warnings);

    if let Some(caveat) = rule.caveat {
        warnings.push(ConversionWarning::new(
            WarningKind::PartialSupport,
            Severity::Info,
            format!("{} -> {}: {}", key, rule.target_type, caveat),
        ));
    }

    if parsed.unsigned || parsed.zerofill {
        if target == Dialect::MySql {
            if parsed.unsigned {
                sql.push_str(" UNSIGNED");
            }
            if parsed.zerofill {
                sql.push_str(" ZEROFILL");
            }
        } else {
            warnings.push(
                ConversionWarning::new(
                    WarningKind::PartialSupport,
                    Severity::Info,
                    format!("UNSIGNED/ZEROFILL dropped from {}", parsed.base),
                )
                .with_suggestion("Add a CHECK (col >= 0) constraint if the range matters"),
            );
        }
    }

    if parsed.array {
        if target == Dialect::PostgreSql {
            sql.push_str("[]");
        } else {
            sql = if target == Dialect::MySql { "JSON" } else { "CLOB" }.to_string();
            warnings.push(ConversionWarning::new(
                WarningKind::DataTypeMismatch,
                Severity::Warning,
                format!("Array type {}[] stored as {}", parsed.base, sql),
            ));
        }
    }

    MappedType { sql, warnings }
}

fn render(
    rule: &TypeMappingRule,
    parsed: &ParsedType,
    target: Dialect,
    warnings: &mut Vec<ConversionWarning>,
) -> String {
    match rule.policy {
        PrecisionPolicy::Preserve => match parsed.precision_text() {
            Some(p) => with_precision(rule.target_type, &p),
            None => rule.target_type.to_string(),
        },
        PrecisionPolicy::Drop => rule.target_type.to_string(),
        PrecisionPolicy::Convert { max, default } => {
            let declared = parsed.precision_number();
            let precision = match (declared, max) {
                (Some(p), Some(max)) if p > max => {
                    warnings.push(ConversionWarning::new(
                        WarningKind::DataTypeMismatch,
                        Severity::Warning,
                        format!(
                            "{}({}) exceeds the {} limit; clamped to {}({})",
                            parsed.base, p, target, rule.target_type, max
                        ),
                    ));
                    Some(max)
                }
                (Some(p), _) => Some(p),
                (None, _) => default,
            };
            match (precision, parsed.scale) {
                (Some(p), Some(s)) => with_precision(rule.target_type, &format!("({},{})", p, s)),
                (Some(p), None) => with_precision(rule.target_type, &format!("({})", p)),
                (None, _) => rule.target_type.to_string(),
            }
        }
        PrecisionPolicy::MapToIntegerByPrecision => number_type(parsed, rule.target_type, target),
    }
}

/// Oracle `NUMBER(p[,s])`: integer widths for scale 0, exact decimal otherwise.
fn number_type(parsed: &ParsedType, decimal: &str, target: Dialect) -> String {
    let Some(precision) = parsed.precision_number() else {
        return match target {
            Dialect::MySql => "DECIMAL(65,30)".to_string(),
            _ => decimal.to_string(),
        };
    };
    match parsed.scale {
        Some(scale) if scale != 0 => format!("{}({},{})", decimal, precision, scale),
        _ => integer_for_precision(precision, target)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}({})", decimal, precision)),
    }
}

/// Narrowest integer type that holds every value of `precision` digits.
///
/// SMALLINT tops out at 32767, INTEGER at 2147483647 and BIGINT at
/// 9223372036854775807, so 4, 9 and 18 digits are the widest precisions
/// that cannot overflow: NUMBER(5) reaches 99999, NUMBER(10) and NUMBER(19)
/// likewise pass the next bound. Wider precisions stay NUMERIC.
pub fn integer_for_precision(precision: u32, target: Dialect) -> Option<&'static str> {
    match (precision, target) {
        (0..=4, _) => Some("SMALLINT"),
        (5..=9, Dialect::MySql) => Some("INT"),
        (5..=9, _) => Some("INTEGER"),
        (10..=18, _) => Some("BIGINT"),
        _ => None,
    }
}

/// Place `(p[,s])` after the first word, so that
/// `TIMESTAMP WITH TIME ZONE` becomes `TIMESTAMP(6) WITH TIME ZONE`.
fn with_precision(target_type: &str, precision: &str) -> String {
    if target_type.contains('(') {
        return target_type.to_string();
    }
    match target_type.find(" WITH") {
        Some(at) => format!("{}{}{}", &target_type[..at], precision, &target_type[at..]),
        None => format!("{}{}", target_type, precision),
    }
}

/// Reduce a target column type to one the MySQL `CAST` operator accepts.
pub fn mysql_cast_type(column_type: &str) -> String {
    let upper = column_type.trim().to_ascii_uppercase();
    let base = upper.split(['(', ' ']).next().unwrap_or("");
    match base {
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "INTEGER" | "BIGINT" | "BOOLEAN" => {
            if upper.contains("UNSIGNED") {
                "UNSIGNED".to_string()
            } else {
                "SIGNED".to_string()
            }
        }
        "DECIMAL" | "NUMERIC" => upper.replace("NUMERIC", "DECIMAL"),
        "DATE" => "DATE".to_string(),
        "DATETIME" | "TIMESTAMP" => "DATETIME".to_string(),
        "TIME" => "TIME".to_string(),
        "JSON" => "JSON".to_string(),
        "FLOAT" | "DOUBLE" | "REAL" => "DOUBLE".to_string(),
        "BINARY" | "VARBINARY" | "BLOB" | "LONGBLOB" => "BINARY".to_string(),
        _ => "CHAR".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(t: &str, s: Dialect, d: Dialect) -> String {
        convert_data_type(t, s, d).sql
    }

    #[test]
    fn test_number_by_precision() {
        assert_eq!(map("NUMBER(4)", Dialect::Oracle, Dialect::PostgreSql), "SMALLINT");
        assert_eq!(map("NUMBER(9,0)", Dialect::Oracle, Dialect::PostgreSql), "INTEGER");
        assert_eq!(map("NUMBER(9)", Dialect::Oracle, Dialect::MySql), "INT");
        assert_eq!(map("NUMBER(18)", Dialect::Oracle, Dialect::MySql), "BIGINT");
        assert_eq!(map("NUMBER(30)", Dialect::Oracle, Dialect::PostgreSql), "NUMERIC(30)");
        assert_eq!(map("NUMBER(10,2)", Dialect::Oracle, Dialect::MySql), "DECIMAL(10,2)");
        assert_eq!(map("NUMBER", Dialect::Oracle, Dialect::PostgreSql), "NUMERIC");
        assert_eq!(map("number", Dialect::Tibero, Dialect::MySql), "DECIMAL(65,30)");
    }

    #[test]
    fn test_precision_policies() {
        assert_eq!(map("VARCHAR2(100 BYTE)", Dialect::Oracle, Dialect::PostgreSql), "VARCHAR(100)");
        assert_eq!(map("CLOB", Dialect::Oracle, Dialect::MySql), "LONGTEXT");
        assert_eq!(map("DATETIME(3)", Dialect::MySql, Dialect::PostgreSql), "TIMESTAMP(3)");
        assert_eq!(map("VARCHAR", Dialect::PostgreSql, Dialect::Oracle), "VARCHAR2(4000)");
    }

    #[test]
    fn test_clamp_warns() {
        let mapped = convert_data_type("VARCHAR(10000)", Dialect::MySql, Dialect::Oracle);
        assert_eq!(mapped.sql, "VARCHAR2(4000)");
        assert_eq!(mapped.warnings[0].kind, WarningKind::DataTypeMismatch);
    }

    #[test]
    fn test_time_zone_suffix() {
        assert_eq!(
            map("TIMESTAMP(6) WITH TIME ZONE", Dialect::Oracle, Dialect::PostgreSql),
            "TIMESTAMPTZ(6)"
        );
        assert_eq!(
            map("timestamptz(3)", Dialect::PostgreSql, Dialect::Oracle),
            "TIMESTAMP(3) WITH TIME ZONE"
        );
    }

    #[test]
    fn test_unsigned_and_tinyint_bool() {
        let mapped = convert_data_type("INT UNSIGNED", Dialect::MySql, Dialect::PostgreSql);
        assert_eq!(mapped.sql, "INTEGER");
        assert_eq!(mapped.warnings.len(), 1);
        assert_eq!(map("TINYINT(1)", Dialect::MySql, Dialect::PostgreSql), "BOOLEAN");
    }

    #[test]
    fn test_unknown_type_passes_through() {
        let mapped = convert_data_type("GEOMETRY", Dialect::MySql, Dialect::PostgreSql);
        assert_eq!(mapped.sql, "GEOMETRY");
        assert_eq!(mapped.warnings[0].kind, WarningKind::DataTypeMismatch);
    }

    #[test]
    fn test_same_family_untouched() {
        assert_eq!(map("VARCHAR2(10)", Dialect::Oracle, Dialect::Tibero), "VARCHAR2(10)");
    }

    #[test]
    fn test_split_type() {
        assert_eq!(
            split_type("NUMBER(10,2) NOT NULL DEFAULT 0"),
            Some(("NUMBER(10,2)", " NOT NULL DEFAULT 0"))
        );
        assert_eq!(
            split_type("ENUM('a','b') NOT NULL"),
            Some(("ENUM('a','b')", " NOT NULL"))
        );
        let parsed = parse_type("ENUM('a','b')").unwrap();
        assert_eq!(parsed.args.as_deref(), Some("'a','b'"));
    }

    #[test]
    fn test_mysql_cast_type() {
        assert_eq!(mysql_cast_type("INTEGER"), "SIGNED");
        assert_eq!(mysql_cast_type("NUMERIC(10,2)"), "DECIMAL(10,2)");
        assert_eq!(mysql_cast_type("VARCHAR(20)"), "CHAR");
    }
}
