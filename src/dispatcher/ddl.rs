//! DDL handling: column types, identity columns, physical table options and
//! `CAST(... AS type)` targets.

use once_cell::sync::Lazy;
use regex::Regex;

use super::classify::StatementKind;
use crate::datatype::{convert_data_type, mysql_cast_type, split_type};
use crate::dialect::{Dialect, DialectPair};
use crate::result::{ConversionContext, WarningKind};
use crate::scan::{
    find_function_call, find_keyword_with, find_matching_bracket, replace_in_code,
    split_top_level, SqlMask,
};

/// Rewrite the DDL parts of one statement for `target`.
pub(crate) fn convert_ddl(
    sql: &str,
    kind: StatementKind,
    source: Dialect,
    target: Dialect,
    ctx: &mut ConversionContext,
) -> String {
    if DialectPair::new(source, target).same_family() {
        return sql.to_string();
    }
    let converted = match kind {
        StatementKind::CreateTable => convert_create_table(sql, source, target, ctx),
        StatementKind::AlterTable => convert_alter_table(sql, source, target, ctx),
        StatementKind::CreateIndex => convert_create_index(sql, source, target, ctx),
        _ => sql.to_string(),
    };
    convert_cast_types(&converted, source, target, ctx)
}

static CREATE_TABLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)^\s*CREATE\s+.*?\bTABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?([^\s(]+)"#).expect("valid create table pattern")
});

fn convert_create_table(sql: &str, source: Dialect, target: Dialect, ctx: &mut ConversionContext) -> String {
    let Some(caps) = CREATE_TABLE_RE.captures(sql) else {
        return sql.to_string();
    };
    let (table, name_end) = match caps.get(1) {
        Some(m) => (m.as_str().to_string(), m.end()),
        None => return sql.to_string(),
    };
    let after_name = sql[name_end..].trim_start();
    if !after_name.starts_with('(') {
        // CREATE TABLE ... AS SELECT: no column list to map.
        return sql.to_string();
    }
    let open = name_end + (sql[name_end..].len() - after_name.len()) + 1;
    let Some(close) = find_matching_bracket(sql, open) else {
        return sql.to_string();
    };
    let body = &sql[open..close - 1];

    let elements: Vec<String> = split_top_level(body, b',')
        .into_iter()
        .filter_map(|element| convert_table_element(&element, &table, source, target, ctx))
        .collect();
    let body = if body.contains('\n') {
        format!("\n    {}\n", elements.join(",\n    "))
    } else {
        elements.join(", ")
    };
    let tail = convert_table_tail(&sql[close..], source, target, ctx);
    format!("{}{}){}", &sql[..open], body, tail)
}

const CONSTRAINT_WORDS: &[&str] = &["CONSTRAINT", "PRIMARY", "UNIQUE", "FOREIGN", "CHECK", "EXCLUDE"];

static INLINE_INDEX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)^(?:(?:FULLTEXT|SPATIAL)\s+)?(?:KEY|INDEX)\s+(?:([^\s(]+)\s*)?\(\s*([A-Za-z_"`].*)\)\s*$"#)
        .expect("valid inline index pattern")
});

static UNIQUE_KEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)^UNIQUE\s+(?:KEY|INDEX)\s+(?:([^\s(]+)\s*)?\("#).expect("valid unique key pattern")
});

static USING_INDEX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\s+USING\s+INDEX(?:\s+TABLESPACE\s+"?\w+"?)?|\s+(?:ENABLE|DISABLE)(?:\s+(?:NO)?VALIDATE)?\b|\s+USING\s+(?:BTREE|HASH)\b"#)
        .expect("valid constraint state pattern")
});

fn first_word(text: &str) -> String {
    text.split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or("")
        .to_ascii_uppercase()
}

/// One element of a CREATE TABLE body. `None` drops the element.
fn convert_table_element(
    element: &str,
    table: &str,
    source: Dialect,
    target: Dialect,
    ctx: &mut ConversionContext,
) -> Option<String> {
    let word = first_word(element);
    if source == Dialect::MySql {
        if let Some(caps) = INLINE_INDEX_RE.captures(element) {
            let name = caps.get(1).map_or_else(|| format!("{}_idx", table), |m| m.as_str().to_string());
            let columns = caps.get(2).map_or("", |m| m.as_str());
            ctx.warn_with(
                WarningKind::PartialSupport,
                format!("Inline index {} is not valid in {} table definitions and was removed", name, target),
                format!("CREATE INDEX {} ON {} ({})", name, table, columns),
            );
            ctx.rule("inline KEY/INDEX → separate CREATE INDEX");
            return None;
        }
        if let Some(caps) = UNIQUE_KEY_RE.captures(element) {
            let head = match caps.get(1) {
                Some(name) => format!("CONSTRAINT {} UNIQUE (", name.as_str()),
                None => "UNIQUE (".to_string(),
            };
            let rest = caps.get(0).map_or(element, |m| &element[m.end()..]);
            ctx.rule("UNIQUE KEY → UNIQUE constraint");
            return Some(strip_constraint_state(&format!("{}{}", head, rest)));
        }
    }
    if CONSTRAINT_WORDS.contains(&word.as_str()) {
        return Some(strip_constraint_state(element));
    }
    Some(convert_column(element, source, target, ctx))
}

fn strip_constraint_state(element: &str) -> String {
    replace_in_code(element, &USING_INDEX_RE, |_| Some(String::new())).0
}

/// Split a column name (possibly quoted) from the rest of its definition.
fn split_column_name(definition: &str) -> Option<(&str, &str)> {
    let definition = definition.trim_start();
    let first = definition.chars().next()?;
    let end = match first {
        '"' | '`' => definition[1..].find(first)? + 2,
        _ => definition.find(char::is_whitespace)?,
    };
    Some((&definition[..end], &definition[end..]))
}

static AUTO_INCREMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*\bAUTO_INCREMENT\b").expect("valid auto_increment pattern"));

static IDENTITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s*\bGENERATED\s+(?:ALWAYS|BY\s+DEFAULT(?:\s+ON\s+NULL)?)\s+AS\s+IDENTITY(?:\s*\([^)]*\))?")
        .expect("valid identity pattern")
});

static COLUMN_COMMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*\bCOMMENT\s+'(?:[^']|'')*'").expect("valid column comment pattern"));

static COLUMN_CHARSET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s*\b(?:CHARACTER\s+SET|CHARSET|COLLATE)\s+\w+").expect("valid column charset pattern")
});

static ON_UPDATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s*\bON\s+UPDATE\s+CURRENT_TIMESTAMP(?:\s*\(\s*\d*\s*\))?").expect("valid on update pattern")
});

/// Convert one column definition: `name type [attributes]`.
fn convert_column(definition: &str, source: Dialect, target: Dialect, ctx: &mut ConversionContext) -> String {
    let Some((name, rest)) = split_column_name(definition) else {
        return definition.to_string();
    };
    let Some((type_text, tail)) = split_type(rest) else {
        return definition.to_string();
    };
    let mapped = convert_data_type(type_text, source, target);
    if !mapped.sql.eq_ignore_ascii_case(type_text) {
        ctx.rule(format!("column data types → {}", target));
    }
    for warning in mapped.warnings {
        ctx.push(warning);
    }

    let serial = source == Dialect::PostgreSql && type_text.to_ascii_uppercase().ends_with("SERIAL");
    let mut tail = tail.to_string();
    let mut identity = serial;
    if source == Dialect::MySql {
        let (stripped, n) = replace_in_code(&tail, &AUTO_INCREMENT_RE, |_| Some(String::new()));
        if n > 0 {
            tail = stripped;
            identity = true;
        }
    }
    if target == Dialect::MySql {
        let (stripped, n) = replace_in_code(&tail, &IDENTITY_RE, |_| Some(String::new()));
        if n > 0 {
            tail = stripped;
            identity = true;
        }
    }
    if source == Dialect::MySql {
        tail = strip_mysql_column_attributes(&tail, name, ctx);
    }

    let identity_clause = match (identity, target) {
        (false, _) => "",
        (true, Dialect::MySql) => {
            ctx.rule(if serial {
                "SERIAL → AUTO_INCREMENT"
            } else {
                "identity column → AUTO_INCREMENT"
            });
            " AUTO_INCREMENT"
        }
        (true, _) => {
            ctx.rule(if serial {
                "SERIAL → GENERATED BY DEFAULT AS IDENTITY"
            } else {
                "AUTO_INCREMENT → GENERATED BY DEFAULT AS IDENTITY"
            });
            if target.is_oracle_family() {
                ctx.info(
                    WarningKind::PartialSupport,
                    format!("Identity column {} requires Oracle 12c or later", name),
                );
            }
            " GENERATED BY DEFAULT AS IDENTITY"
        }
    };
    format!("{} {}{}{}", name, mapped.sql, identity_clause, tail)
}

fn strip_mysql_column_attributes(tail: &str, column: &str, ctx: &mut ConversionContext) -> String {
    let (tail, comments) = replace_in_code(tail, &COLUMN_COMMENT_RE, |_| Some(String::new()));
    if comments > 0 {
        ctx.info(
            WarningKind::SyntaxDifference,
            format!("Column comment on {} removed", column),
        );
        ctx.rule("column COMMENT removed (use COMMENT ON COLUMN)");
    }
    let (tail, charsets) = replace_in_code(&tail, &COLUMN_CHARSET_RE, |_| Some(String::new()));
    if charsets > 0 {
        ctx.rule("column CHARACTER SET/COLLATE removed");
    }
    let (tail, on_update) = replace_in_code(&tail, &ON_UPDATE_RE, |_| Some(String::new()));
    if on_update > 0 {
        ctx.warn_with(
            WarningKind::PartialSupport,
            format!("ON UPDATE CURRENT_TIMESTAMP on {} has no column-level equivalent", column),
            "Maintain the column with a BEFORE UPDATE trigger",
        );
    }
    tail
}

static ORACLE_PHYSICAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?ix)\s*\b(?:
            TABLESPACE\s+"?\w+"?
          | (?:PCTFREE|PCTUSED|INITRANS|MAXTRANS)\s+\d+
          | STORAGE\s*\([^)]*\)
          | LOB\s*\([^)]*\)\s*STORE\s+AS(?:\s+(?:SECUREFILE|BASICFILE))?(?:\s+\w+)?(?:\s*\([^)]*\))?
          | SEGMENT\s+CREATION\s+(?:IMMEDIATE|DEFERRED)
          | ORGANIZATION\s+HEAP
          | (?:ROW\s+STORE\s+)?COMPRESS(?:\s+(?:BASIC|ADVANCED|FOR\s+\w+))?
          | NOCOMPRESS | NOLOGGING | LOGGING | NOPARALLEL | PARALLEL(?:\s+\d+)?
          | NOCACHE | CACHE | MONITORING | NOMONITORING
          | ENABLE\s+ROW\s+MOVEMENT | DISABLE\s+ROW\s+MOVEMENT
          | COMPUTE\s+STATISTICS
        )\b"#,
    )
    .expect("valid oracle storage pattern")
});

static MYSQL_TABLE_OPTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?ix)\s*,?\s*\b(?:
            ENGINE\s*=?\s*\w+
          | (?:DEFAULT\s+)?(?:CHARSET|CHARACTER\s+SET)\s*=?\s*\w+
          | (?:DEFAULT\s+)?COLLATE\s*=?\s*\w+
          | AUTO_INCREMENT\s*=?\s*\d+
          | ROW_FORMAT\s*=?\s*\w+
          | STATS_PERSISTENT\s*=?\s*\w+
          | KEY_BLOCK_SIZE\s*=?\s*\d+
          | COMMENT\s*=?\s*'(?:[^']|'')*'
        )"#,
    )
    .expect("valid mysql table option pattern")
});

static POSTGRES_TABLE_OPTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\s*\b(?:WITH\s*\([^)]*\)|WITHOUT\s+OIDS|TABLESPACE\s+"?\w+"?)"#)
        .expect("valid postgres table option pattern")
});

static ENGINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bENGINE\s*=").expect("valid engine pattern"));

/// Text after the column list: physical options of the source dialect are
/// dropped, and MySQL tables get an explicit engine and charset.
fn convert_table_tail(tail: &str, source: Dialect, target: Dialect, ctx: &mut ConversionContext) -> String {
    let (mut tail, removed) = strip_physical_options(tail, source);
    if removed > 0 {
        ctx.info(
            WarningKind::SyntaxDifference,
            format!("{} storage and table options removed", source),
        );
        ctx.rule(format!("{} storage clauses removed", source));
    }
    if target == Dialect::MySql && !ENGINE_RE.is_match(&tail) {
        let trimmed = tail.trim_end().len();
        tail.insert_str(trimmed, " ENGINE=InnoDB DEFAULT CHARSET=utf8mb4");
        ctx.rule("CREATE TABLE → ENGINE=InnoDB DEFAULT CHARSET=utf8mb4");
    }
    tail
}

fn strip_physical_options(text: &str, source: Dialect) -> (String, usize) {
    let re: &Regex = match source.family() {
        Dialect::MySql => &MYSQL_TABLE_OPTION_RE,
        Dialect::PostgreSql => &POSTGRES_TABLE_OPTION_RE,
        _ => &ORACLE_PHYSICAL_RE,
    };
    replace_in_code(text, re, |_| Some(String::new()))
}

static INDEX_METHOD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*\bUSING\s+(\w+)").expect("valid index method pattern"));

static INDEX_MODIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(BITMAP|CONCURRENTLY|FULLTEXT|SPATIAL)\s+").expect("valid index modifier pattern"));

fn convert_create_index(sql: &str, source: Dialect, target: Dialect, ctx: &mut ConversionContext) -> String {
    let (out, _) = replace_in_code(sql, &INDEX_MODIFIER_RE, |caps| {
        let modifier = caps[1].to_ascii_uppercase();
        ctx.warn(
            WarningKind::PartialSupport,
            format!("{} index option is not available in {} and was removed", modifier, target),
        );
        Some(String::new())
    });
    let (out, _) = replace_in_code(&out, &INDEX_METHOD_RE, |caps| {
        let method = caps[1].to_ascii_uppercase();
        if method != "BTREE" {
            ctx.warn(
                WarningKind::PartialSupport,
                format!("Index method {} removed; {} uses its default index type", method, target),
            );
        }
        Some(String::new())
    });
    // Physical options only ever follow the column list.
    let Some(close) = out.find('(').and_then(|open| find_matching_bracket(&out, open + 1)) else {
        return out;
    };
    let (tail, removed) = strip_physical_options(&out[close..], source);
    if removed > 0 {
        ctx.rule(format!("{} storage clauses removed", source));
    }
    format!("{}{}", &out[..close], tail)
}

static ALTER_TABLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^(\s*ALTER\s+TABLE\s+(?:IF\s+EXISTS\s+)?(?:ONLY\s+)?\S+\s+)(.*)$").expect("valid alter table pattern")
});

static ADD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^ADD\s+(?:COLUMN\s+)?(?:IF\s+NOT\s+EXISTS\s+)?(.*)$").expect("valid add column pattern")
});

static MODIFY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)^MODIFY\s+(?:COLUMN\s+)?(.*)$").expect("valid modify column pattern"));

static ALTER_TYPE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^ALTER\s+(?:COLUMN\s+)?(\S+)\s+(?:SET\s+DATA\s+)?TYPE\s+(.*?)(?:\s+USING\s+(.*))?$")
        .expect("valid alter column type pattern")
});

static ALTER_NULL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^ALTER\s+(?:COLUMN\s+)?(\S+)\s+(SET|DROP)\s+NOT\s+NULL$").expect("valid alter null pattern")
});

fn convert_alter_table(sql: &str, source: Dialect, target: Dialect, ctx: &mut ConversionContext) -> String {
    let Some(caps) = ALTER_TABLE_RE.captures(sql) else {
        return sql.to_string();
    };
    let head = caps.get(1).map_or("", |m| m.as_str());
    let actions = caps.get(2).map_or("", |m| m.as_str());
    let converted: Vec<String> = split_top_level(actions, b',')
        .iter()
        .flat_map(|action| convert_alter_action(action, source, target, ctx))
        .collect();
    format!("{}{}", head, converted.join(", "))
}

fn convert_alter_action(action: &str, source: Dialect, target: Dialect, ctx: &mut ConversionContext) -> Vec<String> {
    if let Some(caps) = ADD_RE.captures(action) {
        let body = caps.get(1).map_or("", |m| m.as_str()).trim();
        if CONSTRAINT_WORDS.contains(&first_word(body).as_str()) {
            return vec![action.to_string()];
        }
        let columns: Vec<String> = match body.strip_prefix('(').and_then(|b| b.strip_suffix(')')) {
            Some(list) => split_top_level(list, b',')
                .iter()
                .map(|c| convert_column(c, source, target, ctx))
                .collect(),
            None => vec![convert_column(body, source, target, ctx)],
        };
        return match target {
            Dialect::PostgreSql | Dialect::MySql => columns.iter().map(|c| format!("ADD COLUMN {}", c)).collect(),
            _ if columns.len() == 1 => vec![format!("ADD {}", columns[0])],
            _ => vec![format!("ADD ({})", columns.join(", "))],
        };
    }

    if let Some(caps) = MODIFY_RE.captures(action) {
        let body = caps.get(1).map_or("", |m| m.as_str()).trim();
        let body = body
            .strip_prefix('(')
            .and_then(|b| b.strip_suffix(')'))
            .unwrap_or(body);
        return split_top_level(body, b',')
            .iter()
            .flat_map(|column| modify_column(column, source, target, ctx))
            .collect();
    }

    if let Some(caps) = ALTER_TYPE_RE.captures(action) {
        let column = caps.get(1).map_or("", |m| m.as_str());
        let type_text = caps.get(2).map_or("", |m| m.as_str());
        if caps.get(3).is_some() {
            ctx.warn(
                WarningKind::ManualReviewNeeded,
                format!("USING conversion expression for {} dropped", column),
            );
        }
        let mapped = convert_data_type(type_text, source, target);
        for warning in mapped.warnings {
            ctx.push(warning);
        }
        ctx.rule(format!("ALTER COLUMN TYPE → {} syntax", target));
        return vec![match target {
            Dialect::MySql => {
                ctx.warn(
                    WarningKind::PartialSupport,
                    format!("MODIFY COLUMN redefines {} entirely; restate NOT NULL and DEFAULT", column),
                );
                format!("MODIFY COLUMN {} {}", column, mapped.sql)
            }
            Dialect::PostgreSql => format!("ALTER COLUMN {} TYPE {}", column, mapped.sql),
            _ => format!("MODIFY {} {}", column, mapped.sql),
        }];
    }

    if let Some(caps) = ALTER_NULL_RE.captures(action) {
        if target.is_oracle_family() {
            let column = caps.get(1).map_or("", |m| m.as_str());
            let nullability = if caps[2].eq_ignore_ascii_case("SET") { "NOT NULL" } else { "NULL" };
            ctx.rule(format!("ALTER COLUMN SET/DROP NOT NULL → {} syntax", target));
            return vec![format!("MODIFY {} {}", column, nullability)];
        }
        if target == Dialect::MySql {
            ctx.warn_with(
                WarningKind::ManualReviewNeeded,
                "MySQL changes nullability only by redefining the column",
                "MODIFY COLUMN <column> <type> [NOT] NULL",
            );
        }
    }
    vec![action.to_string()]
}

static NULLABILITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(NOT\s+NULL|NULL)\s*$").expect("valid nullability pattern"));

/// `MODIFY column type [NOT NULL]` for `target`.
fn modify_column(definition: &str, source: Dialect, target: Dialect, ctx: &mut ConversionContext) -> Vec<String> {
    let converted = convert_column(definition, source, target, ctx);
    match target {
        Dialect::MySql => vec![format!("MODIFY COLUMN {}", converted)],
        Dialect::Oracle | Dialect::Tibero => vec![format!("MODIFY {}", converted)],
        Dialect::PostgreSql => {
            let Some((name, rest)) = split_column_name(&converted) else {
                return vec![format!("ALTER COLUMN {}", converted)];
            };
            let Some((type_text, tail)) = split_type(rest) else {
                return vec![format!("ALTER COLUMN {}", converted)];
            };
            ctx.rule("MODIFY → ALTER COLUMN TYPE");
            let mut actions = vec![format!("ALTER COLUMN {} TYPE {}", name, type_text)];
            match NULLABILITY_RE.captures(tail) {
                Some(caps) if caps[1].to_ascii_uppercase().starts_with("NOT") => {
                    actions.push(format!("ALTER COLUMN {} SET NOT NULL", name));
                }
                Some(_) => actions.push(format!("ALTER COLUMN {} DROP NOT NULL", name)),
                None if !tail.trim().is_empty() => ctx.warn(
                    WarningKind::ManualReviewNeeded,
                    format!("Column attributes '{}' of {} need separate ALTER COLUMN actions", tail.trim(), name),
                ),
                None => {}
            }
            actions
        }
    }
}

/// Map the type of every `CAST(expr AS type)`, nested casts included.
fn convert_cast_types(sql: &str, source: Dialect, target: Dialect, ctx: &mut ConversionContext) -> String {
    let mut current = sql.to_string();
    let mut from = 0;
    let mut changed = false;
    while let Some(call) = find_function_call(&current, "CAST", from) {
        let args = call.args(&current).to_string();
        from = call.open;
        let mask = SqlMask::new(&args);
        let mut last_as = None;
        let mut search = 0;
        while let Some((start, end)) = find_keyword_with(&mask, &args, "AS", search) {
            last_as = Some((start, end));
            search = end;
        }
        let Some((as_start, as_end)) = last_as else {
            continue;
        };
        let type_text = args[as_end..].trim();
        let mapped = cast_type(type_text, source, target, ctx);
        if mapped != type_text {
            let replacement = format!("{} AS {}", args[..as_start].trim_end(), mapped);
            current.replace_range(call.open..call.end - 1, &replacement);
            changed = true;
        }
    }
    if changed {
        ctx.rule(format!("CAST target types → {}", target));
    }
    current
}

fn cast_type(type_text: &str, source: Dialect, target: Dialect, ctx: &mut ConversionContext) -> String {
    if source == Dialect::MySql {
        let upper = type_text.to_ascii_uppercase();
        let words: Vec<&str> = upper.split_whitespace().collect();
        let special = match words.as_slice() {
            ["SIGNED" | "UNSIGNED"] | ["SIGNED" | "UNSIGNED", "INT" | "INTEGER"] => {
                Some(if target == Dialect::PostgreSql { "BIGINT" } else { "NUMBER(19)" })
            }
            ["CHAR"] => Some(if target == Dialect::PostgreSql { "TEXT" } else { "VARCHAR2(4000)" }),
            _ => None,
        };
        if let Some(special) = special {
            return special.to_string();
        }
    }
    let mapped = convert_data_type(type_text, source, target);
    for warning in mapped.warnings {
        ctx.push(warning);
    }
    match target {
        Dialect::MySql => mysql_cast_type(&mapped.sql),
        _ => mapped.sql,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ddl(sql: &str, kind: StatementKind, source: Dialect, target: Dialect) -> (String, ConversionContext) {
        let mut ctx = ConversionContext::default();
        let out = convert_ddl(sql, kind, source, target, &mut ctx);
        (out, ctx)
    }

    #[test]
    fn test_oracle_table_to_postgres() {
        let sql = "CREATE TABLE emp (id NUMBER(9) NOT NULL, name VARCHAR2(100), hired DATE) TABLESPACE users PCTFREE 10";
        let (out, ctx) = ddl(sql, StatementKind::CreateTable, Dialect::Oracle, Dialect::PostgreSql);
        assert_eq!(
            out,
            "CREATE TABLE emp (id INTEGER NOT NULL, name VARCHAR(100), hired TIMESTAMP(0))"
        );
        assert!(ctx.applied_rules.iter().any(|r| r == "Oracle storage clauses removed"));
    }

    #[test]
    fn test_mysql_table_to_postgres() {
        let sql = "CREATE TABLE t (\n  id INT NOT NULL AUTO_INCREMENT,\n  name VARCHAR(50) COMMENT 'display',\n  PRIMARY KEY (id),\n  KEY idx_name (name)\n) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4";
        let (out, ctx) = ddl(sql, StatementKind::CreateTable, Dialect::MySql, Dialect::PostgreSql);
        assert_eq!(
            out,
            "CREATE TABLE t (\n    id INTEGER GENERATED BY DEFAULT AS IDENTITY NOT NULL,\n    name VARCHAR(50),\n    PRIMARY KEY (id)\n)"
        );
        let index = ctx
            .warnings
            .iter()
            .find(|w| w.message.contains("idx_name"))
            .expect("inline index warning");
        assert_eq!(index.suggestion.as_deref(), Some("CREATE INDEX idx_name ON t (name)"));
    }

    #[test]
    fn test_serial_to_mysql_gets_engine() {
        let (out, _) = ddl(
            "CREATE TABLE t (id BIGSERIAL PRIMARY KEY, label TEXT)",
            StatementKind::CreateTable,
            Dialect::PostgreSql,
            Dialect::MySql,
        );
        assert_eq!(
            out,
            "CREATE TABLE t (id BIGINT AUTO_INCREMENT PRIMARY KEY, label LONGTEXT) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"
        );
    }

    #[test]
    fn test_identity_to_mysql() {
        let (out, _) = ddl(
            "CREATE TABLE t (id NUMBER(10) GENERATED ALWAYS AS IDENTITY PRIMARY KEY)",
            StatementKind::CreateTable,
            Dialect::Oracle,
            Dialect::MySql,
        );
        assert_eq!(
            out,
            "CREATE TABLE t (id BIGINT AUTO_INCREMENT PRIMARY KEY) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"
        );
    }

    #[test]
    fn test_alter_table_actions() {
        let (out, _) = ddl(
            "ALTER TABLE t MODIFY name VARCHAR2(200) NOT NULL",
            StatementKind::AlterTable,
            Dialect::Oracle,
            Dialect::PostgreSql,
        );
        assert_eq!(
            out,
            "ALTER TABLE t ALTER COLUMN name TYPE VARCHAR(200), ALTER COLUMN name SET NOT NULL"
        );

        let (out, _) = ddl(
            "ALTER TABLE t ADD (a NUMBER(4), b CLOB)",
            StatementKind::AlterTable,
            Dialect::Oracle,
            Dialect::PostgreSql,
        );
        assert_eq!(out, "ALTER TABLE t ADD COLUMN a SMALLINT, ADD COLUMN b TEXT");

        let (out, _) = ddl(
            "ALTER TABLE t ALTER COLUMN c TYPE TEXT",
            StatementKind::AlterTable,
            Dialect::PostgreSql,
            Dialect::Oracle,
        );
        assert_eq!(out, "ALTER TABLE t MODIFY c CLOB");
    }

    #[test]
    fn test_cast_targets() {
        let (out, _) = ddl(
            "SELECT CAST(CAST(x AS NUMBER(4)) AS VARCHAR2(10)) FROM t",
            StatementKind::Select,
            Dialect::Oracle,
            Dialect::MySql,
        );
        assert_eq!(out, "SELECT CAST(CAST(x AS SIGNED) AS CHAR) FROM t");

        let (out, _) = ddl("SELECT CAST(a AS SIGNED) FROM t", StatementKind::Select, Dialect::MySql, Dialect::PostgreSql);
        assert_eq!(out, "SELECT CAST(a AS BIGINT) FROM t");
    }

    #[test]
    fn test_same_family_untouched() {
        let sql = "CREATE TABLE t (a NUMBER) TABLESPACE users";
        let (out, ctx) = ddl(sql, StatementKind::CreateTable, Dialect::Oracle, Dialect::Tibero);
        assert_eq!(out, sql);
        assert!(ctx.applied_rules.is_empty());
    }
}
