//! End-to-end conversions through the public API.

use pretty_assertions::assert_eq;
use sqlmorph::prelude::*;
use sqlmorph::convert;

fn run(sql: &str, source: Dialect, target: Dialect) -> ConversionResult {
    convert(sql, source, target, &ConversionOptions::default())
}

#[test]
fn test_same_dialect_is_untouched() {
    let sql = "SELECT DECODE(a, 1, 'x') FROM dual WHERE ROWNUM <= 5";
    let result = run(sql, Dialect::Tibero, Dialect::Tibero);
    assert_eq!(result.converted_sql, sql);
    assert!(result.warnings.is_empty());
    assert_eq!(result.source_dialect, Dialect::Tibero);
}

#[test]
fn test_nested_decode() {
    let result = run(
        "SELECT DECODE(DECODE(a, 1, 2, 3), 2, 'x', 'y') FROM t",
        Dialect::Oracle,
        Dialect::PostgreSql,
    );
    assert!(!result.converted_sql.to_uppercase().contains("DECODE"));
    assert_eq!(result.converted_sql.matches("CASE").count(), 2);
    assert!(result.applied_rules.contains(&"DECODE → CASE".to_string()));
}

#[test]
fn test_connect_by_to_recursive_cte() {
    let result = run(
        "SELECT id, name FROM employees START WITH manager_id IS NULL CONNECT BY PRIOR id = manager_id",
        Dialect::Oracle,
        Dialect::PostgreSql,
    );
    assert!(result.converted_sql.starts_with("WITH RECURSIVE hierarchy AS ("));
    assert!(result.converted_sql.contains("JOIN hierarchy ON employees.manager_id = hierarchy.id"));
    assert!(!result.converted_sql.contains("CONNECT BY"));
    assert!(result
        .applied_rules
        .contains(&"CONNECT BY → WITH RECURSIVE".to_string()));
}

#[test]
fn test_rownum_paging() {
    let result = run("SELECT * FROM orders WHERE ROWNUM <= 10", Dialect::Oracle, Dialect::MySql);
    assert_eq!(result.converted_sql, "SELECT * FROM orders LIMIT 10");

    let result = run("SELECT * FROM orders LIMIT 10", Dialect::PostgreSql, Dialect::Oracle);
    assert_eq!(result.converted_sql, "SELECT * FROM orders FETCH NEXT 10 ROWS ONLY");

    let result = run("SELECT * FROM orders LIMIT 10 OFFSET 20", Dialect::MySql, Dialect::Tibero);
    assert_eq!(
        result.converted_sql,
        "SELECT * FROM (SELECT paged.*, ROWNUM AS rn FROM (SELECT * FROM orders) paged WHERE ROWNUM <= 30) WHERE rn > 20"
    );
}

#[test]
fn test_merge_to_postgres_upsert() {
    let result = run(
        "MERGE INTO t USING s ON (t.id = s.id) \
         WHEN MATCHED THEN UPDATE SET v = s.v \
         WHEN NOT MATCHED THEN INSERT (id,v) VALUES (s.id,s.v);",
        Dialect::Oracle,
        Dialect::PostgreSql,
    );
    assert_eq!(
        result.converted_sql,
        "INSERT INTO t (id, v) SELECT s.id, s.v FROM s ON CONFLICT (id) DO UPDATE SET v = EXCLUDED.v;"
    );
}

#[test]
fn test_merge_to_mysql_upsert() {
    let result = run(
        "MERGE INTO t USING s ON (t.id = s.id) \
         WHEN MATCHED THEN UPDATE SET v = s.v \
         WHEN NOT MATCHED THEN INSERT (id,v) VALUES (s.id,s.v)",
        Dialect::Oracle,
        Dialect::MySql,
    );
    assert_eq!(
        result.converted_sql,
        "INSERT INTO t (id, v) SELECT s.id, s.v FROM s ON DUPLICATE KEY UPDATE v = VALUES(v)"
    );
}

#[test]
fn test_sequence_script() {
    let result = run(
        "CREATE SEQUENCE emp_seq START WITH 1 INCREMENT BY 1 NOCACHE;\n\
         INSERT INTO emp (id) VALUES (emp_seq.NEXTVAL);",
        Dialect::Oracle,
        Dialect::PostgreSql,
    );
    let statements: Vec<&str> = result.converted_sql.split(";\n\n").collect();
    assert_eq!(statements.len(), 2);
    assert!(statements[0].starts_with("CREATE SEQUENCE emp_seq START WITH 1 INCREMENT BY 1"));
    assert_eq!(statements[1], "INSERT INTO emp (id) VALUES (nextval('emp_seq'));");
}

#[test]
fn test_literals_are_preserved() {
    let result = run(
        "SELECT 'NVL(x, 1); SYSDATE' AS note, NVL(a, 0) FROM t",
        Dialect::Oracle,
        Dialect::PostgreSql,
    );
    assert_eq!(
        result.converted_sql,
        "SELECT 'NVL(x, 1); SYSDATE' AS note, COALESCE(a, 0) FROM t"
    );
}

#[test]
fn test_include_warnings_off() {
    let options = ConversionOptions {
        include_warnings: false,
        ..Default::default()
    };
    let result = convert("SELECT MONTHS_BETWEEN(a, b) FROM t", Dialect::Oracle, Dialect::PostgreSql, &options);
    assert!(result.warnings.is_empty());
}

#[test]
fn test_unsupported_function_needs_review() {
    let result = run("SELECT MONTHS_BETWEEN(a, b) FROM t", Dialect::Oracle, Dialect::PostgreSql);
    assert!(result.needs_review());
    assert!(!result.has_errors());
}

#[test]
fn test_dialect_aliases() {
    assert_eq!("pg".parse::<Dialect>().unwrap(), Dialect::PostgreSql);
    assert_eq!("MariaDB".parse::<Dialect>().unwrap(), Dialect::MySql);
    assert!(matches!(
        "sybase".parse::<Dialect>(),
        Err(ConvertError::UnknownDialect(_))
    ));
}
