//! Rule sets per dialect pair. Order matters: a more specific rule
//! (`TRUNC(SYSDATE)`) runs before the general one (`SYSDATE`).

use crate::dialect::{Dialect, DialectPair};

use super::builders::*;
use super::RewriteRule;

const ILIKE_OPERANDS: &str =
    r"(?i)([\w$.]+|'(?:[^']|'')*')\s+(NOT\s+)?ILIKE\s+([\w$.]+|'(?:[^']|'')*')";

/// Rules for a pair; Tibero uses Oracle's rules on either side.
pub fn for_pair(pair: DialectPair) -> Vec<RewriteRule> {
    match (pair.source.family(), pair.target.family()) {
        (Dialect::Oracle, Dialect::PostgreSql) => oracle_to_postgres(),
        (Dialect::Oracle, Dialect::MySql) => oracle_to_mysql(),
        (Dialect::PostgreSql, Dialect::Oracle) => postgres_to_oracle(),
        (Dialect::PostgreSql, Dialect::MySql) => postgres_to_mysql(),
        (Dialect::MySql, Dialect::PostgreSql) => mysql_to_postgres(),
        (Dialect::MySql, Dialect::Oracle) => mysql_to_oracle(),
        _ => Vec::new(),
    }
}

fn oracle_to_postgres() -> Vec<RewriteRule> {
    vec![
        RewriteRule::nested("DECODE → CASE", "DECODE", decode_to_case),
        RewriteRule::nested("NVL2 → CASE", "NVL2", nvl2_to_case),
        RewriteRule::replace("NVL → COALESCE", r"(?i)\bNVL\s*\(", "COALESCE("),
        RewriteRule::replace(
            "TRUNC(SYSDATE) → CURRENT_DATE",
            r"(?i)\bTRUNC\s*\(\s*SYSDATE\s*\)",
            "CURRENT_DATE",
        ),
        RewriteRule::replace("SYSTIMESTAMP → CURRENT_TIMESTAMP", r"(?i)\bSYSTIMESTAMP\b", "CURRENT_TIMESTAMP"),
        RewriteRule::replace("SYSDATE → CURRENT_TIMESTAMP", r"(?i)\bSYSDATE\b", "CURRENT_TIMESTAMP"),
        RewriteRule::replace("FROM DUAL removed", r"(?i)\s+FROM\s+DUAL\b", ""),
        RewriteRule::replace("MINUS → EXCEPT", r"(?i)\bMINUS\b", "EXCEPT"),
        RewriteRule::replace("SYS_GUID() → gen_random_uuid()", r"(?i)\bSYS_GUID\s*\(\s*\)", "gen_random_uuid()"),
        RewriteRule::nested("TO_NUMBER → CAST AS NUMERIC", "TO_NUMBER", to_number_postgres),
        RewriteRule::nested("INSTR → STRPOS", "INSTR", instr_to_strpos),
        RewriteRule::nested("ADD_MONTHS → interval arithmetic", "ADD_MONTHS", add_months_postgres),
        RewriteRule::aggregate("LISTAGG → STRING_AGG", "LISTAGG", listagg_to_string_agg),
        RewriteRule::call("TO_CHAR format converted", "TO_CHAR", to_char_oracle_to_postgres),
        RewriteRule::call("TO_DATE format converted", "TO_DATE", to_date_oracle_to_postgres),
    ]
}

fn oracle_to_mysql() -> Vec<RewriteRule> {
    vec![
        RewriteRule::nested("DECODE → CASE", "DECODE", decode_to_case),
        RewriteRule::nested("NVL2 → CASE", "NVL2", nvl2_to_case),
        RewriteRule::replace("NVL → IFNULL", r"(?i)\bNVL\s*\(", "IFNULL("),
        RewriteRule::replace(
            "TRUNC(SYSDATE) → CURDATE()",
            r"(?i)\bTRUNC\s*\(\s*SYSDATE\s*\)",
            "CURDATE()",
        ),
        RewriteRule::replace(
            "SYSTIMESTAMP → CURRENT_TIMESTAMP(6)",
            r"(?i)\bSYSTIMESTAMP\b",
            "CURRENT_TIMESTAMP(6)",
        ),
        RewriteRule::replace("SYSDATE → NOW()", r"(?i)\bSYSDATE\b", "NOW()"),
        RewriteRule::replace("MINUS → EXCEPT", r"(?i)\bMINUS\b", "EXCEPT"),
        RewriteRule::replace("SYS_GUID() → UUID()", r"(?i)\bSYS_GUID\s*\(\s*\)", "UUID()"),
        RewriteRule::nested("TO_NUMBER → CAST AS DECIMAL", "TO_NUMBER", to_number_mysql),
        RewriteRule::nested("ADD_MONTHS → DATE_ADD", "ADD_MONTHS", add_months_mysql),
        RewriteRule::aggregate("LISTAGG → GROUP_CONCAT", "LISTAGG", listagg_to_group_concat),
        RewriteRule::nested("TO_CHAR → DATE_FORMAT", "TO_CHAR", to_char_oracle_to_mysql),
        RewriteRule::nested("TO_DATE → STR_TO_DATE", "TO_DATE", to_date_oracle_to_mysql),
    ]
}

fn postgres_to_oracle() -> Vec<RewriteRule> {
    vec![
        RewriteRule::scan("::type → CAST", pg_casts_to_oracle),
        RewriteRule::replace("NOW() → SYSTIMESTAMP", r"(?i)\bNOW\s*\(\s*\)", "SYSTIMESTAMP"),
        RewriteRule::replace("gen_random_uuid() → SYS_GUID()", r"(?i)\bgen_random_uuid\s*\(\s*\)", "SYS_GUID()"),
        RewriteRule::replace("RANDOM() → DBMS_RANDOM.VALUE", r"(?i)\bRANDOM\s*\(\s*\)", "DBMS_RANDOM.VALUE"),
        RewriteRule::replace("ILIKE → UPPER() LIKE UPPER()", ILIKE_OPERANDS, "UPPER(${1}) ${2}LIKE UPPER(${3})"),
        RewriteRule::replace("EXCEPT → MINUS", r"(?i)\bEXCEPT\b", "MINUS"),
        RewriteRule::nested("STRING_AGG → LISTAGG", "STRING_AGG", string_agg_to_listagg),
        RewriteRule::build(
            "TRUE/FALSE → 1/0",
            r"(?i)(\bIS\s+(?:NOT\s+)?)?\b(TRUE|FALSE)\b",
            boolean_literal_oracle,
        ),
        RewriteRule::call("TO_CHAR format converted", "TO_CHAR", to_char_postgres_to_oracle),
        RewriteRule::call("TO_TIMESTAMP format converted", "TO_TIMESTAMP", to_timestamp_postgres_to_oracle),
    ]
}

fn postgres_to_mysql() -> Vec<RewriteRule> {
    vec![
        RewriteRule::scan("::type → CAST", pg_casts_to_mysql),
        RewriteRule::replace("ILIKE → LIKE", r"(?i)\bILIKE\b", "LIKE"),
        RewriteRule::nested("STRING_AGG → GROUP_CONCAT", "STRING_AGG", string_agg_to_group_concat),
        RewriteRule::replace("gen_random_uuid() → UUID()", r"(?i)\bgen_random_uuid\s*\(\s*\)", "UUID()"),
        RewriteRule::replace("RANDOM() → RAND()", r"(?i)\bRANDOM\s*\(\s*\)", "RAND()"),
        RewriteRule::nested("TO_CHAR → DATE_FORMAT", "TO_CHAR", to_char_postgres_to_mysql),
        RewriteRule::nested("TO_DATE → STR_TO_DATE", "TO_DATE", to_date_postgres_to_mysql),
    ]
}

fn mysql_to_postgres() -> Vec<RewriteRule> {
    vec![
        RewriteRule::nested("IF → CASE", "IF", if_to_case),
        RewriteRule::replace("IFNULL → COALESCE", r"(?i)\bIFNULL\s*\(", "COALESCE("),
        RewriteRule::replace("backtick identifiers → double quotes", r"`([^`]*)`", "\"${1}\""),
        RewriteRule::replace("CURDATE() → CURRENT_DATE", r"(?i)\bCURDATE\s*\(\s*\)", "CURRENT_DATE"),
        RewriteRule::replace("CURTIME() → CURRENT_TIME", r"(?i)\bCURTIME\s*\(\s*\)", "CURRENT_TIME"),
        RewriteRule::replace("RAND() → RANDOM()", r"(?i)\bRAND\s*\(\s*\)", "RANDOM()"),
        RewriteRule::replace("UUID() → gen_random_uuid()", r"(?i)\bUUID\s*\(\s*\)", "gen_random_uuid()"),
        RewriteRule::nested("GROUP_CONCAT → STRING_AGG", "GROUP_CONCAT", group_concat_to_string_agg),
        RewriteRule::nested("DATE_ADD → interval arithmetic", "DATE_ADD", date_add_postgres),
        RewriteRule::nested("DATE_SUB → interval arithmetic", "DATE_SUB", date_sub_postgres),
        RewriteRule::replace(
            "LIMIT a, b → LIMIT b OFFSET a",
            r"(?i)\bLIMIT\s+(\d+)\s*,\s*(\d+)",
            "LIMIT ${2} OFFSET ${1}",
        ),
        RewriteRule::nested("DATE_FORMAT → TO_CHAR", "DATE_FORMAT", date_format_to_postgres),
        RewriteRule::nested("STR_TO_DATE → TO_DATE", "STR_TO_DATE", str_to_date_postgres),
    ]
}

fn mysql_to_oracle() -> Vec<RewriteRule> {
    vec![
        RewriteRule::nested("IF → CASE", "IF", if_to_case),
        RewriteRule::replace("IFNULL → NVL", r"(?i)\bIFNULL\s*\(", "NVL("),
        RewriteRule::replace("backtick identifiers → double quotes", r"`([^`]*)`", "\"${1}\""),
        RewriteRule::replace("NOW() → SYSTIMESTAMP", r"(?i)\bNOW\s*\(\s*\)", "SYSTIMESTAMP"),
        RewriteRule::replace("CURDATE() → TRUNC(SYSDATE)", r"(?i)\bCURDATE\s*\(\s*\)", "TRUNC(SYSDATE)"),
        RewriteRule::replace("RAND() → DBMS_RANDOM.VALUE", r"(?i)\bRAND\s*\(\s*\)", "DBMS_RANDOM.VALUE"),
        RewriteRule::replace("UUID() → SYS_GUID()", r"(?i)\bUUID\s*\(\s*\)", "SYS_GUID()"),
        RewriteRule::nested("GROUP_CONCAT → LISTAGG", "GROUP_CONCAT", group_concat_to_listagg),
        RewriteRule::nested("DATE_ADD → interval arithmetic", "DATE_ADD", date_add_oracle),
        RewriteRule::nested("DATE_SUB → interval arithmetic", "DATE_SUB", date_sub_oracle),
        RewriteRule::replace(
            "LIMIT a, b → LIMIT b OFFSET a",
            r"(?i)\bLIMIT\s+(\d+)\s*,\s*(\d+)",
            "LIMIT ${2} OFFSET ${1}",
        ),
        RewriteRule::nested("DATE_FORMAT → TO_CHAR", "DATE_FORMAT", date_format_to_oracle),
        RewriteRule::nested("STR_TO_DATE → TO_DATE", "STR_TO_DATE", str_to_date_oracle),
    ]
}
