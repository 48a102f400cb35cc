//! Leading-keyword statement classification.

use crate::parser::ParsedStatement;
use crate::scan::strip_leading_comments;

/// What a statement is, as far as routing is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    Merge,
    CreateTable,
    AlterTable,
    CreateIndex,
    CreateView,
    CreateSequence,
    AlterSequence,
    DropSequence,
    Drop,
    /// Procedures, functions, triggers, packages and anonymous blocks.
    ProgramUnit,
    Other,
}

impl StatementKind {
    pub fn is_sequence_ddl(&self) -> bool {
        matches!(
            self,
            StatementKind::CreateSequence | StatementKind::AlterSequence | StatementKind::DropSequence
        )
    }

    pub fn is_dml(&self) -> bool {
        matches!(
            self,
            StatementKind::Select
                | StatementKind::Insert
                | StatementKind::Update
                | StatementKind::Delete
                | StatementKind::Merge
        )
    }
}

impl From<&ParsedStatement> for StatementKind {
    fn from(parsed: &ParsedStatement) -> Self {
        match parsed {
            ParsedStatement::Select => StatementKind::Select,
            ParsedStatement::CreateTable { .. } => StatementKind::CreateTable,
            ParsedStatement::Drop { object_type, .. } if object_type == "SEQUENCE" => StatementKind::DropSequence,
            ParsedStatement::Drop { .. } => StatementKind::Drop,
        }
    }
}

// Words between CREATE and the object type that do not change the kind.
const CREATE_MODIFIERS: &[&str] = &[
    "OR",
    "REPLACE",
    "GLOBAL",
    "LOCAL",
    "TEMPORARY",
    "TEMP",
    "UNLOGGED",
    "UNIQUE",
    "BITMAP",
    "FORCE",
    "NOFORCE",
    "MATERIALIZED",
    "EDITIONABLE",
    "NONEDITIONABLE",
    "PRIVATE",
    "IF",
    "NOT",
    "EXISTS",
];

/// The first few words of the statement, upper-cased, skipping comments,
/// opening parentheses and MySQL `DEFINER=...` clauses.
fn leading_words(sql: &str) -> Vec<String> {
    let text = strip_leading_comments(sql).trim_start_matches(|c: char| c == '(' || c.is_whitespace());
    text.split(|c: char| c.is_whitespace() || c == '(' || c == ';')
        .filter(|w| !w.is_empty())
        .take(8)
        .map(str::to_ascii_uppercase)
        .filter(|w| !w.starts_with("DEFINER"))
        .collect()
}

/// Classify by leading keywords.
pub fn classify(sql: &str) -> StatementKind {
    let words = leading_words(sql);
    let Some(first) = words.first() else {
        return StatementKind::Other;
    };
    match first.as_str() {
        "SELECT" | "WITH" => StatementKind::Select,
        "INSERT" | "REPLACE" => StatementKind::Insert,
        "UPDATE" => StatementKind::Update,
        "DELETE" => StatementKind::Delete,
        "MERGE" => StatementKind::Merge,
        "BEGIN" | "DECLARE" => StatementKind::ProgramUnit,
        "CREATE" => {
            let object = words[1..]
                .iter()
                .find(|w| !CREATE_MODIFIERS.contains(&w.as_str()))
                .map(String::as_str);
            match object {
                Some("TABLE") => StatementKind::CreateTable,
                Some("INDEX") => StatementKind::CreateIndex,
                Some("VIEW") => StatementKind::CreateView,
                Some("SEQUENCE") => StatementKind::CreateSequence,
                Some("PROCEDURE" | "FUNCTION" | "TRIGGER" | "PACKAGE" | "TYPE") => StatementKind::ProgramUnit,
                _ => StatementKind::Other,
            }
        }
        "ALTER" => match words.get(1).map(String::as_str) {
            Some("TABLE") => StatementKind::AlterTable,
            Some("SEQUENCE") => StatementKind::AlterSequence,
            _ => StatementKind::Other,
        },
        "DROP" => match words.get(1).map(String::as_str) {
            Some("SEQUENCE") => StatementKind::DropSequence,
            _ => StatementKind::Drop,
        },
        _ => StatementKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dml() {
        assert_eq!(classify("select * from t"), StatementKind::Select);
        assert_eq!(classify("  (SELECT 1) UNION (SELECT 2)"), StatementKind::Select);
        assert_eq!(classify("WITH x AS (SELECT 1) SELECT * FROM x"), StatementKind::Select);
        assert_eq!(classify("-- note\nINSERT INTO t VALUES (1)"), StatementKind::Insert);
        assert_eq!(classify("MERGE INTO t USING s ON (1=1)"), StatementKind::Merge);
    }

    #[test]
    fn test_ddl() {
        assert_eq!(classify("CREATE GLOBAL TEMPORARY TABLE t (a INT)"), StatementKind::CreateTable);
        assert_eq!(classify("CREATE TABLE IF NOT EXISTS t (a INT)"), StatementKind::CreateTable);
        assert_eq!(classify("CREATE UNIQUE INDEX i ON t (a)"), StatementKind::CreateIndex);
        assert_eq!(classify("CREATE OR REPLACE VIEW v AS SELECT 1"), StatementKind::CreateView);
        assert_eq!(classify("ALTER TABLE t ADD c INT"), StatementKind::AlterTable);
        assert_eq!(classify("DROP SEQUENCE s"), StatementKind::DropSequence);
        assert_eq!(classify("DROP TABLE t"), StatementKind::Drop);
    }

    #[test]
    fn test_program_units() {
        assert_eq!(
            classify("CREATE OR REPLACE PROCEDURE p AS BEGIN NULL; END;"),
            StatementKind::ProgramUnit
        );
        assert_eq!(
            classify("CREATE DEFINER=`root`@`%` TRIGGER trg BEFORE INSERT ON t"),
            StatementKind::ProgramUnit
        );
        assert_eq!(classify("BEGIN\n  NULL;\nEND;"), StatementKind::ProgramUnit);
        assert_eq!(classify("GRANT SELECT ON t TO u"), StatementKind::Other);
        assert_eq!(classify(""), StatementKind::Other);
    }
}
