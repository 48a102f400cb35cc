//! Full-grammar statement parser used to confirm a statement's kind.
//!
//! Classification never depends on it: when the grammar rejects a statement
//! (Oracle-specific syntax usually does) the dispatcher falls back to
//! leading-keyword matching.

use sqlparser::ast::{ObjectType, Statement};
use sqlparser::dialect::{Dialect as SqlDialect, GenericDialect, MySqlDialect, PostgreSqlDialect};
use sqlparser::parser::Parser;
use tracing::debug;

use crate::dialect::Dialect;

/// The statement shapes the parser reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedStatement {
    Select,
    CreateTable { name: String },
    Drop { object_type: String, names: Vec<String> },
}

/// A parser that recognizes a narrow set of statement shapes.
pub trait StatementParser: Send + Sync {
    /// `None` when the statement does not parse or is of another kind.
    fn parse(&self, sql: &str, dialect: Dialect) -> Option<ParsedStatement>;
}

/// [`StatementParser`] backed by `sqlparser`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqlParserBackend;

impl SqlParserBackend {
    fn grammar(dialect: Dialect) -> Box<dyn SqlDialect> {
        match dialect {
            Dialect::MySql => Box::new(MySqlDialect {}),
            Dialect::PostgreSql => Box::new(PostgreSqlDialect {}),
            Dialect::Oracle | Dialect::Tibero => Box::new(GenericDialect {}),
        }
    }
}

impl StatementParser for SqlParserBackend {
    fn parse(&self, sql: &str, dialect: Dialect) -> Option<ParsedStatement> {
        let grammar = Self::grammar(dialect);
        let statements = match Parser::parse_sql(grammar.as_ref(), sql) {
            Ok(statements) => statements,
            Err(e) => {
                debug!(error = %e, %dialect, "statement parser fell back to keywords");
                return None;
            }
        };
        let [statement] = statements.as_slice() else {
            return None;
        };
        match statement {
            Statement::Query(_) => Some(ParsedStatement::Select),
            Statement::CreateTable(create) => Some(ParsedStatement::CreateTable {
                name: create.name.to_string(),
            }),
            Statement::Drop { object_type, names, .. } => Some(ParsedStatement::Drop {
                object_type: object_type_name(object_type),
                names: names.iter().map(|n| n.to_string()).collect(),
            }),
            _ => None,
        }
    }
}

fn object_type_name(object_type: &ObjectType) -> String {
    object_type.to_string().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select() {
        let parsed = SqlParserBackend.parse("SELECT a FROM t WHERE b = 1", Dialect::PostgreSql);
        assert_eq!(parsed, Some(ParsedStatement::Select));
    }

    #[test]
    fn test_create_table() {
        let parsed = SqlParserBackend.parse("CREATE TABLE users (id INT PRIMARY KEY)", Dialect::MySql);
        assert_eq!(
            parsed,
            Some(ParsedStatement::CreateTable {
                name: "users".to_string()
            })
        );
    }

    #[test]
    fn test_drop() {
        let parsed = SqlParserBackend.parse("DROP TABLE a, b", Dialect::PostgreSql);
        assert_eq!(
            parsed,
            Some(ParsedStatement::Drop {
                object_type: "TABLE".to_string(),
                names: vec!["a".to_string(), "b".to_string()],
            })
        );
    }

    #[test]
    fn test_unsupported_shapes() {
        assert_eq!(SqlParserBackend.parse("INSERT INTO t VALUES (1)", Dialect::MySql), None);
        assert_eq!(SqlParserBackend.parse("CREATE SEQUENCE s", Dialect::PostgreSql), None);
        assert_eq!(SqlParserBackend.parse("SELEC oops", Dialect::Oracle), None);
    }
}
