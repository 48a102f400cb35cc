//! Supported SQL dialects.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConvertError;

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    MySql,
    PostgreSql,
    Oracle,
    Tibero,
}

impl Dialect {
    pub const ALL: [Dialect; 4] = [
        Dialect::MySql,
        Dialect::PostgreSql,
        Dialect::Oracle,
        Dialect::Tibero,
    ];

    /// Human readable product name.
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::MySql => "MySQL",
            Dialect::PostgreSql => "PostgreSQL",
            Dialect::Oracle => "Oracle",
            Dialect::Tibero => "Tibero",
        }
    }

    /// Accepted spellings on the command line and in config files.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Dialect::MySql => &["mysql", "mariadb"],
            Dialect::PostgreSql => &["postgresql", "postgres", "pg"],
            Dialect::Oracle => &["oracle"],
            Dialect::Tibero => &["tibero"],
        }
    }

    /// Tibero speaks Oracle's SQL; both share rule sources and type tables.
    pub fn is_oracle_family(&self) -> bool {
        matches!(self, Dialect::Oracle | Dialect::Tibero)
    }

    /// Collapse Tibero onto Oracle for table lookups.
    pub fn family(&self) -> Dialect {
        match self {
            Dialect::Tibero => Dialect::Oracle,
            other => *other,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Dialect {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Dialect::ALL
            .into_iter()
            .find(|d| d.aliases().contains(&needle.as_str()))
            .ok_or_else(|| ConvertError::UnknownDialect(s.trim().to_string()))
    }
}

/// An ordered (source, target) combination; the key of every rule table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DialectPair {
    pub source: Dialect,
    pub target: Dialect,
}

impl DialectPair {
    pub fn new(source: Dialect, target: Dialect) -> Self {
        Self { source, target }
    }

    pub fn is_identity(&self) -> bool {
        self.source == self.target
    }

    /// Both sides belong to the same family (e.g. Oracle and Tibero).
    pub fn same_family(&self) -> bool {
        self.source.family() == self.target.family()
    }

    /// The pair with Tibero folded onto Oracle on both sides.
    pub fn family(&self) -> DialectPair {
        DialectPair::new(self.source.family(), self.target.family())
    }

    /// Every non-identity pair over the supported dialects.
    pub fn all() -> impl Iterator<Item = DialectPair> {
        Dialect::ALL.into_iter().flat_map(|source| {
            Dialect::ALL
                .into_iter()
                .filter(move |target| *target != source)
                .map(move |target| DialectPair::new(source, target))
        })
    }
}

impl fmt::Display for DialectPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("postgres".parse::<Dialect>().unwrap(), Dialect::PostgreSql);
        assert_eq!("PG".parse::<Dialect>().unwrap(), Dialect::PostgreSql);
        assert_eq!(" MariaDB ".parse::<Dialect>().unwrap(), Dialect::MySql);
        assert_eq!("tibero".parse::<Dialect>().unwrap(), Dialect::Tibero);
        assert!("db2".parse::<Dialect>().is_err());
    }

    #[test]
    fn test_family() {
        assert!(Dialect::Tibero.is_oracle_family());
        assert!(!Dialect::MySql.is_oracle_family());
        assert!(DialectPair::new(Dialect::Oracle, Dialect::Tibero).same_family());
        assert_eq!(
            DialectPair::new(Dialect::Tibero, Dialect::MySql).family(),
            DialectPair::new(Dialect::Oracle, Dialect::MySql)
        );
    }

    #[test]
    fn test_all_pairs() {
        let pairs: Vec<_> = DialectPair::all().collect();
        assert_eq!(pairs.len(), 12);
        assert!(pairs.iter().all(|p| !p.is_identity()));
    }
}
