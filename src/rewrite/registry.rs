//! Registry of rewrite rules keyed by dialect pair.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use tracing::debug;

use super::rules;
use super::RewriteRule;
use crate::dialect::{Dialect, DialectPair};

static GLOBAL: Lazy<RewriteRegistry> = Lazy::new(RewriteRegistry::new);

/// Ordered rewrite rules for every supported dialect pair.
pub struct RewriteRegistry {
    rules: HashMap<DialectPair, Vec<RewriteRule>>,
}

impl Default for RewriteRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RewriteRegistry {
    /// Create a registry with the built-in rule sets.
    pub fn new() -> Self {
        let mut registry = Self {
            rules: HashMap::new(),
        };
        for pair in DialectPair::all() {
            for rule in rules::for_pair(pair) {
                registry.register(pair, rule);
            }
        }
        registry
    }

    /// The process-wide registry, built on first use and never mutated.
    pub fn global() -> &'static RewriteRegistry {
        &GLOBAL
    }

    /// Append a rule to a pair's list; rules run in registration order.
    pub fn register(&mut self, pair: DialectPair, rule: RewriteRule) {
        self.rules.entry(pair).or_default().push(rule);
    }

    pub fn rules(&self, pair: DialectPair) -> &[RewriteRule] {
        self.rules.get(&pair).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Run every rule of the pair over `sql`, once each, in order.
    ///
    /// The description of each rule that changed the text is appended to
    /// `applied_rules`.
    pub fn apply(
        &self,
        sql: &str,
        source: Dialect,
        target: Dialect,
        applied_rules: &mut Vec<String>,
    ) -> String {
        let pair = DialectPair::new(source, target);
        let mut current = sql.to_string();
        for rule in self.rules(pair) {
            if let Some(next) = rule.apply(&current) {
                debug!(rule = rule.description, %pair, "rewrite rule applied");
                applied_rules.push(rule.description.to_string());
                current = next;
            }
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn convert(sql: &str, source: Dialect, target: Dialect) -> (String, Vec<String>) {
        let mut applied = Vec::new();
        let out = RewriteRegistry::global().apply(sql, source, target, &mut applied);
        (out, applied)
    }

    #[test]
    fn test_nested_decode() {
        let (out, applied) = convert(
            "SELECT DECODE(DECODE(a,1,2,3), 2, 'x', 'y') FROM t",
            Dialect::Oracle,
            Dialect::PostgreSql,
        );
        assert_eq!(
            out,
            "SELECT CASE WHEN (CASE WHEN a = 1 THEN 2 ELSE 3 END) = 2 THEN 'x' ELSE 'y' END FROM t"
        );
        assert_eq!(applied, vec!["DECODE → CASE".to_string()]);
    }

    #[test]
    fn test_oracle_to_mysql_functions() {
        let (out, _) = convert(
            "SELECT NVL(a, 0), SYSDATE, TRUNC(SYSDATE), SYS_GUID() FROM dual",
            Dialect::Oracle,
            Dialect::MySql,
        );
        assert_eq!(out, "SELECT IFNULL(a, 0), NOW(), CURDATE(), UUID() FROM dual");
    }

    #[test]
    fn test_oracle_to_postgres_dual_and_nvl2() {
        let (out, applied) = convert(
            "SELECT NVL2(x, 'y', 'n'), SYSDATE FROM DUAL",
            Dialect::Tibero,
            Dialect::PostgreSql,
        );
        assert_eq!(out, "SELECT CASE WHEN x IS NOT NULL THEN 'y' ELSE 'n' END, CURRENT_TIMESTAMP");
        assert!(applied.contains(&"FROM DUAL removed".to_string()));
    }

    #[test]
    fn test_literals_untouched() {
        let (out, applied) = convert("SELECT 'SYSDATE', NVL(a, 'NVL(') FROM t", Dialect::Oracle, Dialect::PostgreSql);
        assert_eq!(out, "SELECT 'SYSDATE', COALESCE(a, 'NVL(') FROM t");
        assert_eq!(applied.len(), 1);
    }

    #[test]
    fn test_mysql_to_postgres() {
        let (out, _) = convert(
            "SELECT IF(a > 1, IF(b, 1, 2), 3), `name` FROM t LIMIT 10, 20",
            Dialect::MySql,
            Dialect::PostgreSql,
        );
        assert_eq!(
            out,
            "SELECT CASE WHEN a > 1 THEN CASE WHEN b THEN 1 ELSE 2 END ELSE 3 END, \"name\" FROM t LIMIT 20 OFFSET 10"
        );
    }

    #[test]
    fn test_listagg_within_group() {
        let (out, _) = convert(
            "SELECT LISTAGG(name, ',') WITHIN GROUP (ORDER BY name) FROM t",
            Dialect::Oracle,
            Dialect::PostgreSql,
        );
        assert_eq!(out, "SELECT STRING_AGG(name, ',' ORDER BY name) FROM t");
    }

    #[test]
    fn test_postgres_to_oracle() {
        let (out, _) = convert(
            "SELECT id::text FROM t WHERE name ILIKE 'a%' AND active = TRUE",
            Dialect::PostgreSql,
            Dialect::Oracle,
        );
        assert_eq!(
            out,
            "SELECT CAST(id AS VARCHAR2(4000)) FROM t WHERE UPPER(name) LIKE UPPER('a%') AND active = 1"
        );
    }

    #[test]
    fn test_every_rule_set_is_idempotent() {
        let samples = [
            "SELECT DECODE(a, 1, NVL(b, 0), NVL2(c, 1, 2)), TO_CHAR(d, 'YYYY-MM-DD HH24:MI:SS') FROM dual",
            "SELECT LISTAGG(x, ',') WITHIN GROUP (ORDER BY x), ADD_MONTHS(d, 3), TO_DATE(s, 'DD/MM/YYYY') FROM t MINUS SELECT 1 FROM dual",
            "SELECT a::int, STRING_AGG(n, ',' ORDER BY n), NOW(), RANDOM() FROM t WHERE n ILIKE 'x%' AND f = TRUE",
            "SELECT IF(a, 1, 2), IFNULL(b, 0), GROUP_CONCAT(c SEPARATOR ';'), DATE_ADD(d, INTERVAL 1 DAY), `q` FROM t LIMIT 5, 10",
            "SELECT DATE_FORMAT(d, '%Y-%m-%d'), STR_TO_DATE(s, '%d/%m/%Y %H:%i'), CURDATE(), UUID() FROM t",
        ];
        for pair in DialectPair::all() {
            for sql in samples {
                let (once, _) = convert(sql, pair.source, pair.target);
                let (twice, applied) = convert(&once, pair.source, pair.target);
                assert_eq!(once, twice, "{} not idempotent", pair);
                assert!(applied.is_empty(), "{} re-applied {:?}", pair, applied);
            }
        }
    }
}
