//! Conversion output: warnings, applied rules, options and the per-call
//! accumulator threaded through the pipeline.

use serde::{Deserialize, Serialize};

use crate::dialect::Dialect;

/// What kind of attention a converted construct needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WarningKind {
    /// Mechanical rewrite applied, behaviour preserved.
    SyntaxDifference,
    /// No equivalent exists on the target.
    UnsupportedFunction,
    /// Rewritten, with a caveat.
    PartialSupport,
    /// Too complex to rewrite safely.
    ManualReviewNeeded,
    /// No type mapping rule found, or precision lost.
    DataTypeMismatch,
    /// Correct, but likely to behave differently at scale.
    PerformanceWarning,
}

impl WarningKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningKind::SyntaxDifference => "syntax-difference",
            WarningKind::UnsupportedFunction => "unsupported-function",
            WarningKind::PartialSupport => "partial-support",
            WarningKind::ManualReviewNeeded => "manual-review-needed",
            WarningKind::DataTypeMismatch => "data-type-mismatch",
            WarningKind::PerformanceWarning => "performance-warning",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

/// A single itemized note about the conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionWarning {
    pub kind: WarningKind,
    pub message: String,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ConversionWarning {
    pub fn new(kind: WarningKind, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            severity,
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// Caller-tunable conversion behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionOptions {
    /// Escalate manual-review and unsupported-function warnings to errors.
    pub strict_mode: bool,
    /// Normalize blank lines and trailing whitespace of the output.
    pub format_output: bool,
    /// Return warnings in the result.
    pub include_warnings: bool,
    /// Comment out statements that cannot be converted instead of passing them through.
    pub skip_unsupported_features: bool,
    /// Schema qualifier to strip from object references.
    pub schema_owner: Option<String>,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            strict_mode: false,
            format_output: true,
            include_warnings: true,
            skip_unsupported_features: false,
            schema_owner: None,
        }
    }
}

/// Result of one top-level conversion call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub converted_sql: String,
    pub warnings: Vec<ConversionWarning>,
    pub applied_rules: Vec<String>,
    pub source_dialect: Dialect,
    pub target_dialect: Dialect,
}

impl ConversionResult {
    pub fn has_errors(&self) -> bool {
        self.warnings.iter().any(|w| w.severity == Severity::Error)
    }

    /// Warnings that ask a human to look at the output.
    pub fn needs_review(&self) -> bool {
        self.warnings.iter().any(|w| {
            matches!(
                w.kind,
                WarningKind::ManualReviewNeeded | WarningKind::UnsupportedFunction
            )
        })
    }
}

/// Accumulator owned by exactly one conversion call.
///
/// Feature converters only ever append; the context is turned into a
/// [`ConversionResult`] once at the end.
#[derive(Debug, Default)]
pub struct ConversionContext {
    pub options: ConversionOptions,
    pub warnings: Vec<ConversionWarning>,
    pub applied_rules: Vec<String>,
}

impl ConversionContext {
    pub fn new(options: ConversionOptions) -> Self {
        Self {
            options,
            warnings: Vec::new(),
            applied_rules: Vec::new(),
        }
    }

    pub fn rule(&mut self, description: impl Into<String>) {
        self.applied_rules.push(description.into());
    }

    pub fn push(&mut self, mut warning: ConversionWarning) {
        if self.options.strict_mode
            && matches!(
                warning.kind,
                WarningKind::ManualReviewNeeded | WarningKind::UnsupportedFunction
            )
        {
            warning.severity = Severity::Error;
        }
        self.warnings.push(warning);
    }

    pub fn warn(&mut self, kind: WarningKind, message: impl Into<String>) {
        self.push(ConversionWarning::new(kind, Severity::Warning, message));
    }

    pub fn info(&mut self, kind: WarningKind, message: impl Into<String>) {
        self.push(ConversionWarning::new(kind, Severity::Info, message));
    }

    pub fn warn_with(
        &mut self,
        kind: WarningKind,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) {
        self.push(ConversionWarning::new(kind, Severity::Warning, message).with_suggestion(suggestion));
    }

    /// Fold another context's output (e.g. one statement of a script) into this one.
    pub fn absorb(&mut self, warnings: Vec<ConversionWarning>, rules: Vec<String>) {
        self.warnings.extend(warnings);
        self.applied_rules.extend(rules);
    }

    pub fn into_result(self, converted_sql: String, source: Dialect, target: Dialect) -> ConversionResult {
        let warnings = if self.options.include_warnings {
            self.warnings
        } else {
            Vec::new()
        };
        ConversionResult {
            converted_sql,
            warnings,
            applied_rules: dedup_preserving_order(self.applied_rules),
            source_dialect: source,
            target_dialect: target,
        }
    }
}

/// Remove repeated entries, keeping the first occurrence of each.
pub fn dedup_preserving_order(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_mode_escalates() {
        let mut ctx = ConversionContext::new(ConversionOptions {
            strict_mode: true,
            ..Default::default()
        });
        ctx.warn(WarningKind::ManualReviewNeeded, "complex");
        ctx.warn(WarningKind::SyntaxDifference, "simple");
        assert_eq!(ctx.warnings[0].severity, Severity::Error);
        assert_eq!(ctx.warnings[1].severity, Severity::Warning);
    }

    #[test]
    fn test_rules_deduplicated_in_order() {
        let mut ctx = ConversionContext::default();
        ctx.rule("b");
        ctx.rule("a");
        ctx.rule("b");
        let result = ctx.into_result(String::new(), Dialect::Oracle, Dialect::MySql);
        assert_eq!(result.applied_rules, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_include_warnings_false() {
        let mut ctx = ConversionContext::new(ConversionOptions {
            include_warnings: false,
            ..Default::default()
        });
        ctx.warn(WarningKind::PartialSupport, "x");
        let result = ctx.into_result("SELECT 1".into(), Dialect::Oracle, Dialect::MySql);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_warning_kind_serializes_kebab_case() {
        let json = serde_json::to_string(&WarningKind::ManualReviewNeeded).unwrap();
        assert_eq!(json, "\"manual-review-needed\"");
    }
}
