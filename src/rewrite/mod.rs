//! Pattern rewrite registry.
//!
//! Each dialect pair owns an ordered list of [`RewriteRule`]s. A rule is
//! either a regex with a replacement, or a function-call rewrite driven by
//! the bracket matcher in [`crate::scan`].
//!
//! ## Nested constructs
//!
//! `DECODE`, `NVL2` and `IF` nest inside themselves. Those rules use a
//! convergence loop: rewrite the first call whose arguments contain no
//! further call of the same name, restart from the top, and stop after a
//! pass that changes nothing.

mod builders;
mod registry;
mod rules;

pub use registry::RewriteRegistry;

use regex::{Captures, Regex};

use crate::scan::{find_function_call, replace_in_code, split_function_args, FunctionCall};

/// Builds the replacement for a matched regex; `None` leaves the match as is.
pub type CaptureBuilder = fn(&Captures<'_>) -> Option<String>;

/// Builds the replacement for a function call from its top-level arguments.
pub type CallBuilder = fn(&[String]) -> Option<String>;

/// Builds the replacement for an ordered-set aggregate from its arguments
/// and the `ORDER BY` list of a trailing `WITHIN GROUP (...)`.
pub type AggregateBuilder = fn(&[String], Option<&str>) -> Option<String>;

/// Whole-text rewrite for constructs a regex cannot bound (e.g. `expr::type`).
pub type ScanRewrite = fn(&str) -> Option<String>;

/// What a rule matches and how it rewrites.
pub enum RuleAction {
    /// Regex replacement with `${n}` capture references.
    Replace { pattern: Regex, template: &'static str },
    /// Regex match handed to a builder.
    Build { pattern: Regex, build: CaptureBuilder },
    /// Innermost-first rewrite of a self-nesting call. The builder must not
    /// emit a call of the same name.
    Nested { name: &'static str, build: CallBuilder },
    /// Single left-to-right pass over calls whose rewrite keeps the name,
    /// such as format-string conversion inside `TO_CHAR`.
    Call { name: &'static str, build: CallBuilder },
    /// `NAME(args) [WITHIN GROUP (ORDER BY ...)]`, rewritten innermost-first.
    Aggregate { name: &'static str, build: AggregateBuilder },
    Scan { rewrite: ScanRewrite },
}

/// A pure rewrite with a human-readable description.
pub struct RewriteRule {
    pub description: &'static str,
    pub action: RuleAction,
}

// Bound on rewrites per rule and statement; builders never re-emit their own
// name, so this is only reached on pathological input.
const MAX_REWRITES: usize = 10_000;

impl RewriteRule {
    pub fn replace(description: &'static str, pattern: &str, template: &'static str) -> Self {
        Self {
            description,
            action: RuleAction::Replace {
                pattern: compile(pattern),
                template,
            },
        }
    }

    pub fn build(description: &'static str, pattern: &str, build: CaptureBuilder) -> Self {
        Self {
            description,
            action: RuleAction::Build {
                pattern: compile(pattern),
                build,
            },
        }
    }

    pub fn nested(description: &'static str, name: &'static str, build: CallBuilder) -> Self {
        Self {
            description,
            action: RuleAction::Nested { name, build },
        }
    }

    pub fn call(description: &'static str, name: &'static str, build: CallBuilder) -> Self {
        Self {
            description,
            action: RuleAction::Call { name, build },
        }
    }

    pub fn aggregate(description: &'static str, name: &'static str, build: AggregateBuilder) -> Self {
        Self {
            description,
            action: RuleAction::Aggregate { name, build },
        }
    }

    pub fn scan(description: &'static str, rewrite: ScanRewrite) -> Self {
        Self {
            description,
            action: RuleAction::Scan { rewrite },
        }
    }

    /// Apply the rule once (to convergence for nested rules).
    ///
    /// Returns `None` when the text did not change.
    pub fn apply(&self, sql: &str) -> Option<String> {
        let rewritten = match &self.action {
            RuleAction::Replace { pattern, template } => {
                let (out, count) = replace_in_code(sql, pattern, |caps| {
                    let mut dst = String::new();
                    caps.expand(template, &mut dst);
                    Some(dst)
                });
                (count > 0).then_some(out)
            }
            RuleAction::Build { pattern, build } => {
                let (out, count) = replace_in_code(sql, pattern, build);
                (count > 0).then_some(out)
            }
            RuleAction::Nested { name, build } => converge(sql, name, |text, call| {
                let args = split_function_args(call.args(text));
                build(&args).map(|replacement| (call.end, replacement))
            }),
            RuleAction::Aggregate { name, build } => converge(sql, name, |text, call| {
                let args = split_function_args(call.args(text));
                let (end, order_by) = within_group(text, call.end);
                build(&args, order_by).map(|replacement| (end, replacement))
            }),
            RuleAction::Call { name, build } => single_pass(sql, name, *build),
            RuleAction::Scan { rewrite } => rewrite(sql),
        };
        rewritten.filter(|out| out != sql)
    }
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("rewrite patterns are static and valid")
}

/// The convergence loop for self-nesting calls.
///
/// `rewrite` receives an innermost call and returns the end of the span it
/// replaces (at least `call.end`) with the replacement text.
fn converge<F>(sql: &str, name: &str, rewrite: F) -> Option<String>
where
    F: Fn(&str, &FunctionCall) -> Option<(usize, String)>,
{
    let mut current = sql.to_string();
    let mut changed = false;
    let mut rewrites = 0;

    'restart: while rewrites < MAX_REWRITES {
        let mut from = 0;
        while let Some(call) = find_function_call(&current, name, from) {
            if find_function_call(call.args(&current), name, 0).is_some() {
                // Not innermost; descend into the arguments.
                from = call.open;
                continue;
            }
            match rewrite(&current, &call) {
                Some((end, replacement)) => {
                    current.replace_range(call.start..end, &replacement);
                    changed = true;
                    rewrites += 1;
                    continue 'restart;
                }
                None => from = call.end,
            }
        }
        break;
    }

    changed.then_some(current)
}

/// Rewrite every call of `name` once, left to right, including calls nested
/// in the arguments of an earlier one.
fn single_pass(sql: &str, name: &str, build: CallBuilder) -> Option<String> {
    let mut current = sql.to_string();
    let mut from = 0;
    let mut changed = false;
    while let Some(call) = find_function_call(&current, name, from) {
        let args = split_function_args(call.args(&current));
        if let Some(replacement) = build(&args) {
            if current[call.start..call.end] != replacement {
                current.replace_range(call.start..call.end, &replacement);
                changed = true;
            }
        }
        from = call.start + 1;
    }
    changed.then_some(current)
}

/// Parse `WITHIN GROUP (ORDER BY ...)` right after an aggregate call.
///
/// Returns the end of the consumed text and the ordering list, if any.
fn within_group(text: &str, after_call: usize) -> (usize, Option<&str>) {
    let rest = &text[after_call..];
    let trimmed = rest.trim_start();
    let offset = after_call + (rest.len() - trimmed.len());
    let upper = trimmed.to_ascii_uppercase();
    let Some(after_within) = upper.strip_prefix("WITHIN") else {
        return (after_call, None);
    };
    let after_group = after_within.trim_start();
    let Some(after_kw) = after_group.strip_prefix("GROUP") else {
        return (after_call, None);
    };
    let paren_at = offset + (trimmed.len() - after_kw.len()) + (after_kw.len() - after_kw.trim_start().len());
    if text.as_bytes().get(paren_at) != Some(&b'(') {
        return (after_call, None);
    }
    let Some(end) = crate::scan::find_matching_bracket(text, paren_at + 1) else {
        return (after_call, None);
    };
    let inner = text[paren_at + 1..end - 1].trim();
    let order_by = crate::scan::find_keyword(inner, "ORDER BY", 0)
        .filter(|(start, _)| *start == 0)
        .map(|(_, kw_end)| inner[kw_end..].trim());
    (end, order_by)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_arg(args: &[String]) -> Option<String> {
        args.first().map(|a| format!("[{}]", a))
    }

    #[test]
    fn test_converge_rewrites_innermost_first() {
        let rule = RewriteRule::nested("wrap", "W", first_arg);
        let out = rule.apply("SELECT W(W(a, 1), 2) FROM t").unwrap();
        assert_eq!(out, "SELECT [[a]] FROM t");
    }

    #[test]
    fn test_converge_is_idempotent() {
        let rule = RewriteRule::nested("wrap", "W", first_arg);
        let once = rule.apply("W(W(x))").unwrap();
        assert!(rule.apply(&once).is_none());
    }

    #[test]
    fn test_replace_counts_only_changes() {
        let rule = RewriteRule::replace("upper now", r"(?i)\bnow\(\)", "NOW()");
        assert!(rule.apply("SELECT NOW()").is_none());
        assert_eq!(rule.apply("SELECT now()").as_deref(), Some("SELECT NOW()"));
    }

    #[test]
    fn test_within_group() {
        let sql = "LISTAGG(a, ',') WITHIN GROUP (ORDER BY b DESC) x";
        let (end, order) = within_group(sql, 15);
        assert_eq!(order, Some("b DESC"));
        assert_eq!(&sql[end..], " x");
        assert_eq!(within_group("f(a) AS x", 4), (4, None));
    }
}
