//! Edge condition evaluation
//!
//! Conditions are short predicates over the source node's outcome, the
//! pipeline context, and the edge's own label:
//!
//! ```text
//! outcome == success            outcome != fail
//! context.verdict == "approve"  context.kind != "docs"
//! label == "primary"
//! success                       (shorthand for outcome == success)
//! a && b                        a || b       (&& binds tighter)
//! ```
//!
//! The language is evaluated permissively: an unparsable condition logs a
//! warning and evaluates false rather than failing the run.

use tracing::warn;

use super::context::PipelineContext;
use super::outcome::OutcomeStatus;

/// Evaluate an edge condition; empty conditions are vacuously true
pub fn evaluate(condition: &str, outcome: OutcomeStatus, ctx: &PipelineContext, label: Option<&str>) -> bool {
    let condition = condition.trim();
    if condition.is_empty() {
        return true;
    }
    match parse(condition) {
        Some(expr) => eval(&expr, outcome, ctx, label),
        None => {
            warn!(%condition, "condition did not parse; treating as false");
            false
        }
    }
}

#[derive(Debug, PartialEq)]
enum Expr {
    Or(Vec<Expr>),
    And(Vec<Expr>),
    Cmp { lhs: Lhs, negated: bool, rhs: String },
}

#[derive(Debug, PartialEq)]
enum Lhs {
    Outcome,
    Context(String),
    Label,
}

fn eval(expr: &Expr, outcome: OutcomeStatus, ctx: &PipelineContext, label: Option<&str>) -> bool {
    match expr {
        Expr::Or(terms) => terms.iter().any(|t| eval(t, outcome, ctx, label)),
        Expr::And(terms) => terms.iter().all(|t| eval(t, outcome, ctx, label)),
        Expr::Cmp { lhs, negated, rhs } => {
            let holds = match lhs {
                Lhs::Outcome => OutcomeStatus::parse(rhs).map(|s| s == outcome).unwrap_or(false),
                Lhs::Context(key) => ctx.get(key).map(|v| v == rhs).unwrap_or(false),
                Lhs::Label => label.map(|l| l == rhs).unwrap_or(false),
            };
            holds != *negated
        }
    }
}

/// Split on a separator, respecting double-quoted sections
fn split_top_level<'a>(input: &'a str, sep: &str) -> Vec<&'a str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_string = false;
    let mut iter = input.char_indices();

    while let Some((i, c)) = iter.next() {
        if c == '"' {
            in_string = !in_string;
        } else if !in_string && input[i..].starts_with(sep) {
            parts.push(&input[start..i]);
            start = i + sep.len();
            // Skip over the rest of the separator
            for _ in 0..sep.len() - 1 {
                iter.next();
            }
        }
    }
    parts.push(&input[start..]);
    parts
}

fn parse(input: &str) -> Option<Expr> {
    let or_parts = split_top_level(input, "||");
    if or_parts.len() > 1 {
        let terms: Option<Vec<Expr>> = or_parts.iter().map(|p| parse_and(p)).collect();
        return Some(Expr::Or(terms?));
    }
    parse_and(input)
}

fn parse_and(input: &str) -> Option<Expr> {
    let and_parts = split_top_level(input, "&&");
    if and_parts.len() > 1 {
        let terms: Option<Vec<Expr>> = and_parts.iter().map(|p| parse_term(p)).collect();
        return Some(Expr::And(terms?));
    }
    parse_term(input)
}

fn parse_term(input: &str) -> Option<Expr> {
    let input = input.trim();

    for (op, negated) in [("!=", true), ("==", false)] {
        let parts = split_top_level(input, op);
        if parts.len() == 2 {
            let lhs = parse_lhs(parts[0].trim())?;
            let rhs = unquote(parts[1].trim());
            return Some(Expr::Cmp { lhs, negated, rhs });
        }
        if parts.len() > 2 {
            return None;
        }
    }

    // Bare status word: shorthand for `outcome == <word>`
    OutcomeStatus::parse(input).map(|status| Expr::Cmp {
        lhs: Lhs::Outcome,
        negated: false,
        rhs: status.as_str().to_string(),
    })
}

fn parse_lhs(input: &str) -> Option<Lhs> {
    if input == "outcome" {
        Some(Lhs::Outcome)
    } else if input == "label" {
        Some(Lhs::Label)
    } else if let Some(key) = input.strip_prefix("context.") {
        if key.is_empty() { None } else { Some(Lhs::Context(key.to_string())) }
    } else {
        None
    }
}

fn unquote(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_with(key: &str, value: &str) -> PipelineContext {
        let mut ctx = PipelineContext::new();
        ctx.set(key, value);
        ctx
    }

    #[test]
    fn test_empty_condition_is_true() {
        let ctx = PipelineContext::new();
        assert!(evaluate("", OutcomeStatus::Success, &ctx, None));
        assert!(evaluate("   ", OutcomeStatus::Fail, &ctx, None));
    }

    #[test]
    fn test_outcome_equality() {
        let ctx = PipelineContext::new();
        assert!(evaluate("outcome == success", OutcomeStatus::Success, &ctx, None));
        assert!(!evaluate("outcome == success", OutcomeStatus::Fail, &ctx, None));
        assert!(evaluate("outcome != fail", OutcomeStatus::Success, &ctx, None));
        assert!(evaluate(
            "outcome == partial_success",
            OutcomeStatus::PartialSuccess,
            &ctx,
            None
        ));
    }

    #[test]
    fn test_bare_status_shorthand() {
        let ctx = PipelineContext::new();
        assert!(evaluate("success", OutcomeStatus::Success, &ctx, None));
        assert!(evaluate("fail", OutcomeStatus::Fail, &ctx, None));
        assert!(!evaluate("fail", OutcomeStatus::Success, &ctx, None));
    }

    #[test]
    fn test_context_comparison() {
        let ctx = ctx_with("review.verdict", "approve");
        assert!(evaluate(
            "context.review.verdict == \"approve\"",
            OutcomeStatus::Success,
            &ctx,
            None
        ));
        assert!(!evaluate(
            "context.review.verdict == \"reject\"",
            OutcomeStatus::Success,
            &ctx,
            None
        ));
        // Missing key never equals, always not-equals
        assert!(!evaluate("context.absent == \"x\"", OutcomeStatus::Success, &ctx, None));
        assert!(evaluate("context.absent != \"x\"", OutcomeStatus::Success, &ctx, None));
    }

    #[test]
    fn test_label_comparison() {
        let ctx = PipelineContext::new();
        assert!(evaluate("label == \"primary\"", OutcomeStatus::Success, &ctx, Some("primary")));
        assert!(!evaluate("label == \"primary\"", OutcomeStatus::Success, &ctx, Some("alt")));
        assert!(!evaluate("label == \"primary\"", OutcomeStatus::Success, &ctx, None));
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let ctx = ctx_with("k", "v");
        // fail || (success && context.k == "v") -> true under Success
        assert!(evaluate(
            "outcome == fail || outcome == success && context.k == \"v\"",
            OutcomeStatus::Success,
            &ctx,
            None
        ));
        // (fail && ...) || missing -> false
        assert!(!evaluate(
            "outcome == fail && context.k == \"v\" || context.k == \"other\"",
            OutcomeStatus::Success,
            &ctx,
            None
        ));
    }

    #[test]
    fn test_quoted_value_with_operators_inside() {
        let ctx = ctx_with("msg", "a && b");
        assert!(evaluate("context.msg == \"a && b\"", OutcomeStatus::Success, &ctx, None));
    }

    #[test]
    fn test_unparsable_is_false() {
        let ctx = PipelineContext::new();
        assert!(!evaluate("totally broken ===", OutcomeStatus::Success, &ctx, None));
        assert!(!evaluate("frobnicate", OutcomeStatus::Success, &ctx, None));
    }

    #[test]
    fn test_unquoted_rhs_allowed() {
        let ctx = ctx_with("mode", "fast");
        assert!(evaluate("context.mode == fast", OutcomeStatus::Success, &ctx, None));
    }
}
