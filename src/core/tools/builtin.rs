//! # Built-in Tools
//!
//! The tools every session starts with.

use async_trait::async_trait;
use chrono::Local;
use chrono::format::{Item, StrftimeItems};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{Tool, ToolError};

const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ── Current time ────────────────────────────────────────────────────────────

pub struct CurrentTimeTool;

#[derive(Deserialize, JsonSchema)]
pub struct CurrentTimeArgs {
    /// Optional strftime format, e.g. "%H:%M". Defaults to "%Y-%m-%d %H:%M:%S".
    #[serde(default)]
    pub format: Option<String>,
}

#[derive(Serialize)]
pub struct CurrentTimeOutput {
    pub time: String,
    pub timezone: String,
}

#[async_trait]
impl Tool for CurrentTimeTool {
    const NAME: &'static str = "get_current_time";
    const DESCRIPTION: &'static str = "Returns the current local date and time.";
    type Args = CurrentTimeArgs;
    type Output = CurrentTimeOutput;

    async fn call(&self, args: CurrentTimeArgs) -> Result<CurrentTimeOutput, ToolError> {
        let format = args.format.as_deref().unwrap_or(DEFAULT_TIME_FORMAT);
        // chrono panics on display of a bad format, so validate first
        if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
            return Err(ToolError(format!("Invalid time format: {format}")));
        }
        let now = Local::now();
        Ok(CurrentTimeOutput {
            time: now.format(format).to_string(),
            timezone: now.format("%:z").to_string(),
        })
    }
}

// ── Calculate ───────────────────────────────────────────────────────────────

pub struct CalculateTool;

#[derive(Deserialize, JsonSchema)]
pub struct CalculateArgs {
    /// A binary expression such as "12.5 * 4". Supports +, -, * and /.
    pub expression: String,
}

#[derive(Serialize)]
pub struct CalculateOutput {
    pub expression: String,
    pub result: f64,
}

#[async_trait]
impl Tool for CalculateTool {
    const NAME: &'static str = "calculate";
    const DESCRIPTION: &'static str =
        "Evaluates a binary arithmetic expression (a + b, a - b, a * b, a / b).";
    type Args = CalculateArgs;
    type Output = CalculateOutput;

    async fn call(&self, args: CalculateArgs) -> Result<CalculateOutput, ToolError> {
        let result = evaluate(&args.expression)?;
        Ok(CalculateOutput {
            expression: args.expression,
            result,
        })
    }
}

/// Evaluates `a op b`. The operator is the first `+ - * /` that follows a
/// digit, so signed operands and exponents ("-2 * 1e-3") parse.
fn evaluate(expression: &str) -> Result<f64, ToolError> {
    let expr = expression.trim();
    let mut prev: Option<char> = None;

    for (i, ch) in expr.char_indices() {
        let follows_operand = prev.is_some_and(|p| p.is_ascii_digit() || p == '.');
        if i > 0 && follows_operand && matches!(ch, '+' | '-' | '*' | '/') {
            let lhs = expr[..i].trim().parse::<f64>();
            let rhs = expr[i + 1..].trim().parse::<f64>();
            if let (Ok(a), Ok(b)) = (lhs, rhs) {
                return match ch {
                    '+' => Ok(a + b),
                    '-' => Ok(a - b),
                    '*' => Ok(a * b),
                    _ if b == 0.0 => Err(ToolError("Division by zero".into())),
                    _ => Ok(a / b),
                };
            }
        }
        if !ch.is_whitespace() {
            prev = Some(ch);
        }
    }

    Err(ToolError(format!(
        "Unsupported expression: {expression:?} (expected \"a op b\")"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluate_operators() {
        assert_eq!(evaluate("3 + 4"), Ok(7.0));
        assert_eq!(evaluate("10-4"), Ok(6.0));
        assert_eq!(evaluate("2.5 * 4"), Ok(10.0));
        assert_eq!(evaluate("9 / 2"), Ok(4.5));
    }

    #[test]
    fn test_evaluate_signed_operands() {
        assert_eq!(evaluate("-3 - -4"), Ok(1.0));
        assert_eq!(evaluate("5e-1 * 4"), Ok(2.0));
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(evaluate("1 / 0"), Err(ToolError("Division by zero".into())));
    }

    #[test]
    fn test_unsupported_expression() {
        assert!(evaluate("two plus two").is_err());
        assert!(evaluate("").is_err());
    }

    #[tokio::test]
    async fn test_calculate_tool_output() {
        let out = CalculateTool
            .call(CalculateArgs {
                expression: "6 * 7".into(),
            })
            .await
            .unwrap();
        assert_eq!(out.result, 42.0);
        assert_eq!(out.expression, "6 * 7");
    }

    #[tokio::test]
    async fn test_current_time_custom_format() {
        let out = CurrentTimeTool
            .call(CurrentTimeArgs {
                format: Some("%Y".into()),
            })
            .await
            .unwrap();
        assert_eq!(out.time.len(), 4);
        assert!(out.time.chars().all(|c| c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn test_current_time_rejects_bad_format() {
        let result = CurrentTimeTool
            .call(CurrentTimeArgs {
                format: Some("%Q".into()),
            })
            .await;
        assert!(result.is_err());
    }
}
