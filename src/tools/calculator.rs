//! 计算器工具：只接受数字与 + - * / . ( ) 空格，递归下降求值
//!
//! 支持运算符优先级、括号、一元正负号、`**`（幂，右结合）与 `//`（整除）。

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::core::CapabilityError;
use crate::tools::{parse_args, schema_of, Tool};

#[derive(Deserialize, JsonSchema)]
struct CalculatorArgs {
    /// The mathematical expression to evaluate
    expression: String,
}

pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "simple_calculator"
    }

    fn description(&self) -> &str {
        "Evaluate a basic math expression."
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<CalculatorArgs>()
    }

    async fn execute(&self, args: Value) -> Result<String, CapabilityError> {
        let args: CalculatorArgs = parse_args(self.name(), args)?;
        let value = evaluate(&args.expression).map_err(|e| {
            CapabilityError::invalid(
                self.name(),
                format!("can't evaluate '{}' ({})", args.expression, e),
            )
        })?;
        Ok(format!(
            "The result of {} is {}.",
            args.expression,
            format_number(value)
        ))
    }
}

/// 过滤掉白名单以外的字符后求值
pub fn evaluate(expression: &str) -> Result<f64, String> {
    let safe: String = expression
        .chars()
        .filter(|c| c.is_ascii_digit() || "+-*/.() ".contains(*c))
        .collect();
    let tokens = tokenize(&safe)?;
    if tokens.is_empty() {
        return Err("empty expression".to_string());
    }
    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.expr()?;
    if parser.pos != parser.tokens.len() {
        return Err("unexpected trailing input".to_string());
    }
    if !value.is_finite() {
        return Err("result is not a finite number".to_string());
    }
    Ok(value)
}

fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        let s = format!("{:.6}", v);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Num(f64),
    Plus,
    Minus,
    Star,
    Slash,
    Pow,
    FloorDiv,
    LParen,
    RParen,
}

fn tokenize(s: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = s.chars().collect();
    let mut out = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' => i += 1,
            '+' => {
                out.push(Token::Plus);
                i += 1;
            }
            '-' => {
                out.push(Token::Minus);
                i += 1;
            }
            '*' if chars.get(i + 1) == Some(&'*') => {
                out.push(Token::Pow);
                i += 2;
            }
            '*' => {
                out.push(Token::Star);
                i += 1;
            }
            '/' if chars.get(i + 1) == Some(&'/') => {
                out.push(Token::FloorDiv);
                i += 2;
            }
            '/' => {
                out.push(Token::Slash);
                i += 1;
            }
            '(' => {
                out.push(Token::LParen);
                i += 1;
            }
            ')' => {
                out.push(Token::RParen);
                i += 1;
            }
            _ => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let lit: String = chars[start..i].iter().collect();
                let n = lit
                    .parse::<f64>()
                    .map_err(|_| format!("bad number '{lit}'"))?;
                out.push(Token::Num(n));
            }
        }
    }
    Ok(out)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.peek();
        self.pos += 1;
        t
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<f64, String> {
        let mut acc = self.term()?;
        while let Some(op @ (Token::Plus | Token::Minus)) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            acc = if op == Token::Plus { acc + rhs } else { acc - rhs };
        }
        Ok(acc)
    }

    // term := unary (('*' | '/' | '//') unary)*
    fn term(&mut self) -> Result<f64, String> {
        let mut acc = self.unary()?;
        while let Some(op @ (Token::Star | Token::Slash | Token::FloorDiv)) = self.peek() {
            self.pos += 1;
            let rhs = self.unary()?;
            acc = match op {
                Token::Star => acc * rhs,
                _ if rhs == 0.0 => return Err("division by zero".to_string()),
                Token::Slash => acc / rhs,
                _ => (acc / rhs).floor(),
            };
        }
        Ok(acc)
    }

    // unary := ('+' | '-') unary | power
    fn unary(&mut self) -> Result<f64, String> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(-self.unary()?)
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    // power := atom ('**' unary)?
    fn power(&mut self) -> Result<f64, String> {
        let base = self.atom()?;
        if self.peek() == Some(Token::Pow) {
            self.pos += 1;
            let exp = self.unary()?;
            return Ok(base.powf(exp));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<f64, String> {
        match self.next() {
            Some(Token::Num(n)) => Ok(n),
            Some(Token::LParen) => {
                let v = self.expr()?;
                match self.next() {
                    Some(Token::RParen) => Ok(v),
                    _ => Err("missing ')'".to_string()),
                }
            }
            Some(t) => Err(format!("unexpected {:?}", t)),
            None => Err("unexpected end of expression".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_and_parens() {
        assert_eq!(evaluate("2 + 3 * 4").unwrap(), 14.0);
        assert_eq!(evaluate("(2 + 3) * 4").unwrap(), 20.0);
        assert_eq!(evaluate("-3 + 5").unwrap(), 2.0);
        assert_eq!(evaluate("2 ** 3 ** 2").unwrap(), 512.0);
        assert_eq!(evaluate("-2 ** 2").unwrap(), -4.0);
        assert_eq!(evaluate("7 // 2").unwrap(), 3.0);
    }

    #[test]
    fn test_filters_unsafe_characters() {
        assert_eq!(evaluate("what is 12 * 3").unwrap(), 36.0);
    }

    #[test]
    fn test_errors() {
        assert!(evaluate("1 / 0").is_err());
        assert!(evaluate("(1 + 2").is_err());
        assert!(evaluate("").is_err());
        assert!(evaluate("1.2.3").is_err());
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(4.0), "4");
        assert_eq!(format_number(3.5), "3.5");
        assert_eq!(format_number(1.0 / 3.0), "0.333333");
    }

    #[tokio::test]
    async fn test_tool_output() {
        let out = CalculatorTool
            .execute(serde_json::json!({"expression": "15 * 4"}))
            .await
            .unwrap();
        assert_eq!(out, "The result of 15 * 4 is 60.");
    }

    #[tokio::test]
    async fn test_tool_bad_expression() {
        let err = CalculatorTool
            .execute(serde_json::json!({"expression": "4 /"}))
            .await
            .unwrap_err();
        assert!(matches!(err, CapabilityError::InvalidArgument { .. }));
    }
}
