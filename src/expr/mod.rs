//! Sandboxed expression evaluation for conditions and arithmetic
//!
//! Expressions are tokenized, parsed into a small AST and evaluated against
//! the variable map. Nothing here executes code; the grammar only knows
//! literals, variables, comparison, arithmetic and boolean logic.
//!
//! ```text
//! or      := and (("||" | "or") and)*
//! and     := equality (("&&" | "and") equality)*
//! equality:= compare (("==" | "!=") compare)*
//! compare := sum (("<" | "<=" | ">" | ">=") sum)*
//! sum     := product (("+" | "-") product)*
//! product := unary (("*" | "/" | "%") unary)*
//! unary   := ("!" | "not" | "-") unary | primary
//! primary := number | string | true | false | name | $name | {name} | "(" or ")"
//! ```

mod lexer;

use crate::error::EvalError;
use crate::types::value::{Value, Variables};
use lexer::{Token, tokenize};


/// Parsed expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Var(String),
    Not(Box<Expr>),
    Neg(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            Self::Or => "||",
            Self::And => "&&",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
        }
    }
}

/// Parse an expression without evaluating it
pub fn compile(source: &str) -> Result<Expr, EvalError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.or()?;
    match parser.peek() {
        None => Ok(expr),
        Some(token) => Err(EvalError::UnexpectedToken(token.to_string())),
    }
}

/// Evaluate an expression to a value
pub fn try_evaluate(source: &str, variables: &Variables) -> Result<Value, EvalError> {
    compile(source)?.eval(variables)
}

/// Evaluate a condition. Any failure counts as false.
pub fn evaluate(condition: &str, variables: &Variables) -> bool {
    match try_evaluate(condition, variables) {
        Ok(value) => value.is_truthy(),
        Err(err) => {
            log::warn!("condition '{}' failed closed: {}", condition, err);
            false
        }
    }
}

/// Evaluate an arithmetic operand where variables use the `$name` sigil
///
/// After substitution only digits, `.`, operators, parentheses and
/// whitespace may remain; anything else is rejected before parsing.
pub fn evaluate_arithmetic(source: &str, variables: &Variables) -> Result<f64, EvalError> {
    let substituted = substitute_sigils(source, variables)?;

    if let Some(bad) = substituted
        .chars()
        .find(|c| !(c.is_ascii_digit() || c.is_whitespace() || "+-*/%().".contains(*c)))
    {
        return Err(EvalError::Disallowed(bad));
    }

    match compile(&substituted)?.eval(&Variables::new())? {
        Value::Num(n) if n.is_finite() => Ok(n),
        _ => Err(EvalError::NotANumber),
    }
}

fn substitute_sigils(source: &str, variables: &Variables) -> Result<String, EvalError> {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        let mut name = String::new();
        while let Some(&next) = chars.peek() {
            if next.is_alphanumeric() || next == '_' {
                name.push(next);
                chars.next();
            } else {
                break;
            }
        }
        if name.is_empty() {
            return Err(EvalError::Disallowed('$'));
        }
        let value = variables
            .get(&name)
            .ok_or_else(|| EvalError::UndefinedVariable(name.clone()))?;
        let number = value.as_number().ok_or(EvalError::NotNumeric(name))?;
        out.push_str(&format!("({number})"));
    }

    Ok(out)
}

/// Replace `{name}` placeholders with variable values; unknown names stay verbatim
pub fn interpolate(text: &str, variables: &Variables) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) if is_identifier(&after[..close]) => {
                let name = &after[..close];
                match variables.get(name) {
                    Some(value) => out.push_str(&value.to_string()),
                    None => out.push_str(&rest[open..open + close + 2]),
                }
                rest = &after[close + 1..];
            }
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// First `{name}` placeholder in the text, if any
pub fn placeholder(text: &str) -> Option<&str> {
    let mut rest = text;
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        if let Some(close) = after.find('}')
            && is_identifier(&after[..close])
        {
            return Some(&after[..close]);
        }
        rest = after;
    }
    None
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Deepest nesting of parentheses, unary operators and operator chains
const MAX_DEPTH: usize = 128;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn descend(&mut self) -> Result<(), EvalError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(EvalError::TooDeep(MAX_DEPTH));
        }
        Ok(())
    }

    /// Consume the next token if it is one of the given operators
    fn operator(&mut self, table: &[(&str, BinaryOp)]) -> Option<BinaryOp> {
        let Some(Token::Op(op)) = self.peek() else {
            return None;
        };
        let found = table.iter().find(|(sym, _)| sym == op).map(|(_, op)| *op);
        if found.is_some() {
            self.pos += 1;
        }
        found
    }

    fn binary(
        &mut self,
        table: &[(&str, BinaryOp)],
        operand: fn(&mut Self) -> Result<Expr, EvalError>,
    ) -> Result<Expr, EvalError> {
        let depth = self.depth;
        let mut left = operand(self)?;
        // Every link of a chain nests the tree one level deeper
        while let Some(op) = self.operator(table) {
            self.descend()?;
            let right = operand(self)?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        self.depth = depth;
        Ok(left)
    }

    fn or(&mut self) -> Result<Expr, EvalError> {
        self.binary(&[("||", BinaryOp::Or)], Self::and)
    }

    fn and(&mut self) -> Result<Expr, EvalError> {
        self.binary(&[("&&", BinaryOp::And)], Self::equality)
    }

    fn equality(&mut self) -> Result<Expr, EvalError> {
        self.binary(&[("==", BinaryOp::Eq), ("!=", BinaryOp::Ne)], Self::compare)
    }

    fn compare(&mut self) -> Result<Expr, EvalError> {
        self.binary(
            &[
                ("<", BinaryOp::Lt),
                ("<=", BinaryOp::Le),
                (">", BinaryOp::Gt),
                (">=", BinaryOp::Ge),
            ],
            Self::sum,
        )
    }

    fn sum(&mut self) -> Result<Expr, EvalError> {
        self.binary(&[("+", BinaryOp::Add), ("-", BinaryOp::Sub)], Self::product)
    }

    fn product(&mut self) -> Result<Expr, EvalError> {
        self.binary(
            &[
                ("*", BinaryOp::Mul),
                ("/", BinaryOp::Div),
                ("%", BinaryOp::Rem),
            ],
            Self::unary,
        )
    }

    fn unary(&mut self) -> Result<Expr, EvalError> {
        match self.peek() {
            Some(Token::Op("!")) => {
                self.pos += 1;
                Ok(Expr::Not(Box::new(self.nested(Self::unary)?)))
            }
            Some(Token::Op("-")) => {
                self.pos += 1;
                Ok(Expr::Neg(Box::new(self.nested(Self::unary)?)))
            }
            _ => self.primary(),
        }
    }

    fn nested(
        &mut self,
        rule: fn(&mut Self) -> Result<Expr, EvalError>,
    ) -> Result<Expr, EvalError> {
        self.descend()?;
        let expr = rule(self)?;
        self.depth -= 1;
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, EvalError> {
        match self.next() {
            Some(Token::Num(n)) => Ok(Expr::Literal(Value::Num(n))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::Str(s))),
            Some(Token::Bool(b)) => Ok(Expr::Literal(Value::Bool(b))),
            Some(Token::Ident(name)) => Ok(Expr::Var(name)),
            Some(Token::LParen) => {
                let inner = self.nested(Self::or)?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    Some(token) => Err(EvalError::UnexpectedToken(token.to_string())),
                    None => Err(EvalError::UnexpectedEnd),
                }
            }
            Some(token) => Err(EvalError::UnexpectedToken(token.to_string())),
            None => Err(EvalError::UnexpectedEnd),
        }
    }
}

impl Expr {
    pub fn eval(&self, variables: &Variables) -> Result<Value, EvalError> {
        match self {
            Self::Literal(value) => Ok(value.clone()),
            Self::Var(name) => variables
                .get(name)
                .cloned()
                .ok_or_else(|| EvalError::UndefinedVariable(name.clone())),
            Self::Not(inner) => Ok(Value::Bool(!inner.eval(variables)?.is_truthy())),
            Self::Neg(inner) => {
                let value = inner.eval(variables)?;
                let n = value.as_number().ok_or(EvalError::TypeMismatch {
                    op: "-",
                    left: value.type_name(),
                    right: value.type_name(),
                })?;
                Ok(Value::Num(-n))
            }
            Self::Binary(BinaryOp::And, left, right) => {
                if !left.eval(variables)?.is_truthy() {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(right.eval(variables)?.is_truthy()))
            }
            Self::Binary(BinaryOp::Or, left, right) => {
                if left.eval(variables)?.is_truthy() {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(right.eval(variables)?.is_truthy()))
            }
            Self::Binary(op, left, right) => {
                let left = left.eval(variables)?;
                let right = right.eval(variables)?;
                apply(*op, &left, &right)
            }
        }
    }
}

fn apply(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    let mismatch = || EvalError::TypeMismatch {
        op: op.symbol(),
        left: left.type_name(),
        right: right.type_name(),
    };

    match op {
        BinaryOp::Eq => Ok(Value::Bool(loose_eq(left, right))),
        BinaryOp::Ne => Ok(Value::Bool(!loose_eq(left, right))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (left, right) {
                (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
                _ => match (left.as_number(), right.as_number()) {
                    (Some(a), Some(b)) => a.partial_cmp(&b),
                    _ => return Err(mismatch()),
                },
            };
            let Some(ordering) = ordering else {
                return Ok(Value::Bool(false));
            };
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Le => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            }))
        }
        BinaryOp::Add => match (left, right) {
            (Value::Num(a), Value::Num(b)) => Ok(Value::Num(a + b)),
            (Value::Str(_), _) | (_, Value::Str(_)) => Ok(Value::Str(format!("{left}{right}"))),
            _ => Err(mismatch()),
        },
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            let (Some(a), Some(b)) = (left.as_number(), right.as_number()) else {
                return Err(mismatch());
            };
            match op {
                BinaryOp::Sub => Ok(Value::Num(a - b)),
                BinaryOp::Mul => Ok(Value::Num(a * b)),
                _ if b == 0.0 => Err(EvalError::DivisionByZero),
                BinaryOp::Div => Ok(Value::Num(a / b)),
                _ => Ok(Value::Num(a % b)),
            }
        }
        BinaryOp::And => Ok(Value::Bool(left.is_truthy() && right.is_truthy())),
        BinaryOp::Or => Ok(Value::Bool(left.is_truthy() || right.is_truthy())),
    }
}

/// Equality with numeric coercion between numbers and numeric text
fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Num(a), Value::Num(b)) => a == b,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::Num(n), Value::Str(s)) | (Value::Str(s), Value::Num(n)) => {
            s.trim().parse::<f64>().is_ok_and(|parsed| parsed == *n)
        }
        _ => false,
    }
}
