//! Tokenizer for the expression grammar

use crate::error::EvalError;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Num(f64),
    Str(String),
    Bool(bool),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "\"{s}\""),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Ident(name) => f.write_str(name),
            Self::Op(op) => f.write_str(op),
            Self::LParen => f.write_str("("),
            Self::RParen => f.write_str(")"),
        }
    }
}

/// Two-character operators must be tried before their one-character prefixes
const OPERATORS: &[&str] = &[
    "==", "!=", "<=", ">=", "&&", "||", "<", ">", "!", "+", "-", "*", "/", "%",
];

pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>, EvalError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_digit()
            || (c == '.' && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit()))
        {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            let number = text
                .parse::<f64>()
                .map_err(|_| EvalError::UnexpectedToken(text.clone()))?;
            tokens.push(Token::Num(number));
            continue;
        }

        if c == '"' || c == '\'' {
            let (literal, next) = read_string(&chars, i)?;
            tokens.push(Token::Str(literal));
            i = next;
            continue;
        }

        // `$name` and `{name}` are accepted as variable references too
        if c == '$' || c == '{' {
            let (name, next) = read_identifier(&chars, i + 1);
            if name.is_empty() {
                return Err(EvalError::UnexpectedChar(c));
            }
            i = next;
            if c == '{' {
                if chars.get(i) != Some(&'}') {
                    return Err(EvalError::UnexpectedChar('{'));
                }
                i += 1;
            }
            tokens.push(Token::Ident(name));
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let (word, next) = read_identifier(&chars, i);
            i = next;
            tokens.push(match word.as_str() {
                "true" => Token::Bool(true),
                "false" => Token::Bool(false),
                "and" => Token::Op("&&"),
                "or" => Token::Op("||"),
                "not" => Token::Op("!"),
                _ => Token::Ident(word),
            });
            continue;
        }

        if c == '(' {
            tokens.push(Token::LParen);
            i += 1;
            continue;
        }
        if c == ')' {
            tokens.push(Token::RParen);
            i += 1;
            continue;
        }

        let op = OPERATORS.iter().find(|op| {
            op.chars()
                .enumerate()
                .all(|(offset, expected)| chars.get(i + offset) == Some(&expected))
        });
        match op {
            Some(op) => {
                tokens.push(Token::Op(*op));
                i += op.len();
            }
            None => return Err(EvalError::UnexpectedChar(c)),
        }
    }

    Ok(tokens)
}

fn read_identifier(chars: &[char], start: usize) -> (String, usize) {
    let mut end = start;
    if end < chars.len() && (chars[end].is_alphabetic() || chars[end] == '_') {
        end += 1;
        while end < chars.len() && (chars[end].is_alphanumeric() || chars[end] == '_') {
            end += 1;
        }
    }
    (chars[start..end].iter().collect(), end)
}

fn read_string(chars: &[char], start: usize) -> Result<(String, usize), EvalError> {
    let quote = chars[start];
    let mut literal = String::new();
    let mut i = start + 1;

    while i < chars.len() {
        match chars[i] {
            '\\' if i + 1 < chars.len() => {
                literal.push(chars[i + 1]);
                i += 2;
            }
            c if c == quote => return Ok((literal, i + 1)),
            c => {
                literal.push(c);
                i += 1;
            }
        }
    }

    Err(EvalError::UnterminatedString)
}
