//! Error types for the dialogue engine
//!
//! Only [`ScriptError`] ever reaches the player. Evaluation and persistence
//! failures are recovered where they happen and only logged.

use thiserror::Error;

/// A fatal problem found while parsing a script
#[derive(Debug, Error, Clone, PartialEq)]
#[error("line {line}: {kind}")]
pub struct ScriptError {
    /// 1-indexed source line (0 when the problem is not tied to a line)
    pub line: usize,
    pub kind: ScriptErrorKind,
}

impl ScriptError {
    pub fn new(line: usize, kind: ScriptErrorKind) -> Self {
        Self { line, kind }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScriptErrorKind {
    #[error("metadata block is never closed with '---'")]
    UnterminatedMetadata,

    #[error("malformed metadata entry '{entry}', expected 'key: value'")]
    MalformedMetadata { entry: String },

    #[error("'{content}' appears before the first node header")]
    OutsideNode { content: String },

    #[error("node header has no name")]
    EmptyNodeName,

    #[error("node '{node}' is defined twice")]
    DuplicateNode { node: String },

    #[error("script has no 'start' node")]
    MissingStart,

    #[error("node '{node}' continues after its jump")]
    StatementAfterJump { node: String },

    #[error("annotation starting with '[' is never closed")]
    UnterminatedAnnotation,

    #[error("unknown annotation '[{annotation}]'")]
    UnknownAnnotation { annotation: String },

    #[error("command line has no command")]
    EmptyCommand,

    #[error("choice option has no text")]
    EmptyChoice,

    #[error("{construct} lines cannot carry a condition")]
    ConditionNotAllowed { construct: &'static str },

    #[error("undefined node '{target}' referenced")]
    UndefinedNode { target: String },
}

/// Failure while evaluating a condition or an arithmetic expression
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),

    #[error("unterminated string literal")]
    UnterminatedString,

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("unexpected token '{0}'")]
    UnexpectedToken(String),

    #[error("undefined variable '{0}'")]
    UndefinedVariable(String),

    #[error("variable '{0}' is not numeric")]
    NotNumeric(String),

    #[error("disallowed character '{0}' in arithmetic expression")]
    Disallowed(char),

    #[error("cannot apply '{op}' to {left} and {right}")]
    TypeMismatch {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("expression did not produce a number")]
    NotANumber,

    #[error("expression nests deeper than {0} levels")]
    TooDeep(usize),
}

/// Failure reading or writing durable storage
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage unavailable: {reason}")]
    Unavailable { reason: String },
}

/// A debug jump that the engine refused
#[derive(Debug, Error, Clone, PartialEq)]
pub enum JumpError {
    #[error("node '{0}' does not exist")]
    UnknownNode(String),

    #[error("node '{0}' has not been visited yet")]
    Locked(String),
}
