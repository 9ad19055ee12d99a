use std::fmt;

use serde::{Deserialize, Serialize};

/// Comparison operator between a key and its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    /// `=`
    Eq,
    /// `!=`
    Ne,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// `<`
    Lt,
    /// `<=`
    Lte,
}

/// Token types produced by the clause lexer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Token {
    /// A leading `!` (field must not exist).
    Bang,
    /// The field name, possibly dotted.
    Key(String),
    /// The operator between key and value.
    Op(Operator),
    /// Everything after the operator, uninterpreted.
    Value(String),
    /// The end of the clause.
    Eof,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
        };
        f.write_str(s)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Bang => write!(f, "!"),
            Token::Key(k) => write!(f, "{k}"),
            Token::Op(op) => write!(f, "{op}"),
            Token::Value(v) => write!(f, "\"{v}\""),
            Token::Eof => write!(f, "EOF"),
        }
    }
}

/// Position in the clause for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// A token with its source position.
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
}

/// Lexer error.
#[derive(Debug, thiserror::Error)]
pub enum LexError {
    #[error("unexpected character '{0}' at position {1}")]
    UnexpectedChar(char, usize),
    #[error("empty clause")]
    Empty,
}

fn is_operator_char(ch: char) -> bool {
    matches!(ch, '=' | '!' | '<' | '>')
}

/// Tokenize one decoded `key<op>value` clause.
pub fn tokenize(input: &str) -> Result<Vec<SpannedToken>, LexError> {
    let chars: Vec<char> = input.chars().collect();
    if chars.is_empty() {
        return Err(LexError::Empty);
    }

    let mut tokens = Vec::new();
    let mut pos = 0;

    if chars[0] == '!' {
        tokens.push(SpannedToken {
            token: Token::Bang,
            span: Span { start: 0, end: 1 },
        });
        pos = 1;
    }

    // Key runs up to the first operator character.
    let key_start = pos;
    while pos < chars.len() && !is_operator_char(chars[pos]) {
        pos += 1;
    }
    let key: String = chars[key_start..pos].iter().collect();
    tokens.push(SpannedToken {
        token: Token::Key(key.trim().to_string()),
        span: Span {
            start: key_start,
            end: pos,
        },
    });

    if pos < chars.len() {
        let op_start = pos;
        let ch = chars[pos];
        let next_is_eq = chars.get(pos + 1) == Some(&'=');
        let op = match ch {
            '=' => {
                pos += 1;
                Operator::Eq
            }
            '!' if next_is_eq => {
                pos += 2;
                Operator::Ne
            }
            '>' if next_is_eq => {
                pos += 2;
                Operator::Gte
            }
            '>' => {
                pos += 1;
                Operator::Gt
            }
            '<' if next_is_eq => {
                pos += 2;
                Operator::Lte
            }
            '<' => {
                pos += 1;
                Operator::Lt
            }
            _ => return Err(LexError::UnexpectedChar(ch, pos)),
        };
        tokens.push(SpannedToken {
            token: Token::Op(op),
            span: Span {
                start: op_start,
                end: pos,
            },
        });

        let value: String = chars[pos..].iter().collect();
        tokens.push(SpannedToken {
            token: Token::Value(value),
            span: Span {
                start: pos,
                end: chars.len(),
            },
        });
        pos = chars.len();
    }

    tokens.push(SpannedToken {
        token: Token::Eof,
        span: Span {
            start: pos,
            end: pos,
        },
    });

    Ok(tokens)
}
