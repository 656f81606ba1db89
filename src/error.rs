use crate::evaluator::EvalError;
use crate::parser::ParseError;
use crate::source::Span;
use thiserror::Error;

/// Broad classification of everything the interpreter can raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Nothing left to parse.
    EmptyInput,
    /// Malformed token stream: unmatched parenthesis or trailing tokens.
    Syntax,
    /// A symbol with no reachable binding.
    Name,
    /// Arity, type, division and application errors.
    Evaluation,
}

/// Any error from parsing or evaluating source text.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Parse(ParseError::EmptyInput) => ErrorKind::EmptyInput,
            Error::Parse(ParseError::Syntax(_)) => ErrorKind::Syntax,
            Error::Eval(err) => err.kind(),
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            Error::Parse(err) => err.span(),
            Error::Eval(err) => Some(err.span()),
        }
    }
}
