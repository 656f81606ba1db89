use crate::Span;
use crate::lexer::{Token, TokenKind};
use crate::literal::classify;
use crate::types::Node;
use std::fmt;
use std::iter::Peekable;
use std::vec::IntoIter; // To iterate over Vec<Token>
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxErrorKind {
    UnmatchedParen,
    TrailingInput,
}

impl fmt::Display for SyntaxErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyntaxErrorKind::UnmatchedParen => write!(f, "unmatched parenthesis"),
            SyntaxErrorKind::TrailingInput => write!(f, "unexpected input after a complete expression"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("Syntax Error [at {span}]: {kind}")]
pub struct SyntaxError {
    pub kind: SyntaxErrorKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("Parse Error: no input to parse")]
    EmptyInput,
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
}

impl ParseError {
    fn syntax(kind: SyntaxErrorKind, span: Span) -> Self {
        ParseError::Syntax(SyntaxError { kind, span })
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            ParseError::EmptyInput => None,
            ParseError::Syntax(err) => Some(err.span),
        }
    }
}

// Result type alias for convenience
pub type ParseResult<T> = Result<T, ParseError>;

/// Recursive-descent parser over a front-consuming token cursor.
pub struct Parser {
    tokens: Peekable<IntoIter<Token>>,
    // Span of the last consumed token.
    last_span: Span,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens: tokens.into_iter().peekable(),
            last_span: Span::default(),
        }
    }

    // Consumes the next token if available.
    fn next_token(&mut self) -> Option<Token> {
        let token = self.tokens.next()?;
        self.last_span = token.span;
        Some(token)
    }

    /// True once every token has been consumed.
    pub fn is_exhausted(&mut self) -> bool {
        self.tokens.peek().is_none()
    }

    /// Consumes and returns exactly one expression from the cursor.
    pub fn parse_expr(&mut self) -> ParseResult<Node> {
        let token = self.next_token().ok_or(ParseError::EmptyInput)?;
        match token.kind {
            TokenKind::LParen => self.parse_combination(token.span),
            TokenKind::RParen => Err(ParseError::syntax(SyntaxErrorKind::UnmatchedParen, token.span)),
            TokenKind::Atom(text) => Ok(Node::new_atom(classify(&text), token.span)),
        }
    }

    /// Parses the elements of a combination whose `(` has already been consumed.
    fn parse_combination(&mut self, open: Span) -> ParseResult<Node> {
        let mut elements = Vec::new();
        loop {
            let at_close = self
                .tokens
                .peek()
                .map(|token| token.kind == TokenKind::RParen);
            match at_close {
                Some(true) => {
                    self.next_token();
                    return Ok(Node::new_combination(elements, open.merge(self.last_span)));
                }
                Some(false) => elements.push(self.parse_expr()?),
                // Reached EOF before finding ')'
                None => return Err(ParseError::syntax(SyntaxErrorKind::UnmatchedParen, open)),
            }
        }
    }

    /// Parses exactly one expression and requires the cursor to be exhausted
    /// afterwards.
    pub fn parse(mut self) -> ParseResult<Node> {
        let expr = self.parse_expr()?;

        // Check if there are any tokens left - shouldn't be for a single expression parse
        match self.next_token() {
            Some(found) => Err(ParseError::syntax(SyntaxErrorKind::TrailingInput, found.span)),
            None => Ok(expr),
        }
    }

    /// Parses every top-level expression until the cursor is exhausted.
    pub fn parse_all(mut self) -> ParseResult<Vec<Node>> {
        let mut expressions = Vec::new();
        while !self.is_exhausted() {
            expressions.push(self.parse_expr()?);
        }
        Ok(expressions)
    }
}

// Helper function to lex and parse a single expression (useful for tests and REPL)
pub fn parse_str(input: &str) -> ParseResult<Node> {
    Parser::new(crate::lexer::tokenize(input)).parse()
}

/// Lexes and parses all top-level expressions in `input`, in order.
pub fn parse_all(input: &str) -> ParseResult<Vec<Node>> {
    Parser::new(crate::lexer::tokenize(input)).parse_all()
}
