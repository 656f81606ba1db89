use logos::Logos;
use std::fmt;

use crate::Span;

/// The lexer never fails: every character is either whitespace, part of a
/// comment, a parenthesis, or part of an atom.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n]+")] // Skip whitespace
#[logos(skip r";[^\n]*")] // Skip comments up to (not including) the newline
pub enum TokenKind {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    // Anything else that isn't a delimiter. Numbers and symbols are told apart
    // later by the literal classifier.
    #[regex(r"[^ \t\n();]+", |lex| lex.slice().to_string())]
    Atom(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    /// The token's source text.
    pub fn as_str(&self) -> &str {
        match &self.kind {
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::Atom(text) => text,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::LParen => write!(f, "("),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::Atom(s) => write!(f, "{}", s),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}

/// Splits source text into tokens, discarding whitespace and `;` comments.
pub fn tokenize(input: &str) -> Vec<Token> {
    let mut lexer = TokenKind::lexer(input);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        let range = lexer.span();
        // Unreachable with the patterns above, but an unmatched slice is still
        // just text as far as the parser is concerned.
        let kind = result.unwrap_or_else(|()| TokenKind::Atom(lexer.slice().to_string()));
        tokens.push(Token {
            kind,
            span: Span::new(range.start, range.end),
        });
    }
    tokens
}

/// Convenience for callers that only care about the token text.
pub fn tokenize_to_strings(input: &str) -> Vec<String> {
    tokenize(input)
        .iter()
        .map(|token| token.as_str().to_string())
        .collect()
}
