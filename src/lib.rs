// Declare modules publicly so they are part of the library interface
pub mod environment;
pub mod error;
pub mod evaluator;
pub mod lexer;
pub mod literal;
pub mod parser;
pub mod primitives;
pub mod report;
pub mod source;
pub mod types;

pub use environment::{Builtins, EnvError, EnvRef, Environment, make_initial_frame};
pub use error::{Error, ErrorKind};
pub use evaluator::{EvalError, EvalResult, apply, evaluate};
pub use lexer::{Token, TokenKind, tokenize};
pub use parser::{ParseError, Parser, parse_all, parse_str};
pub use source::Span;
pub use types::{Atom, Expr, Node, Procedure, Value};

/// Parses every top-level form in `input` and evaluates them in order in
/// `env`, returning the value of the last one. Stops at the first error.
pub fn run(input: &str, env: &EnvRef) -> Result<Value, Error> {
    let forms = parse_all(input)?;
    let mut last = None;
    for form in &forms {
        last = Some(evaluate(form, env.clone())?);
    }
    last.ok_or(Error::Parse(ParseError::EmptyInput))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_returns_last_value() {
        let env = make_initial_frame();
        let result = run("(define x 5) (+ x 1)", &env);
        assert_eq!(result, Ok(Value::Integer(6)));
        assert_eq!(run("x", &env), Ok(Value::Integer(5)));
    }

    #[test]
    fn test_run_round_trip() {
        let env = make_initial_frame();
        assert_eq!(run("(+ 3 (- 3 1 1) 2)", &env), Ok(Value::Integer(6)));
    }

    #[test]
    fn test_run_error_kinds() {
        let env = make_initial_frame();
        let kind = |input: &str| run(input, &env).map_err(|e| e.kind()).err();

        assert_eq!(kind(""), Some(ErrorKind::EmptyInput));
        assert_eq!(kind("; only a comment"), Some(ErrorKind::EmptyInput));
        assert_eq!(kind("(+ 1 2"), Some(ErrorKind::Syntax));
        assert_eq!(kind("+ 1 2)"), Some(ErrorKind::Syntax));
        assert_eq!(kind("missing"), Some(ErrorKind::Name));
        assert_eq!(kind("(car 5)"), Some(ErrorKind::Evaluation));
        assert_eq!(kind("(/ 1 0)"), Some(ErrorKind::Evaluation));
        assert_eq!(kind("((lambda (x y) x) 1)"), Some(ErrorKind::Evaluation));
    }

    #[test]
    fn test_run_stops_at_first_error() {
        let env = make_initial_frame();
        assert!(run("(define a 1) (car a) (define b 2)", &env).is_err());
        assert!(env.borrow().is_defined("a"));
        assert!(!env.borrow().is_defined("b"));
    }

    #[test]
    fn test_error_spans() {
        let env = make_initial_frame();
        let err = run("(+ 1 oops)", &env).unwrap_err();
        assert_eq!(err.span(), Some(Span::new(5, 9)));
        assert_eq!(run("", &env).unwrap_err().span(), None);
    }

    #[test]
    fn test_sessions_are_independent() {
        let first = make_initial_frame();
        let second = make_initial_frame();
        run("(define + -)", &first).unwrap();
        assert_eq!(run("(+ 5 3)", &first), Ok(Value::Integer(2)));
        assert_eq!(run("(+ 5 3)", &second), Ok(Value::Integer(8)));
    }
}
