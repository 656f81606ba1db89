use std::ops::Range;

use ariadne::{Label, Report, ReportKind};

use crate::environment::EnvError;
use crate::error::Error;
use crate::evaluator::EvalError;
use crate::parser::{ParseError, SyntaxErrorKind};

/// Source id used in every report.
pub const SOURCE_ID: &str = "input";

pub type ReportSpan = (&'static str, Range<usize>);

fn labelled(range: Range<usize>, message: String, label: impl ToString) -> Report<'static, ReportSpan> {
    Report::build(ReportKind::Error, (SOURCE_ID, range.clone()))
        .with_message(message)
        .with_label(Label::new((SOURCE_ID, range)).with_message(label))
        .finish()
}

impl ParseError {
    /// Builds a diagnostic for this error. `input` is the text that was parsed.
    pub fn to_report(&self, input: &str) -> Report<'static, ReportSpan> {
        match self {
            ParseError::EmptyInput => {
                let end = input.len();
                Report::build(ReportKind::Error, (SOURCE_ID, end..end))
                    .with_message("Nothing to evaluate")
                    .finish()
            }
            ParseError::Syntax(err) => {
                let label = match err.kind {
                    SyntaxErrorKind::UnmatchedParen => "This parenthesis has no partner",
                    SyntaxErrorKind::TrailingInput => "Input continues after a complete expression",
                };
                labelled(err.span.to_range(), format!("Syntax error: {}", err.kind), label)
            }
        }
    }
}

impl EvalError {
    pub fn to_report(&self) -> Report<'static, ReportSpan> {
        let range = self.span().to_range();
        match self {
            EvalError::Name(EnvError::UnboundVariable(symbol, _)) => labelled(
                range,
                format!("Unbound symbol `{}`", symbol),
                "This symbol is not defined in the current scope",
            ),
            EvalError::ArityMismatch {
                form,
                expected,
                found,
                ..
            } => labelled(
                range,
                format!("Wrong number of arguments to {}", form),
                format!("Expected {} arguments, found {}", expected, found),
            ),
            EvalError::NotCallable { value, .. } => labelled(
                range,
                format!("Not a procedure: {}", value),
                "This expression cannot be called as a procedure",
            ),
            EvalError::BadArguments {
                procedure, message, ..
            } => labelled(range, format!("Invalid arguments to {}", procedure), message),
            EvalError::TypeMismatch {
                procedure,
                expected,
                found,
                ..
            } => labelled(
                range,
                format!("Type mismatch in {}", procedure),
                format!("Expected {}, found {}", expected, found),
            ),
            EvalError::DivideByZero { .. } => {
                labelled(range, "Division by zero".to_string(), "The divisor evaluates to zero")
            }
            EvalError::EmptyApplication { .. } => labelled(
                range,
                "Empty combination".to_string(),
                "There is no procedure to apply",
            ),
            EvalError::InvalidSpecialForm { message, .. } => labelled(
                range,
                format!("Invalid special form: {}", message),
                "This special form is malformed or incomplete",
            ),
        }
    }
}

impl Error {
    pub fn to_report(&self, input: &str) -> Report<'static, ReportSpan> {
        match self {
            Error::Parse(err) => err.to_report(input),
            Error::Eval(err) => err.to_report(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::make_initial_frame;
    use crate::run;
    use ariadne::Source;

    fn render(input: &str) -> String {
        let env = make_initial_frame();
        let err = run(input, &env).expect_err("input should fail");
        let mut out = Vec::new();
        err.to_report(input)
            .write((SOURCE_ID, Source::from(input)), &mut out)
            .unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_reports_name_error() {
        let text = render("(+ 1 undefined-thing)");
        assert!(text.contains("Unbound symbol `undefined-thing`"), "{}", text);
    }

    #[test]
    fn test_reports_syntax_error() {
        let text = render("(+ 1 2");
        assert!(text.contains("unmatched parenthesis"), "{}", text);
    }

    #[test]
    fn test_reports_divide_by_zero() {
        let text = render("(/ 4 0)");
        assert!(text.contains("Division by zero"), "{}", text);
    }

    #[test]
    fn test_reports_empty_input() {
        let text = render("   ");
        assert!(text.contains("Nothing to evaluate"), "{}", text);
    }
}
