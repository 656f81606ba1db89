use std::borrow::Cow;
use std::path::PathBuf;
use std::process::ExitCode;

use ariadne::Source;
use clap::Parser as ClapParser;
use rustyline::error::ReadlineError;
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Cmd, Completer, Context, Editor, EventHandler, KeyCode, KeyEvent, Modifiers};
use rustyline::{Helper, Highlighter, Hinter, Validator};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use minilisp::evaluator::special_form_identifiers;
use minilisp::report::SOURCE_ID;
use minilisp::{
    EnvRef, Error, ParseError, TokenKind, evaluate, make_initial_frame, parse_all, tokenize,
};

/// Interactive LISP interpreter.
#[derive(ClapParser, Debug)]
#[command(name = "minilisp", version, about)]
struct Args {
    /// Trace tokens, parsed trees and results
    #[arg(short, long)]
    verbose: bool,

    /// History file
    #[arg(long, value_name = "FILE", default_value = "minilisp_history.txt")]
    history: PathBuf,

    /// Use vi key bindings
    #[arg(long)]
    vi: bool,

    /// Stack size of the evaluation thread, in megabytes
    #[arg(long, value_name = "N", default_value_t = 256)]
    stack_mb: usize,

    /// Source files evaluated into the session before the prompt
    files: Vec<PathBuf>,
}

struct LispCompleter {
    env: EnvRef,
}

impl LispCompleter {
    fn new(env: EnvRef) -> Self {
        LispCompleter { env }
    }
}

impl rustyline::completion::Completer for LispCompleter {
    type Candidate = String;
    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        let tokens = tokenize(&line[..pos]);
        let prefix = match tokens.last() {
            Some(token) if token.span.end == pos => match &token.kind {
                TokenKind::Atom(text) => text.clone(),
                _ => return Ok((pos, vec![])),
            },
            _ => return Ok((pos, vec![])),
        };
        let mut candidates: Vec<String> = self
            .env
            .borrow()
            .get_identifiers()
            .union(&special_form_identifiers())
            .filter_map(|id| id.strip_prefix(prefix.as_str()).map(str::to_string))
            .filter(|rest| !rest.is_empty())
            .collect();
        candidates.sort();
        Ok((pos, candidates))
    }
}

#[derive(Completer, Helper, Highlighter, Hinter, Validator)]
struct InputHelper {
    #[rustyline(Validator)]
    validator: ParenValidator,
    #[rustyline(Highlighter)]
    highlighter: ParenHighlighter,
    #[rustyline(Completer)]
    completer: LispCompleter,
}

// Yields each character outside of comments with its byte offset.
fn code_chars(input: &str) -> impl Iterator<Item = (usize, char)> + '_ {
    let mut in_comment = false;
    input.char_indices().filter(move |&(_, c)| {
        match c {
            ';' => in_comment = true,
            '\n' => in_comment = false,
            _ => {}
        }
        !in_comment
    })
}

struct ParenValidator;

impl Validator for ParenValidator {
    fn validate(&self, ctx: &mut ValidationContext) -> rustyline::Result<ValidationResult> {
        let mut depth = 0usize;
        for (i, c) in code_chars(ctx.input()) {
            match c {
                '(' => depth += 1,
                ')' if depth == 0 => {
                    return Ok(ValidationResult::Invalid(Some(format!(
                        "  - Unmatched ')' at position {}",
                        i
                    ))));
                }
                ')' => depth -= 1,
                _ => {}
            }
        }
        if depth > 0 {
            Ok(ValidationResult::Incomplete)
        } else {
            Ok(ValidationResult::Valid(None))
        }
    }
}

struct ParenHighlighter;

impl Highlighter for ParenHighlighter {
    fn highlight<'l>(&self, line: &'l str, pos: usize) -> Cow<'l, str> {
        // Byte offsets of the parentheses matching the one before the cursor.
        let mut stack: Vec<usize> = Vec::new();
        let mut matched: Option<(usize, usize)> = None;
        let mut unmatched: Vec<usize> = Vec::new();

        for (i, c) in code_chars(line) {
            match c {
                '(' => stack.push(i),
                ')' => match stack.pop() {
                    Some(open) => {
                        if pos.checked_sub(1).is_some_and(|p| p == i || p == open) {
                            matched = Some((open, i));
                        }
                    }
                    None => unmatched.push(i),
                },
                _ => {}
            }
        }

        if matched.is_none() && unmatched.is_empty() {
            return Cow::Borrowed(line);
        }

        let mut highlighted = String::with_capacity(line.len());
        for (i, c) in line.char_indices() {
            if matched.is_some_and(|(open, close)| i == open || i == close) {
                highlighted.push_str(&format!("\x1b[1;34m{}\x1b[0m", c)); // Blue for matching parens
            } else if unmatched.contains(&i) {
                highlighted.push_str(&format!("\x1b[31m{}\x1b[0m", c)); // Red for unmatched
            } else {
                highlighted.push(c);
            }
        }
        Cow::Owned(highlighted)
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }
}

// Evaluates every form in `input`, printing each result. Errors are reported
// and end evaluation of the remaining forms.
fn eval_input(input: &str, env: &EnvRef, echo: bool) {
    debug!(tokens = ?tokenize(input).iter().map(|t| t.as_str()).collect::<Vec<_>>(), "lexed");
    let forms = match parse_all(input) {
        Ok(forms) => forms,
        Err(err) => return report(&Error::from(err), input),
    };
    for form in &forms {
        debug!(tree = %form, "parsed");
        match evaluate(form, env.clone()) {
            Ok(value) => {
                debug!(result = %value, "evaluated");
                if echo {
                    println!("{}", value);
                }
            }
            Err(err) => return report(&Error::from(err), input),
        }
    }
}

fn report(err: &Error, input: &str) {
    if matches!(err, Error::Parse(ParseError::EmptyInput)) {
        return;
    }
    debug!(kind = ?err.kind(), "evaluation failed");
    if let Err(io_err) = err.to_report(input).eprint((SOURCE_ID, Source::from(input))) {
        error!("failed to print report: {}", io_err);
        eprintln!("{}", err);
    }
}

fn load_file(path: &PathBuf, env: &EnvRef) {
    info!(file = %path.display(), "loading");
    match std::fs::read_to_string(path) {
        Ok(text) => eval_input(&text, env, false),
        Err(err) => error!(file = %path.display(), "could not read file: {}", err),
    }
}

fn repl(args: Args) -> rustyline::Result<()> {
    println!("minilisp v{}", env!("CARGO_PKG_VERSION"));
    println!("Type 'exit' or press Ctrl-D to quit.");

    let global_env = make_initial_frame();
    for path in &args.files {
        load_file(path, &global_env);
    }

    let helper = InputHelper {
        highlighter: ParenHighlighter,
        validator: ParenValidator,
        completer: LispCompleter::new(global_env.clone()),
    };
    let edit_mode = if args.vi {
        rustyline::EditMode::Vi
    } else {
        rustyline::EditMode::Emacs
    };
    let config = rustyline::config::Config::builder()
        .edit_mode(edit_mode)
        .build();
    let mut rl = Editor::with_config(config)?;
    rl.set_helper(Some(helper));
    rl.bind_sequence(
        KeyEvent(KeyCode::Char('s'), Modifiers::CTRL),
        EventHandler::Simple(Cmd::Newline),
    );
    if rl.load_history(&args.history).is_err() {
        println!("No previous history.");
    }

    loop {
        match rl.readline("minilisp> ") {
            Ok(line) => {
                rl.add_history_entry(line.as_str())?;
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                if input.eq_ignore_ascii_case("exit") {
                    break;
                }
                eval_input(input, &global_env, true);
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl-C
                println!("Interrupted. Type 'exit' or Ctrl-D to quit.");
            }
            Err(ReadlineError::Eof) => {
                // Ctrl-D
                println!("\nExiting.");
                break;
            }
            Err(err) => {
                error!("readline error: {:?}", err);
                break;
            }
        }
    }
    rl.save_history(&args.history)
}

fn main() -> ExitCode {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("minilisp=debug,repl=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Evaluation recurses on the native stack, so it runs on a thread sized
    // by --stack-mb.
    let stack_size = args.stack_mb.saturating_mul(1024 * 1024);
    debug!(stack_size, "starting evaluation thread");
    let handle = match std::thread::Builder::new()
        .name("repl".to_string())
        .stack_size(stack_size)
        .spawn(move || repl(args))
    {
        Ok(handle) => handle,
        Err(err) => {
            error!("could not start evaluation thread: {}", err);
            return ExitCode::FAILURE;
        }
    };

    match handle.join() {
        Ok(Ok(())) => ExitCode::SUCCESS,
        Ok(Err(err)) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
        Err(_) => {
            error!("evaluation thread panicked");
            ExitCode::FAILURE
        }
    }
}
