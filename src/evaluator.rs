use crate::environment::{EnvError, EnvRef, Environment};
use crate::error::ErrorKind;
use crate::source::Span;
use crate::types::{Atom, Expr, Lambda, Node, Procedure, Value};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

// --- Evaluation Error ---

/// How many arguments a procedure or special form accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exactly(n) => count == n,
            Arity::AtLeast(n) => count >= n,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exactly(n) => write!(f, "exactly {}", n),
            Arity::AtLeast(n) => write!(f, "at least {}", n),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error(transparent)]
    Name(#[from] EnvError), // Errors from environment lookup
    #[error("Evaluation Error: '{form}' expects {expected} arguments, got {found}")]
    ArityMismatch {
        form: String,
        expected: Arity,
        found: usize,
        span: Span,
    },
    #[error("Evaluation Error: expected a procedure, but got {value}")]
    NotCallable { value: String, span: Span },
    #[error("Evaluation Error: invalid arguments to '{procedure}' - {message}")]
    BadArguments {
        procedure: String,
        message: String,
        span: Span,
    },
    #[error("Evaluation Error: '{procedure}' expects {expected}, got {found}")]
    TypeMismatch {
        procedure: String,
        expected: &'static str,
        found: &'static str,
        span: Span,
    },
    #[error("Evaluation Error: division by zero")]
    DivideByZero { span: Span },
    #[error("Evaluation Error: empty combination has nothing to apply")]
    EmptyApplication { span: Span },
    #[error("Evaluation Error: invalid special form - {message}")]
    InvalidSpecialForm { message: String, span: Span },
}

impl EvalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EvalError::Name(_) => ErrorKind::Name,
            _ => ErrorKind::Evaluation,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            EvalError::Name(EnvError::UnboundVariable(_, span)) => *span,
            EvalError::ArityMismatch { span, .. }
            | EvalError::NotCallable { span, .. }
            | EvalError::BadArguments { span, .. }
            | EvalError::TypeMismatch { span, .. }
            | EvalError::DivideByZero { span }
            | EvalError::EmptyApplication { span }
            | EvalError::InvalidSpecialForm { span, .. } => *span,
        }
    }

    fn invalid_form(message: impl Into<String>, span: Span) -> Self {
        EvalError::InvalidSpecialForm {
            message: message.into(),
            span,
        }
    }
}

// Result type alias for convenience
pub type EvalResult<T = Value> = Result<T, EvalError>;

// --- Special forms ---

/// Head symbols whose operands are not all evaluated before dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialForm {
    Define,
    Lambda,
    If,
    And,
    Or,
    Begin,
    Let,
    Set,
}

impl SpecialForm {
    pub const ALL: [SpecialForm; 8] = [
        SpecialForm::Define,
        SpecialForm::Lambda,
        SpecialForm::If,
        SpecialForm::And,
        SpecialForm::Or,
        SpecialForm::Begin,
        SpecialForm::Let,
        SpecialForm::Set,
    ];

    pub fn from_symbol(name: &str) -> Option<Self> {
        SpecialForm::ALL.into_iter().find(|form| form.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            SpecialForm::Define => "define",
            SpecialForm::Lambda => "lambda",
            SpecialForm::If => "if",
            SpecialForm::And => "and",
            SpecialForm::Or => "or",
            SpecialForm::Begin => "begin",
            SpecialForm::Let => "let",
            SpecialForm::Set => "set!",
        }
    }
}

/// Names of all special forms, e.g. for completion.
pub fn special_form_identifiers() -> HashSet<String> {
    SpecialForm::ALL
        .iter()
        .map(|form| form.name().to_string())
        .collect()
}

// --- Evaluate Function ---

/// Evaluates a given AST Node within the specified environment.
///
/// Procedure calls recurse through this function, so the depth of native
/// recursion grows with the depth of the call chain. There is no tail-call
/// elimination; hosts running deep programs need to provide enough stack.
pub fn evaluate(node: &Node, env: EnvRef) -> EvalResult {
    match &node.kind {
        // 1. Self-evaluating atoms
        Expr::Atom(Atom::Integer(n)) => Ok(Value::Integer(*n)),
        Expr::Atom(Atom::Float(n)) => Ok(Value::Float(*n)),

        // 2. Symbols: Look up in the environment
        Expr::Atom(Atom::Symbol(name)) => Ok(env.borrow().get(name, node.span)?),

        // 3. Combinations: special forms or procedure calls
        Expr::Combination(elements) => {
            let [first, rest @ ..] = elements.as_slice() else {
                return Err(EvalError::EmptyApplication { span: node.span });
            };
            match first.as_symbol().and_then(SpecialForm::from_symbol) {
                Some(form) => evaluate_special_form(form, rest, env, node.span),
                None => evaluate_procedure(first, rest, env, node.span),
            }
        }
    }
}

/// Evaluates `node` in a fresh session frame over the standard builtins.
pub fn evaluate_fresh(node: &Node) -> EvalResult {
    evaluate(node, Environment::new_global_populated())
}

fn evaluate_special_form(
    form: SpecialForm,
    operands: &[Node],
    env: EnvRef,
    span: Span,
) -> EvalResult {
    match form {
        SpecialForm::Define => evaluate_define(operands, env, span),
        SpecialForm::Lambda => evaluate_lambda(operands, env, span),
        SpecialForm::If => evaluate_if(operands, env, span),
        SpecialForm::And => {
            for operand in operands {
                if !evaluate(operand, env.clone())?.is_truthy() {
                    return Ok(Value::Boolean(false));
                }
            }
            Ok(Value::Boolean(true))
        }
        SpecialForm::Or => {
            for operand in operands {
                if evaluate(operand, env.clone())?.is_truthy() {
                    return Ok(Value::Boolean(true));
                }
            }
            Ok(Value::Boolean(false))
        }
        SpecialForm::Begin => evaluate_begin(operands, env, span),
        SpecialForm::Let => evaluate_let(operands, env, span),
        SpecialForm::Set => evaluate_set(operands, env, span),
    }
}

fn arity_error(form: SpecialForm, expected: Arity, found: usize, span: Span) -> EvalError {
    EvalError::ArityMismatch {
        form: form.name().to_string(),
        expected,
        found,
        span,
    }
}

fn expect_operands(form: SpecialForm, operands: &[Node], arity: Arity, span: Span) -> EvalResult<()> {
    if arity.accepts(operands.len()) {
        Ok(())
    } else {
        Err(arity_error(form, arity, operands.len(), span))
    }
}

fn evaluate_if(operands: &[Node], env: EnvRef, span: Span) -> EvalResult {
    let [condition, consequent, alternate] = operands else {
        return Err(arity_error(SpecialForm::If, Arity::Exactly(3), operands.len(), span));
    };

    // Only #f is false, everything else is true.
    if evaluate(condition, env.clone())?.is_truthy() {
        evaluate(consequent, env)
    } else {
        evaluate(alternate, env)
    }
}

/// `(define name expr)` or `(define (name param ...) body)`.
///
/// The value expression is always evaluated, and the bound value is returned.
fn evaluate_define(operands: &[Node], env: EnvRef, span: Span) -> EvalResult {
    expect_operands(SpecialForm::Define, operands, Arity::Exactly(2), span)?;
    let (target, body) = (&operands[0], &operands[1]);

    match &target.kind {
        Expr::Atom(Atom::Symbol(name)) => {
            let value = evaluate(body, env.clone())?;
            env.borrow_mut().define(name.clone(), value.clone());
            Ok(value)
        }
        Expr::Combination(signature) => {
            let Some((name, params)) = signature.split_first() else {
                return Err(EvalError::invalid_form(
                    "define needs a procedure name",
                    target.span,
                ));
            };
            let Some(name) = name.as_symbol() else {
                return Err(EvalError::invalid_form(
                    format!("procedure name must be a symbol, got {}", name),
                    name.span,
                ));
            };
            let value = make_lambda(Some(name.to_string()), params, body, env.clone())?;
            env.borrow_mut().define(name, value.clone());
            Ok(value)
        }
        Expr::Atom(other) => Err(EvalError::invalid_form(
            format!("cannot define {}, expected a symbol", other),
            target.span,
        )),
    }
}

/// `(lambda (param ...) body)`: captures the current frame.
fn evaluate_lambda(operands: &[Node], env: EnvRef, span: Span) -> EvalResult {
    expect_operands(SpecialForm::Lambda, operands, Arity::Exactly(2), span)?;
    let (params, body) = (&operands[0], &operands[1]);
    match &params.kind {
        Expr::Combination(params) => make_lambda(None, params, body, env),
        Expr::Atom(_) => Err(EvalError::invalid_form(
            "lambda parameters must be a parenthesized list",
            params.span,
        )),
    }
}

fn make_lambda(name: Option<String>, params: &[Node], body: &Node, env: EnvRef) -> EvalResult {
    let params = params
        .iter()
        .map(|param| {
            param.as_symbol().map(str::to_string).ok_or_else(|| {
                EvalError::invalid_form(
                    format!("parameter must be a symbol, got {}", param),
                    param.span,
                )
            })
        })
        .collect::<EvalResult<Vec<String>>>()?;

    Ok(Value::Procedure(Procedure::Lambda(Rc::new(Lambda {
        name,
        params,
        body: Rc::new(body.clone()),
        env,
    }))))
}

fn evaluate_begin(operands: &[Node], env: EnvRef, span: Span) -> EvalResult {
    expect_operands(SpecialForm::Begin, operands, Arity::AtLeast(1), span)?;
    let mut result = Value::Nil;
    for operand in operands {
        result = evaluate(operand, env.clone())?;
    }
    Ok(result)
}

/// `(let ((name expr) ...) body)`: the bindings are evaluated in the current
/// frame, then the body runs in one new child frame.
fn evaluate_let(operands: &[Node], env: EnvRef, span: Span) -> EvalResult {
    expect_operands(SpecialForm::Let, operands, Arity::Exactly(2), span)?;
    let (bindings, body) = (&operands[0], &operands[1]);
    let Expr::Combination(bindings) = &bindings.kind else {
        return Err(EvalError::invalid_form(
            "let bindings must be a parenthesized list",
            bindings.span,
        ));
    };

    let mut values = Vec::with_capacity(bindings.len());
    for binding in bindings {
        let (name, expr) = match &binding.kind {
            Expr::Combination(pair) => match pair.as_slice() {
                [name, expr] => match name.as_symbol() {
                    Some(name) => (name, expr),
                    None => {
                        return Err(EvalError::invalid_form(
                            format!("let binding name must be a symbol, got {}", name),
                            name.span,
                        ));
                    }
                },
                _ => {
                    return Err(EvalError::invalid_form(
                        "let binding must be (name expr)",
                        binding.span,
                    ));
                }
            },
            Expr::Atom(_) => {
                return Err(EvalError::invalid_form(
                    "let binding must be (name expr)",
                    binding.span,
                ));
            }
        };
        values.push((name.to_string(), evaluate(expr, env.clone())?));
    }

    let let_env = Environment::new_enclosed(env);
    {
        let mut frame = let_env.borrow_mut();
        for (name, value) in values {
            frame.define(name, value);
        }
    }
    evaluate(body, let_env)
}

/// `(set! name expr)`: rebinds the nearest existing binding of `name`.
fn evaluate_set(operands: &[Node], env: EnvRef, span: Span) -> EvalResult {
    expect_operands(SpecialForm::Set, operands, Arity::Exactly(2), span)?;
    let (target, expr) = (&operands[0], &operands[1]);
    let Some(name) = target.as_symbol() else {
        return Err(EvalError::invalid_form(
            format!("set! target must be a symbol, got {}", target),
            target.span,
        ));
    };
    let value = evaluate(expr, env.clone())?;
    env.borrow_mut().set(name, value.clone(), target.span)?;
    Ok(value)
}

fn evaluate_procedure(operator: &Node, operands: &[Node], env: EnvRef, span: Span) -> EvalResult {
    // 1. An unknown operator name fails before any operand is evaluated
    if let Some(name) = operator.as_symbol() {
        if !env.borrow().is_defined(name) {
            return Err(EnvError::UnboundVariable(name.to_string(), operator.span).into());
        }
    }

    // 2. Check the operator evaluates to a procedure
    let procedure = match &evaluate(operator, env.clone())? {
        Value::Procedure(procedure) => procedure.clone(),
        other => {
            return Err(EvalError::NotCallable {
                value: other.to_string(),
                span: operator.span,
            });
        }
    };

    // 3. Evaluate the operands, left to right
    let mut evaluated_args = Vec::with_capacity(operands.len());
    for operand_node in operands {
        evaluated_args.push(evaluate(operand_node, env.clone())?);
    }

    // 4. Apply the procedure
    apply(&procedure, &evaluated_args, span)
}

/// Applies a procedure to already-evaluated arguments.
pub fn apply(procedure: &Procedure, args: &[Value], span: Span) -> EvalResult {
    match procedure {
        Procedure::Primitive(primitive) => primitive.call(args, span),
        Procedure::Lambda(lambda) => {
            if args.len() != lambda.params.len() {
                return Err(EvalError::ArityMismatch {
                    form: lambda.name.clone().unwrap_or_else(|| "lambda".to_string()),
                    expected: Arity::Exactly(lambda.params.len()),
                    found: args.len(),
                    span,
                });
            }

            // The call frame hangs off the closure's defining frame, not the caller's.
            let call_env = Environment::new_enclosed(lambda.env.clone());
            {
                let mut frame = call_env.borrow_mut();
                for (param, arg) in lambda.params.iter().zip(args) {
                    frame.define(param.clone(), arg.clone());
                }
            }
            evaluate(&lambda.body, call_env)
        }
    }
}
