use crate::environment::EnvRef;
use crate::evaluator::EvalResult;
use crate::source::Span;
use std::fmt; // For custom display formatting
use std::rc::Rc;

// --- Syntax tree ---

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: Expr, // The expression itself
    pub span: Span, // The source span it covers
}

impl Node {
    pub fn new(kind: Expr, span: Span) -> Self {
        Node { kind, span }
    }

    pub fn new_atom(atom: Atom, span: Span) -> Self {
        Node::new(Expr::Atom(atom), span)
    }

    pub fn new_integer(n: i64, span: Span) -> Self {
        Node::new_atom(Atom::Integer(n), span)
    }

    pub fn new_float(n: f64, span: Span) -> Self {
        Node::new_atom(Atom::Float(n), span)
    }

    pub fn new_symbol(name: impl Into<String>, span: Span) -> Self {
        Node::new_atom(Atom::Symbol(name.into()), span)
    }

    pub fn new_combination(elements: Vec<Node>, span: Span) -> Self {
        Node::new(Expr::Combination(elements), span)
    }

    /// The symbol name, if this node is a symbol atom.
    pub fn as_symbol(&self) -> Option<&str> {
        match &self.kind {
            Expr::Atom(Atom::Symbol(name)) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

/// A parsed expression: either a single atom or a parenthesized combination.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Atom(Atom),
    Combination(Vec<Node>), // (op arg ...), possibly empty
}

#[derive(Debug, Clone, PartialEq)]
pub enum Atom {
    Integer(i64),
    Float(f64),
    Symbol(String), // e.g., +, variable-name, #t
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Atom(atom) => write!(f, "{}", atom),
            Expr::Combination(elements) => {
                write!(f, "(")?;
                let mut first = true;
                for expr in elements {
                    if !first {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", expr)?;
                    first = false;
                }
                write!(f, ")")
            }
        }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::Integer(n) => write!(f, "{}", n),
            Atom::Float(n) => write!(f, "{:?}", n),
            Atom::Symbol(s) => write!(f, "{}", s),
        }
    }
}

// --- Runtime values ---

/// A value produced by evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Pair(Rc<Value>, Rc<Value>),
    Nil, // The empty list; never a Pair
    Procedure(Procedure),
}

impl Value {
    pub fn pair(car: Value, cdr: Value) -> Value {
        Value::Pair(Rc::new(car), Rc::new(cdr))
    }

    /// Builds a proper list (ending in `Nil`) from the given items.
    pub fn list(items: Vec<Value>) -> Value {
        items
            .into_iter()
            .rev()
            .fold(Value::Nil, |tail, item| Value::pair(item, tail))
    }

    /// Everything except `#f` counts as true.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Boolean(false))
    }

    /// Collects the items of a proper list, or `None` if the chain of pairs
    /// does not end in `Nil`.
    pub fn list_items(&self) -> Option<Vec<Value>> {
        let mut items = Vec::new();
        let mut current = self;
        loop {
            match current {
                Value::Nil => return Some(items),
                Value::Pair(car, cdr) => {
                    items.push(car.as_ref().clone());
                    current = cdr.as_ref();
                }
                _ => return None,
            }
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Boolean(_) => "boolean",
            Value::Pair(_, _) => "pair",
            Value::Nil => "empty list",
            Value::Procedure(Procedure::Lambda(_)) => "closure",
            Value::Procedure(Procedure::Primitive(_)) => "primitive procedure",
        }
    }
}

// Long lists are chains of pairs. Unlink the uniquely owned tail one pair at a
// time so dropping a list does not recurse once per element.
impl Drop for Value {
    fn drop(&mut self) {
        let Value::Pair(_, cdr) = self else {
            return;
        };
        if Rc::strong_count(cdr) > 1 || !matches!(cdr.as_ref(), Value::Pair(..)) {
            return;
        }
        let nil = Rc::new(Value::Nil);
        let mut next = std::mem::replace(cdr, nil.clone());
        while let Ok(mut value) = Rc::try_unwrap(next) {
            match &mut value {
                Value::Pair(_, cdr) => next = std::mem::replace(cdr, nil.clone()),
                _ => break,
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{:?}", n),
            Value::Boolean(b) => write!(f, "{}", if *b { "#t" } else { "#f" }),
            Value::Nil => write!(f, "()"),
            Value::Pair(car, cdr) => {
                write!(f, "({}", car)?;
                let mut rest = cdr.as_ref();
                loop {
                    match rest {
                        Value::Nil => break,
                        Value::Pair(car, cdr) => {
                            write!(f, " {}", car)?;
                            rest = cdr.as_ref();
                        }
                        other => {
                            write!(f, " . {}", other)?;
                            break;
                        }
                    }
                }
                write!(f, ")")
            }
            Value::Procedure(procedure) => write!(f, "{}", procedure),
        }
    }
}

// --- Procedures ---

pub type PrimitiveFunc = dyn Fn(&[Value], Span) -> EvalResult<Value>;

/// A procedure implemented natively.
#[derive(Clone)]
pub struct Primitive {
    pub name: String,
    pub func: Rc<PrimitiveFunc>,
}

impl Primitive {
    pub fn new(
        name: impl Into<String>,
        func: impl Fn(&[Value], Span) -> EvalResult<Value> + 'static,
    ) -> Self {
        Primitive {
            name: name.into(),
            func: Rc::new(func),
        }
    }

    pub fn call(&self, args: &[Value], span: Span) -> EvalResult<Value> {
        (self.func)(args, span)
    }
}

/// A user-defined procedure: parameters, body, and the frame it was
/// created in.
pub struct Lambda {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: Rc<Node>,
    pub env: EnvRef,
}

#[derive(Clone)]
pub enum Procedure {
    Primitive(Primitive),
    Lambda(Rc<Lambda>),
}

impl fmt::Debug for Procedure {
    // Never print the captured frame: it usually contains the closure itself.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Procedure::Primitive(prim) => write!(f, "Primitive({})", prim.name),
            Procedure::Lambda(lambda) => write!(
                f,
                "Lambda({}, params: {:?})",
                lambda.name.as_deref().unwrap_or("anonymous"),
                lambda.params
            ),
        }
    }
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Procedure::Primitive(prim) => write!(f, "#<primitive:{}>", prim.name),
            Procedure::Lambda(lambda) => match &lambda.name {
                Some(name) => write!(f, "#<procedure:{}>", name),
                None => write!(f, "#<procedure>"),
            },
        }
    }
}

// Procedures compare by identity.
impl PartialEq for Procedure {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Procedure::Primitive(p1), Procedure::Primitive(p2)) => Rc::ptr_eq(&p1.func, &p2.func),
            (Procedure::Lambda(l1), Procedure::Lambda(l2)) => Rc::ptr_eq(l1, l2),
            _ => false,
        }
    }
}
