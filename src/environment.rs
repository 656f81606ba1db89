use crate::evaluator::EvalResult;
use crate::source::Span;
use crate::types::{Primitive, Procedure, Value};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use thiserror::Error;

// --- Environment Error ---

/// A symbol with no binding reachable from the frame it was looked up in.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EnvError {
    #[error("Name Error: unbound variable '{0}'")]
    UnboundVariable(String, Span), // Symbol name, span where lookup happened
}

/// Shared handle to a frame. Closures and child frames hold these.
pub type EnvRef = Rc<RefCell<Environment>>;

// --- Builtin table ---

/// An explicitly constructed table of builtin bindings, installed into its own
/// frame beneath the user-writable global frame.
#[derive(Debug, Clone, Default)]
pub struct Builtins {
    bindings: Vec<(String, Value)>,
}

impl Builtins {
    pub fn new() -> Self {
        Builtins::default()
    }

    /// The standard library: arithmetic, comparison, booleans and pairs.
    pub fn standard() -> Self {
        crate::primitives::install(Builtins::new())
    }

    pub fn with_value(mut self, name: &str, value: Value) -> Self {
        self.bindings.push((name.to_string(), value));
        self
    }

    pub fn with_primitive(
        self,
        name: &str,
        func: impl Fn(&[Value], Span) -> EvalResult<Value> + 'static,
    ) -> Self {
        let primitive = Primitive::new(name, func);
        self.with_value(name, Value::Procedure(Procedure::Primitive(primitive)))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|(name, _)| name.as_str())
    }
}

// --- Environment Definition ---

#[derive(Debug, Default)]
pub struct Environment {
    // Use Rc<RefCell<...>> to allow shared ownership and interior mutability.
    // Needed for closures capturing environments and for later `define`s.
    outer: Option<EnvRef>,
    bindings: HashMap<String, Value>,
}

impl Environment {
    /// Creates a new, top-level frame with no parent.
    pub fn new() -> EnvRef {
        Rc::new(RefCell::new(Environment::default()))
    }

    /// Creates a new frame enclosed within an outer one.
    pub fn new_enclosed(outer_env: EnvRef) -> EnvRef {
        Rc::new(RefCell::new(Environment {
            outer: Some(outer_env),
            bindings: HashMap::new(),
        }))
    }

    /// Builds the two-tier session frame: a builtins frame holding `builtins`,
    /// and an empty global frame on top of it. The global frame is returned.
    pub fn with_builtins(builtins: &Builtins) -> EnvRef {
        let builtins_env = Environment::new();
        {
            let mut env = builtins_env.borrow_mut();
            for (name, value) in &builtins.bindings {
                env.define(name.clone(), value.clone());
            }
        }
        Environment::new_enclosed(builtins_env)
    }

    /// Global frame over the standard builtins.
    pub fn new_global_populated() -> EnvRef {
        Environment::with_builtins(&Builtins::standard())
    }

    /// Defines a variable in the *current* frame.
    /// Replaces the value if the variable already exists in this frame.
    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    /// Looks up a variable's value.
    /// Checks the current frame first, then walks up the outer chain.
    /// `lookup_span` is the location where the variable was referenced, used for error reporting.
    pub fn get(&self, name: &str, lookup_span: Span) -> Result<Value, EnvError> {
        if let Some(value) = self.bindings.get(name) {
            Ok(value.clone())
        } else {
            match &self.outer {
                Some(outer_env_ptr) => outer_env_ptr.borrow().get(name, lookup_span),
                None => Err(EnvError::UnboundVariable(name.to_string(), lookup_span)),
            }
        }
    }

    /// Whether `name` is bound anywhere in the chain.
    pub fn is_defined(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
            || self
                .outer
                .as_ref()
                .is_some_and(|outer| outer.borrow().is_defined(name))
    }

    /// Sets the value of an *existing* variable in the chain.
    /// Searches outward from the current frame and updates the first frame
    /// where the variable is found. Errors if the variable is not defined.
    pub fn set(&mut self, name: &str, value: Value, set_span: Span) -> Result<(), EnvError> {
        if let Some(value_mut) = self.bindings.get_mut(name) {
            *value_mut = value;
            Ok(())
        } else {
            match &self.outer {
                Some(outer_env_ptr) => outer_env_ptr.borrow_mut().set(name, value, set_span),
                None => Err(EnvError::UnboundVariable(name.to_string(), set_span)),
            }
        }
    }

    /// Gets all identifiers visible from this frame.
    pub fn get_identifiers(&self) -> HashSet<String> {
        let mut identifiers: HashSet<String> = self.bindings.keys().cloned().collect();
        if let Some(outer_env_ptr) = &self.outer {
            identifiers.extend(outer_env_ptr.borrow().get_identifiers());
        }
        identifiers
    }
}

/// Creates a fresh session frame over the standard builtins.
pub fn make_initial_frame() -> EnvRef {
    Environment::new_global_populated()
}
