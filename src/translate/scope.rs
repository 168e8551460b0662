//! Resolution scopes
//!
//! A scope binds lambda parameter names to the parse context they range over,
//! together with the fragment in which the resolved SQL will be evaluated.
//! Scopes are plain values passed down the call stack, so resolving a key
//! selector against the join's outer fragment never touches the context tree.

use crate::sql::QueryId;

use super::context::ContextId;

/// A parameter bound to a context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub name: String,
    pub context: ContextId,
    /// Fragment the resolved expressions are evaluated in
    pub target: QueryId,
}

/// Lexical scope of lambda parameters
#[derive(Debug, Default)]
pub struct Scope<'a> {
    bindings: Vec<Binding>,
    parent: Option<&'a Scope<'a>>,
}

impl<'a> Scope<'a> {
    /// The empty top-level scope
    pub fn root() -> Scope<'static> {
        Scope {
            bindings: Vec::new(),
            parent: None,
        }
    }

    /// A nested scope that falls back to `self` for unknown names
    pub fn child(&'a self) -> Scope<'a> {
        Scope {
            bindings: Vec::new(),
            parent: Some(self),
        }
    }

    pub fn bind(mut self, name: &str, context: ContextId, target: QueryId) -> Self {
        self.bindings.push(Binding {
            name: name.to_string(),
            context,
            target,
        });
        self
    }

    /// Find the innermost binding of `name`
    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        self.bindings
            .iter()
            .rev()
            .find(|b| b.name == name)
            .or_else(|| self.parent.and_then(|p| p.lookup(name)))
    }
}
