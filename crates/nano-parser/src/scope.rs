//! Lexical scopes, stored in an arena and linked by parent index.

use std::collections::HashMap;

use nano_syntax::ast::{Binding, LocalId, Param};
use nano_syntax::types::ValueType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeId(usize);

/// A name resolved through the scope chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub ty: ValueType,
    pub binding: Binding,
}

#[derive(Debug)]
struct Scope {
    parent: Option<ScopeId>,
    locals: HashMap<String, (ValueType, LocalId)>,
    // only populated on a function's root scope
    params: HashMap<String, (ValueType, usize)>,
    return_type: ValueType,
}

/// All scopes of one function or event body.
#[derive(Debug, Default)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
}

impl ScopeTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the root scope of a body. Returns `Err(name)` on a repeated parameter.
    pub fn root(&mut self, params: &[Param], return_type: ValueType) -> Result<ScopeId, String> {
        let mut table = HashMap::new();
        for (i, p) in params.iter().enumerate() {
            if table.insert(p.name.clone(), (p.ty.clone(), i)).is_some() {
                return Err(p.name.clone());
            }
        }
        Ok(self.push(Scope {
            parent: None,
            locals: HashMap::new(),
            params: table,
            return_type,
        }))
    }

    /// Creates a nested scope that inherits the parent's return type.
    pub fn child(&mut self, parent: ScopeId) -> ScopeId {
        let return_type = self.scopes[parent.0].return_type.clone();
        self.push(Scope {
            parent: Some(parent),
            locals: HashMap::new(),
            params: HashMap::new(),
            return_type,
        })
    }

    fn push(&mut self, scope: Scope) -> ScopeId {
        self.scopes.push(scope);
        ScopeId(self.scopes.len() - 1)
    }

    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scopes[scope.0].parent
    }

    pub fn return_type(&self, scope: ScopeId) -> &ValueType {
        &self.scopes[scope.0].return_type
    }

    /// Declares a local in `scope`. Returns false if the name is already
    /// declared there (as a local or parameter).
    pub fn declare(&mut self, scope: ScopeId, name: &str, ty: ValueType, local: LocalId) -> bool {
        let s = &mut self.scopes[scope.0];
        if s.locals.contains_key(name) || s.params.contains_key(name) {
            return false;
        }
        s.locals.insert(name.to_string(), (ty, local));
        true
    }

    /// Looks a name up through locals, then parameters, then the parent chain.
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<Resolved> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let s = &self.scopes[id.0];
            if let Some((ty, local)) = s.locals.get(name) {
                return Some(Resolved {
                    ty: ty.clone(),
                    binding: Binding::Local(*local),
                });
            }
            if let Some((ty, index)) = s.params.get(name) {
                return Some(Resolved {
                    ty: ty.clone(),
                    binding: Binding::Param(*index),
                });
            }
            current = s.parent;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(name: &str, ty: ValueType) -> Param {
        Param {
            name: name.to_string(),
            ty,
        }
    }

    #[test]
    fn lookup_walks_to_the_root() {
        let mut tree = ScopeTree::new();
        let root = tree
            .root(&[param("n", ValueType::Number)], ValueType::Bool)
            .unwrap();
        assert!(tree.declare(root, "acc", ValueType::String, 0));
        let inner = tree.child(root);
        let innermost = tree.child(inner);

        assert_eq!(tree.lookup(innermost, "n").unwrap().binding, Binding::Param(0));
        assert_eq!(tree.lookup(innermost, "acc").unwrap().ty, ValueType::String);
        assert_eq!(tree.lookup(innermost, "missing"), None);
        assert_eq!(tree.return_type(innermost), &ValueType::Bool);
        assert_eq!(tree.parent(innermost), Some(inner));
    }

    #[test]
    fn shadowing_is_per_scope() {
        let mut tree = ScopeTree::new();
        let root = tree.root(&[param("x", ValueType::Number)], ValueType::Void).unwrap();
        assert!(!tree.declare(root, "x", ValueType::Number, 0));
        let inner = tree.child(root);
        assert!(tree.declare(inner, "x", ValueType::String, 1));
        assert!(!tree.declare(inner, "x", ValueType::String, 2));
        assert_eq!(tree.lookup(inner, "x").unwrap().binding, Binding::Local(1));
        assert_eq!(tree.lookup(root, "x").unwrap().binding, Binding::Param(0));
    }

    #[test]
    fn repeated_parameter_is_rejected() {
        let mut tree = ScopeTree::new();
        let dup = [param("a", ValueType::Number), param("a", ValueType::Bool)];
        assert_eq!(tree.root(&dup, ValueType::Void), Err("a".to_string()));
    }
}
