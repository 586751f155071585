//! The Scope Tree
//!
//! A Gravel program parses into a tree of [`Scope`] nodes rooted at one global scope
//! per loaded file.  Each scope owns its declared argument list, its variables, its
//! child scopes, and its instruction list.  The tree lives in a [`ScopeTree`] arena and
//! nodes refer to each other by [`ScopeId`] handle, so the parent back-reference is a
//! plain integer rather than an aliasing pointer.
//!
//! The tree is built once per parse pass and lives for the life of the interpreter;
//! `vars` is mutated throughout execution, and argument values are overwritten on
//! every call.

use crate::token::Token;
use crate::types::GravelHasher;
use crate::value::Variant;
use indexmap::IndexMap;

/// The name prefix that marks an imported file's scope.  The top-level namespace
/// sweep skips scopes so marked; they were already executed, eagerly, at their
/// `import` statement.
pub const IMPORT_MARK: &str = "$import$";

/// The well-known global variable that carries the result of the most recent call
/// or `return`.
pub const RET_VAL: &str = "retVal";

/// A stable handle to a [`Scope`] in a [`ScopeTree`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ScopeId(usize);

/// What kind of declaration a scope came from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScopeKind {
    Global,
    Namespace,
    Class,
    Function,
}

/// The runtime classification of a parsed statement.  Only statements with deferred
/// runtime semantics become instructions; scope declarations (`func`, `struct`,
/// `namespace`, `end`) are consumed by the parser itself.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InstructionKind {
    Set,
    Const,
    Var,
    Array,
    Call,
    Fetch,
    Return,
    Import,
    If,
    Elif,
    Else,
    Endif,
}

/// One executable statement: its kind plus the raw tokens of the whole statement,
/// keyword and commas included.  Immutable once built; owned by exactly one scope;
/// evaluated every time that scope executes, without re-parsing.
#[derive(Clone, Debug, PartialEq)]
pub struct Instruction {
    pub kind: InstructionKind,
    pub args: Vec<Token>,
}

/// A named node in the declaration tree.
#[derive(Debug)]
pub struct Scope {
    pub kind: ScopeKind,
    pub name: String,
    pub parent: Option<ScopeId>,

    /// Declared parameters in declaration order.  Order is load-bearing: call
    /// arguments bind positionally.  Values are overwritten on every call.
    pub args: Vec<(String, Variant)>,

    /// Variables declared or assigned in this scope.
    pub vars: IndexMap<String, Variant, GravelHasher>,

    /// Child scopes, keyed by the name they were declared under (for imports, the
    /// alias).  Each child is owned by its parent.
    pub children: IndexMap<String, ScopeId, GravelHasher>,

    /// The statements belonging directly to this scope, in source order.
    pub instructions: Vec<Instruction>,
}

impl Scope {
    fn new(kind: ScopeKind, name: impl Into<String>, parent: Option<ScopeId>) -> Self {
        Self {
            kind,
            name: name.into(),
            parent,
            args: Vec::new(),
            vars: IndexMap::default(),
            children: IndexMap::default(),
            instructions: Vec::new(),
        }
    }

    /// True if the name is taken at this scope level, across vars, args, and child
    /// scopes.  Declarative forms require the name to be free.
    pub fn has_member(&self, name: &str) -> bool {
        self.vars.contains_key(name)
            || self.children.contains_key(name)
            || self.args.iter().any(|(arg, _)| arg == name)
    }

    /// The value of the named declared argument, if there is one.
    pub fn arg(&self, name: &str) -> Option<Variant> {
        self.args
            .iter()
            .find(|(arg, _)| arg == name)
            .map(|(_, value)| *value)
    }

    /// Overwrites the value of the named declared argument.  Returns false if no
    /// such argument exists.
    pub fn set_arg(&mut self, name: &str, value: Variant) -> bool {
        for (arg, slot) in &mut self.args {
            if arg == name {
                *slot = value;
                return true;
            }
        }
        false
    }

    /// True for an imported file's scope (skipped by the namespace sweep).
    pub fn is_import(&self) -> bool {
        self.name.starts_with(IMPORT_MARK)
    }
}

/// The arena owning every scope of an interpreter, across the initial program and
/// all imports.  Nodes are never removed; a re-imported alias simply abandons the
/// old subtree in place.
#[derive(Debug, Default)]
pub struct ScopeTree {
    nodes: Vec<Scope>,
}

impl ScopeTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a new scope, returning its handle.  The caller links it into its
    /// parent's `children` map.
    pub fn alloc(
        &mut self,
        kind: ScopeKind,
        name: impl Into<String>,
        parent: Option<ScopeId>,
    ) -> ScopeId {
        let id = ScopeId(self.nodes.len());
        self.nodes.push(Scope::new(kind, name, parent));
        id
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.nodes[id.0]
    }

    pub fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.nodes[id.0]
    }

    /// The named child of the given scope, if any.
    pub fn child(&self, id: ScopeId, name: &str) -> Option<ScopeId> {
        self.scope(id).children.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_links() {
        let mut tree = ScopeTree::new();
        let global = tree.alloc(ScopeKind::Global, "global", None);
        let func = tree.alloc(ScopeKind::Function, "Main", Some(global));
        tree.scope_mut(global).children.insert("Main".into(), func);

        assert_eq!(tree.child(global, "Main"), Some(func));
        assert_eq!(tree.child(global, "Other"), None);
        assert_eq!(tree.scope(func).parent, Some(global));
        assert_eq!(tree.scope(func).kind, ScopeKind::Function);
    }

    #[test]
    fn test_has_member_covers_vars_args_children() {
        let mut tree = ScopeTree::new();
        let global = tree.alloc(ScopeKind::Global, "global", None);
        let func = tree.alloc(ScopeKind::Function, "F", Some(global));

        let scope = tree.scope_mut(global);
        scope.children.insert("F".into(), func);
        scope.vars.insert("x".into(), Variant::int(1));
        scope.args.push(("a".into(), Variant::nil()));

        assert!(scope.has_member("F"));
        assert!(scope.has_member("x"));
        assert!(scope.has_member("a"));
        assert!(!scope.has_member("y"));
    }

    #[test]
    fn test_set_arg_positional_storage() {
        let mut tree = ScopeTree::new();
        let func = tree.alloc(ScopeKind::Function, "F", None);
        let scope = tree.scope_mut(func);
        scope.args.push(("a".into(), Variant::nil()));
        scope.args.push(("b".into(), Variant::nil()));

        assert!(scope.set_arg("b", Variant::int(2)));
        assert!(!scope.set_arg("c", Variant::int(3)));
        assert_eq!(scope.arg("b"), Some(Variant::int(2)));
        assert_eq!(scope.arg("a"), Some(Variant::nil()));

        // Declaration order is preserved.
        assert_eq!(scope.args[0].0, "a");
        assert_eq!(scope.args[1].0, "b");
    }

    #[test]
    fn test_import_mark() {
        let mut tree = ScopeTree::new();
        let module = tree.alloc(ScopeKind::Global, format!("{}Lib", IMPORT_MARK), None);
        assert!(tree.scope(module).is_import());
    }
}
