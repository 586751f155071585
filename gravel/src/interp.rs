//! The Gravel Interpreter
//!
//! The [`Interp`] struct is the primary API for embedding Gravel into a Rust
//! application.  Given an `Interp`, the application may:
//!
//! * Run script files or source text
//! * Evaluate incremental input chunks (the REPL does this)
//! * Extend the language with new builtin functions
//!
//! # Interp is not Sync!
//!
//! An `Interp` is intended for use in a single thread.  It owns the scope tree and
//! the heap for everything it has run; two interpreters never share storage, so it
//! is safe to have `Interp`s in different threads.
//!
//! # Running a script
//!
//! ```no_run
//! use gravel::Interp;
//! use std::path::Path;
//!
//! let mut interp = Interp::new();
//! if let Err(exception) = interp.eval_file(Path::new("hello.gv")) {
//!     eprintln!("{}", exception);
//! }
//! ```
//!
//! A program is interpreted in three stages: the global scope's own statements run
//! first, then every namespace's statements run exactly once (depth-first), and
//! finally the required `Main` function is invoked.  Imports execute eagerly at
//! their `import` statement and are skipped by the namespace sweep.
//!
//! # Defining new builtins
//!
//! ```
//! use gravel::{check_args, gravel_ok, runtime_err, Interp};
//! use gravel::types::GravelResult;
//! use gravel::value::{Datum, Heap, Variant};
//!
//! fn cmd_square(_heap: &mut Heap, args: &[Variant]) -> GravelResult {
//!     check_args("Square", args, 1, 1, "n")?;
//!     match args[0].datum() {
//!         Datum::Int(n) => gravel_ok!(Variant::int(n * n)),
//!         other => runtime_err!("Square expects an int, got {}", other.type_name()),
//!     }
//! }
//!
//! let mut interp = Interp::new();
//! interp.add_builtin("Square", cmd_square);
//! ```

use crate::builtins;
use crate::lexer::{lex_file, lex_source};
use crate::parser::parse_tokens;
use crate::scope::{
    Instruction, InstructionKind, ScopeId, ScopeKind, ScopeTree, IMPORT_MARK, RET_VAL,
};
use crate::token::{Token, TokenKind};
use crate::types::{BuiltinFunc, Exception, Flow, GravelHasher};
use crate::value::{Datum, Heap, Variant};
use crate::{reject_err, runtime_err, syntax_err};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One entry of the if/elif/else/endif state machine: how the executor treats
/// upcoming instructions, and the nesting depth the frame was pushed at (so it can
/// recognize its own `endif` among nested ones).
#[derive(Clone, Copy, Debug)]
struct BehaviorFrame {
    mode: BehaviorMode,
    depth: u32,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum BehaviorMode {
    /// Inside the branch that tested true; execute until a sibling `elif`/`else`
    /// (switch to `SkipToEnd`) or the matching `endif` (pop).
    RunToElif,

    /// The condition tested false; scan without executing until a sibling
    /// `elif`/`else` or the matching `endif`.
    SkipToElif,

    /// A branch already ran; discard everything up to the matching `endif`.
    SkipToEnd,
}

/// The Gravel interpreter.
///
/// Owns the builtin registry, the scope tree (for the program and everything it
/// imports), and the heap backing string and array values.
pub struct Interp {
    builtins: IndexMap<String, BuiltinFunc, GravelHasher>,
    tree: ScopeTree,
    heap: Heap,
    root: ScopeId,

    /// Directory stack for resolving relative import paths; the top is the
    /// directory of the file currently executing.
    base_dirs: Vec<PathBuf>,

    /// Defines the limit on nested user-function calls and imports.
    recursion_limit: usize,

    /// Current number of nested call levels.
    num_levels: usize,
}

impl Default for Interp {
    fn default() -> Self {
        Self::new()
    }
}

impl Interp {
    //--------------------------------------------------------------------------------------------
    // Constructors

    /// Creates a new interpreter, pre-populated with the standard builtins and the
    /// two well-known global bindings: `retVal` (nil) and the const `null`.
    pub fn new() -> Self {
        let mut tree = ScopeTree::new();
        let root = tree.alloc(ScopeKind::Global, "global", None);

        let mut interp = Self {
            builtins: builtins::registry(),
            tree,
            heap: Heap::new(),
            root,
            base_dirs: Vec::new(),
            recursion_limit: 1000,
            num_levels: 0,
        };

        let globals = interp.tree.scope_mut(root);
        globals.vars.insert(RET_VAL.into(), Variant::nil());
        globals.vars.insert("null".into(), Variant::nil().constant());

        interp
    }

    //--------------------------------------------------------------------------------------------
    // Script evaluation

    /// Runs a script file: canonicalizes the path, lexes, parses into this
    /// interpreter's global scope, and interprets the program.  The program must
    /// define a `Main` function.
    pub fn eval_file(&mut self, path: &Path) -> Result<(), Exception> {
        let canon = path.canonicalize().map_err(|e| reject_error(path, e))?;
        let tokens = lex_file(&canon)?;

        let base = canon.parent().map(Path::to_path_buf).unwrap_or_default();
        self.base_dirs.push(base);
        let result = self.run_parsed(&tokens);
        self.base_dirs.pop();
        result
    }

    /// Runs script text as a whole program.  `origin` names the source for
    /// diagnostics.  Mostly useful for tests and embedded scripts; relative
    /// imports resolve against the process working directory.
    pub fn eval_source(&mut self, source: &str, origin: &str) -> Result<(), Exception> {
        let tokens = lex_source(source, origin)?;
        self.run_parsed(&tokens)
    }

    fn run_parsed(&mut self, tokens: &[Token]) -> Result<(), Exception> {
        parse_tokens(tokens, &mut self.tree, self.root)?;
        self.interpret_global()
    }

    /// Interprets the loaded program: global statements, then the namespace sweep,
    /// then `Main`.
    fn interpret_global(&mut self) -> Result<(), Exception> {
        debug!("starting interpretation");
        let root = self.root;

        let main = match self.tree.child(root, "Main") {
            Some(id) => id,
            None => return syntax_err!("function 'Main' not found in global scope"),
        };
        if self.tree.scope(main).kind != ScopeKind::Function {
            return syntax_err!("'Main' in global scope must be a function");
        }

        debug!("executing global scope");
        self.execute_scope(root, root)?;

        debug!("executing namespaces");
        self.sweep_namespaces(root, root)?;

        debug!("executing Main");
        self.call_function(main, &[], root, root)?;

        debug!("finished interpretation");
        Ok(())
    }

    /// Runs every namespace's direct statements exactly once, depth-first.
    /// Functions, classes, and imported files are skipped; imports already ran at
    /// their `import` statement.
    fn sweep_namespaces(&mut self, scope: ScopeId, global: ScopeId) -> Result<(), Exception> {
        let children: Vec<ScopeId> = self.tree.scope(scope).children.values().copied().collect();

        for child in children {
            let node = self.tree.scope(child);
            if node.kind != ScopeKind::Namespace || node.is_import() {
                continue;
            }
            debug!(name = %node.name, "executing namespace");
            self.execute_scope(child, global)?;
            self.sweep_namespaces(child, global)?;
        }
        Ok(())
    }

    //--------------------------------------------------------------------------------------------
    // Incremental evaluation (REPL support)

    /// Determines whether the source text is a complete input chunk: it lexes
    /// without an unterminated literal, every opened scope is ended, and the final
    /// token is a statement terminator.
    ///
    /// REPLs use this to decide whether to ask for another line of input.
    ///
    /// # Example
    ///
    /// ```
    /// # use gravel::Interp;
    /// let interp = Interp::new();
    /// assert!(interp.complete("set x, 5;"));
    /// assert!(!interp.complete("func F, a;"));
    /// assert!(!interp.complete("set x, 5"));
    /// ```
    pub fn complete(&self, source: &str) -> bool {
        let tokens = match lex_source(source, "<repl>") {
            Ok(tokens) => tokens,
            // An unterminated literal wants more input; any other lex error is
            // complete enough to report.
            Err(e) => return !e.message().contains("unterminated"),
        };

        if tokens.is_empty() {
            return true;
        }
        if tokens.last().map(|t| t.kind) != Some(TokenKind::Semicolon) {
            return false;
        }

        let mut depth: i64 = 0;
        let mut at_statement_head = true;
        for token in &tokens {
            if at_statement_head {
                match token.kind {
                    TokenKind::Func | TokenKind::Struct | TokenKind::Namespace => depth += 1,
                    TokenKind::End => depth -= 1,
                    _ => {}
                }
            }
            at_statement_head = token.kind == TokenKind::Semicolon;
        }
        depth <= 0
    }

    /// Lexes and parses one complete input chunk into the persistent global scope,
    /// then executes the newly added top-level statements and runs any newly
    /// declared namespaces once.  Declarations accumulate across chunks.
    pub fn eval_chunk(&mut self, source: &str) -> Result<(), Exception> {
        let tokens = lex_source(source, "<repl>")?;
        let root = self.root;

        let prev_instructions = self.tree.scope(root).instructions.len();
        let prev_children = self.tree.scope(root).children.len();
        parse_tokens(&tokens, &mut self.tree, root)?;

        self.execute_scope_from(root, root, prev_instructions)?;

        let new_children: Vec<ScopeId> = self
            .tree
            .scope(root)
            .children
            .values()
            .skip(prev_children)
            .copied()
            .collect();
        for child in new_children {
            let node = self.tree.scope(child);
            if node.kind != ScopeKind::Namespace || node.is_import() {
                continue;
            }
            self.execute_scope(child, root)?;
            self.sweep_namespaces(child, root)?;
        }
        Ok(())
    }

    /// The current value of the well-known `retVal` global, replaced with nil.
    /// The REPL prints the taken value after each chunk.
    pub fn take_ret_val(&mut self) -> Variant {
        self.tree
            .scope_mut(self.root)
            .vars
            .insert(RET_VAL.into(), Variant::nil())
            .unwrap_or_default()
    }

    /// Renders a value as display text.
    pub fn render(&self, value: &Variant) -> String {
        self.heap.render(value)
    }

    //--------------------------------------------------------------------------------------------
    // Builtin registration

    /// Adds (or replaces) a builtin function.  This is how an embedding
    /// application extends the language.
    pub fn add_builtin(&mut self, name: &str, func: BuiltinFunc) {
        self.builtins.insert(name.into(), func);
    }

    /// The names of the registered builtins, in registration order.
    pub fn builtin_names(&self) -> Vec<String> {
        self.builtins.keys().cloned().collect()
    }

    //--------------------------------------------------------------------------------------------
    // Interpreter configuration

    /// The limit on nested user-function calls and imports.  Defaults to 1000.
    pub fn recursion_limit(&self) -> usize {
        self.recursion_limit
    }

    /// Sets the nested-call limit.  Deep script recursion then reports a runtime
    /// error instead of exhausting the host stack.
    pub fn set_recursion_limit(&mut self, limit: usize) {
        self.recursion_limit = limit;
    }

    //--------------------------------------------------------------------------------------------
    // Scope execution

    fn execute_scope(&mut self, scope: ScopeId, global: ScopeId) -> Result<(), Exception> {
        self.execute_scope_from(scope, global, 0)
    }

    /// Runs a scope's instruction list from the given offset, driving the
    /// if/elif/else/endif behavior machine.  The frame stack and nesting counter
    /// are locals, so they reset every time a scope begins executing.
    fn execute_scope_from(
        &mut self,
        scope: ScopeId,
        global: ScopeId,
        start: usize,
    ) -> Result<(), Exception> {
        let instructions = self.tree.scope(scope).instructions.clone();
        let mut frames: Vec<BehaviorFrame> = Vec::new();
        let mut if_depth: u32 = 0;

        for inst in &instructions[start..] {
            let skipping = matches!(
                frames.last().map(|f| f.mode),
                Some(BehaviorMode::SkipToElif) | Some(BehaviorMode::SkipToEnd)
            );

            match inst.kind {
                InstructionKind::If => {
                    // Count nesting even while scanning, so frames can tell their
                    // own endif from a nested one.
                    if_depth += 1;
                    if skipping {
                        continue;
                    }
                    let mode = if self.eval_condition(inst, scope, global)? {
                        BehaviorMode::RunToElif
                    } else {
                        BehaviorMode::SkipToElif
                    };
                    frames.push(BehaviorFrame {
                        mode,
                        depth: if_depth,
                    });
                }

                InstructionKind::Elif => match frames.last().copied() {
                    None => return syntax_err!("'elif' without a matching 'if'"),
                    Some(frame) if frame.depth == if_depth => match frame.mode {
                        // A branch already ran; the rest of the chain is dead.
                        BehaviorMode::RunToElif => {
                            frames.last_mut().expect("frame present").mode =
                                BehaviorMode::SkipToEnd;
                        }
                        BehaviorMode::SkipToElif => {
                            if self.eval_condition(inst, scope, global)? {
                                frames.last_mut().expect("frame present").mode =
                                    BehaviorMode::RunToElif;
                            }
                        }
                        BehaviorMode::SkipToEnd => {}
                    },
                    // An elif of a deeper, skipped chain.
                    Some(_) => {}
                },

                InstructionKind::Else => match frames.last().copied() {
                    None => return syntax_err!("'else' without a matching 'if'"),
                    Some(frame) if frame.depth == if_depth => match frame.mode {
                        BehaviorMode::RunToElif => {
                            frames.last_mut().expect("frame present").mode =
                                BehaviorMode::SkipToEnd;
                        }
                        BehaviorMode::SkipToElif => {
                            frames.last_mut().expect("frame present").mode =
                                BehaviorMode::RunToElif;
                        }
                        BehaviorMode::SkipToEnd => {}
                    },
                    Some(_) => {}
                },

                InstructionKind::Endif => {
                    if if_depth == 0 {
                        return syntax_err!("'endif' without a matching 'if'");
                    }
                    if frames.last().map(|f| f.depth) == Some(if_depth) {
                        frames.pop();
                    }
                    if_depth -= 1;
                }

                _ => {
                    if skipping {
                        continue;
                    }
                    match self.execute_instruction(inst, scope, global)? {
                        Flow::Return => return Ok(()),
                        Flow::Normal => {}
                    }
                }
            }
        }

        if !frames.is_empty() {
            let name = &self.tree.scope(scope).name;
            return syntax_err!("missing 'endif' in scope {}", name);
        }
        Ok(())
    }

    fn execute_instruction(
        &mut self,
        inst: &Instruction,
        scope: ScopeId,
        global: ScopeId,
    ) -> Result<Flow, Exception> {
        match inst.kind {
            InstructionKind::Set => {
                let value = self.resolve_value(&inst.args[3], scope)?;
                self.assign(&inst.args[1], value, scope)?;
                Ok(Flow::Normal)
            }

            InstructionKind::Var => {
                let value = self.resolve_value(&inst.args[3], scope)?;
                self.declare(&inst.args[1], value, scope)?;
                Ok(Flow::Normal)
            }

            InstructionKind::Const => {
                let value = self.resolve_value(&inst.args[3], scope)?;
                self.declare(&inst.args[1], value.constant(), scope)?;
                Ok(Flow::Normal)
            }

            InstructionKind::Array => {
                let mut items = Vec::new();
                for token in args_after(inst, 2) {
                    items.push(Variant::from_literal(&mut self.heap, token)?);
                }
                let id = self.heap.alloc_array(items);
                self.declare(&inst.args[1], Variant::array(id), scope)?;
                Ok(Flow::Normal)
            }

            InstructionKind::Call => {
                self.invoke(&inst.args[1], &args_after(inst, 2), scope, global)?;
                Ok(Flow::Normal)
            }

            InstructionKind::Fetch => {
                self.invoke(&inst.args[3], &args_after(inst, 4), scope, global)?;
                let value = self.ret_val(global);
                self.assign(&inst.args[1], value, scope)?;
                Ok(Flow::Normal)
            }

            InstructionKind::Return => {
                let value = if inst.args.len() > 1 {
                    self.resolve_value(&inst.args[1], scope)?
                } else {
                    Variant::nil()
                };
                self.set_ret_val(global, value);
                Ok(Flow::Return)
            }

            InstructionKind::Import => {
                self.import(inst, scope)?;
                Ok(Flow::Normal)
            }

            // Control tokens are consumed by the scope driver loop.
            InstructionKind::If
            | InstructionKind::Elif
            | InstructionKind::Else
            | InstructionKind::Endif => Ok(Flow::Normal),
        }
    }

    //--------------------------------------------------------------------------------------------
    // Name resolution

    /// Resolves a name to a value.  Unresolved names are nil, not errors.
    fn resolve_name(&self, name: &str, scope: ScopeId) -> Variant {
        if name.contains('.') {
            self.resolve_dotted(name, scope)
        } else {
            self.resolve_simple(name, scope)
        }
    }

    /// Simple names: the scope's own vars, its args if it is a function, then
    /// ancestor vars only.  Ancestor args are never visible to nested scopes.
    fn resolve_simple(&self, name: &str, scope: ScopeId) -> Variant {
        let node = self.tree.scope(scope);
        if let Some(v) = node.vars.get(name) {
            return *v;
        }
        if node.kind == ScopeKind::Function {
            if let Some(v) = node.arg(name) {
                return v;
            }
        }

        let mut cursor = node.parent;
        while let Some(id) = cursor {
            let ancestor = self.tree.scope(id);
            if let Some(v) = ancestor.vars.get(name) {
                return *v;
            }
            cursor = ancestor.parent;
        }
        Variant::nil()
    }

    /// Dotted names: find the scope owning the first path segment by walking
    /// outward, then follow the remaining segments.  Each segment is tried as a
    /// nested scope first, then as a var, then as an arg.  Resolution returns on
    /// the first var/arg hit; any remaining path segments are silently ignored.
    fn resolve_dotted(&self, name: &str, scope: ScopeId) -> Variant {
        let segments: Vec<&str> = name.split('.').collect();

        let Some(owner) = self.find_segment_owner(segments[0], scope) else {
            debug!(name, "could not find scope for qualified name");
            return Variant::nil();
        };

        let mut at = owner;
        for segment in &segments {
            if let Some(child) = self.tree.child(at, segment) {
                at = child;
                continue;
            }
            let node = self.tree.scope(at);
            if let Some(v) = node.vars.get(*segment) {
                return *v;
            }
            if node.kind == ScopeKind::Function {
                if let Some(v) = node.arg(segment) {
                    return v;
                }
            }
            return Variant::nil();
        }
        Variant::nil()
    }

    /// The nearest enclosing scope (starting at `scope` itself) that has a child
    /// scope of the given name.
    fn find_segment_owner(&self, segment: &str, scope: ScopeId) -> Option<ScopeId> {
        let mut cursor = Some(scope);
        while let Some(id) = cursor {
            if self.tree.child(id, segment).is_some() {
                return Some(id);
            }
            cursor = self.tree.scope(id).parent;
        }
        None
    }

    /// A value token as a concrete value: Names resolve in the given scope,
    /// anything else must be a literal.  The copy is always mutable; constness
    /// belongs to bindings, not values.
    fn resolve_value(&mut self, token: &Token, scope: ScopeId) -> Result<Variant, Exception> {
        if token.kind == TokenKind::Name {
            Ok(self.resolve_name(&token.content, scope).mutable())
        } else {
            Variant::from_literal(&mut self.heap, token)
        }
    }

    //--------------------------------------------------------------------------------------------
    // Assignment and declaration

    /// `set` semantics: overwrite the nearest existing binding, walking the scope
    /// chain like name resolution does; create the variable in the current scope
    /// if it exists nowhere.  Assigning to a const binding is rejected.
    fn assign(
        &mut self,
        name_tok: &Token,
        value: Variant,
        scope: ScopeId,
    ) -> Result<(), Exception> {
        let name = &name_tok.content;
        if name.contains('.') {
            return self.assign_dotted(name, value, scope);
        }

        // The scope's own vars, then its args if it is a function.
        let node = self.tree.scope(scope);
        if let Some(existing) = node.vars.get(name) {
            if existing.is_const() {
                return reject_err!("cannot assign to const: {}", name);
            }
            self.tree.scope_mut(scope).vars.insert(name.clone(), value);
            return Ok(());
        }
        if node.kind == ScopeKind::Function && node.arg(name).is_some() {
            self.tree.scope_mut(scope).set_arg(name, value);
            return Ok(());
        }

        // Ancestor vars.
        let mut cursor = node.parent;
        while let Some(id) = cursor {
            let ancestor = self.tree.scope(id);
            if let Some(existing) = ancestor.vars.get(name) {
                if existing.is_const() {
                    return reject_err!("cannot assign to const: {}", name);
                }
                self.tree.scope_mut(id).vars.insert(name.clone(), value);
                return Ok(());
            }
            cursor = ancestor.parent;
        }

        // Never declared anywhere: create it here.
        self.tree.scope_mut(scope).vars.insert(name.clone(), value);
        Ok(())
    }

    /// `set` through a qualified name, mirroring dotted resolution.  A final
    /// segment that names nothing in the reached scope is created there.
    fn assign_dotted(
        &mut self,
        name: &str,
        value: Variant,
        scope: ScopeId,
    ) -> Result<(), Exception> {
        let segments: Vec<&str> = name.split('.').collect();

        let Some(owner) = self.find_segment_owner(segments[0], scope) else {
            return syntax_err!("could not find scope: {}", segments[0]);
        };

        let mut at = owner;
        for segment in &segments {
            if let Some(child) = self.tree.child(at, segment) {
                at = child;
                continue;
            }
            let node = self.tree.scope(at);
            if let Some(existing) = node.vars.get(*segment) {
                if existing.is_const() {
                    return reject_err!("cannot assign to const: {}", name);
                }
                self.tree
                    .scope_mut(at)
                    .vars
                    .insert((*segment).to_string(), value);
                return Ok(());
            }
            if node.kind == ScopeKind::Function && node.arg(segment).is_some() {
                self.tree.scope_mut(at).set_arg(segment, value);
                return Ok(());
            }
            self.tree
                .scope_mut(at)
                .vars
                .insert((*segment).to_string(), value);
            return Ok(());
        }
        // Every segment named a scope; there is nothing to assign to.
        syntax_err!("cannot assign to a scope: {}", name)
    }

    /// `var`/`const`/`array` semantics: the name must be free at this scope level
    /// across vars, args, and child scopes.
    fn declare(
        &mut self,
        name_tok: &Token,
        value: Variant,
        scope: ScopeId,
    ) -> Result<(), Exception> {
        let name = &name_tok.content;
        if name.contains('.') {
            return reject_err!("cannot declare a qualified name: {}", name);
        }
        if self.tree.scope(scope).has_member(name) {
            return reject_err!("member {} already exists in scope", name);
        }
        self.tree.scope_mut(scope).vars.insert(name.clone(), value);
        Ok(())
    }

    //--------------------------------------------------------------------------------------------
    // Calls

    fn ret_val(&self, global: ScopeId) -> Variant {
        self.tree
            .scope(global)
            .vars
            .get(RET_VAL)
            .copied()
            .unwrap_or_default()
    }

    /// Every call, user function or builtin, writes its result into the
    /// well-known `retVal` slot of the current program's global scope.
    fn set_ret_val(&mut self, global: ScopeId, value: Variant) {
        self.tree
            .scope_mut(global)
            .vars
            .insert(RET_VAL.into(), value.mutable());
    }

    /// Invokes a callable named at a call site: (1) a function nested directly in
    /// the caller's scope, (2) a function nested in the global scope, (3) a
    /// builtin.  Qualified names traverse the scope tree instead and must land on
    /// a function.
    fn invoke(
        &mut self,
        callee: &Token,
        arg_toks: &[&Token],
        caller: ScopeId,
        global: ScopeId,
    ) -> Result<(), Exception> {
        let name = &callee.content;
        debug!(%name, "call");

        if name.contains('.') {
            let func = self.resolve_dotted_function(name, caller)?;
            return self.call_function(func, arg_toks, caller, global);
        }

        if let Some(child) = self.tree.child(caller, name) {
            if self.tree.scope(child).kind == ScopeKind::Function {
                return self.call_function(child, arg_toks, caller, global);
            }
        }
        if let Some(child) = self.tree.child(global, name) {
            if self.tree.scope(child).kind == ScopeKind::Function {
                return self.call_function(child, arg_toks, caller, global);
            }
        }
        if self.builtins.contains_key(name) {
            return self.call_builtin(name, arg_toks, caller, global);
        }

        syntax_err!("could not find function: {}", name)
    }

    /// Follows a qualified name through the scope tree; the path must terminate on
    /// a function scope whose name matches the final segment.
    fn resolve_dotted_function(&self, name: &str, caller: ScopeId) -> Result<ScopeId, Exception> {
        let segments: Vec<&str> = name.split('.').collect();

        let Some(owner) = self.find_segment_owner(segments[0], caller) else {
            return syntax_err!("could not find scope: {}", segments[0]);
        };

        let mut at = owner;
        for segment in &segments {
            match self.tree.child(at, segment) {
                Some(child) => at = child,
                None => return syntax_err!("could not find function: {}", name),
            }
        }

        let node = self.tree.scope(at);
        if node.kind == ScopeKind::Function && node.name == *segments.last().expect("nonempty path")
        {
            Ok(at)
        } else {
            syntax_err!("cannot use 'call' for a scope that isn't a function: {}", name)
        }
    }

    /// Binds call-site arguments to the callee's declared parameters and executes
    /// the callee's scope.  Arity must match exactly.  Name arguments are resolved
    /// in the *caller's* scope before binding.
    fn call_function(
        &mut self,
        func: ScopeId,
        arg_toks: &[&Token],
        caller: ScopeId,
        global: ScopeId,
    ) -> Result<(), Exception> {
        let declared = self.tree.scope(func).args.len();
        if arg_toks.len() > declared {
            let name = &self.tree.scope(func).name;
            return syntax_err!("too many arguments for call to function {}", name);
        }
        if arg_toks.len() < declared {
            let name = &self.tree.scope(func).name;
            return syntax_err!("not enough arguments for call to function {}", name);
        }

        let mut bound = Vec::with_capacity(arg_toks.len());
        for token in arg_toks {
            bound.push(self.resolve_value(token, caller)?);
        }
        for (i, value) in bound.into_iter().enumerate() {
            self.tree.scope_mut(func).args[i].1 = value;
        }

        self.enter_level()?;
        let result = self.execute_scope(func, global);
        self.num_levels -= 1;
        result
    }

    /// Resolves every call-site token to a concrete value and invokes the native
    /// function; its result lands in `retVal`.
    fn call_builtin(
        &mut self,
        name: &str,
        arg_toks: &[&Token],
        caller: ScopeId,
        global: ScopeId,
    ) -> Result<(), Exception> {
        let mut values = Vec::with_capacity(arg_toks.len());
        for token in arg_toks {
            values.push(self.resolve_value(token, caller)?);
        }

        let func = self.builtins[name];
        let result = func(&mut self.heap, &values)?;
        self.set_ret_val(global, result);
        Ok(())
    }

    fn enter_level(&mut self) -> Result<(), Exception> {
        self.num_levels += 1;
        if self.num_levels > self.recursion_limit {
            self.num_levels -= 1;
            return runtime_err!("too many nested calls (infinite recursion?)");
        }
        Ok(())
    }

    //--------------------------------------------------------------------------------------------
    // Conditions

    /// Evaluates an `if`/`elif` condition: the condition is a callable plus
    /// arguments, executed exactly like a call; its `retVal` coerces to boolean.
    /// Int/Float nonzero is true, nil is false, anything else is a type error.
    fn eval_condition(
        &mut self,
        inst: &Instruction,
        scope: ScopeId,
        global: ScopeId,
    ) -> Result<bool, Exception> {
        self.invoke(&inst.args[1], &args_after(inst, 2), scope, global)?;

        match self.ret_val(global).datum() {
            Datum::Int(i) => Ok(i != 0),
            Datum::Float(f) => Ok(f != 0.0),
            Datum::Nil => Ok(false),
            other => runtime_err!(
                "condition must produce a numeric result, got {}",
                other.type_name()
            ),
        }
    }

    //--------------------------------------------------------------------------------------------
    // Import

    /// `import "<path>" as <alias>`: lexes and parses the target file into a new
    /// global-kind scope attached under the alias, then executes it eagerly: its
    /// direct statements, then its namespace subtree.  The scope name carries the
    /// import mark so the top-level sweep skips it.  Re-importing an alias
    /// replaces the previous subtree.
    fn import(&mut self, inst: &Instruction, scope: ScopeId) -> Result<(), Exception> {
        let path_tok = &inst.args[1];
        if path_tok.kind != TokenKind::Str {
            return syntax_err!("'import' path must be a string, got: {}", path_tok.content);
        }
        let as_tok = &inst.args[2];
        if as_tok.kind != TokenKind::Name || as_tok.content != "as" {
            return syntax_err!("expected 'as' after the import path");
        }
        let alias_tok = &inst.args[3];
        if alias_tok.kind != TokenKind::Name {
            return syntax_err!("'import' alias must be a name, got: {}", alias_tok.content);
        }

        let canon = self.resolve_import_path(&path_tok.content)?;
        debug!(path = %canon.display(), alias = %alias_tok.content, "importing");
        let tokens = lex_file(&canon)?;

        let alias = alias_tok.content.clone();
        let module = self.tree.alloc(
            ScopeKind::Global,
            format!("{}{}", IMPORT_MARK, alias),
            Some(scope),
        );
        self.tree.scope_mut(scope).children.insert(alias, module);
        parse_tokens(&tokens, &mut self.tree, module)?;

        // The imported file executes as its own program: its global statements and
        // namespace sweep run against its own global scope, once, right here.
        let base = canon.parent().map(Path::to_path_buf).unwrap_or_default();
        self.base_dirs.push(base);
        self.enter_level()?;
        let result = self
            .execute_scope(module, module)
            .and_then(|()| self.sweep_namespaces(module, module));
        self.num_levels -= 1;
        self.base_dirs.pop();
        result
    }

    fn resolve_import_path(&self, path: &str) -> Result<PathBuf, Exception> {
        let raw = Path::new(path);
        let candidate = if raw.is_relative() {
            match self.base_dirs.last() {
                Some(base) => base.join(raw),
                None => raw.to_path_buf(),
            }
        } else {
            raw.to_path_buf()
        };
        candidate
            .canonicalize()
            .map_err(|e| reject_error(&candidate, e))
    }

    //--------------------------------------------------------------------------------------------
    // Introspection (used by tests and embedding applications)

    /// The value of a name as seen from the global scope, nil if unresolved.
    pub fn global_value(&self, name: &str) -> Variant {
        self.resolve_name(name, self.root)
    }

    /// The value of a name as seen from inside the named function or namespace
    /// under the global scope, nil if unresolved.  `path` is a dotted scope path.
    pub fn value_in(&self, path: &str, name: &str) -> Variant {
        let mut at = self.root;
        for segment in path.split('.') {
            match self.tree.child(at, segment) {
                Some(child) => at = child,
                None => return Variant::nil(),
            }
        }
        self.resolve_name(name, at)
    }
}

/// The statement's argument tokens from the given index on, with the comma
/// separators dropped.
fn args_after(inst: &Instruction, start: usize) -> Vec<&Token> {
    inst.args[start.min(inst.args.len())..]
        .iter()
        .filter(|t| t.kind != TokenKind::Comma)
        .collect()
}

fn reject_error(path: &Path, e: std::io::Error) -> Exception {
    Exception::new(
        crate::types::ErrorKind::Rejected,
        format!("could not resolve path {}: {}", path.display(), e),
    )
}
