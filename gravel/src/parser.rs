//! The Gravel Parser
//!
//! Consumes the lexer's token sequence and builds a [`ScopeTree`] rooted at a
//! caller-supplied global scope.  Tokens are grouped into statements by the `;`
//! terminator; a stack of open scopes tracks `func`/`struct`/`namespace` ... `end`
//! nesting.  Statements with deferred runtime semantics are stored as raw token
//! lists on their owning scope; in particular, `if`/`elif`/`else`/`endif` nesting
//! is *not* validated or balanced here; the executor is the structural validator.
//! This keeps parsing a single left-to-right pass over the tokens.

use crate::scope::{Instruction, InstructionKind, ScopeId, ScopeKind, ScopeTree};
use crate::syntax_err;
use crate::token::{Token, TokenKind};
use crate::types::Exception;
use crate::value::Variant;
use tracing::debug;

/// Parses a token sequence into the scope tree, attaching declarations and
/// instructions under `global`.
pub fn parse_tokens(
    tokens: &[Token],
    tree: &mut ScopeTree,
    global: ScopeId,
) -> Result<(), Exception> {
    debug!("starting token parsing");

    let mut stack: Vec<ScopeId> = vec![global];
    let mut statement: Vec<Token> = Vec::new();

    for token in tokens {
        if token.kind != TokenKind::Semicolon {
            statement.push(token.clone());
        } else {
            handle_statement(&statement, tree, &mut stack)?;
            statement.clear();
        }
    }

    if stack.len() > 1 {
        let open = tree.scope(*stack.last().expect("stack holds global"));
        return syntax_err!("scope was not ended: {}", open.name);
    }

    debug!("finished token parsing");
    Ok(())
}

/// Dispatches one `;`-delimited statement.  `stack` always holds at least the
/// global scope; statements attach to `stack.last()`.
fn handle_statement(
    tokens: &[Token],
    tree: &mut ScopeTree,
    stack: &mut Vec<ScopeId>,
) -> Result<(), Exception> {
    if tokens.is_empty() {
        return Ok(());
    }

    let current = *stack.last().expect("stack holds global");

    match tokens[0].kind {
        TokenKind::Set => store(tree, current, InstructionKind::Set, tokens, 4, "'set' requires a name and a value"),
        TokenKind::Const => store(tree, current, InstructionKind::Const, tokens, 4, "'const' requires a name and a value"),
        TokenKind::Var => store(tree, current, InstructionKind::Var, tokens, 4, "'var' requires a name and a value"),
        TokenKind::Array => store(tree, current, InstructionKind::Array, tokens, 2, "'array' requires a name"),
        TokenKind::Call => store(tree, current, InstructionKind::Call, tokens, 2, "'call' requires a function name"),
        TokenKind::Fetch => store(tree, current, InstructionKind::Fetch, tokens, 4, "'fetch' requires a target and a function name"),
        TokenKind::If => store(tree, current, InstructionKind::If, tokens, 2, "'if' requires a condition"),
        TokenKind::Elif => store(tree, current, InstructionKind::Elif, tokens, 2, "'elif' requires a condition"),
        TokenKind::Else => store(tree, current, InstructionKind::Else, tokens, 1, "'else' takes no arguments"),
        TokenKind::Endif => store(tree, current, InstructionKind::Endif, tokens, 1, "'endif' takes no arguments"),

        TokenKind::Return => {
            if tree.scope(current).kind != ScopeKind::Function {
                return syntax_err!("cannot return outside of a function");
            }
            store(tree, current, InstructionKind::Return, tokens, 1, "")
        }

        TokenKind::Import => {
            if tree.scope(current).kind != ScopeKind::Global {
                return syntax_err!("cannot import outside of the global scope");
            }
            store(
                tree,
                current,
                InstructionKind::Import,
                tokens,
                4,
                "'import' requires a path and an alias",
            )
        }

        TokenKind::Struct => open_scope(tree, stack, ScopeKind::Class, tokens),
        TokenKind::Namespace => open_scope(tree, stack, ScopeKind::Namespace, tokens),
        TokenKind::Func => open_scope(tree, stack, ScopeKind::Function, tokens),

        TokenKind::End => {
            if tree.scope(current).kind == ScopeKind::Global {
                return syntax_err!("cannot use 'end' while in the global scope");
            }
            // Every function sets a return value, explicit `return` or not.
            if tree.scope(current).kind == ScopeKind::Function {
                let end = &tokens[0];
                tree.scope_mut(current).instructions.push(Instruction {
                    kind: InstructionKind::Return,
                    args: vec![Token::new("return", TokenKind::Return, end.line, end.col)],
                });
            }
            stack.pop();
            Ok(())
        }

        // Anything else at a statement head is discarded, as the original
        // implementation does.
        other => {
            debug!(kind = %other, content = %tokens[0].content, "ignoring statement");
            Ok(())
        }
    }
}

/// Stores a statement as an instruction on the current scope after checking its
/// minimum token count (keyword and commas included).
fn store(
    tree: &mut ScopeTree,
    current: ScopeId,
    kind: InstructionKind,
    tokens: &[Token],
    min_tokens: usize,
    short_msg: &str,
) -> Result<(), Exception> {
    if tokens.len() < min_tokens {
        return syntax_err!("{} (line {})", short_msg, tokens[0].line);
    }
    tree.scope_mut(current).instructions.push(Instruction {
        kind,
        args: tokens.to_vec(),
    });
    Ok(())
}

/// Opens a `func`/`struct`/`namespace` scope: checks the declared name is free at
/// this level, allocates the child, and pushes it on the scope stack.  For
/// functions, trailing Name tokens become the ordered parameter list, each
/// default-initialized to nil.
fn open_scope(
    tree: &mut ScopeTree,
    stack: &mut Vec<ScopeId>,
    kind: ScopeKind,
    tokens: &[Token],
) -> Result<(), Exception> {
    if tokens.len() < 2 || tokens[1].kind != TokenKind::Name {
        return syntax_err!(
            "'{}' requires a name (line {})",
            tokens[0].content,
            tokens[0].line
        );
    }

    let parent = *stack.last().expect("stack holds global");
    let name = &tokens[1].content;

    if tree.scope(parent).has_member(name) {
        return syntax_err!("member {} already exists in scope", name);
    }

    let child = tree.alloc(kind, name.clone(), Some(parent));
    tree.scope_mut(parent).children.insert(name.clone(), child);
    stack.push(child);

    if kind == ScopeKind::Function {
        for token in &tokens[2..] {
            if token.kind != TokenKind::Name {
                continue;
            }
            tree.scope_mut(child)
                .args
                .push((token.content.clone(), Variant::nil()));
        }
    }

    Ok(())
}
