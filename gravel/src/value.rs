//! The Gravel Value Model
//!
//! A [`Variant`] is the type of all Gravel values: the datum itself plus the `const`
//! flag set by `const` declarations.  Numbers are carried inline; string and array
//! payloads live in the [`Heap`] and are referenced by index.  `Variant` is `Copy`:
//! copying a string- or array-valued variant copies the *handle*, so the copy aliases
//! the same heap slot and mutation through one copy is visible through every other.
//! That sharing is load-bearing for how arrays are passed to and returned from
//! builtins.
//!
//! The heap is append-only: entries are created on first write and never freed or
//! reused for the life of the interpreter.

use crate::token::{Token, TokenKind};
use crate::types::{ErrorKind, Exception, GravelFloat, GravelInt};

/// A handle to a string payload in the [`Heap`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StrId(usize);

/// A handle to an array payload in the [`Heap`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ArrId(usize);

/// The datum carried by a [`Variant`].
///
/// `Map` is a reserved tag: the language grammar has no way to produce one yet, and
/// every builtin reports a type error on it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Datum {
    Nil,
    Int(GravelInt),
    Float(GravelFloat),
    Str(StrId),
    Array(ArrId),
    Map,
}

impl Datum {
    /// The type name used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Datum::Nil => "nil",
            Datum::Int(_) => "int",
            Datum::Float(_) => "float",
            Datum::Str(_) => "string",
            Datum::Array(_) => "array",
            Datum::Map => "map",
        }
    }
}

/// A Gravel value: a [`Datum`] plus the immutability flag.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Variant {
    datum: Datum,
    is_const: bool,
}

impl Variant {
    /// The nil value.
    pub fn nil() -> Self {
        Self {
            datum: Datum::Nil,
            is_const: false,
        }
    }

    /// An integer value.
    pub fn int(value: GravelInt) -> Self {
        Self {
            datum: Datum::Int(value),
            is_const: false,
        }
    }

    /// A float value.
    pub fn float(value: GravelFloat) -> Self {
        Self {
            datum: Datum::Float(value),
            is_const: false,
        }
    }

    /// A string value referencing the given heap slot.
    pub fn string(id: StrId) -> Self {
        Self {
            datum: Datum::Str(id),
            is_const: false,
        }
    }

    /// An array value referencing the given heap slot.
    pub fn array(id: ArrId) -> Self {
        Self {
            datum: Datum::Array(id),
            is_const: false,
        }
    }

    /// The same value, flagged immutable.  Assignments to a const binding are
    /// rejected by the executor.
    pub fn constant(mut self) -> Self {
        self.is_const = true;
        self
    }

    /// The same value, with the immutability flag cleared.  Used when a const
    /// binding's value is copied somewhere mutable (a call argument, `retVal`).
    pub fn mutable(mut self) -> Self {
        self.is_const = false;
        self
    }

    pub fn datum(&self) -> Datum {
        self.datum
    }

    pub fn is_const(&self) -> bool {
        self.is_const
    }

    pub fn is_nil(&self) -> bool {
        matches!(self.datum, Datum::Nil)
    }

    /// Builds a value from a literal token: a string, char, or number.  Any other
    /// token kind is rejected; the caller decides whether a Name should have been
    /// resolved instead.
    pub fn from_literal(heap: &mut Heap, token: &Token) -> Result<Variant, Exception> {
        match token.kind {
            TokenKind::Str | TokenKind::Char => {
                let id = heap.alloc_string(token.content.clone());
                Ok(Variant::string(id))
            }
            TokenKind::Number => {
                if token.content.contains('.') {
                    match token.content.parse::<GravelFloat>() {
                        Ok(f) => Ok(Variant::float(f)),
                        Err(_) => Err(Exception::new(
                            ErrorKind::Rejected,
                            format!("not a valid number: {}", token.content),
                        )),
                    }
                } else {
                    match token.content.parse::<GravelInt>() {
                        Ok(i) => Ok(Variant::int(i)),
                        Err(_) => Err(Exception::new(
                            ErrorKind::Rejected,
                            format!("not a valid number: {}", token.content),
                        )),
                    }
                }
            }
            _ => Err(Exception::new(
                ErrorKind::Rejected,
                format!("expected a literal value, got: {}", token.content),
            )),
        }
    }
}

impl Default for Variant {
    fn default() -> Self {
        Variant::nil()
    }
}

/// The interpreter's backing store for string and array payloads.
///
/// Two append-only pools indexed by [`StrId`]/[`ArrId`].  The heap is owned by the
/// interpreter and passed explicitly to every component that allocates or
/// dereferences handles; entries live for the life of the interpreter.
#[derive(Default)]
pub struct Heap {
    strings: Vec<String>,
    arrays: Vec<Vec<Variant>>,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a string payload, returning its handle.
    pub fn alloc_string(&mut self, s: impl Into<String>) -> StrId {
        let id = StrId(self.strings.len());
        self.strings.push(s.into());
        id
    }

    /// The string payload for the handle.
    pub fn string(&self, id: StrId) -> &str {
        &self.strings[id.0]
    }

    /// Appends an array payload, returning its handle.
    pub fn alloc_array(&mut self, items: Vec<Variant>) -> ArrId {
        let id = ArrId(self.arrays.len());
        self.arrays.push(items);
        id
    }

    /// The array payload for the handle.
    pub fn array(&self, id: ArrId) -> &[Variant] {
        &self.arrays[id.0]
    }

    /// Mutable access to an array payload.  Every variant holding this handle
    /// observes the mutation.
    pub fn array_mut(&mut self, id: ArrId) -> &mut Vec<Variant> {
        &mut self.arrays[id.0]
    }

    /// Renders a value as display text: numbers in decimal, nil as `null`, strings
    /// verbatim, arrays element-by-element.
    pub fn render(&self, value: &Variant) -> String {
        match value.datum() {
            Datum::Nil => "null".into(),
            Datum::Int(i) => i.to_string(),
            Datum::Float(f) => f.to_string(),
            Datum::Str(id) => self.string(id).into(),
            Datum::Array(id) => {
                let items: Vec<String> = self.array(id).iter().map(|v| self.render(v)).collect();
                format!("[{}]", items.join(", "))
            }
            Datum::Map => "<map>".into(),
        }
    }
}
