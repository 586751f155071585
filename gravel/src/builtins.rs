//! Builtin Functions
//!
//! The fixed table of native operations callable from Gravel code: printing, string
//! conversion, arithmetic, comparison, string/array indexing, and console input.
//! Every builtin has the same contract ([`BuiltinFunc`]): it receives the heap and
//! the already-resolved argument values and returns a value or an exception; it
//! never aborts the process.
//!
//! Numeric coercion follows one rule everywhere: Int and Float mix by promoting
//! through Float, and nil stands in for the zero of whichever numeric type it meets.
//! A String is only ever equal to another String.

use crate::types::{check_args, BuiltinFunc, Exception, GravelFloat, GravelHasher, GravelInt, GravelResult};
use crate::value::{Datum, Heap, Variant};
use crate::{gravel_ok, runtime_err};
use indexmap::IndexMap;
use std::io::{BufRead, Read, Write};

/// Builds the registry of builtin functions, keyed by their Gravel-visible names.
pub fn registry() -> IndexMap<String, BuiltinFunc, GravelHasher> {
    let table: &[(&str, BuiltinFunc)] = &[
        ("Print", cmd_print),
        ("Panic", cmd_panic),
        ("ToString", cmd_to_string),
        ("Add", cmd_add),
        ("Sub", cmd_sub),
        ("Mul", cmd_mul),
        ("Div", cmd_div),
        ("AddF", cmd_add_f),
        ("Eq", cmd_eq),
        ("Neq", cmd_neq),
        ("Lt", cmd_lt),
        ("Gt", cmd_gt),
        ("At", cmd_at),
        ("Len", cmd_len),
        ("GetLine", cmd_get_line),
        ("GetChar", cmd_get_char),
    ];

    let mut map: IndexMap<String, BuiltinFunc, GravelHasher> = IndexMap::default();
    for &(name, func) in table {
        map.insert(name.into(), func);
    }
    map
}

//--------------------------------------------------------------------------------------------
// Numeric coercion

/// A pair of operands reduced to a common numeric type.
enum NumPair {
    Ints(GravelInt, GravelInt),
    Floats(GravelFloat, GravelFloat),
}

/// Reduces two operands to a common numeric type: Int with Int stays Int, anything
/// involving a Float promotes, and nil becomes the zero of the other side's type.
fn num_pair(name: &str, a: &Variant, b: &Variant) -> Result<NumPair, Exception> {
    let pair = match (a.datum(), b.datum()) {
        (Datum::Int(x), Datum::Int(y)) => NumPair::Ints(x, y),
        (Datum::Int(x), Datum::Float(y)) => NumPair::Floats(x as GravelFloat, y),
        (Datum::Float(x), Datum::Int(y)) => NumPair::Floats(x, y as GravelFloat),
        (Datum::Float(x), Datum::Float(y)) => NumPair::Floats(x, y),
        (Datum::Nil, Datum::Int(y)) => NumPair::Ints(0, y),
        (Datum::Int(x), Datum::Nil) => NumPair::Ints(x, 0),
        (Datum::Nil, Datum::Float(y)) => NumPair::Floats(0.0, y),
        (Datum::Float(x), Datum::Nil) => NumPair::Floats(x, 0.0),
        (Datum::Nil, Datum::Nil) => NumPair::Ints(0, 0),
        (x, y) => {
            return Err(Exception::new(
                crate::types::ErrorKind::Runtime,
                format!(
                    "{} expects numeric arguments, got {} and {}",
                    name,
                    x.type_name(),
                    y.type_name()
                ),
            ))
        }
    };
    Ok(pair)
}

/// A float for any numeric-or-nil operand; used by the float-forcing builtins.
fn as_float(name: &str, v: &Variant) -> Result<GravelFloat, Exception> {
    match v.datum() {
        Datum::Nil => Ok(0.0),
        Datum::Int(i) => Ok(i as GravelFloat),
        Datum::Float(f) => Ok(f),
        other => runtime_err!("{} expects a numeric argument, got {}", name, other.type_name()),
    }
}

//--------------------------------------------------------------------------------------------
// Printing

/// `Print text`: writes the string argument and a newline to stdout.
fn cmd_print(heap: &mut Heap, args: &[Variant]) -> GravelResult {
    check_args("Print", args, 1, 1, "text")?;

    match args[0].datum() {
        Datum::Str(id) => {
            println!("{}", heap.string(id));
            gravel_ok!()
        }
        other => runtime_err!("argument 0 of Print must be a string, got {}", other.type_name()),
    }
}

/// `Panic text`: writes the string argument to stderr and aborts the call chain
/// with a runtime error.
fn cmd_panic(heap: &mut Heap, args: &[Variant]) -> GravelResult {
    check_args("Panic", args, 1, 1, "text")?;

    match args[0].datum() {
        Datum::Str(id) => {
            let text = heap.string(id).to_string();
            eprintln!("{}", text);
            let _ = std::io::stderr().flush();
            runtime_err!("script panic: {}", text)
        }
        other => runtime_err!("argument 0 of Panic must be a string, got {}", other.type_name()),
    }
}

//--------------------------------------------------------------------------------------------
// String conversion

/// `ToString value`: decimal text for numbers, `null` for nil, strings unchanged.
fn cmd_to_string(heap: &mut Heap, args: &[Variant]) -> GravelResult {
    check_args("ToString", args, 1, 1, "value")?;

    match args[0].datum() {
        Datum::Str(_) => gravel_ok!(args[0].mutable()),
        Datum::Nil => {
            let id = heap.alloc_string("null");
            gravel_ok!(Variant::string(id))
        }
        Datum::Int(i) => {
            let id = heap.alloc_string(i.to_string());
            gravel_ok!(Variant::string(id))
        }
        Datum::Float(f) => {
            let id = heap.alloc_string(f.to_string());
            gravel_ok!(Variant::string(id))
        }
        other => runtime_err!("ToString cannot render {}", other.type_name()),
    }
}

//--------------------------------------------------------------------------------------------
// Arithmetic

fn cmd_add(_heap: &mut Heap, args: &[Variant]) -> GravelResult {
    check_args("Add", args, 2, 2, "a, b")?;
    match num_pair("Add", &args[0], &args[1])? {
        NumPair::Ints(x, y) => gravel_ok!(Variant::int(x.wrapping_add(y))),
        NumPair::Floats(x, y) => gravel_ok!(Variant::float(x + y)),
    }
}

fn cmd_sub(_heap: &mut Heap, args: &[Variant]) -> GravelResult {
    check_args("Sub", args, 2, 2, "a, b")?;
    match num_pair("Sub", &args[0], &args[1])? {
        NumPair::Ints(x, y) => gravel_ok!(Variant::int(x.wrapping_sub(y))),
        NumPair::Floats(x, y) => gravel_ok!(Variant::float(x - y)),
    }
}

fn cmd_mul(_heap: &mut Heap, args: &[Variant]) -> GravelResult {
    check_args("Mul", args, 2, 2, "a, b")?;
    match num_pair("Mul", &args[0], &args[1])? {
        NumPair::Ints(x, y) => gravel_ok!(Variant::int(x.wrapping_mul(y))),
        NumPair::Floats(x, y) => gravel_ok!(Variant::float(x * y)),
    }
}

fn cmd_div(_heap: &mut Heap, args: &[Variant]) -> GravelResult {
    check_args("Div", args, 2, 2, "a, b")?;
    match num_pair("Div", &args[0], &args[1])? {
        NumPair::Ints(_, 0) => runtime_err!("integer division by zero"),
        NumPair::Ints(x, y) => gravel_ok!(Variant::int(x.wrapping_div(y))),
        NumPair::Floats(x, y) => gravel_ok!(Variant::float(x / y)),
    }
}

/// `AddF a, b`: addition carried out in Float regardless of the operand types.
fn cmd_add_f(_heap: &mut Heap, args: &[Variant]) -> GravelResult {
    check_args("AddF", args, 2, 2, "a, b")?;
    let x = as_float("AddF", &args[0])?;
    let y = as_float("AddF", &args[1])?;
    gravel_ok!(Variant::float(x + y))
}

//--------------------------------------------------------------------------------------------
// Comparison

/// Equality across the value model: strings compare by content and only against
/// strings; numbers and nil reduce through [`num_pair`].
fn values_equal(heap: &Heap, a: &Variant, b: &Variant) -> Result<bool, Exception> {
    match (a.datum(), b.datum()) {
        (Datum::Str(x), Datum::Str(y)) => Ok(heap.string(x) == heap.string(y)),
        (Datum::Str(_), _) | (_, Datum::Str(_)) => Ok(false),
        _ => match num_pair("Eq", a, b)? {
            NumPair::Ints(x, y) => Ok(x == y),
            NumPair::Floats(x, y) => Ok(x == y),
        },
    }
}

fn cmd_eq(heap: &mut Heap, args: &[Variant]) -> GravelResult {
    check_args("Eq", args, 2, 2, "a, b")?;
    gravel_ok!(Variant::int(values_equal(heap, &args[0], &args[1])? as GravelInt))
}

fn cmd_neq(heap: &mut Heap, args: &[Variant]) -> GravelResult {
    check_args("Neq", args, 2, 2, "a, b")?;
    gravel_ok!(Variant::int(!values_equal(heap, &args[0], &args[1])? as GravelInt))
}

fn cmd_lt(_heap: &mut Heap, args: &[Variant]) -> GravelResult {
    check_args("Lt", args, 2, 2, "a, b")?;
    let less = match num_pair("Lt", &args[0], &args[1])? {
        NumPair::Ints(x, y) => x < y,
        NumPair::Floats(x, y) => x < y,
    };
    gravel_ok!(Variant::int(less as GravelInt))
}

fn cmd_gt(_heap: &mut Heap, args: &[Variant]) -> GravelResult {
    check_args("Gt", args, 2, 2, "a, b")?;
    let greater = match num_pair("Gt", &args[0], &args[1])? {
        NumPair::Ints(x, y) => x > y,
        NumPair::Floats(x, y) => x > y,
    };
    gravel_ok!(Variant::int(greater as GravelInt))
}

//--------------------------------------------------------------------------------------------
// Indexing

fn index_of(name: &str, v: &Variant) -> Result<usize, Exception> {
    match v.datum() {
        Datum::Int(i) if i >= 0 => Ok(i as usize),
        Datum::Int(i) => runtime_err!("{} index out of range: {}", name, i),
        other => runtime_err!("{} index must be an int, got {}", name, other.type_name()),
    }
}

/// `At target, index`: the element of an array or the character of a string.
/// Out-of-range indices are runtime errors, not nil.
fn cmd_at(heap: &mut Heap, args: &[Variant]) -> GravelResult {
    check_args("At", args, 2, 2, "target, index")?;
    let index = index_of("At", &args[1])?;

    match args[0].datum() {
        Datum::Array(id) => match heap.array(id).get(index) {
            Some(elem) => gravel_ok!(*elem),
            None => runtime_err!("At index out of range: {}", index),
        },
        Datum::Str(id) => match heap.string(id).chars().nth(index) {
            Some(c) => {
                let id = heap.alloc_string(c.to_string());
                gravel_ok!(Variant::string(id))
            }
            None => runtime_err!("At index out of range: {}", index),
        },
        other => runtime_err!("At expects a string or array, got {}", other.type_name()),
    }
}

/// `Len target`: element count of an array, character count of a string.
fn cmd_len(heap: &mut Heap, args: &[Variant]) -> GravelResult {
    check_args("Len", args, 1, 1, "target")?;

    match args[0].datum() {
        Datum::Array(id) => gravel_ok!(Variant::int(heap.array(id).len() as GravelInt)),
        Datum::Str(id) => gravel_ok!(Variant::int(heap.string(id).chars().count() as GravelInt)),
        other => runtime_err!("Len expects a string or array, got {}", other.type_name()),
    }
}

//--------------------------------------------------------------------------------------------
// Console input

/// `GetLine`: reads one line from stdin, without the trailing newline.
fn cmd_get_line(heap: &mut Heap, args: &[Variant]) -> GravelResult {
    check_args("GetLine", args, 0, 0, "")?;

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| Exception::new(crate::types::ErrorKind::Runtime, format!("GetLine: {}", e)))?;
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    let id = heap.alloc_string(line);
    gravel_ok!(Variant::string(id))
}

/// `GetChar`: reads a single character from stdin.
fn cmd_get_char(heap: &mut Heap, args: &[Variant]) -> GravelResult {
    check_args("GetChar", args, 0, 0, "")?;

    let mut buf = [0u8; 1];
    std::io::stdin()
        .lock()
        .read_exact(&mut buf)
        .map_err(|e| Exception::new(crate::types::ErrorKind::Runtime, format!("GetChar: {}", e)))?;
    let id = heap.alloc_string((buf[0] as char).to_string());
    gravel_ok!(Variant::string(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ErrorKind;

    fn int(v: &Variant) -> GravelInt {
        match v.datum() {
            Datum::Int(i) => i,
            other => panic!("expected int, got {:?}", other),
        }
    }

    #[test]
    fn test_registry_names() {
        let reg = registry();
        for name in ["Print", "ToString", "Add", "AddF", "Eq", "At", "Len", "GetChar"] {
            assert!(reg.contains_key(name), "missing builtin {}", name);
        }
        assert!(!reg.contains_key("Main"));
    }

    #[test]
    fn test_add_int_and_promotion() {
        let mut heap = Heap::new();

        let r = cmd_add(&mut heap, &[Variant::int(2), Variant::int(3)]).unwrap();
        assert_eq!(r.datum(), Datum::Int(5));

        let r = cmd_add(&mut heap, &[Variant::int(2), Variant::float(0.5)]).unwrap();
        assert_eq!(r.datum(), Datum::Float(2.5));

        // Nil computes as the zero of the other operand's type.
        let r = cmd_add(&mut heap, &[Variant::nil(), Variant::int(3)]).unwrap();
        assert_eq!(r.datum(), Datum::Int(3));

        let r = cmd_sub(&mut heap, &[Variant::float(1.5), Variant::nil()]).unwrap();
        assert_eq!(r.datum(), Datum::Float(1.5));
    }

    #[test]
    fn test_add_f_forces_float() {
        let mut heap = Heap::new();
        let r = cmd_add_f(&mut heap, &[Variant::int(2), Variant::int(3)]).unwrap();
        assert_eq!(r.datum(), Datum::Float(5.0));
    }

    #[test]
    fn test_arith_type_errors() {
        let mut heap = Heap::new();
        let s = Variant::string(heap.alloc_string("x"));

        let err = cmd_add(&mut heap, &[s, Variant::int(1)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Runtime);

        let err = cmd_add(&mut heap, &[Variant::int(1)]).unwrap_err();
        assert!(err.message().contains("wrong # args"));
    }

    #[test]
    fn test_div() {
        let mut heap = Heap::new();

        let r = cmd_div(&mut heap, &[Variant::int(7), Variant::int(2)]).unwrap();
        assert_eq!(r.datum(), Datum::Int(3));

        let r = cmd_div(&mut heap, &[Variant::float(7.0), Variant::int(2)]).unwrap();
        assert_eq!(r.datum(), Datum::Float(3.5));

        let err = cmd_div(&mut heap, &[Variant::int(1), Variant::int(0)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Runtime);
    }

    #[test]
    fn test_eq_matrix() {
        let mut heap = Heap::new();
        let a = Variant::string(heap.alloc_string("abc"));
        let b = Variant::string(heap.alloc_string("abc"));
        let c = Variant::string(heap.alloc_string("xyz"));

        // Strings compare by content.
        assert_eq!(int(&cmd_eq(&mut heap, &[a, b]).unwrap()), 1);
        assert_eq!(int(&cmd_eq(&mut heap, &[a, c]).unwrap()), 0);

        // A string never equals a number or nil.
        assert_eq!(int(&cmd_eq(&mut heap, &[a, Variant::int(0)]).unwrap()), 0);
        assert_eq!(int(&cmd_eq(&mut heap, &[a, Variant::nil()]).unwrap()), 0);

        // Int/Float promote; nil equals the numeric zero.
        assert_eq!(int(&cmd_eq(&mut heap, &[Variant::int(2), Variant::float(2.0)]).unwrap()), 1);
        assert_eq!(int(&cmd_eq(&mut heap, &[Variant::nil(), Variant::int(0)]).unwrap()), 1);
        assert_eq!(int(&cmd_eq(&mut heap, &[Variant::nil(), Variant::float(0.0)]).unwrap()), 1);
        assert_eq!(int(&cmd_eq(&mut heap, &[Variant::nil(), Variant::int(1)]).unwrap()), 0);

        assert_eq!(int(&cmd_neq(&mut heap, &[Variant::int(1), Variant::int(2)]).unwrap()), 1);
    }

    #[test]
    fn test_ordering() {
        let mut heap = Heap::new();
        assert_eq!(int(&cmd_lt(&mut heap, &[Variant::int(1), Variant::int(2)]).unwrap()), 1);
        assert_eq!(int(&cmd_gt(&mut heap, &[Variant::int(1), Variant::int(2)]).unwrap()), 0);
        assert_eq!(int(&cmd_lt(&mut heap, &[Variant::nil(), Variant::float(0.5)]).unwrap()), 1);

        let s = Variant::string(heap.alloc_string("x"));
        assert!(cmd_lt(&mut heap, &[s, Variant::int(1)]).is_err());
    }

    #[test]
    fn test_to_string() {
        let mut heap = Heap::new();

        let r = cmd_to_string(&mut heap, &[Variant::int(12)]).unwrap();
        assert_eq!(heap.render(&r), "12");

        let r = cmd_to_string(&mut heap, &[Variant::float(2.5)]).unwrap();
        assert_eq!(heap.render(&r), "2.5");

        let r = cmd_to_string(&mut heap, &[Variant::nil()]).unwrap();
        assert_eq!(heap.render(&r), "null");

        let s = Variant::string(heap.alloc_string("pass through"));
        let r = cmd_to_string(&mut heap, &[s]).unwrap();
        assert_eq!(r.datum(), s.datum());
    }

    #[test]
    fn test_to_string_round_trips_numeric_text() {
        let mut heap = Heap::new();
        for n in [0i64, 7, -42, 1234567890] {
            let r = cmd_to_string(&mut heap, &[Variant::int(n)]).unwrap();
            assert_eq!(heap.render(&r), n.to_string());
        }
        for f in [0.5f64, -3.25, 100.0] {
            let r = cmd_to_string(&mut heap, &[Variant::float(f)]).unwrap();
            assert_eq!(heap.render(&r), f.to_string());
        }
    }

    #[test]
    fn test_at_and_len_array() {
        let mut heap = Heap::new();
        let id = heap.alloc_array(vec![Variant::int(10), Variant::int(20)]);
        let arr = Variant::array(id);

        let r = cmd_len(&mut heap, &[arr]).unwrap();
        assert_eq!(r.datum(), Datum::Int(2));

        let r = cmd_at(&mut heap, &[arr, Variant::int(1)]).unwrap();
        assert_eq!(r.datum(), Datum::Int(20));

        assert!(cmd_at(&mut heap, &[arr, Variant::int(2)]).is_err());
        assert!(cmd_at(&mut heap, &[arr, Variant::int(-1)]).is_err());
    }

    #[test]
    fn test_at_and_len_string() {
        let mut heap = Heap::new();
        let s = Variant::string(heap.alloc_string("héllo"));

        let r = cmd_len(&mut heap, &[s]).unwrap();
        assert_eq!(r.datum(), Datum::Int(5));

        let r = cmd_at(&mut heap, &[s, Variant::int(1)]).unwrap();
        assert_eq!(heap.render(&r), "é");
    }

    #[test]
    fn test_at_and_len_empty() {
        let mut heap = Heap::new();
        let arr = Variant::array(heap.alloc_array(Vec::new()));
        let s = Variant::string(heap.alloc_string(""));

        assert_eq!(cmd_len(&mut heap, &[arr]).unwrap().datum(), Datum::Int(0));
        assert_eq!(cmd_len(&mut heap, &[s]).unwrap().datum(), Datum::Int(0));

        // Index 0 of an empty target is out of bounds, not nil.
        assert!(cmd_at(&mut heap, &[arr, Variant::int(0)]).is_err());
        assert!(cmd_at(&mut heap, &[s, Variant::int(0)]).is_err());
    }

    #[test]
    fn test_print_type_check() {
        let mut heap = Heap::new();
        let err = cmd_print(&mut heap, &[Variant::int(1)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Runtime);
    }

    #[test]
    fn test_panic_is_an_error() {
        let mut heap = Heap::new();
        let s = Variant::string(heap.alloc_string("boom"));
        let err = cmd_panic(&mut heap, &[s]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Runtime);
        assert!(err.message().contains("boom"));
    }
}
