//! Convenience macros for producing [`GravelResult`](../types/type.GravelResult.html)
//! values: one `Ok` constructor and one `Err` constructor per error class.

/// Returns an `Ok` result.  With no arguments the value is nil; with arguments, the
/// single argument is converted into the result [`Variant`](../value/struct.Variant.html).
///
/// # Examples
///
/// ```
/// use gravel::gravel_ok;
/// use gravel::types::GravelResult;
/// use gravel::value::Variant;
///
/// fn answer() -> GravelResult {
///     gravel_ok!(Variant::int(42))
/// }
///
/// fn nothing() -> GravelResult {
///     gravel_ok!()
/// }
/// # assert_eq!(answer().unwrap(), Variant::int(42));
/// # assert!(nothing().unwrap().is_nil());
/// ```
#[macro_export]
macro_rules! gravel_ok {
    () => {
        Ok($crate::value::Variant::nil())
    };
    ($value:expr) => {
        Ok($value)
    };
}

/// Returns an `Err(Exception)` of kind `Lex`, with `format!` arguments.
#[macro_export]
macro_rules! lex_err {
    ($($arg:tt)*) => {
        Err($crate::types::Exception::new(
            $crate::types::ErrorKind::Lex,
            format!($($arg)*),
        ))
    };
}

/// Returns an `Err(Exception)` of kind `Syntax`, with `format!` arguments.
#[macro_export]
macro_rules! syntax_err {
    ($($arg:tt)*) => {
        Err($crate::types::Exception::new(
            $crate::types::ErrorKind::Syntax,
            format!($($arg)*),
        ))
    };
}

/// Returns an `Err(Exception)` of kind `Rejected`, with `format!` arguments.
#[macro_export]
macro_rules! reject_err {
    ($($arg:tt)*) => {
        Err($crate::types::Exception::new(
            $crate::types::ErrorKind::Rejected,
            format!($($arg)*),
        ))
    };
}

/// Returns an `Err(Exception)` of kind `Runtime`, with `format!` arguments.
#[macro_export]
macro_rules! runtime_err {
    ($($arg:tt)*) => {
        Err($crate::types::Exception::new(
            $crate::types::ErrorKind::Runtime,
            format!($($arg)*),
        ))
    };
}

#[cfg(test)]
mod tests {
    use crate::types::{ErrorKind, Exception, GravelResult};
    use crate::value::Variant;

    fn ok_fn() -> GravelResult {
        gravel_ok!()
    }

    fn err_fn() -> GravelResult {
        syntax_err!("unexpected token: {}", "end")
    }

    #[test]
    fn test_gravel_ok() {
        assert_eq!(ok_fn(), Ok(Variant::nil()));
    }

    #[test]
    fn test_err_macros() {
        assert_eq!(
            err_fn(),
            Err(Exception::new(ErrorKind::Syntax, "unexpected token: end"))
        );

        let r: GravelResult = runtime_err!("index out of range: {}", 7);
        assert_eq!(r.unwrap_err().kind(), ErrorKind::Runtime);
    }
}
