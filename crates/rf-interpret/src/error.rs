use rf_core::error::Error;
use rf_core::span::Span;

/// Create a staging error at an optional source span
pub fn staging_error_at(message: impl Into<String>, span: Option<Span>) -> Error {
    Error::staging(message).with_span(span)
}

/// Create a type error at an optional source span
pub fn type_error_at(message: impl Into<String>, span: Option<Span>) -> Error {
    Error::type_error(message).with_span(span)
}

pub fn assertion_error_at(message: impl Into<String>, span: Option<Span>) -> Error {
    Error::assertion(message).with_span(span)
}

/// Return early with a staging error
#[macro_export]
macro_rules! stage_bail {
    ($span:expr, $($arg:tt)*) => {
        return Err($crate::error::staging_error_at(format!($($arg)*), $span))
    };
}

/// Return a staging error unless the condition holds
#[macro_export]
macro_rules! stage_ensure {
    ($cond:expr, $span:expr, $($arg:tt)*) => {
        if !($cond) {
            $crate::stage_bail!($span, $($arg)*);
        }
    };
}

/// Return early with a type error
#[macro_export]
macro_rules! type_bail_at {
    ($span:expr, $($arg:tt)*) => {
        return Err($crate::error::type_error_at(format!($($arg)*), $span))
    };
}
