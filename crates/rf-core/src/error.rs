use crate::span::Span;
use crate::value::Value;
use miette::{Diagnostic, SourceSpan};
use std::result;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    #[error("type error: {message}")]
    #[diagnostic(code(refine::type_error))]
    Type {
        message: String,
        #[label("here")]
        span: Option<SourceSpan>,
    },
    #[error("staging error: {message}")]
    #[diagnostic(
        code(refine::staging_error),
        help("only compile-time known values may cross this boundary")
    )]
    Staging {
        message: String,
        #[label("here")]
        span: Option<SourceSpan>,
    },
    #[error("assertion failed: {message}")]
    #[diagnostic(code(refine::assertion_error))]
    Assertion {
        message: String,
        #[label("asserted here")]
        span: Option<SourceSpan>,
    },
    #[error("contradictory constraint: {message}")]
    #[diagnostic(code(refine::contradiction))]
    Contradiction {
        message: String,
        #[label("here")]
        span: Option<SourceSpan>,
    },
    #[error("uncaught throw: {value}")]
    #[diagnostic(code(refine::thrown))]
    Thrown { value: Value },
    #[error("{0}")]
    #[diagnostic(code(refine::generic))]
    Generic(String),
}

pub type Result<T> = result::Result<T, Error>;

impl Error {
    pub fn type_error(message: impl Into<String>) -> Self {
        Error::Type {
            message: message.into(),
            span: None,
        }
    }

    pub fn staging(message: impl Into<String>) -> Self {
        Error::Staging {
            message: message.into(),
            span: None,
        }
    }

    pub fn assertion(message: impl Into<String>) -> Self {
        Error::Assertion {
            message: message.into(),
            span: None,
        }
    }

    pub fn contradiction(message: impl Into<String>) -> Self {
        Error::Contradiction {
            message: message.into(),
            span: None,
        }
    }

    /// Attach a span unless one is already present.
    pub fn with_span(mut self, at: Option<Span>) -> Self {
        let Some(at) = at else {
            return self;
        };
        match &mut self {
            Error::Type { span, .. }
            | Error::Staging { span, .. }
            | Error::Assertion { span, .. }
            | Error::Contradiction { span, .. } => {
                if span.is_none() {
                    *span = Some(at.into());
                }
            }
            Error::Thrown { .. } | Error::Generic(_) => {}
        }
        self
    }

    pub fn span(&self) -> Option<SourceSpan> {
        match self {
            Error::Type { span, .. }
            | Error::Staging { span, .. }
            | Error::Assertion { span, .. }
            | Error::Contradiction { span, .. } => *span,
            Error::Thrown { .. } | Error::Generic(_) => None,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Error::Type { message, .. }
            | Error::Staging { message, .. }
            | Error::Assertion { message, .. }
            | Error::Contradiction { message, .. } => message.clone(),
            Error::Thrown { value } => value.to_string(),
            Error::Generic(message) => message.clone(),
        }
    }
}

// Convert from eyre::Report to our Error type
impl From<eyre::Report> for Error {
    fn from(err: eyre::Report) -> Self {
        Error::Generic(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Generic(e.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Generic(s)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Generic(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn span_is_attached_once() {
        let err = Error::type_error("bad operand")
            .with_span(Some(Span::new(3, 7)))
            .with_span(Some(Span::new(10, 12)));
        assert_eq!(err.span(), Some(SourceSpan::from((3, 4))));
        assert_eq!(err.to_string(), "type error: bad operand");
    }

    #[test]
    fn eyre_reports_become_generic() {
        let err: Error = eyre::eyre!("boom").into();
        assert!(matches!(err, Error::Generic(ref m) if m == "boom"));
    }
}
