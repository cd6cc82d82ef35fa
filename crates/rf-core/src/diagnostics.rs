use crate::error::Error;
use crate::span::Span;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Info,
    Warning,
    Error,
}

/// A non-fatal finding collected while staging, or a fatal error rendered for output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl Diagnostic {
    fn new(level: DiagnosticLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            span: None,
            suggestions: Vec::new(),
            code: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Warning, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Info, message)
    }

    pub fn with_span(mut self, span: Option<Span>) -> Self {
        self.span = span.or(self.span);
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == DiagnosticLevel::Error
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(code) = &self.code {
            write!(f, " [{}]", code)?;
        }

        if !self.suggestions.is_empty() {
            write!(f, " (hints: {})", self.suggestions.join("; "))?;
        }

        Ok(())
    }
}

impl From<&Error> for Diagnostic {
    fn from(err: &Error) -> Self {
        let code = miette::Diagnostic::code(err).map(|code| code.to_string());
        let span = err
            .span()
            .map(|s| Span::new(s.offset() as u32, (s.offset() + s.len()) as u32));
        let mut diagnostic = Diagnostic::error(err.to_string()).with_span(span);
        diagnostic.code = code;
        diagnostic
    }
}

/// Output templates for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticTemplate {
    #[default]
    Pretty,
    Plain,
}

impl DiagnosticTemplate {
    /// Render one diagnostic into output lines; info is hidden unless `verbose`.
    pub fn render(&self, diagnostic: &Diagnostic, context: &str, verbose: bool) -> Vec<String> {
        if diagnostic.level == DiagnosticLevel::Info && !verbose {
            return Vec::new();
        }
        match self {
            DiagnosticTemplate::Pretty => render_pretty(diagnostic, context),
            DiagnosticTemplate::Plain => render_plain(diagnostic, context),
        }
    }
}

fn render_pretty(diagnostic: &Diagnostic, context: &str) -> Vec<String> {
    let prefix = match diagnostic.level {
        DiagnosticLevel::Error => "error",
        DiagnosticLevel::Warning => "warning",
        DiagnosticLevel::Info => "info",
    };

    let header = match diagnostic.code.as_ref() {
        Some(code) => format!("{}[{}]: {} ({})", prefix, context, diagnostic.message, code),
        None => format!("{}[{}]: {}", prefix, context, diagnostic.message),
    };

    let mut lines = vec![header];
    if let Some(span) = &diagnostic.span {
        lines.push(format!("  --> {}", span));
    }
    for suggestion in &diagnostic.suggestions {
        lines.push(format!("  = help: {}", suggestion));
    }
    lines
}

fn render_plain(diagnostic: &Diagnostic, context: &str) -> Vec<String> {
    let level = match diagnostic.level {
        DiagnosticLevel::Error => "ERROR",
        DiagnosticLevel::Warning => "WARNING",
        DiagnosticLevel::Info => "INFO",
    };

    let mut lines = vec![format!("[{}] {}: {}", context, level, diagnostic.message)];
    if let Some(span) = &diagnostic.span {
        lines.push(format!("   at {}", span));
    }
    for suggestion in &diagnostic.suggestions {
        lines.push(format!("   suggestion: {}", suggestion));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn errors_convert_with_code_and_span() {
        let err = Error::assertion("5 is not a string").with_span(Some(Span::new(2, 9)));
        let diagnostic = Diagnostic::from(&err);
        assert!(diagnostic.is_error());
        assert_eq!(diagnostic.code.as_deref(), Some("refine::assertion_error"));
        assert_eq!(diagnostic.span, Some(Span::new(2, 9)));
    }

    #[test]
    fn info_is_hidden_without_verbose() {
        let info = Diagnostic::info("specialized `f` once");
        assert!(DiagnosticTemplate::Plain.render(&info, "stage", false).is_empty());
        assert_eq!(
            DiagnosticTemplate::Plain.render(&info, "stage", true),
            vec!["[stage] INFO: specialized `f` once".to_string()]
        );
    }
}
