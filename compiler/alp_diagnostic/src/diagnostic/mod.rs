//! Rendered syntax errors.
//!
//! A [`Diagnostic`] is what a reported parse error looks like once it leaves
//! the parser: a code, a one-line message, the offending token's span and,
//! for decisions that failed after several tokens of lookahead, the span
//! where that decision began.

use std::fmt;

use alp_ir::Span;

use crate::ErrorCode;

/// How far parsing got after the error.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Severity {
    /// Recovered; the parse went on and the tree is best-effort.
    Error,
    /// The parse was abandoned at this point.
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        })
    }
}

/// A highlighted source range.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct Label {
    pub span: Span,
    pub message: String,
    /// The offending token, as opposed to related context.
    pub is_primary: bool,
}

/// One syntax error, ready to show to a user.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[must_use = "diagnostics should be reported or returned, not silently dropped"]
pub struct Diagnostic {
    pub code: ErrorCode,
    pub severity: Severity,
    pub message: String,
    /// Offending token first, then context.
    pub labels: Vec<Label>,
    /// Free-form context, such as the active rule stack.
    pub notes: Vec<String>,
}

impl Diagnostic {
    /// A recovered syntax error.
    #[cold]
    pub fn error(code: ErrorCode) -> Self {
        Self::with_severity(code, Severity::Error)
    }

    /// An error that ended the parse.
    #[cold]
    pub fn fatal(code: ErrorCode) -> Self {
        Self::with_severity(code, Severity::Fatal)
    }

    fn with_severity(code: ErrorCode, severity: Severity) -> Self {
        Diagnostic {
            code,
            severity,
            message: String::new(),
            labels: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Mark the offending token.
    pub fn with_label(mut self, span: Span, message: impl Into<String>) -> Self {
        self.labels.push(Label {
            span,
            message: message.into(),
            is_primary: true,
        });
        self
    }

    /// Mark a related location, e.g. where a failed decision started.
    pub fn with_secondary_label(mut self, span: Span, message: impl Into<String>) -> Self {
        self.labels.push(Label {
            span,
            message: message.into(),
            is_primary: false,
        });
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.severity, self.code, self.message)?;
        for label in &self.labels {
            let marker = if label.is_primary { "-->" } else { ":::" };
            write!(f, "\n  {marker} {}", label.span)?;
            if !label.message.is_empty() {
                write!(f, " {}", label.message)?;
            }
        }
        for note in &self.notes {
            write!(f, "\n  = note: {note}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
