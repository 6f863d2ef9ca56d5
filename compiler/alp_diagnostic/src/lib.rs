//! Diagnostic system for syntax error reporting.
//!
//! - Error codes for searchability
//! - Clear messages (what went wrong)
//! - Primary span (where it went wrong), plus the decision start for
//!   lookahead failures
//! - Notes naming the rules that were active
//! - Severity: recovered, or fatal when the parse was abandoned
//!
//! The parser produces one diagnostic per error site; [`queue::DiagnosticQueue`]
//! orders them by position, drops exact repeats and enforces an error limit
//! before they are shown to a user.

mod diagnostic;
mod error_code;
pub mod queue;

pub use diagnostic::{Diagnostic, Label, Severity};
pub use error_code::ErrorCode;
pub use queue::{DiagnosticConfig, DiagnosticQueue};
