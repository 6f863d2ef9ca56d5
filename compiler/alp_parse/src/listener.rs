//! Syntax error sinks.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use crate::ParseError;

/// Receives every syntax error as it is reported.
pub trait ErrorListener: Send {
    fn syntax_error(&mut self, error: &ParseError);
}

/// Forwards syntax errors to `tracing` at `warn`.
#[derive(Copy, Clone, Debug, Default)]
pub struct TracingListener;

impl ErrorListener for TracingListener {
    fn syntax_error(&mut self, error: &ParseError) {
        warn!(
            code = %error.code,
            line = error.line,
            column = error.column,
            "{}",
            error.message
        );
    }
}

/// Collects errors into a shared buffer the caller keeps a handle to.
#[derive(Clone, Debug, Default)]
pub struct CollectingListener {
    errors: Arc<Mutex<Vec<ParseError>>>,
}

impl CollectingListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Errors received so far.
    pub fn errors(&self) -> Vec<ParseError> {
        self.errors.lock().clone()
    }
}

impl ErrorListener for CollectingListener {
    fn syntax_error(&mut self, error: &ParseError) {
        self.errors.lock().push(error.clone());
    }
}
