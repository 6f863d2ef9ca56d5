use alp_ir::{Token, TokenStream};
use tracing::debug;

use super::{DefaultErrorStrategy, ErrorStrategy};
use crate::{ParseFailure, RecognitionError, Recognizer};

/// Gives up on the first syntax error.
///
/// The error is reported like [`DefaultErrorStrategy`] would, recorded on
/// every active invocation, and turned into [`ParseFailure::Cancelled`],
/// which no rule boundary recovers from. Useful as a fast first pass: parse
/// in SLL mode with this strategy and only re-parse with full recovery if
/// it bails.
#[derive(Clone, Debug, Default)]
pub struct BailErrorStrategy {
    inner: DefaultErrorStrategy,
}

impl BailErrorStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    fn cancel<S: TokenStream>(rec: &mut Recognizer<S>, error: RecognitionError) -> ParseFailure {
        rec.record_context_error(&error, true);
        debug!(index = ?error.offending.index, "bailing out");
        ParseFailure::Cancelled(error)
    }
}

impl<S: TokenStream> ErrorStrategy<S> for BailErrorStrategy {
    fn reset(&mut self, rec: &mut Recognizer<S>) {
        self.inner.reset(rec);
    }

    fn report_error(&mut self, rec: &mut Recognizer<S>, error: &RecognitionError) {
        self.inner.report_error(rec, error);
    }

    fn recover(&mut self, rec: &mut Recognizer<S>, error: &RecognitionError) -> Result<(), ParseFailure> {
        Err(Self::cancel(rec, error.clone()))
    }

    fn recover_inline(&mut self, rec: &mut Recognizer<S>) -> Result<Token, ParseFailure> {
        let error = rec.input_mismatch();
        self.inner.report_error(rec, &error);
        Err(Self::cancel(rec, error))
    }

    fn sync(&mut self, _rec: &mut Recognizer<S>) -> Result<(), ParseFailure> {
        Ok(())
    }

    fn report_match(&mut self, rec: &mut Recognizer<S>) {
        self.inner.report_match(rec);
    }

    fn in_error_recovery_mode(&self) -> bool {
        ErrorStrategy::<S>::in_error_recovery_mode(&self.inner)
    }
}
