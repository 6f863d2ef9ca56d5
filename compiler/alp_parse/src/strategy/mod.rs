//! Error reporting and recovery policies.

mod bail;
mod default;

pub use bail::BailErrorStrategy;
pub use default::DefaultErrorStrategy;

use alp_ir::{Token, TokenStream};

use crate::{ParseFailure, RecognitionError, Recognizer};

/// How a parser reports syntax errors and gets back on track.
///
/// The parser calls [`sync`](Self::sync) before decisions and loop
/// iterations, [`recover_inline`](Self::recover_inline) when a token match
/// fails, and [`report_error`](Self::report_error) followed by
/// [`recover`](Self::recover) when a [`RecognitionError`] reaches a rule
/// boundary. Returning `Err` from any of them with a fatal
/// [`ParseFailure`] aborts the parse.
pub trait ErrorStrategy<S: TokenStream> {
    /// Forget any recovery in progress.
    fn reset(&mut self, rec: &mut Recognizer<S>);

    fn report_error(&mut self, rec: &mut Recognizer<S>, error: &RecognitionError);

    /// Resynchronize after a reported error.
    fn recover(&mut self, rec: &mut Recognizer<S>, error: &RecognitionError) -> Result<(), ParseFailure>;

    /// The current token does not match; return the token to use in its
    /// place (possibly conjured) or fail.
    fn recover_inline(&mut self, rec: &mut Recognizer<S>) -> Result<Token, ParseFailure>;

    /// Make sure the current token can start something the state expects.
    fn sync(&mut self, rec: &mut Recognizer<S>) -> Result<(), ParseFailure>;

    /// A token matched normally.
    fn report_match(&mut self, rec: &mut Recognizer<S>);

    fn in_error_recovery_mode(&self) -> bool;
}

#[cfg(test)]
mod tests;
