use alp_atn::{StateId, StateKind};
use alp_diagnostic::ErrorCode;
use alp_ir::{Token, TokenSet, TokenStream, TokenType};
use tracing::debug;

use super::ErrorStrategy;
use crate::{ContextId, ParseError, ParseFailure, RecognitionError, RecognitionErrorKind, Recognizer};

/// Reports each error once, then recovers by single-token deletion,
/// single-token insertion, or resynchronization on the follow sets of the
/// active rules, in that order.
#[derive(Clone, Debug, Default)]
pub struct DefaultErrorStrategy {
    /// Set after reporting an error, cleared by the next successful match.
    /// Errors in between are not reported.
    recovering: bool,
    last_error_index: Option<usize>,
    last_error_states: Vec<StateId>,
    /// Where `sync` last saw a state that could end its rule; an input
    /// mismatch found later is reported against it.
    next_tokens: Option<(Option<ContextId>, StateId)>,
}

impl DefaultErrorStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    fn begin_error_condition(&mut self) {
        self.recovering = true;
    }

    fn end_error_condition(&mut self) {
        self.recovering = false;
        self.last_error_states.clear();
        self.last_error_index = None;
    }

    fn report_no_viable_alternative<S: TokenStream>(&self, rec: &mut Recognizer<S>, error: &RecognitionError, start: &Token) {
        let input = if start.kind.is_eof() {
            "<EOF>".to_owned()
        } else {
            match (start.index, error.offending.index) {
                (Some(a), Some(b)) => rec.input().text(a, b),
                _ => start.display_text(rec.vocabulary()),
            }
        };
        let message = format!("no viable alternative at input {}", quote_escaped(&input));
        rec.notify(ParseError::new(ErrorCode::E1001, message, &error.offending).with_decision_start(start));
    }

    fn report_input_mismatch<S: TokenStream>(&self, rec: &mut Recognizer<S>, error: &RecognitionError) {
        let message = format!(
            "mismatched input {} expecting {}",
            error.offending.error_display(rec.vocabulary()),
            error.expected.format_expected(rec.vocabulary())
        );
        rec.notify_error(ErrorCode::E1002, message, &error.offending);
    }

    fn report_failed_predicate<S: TokenStream>(&self, rec: &mut Recognizer<S>, error: &RecognitionError, predicate: &str) {
        let rule = error
            .ctx
            .map(|c| rec.arena().get(c).rule)
            .map_or_else(String::new, |r| rec.atn().rule(r).name.clone());
        let message = format!("rule {rule} failed predicate: {{{predicate}}}?");
        rec.notify_error(ErrorCode::E1005, message, &error.offending);
    }

    fn report_unwanted_token<S: TokenStream>(&mut self, rec: &mut Recognizer<S>) {
        if self.recovering {
            return;
        }
        self.begin_error_condition();
        let token = rec.current_token();
        let message = format!(
            "extraneous input {} expecting {}",
            token.error_display(rec.vocabulary()),
            rec.expected_tokens().format_expected(rec.vocabulary())
        );
        rec.notify_error(ErrorCode::E1003, message, &token);
    }

    fn report_missing_token<S: TokenStream>(&mut self, rec: &mut Recognizer<S>) {
        if self.recovering {
            return;
        }
        self.begin_error_condition();
        let token = rec.current_token();
        let message = format!(
            "missing {} at {}",
            rec.expected_tokens().format_expected(rec.vocabulary()),
            token.error_display(rec.vocabulary())
        );
        rec.notify_error(ErrorCode::E1004, message, &token);
    }

    /// If the token after the current one is what we expect, the current
    /// one is extra: report it, drop it, and return the expected token.
    fn single_token_deletion<S: TokenStream>(&mut self, rec: &mut Recognizer<S>) -> Option<Token> {
        let next = rec.la(2);
        if !rec.expected_tokens().contains(next) {
            return None;
        }
        self.report_unwanted_token(rec);
        let dropped = rec.consume_token(self.recovering);
        debug!(index = ?dropped.index, "deleted extraneous token");
        let matched = rec.current_token();
        self.report_match(rec);
        Some(matched)
    }

    /// If the current token is what would follow the expected one, the
    /// expected one is missing.
    fn single_token_insertion<S: TokenStream>(&mut self, rec: &mut Recognizer<S>) -> bool {
        let current = rec.la(1);
        let Some(state) = rec.state() else {
            return false;
        };
        let atn = rec.atn();
        let Some(next) = atn.state(state).transitions.first().map(|t| t.target) else {
            return false;
        };
        let follow = rec.follow_chain(rec.context());
        if rec.atn().next_tokens_in_context(next, &follow).contains(current) {
            self.report_missing_token(rec);
            return true;
        }
        false
    }

    fn missing_symbol<S: TokenStream>(&self, rec: &mut Recognizer<S>) -> Token {
        let expected = rec.expected_tokens().min_element().unwrap_or(TokenType::INVALID);
        let text = if expected.is_eof() {
            "<missing EOF>".to_owned()
        } else {
            format!("<missing {}>", rec.vocabulary().display_name(expected))
        };
        let mut near = rec.current_token();
        if near.kind.is_eof() {
            if let Some(previous) = rec.input_mut().lt(-1) {
                near = previous.clone();
            }
        }
        debug!(kind = ?expected, line = near.line, column = near.column, "conjured missing token");
        Token::conjured(expected, text, &near)
    }

    /// Consume tokens until one in `set` (or EOF) is current.
    fn consume_until<S: TokenStream>(&self, rec: &mut Recognizer<S>, set: &TokenSet) {
        let mut skipped = 0usize;
        let mut t = rec.la(1);
        while !t.is_eof() && !set.contains(t) {
            rec.consume_token(self.recovering);
            skipped += 1;
            t = rec.la(1);
        }
        if skipped > 0 {
            debug!(skipped, resume = ?t, "resynchronized");
        }
    }

    fn mismatch_at_sync_point<S: TokenStream>(&self, rec: &mut Recognizer<S>) -> RecognitionError {
        match self.next_tokens {
            Some((ctx, state)) => RecognitionError {
                kind: RecognitionErrorKind::InputMismatch,
                offending: rec.current_token(),
                state: Some(state),
                ctx,
                expected: rec.expected_tokens_at(Some(state), ctx),
            },
            None => rec.input_mismatch(),
        }
    }
}

impl<S: TokenStream> ErrorStrategy<S> for DefaultErrorStrategy {
    fn reset(&mut self, _rec: &mut Recognizer<S>) {
        self.end_error_condition();
        self.next_tokens = None;
    }

    fn report_error(&mut self, rec: &mut Recognizer<S>, error: &RecognitionError) {
        if self.recovering {
            return;
        }
        self.begin_error_condition();
        match &error.kind {
            RecognitionErrorKind::NoViableAlt { start, .. } => {
                self.report_no_viable_alternative(rec, error, start);
            }
            RecognitionErrorKind::InputMismatch => self.report_input_mismatch(rec, error),
            RecognitionErrorKind::FailedPredicate { predicate, .. } => {
                self.report_failed_predicate(rec, error, predicate);
            }
        }
    }

    fn recover(&mut self, rec: &mut Recognizer<S>, _error: &RecognitionError) -> Result<(), ParseFailure> {
        let index = rec.input_index();
        if self.last_error_index == Some(index)
            && rec.state().is_some_and(|s| self.last_error_states.contains(&s))
        {
            // Second failure at the same token from the same state: the
            // token is in the recovery set, so resynchronizing alone would
            // not move.
            debug!(index, "forced progress past repeated error");
            rec.consume_token(self.recovering);
        }
        self.last_error_index = Some(rec.input_index());
        if let Some(state) = rec.state() {
            self.last_error_states.push(state);
        }
        let follow = rec.error_recovery_set();
        self.consume_until(rec, &follow);
        Ok(())
    }

    fn recover_inline(&mut self, rec: &mut Recognizer<S>) -> Result<Token, ParseFailure> {
        if let Some(matched) = self.single_token_deletion(rec) {
            rec.consume_token(self.recovering);
            return Ok(matched);
        }
        if self.single_token_insertion(rec) {
            return Ok(self.missing_symbol(rec));
        }
        Err(self.mismatch_at_sync_point(rec).into())
    }

    fn sync(&mut self, rec: &mut Recognizer<S>) -> Result<(), ParseFailure> {
        if self.recovering {
            return Ok(());
        }
        let Some(state) = rec.state() else {
            return Ok(());
        };
        let la = rec.la(1);
        let next = rec.atn().next_tokens(state);
        if next.contains(la) {
            self.next_tokens = None;
            return Ok(());
        }
        if next.contains(TokenType::EPSILON) {
            if self.next_tokens.is_none() {
                self.next_tokens = Some((rec.context(), state));
            }
            return Ok(());
        }

        match rec.atn().state(state).kind {
            StateKind::BlockStart
            | StateKind::StarBlockStart
            | StateKind::PlusBlockStart
            | StateKind::StarLoopEntry => {
                if self.single_token_deletion(rec).is_some() {
                    return Ok(());
                }
                // Nothing can start any alternative here.
                let decision = rec.atn().state(state).decision;
                let error = match decision {
                    Some(decision) => {
                        let start = rec.current_token();
                        rec.recognition_error(RecognitionErrorKind::NoViableAlt { decision, start })
                    }
                    None => rec.input_mismatch(),
                };
                Err(error.into())
            }
            StateKind::PlusLoopBack | StateKind::StarLoopBack => {
                self.report_unwanted_token(rec);
                let mut resume = rec.expected_tokens();
                resume.union_with(&rec.error_recovery_set());
                self.consume_until(rec, &resume);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn report_match(&mut self, _rec: &mut Recognizer<S>) {
        self.end_error_condition();
    }

    fn in_error_recovery_mode(&self) -> bool {
        self.recovering
    }
}

/// `'text'` with line breaks and tabs made visible.
fn quote_escaped(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    for c in text.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}
