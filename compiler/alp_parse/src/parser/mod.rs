//! Rule invocation runtime.
//!
//! [`Recognizer`] owns everything a parse mutates: the token stream, the
//! context arena, the current ATN state, the precedence stack of active
//! left-recursive invocations, and the errors reported so far. [`Parser`]
//! pairs it with an [`ErrorStrategy`] and is what rule methods (hand
//! written, generated, or the [`ParserInterpreter`](crate::ParserInterpreter))
//! drive.
//!
//! Rule methods return `Result<_, ParseFailure>`. A recoverable
//! [`RecognitionError`] travels with `?` up to the nearest
//! [`Parser::with_rule`] boundary, which reports it, resynchronizes, and
//! lets the caller carry on. Fatal failures pass every boundary untouched,
//! each boundary still closing its invocation on the way out.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use alp_atn::{Atn, DecisionId, RuleId, StateId};
use alp_diagnostic::{Diagnostic, DiagnosticConfig, DiagnosticQueue, ErrorCode};
use alp_ir::{Token, TokenSet, TokenStream, TokenType, Vocabulary};
use alp_stack::{ensure_sufficient_stack, DepthLimit};
use rustc_hash::FxHashSet;
use tracing::{debug, trace};

use crate::prediction::{NoViableAlt, Simulator};
use crate::{
    ContextArena, ContextId, DefaultErrorStrategy, Engine, ErrorListener, ErrorStrategy, NoHooks,
    ParseChild, ParseError, ParseFailure, ParserConfig, RecognitionError, RecognitionErrorKind,
    RuleNode, SemanticHooks, StreamRewind,
};

/// Parse state shared by rule methods and the error strategy.
pub struct Recognizer<S> {
    engine: Engine,
    pub(crate) input: S,
    pub(crate) arena: ContextArena,
    pub(crate) ctx: Option<ContextId>,
    pub(crate) state: Option<StateId>,
    /// Precedence of each active left-recursive invocation; bottom is 0.
    precedence_stack: Vec<i32>,
    depth: DepthLimit,
    config: ParserConfig,
    hooks: Arc<dyn SemanticHooks>,
    listeners: Vec<Box<dyn ErrorListener>>,
    errors: Vec<ParseError>,
    /// (code, token index) of every error reported so far.
    reported: FxHashSet<(ErrorCode, Option<usize>)>,
    matched_eof: bool,
}

impl<S: TokenStream> Recognizer<S> {
    pub fn new(engine: Engine, input: S, config: ParserConfig) -> Self {
        Recognizer {
            engine,
            input,
            arena: ContextArena::new(),
            ctx: None,
            state: None,
            precedence_stack: vec![0],
            depth: DepthLimit::new(config.max_rule_depth),
            config,
            hooks: Arc::new(NoHooks),
            listeners: Vec::new(),
            errors: Vec::new(),
            reported: FxHashSet::default(),
            matched_eof: false,
        }
    }

    #[inline]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    #[inline]
    pub fn atn(&self) -> &Atn {
        self.engine.atn()
    }

    #[inline]
    pub fn vocabulary(&self) -> &Vocabulary {
        self.engine.vocabulary()
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn input(&self) -> &S {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut S {
        &mut self.input
    }

    pub fn arena(&self) -> &ContextArena {
        &self.arena
    }

    /// Innermost active invocation.
    pub fn context(&self) -> Option<ContextId> {
        self.ctx
    }

    pub fn state(&self) -> Option<StateId> {
        self.state
    }

    pub fn set_state(&mut self, state: StateId) {
        self.state = Some(state);
    }

    pub fn set_hooks(&mut self, hooks: impl SemanticHooks + 'static) {
        self.hooks = Arc::new(hooks);
    }

    pub fn set_shared_hooks(&mut self, hooks: Arc<dyn SemanticHooks>) {
        self.hooks = hooks;
    }

    pub fn hooks(&self) -> &Arc<dyn SemanticHooks> {
        &self.hooks
    }

    pub fn add_error_listener(&mut self, listener: impl ErrorListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn remove_error_listeners(&mut self) {
        self.listeners.clear();
    }

    /// Errors reported so far, in report order.
    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    pub fn number_of_syntax_errors(&self) -> usize {
        self.errors.len()
    }

    /// Reported errors as diagnostics, sorted by position.
    pub fn diagnostics(&self, config: DiagnosticConfig) -> Vec<Diagnostic> {
        collect_diagnostics(&self.errors, config)
    }

    /// Has `EOF` been matched explicitly?
    pub fn matched_eof(&self) -> bool {
        self.matched_eof
    }

    #[inline]
    pub fn la(&mut self, k: isize) -> TokenType {
        self.input.la(k)
    }

    /// `LT(1)`, or a synthetic EOF if the stream has nothing there.
    pub fn current_token(&mut self) -> Token {
        self.input.lt(1).cloned().unwrap_or_else(Token::eof)
    }

    pub fn input_index(&self) -> usize {
        self.input.index()
    }

    /// Precedence floor of the innermost left-recursive invocation.
    pub fn precedence(&self) -> i32 {
        self.precedence_stack.last().copied().unwrap_or(0)
    }

    /// May an operator of level `min` extend the current left-recursive
    /// invocation?
    pub fn precedence_permits(&self, min: i32) -> bool {
        min >= self.precedence()
    }

    #[inline]
    pub fn precpred(&self, min: i32) -> bool {
        self.precedence_permits(min)
    }

    pub fn sempred(&self, rule: RuleId, index: u32) -> bool {
        self.hooks.sempred(&self.arena, self.ctx, rule, index)
    }

    pub fn action(&self, rule: RuleId, index: u32) {
        self.hooks.action(&self.arena, self.ctx, rule, index);
    }

    /// Rule names of the active invocations, innermost first.
    pub fn rule_invocation_stack(&self) -> Vec<String> {
        match self.ctx {
            Some(ctx) => self.arena.rule_invocation_stack(ctx, &self.atn().rule_names()),
            None => Vec::new(),
        }
    }

    /// Return states of the invocations enclosing `ctx`, innermost first.
    pub(crate) fn follow_chain(&self, ctx: Option<ContextId>) -> Vec<StateId> {
        let Some(ctx) = ctx else {
            return Vec::new();
        };
        let atn = self.atn();
        self.arena
            .ancestors(ctx)
            .map_while(|c| self.arena.get(c).invoking_state)
            .filter_map(|s| atn.follow_state_of(s))
            .collect()
    }

    /// Tokens acceptable at the current state and context.
    pub fn expected_tokens(&self) -> TokenSet {
        self.expected_tokens_at(self.state, self.ctx)
    }

    pub(crate) fn expected_tokens_at(&self, state: Option<StateId>, ctx: Option<ContextId>) -> TokenSet {
        match state {
            Some(state) => self.atn().expected_tokens(state, &self.follow_chain(ctx)),
            None => TokenSet::new(),
        }
    }

    /// Union of what may follow each active invocation; where error
    /// recovery resynchronizes.
    pub(crate) fn error_recovery_set(&self) -> TokenSet {
        let atn = self.atn();
        let mut set = TokenSet::new();
        for ret in self.follow_chain(self.ctx) {
            set.union_with(atn.next_tokens(ret));
        }
        set.remove(TokenType::EPSILON);
        set
    }

    /// Consume the current token, attaching it to the innermost invocation
    /// as an error node when `in_recovery`.
    pub(crate) fn consume_token(&mut self, in_recovery: bool) -> Token {
        let token = self.current_token();
        if !token.kind.is_eof() {
            self.input.consume();
        }
        if let Some(ctx) = self.ctx {
            if in_recovery {
                self.arena.add_child(ctx, ParseChild::Error(token.clone()));
            } else if self.config.build_parse_trees {
                self.arena.add_child(ctx, ParseChild::Token(token.clone()));
            }
        }
        token
    }

    pub(crate) fn add_error_node(&mut self, token: Token) {
        if let Some(ctx) = self.ctx {
            self.arena.add_child(ctx, ParseChild::Error(token));
        }
    }

    fn enter_depth(&mut self, rule: RuleId) -> Result<(), ParseFailure> {
        self.depth
            .enter()
            .map(|_| ())
            .map_err(|e| ParseFailure::RecursionDepthExceeded {
                rule: self.atn().rule(rule).name.clone(),
                limit: e.limit,
            })
    }

    fn start_index(&mut self) -> Option<usize> {
        self.input.lt(1).and_then(|t| t.index)
    }

    /// Open an invocation of `rule` below the current one.
    pub fn enter_rule(&mut self, rule: RuleId) -> Result<ContextId, ParseFailure> {
        self.enter_depth(rule)?;
        let mut node = RuleNode::new(rule, self.ctx, self.ctx.and(self.state));
        node.start = self.start_index();
        let id = self.arena.alloc(node);
        if let Some(parent) = self.ctx {
            self.arena.add_child(parent, ParseChild::Rule(id));
        }
        self.ctx = Some(id);
        self.state = Some(self.atn().rule_start(rule));
        trace!(rule = %self.atn().rule(rule).name, depth = self.depth.depth(), "enter rule");
        Ok(id)
    }

    /// Close the innermost invocation and return to its caller's state.
    pub fn exit_rule(&mut self) {
        let Some(id) = self.ctx else {
            return;
        };
        let stop = if self.matched_eof {
            self.input.lt(1).and_then(|t| t.index)
        } else {
            self.input.lt(-1).and_then(|t| t.index)
        };
        let node = self.arena.get_mut(id);
        node.stop = stop;
        let (parent, invoking) = (node.parent, node.invoking_state);
        trace!(rule = %self.atn().rule(self.arena.get(id).rule).name, "exit rule");
        self.state = invoking;
        self.ctx = parent;
        self.depth.exit();
    }

    /// Open an invocation of left-recursive `rule` with precedence floor
    /// `precedence`. It is attached to its caller only when unrolled.
    pub fn enter_recursion_rule(&mut self, rule: RuleId, precedence: i32) -> Result<ContextId, ParseFailure> {
        self.enter_depth(rule)?;
        let mut node = RuleNode::new(rule, self.ctx, self.ctx.and(self.state));
        node.precedence = precedence;
        node.start = self.start_index();
        let id = self.arena.alloc(node);
        self.ctx = Some(id);
        self.state = Some(self.atn().rule_start(rule));
        self.precedence_stack.push(precedence);
        trace!(rule = %self.atn().rule(rule).name, precedence, "enter recursion rule");
        Ok(id)
    }

    /// Start another operator iteration: a fresh invocation of `rule` takes
    /// the place of the current one, which becomes its first child and ends
    /// at the last consumed token. `state` is recorded as the old
    /// invocation's invoking state.
    pub fn push_new_recursion_context(&mut self, state: StateId, rule: RuleId) -> Option<ContextId> {
        let previous = self.ctx?;
        let stop = self.input.lt(-1).and_then(|t| t.index);
        self.arena.get_mut(previous).stop = stop;
        let prev = self.arena.get(previous);
        let mut node = RuleNode::new(rule, prev.parent, prev.invoking_state);
        node.precedence = prev.precedence;
        node.start = prev.start;
        node.children.push(ParseChild::Rule(previous));
        let id = self.arena.alloc(node);

        let prev = self.arena.get_mut(previous);
        prev.parent = Some(id);
        prev.invoking_state = Some(state);
        self.ctx = Some(id);
        Some(id)
    }

    /// Close the left-recursive invocation opened by
    /// [`enter_recursion_rule`](Self::enter_recursion_rule), hanging the
    /// outermost iteration under `parent`.
    pub fn unroll_recursion_contexts(&mut self, parent: Option<ContextId>) -> Option<ContextId> {
        if self.precedence_stack.len() > 1 {
            self.precedence_stack.pop();
        }
        let done = self.ctx?;
        let stop = self.input.lt(-1).and_then(|t| t.index);
        let node = self.arena.get_mut(done);
        node.stop = stop;
        node.parent = parent;
        let invoking = node.invoking_state;
        if let Some(p) = parent {
            self.arena.add_child(p, ParseChild::Rule(done));
        }
        self.ctx = parent;
        self.state = invoking;
        self.depth.exit();
        Some(done)
    }

    /// Predict which alternative of `decision` the input continues with.
    ///
    /// The stream is back at the current token afterwards, whatever the
    /// outcome.
    pub fn adaptive_predict(&mut self, decision: DecisionId) -> Result<u32, RecognitionError> {
        let engine = self.engine.clone();
        let Some(dfa) = engine.dfa().get(decision) else {
            let start = self.current_token();
            return Err(self.recognition_error(RecognitionErrorKind::NoViableAlt { decision, start }));
        };
        let atn = engine.atn();
        let rule = atn.state(atn.decision_state(decision)).rule;
        let precedence = if atn.rule(rule).left_recursive {
            self.precedence()
        } else {
            0
        };
        let outcome = {
            let sim = Simulator::new(atn, &self.arena, &*self.hooks, self.ctx, precedence);
            let mut input = StreamRewind::new(&mut self.input);
            sim.adaptive_predict(dfa, &mut *input, self.config.prediction_mode)
        };
        outcome.map_err(|nva| self.no_viable_alt(decision, nva))
    }

    fn no_viable_alt(&mut self, decision: DecisionId, nva: NoViableAlt) -> RecognitionError {
        let start = self.input.get(nva.start_index).cloned().unwrap_or_else(Token::eof);
        let offending = self
            .input
            .get(nva.offending_index)
            .cloned()
            .unwrap_or_else(Token::eof);
        debug!(%decision, start = nva.start_index, offending = nva.offending_index, "no viable alternative");
        RecognitionError {
            kind: RecognitionErrorKind::NoViableAlt { decision, start },
            offending,
            state: self.state,
            ctx: self.ctx,
            expected: self.expected_tokens(),
        }
    }

    /// An error of `kind` at the current token and state.
    pub fn recognition_error(&mut self, kind: RecognitionErrorKind) -> RecognitionError {
        RecognitionError {
            kind,
            offending: self.current_token(),
            state: self.state,
            ctx: self.ctx,
            expected: self.expected_tokens(),
        }
    }

    pub fn input_mismatch(&mut self) -> RecognitionError {
        self.recognition_error(RecognitionErrorKind::InputMismatch)
    }

    pub fn failed_predicate(&mut self, predicate: impl Into<String>) -> RecognitionError {
        let rule = self
            .ctx
            .map_or_else(|| RuleId::new(0), |c| self.arena.get(c).rule);
        self.recognition_error(RecognitionErrorKind::FailedPredicate {
            rule,
            predicate: predicate.into(),
        })
    }

    /// Fail unless an operator of level `min` may extend the current
    /// left-recursive invocation.
    pub fn check_precedence(&mut self, min: i32) -> Result<(), RecognitionError> {
        if self.precedence_permits(min) {
            Ok(())
        } else {
            Err(self.failed_predicate(format!("precpred(_ctx, {min})")))
        }
    }

    /// Record `error` on every invocation from the innermost outwards that
    /// does not already carry one.
    pub(crate) fn record_context_error(&mut self, error: &RecognitionError, all: bool) {
        let Some(ctx) = self.ctx else {
            return;
        };
        let ids: Vec<ContextId> = if all {
            self.arena.ancestors(ctx).collect()
        } else {
            vec![ctx]
        };
        for id in ids {
            let node = self.arena.get_mut(id);
            if node.error.is_none() {
                node.error = Some(error.clone());
            }
        }
    }

    /// Report a syntax error to the listeners, once per (code, token).
    pub fn notify_error(&mut self, code: ErrorCode, message: impl Into<String>, offending: &Token) {
        self.notify(ParseError::new(code, message, offending));
    }

    /// [`notify_error`](Self::notify_error) for an error the caller has
    /// already built.
    pub fn notify(&mut self, error: ParseError) {
        if !self.reported.insert((error.code, error.token_index)) {
            return;
        }
        let error = error.with_context(self.rule_invocation_stack());
        debug!(code = %error.code, index = ?error.token_index, "syntax error: {}", error.message);
        for listener in &mut self.listeners {
            listener.syntax_error(&error);
        }
        self.errors.push(error);
    }

    /// Back to the start of the input with no invocations, errors or
    /// predictions in flight. The DFA cache is kept.
    pub fn reset(&mut self) {
        self.input.seek(0);
        self.arena = ContextArena::new();
        self.ctx = None;
        self.state = None;
        self.precedence_stack = vec![0];
        self.depth.reset();
        self.errors.clear();
        self.reported.clear();
        self.matched_eof = false;
    }
}

pub(crate) fn collect_diagnostics(errors: &[ParseError], config: DiagnosticConfig) -> Vec<Diagnostic> {
    let mut queue = DiagnosticQueue::with_config(config);
    for e in errors {
        queue.add(e.to_diagnostic(), e.line, e.column);
    }
    queue.flush()
}

/// A [`Recognizer`] driven through an [`ErrorStrategy`].
pub struct Parser<S: TokenStream> {
    rec: Recognizer<S>,
    strategy: Box<dyn ErrorStrategy<S>>,
}

impl<S: TokenStream> Deref for Parser<S> {
    type Target = Recognizer<S>;

    fn deref(&self) -> &Recognizer<S> {
        &self.rec
    }
}

impl<S: TokenStream> DerefMut for Parser<S> {
    fn deref_mut(&mut self) -> &mut Recognizer<S> {
        &mut self.rec
    }
}

impl<S: TokenStream> Parser<S> {
    pub fn new(engine: Engine, input: S) -> Self {
        Self::with_config(engine, input, ParserConfig::default())
    }

    pub fn with_config(engine: Engine, input: S, config: ParserConfig) -> Self {
        Parser {
            rec: Recognizer::new(engine, input, config),
            strategy: Box::new(DefaultErrorStrategy::new()),
        }
    }

    pub fn set_error_strategy(&mut self, strategy: impl ErrorStrategy<S> + 'static) {
        self.strategy = Box::new(strategy);
    }

    pub fn recognizer(&self) -> &Recognizer<S> {
        &self.rec
    }

    pub fn into_recognizer(self) -> Recognizer<S> {
        self.rec
    }

    pub fn in_error_recovery_mode(&self) -> bool {
        self.strategy.in_error_recovery_mode()
    }

    /// Consume the current token into the innermost invocation.
    pub fn consume(&mut self) -> Token {
        let in_recovery = self.strategy.in_error_recovery_mode();
        self.rec.consume_token(in_recovery)
    }

    /// Match and consume a token of type `t`, recovering inline if the
    /// current token is something else.
    pub fn match_token(&mut self, t: TokenType) -> Result<Token, ParseFailure> {
        if self.rec.la(1) == t {
            if t.is_eof() {
                self.rec.matched_eof = true;
            }
            self.strategy.report_match(&mut self.rec);
            return Ok(self.consume());
        }
        self.recover_inline()
    }

    /// Match any token in `set`.
    pub fn match_set(&mut self, set: &TokenSet) -> Result<Token, ParseFailure> {
        if set.contains(self.rec.la(1)) {
            self.strategy.report_match(&mut self.rec);
            return Ok(self.consume());
        }
        self.recover_inline()
    }

    /// Match any user token.
    pub fn match_wildcard(&mut self) -> Result<Token, ParseFailure> {
        if self.rec.la(1) >= TokenType::MIN_USER {
            self.strategy.report_match(&mut self.rec);
            return Ok(self.consume());
        }
        self.recover_inline()
    }

    fn recover_inline(&mut self) -> Result<Token, ParseFailure> {
        let token = self.strategy.recover_inline(&mut self.rec)?;
        if token.is_conjured() {
            self.rec.add_error_node(token.clone());
        }
        Ok(token)
    }

    /// Let the strategy check the upcoming token before a decision or loop
    /// iteration.
    pub fn sync(&mut self) -> Result<(), ParseFailure> {
        self.strategy.sync(&mut self.rec)
    }

    /// Run `body` as an invocation of `rule`. A recoverable error inside is
    /// reported and recovered from here; the invocation is always closed.
    pub fn with_rule(
        &mut self,
        rule: RuleId,
        body: impl FnOnce(&mut Self) -> Result<(), ParseFailure>,
    ) -> Result<ContextId, ParseFailure> {
        let ctx = self.rec.enter_rule(rule)?;
        let outcome = ensure_sufficient_stack(|| body(self));
        let outcome = self.handle_failure(outcome);
        self.rec.exit_rule();
        outcome.map(|()| ctx)
    }

    /// Run `body` as a left-recursive invocation of `rule` with precedence
    /// floor `precedence`. Returns the outermost iteration's context.
    pub fn with_recursion_rule(
        &mut self,
        rule: RuleId,
        precedence: i32,
        body: impl FnOnce(&mut Self) -> Result<(), ParseFailure>,
    ) -> Result<ContextId, ParseFailure> {
        let parent = self.rec.ctx;
        let ctx = self.rec.enter_recursion_rule(rule, precedence)?;
        let outcome = ensure_sufficient_stack(|| body(self));
        let outcome = self.handle_failure(outcome);
        let done = self.rec.unroll_recursion_contexts(parent).unwrap_or(ctx);
        outcome.map(|()| done)
    }

    /// Report and recover from a recoverable failure; pass anything else
    /// through.
    pub(crate) fn handle_failure(&mut self, outcome: Result<(), ParseFailure>) -> Result<(), ParseFailure> {
        match outcome {
            Err(ParseFailure::Recognition(e)) => {
                self.rec.record_context_error(&e, false);
                self.strategy.report_error(&mut self.rec, &e);
                self.strategy.recover(&mut self.rec, &e)
            }
            other => other,
        }
    }

    /// Back to the start of the input; see [`Recognizer::reset`].
    pub fn reset(&mut self) {
        self.rec.reset();
        self.strategy.reset(&mut self.rec);
    }

    /// Finish the parse rooted at `root`.
    pub fn finish(self, root: ContextId) -> ParseResult {
        ParseResult {
            engine: self.rec.engine,
            arena: self.rec.arena,
            root,
            errors: self.rec.errors,
        }
    }
}

/// A finished parse: the context tree and every reported error.
#[derive(Debug)]
pub struct ParseResult {
    engine: Engine,
    pub arena: ContextArena,
    pub root: ContextId,
    pub errors: Vec<ParseError>,
}

impl ParseResult {
    pub fn root(&self) -> &RuleNode {
        self.arena.get(self.root)
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// LISP-style rendering of the tree.
    pub fn to_string_tree(&self) -> String {
        self.arena
            .to_string_tree(self.root, &self.engine.rule_names(), self.engine.vocabulary())
    }

    /// Source text the tree covers.
    pub fn text(&self) -> String {
        self.arena.text(self.root)
    }

    /// Reported errors as diagnostics, sorted by position.
    pub fn diagnostics(&self, config: DiagnosticConfig) -> Vec<Diagnostic> {
        collect_diagnostics(&self.errors, config)
    }
}
