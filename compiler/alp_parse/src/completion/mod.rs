//! Code-completion candidates from the grammar.
//!
//! [`CodeCompletionCore`] walks the ATN over the tokens before a caret and
//! collects what could come next there: token types, each with the fixed
//! run of tokens that must follow it, and *preferred rules*, which stand in
//! for the tokens they would contribute (an `identifier` rule is more
//! useful to an editor than the `ID` token it matches).
//!
//! The walk is independent of any parse. It visits every path the grammar
//! allows instead of predicting one, memoizes rule entries by input
//! position, and uses the per-rule follow sets cached on the [`Engine`] to
//! skip rules that cannot match the next token.
//!
//! # Example
//! ```text
//! let core = engine.completion().with_options(
//!     CompletionOptions::default()
//!         .with_ignored_tokens([plus, minus])
//!         .with_preferred_rules([variable_ref, function_ref]),
//! );
//! let candidates = core.collect_candidates(&tokens, caret, None);
//! ```

mod follow;

pub use follow::{FollowSetWithPath, FollowSets};

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use alp_atn::{RuleId, StateId, StateKind, TransitionKind};
use alp_ir::{TokenStream, TokenType, DEFAULT_CHANNEL};
use alp_stack::ensure_sufficient_stack;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace};

use crate::{ContextArena, ContextId, Engine, NoHooks, SemanticHooks};

/// A preferred rule found at the caret.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CandidateRule {
    /// Stream index of the token the rule would start at.
    pub start_token_index: usize,
    /// Rules invoked on the way to it, outermost first.
    pub rule_list: Vec<RuleId>,
}

/// What [`CodeCompletionCore::collect_candidates`] found.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CandidatesCollection {
    /// Candidate token → tokens that must directly follow it.
    pub tokens: BTreeMap<TokenType, Vec<TokenType>>,
    pub rules: BTreeMap<RuleId, CandidateRule>,
    /// The run was cancelled or timed out; the candidates are partial.
    pub cancelled: bool,
}

/// Tailors what [`CodeCompletionCore`] reports.
#[derive(Clone, Default)]
pub struct CompletionOptions {
    /// Tokens never reported as candidates.
    pub ignored_tokens: FxHashSet<TokenType>,
    /// Rules reported in place of the tokens they contain.
    pub preferred_rules: FxHashSet<RuleId>,
    /// With nested preferred rules on the call stack, report the innermost
    /// one instead of the outermost.
    pub translate_rules_top_down: bool,
    pub timeout: Option<Duration>,
    /// Checked while walking; setting it stops the run.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl CompletionOptions {
    #[must_use]
    pub fn with_ignored_tokens(mut self, tokens: impl IntoIterator<Item = TokenType>) -> Self {
        self.ignored_tokens.extend(tokens);
        self
    }

    #[must_use]
    pub fn with_preferred_rules(mut self, rules: impl IntoIterator<Item = RuleId>) -> Self {
        self.preferred_rules.extend(rules);
        self
    }

    #[must_use]
    pub fn with_translate_rules_top_down(mut self, top_down: bool) -> Self {
        self.translate_rules_top_down = top_down;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

impl fmt::Debug for CompletionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionOptions")
            .field("ignored_tokens", &self.ignored_tokens)
            .field("preferred_rules", &self.preferred_rules)
            .field("translate_rules_top_down", &self.translate_rules_top_down)
            .field("timeout", &self.timeout)
            .field("cancellable", &self.cancel.is_some())
            .finish()
    }
}

/// Collects completion candidates for a caret position.
///
/// Cheap to create; keep one per engine and reuse it for every request.
/// Follow sets computed by any instance are shared through the engine.
pub struct CodeCompletionCore {
    engine: Engine,
    hooks: Arc<dyn SemanticHooks>,
    options: CompletionOptions,
}

impl CodeCompletionCore {
    pub fn new(engine: Engine) -> Self {
        CodeCompletionCore {
            engine,
            hooks: Arc::new(NoHooks),
            options: CompletionOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    /// Predicates met during the walk are evaluated with these hooks and no
    /// rule context.
    #[must_use]
    pub fn with_hooks(mut self, hooks: impl SemanticHooks + 'static) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    #[must_use]
    pub fn with_shared_hooks(mut self, hooks: Arc<dyn SemanticHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn options(&self) -> &CompletionOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut CompletionOptions {
        &mut self.options
    }

    /// Candidates for the token at stream index `caret_token_index`.
    ///
    /// The walk starts at the first rule of the grammar and the first
    /// token, or, given `context`, at that invocation's rule and start
    /// token. A context narrows the search and makes it faster, but misses
    /// whatever only the surrounding rules would allow.
    pub fn collect_candidates<S: TokenStream>(
        &self,
        input: &S,
        caret_token_index: usize,
        context: Option<(&ContextArena, ContextId)>,
    ) -> CandidatesCollection {
        let (start_rule, start_index) = match context {
            Some((arena, ctx)) => {
                let node = arena.get(ctx);
                (node.rule, node.start.unwrap_or(0))
            }
            None => (RuleId::new(0), 0),
        };
        if self.engine.atn().num_rules() == 0 {
            return CandidatesCollection::default();
        }

        let tokens = visible_tokens(input, start_index, caret_token_index);
        if tokens.is_empty() {
            return CandidatesCollection::default();
        }

        let started = Instant::now();
        let mut walk = CandidateWalk {
            engine: &self.engine,
            hooks: self.hooks.as_ref(),
            options: &self.options,
            empty: ContextArena::new(),
            tokens,
            shortcuts: FxHashMap::default(),
            precedence_stack: Vec::new(),
            candidates: CandidatesCollection::default(),
            states_processed: 0,
            deadline: self.options.timeout.map(|t| started + t),
        };
        let mut call_stack = Vec::new();
        walk.process_rule(start_rule, 0, &mut call_stack, 0);

        debug!(
            rule = %self.engine.atn().rule(start_rule).name,
            caret = caret_token_index,
            states = walk.states_processed,
            tokens = walk.candidates.tokens.len(),
            rules = walk.candidates.rules.len(),
            cancelled = walk.candidates.cancelled,
            elapsed = ?started.elapsed(),
            "collected completion candidates"
        );
        walk.candidates
    }
}

impl fmt::Debug for CodeCompletionCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeCompletionCore")
            .field("engine", &self.engine)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Default-channel tokens from `start` up to the first one at or after
/// `caret` (or EOF), as `(stream index, type)`.
fn visible_tokens<S: TokenStream>(input: &S, start: usize, caret: usize) -> Vec<(usize, TokenType)> {
    let mut tokens = Vec::new();
    let mut offset = start;
    while let Some(token) = input.get(offset) {
        let index = token.index.unwrap_or(offset);
        offset += 1;
        if token.channel == DEFAULT_CHANNEL {
            tokens.push((index, token.kind));
            if index >= caret {
                break;
            }
        }
        if token.kind.is_eof() {
            break;
        }
    }
    tokens
}

#[derive(Copy, Clone, Debug)]
struct RuleWithStartToken {
    rule: RuleId,
    start_token_index: usize,
}

/// State of one `collect_candidates` run.
struct CandidateWalk<'a> {
    engine: &'a Engine,
    hooks: &'a dyn SemanticHooks,
    options: &'a CompletionOptions,
    /// Predicates are evaluated against no context.
    empty: ContextArena,
    tokens: Vec<(usize, TokenType)>,
    /// `(rule, token position)` → token positions the rule can end at.
    shortcuts: FxHashMap<(RuleId, usize), BTreeSet<usize>>,
    precedence_stack: Vec<i32>,
    candidates: CandidatesCollection,
    states_processed: usize,
    deadline: Option<Instant>,
}

impl CandidateWalk<'_> {
    fn should_stop(&mut self) -> bool {
        if self.candidates.cancelled {
            return true;
        }
        let cancelled = self
            .options
            .cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed));
        let timed_out = self.deadline.is_some_and(|d| Instant::now() >= d);
        if cancelled || timed_out {
            debug!(cancelled, timed_out, states = self.states_processed, "completion stopped early");
            self.candidates.cancelled = true;
        }
        self.candidates.cancelled
    }

    fn is_ignored(&self, t: TokenType) -> bool {
        self.options.ignored_tokens.contains(&t)
    }

    /// `following` up to the first ignored token. Cached follow sets keep
    /// the whole run, since ignored tokens differ between completions.
    fn visible_prefix(&self, following: &[TokenType]) -> Vec<TokenType> {
        following
            .iter()
            .copied()
            .take_while(|&t| !self.is_ignored(t))
            .collect()
    }

    fn at_caret(&self, position: usize) -> bool {
        position + 1 >= self.tokens.len()
    }

    /// Walk one rule entered at token position `position` and return every
    /// position it can end at. Empty if the rule cannot match here or the
    /// caret was reached inside it.
    fn process_rule(
        &mut self,
        rule: RuleId,
        position: usize,
        call_stack: &mut Vec<RuleWithStartToken>,
        precedence: i32,
    ) -> BTreeSet<usize> {
        if let Some(ends) = self.shortcuts.get(&(rule, position)) {
            trace!(rule = rule.raw(), position, "shortcut");
            return ends.clone();
        }
        let mut result = BTreeSet::new();
        if self.should_stop() {
            return result;
        }

        let engine = self.engine;
        let atn = engine.atn();
        let follow_sets = engine.follow_sets(rule);
        let (start_token_index, current) = self.tokens[position];
        call_stack.push(RuleWithStartToken {
            rule,
            start_token_index,
        });

        if self.at_caret(position) {
            if self.options.preferred_rules.contains(&rule) {
                self.translate_stack(call_stack);
            } else {
                for set in &follow_sets.sets {
                    let mut full_path = call_stack.clone();
                    full_path.extend(set.path.iter().map(|&rule| RuleWithStartToken {
                        rule,
                        start_token_index,
                    }));
                    if self.translate_stack(&full_path) {
                        continue;
                    }
                    let following = self.visible_prefix(&set.following);
                    for symbol in &set.intervals {
                        if self.is_ignored(symbol) {
                            continue;
                        }
                        match self.candidates.tokens.entry(symbol) {
                            Entry::Vacant(e) => {
                                e.insert(following.clone());
                            }
                            Entry::Occupied(mut e) => {
                                if *e.get() != following {
                                    e.get_mut().clear();
                                }
                            }
                        }
                    }
                }
            }
            if !follow_sets.is_exhaustive {
                // The rule can be passed without consuming; the caller
                // continues with what follows it.
                result.insert(position);
            }
            call_stack.pop();
            return result;
        }

        if follow_sets.is_exhaustive && !follow_sets.combined.contains(current) {
            call_stack.pop();
            return result;
        }

        let precedence_rule = atn.rule(rule).left_recursive;
        if precedence_rule {
            self.precedence_stack.push(precedence);
        }

        let mut pipeline: Vec<(StateId, usize)> = vec![(atn.rule_start(rule), position)];
        while let Some((s, position)) = pipeline.pop() {
            if self.should_stop() {
                break;
            }
            self.states_processed += 1;
            let state = atn.state(s);
            if state.kind == StateKind::RuleStop {
                result.insert(position);
                continue;
            }
            let current = self.tokens[position].1;
            let at_caret = self.at_caret(position);

            for t in &state.transitions {
                match &t.kind {
                    TransitionKind::Rule {
                        rule: callee,
                        follow,
                        precedence,
                    } => {
                        let ends = ensure_sufficient_stack(|| {
                            self.process_rule(*callee, position, call_stack, *precedence)
                        });
                        pipeline.extend(ends.into_iter().map(|end| (*follow, end)));
                    }
                    TransitionKind::Predicate { rule, index, .. } => {
                        if self.hooks.sempred(&self.empty, None, *rule, *index) {
                            pipeline.push((t.target, position));
                        }
                    }
                    TransitionKind::Precedence(level) => {
                        if self.precedence_stack.last().map_or(true, |&p| *level >= p) {
                            pipeline.push((t.target, position));
                        }
                    }
                    TransitionKind::Wildcard => {
                        if !at_caret {
                            pipeline.push((t.target, position + 1));
                        } else if !self.translate_stack(call_stack) {
                            for token in TokenType::MIN_USER.raw()..=atn.max_token_type().raw() {
                                let token = TokenType::new(token);
                                if !self.is_ignored(token) {
                                    self.candidates.tokens.insert(token, Vec::new());
                                }
                            }
                        }
                    }
                    _ if t.is_epsilon() => pipeline.push((t.target, position)),
                    _ => {
                        let Some(label) = t.label(TokenType::MIN_USER, atn.max_token_type()) else {
                            continue;
                        };
                        if label.is_empty() {
                            continue;
                        }
                        if !at_caret {
                            if label.contains(current) {
                                pipeline.push((t.target, position + 1));
                            }
                            continue;
                        }
                        if self.translate_stack(call_stack) {
                            continue;
                        }
                        let sequence = label.len() == 1;
                        for symbol in &label {
                            if self.is_ignored(symbol) {
                                continue;
                            }
                            let following = if sequence {
                                self.visible_prefix(&follow::following_tokens(atn, t.target))
                            } else {
                                Vec::new()
                            };
                            match self.candidates.tokens.entry(symbol) {
                                Entry::Vacant(e) => {
                                    e.insert(following);
                                }
                                Entry::Occupied(mut e) => {
                                    let common = longest_common_prefix(&following, e.get());
                                    e.get_mut().truncate(common);
                                }
                            }
                        }
                    }
                }
            }
        }

        call_stack.pop();
        if precedence_rule {
            self.precedence_stack.pop();
        }
        if !self.candidates.cancelled {
            self.shortcuts.insert((rule, position), result.clone());
        }
        result
    }

    /// Report the first preferred rule on `stack` (outermost first, or
    /// innermost first when translating top-down). Returns whether one was
    /// found.
    fn translate_stack(&mut self, stack: &[RuleWithStartToken]) -> bool {
        if self.options.preferred_rules.is_empty() {
            return false;
        }
        if self.options.translate_rules_top_down {
            (0..stack.len()).rev().any(|i| self.translate_to_rule(i, stack))
        } else {
            (0..stack.len()).any(|i| self.translate_to_rule(i, stack))
        }
    }

    fn translate_to_rule(&mut self, i: usize, stack: &[RuleWithStartToken]) -> bool {
        let RuleWithStartToken {
            rule,
            start_token_index,
        } = stack[i];
        if !self.options.preferred_rules.contains(&rule) {
            return false;
        }
        let path: Vec<RuleId> = stack[..i].iter().map(|r| r.rule).collect();
        let duplicate = self
            .candidates
            .rules
            .get(&rule)
            .is_some_and(|existing| existing.rule_list == path);
        if !duplicate {
            trace!(rule = rule.raw(), "collected rule");
            self.candidates.rules.insert(
                rule,
                CandidateRule {
                    start_token_index,
                    rule_list: path,
                },
            );
        }
        true
    }
}

/// Length of the common prefix of `a` and `b`.
fn longest_common_prefix(a: &[TokenType], b: &[TokenType]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}
