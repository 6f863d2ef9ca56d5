//! Adaptive lookahead prediction.
//!
//! Picks the alternative of a decision by running every alternative of the
//! ATN ahead of the input in lock step, one token at a time, until only one
//! alternative survives. Context-free (SLL) steps are recorded in the
//! decision's [`Dfa`] so later predictions over the same lookahead walk a
//! table instead of the graph. When SLL cannot separate two alternatives
//! the decision is re-simulated with the live rule invocation stack (LL).
//!
//! Ties always go to the lowest-numbered alternative.

mod config;

use std::sync::Arc;

use alp_atn::{Atn, DecisionId, RuleId, StateId, TransitionKind};
use alp_ir::{TokenStream, TokenType};
use rustc_hash::FxHashSet;
use tracing::{debug, trace};

pub use config::{
    AltSet, AtnConfig, ConfigKey, ConfigSet, ConfigSignature, Frame, OuterContext, PredictionStack,
};

use crate::dfa::{Dfa, DfaState, Edge};
use crate::{ContextArena, ContextId, PredictionMode, SemanticHooks};

/// Where prediction gave up: the token the decision started at and the one
/// no alternative could take.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) struct NoViableAlt {
    pub start_index: usize,
    pub offending_index: usize,
}

/// Everything a simulation reads besides the token stream.
pub(crate) struct Simulator<'a> {
    atn: &'a Atn,
    arena: &'a ContextArena,
    hooks: &'a dyn SemanticHooks,
    /// Invocation the decision is made in.
    ctx: Option<ContextId>,
    /// Precedence floor of that invocation.
    precedence: i32,
}

type Busy = FxHashSet<(ConfigKey, u32)>;

impl<'a> Simulator<'a> {
    pub(crate) fn new(
        atn: &'a Atn,
        arena: &'a ContextArena,
        hooks: &'a dyn SemanticHooks,
        ctx: Option<ContextId>,
        precedence: i32,
    ) -> Self {
        Simulator {
            atn,
            arena,
            hooks,
            ctx,
            precedence,
        }
    }

    /// Predict the alternative of `decision` for the input at the stream's
    /// current position. The stream is left wherever simulation stopped;
    /// callers rewind it.
    #[tracing::instrument(level = "trace", skip_all, fields(decision = %dfa.decision()))]
    pub(crate) fn adaptive_predict<S: TokenStream + ?Sized>(
        &self,
        dfa: &Dfa,
        input: &mut S,
        mode: PredictionMode,
    ) -> Result<u32, NoViableAlt> {
        let start_index = input.index();
        let s0 = if let Some(s0) = dfa.start_state(self.precedence) {
            dfa.record_hit();
            s0
        } else {
            dfa.record_miss();
            let configs = self.start_configs(dfa.decision(), false);
            if configs.is_predicated() {
                Arc::new(DfaState::transient(configs, None, false))
            } else {
                let s0 = dfa.add_state(configs, None, false);
                dfa.set_start_state(self.precedence, &s0);
                s0
            }
        };
        self.exec_atn(dfa, s0, input, start_index, mode)
    }

    fn exec_atn<S: TokenStream + ?Sized>(
        &self,
        dfa: &Dfa,
        s0: Arc<DfaState>,
        input: &mut S,
        start_index: usize,
        mode: PredictionMode,
    ) -> Result<u32, NoViableAlt> {
        let mut previous = s0;
        let mut t = input.la(1);
        loop {
            let target = match dfa.edge(&previous, t) {
                Some(Edge::Target(id)) => match dfa.state(id) {
                    Some(d) => {
                        dfa.record_hit();
                        Some(d)
                    }
                    None => self.compute_target(dfa, &previous, t),
                },
                Some(Edge::Error) => {
                    dfa.record_hit();
                    None
                }
                None => self.compute_target(dfa, &previous, t),
            };

            let Some(d) = target else {
                let offending_index = input.index();
                if let Some(alt) = previous.configs.min_finished_alt(self.atn) {
                    return Ok(alt);
                }
                return Err(NoViableAlt {
                    start_index,
                    offending_index,
                });
            };

            if d.requires_full_context && mode == PredictionMode::Ll {
                debug!(
                    decision = %dfa.decision(),
                    alts = ?d.configs.alts(),
                    "SLL conflict, retrying with full context"
                );
                input.seek(start_index);
                let s0 = self.start_configs(dfa.decision(), true);
                return self.exec_full_context(dfa.decision(), s0, input, start_index);
            }
            if let Some(alt) = d.prediction {
                trace!(alt, lookahead = input.index() - start_index + 1, "predicted");
                return Ok(alt);
            }

            previous = d;
            if t != TokenType::EOF {
                input.consume();
                t = input.la(1);
            }
        }
    }

    /// Compute and record the DFA state reached from `previous` on `t`.
    /// `None` means no configuration can take `t`.
    fn compute_target(&self, dfa: &Dfa, previous: &DfaState, t: TokenType) -> Option<Arc<DfaState>> {
        dfa.record_miss();
        let reach = self.compute_reach(&previous.configs, t, false);
        if reach.is_empty() {
            dfa.add_edge(previous, t, Edge::Error);
            return None;
        }

        let (prediction, requires_full_context) = if let Some(alt) = reach.unique_alt() {
            (Some(alt), false)
        } else if reach.has_sll_conflict_terminating(self.atn) {
            (reach.alts().min_alt(), true)
        } else {
            (None, false)
        };

        if reach.is_predicated() || previous.id.is_none() {
            return Some(Arc::new(DfaState::transient(reach, prediction, requires_full_context)));
        }
        let d = dfa.add_state(reach, prediction, requires_full_context);
        if let Some(id) = d.id {
            dfa.add_edge(previous, t, Edge::Target(id));
        }
        Some(d)
    }

    /// Re-simulate with the live invocation stack. Nothing here is cached.
    fn exec_full_context<S: TokenStream + ?Sized>(
        &self,
        decision: DecisionId,
        s0: ConfigSet,
        input: &mut S,
        start_index: usize,
    ) -> Result<u32, NoViableAlt> {
        let mut previous = s0;
        let mut t = input.la(1);
        loop {
            let reach = self.compute_reach(&previous, t, true);
            if reach.is_empty() {
                let offending_index = input.index();
                if let Some(alt) = previous.min_finished_alt(self.atn) {
                    return Ok(alt);
                }
                return Err(NoViableAlt {
                    start_index,
                    offending_index,
                });
            }
            if let Some(alt) = reach.unique_alt() {
                return Ok(alt);
            }
            if let Some(alt) = reach.single_viable_alt() {
                if reach.entries().any(|(_, alts)| alts.len() > 1) {
                    debug!(%decision, alts = ?reach.alts(), alt, "ambiguity resolved to lowest alternative");
                }
                return Ok(alt);
            }
            if t == TokenType::EOF {
                let alt = reach.alts().min_alt().unwrap_or(1);
                debug!(%decision, alts = ?reach.alts(), alt, "ambiguous at end of input");
                return Ok(alt);
            }
            previous = reach;
            input.consume();
            t = input.la(1);
        }
    }

    /// Closure of one configuration per alternative of `decision`.
    pub(crate) fn start_configs(&self, decision: DecisionId, full: bool) -> ConfigSet {
        let p = self.atn.decision_state(decision);
        let state = self.atn.state(p);
        let mut set = ConfigSet::new();
        let mut busy = Busy::default();
        for (i, t) in state.transitions.iter().enumerate() {
            let origin = AtnConfig {
                key: ConfigKey::new(p, self.precedence),
                alt: i as u32 + 1,
            };
            if let Some(next) = self.follow_edge(&origin, t.target, &t.kind, &mut set) {
                self.closure(next, &mut set, &mut busy, full);
            }
        }
        if state.precedence_decision && !full {
            set = set.precedence_filter();
        }
        set
    }

    /// Configurations reached by consuming `t` from `closure`, closed.
    pub(crate) fn compute_reach(&self, closure: &ConfigSet, t: TokenType, full: bool) -> ConfigSet {
        let mut reach = ConfigSet::new();
        let mut busy = Busy::default();
        let mut finished = Vec::new();
        let max = self.atn.max_token_type();

        for (key, alt) in closure.configs() {
            let state = self.atn.state(key.state);
            if state.is_rule_stop() {
                if t == TokenType::EOF {
                    finished.push((key.clone(), alt));
                }
                continue;
            }
            for tr in &state.transitions {
                if tr.matches(t, TokenType::MIN_USER, max) {
                    let next = AtnConfig {
                        key: key.moved(tr.target),
                        alt,
                    };
                    self.closure(next, &mut reach, &mut busy, full);
                }
            }
        }
        for (key, alt) in finished {
            reach.add(key, alt);
        }
        if closure.is_predicated() {
            reach.mark_predicated();
        }
        if t == TokenType::EOF {
            let atn = self.atn;
            reach.retain_states(|s| atn.state(s).is_rule_stop());
        }
        reach
    }

    /// Add everything reachable from `seed` without consuming.
    fn closure(&self, seed: AtnConfig, set: &mut ConfigSet, busy: &mut Busy, full: bool) {
        let mut work = vec![seed];
        while let Some(config) = work.pop() {
            if !busy.insert((config.key.clone(), config.alt)) {
                continue;
            }
            let state = self.atn.state(config.key.state);
            if state.is_rule_stop() {
                self.leave_rule(config, state.rule, set, &mut work, full);
                continue;
            }
            if state.is_consuming() {
                set.add(config.key.clone(), config.alt);
                continue;
            }
            for t in &state.transitions {
                if let Some(next) = self.follow_edge(&config, t.target, &t.kind, set) {
                    work.push(next);
                }
            }
        }
    }

    /// Take one non-consuming edge, or `None` if it is blocked or consumes.
    fn follow_edge(
        &self,
        config: &AtnConfig,
        target: StateId,
        kind: &TransitionKind,
        set: &mut ConfigSet,
    ) -> Option<AtnConfig> {
        let key = &config.key;
        let moved = || AtnConfig {
            key: key.moved(target),
            alt: config.alt,
        };
        match kind {
            TransitionKind::Epsilon | TransitionKind::Action { .. } => Some(moved()),
            TransitionKind::Rule {
                follow, precedence, ..
            } => {
                let mut stack = key.stack.clone();
                stack.push(Frame {
                    return_state: *follow,
                    precedence: key.precedence,
                });
                Some(AtnConfig {
                    key: ConfigKey {
                        state: target,
                        precedence: *precedence,
                        stack,
                        outer: key.outer,
                    },
                    alt: config.alt,
                })
            }
            TransitionKind::Precedence(level) => (*level >= key.precedence).then(moved),
            TransitionKind::Predicate {
                rule,
                index,
                context_dependent,
            } => {
                let local = key.in_decision_invocation();
                if *context_dependent && !local {
                    // Outside the decision's invocation the context the
                    // predicate needs is unknown; assume it holds.
                    return Some(moved());
                }
                set.mark_predicated();
                let ctx = if local { self.ctx } else { None };
                self.hooks
                    .sempred(self.arena, ctx, *rule, *index)
                    .then(moved)
            }
            _ => None,
        }
    }

    /// Continue a configuration that reached the end of `rule`.
    fn leave_rule(
        &self,
        config: AtnConfig,
        rule: RuleId,
        set: &mut ConfigSet,
        work: &mut Vec<AtnConfig>,
        full: bool,
    ) {
        let AtnConfig { mut key, alt } = config;
        if let Some(frame) = key.stack.pop() {
            key.state = frame.return_state;
            key.precedence = frame.precedence;
            work.push(AtnConfig { key, alt });
            return;
        }

        if !full {
            let follow = self.atn.rule_follow_states(rule);
            if follow.is_empty() {
                set.add(key, alt);
                return;
            }
            let left_recursive = self.atn.rule(rule).left_recursive;
            for &state in follow {
                let outer = if left_recursive && self.atn.return_precedence(state) == Some(0) {
                    OuterContext::OutermostFollow
                } else {
                    OuterContext::Follow
                };
                work.push(AtnConfig {
                    key: ConfigKey {
                        state,
                        precedence: 0,
                        stack: PredictionStack::new(),
                        outer,
                    },
                    alt,
                });
            }
            return;
        }

        let current = match key.outer {
            OuterContext::Local => self.ctx,
            OuterContext::Invocation(c) => Some(c),
            OuterContext::Follow | OuterContext::OutermostFollow | OuterContext::Root => None,
        };
        let returned = current.and_then(|c| {
            let node = self.arena.get(c);
            let parent = node.parent?;
            let ret = self.atn.follow_state_of(node.invoking_state?)?;
            Some(ConfigKey {
                state: ret,
                precedence: self.arena.get(parent).precedence,
                stack: PredictionStack::new(),
                outer: OuterContext::Invocation(parent),
            })
        });
        match returned {
            Some(next) => work.push(AtnConfig { key: next, alt }),
            None => {
                key.outer = OuterContext::Root;
                set.add(key, alt);
            }
        }
    }
}

#[cfg(test)]
mod tests;
