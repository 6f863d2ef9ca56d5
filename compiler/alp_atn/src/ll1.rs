//! LL(1) lookahead sets.
//!
//! Computes which tokens can come next from a state by walking epsilon
//! edges. Rule calls push their return state; at a rule stop the walk
//! pops back into the caller, or, once the pushed frames run out,
//! continues into the caller-supplied context.
//!
//! The context is a slice of return states, innermost first. `None` means
//! "no context": reaching the end of the rule yields
//! [`TokenType::EPSILON`]. An empty slice means the outermost rule is
//! finished, so only [`TokenType::EOF`] can follow.

use alp_ir::{TokenSet, TokenType};
use alp_stack::ensure_sufficient_stack;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use crate::{Atn, RuleId, StateId, TransitionKind};

type Frames = SmallVec<[StateId; 8]>;

impl Atn {
    /// Tokens that can follow `state` under `ctx`.
    ///
    /// Predicates are assumed to pass.
    pub fn look(&self, state: StateId, ctx: Option<&[StateId]>) -> TokenSet {
        let mut walk = LookWalk {
            atn: self,
            out: TokenSet::new(),
            busy: FxHashSet::default(),
            called: FxHashSet::default(),
            pushed: Frames::new(),
        };
        walk.visit(state, ctx);
        walk.out
    }

    /// Tokens that can follow `state` given the active invocations.
    pub fn next_tokens_in_context(&self, state: StateId, follow: &[StateId]) -> TokenSet {
        self.look(state, Some(follow))
    }
}

struct LookWalk<'a> {
    atn: &'a Atn,
    out: TokenSet,
    busy: FxHashSet<(StateId, Frames, Option<usize>)>,
    /// Rules entered on the current path; re-entering one before consuming
    /// would loop.
    called: FxHashSet<RuleId>,
    pushed: Frames,
}

impl LookWalk<'_> {
    fn visit(&mut self, s: StateId, ctx: Option<&[StateId]>) {
        if !self
            .busy
            .insert((s, self.pushed.clone(), ctx.map(<[StateId]>::len)))
        {
            return;
        }

        let atn = self.atn;
        let state = atn.state(s);

        if state.is_rule_stop() {
            if let Some(ret) = self.pushed.pop() {
                let was_called = self.called.remove(&state.rule);
                self.visit(ret, ctx);
                if was_called {
                    self.called.insert(state.rule);
                }
                self.pushed.push(ret);
                return;
            }
            match ctx {
                None => self.out.insert(TokenType::EPSILON),
                Some([]) => self.out.insert(TokenType::EOF),
                Some([ret, rest @ ..]) => {
                    let was_called = self.called.remove(&state.rule);
                    self.visit(*ret, Some(rest));
                    if was_called {
                        self.called.insert(state.rule);
                    }
                }
            }
            return;
        }

        for t in &state.transitions {
            match &t.kind {
                TransitionKind::Rule { rule, follow, .. } => {
                    if !self.called.insert(*rule) {
                        continue;
                    }
                    self.pushed.push(*follow);
                    ensure_sufficient_stack(|| self.visit(t.target, ctx));
                    self.pushed.pop();
                    self.called.remove(rule);
                }
                TransitionKind::Epsilon
                | TransitionKind::Predicate { .. }
                | TransitionKind::Precedence(_)
                | TransitionKind::Action { .. } => self.visit(t.target, ctx),
                _ => {
                    if let Some(label) = t.label(TokenType::MIN_USER, atn.max_token_type()) {
                        self.out.union_with(&label);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests;
