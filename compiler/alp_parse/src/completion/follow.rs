//! Per-rule follow sets for candidate collection.
//!
//! The follow sets of a rule are the tokens it can start with, split by the
//! chain of sub-rules each one is reached through. They depend only on the
//! ATN, so the [`Engine`](crate::Engine) computes them once per rule and
//! shares them between completion runs.

use alp_atn::{Atn, RuleId, StateId, StateKind, TransitionKind};
use alp_ir::{TokenSet, TokenType};
use alp_stack::ensure_sufficient_stack;
use rustc_hash::FxHashSet;

/// Tokens that can start a rule along one path of sub-rule calls.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FollowSetWithPath {
    pub intervals: TokenSet,
    /// Rules entered between the rule start and the matching edge.
    pub path: Vec<RuleId>,
    /// Tokens that must come right after the matching edge in the same
    /// rule.
    pub following: Vec<TokenType>,
}

/// All follow sets of one rule.
#[derive(Clone, Debug, Default)]
pub struct FollowSets {
    pub sets: Vec<FollowSetWithPath>,
    /// Union of every set's tokens, for quick rejection.
    pub combined: TokenSet,
    /// False if the rule can be passed without consuming anything, in which
    /// case whatever follows the rule contributes further tokens.
    pub is_exhaustive: bool,
}

impl FollowSets {
    /// Walk `rule` from its start state up to the first consuming edge on
    /// every path.
    ///
    /// Semantic predicates are assumed to pass: the result is shared by all
    /// runs, whatever hooks they use.
    pub(crate) fn determine(atn: &Atn, rule: RuleId) -> FollowSets {
        let mut walk = FollowWalk {
            atn,
            stop: atn.rule_stop(rule),
            sets: Vec::new(),
            visiting: Vec::new(),
            rule_stack: Vec::new(),
        };
        let is_exhaustive = walk.collect(atn.rule_start(rule));
        let mut combined = TokenSet::new();
        for set in &walk.sets {
            combined.union_with(&set.intervals);
        }
        FollowSets {
            sets: walk.sets,
            combined,
            is_exhaustive,
        }
    }
}

struct FollowWalk<'a> {
    atn: &'a Atn,
    stop: StateId,
    sets: Vec<FollowSetWithPath>,
    visiting: Vec<StateId>,
    rule_stack: Vec<RuleId>,
}

impl FollowWalk<'_> {
    /// Returns whether the walk from `s` always consumed before reaching a
    /// rule end.
    fn collect(&mut self, s: StateId) -> bool {
        if self.visiting.contains(&s) {
            return true;
        }
        let atn = self.atn;
        let state = atn.state(s);
        if s == self.stop || state.kind == StateKind::RuleStop {
            return false;
        }
        self.visiting.push(s);

        let mut exhaustive = true;
        for t in &state.transitions {
            match &t.kind {
                TransitionKind::Rule { rule, follow, .. } => {
                    if self.rule_stack.contains(rule) {
                        continue;
                    }
                    self.rule_stack.push(*rule);
                    let callee_exhaustive = ensure_sufficient_stack(|| self.collect(t.target));
                    self.rule_stack.pop();
                    if !callee_exhaustive {
                        exhaustive &= self.collect(*follow);
                    }
                }
                TransitionKind::Wildcard => self.sets.push(FollowSetWithPath {
                    intervals: TokenSet::range(TokenType::MIN_USER, atn.max_token_type()),
                    path: self.rule_stack.clone(),
                    following: Vec::new(),
                }),
                _ if t.is_epsilon() => exhaustive &= self.collect(t.target),
                _ => {
                    let Some(intervals) = t.label(TokenType::MIN_USER, atn.max_token_type()) else {
                        continue;
                    };
                    if intervals.is_empty() {
                        continue;
                    }
                    self.sets.push(FollowSetWithPath {
                        intervals,
                        path: self.rule_stack.clone(),
                        following: following_tokens(atn, t.target),
                    });
                }
            }
        }
        self.visiting.pop();
        exhaustive
    }
}

/// Single tokens that must follow `from` within its rule: a straight run
/// of plain epsilon and atom edges, up to the first branch or rule call.
pub(crate) fn following_tokens(atn: &Atn, from: StateId) -> Vec<TokenType> {
    let mut result = Vec::new();
    let mut seen = FxHashSet::default();
    let mut current = from;
    while seen.insert(current) {
        let [only] = atn.state(current).transitions.as_slice() else {
            break;
        };
        match only.kind {
            TransitionKind::Epsilon => {}
            TransitionKind::Atom(t) => result.push(t),
            _ => break,
        }
        current = only.target;
    }
    result
}
