//! The immutable augmented transition network.

use alp_ir::{TokenSet, TokenType};

use crate::{AtnState, DecisionId, RuleId, StateId, TransitionKind};

/// Name and entry/exit states of one parser rule.
#[derive(Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RuleInfo {
    pub name: String,
    pub start: StateId,
    pub stop: StateId,
    /// Rewritten from direct left recursion into a precedence loop.
    pub left_recursive: bool,
}

/// A grammar compiled to a graph of states and transitions.
///
/// Built once (see [`AtnBuilder`](crate::AtnBuilder) and
/// [`GrammarBuilder`](crate::GrammarBuilder)) and shared read-only by every
/// parse afterwards. Alongside the graph it keeps two derived tables: the
/// within-rule LL(1) set of every state, and the global follow links of every
/// rule (each state some call site of the rule returns to).
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Atn {
    pub(crate) states: Vec<AtnState>,
    pub(crate) rules: Vec<RuleInfo>,
    pub(crate) decisions: Vec<StateId>,
    pub(crate) max_token_type: TokenType,
    pub(crate) next_tokens: Vec<TokenSet>,
    pub(crate) rule_follow: Vec<Vec<StateId>>,
    /// Precedence argument of the call returning to each state.
    pub(crate) return_precedence: Vec<Option<i32>>,
}

impl Atn {
    #[inline]
    pub fn state(&self, id: StateId) -> &AtnState {
        &self.states[id.index()]
    }

    pub fn states(&self) -> impl ExactSizeIterator<Item = (StateId, &AtnState)> {
        self.states
            .iter()
            .enumerate()
            .map(|(i, s)| (StateId::from_index(i), s))
    }

    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    #[inline]
    pub fn rule(&self, id: RuleId) -> &RuleInfo {
        &self.rules[id.index()]
    }

    pub fn rules(&self) -> impl ExactSizeIterator<Item = (RuleId, &RuleInfo)> {
        self.rules
            .iter()
            .enumerate()
            .map(|(i, r)| (RuleId::from_index(i), r))
    }

    pub fn num_rules(&self) -> usize {
        self.rules.len()
    }

    pub fn rule_by_name(&self, name: &str) -> Option<RuleId> {
        self.rules
            .iter()
            .position(|r| r.name == name)
            .map(RuleId::from_index)
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name.as_str()).collect()
    }

    #[inline]
    pub fn rule_start(&self, rule: RuleId) -> StateId {
        self.rule(rule).start
    }

    #[inline]
    pub fn rule_stop(&self, rule: RuleId) -> StateId {
        self.rule(rule).stop
    }

    /// State that owns decision `decision`.
    #[inline]
    pub fn decision_state(&self, decision: DecisionId) -> StateId {
        self.decisions[decision.index()]
    }

    pub fn num_decisions(&self) -> usize {
        self.decisions.len()
    }

    pub fn max_token_type(&self) -> TokenType {
        self.max_token_type
    }

    /// Tokens that can follow `state` without leaving its rule.
    ///
    /// Contains [`TokenType::EPSILON`] if the rule's end is reachable without
    /// consuming anything.
    #[inline]
    pub fn next_tokens(&self, state: StateId) -> &TokenSet {
        &self.next_tokens[state.index()]
    }

    /// Every state some invocation of `rule` returns to.
    pub fn rule_follow_states(&self, rule: RuleId) -> &[StateId] {
        &self.rule_follow[rule.index()]
    }

    /// Precedence argument of the rule call that returns to `follow`, or
    /// `None` if no call returns there.
    pub fn return_precedence(&self, follow: StateId) -> Option<i32> {
        self.return_precedence.get(follow.index()).copied().flatten()
    }

    /// Return state of the rule call leaving `invoking`, if it calls one.
    pub fn follow_state_of(&self, invoking: StateId) -> Option<StateId> {
        self.states
            .get(invoking.index())?
            .transitions
            .iter()
            .find_map(|t| match t.kind {
                TransitionKind::Rule { follow, .. } => Some(follow),
                _ => None,
            })
    }

    /// Tokens acceptable at `state` given the return states of the active
    /// invocations, innermost first.
    ///
    /// Walks outwards only as far as the end of each rule is reachable
    /// without consuming; running out of invocations means the input may end
    /// here, so EOF is included.
    pub fn expected_tokens(&self, state: StateId, follow: &[StateId]) -> TokenSet {
        let mut following = self.next_tokens(state);
        if !following.contains(TokenType::EPSILON) {
            return following.clone();
        }
        let mut expected = following.clone();
        expected.remove(TokenType::EPSILON);
        for &ret in follow {
            if !following.contains(TokenType::EPSILON) {
                break;
            }
            following = self.next_tokens(ret);
            expected.union_with(following);
            expected.remove(TokenType::EPSILON);
        }
        if following.contains(TokenType::EPSILON) {
            expected.insert(TokenType::EOF);
        }
        expected
    }
}

#[cfg(test)]
mod tests;
