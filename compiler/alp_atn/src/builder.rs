//! Low-level ATN construction and validation.

use alp_ir::TokenType;
use rustc_hash::FxHashSet;
use thiserror::Error;
use tracing::debug;

use crate::{Atn, AtnState, DecisionId, RuleId, RuleInfo, StateId, StateKind, Transition, TransitionKind};

/// Structural problems found while building an ATN.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum AtnError {
    #[error("transition from state {from} targets missing state {target}")]
    DanglingTransition { from: StateId, target: StateId },
    #[error("rule call in state {from} does not enter the start state of rule `{rule}`")]
    BadRuleTransition { from: StateId, rule: String },
    #[error("rule `{0}` has no alternatives")]
    EmptyRule(String),
    #[error("rule `{0}` is referenced but never defined")]
    UndefinedRule(String),
    #[error("state {0} mixes consuming and non-consuming transitions")]
    MixedTransitions(StateId),
    #[error("rule stop state {0} must not have outgoing transitions")]
    TransitionFromStop(StateId),
    #[error("rules {} can invoke themselves without consuming input", .0.join(" -> "))]
    LeftRecursion(Vec<String>),
    #[error("left-recursive rule `{0}` needs at least one non-recursive alternative")]
    NoPrimaryAlternative(String),
}

#[derive(Clone, Debug)]
struct RuleSlot {
    name: String,
    start: StateId,
    stop: StateId,
    left_recursive: bool,
    defined: bool,
}

/// Assembles states and transitions, then validates them into an [`Atn`].
///
/// Decision numbers are assigned by [`build`](Self::build): every state
/// with more than one outgoing transition becomes a decision, numbered in
/// state order.
#[derive(Clone, Debug)]
pub struct AtnBuilder {
    states: Vec<AtnState>,
    rules: Vec<RuleSlot>,
    max_token_type: TokenType,
}

impl AtnBuilder {
    pub fn new(max_token_type: TokenType) -> Self {
        AtnBuilder {
            states: Vec::new(),
            rules: Vec::new(),
            max_token_type,
        }
    }

    /// Declare a rule, creating its start and stop states.
    pub fn add_rule(&mut self, name: impl Into<String>) -> RuleId {
        let rule = RuleId::from_index(self.rules.len());
        let start = self.add_state(StateKind::RuleStart, rule);
        let stop = self.add_state(StateKind::RuleStop, rule);
        self.rules.push(RuleSlot {
            name: name.into(),
            start,
            stop,
            left_recursive: false,
            defined: false,
        });
        rule
    }

    pub fn add_state(&mut self, kind: StateKind, rule: RuleId) -> StateId {
        let id = StateId::from_index(self.states.len());
        self.states.push(AtnState::new(kind, rule));
        id
    }

    pub fn add_transition(&mut self, from: StateId, transition: Transition) {
        if let Some(state) = self.states.get_mut(from.index()) {
            if state.kind == StateKind::RuleStart {
                if let Some(slot) = self.rules.get_mut(state.rule.index()) {
                    slot.defined = true;
                }
            }
            state.transitions.push(transition);
        }
    }

    pub fn epsilon(&mut self, from: StateId, to: StateId) {
        self.add_transition(from, Transition::epsilon(to));
    }

    pub fn rule_start(&self, rule: RuleId) -> StateId {
        self.rules[rule.index()].start
    }

    pub fn rule_stop(&self, rule: RuleId) -> StateId {
        self.rules[rule.index()].stop
    }

    pub fn rule_name(&self, rule: RuleId) -> &str {
        &self.rules[rule.index()].name
    }

    pub fn set_left_recursive(&mut self, rule: RuleId) {
        self.rules[rule.index()].left_recursive = true;
    }

    pub fn mark_precedence_decision(&mut self, state: StateId) {
        self.states[state.index()].precedence_decision = true;
    }

    pub fn max_token_type(&self) -> TokenType {
        self.max_token_type
    }

    /// Validate the graph and derive the lookup tables.
    pub fn build(mut self) -> Result<Atn, AtnError> {
        self.validate()?;

        let mut decisions = Vec::new();
        for (i, state) in self.states.iter_mut().enumerate() {
            if state.transitions.len() > 1 {
                state.decision = Some(DecisionId::from_index(decisions.len()));
                decisions.push(StateId::from_index(i));
            }
        }

        let mut rule_follow = vec![Vec::new(); self.rules.len()];
        let mut return_precedence = vec![None; self.states.len()];
        for state in &self.states {
            for t in &state.transitions {
                if let TransitionKind::Rule {
                    rule,
                    follow,
                    precedence,
                } = t.kind
                {
                    let links: &mut Vec<StateId> = &mut rule_follow[rule.index()];
                    if !links.contains(&follow) {
                        links.push(follow);
                    }
                    return_precedence[follow.index()] = Some(precedence);
                }
            }
        }

        let rules = self
            .rules
            .into_iter()
            .map(|slot| RuleInfo {
                name: slot.name,
                start: slot.start,
                stop: slot.stop,
                left_recursive: slot.left_recursive,
            })
            .collect();

        let mut atn = Atn {
            states: self.states,
            rules,
            decisions,
            max_token_type: self.max_token_type,
            next_tokens: Vec::new(),
            rule_follow,
            return_precedence,
        };
        atn.next_tokens = (0..atn.states.len())
            .map(|i| atn.look(StateId::from_index(i), None))
            .collect();

        debug!(
            states = atn.num_states(),
            rules = atn.num_rules(),
            decisions = atn.num_decisions(),
            "built ATN"
        );
        Ok(atn)
    }

    fn validate(&self) -> Result<(), AtnError> {
        for slot in &self.rules {
            if !slot.defined {
                return Err(if self.is_referenced(slot.start) {
                    AtnError::UndefinedRule(slot.name.clone())
                } else {
                    AtnError::EmptyRule(slot.name.clone())
                });
            }
        }

        for (i, state) in self.states.iter().enumerate() {
            let from = StateId::from_index(i);
            if state.kind == StateKind::RuleStop && !state.transitions.is_empty() {
                return Err(AtnError::TransitionFromStop(from));
            }
            let consuming = state.transitions.iter().filter(|t| !t.is_epsilon()).count();
            if consuming > 0 && state.transitions.len() > 1 {
                return Err(AtnError::MixedTransitions(from));
            }
            for t in &state.transitions {
                if t.target.index() >= self.states.len() {
                    return Err(AtnError::DanglingTransition {
                        from,
                        target: t.target,
                    });
                }
                if let TransitionKind::Rule { rule, follow, .. } = t.kind {
                    let Some(slot) = self.rules.get(rule.index()) else {
                        return Err(AtnError::DanglingTransition {
                            from,
                            target: t.target,
                        });
                    };
                    if slot.start != t.target {
                        return Err(AtnError::BadRuleTransition {
                            from,
                            rule: slot.name.clone(),
                        });
                    }
                    if follow.index() >= self.states.len() {
                        return Err(AtnError::DanglingTransition {
                            from,
                            target: follow,
                        });
                    }
                }
            }
        }

        self.check_left_recursion()
    }

    fn is_referenced(&self, start: StateId) -> bool {
        self.states
            .iter()
            .flat_map(|s| s.transitions.iter())
            .any(|t| matches!(t.kind, TransitionKind::Rule { .. }) && t.target == start)
    }

    /// Reject rules that can reach a call of themselves before consuming.
    fn check_left_recursion(&self) -> Result<(), AtnError> {
        let nullable = self.nullable_rules();
        let left_calls: Vec<Vec<RuleId>> = self
            .rules
            .iter()
            .map(|slot| {
                let mut calls = Vec::new();
                self.walk_epsilon(slot.start, &nullable, &mut |callee| calls.push(callee));
                calls
            })
            .collect();

        // 0 = unvisited, 1 = on the current path, 2 = done
        let mut mark = vec![0u8; self.rules.len()];
        let mut path = Vec::new();
        for root in 0..self.rules.len() {
            if let Some(cycle) = find_cycle(root, &left_calls, &mut mark, &mut path) {
                let names = cycle
                    .into_iter()
                    .map(|r| self.rules[r].name.clone())
                    .collect();
                return Err(AtnError::LeftRecursion(names));
            }
        }
        Ok(())
    }

    /// Rules whose stop state is reachable from their start without
    /// consuming, computed to a fixed point.
    fn nullable_rules(&self) -> Vec<bool> {
        let mut nullable = vec![false; self.rules.len()];
        loop {
            let mut changed = false;
            for (r, slot) in self.rules.iter().enumerate() {
                if nullable[r] {
                    continue;
                }
                let reaches = self.walk_epsilon(slot.start, &nullable, &mut |_| {});
                if reaches.contains(&slot.stop) {
                    nullable[r] = true;
                    changed = true;
                }
            }
            if !changed {
                return nullable;
            }
        }
    }

    /// States reachable from `start` inside its rule without consuming.
    /// Calls to nullable rules are stepped over; every call seen is reported.
    fn walk_epsilon(
        &self,
        start: StateId,
        nullable: &[bool],
        on_call: &mut dyn FnMut(RuleId),
    ) -> FxHashSet<StateId> {
        let mut seen = FxHashSet::default();
        let mut work = vec![start];
        while let Some(s) = work.pop() {
            if !seen.insert(s) {
                continue;
            }
            for t in &self.states[s.index()].transitions {
                match t.kind {
                    TransitionKind::Rule { rule, follow, .. } => {
                        on_call(rule);
                        if nullable.get(rule.index()).copied().unwrap_or(false) {
                            work.push(follow);
                        }
                    }
                    _ if t.is_epsilon() => work.push(t.target),
                    _ => {}
                }
            }
        }
        seen
    }
}

fn find_cycle(
    node: usize,
    edges: &[Vec<RuleId>],
    mark: &mut [u8],
    path: &mut Vec<usize>,
) -> Option<Vec<usize>> {
    match mark[node] {
        2 => return None,
        1 => {
            let from = path.iter().position(|&n| n == node).unwrap_or(0);
            let mut cycle = path[from..].to_vec();
            cycle.push(node);
            return Some(cycle);
        }
        _ => {}
    }
    mark[node] = 1;
    path.push(node);
    for callee in &edges[node] {
        if let Some(cycle) = find_cycle(callee.index(), edges, mark, path) {
            return Some(cycle);
        }
    }
    path.pop();
    mark[node] = 2;
    None
}

#[cfg(test)]
mod tests;
