//! ATN states.

use crate::{DecisionId, RuleId, Transition};

/// Structural role of a state.
///
/// Only a handful of kinds matter at run time: rule stops end a simulated
/// invocation, loop-related kinds steer `sync` in error recovery, and the
/// star-loop entry of a left-recursive rule drives recursion contexts.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StateKind {
    Basic,
    RuleStart,
    RuleStop,
    /// Entry of a `( a | b )` or `( a )?` block.
    BlockStart,
    /// Entry of the block inside `( ... )+`.
    PlusBlockStart,
    /// Entry of the block inside `( ... )*`.
    StarBlockStart,
    BlockEnd,
    /// Decision between another `*` iteration and leaving the loop.
    StarLoopEntry,
    StarLoopBack,
    /// Decision between another `+` iteration and leaving the loop.
    PlusLoopBack,
    LoopEnd,
}

impl StateKind {
    /// Kinds that open a block of alternatives.
    pub fn is_block_start(self) -> bool {
        matches!(
            self,
            StateKind::BlockStart | StateKind::PlusBlockStart | StateKind::StarBlockStart
        )
    }
}

/// One node of the ATN.
#[derive(Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AtnState {
    pub kind: StateKind,
    pub rule: RuleId,
    pub transitions: Vec<Transition>,
    /// Set on states with more than one alternative.
    pub decision: Option<DecisionId>,
    /// The loop entry of a left-recursive rule: taking the loop pushes a new
    /// recursion context.
    pub precedence_decision: bool,
}

impl AtnState {
    pub fn new(kind: StateKind, rule: RuleId) -> Self {
        AtnState {
            kind,
            rule,
            transitions: Vec::new(),
            decision: None,
            precedence_decision: false,
        }
    }

    /// True if leaving this state consumes a token.
    ///
    /// Builders only ever give a consuming state that single transition, so
    /// checking the first is enough.
    #[inline]
    pub fn is_consuming(&self) -> bool {
        self.transitions.first().is_some_and(|t| !t.is_epsilon())
    }

    #[inline]
    pub fn is_rule_stop(&self) -> bool {
        self.kind == StateKind::RuleStop
    }
}
