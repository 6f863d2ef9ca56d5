//! User code attached to the grammar: semantic predicates and actions.

use alp_atn::RuleId;

use crate::{ContextArena, ContextId};

/// Evaluates the predicates and runs the actions a grammar refers to by
/// `(rule, index)`.
///
/// Predicates are called during prediction as well as during the parse, so
/// they must not have side effects. `ctx` is the invocation the predicate
/// sits in when known; prediction passes `None` once it has left the rule
/// that made the decision.
pub trait SemanticHooks: Send + Sync {
    fn sempred(&self, arena: &ContextArena, ctx: Option<ContextId>, rule: RuleId, index: u32) -> bool {
        let _ = (arena, ctx, rule, index);
        true
    }

    fn action(&self, arena: &ContextArena, ctx: Option<ContextId>, rule: RuleId, index: u32) {
        let _ = (arena, ctx, rule, index);
    }
}

/// Every predicate passes; actions do nothing.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoHooks;

impl SemanticHooks for NoHooks {}

impl<F> SemanticHooks for F
where
    F: Fn(RuleId, u32) -> bool + Send + Sync,
{
    fn sempred(&self, _arena: &ContextArena, _ctx: Option<ContextId>, rule: RuleId, index: u32) -> bool {
        self(rule, index)
    }
}
