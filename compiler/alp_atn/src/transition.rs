//! ATN edges.

use alp_ir::{TokenSet, TokenType};

use crate::{RuleId, StateId};

/// What an edge consumes or checks.
#[derive(Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TransitionKind {
    Epsilon,
    Atom(TokenType),
    /// Inclusive range of token types.
    Range(TokenType, TokenType),
    Set(TokenSet),
    NotSet(TokenSet),
    Wildcard,
    /// Invoke `rule`; the target is the rule's start state and `follow` the
    /// state to continue at once it returns. `precedence` is the argument a
    /// left-recursive callee is entered with.
    Rule {
        rule: RuleId,
        follow: StateId,
        precedence: i32,
    },
    /// User semantic predicate `index` of `rule`.
    Predicate {
        rule: RuleId,
        index: u32,
        context_dependent: bool,
    },
    /// Passes while the enclosing recursion allows operators of this level.
    Precedence(i32),
    /// User action `index` of `rule`; never consumes.
    Action { rule: RuleId, index: u32 },
}

/// A directed edge of the ATN.
#[derive(Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Transition {
    pub target: StateId,
    pub kind: TransitionKind,
}

impl Transition {
    pub fn new(target: StateId, kind: TransitionKind) -> Self {
        Transition { target, kind }
    }

    pub fn epsilon(target: StateId) -> Self {
        Self::new(target, TransitionKind::Epsilon)
    }

    pub fn atom(target: StateId, t: TokenType) -> Self {
        Self::new(target, TransitionKind::Atom(t))
    }

    pub fn rule(start: StateId, rule: RuleId, follow: StateId, precedence: i32) -> Self {
        Self::new(
            start,
            TransitionKind::Rule {
                rule,
                follow,
                precedence,
            },
        )
    }

    /// True for edges that never consume input.
    #[inline]
    pub fn is_epsilon(&self) -> bool {
        matches!(
            self.kind,
            TransitionKind::Epsilon
                | TransitionKind::Rule { .. }
                | TransitionKind::Predicate { .. }
                | TransitionKind::Precedence(_)
                | TransitionKind::Action { .. }
        )
    }

    /// Does this edge consume token `t`? User types must lie within
    /// `min..=max` for wildcards and negated sets.
    pub fn matches(&self, t: TokenType, min: TokenType, max: TokenType) -> bool {
        match &self.kind {
            TransitionKind::Atom(a) => *a == t,
            TransitionKind::Range(lo, hi) => *lo <= t && t <= *hi,
            TransitionKind::Set(set) => set.contains(t),
            TransitionKind::NotSet(set) => t >= min && t <= max && !set.contains(t),
            TransitionKind::Wildcard => t >= min && t <= max,
            _ => false,
        }
    }

    /// Token types this edge consumes, complemented within `min..=max` for
    /// negated sets and wildcards. `None` for epsilon edges.
    pub fn label(&self, min: TokenType, max: TokenType) -> Option<TokenSet> {
        match &self.kind {
            TransitionKind::Atom(a) => Some(TokenSet::single(*a)),
            TransitionKind::Range(lo, hi) => Some(TokenSet::range(*lo, *hi)),
            TransitionKind::Set(set) => Some(set.clone()),
            TransitionKind::NotSet(set) => Some(set.complement(min, max)),
            TransitionKind::Wildcard => Some(TokenSet::range(min, max)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN: TokenType = TokenType::MIN_USER;
    const MAX: TokenType = TokenType::new(5);

    fn edge(kind: TransitionKind) -> Transition {
        Transition::new(StateId::new(0), kind)
    }

    #[test]
    fn test_matches_by_kind() {
        let t2 = TokenType::new(2);
        assert!(edge(TransitionKind::Atom(t2)).matches(t2, MIN, MAX));
        assert!(edge(TransitionKind::Range(TokenType::new(1), TokenType::new(3))).matches(t2, MIN, MAX));
        assert!(!edge(TransitionKind::NotSet(TokenSet::single(t2))).matches(t2, MIN, MAX));
        assert!(edge(TransitionKind::NotSet(TokenSet::single(t2))).matches(TokenType::new(4), MIN, MAX));
        assert!(!edge(TransitionKind::Wildcard).matches(TokenType::EOF, MIN, MAX));
        assert!(!edge(TransitionKind::Epsilon).matches(t2, MIN, MAX));
    }

    #[test]
    fn test_label_of_negated_set() {
        let e = edge(TransitionKind::NotSet(TokenSet::of([TokenType::new(1), TokenType::new(2)])));
        assert_eq!(
            e.label(MIN, MAX),
            Some(TokenSet::of([TokenType::new(3), TokenType::new(4), TokenType::new(5)]))
        );
        assert_eq!(edge(TransitionKind::Precedence(2)).label(MIN, MAX), None);
    }

    #[test]
    fn test_non_consuming_kinds_are_epsilon() {
        let rule = edge(TransitionKind::Rule {
            rule: RuleId::new(0),
            follow: StateId::new(1),
            precedence: 0,
        });
        assert!(rule.is_epsilon());
        assert!(edge(TransitionKind::Precedence(1)).is_epsilon());
        assert!(!edge(TransitionKind::Wildcard).is_epsilon());
    }
}
