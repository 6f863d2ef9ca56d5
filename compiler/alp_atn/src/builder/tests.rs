use alp_ir::TokenType;
use pretty_assertions::assert_eq;

use super::*;

const A: TokenType = TokenType::new(1);
const B: TokenType = TokenType::new(2);

/// `name : <single token> ;`
fn token_rule(b: &mut AtnBuilder, name: &str, t: TokenType) -> RuleId {
    let rule = b.add_rule(name);
    let (start, stop) = (b.rule_start(rule), b.rule_stop(rule));
    let mid = b.add_state(StateKind::Basic, rule);
    let end = b.add_state(StateKind::Basic, rule);
    b.epsilon(start, mid);
    b.add_transition(mid, Transition::atom(end, t));
    b.epsilon(end, stop);
    rule
}

#[test]
fn test_minimal_rule_builds() {
    let mut b = AtnBuilder::new(B);
    token_rule(&mut b, "r", A);
    let atn = b.build().unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(atn.num_states(), 4);
    assert_eq!(atn.num_decisions(), 0);
    assert_eq!(atn.max_token_type(), B);
}

#[test]
fn test_empty_rule_rejected() {
    let mut b = AtnBuilder::new(B);
    b.add_rule("lonely");
    assert_eq!(b.build().err(), Some(AtnError::EmptyRule("lonely".into())));
}

#[test]
fn test_undefined_rule_rejected() {
    let mut g = crate::GrammarBuilder::new();
    let a = g.token("A");
    let top = g.rule("top");
    let missing = g.rule("missing");
    g.define(top, crate::Element::seq([a.into(), missing.into()]));
    assert_eq!(
        g.build().err(),
        Some(AtnError::UndefinedRule("missing".into()))
    );
}

#[test]
fn test_dangling_target_rejected() {
    let mut b = AtnBuilder::new(B);
    let rule = b.add_rule("r");
    let start = b.rule_start(rule);
    b.epsilon(start, StateId::new(99));
    assert_eq!(
        b.build().err(),
        Some(AtnError::DanglingTransition {
            from: start,
            target: StateId::new(99)
        })
    );
}

#[test]
fn test_mixed_transitions_rejected() {
    let mut b = AtnBuilder::new(B);
    let rule = b.add_rule("r");
    let (start, stop) = (b.rule_start(rule), b.rule_stop(rule));
    let s = b.add_state(StateKind::Basic, rule);
    b.epsilon(start, s);
    b.add_transition(s, Transition::atom(stop, A));
    b.epsilon(s, stop);
    assert_eq!(b.build().err(), Some(AtnError::MixedTransitions(s)));
}

#[test]
fn test_indirect_left_recursion_rejected() {
    // a : b A ;  b : a B ;
    let mut b = AtnBuilder::new(B);
    let ra = b.add_rule("a");
    let rb = b.add_rule("b");
    for (rule, callee, t) in [(ra, rb, A), (rb, ra, B)] {
        let (start, stop) = (b.rule_start(rule), b.rule_stop(rule));
        let follow = b.add_state(StateKind::Basic, rule);
        let end = b.add_state(StateKind::Basic, rule);
        let callee_start = b.rule_start(callee);
        b.add_transition(start, Transition::rule(callee_start, callee, follow, 0));
        b.add_transition(follow, Transition::atom(end, t));
        b.epsilon(end, stop);
    }
    assert_eq!(
        b.build().err(),
        Some(AtnError::LeftRecursion(vec!["a".into(), "b".into(), "a".into()]))
    );
}

#[test]
fn test_left_recursion_through_nullable_rule_rejected() {
    use crate::{Element, GrammarBuilder};

    // a : c a A | B ;  c : ;
    let mut g = GrammarBuilder::new();
    let ta = g.token("A");
    let tb = g.token("B");
    let a = g.rule("a");
    let c = g.rule("c");
    g.define(
        a,
        Element::alt([Element::seq([c.into(), a.into(), ta.into()]), tb.into()]),
    );
    g.define(c, Element::Epsilon);
    assert!(matches!(g.build(), Err(AtnError::LeftRecursion(_))));
}

#[test]
fn test_error_messages() {
    assert_eq!(
        AtnError::LeftRecursion(vec!["a".into(), "a".into()]).to_string(),
        "rules a -> a can invoke themselves without consuming input"
    );
    assert_eq!(
        AtnError::UndefinedRule("x".into()).to_string(),
        "rule `x` is referenced but never defined"
    );
}
