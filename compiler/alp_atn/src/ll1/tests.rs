use alp_ir::{TokenSet, TokenType};
use pretty_assertions::assert_eq;

use crate::{Atn, Element, GrammarBuilder, RuleId};

/// ```text
/// s    : item+ EOF ;
/// item : opt X | ~(X | Y) | . ;
/// opt  : Y? ;
/// ```
fn grammar() -> (Atn, [TokenType; 3]) {
    let mut g = GrammarBuilder::new();
    let x = g.token("X");
    let y = g.token("Y");
    let z = g.token("Z");
    let s = g.rule("s");
    let item = g.rule("item");
    let opt = g.rule("opt");
    g.define(
        s,
        Element::seq([Element::plus(item.into()), TokenType::EOF.into()]),
    );
    g.define(
        item,
        Element::alt([
            Element::seq([opt.into(), x.into()]),
            Element::NotSet(vec![x, y]),
            Element::Wildcard,
        ]),
    );
    g.define(opt, Element::opt(y.into()));
    let atn = g.build().map(|c| c.atn).unwrap_or_else(|e| panic!("{e}"));
    (atn, [x, y, z])
}

#[test]
fn test_nullable_rule_yields_epsilon_without_context() {
    let (atn, [_, y, _]) = grammar();
    let opt = RuleId::new(2);
    assert_eq!(
        atn.look(atn.rule_start(opt), None),
        TokenSet::of([TokenType::EPSILON, y])
    );
}

#[test]
fn test_empty_context_yields_eof() {
    let (atn, [_, y, _]) = grammar();
    let opt = RuleId::new(2);
    assert_eq!(
        atn.look(atn.rule_start(opt), Some(&[])),
        TokenSet::of([TokenType::EOF, y])
    );
}

#[test]
fn test_context_continues_in_caller() {
    let (atn, [x, y, _]) = grammar();
    let opt = RuleId::new(2);
    let ret = atn.rule_follow_states(opt)[0];
    assert_eq!(
        atn.next_tokens_in_context(atn.rule_start(opt), &[ret]),
        TokenSet::of([x, y])
    );
}

#[test]
fn test_call_steps_through_nullable_rule() {
    let (atn, [x, y, z]) = grammar();
    let item = RuleId::new(1);
    // `opt X` contributes Y and X, `~(X|Y)` contributes Z, `.` everything.
    assert_eq!(atn.look(atn.rule_start(item), None), TokenSet::of([x, y, z]));
}

#[test]
fn test_negated_set_complements_within_vocabulary() {
    let (atn, [_, _, z]) = grammar();
    let not_set = atn
        .states()
        .find_map(|(_, s)| {
            s.transitions
                .iter()
                .find(|t| matches!(t.kind, crate::TransitionKind::NotSet(_)))
        })
        .unwrap_or_else(|| panic!("no negated set"));
    assert_eq!(
        not_set.label(TokenType::MIN_USER, atn.max_token_type()),
        Some(TokenSet::single(z))
    );
}

#[test]
fn test_start_rule_sees_eof_through_plus_loop() {
    let (atn, [x, y, z]) = grammar();
    let s = RuleId::new(0);
    let plus_back = atn
        .states()
        .find(|(_, st)| st.kind == crate::StateKind::PlusLoopBack)
        .map(|(id, _)| id)
        .unwrap_or_else(|| panic!("no plus loop"));
    assert_eq!(atn.state(plus_back).rule, s);
    assert_eq!(
        atn.next_tokens(plus_back),
        &TokenSet::of([TokenType::EOF, x, y, z])
    );
}
