use alp_ir::{TokenSet, TokenType};
use pretty_assertions::assert_eq;

use crate::{Atn, DecisionId, Element, GrammarBuilder, RuleId, StateId, StateKind, TransitionKind};

struct Fixture {
    atn: Atn,
    id: TokenType,
    int: TokenType,
    assign: TokenType,
    semi: TokenType,
    print: TokenType,
}

/// ```text
/// prog : stat* EOF ;
/// stat : ID '=' expr ';' | 'print' expr ';' ;
/// expr : INT | ID ;
/// ```
fn fixture() -> Fixture {
    let mut g = GrammarBuilder::new();
    let id = g.token("ID");
    let int = g.token("INT");
    let assign = g.literal("=", None);
    let semi = g.literal(";", None);
    let print = g.literal("print", None);
    let prog = g.rule("prog");
    let stat = g.rule("stat");
    let expr = g.rule("expr");
    g.define(
        prog,
        Element::seq([Element::star(stat.into()), TokenType::EOF.into()]),
    );
    g.define(
        stat,
        Element::alt([
            Element::seq([id.into(), assign.into(), expr.into(), semi.into()]),
            Element::seq([print.into(), expr.into(), semi.into()]),
        ]),
    );
    g.define(expr, Element::alt([int.into(), id.into()]));
    let atn = g.build().map(|c| c.atn).unwrap_or_else(|e| panic!("{e}"));
    Fixture {
        atn,
        id,
        int,
        assign,
        semi,
        print,
    }
}

/// First state holding a call of `rule`.
fn call_site(atn: &Atn, rule: RuleId) -> StateId {
    atn.states()
        .find(|(_, s)| {
            s.transitions
                .iter()
                .any(|t| matches!(t.kind, TransitionKind::Rule { rule: r, .. } if r == rule))
        })
        .map(|(id, _)| id)
        .unwrap_or_else(|| panic!("no call of {rule:?}"))
}

#[test]
fn test_rule_table() {
    let f = fixture();
    assert_eq!(f.atn.num_rules(), 3);
    assert_eq!(f.atn.rule_names(), vec!["prog", "stat", "expr"]);
    let stat = f.atn.rule_by_name("stat").unwrap_or_else(|| panic!("stat"));
    assert_eq!(f.atn.state(f.atn.rule_start(stat)).kind, StateKind::RuleStart);
    assert_eq!(f.atn.state(f.atn.rule_stop(stat)).kind, StateKind::RuleStop);
    assert!(f.atn.rule_by_name("missing").is_none());
}

#[test]
fn test_decisions_numbered_in_state_order() {
    let f = fixture();
    assert_eq!(f.atn.num_decisions(), 3);
    let kinds: Vec<StateKind> = (0..3)
        .map(|d| f.atn.state(f.atn.decision_state(DecisionId::new(d))).kind)
        .collect();
    assert_eq!(
        kinds,
        vec![StateKind::StarLoopEntry, StateKind::BlockStart, StateKind::BlockStart]
    );
}

#[test]
fn test_next_tokens_within_rule() {
    let f = fixture();
    let stat = RuleId::new(1);
    let expr = RuleId::new(2);
    assert_eq!(
        f.atn.next_tokens(f.atn.rule_start(stat)),
        &TokenSet::of([f.id, f.print])
    );
    assert_eq!(
        f.atn.next_tokens(f.atn.rule_start(expr)),
        &TokenSet::of([f.int, f.id])
    );
    assert_eq!(
        f.atn.next_tokens(f.atn.rule_stop(expr)),
        &TokenSet::single(TokenType::EPSILON)
    );
    assert!(!f.atn.next_tokens(f.atn.rule_start(stat)).contains(f.assign));
}

#[test]
fn test_rule_follow_states() {
    let f = fixture();
    let expr = RuleId::new(2);
    let follow = f.atn.rule_follow_states(expr);
    assert_eq!(follow.len(), 2);
    for &state in follow {
        assert_eq!(f.atn.next_tokens(state), &TokenSet::single(f.semi));
    }
    assert!(f.atn.rule_follow_states(RuleId::new(0)).is_empty());
}

#[test]
fn test_expected_tokens_walks_invocations() {
    let f = fixture();
    let stat = RuleId::new(1);
    let invoking = call_site(&f.atn, stat);
    let ret = f.atn.follow_state_of(invoking).unwrap_or_else(|| panic!("follow"));
    assert_eq!(f.atn.rule_follow_states(stat), &[ret]);

    let stop = f.atn.rule_stop(stat);
    assert_eq!(
        f.atn.expected_tokens(stop, &[ret]),
        TokenSet::of([f.id, f.print, TokenType::EOF])
    );
    assert_eq!(f.atn.expected_tokens(stop, &[]), TokenSet::single(TokenType::EOF));
}

#[test]
fn test_follow_state_of_non_call() {
    let f = fixture();
    assert_eq!(f.atn.follow_state_of(f.atn.rule_start(RuleId::new(0))), None);
}

#[test]
fn test_return_precedence_of_follow_states() {
    let f = fixture();
    let expr = RuleId::new(2);
    for &state in f.atn.rule_follow_states(expr) {
        assert_eq!(f.atn.return_precedence(state), Some(0));
    }
    assert_eq!(f.atn.return_precedence(f.atn.rule_start(expr)), None);
}
