use alp_atn::{Assoc, Atn, DecisionId, Element, GrammarBuilder, RecursiveAlt, RuleId, StateId, TransitionKind};
use alp_ir::{CommonTokenStream, Token, TokenType};
use pretty_assertions::assert_eq;

use super::*;
use crate::{NoHooks, RuleNode};

fn stream(types: &[TokenType]) -> CommonTokenStream {
    CommonTokenStream::new(types.iter().map(|&t| Token::new(t)).collect())
}

/// The decision owned by a state of `rule`; the first one if several.
fn decision_in(atn: &Atn, rule: RuleId) -> DecisionId {
    (0..atn.num_decisions())
        .map(|d| DecisionId::new(d as u32))
        .find(|&d| atn.state(atn.decision_state(d)).rule == rule)
        .unwrap_or_else(|| panic!("no decision in {rule:?}"))
}

fn call_site(atn: &Atn, caller: RuleId, callee: RuleId) -> StateId {
    atn.states()
        .find(|(_, s)| {
            s.rule == caller
                && s.transitions
                    .iter()
                    .any(|t| matches!(t.kind, TransitionKind::Rule { rule, .. } if rule == callee))
        })
        .map(|(id, _)| id)
        .unwrap_or_else(|| panic!("{caller:?} does not call {callee:?}"))
}

fn predict_with(
    sim: &Simulator<'_>,
    dfa: &Dfa,
    types: &[TokenType],
    mode: PredictionMode,
) -> Result<u32, NoViableAlt> {
    let mut input = stream(types);
    sim.adaptive_predict(dfa, &mut input, mode)
}

struct Stat {
    atn: Atn,
    stat: RuleId,
    id: TokenType,
    assign: TokenType,
    lparen: TokenType,
    rparen: TokenType,
    semi: TokenType,
    print: TokenType,
}

/// ```text
/// stat : ID '=' ID ';' | ID '(' ')' ';' | 'print' ID ';' ;
/// ```
fn stat_grammar() -> Stat {
    let mut g = GrammarBuilder::new();
    let id = g.token("ID");
    let assign = g.literal("=", None);
    let lparen = g.literal("(", None);
    let rparen = g.literal(")", None);
    let semi = g.literal(";", None);
    let print = g.literal("print", None);
    let stat = g.rule("stat");
    g.define(
        stat,
        Element::alt([
            Element::seq([id.into(), assign.into(), id.into(), semi.into()]),
            Element::seq([id.into(), lparen.into(), rparen.into(), semi.into()]),
            Element::seq([print.into(), id.into(), semi.into()]),
        ]),
    );
    let atn = g.build().map(|c| c.atn).unwrap_or_else(|e| panic!("{e}"));
    Stat {
        atn,
        stat,
        id,
        assign,
        lparen,
        rparen,
        semi,
        print,
    }
}

#[test]
fn test_single_token_lookahead() {
    let f = stat_grammar();
    let arena = ContextArena::new();
    let sim = Simulator::new(&f.atn, &arena, &NoHooks, None, 0);
    let dfa = Dfa::new(decision_in(&f.atn, f.stat));

    let alt = predict_with(&sim, &dfa, &[f.print, f.id, f.semi], PredictionMode::Ll);
    assert_eq!(alt, Ok(3));
}

#[test]
fn test_second_token_separates_alternatives() {
    let f = stat_grammar();
    let arena = ContextArena::new();
    let sim = Simulator::new(&f.atn, &arena, &NoHooks, None, 0);
    let dfa = Dfa::new(decision_in(&f.atn, f.stat));

    let call = [f.id, f.lparen, f.rparen, f.semi];
    let assign = [f.id, f.assign, f.id, f.semi];
    assert_eq!(predict_with(&sim, &dfa, &call, PredictionMode::Ll), Ok(2));
    assert_eq!(predict_with(&sim, &dfa, &assign, PredictionMode::Ll), Ok(1));
}

#[test]
fn test_no_viable_alternative_positions() {
    let f = stat_grammar();
    let arena = ContextArena::new();
    let sim = Simulator::new(&f.atn, &arena, &NoHooks, None, 0);
    let dfa = Dfa::new(decision_in(&f.atn, f.stat));

    let err = predict_with(&sim, &dfa, &[f.id, f.semi], PredictionMode::Ll);
    assert_eq!(
        err,
        Err(NoViableAlt {
            start_index: 0,
            offending_index: 1,
        })
    );
    let err = predict_with(&sim, &dfa, &[f.semi], PredictionMode::Ll);
    assert_eq!(
        err,
        Err(NoViableAlt {
            start_index: 0,
            offending_index: 0,
        })
    );
}

#[test]
fn test_repeat_prediction_is_answered_by_dfa() {
    let f = stat_grammar();
    let arena = ContextArena::new();
    let sim = Simulator::new(&f.atn, &arena, &NoHooks, None, 0);
    let dfa = Dfa::new(decision_in(&f.atn, f.stat));
    let input = [f.id, f.assign, f.id, f.semi];

    assert_eq!(predict_with(&sim, &dfa, &input, PredictionMode::Ll), Ok(1));
    let before = dfa.stats();
    let states = dfa.len();
    assert!(before.misses > 0);

    assert_eq!(predict_with(&sim, &dfa, &input, PredictionMode::Ll), Ok(1));
    let after = dfa.stats();
    assert_eq!(after.misses, before.misses);
    assert!(after.hits > before.hits);
    assert_eq!(dfa.len(), states);
}

#[test]
fn test_identical_alternatives_resolve_to_lowest() {
    let mut g = GrammarBuilder::new();
    let a = g.token("A");
    let s = g.rule("s");
    g.define(s, Element::alt([a.into(), a.into()]));
    let atn = g.build().map(|c| c.atn).unwrap_or_else(|e| panic!("{e}"));
    let arena = ContextArena::new();
    let sim = Simulator::new(&atn, &arena, &NoHooks, None, 0);

    for mode in [PredictionMode::Sll, PredictionMode::Ll] {
        let dfa = Dfa::new(decision_in(&atn, s));
        assert_eq!(predict_with(&sim, &dfa, &[a], mode), Ok(1));
    }
}

#[test]
fn test_failed_predicate_disables_alternative() {
    let mut g = GrammarBuilder::new();
    let a = g.token("A");
    let s = g.rule("s");
    g.define(
        s,
        Element::alt([Element::seq([Element::Predicate(0), a.into()]), a.into()]),
    );
    let atn = g.build().map(|c| c.atn).unwrap_or_else(|e| panic!("{e}"));
    let arena = ContextArena::new();
    let decision = decision_in(&atn, s);

    let reject = |_: RuleId, index: u32| index != 0;
    let sim = Simulator::new(&atn, &arena, &reject, None, 0);
    let dfa = Dfa::new(decision);
    assert_eq!(predict_with(&sim, &dfa, &[a], PredictionMode::Ll), Ok(2));
    // Predicate outcomes are never cached.
    assert!(dfa.is_empty());

    let accept = |_: RuleId, _: u32| true;
    let sim = Simulator::new(&atn, &arena, &accept, None, 0);
    assert_eq!(predict_with(&sim, &dfa, &[a], PredictionMode::Ll), Ok(1));
}

struct Expr {
    atn: Atn,
    int: TokenType,
    plus: TokenType,
    star: TokenType,
    decision: DecisionId,
}

/// ```text
/// prog : e EOF ;
/// e    : e '*' e | e '+' e | INT ;
/// ```
fn expr_grammar() -> Expr {
    let mut g = GrammarBuilder::new();
    let int = g.token("INT");
    let plus = g.literal("+", None);
    let star = g.literal("*", None);
    let prog = g.rule("prog");
    let e = g.rule("e");
    g.define(prog, Element::seq([e.into(), TokenType::EOF.into()]));
    g.define_recursive(
        e,
        vec![
            RecursiveAlt::Binary {
                operator: vec![star.into()],
                assoc: Assoc::Left,
            },
            RecursiveAlt::Binary {
                operator: vec![plus.into()],
                assoc: Assoc::Left,
            },
            RecursiveAlt::Primary(vec![int.into()]),
        ],
    );
    let atn = g.build().map(|c| c.atn).unwrap_or_else(|e| panic!("{e}"));
    let decision = atn
        .states()
        .find(|(_, s)| s.precedence_decision)
        .and_then(|(_, s)| s.decision)
        .unwrap_or_else(|| panic!("no precedence decision"));
    Expr {
        atn,
        int,
        plus,
        star,
        decision,
    }
}

#[test]
fn test_precedence_floor_steers_operator_loop() {
    let f = expr_grammar();
    let arena = ContextArena::new();
    let dfa = Dfa::new(f.decision);

    // Outermost level: any operator continues the loop.
    let top = Simulator::new(&f.atn, &arena, &NoHooks, None, 0);
    assert_eq!(predict_with(&top, &dfa, &[f.plus, f.int], PredictionMode::Ll), Ok(1));
    assert_eq!(predict_with(&top, &dfa, &[f.star, f.int], PredictionMode::Ll), Ok(1));
    assert_eq!(predict_with(&top, &dfa, &[], PredictionMode::Ll), Ok(2));

    // Right operand of '+': '*' binds tighter and continues, '+' returns.
    let operand = Simulator::new(&f.atn, &arena, &NoHooks, None, 3);
    assert_eq!(predict_with(&operand, &dfa, &[f.star, f.int], PredictionMode::Ll), Ok(1));
    assert_eq!(predict_with(&operand, &dfa, &[f.plus, f.int], PredictionMode::Ll), Ok(2));

    // Right operand of '*': every operator returns.
    let tight = Simulator::new(&f.atn, &arena, &NoHooks, None, 4);
    assert_eq!(predict_with(&tight, &dfa, &[f.star, f.int], PredictionMode::Ll), Ok(2));
}

#[test]
fn test_start_state_cached_per_precedence() {
    let f = expr_grammar();
    let arena = ContextArena::new();
    let dfa = Dfa::new(f.decision);

    for precedence in [0, 3] {
        let sim = Simulator::new(&f.atn, &arena, &NoHooks, None, precedence);
        let _ = predict_with(&sim, &dfa, &[f.plus, f.int], PredictionMode::Sll);
    }
    let (Some(low), Some(high)) = (dfa.start_state(0), dfa.start_state(3)) else {
        panic!("start states for both floors");
    };
    assert_ne!(low.id, high.id);
    assert!(dfa.start_state(4).is_none());
}

#[test]
fn test_precedence_filter_keeps_start_state_unambiguous() {
    let f = expr_grammar();
    let arena = ContextArena::new();
    let sim = Simulator::new(&f.atn, &arena, &NoHooks, None, 0);
    let s0 = sim.start_configs(f.decision, false);

    // Every operator is reached by alternative 1 only; the exit
    // alternative survives through the outermost caller.
    let star_configs: Vec<u32> = s0
        .configs()
        .filter(|(k, _)| {
            f.atn.state(k.state).transitions.iter().any(|t| t.kind == TransitionKind::Atom(f.star))
        })
        .map(|(_, alt)| alt)
        .collect();
    assert_eq!(star_configs, vec![1]);
    assert!(s0.alts().contains(2));
}

struct Nested {
    atn: Atn,
    start: RuleId,
    s1: RuleId,
    c: RuleId,
    a: TokenType,
    b: TokenType,
}

/// ```text
/// start : 'one' s1 | 'two' s2 ;
/// s1    : c ;
/// s2    : c B ;
/// c     : A | A B ;
/// ```
///
/// Without knowing its caller, `c` cannot tell `A B` apart: through `s2`
/// alternative 1 also matches it.
fn nested_grammar() -> Nested {
    let mut g = GrammarBuilder::new();
    let a = g.token("A");
    let b = g.token("B");
    let one = g.literal("one", None);
    let two = g.literal("two", None);
    let start = g.rule("start");
    let s1 = g.rule("s1");
    let s2 = g.rule("s2");
    let c = g.rule("c");
    g.define(
        start,
        Element::alt([
            Element::seq([one.into(), s1.into()]),
            Element::seq([two.into(), s2.into()]),
        ]),
    );
    g.define(s1, c.into());
    g.define(s2, Element::seq([c.into(), b.into()]));
    g.define(c, Element::alt([a.into(), Element::seq([a.into(), b.into()])]));
    let atn = g.build().map(|c| c.atn).unwrap_or_else(|e| panic!("{e}"));
    Nested {
        atn,
        start,
        s1,
        c,
        a,
        b,
    }
}

#[test]
fn test_full_context_settles_sll_conflict() {
    let f = nested_grammar();
    let mut arena = ContextArena::new();
    let root = arena.alloc(RuleNode::new(f.start, None, None));
    let s1 = arena.alloc(RuleNode::new(f.s1, Some(root), Some(call_site(&f.atn, f.start, f.s1))));
    let c = arena.alloc(RuleNode::new(f.c, Some(s1), Some(call_site(&f.atn, f.s1, f.c))));
    let sim = Simulator::new(&f.atn, &arena, &NoHooks, Some(c), 0);
    let input = [f.a, f.b];

    let sll = Dfa::new(decision_in(&f.atn, f.c));
    assert_eq!(predict_with(&sim, &sll, &input, PredictionMode::Sll), Ok(1));

    let ll = Dfa::new(decision_in(&f.atn, f.c));
    assert_eq!(predict_with(&sim, &ll, &input, PredictionMode::Ll), Ok(2));
    // The conflict itself was cached; the full-context answer was not.
    assert_eq!(predict_with(&sim, &ll, &input, PredictionMode::Ll), Ok(2));
    assert!(ll.stats().hits > 0);
}

#[test]
fn test_full_context_simulation_leaves_through_callers() {
    let f = nested_grammar();
    let mut arena = ContextArena::new();
    let root = arena.alloc(RuleNode::new(f.start, None, None));
    let s1 = arena.alloc(RuleNode::new(f.s1, Some(root), Some(call_site(&f.atn, f.start, f.s1))));
    let c = arena.alloc(RuleNode::new(f.c, Some(s1), Some(call_site(&f.atn, f.s1, f.c))));
    let sim = Simulator::new(&f.atn, &arena, &NoHooks, Some(c), 0);

    let s0 = sim.start_configs(decision_in(&f.atn, f.c), true);
    let reach = sim.compute_reach(&s0, f.a, true);
    let outers: Vec<OuterContext> = reach
        .entries()
        .filter(|(_, alts)| alts.contains(1))
        .map(|(k, _)| k.outer)
        .collect();
    assert_eq!(outers, vec![OuterContext::Root]);
    assert!(reach.configs().any(|(k, alt)| alt == 2 && k.outer == OuterContext::Local));
}
