use alp_atn::{Element, GrammarBuilder, RuleId};
use alp_diagnostic::{DiagnosticConfig, ErrorCode};
use alp_ir::{CommonTokenStream, Span, Token, TokenType};
use pretty_assertions::assert_eq;

use super::*;
use crate::{Engine, ParseFailure, ParseResult};

/// ```text
/// prog : stat+ EOF ;
/// stat : ID '=' expr ';' ;
/// expr : ID | INT ;
/// ```
struct Assign {
    engine: Engine,
    prog: RuleId,
    id: TokenType,
    int: TokenType,
    assign: TokenType,
    semi: TokenType,
}

/// Lexes to a type no rule mentions.
const JUNK: TokenType = TokenType::new(99);

fn assign_grammar() -> Assign {
    let mut g = GrammarBuilder::new();
    let id = g.token("ID");
    let int = g.token("INT");
    let assign = g.literal("=", None);
    let semi = g.literal(";", None);
    let prog = g.rule("prog");
    let stat = g.rule("stat");
    let expr = g.rule("expr");
    g.define(prog, Element::seq([Element::plus(stat.into()), TokenType::EOF.into()]));
    g.define(stat, Element::seq([id.into(), assign.into(), expr.into(), semi.into()]));
    g.define(expr, Element::alt([id.into(), int.into()]));
    let grammar = g.build().unwrap_or_else(|e| panic!("{e}"));
    Assign {
        engine: Engine::from(grammar),
        prog,
        id,
        int,
        assign,
        semi,
    }
}

impl Assign {
    /// Whitespace-separated words: letters are ID, digits INT, `=` and `;`
    /// themselves, anything else [`JUNK`].
    fn input(&self, text: &str) -> CommonTokenStream {
        let tokens = text
            .split_whitespace()
            .enumerate()
            .map(|(i, word)| {
                let kind = match word {
                    "=" => self.assign,
                    ";" => self.semi,
                    w if w.chars().all(|c| c.is_ascii_alphabetic()) => self.id,
                    w if w.chars().all(|c| c.is_ascii_digit()) => self.int,
                    _ => JUNK,
                };
                Token::new(kind).with_text(word).at(1, i as u32)
            })
            .collect();
        CommonTokenStream::new(tokens)
    }

    fn parse(&self, text: &str) -> ParseResult {
        self.engine
            .interpreter(self.input(text))
            .parse(self.prog)
            .unwrap_or_else(|f| panic!("{f}"))
    }
}

fn messages(result: &ParseResult) -> Vec<(ErrorCode, String)> {
    result
        .errors
        .iter()
        .map(|e| (e.code, e.message.clone()))
        .collect()
}

#[test]
fn test_clean_input_has_no_errors() {
    let g = assign_grammar();
    let result = g.parse("x = 1 ; y = x ;");
    assert!(!result.has_errors());
    assert_eq!(
        result.to_string_tree(),
        "(prog (stat x = (expr 1) ;) (stat y = (expr x) ;) <EOF>)"
    );
}

#[test]
fn test_extraneous_token_is_deleted() {
    let g = assign_grammar();
    let result = g.parse("x = = 1 ;");
    assert_eq!(
        messages(&result),
        vec![(ErrorCode::E1003, "extraneous input '=' expecting {ID, INT}".to_string())]
    );
    // The deleted token stays in the tree as an error node.
    assert_eq!(result.to_string_tree(), "(prog (stat x = (expr = 1) ;) <EOF>)");
}

#[test]
fn test_missing_token_is_conjured() {
    let g = assign_grammar();
    let result = g.parse("x = 1");
    assert_eq!(
        messages(&result),
        vec![(ErrorCode::E1004, "missing ';' at '<EOF>'".to_string())]
    );
    assert_eq!(
        result.to_string_tree(),
        "(prog (stat x = (expr 1) <missing ';'>) <EOF>)"
    );
}

#[test]
fn test_missing_token_before_next_expected() {
    let g = assign_grammar();
    let result = g.parse("x 1 ;");
    assert_eq!(
        messages(&result),
        vec![(ErrorCode::E1004, "missing '=' at '1'".to_string())]
    );
}

#[test]
fn test_resync_skips_to_follow_set_and_reports_once() {
    let g = assign_grammar();
    let result = g.parse("x = + + ; y = 2 ;");
    assert_eq!(
        messages(&result),
        vec![(ErrorCode::E1001, "no viable alternative at input '+'".to_string())]
    );
    assert_eq!(
        result.to_string_tree(),
        "(prog (stat x = (expr + +) ;) (stat y = (expr 2) ;) <EOF>)"
    );
    assert_eq!(result.errors[0].context, vec!["expr", "stat", "prog"]);
}

#[test]
fn test_separate_errors_are_each_reported() {
    let g = assign_grammar();
    let result = g.parse("x = + ; y = = 2 ;");
    let codes: Vec<ErrorCode> = result.errors.iter().map(|e| e.code).collect();
    assert_eq!(codes, vec![ErrorCode::E1001, ErrorCode::E1003]);
}

#[test]
fn test_lookahead_failure_points_back_at_decision_start() {
    // s : (A B | A C) EOF ;
    let mut g = GrammarBuilder::new();
    let [a, b, c, d] = ["A", "B", "C", "D"].map(|n| g.token(n));
    let s = g.rule("s");
    g.define(
        s,
        Element::seq([
            Element::alt([Element::seq([a.into(), b.into()]), Element::seq([a.into(), c.into()])]),
            TokenType::EOF.into(),
        ]),
    );
    let engine = Engine::from(g.build().unwrap_or_else(|e| panic!("{e}")));
    let tokens = vec![
        Token::new(a).with_text("a").with_span(Span::new(0, 1)).at(1, 0),
        Token::new(d).with_text("d").with_span(Span::new(2, 3)).at(1, 2),
    ];
    let result = engine
        .interpreter(CommonTokenStream::new(tokens))
        .parse(s)
        .unwrap_or_else(|f| panic!("{f}"));

    assert_eq!(
        messages(&result),
        vec![(ErrorCode::E1001, "no viable alternative at input 'ad'".to_string())]
    );
    assert_eq!(result.errors[0].decision_start, Some(Span::new(0, 1)));
    let diagnostics = result.diagnostics(DiagnosticConfig::default());
    let labels: Vec<_> = diagnostics[0]
        .labels
        .iter()
        .map(|l| (l.span, l.message.as_str()))
        .collect();
    assert_eq!(labels, vec![(Span::new(2, 3), ""), (Span::new(0, 1), "decision started here")]);
}

#[test]
fn test_bail_stops_at_first_error() {
    let g = assign_grammar();
    let mut interp = g.engine.interpreter(g.input("x = + ; y = 2 ;"));
    interp.parser_mut().set_error_strategy(BailErrorStrategy::new());

    let outcome = interp.run(g.prog);
    let Err(ParseFailure::Cancelled(error)) = outcome else {
        panic!("expected cancellation, got {outcome:?}");
    };
    assert_eq!(error.offending.text.as_deref(), Some("+"));

    let parser = interp.parser();
    assert_eq!(parser.number_of_syntax_errors(), 1);
    assert_eq!(parser.errors()[0].code, ErrorCode::E1001);
    assert_eq!(parser.errors()[0].message, "no viable alternative at input '+'");
    // Every invocation on the stack carries the error.
    let arena = parser.arena();
    let with_error = arena.ids().filter(|&c| arena.get(c).error.is_some()).count();
    assert_eq!(with_error, 3);
}

#[test]
fn test_bail_cancels_inline_mismatch() {
    let g = assign_grammar();
    let mut interp = g.engine.interpreter(g.input("x 1 ;"));
    interp.parser_mut().set_error_strategy(BailErrorStrategy::new());
    let outcome = interp.run(g.prog);
    assert!(matches!(outcome, Err(ParseFailure::Cancelled(_))));
    assert_eq!(interp.parser().errors()[0].code, ErrorCode::E1002);
}

#[test]
fn test_recovery_mode_ends_on_next_match() {
    let g = assign_grammar();
    let mut rec: Recognizer<CommonTokenStream> =
        Recognizer::new(g.engine.clone(), g.input("x"), crate::ParserConfig::default());
    let mut strategy = DefaultErrorStrategy::new();
    let recovering = |s: &DefaultErrorStrategy| ErrorStrategy::<CommonTokenStream>::in_error_recovery_mode(s);
    assert!(!recovering(&strategy));

    let error = rec.input_mismatch();
    strategy.report_error(&mut rec, &error);
    assert!(recovering(&strategy));
    // A second report while recovering is swallowed.
    strategy.report_error(&mut rec, &error);
    assert_eq!(rec.number_of_syntax_errors(), 1);

    strategy.report_match(&mut rec);
    assert!(!recovering(&strategy));
}
