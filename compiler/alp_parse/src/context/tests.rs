use alp_ir::TokenType;
use pretty_assertions::assert_eq;

use super::*;

fn tok(kind: i32, text: &str) -> Token {
    Token::new(TokenType::new(kind)).with_text(text)
}

/// `(prog (stat x = 1 ;) stat)` with `stat` (rule 1) called from state 4.
fn sample() -> (ContextArena, ContextId, ContextId) {
    let mut arena = ContextArena::new();
    let prog = arena.alloc(RuleNode::new(RuleId::new(0), None, None));
    let stat = arena.alloc(RuleNode::new(RuleId::new(1), Some(prog), Some(StateId::new(4))));
    for t in [tok(1, "x"), tok(2, "="), tok(3, "1"), tok(4, ";")] {
        arena.add_child(stat, ParseChild::Token(t));
    }
    arena.add_child(prog, ParseChild::Rule(stat));
    let empty = arena.alloc(RuleNode::new(RuleId::new(1), Some(prog), Some(StateId::new(4))));
    arena.add_child(prog, ParseChild::Rule(empty));
    (arena, prog, stat)
}

#[test]
fn test_to_string_tree() {
    let (arena, prog, _) = sample();
    let tree = arena.to_string_tree(prog, &["prog", "stat"], &Vocabulary::default());
    assert_eq!(tree, "(prog (stat x = 1 ;) stat)");
}

#[test]
fn test_ancestors_and_depth() {
    let (arena, prog, stat) = sample();
    assert_eq!(arena.ancestors(stat).collect::<Vec<_>>(), vec![stat, prog]);
    assert_eq!(arena.depth(stat), 1);
    assert_eq!(arena.depth(prog), 0);
}

#[test]
fn test_rule_invocation_stack() {
    let (arena, _, stat) = sample();
    assert_eq!(
        arena.rule_invocation_stack(stat, &["prog", "stat"]),
        vec!["stat".to_string(), "prog".to_string()]
    );
}

#[test]
fn test_text_skips_eof() {
    let (mut arena, prog, _) = sample();
    arena.add_child(prog, ParseChild::Token(Token::eof()));
    assert_eq!(arena.text(prog), "x=1;");
}

#[test]
fn test_error_leaf_renders_like_token() {
    let mut arena = ContextArena::new();
    let root = arena.alloc(RuleNode::new(RuleId::new(0), None, None));
    arena.add_child(root, ParseChild::Error(tok(4, "<missing ';'>")));
    assert_eq!(
        arena.to_string_tree(root, &["prog"], &Vocabulary::default()),
        "(prog <missing ';'>)"
    );
}

#[test]
fn test_rule_children_filters_tokens() {
    let (arena, prog, stat) = sample();
    let children: Vec<_> = arena.get(prog).rule_children().collect();
    assert_eq!(children.len(), 2);
    assert_eq!(children[0], stat);
    assert!(arena.get(stat).rule_children().next().is_none());
}
