use super::*;
use pretty_assertions::assert_eq;

#[test]
fn test_no_viable_alternative_points_back_at_decision_start() {
    let diag = Diagnostic::error(ErrorCode::E1001)
        .with_message("no viable alternative at input 'a b ;'")
        .with_label(Span::new(4, 5), "")
        .with_secondary_label(Span::new(0, 1), "decision started here")
        .with_note("while parsing `stat` (prog > stat)");

    assert!(!diag.is_fatal());
    assert_eq!(
        diag.to_string(),
        "error[E1001]: no viable alternative at input 'a b ;'\n  --> 4..5\n  ::: 0..1 decision started here\n  = note: while parsing `stat` (prog > stat)"
    );
}

#[test]
fn test_display_format() {
    let diag = Diagnostic::error(ErrorCode::E1004)
        .with_message("missing ';' at 'b'")
        .with_label(Span::new(6, 7), "")
        .with_note("while parsing stat");
    assert_eq!(
        diag.to_string(),
        "error[E1004]: missing ';' at 'b'\n  --> 6..7\n  = note: while parsing stat"
    );
}

#[test]
fn test_fatal_severity() {
    let diag = Diagnostic::fatal(ErrorCode::E9001).with_message("rule `expr` nested too deep");
    assert!(diag.is_fatal());
    assert_eq!(diag.to_string(), "fatal[E9001]: rule `expr` nested too deep");
    assert!(diag.labels.is_empty());
}
