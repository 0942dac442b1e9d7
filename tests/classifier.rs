use flagfold::rewrite_expression;
use flagfold::{ConvertOptions, DiagnosticKind, FlagSet, Outcome};

fn flag_type() -> FlagSet {
    FlagSet::build("[Flags] enum FlagType { NONE = 0, A = 1, B = 2, C = 4 }").unwrap()
}

fn rewrite(expression: &str, subject: Option<&str>, allow_grouping_parens: bool) -> (String, Outcome, Vec<DiagnosticKind>) {
    let result = rewrite_expression(
        &flag_type(),
        expression,
        subject,
        allow_grouping_parens,
        &ConvertOptions::default(),
    )
    .expect("Failed to rewrite expression");
    let kinds = result.context.diagnostics().iter().map(|d| d.kind).collect();
    (result.text, result.outcome, kinds)
}

#[test]
fn test_plain_literals() {
    assert_eq!(rewrite("6", None, false).0, "FlagType.B | FlagType.C");
    assert_eq!(rewrite("0", None, false).0, "FlagType.NONE");
    assert_eq!(rewrite("6", None, true).0, "(FlagType.B | FlagType.C)");
    assert_eq!(rewrite("(FlagType)(1 + 2)", None, false).0, "FlagType.A | FlagType.B");
}

#[test]
fn test_has_flag_greater_than_zero() {
    let (text, outcome, kinds) = rewrite("((int)x & 2) > 0", Some("x"), true);
    assert_eq!(text, "x.HasFlag(FlagType.B)");
    assert_eq!(outcome, Outcome::HasFlag);
    assert!(kinds.is_empty());
}

#[test]
fn test_has_flag_negated() {
    let (text, outcome, _) = rewrite("((int)x & 6) == 0", Some("x"), true);
    assert_eq!(text, "!x.HasFlag(FlagType.B | FlagType.C)");
    assert_eq!(outcome, Outcome::HasFlag);
}

#[test]
fn test_has_flag_equal_to_mask() {
    assert_eq!(rewrite("(x & 4) == 4", Some("x"), true).0, "x.HasFlag(FlagType.C)");
    // a computed mask is folded in place instead
    assert_eq!(rewrite("(x & 1 << 2) > 0", Some("x"), true).0, "(x & FlagType.C) > 0");
}

#[test]
fn test_has_flag_through_conversion() {
    let (text, _, _) = rewrite("((int)x & Conversions.ToInteger(2)) > 0", Some("x"), true);
    assert_eq!(text, "x.HasFlag(FlagType.B)");
}

#[test]
fn test_custom_has_flag_method() {
    let options = ConvertOptions {
        has_flag_method: "Contains".to_string(),
        ..ConvertOptions::default()
    };
    let result = rewrite_expression(&flag_type(), "(x & 1) > 0", Some("x"), true, &options).unwrap();
    assert_eq!(result.text, "x.Contains(FlagType.A)");
}

#[test]
fn test_mixed_operands() {
    assert_eq!(rewrite("x | 2", Some("x"), false).0, "x | FlagType.B");
    assert_eq!(rewrite("x == 2 + 4", Some("x"), true).0, "x == (FlagType.B | FlagType.C)");
    assert_eq!(rewrite("x & ~(2 | 4)", Some("x"), false).0, "x & ~(FlagType.B | FlagType.C)");
}

#[test]
fn test_unresolved_literal_is_left_alone() {
    let set = FlagSet::build("enum Small { A = 1, B = 2 }").unwrap();
    let result = rewrite_expression(&set, "5", None, false, &ConvertOptions::default()).unwrap();
    assert_eq!(result.text, "5");
    assert_eq!(result.outcome, Outcome::Unchanged);
    assert_eq!(result.context.errors(), 1);
    assert_eq!(result.context.diagnostics()[0].kind, DiagnosticKind::UnresolvedBits);
}

#[test]
fn test_duplicate_bits_reject_expression() {
    let (text, outcome, kinds) = rewrite("2 | 4 | 2", None, false);
    assert_eq!(text, "2 | 4 | 2");
    assert_eq!(outcome, Outcome::Rejected(DiagnosticKind::DuplicateBitContribution));
    assert_eq!(kinds, vec![DiagnosticKind::DuplicateBitContribution]);

    let (text, _, _) = rewrite("x | 2 | 4 | 2", Some("x"), false);
    assert_eq!(text, "x | 2 | 4 | 2");
}

#[test]
fn test_repeated_subject_is_ambiguous() {
    let (text, outcome, kinds) = rewrite("x + x", Some("x"), false);
    assert_eq!(text, "x + x");
    assert_eq!(outcome, Outcome::Rejected(DiagnosticKind::AmbiguousExpression));
    assert_eq!(kinds, vec![DiagnosticKind::AmbiguousExpression]);
}

#[test]
fn test_foreign_identifier_is_ambiguous() {
    let (text, outcome, _) = rewrite("x | y | 2", Some("x"), false);
    assert_eq!(text, "x | y | 2");
    assert_eq!(outcome, Outcome::Rejected(DiagnosticKind::AmbiguousExpression));
}

#[test]
fn test_each_literal_rewritten_once() {
    let result = rewrite_expression(
        &flag_type(),
        "((int)x & 1 << 2) > 1 << 2",
        Some("x"),
        true,
        &ConvertOptions::default(),
    )
    .unwrap();
    assert_eq!(result.text, "((int)x & FlagType.C) > FlagType.C");
    assert_eq!(result.outcome, Outcome::Rewritten(2));
    assert_eq!(result.context.replaced(), 2);
    assert!(result.context.diagnostics().is_empty());
}

#[test]
fn test_shift_count_wraps_at_int_width() {
    let (text, outcome, kinds) = rewrite("x | 1 << 33", Some("x"), false);
    assert_eq!(text, "x | FlagType.B");
    assert_eq!(outcome, Outcome::Rewritten(1));
    assert!(kinds.is_empty());
}
