use flagfold::locator::{CandidateKind, Locator, SymbolTable};
use flagfold::syntax::parse_source;
use flagfold::{ConvertOptions, DiagnosticKind, FlagSet, RunContext};

const SETTINGS: &str = r#"
class Settings
{
    [Flags]
    enum Mode { None = 0, A = 1, B = 2 }

    static Mode current = (Mode)1;

    static Mode Pick(Mode fallback = (Mode)2)
    {
        if ((current & Mode.A) == 0 && (current & Mode.B) == 0)
        {
        }
        switch (current)
        {
            case (Mode)3:
                break;
        }
        Take(current, 2);
        return (Mode)3;
    }

    static void Take(Mode mode, int count)
    {
        if (current + current == 3)
        {
        }
    }
}
"#;

#[test]
fn test_candidate_kinds_in_source_order() {
    let file = parse_source(SETTINGS).expect("Failed to parse");
    let flag_set = FlagSet::build(SETTINGS).expect("Failed to build flag set");
    let options = ConvertOptions::default();
    let symbols = SymbolTable::collect([&file], &flag_set);

    let mut ctx = RunContext::new();
    ctx.begin_document("Settings.cs");
    let located = Locator::new(&flag_set, &options, &symbols).locate(&mut ctx, &file);

    let kinds: Vec<CandidateKind> = located.candidates.iter().map(|c| c.kind).collect();
    assert_eq!(
        kinds,
        vec![
            CandidateKind::Declaration,
            CandidateKind::Parameter,
            CandidateKind::Condition,
            CandidateKind::Condition,
            CandidateKind::CaseLabel,
            CandidateKind::Argument,
            CandidateKind::Return,
        ]
    );

    let texts: Vec<&str> = located.candidates.iter().map(|c| file.tree.text(c.root)).collect();
    assert_eq!(texts[0], "(Mode)1");
    assert_eq!(texts[2], "(current & Mode.A) == 0");
    assert_eq!(texts[3], "(current & Mode.B) == 0");
    assert_eq!(texts[5], "current");

    assert_eq!(located.candidates[2].subject.as_deref(), Some("current"));
    assert!(located.candidates[2].allow_grouping_parens());
    assert!(!located.candidates[6].allow_grouping_parens());

    // `current + current == 3` has no logical operator between the uses
    assert_eq!(ctx.warnings(), 1);
    assert_eq!(ctx.diagnostics()[0].kind, DiagnosticKind::AmbiguousExpression);
}

#[test]
fn test_bit_argument_functions() {
    let source = r#"
        class Bits
        {
            enum Mode { None = 0, A = 1 }
            static int Set(int value, int bit) { return value | bit; }
            static void Run(int value)
            {
                value = Set(value, 1 | 2);
            }
        }
    "#;
    let file = parse_source(source).unwrap();
    let flag_set = FlagSet::build(source).unwrap();
    let options = ConvertOptions::from_json_str(r#"{ "bit_argument_functions": [{ "name": "Set", "argument": 1 }] }"#)
        .expect("Failed to read options");
    let symbols = SymbolTable::collect([&file], &flag_set);

    let mut ctx = RunContext::new();
    ctx.begin_document("Bits.cs");
    let located = Locator::new(&flag_set, &options, &symbols).locate(&mut ctx, &file);

    assert_eq!(located.candidates.len(), 1);
    assert_eq!(located.candidates[0].kind, CandidateKind::Argument);
    assert_eq!(file.tree.text(located.candidates[0].root), "1 | 2");
    assert_eq!(located.candidates[0].subject, None);
}
