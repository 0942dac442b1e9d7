use flagfold::config::BitArgumentFunction;
use flagfold::{ConvertOptions, Converter, DiagnosticKind, FlagfoldError, SourceDocument};
use std::fs;

fn declaration() -> String {
    fs::read_to_string("data/access_flags.cs").expect("Failed to read access_flags.cs")
}

fn policies() -> SourceDocument {
    let text = fs::read_to_string("data/Policies.cs").expect("Failed to read Policies.cs");
    SourceDocument::new("Policies.cs", text)
}

fn options() -> ConvertOptions {
    let mut options = ConvertOptions::default();
    options.bit_argument_functions.push("SetBit:1".parse::<BitArgumentFunction>().unwrap());
    options
}

#[test]
fn test_policies_fixture() {
    let mut converter = Converter::new(options());
    let summary = converter
        .run(&declaration(), &[policies()])
        .expect("Failed to convert Policies.cs");

    assert_eq!(summary.flag_set, "Sample.Security.AccessTypes+Access");
    let rewritten = &summary.documents[0].rewritten;
    let expected = [
        "Registry.Current = AccessTypes.Access.None;",
        "Registry.Current = AccessTypes.Access.Read | AccessTypes.Access.Execute;",
        "if (Registry.Current.HasFlag(AccessTypes.Access.Write))",
        "AccessTypes.Access mode = AccessTypes.Access.Execute | AccessTypes.Access.Delete;",
        "mode = (AccessTypes.Access)((int)mode & ~(AccessTypes.Access.Write | AccessTypes.Access.Execute));",
        "SetBit((int)mode, AccessTypes.Access.Execute | AccessTypes.Access.Delete, 1)",
        "if ((int)mode == (AccessTypes.Access.Write | AccessTypes.Access.Execute))",
        "if (!mode.HasFlag(AccessTypes.Access.Delete) && mode.HasFlag(AccessTypes.Access.Share))",
        "case AccessTypes.Access.Read:",
        "case (AccessTypes.Access.Write | AccessTypes.Access.Execute):",
        "Apply(AccessTypes.Access.ReadWrite, 7);",
        "Default(AccessTypes.Access fallback = AccessTypes.Access.Read | AccessTypes.Access.Execute)",
        "return AccessTypes.Access.Delete | AccessTypes.Access.Share;",
    ];
    for line in expected {
        assert!(rewritten.contains(line), "missing `{}` in:\n{}", line, rewritten);
    }

    // left alone: a foreign operand, a doubled bit and an unknown bit
    assert!(rewritten.contains("(AccessTypes.Access)(1 + 2 + count)"));
    assert!(rewritten.contains("(AccessTypes.Access)((int)mode | 2 | 2)"));
    assert!(rewritten.contains("mode += 32;"));
    // enum members and non-flag code are untouched
    assert!(rewritten.contains("ReadWrite = Read | Write,"));
    assert!(rewritten.contains("return value | bit;"));
    assert!(rewritten.contains("Apply(AccessTypes.Access access, int times = 3)"));

    assert_eq!(summary.replaced, 14);
    assert_eq!(summary.warnings, 2);
    assert_eq!(summary.errors, 1);
    let kinds: Vec<DiagnosticKind> = summary.diagnostics.iter().map(|d| d.kind).collect();
    assert!(kinds.contains(&DiagnosticKind::AmbiguousExpression));
    assert!(kinds.contains(&DiagnosticKind::DuplicateBitContribution));
    assert!(kinds.contains(&DiagnosticKind::UnresolvedBits));
}

#[test]
fn test_second_run_is_stable() {
    let mut converter = Converter::new(options());
    let first = converter.run(&declaration(), &[policies()]).unwrap();
    let once = SourceDocument::new("Policies.cs", first.documents[0].rewritten.clone());

    let second = converter.run(&declaration(), &[once]).unwrap();
    assert_eq!(second.replaced, 0);
    assert!(!second.documents[0].is_changed());
}

#[test]
fn test_identity_mismatch_aborts() {
    let declaration = fs::read_to_string("data/mismatched_flags.cs").unwrap();
    let mut converter = Converter::new(options());
    let err = converter.run(&declaration, &[policies()]).unwrap_err();
    assert!(matches!(err, FlagfoldError::IdentityMismatch { .. }));
}

#[test]
fn test_flag_set_not_found() {
    let mut converter = Converter::new(ConvertOptions::default());
    let document = SourceDocument::new("Other.cs", "class Other { void Run() { } }");
    let err = converter.run(&declaration(), &[document]).unwrap_err();
    assert_eq!(
        err,
        FlagfoldError::FlagSetNotFound {
            name: "Sample.Security.AccessTypes+Access".to_string()
        }
    );
}

#[test]
fn test_advisories_for_loose_declaration() {
    let declaration = "enum Mode { Fast = 1, Safe = 2 }";
    let source = r#"
        namespace App
        {
            enum Mode { Fast = 1, Safe = 2 }

            class Runner
            {
                Mode current = (Mode)3;
            }
        }
    "#;
    let mut converter = Converter::new(ConvertOptions::default());
    let summary = converter
        .run(declaration, &[SourceDocument::new("Runner.cs", source)])
        .unwrap();

    let advisories = summary
        .diagnostics
        .iter()
        .filter(|d| d.kind == DiagnosticKind::Advisory)
        .count();
    // enclosing namespace missing from the declaration, no [Flags], no zero entry
    assert_eq!(advisories, 3);
    assert!(summary.documents[0].rewritten.contains("Mode current = Mode.Fast | Mode.Safe;"));
}

#[test]
fn test_unparsable_document_is_skipped() {
    let mut converter = Converter::new(options());
    let broken = SourceDocument::new("Broken.cs", "class Broken { /* never closed }");
    let summary = converter.run(&declaration(), &[policies(), broken]).unwrap();

    assert_eq!(summary.documents.len(), 2);
    assert!(!summary.documents[1].is_changed());
    assert!(summary
        .diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::DocumentSkipped));
}
