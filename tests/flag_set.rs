use flagfold::{Decomposition, FlagEntry, FlagSet, FlagfoldError};
use std::fs;

fn flag_type() -> FlagSet {
    FlagSet::build("[Flags] enum FlagType { NONE = 0, A = 1, B = 2, C = 4 }").unwrap()
}

#[test]
fn test_exact_values_and_composites() {
    let set = flag_type();
    assert_eq!(set.resolve_text(0), Some(("FlagType.NONE".to_string(), 1)));
    assert_eq!(set.resolve_text(2), Some(("FlagType.B".to_string(), 1)));
    assert_eq!(set.resolve_text(6), Some(("FlagType.B | FlagType.C".to_string(), 2)));
    assert_eq!(
        set.resolve_text(7),
        Some(("FlagType.A | FlagType.B | FlagType.C".to_string(), 3))
    );
}

#[test]
fn test_alias_wins_over_bits() {
    let set = FlagSet::build("enum Access { Read = 1, Write = 2, ReadWrite = Read | Write }").unwrap();
    match set.resolve(3) {
        Decomposition::Exact(entry) => assert_eq!(entry.name, "ReadWrite"),
        other => panic!("expected exact match, got {:?}", other),
    }
}

#[test]
fn test_unresolved_bits_keep_resolved_part() {
    let set = FlagSet::new("F", vec![FlagEntry::new("A", 1), FlagEntry::new("B", 2)]);
    match set.resolve(5) {
        Decomposition::Unresolved { resolved, missing_bits } => {
            assert_eq!(resolved.len(), 1);
            assert_eq!(resolved[0].name, "A");
            assert_eq!(missing_bits, vec![2]);
        }
        other => panic!("expected unresolved, got {:?}", other),
    }
    assert_eq!(set.resolve_text(5), None);
}

#[test]
fn test_zero_without_zero_entry_is_unresolved() {
    let set = FlagSet::new("F", vec![FlagEntry::new("A", 1)]);
    assert!(!set.resolve(0).is_resolved());
}

#[test]
fn test_rendered_names_or_back_to_value() {
    let text = fs::read_to_string("data/access_flags.cs").expect("Failed to read access_flags.cs");
    let mut set = FlagSet::build(&text).expect("Failed to build flag set");
    set.set_qualifier(set.type_qualifier());

    let mut resolvable = 0;
    for n in 0..64 {
        let Some((rendered, count)) = set.resolve_text(n) else {
            continue;
        };
        resolvable += 1;
        let names: Vec<&str> = rendered.split(" | ").collect();
        assert_eq!(names.len(), count, "{} => {}", n, rendered);

        let value = names.iter().fold(0, |acc, name| {
            let member = name
                .strip_prefix("AccessTypes.Access.")
                .unwrap_or_else(|| panic!("unqualified name {} for {}", name, n));
            acc | set.entry(member).map(|e| e.value).expect("rendered name is an entry")
        });
        assert_eq!(value, n, "{} => {}", n, rendered);
        assert_eq!(set.resolve_text(n), Some((rendered, count)));
    }
    // 0 through 31 resolve, 32 and up need bit 5
    assert_eq!(resolvable, 32);
}

#[test]
fn test_fixture_declaration() {
    let text = fs::read_to_string("data/access_flags.cs").expect("Failed to read access_flags.cs");
    let set = FlagSet::build(&text).expect("Failed to build flag set");

    assert_eq!(set.name(), "Access");
    assert_eq!(set.len(), 7);
    assert!(set.has_flags_attribute());
    assert!(set.has_zero_entry());
    assert_eq!(set.type_qualifier(), "AccessTypes.Access.");
    assert_eq!(set.full_path(), vec!["Sample", "Security", "AccessTypes", "Access"]);
    assert_eq!(set.entry("ReadWrite").map(|e| e.value), Some(3));
    assert_eq!(set.entry("ReadWrite").and_then(|e| e.bit), None);
    assert_eq!(set.entry("Share").and_then(|e| e.bit), Some(4));

    let json = serde_json::to_string(&set).expect("Failed to serialize flag set");
    assert!(json.contains("\"ReadWrite\""));
}

#[test]
fn test_declaration_errors() {
    assert_eq!(FlagSet::build("class Empty { }"), Err(FlagfoldError::NoFlagSet));
    assert!(matches!(
        FlagSet::build("enum E { A = 1, B = Lookup() }"),
        Err(FlagfoldError::InvalidEntry { .. })
    ));
}
