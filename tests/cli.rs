use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

fn flagfold() -> Command {
    Command::cargo_bin("flagfold").expect("flagfold binary not built")
}

#[test]
fn test_resolve_prints_decompositions() {
    flagfold()
        .args(["resolve", "--flags", "data/access_flags.cs", "6", "0x3", "32"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "6 => AccessTypes.Access.Write | AccessTypes.Access.Execute",
        ))
        .stdout(predicate::str::contains("0x3 => AccessTypes.Access.ReadWrite"))
        .stdout(predicate::str::contains("32 => unresolved (no entry for bit(s) [5])"));
}

#[test]
fn test_resolve_rejects_bad_number() {
    flagfold()
        .args(["resolve", "--flags", "data/access_flags.cs", "twelve"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid number"));
}

#[test]
fn test_inspect_json() {
    flagfold()
        .args(["inspect", "--flags", "data/access_flags.cs", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"Sample.Security.AccessTypes+Access\""));
}

#[test]
fn test_convert_dry_run_leaves_files_alone() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("Policies.cs");
    fs::copy("data/Policies.cs", &source).unwrap();
    let before = fs::read_to_string(&source).unwrap();

    flagfold()
        .args(["convert", "--flags", "data/access_flags.cs", "--bit-argument", "SetBit:1", "--dry-run"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Replaced 14 nodes"))
        .stdout(predicate::str::contains("Warnings: 2"))
        .stdout(predicate::str::contains("Errors: 1"));

    assert_eq!(fs::read_to_string(&source).unwrap(), before);
}

#[test]
fn test_convert_into_output_dir_with_log() {
    let out = tempdir().unwrap();
    let logs = tempdir().unwrap();

    flagfold()
        .args(["convert", "--flags", "data/access_flags.cs", "--config", "data/policies.json"])
        .arg("data/Policies.cs")
        .arg("--output-dir")
        .arg(out.path())
        .arg("--save-log")
        .arg(logs.path())
        .assert()
        .success();

    let rewritten = fs::read_to_string(out.path().join("Policies.cs")).unwrap();
    assert!(rewritten.contains("SetBit((int)mode, AccessTypes.Access.Execute | AccessTypes.Access.Delete, 1)"));

    let saved: Vec<_> = fs::read_dir(logs.path()).unwrap().collect();
    assert_eq!(saved.len(), 1);
}

#[test]
fn test_convert_json_report() {
    flagfold()
        .args(["convert", "--flags", "data/access_flags.cs", "--dry-run", "--report", "json"])
        .arg("data/Policies.cs")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"flag_set\": \"Sample.Security.AccessTypes+Access\""))
        .stdout(predicate::str::contains("\"kind\": \"UnresolvedBits\""));
}

#[test]
fn test_convert_missing_enum_fails() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("Other.cs"), "class Other { }").unwrap();

    flagfold()
        .args(["convert", "--flags", "data/access_flags.cs"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Sample.Security.AccessTypes+Access"));
}

#[test]
fn test_resolve_qualifier_override() {
    flagfold()
        .args(["resolve", "--flags", "data/access_flags.cs", "--qualifier", "A.", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("5 => A.Read | A.Execute"));
}

#[test]
fn test_convert_output_dir_keeps_relative_paths() {
    let input = tempdir().unwrap();
    let out = tempdir().unwrap();
    fs::copy("data/access_flags.cs", input.path().join("AccessTypes.cs")).unwrap();
    for (folder, value) in [("a", 5), ("b", 6)] {
        fs::create_dir(input.path().join(folder)).unwrap();
        let source = format!(
            "namespace Sample.Security\n{{\n    class Gate\n    {{\n        AccessTypes.Access mode = {};\n    }}\n}}\n",
            value
        );
        fs::write(input.path().join(folder).join("Gate.cs"), source).unwrap();
    }

    flagfold()
        .args(["convert", "--flags", "data/access_flags.cs"])
        .arg(input.path())
        .arg("--output-dir")
        .arg(out.path())
        .assert()
        .success();

    let a = fs::read_to_string(out.path().join("a").join("Gate.cs")).unwrap();
    let b = fs::read_to_string(out.path().join("b").join("Gate.cs")).unwrap();
    assert!(a.contains("mode = AccessTypes.Access.Read | AccessTypes.Access.Execute;"));
    assert!(b.contains("mode = AccessTypes.Access.Write | AccessTypes.Access.Execute;"));
}

#[test]
fn test_convert_output_dir_rejects_colliding_names() {
    let first = tempdir().unwrap();
    let second = tempdir().unwrap();
    let out = tempdir().unwrap();
    fs::copy("data/access_flags.cs", first.path().join("AccessTypes.cs")).unwrap();
    for dir in [&first, &second] {
        fs::write(dir.path().join("Gate.cs"), "class Gate { AccessTypes.Access mode = 1; }").unwrap();
    }

    flagfold()
        .args(["convert", "--flags", "data/access_flags.cs"])
        .arg(first.path().join("AccessTypes.cs"))
        .arg(first.path().join("Gate.cs"))
        .arg(second.path().join("Gate.cs"))
        .arg("--output-dir")
        .arg(out.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("would both be written to"));

    assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);
}
