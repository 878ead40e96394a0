use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::path::PathBuf;
use std::process::Command;

fn write_files(dir: &tempfile::TempDir, files: &[(&str, &str)]) -> PathBuf {
    for (name, content) in files {
        std::fs::write(dir.path().join(name), content).unwrap();
    }
    dir.path().join(files[0].0)
}

#[test]
fn tree() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = write_files(&dir, &[("main.tex", "$x^2$")]);
    let mut cmd = Command::cargo_bin("texparse").unwrap();
    cmd.arg("tree").arg(&path);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(r#"(document (inline_math "x" "^" "2"))"#));
}

#[test]
fn tree_in_math_mode() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = write_files(&dir, &[("main.tex", r"\frac{a}{b}")]);
    let mut cmd = Command::cargo_bin("texparse").unwrap();
    cmd.args(["tree", "--mode", "math"]).arg(&path);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("(frac"));
}

#[test]
fn tokens() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = write_files(&dir, &[("main.tex", r"\relax a")]);
    let mut cmd = Command::cargo_bin("texparse").unwrap();
    cmd.arg("tokens").arg(&path);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("0..6\tControlSequence\t\"\\\\relax\""))
        .stdout(predicate::str::contains("7..8\tLetter\t\"a\""));
}

#[test]
fn check_without_diagnostics() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = write_files(&dir, &[("main.tex", r"\begin{itemize}\item a\end{itemize}")]);
    let mut cmd = Command::cargo_bin("texparse").unwrap();
    cmd.arg("check").arg(&path);
    cmd.assert().success().stderr(predicate::str::is_empty());
}

#[test]
fn check_with_diagnostics() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = write_files(&dir, &[("main.tex", r"\begingroup\egroup")]);
    let mut cmd = Command::cargo_bin("texparse").unwrap();
    cmd.arg("check").arg(&path);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("GroupKindMismatchError"))
        .stderr(predicate::str::contains("main.tex:1:12"))
        .stderr(predicate::str::contains("1 diagnostics"));
}

#[test]
fn check_json() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = write_files(&dir, &[("main.tex", "$x")]);
    let mut cmd = Command::cargo_bin("texparse").unwrap();
    cmd.args(["check", "--json"]).arg(&path);
    let output = cmd.output().unwrap();
    assert!(!output.status.success());
    let reports: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(
        reports[0]["diagnostics"][0]["kind"],
        serde_json::json!("UnterminatedMath")
    );
}

#[test]
fn input_is_resolved_relative_to_the_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = write_files(
        &dir,
        &[("main.tex", r"\input{defs}\x{a}"), ("defs.tex", r"\def\x#1{#1}")],
    );
    let mut cmd = Command::cargo_bin("texparse").unwrap();
    cmd.arg("tree").arg(&path);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(r#"(input "defs" (document (definition"#));
}

#[test]
fn diagnostics_in_included_files() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = write_files(&dir, &[("main.tex", r"\input broken "), ("broken.tex", "{")]);
    let mut cmd = Command::cargo_bin("texparse").unwrap();
    cmd.arg("check").arg(&path);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("UnbalancedGroupError"))
        .stderr(predicate::str::contains("broken:1:1"));
}

#[test]
fn missing_file() {
    let mut cmd = Command::cargo_bin("texparse").unwrap();
    cmd.args(["check", "does_not_exist.tex"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("failed to read `does_not_exist.tex`"));
}
