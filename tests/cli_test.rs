//! End-to-end CLI contract tests
//!
//! Verifies `scan`, `query`, `raw-query`, `xref walk`, and `bridges` against
//! small fixture repos written to a temp directory, driving the actual
//! `loctrace` binary rather than the library directly.

use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

fn loctrace_bin() -> &'static str {
    env!("CARGO_BIN_EXE_loctrace")
}

fn run(dir: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(loctrace_bin())
        .args(args)
        .current_dir(dir)
        .output()
        .expect("failed to execute loctrace binary");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);
    (stdout, stderr, code)
}

fn single_file_repo() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("main.go"), "package main\n\nfunc A() {}\n").unwrap();
    dir
}

#[test]
fn scan_reports_files_and_writes_default_cache_path() {
    let dir = single_file_repo();
    let (stdout, stderr, code) = run(dir.path(), &["scan", "."]);
    assert_eq!(code, 0, "stderr: {stderr}");
    assert!(stdout.contains("1 files indexed"), "stdout: {stdout}");
}

#[test]
fn scan_json_emits_a_symbol_for_the_one_function() {
    let dir = single_file_repo();
    let (stdout, stderr, code) = run(dir.path(), &["scan", ".", "--json"]);
    assert_eq!(code, 0, "stderr: {stderr}");
    let value: serde_json::Value = serde_json::from_str(&stdout).expect("valid JSON");
    let files = value["files"].as_array().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0]["path"], "main.go");
    let symbols = files[0]["symbols"].as_array().unwrap();
    assert_eq!(symbols.len(), 1);
    assert_eq!(symbols[0]["kind"], "function_definition");
    assert_eq!(symbols[0]["name"], "A");
}

#[test]
fn query_selects_only_matching_functions() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("svc.go"),
        "package main\n\nfunc HandleRequest() {}\n\nfunc helper() {}\n",
    )
    .unwrap();

    let (stdout, stderr, code) = run(
        dir.path(),
        &["query", "function_definition[name=/^Handle/]", "--path", "."],
    );
    assert_eq!(code, 0, "stderr: {stderr}");
    assert!(stdout.contains("HandleRequest"), "stdout: {stdout}");
    assert!(!stdout.contains("helper"), "stdout: {stdout}");
}

#[test]
fn raw_query_finds_function_names_and_reports_no_language_errors() {
    let dir = single_file_repo();
    let (stdout, stderr, code) = run(
        dir.path(),
        &[
            "raw-query",
            "(function_declaration name: (identifier) @fn.name)",
            "--path",
            ".",
            "--json",
        ],
    );
    assert_eq!(code, 0, "stderr: {stderr}");
    let value: serde_json::Value = serde_json::from_str(&stdout).expect("valid JSON");
    let captures = value["captures"].as_array().unwrap();
    assert_eq!(captures.len(), 1);
    assert_eq!(captures[0]["capture"], "fn.name");
    assert_eq!(captures[0]["text"], "A");
    assert!(value["language_errors"].as_array().unwrap().is_empty());
}

#[test]
fn xref_walk_resolves_cross_file_global_call() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("src")).unwrap();
    std::fs::create_dir_all(dir.path().join("lib")).unwrap();
    std::fs::write(
        dir.path().join("src/caller.go"),
        "package src\n\nfunc Invoke() {\n\tTarget()\n}\n",
    )
    .unwrap();
    std::fs::write(dir.path().join("lib/target.go"), "package lib\n\nfunc Target() {}\n").unwrap();

    let (stdout, stderr, code) = run(
        dir.path(),
        &["xref", "walk", "src/caller.go::Invoke", "--path", ".", "--depth", "1"],
    );
    assert_eq!(code, 0, "stderr: {stderr}");
    assert!(stdout.contains("Invoke"), "stdout: {stdout}");
    assert!(stdout.contains("Target"), "stdout: {stdout}");
}

#[test]
fn bridges_reports_components_for_a_go_module_layout() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("go.mod"), "module example.com/repo\n\ngo 1.21\n").unwrap();
    std::fs::create_dir_all(dir.path().join("cmd/api")).unwrap();
    std::fs::create_dir_all(dir.path().join("internal/store")).unwrap();
    std::fs::create_dir_all(dir.path().join("internal/model")).unwrap();
    std::fs::write(
        dir.path().join("cmd/api/main.go"),
        "package main\n\nimport \"example.com/repo/internal/store\"\n\nfunc main() {\n\tstore.Open()\n}\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("internal/store/store.go"),
        "package store\n\nimport \"example.com/repo/internal/model\"\n\nfunc Open() {\n\tmodel.New()\n}\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("internal/model/model.go"),
        "package model\n\nfunc New() {}\n",
    )
    .unwrap();

    let (stdout, stderr, code) = run(dir.path(), &["bridges", "--path", "."]);
    assert_eq!(code, 0, "stderr: {stderr}");
    assert!(stdout.contains("->"), "expected at least one bridge edge in: {stdout}");
}

#[test]
fn loctrace_toml_exclude_prunes_generated_directory_from_scan() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("main.go"), "package main\n\nfunc A() {}\n").unwrap();
    std::fs::create_dir(dir.path().join("generated")).unwrap();
    std::fs::write(dir.path().join("generated/codegen.go"), "package generated\n\nfunc Gen() {}\n").unwrap();
    std::fs::write(
        dir.path().join("loctrace.toml"),
        "[exclude]\npaths = [\"generated/\"]\n",
    )
    .unwrap();

    let (stdout, stderr, code) = run(dir.path(), &["scan", ".", "--json"]);
    assert_eq!(code, 0, "stderr: {stderr}");
    let value: serde_json::Value = serde_json::from_str(&stdout).expect("valid JSON");
    let files: Vec<&str> = value["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["path"].as_str().unwrap())
        .collect();
    assert_eq!(files, vec!["main.go"]);
}
