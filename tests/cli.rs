use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::tempdir;

fn write_file(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn sagg(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sagg"))
        .current_dir(dir)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn combined(dir: &Path) -> String {
    fs::read_to_string(dir.join("combined_code.txt")).unwrap()
}

#[test]
fn cli_writes_one_section_per_file() {
    let dir = tempdir().unwrap();

    write_file(&dir.path().join("main.py"), "import util\nutil.run()\n");
    write_file(&dir.path().join("util.py"), "def run():\n    return 1\n\n\n");
    write_file(&dir.path().join("README.md"), "# not python\n");

    let output = sagg(dir.path(), &[]);
    assert!(output.status.success());

    assert_eq!(
        combined(dir.path()),
        "===== main.py =====\nimport util\nutil.run()\n\n\
         ===== util.py =====\ndef run():\n    return 1\n\n"
    );

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.starts_with("Summary:\nIncluded Files: 2\n  - main.py\n  - util.py\n"));
    assert!(stdout.contains("Written to: combined_code.txt\n"));
    assert!(stdout.contains("Total Tokens in combined_code.txt: "));
}

#[test]
fn cli_remove_comments() {
    let dir = tempdir().unwrap();

    write_file(
        &dir.path().join("app.py"),
        "def handler(event):\n    \"\"\"Handle it.\"\"\"\n\nvalue = 3  # answer\n",
    );

    let output = sagg(dir.path(), &["-r"]);
    assert!(output.status.success());

    assert_eq!(
        combined(dir.path()),
        "===== app.py =====\ndef handler(event):\n    pass\n\nvalue = 3\n\n"
    );
}

#[test]
fn cli_show_definitions() {
    let dir = tempdir().unwrap();

    write_file(
        &dir.path().join("shapes.py"),
        "class Point:\n    def __init__(self, x, y):\n        self.x = x\n\n\
         def area(w, h):\n    return w * h\n\n_cache = {}\nORIGIN = Point(0, 0)\n",
    );

    let output = sagg(dir.path(), &["--show-defs"]);
    assert!(output.status.success());

    assert_eq!(
        combined(dir.path()),
        "===== shapes.py =====\nClasses:\n  Point(x, y)\nFunctions:\n  area(w, h)\nVariables:\n  ORIGIN\n\n"
    );
}

#[test]
fn cli_skips_untokenizable_file_and_reports_it() {
    let dir = tempdir().unwrap();

    write_file(&dir.path().join("bad.py"), "text = \"\"\"never closed\n");
    write_file(&dir.path().join("good.py"), "ok = True\n");

    let output = sagg(dir.path(), &["-r", "--json"]);
    assert!(output.status.success());

    assert_eq!(combined(dir.path()), "===== good.py =====\nok = True\n\n");

    let stdout = String::from_utf8(output.stdout).unwrap();
    let v: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(v["included"].as_array().unwrap().len(), 1);
    assert_eq!(v["skipped"][0]["label"], "bad.py");
    assert!(v["skipped"][0]["reason"]
        .as_str()
        .unwrap()
        .contains("unterminated triple-quoted string literal"));
    assert!(v["tokens"].as_u64().unwrap() > 0);
}

#[test]
fn cli_search_depth() {
    let dir = tempdir().unwrap();

    write_file(&dir.path().join("top.py"), "A = 1\n");
    write_file(&dir.path().join("pkg/mid.py"), "B = 2\n");
    write_file(&dir.path().join("pkg/sub/low.py"), "C = 3\n");

    let output = sagg(dir.path(), &["--json"]);
    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let labels: Vec<String> = v["included"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["label"].as_str().unwrap().replace('\\', "/"))
        .collect();
    assert_eq!(labels, vec!["pkg/mid.py", "top.py"]);

    let output = sagg(dir.path(), &["-d", "0", "--json"]);
    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(v["included"].as_array().unwrap().len(), 1);

    let output = sagg(dir.path(), &["-d", "2", "--json"]);
    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(v["included"].as_array().unwrap().len(), 3);
}

#[test]
fn cli_no_filter_for_keeps_file_verbatim() {
    let dir = tempdir().unwrap();

    write_file(&dir.path().join("config.py"), "# keep me\nDEBUG = True\n");
    write_file(&dir.path().join("main.py"), "# drop me\nrun = 1\n");

    let output = sagg(dir.path(), &["-r", "-e", "config.py"]);
    assert!(output.status.success());

    assert_eq!(
        combined(dir.path()),
        "===== config.py =====\n# keep me\nDEBUG = True\n\n===== main.py =====\n\nrun = 1\n\n"
    );
}

#[test]
fn cli_overwrites_existing_output_without_aggregating_it() {
    let dir = tempdir().unwrap();

    write_file(&dir.path().join("a.py"), "x = 1\n");
    write_file(&dir.path().join("out.py"), "stale = True\n");

    let output = sagg(dir.path(), &["-o", "out.py"]);
    assert!(output.status.success());

    let written = fs::read_to_string(dir.path().join("out.py")).unwrap();
    assert_eq!(written, "===== a.py =====\nx = 1\n\n");

    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("overwritten"));
}

#[test]
fn cli_respects_saggignore_and_hidden() {
    let dir = tempdir().unwrap();

    write_file(&dir.path().join("a.py"), "a = 1\n");
    write_file(&dir.path().join("ignored.py"), "b = 2\n");
    write_file(&dir.path().join(".hidden.py"), "c = 3\n");
    write_file(&dir.path().join(".saggignore"), "ignored.py\n");

    let output = sagg(dir.path(), &["--json"]);
    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let labels: Vec<&str> = v["included"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["label"].as_str().unwrap())
        .collect();
    assert_eq!(labels, vec!["a.py"]);
}

#[test]
fn cli_missing_root_exit_code() {
    let dir = tempdir().unwrap();

    let output = sagg(dir.path(), &["missing"]);

    assert_eq!(output.status.code(), Some(3));
    assert!(!dir.path().join("combined_code.txt").exists());
}

#[test]
fn cli_json_error_output_is_valid_json_even_with_quotes_in_path() {
    let dir = tempdir().unwrap();

    let bad_path = dir.path().join("does-not-exist-\"quoted\"");

    let output = sagg(dir.path(), &[bad_path.to_str().unwrap(), "--json"]);

    assert!(!output.status.success());

    let stderr = String::from_utf8(output.stderr).unwrap();
    let v: serde_json::Value = serde_json::from_str(stderr.trim()).unwrap();
    assert!(v["error"].as_str().unwrap().contains("path not found"));
}

#[test]
fn cli_completions() {
    let dir = tempdir().unwrap();

    let output = sagg(dir.path(), &["--completions", "bash"]);

    assert!(output.status.success());
    assert!(String::from_utf8(output.stdout).unwrap().contains("sagg"));
}
