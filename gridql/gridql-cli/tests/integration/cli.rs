use std::io::Write;
use std::process::Command;

use insta_cmd::assert_cmd_snapshot;
use insta_cmd::get_cargo_bin;
use tempfile::NamedTempFile;

const SCHEMA: &str = r#"{"tables": [{"name": "people", "columns": [
    {"name": "id", "type": "int4", "primary_key": true},
    {"name": "name", "type": "text"}
]}]}"#;

fn gridql_command() -> Command {
    let mut cmd = Command::new(get_cargo_bin("gridql"));
    // isolate tests from the environment of whoever runs them
    cmd.env_remove("GRIDQL_DIALECT")
        .env_remove("GRIDQL_SCHEMA")
        .env_remove("GRIDQL_DATABASE")
        .env_remove("RUST_BACKTRACE")
        .env_remove("RUST_LIB_BACKTRACE");
    cmd
}

fn schema_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(SCHEMA.as_bytes()).unwrap();
    file
}

#[test]
fn compile() {
    let schema = schema_file();

    assert_cmd_snapshot!(gridql_command()
        .args(["compile", "--no-format", "--dialect", "postgres", "--schema"])
        .arg(schema.path())
        .pass_stdin(r#"{"base_table": "people", "transforms": [{"type": "limit", "spec": 2}]}"#), @r#"
    success: true
    exit_code: 0
    ----- stdout -----
    SELECT "id", "name" FROM "people" LIMIT 2

    ----- stderr -----
    "#);
}

#[test]
fn compile_yaml_with_env_schema() {
    let schema = schema_file();

    assert_cmd_snapshot!(gridql_command()
        .args(["compile", "--no-format"])
        .env("GRIDQL_SCHEMA", schema.path())
        .env("GRIDQL_DIALECT", "mysql")
        .pass_stdin("base_table: people\ntransforms:\n  - type: select\n    spec: [name]\n"), @r"
    success: true
    exit_code: 0
    ----- stdout -----
    SELECT `name` FROM `people`

    ----- stderr -----
    ");
}

#[test]
fn compile_error() {
    let schema = schema_file();

    assert_cmd_snapshot!(gridql_command()
        .args(["compile", "--schema"])
        .arg(schema.path())
        .pass_stdin(r#"{"base_table": "people", "transforms": [{"type": "select", "spec": ["age"]}]}"#), @r"
    success: false
    exit_code: 1
    ----- stdout -----

    ----- stderr -----
    [E0001] Error (transform #0 `select`, field `spec[0]`): column `age` not found
    ↳ Hint: available columns: id, name
    ");
}

#[test]
fn run_against_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("people.db");
    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE people (id INTEGER PRIMARY KEY, name TEXT);
         INSERT INTO people VALUES (1, 'b'), (2, 'a'), (3, 'c');",
    )
    .unwrap();
    drop(conn);

    let output = gridql_command()
        .args(["run", "--database"])
        .arg(&path)
        .arg("-")
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .spawn()
        .and_then(|mut child| {
            child.stdin.take().unwrap().write_all(
                br#"{"base_table": "people", "transforms": [
                    {"type": "select", "spec": ["name"]},
                    {"type": "order", "spec": [{"column": "name"}]},
                    {"type": "offset", "spec": 1},
                    {"type": "limit", "spec": 1}
                ]}"#,
            )?;
            child.wait_with_output()
        })
        .unwrap();

    assert!(output.status.success());
    let response: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(response["records"], serde_json::json!([{"name": "b"}]));
    assert_eq!(response["parameters"]["base_table"], "people");
}

#[test]
fn suggest() {
    let output = gridql_command().args(["suggest", "bool"]).output().unwrap();

    assert!(output.status.success());
    let suggestions: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let functions: Vec<&str> = suggestions
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["function"].as_str().unwrap())
        .collect();
    assert!(functions.contains(&"not_empty"));
    assert!(!functions.contains(&"starts_with"));
}

#[test]
fn json_schema() {
    let output = gridql_command().arg("json-schema").output().unwrap();

    assert!(output.status.success());
    let schema: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(schema["title"], "QueryDefinition");
}
