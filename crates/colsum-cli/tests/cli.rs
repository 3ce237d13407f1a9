use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use pretty_assertions::assert_eq;

const SALES: &str = "categoria,prodotto,quantita,prezzo,totale\n\
Frutta,Mele,10,2.5,25\n\
Frutta,Pere,15,3.2,48\n\
Verdura,Carote,12,1.5,18\n";

fn colsum(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_colsum"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("run colsum")
}

fn stdout(output: &Output) -> String {
    assert!(
        output.status.success(),
        "colsum failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout.clone()).expect("utf-8 stdout")
}

fn write_input(dir: &Path, name: &str, contents: &[u8]) -> String {
    let path = dir.join(name);
    fs::write(&path, contents).expect("write input");
    path.to_string_lossy().into_owned()
}

#[test]
fn sum_grouped_as_csv() {
    let dir = tempfile::tempdir().expect("temp dir");
    let input = write_input(dir.path(), "vendite.csv", SALES.as_bytes());

    let out = colsum(&[
        "sum",
        &input,
        "--column",
        "quantita",
        "--group-by",
        "categoria",
        "--format",
        "csv",
    ]);
    assert_eq!(
        stdout(&out),
        "Group,Column,Sum,ValidCount\nFrutta,quantita,25,2\nVerdura,quantita,12,1\n"
    );
}

#[test]
fn sum_defaults_to_numeric_columns() {
    let dir = tempfile::tempdir().expect("temp dir");
    let input = write_input(dir.path(), "vendite.csv", SALES.as_bytes());

    let out = colsum(&["sum", &input, "--format", "json"]);
    let json: serde_json::Value = serde_json::from_str(&stdout(&out)).expect("json output");
    let columns: Vec<&str> = json["rows"]
        .as_array()
        .expect("rows")
        .iter()
        .map(|r| r["column"].as_str().expect("column"))
        .collect();
    assert_eq!(columns, vec!["quantita", "prezzo", "totale"]);
    assert_eq!(json["rows"][2]["sum"], serde_json::json!(91.0));
    assert_eq!(json["rows"][2]["valid_count"], serde_json::json!(3));
}

#[test]
fn european_flags_and_output_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let input = write_input(
        dir.path(),
        "vendite.csv",
        b"categoria;importo\nA;1.234,50\nB;10\nA;0,50\n",
    );
    let output = dir.path().join("out").join("risultati.csv");
    let output_str = output.to_string_lossy().into_owned();

    let out = colsum(&[
        "sum",
        &input,
        "--european",
        "-c",
        "importo",
        "-g",
        "categoria",
        "--format",
        "csv",
        "--output",
        &output_str,
    ]);
    assert_eq!(stdout(&out), "");
    assert_eq!(
        fs::read_to_string(&output).expect("read output"),
        "Group,Column,Sum,ValidCount\nA,importo,1235,2\nB,importo,10,1\n"
    );
}

#[test]
fn settings_file_supplies_the_selection() {
    let dir = tempfile::tempdir().expect("temp dir");
    let input = write_input(dir.path(), "vendite.csv", SALES.as_bytes());
    let settings = write_input(
        dir.path(),
        "settings.json",
        br#"{ "aggregation": { "target_columns": ["totale"], "group_column": "categoria" } }"#,
    );

    let out = colsum(&["sum", &input, "--config", &settings, "--format", "pivot"]);
    assert_eq!(
        stdout(&out),
        "categoria  totale\n---------  ------\nFrutta      73.00\nVerdura     18.00\n"
    );
}

#[test]
fn probe_lists_columns() {
    let dir = tempfile::tempdir().expect("temp dir");
    let input = write_input(dir.path(), "vendite.csv", SALES.as_bytes());

    let out = colsum(&["probe", &input, "--format", "json"]);
    let json: serde_json::Value = serde_json::from_str(&stdout(&out)).expect("json output");
    assert_eq!(
        json["default_targets"],
        serde_json::json!(["quantita", "prezzo", "totale"])
    );
    assert_eq!(
        json["group_candidates"],
        serde_json::json!(["categoria", "prodotto"])
    );
    assert_eq!(json["columns"][0]["classification"], "categorical");

    let text = stdout(&colsum(&["probe", &input]));
    assert!(text.starts_with("Columns (5):\n"), "{text}");
    assert!(text.contains("Default selection: quantita, prezzo, totale"), "{text}");
    assert!(text.contains("  Frutta | Mele | 10 | 2.5 | 25"), "{text}");
}

#[test]
fn missing_column_fails_with_a_hint() {
    let dir = tempfile::tempdir().expect("temp dir");
    let input = write_input(dir.path(), "vendite.csv", SALES.as_bytes());

    let out = colsum(&["sum", &input, "-c", "sconto"]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("colsum probe"), "{stderr}");
    assert!(stderr.contains("sconto"), "{stderr}");
}

#[test]
fn encoding_errors_suggest_an_encoding() {
    let dir = tempfile::tempdir().expect("temp dir");
    let input = write_input(dir.path(), "latin1.csv", b"citt\xe0,n\nRoma,1\n");

    let out = colsum(&["sum", &input, "-c", "n"]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("--encoding"), "{stderr}");

    let out = colsum(&["sum", &input, "-c", "n", "--encoding", "latin1", "--format", "csv"]);
    assert_eq!(stdout(&out), "Column,Sum,ValidCount\nn,1,1\n");
}

#[test]
fn zero_batch_size_is_rejected() {
    let dir = tempfile::tempdir().expect("temp dir");
    let input = write_input(dir.path(), "vendite.csv", SALES.as_bytes());

    let out = colsum(&["sum", &input, "-c", "quantita", "--batch-size", "0"]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("batch size"), "{stderr}");
}
