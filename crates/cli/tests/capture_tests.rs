// Integration tests for `agrid capture`: exit codes, bundle layout, manifest
// and summary contents.
// Run with: cargo test -p auditgrid-cli --test capture_tests -- --nocapture

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use serde_json::{json, Value};
use tempfile::TempDir;

fn agrid(dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_agrid"));
    cmd.current_dir(dir)
        .env("HOME", dir)
        .env("XDG_CONFIG_HOME", dir.join(".config"))
        .env_remove("VALIDATOR_VERSION")
        .env_remove("AGRID_LOG");
    cmd
}

fn capture(dir: &Path) -> Output {
    agrid(dir).arg("capture").output().expect("agrid capture")
}

fn write_json(path: &Path, value: &Value) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

/// Project with data/prices.csv and one report naming it.
fn project(issues: Value) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("data")).unwrap();
    fs::write(
        dir.path().join("data/prices.csv"),
        "Name,Price,Currency\nWidget,-1,USD\nGadget,5,XXX\nGizmo,7,EUR\n",
    )
    .unwrap();
    write_json(
        &dir.path().join("reports/prices.json"),
        &json!({ "source_file": "data/prices.csv", "issues": issues }),
    );
    dir
}

fn mixed_issues() -> Value {
    json!([
        {"rule": "price_positive", "level": "ERROR", "row": 2, "column": "Price", "message": "price must be > 0"},
        {"rule": "currency_code", "level": "WARNING", "row": "3", "column": "Currency", "message": "unknown currency"}
    ])
}

// ---------------------------------------------------------------------------
// Failure modes: nothing is written
// ---------------------------------------------------------------------------

#[test]
fn no_source_reference_exits_10() {
    let dir = tempfile::tempdir().unwrap();
    write_json(
        &dir.path().join("reports/check.json"),
        &json!({"issues": [{"rule": "r", "level": "error", "row": 2, "column": "A"}]}),
    );

    let output = capture(dir.path());
    assert_eq!(output.status.code(), Some(10), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(!dir.path().join("artifacts").exists());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error:"));
    assert!(stderr.contains("hint:"));
}

#[test]
fn missing_reports_dir_exits_10() {
    let dir = tempfile::tempdir().unwrap();
    let output = capture(dir.path());
    assert_eq!(output.status.code(), Some(10));
    assert!(!dir.path().join("artifacts").exists());
}

#[test]
fn missing_source_exits_11() {
    let dir = project(mixed_issues());
    fs::remove_file(dir.path().join("data/prices.csv")).unwrap();

    let output = capture(dir.path());
    assert_eq!(output.status.code(), Some(11));
    assert!(String::from_utf8_lossy(&output.stderr).contains("data/prices.csv"));
    assert!(!dir.path().join("artifacts").exists());
}

#[test]
fn narrow_surface_fails_contract_with_12() {
    let dir = project(mixed_issues());
    fs::write(dir.path().join("agrid.toml"), "[capture]\nwidth = 20\n").unwrap();

    let output = capture(dir.path());
    assert_eq!(output.status.code(), Some(12));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("toggle:errors"), "stderr: {}", stderr);
    assert!(!dir.path().join("artifacts/manifest.json").exists());
}

// ---------------------------------------------------------------------------
// Successful runs
// ---------------------------------------------------------------------------

#[test]
fn full_bundle_with_warnings() {
    let dir = project(mixed_issues());
    let output = capture(dir.path());
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let root = dir.path().join("artifacts");
    for shot in ["01_all_issues.svg", "02_errors_only.svg", "03_warnings_only.svg"] {
        let path = root.join("screenshots").join(shot);
        assert!(path.is_file(), "missing {}", shot);
        assert!(fs::read_to_string(&path).unwrap().starts_with("<svg"));
    }
    assert!(root.join("summary.html").is_file());

    let sources: Vec<_> = fs::read_dir(root.join("source")).unwrap().map(|e| e.unwrap().file_name()).collect();
    assert_eq!(sources.len(), 1);
    let name = sources[0].to_string_lossy().into_owned();
    assert!(name.starts_with("prices-") && name.ends_with(".csv"), "{}", name);
    assert_eq!(name.len(), "prices-".len() + 12 + ".csv".len());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("bundle:"));
    assert!(stdout.contains("screenshots/03_warnings_only.svg"));
}

#[test]
fn errors_only_run_skips_warnings_screenshot() {
    let dir = project(json!([
        {"rule": "price_positive", "level": "error", "row": 2, "column": "Price", "message": "bad"}
    ]));
    let output = capture(dir.path());
    assert!(output.status.success());

    let shots = dir.path().join("artifacts/screenshots");
    assert!(shots.join("01_all_issues.svg").is_file());
    assert!(shots.join("02_errors_only.svg").is_file());
    assert!(!shots.join("03_warnings_only.svg").exists());

    let manifest = read_json(&dir.path().join("artifacts/manifest.json"));
    assert_eq!(manifest["screenshots"].as_array().unwrap().len(), 2);
}

#[test]
fn rerun_removes_stale_warnings_screenshot() {
    let dir = project(mixed_issues());
    assert!(capture(dir.path()).status.success());
    assert!(dir.path().join("artifacts/screenshots/03_warnings_only.svg").is_file());

    write_json(
        &dir.path().join("reports/prices.json"),
        &json!({"source_file": "data/prices.csv", "issues": [
            {"rule": "price_positive", "level": "error", "row": 2, "column": "Price"}
        ]}),
    );
    assert!(capture(dir.path()).status.success());
    assert!(!dir.path().join("artifacts/screenshots/03_warnings_only.svg").exists());
}

#[test]
fn validation_report_carries_screenshot_refs() {
    let dir = project(json!([
        {"rule": "price_positive", "level": "ERROR", "row": 2, "column": "Price", "message": "m", "issue_id": "PX-1"},
        {"rule": "currency_code", "level": "WARNING", "row": 3, "column": "Currency", "message": "m"},
        {"rule": "note", "level": "INFO", "row": 4, "column": "Name", "message": "m"}
    ]));
    assert!(capture(dir.path()).status.success());

    let report = read_json(&dir.path().join("artifacts/validation/validation_report.json"));
    assert_eq!(report["source_file"], "data/prices.csv");
    let issues = report["issues"].as_array().unwrap();
    assert_eq!(issues.len(), 3);
    assert_eq!(issues[0]["screenshot_ref"], "screenshots/02_errors_only.svg");
    assert_eq!(issues[0]["issue_id"], "PX-1");
    assert_eq!(issues[0]["level"], "ERROR");
    assert_eq!(issues[2]["level"], "INFO");
    assert_eq!(issues[1]["screenshot_ref"], "screenshots/03_warnings_only.svg");
    assert_eq!(issues[2]["screenshot_ref"], "screenshots/01_all_issues.svg");
}

#[test]
fn issues_merge_across_report_files() {
    let dir = project(mixed_issues());
    write_json(
        &dir.path().join("reports/zz_extra.json"),
        &json!([{"rule": "name_unique", "level": "error", "row": 4, "column": "Name", "message": "dup"}]),
    );
    assert!(capture(dir.path()).status.success());

    let manifest = read_json(&dir.path().join("artifacts/manifest.json"));
    assert_eq!(manifest["counts"]["errors"], 2);
    assert_eq!(manifest["counts"]["warnings"], 1);
    assert_eq!(manifest["counts"]["total"], 3);
}

#[test]
fn manifest_identity_without_mapping_file() {
    let dir = project(mixed_issues());
    assert!(capture(dir.path()).status.success());

    let manifest = read_json(&dir.path().join("artifacts/manifest.json"));
    assert!(manifest["mapping_version"].is_null());
    assert_eq!(manifest["source"]["name"], "prices.csv");
    assert_eq!(manifest["source"]["reference"], "data/prices.csv");
    assert_eq!(manifest["source"]["sha256"].as_str().unwrap().len(), 64);
    assert!(manifest["validator_version"].as_str().unwrap().starts_with("agrid "));
    assert!(manifest["generated_at"].as_str().unwrap().ends_with('Z'));
    assert_eq!(manifest["paths"]["validation_report"], "validation/validation_report.json");
    assert_eq!(manifest["screenshots"][2]["filter"], json!({"errors": false, "warnings": true}));
}

#[test]
fn manifest_records_mapping_and_validator_versions() {
    let dir = project(mixed_issues());
    fs::write(dir.path().join("data/mapping.yaml"), "version: \"2.1\"\nfields: []\n").unwrap();

    let output = agrid(dir.path())
        .arg("capture")
        .env("VALIDATOR_VERSION", "schema-check 1.4")
        .output()
        .unwrap();
    assert!(output.status.success());

    let manifest = read_json(&dir.path().join("artifacts/manifest.json"));
    assert_eq!(manifest["mapping_version"], "2.1");
    assert_eq!(manifest["validator_version"], "schema-check 1.4");
}

#[test]
fn flags_override_settings() {
    let dir = project(mixed_issues());
    fs::rename(dir.path().join("reports"), dir.path().join("checks")).unwrap();

    let output = agrid(dir.path())
        .args(["capture", "--reports-dir", "checks", "--bundle-root", "out/bundle", "--validator-version", "v9"])
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let manifest = read_json(&dir.path().join("out/bundle/manifest.json"));
    assert_eq!(manifest["validator_version"], "v9");
    assert!(!dir.path().join("artifacts").exists());
}

#[test]
fn summary_escapes_report_text() {
    let dir = project(json!([
        {"rule": "price_positive", "level": "error", "row": 2, "column": "Price",
         "message": "<script>alert(1)</script> & \"quoted\""}
    ]));
    assert!(capture(dir.path()).status.success());

    let html = fs::read_to_string(dir.path().join("artifacts/summary.html")).unwrap();
    assert!(!html.contains("<script>"));
    assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt; &amp; &quot;quoted&quot;"));
    assert!(html.contains(r#"href="manifest.json""#));
    assert!(html.contains("screenshots/02_errors_only.svg"));
}

#[test]
fn xlsx_source_is_rendered_and_copied() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("data")).unwrap();

    let mut workbook = rust_xlsxwriter::Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Prices").unwrap();
    sheet.write_string(0, 0, "Name").unwrap();
    sheet.write_string(0, 1, "Price").unwrap();
    sheet.write_string(1, 0, "Widget").unwrap();
    sheet.write_number(1, 1, -1.0).unwrap();
    workbook.save(dir.path().join("data/prices.xlsx")).unwrap();

    write_json(
        &dir.path().join("reports/prices.json"),
        &json!({"issues": [{"rule": "price_positive", "level": "error", "row": 2, "column": "Price",
                            "source_file": "data/prices.xlsx"}]}),
    );

    let output = capture(dir.path());
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let manifest = read_json(&dir.path().join("artifacts/manifest.json"));
    assert!(manifest["paths"]["source_copy"].as_str().unwrap().ends_with(".xlsx"));

    let svg = fs::read_to_string(dir.path().join("artifacts/screenshots/01_all_issues.svg")).unwrap();
    assert!(svg.contains("Widget"));
}
