//! End-to-end tests of the `ems-protocols` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn cmd() -> Command {
    let mut cmd = Command::cargo_bin("ems-protocols").unwrap();
    // Never reach a real API from tests
    cmd.env_remove("EMS_AI_API_KEY").env_remove("OPENAI_API_KEY");
    cmd
}

fn custom_catalog() -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "alpha_protocol": {{"title": "Alpha Protocol", "content": "alpha body text", "categories": ["adult"]}},
            "beta_protocol": {{"name": "Beta Protocol", "content": "beta body text", "source_file": "b.pdf", "categories": ["pediatric"]}}
        }}"#
    )
    .unwrap();
    file
}

#[test]
fn test_search_typo() {
    cmd()
        .args(["search", "anaphylaxsis"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Allergic Reaction / Anaphylaxis"));
}

#[test]
fn test_search_json() {
    let output = cmd()
        .args(["-f", "json", "search", "seizure", "-n", "1"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json.as_array().unwrap().len(), 1);
    assert_eq!(json[0]["id"], "seizure");
}

#[test]
fn test_search_no_results() {
    cmd()
        .args(["search", "xqzvw"])
        .assert()
        .success()
        .stderr(predicate::str::contains("No matching protocols found"));
}

#[test]
fn test_search_rejects_bad_threshold() {
    cmd()
        .args(["search", "burns", "--threshold", "2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Threshold"));
}

#[test]
fn test_list_with_category_filter() {
    cmd()
        .args(["-f", "tsv", "list", "-c", "obstetric"])
        .assert()
        .success()
        .stdout(predicate::str::contains("newborn_resuscitation"))
        .stdout(predicate::str::contains("cardiac_arrest_adult").not());
}

#[test]
fn test_show_protocol() {
    cmd()
        .args(["show", "cardiac_arrest_adult"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Epinephrine 1 mg IV/IO every 3-5 minutes"));

    cmd()
        .args(["show", "missing_protocol"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_categories() {
    cmd()
        .arg("categories")
        .assert()
        .success()
        .stdout(predicate::str::contains("pediatric"));
}

#[test]
fn test_context_scores() {
    cmd()
        .args(["context", "what is cardiac arrest"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[cardiac_arrest_adult]"));
}

#[test]
fn test_custom_catalog() {
    let catalog = custom_catalog();
    let path = catalog.path().to_str().unwrap();

    cmd()
        .args(["--catalog", path, "-f", "tsv", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("alpha_protocol\tAlpha Protocol"))
        .stdout(predicate::str::contains("beta_protocol\tBeta Protocol\tb.pdf\tpediatric"));

    cmd()
        .args(["--catalog", path, "search", "bta"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Beta Protocol"));
}

#[test]
fn test_invalid_catalog() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "[1, 2, 3]").unwrap();

    cmd()
        .args(["--catalog", file.path().to_str().unwrap(), "list"])
        .assert()
        .failure();
}

#[test]
fn test_export_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("export.json");

    cmd()
        .args(["export", out.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported"));

    cmd()
        .args(["--catalog", out.to_str().unwrap(), "show", "seizure"])
        .assert()
        .success()
        .stdout(predicate::str::contains("midazolam"));
}

#[test]
fn test_dose() {
    cmd()
        .args(["dose", "--weight", "70", "--dose", "0.5", "--concentration-mg", "100"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Total dose: 35.00 mg"))
        .stdout(predicate::str::contains("Volume: 0.35 mL"));
}

#[test]
fn test_dose_zero_concentration() {
    cmd()
        .args(["dose", "--weight", "70", "--dose", "0.5", "--concentration-mg", "0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cannot calculate"));
}

#[test]
fn test_dose_in_pounds() {
    cmd()
        .args([
            "dose",
            "--weight",
            "220.462",
            "--weight-unit",
            "lbs",
            "--dose",
            "1",
            "--concentration-mg",
            "50",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Weight: 100.00 kg"))
        .stdout(predicate::str::contains("Total dose: 100.00 mg"));
}

#[test]
fn test_drip() {
    cmd()
        .args(["drip", "--volume", "1000", "--time", "60", "--drop-factor", "60"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1000.00 gtts/min"));
}

#[test]
fn test_convert() {
    cmd()
        .args(["convert", "220.462", "--to", "kg"])
        .assert()
        .success()
        .stdout(predicate::str::contains("= 100.00 kg"));

    cmd()
        .args(["convert", "-5", "--to", "kg"])
        .assert()
        .failure();
}

#[test]
fn test_quiz_offline_seeded() {
    let run = || {
        cmd()
            .args(["-f", "json", "quiz", "-n", "3", "--seed", "42", "--offline"])
            .output()
            .unwrap()
    };
    let first = run();
    assert!(first.status.success());
    let json: serde_json::Value = serde_json::from_slice(&first.stdout).unwrap();
    let items = json.as_array().unwrap();
    assert_eq!(items.len(), 3);
    assert!(items.iter().all(|i| i["status"] == "fallback"));

    // Same seed, same quiz
    assert_eq!(first.stdout, run().stdout);
}

#[test]
fn test_ask_without_api_key() {
    cmd()
        .args(["ask", "how do I treat an opioid overdose"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Opioid"))
        .stderr(predicate::str::contains("Assistant unavailable"));
}
