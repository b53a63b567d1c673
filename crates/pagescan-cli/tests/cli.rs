use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Command with the user config directory pointed into `home`.
fn pagescan(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("pagescan").unwrap();
    cmd.env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join("config"));
    cmd
}

#[test]
fn lists_languages() {
    let home = TempDir::new().unwrap();
    pagescan(&home)
        .arg("languages")
        .assert()
        .success()
        .stdout(predicate::str::contains("auto"))
        .stdout(predicate::str::contains("deu"))
        .stdout(predicate::str::contains("Deutsch"));
}

#[test]
fn lists_languages_as_json() {
    let home = TempDir::new().unwrap();
    pagescan(&home)
        .args(["languages", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"native_name\": \"Français\""));
}

#[test]
fn config_path_points_to_pagescan_dir() {
    let home = TempDir::new().unwrap();
    pagescan(&home)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pagescan"))
        .stdout(predicate::str::contains("config.json"))
        .stdout(predicate::str::contains("not created"));
}

#[test]
fn config_set_then_get() {
    let home = TempDir::new().unwrap();
    pagescan(&home)
        .args(["config", "set", "pdf.text_placement", "even_split"])
        .assert()
        .success();

    pagescan(&home)
        .args(["config", "get", "pdf.text_placement"])
        .assert()
        .success()
        .stdout(predicate::str::contains("even_split"));
}

#[test]
fn config_set_rejects_unknown_key() {
    let home = TempDir::new().unwrap();
    pagescan(&home)
        .args(["config", "set", "pdf.dpi", "300"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration key not found"));
}

#[test]
fn process_rejects_empty_file() {
    let home = TempDir::new().unwrap();
    let input = home.path().join("empty.pdf");
    fs::write(&input, b"").unwrap();

    pagescan(&home)
        .arg("process")
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("empty.pdf: File appears to be empty"));
}

#[test]
fn process_rejects_unsupported_type() {
    let home = TempDir::new().unwrap();
    let input = home.path().join("notes.txt");
    fs::write(&input, b"just text").unwrap();

    pagescan(&home)
        .arg("process")
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported file format"));
}

#[test]
fn process_rejects_unknown_language() {
    let home = TempDir::new().unwrap();
    let input = home.path().join("scan.pdf");
    fs::write(&input, b"%PDF-1.4").unwrap();

    pagescan(&home)
        .arg("process")
        .arg(&input)
        .args(["--language", "klingon"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported language: klingon"));
}

#[test]
fn process_reports_missing_input() {
    let home = TempDir::new().unwrap();
    pagescan(&home)
        .args(["process", "does-not-exist.pdf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file not found"));
}

#[test]
fn config_set_rejects_unsupported_language() {
    let home = TempDir::new().unwrap();
    pagescan(&home)
        .args(["config", "set", "ocr.default_language", "klingon"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported language: klingon"));

    pagescan(&home)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("not created"));
}

#[test]
fn config_set_rejects_non_positive_render_scale() {
    let home = TempDir::new().unwrap();
    for scale in ["0", "-2"] {
        pagescan(&home)
            .args(["config", "set", "pdf.render_scale", scale])
            .assert()
            .failure()
            .stderr(predicate::str::contains("render_scale must be a positive number"));
    }
}

#[test]
fn config_reset_restores_default() {
    let home = TempDir::new().unwrap();
    pagescan(&home)
        .args(["config", "set", "pdf.render_scale", "3.5"])
        .assert()
        .success();

    pagescan(&home)
        .args(["config", "reset", "pdf.render_scale"])
        .assert()
        .success();

    pagescan(&home)
        .args(["config", "get", "pdf.render_scale"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2.0"));
}

#[test]
fn invalid_config_file_is_refused() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("bad.json");
    fs::write(&config, r#"{"pdf": {"render_scale": 0.0}}"#).unwrap();
    let input = home.path().join("scan.pdf");
    fs::write(&input, b"%PDF-1.4").unwrap();

    pagescan(&home)
        .arg("--config")
        .arg(&config)
        .arg("process")
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("render_scale"));
}
