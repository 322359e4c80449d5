//! Smoke tests -- verify the binary parses its flags and runs end to end.

mod common;

use assert_cmd::Command;

#[test]
fn test_cli_help() {
    Command::cargo_bin("gfakt")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicates::str::contains("pipeline driver for GMP-ECM"));
}

#[test]
fn test_cli_version() {
    Command::cargo_bin("gfakt")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicates::str::contains("gfakt"));
}

#[test]
fn test_numbers_are_required() {
    Command::cargo_bin("gfakt")
        .unwrap()
        .args(["-t", "2", "11000", "-d", "0"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("--numbers"));
}

#[test]
fn test_duplicate_identifiers_fail_the_run() {
    let dir = tempfile::TempDir::new().unwrap();
    Command::cargo_bin("gfakt")
        .unwrap()
        .arg("--work-dir")
        .arg(dir.path())
        .arg("-l")
        .arg(dir.path().join("gfakt.log"))
        .args(["--ecm", "/nonexistent/gpu_ecm", "-t", "1", "11000", "-d", "0"])
        .args(["-N", "a:15", "a:21"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("more than one input"));
}

#[cfg(unix)]
#[test]
fn test_json_report_end_to_end() {
    let dir = tempfile::TempDir::new().unwrap();
    let ecm = common::FakeEcm::with_save_lines(4, 0).install(dir.path());

    let assert = Command::cargo_bin("gfakt")
        .unwrap()
        .arg("--ecm")
        .arg(&ecm)
        .arg("--work-dir")
        .arg(dir.path())
        .arg("-l")
        .arg(dir.path().join("gfakt.log"))
        .args(["--json", "-c", "64", "-t", "2", "11000", "-d", "0", "-N", "j:1000003"])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["stage1"][0]["identifier"], "j");
    assert_eq!(report["stage1"][0]["status"], "exited");
    assert_eq!(report["stage1"][0]["shards"], 2);
    assert_eq!(report["stage2"]["outcomes"].as_array().unwrap().len(), 2);

    let log = std::fs::read_to_string(dir.path().join("gfakt.log")).unwrap();
    assert!(log.contains("version"));
    assert!(common::calls(dir.path())[0].contains("-gpucurves 64 -c 64"));
}

#[test]
fn test_unloadable_config_env_fails_the_run() {
    let dir = tempfile::TempDir::new().unwrap();
    Command::cargo_bin("gfakt")
        .unwrap()
        .current_dir(dir.path())
        .env("GFAKT_CONFIG", "/nonexistent/gfakt.toml")
        .args(["-t", "1", "11000", "-d", "0", "-N", "a:15"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("GFAKT_CONFIG"));
    assert!(!dir.path().join("a.in").exists());
}

#[test]
fn test_b1_is_required_somewhere() {
    let dir = tempfile::TempDir::new().unwrap();
    Command::cargo_bin("gfakt")
        .unwrap()
        .current_dir(dir.path())
        .env_remove("GFAKT_CONFIG")
        .args(["-t", "1", "-d", "0", "-N", "a:15"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("B1 bound is required"));
}

#[cfg(unix)]
#[test]
fn test_b1_from_config_and_command_line_override() {
    for (cli_b1, expected) in [(None, "5000 0"), (Some("7000"), "7000 0")] {
        let dir = tempfile::TempDir::new().unwrap();
        let ecm = common::FakeEcm::with_save_lines(1, 0).install(dir.path());
        let config = dir.path().join("gfakt.toml");
        std::fs::write(&config, "[pipeline]\nb1 = \"5000\"\n").unwrap();

        let mut cmd = Command::cargo_bin("gfakt").unwrap();
        cmd.arg("--config")
            .arg(&config)
            .arg("--ecm")
            .arg(&ecm)
            .arg("--work-dir")
            .arg(dir.path())
            .arg("-l")
            .arg(dir.path().join("gfakt.log"))
            .args(["-t", "1"]);
        if let Some(b1) = cli_b1 {
            cmd.arg(b1);
        }
        cmd.args(["-d", "0", "-N", "c:77"]).assert().success();

        let calls = common::calls(dir.path());
        assert!(calls[0].starts_with("stage1 "), "{:?}", calls);
        assert!(calls[0].ends_with(expected), "{:?}", calls);
        let b1 = expected.trim_end_matches(" 0");
        assert!(dir.path().join(format!("c_{}.save", b1)).exists());
    }
}

#[cfg(unix)]
#[test]
fn test_stage2_factor_report_is_logged_not_echoed() {
    let dir = tempfile::TempDir::new().unwrap();
    let ecm = common::FakeEcm::with_save_lines(2, 0)
        .stage2("echo '********** Factor found in step 2: 7'\nexit 2\n")
        .install(dir.path());

    let assert = Command::cargo_bin("gfakt")
        .unwrap()
        .env_remove("RUST_LOG")
        .env_remove("GFAKT_CONFIG")
        .arg("--ecm")
        .arg(&ecm)
        .arg("--work-dir")
        .arg(dir.path())
        .arg("-l")
        .arg(dir.path().join("gfakt.log"))
        .args(["-t", "1", "11000", "-d", "0", "-N", "f:1001"])
        .assert()
        .success();

    let output = assert.get_output();
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!stdout.contains("Resuming"), "stdout: {}", stdout);
    assert!(stderr.contains("Factor found in step 2"), "stderr: {}", stderr);
}
