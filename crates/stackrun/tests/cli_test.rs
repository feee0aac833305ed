#![allow(deprecated)] // TODO: move from cargo_bin to cargo_bin_cmd!

mod common;

use assert_cmd::Command;
use common::TestSuite;
use predicates::prelude::*;

const CREDENTIAL_VARS: [&str; 9] = [
    "ENV",
    "CAM_URL",
    "CAM_USERNAME",
    "CAM_PASSWORD",
    "BLUEMIX_PASSWORD",
    "BLUEMIX_ORG_NAME",
    "BLUEMIX_SPACE_NAME",
    "STACKRUN_CONFIG",
    "GIT_TOKEN",
];

fn stackrun() -> Command {
    let mut cmd = Command::cargo_bin("stackrun").unwrap();
    for var in CREDENTIAL_VARS {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn test_cli_help() {
    stackrun()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("suite"))
        .stdout(predicate::str::contains("clean"));
}

#[test]
fn test_cli_version() {
    stackrun()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("stackrun"));
}

#[test]
fn test_run_help() {
    stackrun()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--template"))
        .stdout(predicate::str::contains("--delete-failed-deployments"))
        .stdout(predicate::str::contains("--no-autodestroy"))
        .stdout(predicate::str::contains("--pre-hook"));
}

#[test]
fn test_invalid_command() {
    stackrun().arg("invalid-command").assert().failure();
}

#[test]
fn test_run_requires_template() {
    stackrun()
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--template"));
}

#[test]
fn test_run_missing_template_file() {
    let suite = TestSuite::new();
    stackrun()
        .current_dir(suite.path())
        .args(["run", "--template", "does-not-exist.tf"])
        .assert()
        .failure();
}

#[test]
fn test_run_without_credentials_fails_before_network() {
    let suite = TestSuite::new();
    stackrun()
        .current_dir(suite.path())
        .arg("run")
        .arg("--template")
        .arg(suite.template())
        .args(["--cam-url", "127.0.0.1:9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Authentication failed"))
        .stderr(predicate::str::contains("CAM_USERNAME"));
}

#[test]
fn test_unknown_environment_is_rejected() {
    let suite = TestSuite::new();
    stackrun()
        .current_dir(suite.path())
        .arg("run")
        .arg("--template")
        .arg(suite.template())
        .args(["--env", "staging"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("staging"));
}

#[test]
fn test_failing_pre_hook_aborts_run() {
    let suite = TestSuite::new();
    stackrun()
        .current_dir(suite.path())
        .arg("run")
        .arg("--template")
        .arg(suite.template())
        .args(["--pre-hook", "echo hook-output; exit 3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("hook-output"));
}

#[test]
fn test_suite_marks_failed_cases() {
    let suite = TestSuite::new();
    let pending = suite.write_case("default", "aws", "case_untested");
    let unknown_cloud = suite.write_case("azure", "azure", "case_untested");
    let done = suite.write_case("done", "aws", "case_success");

    stackrun()
        .current_dir(suite.path())
        .arg("suite")
        .arg(suite.cases_dir())
        .args(["--worker-pause", "1", "--pool-size", "2"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("1 / 3 Test cases successful"));

    // the child could not log in without credentials
    assert_eq!(suite.read_case(&pending)["status"], "case_failure");
    assert_eq!(suite.read_case(&unknown_cloud)["status"], "case_failure");
    assert_eq!(suite.read_case(&done)["status"], "case_success");
    assert!(suite.path().join("logs").join("default.log").exists());
}

#[test]
fn test_suite_report_without_results() {
    let suite = TestSuite::new();
    suite.write_case("done", "aws", "case_success");
    let report = suite.path().join("report.txt");

    stackrun()
        .current_dir(suite.path())
        .arg("suite")
        .arg(suite.cases_dir())
        .arg("--report")
        .arg(&report)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 / 1 Test cases successful"));

    let content = std::fs::read_to_string(report).unwrap();
    assert!(content.contains("Number of workers: 7"));
    assert!(content.contains("Number of attempted deployments: 0"));
}

#[test]
fn test_suite_missing_directory() {
    let suite = TestSuite::new();
    stackrun()
        .current_dir(suite.path())
        .args(["suite", "no-such-dir"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}
