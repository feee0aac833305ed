//! Test suite status files
//!
//! A suite is a directory of JSON files, one per test case. Each file holds
//! the case's parameters and its status, and is written only by the worker
//! that owns the case. Writes replace the file atomically, so the monitor
//! never reads a half-written case.

use crate::error::{CamError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Status of a test case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaseStatus {
    #[serde(rename = "case_untested")]
    Untested,
    #[serde(rename = "case_inprogress")]
    InProgress,
    #[serde(rename = "case_success")]
    Success,
    #[serde(rename = "case_failure")]
    Failure,
}

impl CaseStatus {
    /// Cases a suite run picks up
    pub fn is_runnable(self) -> bool {
        matches!(self, CaseStatus::Untested | CaseStatus::Failure)
    }

    pub fn is_finished(self) -> bool {
        matches!(self, CaseStatus::Success | CaseStatus::Failure)
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseStatus::Untested => write!(f, "case_untested"),
            CaseStatus::InProgress => write!(f, "case_inprogress"),
            CaseStatus::Success => write!(f, "case_success"),
            CaseStatus::Failure => write!(f, "case_failure"),
        }
    }
}

/// One test case file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub template_name: String,
    /// Provider directory name: `aws`, `ibm` or `vsphere`
    pub cloud: String,
    pub test_case: String,
    pub template_file: PathBuf,
    pub cloud_connection: String,
    pub status: CaseStatus,
    pub log_file: PathBuf,

    #[serde(default, deserialize_with = "flag")]
    pub delete_failed_deployments: bool,
    #[serde(default, deserialize_with = "flag")]
    pub autodestroy: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cam_instance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_repo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub testing_variables: Option<PathBuf>,

    /// Where the case was loaded from
    #[serde(skip)]
    pub test_case_file: PathBuf,

    /// Fields this tool does not interpret, written back untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Accept `true`/`false` or the strings `"TRUE"`/`"false"` in any case
fn flag<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<bool, D::Error> {
    match Value::deserialize(d)? {
        Value::Bool(b) => Ok(b),
        Value::String(s) => Ok(s.trim().eq_ignore_ascii_case("true")),
        Value::Null => Ok(false),
        other => Err(serde::de::Error::custom(format!(
            "expected a boolean, got {}",
            other
        ))),
    }
}

impl TestCase {
    /// `<template>_<cloud>_<case>`
    pub fn display_name(&self) -> String {
        format!("{}_{}_{}", self.template_name, self.cloud, self.test_case)
    }

    pub fn stack_name(&self) -> String {
        format!("camtest-{}", self.display_name())
    }

    /// Where the `run` child writes its deployment result
    pub fn result_file(&self) -> PathBuf {
        self.log_file.with_extension("result.json")
    }

    fn connection_flag(&self) -> Result<&'static str> {
        match self.cloud.as_str() {
            "aws" => Ok("--aws"),
            "ibm" | "ibmcloud" => Ok("--ibmcloud"),
            "vsphere" | "vmware" => Ok("--vmware"),
            other => Err(CamError::CloudConnection(format!(
                "Unknown cloud '{}' in test case {}",
                other,
                self.display_name()
            ))),
        }
    }

    /// Arguments of the `run` command executing this case
    ///
    /// `camvariables.json` and `override_variables.json` next to the
    /// template are passed along when they exist.
    pub fn run_args(&self) -> Result<Vec<String>> {
        let mut args = vec![
            "run".to_string(),
            "--template".to_string(),
            self.template_file.display().to_string(),
            "--name".to_string(),
            self.stack_name(),
            self.connection_flag()?.to_string(),
            self.cloud_connection.clone(),
            "--result-file".to_string(),
            self.result_file().display().to_string(),
        ];
        if let Some(instance) = &self.cam_instance {
            args.extend(["--cam-url".to_string(), instance.clone()]);
        }
        if self.delete_failed_deployments {
            args.push("--delete-failed-deployments".to_string());
        }
        if !self.autodestroy {
            args.push("--no-autodestroy".to_string());
        }

        let template_dir = self.template_file.parent().unwrap_or(Path::new("."));
        let cam_variables = template_dir.join("camvariables.json");
        if cam_variables.exists() {
            args.extend(["--cam-variables".to_string(), cam_variables.display().to_string()]);
        }
        let overrides = template_dir.join("override_variables.json");
        if overrides.exists() {
            args.extend(["--overrides".to_string(), overrides.display().to_string()]);
        }
        if let Some(variables) = &self.testing_variables {
            args.extend(["--variables".to_string(), variables.display().to_string()]);
        }
        if let Some(repo) = &self.template_repo {
            args.extend(["--template-repo".to_string(), repo.clone()]);
            if let Some(dir) = &self.template_dir {
                args.extend(["--template-dir".to_string(), dir.clone()]);
            }
            if let Some(branch) = &self.branch {
                args.extend(["--git-ref".to_string(), branch.clone()]);
            }
        }
        Ok(args)
    }
}

/// A directory of test case files
pub struct SuiteDir {
    dir: PathBuf,
}

impl SuiteDir {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Load every `*.json` case in the directory, sorted by file name
    pub async fn discover(&self) -> Result<Vec<TestCase>> {
        if !self.dir.is_dir() {
            return Err(CamError::Suite(format!(
                "Suite directory {} does not exist",
                self.dir.display()
            )));
        }
        let pattern = self.dir.join("*.json");
        let pattern = pattern.to_string_lossy();
        let mut paths: Vec<PathBuf> = glob::glob(&pattern)
            .map_err(|e| CamError::Suite(format!("Invalid suite pattern {}: {}", pattern, e)))?
            .filter_map(|entry| entry.ok())
            .collect();
        paths.sort();

        let mut cases = Vec::with_capacity(paths.len());
        for path in paths {
            let case = Self::load(&path).await?;
            tracing::info!("Found test case: {} with status: {}", case.display_name(), case.status);
            cases.push(case);
        }
        Ok(cases)
    }

    pub async fn load(path: &Path) -> Result<TestCase> {
        let content = fs::read_to_string(path).await?;
        let mut case: TestCase = serde_json::from_str(&content).map_err(|e| {
            CamError::Suite(format!("Invalid test case file {}: {}", path.display(), e))
        })?;
        case.test_case_file = path.to_path_buf();
        Ok(case)
    }

    /// Re-read a case's status from disk
    pub async fn current_status(case: &TestCase) -> Result<CaseStatus> {
        Ok(Self::load(&case.test_case_file).await?.status)
    }

    /// Write the case through a sibling temp file renamed over the original
    pub async fn save(case: &TestCase) -> Result<()> {
        let content = serde_json::to_string_pretty(case)?;
        let path = case.test_case_file.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, content.as_bytes()))
            .await
            .map_err(|e| CamError::Suite(format!("Status writer stopped: {}", e)))??;
        tracing::debug!("Saved {} ({})", case.test_case_file.display(), case.status);
        Ok(())
    }

    pub async fn set_status(case: &mut TestCase, status: CaseStatus) -> Result<()> {
        case.status = status;
        Self::save(case).await
    }

    /// Reload every case and count the successful ones
    pub async fn summarize(cases: &[TestCase]) -> Result<SuiteSummary> {
        let mut summary = SuiteSummary::default();
        for case in cases {
            let status = Self::current_status(case).await?;
            summary.statuses.push((case.display_name(), status));
        }
        Ok(summary)
    }
}

fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(content)?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuiteSummary {
    pub statuses: Vec<(String, CaseStatus)>,
}

impl SuiteSummary {
    pub fn succeeded(&self) -> usize {
        self.statuses
            .iter()
            .filter(|(_, status)| *status == CaseStatus::Success)
            .count()
    }

    pub fn total(&self) -> usize {
        self.statuses.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.succeeded() == self.total()
    }
}

impl fmt::Display for SuiteSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {} Test cases successful", self.succeeded(), self.total())
    }
}
