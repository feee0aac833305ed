use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A throw-away suite directory with one template
pub struct TestSuite {
    pub root: TempDir,
}

impl TestSuite {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let template_dir = root.path().join("lamp").join("aws");
        fs::create_dir_all(&template_dir).unwrap();
        fs::write(
            template_dir.join("lamp.tf"),
            "provider \"aws\" {\n  region = \"us-east-1\"\n}\n",
        )
        .unwrap();
        fs::create_dir_all(root.path().join("cases")).unwrap();
        Self { root }
    }

    pub fn path(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }

    pub fn template(&self) -> PathBuf {
        self.root.path().join("lamp").join("aws").join("lamp.tf")
    }

    pub fn cases_dir(&self) -> PathBuf {
        self.root.path().join("cases")
    }

    pub fn write_case(&self, name: &str, cloud: &str, status: &str) -> PathBuf {
        let case = json!({
            "template_name": "lamp",
            "cloud": cloud,
            "test_case": name,
            "template_file": self.template(),
            "cloud_connection": "aws-conn",
            "status": status,
            "log_file": self.root.path().join("logs").join(format!("{}.log", name)),
            "autodestroy": true,
        });
        let path = self.cases_dir().join(format!("{}.json", name));
        fs::write(&path, serde_json::to_string_pretty(&case).unwrap()).unwrap();
        path
    }

    pub fn read_case(&self, path: &Path) -> Value {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }
}
