use std::path::PathBuf;

use tempfile::TempDir;

use crate::execution::StateRecord;

/// Test fixture providing an isolated root with `skills/` and `state/`.
pub struct UnitTestFixture {
    pub temp_dir: TempDir,
    pub data_path: PathBuf,
}

impl Default for UnitTestFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitTestFixture {
    #[must_use]
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let data_path = temp_dir.path().to_path_buf();
        Self { temp_dir, data_path }
    }

    /// Create a test file with content.
    pub fn create_file(&self, relative_path: &str, content: &str) -> PathBuf {
        let full_path = self.data_path.join(relative_path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        std::fs::write(&full_path, content).expect("Failed to write file");
        full_path
    }

    /// Create `skills/<name>.yaml`.
    pub fn create_skill(&self, name: &str, content: &str) -> PathBuf {
        self.create_file(&format!("skills/{name}.yaml"), content)
    }

    pub fn skills_dir(&self) -> PathBuf {
        self.data_path.join("skills")
    }

    pub fn state_path(&self) -> PathBuf {
        self.data_path.join("state/execution-state.json")
    }

    /// Replace the state record, as an executor would.
    pub fn write_record(&self, record: &StateRecord) -> PathBuf {
        let json = serde_json::to_string_pretty(record).expect("Failed to serialize record");
        self.create_file("state/execution-state.json", &json)
    }
}
