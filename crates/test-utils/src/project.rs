//! Temp-project scaffolding.

use std::path::{Path, PathBuf};

/// A throwaway project directory with a manifest and an artifact store.
pub struct TestProject {
    dir: tempfile::TempDir,
}

impl TestProject {
    /// Creates an empty project.
    pub fn new() -> Self {
        Self { dir: tempfile::tempdir().expect("create temp project") }
    }

    /// Creates a project with the given `forge.yaml` content.
    pub fn with_manifest(manifest: &str) -> Self {
        let project = Self::new();
        std::fs::write(project.root().join("forge.yaml"), manifest)
            .expect("write manifest");
        project
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// The default artifact-store location for this project.
    pub fn store_path(&self) -> PathBuf {
        self.root().join(".forge/artifacts.json")
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}
