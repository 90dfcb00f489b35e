//! The on-disk artifact store.
//!
//! A single JSON file holding every artifact and test report produced across
//! runs. Entries are append-only; a full rewrite replaces the file through a
//! temp-file + rename so readers never observe a partial write.

use crate::{Artifact, TestReport};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    collections::BTreeMap,
    fs, io,
    path::Path,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to read artifact store at {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to write artifact store at {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("artifact store at {path} is not valid JSON: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// In-memory image of the store file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactStore {
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    #[serde(default)]
    pub test_reports: Vec<TestReport>,
    /// Unknown fields are carried through read-modify-write cycles.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ArtifactStore {
    /// Reads the store at `path`. A missing file is an empty store.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let raw = match fs::read(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "artifact store missing, starting empty");
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(StoreError::Read { path: path.display().to_string(), source: err });
            }
        };
        serde_json::from_slice(&raw)
            .map_err(|err| StoreError::Decode { path: path.display().to_string(), source: err })
    }

    /// Rewrites the store file, creating parent directories as needed.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let path = path.as_ref();
        let write_err =
            |source| StoreError::Write { path: path.display().to_string(), source };

        let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
        if let Some(parent) = parent {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let json = serde_json::to_vec_pretty(self).expect("store serialization is infallible");
        let mut tmp = tempfile::NamedTempFile::new_in(
            parent.unwrap_or_else(|| Path::new(".")),
        )
        .map_err(write_err)?;
        io::Write::write_all(&mut tmp, &json).map_err(write_err)?;
        tmp.persist(path).map_err(|err| write_err(err.error))?;
        trace!(path = %path.display(), artifacts = self.artifacts.len(), "wrote artifact store");
        Ok(())
    }

    /// Appends an artifact. Existing entries are never mutated; newer entries
    /// supersede older ones by timestamp on listing.
    pub fn push_artifact(&mut self, artifact: Artifact) {
        self.artifacts.push(artifact);
    }

    pub fn push_test_report(&mut self, report: TestReport) {
        self.test_reports.push(report);
    }

    /// Test reports whose stage matches `stage` exactly; an empty filter
    /// returns all reports. Order is file order; callers sort for display.
    pub fn test_reports_for_stage(&self, stage: &str) -> Vec<&TestReport> {
        self.test_reports
            .iter()
            .filter(|report| stage.is_empty() || report.stage == stage)
            .collect()
    }
}
