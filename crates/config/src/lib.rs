//! The `forge.yaml` manifest: the declarative pipeline a Forge run executes.
//!
//! Only the fields the core consumes are modeled; unknown keys are ignored so
//! manifests can carry engine-specific extensions.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

#[macro_use]
extern crate tracing;

use forge_artifacts::{BuildInput, SpecMap};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};

/// Manifest file name looked up at the project root.
pub const MANIFEST_FILE: &str = "forge.yaml";

/// Environment variable overriding the manifest's `artifactStorePath`.
pub const STORE_PATH_ENV: &str = "FORGE_ARTIFACT_STORE_PATH";

/// Store location used when the manifest does not configure one, relative to
/// the project root.
pub const DEFAULT_STORE_PATH: &str = ".forge/artifacts.json";

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("failed to read manifest at {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("manifest at {path} is not valid YAML: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("duplicate build entry name {0:?}")]
    DuplicateBuildName(String),
    #[error("duplicate test entry name {0:?}")]
    DuplicateTestName(String),
    #[error("test {test:?} references unknown environment {environment:?}")]
    UnknownEnvironment { test: String, environment: String },
    #[error("composite engine {alias:?} has unsupported type {kind:?} (expected \"testenv\")")]
    UnsupportedCompositeType { alias: String, kind: String },
    #[error("composite engine {0:?} has an empty sub-engine chain")]
    EmptyChain(String),
}

/// One test to run: a runner engine plus an optional composite environment.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestEntry {
    pub name: String,
    pub stage: String,
    /// Runner engine URI, e.g. `go://go-test`.
    pub runner: String,
    /// Alias of a composite `testenv` engine to provision first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(default, skip_serializing_if = "SpecMap::is_empty")]
    pub spec: SpecMap,
}

/// One link of a composite test-environment chain.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SubengineRef {
    /// Sub-engine URI, e.g. `go://testenv-kind`.
    pub engine: String,
    #[serde(default, skip_serializing_if = "SpecMap::is_empty")]
    pub spec: SpecMap,
}

/// A named composite engine definition.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CompositeEngine {
    pub alias: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// Ordered sub-engine chain; `create` runs in this order, `delete` in
    /// strict reverse.
    #[serde(default)]
    pub testenv: Vec<SubengineRef>,
}

/// The subset of `forge.yaml` the core consumes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_store_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub build: Vec<BuildInput>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub test: Vec<TestEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub engines: Vec<CompositeEngine>,
}

impl Manifest {
    /// Loads and validates the manifest at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|source| ManifestError::Read { path: path.display().to_string(), source })?;
        let manifest: Self = serde_yaml::from_str(&raw)
            .map_err(|source| ManifestError::Parse { path: path.display().to_string(), source })?;
        manifest.validate()?;
        debug!(
            path = %path.display(),
            builds = manifest.build.len(),
            tests = manifest.test.len(),
            "loaded manifest"
        );
        Ok(manifest)
    }

    /// Loads `forge.yaml` from the project root.
    pub fn load_from_root(root: impl AsRef<Path>) -> Result<Self, ManifestError> {
        Self::load(root.as_ref().join(MANIFEST_FILE))
    }

    fn validate(&self) -> Result<(), ManifestError> {
        let mut build_names = BTreeSet::new();
        for entry in &self.build {
            if !build_names.insert(entry.name.as_str()) {
                return Err(ManifestError::DuplicateBuildName(entry.name.clone()));
            }
        }

        let mut test_names = BTreeSet::new();
        for entry in &self.test {
            if !test_names.insert(entry.name.as_str()) {
                return Err(ManifestError::DuplicateTestName(entry.name.clone()));
            }
        }

        let mut aliases = BTreeSet::new();
        for composite in &self.engines {
            if composite.kind != "testenv" {
                return Err(ManifestError::UnsupportedCompositeType {
                    alias: composite.alias.clone(),
                    kind: composite.kind.clone(),
                });
            }
            if composite.testenv.is_empty() {
                return Err(ManifestError::EmptyChain(composite.alias.clone()));
            }
            aliases.insert(composite.alias.as_str());
        }

        for entry in &self.test {
            if let Some(environment) = &entry.environment {
                if !aliases.contains(environment.as_str()) {
                    return Err(ManifestError::UnknownEnvironment {
                        test: entry.name.clone(),
                        environment: environment.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// The composite engine named `alias`, if defined.
    pub fn environment(&self, alias: &str) -> Option<&CompositeEngine> {
        self.engines.iter().find(|composite| composite.alias == alias)
    }

    /// Resolves the artifact-store path: the `FORGE_ARTIFACT_STORE_PATH`
    /// environment variable wins over the manifest, which wins over the
    /// default. Relative paths are anchored at the project root.
    pub fn store_path(&self, root: impl AsRef<Path>) -> PathBuf {
        let configured = std::env::var_os(STORE_PATH_ENV)
            .map(PathBuf::from)
            .or_else(|| self.artifact_store_path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_PATH));
        if configured.is_absolute() {
            configured
        } else {
            root.as_ref().join(configured)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    const MANIFEST: &str = r#"
artifactStorePath: .forge/artifacts.json
build:
  - name: hello
    engine: go://go-build
    src: ./cmd/hello
    spec:
      timeout: 30
  - name: docs
    engine: go://docgen
test:
  - name: smoke
    stage: e2e
    runner: go://go-test
    environment: k8s
engines:
  - alias: k8s
    type: testenv
    testenv:
      - engine: go://testenv-kind
      - engine: go://testenv-lcr
        spec:
          port: 5000
"#;

    fn write_manifest(content: &str) -> (tempfile::TempDir, Manifest) {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(MANIFEST_FILE), content).unwrap();
        let manifest = Manifest::load_from_root(tmp.path()).unwrap();
        (tmp, manifest)
    }

    #[test]
    fn parses_the_consumed_subset() {
        let (_tmp, manifest) = write_manifest(MANIFEST);
        assert_eq!(manifest.build.len(), 2);
        assert_eq!(manifest.build[0].name, "hello");
        assert_eq!(manifest.build[0].spec.get("timeout").and_then(|v| v.as_i64()), Some(30));
        assert_eq!(manifest.test[0].environment.as_deref(), Some("k8s"));

        let chain = &manifest.environment("k8s").unwrap().testenv;
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[1].engine, "go://testenv-lcr");
    }

    #[test]
    fn yaml_numbers_land_as_json_numbers() {
        let (_tmp, manifest) = write_manifest(MANIFEST);
        let spec = &manifest.environment("k8s").unwrap().testenv[1].spec;
        assert_eq!(spec.get("port").and_then(|v| v.as_i64()), Some(5000));
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let (_tmp, manifest) = write_manifest(&format!("{MANIFEST}\nfutureTopLevel: true\n"));
        assert_eq!(manifest.build.len(), 2);
    }

    #[test]
    fn duplicate_build_names_fail_validation() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(MANIFEST_FILE),
            "build:\n  - {name: x, engine: go://a}\n  - {name: x, engine: go://b}\n",
        )
        .unwrap();
        let err = Manifest::load_from_root(tmp.path()).unwrap_err();
        assert!(matches!(err, ManifestError::DuplicateBuildName(name) if name == "x"));
    }

    #[test]
    fn unknown_environment_fails_validation() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(MANIFEST_FILE),
            "test:\n  - {name: t, stage: s, runner: go://r, environment: nope}\n",
        )
        .unwrap();
        let err = Manifest::load_from_root(tmp.path()).unwrap_err();
        assert!(matches!(err, ManifestError::UnknownEnvironment { .. }));
    }

    #[test]
    fn store_path_precedence() {
        let (tmp, manifest) = write_manifest(MANIFEST);
        // Manifest value, anchored at root.
        assert_eq!(manifest.store_path(tmp.path()), tmp.path().join(".forge/artifacts.json"));

        // Default when unconfigured.
        let bare = Manifest::default();
        assert_eq!(bare.store_path("/proj"), PathBuf::from("/proj/.forge/artifacts.json"));

        // The environment variable wins over both.
        std::env::set_var(STORE_PATH_ENV, "/var/lib/forge/store.json");
        let path = manifest.store_path(tmp.path());
        std::env::remove_var(STORE_PATH_ENV);
        assert_eq!(path, PathBuf::from("/var/lib/forge/store.json"));
    }
}
