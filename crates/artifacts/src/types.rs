//! Wire types shared between the orchestrator and engine processes.
//!
//! Field names are stable wire keys; every shape here round-trips through
//! JSON both over the tool protocol and in the artifact store file.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicI64, Ordering},
};

/// Free-form engine tuning map.
///
/// Consumers are expected to go through the spec extractor rather than
/// reading the raw values.
pub type SpecMap = serde_json::Map<String, Value>;

/// A single build request handed to a builder engine.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInput {
    /// Name of the output; unique within a manifest.
    pub name: String,
    /// Engine URI, e.g. `go://go-build`.
    pub engine: String,
    /// Source location, relative to the project root.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub src: String,
    /// Output location.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dest: String,
    /// Extra arguments forwarded to the engine.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Environment entries forwarded to the engine.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    /// Engine-specific tuning.
    #[serde(default, skip_serializing_if = "SpecMap::is_empty")]
    pub spec: SpecMap,
}

/// Input of the `buildBatch` tool: an ordered list of build requests.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchBuildInput {
    pub specs: Vec<BuildInput>,
}

/// Input of a test runner's `run` tool.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunInput {
    pub stage: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub work_dir: String,
    #[serde(default, skip_serializing_if = "SpecMap::is_empty")]
    pub spec: SpecMap,
}

/// Controls whether the env accumulated by earlier sub-engines is injected
/// into a sub-engine's process environment in addition to riding along in
/// [`CreateInput::env`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvPropagation {
    /// Accumulated env is merged into the child process environment.
    #[default]
    Merge,
    /// Accumulated env is only visible through the input.
    None,
}

impl EnvPropagation {
    fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// Input of a test-environment sub-engine's `create` tool.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInput {
    /// Globally unique identifier of the test this environment serves.
    #[serde(rename = "testID")]
    pub test_id: String,
    pub stage: String,
    /// Pre-created scratch directory owned by the orchestrator; everything
    /// the sub-engine writes must stay below it.
    pub tmp_dir: String,
    /// Project root, for resolving relative paths from the manifest.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub root_dir: String,
    /// Metadata accumulated from sub-engines earlier in the chain.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    /// Env accumulated from sub-engines earlier in the chain.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "SpecMap::is_empty")]
    pub spec: SpecMap,
    #[serde(default, skip_serializing_if = "EnvPropagation::is_default")]
    pub env_propagation: EnvPropagation,
}

/// Input of a test-environment sub-engine's `delete` tool.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteInput {
    #[serde(rename = "testID")]
    pub test_id: String,
    /// The full accumulated metadata from the create phase, verbatim.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

/// A dependency of a built artifact, as reported by a detector engine.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactDependency {
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub file_path: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub external_package: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub semver: String,
}

/// A record describing a built or generated output.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub name: String,
    /// Artifact class, e.g. [`kind::BINARY`](crate::kind::BINARY).
    #[serde(rename = "type")]
    pub kind: String,
    /// Filesystem path or registry reference.
    pub location: String,
    /// Source-commit identifier for built binaries, empty for generated
    /// content, caller-supplied for container tags.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<ArtifactDependency>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dependency_detector_engine: String,
    #[serde(default, skip_serializing_if = "SpecMap::is_empty")]
    pub dependency_detector_spec: SpecMap,
    /// Unknown fields are preserved across read-modify-write cycles.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Artifact {
    /// Creates an artifact versioned with the source tree's commit hash and
    /// stamped with the current UTC time.
    ///
    /// Errors from the commit helper are propagated; callers that tolerate an
    /// unversioned build can use [`commit_hash_or_unknown`] with
    /// [`Self::custom`] instead.
    ///
    /// [`commit_hash_or_unknown`]: crate::commit_hash_or_unknown
    pub fn versioned(
        name: impl Into<String>,
        kind: impl Into<String>,
        location: impl Into<String>,
    ) -> Result<Self, crate::VersionError> {
        let version = crate::commit_hash(std::env::current_dir().ok().as_deref())?;
        Ok(Self::custom(name, kind, location, version))
    }

    /// Creates an unversioned artifact (generated code, test reports, ...).
    pub fn new(
        name: impl Into<String>,
        kind: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self::custom(name, kind, location, String::new())
    }

    /// Creates an artifact with a caller-supplied version string (container
    /// tags, semver).
    pub fn custom(
        name: impl Into<String>,
        kind: impl Into<String>,
        location: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            location: location.into(),
            version: version.into(),
            timestamp: Some(now_utc()),
            ..Default::default()
        }
    }
}

/// Output of a test-environment sub-engine's `create` tool.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestEnvArtifact {
    #[serde(rename = "testID")]
    pub test_id: String,
    /// Logical name to path relative to this sub-engine's `tmpDir`.
    /// Absolute paths are a protocol violation.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub files: BTreeMap<String, String>,
    /// Keys are prefixed with the emitting sub-engine's name,
    /// e.g. `testenv-kind.kubeconfigPath`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    /// Absolute paths or opaque resource identifiers torn down on delete.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub managed_resources: Vec<String>,
    /// Env exported to downstream sub-engines and the test run.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

/// Outcome of a test execution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    #[default]
    Passed,
    Failed,
}

impl TestStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

impl std::fmt::Display for TestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Passed => f.write_str("passed"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// Per-count test statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestStats {
    pub total: u64,
    pub passed: u64,
    pub failed: u64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub skipped: u64,
}

fn is_zero(n: &u64) -> bool {
    *n == 0
}

/// Structured record of one test execution.
///
/// A `failed` status is a real result, not an execution error: the runner
/// returns the report to the caller either way.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestReport {
    pub stage: String,
    pub status: TestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Wall-clock duration in seconds.
    #[serde(default, skip_serializing_if = "is_zero_f64")]
    pub duration: f64,
    #[serde(default)]
    pub test_stats: TestStats,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error_message: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

fn is_zero_f64(f: &f64) -> bool {
    *f == 0.0
}

impl TestReport {
    /// Short human summary, e.g. `2/10 tests failed`.
    pub fn summary(&self) -> String {
        match self.status {
            TestStatus::Passed => {
                format!("{}/{} tests passed", self.test_stats.passed, self.test_stats.total)
            }
            TestStatus::Failed => {
                format!("{}/{} tests failed", self.test_stats.failed, self.test_stats.total)
            }
        }
    }
}

static LAST_TIMESTAMP_MICROS: AtomicI64 = AtomicI64::new(i64::MIN);

/// Current UTC time, clamped so that successive calls within one process
/// never go backwards.
pub(crate) fn now_utc() -> DateTime<Utc> {
    let mut now = Utc::now().timestamp_micros();
    let prev = LAST_TIMESTAMP_MICROS.fetch_max(now, Ordering::SeqCst);
    if prev > now {
        now = prev;
    }
    Utc.timestamp_micros(now).single().unwrap_or_else(Utc::now)
}
