//! Artifact records exchanged with Forge engines and the on-disk store that
//! persists them across runs.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

#[macro_use]
extern crate tracing;

mod types;
pub use types::{
    Artifact, ArtifactDependency, BatchBuildInput, BuildInput, CreateInput, DeleteInput,
    EnvPropagation, RunInput, SpecMap, TestEnvArtifact, TestReport, TestStats, TestStatus,
};

pub mod kind;

mod store;
pub use store::{ArtifactStore, StoreError};

mod version;
pub use version::{commit_hash, commit_hash_or_unknown, VersionError};
