//! Forge composes a declarative `forge.yaml` pipeline into a directed set of
//! engine invocations: builds fan out with bounded concurrency, test
//! environments are provisioned by ordered sub-engine chains and torn down in
//! reverse, and every produced artifact lands in the content-addressed store.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

#[macro_use]
extern crate tracing;

pub mod args;
pub mod cmd;
pub mod opts;

pub mod builder;
pub use builder::{BuildFailure, BuildOrchestrator, BuildOutcome};

pub mod testenv;
pub use testenv::{TestEnvOrchestrator, TestEnvironment};

pub mod runner;
pub use runner::{TestOrchestrator, TestOutcome};
