//! The in-process library each engine links against to expose its tools over
//! the Forge tool protocol.
//!
//! An engine's `main` hands a tool-set to [`run`]; the framework recognizes
//! the `--mcp` marker, serves the protocol on the standard streams, and takes
//! care of input validation, error shaping and artifact formatting around the
//! engine's callbacks.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

#[macro_use]
extern crate tracing;

pub mod spec;
pub use spec::{Spec, SpecError};

mod tools;
pub use tools::{
    BuildFn, BuilderTools, CreateFn, DeleteFn, RunTestFn, TestEnvSubengineTools, TestRunnerTools,
    ToolSet,
};

mod builder;
mod runner;
mod testenv;

mod server;
pub use server::{run, serve, serve_stdio};

mod env_guard;
pub use env_guard::ScopedEnv;
