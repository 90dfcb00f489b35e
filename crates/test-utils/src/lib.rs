//! # forge-test-utils
//!
//! Internal Forge testing utilities: stub engine tool-sets, an in-process
//! recording invoker for orchestrator tests, and temp-project scaffolding.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod stubs;
pub use stubs::{
    failing_subengine_tools, slow_builder_tools, stub_builder_tools, stub_runner_tools,
    stub_subengine_tools,
};

mod invoker;
pub use invoker::{RecordedCall, RecordingInvoker, StubResolver};

mod project;
pub use project::TestProject;

/// Initializes tracing for tests.
pub fn init_tracing() {
    let _ = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
