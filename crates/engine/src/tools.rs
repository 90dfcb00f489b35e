//! Tool registration.
//!
//! Engines come in three shapes (builder, test runner, test-environment
//! sub-engine), each registered from a config carrying a name, a version and
//! the engine's callbacks. The shapes are independent capabilities; there is
//! no common engine trait over them.

use crate::{builder, runner, testenv};
use forge_artifacts::{Artifact, BuildInput, CreateInput, DeleteInput, RunInput, TestEnvArtifact, TestReport};
use forge_common::protocol::{Implementation, ToolDescriptor, ToolResult};
use futures::future::BoxFuture;
use serde_json::Value;
use std::{collections::BTreeMap, sync::Arc};

/// Builds one artifact.
pub type BuildFn =
    Arc<dyn Fn(BuildInput) -> BoxFuture<'static, eyre::Result<Artifact>> + Send + Sync>;

/// Executes one test run. Returning a report with `status: failed` is a
/// result, not an error; return `Err` only when the run itself could not be
/// executed.
pub type RunTestFn =
    Arc<dyn Fn(RunInput) -> BoxFuture<'static, eyre::Result<TestReport>> + Send + Sync>;

/// Provisions this sub-engine's slice of a test environment.
pub type CreateFn =
    Arc<dyn Fn(CreateInput) -> BoxFuture<'static, eyre::Result<TestEnvArtifact>> + Send + Sync>;

/// Tears down what `create` provisioned. Must tolerate already-gone
/// resources.
pub type DeleteFn =
    Arc<dyn Fn(DeleteInput) -> BoxFuture<'static, eyre::Result<()>> + Send + Sync>;

/// Registration config for a builder engine; exposes `build` and
/// `buildBatch`.
pub struct BuilderTools {
    pub name: String,
    pub version: String,
    pub build: BuildFn,
}

/// Registration config for a test-runner engine; exposes `run`.
pub struct TestRunnerTools {
    pub name: String,
    pub version: String,
    pub run_test: RunTestFn,
}

/// Registration config for a test-environment sub-engine; exposes `create`
/// and `delete`.
pub struct TestEnvSubengineTools {
    pub name: String,
    pub version: String,
    pub create: CreateFn,
    pub delete: DeleteFn,
}

pub(crate) type Handler =
    Box<dyn Fn(Option<Value>) -> BoxFuture<'static, ToolResult> + Send + Sync>;

pub(crate) struct RegisteredTool {
    pub description: String,
    pub handler: Handler,
}

/// The set of tool endpoints an engine process serves.
pub struct ToolSet {
    name: String,
    version: String,
    tools: BTreeMap<String, RegisteredTool>,
}

impl ToolSet {
    fn new(name: String, version: String) -> Self {
        Self { name, version, tools: BTreeMap::new() }
    }

    pub(crate) fn register(
        &mut self,
        tool: &str,
        description: impl Into<String>,
        handler: Handler,
    ) {
        let previous = self.tools.insert(
            tool.to_string(),
            RegisteredTool { description: description.into(), handler },
        );
        debug_assert!(previous.is_none(), "tool {tool} registered twice");
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn server_info(&self) -> Implementation {
        Implementation { name: self.name.clone(), version: self.version.clone() }
    }

    /// Descriptors for `tools/list`, in registration-name order.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools
            .iter()
            .map(|(name, tool)| ToolDescriptor {
                name: name.clone(),
                description: tool.description.clone(),
            })
            .collect()
    }

    /// Dispatches one call. `None` when no such tool is registered.
    pub async fn call(&self, tool: &str, arguments: Option<Value>) -> Option<ToolResult> {
        let registered = self.tools.get(tool)?;
        Some((registered.handler)(arguments).await)
    }
}

impl From<BuilderTools> for ToolSet {
    fn from(config: BuilderTools) -> Self {
        let mut set = Self::new(config.name, config.version);
        let build = config.build.clone();
        set.register(
            "build",
            "Build a single artifact from a build input",
            Box::new(move |args| {
                let build = build.clone();
                Box::pin(async move { builder::handle_build(&build, args).await })
            }),
        );
        let build = config.build;
        set.register(
            "buildBatch",
            "Build an ordered batch of artifacts",
            Box::new(move |args| {
                let build = build.clone();
                Box::pin(async move { builder::handle_build_batch(&build, args).await })
            }),
        );
        set
    }
}

impl From<TestRunnerTools> for ToolSet {
    fn from(config: TestRunnerTools) -> Self {
        let mut set = Self::new(config.name, config.version);
        let run_test = config.run_test;
        set.register(
            "run",
            "Execute tests and return a structured report",
            Box::new(move |args| {
                let run_test = run_test.clone();
                Box::pin(async move { runner::handle_run(&run_test, args).await })
            }),
        );
        set
    }
}

impl From<TestEnvSubengineTools> for ToolSet {
    fn from(config: TestEnvSubengineTools) -> Self {
        let mut set = Self::new(config.name, config.version);
        let create = config.create;
        set.register(
            "create",
            "Provision this sub-engine's slice of a test environment",
            Box::new(move |args| {
                let create = create.clone();
                Box::pin(async move { testenv::handle_create(&create, args).await })
            }),
        );
        let delete = config.delete;
        set.register(
            "delete",
            "Tear down previously provisioned resources",
            Box::new(move |args| {
                let delete = delete.clone();
                Box::pin(async move { testenv::handle_delete(&delete, args).await })
            }),
        );
        set
    }
}
