//! An in-process [`EngineInvoker`] that dispatches to stub tool-sets and
//! records every call, so orchestrator tests can assert on ordering without
//! spawning processes.

use forge_common::{
    engine_name, EngineCommand, EngineInvoker, EngineResolver, InvokeError, ResolveError,
    ToolOutput,
};
use forge_engine::ToolSet;
use serde_json::Value;
use std::{
    collections::BTreeMap,
    io,
    sync::Mutex,
};

/// One observed engine call.
#[derive(Clone, Debug)]
pub struct RecordedCall {
    pub program: String,
    pub tool: String,
    pub arguments: Value,
    pub env: BTreeMap<String, String>,
}

/// Resolves `go://<name>` to a bare command named `<name>`, which the
/// [`RecordingInvoker`] then dispatches in process.
#[derive(Clone, Copy, Debug, Default)]
pub struct StubResolver;

impl EngineResolver for StubResolver {
    fn resolve(&self, uri: &str) -> Result<EngineCommand, ResolveError> {
        Ok(EngineCommand::new(engine_name(uri)?, Vec::new()))
    }
}

/// Dispatches invocations to registered tool-sets, shaping results the way
/// the real client does, and records each call in order.
#[derive(Default)]
pub struct RecordingInvoker {
    engines: BTreeMap<String, ToolSet>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl RecordingInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `tools` under its engine short name.
    pub fn with_engine(mut self, program: impl Into<String>, tools: ToolSet) -> Self {
        self.engines.insert(program.into(), tools);
        self
    }

    /// Everything invoked so far, in call order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("calls lock").clone()
    }

    /// The `(program, tool)` pairs invoked so far, in call order.
    pub fn call_log(&self) -> Vec<(String, String)> {
        self.calls().into_iter().map(|call| (call.program, call.tool)).collect()
    }
}

#[async_trait::async_trait]
impl EngineInvoker for RecordingInvoker {
    async fn invoke(
        &self,
        cmd: &EngineCommand,
        tool: &str,
        arguments: Value,
        _deadline: Option<std::time::Duration>,
    ) -> Result<ToolOutput, InvokeError> {
        self.calls.lock().expect("calls lock").push(RecordedCall {
            program: cmd.program.clone(),
            tool: tool.to_string(),
            arguments: arguments.clone(),
            env: cmd.env.clone(),
        });

        let tools = self.engines.get(&cmd.program).ok_or_else(|| InvokeError::Spawn {
            command: cmd.to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "no such stub engine"),
        })?;
        let result = tools.call(tool, Some(arguments)).await.ok_or_else(|| InvokeError::Rpc {
            code: forge_common::protocol::error_code::INVALID_PARAMS,
            message: format!("unknown tool {tool:?}"),
        })?;

        let summary = result.summary().unwrap_or_default().to_string();
        if result.is_error() {
            Err(InvokeError::Tool { message: summary, structured: result.structured_content })
        } else {
            Ok(ToolOutput { summary, structured: result.structured_content })
        }
    }
}
