//! Engine client: spawn an engine subprocess, open a protocol session on its
//! standard streams, issue a single tool call, tear the session down.
//!
//! The client does not retry; retry is policy owned by the caller. Tool-level
//! failures and transport failures are distinct variants so callers can make
//! that call.

use crate::{
    protocol::{
        method, CallToolParams, Implementation, InitializeParams, InitializeResult, Request,
        RequestId, Response, ToolResult, PROTOCOL_VERSION, SERVE_FLAG,
    },
    transport::{FramedReader, FramedWriter},
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::{collections::BTreeMap, io, process::Stdio, time::Duration};
use tokio::{
    process::{Child, ChildStdin, ChildStdout, Command},
    time,
};

/// Grace period between closing an engine's stdin and killing the process.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// A resolved engine: a spawnable program plus its argument list, before the
/// [`SERVE_FLAG`] marker is appended.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EngineCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Extra environment entries for the child; the current environment is
    /// inherited either way.
    pub env: BTreeMap<String, String>,
}

impl EngineCommand {
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = String>) -> Self {
        Self { program: program.into(), args: args.into_iter().collect(), env: BTreeMap::new() }
    }

    /// Adds environment entries for the child process.
    pub fn with_env(mut self, env: impl IntoIterator<Item = (String, String)>) -> Self {
        self.env.extend(env);
        self
    }
}

impl std::fmt::Display for EngineCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Errors surfaced by [`EngineInvoker::invoke`].
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    /// The engine ran the tool and reported failure. May still carry the
    /// tool's structured payload (a failed test run carries its report).
    #[error("{message}")]
    Tool { message: String, structured: Option<Value> },
    /// The engine rejected the request at the RPC layer.
    #[error("engine rejected call: {message} (code {code})")]
    Rpc { code: i64, message: String },
    /// The engine process could not be spawned.
    #[error("failed to spawn engine `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    /// The stream broke mid-session.
    #[error("engine transport failure: {0}")]
    Io(#[from] io::Error),
    /// The engine closed its stream without answering.
    #[error("engine closed the session before responding")]
    ClosedUnexpectedly,
    /// The structured payload did not decode into the expected shape.
    #[error("failed to decode engine result: {0}")]
    Decode(#[source] serde_json::Error),
    /// The call outlived its deadline. The child has been terminated.
    #[error("engine call timed out after {0:?}")]
    Timeout(Duration),
}

impl InvokeError {
    /// Whether this failure is a transport-level fault (as opposed to a
    /// result the engine produced deliberately).
    pub fn is_transport(&self) -> bool {
        !matches!(self, Self::Tool { .. })
    }

    /// The structured payload attached to a tool-level failure, if any.
    pub fn structured_content(&self) -> Option<&Value> {
        match self {
            Self::Tool { structured, .. } => structured.as_ref(),
            _ => None,
        }
    }
}

/// Decoded output of a successful tool call.
#[derive(Clone, Debug, Default)]
pub struct ToolOutput {
    /// Human summary from the first content entry.
    pub summary: String,
    /// Machine-readable payload, when the tool produced one.
    pub structured: Option<Value>,
}

impl ToolOutput {
    /// Decodes the structured payload into `O` by JSON round-trip, so no
    /// reflective knowledge of the remote type is needed.
    pub fn decode<O: DeserializeOwned>(&self) -> Result<O, InvokeError> {
        let value = self.structured.clone().unwrap_or(Value::Null);
        serde_json::from_value(value).map_err(InvokeError::Decode)
    }
}

/// The seam orchestrators call engines through. The production implementation
/// spawns one subprocess per invocation; tests substitute in-process fakes.
#[async_trait::async_trait]
pub trait EngineInvoker: Send + Sync {
    /// Spawns `cmd`, performs the handshake, calls `tool` with `arguments`,
    /// and closes the session. The child is reaped on every exit path.
    async fn invoke(
        &self,
        cmd: &EngineCommand,
        tool: &str,
        arguments: Value,
        deadline: Option<Duration>,
    ) -> Result<ToolOutput, InvokeError>;
}

/// Default [`EngineInvoker`] backed by real subprocesses.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessInvoker;

#[async_trait::async_trait]
impl EngineInvoker for ProcessInvoker {
    async fn invoke(
        &self,
        cmd: &EngineCommand,
        tool: &str,
        arguments: Value,
        deadline: Option<Duration>,
    ) -> Result<ToolOutput, InvokeError> {
        let mut session = Session::spawn(cmd)?;
        let result = match deadline {
            Some(limit) => match time::timeout(limit, session.call(tool, arguments)).await {
                Ok(result) => result,
                Err(_) => {
                    session.kill().await;
                    return Err(InvokeError::Timeout(limit));
                }
            },
            None => session.call(tool, arguments).await,
        };
        session.close().await;
        result
    }
}

/// One protocol session with one engine child process.
struct Session {
    child: Child,
    writer: Option<FramedWriter<ChildStdin>>,
    reader: FramedReader<ChildStdout>,
    next_id: i64,
    initialized: bool,
}

impl Session {
    fn spawn(cmd: &EngineCommand) -> Result<Self, InvokeError> {
        let mut child = Command::new(&cmd.program)
            .args(&cmd.args)
            .arg(SERVE_FLAG)
            .envs(&cmd.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| InvokeError::Spawn { command: cmd.to_string(), source })?;

        let stdin = child.stdin.take().expect("child stdin is piped");
        let stdout = child.stdout.take().expect("child stdout is piped");
        debug!(command = %cmd, "spawned engine");
        Ok(Self {
            child,
            writer: Some(FramedWriter::new(stdin)),
            reader: FramedReader::new(stdout),
            next_id: 0,
            initialized: false,
        })
    }

    async fn call(&mut self, tool: &str, arguments: Value) -> Result<ToolOutput, InvokeError> {
        self.initialize().await?;

        let params = CallToolParams { name: tool.to_string(), arguments: Some(arguments) };
        let result: ToolResult = self
            .request(method::TOOLS_CALL, serde_json::to_value(params).expect("params serialize"))
            .await?;

        let summary = result.summary().unwrap_or_default().to_string();
        if result.is_error() {
            return Err(InvokeError::Tool {
                message: summary,
                structured: result.structured_content,
            });
        }
        Ok(ToolOutput { summary, structured: result.structured_content })
    }

    async fn initialize(&mut self) -> Result<(), InvokeError> {
        if self.initialized {
            return Ok(());
        }
        let params = InitializeParams {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: Value::Object(Default::default()),
            client_info: Implementation {
                name: "forge".to_string(),
                version: crate::VERSION.to_string(),
            },
        };
        let result: InitializeResult = self
            .request(method::INITIALIZE, serde_json::to_value(params).expect("params serialize"))
            .await?;
        trace!(server = %result.server_info.name, version = %result.server_info.version, "session established");

        let writer = self.writer.as_mut().expect("session is open");
        writer.write(&Request::notification(method::INITIALIZED, None)).await?;
        self.initialized = true;
        Ok(())
    }

    /// Sends one request and waits for the matching response, skipping any
    /// notifications the engine interleaves.
    async fn request<T: DeserializeOwned>(
        &mut self,
        rpc_method: &str,
        params: Value,
    ) -> Result<T, InvokeError> {
        self.next_id += 1;
        let id = self.next_id;
        let writer = self.writer.as_mut().expect("session is open");
        writer.write(&Request::new(id, rpc_method, Some(params))).await?;

        loop {
            let Some(response) = self.reader.read::<Response>().await? else {
                return Err(InvokeError::ClosedUnexpectedly);
            };
            if response.id != RequestId::Number(id) {
                trace!(?response.id, "skipping unsolicited message");
                continue;
            }
            if let Some(err) = response.error {
                return Err(InvokeError::Rpc { code: err.code, message: err.message });
            }
            let result = response.result.unwrap_or(Value::Null);
            return serde_json::from_value(result).map_err(InvokeError::Decode);
        }
    }

    /// Closes stdin so the engine's serve loop sees EOF, then waits for exit
    /// within a grace period before hard-killing.
    async fn close(mut self) {
        if let Some(writer) = self.writer.take() {
            let _ = writer.shutdown().await;
        }
        match time::timeout(SHUTDOWN_GRACE, self.child.wait()).await {
            Ok(Ok(status)) => trace!(%status, "engine exited"),
            Ok(Err(err)) => warn!(%err, "failed to reap engine"),
            Err(_) => {
                warn!("engine did not exit within grace period, killing");
                self.kill().await;
            }
        }
    }

    async fn kill(&mut self) {
        if let Err(err) = self.child.kill().await {
            warn!(%err, "failed to kill engine process");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_errors_are_not_transport_errors() {
        let tool = InvokeError::Tool { message: "Build failed: x".into(), structured: None };
        assert!(!tool.is_transport());
        let io = InvokeError::Io(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
        assert!(io.is_transport());
    }

    #[test]
    fn engine_command_display() {
        let cmd = EngineCommand::new("go", ["run".to_string(), "example.com/x@v1".to_string()]);
        assert_eq!(cmd.to_string(), "go run example.com/x@v1");
    }

    #[tokio::test]
    async fn spawn_failure_is_spawn_error() {
        let cmd = EngineCommand::new("/nonexistent/forge-engine-binary", Vec::new());
        let err = ProcessInvoker
            .invoke(&cmd, "build", Value::Null, Some(Duration::from_secs(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, InvokeError::Spawn { .. }), "{err}");
    }
}
