//! Dependency-detector dispatch.
//!
//! A detector is an auxiliary engine a builder invokes after producing its
//! artifact; it reports the artifact's dependency list. Tool-level failures
//! are retried once after a brief delay; transport failures are structural
//! and fail immediately.

use crate::{
    retry::{retry, Attempt, RetryPolicy},
    EngineCommand, EngineInvoker, InvokeError,
};
use forge_artifacts::ArtifactDependency;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Default deadline for a detector call; detectors answer metadata queries
/// and should be quick.
pub const DETECTOR_DEADLINE: Duration = Duration::from_secs(30);

#[derive(Debug, Default, Deserialize)]
struct DependencyList {
    #[serde(default)]
    dependencies: Vec<ArtifactDependency>,
}

/// Calls `tool` on a resolved detector and decodes the returned dependency
/// list.
pub async fn call_detector(
    invoker: &dyn EngineInvoker,
    cmd: &EngineCommand,
    tool: &str,
    input: Value,
    deadline: Option<Duration>,
) -> Result<Vec<ArtifactDependency>, InvokeError> {
    let deadline = deadline.or(Some(DETECTOR_DEADLINE));
    let output = retry(RetryPolicy::once_more(), || {
        let input = input.clone();
        async move {
            invoker.invoke(cmd, tool, input, deadline).await.map_err(|err| {
                if err.is_transport() {
                    Attempt::Permanent(err)
                } else {
                    warn!(%err, "detector call failed, will retry once");
                    Attempt::Transient(err)
                }
            })
        }
    })
    .await?;

    if output.structured.is_none() {
        return Ok(Vec::new());
    }
    let list: DependencyList = output.decode()?;
    Ok(list.dependencies)
}
