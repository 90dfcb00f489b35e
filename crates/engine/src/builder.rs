//! `build` and `buildBatch` endpoint shaping.

use crate::tools::BuildFn;
use forge_artifacts::{Artifact, BatchBuildInput, BuildInput};
use forge_common::protocol::ToolResult;
use futures::future::join_all;
use serde_json::{json, Value};

const PREFIX: &str = "Build failed:";

fn decode_input(arguments: Option<Value>) -> Result<BuildInput, String> {
    let input: BuildInput = serde_json::from_value(arguments.unwrap_or(Value::Null))
        .map_err(|err| format!("{PREFIX} invalid input: {err}"))?;
    for (field, value) in [("name", &input.name), ("engine", &input.engine)] {
        if value.is_empty() {
            return Err(format!("{PREFIX} missing required field {field:?}"));
        }
    }
    Ok(input)
}

pub(crate) async fn handle_build(build: &BuildFn, arguments: Option<Value>) -> ToolResult {
    let input = match decode_input(arguments) {
        Ok(input) => input,
        Err(message) => return ToolResult::error(message),
    };
    let name = input.name.clone();
    match build(input).await {
        Ok(artifact) => {
            let structured = serde_json::to_value(&artifact).expect("artifact serializes");
            ToolResult::text(format!("Built {} at {}", artifact.name, artifact.location))
                .with_structured(structured)
        }
        Err(err) => {
            warn!(%name, %err, "build callback failed");
            ToolResult::error(format!("{PREFIX} {err:#}"))
        }
    }
}

/// Dispatches every spec through the single-build handler, concurrently but
/// order-preserving: successful artifacts keep the relative order of their
/// specs, failed indices are omitted from the artifacts list and enumerated
/// in the error text.
pub(crate) async fn handle_build_batch(build: &BuildFn, arguments: Option<Value>) -> ToolResult {
    let batch: BatchBuildInput = match serde_json::from_value(arguments.unwrap_or(Value::Null)) {
        Ok(batch) => batch,
        Err(err) => return ToolResult::error(format!("{PREFIX} invalid batch input: {err}")),
    };

    let total = batch.specs.len();
    let results = join_all(
        batch
            .specs
            .into_iter()
            .map(|spec| handle_build(build, Some(serde_json::to_value(spec).expect("spec serializes")))),
    )
    .await;

    let mut artifacts: Vec<Artifact> = Vec::with_capacity(results.len());
    let mut failures: Vec<String> = Vec::new();
    for result in results {
        if result.is_error() {
            failures.push(result.summary().unwrap_or("unknown failure").to_string());
        } else if let Some(structured) = result.structured_content {
            match serde_json::from_value(structured) {
                Ok(artifact) => artifacts.push(artifact),
                Err(err) => failures.push(format!("{PREFIX} malformed artifact: {err}")),
            }
        }
    }

    let structured = json!({ "artifacts": artifacts });
    if failures.is_empty() {
        ToolResult::text(format!("Built {total} artifacts")).with_structured(structured)
    } else {
        let mut text =
            format!("{} of {total} builds failed:", failures.len());
        for failure in &failures {
            text.push_str("\n  ");
            text.push_str(failure);
        }
        ToolResult::error(text).with_structured(structured)
    }
}
