//! `run` endpoint shaping.
//!
//! A failed test run is a real result: the protocol result is error-flagged
//! so callers notice, but the report still rides along as structured content
//! for summaries and history. Only an execution failure (the callback
//! erroring out) is a bare error with no payload.

use crate::tools::RunTestFn;
use forge_artifacts::RunInput;
use forge_common::protocol::ToolResult;
use serde_json::Value;

const PREFIX: &str = "Run failed:";

pub(crate) async fn handle_run(run_test: &RunTestFn, arguments: Option<Value>) -> ToolResult {
    let input: RunInput = match serde_json::from_value(arguments.unwrap_or(Value::Null)) {
        Ok(input) => input,
        Err(err) => return ToolResult::error(format!("{PREFIX} invalid input: {err}")),
    };
    for (field, value) in [("stage", &input.stage), ("name", &input.name)] {
        if value.is_empty() {
            return ToolResult::error(format!("{PREFIX} missing required field {field:?}"));
        }
    }

    let stage = input.stage.clone();
    match run_test(input).await {
        Ok(report) => {
            let structured = serde_json::to_value(&report).expect("report serializes");
            if report.status.is_failed() {
                ToolResult::error(format!(
                    "Tests failed for stage {stage}: {}",
                    report.error_message
                ))
                .with_structured(structured)
            } else {
                ToolResult::text(format!("Tests passed for stage {stage}: {}", report.summary()))
                    .with_structured(structured)
            }
        }
        Err(err) => {
            warn!(%stage, %err, "test execution failed");
            ToolResult::error(format!("{PREFIX} {err:#}"))
        }
    }
}
