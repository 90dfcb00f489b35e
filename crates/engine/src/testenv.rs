//! `create` and `delete` endpoint shaping for test-environment sub-engines.

use crate::tools::{CreateFn, DeleteFn};
use forge_artifacts::{CreateInput, DeleteInput};
use forge_common::protocol::ToolResult;
use serde_json::Value;
use std::path::Path;

const CREATE_PREFIX: &str = "Create failed:";
const DELETE_PREFIX: &str = "Delete failed:";

pub(crate) async fn handle_create(create: &CreateFn, arguments: Option<Value>) -> ToolResult {
    let input: CreateInput = match serde_json::from_value(arguments.unwrap_or(Value::Null)) {
        Ok(input) => input,
        Err(err) => return ToolResult::error(format!("{CREATE_PREFIX} invalid input: {err}")),
    };
    for (field, value) in
        [("testID", &input.test_id), ("stage", &input.stage), ("tmpDir", &input.tmp_dir)]
    {
        if value.is_empty() {
            return ToolResult::error(format!("{CREATE_PREFIX} missing required field {field:?}"));
        }
    }

    let test_id = input.test_id.clone();
    match create(input).await {
        Ok(artifact) => {
            // Emitted file paths must stay relative to this sub-engine's
            // tmpDir; an absolute path breaks the owner's accounting.
            for (logical, path) in &artifact.files {
                if Path::new(path).is_absolute() {
                    return ToolResult::error(format!(
                        "{CREATE_PREFIX} file {logical:?} resolves to absolute path {path:?}; \
                         paths must be relative to tmpDir"
                    ));
                }
            }
            let structured = serde_json::to_value(&artifact).expect("artifact serializes");
            ToolResult::text(format!(
                "Created test environment slice for {}",
                artifact.test_id
            ))
            .with_structured(structured)
        }
        Err(err) => {
            warn!(%test_id, %err, "create callback failed");
            ToolResult::error(format!("{CREATE_PREFIX} {err:#}"))
        }
    }
}

pub(crate) async fn handle_delete(delete: &DeleteFn, arguments: Option<Value>) -> ToolResult {
    let input: DeleteInput = match serde_json::from_value(arguments.unwrap_or(Value::Null)) {
        Ok(input) => input,
        Err(err) => return ToolResult::error(format!("{DELETE_PREFIX} invalid input: {err}")),
    };
    if input.test_id.is_empty() {
        return ToolResult::error(format!("{DELETE_PREFIX} missing required field \"testID\""));
    }

    let test_id = input.test_id.clone();
    match delete(input).await {
        Ok(()) => ToolResult::text(format!("Deleted test environment slice for {test_id}")),
        Err(err) => {
            // Surfaced so callers see it in logs; the delete chain carries on
            // regardless.
            warn!(%test_id, %err, "delete callback failed");
            ToolResult::error(format!("{DELETE_PREFIX} {err:#}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_artifacts::TestEnvArtifact;
    use serde_json::json;
    use std::{collections::BTreeMap, sync::Arc};

    fn create_fn(files: BTreeMap<String, String>) -> CreateFn {
        Arc::new(move |input: CreateInput| {
            let files = files.clone();
            Box::pin(async move {
                Ok(TestEnvArtifact {
                    test_id: input.test_id,
                    files,
                    metadata: BTreeMap::from([(
                        "stub-cluster.kubeconfigPath".to_string(),
                        "kubeconfig".to_string(),
                    )]),
                    ..Default::default()
                })
            })
        })
    }

    fn create_args() -> Option<Value> {
        Some(json!({"testID": "t-1", "stage": "e2e", "tmpDir": "/tmp/forge-t1/stub-0"}))
    }

    #[tokio::test]
    async fn create_success_serializes_artifact_map() {
        let files = BTreeMap::from([("kubeconfig".to_string(), "kubeconfig".to_string())]);
        let result = handle_create(&create_fn(files), create_args()).await;
        assert!(!result.is_error());
        let structured = result.structured_content.unwrap();
        assert_eq!(structured["testID"], "t-1");
        assert_eq!(structured["files"]["kubeconfig"], "kubeconfig");
        assert_eq!(structured["metadata"]["stub-cluster.kubeconfigPath"], "kubeconfig");
    }

    #[tokio::test]
    async fn create_rejects_absolute_file_paths() {
        let files = BTreeMap::from([("kubeconfig".to_string(), "/etc/kubeconfig".to_string())]);
        let result = handle_create(&create_fn(files), create_args()).await;
        assert!(result.is_error());
        assert!(result.summary().unwrap().starts_with("Create failed:"));
    }

    #[tokio::test]
    async fn create_validates_required_fields() {
        let result =
            handle_create(&create_fn(BTreeMap::new()), Some(json!({"stage": "e2e"}))).await;
        assert!(result.is_error());
        assert!(result.summary().unwrap().starts_with("Create failed: missing required field"));
    }

    #[tokio::test]
    async fn delete_requires_test_id() {
        let delete: DeleteFn = Arc::new(|_| Box::pin(async { Ok(()) }));
        let result = handle_delete(&delete, Some(json!({}))).await;
        assert!(result.is_error());
        assert!(result.summary().unwrap().starts_with("Delete failed:"));
    }

    #[tokio::test]
    async fn delete_error_is_protocol_error() {
        let delete: DeleteFn =
            Arc::new(|_| Box::pin(async { Err(eyre::eyre!("cluster gone sideways")) }));
        let result = handle_delete(&delete, Some(json!({"testID": "t-1"}))).await;
        assert!(result.is_error());
        assert!(result.summary().unwrap().contains("cluster gone sideways"));
    }
}
