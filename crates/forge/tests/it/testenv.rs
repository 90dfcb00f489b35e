use forge::TestEnvOrchestrator;
use forge_config::SubengineRef;
use forge_test_utils::{
    failing_subengine_tools, stub_subengine_tools, RecordingInvoker, StubResolver, TestProject,
};
use std::sync::Arc;

fn chain_ref(name: &str) -> SubengineRef {
    SubengineRef { engine: format!("go://{name}"), ..Default::default() }
}

#[tokio::test]
async fn chain_threads_state_and_deletes_in_reverse() {
    let project = TestProject::new();
    let invoker = Arc::new(
        RecordingInvoker::new()
            .with_engine("stub-cluster", stub_subengine_tools("stub-cluster"))
            .with_engine("stub-registry", stub_subengine_tools("stub-registry")),
    );
    let orchestrator = TestEnvOrchestrator::new(invoker.clone(), Arc::new(StubResolver));

    let chain = [chain_ref("stub-cluster"), chain_ref("stub-registry")];
    let env = orchestrator.create("e2e", project.root(), &chain).await.unwrap();

    assert!(env.test_id.starts_with("e2e-"));
    assert!(env.metadata.contains_key("stub-cluster.kubeconfigPath"));
    assert!(env.metadata.contains_key("stub-registry.kubeconfigPath"));
    assert_eq!(env.env.get("STUB_CLUSTER_READY").map(String::as_str), Some("1"));
    assert_eq!(env.completed.len(), 2);
    assert_eq!(env.artifacts.len(), 2);

    // Files resolve to absolute paths under each sub-engine's tmp dir.
    let kubeconfig = env.files.get("kubeconfig").unwrap();
    assert!(kubeconfig.is_absolute());
    assert!(kubeconfig.exists());
    assert!(kubeconfig.starts_with(env.tmp_dir.join("stub-registry-1")));

    // The second sub-engine saw the first one's accumulated state.
    let registry_create = invoker
        .calls()
        .into_iter()
        .find(|call| call.program == "stub-registry" && call.tool == "create")
        .unwrap();
    assert_eq!(
        registry_create.arguments["metadata"]["stub-cluster.kubeconfigPath"],
        env.metadata["stub-cluster.kubeconfigPath"].as_str(),
    );

    let tmp_dir = env.tmp_dir.clone();
    orchestrator.delete(&env).await;

    assert_eq!(
        invoker.call_log(),
        [
            ("stub-cluster".to_string(), "create".to_string()),
            ("stub-registry".to_string(), "create".to_string()),
            ("stub-registry".to_string(), "delete".to_string()),
            ("stub-cluster".to_string(), "delete".to_string()),
        ]
    );

    // Every delete received the full accumulated metadata.
    for call in invoker.calls().iter().filter(|call| call.tool == "delete") {
        assert!(call.arguments["metadata"]["stub-cluster.kubeconfigPath"].is_string());
        assert!(call.arguments["metadata"]["stub-registry.kubeconfigPath"].is_string());
    }

    assert!(!tmp_dir.exists(), "scratch tree is removed after deletion");
}

#[tokio::test]
async fn mid_chain_failure_rolls_back_completed_prefix() {
    let project = TestProject::new();
    let invoker = Arc::new(
        RecordingInvoker::new()
            .with_engine("stub-cluster", stub_subengine_tools("stub-cluster"))
            .with_engine("stub-registry", failing_subengine_tools("stub-registry"))
            .with_engine("stub-charts", stub_subengine_tools("stub-charts")),
    );
    let orchestrator = TestEnvOrchestrator::new(invoker.clone(), Arc::new(StubResolver));

    let chain = [chain_ref("stub-cluster"), chain_ref("stub-registry"), chain_ref("stub-charts")];
    let err = orchestrator.create("midfail", project.root(), &chain).await.unwrap_err();
    assert!(err.to_string().contains("stub-registry"), "{err}");

    // Exactly one delete, for the sub-engine that completed, with the
    // metadata it emitted; stub-charts is never reached.
    assert_eq!(
        invoker.call_log(),
        [
            ("stub-cluster".to_string(), "create".to_string()),
            ("stub-registry".to_string(), "create".to_string()),
            ("stub-cluster".to_string(), "delete".to_string()),
        ]
    );
    let delete = invoker.calls().into_iter().find(|call| call.tool == "delete").unwrap();
    assert!(delete.arguments["metadata"]["stub-cluster.kubeconfigPath"]
        .as_str()
        .unwrap()
        .ends_with("kubeconfig"));
}

#[tokio::test]
async fn keep_tmp_preserves_scratch_tree() {
    let project = TestProject::new();
    let invoker = Arc::new(
        RecordingInvoker::new().with_engine("stub-cluster", stub_subengine_tools("stub-cluster")),
    );
    let orchestrator =
        TestEnvOrchestrator::new(invoker, Arc::new(StubResolver)).keep_tmp(true);

    let env =
        orchestrator.create("keep", project.root(), &[chain_ref("stub-cluster")]).await.unwrap();
    let tmp_dir = env.tmp_dir.clone();
    orchestrator.delete(&env).await;
    assert!(tmp_dir.exists());
    std::fs::remove_dir_all(tmp_dir).unwrap();
}
