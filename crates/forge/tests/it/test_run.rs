use forge::TestOrchestrator;
use forge_artifacts::{ArtifactStore, TestStatus};
use forge_config::{CompositeEngine, Manifest, SubengineRef, TestEntry};
use forge_test_utils::{
    stub_runner_tools, stub_subengine_tools, RecordingInvoker, StubResolver, TestProject,
};
use serde_json::json;
use std::sync::Arc;

fn failing_entry() -> TestEntry {
    TestEntry {
        name: "smoke".into(),
        stage: "e2e".into(),
        runner: "go://stub-tests".into(),
        spec: json!({"fail": true}).as_object().cloned().unwrap(),
        ..Default::default()
    }
}

#[tokio::test]
async fn failed_run_produces_persisted_report_and_nonzero_outcome() {
    let project = TestProject::new();
    let invoker =
        Arc::new(RecordingInvoker::new().with_engine("stub-tests", stub_runner_tools()));
    let orchestrator =
        TestOrchestrator::new(invoker, Arc::new(StubResolver), project.store_path());

    let manifest = Manifest { test: vec![failing_entry()], ..Default::default() };
    let outcome = orchestrator.run_all(&manifest, project.root(), None, None).await;

    assert_eq!(outcome.reports.len(), 1);
    let report = &outcome.reports[0];
    assert_eq!(report.status, TestStatus::Failed);
    assert_eq!(report.test_stats.failed, 2);
    assert_eq!(report.error_message, "2 tests failed");

    // The failed report still landed in the store.
    let store = ArtifactStore::read(project.store_path()).unwrap();
    assert_eq!(store.test_reports.len(), 1);
    assert_eq!(store.test_reports[0].status, TestStatus::Failed);
    assert_eq!(store.test_reports[0].test_stats.failed, 2);

    let err = outcome.ensure_ok().unwrap_err();
    assert!(err.to_string().contains("2/10 tests failed"), "{err}");
}

#[tokio::test]
async fn passing_run_is_ok_and_persisted() {
    let project = TestProject::new();
    let invoker =
        Arc::new(RecordingInvoker::new().with_engine("stub-tests", stub_runner_tools()));
    let orchestrator =
        TestOrchestrator::new(invoker, Arc::new(StubResolver), project.store_path());

    let manifest = Manifest {
        test: vec![TestEntry {
            name: "smoke".into(),
            stage: "unit".into(),
            runner: "go://stub-tests".into(),
            ..Default::default()
        }],
        ..Default::default()
    };
    let outcome = orchestrator.run_all(&manifest, project.root(), None, None).await;
    assert_eq!(outcome.reports.len(), 1);
    assert_eq!(outcome.reports[0].status, TestStatus::Passed);
    outcome.ensure_ok().unwrap();

    let store = ArtifactStore::read(project.store_path()).unwrap();
    assert_eq!(store.test_reports_for_stage("unit").len(), 1);
}

#[tokio::test]
async fn environment_env_reaches_runner_and_is_torn_down() {
    let project = TestProject::new();
    let invoker = Arc::new(
        RecordingInvoker::new()
            .with_engine("stub-tests", stub_runner_tools())
            .with_engine("stub-cluster", stub_subengine_tools("stub-cluster")),
    );
    let orchestrator =
        TestOrchestrator::new(invoker.clone(), Arc::new(StubResolver), project.store_path());

    let manifest = Manifest {
        test: vec![TestEntry {
            name: "smoke".into(),
            stage: "e2e".into(),
            runner: "go://stub-tests".into(),
            environment: Some("k8s".into()),
            ..Default::default()
        }],
        engines: vec![CompositeEngine {
            alias: "k8s".into(),
            kind: "testenv".into(),
            testenv: vec![SubengineRef {
                engine: "go://stub-cluster".into(),
                ..Default::default()
            }],
        }],
        ..Default::default()
    };

    let outcome = orchestrator.run_all(&manifest, project.root(), None, None).await;
    assert!(outcome.execution_failures.is_empty());
    assert_eq!(outcome.reports.len(), 1);

    // Accumulated env rides on the runner's process environment, and the
    // delete phase runs after the test regardless of outcome.
    assert_eq!(
        invoker.call_log(),
        [
            ("stub-cluster".to_string(), "create".to_string()),
            ("stub-tests".to_string(), "run".to_string()),
            ("stub-cluster".to_string(), "delete".to_string()),
        ]
    );
    let run_call =
        invoker.calls().into_iter().find(|call| call.tool == "run").unwrap();
    assert_eq!(run_call.env.get("STUB_CLUSTER_READY").map(String::as_str), Some("1"));
    assert!(run_call.arguments["spec"].get("env").is_none(), "env is not smuggled into the input");
}

#[tokio::test]
async fn stage_filter_selects_entries() {
    let project = TestProject::new();
    let invoker =
        Arc::new(RecordingInvoker::new().with_engine("stub-tests", stub_runner_tools()));
    let orchestrator =
        TestOrchestrator::new(invoker, Arc::new(StubResolver), project.store_path());

    let mut unit = failing_entry();
    unit.name = "unit-tests".into();
    unit.stage = "unit".into();
    let manifest = Manifest { test: vec![failing_entry(), unit], ..Default::default() };

    let outcome = orchestrator.run_all(&manifest, project.root(), Some("unit"), None).await;
    assert_eq!(outcome.reports.len(), 1);
    assert_eq!(outcome.reports[0].stage, "unit");
}
