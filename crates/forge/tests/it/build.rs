use forge::BuildOrchestrator;
use forge_artifacts::{ArtifactStore, BuildInput};
use forge_test_utils::{
    slow_builder_tools, stub_builder_tools, RecordingInvoker, StubResolver, TestProject,
};
use std::{sync::Arc, time::Duration};

fn entry(name: &str) -> BuildInput {
    BuildInput {
        name: name.into(),
        engine: "go://stub-builder".into(),
        src: format!("./cmd/{name}"),
        ..Default::default()
    }
}

#[tokio::test]
async fn single_build_records_one_artifact() {
    let project = TestProject::new();
    let invoker =
        Arc::new(RecordingInvoker::new().with_engine("stub-builder", stub_builder_tools()));
    let orchestrator = BuildOrchestrator::new(invoker.clone(), Arc::new(StubResolver));

    let outcome =
        orchestrator.execute(vec![entry("hello")], &project.store_path()).await.unwrap();
    assert!(outcome.is_ok());
    assert_eq!(outcome.artifacts.len(), 1);
    assert_eq!(outcome.artifacts[0].name, "hello");
    assert_eq!(outcome.artifacts[0].version, "abc123");
    assert_eq!(outcome.artifacts[0].location, "./build/bin/hello");

    let store = ArtifactStore::read(project.store_path()).unwrap();
    assert_eq!(store.artifacts.len(), 1);
    assert!(store.artifacts[0].timestamp.is_some());

    assert_eq!(invoker.call_log(), [("stub-builder".to_string(), "build".to_string())]);
}

#[tokio::test]
async fn batch_partial_failure_keeps_order_and_fails_run() {
    let project = TestProject::new();
    let invoker =
        Arc::new(RecordingInvoker::new().with_engine("stub-builder", stub_builder_tools()));
    let orchestrator = BuildOrchestrator::new(invoker.clone(), Arc::new(StubResolver));

    let outcome = orchestrator
        .execute(vec![entry("one"), entry("fail-me"), entry("three")], &project.store_path())
        .await
        .unwrap();

    // One partition, dispatched as a batch.
    assert_eq!(invoker.call_log(), [("stub-builder".to_string(), "buildBatch".to_string())]);

    // Successes retain input order; the failure is enumerated.
    let names: Vec<&str> = outcome.artifacts.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, ["one", "three"]);
    assert_eq!(outcome.failures.len(), 1);
    assert!(outcome.failures[0].message.contains("Build failed:"), "{}", outcome.failures[0].message);
    assert!(!outcome.is_ok());

    let store = ArtifactStore::read(project.store_path()).unwrap();
    assert_eq!(store.artifacts.len(), 2);
}

#[tokio::test]
async fn partitions_fan_out_per_engine() {
    let project = TestProject::new();
    let invoker = Arc::new(
        RecordingInvoker::new()
            .with_engine("stub-builder", stub_builder_tools())
            .with_engine("other-builder", stub_builder_tools()),
    );
    let orchestrator = BuildOrchestrator::new(invoker.clone(), Arc::new(StubResolver));

    let mut other = entry("docs");
    other.engine = "go://other-builder".into();
    let outcome = orchestrator
        .execute(vec![entry("a"), other, entry("b")], &project.store_path())
        .await
        .unwrap();
    assert!(outcome.is_ok());

    // Two-entry partition goes through buildBatch, the singleton through
    // build; manifest order is re-established in the outcome.
    let names: Vec<&str> = outcome.artifacts.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, ["a", "b", "docs"]);

    let mut log = invoker.call_log();
    log.sort();
    assert_eq!(
        log,
        [
            ("other-builder".to_string(), "build".to_string()),
            ("stub-builder".to_string(), "buildBatch".to_string()),
        ]
    );
}

#[tokio::test]
async fn unresolvable_engine_is_reported_not_fatal() {
    let project = TestProject::new();
    let invoker =
        Arc::new(RecordingInvoker::new().with_engine("stub-builder", stub_builder_tools()));
    let orchestrator = BuildOrchestrator::new(invoker, Arc::new(StubResolver));

    let mut bad = entry("broken");
    bad.engine = "oci://unsupported".into();
    let outcome =
        orchestrator.execute(vec![entry("good"), bad], &project.store_path()).await.unwrap();
    assert_eq!(outcome.artifacts.len(), 1);
    assert_eq!(outcome.failures.len(), 1);
    assert!(outcome.failures[0].message.contains("unresolvable engine"));
}

#[tokio::test]
async fn cancellation_mid_batch_leaves_store_untouched() {
    let project = TestProject::new();
    let invoker = Arc::new(
        RecordingInvoker::new()
            .with_engine("slow-builder", slow_builder_tools(Duration::from_secs(60))),
    );
    let orchestrator = BuildOrchestrator::new(invoker, Arc::new(StubResolver));

    let entries = ["a", "b", "c"]
        .into_iter()
        .map(|name| BuildInput {
            name: name.into(),
            engine: "go://slow-builder".into(),
            ..Default::default()
        })
        .collect();

    let cancelled = tokio::time::timeout(
        Duration::from_millis(200),
        orchestrator.execute(entries, &project.store_path()),
    )
    .await;
    assert!(cancelled.is_err(), "expected the run to be cancelled");
    assert!(!project.store_path().exists(), "no partial store writes after cancellation");
}
