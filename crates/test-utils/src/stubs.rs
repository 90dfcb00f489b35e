//! Deterministic stub engines.
//!
//! These are real tool-sets going through the framework's endpoint shaping,
//! so orchestrator tests exercise the same validation and error paths as
//! production engines.

use forge_artifacts::{
    kind, Artifact, BuildInput, CreateInput, DeleteInput, RunInput, TestEnvArtifact, TestReport,
    TestStats, TestStatus,
};
use forge_engine::{BuilderTools, TestEnvSubengineTools, TestRunnerTools, ToolSet};
use std::{collections::BTreeMap, sync::Arc, time::Duration};

/// The build entry name the stub builder deterministically rejects.
pub const FAILING_BUILD_NAME: &str = "fail-me";

/// A builder that produces `binary` artifacts at `./build/bin/<name>` with
/// version `abc123`, and fails for [`FAILING_BUILD_NAME`].
pub fn stub_builder_tools() -> ToolSet {
    BuilderTools {
        name: "stub-builder".into(),
        version: "0.0.1".into(),
        build: Arc::new(|input: BuildInput| {
            Box::pin(async move {
                if input.name == FAILING_BUILD_NAME {
                    eyre::bail!("refusing to build {:?}", input.name);
                }
                Ok(Artifact::custom(
                    input.name.clone(),
                    kind::BINARY,
                    format!("./build/bin/{}", input.name),
                    "abc123",
                ))
            })
        }),
    }
    .into()
}

/// A builder whose every build takes `delay`; for cancellation tests.
pub fn slow_builder_tools(delay: Duration) -> ToolSet {
    BuilderTools {
        name: "slow-builder".into(),
        version: "0.0.1".into(),
        build: Arc::new(move |input: BuildInput| {
            Box::pin(async move {
                tokio::time::sleep(delay).await;
                Ok(Artifact::custom(input.name.clone(), kind::BINARY, "./build/bin/slow", "abc123"))
            })
        }),
    }
    .into()
}

/// A test runner driven by its spec: `{"fail": true}` produces a failed
/// report with 2 of 10 failing, anything else passes 10 of 10.
pub fn stub_runner_tools() -> ToolSet {
    TestRunnerTools {
        name: "stub-tests".into(),
        version: "0.0.1".into(),
        run_test: Arc::new(|input: RunInput| {
            Box::pin(async move {
                let fail = input.spec.get("fail").and_then(|v| v.as_bool()).unwrap_or(false);
                let now = chrono::Utc::now();
                let report = if fail {
                    TestReport {
                        stage: input.stage,
                        status: TestStatus::Failed,
                        start_time: Some(now),
                        end_time: Some(now),
                        test_stats: TestStats { total: 10, passed: 8, failed: 2, skipped: 0 },
                        error_message: "2 tests failed".into(),
                        ..Default::default()
                    }
                } else {
                    TestReport {
                        stage: input.stage,
                        status: TestStatus::Passed,
                        start_time: Some(now),
                        end_time: Some(now),
                        test_stats: TestStats { total: 10, passed: 10, failed: 0, skipped: 0 },
                        ..Default::default()
                    }
                };
                Ok(report)
            })
        }),
    }
    .into()
}

/// A sub-engine that writes `kubeconfig` into its tmp dir and exposes the
/// absolute path as `<name>.kubeconfigPath` metadata.
pub fn stub_subengine_tools(name: &str) -> ToolSet {
    let engine = name.to_string();
    TestEnvSubengineTools {
        name: name.into(),
        version: "0.0.1".into(),
        create: Arc::new(move |input: CreateInput| {
            let engine = engine.clone();
            Box::pin(async move {
                let path = std::path::Path::new(&input.tmp_dir).join("kubeconfig");
                std::fs::write(&path, b"apiVersion: v1\n")?;
                Ok(TestEnvArtifact {
                    test_id: input.test_id,
                    files: BTreeMap::from([("kubeconfig".to_string(), "kubeconfig".to_string())]),
                    metadata: BTreeMap::from([(
                        format!("{engine}.kubeconfigPath"),
                        path.display().to_string(),
                    )]),
                    env: BTreeMap::from([(
                        format!("{}_READY", engine.to_uppercase().replace('-', "_")),
                        "1".to_string(),
                    )]),
                    ..Default::default()
                })
            })
        }),
        delete: Arc::new(|_input: DeleteInput| Box::pin(async { Ok(()) })),
    }
    .into()
}

/// A sub-engine whose `create` fails deterministically.
pub fn failing_subengine_tools(name: &str) -> ToolSet {
    TestEnvSubengineTools {
        name: name.into(),
        version: "0.0.1".into(),
        create: Arc::new(|_input: CreateInput| {
            Box::pin(async { Err(eyre::eyre!("deterministic create failure")) })
        }),
        delete: Arc::new(|_input: DeleteInput| Box::pin(async { Ok(()) })),
    }
    .into()
}
