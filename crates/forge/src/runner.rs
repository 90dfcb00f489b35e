//! The test-runner orchestrator: provisions an environment when the test
//! asks for one, runs the test engine's `run` tool with the inherited env,
//! persists the report, and always tears the environment back down.

use crate::testenv::{TestEnvOrchestrator, TestEnvironment};
use eyre::{eyre, Result, WrapErr};
use forge_artifacts::{ArtifactStore, RunInput, TestReport};
use forge_common::{EngineInvoker, EngineResolver, InvokeError};
use forge_config::{Manifest, TestEntry};
use std::{path::{Path, PathBuf}, sync::Arc};

/// Aggregate of a `forge test` run.
#[derive(Debug, Default)]
pub struct TestOutcome {
    pub reports: Vec<TestReport>,
    /// Tests that could not be executed at all (no report produced).
    pub execution_failures: Vec<(String, String)>,
}

impl TestOutcome {
    /// Non-zero exit when any test failed or could not run.
    pub fn ensure_ok(self) -> Result<()> {
        let failed: Vec<&TestReport> =
            self.reports.iter().filter(|report| report.status.is_failed()).collect();
        if failed.is_empty() && self.execution_failures.is_empty() {
            return Ok(());
        }
        let mut message = String::new();
        for report in failed {
            message.push_str(&format!("{} ({})\n", report.summary(), report.stage));
        }
        for (name, err) in &self.execution_failures {
            message.push_str(&format!("{name}: {err}\n"));
        }
        Err(eyre!(message.trim_end().to_string()))
    }
}

/// Runs the test side of a pipeline.
pub struct TestOrchestrator {
    invoker: Arc<dyn EngineInvoker>,
    resolver: Arc<dyn EngineResolver>,
    testenv: TestEnvOrchestrator,
    store_path: PathBuf,
}

impl TestOrchestrator {
    pub fn new(
        invoker: Arc<dyn EngineInvoker>,
        resolver: Arc<dyn EngineResolver>,
        store_path: PathBuf,
    ) -> Self {
        let testenv = TestEnvOrchestrator::new(invoker.clone(), resolver.clone());
        Self { invoker, resolver, testenv, store_path }
    }

    /// Leaves test scratch trees on disk for inspection.
    pub fn keep_tmp(mut self, keep: bool) -> Self {
        self.testenv = self.testenv.keep_tmp(keep);
        self
    }

    /// Runs one manifest test entry end to end: environment up, `run`,
    /// report persisted, environment down. The delete phase runs regardless
    /// of how the run ended.
    pub async fn run_test(
        &self,
        manifest: &Manifest,
        entry: &TestEntry,
        root: &Path,
    ) -> Result<TestReport> {
        let environment = match &entry.environment {
            Some(alias) => {
                let composite = manifest
                    .environment(alias)
                    .ok_or_else(|| eyre!("unknown test environment {alias:?}"))?;
                Some(self.testenv.create(&entry.stage, root, &composite.testenv).await?)
            }
            None => None,
        };

        let result = self.invoke_runner(entry, root, environment.as_ref()).await;

        // Tear-down is unconditional; its errors are logged, not returned.
        if let Some(environment) = &environment {
            self.testenv.delete(environment).await;
        }

        let report = result?;
        self.persist(&report)
            .wrap_err_with(|| format!("failed to persist report for {:?}", entry.name))?;
        Ok(report)
    }

    async fn invoke_runner(
        &self,
        entry: &TestEntry,
        root: &Path,
        environment: Option<&TestEnvironment>,
    ) -> Result<TestReport> {
        let cmd = self.resolver.resolve(&entry.runner)?;
        // Accumulated env reaches the runner through its process environment,
        // not through the input.
        let cmd = match environment {
            Some(environment) => cmd.with_env(environment.env.clone()),
            None => cmd,
        };

        let input = RunInput {
            stage: entry.stage.clone(),
            name: entry.name.clone(),
            work_dir: root.display().to_string(),
            spec: entry.spec.clone(),
        };

        match self
            .invoker
            .invoke(&cmd, "run", serde_json::to_value(input).expect("input serializes"), None)
            .await
        {
            Ok(output) => output.decode().map_err(Into::into),
            // A failed run is still a report; the error flag is how the
            // protocol says "failed", the payload is the result.
            Err(InvokeError::Tool { structured: Some(report), .. }) => {
                serde_json::from_value(report).map_err(Into::into)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn persist(&self, report: &TestReport) -> Result<()> {
        let mut store = ArtifactStore::read(&self.store_path)?;
        store.push_test_report(report.clone());
        store.write(&self.store_path)?;
        Ok(())
    }

    /// Runs every manifest test entry matching the filters, sequentially;
    /// an entry's failure never skips the remaining entries.
    pub async fn run_all(
        &self,
        manifest: &Manifest,
        root: &Path,
        stage: Option<&str>,
        name: Option<&str>,
    ) -> TestOutcome {
        let mut outcome = TestOutcome::default();
        for entry in &manifest.test {
            if stage.is_some_and(|stage| entry.stage != stage) {
                continue;
            }
            if name.is_some_and(|name| entry.name != name) {
                continue;
            }
            match self.run_test(manifest, entry, root).await {
                Ok(report) => outcome.reports.push(report),
                Err(err) => {
                    error!(test = %entry.name, %err, "test execution failed");
                    outcome.execution_failures.push((entry.name.clone(), format!("{err:#}")));
                }
            }
        }
        outcome
    }
}
