//! The builder orchestrator: partitions manifest build entries by engine,
//! fans the partitions out with bounded concurrency, and records the returned
//! artifacts in the store.
//!
//! A failing partition never cancels its siblings; aggregate failure is
//! reported once everything has settled.

use eyre::Result;
use forge_artifacts::{Artifact, ArtifactStore, BatchBuildInput, BuildInput};
use forge_common::{
    call_detector, EngineInvoker, EngineResolver, InvokeError, ToolOutput,
};
use futures::{stream, StreamExt};
use serde_json::json;
use std::{collections::HashMap, path::Path, sync::Arc, time::Duration};

/// One engine's failure, reported at end of run.
#[derive(Clone, Debug)]
pub struct BuildFailure {
    pub engine: String,
    pub message: String,
}

/// What a build run produced.
#[derive(Debug, Default)]
pub struct BuildOutcome {
    pub artifacts: Vec<Artifact>,
    pub failures: Vec<BuildFailure>,
}

impl BuildOutcome {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Runs the build side of a pipeline.
pub struct BuildOrchestrator {
    invoker: Arc<dyn EngineInvoker>,
    resolver: Arc<dyn EngineResolver>,
    jobs: usize,
    deadline: Option<Duration>,
}

impl BuildOrchestrator {
    pub fn new(invoker: Arc<dyn EngineInvoker>, resolver: Arc<dyn EngineResolver>) -> Self {
        let jobs = std::thread::available_parallelism().map(usize::from).unwrap_or(4);
        Self { invoker, resolver, jobs, deadline: None }
    }

    /// Bounds how many engine partitions run at once.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Per-invocation deadline; builds run unbounded by default.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Builds `entries` and appends every produced artifact to the store at
    /// `store_path`, written once at end of run. Detector-annotated artifacts
    /// are enriched before they are stored.
    pub async fn execute(
        &self,
        entries: Vec<BuildInput>,
        store_path: &Path,
    ) -> Result<BuildOutcome> {
        let mut outcome = self.run(entries).await;
        self.detect_dependencies(&mut outcome).await;

        let mut store = ArtifactStore::read(store_path)?;
        for artifact in &outcome.artifacts {
            store.push_artifact(artifact.clone());
        }
        store.write(store_path)?;
        Ok(outcome)
    }

    /// Builds `entries` without touching the store.
    pub async fn run(&self, entries: Vec<BuildInput>) -> BuildOutcome {
        let partitions = partition_by_engine(entries);
        info!(partitions = partitions.len(), jobs = self.jobs, "dispatching build partitions");

        let results: Vec<(usize, PartitionResult)> = stream::iter(
            partitions.into_iter().enumerate().map(|(index, (engine, inputs))| async move {
                (index, self.build_partition(engine, inputs).await)
            }),
        )
        .buffer_unordered(self.jobs)
        .collect()
        .await;

        // Partitions settle in completion order; re-establish manifest order.
        let mut results = results;
        results.sort_by_key(|(index, _)| *index);

        let mut outcome = BuildOutcome::default();
        for (_, result) in results {
            outcome.artifacts.extend(result.artifacts);
            if let Some(failure) = result.failure {
                outcome.failures.push(failure);
            }
        }
        outcome
    }

    /// Builds one partition: a single `build` call for one entry, a
    /// `buildBatch` for several.
    async fn build_partition(&self, engine: String, inputs: Vec<BuildInput>) -> PartitionResult {
        let cmd = match self.resolver.resolve(&engine) {
            Ok(cmd) => cmd,
            Err(err) => {
                return PartitionResult::failed(&engine, format!("unresolvable engine: {err}"));
            }
        };

        let single = inputs.len() == 1;
        let invocation = if single {
            let input = inputs.into_iter().next().expect("partition is non-empty");
            self.invoker.invoke(
                &cmd,
                "build",
                serde_json::to_value(input).expect("input serializes"),
                self.deadline,
            )
        } else {
            let batch = BatchBuildInput { specs: inputs };
            self.invoker.invoke(
                &cmd,
                "buildBatch",
                serde_json::to_value(batch).expect("batch serializes"),
                self.deadline,
            )
        };

        match invocation.await {
            Ok(output) => decode_partition(&engine, single, output),
            Err(InvokeError::Tool { message, structured }) => {
                // A batch failure still carries the artifacts that did build.
                let artifacts = structured
                    .and_then(|value| {
                        serde_json::from_value::<BatchArtifacts>(value).ok().map(|b| b.artifacts)
                    })
                    .unwrap_or_default();
                PartitionResult {
                    artifacts,
                    failure: Some(BuildFailure { engine, message }),
                }
            }
            Err(err) => PartitionResult::failed(&engine, err.to_string()),
        }
    }

    /// Best-effort dependency detection for artifacts that request it.
    /// Resolution failures degrade gracefully; a detector call that fails
    /// after its retry marks the build failed.
    async fn detect_dependencies(&self, outcome: &mut BuildOutcome) {
        for artifact in &mut outcome.artifacts {
            if artifact.dependency_detector_engine.is_empty() || !artifact.dependencies.is_empty()
            {
                continue;
            }
            let uri = artifact.dependency_detector_engine.clone();
            let cmd = match self.resolver.resolve(&uri) {
                Ok(cmd) => cmd,
                Err(err) => {
                    warn!(%uri, %err, "skipping dependency detection for unresolvable detector");
                    continue;
                }
            };
            let input = json!({
                "location": artifact.location,
                "spec": artifact.dependency_detector_spec,
            });
            match call_detector(self.invoker.as_ref(), &cmd, "detect", input, None).await {
                Ok(dependencies) => {
                    debug!(artifact = %artifact.name, count = dependencies.len(), "detected dependencies");
                    artifact.dependencies = dependencies;
                }
                Err(err) => {
                    outcome.failures.push(BuildFailure {
                        engine: uri,
                        message: format!(
                            "dependency detection failed for {:?}: {err}",
                            artifact.name
                        ),
                    });
                }
            }
        }
    }
}

struct PartitionResult {
    artifacts: Vec<Artifact>,
    failure: Option<BuildFailure>,
}

impl PartitionResult {
    fn failed(engine: &str, message: String) -> Self {
        Self {
            artifacts: Vec::new(),
            failure: Some(BuildFailure { engine: engine.to_string(), message }),
        }
    }
}

#[derive(Debug, Default, serde::Deserialize)]
struct BatchArtifacts {
    #[serde(default)]
    artifacts: Vec<Artifact>,
}

fn decode_partition(engine: &str, single: bool, output: ToolOutput) -> PartitionResult {
    let decoded: Result<Vec<Artifact>, InvokeError> = if single {
        output.decode::<Artifact>().map(|artifact| vec![artifact])
    } else {
        output.decode::<BatchArtifacts>().map(|batch| batch.artifacts)
    };
    match decoded {
        Ok(artifacts) => PartitionResult { artifacts, failure: None },
        Err(err) => PartitionResult::failed(engine, format!("undecodable result: {err}")),
    }
}

/// Groups entries by engine URI, preserving first-appearance order of both
/// partitions and entries.
fn partition_by_engine(entries: Vec<BuildInput>) -> Vec<(String, Vec<BuildInput>)> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<BuildInput>> = HashMap::new();
    for entry in entries {
        if !groups.contains_key(&entry.engine) {
            order.push(entry.engine.clone());
        }
        groups.entry(entry.engine.clone()).or_default().push(entry);
    }
    order
        .into_iter()
        .map(|engine| {
            let inputs = groups.remove(&engine).expect("group exists");
            (engine, inputs)
        })
        .collect()
}
