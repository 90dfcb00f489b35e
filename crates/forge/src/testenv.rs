//! The test-environment orchestrator: runs a composite engine's sub-engine
//! chain forward to provision an environment, threading files, metadata and
//! env through the chain, and tears it down in strict reverse order.
//!
//! Deletion is guaranteed for every sub-engine that completed `create`, even
//! when a later sub-engine or the test run itself failed, and runs with its
//! own deadline so a cancelled run still cleans up.

use eyre::{eyre, Result};
use forge_artifacts::{CreateInput, DeleteInput, EnvPropagation, TestEnvArtifact};
use forge_common::{engine_name, EngineInvoker, EngineResolver, InvokeError};
use forge_config::SubengineRef;
use rand::Rng;
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

/// Deadline for one sub-engine `create`; cluster boots and chart installs
/// take minutes, not seconds.
const CREATE_DEADLINE: Duration = Duration::from_secs(5 * 60);

/// Deadline for one sub-engine `delete`. Deletion runs regardless of how the
/// run ended, bounded by its own budget.
const DELETE_DEADLINE: Duration = Duration::from_secs(5 * 60);

/// A provisioned environment handle.
#[derive(Debug)]
pub struct TestEnvironment {
    pub test_id: String,
    /// Root of the per-test scratch tree; each sub-engine owns one child.
    pub tmp_dir: PathBuf,
    /// Accumulated namespaced metadata from the whole chain.
    pub metadata: BTreeMap<String, String>,
    /// Accumulated env, exported into the test runner's process environment.
    pub env: BTreeMap<String, String>,
    /// Logical file names to absolute paths.
    pub files: BTreeMap<String, PathBuf>,
    /// Sub-engines that completed `create`, in create order.
    pub completed: Vec<SubengineRef>,
    /// Per-sub-engine artifacts, in create order.
    pub artifacts: Vec<TestEnvArtifact>,
}

/// Sequences a sub-engine chain.
pub struct TestEnvOrchestrator {
    invoker: Arc<dyn EngineInvoker>,
    resolver: Arc<dyn EngineResolver>,
    keep_tmp: bool,
}

impl TestEnvOrchestrator {
    pub fn new(invoker: Arc<dyn EngineInvoker>, resolver: Arc<dyn EngineResolver>) -> Self {
        Self { invoker, resolver, keep_tmp: false }
    }

    /// Leaves the scratch tree on disk after deletion, for inspection.
    pub fn keep_tmp(mut self, keep: bool) -> Self {
        self.keep_tmp = keep;
        self
    }

    /// Runs the chain's `create` tools in declared order. On a mid-chain
    /// failure the already-completed prefix is deleted in reverse and the
    /// error is returned; the caller never sees a half-provisioned
    /// environment.
    pub async fn create(
        &self,
        stage: &str,
        root_dir: &Path,
        chain: &[SubengineRef],
    ) -> Result<TestEnvironment> {
        let test_id = new_test_id(stage);
        let tmp_dir = tempfile::Builder::new()
            .prefix(&format!("forge-{test_id}-"))
            .tempdir()?
            .keep();
        info!(%test_id, tmp = %tmp_dir.display(), "provisioning test environment");

        let mut env = TestEnvironment {
            test_id,
            tmp_dir,
            metadata: BTreeMap::new(),
            env: BTreeMap::new(),
            files: BTreeMap::new(),
            completed: Vec::new(),
            artifacts: Vec::new(),
        };

        for (index, subengine) in chain.iter().enumerate() {
            if let Err(err) = self.create_one(stage, root_dir, index, subengine, &mut env).await {
                let name = engine_name(&subengine.engine).unwrap_or(&subengine.engine);
                error!(subengine = name, %err, "sub-engine create failed, rolling back");
                self.delete(&env).await;
                return Err(eyre!("test environment sub-engine {name:?} failed: {err}"));
            }
        }
        Ok(env)
    }

    async fn create_one(
        &self,
        stage: &str,
        root_dir: &Path,
        index: usize,
        subengine: &SubengineRef,
        env: &mut TestEnvironment,
    ) -> Result<()> {
        let name = engine_name(&subengine.engine)?.to_string();
        let propagation = EnvPropagation::default();
        let mut cmd = self.resolver.resolve(&subengine.engine)?;
        if propagation == EnvPropagation::Merge {
            cmd = cmd.with_env(env.env.clone());
        }

        let tmp_dir = env.tmp_dir.join(format!("{name}-{index}"));
        std::fs::create_dir_all(&tmp_dir)?;

        let input = CreateInput {
            test_id: env.test_id.clone(),
            stage: stage.to_string(),
            tmp_dir: tmp_dir.display().to_string(),
            root_dir: root_dir.display().to_string(),
            metadata: env.metadata.clone(),
            env: env.env.clone(),
            spec: subengine.spec.clone(),
            env_propagation: propagation,
        };

        let output = self
            .invoker
            .invoke(
                &cmd,
                "create",
                serde_json::to_value(input).expect("input serializes"),
                Some(CREATE_DEADLINE),
            )
            .await?;
        let artifact: TestEnvArtifact = output.decode()?;

        for (key, value) in &artifact.metadata {
            if let Some(previous) = env.metadata.get(key) {
                if previous != value {
                    warn!(%key, "metadata key collision across sub-engines; keeping later value");
                }
            }
            env.metadata.insert(key.clone(), value.clone());
        }
        env.env.extend(artifact.env.clone());
        for (logical, relative) in &artifact.files {
            env.files.insert(logical.clone(), tmp_dir.join(relative));
        }

        debug!(subengine = %name, files = artifact.files.len(), "sub-engine created");
        env.completed.push(subengine.clone());
        env.artifacts.push(artifact);
        Ok(())
    }

    /// Runs `delete` for every completed sub-engine, in strict reverse create
    /// order, each with the full accumulated metadata. Errors are logged and
    /// never abort the chain. The scratch tree is removed afterwards.
    pub async fn delete(&self, env: &TestEnvironment) -> Vec<(String, InvokeError)> {
        let mut errors = Vec::new();
        for subengine in env.completed.iter().rev() {
            let name =
                engine_name(&subengine.engine).unwrap_or(&subengine.engine).to_string();
            let cmd = match self.resolver.resolve(&subengine.engine) {
                Ok(cmd) => cmd,
                Err(err) => {
                    error!(subengine = %name, %err, "cannot resolve sub-engine for deletion");
                    continue;
                }
            };
            let input = DeleteInput {
                test_id: env.test_id.clone(),
                metadata: env.metadata.clone(),
            };
            match self
                .invoker
                .invoke(
                    &cmd,
                    "delete",
                    serde_json::to_value(input).expect("input serializes"),
                    Some(DELETE_DEADLINE),
                )
                .await
            {
                Ok(_) => debug!(subengine = %name, "sub-engine deleted"),
                Err(err) => {
                    error!(subengine = %name, %err, "sub-engine delete failed");
                    errors.push((name, err));
                }
            }
        }

        if self.keep_tmp {
            info!(tmp = %env.tmp_dir.display(), "keeping scratch tree for inspection");
        } else if let Err(err) = std::fs::remove_dir_all(&env.tmp_dir) {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(tmp = %env.tmp_dir.display(), %err, "failed to remove scratch tree");
            }
        }
        errors
    }
}

/// `<stage>-<unix-seconds>-<short-random>`, unique per test run.
fn new_test_id(stage: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    let suffix: u32 = rand::rng().random_range(0..0x100_0000);
    format!("{stage}-{now}-{suffix:06x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_carry_stage_and_are_unique() {
        let a = new_test_id("e2e");
        let b = new_test_id("e2e");
        assert!(a.starts_with("e2e-"));
        assert_ne!(a, b);
    }
}
