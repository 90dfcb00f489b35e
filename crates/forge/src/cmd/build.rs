//! `forge build`.

use crate::{builder::BuildOrchestrator, opts::GlobalArgs};
use clap::Parser;
use eyre::{bail, Result};
use forge_common::{GoRunResolver, ProcessInvoker};
use forge_config::Manifest;
use std::sync::Arc;
use yansi::Paint;

/// Build the artifacts declared in the manifest.
#[derive(Clone, Debug, Parser)]
pub struct BuildArgs {
    /// Build only the named entries; all entries when empty.
    #[arg(value_name = "NAME")]
    pub names: Vec<String>,

    /// Number of engine partitions to run concurrently.
    #[arg(long, short, value_name = "JOBS")]
    pub jobs: Option<usize>,
}

impl BuildArgs {
    pub async fn run(self, global: &GlobalArgs) -> Result<()> {
        let root = global.project_root()?;
        let manifest = Manifest::load_from_root(&root)?;
        let store_path = manifest.store_path(&root);

        let entries: Vec<_> = manifest
            .build
            .iter()
            .filter(|entry| self.names.is_empty() || self.names.contains(&entry.name))
            .cloned()
            .collect();
        if entries.is_empty() {
            bail!("no build entries match");
        }

        let mut orchestrator =
            BuildOrchestrator::new(Arc::new(ProcessInvoker), Arc::new(GoRunResolver::default()));
        if let Some(jobs) = self.jobs {
            orchestrator = orchestrator.with_jobs(jobs);
        }

        let outcome = orchestrator.execute(entries, &store_path).await?;
        for artifact in &outcome.artifacts {
            println!(
                "{} {} ({}) -> {}",
                "built".green().bold(),
                artifact.name,
                artifact.kind,
                artifact.location
            );
        }
        if !outcome.is_ok() {
            for failure in &outcome.failures {
                eprintln!("{} {}: {}", "error".red().bold(), failure.engine, failure.message);
            }
            bail!("{} build partition(s) failed", outcome.failures.len());
        }
        Ok(())
    }
}
