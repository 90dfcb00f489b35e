//! The `forge` command line.

use crate::cmd::{build::BuildArgs, test::TestArgs};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Build, test and deploy pipelines composed from engine invocations.
#[derive(Parser)]
#[command(name = "forge", version, next_display_order = None)]
pub struct Forge {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub cmd: ForgeSubcommand,
}

#[derive(Subcommand)]
pub enum ForgeSubcommand {
    /// Build the artifacts declared in the manifest.
    #[command(visible_alias = "b")]
    Build(BuildArgs),

    /// Run the tests declared in the manifest.
    #[command(visible_alias = "t")]
    Test(TestArgs),
}

#[derive(Clone, Debug, Parser)]
pub struct GlobalArgs {
    /// Verbosity level; repeat for more detail (-v, -vv, -vvv).
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Project root; defaults to the current directory.
    #[arg(long, global = true, value_name = "PATH")]
    pub root: Option<PathBuf>,
}

impl GlobalArgs {
    /// Installs the tracing subscriber for the chosen verbosity.
    pub fn init(&self) {
        let filter = match self.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .try_init();
    }

    /// Resolves the project root.
    pub fn project_root(&self) -> eyre::Result<PathBuf> {
        match &self.root {
            Some(root) => Ok(root.clone()),
            None => Ok(std::env::current_dir()?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Forge::command().debug_assert();
    }

    #[test]
    fn parses_build_names() {
        let forge = Forge::try_parse_from(["forge", "build", "hello", "docs", "-j", "4"]).unwrap();
        let ForgeSubcommand::Build(args) = forge.cmd else { panic!("expected build") };
        assert_eq!(args.names, ["hello", "docs"]);
        assert_eq!(args.jobs, Some(4));
    }

    #[test]
    fn parses_test_list() {
        let forge = Forge::try_parse_from(["forge", "test", "list", "--stage", "e2e"]).unwrap();
        let ForgeSubcommand::Test(args) = forge.cmd else { panic!("expected test") };
        let Some(crate::cmd::test::TestSubcommand::List(list)) = args.sub else {
            panic!("expected list subcommand")
        };
        assert_eq!(list.stage.as_deref(), Some("e2e"));
    }
}
