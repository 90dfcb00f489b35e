//! Entry point for the `forge` binary.

use crate::opts::{Forge, ForgeSubcommand};
use clap::Parser;
use eyre::Result;

/// Run the `forge` command line interface.
pub fn run() -> Result<()> {
    let args = Forge::parse();
    args.global.init();
    run_command(args)
}

/// Run the subcommand on a fresh runtime.
pub fn run_command(args: Forge) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    match args.cmd {
        ForgeSubcommand::Build(cmd) => runtime.block_on(cmd.run(&args.global)),
        ForgeSubcommand::Test(cmd) => {
            let outcome = runtime.block_on(cmd.run(&args.global))?;
            outcome.ensure_ok()
        }
    }
}
