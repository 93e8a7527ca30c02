use clap::CommandFactory;
use clap_complete::Shell;

use super::CliResult;
use crate::Cli;

pub fn run(shell: Shell) -> CliResult {
    let mut command = Cli::command();
    clap_complete::generate(shell, &mut command, "jarago-cli", &mut std::io::stdout());
    Ok(())
}
