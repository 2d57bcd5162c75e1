// Completions command: print a clap_complete script for the chosen shell
use anyhow::Result;
use clap::{Args, CommandFactory};
use clap_complete::{Shell, generate};
use dirmark::constants;
use std::io;

#[derive(Args)]
#[command(
    about = "Print a shell completion script",
    long_about = "Write a completion script for subcommands and flags to stdout.

Bookmark identifiers are not completed, since they live in the store rather
than in the command definition. Run without a shell for setup notes.",
    after_help = "Examples:
  # Current bash session only
  source <(dirmark completions bash)

  # Fish, loaded on every start
  dirmark completions fish > ~/.config/fish/completions/dirmark.fish"
)]
pub struct CompletionsCommand {
    /// bash, zsh, fish, elvish or powershell
    #[arg(value_enum)]
    pub shell: Option<Shell>,
}

pub fn run(cmd: CompletionsCommand) -> Result<()> {
    match cmd.shell {
        Some(shell) => {
            let mut command = super::Cli::command();
            generate(shell, &mut command, constants::BINARY_NAME, &mut io::stdout());
        }
        None => print_setup(),
    }
    Ok(())
}

fn print_setup() {
    let bin = constants::BINARY_NAME;
    println!("{bin} completions <bash|zsh|fish|elvish|powershell>");
    println!();
    println!("Save the script wherever your shell loads completions from, e.g.");
    println!("  {bin} completions zsh > \"$HOME/.zfunc/_{bin}\"");
    println!();
    println!("The script completes --store but not the store's contents. To point");
    println!("every invocation at one store, export {}=<file>.", constants::STORE_ENV_VAR);
}
