use anyhow::Result;
use clap::{Args, Subcommand};
use dirmark::BookmarkManager;

#[derive(Args)]
#[command(
    about = "Check write permission on a bookmark",
    long_about = "Report whether the bookmarked directory is writable by the current user.

There is no interactive permission prompt on this platform, so 'request'
reports the same answer as 'check'.",
    help_template = crate::clap_help!(
        examples: "  # Can we write into the bookmark?\n  \
                   {bin} perm check notes"
    )
)]
pub struct PermCommand {
    #[command(subcommand)]
    pub command: PermCommands,
}

#[derive(Subcommand)]
pub enum PermCommands {
    /// Print whether the directory is writable
    Check {
        /// Bookmark identifier
        id: String,
    },

    /// Ask for write permission (same as check here)
    Request {
        /// Bookmark identifier
        id: String,
    },
}

pub fn run(cmd: PermCommand, manager: &BookmarkManager) -> Result<()> {
    let writable = match cmd.command {
        PermCommands::Check { id } => manager.has_write_permission(&id)?,
        PermCommands::Request { id } => manager.request_write_permission(&id)?,
    };
    println!("{}", writable);
    Ok(())
}
