use anyhow::Result;
use clap::Args;
use dirmark::BookmarkManager;

use super::utils;

#[derive(Args)]
#[command(
    about = "Re-validate a bookmark's directory",
    long_about = "Resolve a bookmark to its directory and print the current path.

With the relocatable resolver a directory that was renamed or moved nearby is
found again and the stored bookmark is updated to point at its new location.
Exits with an error if the directory can no longer be found.",
    help_template = crate::clap_help!(
        examples: "  # Print where a bookmark points now\n  \
                   {bin} resolve photos\n\n  \
                   # Full refreshed record\n  \
                   {bin} resolve photos --json"
    )
)]
pub struct ResolveCommand {
    /// Bookmark identifier
    pub id: String,

    /// Output the refreshed record as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(cmd: ResolveCommand, manager: &BookmarkManager) -> Result<()> {
    let Some(record) = manager.resolve_bookmark(&cmd.id)? else {
        anyhow::bail!("Directory for bookmark '{}' is no longer reachable", cmd.id);
    };

    if cmd.json {
        utils::print_json(&record)
    } else {
        println!("{}", utils::display_path(&record.path).display());
        Ok(())
    }
}
