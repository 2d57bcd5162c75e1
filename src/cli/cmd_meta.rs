use anyhow::Result;
use clap::Args;
use dirmark::BookmarkManager;

use super::utils;

#[derive(Args)]
#[command(
    about = "Replace a bookmark's metadata",
    long_about = "Replace the metadata of a bookmark with the given JSON object.

The old metadata is discarded entirely, not merged. Pass '{}' to clear it.",
    after_help = "Examples:\n  \
            # Set metadata\n  \
            dirmark meta photos '{\"label\":\"Holiday\",\"starred\":true}'\n\n  \
            # Clear metadata\n  \
            dirmark meta photos '{}'"
)]
pub struct MetaCommand {
    /// Bookmark identifier
    pub id: String,

    /// New metadata as a JSON object
    #[arg(value_name = "JSON")]
    pub metadata: String,
}

pub fn run(cmd: MetaCommand, manager: &BookmarkManager) -> Result<()> {
    let metadata = utils::parse_metadata(&cmd.metadata)?;
    if !manager.update_bookmark_metadata(&cmd.id, metadata)? {
        anyhow::bail!("Bookmark '{}' not found", cmd.id);
    }
    Ok(())
}
