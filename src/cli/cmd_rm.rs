use anyhow::Result;
use clap::Args;
use dirmark::BookmarkManager;

#[derive(Args)]
#[command(
    about = "Delete a bookmark",
    long_about = "Delete a bookmark. Any directory handle held for it is released first.
The bookmarked directory itself is left untouched.",
    alias = "delete",
    help_template = crate::clap_help!(
        examples: "  # Remove a bookmark\n  \
                   {bin} rm photos\n\n  \
                   # Succeed even if it does not exist\n  \
                   {bin} rm photos --force"
    )
)]
pub struct RmCommand {
    /// Bookmark identifier
    pub id: String,

    /// Do not fail when the bookmark does not exist
    #[arg(short, long)]
    pub force: bool,
}

pub fn run(cmd: RmCommand, manager: &BookmarkManager) -> Result<()> {
    let deleted = manager.delete_bookmark(&cmd.id)?;
    if !deleted && !cmd.force {
        anyhow::bail!("Bookmark '{}' not found", cmd.id);
    }
    log::info!("Removed '{}'", cmd.id);
    Ok(())
}
