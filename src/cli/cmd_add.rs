// Add command - bookmark a directory
use anyhow::{Context, Result};
use clap::{Args, ValueHint};
use dirmark::BookmarkManager;
use std::path::PathBuf;

use super::utils;

#[derive(Args)]
#[command(
    about = "Bookmark a directory",
    long_about = "Create a named bookmark for an existing directory.

The directory must exist. The identifier must not already be in use; pick
another name or remove the old bookmark first. Optional metadata is any JSON
object and is stored verbatim alongside the bookmark.",
    alias = "create",
    after_help = "Examples:\n  \
            # Bookmark the current directory\n  \
            dirmark add here .\n\n  \
            # Bookmark with metadata\n  \
            dirmark add photos ~/Pictures --meta '{\"label\":\"Photos\"}'"
)]
pub struct AddCommand {
    /// Bookmark identifier
    pub id: String,

    /// Directory to bookmark
    #[arg(value_hint = ValueHint::DirPath)]
    pub path: PathBuf,

    /// Metadata as a JSON object
    #[arg(long = "meta", value_name = "JSON")]
    pub metadata: Option<String>,
}

pub fn run(cmd: AddCommand, manager: &BookmarkManager) -> Result<()> {
    let metadata = cmd
        .metadata
        .as_deref()
        .map(utils::parse_metadata)
        .transpose()?;

    let id = manager
        .create_bookmark(&cmd.id, &cmd.path, metadata)
        .with_context(|| format!("Failed to bookmark {}", cmd.path.display()))?;

    println!("{}", id);
    Ok(())
}
