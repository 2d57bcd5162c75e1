// Show and exists commands - single bookmark lookups
use anyhow::Result;
use clap::Args;
use dirmark::BookmarkManager;

use super::utils;

#[derive(Args)]
#[command(
    about = "Show a single bookmark",
    alias = "get",
    help_template = crate::clap_help!(
        examples: "  # Show a bookmark\n  \
                   {bin} show photos\n\n  \
                   # As JSON\n  \
                   {bin} show photos --json"
    )
)]
pub struct ShowCommand {
    /// Bookmark identifier
    pub id: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
#[command(about = "Check whether a bookmark exists (prints true or false)")]
pub struct ExistsCommand {
    /// Bookmark identifier
    pub id: String,
}

pub fn run(cmd: ShowCommand, manager: &BookmarkManager) -> Result<()> {
    let Some(record) = manager.get_bookmark(&cmd.id)? else {
        anyhow::bail!("Bookmark '{}' not found", cmd.id);
    };

    if cmd.json {
        return utils::print_json(&record);
    }

    println!("Identifier:  {}", record.identifier);
    println!("Path:        {}", record.path.display());
    println!("Created:     {}", record.created_at.format("%Y-%m-%dT%H:%M:%SZ"));
    println!("Reference:   {}", record.opaque_reference);
    if record.metadata.is_empty() {
        println!("Metadata:    (none)");
    } else {
        println!("Metadata:");
        for (key, value) in &record.metadata {
            println!("  {}: {}", key, value);
        }
    }
    Ok(())
}

pub fn run_exists(cmd: ExistsCommand, manager: &BookmarkManager) -> Result<()> {
    println!("{}", manager.bookmark_exists(&cmd.id)?);
    Ok(())
}
