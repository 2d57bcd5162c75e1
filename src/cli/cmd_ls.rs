use anyhow::Result;
use clap::Args;
use dirmark::BookmarkManager;

use super::utils;

#[derive(Args)]
#[command(
    about = "List bookmarks (machine-readable)",
    after_help = "Examples:\n  \
            # List all bookmarks\n  \
            dirmark ls\n\n  \
            # Only identifiers\n  \
            dirmark ls | cut -f1\n\n  \
            # Full records as JSON\n  \
            dirmark ls --json"
)]
pub struct LsCommand {
    /// Output full records as JSON
    #[arg(long)]
    pub json: bool,

    /// Omit header row
    #[arg(long)]
    pub no_header: bool,
}

pub fn run(cmd: LsCommand, manager: &BookmarkManager) -> Result<()> {
    let records = manager.list_bookmarks()?;

    if cmd.json {
        return utils::print_json(&records);
    }

    if records.is_empty() {
        return Ok(());
    }

    if !cmd.no_header {
        println!("id\tpath\tcreated");
    }
    for record in &records {
        println!("{}", utils::format_record_line(record));
    }
    Ok(())
}
