use anyhow::Result;
use clap::Parser;
use dirmark::{BookmarkManager, constants};
use serde_json::json;

use super::utils;

#[derive(Parser)]
#[command(
    about = "Show store, resolver and cache status",
    long_about = "Display where bookmarks are stored, which resolver is in use, how many
bookmarks exist and the state of the active handle cache.

Use --check to resolve every bookmark once, which reports bookmarks whose
directory has disappeared and refreshes any that moved. Resolving goes through
the cache, so at most --capacity directories are held open while checking.",
    alias = "info",
    help_template = crate::clap_help!(
        examples: "  # Show status\n  \
                   {bin} status\n\n  \
                   # Resolve every bookmark and report broken ones\n  \
                   {bin} status --check\n\n  \
                   # JSON output for scripting\n  \
                   {bin} status --json"
    )
)]
pub struct StatusCommand {
    /// Resolve every bookmark and report unreachable ones
    #[arg(long)]
    pub check: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(cmd: StatusCommand, manager: &BookmarkManager) -> Result<()> {
    let records = manager.list_bookmarks()?;

    let mut unreachable = Vec::new();
    if cmd.check {
        for record in &records {
            if manager.resolve_bookmark(&record.identifier)?.is_none() {
                unreachable.push(record.identifier.clone());
            }
        }
    }

    let options = manager.options();
    let stats = manager.cache_stats();

    if cmd.json {
        return utils::print_json(&json!({
            "version": constants::VERSION,
            "store": options.store_path,
            "resolver": manager.resolver_kind().as_str(),
            "pathPolicy": options.path_policy.as_str(),
            "bookmarks": records.len(),
            "unreachable": unreachable,
            "cache": {
                "capacity": stats.capacity,
                "active": stats.active,
                "hits": stats.hits,
                "misses": stats.misses,
                "activations": stats.activations,
                "evictions": stats.evictions,
                "releases": stats.releases,
                "refreshes": stats.refreshes,
            }
        }));
    }

    println!("Directory Bookmarks Status");
    println!("═══════════════════════════════════════════════════════════════");
    println!();
    println!("  Store:           {}", utils::display_path(&options.store_path).display());
    println!("  Resolver:        {}", manager.resolver_kind());
    println!("  File names:      {}", options.path_policy);
    println!("  Bookmarks:       {}", records.len());
    println!();
    println!("Active Handle Cache");
    println!("───────────────────────────────────────────────────────────────");
    println!("  Capacity:        {}", stats.capacity);
    println!("  Active:          {}", stats.active);
    println!("  Hits / misses:   {} / {}", stats.hits, stats.misses);
    println!("  Evictions:       {}", stats.evictions);
    println!("  Refreshed refs:  {}", stats.refreshes);

    if cmd.check {
        println!();
        if unreachable.is_empty() {
            println!("✓ All {} bookmarks resolve", records.len());
        } else {
            println!("⚠️  {} unreachable:", unreachable.len());
            for id in &unreachable {
                println!("  {}", id);
            }
        }
    }

    Ok(())
}
