// Shared utility functions for CLI commands

use anyhow::{Context, Result};
use dirmark::{BookmarkManager, BookmarkRecord, ManagerOptionsBuilder, Metadata, ResolverKind};
use std::path::{Path, PathBuf};

use super::Cli;

/// Build the manager from the global flags
pub fn create_manager(cli: &Cli) -> Result<BookmarkManager> {
    let mut builder = ManagerOptionsBuilder::new()
        .capacity(cli.capacity)
        .path_policy(cli.path_policy())
        .resolver_kind(cli.resolver.unwrap_or_else(ResolverKind::platform_default));
    if let Some(store) = &cli.store {
        builder = builder.store_path(store);
    }
    let options = builder.build();
    let store_path = options.store_path.clone();

    BookmarkManager::open(options)
        .with_context(|| format!("Failed to open bookmark store {}", store_path.display()))
}

/// Parse a JSON object given on the command line into bookmark metadata
pub fn parse_metadata(raw: &str) -> Result<Metadata> {
    let value: serde_json::Value =
        serde_json::from_str(raw).context("Metadata must be valid JSON")?;
    match value {
        serde_json::Value::Object(map) => Ok(map),
        serde_json::Value::Null => Ok(Metadata::new()),
        other => anyhow::bail!("Metadata must be a JSON object, got {}", other),
    }
}

/// Display path resolving "." to absolute path
pub fn display_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// One-line human summary of a record
pub fn format_record_line(record: &BookmarkRecord) -> String {
    format!(
        "{}\t{}\t{}",
        record.identifier,
        record.path.display(),
        record.created_at.format("%Y-%m-%dT%H:%M:%SZ")
    )
}

pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
