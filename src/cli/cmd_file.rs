// File commands - read and write files inside a bookmarked directory
use anyhow::{Context, Result};
use clap::{Args, Subcommand, ValueHint};
use dirmark::BookmarkManager;
use std::io::{self, Read, Write};
use std::path::PathBuf;

#[derive(Args)]
#[command(
    about = "Read, write, list and delete files in a bookmark",
    long_about = "Operate on files directly inside a bookmarked directory.

The bookmark is resolved on first use and kept active for later commands in
the same process, up to --capacity bookmarks at a time. Writing and deleting
check write permission on the directory first and fail without touching
anything when it is missing.

File names are single names by default. Pass --allow-nested-paths to accept
names containing separators or '..'.",
    help_template = crate::clap_help!(
        examples: "  # Write a file from stdin\n  \
                   echo hello | {bin} file put notes todo.txt\n\n  \
                   # Write a file from a local path\n  \
                   {bin} file put notes report.pdf --from ./report.pdf\n\n  \
                   # Read it back\n  \
                   {bin} file get notes todo.txt\n\n  \
                   # List visible regular files\n  \
                   {bin} file ls notes"
    )
)]
pub struct FileCommand {
    #[command(subcommand)]
    pub command: FileCommands,
}

#[derive(Subcommand)]
pub enum FileCommands {
    /// Create or overwrite a file
    #[command(alias = "write")]
    Put {
        /// Bookmark identifier
        id: String,

        /// File name inside the bookmarked directory
        name: String,

        /// Read contents from this file instead of stdin
        #[arg(long, value_hint = ValueHint::FilePath, conflicts_with = "data")]
        from: Option<PathBuf>,

        /// Use this string as the contents
        #[arg(long)]
        data: Option<String>,
    },

    /// Print a file's contents
    #[command(alias = "read", alias = "cat")]
    Get {
        /// Bookmark identifier
        id: String,

        /// File name inside the bookmarked directory
        name: String,

        /// Write contents to this path instead of stdout
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        output: Option<PathBuf>,
    },

    /// List regular, non-hidden files
    #[command(alias = "list")]
    Ls {
        /// Bookmark identifier
        id: String,
    },

    /// Delete a file
    #[command(alias = "delete")]
    Rm {
        /// Bookmark identifier
        id: String,

        /// File name inside the bookmarked directory
        name: String,

        /// Do not fail when the file does not exist
        #[arg(short, long)]
        force: bool,
    },

    /// Check whether a file exists (prints true or false)
    Exists {
        /// Bookmark identifier
        id: String,

        /// File name inside the bookmarked directory
        name: String,
    },
}

pub fn run(cmd: FileCommand, manager: &BookmarkManager) -> Result<()> {
    match cmd.command {
        FileCommands::Put {
            id,
            name,
            from,
            data,
        } => {
            let contents = match (from, data) {
                (Some(path), _) => std::fs::read(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                (None, Some(data)) => data.into_bytes(),
                (None, None) => {
                    let mut buf = Vec::new();
                    io::stdin()
                        .read_to_end(&mut buf)
                        .context("Failed to read stdin")?;
                    buf
                }
            };
            manager
                .save_file(&id, &name, &contents)
                .with_context(|| format!("Failed to write '{}' in '{}'", name, id))?;
            log::info!("Wrote {} bytes to {}", contents.len(), name);
        }

        FileCommands::Get { id, name, output } => {
            let Some(contents) = manager.read_file(&id, &name)? else {
                anyhow::bail!("File '{}' not found in '{}'", name, id);
            };
            match output {
                Some(path) => std::fs::write(&path, &contents)
                    .with_context(|| format!("Failed to write {}", path.display()))?,
                None => {
                    let mut stdout = io::stdout().lock();
                    stdout.write_all(&contents)?;
                    stdout.flush()?;
                }
            }
        }

        FileCommands::Ls { id } => {
            for name in manager.list_files(&id)? {
                println!("{}", name);
            }
        }

        FileCommands::Rm { id, name, force } => {
            let deleted = manager
                .delete_file(&id, &name)
                .with_context(|| format!("Failed to delete '{}' in '{}'", name, id))?;
            if !deleted && !force {
                anyhow::bail!("File '{}' not found in '{}'", name, id);
            }
        }

        FileCommands::Exists { id, name } => {
            println!("{}", manager.file_exists(&id, &name)?);
        }
    }

    Ok(())
}
