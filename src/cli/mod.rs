use anyhow::Result;
use clap::{Parser, Subcommand, ValueHint};
use dirmark::{BookmarkManager, PathPolicy, ResolverKind, constants};
use std::path::PathBuf;

// CLI Commands (cmd_ prefix)
mod cmd_add;
mod cmd_completions;
mod cmd_file;
mod cmd_ls;
mod cmd_meta;
mod cmd_perm;
mod cmd_resolve;
mod cmd_rm;
mod cmd_show;
mod cmd_status;

// Helper modules (no cmd_ prefix)
mod logger;
mod utils;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Format custom help template with grouped commands
fn format_help_template() -> &'static str {
    concat!(
        "{about-with-newline}\n\n",
        "{usage-heading}\n  {usage}\n\n",
        "Options:\n{options}\n\n",
        "Bookmarks:\n",
        "  add       Bookmark a directory\n",
        "  ls        List bookmarks\n",
        "  show      Show a single bookmark\n",
        "  exists    Check whether a bookmark exists\n",
        "  rm        Delete a bookmark\n",
        "  meta      Replace a bookmark's metadata\n",
        "  resolve   Re-validate a bookmark's directory\n",
        "\n",
        "Files:\n",
        "  file      Read, write, list and delete files in a bookmark\n",
        "  perm      Check write permission on a bookmark\n",
        "\n",
        "Utilities:\n",
        "  status    Show store, resolver and cache status\n",
        "  completions Print a shell completion script\n",
        "\n",
        "See 'dirmark <COMMAND> --help' for more information on a specific command.\n"
    )
}

#[derive(Parser)]
#[command(bin_name = "dirmark")]
#[command(version = VERSION)]
#[command(about = concat!("dirmark v", env!("CARGO_PKG_VERSION"), " - Directory Bookmarks"))]
#[command(long_about = concat!(
    "dirmark v", env!("CARGO_PKG_VERSION"), " - Directory Bookmarks\n\n",
    "Keep named bookmarks to directories and read or write files inside\n",
    "them. At most --capacity bookmarked directories are held open at\n",
    "once; the least recently used one is released to make room."
))]
#[command(author)]
#[command(propagate_version = true)]
#[command(help_template = format_help_template())]
pub struct Cli {
    /// Bookmark store file
    #[arg(long, global = true, env = constants::STORE_ENV_VAR, value_hint = ValueHint::FilePath)]
    store: Option<PathBuf>,

    /// Maximum number of simultaneously active directory handles
    #[arg(long, global = true, default_value_t = constants::DEFAULT_CACHE_CAPACITY)]
    capacity: usize,

    /// Reference resolver: path or relocatable
    #[arg(long, global = true)]
    resolver: Option<ResolverKind>,

    /// Allow nested and parent components in file names
    #[arg(long, global = true)]
    allow_nested_paths: bool,

    /// Only print errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Enable verbose output
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn path_policy(&self) -> PathPolicy {
        if self.allow_nested_paths {
            PathPolicy::Concatenate
        } else {
            PathPolicy::Strict
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    Add(cmd_add::AddCommand),
    Ls(cmd_ls::LsCommand),
    Show(cmd_show::ShowCommand),
    Exists(cmd_show::ExistsCommand),
    Rm(cmd_rm::RmCommand),
    Meta(cmd_meta::MetaCommand),
    Resolve(cmd_resolve::ResolveCommand),
    File(cmd_file::FileCommand),
    Perm(cmd_perm::PermCommand),
    Status(cmd_status::StatusCommand),
    Completions(cmd_completions::CompletionsCommand),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logger based on verbosity flags
    logger::init_logger(cli.verbose, cli.quiet);

    if let Commands::Completions(cmd) = cli.command {
        return cmd_completions::run(cmd);
    }

    let manager = utils::create_manager(&cli)?;
    let result = dispatch(cli.command, &manager);

    // Always release held directories, even when the command failed
    manager.shutdown();
    result
}

fn dispatch(command: Commands, manager: &BookmarkManager) -> Result<()> {
    match command {
        Commands::Add(cmd) => cmd_add::run(cmd, manager),
        Commands::Ls(cmd) => cmd_ls::run(cmd, manager),
        Commands::Show(cmd) => cmd_show::run(cmd, manager),
        Commands::Exists(cmd) => cmd_show::run_exists(cmd, manager),
        Commands::Rm(cmd) => cmd_rm::run(cmd, manager),
        Commands::Meta(cmd) => cmd_meta::run(cmd, manager),
        Commands::Resolve(cmd) => cmd_resolve::run(cmd, manager),
        Commands::File(cmd) => cmd_file::run(cmd, manager),
        Commands::Perm(cmd) => cmd_perm::run(cmd, manager),
        Commands::Status(cmd) => cmd_status::run(cmd, manager),
        Commands::Completions(cmd) => cmd_completions::run(cmd),
    }
}

/// Macro to create clap help templates with examples
/// This works around the limitation that {bin} doesn't work in after_help
/// Uses env! macro to get binary name at compile time
#[macro_export]
macro_rules! clap_help {
    (examples: $examples:literal) => {{
        const BIN: &str = env!("CARGO_PKG_NAME");
        concat!(
            "{about-with-newline}\n",
            "{usage-heading} {usage}\n\n",
            "{all-args}\n\n",
            "Examples:\n",
            $examples
        ).replace("{bin}", BIN)
    }};
}
