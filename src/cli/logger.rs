// Logging utilities for CLI
use std::io::Write;

/// Initialize logger for CLI
pub fn init_logger(verbose: bool, quiet: bool) {
    // RUST_LOG wins over the flags entirely
    if std::env::var("RUST_LOG").is_ok() {
        return env_logger::init();
    }

    let default_level = if quiet {
        log::LevelFilter::Error
    } else if verbose {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Warn
    };

    let mut builder = env_logger::Builder::new();

    builder.filter_level(default_level).format(|buf, record| {
        if record.level() <= log::Level::Warn {
            writeln!(buf, "[{}] {}", record.level(), record.args())
        } else {
            writeln!(buf, "{}", record.args())
        }
    });

    // Cache hits, activations and releases only show up with --verbose
    if verbose && !quiet {
        builder.filter_module("dirmark", log::LevelFilter::Debug);
    }

    builder.init();
}
