//! stowaway - disk cache, debouncer and synchronized value primitives
//!
//! * [`cache`]: a folder of named entries (bytes, JSON, keyed archives) with
//!   queued or synchronous atomic-replace writes.
//! * [`debounce`]: coalesces bursts of triggers into one delayed callback.
//! * [`sync_value`]: a value behind a single reader-writer lock.
//! * [`queue`]: ordered single-worker executors used by the other two.
//!
//! The rest of the crate backs the `stowaway` binary.

pub mod cache;
pub mod cli;
pub mod config;
pub mod debounce;
pub mod error;
pub mod logging;
pub mod queue;
pub mod sync_value;

use std::fs;
use std::io::{self, Read, Write};

use anyhow::{Context, Result};

use crate::cache::{FileCache, Lookup};
use crate::cli::{Cli, Commands};
use crate::config::CacheSettings;
use crate::error::ExitCode;

/// Run the binary: set up logging, resolve settings, execute the command.
///
/// # Errors
///
/// Returns any failure that prevents the command from completing.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);

    let mut settings = match &cli.config {
        Some(path) => CacheSettings::load_from(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => CacheSettings::load(),
    };
    if let Some(root) = &cli.root {
        settings.root = Some(root.clone());
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    execute(&cli, &settings, &mut out)
}

/// Execute `cli.command` against caches resolved from `settings`, writing
/// command output to `out`.
///
/// # Errors
///
/// Fails on unreadable input, unreadable entries, or output errors.
pub fn execute(cli: &Cli, settings: &CacheSettings, out: &mut dyn Write) -> Result<ExitCode> {
    let open = |folder: &str| FileCache::from_settings(settings, folder, cli.scope.into());

    match &cli.command {
        Commands::Get(args) => {
            let cache = open(&args.folder);
            match cache.lookup_data(&args.name) {
                Lookup::Found(bytes) => {
                    out.write_all(&bytes).context("Failed to write entry")?;
                    Ok(ExitCode::Success)
                }
                Lookup::NotFound => {
                    log::info!("No entry {} in {}", args.name, args.folder);
                    Ok(ExitCode::NotFound)
                }
                Lookup::Failed(e) => {
                    Err(e).with_context(|| format!("Failed to read entry {}", args.name))
                }
            }
        }
        Commands::Put(args) => {
            let data = match &args.input {
                Some(path) => fs::read(path)
                    .with_context(|| format!("Failed to read input file: {}", path.display()))?,
                None => {
                    let mut buffer = Vec::new();
                    io::stdin()
                        .read_to_end(&mut buffer)
                        .context("Failed to read stdin")?;
                    buffer
                }
            };
            let cache = open(&args.folder);
            let size = data.len();
            if !cache.write_now(&data, &args.name) {
                anyhow::bail!("Failed to store entry {} in {}", args.name, args.folder);
            }
            log::info!("Stored {} bytes as {}", size, cache.file_path(&args.name).display());
            Ok(ExitCode::Success)
        }
        Commands::Delete(args) => {
            open(&args.folder).delete(&args.name);
            Ok(ExitCode::Success)
        }
        Commands::List(args) => {
            let entries = open(&args.folder).entries();
            if args.json {
                let json =
                    serde_json::to_string_pretty(&entries).context("Failed to render entries")?;
                writeln!(out, "{}", json)?;
            } else {
                for name in entries {
                    writeln!(out, "{}", name)?;
                }
            }
            Ok(ExitCode::Success)
        }
        Commands::Clear(args) => {
            open(&args.folder).clear();
            Ok(ExitCode::Success)
        }
        Commands::Path(args) => {
            let cache = open(&args.folder);
            let path = match &args.name {
                Some(name) => cache.file_path(name),
                None => cache.folder().to_path_buf(),
            };
            writeln!(out, "{}", path.display())?;
            Ok(ExitCode::Success)
        }
        Commands::Config => {
            let text = settings.to_toml().context("Failed to render configuration")?;
            write!(out, "{}", text)?;
            Ok(ExitCode::Success)
        }
    }
}
