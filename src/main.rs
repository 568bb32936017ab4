//! ysh - A small interactive shell
//!
//! ysh reads commands in raw terminal mode with its own line editor,
//! expands aliases and runs programs from `PATH`.
//!
//! # Features
//!
//! - **History**: Persistent across sessions, prefix recall with ↑/↓
//! - **Completion**: Tab extends the line from matching history entries
//! - **Aliases**: From `~/.ysh/config.toml` and `~/.y_shell.config`
//! - **Prompt**: Colored by the last exit status, shows the git branch
//!
//! # Key bindings
//!
//! | Key | Action |
//! |-----|--------|
//! | ↑/↓ | Previous/next history entry starting with the typed text |
//! | ←/→ | Move the cursor |
//! | Home/End, Ctrl+A/E | Start/end of line |
//! | Tab | Complete from history |
//! | Ctrl+U | Clear the line |
//! | Ctrl+L | Clear the screen |
//! | Ctrl+C | Discard the line |
//! | Ctrl+D | Exit on an empty line |

mod config;
mod core;
mod dispatch;
mod history;
mod parser;
mod shell;
mod ui;

use std::env;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::Config;
use crate::dispatch::{Dispatcher, SystemSpawner};
use crate::history::HistoryStore;
use crate::parser::{AliasTable, CommandParser};
use crate::shell::{Shell, ShellError};
use crate::ui::Prompt;

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable overriding the configured log filter
const LOG_ENV: &str = "YSH_LOG";

/// Command line options
#[derive(Debug, Default)]
struct Args {
    /// Alternative config file
    config: Option<PathBuf>,
    /// Keep history in memory only
    no_history: bool,
    /// Skip the legacy alias file
    no_rc: bool,
}

fn print_version() {
    eprintln!("ysh {}", VERSION);
}

fn print_help() {
    eprintln!("ysh {} - A small interactive shell", VERSION);
    eprintln!();
    eprintln!("Usage: ysh [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!(
        "  -c, --config <PATH>   Use PATH instead of ~/.ysh/config.toml"
    );
    eprintln!(
        "  --no-history          Do not read or write the history file"
    );
    eprintln!("  --no-rc               Do not read ~/.y_shell.config");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Built-in commands:");
    eprintln!("  cd [DIR|-|~]          Change directory");
    eprintln!("  history               List previous commands");
    eprintln!("  exit [N]              Leave the shell");
    eprintln!();
    eprintln!("Line editing:");
    eprintln!(
        "  ↑/↓                   Recall history starting with the typed text"
    );
    eprintln!("  Tab                   Complete from history");
    eprintln!("  Ctrl+U                Clear the line");
    eprintln!("  Ctrl+L                Clear the screen");
    eprintln!("  Ctrl+D                Exit (on an empty line)");
    eprintln!();
    eprintln!("Configuration: ~/.ysh/config.toml");
    eprintln!("Aliases:       ~/.y_shell.config (alias NAME=EXPANSION)");
    eprintln!("Logging:       ~/.ysh/ysh.log (filter with {})", LOG_ENV);
}

/// Parse command line arguments
fn parse_args() -> Result<Args, String> {
    let mut args = Args::default();
    let mut iter = env::args().skip(1);

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                std::process::exit(0);
            }
            "-c" | "--config" => match iter.next() {
                Some(path) => args.config = Some(PathBuf::from(path)),
                None => return Err("Missing config path".to_string()),
            },
            "--no-history" => args.no_history = true,
            "--no-rc" => args.no_rc = true,
            _ => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
        }
    }

    Ok(args)
}

/// Send tracing output to `~/.ysh/ysh.log`; logging is skipped if the file cannot be opened
fn init_logging(home: &Path, level: &str) {
    let log_path = Config::log_path(home);

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let filter = EnvFilter::try_from_env(LOG_ENV)
            .or_else(|_| EnvFilter::try_new(level))
            .unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

/// Open the history file, falling back to an in-memory store
fn open_history(config: &Config, args: &Args, home: &Path) -> HistoryStore {
    if args.no_history || !config.history.persist {
        return HistoryStore::in_memory();
    }

    match HistoryStore::load(config.history_path(home)) {
        Ok(history) => history,
        Err(e) => {
            eprintln!("ysh: {}; history will not be saved", e);
            warn!("{}", e);
            HistoryStore::in_memory()
        }
    }
}

/// TOML aliases first, then the legacy file, so later definitions win
fn build_aliases(config: &Config, args: &Args, home: &Path) -> AliasTable {
    let mut aliases = AliasTable::new();
    for (name, expansion) in &config.aliases {
        aliases.set_alias(name.as_str(), expansion.as_str());
    }

    if !args.no_rc {
        match config::load_alias_file(&config.rc_path(home)) {
            Ok(definitions) => {
                for (name, expansion) in definitions {
                    aliases.set_alias(name, expansion);
                }
            }
            Err(e) => {
                eprintln!("ysh: {}", e);
                warn!("{}", e);
            }
        }
    }

    aliases
}

fn main() -> anyhow::Result<()> {
    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    let home = config::home_dir()
        .ok_or(ShellError::NoHomeDir)
        .context("ysh needs a home directory for its history and config")?;

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| Config::default_path(&home));
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("ysh: {}; using defaults", e);
            Config::default()
        }
    };

    init_logging(&home, &config.log_level);
    info!("ysh {} starting...", VERSION);

    if let Err(e) = dispatch::catch_job_signals() {
        warn!("Cannot catch job control signals: {}", e);
    }

    let history = open_history(&config, &args, &home);
    let aliases = build_aliases(&config, &args, &home);
    info!("Loaded {} aliases", aliases.len());

    let prompt = Prompt::new(config.prompt.clone(), home.clone());
    let dispatcher = Dispatcher::new(SystemSpawner, home);
    let mut shell = Shell::new(history, CommandParser::new(aliases), dispatcher, prompt);

    // The terminal guard lives inside run(), so raw mode is already off here
    let status = shell.run().context("shell terminated")?;
    info!("ysh exiting with status {}", status);
    drop(shell);

    std::process::exit(status.code());
}
