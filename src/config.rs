//! Configuration for ysh.
//!
//! This module provides:
//! - TOML configuration loading from `~/.ysh/config.toml`
//! - The legacy line-oriented alias file (`~/.y_shell.config`)
//! - Home directory lookup and `~` expansion
//!
//! # Configuration File
//!
//! ```toml
//! # tracing filter directive, overridden by YSH_LOG
//! log_level = "info"
//!
//! # Legacy alias file with `alias NAME=EXPANSION` lines
//! rc_file = "~/.y_shell.config"
//!
//! [history]
//! file = "~/.ysh_history"
//! persist = true
//!
//! [prompt]
//! show_user_host = true
//! show_git_branch = true
//! symbol = "➜"
//!
//! [aliases]
//! ll = "ls -la"
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

const CONFIG_DIR: &str = ".ysh";
const CONFIG_FILE: &str = "config.toml";
const DEFAULT_RC_FILE: &str = "~/.y_shell.config";
const DEFAULT_HISTORY_FILE: &str = "~/.ysh_history";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log filter directive
    pub log_level: String,
    /// Legacy alias file
    pub rc_file: Option<String>,
    /// History settings
    pub history: HistoryConfig,
    /// Prompt settings
    pub prompt: PromptConfig,
    /// Aliases defined directly in TOML
    pub aliases: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            rc_file: None,
            history: HistoryConfig::default(),
            prompt: PromptConfig::default(),
            aliases: BTreeMap::new(),
        }
    }
}

/// History configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub file: Option<String>,
    pub persist: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            file: None,
            persist: true,
        }
    }
}

/// Prompt configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    pub show_user_host: bool,
    pub show_git_branch: bool,
    pub symbol: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            show_user_host: true,
            show_git_branch: true,
            symbol: "➜".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `~/.ysh/config.toml`
    pub fn default_path(home: &Path) -> PathBuf {
        home.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Log file next to the config file
    pub fn log_path(home: &Path) -> PathBuf {
        home.join(CONFIG_DIR).join("ysh.log")
    }

    pub fn history_path(&self, home: &Path) -> PathBuf {
        expand_tilde(
            self.history.file.as_deref().unwrap_or(DEFAULT_HISTORY_FILE),
            home,
        )
    }

    pub fn rc_path(&self, home: &Path) -> PathBuf {
        expand_tilde(self.rc_file.as_deref().unwrap_or(DEFAULT_RC_FILE), home)
    }
}

/// Parse `alias NAME=EXPANSION` lines.
///
/// Blank lines and `#` comments are ignored; lines that are not alias
/// definitions or lack `=` are skipped with a warning.
pub fn parse_alias_lines(content: &str) -> Vec<(String, String)> {
    let mut aliases = Vec::new();

    for (number, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some(definition) = line.strip_prefix("alias ") else {
            warn!(
                "Skipping config line {}: not an alias definition",
                number + 1
            );
            continue;
        };
        let Some((name, expansion)) = definition.split_once('=') else {
            warn!("Skipping config line {}: missing '='", number + 1);
            continue;
        };
        let name = name.trim();
        if name.is_empty() {
            warn!("Skipping config line {}: empty alias name", number + 1);
            continue;
        }

        let expansion = strip_quotes(expansion.trim());
        aliases.push((name.to_string(), expansion.to_string()));
    }

    aliases
}

/// Remove one pair of matching surrounding quotes
fn strip_quotes(value: &str) -> &str {
    for quote in ['\'', '"'] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

/// Read the legacy alias file; a missing file defines no aliases
pub fn load_alias_file(path: &Path) -> Result<Vec<(String, String)>, ConfigError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(parse_alias_lines(&content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(source) => Err(ConfigError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Expand a leading `~` against `home`
pub fn expand_tilde(path: &str, home: &Path) -> PathBuf {
    if path == "~" {
        home.to_path_buf()
    } else if let Some(rest) = path.strip_prefix("~/") {
        home.join(rest)
    } else {
        PathBuf::from(path)
    }
}

// Get home directory
pub fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .filter(|home| !home.is_empty())
        .map(PathBuf::from)
}
