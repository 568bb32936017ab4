//! Prompt rendering
//!
//! The prompt is rebuilt every cycle from a [`PromptState`]: the status of
//! the last command picks the color of the `➜  user@host` part, followed by
//! the current directory and, inside a git work tree, the branch name.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crossterm::style::Stylize;

use crate::config::PromptConfig;
use crate::dispatch::Status;

/// Inputs to one prompt, recomputed each cycle
#[derive(Debug, Clone)]
pub struct PromptState {
    pub last_status: Status,
    pub cwd: PathBuf,
    pub branch: Option<String>,
}

impl PromptState {
    /// Snapshot the process state; the branch lookup spawns `git`
    pub fn capture(last_status: Status, with_branch: bool) -> Self {
        Self {
            last_status,
            cwd: env::current_dir().unwrap_or_default(),
            branch: if with_branch { git_branch() } else { None },
        }
    }
}

/// Prompt layout, fixed for the session
pub struct Prompt {
    config: PromptConfig,
    home: PathBuf,
    identity: String,
}

impl Prompt {
    pub fn new(config: PromptConfig, home: PathBuf) -> Self {
        let identity = format!("{}@{}", user_name(), host_name());
        Self {
            config,
            home,
            identity,
        }
    }

    pub fn shows_branch(&self) -> bool {
        self.config.show_git_branch
    }

    pub fn render(&self, state: &PromptState) -> String {
        let mut head = self.config.symbol.clone();
        if self.config.show_user_host {
            head.push_str("  ");
            head.push_str(&self.identity);
        }
        head.push(' ');

        let head = if state.last_status.is_success() {
            head.green().bold()
        } else {
            head.red().bold()
        };

        let directory = self.directory_label(&state.cwd);
        let mut prompt = format!("{}{}", head, directory.cyan().bold());
        if let Some(branch) = &state.branch {
            prompt.push_str(&format!(
                " {}{}{}",
                "git:(".blue().bold(),
                branch.as_str().red().bold(),
                ")".blue().bold()
            ));
        }
        prompt.push(' ');
        prompt
    }

    /// `~` at home, otherwise the last path component
    fn directory_label(&self, cwd: &Path) -> String {
        if cwd == self.home {
            return "~".to_string();
        }
        cwd.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| cwd.display().to_string())
    }
}

/// Current branch from `git branch`, `None` outside a work tree
pub fn git_branch() -> Option<String> {
    let output = Command::new("git")
        .arg("branch")
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    parse_branch(&String::from_utf8_lossy(&output.stdout))
}

fn parse_branch(output: &str) -> Option<String> {
    output
        .lines()
        .find(|line| line.starts_with('*'))
        .map(|line| line.trim_start_matches('*').trim().to_string())
        .filter(|branch| !branch.is_empty())
}

fn user_name() -> String {
    env::var("USER")
        .or_else(|_| env::var("USERNAME"))
        .unwrap_or_else(|_| "user".to_string())
}

fn host_name() -> String {
    if let Ok(host) = env::var("HOSTNAME") {
        if !host.is_empty() {
            return host;
        }
    }
    fs::read_to_string("/etc/hostname")
        .ok()
        .map(|host| host.trim().to_string())
        .filter(|host| !host.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt() -> Prompt {
        let config = PromptConfig {
            show_user_host: false,
            show_git_branch: true,
            symbol: ">".to_string(),
        };
        Prompt::new(config, PathBuf::from("/home/yo"))
    }

    fn state(code: i32, cwd: &str, branch: Option<&str>) -> PromptState {
        PromptState {
            last_status: Status::new(code),
            cwd: PathBuf::from(cwd),
            branch: branch.map(str::to_string),
        }
    }

    #[test]
    fn test_parse_branch() {
        let listing = "  dev\n* main\n  old\n";
        assert_eq!(parse_branch(listing), Some("main".to_string()));
        assert_eq!(
            parse_branch("* (HEAD detached at 1a2b3c)\n"),
            Some("(HEAD detached at 1a2b3c)".to_string())
        );
        assert_eq!(parse_branch(""), None);
    }

    #[test]
    fn test_status_color() {
        let prompt = prompt();
        // bold green / bold red
        let ok = prompt.render(&state(0, "/tmp", None));
        let failed = prompt.render(&state(127, "/tmp", None));
        assert!(ok.contains("\x1b[38;5;10m"));
        assert!(failed.contains("\x1b[38;5;9m"));
        assert!(ok.contains("> "));
    }

    #[test]
    fn test_directory_label() {
        let prompt = prompt();
        assert_eq!(prompt.directory_label(Path::new("/home/yo")), "~");
        assert_eq!(prompt.directory_label(Path::new("/home/yo/src/ysh")), "ysh");
        assert_eq!(prompt.directory_label(Path::new("/")), "/");
    }

    #[test]
    fn test_branch_segment() {
        let prompt = prompt();
        let on_branch = prompt.render(&state(0, "/tmp", Some("main")));
        assert!(on_branch.contains("main"));
        assert!(!prompt.render(&state(0, "/tmp", None)).contains("git:("));
        assert!(prompt.render(&state(0, "/tmp", None)).ends_with(' '));
    }
}
