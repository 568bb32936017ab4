//! The read-parse-dispatch loop
//!
//! One cycle renders the prompt, reads a line in raw mode, records it in
//! the history, expands aliases and hands the tokens to the dispatcher with
//! the terminal back in its normal mode.

use std::io::{self, Write};

use thiserror::Error;
use tracing::{debug, info};

use crate::core::editor::{read_line, ReadOutcome};
use crate::core::keys::KeyDecoder;
use crate::core::terminal::TerminalSession;
use crate::dispatch::{Dispatcher, Outcome, Spawner, Status, SystemSpawner};
use crate::history::HistoryStore;
use crate::parser::CommandParser;
use crate::ui::{Prompt, PromptState};

#[derive(Error, Debug)]
pub enum ShellError {
    #[error("cannot determine the home directory (HOME is not set)")]
    NoHomeDir,

    #[error("terminal setup failed: {0}")]
    Terminal(#[source] io::Error),

    #[error("terminal I/O failed: {0}")]
    Io(#[from] io::Error),
}

pub struct Shell<S: Spawner = SystemSpawner> {
    history: HistoryStore,
    parser: CommandParser,
    dispatcher: Dispatcher<S>,
    prompt: Prompt,
    last_status: Status,
}

impl<S: Spawner> Shell<S> {
    pub fn new(
        history: HistoryStore,
        parser: CommandParser,
        dispatcher: Dispatcher<S>,
        prompt: Prompt,
    ) -> Self {
        Self {
            history,
            parser,
            dispatcher,
            prompt,
            last_status: Status::SUCCESS,
        }
    }

    /// Run until `exit` or end of input; returns the status to exit with
    pub fn run(&mut self) -> Result<Status, ShellError> {
        let mut session = TerminalSession::enter().map_err(ShellError::Terminal)?;
        let stdin = io::stdin();
        let mut keys = KeyDecoder::new(stdin.lock());
        let mut stdout = io::stdout();
        let storage = if self.history.is_persistent() {
            "persistent"
        } else {
            "in memory"
        };
        info!(
            "Shell started ({} history entries, {} aliases, history {})",
            self.history.len(),
            self.parser.aliases().len(),
            storage
        );

        loop {
            let state = PromptState::capture(self.last_status, self.prompt.shows_branch());
            let prompt = self.prompt.render(&state);

            let line = match read_line(&mut keys, &self.history, &prompt, &mut stdout)? {
                ReadOutcome::Line(line) => line,
                ReadOutcome::Eof => {
                    debug!("End of input");
                    break;
                }
            };

            let outcome = {
                let _cooked = session.suspend()?;
                self.run_line(&line, &mut stdout, &mut io::stderr())
            };

            if let Outcome::Exit(status) = outcome {
                info!("exit {}", status);
                return Ok(status);
            }
        }

        Ok(self.last_status)
    }

    /// Record, expand and execute one submitted line
    pub fn run_line<W: Write, E: Write>(
        &mut self,
        line: &str,
        out: &mut W,
        err: &mut E,
    ) -> Outcome {
        if line.is_empty() {
            self.last_status = Status::SUCCESS;
            return Outcome::Continue(self.last_status);
        }

        if let Err(e) = self.history.append(line) {
            let _ = writeln!(err, "ysh: {}", e);
        }

        let tokens = self.parser.parse(line);
        let outcome = self
            .dispatcher
            .execute(&tokens, self.last_status, &self.history, out, err);
        self.last_status = outcome.status();
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use crate::config::PromptConfig;
    use crate::dispatch::SpawnError;
    use crate::parser::AliasTable;

    #[derive(Default)]
    struct FakeSpawner {
        calls: Vec<Vec<String>>,
    }

    impl Spawner for FakeSpawner {
        fn spawn_and_wait(&mut self, argv: &[String]) -> Result<Status, SpawnError> {
            self.calls.push(argv.to_vec());
            match argv[0].as_str() {
                "false" => Ok(Status::FAILURE),
                "nosuchcmd" => Err(SpawnError::NotFound(argv[0].clone())),
                _ => Ok(Status::SUCCESS),
            }
        }
    }

    fn shell(history: HistoryStore) -> Shell<FakeSpawner> {
        let mut aliases = AliasTable::new();
        aliases.set_alias("ll", "ls -la");
        Shell::new(
            history,
            CommandParser::new(aliases),
            Dispatcher::new(FakeSpawner::default(), PathBuf::from("/")),
            Prompt::new(PromptConfig::default(), PathBuf::from("/")),
        )
    }

    fn run(shell: &mut Shell<FakeSpawner>, line: &str) -> (Outcome, String, String) {
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let outcome = shell.run_line(line, &mut out, &mut err);
        (
            outcome,
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    #[test]
    fn test_alias_is_expanded_and_recorded_verbatim() {
        let mut shell = shell(HistoryStore::in_memory());

        let (outcome, _, _) = run(&mut shell, "ll /tmp");
        assert_eq!(outcome, Outcome::Continue(Status::SUCCESS));
        assert_eq!(shell.dispatcher_calls(), vec![vec!["ls", "-la", "/tmp"]]);
        assert_eq!(shell.history.entries(), ["ll /tmp"]);
    }

    #[test]
    fn test_empty_line_resets_status() {
        let mut shell = shell(HistoryStore::in_memory());

        run(&mut shell, "false");
        assert_eq!(shell.last_status, Status::FAILURE);

        let (outcome, _, _) = run(&mut shell, "");
        assert_eq!(outcome, Outcome::Continue(Status::SUCCESS));
        assert_eq!(shell.last_status, Status::SUCCESS);
        assert_eq!(shell.history.len(), 1);
    }

    #[test]
    fn test_not_found_status() {
        let mut shell = shell(HistoryStore::in_memory());

        let (outcome, _, err) = run(&mut shell, "nosuchcmd");
        assert_eq!(outcome.status(), Status::NOT_FOUND);
        assert!(err.contains("command not found: nosuchcmd"));
        assert_eq!(shell.last_status, Status::NOT_FOUND);
    }

    #[test]
    fn test_history_sees_current_line() {
        let mut shell = shell(HistoryStore::in_memory());
        run(&mut shell, "echo hi");

        let (_, out, _) = run(&mut shell, "history");
        assert_eq!(out, "    1  echo hi\n    2  history\n");
    }

    #[test]
    fn test_exit_uses_last_status() {
        let mut shell = shell(HistoryStore::in_memory());
        run(&mut shell, "false");

        let (outcome, _, _) = run(&mut shell, "exit");
        assert_eq!(outcome, Outcome::Exit(Status::FAILURE));
    }

    #[test]
    fn test_history_failure_is_reported_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history");
        let history = HistoryStore::load(&path).unwrap();
        // Replace the file with a directory so appends fail
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();
        let mut shell = shell(history);

        let (outcome, _, err) = run(&mut shell, "echo one");
        assert_eq!(outcome, Outcome::Continue(Status::SUCCESS));
        assert!(err.starts_with("ysh: "));

        let (_, _, err) = run(&mut shell, "echo two");
        assert!(err.is_empty());
        assert_eq!(shell.history.entries(), ["echo one", "echo two"]);
    }

    impl Shell<FakeSpawner> {
        fn dispatcher_calls(&self) -> Vec<Vec<&str>> {
            self.dispatcher
                .spawner()
                .calls
                .iter()
                .map(|argv| argv.iter().map(String::as_str).collect())
                .collect()
        }
    }
}
