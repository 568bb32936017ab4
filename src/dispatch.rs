//! Command dispatch
//!
//! Routes a token sequence to a built-in (`cd`, `history`, `exit`) or to an
//! external process, and turns the result into a [`Status`].

use std::env;
use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{Command, ExitStatus};

use thiserror::Error;
use tracing::debug;

use crate::config::expand_tilde;
use crate::history::HistoryStore;

/// Exit status of one command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status(i32);

impl Status {
    pub const SUCCESS: Status = Status(0);
    pub const FAILURE: Status = Status(1);
    /// Found but could not be executed
    pub const NOT_EXECUTABLE: Status = Status(126);
    pub const NOT_FOUND: Status = Status(127);

    pub const fn new(code: i32) -> Self {
        Self(code)
    }

    pub fn code(self) -> i32 {
        self.0
    }

    pub fn is_success(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<ExitStatus> for Status {
    fn from(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Status(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return Status(128 + signal);
            }
        }
        Status::FAILURE
    }
}

/// What the shell loop should do after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue(Status),
    /// `exit` was run; leave the loop with this status
    Exit(Status),
}

impl Outcome {
    pub fn status(self) -> Status {
        match self {
            Outcome::Continue(status) | Outcome::Exit(status) => status,
        }
    }
}

#[derive(Error, Debug)]
pub enum SpawnError {
    #[error("command not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("failed to run {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// Runs an external program and waits for it
pub trait Spawner {
    /// `argv[0]` is the program; `argv` is never empty
    fn spawn_and_wait(&mut self, argv: &[String]) -> Result<Status, SpawnError>;
}

/// Spawns real processes, inheriting the shell's stdio
#[derive(Debug, Default)]
pub struct SystemSpawner;

impl Spawner for SystemSpawner {
    fn spawn_and_wait(&mut self, argv: &[String]) -> Result<Status, SpawnError> {
        let program = &argv[0];
        match Command::new(program).args(&argv[1..]).status() {
            Ok(status) => Ok(status.into()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(SpawnError::NotFound(program.clone()))
            }
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                Err(SpawnError::PermissionDenied(program.clone()))
            }
            Err(source) => Err(SpawnError::Io {
                program: program.clone(),
                source,
            }),
        }
    }
}

/// Catch SIGINT and SIGQUIT so `Ctrl-C` and `Ctrl-\` stop the foreground
/// command, not the shell. Handlers rather than SIG_IGN: a caught signal
/// reverts to its default action in the child after exec.
#[cfg(unix)]
pub fn catch_job_signals() -> io::Result<()> {
    use signal_hook::consts::{SIGINT, SIGQUIT};
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    let pending = Arc::new(AtomicBool::new(false));
    for signal in [SIGINT, SIGQUIT] {
        signal_hook::flag::register(signal, Arc::clone(&pending))?;
    }
    debug!("Job control signals caught");
    Ok(())
}

#[cfg(not(unix))]
pub fn catch_job_signals() -> io::Result<()> {
    Ok(())
}

/// Commands implemented inside the shell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Builtin {
    Cd,
    History,
    Exit,
}

impl Builtin {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "cd" => Some(Builtin::Cd),
            "history" => Some(Builtin::History),
            "exit" => Some(Builtin::Exit),
            _ => None,
        }
    }
}

/// Executes parsed commands
pub struct Dispatcher<S = SystemSpawner> {
    spawner: S,
    home: PathBuf,
    /// Directory before the last successful `cd`
    previous_dir: Option<PathBuf>,
}

impl<S: Spawner> Dispatcher<S> {
    pub fn new(spawner: S, home: PathBuf) -> Self {
        Self {
            spawner,
            home,
            previous_dir: None,
        }
    }

    #[cfg(test)]
    pub fn spawner(&self) -> &S {
        &self.spawner
    }

    /// Run `tokens`; `last` is the status of the previous command.
    ///
    /// Regular output goes to `out`, diagnostics to `err`.
    pub fn execute<W: Write, E: Write>(
        &mut self,
        tokens: &[String],
        last: Status,
        history: &HistoryStore,
        out: &mut W,
        err: &mut E,
    ) -> Outcome {
        let Some(name) = tokens.first() else {
            return Outcome::Continue(Status::SUCCESS);
        };
        let args = &tokens[1..];

        let outcome = match Builtin::from_name(name) {
            Some(Builtin::Cd) => Outcome::Continue(self.change_dir(args, err)),
            Some(Builtin::History) => Outcome::Continue(show_history(history, out, err)),
            Some(Builtin::Exit) => exit_shell(args, last, err),
            None => Outcome::Continue(self.run_external(tokens, err)),
        };
        debug!("{} -> {:?}", name, outcome);
        outcome
    }

    fn change_dir<E: Write>(&mut self, args: &[String], err: &mut E) -> Status {
        let target = match args {
            [] => self.home.clone(),
            [arg] if arg == "-" => match &self.previous_dir {
                Some(dir) => dir.clone(),
                None => {
                    let _ = writeln!(err, "ysh: cd: OLDPWD not set");
                    return Status::FAILURE;
                }
            },
            [arg] => expand_tilde(arg, &self.home),
            _ => {
                let _ = writeln!(err, "ysh: cd: too many arguments");
                return Status::FAILURE;
            }
        };

        let current = env::current_dir().ok();
        match env::set_current_dir(&target) {
            Ok(()) => {
                if let Some(previous) = &current {
                    env::set_var("OLDPWD", previous);
                }
                if let Ok(now) = env::current_dir() {
                    env::set_var("PWD", now);
                }
                self.previous_dir = current;
                Status::SUCCESS
            }
            Err(e) => {
                let _ = writeln!(err, "ysh: cd: {}: {}", target.display(), e);
                Status::FAILURE
            }
        }
    }

    fn run_external<E: Write>(&mut self, argv: &[String], err: &mut E) -> Status {
        match self.spawner.spawn_and_wait(argv) {
            Ok(status) => status,
            Err(e) => {
                let _ = writeln!(err, "ysh: {}", e);
                match e {
                    SpawnError::NotFound(_) => Status::NOT_FOUND,
                    SpawnError::PermissionDenied(_) => Status::NOT_EXECUTABLE,
                    SpawnError::Io { .. } => Status::FAILURE,
                }
            }
        }
    }
}

fn show_history<W: Write, E: Write>(history: &HistoryStore, out: &mut W, err: &mut E) -> Status {
    let result = history
        .entries()
        .iter()
        .enumerate()
        .try_for_each(|(index, entry)| writeln!(out, "{:5}  {}", index + 1, entry))
        .and_then(|()| out.flush());

    match result {
        Ok(()) => Status::SUCCESS,
        Err(e) => {
            let _ = writeln!(err, "ysh: history: {}", e);
            Status::FAILURE
        }
    }
}

fn exit_shell<E: Write>(args: &[String], last: Status, err: &mut E) -> Outcome {
    match args {
        [] => Outcome::Exit(last),
        [code] => match code.parse::<i32>() {
            Ok(code) => Outcome::Exit(Status::new(code)),
            Err(_) => {
                let _ = writeln!(err, "ysh: exit: {}: numeric argument required", code);
                Outcome::Continue(Status::FAILURE)
            }
        },
        _ => {
            let _ = writeln!(err, "ysh: exit: too many arguments");
            Outcome::Continue(Status::FAILURE)
        }
    }
}
