//! Terminal mode guard
//!
//! [`TerminalSession::enter`] switches the controlling terminal to raw mode
//! (byte-at-a-time input, no local echo). The original attributes are
//! restored exactly once when the session is dropped, whether the shell
//! leaves through `exit`, Ctrl-D, an error propagated with `?`, or a panic.

use std::io::{self, IsTerminal};

use crossterm::terminal;
use tracing::{debug, error, warn};

/// Switches the terminal between raw and cooked input
pub trait RawMode {
    fn enable(&mut self) -> io::Result<()>;
    fn disable(&mut self) -> io::Result<()>;
}

/// The controlling terminal, driven through crossterm
#[derive(Debug, Default)]
pub struct Crossterm;

impl RawMode for Crossterm {
    fn enable(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()
    }

    fn disable(&mut self) -> io::Result<()> {
        terminal::disable_raw_mode()
    }
}

/// Raw mode for the lifetime of the value
#[derive(Debug)]
pub struct TerminalSession<M: RawMode = Crossterm> {
    mode: M,
    raw: bool,
}

impl TerminalSession {
    /// Save the current terminal attributes and enter raw mode
    pub fn enter() -> io::Result<Self> {
        if !io::stdin().is_terminal() {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "standard input is not a terminal",
            ));
        }
        Self::with_mode(Crossterm)
    }
}

impl<M: RawMode> TerminalSession<M> {
    pub fn with_mode(mut mode: M) -> io::Result<Self> {
        mode.enable()?;
        debug!("Raw mode enabled");
        Ok(Self { mode, raw: true })
    }

    /// Put the terminal back in its original mode until the returned guard
    /// is dropped; used while a command owns the terminal.
    pub fn suspend(&mut self) -> io::Result<Suspended<'_, M>> {
        self.restore()?;
        Ok(Suspended { session: self })
    }

    /// Reapply the original attributes; a no-op when already restored
    pub fn restore(&mut self) -> io::Result<()> {
        if self.raw {
            self.raw = false;
            self.mode.disable()?;
            debug!("Raw mode disabled");
        }
        Ok(())
    }
}

impl<M: RawMode> Drop for TerminalSession<M> {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            error!("Failed to restore terminal mode: {}", e);
        }
    }
}

/// Cooked-mode window inside a [`TerminalSession`]
pub struct Suspended<'a, M: RawMode = Crossterm> {
    session: &'a mut TerminalSession<M>,
}

impl<M: RawMode> Drop for Suspended<'_, M> {
    fn drop(&mut self) {
        match self.session.mode.enable() {
            Ok(()) => self.session.raw = true,
            Err(e) => warn!("Failed to re-enter raw mode: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::panic::{self, AssertUnwindSafe};
    use std::rc::Rc;

    /// Logs every mode switch instead of touching a terminal
    #[derive(Clone, Default)]
    struct Recorder {
        log: Rc<RefCell<Vec<&'static str>>>,
        refuse_raw: bool,
    }

    impl Recorder {
        fn log(&self) -> Vec<&'static str> {
            self.log.borrow().clone()
        }
    }

    impl RawMode for Recorder {
        fn enable(&mut self) -> io::Result<()> {
            if self.refuse_raw {
                return Err(io::Error::new(io::ErrorKind::Other, "no tty"));
            }
            self.log.borrow_mut().push("raw");
            Ok(())
        }

        fn disable(&mut self) -> io::Result<()> {
            self.log.borrow_mut().push("cooked");
            Ok(())
        }
    }

    #[test]
    fn test_drop_restores_once() {
        let mode = Recorder::default();
        let mut session = TerminalSession::with_mode(mode.clone()).unwrap();
        assert_eq!(mode.log(), ["raw"]);

        session.restore().unwrap();
        session.restore().unwrap();
        drop(session);
        assert_eq!(mode.log(), ["raw", "cooked"]);
    }

    #[test]
    fn test_suspend_reenters_raw_mode() {
        let mode = Recorder::default();
        let mut session = TerminalSession::with_mode(mode.clone()).unwrap();

        {
            let _cooked = session.suspend().unwrap();
            assert_eq!(mode.log(), ["raw", "cooked"]);
        }
        assert_eq!(mode.log(), ["raw", "cooked", "raw"]);

        drop(session);
        assert_eq!(mode.log(), ["raw", "cooked", "raw", "cooked"]);
    }

    #[test]
    fn test_early_return_and_panic_restore() {
        fn leave_early(mode: Recorder) -> io::Result<()> {
            let _session = TerminalSession::with_mode(mode)?;
            Err(io::Error::new(io::ErrorKind::Other, "read failed"))
        }

        let mode = Recorder::default();
        assert!(leave_early(mode.clone()).is_err());
        assert_eq!(mode.log(), ["raw", "cooked"]);

        let mode = Recorder::default();
        let inner = mode.clone();
        let result = panic::catch_unwind(AssertUnwindSafe(move || {
            let _session = TerminalSession::with_mode(inner).unwrap();
            panic!("command loop panicked");
        }));
        assert!(result.is_err());
        assert_eq!(mode.log(), ["raw", "cooked"]);
    }

    #[test]
    fn test_failed_enter_leaves_terminal_alone() {
        let mode = Recorder {
            refuse_raw: true,
            ..Recorder::default()
        };
        assert!(TerminalSession::with_mode(mode.clone()).is_err());
        assert!(mode.log().is_empty());
    }
}
