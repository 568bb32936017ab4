//! Line editor
//!
//! Owns the line under construction and its cursor. Each [`KeyEvent`] is
//! applied by [`LineEditor::apply`], which mutates the buffer and reports
//! what the display needs ([`Redraw`]); [`LineEditor::render`] then writes
//! that to the terminal. Keeping the two apart lets the editing rules be
//! exercised without a terminal.
//!
//! # History recall
//!
//! The first ArrowUp captures the buffer as the *browse prefix*. ArrowUp and
//! ArrowDown then walk the history entries starting with that prefix;
//! walking down past the newest match brings back the line as it was
//! before browsing. Any edit ends browsing.

use std::io::{self, Read, Write};

use crossterm::{
    cursor::{MoveLeft, MoveTo, RestorePosition, SavePosition},
    queue,
    style::Print,
    terminal::{Clear, ClearType},
};
use unicode_width::UnicodeWidthChar;

use super::keys::{KeyDecoder, KeyEvent};
use crate::history::HistoryStore;

/// Editor lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditState {
    Editing,
    /// Enter was pressed; holds the trimmed line
    Submitted(String),
    /// Ctrl-D on an empty line
    Aborted,
}

/// Display work left after applying a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redraw {
    Nothing,
    /// First draw of a line, starting wherever the cursor is
    Prompt,
    /// A character was appended at the end of the line
    Echo(char),
    /// Redraw prompt and line
    Line,
    ClearScreen,
    /// Ctrl-C: abandon the visible line and start a fresh one
    Interrupted,
    /// Editing is over; move to the next line
    Finished,
}

/// Result of reading one line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Line(String),
    Eof,
}

/// History browsing state
#[derive(Debug, Clone)]
struct Browse {
    prefix: String,
    /// Line as it was when browsing started
    saved: Vec<char>,
    /// Index of the entry on display; `None` while showing `saved`
    position: Option<usize>,
}

/// In-progress line and cursor
#[derive(Debug, Clone)]
pub struct LineEditor {
    buffer: Vec<char>,
    /// Always within `0..=buffer.len()`
    cursor: usize,
    state: EditState,
    browse: Option<Browse>,
}

impl Default for LineEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl LineEditor {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            cursor: 0,
            state: EditState::Editing,
            browse: None,
        }
    }

    pub fn state(&self) -> &EditState {
        &self.state
    }

    pub fn line(&self) -> String {
        self.buffer.iter().collect()
    }

    #[allow(dead_code)]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Apply one key. Keys arriving after the line is finished are ignored.
    pub fn apply(&mut self, key: KeyEvent, history: &HistoryStore) -> Redraw {
        if self.state != EditState::Editing {
            return Redraw::Nothing;
        }

        match key {
            KeyEvent::Printable(c) => self.insert(c),
            KeyEvent::Backspace => self.backspace(),
            KeyEvent::Delete => self.delete(),
            KeyEvent::ArrowLeft => self.move_to(self.cursor.saturating_sub(1)),
            KeyEvent::ArrowRight => self.move_to(self.cursor + 1),
            KeyEvent::Home => self.move_to(0),
            KeyEvent::End => self.move_to(self.buffer.len()),
            KeyEvent::ArrowUp => self.history_prev(history),
            KeyEvent::ArrowDown => self.history_next(history),
            KeyEvent::Tab => self.complete(history),
            KeyEvent::KillLine => self.kill_line(),
            KeyEvent::CtrlL => Redraw::ClearScreen,
            KeyEvent::Interrupt => {
                self.buffer.clear();
                self.cursor = 0;
                self.browse = None;
                Redraw::Interrupted
            }
            KeyEvent::CtrlD => {
                if self.buffer.is_empty() {
                    self.state = EditState::Aborted;
                    Redraw::Finished
                } else {
                    Redraw::Nothing
                }
            }
            KeyEvent::Enter => {
                self.state = EditState::Submitted(self.line().trim().to_string());
                Redraw::Finished
            }
            KeyEvent::Unknown => Redraw::Nothing,
        }
    }

    fn insert(&mut self, c: char) -> Redraw {
        self.buffer.insert(self.cursor, c);
        self.cursor += 1;
        self.browse = None;
        if self.cursor == self.buffer.len() {
            Redraw::Echo(c)
        } else {
            Redraw::Line
        }
    }

    fn backspace(&mut self) -> Redraw {
        if self.cursor == 0 {
            return Redraw::Nothing;
        }
        self.cursor -= 1;
        self.buffer.remove(self.cursor);
        self.browse = None;
        Redraw::Line
    }

    fn delete(&mut self) -> Redraw {
        if self.cursor >= self.buffer.len() {
            return Redraw::Nothing;
        }
        self.buffer.remove(self.cursor);
        self.browse = None;
        Redraw::Line
    }

    fn kill_line(&mut self) -> Redraw {
        if self.cursor == 0 {
            return Redraw::Nothing;
        }
        self.buffer.drain(..self.cursor);
        self.cursor = 0;
        self.browse = None;
        Redraw::Line
    }

    fn move_to(&mut self, position: usize) -> Redraw {
        let position = position.min(self.buffer.len());
        if position == self.cursor {
            return Redraw::Nothing;
        }
        self.cursor = position;
        Redraw::Line
    }

    fn show(&mut self, text: &str) {
        self.buffer = text.chars().collect();
        self.cursor = self.buffer.len();
    }

    fn history_prev(&mut self, history: &HistoryStore) -> Redraw {
        let browse = self.browse.get_or_insert_with(|| Browse {
            prefix: self.buffer.iter().collect(),
            saved: self.buffer.clone(),
            position: None,
        });
        let current: String = self.buffer.iter().collect();

        let mut before = browse.position;
        while let Some(index) = history.prev_match(&browse.prefix, before) {
            let entry = history.get(index).unwrap_or_default();
            if browse.position.is_some() && entry == current {
                before = Some(index);
                continue;
            }
            browse.position = Some(index);
            self.show(entry);
            return Redraw::Line;
        }
        Redraw::Nothing
    }

    fn history_next(&mut self, history: &HistoryStore) -> Redraw {
        let Some(browse) = self.browse.as_mut() else {
            return Redraw::Nothing;
        };
        let Some(position) = browse.position else {
            return Redraw::Nothing;
        };
        let current: String = self.buffer.iter().collect();

        let mut after = position;
        while let Some(index) = history.next_match(&browse.prefix, after) {
            let entry = history.get(index).unwrap_or_default();
            if entry == current {
                after = index;
                continue;
            }
            browse.position = Some(index);
            self.show(entry);
            return Redraw::Line;
        }

        // Past the newest match: back to the line being typed
        browse.position = None;
        self.buffer = browse.saved.clone();
        self.cursor = self.buffer.len();
        Redraw::Line
    }

    /// Extend the text before the cursor to the longest common prefix of
    /// the history entries that start with it
    fn complete(&mut self, history: &HistoryStore) -> Redraw {
        let prefix: String = self.buffer[..self.cursor].iter().collect();
        if prefix.is_empty() {
            return Redraw::Nothing;
        }

        let mut matches = history.prefix_matches(&prefix);
        let Some(first) = matches.next() else {
            return Redraw::Nothing;
        };
        let mut common: Vec<char> = first.chars().collect();
        for entry in matches {
            let shared = common
                .iter()
                .zip(entry.chars())
                .take_while(|(a, b)| **a == *b)
                .count();
            common.truncate(shared);
        }

        if common.len() <= self.cursor {
            return Redraw::Nothing;
        }
        let tail = self.buffer.split_off(self.cursor);
        self.buffer = common;
        self.cursor = self.buffer.len();
        self.buffer.extend(tail);
        self.browse = None;
        Redraw::Line
    }

    /// Write the display update for `redraw` and flush
    pub fn render<W: Write>(&self, redraw: Redraw, prompt: &str, out: &mut W) -> io::Result<()> {
        match redraw {
            Redraw::Nothing => return Ok(()),
            Redraw::Echo(c) => queue!(out, Print(c))?,
            Redraw::Prompt => {
                queue!(out, SavePosition)?;
                self.draw_line(prompt, out)?;
            }
            Redraw::Line => {
                queue!(out, RestorePosition)?;
                self.draw_line(prompt, out)?;
            }
            Redraw::ClearScreen => {
                queue!(out, Clear(ClearType::All), MoveTo(0, 0), SavePosition)?;
                self.draw_line(prompt, out)?;
            }
            Redraw::Interrupted => {
                queue!(out, Print("^C\r\n"), SavePosition)?;
                self.draw_line(prompt, out)?;
            }
            Redraw::Finished => queue!(out, Print("\r\n"))?,
        }
        out.flush()
    }

    /// Draw prompt and line from the saved prompt origin. Output a command
    /// left without a trailing newline stays in front of the prompt.
    fn draw_line<W: Write>(&self, prompt: &str, out: &mut W) -> io::Result<()> {
        queue!(
            out,
            Print(prompt),
            Print(self.line()),
            Clear(ClearType::UntilNewLine)
        )?;

        let tail_width: usize = self.buffer[self.cursor..]
            .iter()
            .map(|c| c.width().unwrap_or(0))
            .sum();
        if tail_width > 0 {
            let columns = u16::try_from(tail_width).unwrap_or(u16::MAX);
            queue!(out, MoveLeft(columns))?;
        }
        Ok(())
    }
}

/// Read one line from `keys`, echoing to `out` after drawing `prompt`
pub fn read_line<R: Read, W: Write>(
    keys: &mut KeyDecoder<R>,
    history: &HistoryStore,
    prompt: &str,
    out: &mut W,
) -> io::Result<ReadOutcome> {
    let mut editor = LineEditor::new();
    editor.render(Redraw::Prompt, prompt, out)?;

    loop {
        let key = keys.next_key()?;
        let redraw = editor.apply(key, history);
        editor.render(redraw, prompt, out)?;

        match editor.state() {
            // Ctrl-D on a non-empty line is ignored, but closed input is final
            EditState::Editing if keys.is_exhausted() => {
                editor.render(Redraw::Finished, prompt, out)?;
                return Ok(ReadOutcome::Eof);
            }
            EditState::Editing => {}
            EditState::Submitted(line) => return Ok(ReadOutcome::Line(line.clone())),
            EditState::Aborted => return Ok(ReadOutcome::Eof),
        }
    }
}
