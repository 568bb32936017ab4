//! Key decoding for raw terminal input
//!
//! Converts the byte stream of a terminal in raw mode into logical key
//! events. This is the reverse of what a terminal emits for a key press:
//! `ESC [ A` becomes `ArrowUp`, `0x7F` becomes `Backspace`, a UTF-8
//! sequence becomes one `Printable` character.
//!
//! Decoding never writes to the terminal.

use std::io::{self, Read};

pub const ESC: u8 = 0x1B;
pub const TAB: u8 = 0x09;
pub const LF: u8 = 0x0A;
pub const CR: u8 = 0x0D;
pub const BACKSPACE: u8 = 0x7F;
pub const CTRL_A: u8 = 0x01;
pub const CTRL_C: u8 = 0x03;
pub const CTRL_D: u8 = 0x04;
pub const CTRL_E: u8 = 0x05;
pub const CTRL_H: u8 = 0x08;
pub const CTRL_L: u8 = 0x0C;
pub const CTRL_U: u8 = 0x15;

/// CSI introducer (`ESC [`)
const CSI: u8 = b'[';
/// SS3 introducer (`ESC O`), sent for arrows in application cursor mode
const SS3: u8 = b'O';

/// Maximum bytes consumed after ESC while looking for a CSI final byte
const MAX_SEQUENCE_LEN: usize = 8;

/// A decoded key press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    Printable(char),
    Enter,
    Backspace,
    Delete,
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    Home,
    End,
    Tab,
    CtrlL,
    CtrlD,
    /// Ctrl+C
    Interrupt,
    /// Ctrl+U
    KillLine,
    /// Unrecognised escape sequence or malformed input, to be ignored
    Unknown,
}

/// Reads key events from a blocking byte source
pub struct KeyDecoder<R> {
    reader: R,
    /// The byte source reported end of input
    exhausted: bool,
}

impl<R: Read> KeyDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            exhausted: false,
        }
    }

    /// True once the byte source has reported end of input
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Block until one complete key has been read.
    ///
    /// End of input decodes to `CtrlD`, so a closed terminal behaves like
    /// the user asking to leave.
    pub fn next_key(&mut self) -> io::Result<KeyEvent> {
        let byte = match self.read_byte()? {
            Some(byte) => byte,
            None => return Ok(KeyEvent::CtrlD),
        };

        let key = match byte {
            ESC => self.escape_sequence()?,
            TAB => KeyEvent::Tab,
            LF | CR => KeyEvent::Enter,
            BACKSPACE | CTRL_H => KeyEvent::Backspace,
            CTRL_L => KeyEvent::CtrlL,
            CTRL_D => KeyEvent::CtrlD,
            CTRL_C => KeyEvent::Interrupt,
            CTRL_U => KeyEvent::KillLine,
            CTRL_A => KeyEvent::Home,
            CTRL_E => KeyEvent::End,
            // Stray continuation byte
            0x80..=0xBF => KeyEvent::Unknown,
            0xC0..=0xFF => self.utf8_char(byte)?,
            _ => KeyEvent::Printable(byte as char),
        };
        Ok(key)
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut buf = [0u8; 1];
        loop {
            match self.reader.read(&mut buf) {
                Ok(0) => {
                    self.exhausted = true;
                    return Ok(None);
                }
                Ok(_) => return Ok(Some(buf[0])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Resolve the bytes following ESC
    fn escape_sequence(&mut self) -> io::Result<KeyEvent> {
        let intro = match self.read_byte()? {
            Some(byte) => byte,
            None => return Ok(KeyEvent::Unknown),
        };
        if intro != CSI && intro != SS3 {
            // Alt+key and friends
            return Ok(KeyEvent::Unknown);
        }

        let first = match self.read_byte()? {
            Some(byte) => byte,
            None => return Ok(KeyEvent::Unknown),
        };

        let key = match first {
            b'A' => KeyEvent::ArrowUp,
            b'B' => KeyEvent::ArrowDown,
            b'C' => KeyEvent::ArrowRight,
            b'D' => KeyEvent::ArrowLeft,
            b'H' => KeyEvent::Home,
            b'F' => KeyEvent::End,
            b'0'..=b'9' if intro == CSI => self.numeric_sequence(first)?,
            _ => KeyEvent::Unknown,
        };
        Ok(key)
    }

    /// `ESC [ <params> <final>`: tilde keys, or modified keys we drain and ignore
    fn numeric_sequence(&mut self, first: u8) -> io::Result<KeyEvent> {
        let mut params = vec![first];
        // ESC, '[' and the first parameter byte are already consumed
        for _ in 3..MAX_SEQUENCE_LEN {
            let byte = match self.read_byte()? {
                Some(byte) => byte,
                None => return Ok(KeyEvent::Unknown),
            };
            if (0x40..=0x7E).contains(&byte) {
                return Ok(Self::tilde_key(&params, byte));
            }
            params.push(byte);
        }
        Ok(KeyEvent::Unknown)
    }

    fn tilde_key(params: &[u8], final_byte: u8) -> KeyEvent {
        if final_byte != b'~' {
            return KeyEvent::Unknown;
        }
        match params {
            b"1" | b"7" => KeyEvent::Home,
            b"3" => KeyEvent::Delete,
            b"4" | b"8" => KeyEvent::End,
            _ => KeyEvent::Unknown,
        }
    }

    /// Collect the continuation bytes of a multi-byte UTF-8 character
    fn utf8_char(&mut self, lead: u8) -> io::Result<KeyEvent> {
        let len = match lead {
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => return Ok(KeyEvent::Unknown),
        };

        let mut bytes = [lead, 0, 0, 0];
        for slot in bytes.iter_mut().take(len).skip(1) {
            match self.read_byte()? {
                Some(byte) => *slot = byte,
                None => return Ok(KeyEvent::Unknown),
            }
        }

        Ok(std::str::from_utf8(&bytes[..len])
            .ok()
            .and_then(|s| s.chars().next())
            .map_or(KeyEvent::Unknown, KeyEvent::Printable))
    }
}
