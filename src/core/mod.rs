//! Core terminal input components.
//!
//! This module contains the low-level line input logic:
//!
//! - **terminal**: Raw mode guard with a cooked-mode window for commands
//! - **keys**: Byte stream to key event decoder
//! - **editor**: Line editor with history recall and completion
//!
//! # Architecture
//!
//! ```text
//! read_line
//! ├── KeyDecoder (stdin bytes → KeyEvent)
//! └── LineEditor
//!     ├── buffer + cursor
//!     └── HistoryStore (prefix recall, Tab completion)
//! ```

pub mod editor;
pub mod keys;
pub mod terminal;
