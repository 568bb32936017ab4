//! User-facing output.
//!
//! - **prompt**: Status-colored prompt with directory and git branch

pub mod prompt;

pub use prompt::{Prompt, PromptState};
