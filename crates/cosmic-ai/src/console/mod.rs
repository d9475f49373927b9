//! Line-oriented front end used by the `cosmic-ai` binary.

pub mod commands;
pub mod render;

pub use commands::{ConsoleCommand, HELP_TEXT, parse_line};
pub use render::{TranscriptPrinter, write_conversation_list};
