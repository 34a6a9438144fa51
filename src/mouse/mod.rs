//! Mouse reports: decoding and click synthesis.

pub mod decoder;
mod flags;
mod interpreter;

pub use decoder::{decode, encode, parse_sgr};
pub use flags::{MouseButton, MouseEvent, MouseFlags, Point};
pub use interpreter::ClickInterpreter;
