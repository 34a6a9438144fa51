//! Input normalization for terminal events.
//!
//! Raw console records go through the ANSI parser; replies and mouse reports
//! are claimed there, and everything else is decoded into key events.

mod event;
mod keyboard;
pub mod keys;
mod processor;
mod record;

pub use event::InputEvent;
pub use keyboard::{KeyCode, KeyEvent, KeyModifiers};
pub use keys::KeyDecoder;
pub use processor::InputProcessor;
pub use record::{InputRecord, KeyRecord};
