//! `termwire` - terminal input/output protocol core
//!
//! Separates terminal replies from user input in a single console stream,
//! throttles the queries that provoke those replies, turns SGR mouse reports
//! into press/release/click events, and drives it all from a single-threaded
//! main loop fed by a dedicated reader thread.
//!
//! ```
//! use termwire::ansi::AnsiParser;
//!
//! let mut parser: AnsiParser = AnsiParser::default();
//! parser.expect_response("R", |_reply| {}, false).unwrap();
//! assert_eq!(parser.process_str("ab\x1b[12;40Rc"), "abc");
//! ```

// Crate-level lint configuration
#![warn(unsafe_code)] // Unsafe code needs justification (required for termios FFI)
#![allow(clippy::cast_possible_truncation)] // Intentional coordinate casts
#![allow(clippy::cast_sign_loss)] // Intentional conversions from read counts
#![allow(clippy::module_name_repetitions)] // Allow MouseFlags in mouse etc
#![allow(clippy::struct_excessive_bools)] // Loop state needs multiple flags
#![allow(clippy::missing_panics_doc)] // Docs WIP
#![allow(clippy::missing_const_for_fn)] // Many functions could be const, not critical
#![allow(clippy::doc_markdown)] // Allow technical names without backticks
#![allow(clippy::use_self)] // Allow explicit type names in impl blocks
#![allow(clippy::needless_pass_by_value)] // Allow pass by value for small Copy types
#![allow(clippy::collapsible_if)] // Sometimes nested ifs are clearer
#![allow(clippy::items_after_statements)] // Common pattern in tests
#![allow(clippy::redundant_clone)] // Clones in tests for clarity are fine
#![allow(clippy::semicolon_if_nothing_returned)] // Style preference

pub mod ansi;
pub mod error;
pub mod input;
pub mod mainloop;
pub mod mouse;
pub mod terminal;

// Re-export core types at crate root
pub use error::{Error, Result};

// Re-export ANSI types
pub use ansi::{AnsiParser, AnsiRequest, RequestScheduler, Step, TerminalResponse};

// Re-export input types
pub use input::{InputEvent, InputProcessor, KeyCode, KeyEvent, KeyModifiers, KeyRecord};
pub use mouse::{ClickInterpreter, MouseButton, MouseEvent, MouseFlags, Point};

// Re-export main loop types
pub use mainloop::{
    Application, CancellationToken, Coordinator, InputSource, LoopContext, LoopOptions, LoopState,
    ManualClock, ScriptedSource, TimedEvents, TimeoutToken, TimerControl,
};
pub use terminal::{ConsoleOutput, MemoryOutput, Size, StdinSource, TerminalOutput};
