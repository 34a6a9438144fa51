//! ANSI request/response plumbing.
//!
//! The [`AnsiParser`] separates terminal replies from user input, the
//! [`RequestScheduler`] throttles the queries that provoke those replies,
//! and [`TerminalResponse`] gives typed access to the common ones.

mod held;
mod parser;
mod request;
mod response;
mod scheduler;
pub mod sequences;

pub use held::{HeldBuffer, Symbol};
pub use parser::{
    AbandonedCallback, AnsiParser, MatchKind, ParserState, ResponseCallback, Step,
    UnexpectedHandler,
};
pub use request::AnsiRequest;
pub use response::TerminalResponse;
pub use scheduler::RequestScheduler;
pub use sequences::query;
