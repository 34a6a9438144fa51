//! The main loop: one consumer thread, one reader thread.
//!
//! The reader thread only blocks on the console and forwards raw records.
//! Everything else (parsing, scheduling, click interpretation, timers,
//! dispatch) happens on the thread that calls
//! [`Coordinator::run_iteration`].

pub mod clock;
mod coordinator;
mod options;
mod source;
mod timed;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock, system_clock};
pub use coordinator::{Application, Coordinator, LoopContext, LoopState};
pub use options::LoopOptions;
pub use source::{CancellationToken, InputSource, ScriptedSource};
pub use timed::{TimedEvents, TimeoutToken, TimerControl};
