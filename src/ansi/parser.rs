//! ANSI response parser.
//!
//! Splits an input symbol stream into pass-through input and terminal
//! replies. The parser is a three-state machine:
//!
//! ```text
//!   Normal ──ESC──▶ ExpectingBracket ──'['──▶ InResponse
//!     ▲                  │ other                 │ match / release
//!     └──────────────────┴───────────────────────┘
//! ```
//!
//! Replies are matched against three disjoint sets of expectations:
//! - *pending*: one-shot, removed on first match
//! - *late*: answered or abandoned one-shots, kept only to swallow one more
//!   reply that still arrives
//! - *persistent*: never removed by a match (e.g. mouse reports)
//!
//! A well-formed CSI sequence that matches nothing is released as plain input.

use std::fmt;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::ansi::held::{HeldBuffer, Symbol};
use crate::ansi::sequences::{self, CSI, ESC};
use crate::error::{Error, Result};
use crate::mainloop::clock::{SharedClock, system_clock};

/// Held content beyond this length is given up on and released as input.
const MAX_HELD_LENGTH: usize = 64 * 1024;

/// Callback invoked with the complete reply.
pub type ResponseCallback<M> = Box<dyn FnMut(&HeldBuffer<M>)>;

/// Callback invoked when a pending expectation is abandoned.
pub type AbandonedCallback = Box<dyn FnOnce()>;

/// Hook for well-formed replies nobody asked for. Returning `true` swallows
/// the reply instead of releasing it as input.
pub type UnexpectedHandler<M> = Box<dyn FnMut(&HeldBuffer<M>) -> bool>;

/// Parser state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ParserState {
    /// Passing input through.
    #[default]
    Normal,
    /// Saw `ESC`, waiting to see whether `[` follows.
    ExpectingBracket,
    /// Inside `ESC [ ...`, holding until the sequence resolves.
    InResponse,
}

impl ParserState {
    /// State name for logs and errors.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::ExpectingBracket => "ExpectingBracket",
            Self::InResponse => "InResponse",
        }
    }
}

/// Which expectation set a reply matched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchKind {
    /// A pending one-shot expectation; its callback ran and it was removed.
    Pending,
    /// A late expectation; the reply was swallowed.
    Late,
    /// A persistent expectation; its callback ran.
    Persistent,
    /// An unrequested reply swallowed by the unexpected-response hook.
    Unexpected,
}

/// Outcome of feeding one symbol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step<M> {
    /// These symbols are plain input, in order.
    PassThrough(Vec<Symbol<M>>),
    /// The symbol was held; nothing resolved yet.
    Buffering,
    /// The held content was a reply and has been consumed.
    Matched(MatchKind),
}

struct Expectation<M> {
    terminator: String,
    on_response: ResponseCallback<M>,
    on_abandoned: Option<AbandonedCallback>,
}

impl<M> Expectation<M> {
    fn matches(&self, held: &str) -> bool {
        held.ends_with(self.terminator.as_str())
    }
}

#[derive(Debug)]
struct LateExpectation {
    terminator: String,
    since: Instant,
}

/// Parser separating terminal replies from user input.
///
/// Single-threaded: owned and driven by the main loop only.
pub struct AnsiParser<M = ()> {
    state: ParserState,
    state_changed_at: Instant,
    held: HeldBuffer<M>,
    pending: Vec<Expectation<M>>,
    late: Vec<LateExpectation>,
    persistent: Vec<Expectation<M>>,
    unexpected: Option<UnexpectedHandler<M>>,
    clock: SharedClock,
}

impl<M> fmt::Debug for AnsiParser<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let terminators =
            |set: &[Expectation<M>]| set.iter().map(|e| e.terminator.clone()).collect::<Vec<_>>();
        f.debug_struct("AnsiParser")
            .field("state", &self.state)
            .field("held", &self.held.as_str())
            .field("pending", &terminators(self.pending.as_slice()))
            .field("late", &self.late)
            .field("persistent", &terminators(self.persistent.as_slice()))
            .finish_non_exhaustive()
    }
}

impl<M> Default for AnsiParser<M> {
    fn default() -> Self {
        Self::new(system_clock())
    }
}

impl<M> AnsiParser<M> {
    /// Create a parser reading time from `clock`.
    #[must_use]
    pub fn new(clock: SharedClock) -> Self {
        let now = clock.now();
        Self {
            state: ParserState::Normal,
            state_changed_at: now,
            held: HeldBuffer::new(),
            pending: Vec::new(),
            late: Vec::new(),
            persistent: Vec::new(),
            unexpected: None,
            clock,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ParserState {
        self.state
    }

    /// When the parser last changed state.
    #[must_use]
    pub fn state_changed_at(&self) -> Instant {
        self.state_changed_at
    }

    /// Content currently held.
    #[must_use]
    pub fn held(&self) -> &HeldBuffer<M> {
        &self.held
    }

    /// Register interest in a reply ending with `terminator`.
    ///
    /// One-shot (`persistent == false`) expectations are exclusive per
    /// terminator; persistent ones may coexist with a pending one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateExpectation`] if a one-shot expectation for
    /// `terminator` is already pending.
    pub fn expect_response<F>(
        &mut self,
        terminator: impl Into<String>,
        on_response: F,
        persistent: bool,
    ) -> Result<()>
    where
        F: FnMut(&HeldBuffer<M>) + 'static,
    {
        if persistent {
            self.expect_persistent(terminator, on_response);
            return Ok(());
        }
        self.push_pending(Expectation {
            terminator: terminator.into(),
            on_response: Box::new(on_response),
            on_abandoned: None,
        })
    }

    /// Register a persistent expectation. Persistent entries never collide.
    pub fn expect_persistent<F>(&mut self, terminator: impl Into<String>, on_response: F)
    where
        F: FnMut(&HeldBuffer<M>) + 'static,
    {
        let expectation = Expectation {
            terminator: terminator.into(),
            on_response: Box::new(on_response),
            on_abandoned: None,
        };
        trace!(terminator = %expectation.terminator, "expecting persistent response");
        self.persistent.push(expectation);
    }

    /// Register a one-shot expectation with a callback for when it is
    /// abandoned by [`stop_expecting`](Self::stop_expecting).
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateExpectation`] if a one-shot expectation for
    /// `terminator` is already pending.
    pub fn expect_response_or_abandon<F, A>(
        &mut self,
        terminator: impl Into<String>,
        on_response: F,
        on_abandoned: A,
    ) -> Result<()>
    where
        F: FnMut(&HeldBuffer<M>) + 'static,
        A: FnOnce() + 'static,
    {
        self.push_pending(Expectation {
            terminator: terminator.into(),
            on_response: Box::new(on_response),
            on_abandoned: Some(Box::new(on_abandoned)),
        })
    }

    fn push_pending(&mut self, expectation: Expectation<M>) -> Result<()> {
        if self.is_expecting(&expectation.terminator) {
            return Err(Error::DuplicateExpectation {
                terminator: expectation.terminator,
            });
        }
        trace!(terminator = %expectation.terminator, "expecting response");
        self.pending.push(expectation);
        Ok(())
    }

    /// Check if a one-shot reply ending with `terminator` is pending.
    #[must_use]
    pub fn is_expecting(&self, terminator: &str) -> bool {
        self.pending.iter().any(|e| e.terminator == terminator)
    }

    /// Check if a persistent expectation for `terminator` exists.
    #[must_use]
    pub fn is_expecting_persistent(&self, terminator: &str) -> bool {
        self.persistent.iter().any(|e| e.terminator == terminator)
    }

    /// Stop expecting replies ending with `terminator`.
    ///
    /// Persistent expectations are dropped. A pending one-shot expectation is
    /// moved to the late set, so a reply that still arrives is swallowed, and
    /// its abandoned callback runs. Does nothing if nothing matches.
    pub fn stop_expecting(&mut self, terminator: &str, persistent: bool) {
        if persistent {
            self.persistent.retain(|e| e.terminator != terminator);
            return;
        }

        let now = self.clock.now();
        let mut kept = Vec::with_capacity(self.pending.len());
        for expectation in std::mem::take(&mut self.pending) {
            if expectation.terminator == terminator {
                debug!(terminator, "abandoning expected response");
                self.late.push(LateExpectation {
                    terminator: expectation.terminator,
                    since: now,
                });
                if let Some(on_abandoned) = expectation.on_abandoned {
                    on_abandoned();
                }
            } else {
                kept.push(expectation);
            }
        }
        self.pending = kept;
    }

    /// Number of pending one-shot expectations.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Number of late expectations awaiting a reply to swallow.
    #[must_use]
    pub fn late_count(&self) -> usize {
        self.late.len()
    }

    /// Drop late expectations recorded more than `max_age` ago.
    ///
    /// Returns how many were dropped.
    pub fn sweep_late(&mut self, max_age: Duration) -> usize {
        let now = self.clock.now();
        let before = self.late.len();
        self.late
            .retain(|late| now.saturating_duration_since(late.since) <= max_age);
        let swept = before - self.late.len();
        if swept > 0 {
            debug!(swept, "dropped late expectations");
        }
        swept
    }

    /// Install the hook for well-formed replies that match nothing.
    pub fn set_unexpected_handler<F>(&mut self, handler: F)
    where
        F: FnMut(&HeldBuffer<M>) -> bool + 'static,
    {
        self.unexpected = Some(Box::new(handler));
    }

    /// Process symbols, returning those that are plain input.
    pub fn process<I>(&mut self, symbols: I) -> Vec<Symbol<M>>
    where
        I: IntoIterator<Item = Symbol<M>>,
    {
        let mut output = Vec::new();
        for symbol in symbols {
            if let Step::PassThrough(released) = self.feed(symbol) {
                output.extend(released);
            }
        }
        output
    }

    /// Feed a single symbol.
    pub fn feed(&mut self, symbol: Symbol<M>) -> Step<M> {
        let is_escape = symbol.ch == ESC;
        match self.state {
            ParserState::Normal => {
                if is_escape {
                    self.held.push(symbol);
                    self.set_state(ParserState::ExpectingBracket);
                    Step::Buffering
                } else {
                    Step::PassThrough(vec![symbol])
                }
            }
            ParserState::ExpectingBracket => {
                if is_escape {
                    // The earlier escape was not a sequence start.
                    let released = self.held.take();
                    self.held.push(symbol);
                    self.set_state(ParserState::ExpectingBracket);
                    Step::PassThrough(released)
                } else if symbol.ch == '[' {
                    self.held.push(symbol);
                    self.set_state(ParserState::InResponse);
                    Step::Buffering
                } else {
                    let mut released = self.held.take();
                    released.push(symbol);
                    self.set_state(ParserState::Normal);
                    Step::PassThrough(released)
                }
            }
            ParserState::InResponse => {
                if is_escape {
                    let released = self.held.take();
                    self.held.push(symbol);
                    self.set_state(ParserState::ExpectingBracket);
                    return Step::PassThrough(released);
                }
                self.held.push(symbol);
                self.resolve_held()
            }
        }
    }

    /// Decide whether held content is complete and who gets it.
    fn resolve_held(&mut self) -> Step<M> {
        let held = self.held.as_str();

        if let Some(index) = self.pending.iter().position(|e| e.matches(held)) {
            let mut expectation = self.pending.remove(index);
            trace!(response = ?self.held.as_str(), "matched expected response");
            (expectation.on_response)(&self.held);
            // A duplicate reply to the same request is swallowed, not released.
            self.late.push(LateExpectation {
                terminator: expectation.terminator,
                since: self.clock.now(),
            });
            self.reset();
            return Step::Matched(MatchKind::Pending);
        }

        if let Some(index) = self
            .late
            .iter()
            .position(|late| held.ends_with(late.terminator.as_str()))
        {
            let late = self.late.remove(index);
            debug!(terminator = %late.terminator, "swallowed late response");
            self.reset();
            return Step::Matched(MatchKind::Late);
        }

        if let Some(expectation) = self.persistent.iter_mut().find(|e| e.matches(held)) {
            trace!(response = ?self.held.as_str(), "matched persistent response");
            (expectation.on_response)(&self.held);
            self.reset();
            return Step::Matched(MatchKind::Persistent);
        }

        let well_formed = held.starts_with(CSI)
            && held.len() > CSI.len()
            && held.chars().last().is_some_and(sequences::is_known_terminator);
        if well_formed {
            if let Some(handler) = self.unexpected.as_mut() {
                if handler(&self.held) {
                    trace!(response = ?self.held.as_str(), "unexpected response swallowed");
                    self.reset();
                    return Step::Matched(MatchKind::Unexpected);
                }
            }
            trace!(sequence = ?self.held.as_str(), "releasing unrequested sequence");
            return Step::PassThrough(self.release());
        }

        if self.held.len() > MAX_HELD_LENGTH {
            debug!(len = self.held.len(), "held content too long, releasing");
            return Step::PassThrough(self.release());
        }

        Step::Buffering
    }

    /// Give up on the held content, returning it as plain input.
    pub fn release(&mut self) -> Vec<Symbol<M>> {
        let released = self.held.take();
        self.set_state(ParserState::Normal);
        released
    }

    /// Discard held content and return to `Normal`.
    pub fn reset(&mut self) {
        self.held.clear();
        self.set_state(ParserState::Normal);
    }

    fn set_state(&mut self, state: ParserState) {
        self.state = state;
        self.state_changed_at = self.clock.now();
    }
}

impl AnsiParser<()> {
    /// Process a string, returning the plain input.
    pub fn process_str(&mut self, input: &str) -> String {
        self.process(input.chars().map(Symbol::plain))
            .into_iter()
            .map(|s| s.ch)
            .collect()
    }

    /// Release held content as a string.
    pub fn release_str(&mut self) -> String {
        self.release().into_iter().map(|s| s.ch).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mainloop::clock::ManualClock;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recorder() -> (Rc<RefCell<Vec<String>>>, impl FnMut(&HeldBuffer) + 'static) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        (seen, move |held: &HeldBuffer| {
            sink.borrow_mut().push(held.to_string())
        })
    }

    #[test]
    fn test_plain_text_passes_through() {
        let mut parser: AnsiParser = AnsiParser::default();
        assert_eq!(parser.process_str("hello world"), "hello world");
        assert_eq!(parser.state(), ParserState::Normal);
    }

    #[test]
    fn test_lone_escape_is_held() {
        let mut parser: AnsiParser = AnsiParser::default();
        assert_eq!(parser.process_str("ab\x1b"), "ab");
        assert_eq!(parser.state(), ParserState::ExpectingBracket);
        assert_eq!(parser.held().as_str(), "\x1b");
        assert_eq!(parser.release_str(), "\x1b");
        assert_eq!(parser.state(), ParserState::Normal);
    }

    #[test]
    fn test_escape_not_followed_by_bracket_is_released() {
        let mut parser: AnsiParser = AnsiParser::default();
        assert_eq!(parser.process_str("\x1bx"), "\x1bx");
        assert_eq!(parser.state(), ParserState::Normal);
    }

    #[test]
    fn test_double_escape_flushes_first() {
        let mut parser: AnsiParser = AnsiParser::default();
        assert_eq!(parser.process_str("\x1b\x1b"), "\x1b");
        assert_eq!(parser.state(), ParserState::ExpectingBracket);
        assert_eq!(parser.held().as_str(), "\x1b");
    }

    #[test]
    fn test_expected_response_invokes_callback_once() {
        let mut parser: AnsiParser = AnsiParser::default();
        let (seen, callback) = recorder();
        parser.expect_response("R", callback, false).unwrap();

        assert_eq!(parser.process_str("a\x1b[12;40Rb"), "ab");
        assert_eq!(*seen.borrow(), vec!["\x1b[12;40R".to_string()]);
        assert!(!parser.is_expecting("R"));
        assert_eq!(parser.late_count(), 1);

        // A second identical reply is swallowed, not delivered.
        assert_eq!(parser.process_str("\x1b[12;40R"), "");
        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(parser.late_count(), 0);

        // A third one is nobody's and is released.
        assert_eq!(parser.process_str("\x1b[12;40R"), "\x1b[12;40R");
    }

    #[test]
    fn test_duplicate_pending_expectation_rejected() {
        let mut parser: AnsiParser = AnsiParser::default();
        parser.expect_response("R", |_| {}, false).unwrap();
        let err = parser.expect_response("R", |_| {}, false).unwrap_err();
        assert!(matches!(err, Error::DuplicateExpectation { ref terminator } if terminator == "R"));
        assert_eq!(parser.pending_count(), 1);
    }

    #[test]
    fn test_persistent_coexists_with_pending() {
        let mut parser: AnsiParser = AnsiParser::default();
        parser.expect_response("c", |_| {}, true).unwrap();
        parser.expect_response("c", |_| {}, false).unwrap();
        parser.expect_response("c", |_| {}, true).unwrap();
        assert!(parser.is_expecting("c"));
        assert!(parser.is_expecting_persistent("c"));
    }

    #[test]
    fn test_pending_wins_over_persistent() {
        let mut parser: AnsiParser = AnsiParser::default();
        let (pending_seen, pending_cb) = recorder();
        let (persistent_seen, persistent_cb) = recorder();
        parser.expect_response("c", persistent_cb, true).unwrap();
        parser.expect_response("c", pending_cb, false).unwrap();

        parser.process_str("\x1b[?1;2c");
        assert_eq!(pending_seen.borrow().len(), 1);
        assert!(persistent_seen.borrow().is_empty());

        // The duplicate of the pending reply is swallowed first.
        parser.process_str("\x1b[?1;2c");
        assert!(persistent_seen.borrow().is_empty());

        parser.process_str("\x1b[?1;2c");
        assert_eq!(persistent_seen.borrow().len(), 1);
    }

    #[test]
    fn test_persistent_expectation_is_never_removed() {
        let mut parser: AnsiParser = AnsiParser::default();
        let (seen, callback) = recorder();
        parser.expect_persistent("M", callback);
        parser.expect_persistent("m", |_| {});
        for _ in 0..3 {
            assert_eq!(parser.process_str("\x1b[<0;1;1M"), "");
        }
        assert_eq!(seen.borrow().len(), 3);
        parser.stop_expecting("M", true);
        assert!(!parser.is_expecting_persistent("M"));
        assert_eq!(parser.process_str("\x1b[<0;1;1M"), "\x1b[<0;1;1M");
    }

    #[test]
    fn test_stop_expecting_moves_to_late_and_swallows() {
        let mut parser: AnsiParser = AnsiParser::default();
        let (seen, callback) = recorder();
        let abandoned = Rc::new(RefCell::new(false));
        let flag = Rc::clone(&abandoned);
        parser
            .expect_response_or_abandon("c", callback, move || *flag.borrow_mut() = true)
            .unwrap();

        parser.stop_expecting("c", false);
        assert!(*abandoned.borrow());
        assert!(!parser.is_expecting("c"));
        assert_eq!(parser.late_count(), 1);

        assert_eq!(parser.process_str("x\x1b[?62;4cy"), "xy");
        assert!(seen.borrow().is_empty());
        assert_eq!(parser.late_count(), 0);
    }

    #[test]
    fn test_stop_expecting_unknown_is_noop() {
        let mut parser: AnsiParser = AnsiParser::default();
        parser.stop_expecting("Z", false);
        parser.stop_expecting("Z", true);
        assert_eq!(parser.late_count(), 0);
        assert_eq!(parser.pending_count(), 0);
    }

    #[test]
    fn test_unrequested_sequence_released() {
        let mut parser: AnsiParser = AnsiParser::default();
        assert_eq!(parser.process_str("\x1b[A"), "\x1b[A");
        assert_eq!(parser.process_str("\x1b[1;5C"), "\x1b[1;5C");
        assert_eq!(parser.state(), ParserState::Normal);
    }

    #[test]
    fn test_incomplete_sequence_stays_buffered() {
        let mut parser: AnsiParser = AnsiParser::default();
        assert_eq!(parser.process_str("\x1b[12;4"), "");
        assert_eq!(parser.state(), ParserState::InResponse);
        assert_eq!(parser.process_str("0R"), "\x1b[12;40R");
    }

    #[test]
    fn test_escape_inside_response_restarts() {
        let mut parser: AnsiParser = AnsiParser::default();
        assert_eq!(parser.process_str("\x1b[12\x1b[A"), "\x1b[12\x1b[A");
    }

    #[test]
    fn test_unexpected_handler_can_swallow() {
        let mut parser: AnsiParser = AnsiParser::default();
        let (seen, mut callback) = recorder();
        parser.set_unexpected_handler(move |held| {
            callback(held);
            held.as_str().ends_with('t')
        });
        assert_eq!(parser.process_str("\x1b[8;24;80t"), "");
        assert_eq!(parser.process_str("\x1b[B"), "\x1b[B");
        assert_eq!(seen.borrow().len(), 2);
    }

    #[test]
    fn test_feed_reports_steps() {
        let mut parser: AnsiParser = AnsiParser::default();
        parser.expect_response("n", |_| {}, false).unwrap();
        assert_eq!(parser.feed('\x1b'.into()), Step::Buffering);
        assert_eq!(parser.feed('['.into()), Step::Buffering);
        assert_eq!(parser.feed('0'.into()), Step::Buffering);
        assert_eq!(parser.feed('n'.into()), Step::Matched(MatchKind::Pending));
        assert_eq!(
            parser.feed('z'.into()),
            Step::PassThrough(vec![Symbol::plain('z')])
        );
    }

    #[test]
    fn test_metadata_travels_with_released_symbols() {
        let mut parser: AnsiParser<u32> = AnsiParser::default();
        let symbols = "\x1bq".chars().zip(10..).map(|(ch, n)| Symbol::new(ch, n));
        let out = parser.process(symbols);
        assert_eq!(out, vec![Symbol::new('\x1b', 10), Symbol::new('q', 11)]);
    }

    #[test]
    fn test_state_changed_at_follows_clock() {
        let clock = ManualClock::new();
        let mut parser: AnsiParser = AnsiParser::new(clock.clone());
        let start = parser.state_changed_at();
        clock.advance_ms(30);
        parser.process_str("\x1b");
        assert_eq!(parser.state_changed_at() - start, Duration::from_millis(30));
    }

    #[test]
    fn test_sweep_late_drops_old_entries() {
        let clock = ManualClock::new();
        let mut parser: AnsiParser = AnsiParser::new(clock.clone());
        parser.expect_response("c", |_| {}, false).unwrap();
        parser.stop_expecting("c", false);
        clock.advance_ms(1_000);
        assert_eq!(parser.sweep_late(Duration::from_secs(5)), 0);
        clock.advance_ms(5_000);
        assert_eq!(parser.sweep_late(Duration::from_secs(5)), 1);
        assert_eq!(parser.late_count(), 0);
    }

    #[test]
    fn test_overlong_held_content_released() {
        let mut parser: AnsiParser = AnsiParser::default();
        let mut input = String::from("\x1b[");
        input.extend(std::iter::repeat_n('1', MAX_HELD_LENGTH));
        let out = parser.process_str(&input);
        assert_eq!(out.len(), input.len());
        assert_eq!(parser.state(), ParserState::Normal);
    }
}
