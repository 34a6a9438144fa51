//! Input normalization.
//!
//! Records are fed one at a time through the ANSI parser. Mouse reports are
//! claimed by persistent expectations and run through the click interpreter;
//! everything the parser lets through is decoded into keys.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::ansi::{AnsiParser, ParserState, Step, Symbol};
use crate::input::event::InputEvent;
use crate::input::keyboard::KeyEvent;
use crate::input::keys::KeyDecoder;
use crate::input::record::{InputRecord, KeyRecord};
use crate::mainloop::clock::SharedClock;
use crate::mainloop::LoopOptions;
use crate::mouse::{ClickInterpreter, decoder};

/// Turns raw records into ordered [`InputEvent`]s.
pub struct InputProcessor<R: InputRecord> {
    parser: AnsiParser<R>,
    decoder: KeyDecoder,
    clicks: ClickInterpreter,
    mouse_reports: Rc<RefCell<VecDeque<String>>>,
    mouse_enabled: bool,
    clock: SharedClock,
    escape_timeout: Duration,
    last_input_at: Instant,
    /// Structured keys whose press was raised as-is, awaiting their release.
    held_keys: Vec<KeyEvent>,
}

impl<R: InputRecord> std::fmt::Debug for InputProcessor<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputProcessor")
            .field("parser", &self.parser)
            .field("decoder", &self.decoder)
            .field("mouse_enabled", &self.mouse_enabled)
            .finish_non_exhaustive()
    }
}

impl<R: InputRecord> InputProcessor<R> {
    /// Create a processor. Mouse reports are claimed if
    /// `options.enable_mouse` is set.
    #[must_use]
    pub fn new(clock: SharedClock, options: &LoopOptions) -> Self {
        let now = clock.now();
        let mut processor = Self {
            parser: AnsiParser::new(clock.clone()),
            decoder: KeyDecoder::new(),
            clicks: ClickInterpreter::new(clock.clone(), options.click_window),
            mouse_reports: Rc::new(RefCell::new(VecDeque::new())),
            mouse_enabled: false,
            clock,
            escape_timeout: options.escape_timeout,
            last_input_at: now,
            held_keys: Vec::new(),
        };
        processor.set_mouse_enabled(options.enable_mouse);
        processor
    }

    /// Apply new timings and mouse setting.
    pub fn reconfigure(&mut self, options: &LoopOptions) {
        self.escape_timeout = options.escape_timeout;
        self.clicks.set_click_window(options.click_window);
        self.set_mouse_enabled(options.enable_mouse);
    }

    /// The parser, for registering expectations.
    pub fn parser_mut(&mut self) -> &mut AnsiParser<R> {
        &mut self.parser
    }

    /// The parser.
    #[must_use]
    pub fn parser(&self) -> &AnsiParser<R> {
        &self.parser
    }

    /// Check if mouse reports are being claimed.
    #[must_use]
    pub fn mouse_enabled(&self) -> bool {
        self.mouse_enabled
    }

    /// Claim (or stop claiming) SGR mouse reports.
    pub fn set_mouse_enabled(&mut self, enabled: bool) {
        if enabled == self.mouse_enabled {
            return;
        }
        self.mouse_enabled = enabled;
        for terminator in [decoder::PRESS, decoder::RELEASE] {
            let terminator = terminator.to_string();
            if enabled {
                let sink = Rc::clone(&self.mouse_reports);
                self.parser.expect_persistent(terminator, move |held| {
                    sink.borrow_mut().push_back(held.to_string());
                });
            } else {
                self.parser.stop_expecting(&terminator, true);
            }
        }
        debug!(enabled, "mouse reporting");
    }

    /// Process records in order.
    pub fn process<I>(&mut self, records: I) -> Vec<InputEvent>
    where
        I: IntoIterator<Item = R>,
    {
        let mut events = Vec::new();
        for record in records {
            self.process_record(record, &mut events);
        }
        events
    }

    /// Process one record, appending the events it completes.
    ///
    /// Structured records only enter the parser as plain key presses;
    /// releases and keys no terminal sends as a character bypass it.
    pub fn process_record(&mut self, record: R, events: &mut Vec<InputEvent>) {
        self.last_input_at = self.clock.now();
        if let Some(key) = record.key_record() {
            if !(key.key_down && key.is_plain_char()) {
                self.structured_key(key, events);
                return;
            }
        }

        let symbol = Symbol::new(record.symbol(), record);
        match self.parser.feed(symbol) {
            Step::PassThrough(symbols) => {
                for symbol in symbols {
                    self.pass_through(symbol, events);
                }
            }
            Step::Matched(kind) => trace!(?kind, "response consumed"),
            Step::Buffering => {}
        }
        self.drain_mouse_reports(events);
    }

    fn structured_key(&mut self, record: KeyRecord, events: &mut Vec<InputEvent>) {
        if !record.key_down {
            // Releases of keys that were part of a sequence are covered by
            // the decoded key.
            if let Some(index) = self.held_keys.iter().position(|k| k.code == record.key.code) {
                self.held_keys.remove(index);
                events.push(InputEvent::KeyUp(record.key));
            }
            return;
        }

        // A key that is not a character ends any sequence in progress.
        for symbol in self.parser.release() {
            self.pass_through(symbol, events);
        }
        self.press_directly(record.key, events);
    }

    /// Release input held too long.
    ///
    /// A lone escape held by the parser for longer than the escape timeout is
    /// released and decoded. Incomplete key sequences in the decoder are
    /// flushed once no input arrived for the escape timeout. Content inside
    /// a CSI sequence is never timed out.
    pub fn check_timeout(&mut self) -> Vec<InputEvent> {
        let now = self.clock.now();
        let mut events = Vec::new();

        if self.decoder.has_pending()
            && now.saturating_duration_since(self.last_input_at) >= self.escape_timeout
        {
            for key in self.decoder.flush() {
                push_key(key, &mut events);
            }
        }

        if self.parser.state() == ParserState::ExpectingBracket
            && now.saturating_duration_since(self.parser.state_changed_at()) >= self.escape_timeout
        {
            trace!("escape timeout");
            for symbol in self.parser.release() {
                self.pass_through(symbol, &mut events);
            }
            for key in self.decoder.flush() {
                push_key(key, &mut events);
            }
        }
        events
    }

    /// Route one released symbol to the key decoder or straight to an event.
    fn pass_through(&mut self, symbol: Symbol<R>, events: &mut Vec<InputEvent>) {
        match symbol.meta.key_record() {
            Some(record)
                if symbol.ch != crate::ansi::sequences::ESC && !self.decoder.has_pending() =>
            {
                self.press_directly(record.key, events);
            }
            _ => {
                for key in self.decoder.push(symbol.ch) {
                    push_key(key, events);
                }
            }
        }
    }

    fn press_directly(&mut self, key: KeyEvent, events: &mut Vec<InputEvent>) {
        for key in self.decoder.flush() {
            push_key(key, events);
        }
        self.held_keys.push(key);
        events.push(InputEvent::KeyDown(key));
    }

    fn drain_mouse_reports(&mut self, events: &mut Vec<InputEvent>) {
        loop {
            let Some(report) = self.mouse_reports.borrow_mut().pop_front() else {
                break;
            };
            match decoder::parse_sgr(&report) {
                Some(event) => {
                    events.extend(self.clicks.process(event).into_iter().map(InputEvent::Mouse));
                }
                None => trace!(report = ?report, "ignoring non-SGR mouse report"),
            }
        }
    }
}

/// Byte-stream consoles never report releases, so each key is pressed and
/// released at once.
fn push_key(key: KeyEvent, events: &mut Vec<InputEvent>) {
    events.push(InputEvent::KeyDown(key));
    events.push(InputEvent::KeyUp(key));
}
