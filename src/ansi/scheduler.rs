//! Throttled dispatch of terminal queries.
//!
//! At most one request per terminator is in flight. A request is sent
//! immediately when possible, otherwise queued and retried from the main loop.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::ansi::held::HeldBuffer;
use crate::ansi::parser::AnsiParser;
use crate::ansi::request::AnsiRequest;
use crate::error::Result;
use crate::mainloop::clock::SharedClock;
use crate::mainloop::LoopOptions;
use crate::terminal::ConsoleOutput;

/// Request queue with per-terminator throttling and stale eviction.
pub struct RequestScheduler {
    clock: SharedClock,
    throttle: Duration,
    stale_after: Duration,
    schedule_interval: Duration,
    last_send: HashMap<String, Instant>,
    queued: VecDeque<(AnsiRequest, Instant)>,
    last_run: Option<Instant>,
}

impl std::fmt::Debug for RequestScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestScheduler")
            .field("throttle", &self.throttle)
            .field("stale_after", &self.stale_after)
            .field("schedule_interval", &self.schedule_interval)
            .field("queued", &self.queued.len())
            .finish_non_exhaustive()
    }
}

impl RequestScheduler {
    /// Create a scheduler with timings from `options`.
    #[must_use]
    pub fn new(clock: SharedClock, options: &LoopOptions) -> Self {
        Self {
            clock,
            throttle: options.throttle,
            stale_after: options.stale_after,
            schedule_interval: options.schedule_interval,
            last_send: HashMap::new(),
            queued: VecDeque::new(),
            last_run: None,
        }
    }

    /// Apply new timings. Queued requests are kept.
    pub fn reconfigure(&mut self, options: &LoopOptions) {
        self.throttle = options.throttle;
        self.stale_after = options.stale_after;
        self.schedule_interval = options.schedule_interval;
    }

    /// Number of requests waiting to be sent.
    #[must_use]
    pub fn queued_count(&self) -> usize {
        self.queued.len()
    }

    /// When a request for `terminator` was last sent.
    #[must_use]
    pub fn last_send(&self, terminator: &str) -> Option<Instant> {
        self.last_send.get(terminator).copied()
    }

    /// Send `request` now if allowed, otherwise queue it.
    ///
    /// Returns `true` if the request was written.
    ///
    /// # Errors
    ///
    /// Returns an error if writing the request fails.
    pub fn send_or_schedule<M: 'static>(
        &mut self,
        request: AnsiRequest,
        parser: &mut AnsiParser<M>,
        output: &mut dyn ConsoleOutput,
    ) -> Result<bool> {
        if self.can_send(&request.terminator, parser) {
            self.send(request, parser, output)?;
            return Ok(true);
        }
        trace!(terminator = %request.terminator, "request queued");
        let now = self.clock.now();
        self.queued.push_back((request, now));
        Ok(false)
    }

    /// Try to send the first sendable queued request.
    ///
    /// Unless `force` is set, does nothing if the previous run was less than
    /// the schedule interval ago. Returns `true` if a request was written.
    ///
    /// # Errors
    ///
    /// Returns an error if writing the request fails.
    pub fn run_schedule<M: 'static>(
        &mut self,
        force: bool,
        parser: &mut AnsiParser<M>,
        output: &mut dyn ConsoleOutput,
    ) -> Result<bool> {
        let now = self.clock.now();
        if !force
            && self
                .last_run
                .is_some_and(|last| now.saturating_duration_since(last) < self.schedule_interval)
        {
            return Ok(false);
        }
        self.last_run = Some(now);

        let mut index = 0;
        while index < self.queued.len() {
            let terminator = self.queued[index].0.terminator.clone();
            if self.can_send(&terminator, parser) {
                if let Some((request, _)) = self.queued.remove(index) {
                    self.send(request, parser, output)?;
                    return Ok(true);
                }
            }
            index += 1;
        }
        Ok(false)
    }

    /// Check throttle and in-flight state, evicting a stale expectation.
    fn can_send<M>(&mut self, terminator: &str, parser: &mut AnsiParser<M>) -> bool {
        let now = self.clock.now();
        let last = self.last_send.get(terminator).copied();

        if last.is_some_and(|last| now.saturating_duration_since(last) < self.throttle) {
            return false;
        }

        if !parser.is_expecting(terminator) {
            return true;
        }

        match last {
            Some(last) if now.saturating_duration_since(last) > self.stale_after => {
                debug!(terminator, "evicting stale request");
                parser.stop_expecting(terminator, false);
                true
            }
            _ => false,
        }
    }

    /// Register the expectation, then write the request.
    fn send<M: 'static>(
        &mut self,
        request: AnsiRequest,
        parser: &mut AnsiParser<M>,
        output: &mut dyn ConsoleOutput,
    ) -> Result<()> {
        let AnsiRequest {
            request: bytes,
            terminator,
            on_response,
            on_abandoned,
        } = request;

        let mut on_response = Some(on_response);
        let deliver = move |held: &HeldBuffer<M>| {
            if let Some(callback) = on_response.take() {
                callback(held.as_str());
            }
        };
        match on_abandoned {
            Some(on_abandoned) => {
                parser.expect_response_or_abandon(terminator.clone(), deliver, on_abandoned)?;
            }
            None => parser.expect_response(terminator.clone(), deliver, false)?,
        }

        self.last_send.insert(terminator.clone(), self.clock.now());
        debug!(terminator = %terminator, request = ?bytes, "sending request");
        if let Err(err) = output.write_raw(bytes.as_bytes()) {
            parser.stop_expecting(&terminator, false);
            return Err(err.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mainloop::clock::ManualClock;
    use crate::terminal::MemoryOutput;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Fixture {
        clock: std::sync::Arc<ManualClock>,
        parser: AnsiParser,
        scheduler: RequestScheduler,
        output: MemoryOutput,
    }

    fn fixture() -> Fixture {
        let clock = ManualClock::new();
        let parser = AnsiParser::new(clock.clone());
        let scheduler = RequestScheduler::new(clock.clone(), &LoopOptions::default());
        Fixture {
            clock,
            parser,
            scheduler,
            output: MemoryOutput::default(),
        }
    }

    fn cursor_request(log: &Rc<RefCell<Vec<String>>>) -> AnsiRequest {
        let log = Rc::clone(log);
        AnsiRequest::cursor_position(move |reply| log.borrow_mut().push(reply.to_string()))
    }

    #[test]
    fn test_first_request_sent_immediately() {
        let mut f = fixture();
        let log = Rc::new(RefCell::new(Vec::new()));
        let sent = f
            .scheduler
            .send_or_schedule(cursor_request(&log), &mut f.parser, &mut f.output)
            .unwrap();
        assert!(sent);
        assert_eq!(f.output.contents(), "\x1b[6n");
        assert!(f.parser.is_expecting("R"));

        assert_eq!(f.parser.process_str("\x1b[3;7R"), "");
        assert_eq!(*log.borrow(), vec!["\x1b[3;7R".to_string()]);
    }

    #[test]
    fn test_second_request_within_throttle_is_queued() {
        let mut f = fixture();
        let log = Rc::new(RefCell::new(Vec::new()));
        f.scheduler
            .send_or_schedule(cursor_request(&log), &mut f.parser, &mut f.output)
            .unwrap();
        f.parser.process_str("\x1b[1;1R");

        f.clock.advance_ms(50);
        let sent = f
            .scheduler
            .send_or_schedule(cursor_request(&log), &mut f.parser, &mut f.output)
            .unwrap();
        assert!(!sent);
        assert_eq!(f.scheduler.queued_count(), 1);
        assert_eq!(f.output.write_count(), 1);

        // Throttle still active.
        assert!(!f.scheduler.run_schedule(true, &mut f.parser, &mut f.output).unwrap());

        f.clock.advance_ms(60);
        assert!(f.scheduler.run_schedule(true, &mut f.parser, &mut f.output).unwrap());
        assert_eq!(f.scheduler.queued_count(), 0);
        assert_eq!(f.output.write_count(), 2);
    }

    #[test]
    fn test_outstanding_request_blocks_until_stale() {
        let mut f = fixture();
        let log = Rc::new(RefCell::new(Vec::new()));
        let abandoned = Rc::new(RefCell::new(false));
        let flag = Rc::clone(&abandoned);
        let first = cursor_request(&log).on_abandoned(move || *flag.borrow_mut() = true);
        f.scheduler
            .send_or_schedule(first, &mut f.parser, &mut f.output)
            .unwrap();

        f.clock.advance_ms(200);
        assert!(!f
            .scheduler
            .send_or_schedule(cursor_request(&log), &mut f.parser, &mut f.output)
            .unwrap());

        f.clock.advance(Duration::from_secs(5));
        assert!(f.scheduler.run_schedule(true, &mut f.parser, &mut f.output).unwrap());
        assert!(*abandoned.borrow());
        assert_eq!(f.parser.late_count(), 1);
        assert!(f.parser.is_expecting("R"));
        assert_eq!(f.output.write_count(), 2);
    }

    #[test]
    fn test_run_schedule_self_throttles() {
        let mut f = fixture();
        assert!(!f.scheduler.run_schedule(false, &mut f.parser, &mut f.output).unwrap());

        let log = Rc::new(RefCell::new(Vec::new()));
        f.scheduler
            .send_or_schedule(cursor_request(&log), &mut f.parser, &mut f.output)
            .unwrap();
        f.parser.process_str("\x1b[1;1R");
        f.scheduler
            .send_or_schedule(cursor_request(&log), &mut f.parser, &mut f.output)
            .unwrap();

        f.clock.advance_ms(150);
        // Last run was 150ms ago, so this one proceeds.
        assert!(f.scheduler.run_schedule(false, &mut f.parser, &mut f.output).unwrap());
    }

    #[test]
    fn test_run_schedule_skips_when_called_too_soon() {
        let mut f = fixture();
        let log = Rc::new(RefCell::new(Vec::new()));
        f.scheduler
            .send_or_schedule(cursor_request(&log), &mut f.parser, &mut f.output)
            .unwrap();
        f.parser.process_str("\x1b[1;1R");
        f.scheduler
            .send_or_schedule(cursor_request(&log), &mut f.parser, &mut f.output)
            .unwrap();

        f.clock.advance_ms(10);
        assert!(!f.scheduler.run_schedule(false, &mut f.parser, &mut f.output).unwrap());

        // Throttle has passed, but the previous run was only 95ms ago.
        f.clock.advance_ms(95);
        assert!(!f.scheduler.run_schedule(false, &mut f.parser, &mut f.output).unwrap());
        assert!(f.scheduler.run_schedule(true, &mut f.parser, &mut f.output).unwrap());
    }

    #[test]
    fn test_different_terminators_are_independent() {
        let mut f = fixture();
        let log = Rc::new(RefCell::new(Vec::new()));
        assert!(f
            .scheduler
            .send_or_schedule(cursor_request(&log), &mut f.parser, &mut f.output)
            .unwrap());
        assert!(f
            .scheduler
            .send_or_schedule(AnsiRequest::device_attributes(|_| {}), &mut f.parser, &mut f.output)
            .unwrap());
        assert_eq!(f.output.contents(), "\x1b[6n\x1b[0c");
    }

    #[test]
    fn test_queue_is_fifo_per_sendability() {
        let mut f = fixture();
        let order = Rc::new(RefCell::new(Vec::new()));
        f.scheduler
            .send_or_schedule(AnsiRequest::cursor_position(|_| {}), &mut f.parser, &mut f.output)
            .unwrap();
        f.scheduler
            .send_or_schedule(AnsiRequest::text_area_size(|_| {}), &mut f.parser, &mut f.output)
            .unwrap();
        f.parser.process_str("\x1b[1;1R\x1b[8;24;80t");

        for name in ["first", "second"] {
            let order = Rc::clone(&order);
            let req = AnsiRequest::new("\x1b[6n", "R", move |_| order.borrow_mut().push(name));
            f.scheduler
                .send_or_schedule(req, &mut f.parser, &mut f.output)
                .unwrap();
        }
        assert_eq!(f.scheduler.queued_count(), 2);

        f.clock.advance_ms(150);
        assert!(f.scheduler.run_schedule(true, &mut f.parser, &mut f.output).unwrap());
        f.parser.process_str("\x1b[2;2R");
        assert_eq!(*order.borrow(), vec!["first"]);
    }

    #[test]
    fn test_write_failure_clears_expectation() {
        let mut f = fixture();
        f.output.set_fail_writes(true);
        let err = f
            .scheduler
            .send_or_schedule(AnsiRequest::cursor_position(|_| {}), &mut f.parser, &mut f.output)
            .unwrap_err();
        assert!(matches!(err, crate::error::Error::Io(_)));
        assert!(!f.parser.is_expecting("R"));
    }
}
