//! The main-loop coordinator.
//!
//! One [`Coordinator`] owns the whole single-threaded core: the input
//! processor (parser, key decoder, click interpreter), the request scheduler,
//! the timed-event registry and the console output. The only other thread is
//! the reader, which forwards raw records over a channel.
//!
//! # Example
//!
//! ```no_run
//! use termwire::{Application, Coordinator, KeyEvent, LoopContext, LoopOptions, Result};
//! use termwire::terminal::{StdinSource, TerminalOutput};
//!
//! struct Quit;
//!
//! impl Application<char> for Quit {
//!     fn on_key_down(&mut self, ctx: &mut LoopContext<'_, char>, key: KeyEvent) -> Result<()> {
//!         if key.is_ctrl_c() {
//!             ctx.request_stop();
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let mut coordinator = Coordinator::new(
//!     StdinSource::new(),
//!     TerminalOutput::stdout(),
//!     LoopOptions::default(),
//! );
//! coordinator.run(&mut Quit)?;
//! # Ok::<(), termwire::Error>(())
//! ```

use std::collections::VecDeque;
use std::thread;
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::ansi::{AnsiParser, AnsiRequest, HeldBuffer, RequestScheduler, sequences};
use crate::error::{Error, Result};
use crate::input::{InputEvent, InputProcessor, InputRecord, KeyEvent};
use crate::mainloop::clock::{SharedClock, system_clock};
use crate::mainloop::options::LoopOptions;
use crate::mainloop::source::{InputSource, Reader, ReaderMessage};
use crate::mainloop::timed::{TimedEvents, TimeoutToken};
use crate::mouse::MouseEvent;
use crate::terminal::{ConsoleOutput, Size, TerminalOutput};

/// Coordinator lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LoopState {
    /// Constructed, reader not started.
    Created,
    /// Reader spawned, waiting for readiness.
    Starting,
    /// Iterations may run.
    Running,
    /// Reader being cancelled and joined.
    Stopping,
    /// Terminal state. A stopped coordinator cannot be restarted.
    Stopped,
}

impl LoopState {
    /// State name for messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Created => "Created",
            Self::Starting => "Starting",
            Self::Running => "Running",
            Self::Stopping => "Stopping",
            Self::Stopped => "Stopped",
        }
    }
}

/// Handlers raised by the loop.
///
/// Every method has an empty default. An error returned by a handler ends
/// the current iteration and is returned from
/// [`Coordinator::run_iteration`].
#[allow(unused_variables)]
pub trait Application<R: InputRecord = char> {
    /// A key was pressed.
    fn on_key_down(&mut self, ctx: &mut LoopContext<'_, R>, key: KeyEvent) -> Result<()> {
        Ok(())
    }

    /// A key was released.
    fn on_key_up(&mut self, ctx: &mut LoopContext<'_, R>, key: KeyEvent) -> Result<()> {
        Ok(())
    }

    /// Raw or synthesized mouse event.
    fn on_mouse_event(&mut self, ctx: &mut LoopContext<'_, R>, event: MouseEvent) -> Result<()> {
        Ok(())
    }

    /// A timed event ran.
    fn on_timeout_fired(
        &mut self,
        ctx: &mut LoopContext<'_, R>,
        token: TimeoutToken,
    ) -> Result<()> {
        Ok(())
    }

    /// The window size changed.
    fn on_resize(&mut self, ctx: &mut LoopContext<'_, R>, size: Size) -> Result<()> {
        Ok(())
    }

    /// Whether [`redraw`](Self::redraw) should run this iteration.
    fn needs_redraw(&self) -> bool {
        false
    }

    /// Draw. Called at most once per iteration.
    fn redraw(&mut self, output: &mut dyn ConsoleOutput) -> Result<()> {
        Ok(())
    }
}

/// Outbound surface handed to handlers.
pub struct LoopContext<'a, R: InputRecord> {
    parser: &'a mut AnsiParser<R>,
    scheduler: &'a mut RequestScheduler,
    output: &'a mut dyn ConsoleOutput,
    timers: &'a TimedEvents,
    stop_requested: &'a mut bool,
}

impl<R: InputRecord> std::fmt::Debug for LoopContext<'_, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopContext")
            .field("parser", &self.parser)
            .field("stop_requested", &self.stop_requested)
            .finish_non_exhaustive()
    }
}

impl<R: InputRecord> LoopContext<'_, R> {
    /// Send a request now, or queue it behind the throttle.
    ///
    /// # Errors
    ///
    /// Returns an error if writing the request fails.
    pub fn send_or_schedule(&mut self, request: AnsiRequest) -> Result<bool> {
        self.scheduler
            .send_or_schedule(request, &mut *self.parser, &mut *self.output)
    }

    /// Try to send a queued request. See [`RequestScheduler::run_schedule`].
    ///
    /// # Errors
    ///
    /// Returns an error if writing the request fails.
    pub fn run_schedule(&mut self, force: bool) -> Result<bool> {
        self.scheduler
            .run_schedule(force, &mut *self.parser, &mut *self.output)
    }

    /// Register a reply handler. See [`AnsiParser::expect_response`].
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
        F: FnMut(&HeldBuffer<R>) + 'static,
    {
        self.parser.expect_response(terminator, on_response, persistent)
    }

    /// Remove an expectation. No-op if none is registered.
    pub fn stop_expecting(&mut self, terminator: &str, persistent: bool) {
        self.parser.stop_expecting(terminator, persistent);
    }

    /// Check if a one-shot reply ending with `terminator` is pending.
    #[must_use]
    pub fn is_expecting(&self, terminator: &str) -> bool {
        self.parser.is_expecting(terminator)
    }

    /// Write raw bytes to the console.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.output.write_raw(bytes)?;
        Ok(())
    }

    /// Current window size.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be read.
    pub fn window_size(&mut self) -> Result<Size> {
        Ok(self.output.window_size()?)
    }

    /// The timed-event registry. Clone it to hand to other threads.
    #[must_use]
    pub fn timers(&self) -> &TimedEvents {
        self.timers
    }

    /// Stop the loop at the end of the current iteration.
    pub fn request_stop(&mut self) {
        *self.stop_requested = true;
    }
}

/// Owns the loop and drives it one iteration at a time.
pub struct Coordinator<R: InputRecord = char, O: ConsoleOutput = TerminalOutput> {
    state: LoopState,
    source: Option<Box<dyn InputSource<Record = R>>>,
    reader: Option<Reader<R>>,
    output: O,
    processor: InputProcessor<R>,
    // Decoded events a failing handler left behind, delivered first next time.
    undispatched: VecDeque<InputEvent>,
    scheduler: RequestScheduler,
    timers: TimedEvents,
    clock: SharedClock,
    options: LoopOptions,
    last_size: Option<Size>,
    mouse_reporting: bool,
    stop_requested: bool,
}

impl<R: InputRecord, O: ConsoleOutput> std::fmt::Debug for Coordinator<R, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("state", &self.state)
            .field("options", &self.options)
            .field("processor", &self.processor)
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

impl<R: InputRecord, O: ConsoleOutput> Coordinator<R, O> {
    /// Create a coordinator on the system clock.
    pub fn new<S>(source: S, output: O, options: LoopOptions) -> Self
    where
        S: InputSource<Record = R>,
    {
        Self::with_clock(source, output, options, system_clock())
    }

    /// Create a coordinator reading time from `clock`.
    pub fn with_clock<S>(source: S, output: O, options: LoopOptions, clock: SharedClock) -> Self
    where
        S: InputSource<Record = R>,
    {
        Self {
            state: LoopState::Created,
            source: Some(Box::new(source)),
            reader: None,
            output,
            processor: InputProcessor::new(clock.clone(), &options),
            undispatched: VecDeque::new(),
            scheduler: RequestScheduler::new(clock.clone(), &options),
            timers: TimedEvents::new(clock.clone()),
            clock,
            options,
            last_size: None,
            mouse_reporting: false,
            stop_requested: false,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Active options.
    #[must_use]
    pub fn options(&self) -> &LoopOptions {
        &self.options
    }

    /// The console output.
    #[must_use]
    pub fn output(&self) -> &O {
        &self.output
    }

    /// The console output, mutably.
    pub fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }

    /// The ANSI parser.
    #[must_use]
    pub fn parser(&self) -> &AnsiParser<R> {
        self.processor.parser()
    }

    /// The request scheduler.
    #[must_use]
    pub fn scheduler(&self) -> &RequestScheduler {
        &self.scheduler
    }

    /// The timed-event registry.
    #[must_use]
    pub fn timers(&self) -> &TimedEvents {
        &self.timers
    }

    /// The outbound surface, for use outside handlers.
    pub fn context(&mut self) -> LoopContext<'_, R> {
        LoopContext {
            parser: self.processor.parser_mut(),
            scheduler: &mut self.scheduler,
            output: &mut self.output,
            timers: &self.timers,
            stop_requested: &mut self.stop_requested,
        }
    }

    fn transition(&mut self, to: LoopState) {
        debug!(from = self.state.name(), to = to.name(), "loop state");
        self.state = to;
    }

    fn invalid(&self, operation: &'static str) -> Error {
        Error::InvalidState {
            operation,
            state: self.state.name(),
        }
    }

    /// Spawn the reader and wait for it to become ready.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless the loop is `Created`,
    /// [`Error::ReaderFailed`] or [`Error::ReaderNotReady`] if the reader
    /// could not start (the loop is then `Stopped`), or an I/O error if
    /// enabling mouse reporting fails.
    pub fn start(&mut self) -> Result<()> {
        if self.state != LoopState::Created {
            return Err(self.invalid("start"));
        }
        let Some(source) = self.source.take() else {
            return Err(self.invalid("start"));
        };
        self.transition(LoopState::Starting);

        let mut reader = match Reader::spawn(source) {
            Ok(reader) => reader,
            Err(e) => {
                self.transition(LoopState::Stopped);
                return Err(e.into());
            }
        };
        if let Err(e) = reader.wait_ready(self.options.ready_timeout) {
            warn!(error = %e, "input reader did not start");
            reader.shutdown();
            self.transition(LoopState::Stopped);
            return Err(e);
        }
        self.reader = Some(reader);
        self.transition(LoopState::Running);

        self.last_size = self.output.window_size().ok();
        if self.options.enable_mouse {
            self.set_mouse_reporting(true)?;
        }
        Ok(())
    }

    /// Run one iteration without blocking.
    ///
    /// Delivers events a failed handler left queued, drains the reader queue
    /// and dispatches the resulting events in order, releases timed-out
    /// escapes, runs the request schedule, sweeps late expectations, fires
    /// due timers, raises a resize, redraws if the application asks for it,
    /// and finally stops the loop if a handler requested it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless the loop is `Running`,
    /// [`Error::ReaderFailed`] once every record read before a reader failure
    /// was dispatched, and any error from a handler or the output.
    pub fn run_iteration<A>(&mut self, app: &mut A) -> Result<()>
    where
        A: Application<R> + ?Sized,
    {
        if self.state != LoopState::Running {
            return Err(self.invalid("run an iteration"));
        }

        self.dispatch(app, Vec::new())?;

        let mut failure = None;
        while let Some(message) = self.reader.as_mut().and_then(Reader::try_next) {
            match message {
                ReaderMessage::Records(records) => {
                    trace!(count = records.len(), "records received");
                    let events = self.processor.process(records);
                    self.dispatch(app, events)?;
                }
                ReaderMessage::Failed(msg) => {
                    failure = Some(msg);
                    break;
                }
                ReaderMessage::Ready => {}
            }
        }
        if let Some(msg) = failure {
            if let Some(mut reader) = self.reader.take() {
                reader.shutdown();
            }
            return Err(Error::ReaderFailed(msg));
        }

        let events = self.processor.check_timeout();
        self.dispatch(app, events)?;

        self.scheduler
            .run_schedule(false, self.processor.parser_mut(), &mut self.output)?;
        self.processor
            .parser_mut()
            .sweep_late(self.options.late_response_ttl);

        for token in self.timers.fire_due() {
            app.on_timeout_fired(&mut self.context(), token)?;
        }

        self.poll_window_size(app)?;

        if app.needs_redraw() {
            app.redraw(&mut self.output)?;
        }

        if self.stop_requested {
            self.stop()?;
        }
        Ok(())
    }

    /// Start if needed, then run iterations until the loop stops.
    ///
    /// Between iterations it waits for input, at most until the next timer is
    /// due and never longer than the tick.
    ///
    /// # Errors
    ///
    /// Returns the first error from [`start`](Self::start) or
    /// [`run_iteration`](Self::run_iteration). The loop is left running so
    /// the caller may stop it or retry.
    pub fn run<A>(&mut self, app: &mut A) -> Result<()>
    where
        A: Application<R> + ?Sized,
    {
        if self.state == LoopState::Created {
            self.start()?;
        }
        while self.state == LoopState::Running {
            self.run_iteration(app)?;
            if self.state != LoopState::Running {
                break;
            }
            let wait = self.timers.next_due().map_or(self.options.tick, |due| {
                due.saturating_duration_since(self.clock.now())
                    .min(self.options.tick)
            });
            self.wait_for_input(wait);
        }
        Ok(())
    }

    /// Block until the reader has something or `timeout` elapses.
    ///
    /// Returns `true` if the next iteration has input to process.
    pub fn wait_for_input(&mut self, timeout: Duration) -> bool {
        match self.reader.as_mut() {
            Some(reader) => reader.wait(timeout),
            None => {
                thread::sleep(timeout);
                false
            }
        }
    }

    /// Cancel and join the reader and disable mouse reporting.
    ///
    /// Stopping a stopped loop is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if disabling mouse reporting fails. The loop is
    /// `Stopped` either way.
    pub fn stop(&mut self) -> Result<()> {
        match self.state {
            LoopState::Stopping | LoopState::Stopped => return Ok(()),
            LoopState::Created => {
                self.transition(LoopState::Stopped);
                return Ok(());
            }
            LoopState::Starting | LoopState::Running => {}
        }
        self.transition(LoopState::Stopping);
        if let Some(mut reader) = self.reader.take() {
            reader.shutdown();
        }
        let result = if self.mouse_reporting {
            self.set_mouse_reporting(false)
        } else {
            Ok(())
        };
        self.stop_requested = false;
        self.transition(LoopState::Stopped);
        result
    }

    /// Apply new options.
    ///
    /// Timings take effect at the next iteration. Toggling `enable_mouse`
    /// on a running loop switches terminal mouse reporting right away.
    ///
    /// # Errors
    ///
    /// Returns an error if switching mouse reporting fails.
    pub fn reload(&mut self, options: LoopOptions) -> Result<()> {
        self.processor.reconfigure(&options);
        self.scheduler.reconfigure(&options);
        let enable_mouse = options.enable_mouse;
        self.options = options;
        debug!(options = ?self.options, "options reloaded");

        if self.state == LoopState::Running && enable_mouse != self.mouse_reporting {
            self.set_mouse_reporting(enable_mouse)?;
        }
        Ok(())
    }

    fn set_mouse_reporting(&mut self, on: bool) -> Result<()> {
        let sequence = if on {
            sequences::MOUSE_ON
        } else {
            sequences::MOUSE_OFF
        };
        self.output.write_raw(sequence.as_bytes())?;
        self.mouse_reporting = on;
        Ok(())
    }

    /// Queue `events` behind anything left over, then deliver in order. A
    /// handler error stops delivery; the rest stays queued.
    fn dispatch<A>(&mut self, app: &mut A, events: Vec<InputEvent>) -> Result<()>
    where
        A: Application<R> + ?Sized,
    {
        self.undispatched.extend(events);
        while let Some(event) = self.undispatched.pop_front() {
            let mut ctx = self.context();
            match event {
                InputEvent::KeyDown(key) => app.on_key_down(&mut ctx, key)?,
                InputEvent::KeyUp(key) => app.on_key_up(&mut ctx, key)?,
                InputEvent::Mouse(mouse) => app.on_mouse_event(&mut ctx, mouse)?,
            }
        }
        Ok(())
    }

    fn poll_window_size<A>(&mut self, app: &mut A) -> Result<()>
    where
        A: Application<R> + ?Sized,
    {
        match self.output.window_size() {
            Ok(size) if self.last_size != Some(size) => {
                debug!(width = size.width, height = size.height, "window resized");
                self.last_size = Some(size);
                app.on_resize(&mut self.context(), size)
            }
            Ok(_) => Ok(()),
            Err(e) => {
                trace!(error = %e, "window size unavailable");
                Ok(())
            }
        }
    }
}

impl<R: InputRecord, O: ConsoleOutput> Drop for Coordinator<R, O> {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!(error = %e, "failed to restore console on drop");
        }
    }
}
