//! Shared fixtures for integration tests.

#![allow(dead_code)]
#![allow(clippy::nursery)] // Test infra prioritizes clarity over pedantry
#![allow(clippy::pedantic)] // Test infra prioritizes clarity over pedantry

use std::sync::Arc;
use std::time::Duration;

use termwire::{
    Application, ConsoleOutput, Coordinator, KeyEvent, LoopContext, LoopOptions, ManualClock,
    MemoryOutput, MouseEvent, Result, ScriptedSource, Size, TimeoutToken,
};
use tracing::Level;

/// How long to wait for the reader thread before failing a test.
pub const WAIT: Duration = Duration::from_secs(5);

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_target(true)
        .with_test_writer()
        .try_init();
}

/// Everything the loop raised, in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Raised {
    KeyDown(KeyEvent),
    KeyUp(KeyEvent),
    Mouse(MouseEvent),
    Timeout(TimeoutToken),
    Resize(Size),
}

/// Application that records every handler call.
#[derive(Debug, Default)]
pub struct RecordingApp {
    pub raised: Vec<Raised>,
    pub dirty: bool,
    pub frames: usize,
    pub quit_key: Option<KeyEvent>,
}

impl RecordingApp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys_down(&self) -> Vec<KeyEvent> {
        self.raised
            .iter()
            .filter_map(|r| match r {
                Raised::KeyDown(k) => Some(*k),
                _ => None,
            })
            .collect()
    }

    pub fn mouse(&self) -> Vec<MouseEvent> {
        self.raised
            .iter()
            .filter_map(|r| match r {
                Raised::Mouse(m) => Some(*m),
                _ => None,
            })
            .collect()
    }
}

impl Application<char> for RecordingApp {
    fn on_key_down(&mut self, ctx: &mut LoopContext<'_, char>, key: KeyEvent) -> Result<()> {
        self.raised.push(Raised::KeyDown(key));
        self.dirty = true;
        if self.quit_key == Some(key) {
            ctx.request_stop();
        }
        Ok(())
    }

    fn on_key_up(&mut self, _ctx: &mut LoopContext<'_, char>, key: KeyEvent) -> Result<()> {
        self.raised.push(Raised::KeyUp(key));
        Ok(())
    }

    fn on_mouse_event(
        &mut self,
        _ctx: &mut LoopContext<'_, char>,
        event: MouseEvent,
    ) -> Result<()> {
        self.raised.push(Raised::Mouse(event));
        self.dirty = true;
        Ok(())
    }

    fn on_timeout_fired(
        &mut self,
        _ctx: &mut LoopContext<'_, char>,
        token: TimeoutToken,
    ) -> Result<()> {
        self.raised.push(Raised::Timeout(token));
        Ok(())
    }

    fn on_resize(&mut self, _ctx: &mut LoopContext<'_, char>, size: Size) -> Result<()> {
        self.raised.push(Raised::Resize(size));
        self.dirty = true;
        Ok(())
    }

    fn needs_redraw(&self) -> bool {
        self.dirty
    }

    fn redraw(&mut self, output: &mut dyn ConsoleOutput) -> Result<()> {
        self.dirty = false;
        self.frames += 1;
        output.write_raw(b"[frame]")?;
        Ok(())
    }
}

/// A coordinator on a manual clock, scripted input and recorded output.
pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub input: ScriptedSource<char>,
    pub coordinator: Coordinator<char, MemoryOutput>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_options(LoopOptions::default())
    }

    pub fn with_options(options: LoopOptions) -> Self {
        init_logging();
        let clock = ManualClock::new();
        let input = ScriptedSource::new();
        let coordinator = Coordinator::with_clock(
            input.clone(),
            MemoryOutput::new(Size::new(80, 24)),
            options,
            clock.clone(),
        );
        Self {
            clock,
            input,
            coordinator,
        }
    }

    /// Create and start.
    pub fn started() -> Self {
        let mut harness = Self::new();
        harness.coordinator.start().expect("loop should start");
        harness
    }

    /// Push one batch of input and run the iteration that consumes it.
    pub fn feed(&mut self, input: &str, app: &mut RecordingApp) {
        self.input.push_str(input);
        assert!(self.coordinator.wait_for_input(WAIT), "reader produced nothing");
        self.coordinator.run_iteration(app).expect("iteration should succeed");
    }

    /// Run one iteration without new input.
    pub fn tick(&mut self, app: &mut RecordingApp) {
        self.coordinator.run_iteration(app).expect("iteration should succeed");
    }

    pub fn output(&self) -> String {
        self.coordinator.output().contents()
    }

    pub fn clear_output(&mut self) {
        self.coordinator.output_mut().clear();
    }
}
