//! Click synthesis from raw press/release reports.

use std::time::{Duration, Instant};

use tracing::trace;

use crate::mainloop::clock::SharedClock;
use crate::mouse::flags::{MouseButton, MouseEvent, MouseFlags, Point};

#[derive(Clone, Copy, Debug, Default)]
struct ButtonState {
    is_down: bool,
    last_click_at: Option<Instant>,
    last_click_position: Option<Point>,
    run: u8,
}

/// Per-button press tracker turning press/release pairs into clicks.
///
/// A press within the click window of the previous click, at the same
/// position, extends the run (click, double, triple, then holds at triple).
pub struct ClickInterpreter {
    clock: SharedClock,
    click_window: Duration,
    buttons: [ButtonState; 4],
}

impl std::fmt::Debug for ClickInterpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClickInterpreter")
            .field("click_window", &self.click_window)
            .field("buttons", &self.buttons)
            .finish_non_exhaustive()
    }
}

impl ClickInterpreter {
    /// Create an interpreter with the given click window.
    #[must_use]
    pub fn new(clock: SharedClock, click_window: Duration) -> Self {
        Self {
            clock,
            click_window,
            buttons: [ButtonState::default(); 4],
        }
    }

    /// Change the click window.
    pub fn set_click_window(&mut self, click_window: Duration) {
        self.click_window = click_window;
    }

    /// Check if `button` is currently held down.
    #[must_use]
    pub fn is_down(&self, button: MouseButton) -> bool {
        self.buttons[button.index()].is_down
    }

    /// Process one raw event. The raw event comes first in the output,
    /// followed by any synthesized click.
    pub fn process(&mut self, event: MouseEvent) -> Vec<MouseEvent> {
        let now = self.clock.now();
        let mut events = vec![event];

        for button in MouseButton::ALL {
            let state = &mut self.buttons[button.index()];
            if event.flags.contains(button.pressed()) {
                if state.is_down {
                    // Drag or repeated press report.
                    continue;
                }
                let continues_run = state
                    .last_click_at
                    .is_some_and(|at| now.saturating_duration_since(at) <= self.click_window)
                    && state.last_click_position == Some(event.position);
                state.run = if continues_run {
                    (state.run + 1).min(3)
                } else {
                    1
                };
                state.is_down = true;
            } else if state.is_down && is_release_of(event.flags, button) {
                state.is_down = false;
                state.last_click_at = Some(now);
                state.last_click_position = Some(event.position);

                let flags = button.clicked(state.run) | (event.flags & MouseFlags::MODIFIERS);
                trace!(?button, run = state.run, "click");
                events.push(MouseEvent::new(flags, event.position));
            }
        }
        events
    }
}

/// A release of `button` carries its released bit, or no button or wheel
/// state at all (a bare or motion-only report).
fn is_release_of(flags: MouseFlags, button: MouseButton) -> bool {
    flags.contains(button.released())
        || (flags - MouseFlags::MODIFIERS - MouseFlags::REPORT_MOUSE_POSITION).is_empty()
}
