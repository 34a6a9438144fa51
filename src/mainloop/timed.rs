//! Timed events: timeouts and "run on the main thread".
//!
//! [`TimedEvents`] is a cloneable handle; any thread may add or remove
//! entries, but callbacks only run inside [`TimedEvents::fire_due`], which the
//! main loop calls once per iteration.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::trace;

use crate::mainloop::clock::SharedClock;

/// What a timer callback wants next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerControl {
    /// Run again after the same interval.
    Continue,
    /// Remove the entry.
    Stop,
}

/// Opaque handle to a timed event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeoutToken(u64);

type TimerCallback = Box<dyn FnMut() -> TimerControl + Send>;

struct Entry {
    due: Instant,
    interval: Duration,
    // Taken out while the callback runs.
    callback: Option<TimerCallback>,
}

#[derive(Default)]
struct Inner {
    next_token: u64,
    entries: BTreeMap<u64, Entry>,
}

/// Registry of timed callbacks.
#[derive(Clone)]
pub struct TimedEvents {
    inner: Arc<Mutex<Inner>>,
    clock: SharedClock,
}

impl std::fmt::Debug for TimedEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimedEvents")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl TimedEvents {
    /// Create an empty registry.
    #[must_use]
    pub fn new(clock: SharedClock) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `callback` after `interval`, and again every `interval` for as
    /// long as it returns [`TimerControl::Continue`].
    pub fn add<F>(&self, interval: Duration, callback: F) -> TimeoutToken
    where
        F: FnMut() -> TimerControl + Send + 'static,
    {
        let due = self.clock.now() + interval;
        let mut inner = self.lock();
        let token = inner.next_token;
        inner.next_token += 1;
        inner.entries.insert(
            token,
            Entry {
                due,
                interval,
                callback: Some(Box::new(callback)),
            },
        );
        trace!(token, ?interval, "timeout added");
        TimeoutToken(token)
    }

    /// Run `action` once on the next [`fire_due`](Self::fire_due).
    pub fn invoke<F>(&self, action: F) -> TimeoutToken
    where
        F: FnOnce() + Send + 'static,
    {
        let mut action = Some(action);
        self.add(Duration::ZERO, move || {
            if let Some(action) = action.take() {
                action();
            }
            TimerControl::Stop
        })
    }

    /// Cancel an entry. Returns `false` if it does not exist.
    ///
    /// Removing an entry from inside its own callback keeps it from being
    /// rescheduled.
    pub fn remove(&self, token: TimeoutToken) -> bool {
        self.lock().entries.remove(&token.0).is_some()
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Check if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// When the earliest entry is due.
    #[must_use]
    pub fn next_due(&self) -> Option<Instant> {
        self.lock().entries.values().map(|e| e.due).min()
    }

    /// Run every callback due now, earliest first.
    ///
    /// Returns the tokens whose callbacks ran. Entries added by a callback
    /// wait for the next call.
    pub fn fire_due(&self) -> Vec<TimeoutToken> {
        let now = self.clock.now();
        let mut due: Vec<(Instant, u64)> = self
            .lock()
            .entries
            .iter()
            .filter(|(_, e)| e.due <= now && e.callback.is_some())
            .map(|(token, e)| (e.due, *token))
            .collect();
        due.sort_unstable();

        let mut fired = Vec::with_capacity(due.len());
        for (_, token) in due {
            let callback = self
                .lock()
                .entries
                .get_mut(&token)
                .and_then(|e| e.callback.take());
            // Removed by an earlier callback.
            let Some(mut callback) = callback else {
                continue;
            };

            let control = callback();
            fired.push(TimeoutToken(token));

            let mut inner = self.lock();
            if control == TimerControl::Continue {
                // A missing entry was removed by its own callback.
                if let Some(entry) = inner.entries.get_mut(&token) {
                    entry.due = now + entry.interval;
                    entry.callback = Some(callback);
                }
            } else {
                inner.entries.remove(&token);
            }
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mainloop::clock::{Clock, ManualClock};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn timers() -> (Arc<ManualClock>, TimedEvents) {
        let clock = ManualClock::new();
        let timers = TimedEvents::new(clock.clone());
        (clock, timers)
    }

    fn counter() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        (Arc::clone(&count), count)
    }

    #[test]
    fn test_one_shot_fires_once_when_due() {
        let (clock, timers) = timers();
        let (count, inner) = counter();
        let token = timers.add(Duration::from_millis(100), move || {
            inner.fetch_add(1, Ordering::SeqCst);
            TimerControl::Stop
        });

        assert!(timers.fire_due().is_empty());
        clock.advance_ms(100);
        assert_eq!(timers.fire_due(), vec![token]);
        clock.advance_ms(100);
        assert!(timers.fire_due().is_empty());
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(timers.is_empty());
    }

    #[test]
    fn test_recurring_reschedules() {
        let (clock, timers) = timers();
        let (count, inner) = counter();
        timers.add(Duration::from_millis(10), move || {
            if inner.fetch_add(1, Ordering::SeqCst) + 1 == 3 {
                TimerControl::Stop
            } else {
                TimerControl::Continue
            }
        });

        for _ in 0..5 {
            clock.advance_ms(10);
            timers.fire_due();
        }
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert!(timers.is_empty());
    }

    #[test]
    fn test_remove() {
        let (clock, timers) = timers();
        let token = timers.add(Duration::from_millis(5), || TimerControl::Stop);
        assert!(timers.remove(token));
        assert!(!timers.remove(token));
        clock.advance_ms(10);
        assert!(timers.fire_due().is_empty());
    }

    #[test]
    fn test_remove_from_own_callback_stops_reschedule() {
        let (clock, timers) = timers();
        let handle = timers.clone();
        let slot: Arc<Mutex<Option<TimeoutToken>>> = Arc::new(Mutex::new(None));
        let slot_inner = Arc::clone(&slot);
        let token = timers.add(Duration::from_millis(1), move || {
            if let Some(token) = *slot_inner.lock().unwrap() {
                handle.remove(token);
            }
            TimerControl::Continue
        });
        *slot.lock().unwrap() = Some(token);

        clock.advance_ms(1);
        assert_eq!(timers.fire_due(), vec![token]);
        assert!(timers.is_empty());
    }

    #[test]
    fn test_invoke_from_other_thread() {
        let (_clock, timers) = timers();
        let (count, inner) = counter();
        let handle = timers.clone();
        std::thread::spawn(move || {
            handle.invoke(move || {
                inner.fetch_add(1, Ordering::SeqCst);
            });
        })
        .join()
        .unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(timers.fire_due().len(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(timers.is_empty());
    }

    #[test]
    fn test_fires_in_due_order_and_next_due() {
        let (clock, timers) = timers();
        let start = clock.now();
        let late = timers.add(Duration::from_millis(30), || TimerControl::Stop);
        let early = timers.add(Duration::from_millis(10), || TimerControl::Stop);
        assert_eq!(timers.next_due(), Some(start + Duration::from_millis(10)));

        clock.advance_ms(30);
        assert_eq!(timers.fire_due(), vec![early, late]);
        assert_eq!(timers.next_due(), None);
    }

    #[test]
    fn test_callback_may_add_entries() {
        let (clock, timers) = timers();
        let handle = timers.clone();
        timers.add(Duration::ZERO, move || {
            handle.add(Duration::ZERO, || TimerControl::Stop);
            TimerControl::Stop
        });
        assert_eq!(timers.fire_due().len(), 1);
        assert_eq!(timers.len(), 1);
        clock.advance_ms(1);
        assert_eq!(timers.fire_due().len(), 1);
    }

    #[test]
    fn test_timed_events_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TimedEvents>();
    }
}
