//! Input sources and the reader thread.
//!
//! A source is moved onto a dedicated thread that does nothing but block in
//! [`InputSource::read`] and forward raw records over a channel. All parsing
//! happens on the consumer side.

use std::collections::VecDeque;
use std::io;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::input::InputRecord;

/// Shared flag telling the reader thread to exit.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Create an uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A blocking producer of raw console records.
///
/// Sources run on the reader thread and are dropped there, so console state
/// changed in [`open`](Self::open) should be restored by the source's `Drop`.
pub trait InputSource: Send + 'static {
    /// Record type produced.
    type Record: InputRecord;

    /// Prepare the console. Called once on the reader thread before the
    /// first read; readiness is signalled after it returns.
    ///
    /// # Errors
    ///
    /// Returns an error if the console cannot be set up.
    fn open(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Block until records arrive or a short wait elapses.
    ///
    /// An empty result means nothing was read; the reader checks `cancel`
    /// and reads again.
    ///
    /// # Errors
    ///
    /// Returns an error if the console can no longer be read, including end
    /// of input.
    fn read(&mut self, cancel: &CancellationToken) -> io::Result<Vec<Self::Record>>;
}

impl<S: InputSource + ?Sized> InputSource for Box<S> {
    type Record = S::Record;

    fn open(&mut self) -> io::Result<()> {
        (**self).open()
    }

    fn read(&mut self, cancel: &CancellationToken) -> io::Result<Vec<Self::Record>> {
        (**self).read(cancel)
    }
}

/// Message from the reader thread.
#[derive(Debug)]
pub(crate) enum ReaderMessage<R> {
    Ready,
    Records(Vec<R>),
    Failed(String),
}

/// Handle to a running reader thread.
pub(crate) struct Reader<R> {
    rx: Receiver<ReaderMessage<R>>,
    // Messages received while waiting, not yet consumed.
    stash: VecDeque<ReaderMessage<R>>,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl<R: InputRecord> Reader<R> {
    /// Move `source` onto a new reader thread.
    pub(crate) fn spawn<S>(source: S) -> io::Result<Self>
    where
        S: InputSource<Record = R>,
    {
        let (tx, rx) = mpsc::channel();
        let cancel = CancellationToken::new();
        let thread_cancel = cancel.clone();
        let handle = thread::Builder::new()
            .name("termwire-reader".to_string())
            .spawn(move || reader_main(source, &tx, &thread_cancel))?;
        Ok(Self {
            rx,
            stash: VecDeque::new(),
            cancel,
            handle: Some(handle),
        })
    }

    /// Wait for the readiness signal.
    pub(crate) fn wait_ready(&mut self, timeout: Duration) -> Result<()> {
        match self.rx.recv_timeout(timeout) {
            Ok(ReaderMessage::Ready) => Ok(()),
            Ok(ReaderMessage::Failed(msg)) => Err(Error::ReaderFailed(msg)),
            Ok(message @ ReaderMessage::Records(_)) => {
                self.stash.push_back(message);
                Ok(())
            }
            Err(RecvTimeoutError::Timeout) => Err(Error::ReaderNotReady),
            Err(RecvTimeoutError::Disconnected) => {
                Err(Error::ReaderFailed("reader exited during startup".to_string()))
            }
        }
    }

    /// Block until a message is available or `timeout` elapses.
    ///
    /// Returns `true` if a message is ready for [`try_next`](Self::try_next).
    pub(crate) fn wait(&mut self, timeout: Duration) -> bool {
        if !self.stash.is_empty() {
            return true;
        }
        match self.rx.recv_timeout(timeout) {
            Ok(message) => {
                self.stash.push_back(message);
                true
            }
            Err(_) => false,
        }
    }

    /// Next message without blocking.
    pub(crate) fn try_next(&mut self) -> Option<ReaderMessage<R>> {
        if let Some(message) = self.stash.pop_front() {
            return Some(message);
        }
        match self.rx.try_recv() {
            Ok(message) => Some(message),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Cancel the reader and wait for it to exit.
    ///
    /// Returns after at most one pending read.
    pub(crate) fn shutdown(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("reader thread panicked during shutdown");
            }
            debug!("reader thread joined");
        }
    }
}

impl<R> std::fmt::Debug for Reader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reader")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("running", &self.handle.is_some())
            .finish_non_exhaustive()
    }
}

impl<R> Drop for Reader<R> {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn reader_main<S: InputSource>(
    mut source: S,
    tx: &Sender<ReaderMessage<S::Record>>,
    cancel: &CancellationToken,
) {
    let result =
        std::panic::catch_unwind(AssertUnwindSafe(|| reader_loop(&mut source, tx, cancel)));

    let failure = match result {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(payload) => Some(panic_message(payload.as_ref())),
    };
    if let Some(msg) = failure {
        warn!(error = %msg, "input reader failed");
        let _ = tx.send(ReaderMessage::Failed(msg));
    }

    // Restores whatever `open` changed, on every exit path.
    drop(source);
}

fn reader_loop<S: InputSource>(
    source: &mut S,
    tx: &Sender<ReaderMessage<S::Record>>,
    cancel: &CancellationToken,
) -> io::Result<()> {
    source.open()?;
    if tx.send(ReaderMessage::Ready).is_err() {
        return Ok(());
    }
    debug!("input reader ready");

    while !cancel.is_cancelled() {
        let records = source.read(cancel)?;
        if records.is_empty() {
            continue;
        }
        if tx.send(ReaderMessage::Records(records)).is_err() {
            break;
        }
    }
    Ok(())
}

fn panic_message(payload: &dyn std::any::Any) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "reader thread panicked".to_string())
}

#[derive(Debug)]
enum ScriptStep<R> {
    Batch(Vec<R>),
    Fail(String),
    Panic(String),
}

#[derive(Debug)]
struct Script<R> {
    steps: VecDeque<ScriptStep<R>>,
    fail_open: bool,
    opened: bool,
    dropped: bool,
}

/// A source fed from the test side.
///
/// Clones share the same script, so a test keeps one clone to push batches
/// while the coordinator owns another.
#[derive(Debug)]
pub struct ScriptedSource<R> {
    script: Arc<Mutex<Script<R>>>,
    // Set on the instance the reader opened; only it marks the script dropped.
    in_use: bool,
}

impl<R> Clone for ScriptedSource<R> {
    fn clone(&self) -> Self {
        Self {
            script: Arc::clone(&self.script),
            in_use: false,
        }
    }
}

impl<R> Default for ScriptedSource<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> ScriptedSource<R> {
    /// Create an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                steps: VecDeque::new(),
                fail_open: false,
                opened: false,
                dropped: false,
            })),
            in_use: false,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script<R>> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a batch returned by one read.
    pub fn push<I>(&self, records: I)
    where
        I: IntoIterator<Item = R>,
    {
        self.lock()
            .steps
            .push_back(ScriptStep::Batch(records.into_iter().collect()));
    }

    /// Make the next read fail with an I/O error.
    pub fn push_failure(&self, msg: impl Into<String>) {
        self.lock().steps.push_back(ScriptStep::Fail(msg.into()));
    }

    /// Make the next read panic.
    pub fn push_panic(&self, msg: impl Into<String>) {
        self.lock().steps.push_back(ScriptStep::Panic(msg.into()));
    }

    /// Make `open` fail.
    pub fn fail_open(&self) {
        self.lock().fail_open = true;
    }

    /// Check if `open` ran.
    #[must_use]
    pub fn is_opened(&self) -> bool {
        self.lock().opened
    }

    /// Check if the source given to the reader was dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().dropped
    }

    /// Number of steps not yet read.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.lock().steps.len()
    }
}

impl ScriptedSource<char> {
    /// Queue a batch of characters.
    pub fn push_str(&self, input: &str) {
        self.push(input.chars());
    }
}

impl<R> Drop for ScriptedSource<R> {
    fn drop(&mut self) {
        if self.in_use {
            self.lock().dropped = true;
        }
    }
}

impl<R: InputRecord> InputSource for ScriptedSource<R> {
    type Record = R;

    fn open(&mut self) -> io::Result<()> {
        self.in_use = true;
        let mut script = self.lock();
        if script.fail_open {
            return Err(io::Error::other("console unavailable"));
        }
        script.opened = true;
        Ok(())
    }

    fn read(&mut self, _cancel: &CancellationToken) -> io::Result<Vec<R>> {
        let step = self.lock().steps.pop_front();
        match step {
            Some(ScriptStep::Batch(records)) => Ok(records),
            Some(ScriptStep::Fail(msg)) => Err(io::Error::other(msg)),
            Some(ScriptStep::Panic(msg)) => panic!("{msg}"),
            None => {
                thread::sleep(Duration::from_millis(1));
                Ok(Vec::new())
            }
        }
    }
}
