//! Outbound terminal queries.

use std::fmt;

use crate::ansi::sequences::query;

/// A query sent to the terminal whose reply ends with `terminator`.
pub struct AnsiRequest {
    /// Bytes written to the terminal.
    pub request: String,
    /// Terminator the reply ends with.
    pub terminator: String,
    pub(crate) on_response: Box<dyn FnOnce(&str)>,
    pub(crate) on_abandoned: Option<Box<dyn FnOnce()>>,
}

impl fmt::Debug for AnsiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnsiRequest")
            .field("request", &self.request)
            .field("terminator", &self.terminator)
            .finish_non_exhaustive()
    }
}

impl AnsiRequest {
    /// Create a request; `on_response` receives the full reply.
    pub fn new<F>(request: impl Into<String>, terminator: impl Into<String>, on_response: F) -> Self
    where
        F: FnOnce(&str) + 'static,
    {
        Self {
            request: request.into(),
            terminator: terminator.into(),
            on_response: Box::new(on_response),
            on_abandoned: None,
        }
    }

    /// Run `on_abandoned` if the request is evicted as stale.
    #[must_use]
    pub fn on_abandoned<F>(mut self, on_abandoned: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        self.on_abandoned = Some(Box::new(on_abandoned));
        self
    }

    /// Primary device attributes (DA1).
    pub fn device_attributes<F>(on_response: F) -> Self
    where
        F: FnOnce(&str) + 'static,
    {
        Self::new(
            query::DEVICE_ATTRIBUTES,
            query::DEVICE_ATTRIBUTES_TERMINATOR,
            on_response,
        )
    }

    /// Cursor position report.
    pub fn cursor_position<F>(on_response: F) -> Self
    where
        F: FnOnce(&str) + 'static,
    {
        Self::new(
            query::CURSOR_POSITION,
            query::CURSOR_POSITION_TERMINATOR,
            on_response,
        )
    }

    /// Text area size in characters.
    pub fn text_area_size<F>(on_response: F) -> Self
    where
        F: FnOnce(&str) + 'static,
    {
        Self::new(
            query::TEXT_AREA_SIZE,
            query::WINDOW_OPS_TERMINATOR,
            on_response,
        )
    }
}
