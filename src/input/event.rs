//! Normalized input events.

use crate::input::keyboard::KeyEvent;
use crate::mouse::MouseEvent;

/// An input event, in the order its records were read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputEvent {
    /// Key pressed.
    KeyDown(KeyEvent),
    /// Key released.
    KeyUp(KeyEvent),
    /// Raw or synthesized mouse event.
    Mouse(MouseEvent),
}

impl InputEvent {
    /// Check if this is a key event.
    #[must_use]
    pub fn is_key(&self) -> bool {
        matches!(self, Self::KeyDown(_) | Self::KeyUp(_))
    }

    /// Check if this is a mouse event.
    #[must_use]
    pub fn is_mouse(&self) -> bool {
        matches!(self, Self::Mouse(_))
    }

    /// Get the pressed key if this is a key-down event.
    #[must_use]
    pub fn key_down(&self) -> Option<&KeyEvent> {
        match self {
            Self::KeyDown(e) => Some(e),
            _ => None,
        }
    }

    /// Get the mouse event if this is one.
    #[must_use]
    pub fn mouse(&self) -> Option<&MouseEvent> {
        match self {
            Self::Mouse(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MouseEvent> for InputEvent {
    fn from(e: MouseEvent) -> Self {
        Self::Mouse(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mouse::MouseButton;

    #[test]
    fn test_accessors() {
        let key = InputEvent::KeyDown(KeyEvent::char('q'));
        assert!(key.is_key());
        assert_eq!(key.key_down(), Some(&KeyEvent::char('q')));
        assert!(InputEvent::KeyUp(KeyEvent::char('q')).key_down().is_none());

        let mouse: InputEvent = MouseEvent::press(1, 2, MouseButton::Button1).into();
        assert!(mouse.is_mouse());
        assert!(!mouse.is_key());
        assert_eq!(mouse.mouse().map(|m| m.position.x), Some(1));
    }
}
