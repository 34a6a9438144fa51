//! Mouse event types.

use bitflags::bitflags;

bitflags! {
    /// Button state, wheel motion and modifiers of one mouse event.
    ///
    /// A raw report carries at most one button state bit; the click
    /// interpreter adds events carrying the `*_CLICKED` family.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
    pub struct MouseFlags: u32 {
        const BUTTON1_PRESSED        = 1 << 0;
        const BUTTON1_RELEASED       = 1 << 1;
        const BUTTON1_CLICKED        = 1 << 2;
        const BUTTON1_DOUBLE_CLICKED = 1 << 3;
        const BUTTON1_TRIPLE_CLICKED = 1 << 4;

        const BUTTON2_PRESSED        = 1 << 5;
        const BUTTON2_RELEASED       = 1 << 6;
        const BUTTON2_CLICKED        = 1 << 7;
        const BUTTON2_DOUBLE_CLICKED = 1 << 8;
        const BUTTON2_TRIPLE_CLICKED = 1 << 9;

        const BUTTON3_PRESSED        = 1 << 10;
        const BUTTON3_RELEASED       = 1 << 11;
        const BUTTON3_CLICKED        = 1 << 12;
        const BUTTON3_DOUBLE_CLICKED = 1 << 13;
        const BUTTON3_TRIPLE_CLICKED = 1 << 14;

        const BUTTON4_PRESSED        = 1 << 15;
        const BUTTON4_RELEASED       = 1 << 16;
        const BUTTON4_CLICKED        = 1 << 17;
        const BUTTON4_DOUBLE_CLICKED = 1 << 18;
        const BUTTON4_TRIPLE_CLICKED = 1 << 19;

        /// Shift held.
        const SHIFT = 1 << 20;
        /// Ctrl held.
        const CTRL  = 1 << 21;
        /// Alt held.
        const ALT   = 1 << 22;

        /// The pointer moved.
        const REPORT_MOUSE_POSITION = 1 << 23;

        const WHEELED_UP    = 1 << 24;
        const WHEELED_DOWN  = 1 << 25;
        const WHEELED_LEFT  = 1 << 26;
        const WHEELED_RIGHT = 1 << 27;

        /// Modifier bits.
        const MODIFIERS = Self::SHIFT.bits() | Self::CTRL.bits() | Self::ALT.bits();
        /// Wheel bits.
        const WHEEL = Self::WHEELED_UP.bits()
            | Self::WHEELED_DOWN.bits()
            | Self::WHEELED_LEFT.bits()
            | Self::WHEELED_RIGHT.bits();
    }
}

/// A logical mouse button.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MouseButton {
    /// Usually the left button.
    Button1,
    /// Usually the middle button.
    Button2,
    /// Usually the right button.
    Button3,
    /// Extra button.
    Button4,
}

impl MouseButton {
    /// All buttons, in order.
    pub const ALL: [MouseButton; 4] = [
        MouseButton::Button1,
        MouseButton::Button2,
        MouseButton::Button3,
        MouseButton::Button4,
    ];

    /// Zero-based index.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Button1 => 0,
            Self::Button2 => 1,
            Self::Button3 => 2,
            Self::Button4 => 3,
        }
    }

    const fn shift(self) -> u32 {
        5 * self.index() as u32
    }

    /// Flag for this button being pressed.
    #[must_use]
    pub const fn pressed(self) -> MouseFlags {
        MouseFlags::from_bits_retain(MouseFlags::BUTTON1_PRESSED.bits() << self.shift())
    }

    /// Flag for this button being released.
    #[must_use]
    pub const fn released(self) -> MouseFlags {
        MouseFlags::from_bits_retain(MouseFlags::BUTTON1_RELEASED.bits() << self.shift())
    }

    /// Flag for a click run of `count` (clamped to 1..=3).
    #[must_use]
    pub const fn clicked(self, count: u8) -> MouseFlags {
        let base = match count {
            0 | 1 => MouseFlags::BUTTON1_CLICKED,
            2 => MouseFlags::BUTTON1_DOUBLE_CLICKED,
            _ => MouseFlags::BUTTON1_TRIPLE_CLICKED,
        };
        MouseFlags::from_bits_retain(base.bits() << self.shift())
    }
}

impl MouseFlags {
    /// The button whose pressed bit is set, if any.
    #[must_use]
    pub fn pressed_button(self) -> Option<MouseButton> {
        MouseButton::ALL
            .into_iter()
            .find(|button| self.contains(button.pressed()))
    }

    /// The button whose released bit is set, if any.
    #[must_use]
    pub fn released_button(self) -> Option<MouseButton> {
        MouseButton::ALL
            .into_iter()
            .find(|button| self.contains(button.released()))
    }

    /// Check if any wheel bit is set.
    #[must_use]
    pub fn is_wheel(self) -> bool {
        self.intersects(MouseFlags::WHEEL)
    }
}

/// A cell position, 0-indexed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Point {
    /// Column.
    pub x: u16,
    /// Row.
    pub y: u16,
}

impl Point {
    /// Create a point.
    #[must_use]
    pub const fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }
}

/// A mouse event: flags plus position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MouseEvent {
    /// What happened.
    pub flags: MouseFlags,
    /// Where it happened.
    pub position: Point,
}

impl MouseEvent {
    /// Create a new mouse event.
    #[must_use]
    pub const fn new(flags: MouseFlags, position: Point) -> Self {
        Self { flags, position }
    }

    /// Create a press event.
    #[must_use]
    pub const fn press(x: u16, y: u16, button: MouseButton) -> Self {
        Self::new(button.pressed(), Point::new(x, y))
    }

    /// Create a release event.
    #[must_use]
    pub const fn release(x: u16, y: u16, button: MouseButton) -> Self {
        Self::new(button.released(), Point::new(x, y))
    }

    /// Add modifier keys.
    #[must_use]
    pub fn with_modifiers(mut self, shift: bool, ctrl: bool, alt: bool) -> Self {
        self.flags.set(MouseFlags::SHIFT, shift);
        self.flags.set(MouseFlags::CTRL, ctrl);
        self.flags.set(MouseFlags::ALT, alt);
        self
    }

    /// Check if this is a press event.
    #[must_use]
    pub fn is_press(&self) -> bool {
        self.flags.pressed_button().is_some()
    }

    /// Check if this is a scroll event.
    #[must_use]
    pub fn is_scroll(&self) -> bool {
        self.flags.is_wheel()
    }

    /// Check if this is a synthesized click event.
    #[must_use]
    pub fn is_click(&self) -> bool {
        MouseButton::ALL.into_iter().any(|button| {
            self.flags.intersects(button.clicked(1) | button.clicked(2) | button.clicked(3))
        })
    }
}
