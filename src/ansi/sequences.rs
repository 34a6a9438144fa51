//! Constant ANSI escape sequences and CSI classification.

/// Escape character.
pub const ESC: char = '\x1b';

/// Control Sequence Introducer (`ESC [`).
pub const CSI: &str = "\x1b[";

/// Final characters that may end a CSI reply.
///
/// `N` and `O` are left out: after `ESC` they introduce SS2/SS3 key
/// sequences, never a reply.
pub const KNOWN_TERMINATORS: &[char] = &[
    '@', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'P', 'Q', 'R', 'S', 'T',
    'W', 'X', 'Z', '^', '`', '~', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'l', 'm', 'n', 'p',
    'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];

/// Check if `ch` is on the CSI terminator allow-list.
#[must_use]
pub fn is_known_terminator(ch: char) -> bool {
    KNOWN_TERMINATORS.contains(&ch)
}

/// Enable any-event mouse tracking with SGR extended coordinates.
pub const MOUSE_ON: &str = "\x1b[?1003h\x1b[?1015h\x1b[?1006h";

/// Disable mouse tracking.
pub const MOUSE_OFF: &str = "\x1b[?1003l\x1b[?1015l\x1b[?1006l";

/// Outbound queries and the terminator of their reply.
pub mod query {
    /// Primary device attributes (DA1). Reply: `ESC [ ? Ps ; ... c`.
    pub const DEVICE_ATTRIBUTES: &str = "\x1b[0c";
    /// Secondary device attributes (DA2). Reply: `ESC [ > Pp ; Pv ; Pc c`.
    pub const DEVICE_ATTRIBUTES_SECONDARY: &str = "\x1b[>0c";
    /// Terminator shared by both device attribute replies.
    pub const DEVICE_ATTRIBUTES_TERMINATOR: &str = "c";

    /// Cursor position report (DSR 6). Reply: `ESC [ row ; col R`.
    pub const CURSOR_POSITION: &str = "\x1b[6n";
    /// Terminator of the cursor position reply.
    pub const CURSOR_POSITION_TERMINATOR: &str = "R";

    /// Text area size in characters (XTWINOPS 18). Reply: `ESC [ 8 ; rows ; cols t`.
    pub const TEXT_AREA_SIZE: &str = "\x1b[18t";
    /// Terminator of window operation replies.
    pub const WINDOW_OPS_TERMINATOR: &str = "t";
}
