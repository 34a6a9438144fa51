//! SGR mouse report decoding.
//!
//! Reports look like `ESC [ < Cb ; Cx ; Cy M` (press class) or `... m`
//! (release class), with 1-indexed coordinates. The button code `Cb` packs:
//!
//! | bits | meaning |
//! |---|---|
//! | 0-1, 7 | button (0, 1, 2, 128) or 3 for "no button" |
//! | 2 (4) | shift |
//! | 3 (8) | alt |
//! | 4 (16) | ctrl |
//! | 5 (32) | motion |
//! | 6 (64) | wheel (64 up, 65 down, 66 left, 67 right) |

use crate::mouse::flags::{MouseButton, MouseEvent, MouseFlags, Point};

/// Report prefix, `ESC [ <`.
pub const SGR_PREFIX: &str = "\x1b[<";

/// Press-class terminator.
pub const PRESS: char = 'M';
/// Release-class terminator.
pub const RELEASE: char = 'm';

const SHIFT_BIT: u32 = 4;
const ALT_BIT: u32 = 8;
const CTRL_BIT: u32 = 16;
const MODIFIER_BITS: u32 = SHIFT_BIT | ALT_BIT | CTRL_BIT;
const MOTION_BIT: u32 = 32;
const NO_BUTTON: u32 = 3;

const fn button_code(button: MouseButton) -> u32 {
    match button {
        MouseButton::Button1 => 0,
        MouseButton::Button2 => 1,
        MouseButton::Button3 => 2,
        MouseButton::Button4 => 128,
    }
}

const fn code_button(code: u32) -> Option<MouseButton> {
    match code {
        0 => Some(MouseButton::Button1),
        1 => Some(MouseButton::Button2),
        2 => Some(MouseButton::Button3),
        128 => Some(MouseButton::Button4),
        _ => None,
    }
}

/// Translate a button code and terminator into flags.
///
/// Codes outside the table decode to empty flags.
#[must_use]
pub fn decode(code: u32, terminator: char) -> MouseFlags {
    let mut modifiers = MouseFlags::empty();
    modifiers.set(MouseFlags::SHIFT, code & SHIFT_BIT != 0);
    modifiers.set(MouseFlags::ALT, code & ALT_BIT != 0);
    modifiers.set(MouseFlags::CTRL, code & CTRL_BIT != 0);

    let base = code & !MODIFIER_BITS;
    let flags = match base {
        NO_BUTTON => MouseFlags::empty(),
        64 => MouseFlags::WHEELED_UP,
        65 => MouseFlags::WHEELED_DOWN,
        66 => MouseFlags::WHEELED_LEFT,
        67 => MouseFlags::WHEELED_RIGHT,
        _ if base & MOTION_BIT != 0 => {
            let without_motion = base & !MOTION_BIT;
            if without_motion == NO_BUTTON {
                MouseFlags::REPORT_MOUSE_POSITION
            } else if let Some(button) = code_button(without_motion) {
                button.pressed() | MouseFlags::REPORT_MOUSE_POSITION
            } else {
                return MouseFlags::empty();
            }
        }
        _ => match code_button(base) {
            Some(button) if terminator == RELEASE => button.released(),
            Some(button) => button.pressed(),
            None => return MouseFlags::empty(),
        },
    };
    flags | modifiers
}

/// Inverse of [`decode`]: the button code and terminator producing `flags`.
///
/// Returns `None` for flag combinations no single report can carry, such
/// as synthesized clicks.
#[must_use]
pub fn encode(flags: MouseFlags) -> Option<(u32, char)> {
    let mut modifiers = 0;
    if flags.contains(MouseFlags::SHIFT) {
        modifiers |= SHIFT_BIT;
    }
    if flags.contains(MouseFlags::ALT) {
        modifiers |= ALT_BIT;
    }
    if flags.contains(MouseFlags::CTRL) {
        modifiers |= CTRL_BIT;
    }

    let rest = flags - MouseFlags::MODIFIERS;
    let (code, terminator) = if rest.is_empty() {
        (NO_BUTTON, PRESS)
    } else if rest == MouseFlags::REPORT_MOUSE_POSITION {
        (NO_BUTTON | MOTION_BIT, PRESS)
    } else if rest == MouseFlags::WHEELED_UP {
        (64, PRESS)
    } else if rest == MouseFlags::WHEELED_DOWN {
        (65, PRESS)
    } else if rest == MouseFlags::WHEELED_LEFT {
        (66, PRESS)
    } else if rest == MouseFlags::WHEELED_RIGHT {
        (67, PRESS)
    } else if let Some(button) = rest.pressed_button() {
        if rest == button.pressed() {
            (button_code(button), PRESS)
        } else if rest == button.pressed() | MouseFlags::REPORT_MOUSE_POSITION {
            (button_code(button) | MOTION_BIT, PRESS)
        } else {
            return None;
        }
    } else if let Some(button) = rest.released_button() {
        if rest != button.released() {
            return None;
        }
        (button_code(button), RELEASE)
    } else {
        return None;
    };
    Some((code | modifiers, terminator))
}

/// Every (code, terminator) pair in the decoding table.
pub fn supported_reports() -> impl Iterator<Item = (u32, char)> {
    const PRESS_BASES: [u32; 14] = [0, 1, 2, 128, 3, 32, 33, 34, 35, 160, 64, 65, 66, 67];
    const RELEASE_BASES: [u32; 4] = [0, 1, 2, 128];
    let modifier_sets = (0..8u32).map(|n| n << 2);

    modifier_sets.flat_map(|modifiers| {
        let presses = PRESS_BASES
            .into_iter()
            .map(move |base| (base | modifiers, PRESS));
        let releases = RELEASE_BASES
            .into_iter()
            .map(move |base| (base | modifiers, RELEASE));
        presses.chain(releases)
    })
}

/// Parse a complete SGR mouse report.
///
/// Returns `None` if `report` is not a well-formed SGR report.
#[must_use]
pub fn parse_sgr(report: &str) -> Option<MouseEvent> {
    let body = report.strip_prefix(SGR_PREFIX)?;
    let terminator = body.chars().last()?;
    if terminator != PRESS && terminator != RELEASE {
        return None;
    }
    let mut params = body[..body.len() - 1].split(';');
    let code: u32 = params.next()?.parse().ok()?;
    let x: u16 = params.next()?.parse().ok()?;
    let y: u16 = params.next()?.parse().ok()?;
    if params.next().is_some() {
        return None;
    }

    let flags = decode(code, terminator);
    Some(MouseEvent::new(
        flags,
        Point::new(x.saturating_sub(1), y.saturating_sub(1)),
    ))
}

/// Format `event` as an SGR report.
///
/// Returns `None` if the flags have no report encoding.
#[must_use]
pub fn format_sgr(event: &MouseEvent) -> Option<String> {
    let (code, terminator) = encode(event.flags)?;
    Some(format!(
        "{SGR_PREFIX}{code};{};{}{terminator}",
        u32::from(event.position.x) + 1,
        u32::from(event.position.y) + 1
    ))
}
