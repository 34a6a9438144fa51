//! Typed views of terminal replies.
//!
//! Parses the replies to the queries in [`query`](crate::ansi::sequences::query):
//! - DA1 (Primary Device Attributes): `ESC [ ? Ps ; ... c`
//! - DA2 (Secondary Device Attributes): `ESC [ > Pp ; Pv ; Pc c`
//! - Cursor position: `ESC [ row ; col R`
//! - Text area size: `ESC [ 8 ; rows ; cols t`
//! - Pixel size: `ESC [ 4 ; height ; width t`

use crate::ansi::sequences::CSI;

/// A parsed terminal reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TerminalResponse {
    /// Device attributes response.
    DeviceAttributes {
        /// Whether this is from DA1 (true) or DA2 (false).
        primary: bool,
        /// Parameter values from the response.
        params: Vec<u32>,
    },

    /// Cursor position, 1-based as reported.
    CursorPosition {
        /// Row.
        row: u16,
        /// Column.
        col: u16,
    },

    /// Text area size in character cells.
    TextAreaSize {
        /// Rows.
        rows: u16,
        /// Columns.
        cols: u16,
    },

    /// Text area size in pixels.
    PixelSize {
        /// Width in pixels.
        width: u16,
        /// Height in pixels.
        height: u16,
    },

    /// Well-formed but not one of the above.
    Unknown(String),
}

impl TerminalResponse {
    /// Parse a complete reply as delivered to a response callback.
    ///
    /// Returns `None` if `input` is not a CSI sequence.
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        let body = input.strip_prefix(CSI)?;
        let terminator = body.chars().last()?;
        let params = &body[..body.len() - terminator.len_utf8()];

        let parsed = match terminator {
            'c' => Self::parse_device_attributes(params),
            'R' => Self::parse_cursor_position(params),
            't' => Self::parse_window_report(params),
            _ => None,
        };
        Some(parsed.unwrap_or_else(|| TerminalResponse::Unknown(input.to_string())))
    }

    fn parse_device_attributes(params: &str) -> Option<Self> {
        let (primary, rest) = if let Some(rest) = params.strip_prefix('?') {
            (true, rest)
        } else if let Some(rest) = params.strip_prefix('>') {
            (false, rest)
        } else {
            return None;
        };
        let params = rest.split(';').filter_map(|s| s.parse().ok()).collect();
        Some(TerminalResponse::DeviceAttributes { primary, params })
    }

    fn parse_cursor_position(params: &str) -> Option<Self> {
        let mut parts = params.split(';');
        let row = parts.next()?.parse().ok()?;
        let col = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(TerminalResponse::CursorPosition { row, col })
    }

    fn parse_window_report(params: &str) -> Option<Self> {
        let mut parts = params.split(';');
        let kind = parts.next()?;
        let first: u16 = parts.next()?.parse().ok()?;
        let second: u16 = parts.next()?.parse().ok()?;
        match kind {
            "8" => Some(TerminalResponse::TextAreaSize {
                rows: first,
                cols: second,
            }),
            "4" => Some(TerminalResponse::PixelSize {
                width: second,
                height: first,
            }),
            _ => None,
        }
    }

    /// Check if a DA1 response indicates sixel support (parameter 4).
    #[must_use]
    pub fn has_sixel(&self) -> bool {
        if let TerminalResponse::DeviceAttributes {
            primary: true,
            params,
        } = self
        {
            params.contains(&4)
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_da1_response() {
        let response = TerminalResponse::parse("\x1b[?62;4;6c").unwrap();
        match &response {
            TerminalResponse::DeviceAttributes { primary, params } => {
                assert!(primary);
                assert_eq!(params, &vec![62, 4, 6]);
            }
            _ => panic!("Expected DeviceAttributes"),
        }
        assert!(response.has_sixel());
    }

    #[test]
    fn test_parse_da2_response() {
        let response = TerminalResponse::parse("\x1b[>1;4000;20c").unwrap();
        assert_eq!(
            response,
            TerminalResponse::DeviceAttributes {
                primary: false,
                params: vec![1, 4000, 20],
            }
        );
        assert!(!response.has_sixel());
    }

    #[test]
    fn test_parse_cursor_position() {
        assert_eq!(
            TerminalResponse::parse("\x1b[12;40R"),
            Some(TerminalResponse::CursorPosition { row: 12, col: 40 })
        );
    }

    #[test]
    fn test_parse_text_area_size() {
        assert_eq!(
            TerminalResponse::parse("\x1b[8;24;80t"),
            Some(TerminalResponse::TextAreaSize { rows: 24, cols: 80 })
        );
    }

    #[test]
    fn test_parse_pixel_size() {
        assert_eq!(
            TerminalResponse::parse("\x1b[4;900;1440t"),
            Some(TerminalResponse::PixelSize {
                width: 1440,
                height: 900
            })
        );
    }

    #[test]
    fn test_parse_unknown() {
        assert!(matches!(
            TerminalResponse::parse("\x1b[99z"),
            Some(TerminalResponse::Unknown(_))
        ));
        assert!(matches!(
            TerminalResponse::parse("\x1b[1;2;3R"),
            Some(TerminalResponse::Unknown(_))
        ));
    }

    #[test]
    fn test_parse_rejects_non_csi() {
        assert_eq!(TerminalResponse::parse("abc"), None);
        assert_eq!(TerminalResponse::parse("\x1b["), None);
    }
}
