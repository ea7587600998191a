//! Cursor position, style, and the DECSC/DECRC saved state.

use crate::cell::SgrAttrs;
use crate::charset::Charsets;

/// Cursor style as set by DECSCUSR (`CSI Ps SP q`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorStyle {
    /// Blinking block (DECSCUSR 0/1).
    #[default]
    BlinkingBlock,
    SteadyBlock,
    BlinkingUnderline,
    SteadyUnderline,
    BlinkingBar,
    SteadyBar,
}

impl CursorStyle {
    /// Map a DECSCUSR parameter to a style. Unknown values keep the default.
    #[must_use]
    pub fn from_param(p: i32) -> Self {
        match p {
            0 | 1 => Self::BlinkingBlock,
            2 => Self::SteadyBlock,
            3 => Self::BlinkingUnderline,
            4 => Self::SteadyUnderline,
            5 => Self::BlinkingBar,
            6 => Self::SteadyBar,
            _ => Self::default(),
        }
    }

    /// The DECSCUSR parameter value for this style (DECRQSS reporting).
    #[must_use]
    pub fn to_param(self) -> u8 {
        match self {
            Self::BlinkingBlock => 1,
            Self::SteadyBlock => 2,
            Self::BlinkingUnderline => 3,
            Self::SteadyUnderline => 4,
            Self::BlinkingBar => 5,
            Self::SteadyBar => 6,
        }
    }
}

/// Cursor position relative to the visible region.
///
/// `x` may equal the column count transiently: printing in the last column
/// leaves the cursor "hanging" past the edge until the next print decides
/// whether to wrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    pub x: usize,
    pub y: usize,
}

/// Everything DECSC saves and DECRC restores.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SavedCursor {
    pub x: usize,
    pub y: usize,
    pub attrs: SgrAttrs,
    pub charsets: Charsets,
    pub auto_wrap: bool,
    pub reverse_wrap: bool,
    pub origin_mode: bool,
    pub margin_mode: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn style_param_round_trip() {
        for p in 1..=6 {
            assert_eq!(CursorStyle::from_param(p).to_param() as i32, p);
        }
        assert_eq!(CursorStyle::from_param(0), CursorStyle::BlinkingBlock);
        assert_eq!(CursorStyle::from_param(99), CursorStyle::BlinkingBlock);
    }
}
