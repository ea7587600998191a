//! Terminal mode state: DEC private modes, ANSI modes, and the mouse
//! protocol selection they control.

use bitflags::bitflags;

bitflags! {
    /// DEC private modes (DECSET/DECRST, `CSI ? Pm h/l`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DecModes: u32 {
        /// ?1 DECCKM: application cursor keys.
        const APP_CURSOR_KEYS   = 1 << 0;
        /// ?3 DECCOLM: 132-column mode.
        const COLUMN_132        = 1 << 1;
        /// ?5 DECSCNM: reverse video.
        const REVERSE_VIDEO     = 1 << 2;
        /// ?6 DECOM: origin mode.
        const ORIGIN            = 1 << 3;
        /// ?7 DECAWM: auto-wrap.
        const AUTO_WRAP         = 1 << 4;
        /// ?12: cursor blink.
        const CURSOR_BLINK      = 1 << 5;
        /// ?25 DECTCEM: cursor visible.
        const SHOW_CURSOR       = 1 << 6;
        /// ?40: allow 80<->132 column switching.
        const ALLOW_COLUMN_132  = 1 << 7;
        /// ?45: reverse wraparound on backspace.
        const REVERSE_WRAP      = 1 << 8;
        /// ?69 DECLRMM: left/right margin mode.
        const MARGIN_MODE       = 1 << 9;
        /// ?1004: focus in/out reporting.
        const FOCUS_EVENTS      = 1 << 10;
        /// ?2004: bracketed paste.
        const BRACKETED_PASTE   = 1 << 11;
        /// DECKPAM/DECKPNM (ESC = / ESC >): application keypad.
        const APP_KEYPAD        = 1 << 12;
    }
}

bitflags! {
    /// ANSI standard modes (SM/RM, `CSI Pm h/l`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AnsiModes: u8 {
        /// 4 IRM: insert mode.
        const INSERT = 1 << 0;
        /// 20 LNM: line-feed/new-line mode.
        const NEW_LINE = 1 << 1;
    }
}

/// Which mouse events the application asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MouseMode {
    #[default]
    None,
    /// ?9: X10 compatibility (presses only, no modifiers).
    X10,
    /// ?1000: presses and releases.
    Normal,
    /// ?1002: presses, releases, and motion while a button is held.
    Button,
    /// ?1003: everything, including bare motion.
    AnyEvent,
}

impl MouseMode {
    /// Whether this mode reports modifier keys in the button code.
    #[must_use]
    pub fn sends_modifiers(self) -> bool {
        !matches!(self, Self::None | Self::X10)
    }
}

/// How mouse coordinates are encoded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MouseEncoding {
    /// Legacy 6-byte `CSI M` with offset-32 coordinate bytes.
    #[default]
    Default,
    /// ?1005: coordinates as UTF-8 scalars.
    Utf8,
    /// ?1006: `CSI < b ; x ; y M/m`.
    Sgr,
    /// ?1015: `CSI b ; x ; y M`.
    Urxvt,
    /// ?1016: SGR shape with pixel coordinates.
    SgrPixel,
}

/// The complete mode state of a terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Modes {
    pub dec: DecModes,
    pub ansi: AnsiModes,
    pub mouse_mode: MouseMode,
    pub mouse_encoding: MouseEncoding,
}

impl Default for Modes {
    fn default() -> Self {
        Self {
            dec: DecModes::AUTO_WRAP | DecModes::SHOW_CURSOR,
            ansi: AnsiModes::empty(),
            mouse_mode: MouseMode::default(),
            mouse_encoding: MouseEncoding::default(),
        }
    }
}

impl Modes {
    #[must_use]
    pub fn contains(&self, mode: DecModes) -> bool {
        self.dec.contains(mode)
    }

    pub fn set(&mut self, mode: DecModes, enabled: bool) {
        self.dec.set(mode, enabled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_wrap_and_cursor() {
        let modes = Modes::default();
        assert!(modes.contains(DecModes::AUTO_WRAP));
        assert!(modes.contains(DecModes::SHOW_CURSOR));
        assert!(!modes.contains(DecModes::ORIGIN));
        assert_eq!(modes.mouse_mode, MouseMode::None);
    }

    #[test]
    fn x10_does_not_send_modifiers() {
        assert!(!MouseMode::X10.sends_modifiers());
        assert!(MouseMode::Normal.sends_modifiers());
        assert!(MouseMode::AnyEvent.sends_modifiers());
    }
}
