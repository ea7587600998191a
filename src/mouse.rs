//! Mouse report encoding.
//!
//! Turns host mouse events into the exact byte sequences the active
//! protocol variant expects. Filtering (which events the application asked
//! for) happens in the dispatcher; this module is the pure encoder.

use crate::modes::{MouseEncoding, MouseMode};

/// Mouse buttons the protocols can express.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
    WheelUp,
    WheelDown,
}

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseAction {
    Press,
    Release,
    /// Pointer motion; `button` is the held button, if any.
    Motion,
}

/// Modifier keys held during the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MouseModifiers {
    pub shift: bool,
    pub meta: bool,
    pub control: bool,
}

/// A mouse event in cell coordinates (0-based), with optional pixel
/// coordinates for the SGR-pixel encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseEvent {
    pub button: Option<MouseButton>,
    pub action: MouseAction,
    pub col: usize,
    pub row: usize,
    /// Pixel position, used only by [`MouseEncoding::SgrPixel`]. Hosts
    /// that do not track pixels may leave this `None`; a cell-derived
    /// estimate is used instead.
    pub pixel: Option<(u32, u32)>,
    pub modifiers: MouseModifiers,
}

/// Assumed cell size when a pixel encoding is active but the host only
/// supplied cell coordinates.
const FALLBACK_CELL_W: u32 = 8;
const FALLBACK_CELL_H: u32 = 16;

/// Button code shared by every protocol: button bits, modifier bits, and
/// the motion flag.
fn button_code(event: &MouseEvent, mode: MouseMode, release_as_3: bool) -> u8 {
    let mut code: u8 = match (event.action, event.button) {
        (MouseAction::Release, _) if release_as_3 => 3,
        (_, Some(MouseButton::Left)) => 0,
        (_, Some(MouseButton::Middle)) => 1,
        (_, Some(MouseButton::Right)) => 2,
        (_, Some(MouseButton::WheelUp)) => 64,
        (_, Some(MouseButton::WheelDown)) => 65,
        (_, None) => 3,
    };
    if event.action == MouseAction::Motion {
        code += 32;
    }
    if mode.sends_modifiers() {
        if event.modifiers.shift {
            code += 4;
        }
        if event.modifiers.meta {
            code += 8;
        }
        if event.modifiers.control {
            code += 16;
        }
    }
    code
}

/// Encode an event for the active protocol, or `None` when the coordinates
/// cannot be represented (legacy encodings top out at column 223).
#[must_use]
pub fn encode(event: &MouseEvent, mode: MouseMode, encoding: MouseEncoding) -> Option<Vec<u8>> {
    match encoding {
        MouseEncoding::Default => {
            // 6-byte X10 form: CSI M Cb Cx Cy with offset 32.
            let code = button_code(event, mode, true);
            let cx = event.col + 1 + 32;
            let cy = event.row + 1 + 32;
            if cx > 255 || cy > 255 {
                return None;
            }
            Some(vec![0x1b, b'[', b'M', code + 32, cx as u8, cy as u8])
        }
        MouseEncoding::Utf8 => {
            // 1005: coordinates become UTF-8 scalars (limit 2015).
            let code = button_code(event, mode, true);
            let mut out = vec![0x1b, b'[', b'M'];
            push_utf8_coord(&mut out, code as usize + 32)?;
            push_utf8_coord(&mut out, event.col + 1 + 32)?;
            push_utf8_coord(&mut out, event.row + 1 + 32)?;
            Some(out)
        }
        MouseEncoding::Sgr => {
            let code = button_code(event, mode, false);
            let terminator = if event.action == MouseAction::Release {
                'm'
            } else {
                'M'
            };
            Some(
                format!(
                    "\x1b[<{};{};{}{}",
                    code,
                    event.col + 1,
                    event.row + 1,
                    terminator
                )
                .into_bytes(),
            )
        }
        MouseEncoding::SgrPixel => {
            let code = button_code(event, mode, false);
            let (px, py) = event.pixel.unwrap_or((
                event.col as u32 * FALLBACK_CELL_W,
                event.row as u32 * FALLBACK_CELL_H,
            ));
            let terminator = if event.action == MouseAction::Release {
                'm'
            } else {
                'M'
            };
            Some(format!("\x1b[<{};{};{}{}", code, px + 1, py + 1, terminator).into_bytes())
        }
        MouseEncoding::Urxvt => {
            let code = button_code(event, mode, true);
            Some(
                format!(
                    "\x1b[{};{};{}M",
                    code as usize + 32,
                    event.col + 1,
                    event.row + 1
                )
                .into_bytes(),
            )
        }
    }
}

/// Whether the active mode wants this event at all.
#[must_use]
pub fn wants_event(event: &MouseEvent, mode: MouseMode) -> bool {
    match mode {
        MouseMode::None => false,
        MouseMode::X10 => {
            event.action == MouseAction::Press
                && !matches!(
                    event.button,
                    Some(MouseButton::WheelUp | MouseButton::WheelDown)
                )
        }
        MouseMode::Normal => event.action != MouseAction::Motion,
        MouseMode::Button => {
            event.action != MouseAction::Motion || event.button.is_some()
        }
        MouseMode::AnyEvent => true,
    }
}

fn push_utf8_coord(out: &mut Vec<u8>, value: usize) -> Option<()> {
    if value > 2015 {
        return None;
    }
    if value < 128 {
        out.push(value as u8);
    } else {
        // Two-byte UTF-8 encoding of the scalar.
        out.push(0xc0 | (value >> 6) as u8);
        out.push(0x80 | (value & 0x3f) as u8);
    }
    Some(())
}
