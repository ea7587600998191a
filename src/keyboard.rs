//! Keyboard input encoding: legacy xterm-style sequences plus the Kitty
//! progressive keyboard protocol.
//!
//! The embedding UI translates platform key events into [`KeyEvent`]s; this
//! module produces the bytes to hand to the host process. Output is
//! bit-exact per protocol variant, so tests assert whole byte strings.

use bitflags::bitflags;

bitflags! {
    /// Modifier keys held during a key event.
    ///
    /// Bit values match the Kitty protocol's modifier field (value - 1).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        const SHIFT = 1 << 0;
        const ALT   = 1 << 1;
        const CTRL  = 1 << 2;
        const SUPER = 1 << 3;
        const HYPER = 1 << 4;
        const META  = 1 << 5;
    }
}

bitflags! {
    /// Kitty progressive enhancement flags (`CSI > flags u` stack).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct KittyFlags: u8 {
        const DISAMBIGUATE         = 1 << 0;
        const REPORT_EVENTS        = 1 << 1;
        const REPORT_ALTERNATES    = 1 << 2;
        const REPORT_ALL_AS_ESCAPE = 1 << 3;
        const REPORT_TEXT          = 1 << 4;
    }
}

/// Press, repeat, or release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyEventKind {
    #[default]
    Press,
    Repeat,
    Release,
}

impl KeyEventKind {
    fn kitty_event(self) -> u8 {
        match self {
            Self::Press => 1,
            Self::Repeat => 2,
            Self::Release => 3,
        }
    }
}

/// Keypad keys in the Kitty functional range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeypadKey {
    Digit(u8),
    Decimal,
    Divide,
    Multiply,
    Subtract,
    Add,
    Enter,
    Equal,
}

/// Media keys in the Kitty functional range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKey {
    Play,
    Pause,
    PlayPause,
    Stop,
    FastForward,
    Rewind,
    TrackNext,
    TrackPrevious,
    LowerVolume,
    RaiseVolume,
    MuteVolume,
}

/// Modifier keys reported as keys in their own right.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifierKey {
    LeftShift,
    LeftControl,
    LeftAlt,
    LeftSuper,
    RightShift,
    RightControl,
    RightAlt,
    RightSuper,
}

/// The key that was pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCode {
    /// A text-producing key, identified by its unshifted character.
    Char(char),
    Enter,
    Escape,
    Backspace,
    Tab,
    Insert,
    Delete,
    Home,
    End,
    PageUp,
    PageDown,
    Up,
    Down,
    Left,
    Right,
    /// Function keys F1..=F35.
    F(u8),
    CapsLock,
    NumLock,
    ScrollLock,
    PrintScreen,
    Pause,
    Menu,
    Keypad(KeypadKey),
    Media(MediaKey),
    Modifier(ModifierKey),
}

/// A key event as delivered by the embedding UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub modifiers: Modifiers,
    pub kind: KeyEventKind,
    /// Text this key produces under the current layout, if any.
    pub text: Option<String>,
    /// Shifted variant of the key (report-alternates).
    pub shifted: Option<char>,
    /// Base-layout variant of the key (report-alternates).
    pub base_layout: Option<char>,
}

impl KeyEvent {
    #[must_use]
    pub fn new(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: Modifiers::empty(),
            kind: KeyEventKind::Press,
            text: None,
            shifted: None,
            base_layout: None,
        }
    }

    #[must_use]
    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    #[must_use]
    pub fn with_kind(mut self, kind: KeyEventKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_owned());
        self
    }
}

/// Per-buffer Kitty flag stack (`CSI > u` push, `CSI < u` pop, `CSI = u` set).
#[derive(Debug, Clone, Default)]
pub struct KittyKeyboardState {
    flags: KittyFlags,
    stack: Vec<KittyFlags>,
}

/// The protocol caps the stack; pushes beyond it evict the oldest entry.
const MAX_STACK: usize = 32;

impl KittyKeyboardState {
    #[must_use]
    pub fn current(&self) -> KittyFlags {
        self.flags
    }

    pub fn push(&mut self, flags: KittyFlags) {
        if self.stack.len() >= MAX_STACK {
            self.stack.remove(0);
        }
        self.stack.push(self.flags);
        self.flags = flags;
    }

    pub fn pop(&mut self, count: usize) {
        for _ in 0..count.max(1) {
            match self.stack.pop() {
                Some(prev) => self.flags = prev,
                None => {
                    self.flags = KittyFlags::empty();
                    break;
                }
            }
        }
    }

    /// `CSI = flags ; mode u`: 1 = set, 2 = or-in, 3 = clear listed bits.
    pub fn set(&mut self, flags: KittyFlags, mode: i32) {
        match mode {
            2 => self.flags |= flags,
            3 => self.flags -= flags,
            _ => self.flags = flags,
        }
    }

    pub fn reset(&mut self) {
        self.flags = KittyFlags::empty();
        self.stack.clear();
    }
}

/// Mode context the encoder consults.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncodeContext {
    pub app_cursor: bool,
    pub app_keypad: bool,
    pub flags: KittyFlags,
}

/// Encode a key event, or `None` when nothing should be sent (unknown key,
/// or a release without report-events).
#[must_use]
pub fn encode_key(event: &KeyEvent, ctx: EncodeContext) -> Option<Vec<u8>> {
    let flags = ctx.flags;
    if event.kind == KeyEventKind::Release && !flags.contains(KittyFlags::REPORT_EVENTS) {
        return None;
    }

    if use_csi_u(event, flags) {
        return encode_csi_u(event, flags);
    }

    // Functional keys without a legacy form produce nothing outside the
    // progressive protocol.
    if functional_code(event.code).is_some() {
        return None;
    }

    encode_legacy(event, ctx)
}

// ---------------------------------------------------------------------------
// Legacy path
// ---------------------------------------------------------------------------

fn encode_legacy(event: &KeyEvent, ctx: EncodeContext) -> Option<Vec<u8>> {
    let mods = event.modifiers;
    let modifier_value = legacy_modifier_value(mods);

    // CSI/SS3 letter forms.
    if let Some(letter) = csi_letter(event.code) {
        return Some(if modifier_value > 1 {
            format!("\x1b[1;{modifier_value}{letter}").into_bytes()
        } else if ctx.app_cursor && matches!(letter, 'A'..='D' | 'H' | 'F') {
            format!("\x1bO{letter}").into_bytes()
        } else if matches!(letter, 'P'..='S') {
            // F1..F4 default to SS3 regardless of cursor mode.
            format!("\x1bO{letter}").into_bytes()
        } else {
            format!("\x1b[{letter}").into_bytes()
        });
    }

    // CSI ~ forms.
    if let Some(number) = tilde_number(event.code) {
        return Some(if modifier_value > 1 {
            format!("\x1b[{number};{modifier_value}~").into_bytes()
        } else {
            format!("\x1b[{number}~").into_bytes()
        });
    }

    match event.code {
        KeyCode::Enter => Some(prefix_alt(mods, vec![b'\r'])),
        KeyCode::Escape => Some(prefix_alt(mods, vec![0x1b])),
        KeyCode::Tab => {
            if mods.contains(Modifiers::SHIFT) {
                Some(b"\x1b[Z".to_vec())
            } else {
                Some(prefix_alt(mods, vec![b'\t']))
            }
        }
        KeyCode::Backspace => {
            let byte = if mods.contains(Modifiers::CTRL) { 0x08 } else { 0x7f };
            Some(prefix_alt(mods, vec![byte]))
        }
        KeyCode::Char(ch) => {
            if mods.contains(Modifiers::CTRL) {
                if let Some(byte) = ctrl_byte(ch) {
                    return Some(prefix_alt(mods, vec![byte]));
                }
            }
            let text = event
                .text
                .clone()
                .unwrap_or_else(|| ch.to_string());
            Some(prefix_alt(mods, text.into_bytes()))
        }
        _ => None,
    }
}

/// Alt prefixes the encoding with ESC.
fn prefix_alt(mods: Modifiers, mut bytes: Vec<u8>) -> Vec<u8> {
    if mods.contains(Modifiers::ALT) {
        bytes.insert(0, 0x1b);
    }
    bytes
}

/// The legacy modifier parameter: bitset value + 1.
fn legacy_modifier_value(mods: Modifiers) -> u8 {
    (mods & (Modifiers::SHIFT | Modifiers::ALT | Modifiers::CTRL | Modifiers::SUPER)).bits() + 1
}

/// Control-key mapping from characters to C0 bytes.
fn ctrl_byte(ch: char) -> Option<u8> {
    Some(match ch {
        ' ' | '@' | '2' => 0x00,
        'a'..='z' => ch as u8 - b'a' + 1,
        'A'..='Z' => ch.to_ascii_lowercase() as u8 - b'a' + 1,
        '[' | '3' => 0x1b,
        '\\' | '4' => 0x1c,
        ']' | '5' => 0x1d,
        '^' | '6' | '~' => 0x1e,
        '_' | '7' | '-' | '/' => 0x1f,
        '8' | '?' => 0x7f,
        _ => return None,
    })
}

/// Keys encoded as `CSI letter` / `SS3 letter`.
fn csi_letter(code: KeyCode) -> Option<char> {
    Some(match code {
        KeyCode::Up => 'A',
        KeyCode::Down => 'B',
        KeyCode::Right => 'C',
        KeyCode::Left => 'D',
        KeyCode::Home => 'H',
        KeyCode::End => 'F',
        KeyCode::F(1) => 'P',
        KeyCode::F(2) => 'Q',
        KeyCode::F(3) => 'R',
        KeyCode::F(4) => 'S',
        _ => return None,
    })
}

/// Keys encoded as `CSI number ~`.
fn tilde_number(code: KeyCode) -> Option<u8> {
    Some(match code {
        KeyCode::Insert => 2,
        KeyCode::Delete => 3,
        KeyCode::PageUp => 5,
        KeyCode::PageDown => 6,
        KeyCode::F(5) => 15,
        KeyCode::F(6) => 17,
        KeyCode::F(7) => 18,
        KeyCode::F(8) => 19,
        KeyCode::F(9) => 20,
        KeyCode::F(10) => 21,
        KeyCode::F(11) => 23,
        KeyCode::F(12) => 24,
        _ => return None,
    })
}

// ---------------------------------------------------------------------------
// Kitty progressive path
// ---------------------------------------------------------------------------

/// Kitty functional-key codepoints for keys with no legacy form.
fn functional_code(code: KeyCode) -> Option<u32> {
    Some(match code {
        KeyCode::CapsLock => 57358,
        KeyCode::ScrollLock => 57359,
        KeyCode::NumLock => 57360,
        KeyCode::PrintScreen => 57361,
        KeyCode::Pause => 57362,
        KeyCode::Menu => 57363,
        KeyCode::F(n @ 13..=35) => 57376 + (n as u32 - 13),
        KeyCode::Keypad(k) => match k {
            KeypadKey::Digit(d) => 57399 + (d as u32).min(9),
            KeypadKey::Decimal => 57409,
            KeypadKey::Divide => 57410,
            KeypadKey::Multiply => 57411,
            KeypadKey::Subtract => 57412,
            KeypadKey::Add => 57413,
            KeypadKey::Enter => 57414,
            KeypadKey::Equal => 57415,
        },
        KeyCode::Media(m) => match m {
            MediaKey::Play => 57428,
            MediaKey::Pause => 57429,
            MediaKey::PlayPause => 57430,
            MediaKey::Stop => 57432,
            MediaKey::FastForward => 57433,
            MediaKey::Rewind => 57434,
            MediaKey::TrackNext => 57435,
            MediaKey::TrackPrevious => 57436,
            MediaKey::LowerVolume => 57438,
            MediaKey::RaiseVolume => 57439,
            MediaKey::MuteVolume => 57440,
        },
        KeyCode::Modifier(m) => match m {
            ModifierKey::LeftShift => 57441,
            ModifierKey::LeftControl => 57442,
            ModifierKey::LeftAlt => 57443,
            ModifierKey::LeftSuper => 57444,
            ModifierKey::RightShift => 57447,
            ModifierKey::RightControl => 57448,
            ModifierKey::RightAlt => 57449,
            ModifierKey::RightSuper => 57450,
        },
        _ => return None,
    })
}

fn use_csi_u(event: &KeyEvent, flags: KittyFlags) -> bool {
    if flags.is_empty() {
        return false;
    }
    if flags.contains(KittyFlags::REPORT_ALL_AS_ESCAPE) {
        return true;
    }
    // Functional-range keys have no legacy form at all.
    if functional_code(event.code).is_some() {
        return true;
    }
    // Non-press events need the event field, which only the progressive
    // forms carry.
    if flags.contains(KittyFlags::REPORT_EVENTS) && event.kind != KeyEventKind::Press {
        return true;
    }
    if !flags.contains(KittyFlags::DISAMBIGUATE) {
        return false;
    }
    match event.code {
        // Escape is ambiguous with the sequence introducer.
        KeyCode::Escape => true,
        // Ctrl/Alt/Super text keys collide with C0 bytes and ESC prefixes.
        KeyCode::Char(_) => event
            .modifiers
            .intersects(Modifiers::CTRL | Modifiers::ALT | Modifiers::SUPER),
        // Enter/Tab/Backspace keep their legacy bytes unless modifiers or
        // non-press events need expressing.
        KeyCode::Enter | KeyCode::Tab | KeyCode::Backspace => {
            !event.modifiers.is_empty() || event.kind != KeyEventKind::Press
        }
        _ => event.kind != KeyEventKind::Press,
    }
}

fn encode_csi_u(event: &KeyEvent, flags: KittyFlags) -> Option<Vec<u8>> {
    // Keys with CSI letter / tilde forms keep them in the progressive
    // protocol; only the parameter layout changes.
    let modifier_value = kitty_modifier_value(event.modifiers);
    let event_suffix = if flags.contains(KittyFlags::REPORT_EVENTS)
        && event.kind != KeyEventKind::Press
    {
        format!(":{}", event.kind.kitty_event())
    } else {
        String::new()
    };
    let needs_modifier_field = modifier_value > 1 || !event_suffix.is_empty();

    if let Some(letter) = csi_letter(event.code) {
        return Some(if needs_modifier_field {
            format!("\x1b[1;{modifier_value}{event_suffix}{letter}").into_bytes()
        } else {
            format!("\x1b[{letter}").into_bytes()
        });
    }
    if let Some(number) = tilde_number(event.code) {
        return Some(if needs_modifier_field {
            format!("\x1b[{number};{modifier_value}{event_suffix}~").into_bytes()
        } else {
            format!("\x1b[{number}~").into_bytes()
        });
    }

    let keycode = match event.code {
        KeyCode::Char(ch) => ch as u32,
        KeyCode::Enter => 13,
        KeyCode::Escape => 27,
        KeyCode::Tab => 9,
        KeyCode::Backspace => 127,
        other => functional_code(other)?,
    };

    let mut body = keycode.to_string();
    if flags.contains(KittyFlags::REPORT_ALTERNATES) {
        let shifted = event.shifted.map(|c| c as u32);
        let base = event.base_layout.map(|c| c as u32);
        match (shifted, base) {
            (Some(s), Some(b)) => body.push_str(&format!(":{s}:{b}")),
            (Some(s), None) => body.push_str(&format!(":{s}")),
            (None, Some(b)) => body.push_str(&format!("::{b}")),
            (None, None) => {}
        }
    }

    let text_field = if flags.contains(KittyFlags::REPORT_TEXT)
        && event.kind != KeyEventKind::Release
    {
        event.text.as_deref().map(text_codepoints).filter(|s| !s.is_empty())
    } else {
        None
    };

    if needs_modifier_field || text_field.is_some() {
        body.push_str(&format!(";{modifier_value}{event_suffix}"));
    }
    if let Some(text) = text_field {
        body.push_str(&format!(";{text}"));
    }

    Some(format!("\x1b[{body}u").into_bytes())
}

fn kitty_modifier_value(mods: Modifiers) -> u16 {
    mods.bits() as u16 + 1
}

/// Text codepoints, colon-separated, with C0/C1 controls filtered out.
fn text_codepoints(text: &str) -> String {
    text.chars()
        .map(|c| c as u32)
        .filter(|&c| !(c < 0x20 || (0x7f..=0x9f).contains(&c)))
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(":")
}
