//! Palette color model: 16-bit-per-channel RGB, XParseColor syntax, and
//! the default 256-entry palette with its selectable base-16 schemes.
//!
//! This type is distinct from the per-cell attribute color
//! ([`Color`](crate::cell::Color)): OSC 4/10/11/12 traffic and palette
//! storage use the full 48-bit resolution X11 defines, while cells store
//! the compact attribute form.

use std::fmt;

/// A 48-bit RGB color (three 16-bit channels), as used by OSC color
/// queries and the palette table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb {
    pub r: u16,
    pub g: u16,
    pub b: u16,
}

impl Rgb {
    #[must_use]
    pub const fn new(r: u16, g: u16, b: u16) -> Self {
        Self { r, g, b }
    }

    /// Widen an 8-bit-per-channel color (0xAB becomes 0xABAB).
    #[must_use]
    pub const fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: (r as u16) << 8 | r as u16,
            g: (g as u16) << 8 | g as u16,
            b: (b as u16) << 8 | b as u16,
        }
    }

    /// Widen a packed `0xRRGGBB` value.
    #[must_use]
    pub const fn from_hex(rgb: u32) -> Self {
        Self::from_rgb8((rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8)
    }

    /// Narrow to 8 bits per channel (top byte of each channel).
    #[must_use]
    pub const fn to_rgb8(self) -> (u8, u8, u8) {
        ((self.r >> 8) as u8, (self.g >> 8) as u8, (self.b >> 8) as u8)
    }

    /// Parse an XParseColor string.
    ///
    /// Accepted forms: `#RGB`, `#RRGGBB`, `#RRRGGGBBB`, `#RRRRGGGGBBBB`,
    /// and `rgb:H/H/H` with 1..=4 hex digits per channel. `#` channels are
    /// left-justified (zero-filled on the right); `rgb:` channels are
    /// scaled to the full 16-bit range.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix('#') {
            if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return None;
            }
            let per = match hex.len() {
                3 => 1,
                6 => 2,
                9 => 3,
                12 => 4,
                _ => return None,
            };
            let chan = |i: usize| -> Option<u16> {
                let v = u16::from_str_radix(&hex[i * per..(i + 1) * per], 16).ok()?;
                // Left-justify: #A is A000, #AB is AB00, ...
                Some(v << (16 - 4 * per))
            };
            return Some(Self::new(chan(0)?, chan(1)?, chan(2)?));
        }
        if let Some(body) = s.strip_prefix("rgb:") {
            let mut parts = body.split('/');
            let mut chan = || -> Option<u16> {
                let p = parts.next()?;
                if p.is_empty() || p.len() > 4 || !p.chars().all(|c| c.is_ascii_hexdigit()) {
                    return None;
                }
                let v = u32::from_str_radix(p, 16).ok()?;
                let max = (1u32 << (4 * p.len() as u32)) - 1;
                // Scale to 16 bits, rounding.
                Some(((v * 0xFFFF + max / 2) / max) as u16)
            };
            let (r, g, b) = (chan()?, chan()?, chan()?);
            if parts.next().is_some() {
                return None;
            }
            return Some(Self::new(r, g, b));
        }
        None
    }
}

impl fmt::Display for Rgb {
    /// Canonical XParseColor form: `rgb:hhhh/hhhh/hhhh`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgb:{:04x}/{:04x}/{:04x}", self.r, self.g, self.b)
    }
}

/// Built-in base-16 schemes for the first sixteen palette entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NamedScheme {
    #[default]
    Default,
    Dracula,
    CatppuccinMocha,
    GruvboxDark,
    SolarizedDark,
    Tango,
    Vga,
    Xterm,
    TerminalApp,
}

impl NamedScheme {
    /// Look a scheme up by its user-facing name (case-insensitive).
    #[must_use]
    pub fn by_name(name: &str) -> Option<Self> {
        let folded: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        Some(match folded.as_str() {
            "default" => Self::Default,
            "dracula" => Self::Dracula,
            "catppuccinmocha" => Self::CatppuccinMocha,
            "gruvboxdark" => Self::GruvboxDark,
            "solarizeddark" => Self::SolarizedDark,
            "tango" => Self::Tango,
            "vga" => Self::Vga,
            "xterm" => Self::Xterm,
            "terminalapp" => Self::TerminalApp,
            _ => return None,
        })
    }

    /// The sixteen base colors: standard 0..=7 then bright 8..=15.
    #[must_use]
    pub fn base16(self) -> [Rgb; 16] {
        let hex: [u32; 16] = match self {
            // The xterm defaults double as the engine default.
            Self::Default | Self::Xterm => [
                0x000000, 0xcd0000, 0x00cd00, 0xcdcd00, 0x0000ee, 0xcd00cd, 0x00cdcd, 0xe5e5e5,
                0x7f7f7f, 0xff0000, 0x00ff00, 0xffff00, 0x5c5cff, 0xff00ff, 0x00ffff, 0xffffff,
            ],
            Self::Dracula => [
                0x21222c, 0xff5555, 0x50fa7b, 0xf1fa8c, 0xbd93f9, 0xff79c6, 0x8be9fd, 0xf8f8f2,
                0x6272a4, 0xff6e6e, 0x69ff94, 0xffffa5, 0xd6acff, 0xff92df, 0xa4ffff, 0xffffff,
            ],
            Self::CatppuccinMocha => [
                0x45475a, 0xf38ba8, 0xa6e3a1, 0xf9e2af, 0x89b4fa, 0xf5c2e7, 0x94e2d5, 0xbac2de,
                0x585b70, 0xf38ba8, 0xa6e3a1, 0xf9e2af, 0x89b4fa, 0xf5c2e7, 0x94e2d5, 0xa6adc8,
            ],
            Self::GruvboxDark => [
                0x282828, 0xcc241d, 0x98971a, 0xd79921, 0x458588, 0xb16286, 0x689d6a, 0xa89984,
                0x928374, 0xfb4934, 0xb8bb26, 0xfabd2f, 0x83a598, 0xd3869b, 0x8ec07c, 0xebdbb2,
            ],
            Self::SolarizedDark => [
                0x073642, 0xdc322f, 0x859900, 0xb58900, 0x268bd2, 0xd33682, 0x2aa198, 0xeee8d5,
                0x002b36, 0xcb4b16, 0x586e75, 0x657b83, 0x839496, 0x6c71c4, 0x93a1a1, 0xfdf6e3,
            ],
            Self::Tango => [
                0x000000, 0xcc0000, 0x4e9a06, 0xc4a000, 0x3465a4, 0x75507b, 0x06989a, 0xd3d7cf,
                0x555753, 0xef2929, 0x8ae234, 0xfce94f, 0x729fcf, 0xad7fa8, 0x34e2e2, 0xeeeeec,
            ],
            Self::Vga => [
                0x000000, 0xaa0000, 0x00aa00, 0xaa5500, 0x0000aa, 0xaa00aa, 0x00aaaa, 0xaaaaaa,
                0x555555, 0xff5555, 0x55ff55, 0xffff55, 0x5555ff, 0xff55ff, 0x55ffff, 0xffffff,
            ],
            Self::TerminalApp => [
                0x000000, 0x990000, 0x00a600, 0x999900, 0x0000b2, 0xb200b2, 0x00a6b2, 0xbfbfbf,
                0x666666, 0xe50000, 0x00d900, 0xe5e500, 0x0000ff, 0xe500e5, 0x00e5e5, 0xe5e5e5,
            ],
        };
        hex.map(Rgb::from_hex)
    }
}

/// Build the standard 256-entry palette: 16 base colors from the scheme,
/// the 6x6x6 color cube, then the 24-step grey ramp.
#[must_use]
pub fn default_palette(scheme: NamedScheme) -> [Rgb; 256] {
    const CUBE: [u8; 6] = [0x00, 0x5f, 0x87, 0xaf, 0xd7, 0xff];
    let mut palette = [Rgb::default(); 256];
    palette[..16].copy_from_slice(&scheme.base16());
    for i in 0..216 {
        let (r, g, b) = (CUBE[i / 36], CUBE[i / 6 % 6], CUBE[i % 6]);
        palette[16 + i] = Rgb::from_rgb8(r, g, b);
    }
    for i in 0..24u16 {
        let level = (8 + i * 10) as u8;
        palette[232 + i as usize] = Rgb::from_rgb8(level, level, level);
    }
    palette
}
