//! Kitty graphics APC command parsing.
//!
//! An APC graphics payload has the shape `G key=value,key=value,…;base64`.
//! This module turns the raw bytes into a typed [`GraphicsCommand`]; the
//! engine in [`super`] interprets it.

/// Transmission medium for image data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transmission {
    /// `t=d`: data inline in the payload.
    #[default]
    Direct,
    /// `t=f`: payload is a file path.
    File,
    /// `t=t`: payload is a temporary file path, deleted after reading.
    TempFile,
    /// `t=s`: payload is a POSIX shared-memory object name.
    SharedMemory,
}

/// Pixel format of transmitted data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// `f=24`: packed RGB.
    Rgb,
    /// `f=32`: packed RGBA (the default).
    #[default]
    Rgba,
    /// `f=100`: PNG.
    Png,
}

/// A parsed graphics command.
///
/// Field names follow the protocol keys; unset keys hold their documented
/// defaults (mostly zero).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphicsCommand {
    /// `a`: action (t, T, p, d, D, q). Default `t`.
    pub action: u8,
    /// `q`: quiet level (0 = respond, 1 = no OK, 2 = silent).
    pub quiet: u8,
    pub format: Format,
    pub transmission: Transmission,
    /// `i` / `I`: image id / image number.
    pub image_id: u32,
    pub image_number: u32,
    /// `p`: placement id.
    pub placement_id: u32,
    /// `P` / `Q`: parent image / parent placement for relative placement.
    pub parent_image: u32,
    pub parent_placement: u32,
    /// `s` / `v`: transmitted width / height in pixels.
    pub pix_width: u32,
    pub pix_height: u32,
    /// `x` / `y` / `w` / `h`: source crop rectangle.
    pub crop_x: u32,
    pub crop_y: u32,
    pub crop_w: u32,
    pub crop_h: u32,
    /// `c` / `r`: destination size in cells.
    pub cols: u32,
    pub rows: u32,
    /// `z`: z-index (negative draws under text).
    pub z_index: i32,
    /// `m`: more chunks follow.
    pub more: bool,
    /// `o=z`: payload is zlib-deflated.
    pub zlib: bool,
    /// `C`: cursor movement policy (0 = advance, 1 = stay).
    pub cursor_policy: u8,
    /// `d`: delete mode letter (defaults to `a`).
    pub delete_mode: u8,
    /// `U`: create a virtual placement for Unicode placeholders.
    pub unicode_placeholder: bool,
    /// `O` / `S`: read offset / size for file transmissions.
    pub file_offset: u32,
    pub file_size: u32,
    /// `X` / `Y`: pixel offset within the first cell (or parent-relative).
    pub pixel_x: i32,
    pub pixel_y: i32,
    /// `H` / `V`: cell offset relative to the parent placement.
    pub offset_h: i32,
    pub offset_v: i32,
    /// Raw base64 payload after the `;`.
    pub payload: Vec<u8>,
}

impl GraphicsCommand {
    /// Parse an APC payload (without the leading `G`).
    ///
    /// Unknown keys are skipped; malformed values abort the parse.
    #[must_use]
    pub fn parse(data: &[u8]) -> Option<Self> {
        let mut cmd = Self {
            action: b't',
            delete_mode: b'a',
            ..Self::default()
        };

        let (control, payload) = match data.iter().position(|&b| b == b';') {
            Some(at) => (&data[..at], &data[at + 1..]),
            None => (data, &[][..]),
        };
        cmd.payload = payload.to_vec();

        for pair in control.split(|&b| b == b',') {
            if pair.is_empty() {
                continue;
            }
            let eq = pair.iter().position(|&b| b == b'=')?;
            let (key, value) = (&pair[..eq], &pair[eq + 1..]);
            if key.len() != 1 {
                return None;
            }
            match key[0] {
                b'a' => cmd.action = single_letter(value)?,
                b'q' => cmd.quiet = number(value)? as u8,
                b'f' => {
                    cmd.format = match number(value)? {
                        24 => Format::Rgb,
                        32 => Format::Rgba,
                        100 => Format::Png,
                        _ => return None,
                    }
                }
                b't' => {
                    cmd.transmission = match single_letter(value)? {
                        b'd' => Transmission::Direct,
                        b'f' => Transmission::File,
                        b't' => Transmission::TempFile,
                        b's' => Transmission::SharedMemory,
                        _ => return None,
                    }
                }
                b'i' => cmd.image_id = number(value)? as u32,
                b'I' => cmd.image_number = number(value)? as u32,
                b'p' => cmd.placement_id = number(value)? as u32,
                b'P' => cmd.parent_image = number(value)? as u32,
                b'Q' => cmd.parent_placement = number(value)? as u32,
                b's' => cmd.pix_width = number(value)? as u32,
                b'v' => cmd.pix_height = number(value)? as u32,
                b'x' => cmd.crop_x = number(value)? as u32,
                b'y' => cmd.crop_y = number(value)? as u32,
                b'w' => cmd.crop_w = number(value)? as u32,
                b'h' => cmd.crop_h = number(value)? as u32,
                b'c' => cmd.cols = number(value)? as u32,
                b'r' => cmd.rows = number(value)? as u32,
                b'z' => cmd.z_index = number(value)? as i32,
                b'm' => cmd.more = number(value)? != 0,
                b'o' => cmd.zlib = single_letter(value)? == b'z',
                b'C' => cmd.cursor_policy = number(value)? as u8,
                b'd' => cmd.delete_mode = single_letter(value)?,
                b'U' => cmd.unicode_placeholder = number(value)? != 0,
                b'O' => cmd.file_offset = number(value)? as u32,
                b'S' => cmd.file_size = number(value)? as u32,
                b'X' => cmd.pixel_x = number(value)? as i32,
                b'Y' => cmd.pixel_y = number(value)? as i32,
                b'H' => cmd.offset_h = number(value)? as i32,
                b'V' => cmd.offset_v = number(value)? as i32,
                other => {
                    tracing::trace!(key = %(other as char), "unknown graphics key skipped");
                }
            }
        }
        Some(cmd)
    }
}

fn number(value: &[u8]) -> Option<i64> {
    let s = std::str::from_utf8(value).ok()?;
    s.parse::<i64>().ok()
}

fn single_letter(value: &[u8]) -> Option<u8> {
    if value.len() == 1 && value[0].is_ascii_alphanumeric() {
        Some(value[0])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_transmit_and_display() {
        let cmd = GraphicsCommand::parse(b"a=T,f=32,s=2,v=2,i=1;AAAA").unwrap();
        assert_eq!(cmd.action, b'T');
        assert_eq!(cmd.format, Format::Rgba);
        assert_eq!(cmd.pix_width, 2);
        assert_eq!(cmd.pix_height, 2);
        assert_eq!(cmd.image_id, 1);
        assert_eq!(cmd.payload, b"AAAA");
    }

    #[test]
    fn defaults() {
        let cmd = GraphicsCommand::parse(b"i=5").unwrap();
        assert_eq!(cmd.action, b't');
        assert_eq!(cmd.format, Format::Rgba);
        assert_eq!(cmd.transmission, Transmission::Direct);
        assert_eq!(cmd.delete_mode, b'a');
        assert!(!cmd.more);
    }

    #[test]
    fn parse_placement_keys() {
        let cmd = GraphicsCommand::parse(b"a=p,i=3,p=7,c=10,r=4,z=-1,C=1").unwrap();
        assert_eq!(cmd.action, b'p');
        assert_eq!(cmd.placement_id, 7);
        assert_eq!(cmd.cols, 10);
        assert_eq!(cmd.rows, 4);
        assert_eq!(cmd.z_index, -1);
        assert_eq!(cmd.cursor_policy, 1);
    }

    #[test]
    fn parse_parent_reference() {
        let cmd = GraphicsCommand::parse(b"a=p,i=2,P=1,Q=4,H=3,V=-2").unwrap();
        assert_eq!(cmd.parent_image, 1);
        assert_eq!(cmd.parent_placement, 4);
        assert_eq!(cmd.offset_h, 3);
        assert_eq!(cmd.offset_v, -2);
    }

    #[test]
    fn malformed_value_rejects_command() {
        assert!(GraphicsCommand::parse(b"a=T,i=abc").is_none());
        assert!(GraphicsCommand::parse(b"f=99").is_none());
        assert!(GraphicsCommand::parse(b"t=x").is_none());
    }

    #[test]
    fn unknown_keys_are_skipped() {
        let cmd = GraphicsCommand::parse(b"a=q,i=1,\xC3\xA4=9;xx");
        // Multi-byte key fails the single-byte rule.
        assert!(cmd.is_none());
        let cmd = GraphicsCommand::parse(b"a=q,i=1,e=9;xx").unwrap();
        assert_eq!(cmd.image_id, 1);
    }

    #[test]
    fn empty_payload_allowed() {
        let cmd = GraphicsCommand::parse(b"a=d,d=i,i=2").unwrap();
        assert_eq!(cmd.action, b'd');
        assert_eq!(cmd.delete_mode, b'i');
        assert!(cmd.payload.is_empty());
    }
}
