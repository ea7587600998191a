//! Terminal cell: the fundamental unit of the screen buffers.
//!
//! Each cell stores a character (plus any combining marks appended to it),
//! its display width, SGR attributes, and a 16-bit payload atom that can
//! reference a hyperlink target or an image placement through the
//! engine-scoped [`AtomRegistry`].

use bitflags::bitflags;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

bitflags! {
    /// SGR text attribute flags.
    ///
    /// Maps directly to the ECMA-48 / VT100 SGR parameter values.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SgrFlags: u16 {
        const BOLD        = 1 << 0;
        const DIM         = 1 << 1;
        const ITALIC      = 1 << 2;
        const UNDERLINE   = 1 << 3;
        const BLINK       = 1 << 4;
        const INVERSE     = 1 << 5;
        const INVISIBLE   = 1 << 6;
        const CROSSED_OUT = 1 << 7;
    }
}

bitflags! {
    /// Cell-level flags orthogonal to SGR attributes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CellFlags: u8 {
        /// Leading (left) cell of a wide, 2-column character.
        const WIDE_CHAR = 1 << 0;
        /// Trailing continuation of a wide character. Content is empty;
        /// rendering uses the leading cell.
        const WIDE_CONTINUATION = 1 << 1;
    }
}

/// Per-cell attribute color.
///
/// Distinct from the 48-bit [`Rgb`](crate::color::Rgb) palette color: cells
/// store the compact form the SGR grammar can express.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Color {
    /// Terminal default (SGR 39 / SGR 49).
    #[default]
    Default,
    /// Default with foreground/background swapped (reverse-video default).
    DefaultInverted,
    /// 256-color palette index: 0..=15 named, 16..=231 cube, 232..=255 grey.
    Ansi(u8),
    /// 24-bit true color.
    Rgb(u8, u8, u8),
}

/// SGR attributes for a cell: flags + foreground/background colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SgrAttrs {
    pub flags: SgrFlags,
    pub fg: Color,
    pub bg: Color,
    /// Underline color (SGR 58). `None` means use the foreground.
    pub underline_color: Option<Color>,
}

impl SgrAttrs {
    /// Reset all attributes to default (SGR 0).
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// The erase attribute derived from these attributes: current
    /// background, everything else default (used by ED/EL/ECH fills).
    #[must_use]
    pub fn erase_attrs(&self) -> Self {
        Self {
            bg: self.bg,
            ..Self::default()
        }
    }
}

/// Handle into the engine's payload atom table. Zero means "no payload".
pub type AtomId = u16;

/// A single cell in a buffer line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Cell {
    /// Base character. `None` for truly empty cells (the right half of a
    /// wide character, or padding created by column insertion).
    ch: Option<char>,
    /// Combining marks appended to the base character.
    zerowidth: SmallVec<[char; 2]>,
    /// Display width in columns (0, 1, or 2).
    width: u8,
    pub flags: CellFlags,
    pub attrs: SgrAttrs,
    /// Payload atom (0 = none): hyperlink or image placement reference.
    pub atom: AtomId,
}

impl Cell {
    /// A blank (space) cell with the given attributes.
    #[must_use]
    pub fn blank(attrs: SgrAttrs) -> Self {
        Self {
            ch: Some(' '),
            zerowidth: SmallVec::new(),
            width: 1,
            flags: CellFlags::empty(),
            attrs,
            atom: 0,
        }
    }

    /// A cell holding a single narrow character with default attributes.
    #[must_use]
    pub fn new(ch: char) -> Self {
        Self {
            ch: Some(ch),
            zerowidth: SmallVec::new(),
            width: 1,
            flags: CellFlags::empty(),
            attrs: SgrAttrs::default(),
            atom: 0,
        }
    }

    /// Leading + continuation pair for a wide (2-column) character.
    #[must_use]
    pub fn wide(ch: char, attrs: SgrAttrs) -> (Self, Self) {
        let leading = Self {
            ch: Some(ch),
            zerowidth: SmallVec::new(),
            width: 2,
            flags: CellFlags::WIDE_CHAR,
            attrs,
            atom: 0,
        };
        let continuation = Self {
            ch: None,
            zerowidth: SmallVec::new(),
            width: 0,
            flags: CellFlags::WIDE_CONTINUATION,
            attrs,
            atom: 0,
        };
        (leading, continuation)
    }

    /// The base character, if any. Empty continuation cells return `None`.
    #[must_use]
    pub fn content(&self) -> Option<char> {
        self.ch
    }

    /// The base character's scalar value, 0 for empty cells.
    ///
    /// This is the value DECRQCRA checksums and the selection layer see.
    #[must_use]
    pub fn code(&self) -> u32 {
        self.ch.map_or(0, |c| c as u32)
    }

    /// Display width in columns.
    #[must_use]
    pub fn width(&self) -> u8 {
        self.width
    }

    /// Combining marks attached to the base character.
    #[must_use]
    pub fn zerowidth(&self) -> &[char] {
        &self.zerowidth
    }

    /// The full grapheme cluster as a string (empty for continuations).
    #[must_use]
    pub fn grapheme(&self) -> String {
        let mut s = String::new();
        if let Some(ch) = self.ch {
            s.push(ch);
            s.extend(self.zerowidth.iter());
        }
        s
    }

    #[must_use]
    pub fn is_wide(&self) -> bool {
        self.flags.contains(CellFlags::WIDE_CHAR)
    }

    #[must_use]
    pub fn is_wide_continuation(&self) -> bool {
        self.flags.contains(CellFlags::WIDE_CONTINUATION)
    }

    /// Whether this cell renders as blank space (no visible content).
    #[must_use]
    pub fn is_blank(&self) -> bool {
        matches!(self.ch, None | Some(' ')) && self.zerowidth.is_empty()
    }

    /// Replace the content, clearing wide flags and combining marks.
    pub fn set_content(&mut self, ch: char, width: u8) {
        self.ch = Some(ch);
        self.width = width;
        self.zerowidth.clear();
        self.flags
            .remove(CellFlags::WIDE_CHAR | CellFlags::WIDE_CONTINUATION);
    }

    /// Append a combining mark to the grapheme cluster.
    pub fn push_zerowidth(&mut self, mark: char) {
        if self.ch.is_some() {
            self.zerowidth.push(mark);
        }
    }

    /// Reset to a blank space carrying the erase attribute.
    pub fn erase(&mut self, attrs: SgrAttrs) {
        self.ch = Some(' ');
        self.zerowidth.clear();
        self.width = 1;
        self.flags = CellFlags::empty();
        self.attrs = attrs.erase_attrs();
        self.atom = 0;
    }

    /// Reset to a blank space with fully default attributes.
    pub fn clear(&mut self) {
        *self = Self::blank(SgrAttrs::default());
    }
}

// ---------------------------------------------------------------------------
// Payload atoms
// ---------------------------------------------------------------------------

/// What a payload atom points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtomPayload {
    /// OSC 8 hyperlink: optional `id` parameter plus target URI.
    Hyperlink { id: Option<String>, uri: String },
    /// Kitty graphics placement reference.
    ImagePlacement { image_id: u32, placement_id: u32 },
}

/// Engine-scoped table mapping [`AtomId`]s to payloads.
///
/// Cells store compact atom ids instead of strings or placement records.
/// Unreferenced atoms are reclaimed by [`sweep`](Self::sweep), which the
/// dispatcher runs periodically: the caller collects every atom referenced
/// by a cell in either buffer, and the registry releases the rest in id
/// order starting from where the previous sweep left off.
#[derive(Debug, Clone, Default)]
pub struct AtomRegistry {
    slots: Vec<Option<AtomPayload>>,
    /// Dedup lookup for hyperlinks (`id` parameter + URI).
    links: FxHashMap<(Option<String>, String), AtomId>,
    free: Vec<AtomId>,
    /// Sweep cursor: id after the last one examined by the previous sweep.
    sweep_from: AtomId,
}

impl AtomRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: vec![None],
            links: FxHashMap::default(),
            free: Vec::new(),
            sweep_from: 1,
        }
    }

    fn allocate(&mut self, payload: AtomPayload) -> AtomId {
        if let Some(id) = self.free.pop() {
            self.slots[id as usize] = Some(payload);
            return id;
        }
        let next = self.slots.len();
        if next > AtomId::MAX as usize {
            // Table exhausted; the sweep will reclaim ids eventually.
            return 0;
        }
        self.slots.push(Some(payload));
        next as AtomId
    }

    /// Intern a hyperlink, deduplicating on `(id, uri)`.
    ///
    /// Empty URIs return 0 ("no link").
    pub fn intern_hyperlink(&mut self, id: Option<&str>, uri: &str) -> AtomId {
        if uri.is_empty() {
            return 0;
        }
        let key = (id.map(str::to_owned), uri.to_owned());
        if let Some(&atom) = self.links.get(&key) {
            return atom;
        }
        let atom = self.allocate(AtomPayload::Hyperlink {
            id: key.0.clone(),
            uri: key.1.clone(),
        });
        if atom != 0 {
            self.links.insert(key, atom);
        }
        atom
    }

    /// Intern an image placement reference.
    pub fn intern_placement(&mut self, image_id: u32, placement_id: u32) -> AtomId {
        self.allocate(AtomPayload::ImagePlacement {
            image_id,
            placement_id,
        })
    }

    /// Look up the payload for an atom id.
    #[must_use]
    pub fn get(&self, atom: AtomId) -> Option<&AtomPayload> {
        self.slots.get(atom as usize)?.as_ref()
    }

    /// Number of live atoms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Release every atom not present in `referenced`, scanning in id order
    /// starting from the previous sweep position and wrapping once.
    ///
    /// `keep` protects atoms that are referenced outside cell storage (the
    /// currently-open hyperlink, for instance).
    pub fn sweep(&mut self, referenced: &FxHashSet<AtomId>, keep: &[AtomId]) {
        let len = self.slots.len();
        if len <= 1 {
            return;
        }
        let start = (self.sweep_from as usize).clamp(1, len - 1);
        let mut released = 0usize;
        for step in 0..len - 1 {
            let idx = 1 + (start - 1 + step) % (len - 1);
            let id = idx as AtomId;
            if referenced.contains(&id) || keep.contains(&id) {
                continue;
            }
            if let Some(payload) = self.slots[idx].take() {
                if let AtomPayload::Hyperlink { id: link_id, uri } = payload {
                    self.links.remove(&(link_id, uri));
                }
                self.free.push(id);
                released += 1;
            }
        }
        self.sweep_from = if start + 1 >= len { 1 } else { start as AtomId + 1 };
        if released > 0 {
            tracing::trace!(released, "atom sweep reclaimed payloads");
        }
    }

    /// Drop everything (full reset).
    pub fn clear(&mut self) {
        self.slots.clear();
        self.slots.push(None);
        self.links.clear();
        self.free.clear();
        self.sweep_from = 1;
    }
}
