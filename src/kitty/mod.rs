//! Kitty graphics protocol: image transmission, placements, deletion, and
//! Unicode placeholders.
//!
//! APC payloads arrive from the parser via the dispatcher; this module
//! owns the image cache and the placement table and answers on the same
//! APC channel (`ESC _ G … ESC \`). Placement records are anchored at
//! buffer-absolute rows so they scroll with the content that created them.
//!
//! # Failure modes
//!
//! | Failure | Behavior |
//! |---|---|
//! | Malformed command | Logged, no state change, no response |
//! | Unknown image | `ENOENT` response |
//! | Missing parent placement | `ENOPARENT` response |
//! | Bad payload / dimensions | `EINVAL` response |
//! | Over the byte budget | LRU eviction, unused images first |

pub mod cache;
pub mod command;

use std::io::Read;
use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use rustc_hash::{FxHashMap, FxHashSet};

pub use cache::{ImageCache, ImageData, ImageEntry, MAX_CACHE_BYTES, MAX_IMAGE_BYTES, MAX_IMAGE_DIM};
pub use command::{Format, GraphicsCommand, Transmission};

/// The Unicode placeholder scalar (U+10EEEE).
pub const PLACEHOLDER: char = '\u{10EEEE}';

/// Marker required in temporary-file paths before the engine will read them.
const TEMP_MARKER: &str = "tty-graphics-protocol";

/// Placement ids synthesized for placeholder cells start here, well above
/// anything applications assign explicitly.
const PLACEHOLDER_PID_BASE: u32 = 0xfff0_0000;

/// Reference to a parent placement for relative positioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentRef {
    pub image_id: u32,
    pub placement_id: u32,
    /// Cell offsets relative to the parent's resolved position.
    pub offset_h: i32,
    pub offset_v: i32,
    /// Additional pixel offsets within the target cell.
    pub pixel_x: i32,
    pub pixel_y: i32,
}

/// A positioned drawing of a stored image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub image_id: u32,
    pub placement_id: u32,
    /// Buffer-absolute anchor row and column. Ignored when `parent` is
    /// set; the resolved position comes from the parent chain.
    pub row: usize,
    pub col: usize,
    /// Size in cells.
    pub rows: usize,
    pub cols: usize,
    pub z_index: i32,
    /// Virtual placements render nothing themselves; they size and anchor
    /// placeholder cells and child placements.
    pub is_virtual: bool,
    pub is_alternate_buffer: bool,
    pub parent: Option<ParentRef>,
    /// Source crop rectangle in pixels (zero width/height = whole image).
    pub crop: (u32, u32, u32, u32),
    /// Created by placeholder cells rather than an explicit `a=p`.
    pub from_placeholder: bool,
}

/// Everything the dispatcher needs to know about where graphics land.
#[derive(Debug, Clone, Copy)]
pub struct GraphicsContext {
    /// Cursor position: buffer-absolute row, viewport column.
    pub cursor_abs_row: usize,
    pub cursor_col: usize,
    /// First visible row (for delete coordinates given in screen cells).
    pub y_base: usize,
    /// Cell size estimate in pixels for cell-count derivation.
    pub cell_width: u32,
    pub cell_height: u32,
    pub alt_active: bool,
}

/// Result of processing one APC command.
#[derive(Debug, Default)]
pub struct GraphicsOutcome {
    /// Response bytes for the host, if the quiet level allows one.
    pub response: Option<Vec<u8>>,
    /// A newly created visible placement the dispatcher should anchor.
    pub placement: Option<Placement>,
    /// Cursor advance in (rows, cols) requested by a display action.
    pub advance: Option<(usize, usize)>,
    /// Placement keys removed; the dispatcher unanchors them from lines.
    pub removed: Vec<(u32, u32)>,
}

#[derive(Debug, Clone)]
struct PendingTransmission {
    cmd: GraphicsCommand,
    payload: Vec<u8>,
}

/// The graphics subsystem.
#[derive(Debug)]
pub struct Graphics {
    cache: ImageCache,
    placements: FxHashMap<(u32, u32), Placement>,
    pending: Option<PendingTransmission>,
    next_placeholder_pid: u32,
}

impl Graphics {
    #[must_use]
    pub fn new(cache_limit: usize) -> Self {
        Self {
            cache: ImageCache::new(cache_limit),
            placements: FxHashMap::default(),
            pending: None,
            next_placeholder_pid: PLACEHOLDER_PID_BASE,
        }
    }

    #[must_use]
    pub fn cache(&self) -> &ImageCache {
        &self.cache
    }

    #[must_use]
    pub fn placement(&self, image_id: u32, placement_id: u32) -> Option<&Placement> {
        self.placements.get(&(image_id, placement_id))
    }

    pub fn placements(&self) -> impl Iterator<Item = &Placement> {
        self.placements.values()
    }

    /// Remove a single placement record (placeholder re-anchoring).
    pub fn remove_placement(&mut self, key: (u32, u32)) {
        self.placements.remove(&key);
    }

    /// Drop all state (full reset).
    pub fn reset(&mut self) {
        self.cache.clear();
        self.placements.clear();
        self.pending = None;
        self.next_placeholder_pid = PLACEHOLDER_PID_BASE;
    }

    /// Process one complete APC `G` payload.
    pub fn accept(&mut self, data: &[u8], ctx: &GraphicsContext) -> GraphicsOutcome {
        let Some(cmd) = GraphicsCommand::parse(data) else {
            tracing::debug!("malformed graphics command ignored");
            return GraphicsOutcome::default();
        };

        // Chunked transmission: accumulate until the final chunk.
        if self.pending.is_some() {
            if let Some(pending) = &mut self.pending {
                pending.payload.extend_from_slice(&cmd.payload);
                if pending.payload.len() > MAX_IMAGE_BYTES.saturating_mul(2) {
                    tracing::debug!("oversized chunked transmission dropped");
                    self.pending = None;
                    return GraphicsOutcome::default();
                }
            }
            if cmd.more {
                return GraphicsOutcome::default();
            }
            if let Some(pending) = self.pending.take() {
                let mut full = pending.cmd;
                full.payload = pending.payload;
                return self.dispatch(full, ctx);
            }
            return GraphicsOutcome::default();
        }
        if cmd.more && matches!(cmd.action, b't' | b'T' | b'q' | b'f') {
            let payload = cmd.payload.clone();
            self.pending = Some(PendingTransmission { cmd, payload });
            return GraphicsOutcome::default();
        }

        self.dispatch(cmd, ctx)
    }

    fn dispatch(&mut self, cmd: GraphicsCommand, ctx: &GraphicsContext) -> GraphicsOutcome {
        match cmd.action {
            b't' | b'T' | b'q' => self.transmit(cmd, ctx),
            b'p' => self.place(cmd, ctx),
            b'd' | b'D' => self.delete(cmd, ctx),
            other => {
                tracing::debug!(action = %(other as char), "unsupported graphics action");
                let mut out = GraphicsOutcome::default();
                out.response = respond(&cmd, cmd.image_id, cmd.image_number, "ENOTSUP");
                out
            }
        }
    }

    // ── Transmission ────────────────────────────────────────────────

    fn transmit(&mut self, cmd: GraphicsCommand, ctx: &GraphicsContext) -> GraphicsOutcome {
        let mut out = GraphicsOutcome::default();

        let bytes = match self.load_payload(&cmd) {
            Ok(bytes) => bytes,
            Err(err) => {
                out.response = respond(&cmd, cmd.image_id, cmd.image_number, err);
                return out;
            }
        };

        let (data, width, height) = match validate(&cmd, bytes) {
            Ok(v) => v,
            Err(err) => {
                out.response = respond(&cmd, cmd.image_id, cmd.image_number, err);
                return out;
            }
        };

        // Query validates without storing.
        if cmd.action == b'q' {
            out.response = respond(&cmd, cmd.image_id, cmd.image_number, "OK");
            return out;
        }

        let id = if cmd.image_id != 0 {
            cmd.image_id
        } else {
            self.cache.allocate_id()
        };

        let used = self.referenced_images();
        let evicted = self
            .cache
            .insert(id, cmd.image_number, data, width, height, &used);
        for gone in evicted {
            self.drop_placements_of(gone, &mut out.removed);
        }

        if cmd.action == b'T' {
            let mut place_cmd = cmd.clone();
            place_cmd.image_id = id;
            place_cmd.image_number = 0;
            let place_out = self.place(place_cmd, ctx);
            out.placement = place_out.placement;
            out.advance = place_out.advance;
            out.removed.extend(place_out.removed);
            out.response = place_out.response;
        } else {
            out.response = respond(&cmd, id, cmd.image_number, "OK");
        }
        out
    }

    /// Decode base64, inflate, and fetch file payloads with the path policy.
    fn load_payload(&self, cmd: &GraphicsCommand) -> Result<Vec<u8>, &'static str> {
        let decoded = BASE64
            .decode(&cmd.payload)
            .map_err(|_| "EINVAL:invalid base64")?;

        let raw = match cmd.transmission {
            Transmission::Direct => decoded,
            Transmission::File | Transmission::TempFile => {
                let path = String::from_utf8(decoded).map_err(|_| "EINVAL:bad path")?;
                read_image_file(&path, cmd, cmd.transmission == Transmission::TempFile)?
            }
            Transmission::SharedMemory => {
                let name = String::from_utf8(decoded).map_err(|_| "EINVAL:bad path")?;
                let path = format!("/dev/shm/{}", name.trim_start_matches('/'));
                read_image_file(&path, cmd, false)?
            }
        };

        if cmd.zlib {
            let mut inflated = Vec::new();
            let mut decoder = flate2::read::ZlibDecoder::new(raw.as_slice());
            decoder
                .by_ref()
                .take(MAX_IMAGE_BYTES as u64 + 1)
                .read_to_end(&mut inflated)
                .map_err(|_| "EINVAL:bad zlib stream")?;
            Ok(inflated)
        } else {
            Ok(raw)
        }
    }

    fn referenced_images(&self) -> FxHashSet<u32> {
        self.placements.values().map(|p| p.image_id).collect()
    }

    fn drop_placements_of(&mut self, image_id: u32, removed: &mut Vec<(u32, u32)>) {
        let keys: Vec<(u32, u32)> = self
            .placements
            .keys()
            .filter(|(id, _)| *id == image_id)
            .copied()
            .collect();
        for key in keys {
            self.placements.remove(&key);
            removed.push(key);
        }
    }

    // ── Placement ───────────────────────────────────────────────────

    fn place(&mut self, cmd: GraphicsCommand, ctx: &GraphicsContext) -> GraphicsOutcome {
        let mut out = GraphicsOutcome::default();

        let Some(id) = self.resolve_id(&cmd) else {
            out.response = respond(&cmd, cmd.image_id, cmd.image_number, "ENOENT:no such image");
            return out;
        };
        let Some(entry) = self.cache.touch(id) else {
            out.response = respond(&cmd, id, cmd.image_number, "ENOENT:no such image");
            return out;
        };
        let (img_w, img_h) = (entry.width, entry.height);

        let parent = if cmd.parent_image != 0 || cmd.parent_placement != 0 {
            let key = (cmd.parent_image, cmd.parent_placement);
            if !self.placements.contains_key(&key) {
                out.response = respond(&cmd, id, cmd.image_number, "ENOPARENT:no such parent");
                return out;
            }
            Some(ParentRef {
                image_id: cmd.parent_image,
                placement_id: cmd.parent_placement,
                offset_h: cmd.offset_h,
                offset_v: cmd.offset_v,
                pixel_x: cmd.pixel_x,
                pixel_y: cmd.pixel_y,
            })
        } else {
            None
        };

        // Destination size in cells: explicit c/r, else derived from the
        // (cropped) pixel size.
        let src_w = if cmd.crop_w != 0 { cmd.crop_w } else { img_w };
        let src_h = if cmd.crop_h != 0 { cmd.crop_h } else { img_h };
        let cols = if cmd.cols != 0 {
            cmd.cols as usize
        } else {
            (src_w.div_ceil(ctx.cell_width.max(1))).max(1) as usize
        };
        let rows = if cmd.rows != 0 {
            cmd.rows as usize
        } else {
            (src_h.div_ceil(ctx.cell_height.max(1))).max(1) as usize
        };

        let placement = Placement {
            image_id: id,
            placement_id: cmd.placement_id,
            row: ctx.cursor_abs_row,
            col: ctx.cursor_col,
            rows,
            cols,
            z_index: cmd.z_index,
            is_virtual: cmd.unicode_placeholder,
            is_alternate_buffer: ctx.alt_active,
            parent,
            crop: (cmd.crop_x, cmd.crop_y, cmd.crop_w, cmd.crop_h),
            from_placeholder: false,
        };

        let key = (id, cmd.placement_id);
        if self.placements.insert(key, placement.clone()).is_some() {
            out.removed.push(key);
        }

        // Parent chains must stay acyclic; undo the insert if it loops.
        if placement.parent.is_some() && self.resolve_position(key).is_none() {
            self.placements.remove(&key);
            out.response = respond(&cmd, id, cmd.image_number, "EINVAL:cyclic parent chain");
            return out;
        }

        if !placement.is_virtual && placement.parent.is_none() && cmd.cursor_policy == 0 {
            out.advance = Some((rows.saturating_sub(1), cols));
        }
        out.placement = Some(placement);
        out.response = respond(&cmd, id, cmd.image_number, "OK");
        out
    }

    fn resolve_id(&self, cmd: &GraphicsCommand) -> Option<u32> {
        if cmd.image_id != 0 {
            self.cache.contains(cmd.image_id).then_some(cmd.image_id)
        } else if cmd.image_number != 0 {
            self.cache.id_for_number(cmd.image_number)
        } else {
            None
        }
    }

    /// Resolve a placement's effective position, following parent links.
    ///
    /// Returns `None` for unknown placements, broken parent chains, and
    /// cycles (detected with a visiting set).
    #[must_use]
    pub fn resolve_position(&self, key: (u32, u32)) -> Option<(i64, i64)> {
        let mut visited = FxHashSet::default();
        let mut row: i64 = 0;
        let mut col: i64 = 0;
        let mut current = key;
        loop {
            if !visited.insert(current) {
                return None;
            }
            let placement = self.placements.get(&current)?;
            match placement.parent {
                Some(parent) => {
                    row += placement_offset_v(placement);
                    col += placement_offset_h(placement);
                    current = (parent.image_id, parent.placement_id);
                }
                None => {
                    return Some((row + placement.row as i64, col + placement.col as i64));
                }
            }
        }
    }

    // ── Deletion ────────────────────────────────────────────────────

    fn delete(&mut self, cmd: GraphicsCommand, ctx: &GraphicsContext) -> GraphicsOutcome {
        let mut out = GraphicsOutcome::default();
        let mode = cmd.delete_mode;
        let free_data = cmd.action == b'D' || mode.is_ascii_uppercase();
        let mode = mode.to_ascii_lowercase();

        let cursor = (ctx.cursor_abs_row as i64, ctx.cursor_col as i64);
        let cell = (
            ctx.y_base as i64 + cmd.crop_y.saturating_sub(1) as i64,
            cmd.crop_x.saturating_sub(1) as i64,
        );

        let keys: Vec<(u32, u32)> = self
            .placements
            .iter()
            .filter(|(key, p)| match mode {
                b'a' => p.is_alternate_buffer == ctx.alt_active && !p.is_virtual,
                b'i' => {
                    p.image_id == cmd.image_id
                        && (cmd.placement_id == 0 || p.placement_id == cmd.placement_id)
                }
                b'n' => {
                    self.cache.id_for_number(cmd.image_number) == Some(p.image_id)
                        && (cmd.placement_id == 0 || p.placement_id == cmd.placement_id)
                }
                b'c' => self.intersects(**key, cursor),
                b'p' => self.intersects(**key, cell),
                b'q' => self.intersects(**key, cell) && p.z_index == cmd.z_index,
                b'x' => self.covers_col(**key, cmd.crop_x.saturating_sub(1) as i64),
                b'y' => self.covers_row(**key, ctx.y_base as i64 + cmd.crop_y.saturating_sub(1) as i64),
                b'z' => p.z_index == cmd.z_index,
                b'r' => p.image_id >= cmd.crop_x && p.image_id <= cmd.crop_y,
                other => {
                    tracing::debug!(mode = %(other as char), "unknown delete mode");
                    false
                }
            })
            .map(|(key, _)| *key)
            .collect();

        let mut affected_images = FxHashSet::default();
        for key in keys {
            if let Some(placement) = self.placements.remove(&key) {
                affected_images.insert(placement.image_id);
                out.removed.push(key);
            }
        }

        if free_data {
            let still_used = self.referenced_images();
            for image in affected_images {
                if !still_used.contains(&image) {
                    self.cache.remove(image);
                }
            }
        }
        out
    }

    fn intersects(&self, key: (u32, u32), cell: (i64, i64)) -> bool {
        let Some(placement) = self.placements.get(&key) else {
            return false;
        };
        if placement.is_virtual {
            return false;
        }
        let Some((row, col)) = self.resolve_position(key) else {
            return false;
        };
        cell.0 >= row
            && cell.0 < row + placement.rows as i64
            && cell.1 >= col
            && cell.1 < col + placement.cols as i64
    }

    fn covers_col(&self, key: (u32, u32), target: i64) -> bool {
        let Some(placement) = self.placements.get(&key) else {
            return false;
        };
        let Some((_, col)) = self.resolve_position(key) else {
            return false;
        };
        !placement.is_virtual && target >= col && target < col + placement.cols as i64
    }

    fn covers_row(&self, key: (u32, u32), target: i64) -> bool {
        let Some(placement) = self.placements.get(&key) else {
            return false;
        };
        let Some((row, _)) = self.resolve_position(key) else {
            return false;
        };
        !placement.is_virtual && target >= row && target < row + placement.rows as i64
    }

    // ── Unicode placeholders ────────────────────────────────────────

    /// Register (or extend) a placement for a placeholder cell.
    ///
    /// `image_id` comes from the cell's foreground color (plus the msb
    /// diacritic); `row_d`/`col_d` are the decoded diacritic indices. The
    /// anchor is derived so that cells of the same image coalesce into one
    /// placement record.
    pub fn placeholder(
        &mut self,
        image_id: u32,
        row_d: u32,
        col_d: u32,
        abs_row: usize,
        col: usize,
        alt_active: bool,
    ) -> Option<(u32, u32)> {
        // A virtual placement provides size; without one the placeholder
        // cell stays inert.
        let (rows, cols, z_index) = {
            let virt = self
                .placements
                .values()
                .find(|p| p.is_virtual && p.image_id == image_id)?;
            (virt.rows, virt.cols, virt.z_index)
        };

        let anchor_row = abs_row.checked_sub(row_d as usize)?;
        let anchor_col = col.checked_sub(col_d as usize)?;

        if let Some(existing) = self.placements.values().find(|p| {
            p.from_placeholder
                && p.image_id == image_id
                && p.row == anchor_row
                && p.col == anchor_col
        }) {
            return Some((existing.image_id, existing.placement_id));
        }

        let pid = self.next_placeholder_pid;
        self.next_placeholder_pid = self.next_placeholder_pid.wrapping_add(1).max(PLACEHOLDER_PID_BASE);
        let key = (image_id, pid);
        self.placements.insert(
            key,
            Placement {
                image_id,
                placement_id: pid,
                row: anchor_row,
                col: anchor_col,
                rows,
                cols,
                z_index,
                is_virtual: false,
                is_alternate_buffer: alt_active,
                parent: None,
                crop: (0, 0, 0, 0),
                from_placeholder: true,
            },
        );
        self.cache.touch(image_id);
        Some(key)
    }
}

fn placement_offset_v(placement: &Placement) -> i64 {
    placement
        .parent
        .map_or(0, |parent| parent.offset_v as i64)
}

fn placement_offset_h(placement: &Placement) -> i64 {
    placement
        .parent
        .map_or(0, |parent| parent.offset_h as i64)
}

/// Build the APC response, honoring the quiet level.
fn respond(cmd: &GraphicsCommand, id: u32, number: u32, message: &str) -> Option<Vec<u8>> {
    let ok = message == "OK";
    if (ok && cmd.quiet >= 1) || (!ok && cmd.quiet >= 2) {
        return None;
    }
    let mut body = format!("i={id}");
    if number != 0 {
        body.push_str(&format!(",I={number}"));
    }
    Some(format!("\x1b_G{body};{message}\x1b\\").into_bytes())
}

/// Validate a decoded payload against the declared format.
fn validate(
    cmd: &GraphicsCommand,
    bytes: Vec<u8>,
) -> Result<(ImageData, u32, u32), &'static str> {
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err("EINVAL:image too large");
    }
    match cmd.format {
        Format::Png => {
            use image::ImageDecoder;
            let decoder = image::codecs::png::PngDecoder::new(std::io::Cursor::new(&bytes))
                .map_err(|_| "EINVAL:bad png data")?;
            let (width, height) = decoder.dimensions();
            if width > MAX_IMAGE_DIM || height > MAX_IMAGE_DIM {
                return Err("EINVAL:image too large");
            }
            Ok((ImageData::Png(bytes), width, height))
        }
        Format::Rgb | Format::Rgba => {
            let bpp: usize = if cmd.format == Format::Rgb { 3 } else { 4 };
            let (width, height) = (cmd.pix_width, cmd.pix_height);
            if width == 0 || height == 0 || width > MAX_IMAGE_DIM || height > MAX_IMAGE_DIM {
                return Err("EINVAL:bad dimensions");
            }
            let expected = width as usize * height as usize * bpp;
            if bytes.len() != expected {
                return Err("EINVAL:payload size mismatch");
            }
            Ok((
                ImageData::Rgba {
                    width,
                    height,
                    bytes_per_pixel: bpp as u8,
                    pixels: bytes,
                },
                width,
                height,
            ))
        }
    }
}

/// Read an image payload from a host-supplied path, applying the read
/// policy: never `/proc`, `/sys`, or `/dev` (except `/dev/shm`), and
/// temporary transmissions must point into the system temp directory with
/// the protocol marker in the path.
fn read_image_file(
    path: &str,
    cmd: &GraphicsCommand,
    temporary: bool,
) -> Result<Vec<u8>, &'static str> {
    let p = Path::new(path);
    if !p.is_absolute() {
        return Err("EINVAL:path must be absolute");
    }
    let forbidden = ["/proc", "/sys"];
    if forbidden.iter().any(|prefix| path.starts_with(prefix))
        || (path.starts_with("/dev") && !path.starts_with("/dev/shm"))
    {
        return Err("EINVAL:forbidden path");
    }
    if temporary {
        let tmp = std::env::temp_dir();
        let in_tmp = p.starts_with(&tmp) || path.starts_with("/tmp") || path.starts_with("/dev/shm");
        if !in_tmp || !path.contains(TEMP_MARKER) {
            return Err("EINVAL:not a temporary file");
        }
    }

    let data = std::fs::read(p).map_err(|_| "ENOENT:cannot read file")?;
    if temporary {
        // Best effort, per protocol: the emulator deletes temp files.
        let _ = std::fs::remove_file(p);
    }

    let start = (cmd.file_offset as usize).min(data.len());
    let end = if cmd.file_size != 0 {
        (start + cmd.file_size as usize).min(data.len())
    } else {
        data.len()
    };
    Ok(data[start..end].to_vec())
}

/// Decode a row/column diacritic to its index in the protocol's table.
///
/// Covers the leading portion of the published table, which bounds
/// placeholder images at 43 rows/columns.
/// TODO: extend to the full 297-entry rowcolumn-diacritics table.
#[must_use]
pub fn diacritic_index(ch: char) -> Option<u32> {
    const TABLE: [u32; 43] = [
        0x0305, 0x030d, 0x030e, 0x0310, 0x0312, 0x033d, 0x033e, 0x033f, 0x0346, 0x034a, 0x034b,
        0x034c, 0x0350, 0x0351, 0x0352, 0x0357, 0x035b, 0x0363, 0x0364, 0x0365, 0x0366, 0x0367,
        0x0368, 0x0369, 0x036a, 0x036b, 0x036c, 0x036d, 0x036e, 0x036f, 0x0483, 0x0484, 0x0485,
        0x0486, 0x0487, 0x0592, 0x0593, 0x0594, 0x0595, 0x0597, 0x0598, 0x0599, 0x059c,
    ];
    let c = ch as u32;
    TABLE.iter().position(|&d| d == c).map(|i| i as u32)
}
