//! The terminal dispatcher: owns the buffers and every auxiliary state
//! machine, interprets parser events, and talks back to the host.
//!
//! `feed` drives the parser, which calls back into the [`Dispatch`]
//! implementation here. All mutation happens synchronously inside `feed`;
//! responses go out through the [`Host`] callback in the order the bytes
//! that produced them were consumed.

mod csi;
mod osc;

use std::sync::Arc;
use std::time::Instant;

use smallvec::SmallVec;

use crate::buffer::Buffer;
use crate::cell::{AtomId, AtomRegistry, Cell, Color, SgrAttrs};
use crate::charset::Charsets;
use crate::color::{NamedScheme, Rgb, default_palette};
use crate::cursor::{CursorStyle, SavedCursor};
use crate::dirty::DirtyLines;
use crate::keyboard::{self, EncodeContext, KeyEvent, KittyKeyboardState};
use crate::kitty::{self, Graphics, GraphicsContext, GraphicsOutcome};
use crate::line::PlacementRef;
use crate::modes::{AnsiModes, DecModes, Modes, MouseMode};
use crate::mouse::{self, MouseAction, MouseButton, MouseEvent};
use crate::parser::{Dispatch, Params, Parser};
use crate::stats::Stats;
use crate::width::{ZWJ, is_combining, scalar_width};

/// Cap on accumulated OSC/DCS/APC payloads.
const STRING_PAYLOAD_MAX: usize = 8 << 20;
/// Atom count that triggers a garbage-collection sweep after a feed.
const ATOM_SWEEP_THRESHOLD: usize = 512;
/// Assumed cell pixel size for graphics geometry and pixel reports.
const CELL_PIXEL_WIDTH: u32 = 8;
const CELL_PIXEL_HEIGHT: u32 = 16;

/// Host-side collaborator: receives responses and out-of-band events.
///
/// Every method has a no-op default so embedders implement only what they
/// surface.
pub trait Host {
    /// Response bytes to deliver to the host process (reports, mouse and
    /// keyboard encodings, graphics replies).
    fn send(&mut self, bytes: &[u8]) {
        let _ = bytes;
    }
    /// Gates reports that could echo buffer contents.
    fn is_process_trusted(&self) -> bool {
        true
    }
    fn set_title(&mut self, title: &str) {
        let _ = title;
    }
    fn bell(&mut self) {}
    /// OSC 777 desktop notification.
    fn notify(&mut self, title: &str, body: &str) {
        let _ = (title, body);
    }
    /// OSC 52 clipboard write (already gated by the trust predicate).
    fn clipboard_copy(&mut self, text: &str) {
        let _ = text;
    }
    /// The application asked for a different window size (DECCOLM, CSI t).
    fn request_resize(&mut self, cols: usize, rows: usize) {
        let _ = (cols, rows);
    }
    /// OSC 7 working-directory report.
    fn report_directory(&mut self, path: &str) {
        let _ = path;
    }
    /// Complete sixel DCS payload for the renderer.
    fn sixel(&mut self, data: &[u8]) {
        let _ = data;
    }
}

/// A host that swallows everything (tests, headless use).
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHost;

impl Host for NullHost {}

/// Construction-time configuration.
#[derive(Debug, Clone)]
pub struct Options {
    pub cols: usize,
    pub rows: usize,
    /// LF/VT/FF also perform a carriage return.
    pub convert_eol: bool,
    /// Shapes the DA responses.
    pub term_name: String,
    pub cursor_style: CursorStyle,
    /// Extra lines retained beyond the viewport.
    pub scrollback: usize,
    pub tab_stop_width: usize,
    /// Advertise sixel support in DA1.
    pub enable_sixel_reported: bool,
    pub kitty_image_cache_limit_bytes: usize,
    pub color_scheme: NamedScheme,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            cols: 80,
            rows: 24,
            convert_eol: false,
            term_name: "xterm-256color".into(),
            cursor_style: CursorStyle::default(),
            scrollback: 1000,
            tab_stop_width: 8,
            enable_sixel_reported: false,
            kitty_image_cache_limit_bytes: 320 << 20,
            color_scheme: NamedScheme::Default,
        }
    }
}

/// Validity stamp for the "previous print" cell used by combining marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LastPrint {
    alt: bool,
    cols: usize,
    rows: usize,
    abs_row: usize,
    col: usize,
}

/// In-progress Unicode placeholder cell (diacritics still arriving).
#[derive(Debug, Clone, Copy)]
struct PlaceholderRun {
    abs_row: usize,
    col: usize,
    base_id: u32,
    row_d: u32,
    col_d: u32,
    msb: u32,
    diacritics_seen: u8,
    key: Option<(u32, u32)>,
}

/// What the DCS passthrough data belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
enum DcsTarget {
    #[default]
    None,
    RequestStatus(Vec<u8>),
    Sixel(Vec<u8>),
    Ignored,
}

/// The terminal engine.
pub struct Terminal<H: Host> {
    host: H,
    parser: Parser,
    normal: Buffer,
    alt: Buffer,
    use_alt: bool,
    pub(crate) attrs: SgrAttrs,
    pub(crate) charsets: Charsets,
    pub(crate) modes: Modes,
    pub(crate) cursor_style: CursorStyle,
    options: Options,
    pub(crate) palette: [Rgb; 256],
    pub(crate) fg_color: Rgb,
    pub(crate) bg_color: Rgb,
    pub(crate) cursor_color: Rgb,
    title: String,
    icon_title: String,
    title_stack: Vec<String>,
    pub(crate) atoms: AtomRegistry,
    pub(crate) current_link: AtomId,
    pub(crate) graphics: Graphics,
    keyboard_normal: KittyKeyboardState,
    keyboard_alt: KittyKeyboardState,
    /// Bytes of an incomplete trailing UTF-8 sequence from the last feed.
    utf8_partial: SmallVec<[u8; 4]>,
    last_print: Option<LastPrint>,
    /// Last printed graphic character, for REP.
    pub(crate) last_char: Option<char>,
    placeholder_run: Option<PlaceholderRun>,
    osc_buf: Vec<u8>,
    pub(crate) dcs: DcsTarget,
    apc_buf: Option<Vec<u8>>,
    /// S8C1T: emit C1 controls as single 8-bit bytes.
    pub(crate) use_8bit_c1: bool,
    stats: Arc<Stats>,
    /// Buttons currently held, for motion filtering.
    pressed_button: Option<MouseButton>,
    last_motion_cell: Option<(usize, usize)>,
}

impl<H: Host> Terminal<H> {
    /// Build an engine from options and a host.
    pub fn new(options: Options, host: H) -> Self {
        let cols = options.cols.max(2);
        let rows = options.rows.max(1);
        let tab = options.tab_stop_width.max(1);
        let normal = Buffer::new(cols, rows, options.scrollback, tab);
        let alt = Buffer::new(cols, rows, 0, tab);
        Self {
            host,
            parser: Parser::new(),
            normal,
            alt,
            use_alt: false,
            attrs: SgrAttrs::default(),
            charsets: Charsets::default(),
            modes: Modes::default(),
            cursor_style: options.cursor_style,
            palette: default_palette(options.color_scheme),
            fg_color: Rgb::from_hex(0xffffff),
            bg_color: Rgb::from_hex(0x000000),
            cursor_color: Rgb::from_hex(0xffffff),
            title: String::new(),
            icon_title: String::new(),
            title_stack: Vec::new(),
            atoms: AtomRegistry::new(),
            current_link: 0,
            graphics: Graphics::new(options.kitty_image_cache_limit_bytes),
            keyboard_normal: KittyKeyboardState::default(),
            keyboard_alt: KittyKeyboardState::default(),
            utf8_partial: SmallVec::new(),
            last_print: None,
            last_char: None,
            placeholder_run: None,
            osc_buf: Vec::new(),
            dcs: DcsTarget::None,
            apc_buf: None,
            use_8bit_c1: false,
            stats: Arc::new(Stats::default()),
            pressed_button: None,
            last_motion_cell: None,
            options,
        }
    }

    // ── Host data path ──────────────────────────────────────────────

    /// Interpret a chunk of host-process output.
    pub fn feed(&mut self, bytes: &[u8]) {
        let started = Instant::now();
        let mut parser = std::mem::take(&mut self.parser);
        parser.advance(self, bytes);
        self.parser = parser;
        self.stats
            .record_feed(bytes.len(), started.elapsed().as_nanos() as u64);
        if self.atoms.len() > ATOM_SWEEP_THRESHOLD {
            self.collect_atoms();
        }
    }

    /// Shared instrumentation counters.
    #[must_use]
    pub fn stats(&self) -> Arc<Stats> {
        Arc::clone(&self.stats)
    }

    pub(crate) fn send_raw(&mut self, bytes: &[u8]) {
        self.stats.record_response(bytes.len());
        self.host.send(bytes);
    }

    #[must_use]
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// The host collaborator (renderer/event-loop side).
    #[must_use]
    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub(crate) fn host_trusted(&self) -> bool {
        self.host.is_process_trusted()
    }

    pub(crate) fn host_request_resize(&mut self, cols: usize, rows: usize) {
        self.host.request_resize(cols, rows);
    }

    /// Emit `CSI body`, honoring the 7-bit/8-bit C1 selection.
    pub(crate) fn send_csi(&mut self, body: &str) {
        let mut out = Vec::with_capacity(body.len() + 2);
        if self.use_8bit_c1 {
            out.push(0x9b);
        } else {
            out.extend_from_slice(b"\x1b[");
        }
        out.extend_from_slice(body.as_bytes());
        self.send_raw(&out);
    }

    /// Emit `DCS body ST`.
    pub(crate) fn send_dcs(&mut self, body: &str) {
        let mut out = Vec::with_capacity(body.len() + 4);
        if self.use_8bit_c1 {
            out.push(0x90);
            out.extend_from_slice(body.as_bytes());
            out.push(0x9c);
        } else {
            out.extend_from_slice(b"\x1bP");
            out.extend_from_slice(body.as_bytes());
            out.extend_from_slice(b"\x1b\\");
        }
        self.send_raw(&out);
    }

    /// Emit `OSC body ST`.
    pub(crate) fn send_osc(&mut self, body: &str) {
        let mut out = Vec::with_capacity(body.len() + 4);
        if self.use_8bit_c1 {
            out.push(0x9d);
            out.extend_from_slice(body.as_bytes());
            out.push(0x9c);
        } else {
            out.extend_from_slice(b"\x1b]");
            out.extend_from_slice(body.as_bytes());
            out.extend_from_slice(b"\x1b\\");
        }
        self.send_raw(&out);
    }

    // ── Buffer access ───────────────────────────────────────────────

    #[must_use]
    pub fn active_buffer(&self) -> &Buffer {
        if self.use_alt { &self.alt } else { &self.normal }
    }

    pub fn active_buffer_mut(&mut self) -> &mut Buffer {
        if self.use_alt { &mut self.alt } else { &mut self.normal }
    }

    #[must_use]
    pub fn normal_buffer(&self) -> &Buffer {
        &self.normal
    }

    #[must_use]
    pub fn alt_buffer(&self) -> &Buffer {
        &self.alt
    }

    #[must_use]
    pub fn is_alt_active(&self) -> bool {
        self.use_alt
    }

    #[must_use]
    pub fn cols(&self) -> usize {
        self.active_buffer().cols()
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.active_buffer().rows()
    }

    /// Cursor position in viewport coordinates.
    #[must_use]
    pub fn cursor(&self) -> (usize, usize) {
        let b = self.active_buffer();
        (b.cursor.x, b.cursor.y)
    }

    #[must_use]
    pub fn cursor_visible(&self) -> bool {
        self.modes.contains(DecModes::SHOW_CURSOR)
    }

    #[must_use]
    pub fn cursor_style(&self) -> CursorStyle {
        self.cursor_style
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn modes(&self) -> &Modes {
        &self.modes
    }

    #[must_use]
    pub fn graphics(&self) -> &Graphics {
        &self.graphics
    }

    #[must_use]
    pub fn atoms(&self) -> &AtomRegistry {
        &self.atoms
    }

    #[must_use]
    pub fn palette_color(&self, index: u8) -> Rgb {
        self.palette[index as usize]
    }

    /// The dirty-line set of the active buffer (renderer pull).
    #[must_use]
    pub fn dirty_lines(&self) -> &DirtyLines {
        &self.active_buffer().dirty
    }

    /// Clear the dirty set after the renderer consumed it.
    pub fn clear_dirty(&mut self) {
        self.active_buffer_mut().dirty.clear();
    }

    pub(crate) fn keyboard(&mut self) -> &mut KittyKeyboardState {
        if self.use_alt {
            &mut self.keyboard_alt
        } else {
            &mut self.keyboard_normal
        }
    }

    /// Effective horizontal bounds for edit and wrap operations.
    pub(crate) fn h_bounds(&self) -> (usize, usize) {
        let b = self.active_buffer();
        if self.modes.contains(DecModes::MARGIN_MODE) {
            (b.margin_left, b.margin_right)
        } else {
            (0, b.cols() - 1)
        }
    }

    // ── Printing ────────────────────────────────────────────────────

    fn print_scalar(&mut self, ch: char) {
        if ch == ZWJ {
            return;
        }
        if ch == kitty::PLACEHOLDER {
            self.print_placeholder();
            return;
        }
        if is_combining(ch) {
            self.apply_combining(ch);
            return;
        }
        let width = scalar_width(ch) as usize;
        if width == 0 {
            return;
        }
        let ch = if (ch as u32) < 0x80 {
            self.charsets.map(ch)
        } else {
            ch
        };
        self.put_char(ch, scalar_width(ch).max(1) as usize);
        self.last_char = Some(ch);
        self.placeholder_run = None;
    }

    pub(crate) fn put_char(&mut self, ch: char, width: usize) {
        let attrs = self.attrs;
        let link = self.current_link;
        let insert_mode = self.modes.ansi.contains(AnsiModes::INSERT);
        let auto_wrap = self.modes.contains(DecModes::AUTO_WRAP);
        let (left, right) = self.h_bounds();
        let use_alt = self.use_alt;

        let b = self.active_buffer_mut();
        let cols = b.cols();
        // A cursor hanging one past the margin is the pending-wrap state;
        // further right means it was positioned outside the margins.
        let right_edge = if b.cursor.x <= right + 1 { right } else { cols - 1 };

        if b.cursor.x + width > right_edge + 1 {
            if auto_wrap {
                b.cursor.x = left.min(cols - 1);
                if b.cursor.y == b.scroll_bottom {
                    b.scroll_up(1, left, right, attrs);
                } else if b.cursor.y + 1 < b.rows() {
                    b.cursor.y += 1;
                }
                let row = b.cursor.y;
                if let Some(line) = b.line_mut(row) {
                    line.is_wrapped = true;
                }
            } else {
                b.cursor.x = (right_edge + 1).saturating_sub(width);
            }
        }

        let (x, y) = (b.cursor.x, b.cursor.y);
        if insert_mode
            && let Some(line) = b.line_mut(y)
        {
            line.insert_cells(x, width, right_edge, attrs);
        }

        let abs_row = b.y_base + y;
        if let Some(line) = b.line_mut(y) {
            // Overwriting half of a wide pair orphans the other half.
            if x > 0 && line.cell(x).is_some_and(Cell::is_wide_continuation) {
                if let Some(head) = line.cell_mut(x - 1) {
                    head.erase(attrs);
                }
            }
            if line.cell(x).is_some_and(Cell::is_wide)
                && let Some(cont) = line.cell_mut(x + 1)
            {
                cont.erase(attrs);
            }

            if width == 2 {
                let (mut lead, mut cont) = Cell::wide(ch, attrs);
                lead.atom = link;
                cont.atom = link;
                if let Some(slot) = line.cell_mut(x) {
                    *slot = lead;
                }
                if let Some(slot) = line.cell_mut(x + 1) {
                    *slot = cont;
                }
            } else if let Some(cell) = line.cell_mut(x) {
                cell.set_content(ch, 1);
                cell.attrs = attrs;
                cell.atom = link;
            }
        }

        b.cursor.x = x + width;
        b.dirty.mark(y);
        let (cols, rows) = (b.cols(), b.rows());
        self.last_print = Some(LastPrint {
            alt: use_alt,
            cols,
            rows,
            abs_row,
            col: x,
        });
    }

    /// Append a combining mark to the previously printed cell.
    fn apply_combining(&mut self, mark: char) {
        // Placeholder diacritics refine the placement instead.
        if self.placeholder_run.is_some()
            && kitty::diacritic_index(mark).is_some()
        {
            self.refine_placeholder(mark);
            return;
        }
        let Some(last) = self.last_print else {
            return;
        };
        let use_alt = self.use_alt;
        let b = self.active_buffer_mut();
        if last.alt != use_alt || last.cols != b.cols() || last.rows != b.rows() {
            return;
        }
        let Some(line) = b.line_abs_mut(last.abs_row) else {
            return;
        };
        if let Some(cell) = line.cell_mut(last.col) {
            cell.push_zerowidth(mark);
        }
        if last.abs_row >= b.y_base {
            let row = last.abs_row - b.y_base;
            b.dirty.mark(row);
        }
    }

    // ── Kitty placeholder cells ─────────────────────────────────────

    fn print_placeholder(&mut self) {
        let attrs = self.attrs;
        let base_id = match attrs.fg {
            Color::Ansi(n) => n as u32,
            Color::Rgb(r, g, b) => ((r as u32) << 16) | ((g as u32) << 8) | b as u32,
            Color::Default | Color::DefaultInverted => 0,
        };
        self.put_char(kitty::PLACEHOLDER, 1);
        let Some(last) = self.last_print else {
            return;
        };
        let mut run = PlaceholderRun {
            abs_row: last.abs_row,
            col: last.col,
            base_id,
            row_d: 0,
            col_d: 0,
            msb: 0,
            diacritics_seen: 0,
            key: None,
        };
        self.register_placeholder(&mut run);
        self.placeholder_run = Some(run);
    }

    fn refine_placeholder(&mut self, mark: char) {
        let Some(mut run) = self.placeholder_run.take() else {
            return;
        };
        // The diacritic still joins the cell's grapheme so copies of the
        // screen reproduce the placeholder faithfully.
        let Some(idx) = kitty::diacritic_index(mark) else {
            self.placeholder_run = Some(run);
            return;
        };
        if let Some(last) = self.last_print {
            let b = self.active_buffer_mut();
            if let Some(cell) = b
                .line_abs_mut(last.abs_row)
                .and_then(|line| line.cell_mut(last.col))
            {
                cell.push_zerowidth(mark);
            }
        }
        match run.diacritics_seen {
            0 => run.row_d = idx,
            1 => run.col_d = idx,
            _ => run.msb = idx,
        }
        run.diacritics_seen = run.diacritics_seen.saturating_add(1);
        self.register_placeholder(&mut run);
        self.placeholder_run = Some(run);
    }

    fn register_placeholder(&mut self, run: &mut PlaceholderRun) {
        let image_id = run.base_id | (run.msb << 24);
        if image_id == 0 {
            return;
        }
        let new_key = self.graphics.placeholder(
            image_id,
            run.row_d,
            run.col_d,
            run.abs_row,
            run.col,
            self.use_alt,
        );
        if new_key == run.key {
            if run.key.is_none() {
                return;
            }
        } else {
            // Re-anchoring: drop the record created from the bare cell.
            if let Some(old) = run.key
                && old != new_key.unwrap_or(old)
            {
                self.graphics.remove_placement(old);
                self.unanchor_placement(old);
            }
            run.key = new_key;
        }
        let Some(key) = run.key else {
            return;
        };
        let atom = self.atoms.intern_placement(key.0, key.1);
        let anchor_row = self
            .graphics
            .placement(key.0, key.1)
            .map(|p| p.row)
            .unwrap_or(run.abs_row);
        let b = self.active_buffer_mut();
        if let Some(line) = b.line_abs_mut(run.abs_row)
            && let Some(cell) = line.cell_mut(run.col)
        {
            cell.atom = atom;
        }
        let anchor = PlacementRef {
            image_id: key.0,
            placement_id: key.1,
        };
        if let Some(line) = b.line_abs_mut(anchor_row)
            && !line.placements.contains(&anchor)
        {
            line.placements.push(anchor);
        }
    }

    /// Anchor a freshly created placement on its line and apply the cursor
    /// advance a display action requested.
    pub(crate) fn apply_graphics_outcome(&mut self, outcome: GraphicsOutcome) {
        if let Some(response) = outcome.response {
            self.send_raw(&response);
        }
        for key in outcome.removed {
            self.unanchor_placement(key);
        }
        if let Some(placement) = outcome.placement
            && !placement.is_virtual
        {
            let anchor = PlacementRef {
                image_id: placement.image_id,
                placement_id: placement.placement_id,
            };
            let row = placement.row;
            let b = self.active_buffer_mut();
            if let Some(line) = b.line_abs_mut(row)
                && !line.placements.contains(&anchor)
            {
                line.placements.push(anchor);
            }
            if row >= b.y_base {
                let rel = row - b.y_base;
                let rows = placement.rows;
                b.dirty.mark_range(rel, rel + rows.saturating_sub(1));
            }
        }
        if let Some((down, across)) = outcome.advance {
            let b = self.active_buffer_mut();
            b.cursor.x = (b.cursor.x + across).min(b.cols());
            b.cursor.y = (b.cursor.y + down).min(b.rows() - 1);
        }
    }

    fn unanchor_placement(&mut self, key: (u32, u32)) {
        let target = PlacementRef {
            image_id: key.0,
            placement_id: key.1,
        };
        for buffer in [&mut self.normal, &mut self.alt] {
            for i in 0..buffer.total_lines() {
                if let Some(line) = buffer.line_abs_mut(i)
                    && !line.placements.is_empty()
                {
                    line.placements.retain(|p| *p != target);
                }
            }
        }
    }

    pub(crate) fn graphics_context(&self) -> GraphicsContext {
        let b = self.active_buffer();
        GraphicsContext {
            cursor_abs_row: b.y_base + b.cursor.y,
            cursor_col: b.cursor.x.min(b.cols() - 1),
            y_base: b.y_base,
            cell_width: CELL_PIXEL_WIDTH,
            cell_height: CELL_PIXEL_HEIGHT,
            alt_active: self.use_alt,
        }
    }

    // ── C0 controls ─────────────────────────────────────────────────

    pub(crate) fn line_feed(&mut self) {
        let attrs = self.attrs;
        let (left, right) = self.h_bounds();
        let convert = self.options.convert_eol || self.modes.ansi.contains(AnsiModes::NEW_LINE);
        let b = self.active_buffer_mut();
        b.cursor.x = b.cursor.x.min(b.cols() - 1);
        if b.cursor.y == b.scroll_bottom {
            b.scroll_up(1, left, right, attrs);
        } else if b.cursor.y + 1 < b.rows() {
            b.cursor.y += 1;
        }
        if convert {
            b.cursor.x = if b.cursor.x >= left { left } else { 0 };
        }
        b.dirty.mark(b.cursor.y);
    }

    pub(crate) fn carriage_return(&mut self) {
        let (left, _) = self.h_bounds();
        let b = self.active_buffer_mut();
        b.cursor.x = if b.cursor.x >= left { left } else { 0 };
    }

    fn backspace(&mut self) {
        let reverse_wrap = self.modes.contains(DecModes::REVERSE_WRAP)
            && self.modes.contains(DecModes::AUTO_WRAP);
        let (left, right) = self.h_bounds();
        let b = self.active_buffer_mut();
        b.cursor.x = b.cursor.x.min(b.cols() - 1);
        if b.cursor.x > left {
            b.cursor.x -= 1;
        } else if reverse_wrap {
            b.cursor.y = if b.cursor.y > b.scroll_top {
                b.cursor.y - 1
            } else {
                b.scroll_bottom
            };
            b.cursor.x = right;
        }
    }

    fn horizontal_tab(&mut self) {
        let (_, right) = self.h_bounds();
        let b = self.active_buffer_mut();
        b.cursor.x = b.next_tab_stop(b.cursor.x.min(b.cols() - 1), right);
    }

    // ── Cursor save/restore (DECSC/DECRC) ───────────────────────────

    pub(crate) fn save_cursor(&mut self) {
        let attrs = self.attrs;
        let charsets = self.charsets;
        let modes = self.modes;
        let b = self.active_buffer_mut();
        b.saved_cursor = Some(SavedCursor {
            x: b.cursor.x,
            y: b.cursor.y,
            attrs,
            charsets,
            auto_wrap: modes.contains(DecModes::AUTO_WRAP),
            reverse_wrap: modes.contains(DecModes::REVERSE_WRAP),
            origin_mode: modes.contains(DecModes::ORIGIN),
            margin_mode: modes.contains(DecModes::MARGIN_MODE),
        });
    }

    pub(crate) fn restore_cursor(&mut self) {
        let saved = self.active_buffer().saved_cursor.clone();
        let Some(saved) = saved else {
            // Without a save, DECRC homes the cursor with defaults.
            let b = self.active_buffer_mut();
            b.cursor.x = 0;
            b.cursor.y = 0;
            self.attrs = SgrAttrs::default();
            return;
        };
        self.attrs = saved.attrs;
        self.charsets = saved.charsets;
        self.modes.set(DecModes::AUTO_WRAP, saved.auto_wrap);
        self.modes.set(DecModes::REVERSE_WRAP, saved.reverse_wrap);
        self.modes.set(DecModes::ORIGIN, saved.origin_mode);
        self.modes.set(DecModes::MARGIN_MODE, saved.margin_mode);
        let b = self.active_buffer_mut();
        b.cursor.x = saved.x.min(b.cols());
        b.cursor.y = saved.y.min(b.rows() - 1);
    }

    // ── Buffer switching ────────────────────────────────────────────

    pub(crate) fn activate_alt(&mut self, clear: bool, save_cursor: bool) {
        if save_cursor {
            self.save_cursor();
        }
        if !self.use_alt {
            self.use_alt = true;
            if clear {
                let attrs = self.attrs;
                self.alt.clear_all(attrs);
                self.alt.cursor = self.normal.cursor;
                self.alt.cursor.x = self.alt.cursor.x.min(self.alt.cols());
            }
            self.alt.dirty.mark_all();
        }
    }

    pub(crate) fn activate_normal(&mut self, restore_cursor: bool) {
        if self.use_alt {
            self.use_alt = false;
            self.normal.dirty.mark_all();
        }
        if restore_cursor {
            self.restore_cursor();
        }
    }

    // ── Resize / reset ──────────────────────────────────────────────

    /// Resize the viewport (host window change).
    pub fn resize(&mut self, cols: usize, rows: usize) {
        let attrs = self.attrs;
        self.normal.resize(cols, rows, attrs);
        self.alt.resize(cols, rows, attrs);
        self.alt.clear_all(attrs);
        self.last_print = None;
        self.placeholder_run = None;
    }

    /// Full reset (RIS).
    pub fn reset(&mut self) {
        let options = self.options.clone();
        // Keep the current dimensions: RIS resets state, not the window.
        let cols = self.cols();
        let rows = self.rows();
        let tab = options.tab_stop_width.max(1);
        self.normal = Buffer::new(cols, rows, options.scrollback, tab);
        self.alt = Buffer::new(cols, rows, 0, tab);
        self.use_alt = false;
        self.attrs = SgrAttrs::default();
        self.charsets = Charsets::default();
        self.modes = Modes::default();
        self.cursor_style = options.cursor_style;
        self.palette = default_palette(options.color_scheme);
        self.title.clear();
        self.icon_title.clear();
        self.title_stack.clear();
        self.atoms.clear();
        self.current_link = 0;
        self.graphics.reset();
        self.keyboard_normal.reset();
        self.keyboard_alt.reset();
        self.utf8_partial.clear();
        self.last_print = None;
        self.last_char = None;
        self.placeholder_run = None;
        self.osc_buf.clear();
        self.dcs = DcsTarget::None;
        self.apc_buf = None;
        self.use_8bit_c1 = false;
        self.parser.reset();
    }

    /// DECSTR soft reset.
    pub(crate) fn soft_reset(&mut self) {
        self.modes.set(DecModes::SHOW_CURSOR, true);
        self.modes.set(DecModes::ORIGIN, false);
        self.modes.set(DecModes::AUTO_WRAP, false);
        self.modes.set(DecModes::REVERSE_WRAP, false);
        self.modes.set(DecModes::APP_CURSOR_KEYS, false);
        self.modes.ansi.remove(AnsiModes::INSERT);
        self.attrs = SgrAttrs::default();
        self.charsets = Charsets::default();
        let b = self.active_buffer_mut();
        let rows = b.rows();
        let cols = b.cols();
        b.scroll_top = 0;
        b.scroll_bottom = rows - 1;
        b.margin_left = 0;
        b.margin_right = cols - 1;
        b.saved_cursor = None;
    }

    // ── Title stack (window ops 22/23) ──────────────────────────────

    pub(crate) fn set_title(&mut self, icon: bool, window: bool, title: &str) {
        if icon {
            self.icon_title = title.to_owned();
        }
        if window {
            self.title = title.to_owned();
        }
        self.host.set_title(title);
    }

    pub(crate) fn push_title(&mut self) {
        if self.title_stack.len() < 16 {
            self.title_stack.push(self.title.clone());
        }
    }

    pub(crate) fn pop_title(&mut self) {
        if let Some(title) = self.title_stack.pop() {
            self.title = title.clone();
            self.host.set_title(&title);
        }
    }

    // ── Atom garbage collection ─────────────────────────────────────

    /// Sweep the payload atom table, releasing atoms no cell references.
    pub fn collect_atoms(&mut self) {
        let mut referenced = rustc_hash::FxHashSet::default();
        for buffer in [&self.normal, &self.alt] {
            for line in buffer.iter_lines() {
                for cell in line.cells() {
                    if cell.atom != 0 {
                        referenced.insert(cell.atom);
                    }
                }
            }
        }
        let keep = [self.current_link];
        self.atoms.sweep(&referenced, &keep);
    }

    // ── Input-side API (embedding UI) ───────────────────────────────

    /// Encode and send a key event per the active keyboard protocol.
    pub fn key_event(&mut self, event: &KeyEvent) {
        if let Some(bytes) = self.encode_key(event) {
            self.send_raw(&bytes);
        }
    }

    /// Encode a key event without sending it.
    #[must_use]
    pub fn encode_key(&mut self, event: &KeyEvent) -> Option<Vec<u8>> {
        let ctx = EncodeContext {
            app_cursor: self.modes.contains(DecModes::APP_CURSOR_KEYS),
            app_keypad: self.modes.contains(DecModes::APP_KEYPAD),
            flags: self.keyboard().current(),
        };
        keyboard::encode_key(event, ctx)
    }

    /// Feed a mouse event from the embedding UI.
    pub fn mouse_event(&mut self, event: &MouseEvent) {
        match event.action {
            MouseAction::Press => {
                self.pressed_button = event.button;
                self.last_motion_cell = None;
            }
            MouseAction::Release => {
                self.pressed_button = None;
            }
            MouseAction::Motion => {}
        }

        let mode = self.modes.mouse_mode;
        if mode == MouseMode::None {
            self.wheel_fallback(event);
            return;
        }

        let mut event = *event;
        if event.action == MouseAction::Motion && event.button.is_none() {
            event.button = self.pressed_button;
        }
        if !mouse::wants_event(&event, mode) {
            return;
        }
        if event.action == MouseAction::Motion {
            // Drop duplicate motion within one cell.
            if self.last_motion_cell == Some((event.col, event.row)) {
                return;
            }
            self.last_motion_cell = Some((event.col, event.row));
        }
        if let Some(bytes) = mouse::encode(&event, mode, self.modes.mouse_encoding) {
            self.send_raw(&bytes);
        }
    }

    /// In the alternate screen with no mouse protocol, wheel events turn
    /// into arrow (or application cursor) keys.
    fn wheel_fallback(&mut self, event: &MouseEvent) {
        if !self.use_alt || event.action != MouseAction::Press {
            return;
        }
        let seq: &[u8] = match (
            event.button,
            self.modes.contains(DecModes::APP_CURSOR_KEYS),
        ) {
            (Some(MouseButton::WheelUp), false) => b"\x1b[A",
            (Some(MouseButton::WheelUp), true) => b"\x1bOA",
            (Some(MouseButton::WheelDown), false) => b"\x1b[B",
            (Some(MouseButton::WheelDown), true) => b"\x1bOB",
            _ => return,
        };
        self.send_raw(seq);
    }

    /// Report a focus change (mode ?1004).
    pub fn focus_changed(&mut self, focused: bool) {
        if self.modes.contains(DecModes::FOCUS_EVENTS) {
            self.send_csi(if focused { "I" } else { "O" });
        }
    }

    /// Deliver pasted text, bracketing it when mode ?2004 is set.
    pub fn paste(&mut self, text: &str) {
        if self.modes.contains(DecModes::BRACKETED_PASTE) {
            self.send_raw(b"\x1b[200~");
            self.send_raw(text.as_bytes());
            self.send_raw(b"\x1b[201~");
        } else {
            self.send_raw(text.as_bytes());
        }
    }

    /// Scroll the rendered view (user scrollback); negative is up/back.
    pub fn scroll_display(&mut self, delta: isize) {
        self.active_buffer_mut().scroll_display_by(delta);
    }
}

// ---------------------------------------------------------------------------
// Parser dispatch
// ---------------------------------------------------------------------------

impl<H: Host> Dispatch for Terminal<H> {
    fn print(&mut self, bytes: &[u8]) {
        let joined: SmallVec<[u8; 64]>;
        let data: &[u8] = if self.utf8_partial.is_empty() {
            bytes
        } else {
            let mut v = SmallVec::with_capacity(self.utf8_partial.len() + bytes.len());
            v.extend_from_slice(&self.utf8_partial);
            v.extend_from_slice(bytes);
            self.utf8_partial.clear();
            joined = v;
            &joined
        };

        let mut i = 0;
        while i < data.len() {
            let first = data[i];
            let len = utf8_sequence_len(first);
            if i + len > data.len() {
                // Partial trailing sequence: keep it for the next feed.
                self.utf8_partial.extend_from_slice(&data[i..]);
                return;
            }
            match std::str::from_utf8(&data[i..i + len]) {
                Ok(s) => {
                    if let Some(ch) = s.chars().next() {
                        self.print_scalar(ch);
                    }
                    i += len;
                }
                Err(_) => {
                    // Best-effort scalar from the first byte, width 1.
                    self.print_scalar(first as char);
                    i += 1;
                }
            }
        }
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            0x07 => self.host.bell(),
            0x08 => self.backspace(),
            0x09 => self.horizontal_tab(),
            0x0a | 0x0b | 0x0c => self.line_feed(),
            0x0d => self.carriage_return(),
            0x0e => self.charsets.lock(1),
            0x0f => self.charsets.lock(0),
            _ => {
                tracing::trace!(byte, "ignored C0 control");
            }
        }
    }

    fn csi_dispatch(&mut self, params: &Params, collect: &[u8], final_byte: u8) {
        self.handle_csi(params, collect, final_byte);
    }

    fn esc_dispatch(&mut self, collect: &[u8], final_byte: u8) {
        self.handle_esc(collect, final_byte);
    }

    fn osc_start(&mut self) {
        self.osc_buf.clear();
    }

    fn osc_put(&mut self, byte: u8) {
        if self.osc_buf.len() < STRING_PAYLOAD_MAX {
            self.osc_buf.push(byte);
        }
    }

    fn osc_end(&mut self, success: bool) {
        let data = std::mem::take(&mut self.osc_buf);
        if success {
            self.handle_osc(&data);
        }
    }

    fn dcs_hook(&mut self, params: &Params, collect: &[u8], final_byte: u8) {
        self.handle_dcs_hook(params, collect, final_byte);
    }

    fn dcs_put(&mut self, byte: u8) {
        match &mut self.dcs {
            DcsTarget::RequestStatus(buf) | DcsTarget::Sixel(buf) => {
                if buf.len() < STRING_PAYLOAD_MAX {
                    buf.push(byte);
                }
            }
            DcsTarget::None | DcsTarget::Ignored => {}
        }
    }

    fn dcs_unhook(&mut self) {
        let target = std::mem::take(&mut self.dcs);
        self.handle_dcs_unhook(target);
    }

    fn apc_start(&mut self) {
        self.apc_buf = Some(Vec::new());
    }

    fn apc_put(&mut self, byte: u8) {
        if let Some(buf) = &mut self.apc_buf
            && buf.len() < STRING_PAYLOAD_MAX
        {
            buf.push(byte);
        }
    }

    fn apc_end(&mut self, success: bool) {
        let Some(buf) = self.apc_buf.take() else {
            return;
        };
        if !success || buf.is_empty() {
            return;
        }
        if buf[0] == b'G' {
            let ctx = self.graphics_context();
            let outcome = self.graphics.accept(&buf[1..], &ctx);
            self.apply_graphics_outcome(outcome);
        } else {
            tracing::debug!("non-graphics APC ignored");
        }
    }
}

#[inline]
fn utf8_sequence_len(first: u8) -> usize {
    match first {
        0x00..=0x7f => 1,
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        0xf0..=0xf7 => 4,
        _ => 1,
    }
}
