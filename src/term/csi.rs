//! CSI and ESC dispatch: cursor motion, erase, editing, modes, SGR, and
//! the report family.
//!
//! Handlers clamp out-of-range parameters silently and log unknown
//! sequences; none of them can abort the parser.

use super::{CELL_PIXEL_HEIGHT, CELL_PIXEL_WIDTH, Host, Terminal};
use crate::cell::Color;
use crate::charset::Charset;
use crate::cursor::CursorStyle;
use crate::keyboard::KittyFlags;
use crate::modes::{AnsiModes, DecModes, MouseEncoding, MouseMode};
use crate::parser::Params;

impl<H: Host> Terminal<H> {
    pub(crate) fn handle_csi(&mut self, params: &Params, collect: &[u8], final_byte: u8) {
        match (collect, final_byte) {
            (b"", b'@') => self.insert_chars(params.get(0, 1) as usize),
            (b"", b'A') => self.cursor_up(params.get(0, 1) as usize),
            (b"", b'B' | b'e') => self.cursor_down(params.get(0, 1) as usize),
            (b"", b'C' | b'a') => self.cursor_forward(params.get(0, 1) as usize),
            (b"", b'D') => self.cursor_back(params.get(0, 1) as usize),
            (b"", b'E') => {
                self.cursor_down(params.get(0, 1) as usize);
                self.cursor_to_left_margin();
            }
            (b"", b'F') => {
                self.cursor_up(params.get(0, 1) as usize);
                self.cursor_to_left_margin();
            }
            (b"", b'G' | b'`') => self.cursor_to_column(params.get(0, 1) as usize - 1),
            (b"", b'H' | b'f') => self.set_cursor_pos(
                params.get(0, 1) as usize - 1,
                params.get(1, 1) as usize - 1,
            ),
            (b"", b'I') => self.tab_forward(params.get(0, 1) as usize),
            (b"" | b"?", b'J') => self.erase_display(params.raw(0).unwrap_or(0)),
            (b"" | b"?", b'K') => self.erase_line(params.raw(0).unwrap_or(0)),
            (b"", b'L') => self.insert_lines_cmd(params.get(0, 1) as usize),
            (b"", b'M') => self.delete_lines_cmd(params.get(0, 1) as usize),
            (b"", b'P') => self.delete_chars(params.get(0, 1) as usize),
            (b"", b'S') => self.scroll_up_cmd(params.get(0, 1) as usize),
            (b"", b'T') => self.scroll_down_cmd(params.get(0, 1) as usize),
            (b"", b'X') => self.erase_chars(params.get(0, 1) as usize),
            (b"", b'Z') => self.tab_backward(params.get(0, 1) as usize),
            (b"", b'b') => self.repeat_last(params.get(0, 1) as usize),
            (b"", b'c') => self.primary_attributes(),
            (b">", b'c') => self.secondary_attributes(),
            (b"", b'd') => self.cursor_to_row(params.get(0, 1) as usize - 1),
            (b"", b'g') => self.clear_tabs(params.raw(0).unwrap_or(0)),
            (b"", b'h') => {
                for group in params.iter_groups() {
                    self.set_ansi_mode(group[0], true);
                }
            }
            (b"", b'l') => {
                for group in params.iter_groups() {
                    self.set_ansi_mode(group[0], false);
                }
            }
            (b"?", b'h') => {
                for group in params.iter_groups() {
                    self.set_dec_mode(group[0], true);
                }
            }
            (b"?", b'l') => {
                for group in params.iter_groups() {
                    self.set_dec_mode(group[0], false);
                }
            }
            (b"", b'm') => self.apply_sgr(params),
            (b">", b'm') => {} // XTMODKEYS: accepted, not needed
            (b"", b'n') => self.device_status(params.raw(0).unwrap_or(0), false),
            (b"?", b'n') => self.device_status(params.raw(0).unwrap_or(0), true),
            (b"!", b'p') => self.soft_reset(),
            (b"$", b'p') => self.report_mode(params.raw(0).unwrap_or(0), false),
            (b"?$", b'p') => self.report_mode(params.raw(0).unwrap_or(0), true),
            (b" ", b'q') => {
                self.cursor_style = CursorStyle::from_param(params.raw(0).unwrap_or(1));
            }
            (b"", b'r') => self.set_scroll_region(params),
            (b"", b's') => {
                if self.modes.contains(DecModes::MARGIN_MODE) {
                    self.set_lr_margins(params);
                } else {
                    self.save_cursor();
                }
            }
            (b"", b't') => self.window_ops(params),
            (b"", b'u') => self.restore_cursor(),
            (b"?", b'u') => {
                let flags = self.keyboard().current().bits();
                self.send_csi(&format!("?{flags}u"));
            }
            (b">", b'u') => {
                let flags = KittyFlags::from_bits_truncate(params.raw(0).unwrap_or(1) as u8);
                self.keyboard().push(flags);
            }
            (b"<", b'u') => {
                let count = params.get(0, 1) as usize;
                self.keyboard().pop(count);
            }
            (b"=", b'u') => {
                let flags = KittyFlags::from_bits_truncate(params.raw(0).unwrap_or(0) as u8);
                let mode = params.get(1, 1);
                self.keyboard().set(flags, mode);
            }
            (b"*", b'y') => self.checksum_report(params),
            (b"'", b'}') => self.insert_columns(params.get(0, 1) as usize),
            (b"'", b'~') => self.delete_columns(params.get(0, 1) as usize),
            _ => {
                tracing::debug!(
                    collect = %String::from_utf8_lossy(collect),
                    final_byte = %(final_byte as char),
                    "unhandled CSI"
                );
            }
        }
    }

    pub(crate) fn handle_esc(&mut self, collect: &[u8], final_byte: u8) {
        match (collect, final_byte) {
            (b"", b'7') => self.save_cursor(),
            (b"", b'8') => self.restore_cursor(),
            (b"#", b'8') => self.screen_alignment_fill(),
            (b"#", size @ (b'3' | b'4' | b'5' | b'6')) => self.set_line_render_mode(size),
            (b"", b'D') => self.index(),
            (b"", b'E') => {
                self.index();
                self.carriage_return();
            }
            (b"", b'M') => self.reverse_index(),
            (b"", b'H') => {
                let b = self.active_buffer_mut();
                let col = b.cursor.x.min(b.cols() - 1);
                b.set_tab_stop(col);
            }
            (b"", b'c') => self.reset(),
            (b"", b'=') => self.modes.set(DecModes::APP_KEYPAD, true),
            (b"", b'>') => self.modes.set(DecModes::APP_KEYPAD, false),
            (b"", b'N') => self.charsets.single_shift(2),
            (b"", b'O') => self.charsets.single_shift(3),
            (b"", b'n') => self.charsets.lock(2),
            (b"", b'o') => self.charsets.lock(3),
            (b"", b'\\') => {} // stray ST
            (b" ", b'F') => self.use_8bit_c1 = false,
            (b" ", b'G') => self.use_8bit_c1 = true,
            ([slot @ (b'(' | b')' | b'*' | b'+' | b'-' | b'.' | b'/')], final_byte) => {
                let slot = match slot {
                    b'(' => 0,
                    b')' | b'-' => 1,
                    b'*' | b'.' => 2,
                    _ => 3,
                };
                self.charsets.designate(slot, Charset::from_final(final_byte));
            }
            _ => {
                tracing::debug!(
                    collect = %String::from_utf8_lossy(collect),
                    final_byte = %(final_byte as char),
                    "unhandled ESC"
                );
            }
        }
    }

    // ── Cursor motion ───────────────────────────────────────────────

    fn cursor_up(&mut self, n: usize) {
        let b = self.active_buffer_mut();
        b.cursor.x = b.cursor.x.min(b.cols() - 1);
        let top = if b.cursor.y >= b.scroll_top {
            b.scroll_top
        } else {
            0
        };
        b.cursor.y = b.cursor.y.saturating_sub(n).max(top);
    }

    fn cursor_down(&mut self, n: usize) {
        let b = self.active_buffer_mut();
        b.cursor.x = b.cursor.x.min(b.cols() - 1);
        let bottom = if b.cursor.y <= b.scroll_bottom {
            b.scroll_bottom
        } else {
            b.rows() - 1
        };
        b.cursor.y = (b.cursor.y + n).min(bottom);
    }

    fn cursor_forward(&mut self, n: usize) {
        let (_, right) = self.h_bounds();
        let b = self.active_buffer_mut();
        let bound = if b.cursor.x <= right { right } else { b.cols() - 1 };
        b.cursor.x = (b.cursor.x.min(b.cols() - 1) + n).min(bound);
    }

    fn cursor_back(&mut self, n: usize) {
        let (left, _) = self.h_bounds();
        let b = self.active_buffer_mut();
        let bound = if b.cursor.x >= left { left } else { 0 };
        b.cursor.x = b.cursor.x.min(b.cols() - 1).saturating_sub(n).max(bound);
    }

    /// CNL/CPL land on the left margin, margin mode or not.
    fn cursor_to_left_margin(&mut self) {
        let b = self.active_buffer_mut();
        b.cursor.x = b.margin_left.min(b.cols() - 1);
    }

    fn cursor_to_column(&mut self, col: usize) {
        let origin = self.modes.contains(DecModes::ORIGIN);
        let b = self.active_buffer_mut();
        b.cursor.x = if origin {
            (b.margin_left + col).min(b.margin_right)
        } else {
            col.min(b.cols() - 1)
        };
    }

    fn cursor_to_row(&mut self, row: usize) {
        let origin = self.modes.contains(DecModes::ORIGIN);
        let b = self.active_buffer_mut();
        b.cursor.x = b.cursor.x.min(b.cols() - 1);
        b.cursor.y = if origin {
            (b.scroll_top + row).min(b.scroll_bottom)
        } else {
            row.min(b.rows() - 1)
        };
    }

    pub(crate) fn set_cursor_pos(&mut self, row: usize, col: usize) {
        let origin = self.modes.contains(DecModes::ORIGIN);
        let (left, right) = self.h_bounds();
        let b = self.active_buffer_mut();
        if origin {
            b.cursor.y = (b.scroll_top + row).min(b.scroll_bottom);
            b.cursor.x = (left + col).min(right);
        } else {
            b.cursor.y = row.min(b.rows() - 1);
            b.cursor.x = col.min(b.cols() - 1);
        }
    }

    fn tab_forward(&mut self, n: usize) {
        for _ in 0..n {
            let (_, right) = self.h_bounds();
            let b = self.active_buffer_mut();
            b.cursor.x = b.next_tab_stop(b.cursor.x.min(b.cols() - 1), right);
        }
    }

    fn tab_backward(&mut self, n: usize) {
        for _ in 0..n {
            let (left, _) = self.h_bounds();
            let b = self.active_buffer_mut();
            b.cursor.x = b.prev_tab_stop(b.cursor.x.min(b.cols() - 1), left);
        }
    }

    fn clear_tabs(&mut self, mode: i32) {
        let b = self.active_buffer_mut();
        match mode {
            0 => {
                let col = b.cursor.x.min(b.cols() - 1);
                b.clear_tab_stop(col);
            }
            3 => b.clear_all_tab_stops(),
            _ => {}
        }
    }

    // ── Index / reverse index ───────────────────────────────────────

    pub(crate) fn index(&mut self) {
        let attrs = self.attrs;
        let (left, right) = self.h_bounds();
        let b = self.active_buffer_mut();
        if b.cursor.y == b.scroll_bottom {
            b.scroll_up(1, left, right, attrs);
        } else if b.cursor.y + 1 < b.rows() {
            b.cursor.y += 1;
        }
    }

    pub(crate) fn reverse_index(&mut self) {
        let attrs = self.attrs;
        let (left, right) = self.h_bounds();
        let b = self.active_buffer_mut();
        if b.cursor.y == b.scroll_top {
            b.scroll_down(1, left, right, attrs);
        } else {
            b.cursor.y = b.cursor.y.saturating_sub(1);
        }
    }

    // ── Erase ───────────────────────────────────────────────────────

    fn erase_display(&mut self, mode: i32) {
        let attrs = self.attrs;
        let b = self.active_buffer_mut();
        let cols = b.cols();
        let rows = b.rows();
        match mode {
            0 => {
                let (x, y) = (b.cursor.x.min(cols), b.cursor.y);
                if let Some(line) = b.line_mut(y) {
                    line.erase_range(x, cols, attrs);
                }
                for row in y + 1..rows {
                    if let Some(line) = b.line_mut(row) {
                        line.erase_range(0, cols, attrs);
                        line.is_wrapped = false;
                    }
                }
                b.dirty.mark_range(y, rows - 1);
            }
            1 => {
                let (x, y) = (b.cursor.x.min(cols - 1), b.cursor.y);
                for row in 0..y {
                    if let Some(line) = b.line_mut(row) {
                        line.erase_range(0, cols, attrs);
                        line.is_wrapped = false;
                    }
                }
                if let Some(line) = b.line_mut(y) {
                    line.erase_range(0, x + 1, attrs);
                }
                b.dirty.mark_range(0, y);
            }
            2 => {
                for row in 0..rows {
                    if let Some(line) = b.line_mut(row) {
                        line.erase_range(0, cols, attrs);
                        line.is_wrapped = false;
                    }
                }
                b.dirty.mark_all();
            }
            3 => b.clear_scrollback(),
            _ => {}
        }
    }

    fn erase_line(&mut self, mode: i32) {
        let attrs = self.attrs;
        let b = self.active_buffer_mut();
        let cols = b.cols();
        let (x, y) = (b.cursor.x.min(cols - 1), b.cursor.y);
        if let Some(line) = b.line_mut(y) {
            match mode {
                0 => line.erase_range(x, cols, attrs),
                1 => line.erase_range(0, x + 1, attrs),
                2 => line.erase_range(0, cols, attrs),
                _ => return,
            }
        }
        b.dirty.mark(y);
    }

    fn erase_chars(&mut self, n: usize) {
        let attrs = self.attrs;
        let b = self.active_buffer_mut();
        let cols = b.cols();
        let (x, y) = (b.cursor.x.min(cols - 1), b.cursor.y);
        if let Some(line) = b.line_mut(y) {
            line.erase_range(x, x + n, attrs);
        }
        b.dirty.mark(y);
    }

    // ── Editing ─────────────────────────────────────────────────────

    fn insert_chars(&mut self, n: usize) {
        let attrs = self.attrs;
        let (_, right) = self.h_bounds();
        let b = self.active_buffer_mut();
        let (x, y) = (b.cursor.x.min(b.cols() - 1), b.cursor.y);
        if let Some(line) = b.line_mut(y) {
            line.insert_cells(x, n, right, attrs);
        }
        b.dirty.mark(y);
    }

    fn delete_chars(&mut self, n: usize) {
        let attrs = self.attrs;
        let (_, right) = self.h_bounds();
        let b = self.active_buffer_mut();
        let (x, y) = (b.cursor.x.min(b.cols() - 1), b.cursor.y);
        if let Some(line) = b.line_mut(y) {
            line.delete_cells(x, n, right, attrs);
        }
        b.dirty.mark(y);
    }

    fn insert_lines_cmd(&mut self, n: usize) {
        let attrs = self.attrs;
        let (left, right) = self.h_bounds();
        let b = self.active_buffer_mut();
        let y = b.cursor.y;
        b.insert_lines(y, n, left, right, attrs);
        b.cursor.x = left;
    }

    fn delete_lines_cmd(&mut self, n: usize) {
        let attrs = self.attrs;
        let (left, right) = self.h_bounds();
        let b = self.active_buffer_mut();
        let y = b.cursor.y;
        b.delete_lines(y, n, left, right, attrs);
        b.cursor.x = left;
    }

    fn scroll_up_cmd(&mut self, n: usize) {
        let attrs = self.attrs;
        let (left, right) = self.h_bounds();
        self.active_buffer_mut().scroll_up(n, left, right, attrs);
    }

    fn scroll_down_cmd(&mut self, n: usize) {
        let attrs = self.attrs;
        let (left, right) = self.h_bounds();
        self.active_buffer_mut().scroll_down(n, left, right, attrs);
    }

    /// DECIC: insert columns at the cursor within the scroll region.
    fn insert_columns(&mut self, n: usize) {
        let attrs = self.attrs;
        let (_, right) = self.h_bounds();
        let b = self.active_buffer_mut();
        let x = b.cursor.x.min(b.cols() - 1);
        let (top, bottom) = (b.scroll_top, b.scroll_bottom);
        for row in top..=bottom {
            if let Some(line) = b.line_mut(row) {
                line.insert_cells(x, n, right, attrs);
                line.is_wrapped = false;
            }
        }
        b.dirty.mark_range(top, bottom);
    }

    /// DECDC: delete columns at the cursor within the scroll region.
    fn delete_columns(&mut self, n: usize) {
        let attrs = self.attrs;
        let (_, right) = self.h_bounds();
        let b = self.active_buffer_mut();
        let x = b.cursor.x.min(b.cols() - 1);
        let (top, bottom) = (b.scroll_top, b.scroll_bottom);
        for row in top..=bottom {
            if let Some(line) = b.line_mut(row) {
                line.delete_cells(x, n, right, attrs);
                line.is_wrapped = false;
            }
        }
        b.dirty.mark_range(top, bottom);
    }

    fn repeat_last(&mut self, n: usize) {
        if let Some(ch) = self.last_char {
            let width = crate::width::scalar_width(ch).max(1) as usize;
            for _ in 0..n.min(4096) {
                self.put_char(ch, width);
            }
        }
    }

    // ── Regions and margins ─────────────────────────────────────────

    fn set_scroll_region(&mut self, params: &Params) {
        let top = params.get(0, 1) as usize - 1;
        let b = self.active_buffer_mut();
        let bottom = params.get(1, b.rows() as i32) as usize - 1;
        b.set_scroll_region(top, bottom);
        drop(b);
        self.set_cursor_pos(0, 0);
    }

    fn set_lr_margins(&mut self, params: &Params) {
        let left = params.get(0, 1) as usize - 1;
        let b = self.active_buffer_mut();
        let right = params.get(1, b.cols() as i32) as usize - 1;
        b.set_margins(left, right);
        drop(b);
        self.set_cursor_pos(0, 0);
    }

    /// DECDHL/DECDWL/DECSWL (ESC # 3/4/6/5) on the cursor line.
    fn set_line_render_mode(&mut self, size: u8) {
        use crate::line::RenderMode;
        let mode = match size {
            b'3' => RenderMode::DoubledTop,
            b'4' => RenderMode::DoubledDown,
            b'6' => RenderMode::DoubleWidth,
            _ => RenderMode::Single,
        };
        let b = self.active_buffer_mut();
        let y = b.cursor.y;
        if let Some(line) = b.line_mut(y) {
            line.render_mode = mode;
        }
        b.dirty.mark(y);
    }

    /// DECALN: fill the screen with `E`, reset margins, home the cursor.
    fn screen_alignment_fill(&mut self) {
        let b = self.active_buffer_mut();
        let rows = b.rows();
        let cols = b.cols();
        b.scroll_top = 0;
        b.scroll_bottom = rows - 1;
        b.margin_left = 0;
        b.margin_right = cols - 1;
        for row in 0..rows {
            if let Some(line) = b.line_mut(row) {
                for cell in line.cells_mut() {
                    cell.set_content('E', 1);
                    cell.attrs = Default::default();
                    cell.atom = 0;
                }
                line.is_wrapped = false;
            }
        }
        b.cursor.x = 0;
        b.cursor.y = 0;
        b.dirty.mark_all();
    }

    // ── Modes ───────────────────────────────────────────────────────

    fn set_ansi_mode(&mut self, mode: i32, enable: bool) {
        match mode {
            4 => self.modes.ansi.set(AnsiModes::INSERT, enable),
            20 => self.modes.ansi.set(AnsiModes::NEW_LINE, enable),
            _ => tracing::debug!(mode, enable, "unknown ANSI mode"),
        }
    }

    fn set_dec_mode(&mut self, mode: i32, enable: bool) {
        match mode {
            1 => self.modes.set(DecModes::APP_CURSOR_KEYS, enable),
            3 => self.set_column_mode(enable),
            5 => {
                self.modes.set(DecModes::REVERSE_VIDEO, enable);
                self.active_buffer_mut().dirty.mark_all();
            }
            6 => {
                self.modes.set(DecModes::ORIGIN, enable);
                self.set_cursor_pos(0, 0);
            }
            7 => self.modes.set(DecModes::AUTO_WRAP, enable),
            9 => self.set_mouse_mode(MouseMode::X10, enable),
            12 => self.modes.set(DecModes::CURSOR_BLINK, enable),
            25 => self.modes.set(DecModes::SHOW_CURSOR, enable),
            40 => self.modes.set(DecModes::ALLOW_COLUMN_132, enable),
            45 => self.modes.set(DecModes::REVERSE_WRAP, enable),
            47 => {
                if enable {
                    self.activate_alt(false, false);
                } else {
                    self.activate_normal(false);
                }
            }
            66 => self.modes.set(DecModes::APP_KEYPAD, enable),
            69 => {
                self.modes.set(DecModes::MARGIN_MODE, enable);
                if !enable {
                    let b = self.active_buffer_mut();
                    b.margin_left = 0;
                    b.margin_right = b.cols() - 1;
                }
            }
            1000 => self.set_mouse_mode(MouseMode::Normal, enable),
            1002 => self.set_mouse_mode(MouseMode::Button, enable),
            1003 => self.set_mouse_mode(MouseMode::AnyEvent, enable),
            1004 => self.modes.set(DecModes::FOCUS_EVENTS, enable),
            1005 => self.set_mouse_encoding(MouseEncoding::Utf8, enable),
            1006 => self.set_mouse_encoding(MouseEncoding::Sgr, enable),
            1015 => self.set_mouse_encoding(MouseEncoding::Urxvt, enable),
            1016 => self.set_mouse_encoding(MouseEncoding::SgrPixel, enable),
            1047 => {
                if enable {
                    self.activate_alt(true, false);
                } else {
                    self.activate_normal(false);
                }
            }
            1048 => {
                if enable {
                    self.save_cursor();
                } else {
                    self.restore_cursor();
                }
            }
            1049 => {
                if enable {
                    self.activate_alt(true, true);
                } else {
                    self.activate_normal(true);
                }
            }
            2004 => self.modes.set(DecModes::BRACKETED_PASTE, enable),
            _ => tracing::debug!(mode, enable, "unknown DEC private mode"),
        }
    }

    fn set_mouse_mode(&mut self, mode: MouseMode, enable: bool) {
        if enable {
            self.modes.mouse_mode = mode;
        } else if self.modes.mouse_mode == mode {
            self.modes.mouse_mode = MouseMode::None;
        }
    }

    fn set_mouse_encoding(&mut self, encoding: MouseEncoding, enable: bool) {
        if enable {
            self.modes.mouse_encoding = encoding;
        } else if self.modes.mouse_encoding == encoding {
            self.modes.mouse_encoding = MouseEncoding::Default;
        }
    }

    /// DECCOLM (?3): switch between 80 and 132 columns.
    fn set_column_mode(&mut self, enable: bool) {
        if !self.modes.contains(DecModes::ALLOW_COLUMN_132) {
            return;
        }
        self.modes.set(DecModes::COLUMN_132, enable);
        let cols = if enable { 132 } else { 80 };
        let rows = self.rows();
        self.resize(cols, rows);
        self.erase_display(2);
        let b = self.active_buffer_mut();
        b.scroll_top = 0;
        b.scroll_bottom = rows - 1;
        b.margin_left = 0;
        b.margin_right = cols - 1;
        b.cursor.x = 0;
        b.cursor.y = 0;
        self.host.request_resize(cols, rows);
    }

    /// DECRQM reply: 1 set, 2 reset, 0 unknown.
    fn report_mode(&mut self, mode: i32, dec_private: bool) {
        let state = if dec_private {
            match mode {
                1 => Some(self.modes.contains(DecModes::APP_CURSOR_KEYS)),
                3 => Some(self.modes.contains(DecModes::COLUMN_132)),
                5 => Some(self.modes.contains(DecModes::REVERSE_VIDEO)),
                6 => Some(self.modes.contains(DecModes::ORIGIN)),
                7 => Some(self.modes.contains(DecModes::AUTO_WRAP)),
                9 => Some(self.modes.mouse_mode == MouseMode::X10),
                12 => Some(self.modes.contains(DecModes::CURSOR_BLINK)),
                25 => Some(self.modes.contains(DecModes::SHOW_CURSOR)),
                40 => Some(self.modes.contains(DecModes::ALLOW_COLUMN_132)),
                45 => Some(self.modes.contains(DecModes::REVERSE_WRAP)),
                47 | 1047 | 1049 => Some(self.is_alt_active()),
                69 => Some(self.modes.contains(DecModes::MARGIN_MODE)),
                1000 => Some(self.modes.mouse_mode == MouseMode::Normal),
                1002 => Some(self.modes.mouse_mode == MouseMode::Button),
                1003 => Some(self.modes.mouse_mode == MouseMode::AnyEvent),
                1004 => Some(self.modes.contains(DecModes::FOCUS_EVENTS)),
                1005 => Some(self.modes.mouse_encoding == MouseEncoding::Utf8),
                1006 => Some(self.modes.mouse_encoding == MouseEncoding::Sgr),
                1015 => Some(self.modes.mouse_encoding == MouseEncoding::Urxvt),
                1016 => Some(self.modes.mouse_encoding == MouseEncoding::SgrPixel),
                2004 => Some(self.modes.contains(DecModes::BRACKETED_PASTE)),
                _ => None,
            }
        } else {
            match mode {
                4 => Some(self.modes.ansi.contains(AnsiModes::INSERT)),
                20 => Some(self.modes.ansi.contains(AnsiModes::NEW_LINE)),
                _ => None,
            }
        };
        let value = match state {
            Some(true) => 1,
            Some(false) => 2,
            None => 0,
        };
        let marker = if dec_private { "?" } else { "" };
        self.send_csi(&format!("{marker}{mode};{value}$y"));
    }

    // ── SGR ─────────────────────────────────────────────────────────

    pub(crate) fn apply_sgr(&mut self, params: &Params) {
        if params.is_empty() {
            self.attrs.reset();
            return;
        }
        let count = params.len();
        let mut i = 0;
        while i < count {
            let group = params.group(i);
            let code = group[0];
            use crate::cell::SgrFlags as F;
            match code {
                0 => self.attrs.reset(),
                1 => self.attrs.flags.insert(F::BOLD),
                2 => self.attrs.flags.insert(F::DIM),
                3 => self.attrs.flags.insert(F::ITALIC),
                4 => {
                    // 4:0 clears; any other subparameter style underlines.
                    if group.get(1) == Some(&0) {
                        self.attrs.flags.remove(F::UNDERLINE);
                    } else {
                        self.attrs.flags.insert(F::UNDERLINE);
                    }
                }
                5 | 6 => self.attrs.flags.insert(F::BLINK),
                7 => self.attrs.flags.insert(F::INVERSE),
                8 => self.attrs.flags.insert(F::INVISIBLE),
                9 => self.attrs.flags.insert(F::CROSSED_OUT),
                21 => self.attrs.flags.insert(F::UNDERLINE),
                22 => self.attrs.flags.remove(F::BOLD | F::DIM),
                23 => self.attrs.flags.remove(F::ITALIC),
                24 => self.attrs.flags.remove(F::UNDERLINE),
                25 => self.attrs.flags.remove(F::BLINK),
                27 => self.attrs.flags.remove(F::INVERSE),
                28 => self.attrs.flags.remove(F::INVISIBLE),
                29 => self.attrs.flags.remove(F::CROSSED_OUT),
                30..=37 => self.attrs.fg = Color::Ansi((code - 30) as u8),
                38 | 48 | 58 => {
                    let (color, consumed_groups) = if group.len() > 1 {
                        (extended_color(&group[1..]), 0)
                    } else {
                        self.extended_color_semicolon(params, i)
                    };
                    if let Some(color) = color {
                        match code {
                            38 => self.attrs.fg = color,
                            48 => self.attrs.bg = color,
                            _ => self.attrs.underline_color = Some(color),
                        }
                    }
                    i += consumed_groups;
                }
                39 => self.attrs.fg = Color::Default,
                40..=47 => self.attrs.bg = Color::Ansi((code - 40) as u8),
                49 => self.attrs.bg = Color::Default,
                59 => self.attrs.underline_color = None,
                90..=97 => self.attrs.fg = Color::Ansi((code - 90 + 8) as u8),
                100..=107 => self.attrs.bg = Color::Ansi((code - 100 + 8) as u8),
                _ => tracing::debug!(code, "unknown SGR parameter"),
            }
            i += 1;
        }
    }

    /// Legacy `38;5;n` / `38;2;r;g;b` forms spread across groups.
    fn extended_color_semicolon(
        &self,
        params: &Params,
        at: usize,
    ) -> (Option<Color>, usize) {
        match params.raw(at + 1) {
            Some(5) => {
                let color = params
                    .raw(at + 2)
                    .map(|n| Color::Ansi(n.clamp(0, 255) as u8));
                (color, 2)
            }
            Some(2) => {
                let channels = (
                    params.raw(at + 2),
                    params.raw(at + 3),
                    params.raw(at + 4),
                );
                if let (Some(r), Some(g), Some(b)) = channels {
                    (
                        Some(Color::Rgb(
                            r.clamp(0, 255) as u8,
                            g.clamp(0, 255) as u8,
                            b.clamp(0, 255) as u8,
                        )),
                        4,
                    )
                } else {
                    (None, 4)
                }
            }
            _ => (None, 0),
        }
    }

    // ── Reports ─────────────────────────────────────────────────────

    fn primary_attributes(&mut self) {
        // VT220-class with ANSI color; sixel advertised when enabled. A
        // vt100-family term name downgrades to the classic answer.
        let body = if self.options().term_name.starts_with("vt100") {
            "?1;2c"
        } else if self.options().enable_sixel_reported {
            "?62;4;22c"
        } else {
            "?62;22c"
        };
        self.send_csi(body);
    }

    fn secondary_attributes(&mut self) {
        self.send_csi(">41;354;0c");
    }

    fn device_status(&mut self, code: i32, dec_private: bool) {
        match code {
            5 => self.send_csi("0n"),
            6 => {
                let origin = self.modes.contains(DecModes::ORIGIN);
                let b = self.active_buffer();
                let (mut row, mut col) = (b.cursor.y, b.cursor.x.min(b.cols() - 1));
                if origin {
                    row = row.saturating_sub(b.scroll_top);
                    col = col.saturating_sub(b.margin_left);
                }
                if dec_private {
                    self.send_csi(&format!("?{};{};1R", row + 1, col + 1));
                } else {
                    self.send_csi(&format!("{};{}R", row + 1, col + 1));
                }
            }
            _ => tracing::debug!(code, "unknown DSR request"),
        }
    }

    /// DECRQCRA: checksum of a screen rectangle, gated on trust.
    fn checksum_report(&mut self, params: &Params) {
        let id = params.raw(0).unwrap_or(0);
        if !self.host_trusted() {
            return;
        }
        let b = self.active_buffer();
        let rows = b.rows();
        let cols = b.cols();
        let top = (params.get(2, 1) as usize - 1).min(rows - 1);
        let left = (params.get(3, 1) as usize - 1).min(cols - 1);
        let bottom = (params.get(4, rows as i32) as usize - 1).min(rows - 1);
        let right = (params.get(5, cols as i32) as usize - 1).min(cols - 1);

        let mut sum: u32 = 0;
        for row in top..=bottom.max(top) {
            if let Some(line) = b.line(row) {
                for col in left..=right.max(left) {
                    if let Some(cell) = line.cell(col) {
                        sum = sum.wrapping_add(cell.code());
                        for &mark in cell.zerowidth() {
                            sum = sum.wrapping_add(mark as u32);
                        }
                    }
                }
            }
        }
        self.send_dcs(&format!("{id}!~{:04x}", sum & 0xffff));
    }

    fn window_ops(&mut self, params: &Params) {
        match params.raw(0).unwrap_or(0) {
            8 => {
                let rows = params.get(1, self.rows() as i32) as usize;
                let cols = params.get(2, self.cols() as i32) as usize;
                self.host_request_resize(cols, rows);
            }
            14 => {
                let body = format!(
                    "4;{};{}t",
                    self.rows() as u32 * CELL_PIXEL_HEIGHT,
                    self.cols() as u32 * CELL_PIXEL_WIDTH
                );
                self.send_csi(&body);
            }
            16 => {
                self.send_csi(&format!("6;{CELL_PIXEL_HEIGHT};{CELL_PIXEL_WIDTH}t"));
            }
            18 => {
                let body = format!("8;{};{}t", self.rows(), self.cols());
                self.send_csi(&body);
            }
            19 => {
                let body = format!("9;{};{}t", self.rows(), self.cols());
                self.send_csi(&body);
            }
            20 => {
                if self.host_trusted() {
                    let title = self.title().to_owned();
                    self.send_osc(&format!("L{title}"));
                }
            }
            21 => {
                if self.host_trusted() {
                    let title = self.title().to_owned();
                    self.send_osc(&format!("l{title}"));
                }
            }
            22 => self.push_title(),
            23 => self.pop_title(),
            other => tracing::debug!(op = other, "ignored window op"),
        }
    }
}

/// Colon-form extended color: `[5, n]`, `[2, r, g, b]`, or
/// `[2, colorspace, r, g, b]`.
fn extended_color(args: &[i32]) -> Option<Color> {
    match *args.first()? {
        5 => args.get(1).map(|&n| Color::Ansi(n.clamp(0, 255) as u8)),
        2 => {
            let rgb: &[i32] = if args.len() >= 5 { &args[2..5] } else { args.get(1..4)? };
            Some(Color::Rgb(
                rgb[0].clamp(0, 255) as u8,
                rgb[1].clamp(0, 255) as u8,
                rgb[2].clamp(0, 255) as u8,
            ))
        }
        _ => None,
    }
}
