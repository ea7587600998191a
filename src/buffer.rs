//! Screen buffer: the line ring plus the coordinate system around it.
//!
//! A buffer owns one [`LineRing`] holding scrollback and visible rows in a
//! single logical address space. `y_base` is the logical index of the first
//! visible row; `y_disp` is the first *rendered* row and lags behind
//! `y_base` while the user scrolls back. The normal buffer keeps
//! scrollback; the alternate buffer is always exactly viewport-sized.
//!
//! # Invariants
//!
//! 1. Every line holds exactly `cols` cells.
//! 2. `cursor.x <= cols` (equality = pending wrap), `cursor.y < rows`.
//! 3. `scroll_top <= scroll_bottom < rows`; `margin_left <= margin_right < cols`.
//! 4. `y_disp <= y_base`; the ring never exceeds its capacity.

use crate::cell::SgrAttrs;
use crate::cursor::{Cursor, SavedCursor};
use crate::dirty::DirtyLines;
use crate::line::BufferLine;
use crate::ring::LineRing;

/// One screen buffer (normal or alternate).
#[derive(Debug, Clone)]
pub struct Buffer {
    lines: LineRing,
    cols: usize,
    rows: usize,
    /// Logical index of the first visible row.
    pub y_base: usize,
    /// Logical index of the first rendered row (user scrollback position).
    pub y_disp: usize,
    /// Lines dropped from the ring start since creation; keeps externally
    /// held absolute indices meaningful across trims.
    pub lines_top: u64,
    pub cursor: Cursor,
    pub saved_cursor: Option<SavedCursor>,
    /// Scroll region, inclusive rows.
    pub scroll_top: usize,
    pub scroll_bottom: usize,
    /// Horizontal margins, inclusive columns (effective under DECLRMM).
    pub margin_left: usize,
    pub margin_right: usize,
    tab_stops: Vec<bool>,
    tab_interval: usize,
    /// Extra lines retained beyond the viewport (0 for the alt buffer).
    scrollback: usize,
    pub dirty: DirtyLines,
}

impl Buffer {
    /// Create a buffer with all viewport rows materialized.
    #[must_use]
    pub fn new(cols: usize, rows: usize, scrollback: usize, tab_interval: usize) -> Self {
        let cols = cols.max(2);
        let rows = rows.max(1);
        let mut lines = LineRing::new(rows + scrollback);
        for _ in 0..rows {
            lines.push(BufferLine::blank(cols, SgrAttrs::default()));
        }
        let mut buffer = Self {
            lines,
            cols,
            rows,
            y_base: 0,
            y_disp: 0,
            lines_top: 0,
            cursor: Cursor::default(),
            saved_cursor: None,
            scroll_top: 0,
            scroll_bottom: rows - 1,
            margin_left: 0,
            margin_right: cols - 1,
            tab_stops: Vec::new(),
            tab_interval: tab_interval.max(1),
            scrollback,
            dirty: DirtyLines::new(rows),
        };
        buffer.reset_tab_stops();
        buffer
    }

    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Total retained lines (scrollback + visible).
    #[must_use]
    pub fn total_lines(&self) -> usize {
        self.lines.len()
    }

    /// Upper bound on retained lines (viewport + scrollback allowance).
    #[must_use]
    pub fn max_lines(&self) -> usize {
        self.lines.max_len()
    }

    #[must_use]
    pub fn has_scrollback(&self) -> bool {
        self.scrollback > 0
    }

    #[must_use]
    pub fn is_user_scrolling(&self) -> bool {
        self.y_disp != self.y_base
    }

    // ── Line access ─────────────────────────────────────────────────

    /// Line at an absolute logical index.
    #[must_use]
    pub fn line_abs(&self, index: usize) -> Option<&BufferLine> {
        self.lines.get(index)
    }

    pub fn line_abs_mut(&mut self, index: usize) -> Option<&mut BufferLine> {
        self.lines.get_mut(index)
    }

    /// Line at a viewport-relative row.
    #[must_use]
    pub fn line(&self, row: usize) -> Option<&BufferLine> {
        self.lines.get(self.y_base + row)
    }

    pub fn line_mut(&mut self, row: usize) -> Option<&mut BufferLine> {
        self.lines.get_mut(self.y_base + row)
    }

    /// Iterate every retained line, oldest first.
    pub fn iter_lines(&self) -> impl Iterator<Item = &BufferLine> {
        self.lines.iter()
    }

    // ── Tab stops ───────────────────────────────────────────────────

    /// Reinitialize tab stops at the configured interval.
    pub fn reset_tab_stops(&mut self) {
        self.tab_stops = (0..self.cols)
            .map(|c| c % self.tab_interval == 0)
            .collect();
    }

    pub fn set_tab_stop(&mut self, col: usize) {
        if let Some(stop) = self.tab_stops.get_mut(col) {
            *stop = true;
        }
    }

    pub fn clear_tab_stop(&mut self, col: usize) {
        if let Some(stop) = self.tab_stops.get_mut(col) {
            *stop = false;
        }
    }

    pub fn clear_all_tab_stops(&mut self) {
        self.tab_stops.fill(false);
    }

    /// Next tab stop strictly right of `col`, bounded by `right`.
    #[must_use]
    pub fn next_tab_stop(&self, col: usize, right: usize) -> usize {
        let right = right.min(self.cols - 1);
        let mut c = col;
        while c < right {
            c += 1;
            if self.tab_stops.get(c).copied().unwrap_or(false) {
                return c;
            }
        }
        right
    }

    /// Previous tab stop strictly left of `col`, bounded by `left`.
    #[must_use]
    pub fn prev_tab_stop(&self, col: usize, left: usize) -> usize {
        let mut c = col.min(self.cols);
        while c > left {
            c -= 1;
            if self.tab_stops.get(c).copied().unwrap_or(false) {
                return c;
            }
        }
        left
    }

    // ── Scrolling ───────────────────────────────────────────────────

    /// Scroll the region up by `n` lines within `[left, right]` columns.
    ///
    /// With the region anchored at the top of the screen, full margins,
    /// and scrollback enabled, evicted lines are retained: the ring grows
    /// (or recycles once full) and `y_base` advances. Otherwise the lines
    /// shift in place and the vacated bottom rows are blanked.
    pub fn scroll_up(&mut self, n: usize, left: usize, right: usize, attrs: SgrAttrs) {
        if n == 0 || self.scroll_top > self.scroll_bottom {
            return;
        }
        let span = self.scroll_bottom - self.scroll_top + 1;
        let n = n.min(span);
        let full_width = left == 0 && right >= self.cols - 1;

        if self.scroll_top == 0
            && self.scroll_bottom == self.rows - 1
            && full_width
            && self.has_scrollback()
        {
            for _ in 0..n {
                if self.lines.is_full() {
                    self.lines.recycle(self.cols, attrs);
                    self.lines_top += 1;
                    // y_base already points at the last `rows` lines; the
                    // recycle slid content under it. y_disp holds steady
                    // while the user is scrolling.
                    if !self.is_user_scrolling() {
                        self.y_disp = self.y_base;
                    } else {
                        self.y_disp = self.y_disp.min(self.y_base);
                    }
                } else {
                    self.lines.push(BufferLine::blank(self.cols, attrs));
                    self.y_base += 1;
                    if !self.is_user_scrolling() {
                        self.y_disp = self.y_base;
                    }
                }
            }
            self.dirty.mark_all();
            return;
        }

        if full_width {
            let start = self.y_base + self.scroll_top;
            self.lines.shift_elements(start + n, span - n, -(n as isize));
            for row in self.scroll_bottom + 1 - n..=self.scroll_bottom {
                if let Some(line) = self.line_mut(row) {
                    line.reset_keeping_width(attrs);
                }
            }
        } else {
            self.scroll_rect_up(n, left, right, attrs);
        }
        self.dirty.mark_range(self.scroll_top, self.scroll_bottom);
    }

    /// Scroll the region down by `n` lines within `[left, right]` columns.
    pub fn scroll_down(&mut self, n: usize, left: usize, right: usize, attrs: SgrAttrs) {
        if n == 0 || self.scroll_top > self.scroll_bottom {
            return;
        }
        let span = self.scroll_bottom - self.scroll_top + 1;
        let n = n.min(span);
        let full_width = left == 0 && right >= self.cols - 1;

        if full_width {
            let start = self.y_base + self.scroll_top;
            self.lines.shift_elements(start, span - n, n as isize);
            for row in self.scroll_top..self.scroll_top + n {
                if let Some(line) = self.line_mut(row) {
                    line.reset_keeping_width(attrs);
                }
            }
        } else {
            self.scroll_rect_down(n, left, right, attrs);
        }
        self.dirty.mark_range(self.scroll_top, self.scroll_bottom);
    }

    /// Vertical scroll restricted to a column range: move cell spans
    /// between lines, leaving the rest of each line untouched.
    fn scroll_rect_up(&mut self, n: usize, left: usize, right: usize, attrs: SgrAttrs) {
        let right = right.min(self.cols - 1);
        for row in self.scroll_top..=self.scroll_bottom {
            let src_row = row + n;
            if src_row <= self.scroll_bottom {
                let src = self
                    .line(src_row)
                    .map(|l| l.cells()[left..=right].to_vec());
                if let (Some(cells), Some(dst)) = (src, self.line_mut(row)) {
                    for (i, cell) in cells.into_iter().enumerate() {
                        if let Some(slot) = dst.cell_mut(left + i) {
                            *slot = cell;
                        }
                    }
                    dst.repair_wide_seams(left, right, attrs);
                }
            } else if let Some(line) = self.line_mut(row) {
                line.erase_range(left, right + 1, attrs);
            }
        }
    }

    fn scroll_rect_down(&mut self, n: usize, left: usize, right: usize, attrs: SgrAttrs) {
        let right = right.min(self.cols - 1);
        for row in (self.scroll_top..=self.scroll_bottom).rev() {
            if row >= self.scroll_top + n {
                let src_row = row - n;
                let src = self
                    .line(src_row)
                    .map(|l| l.cells()[left..=right].to_vec());
                if let (Some(cells), Some(dst)) = (src, self.line_mut(row)) {
                    for (i, cell) in cells.into_iter().enumerate() {
                        if let Some(slot) = dst.cell_mut(left + i) {
                            *slot = cell;
                        }
                    }
                    dst.repair_wide_seams(left, right, attrs);
                }
            } else if let Some(line) = self.line_mut(row) {
                line.erase_range(left, right + 1, attrs);
            }
        }
    }

    /// Insert `n` blank lines at `row` within the scroll region (IL).
    pub fn insert_lines(&mut self, row: usize, n: usize, left: usize, right: usize, attrs: SgrAttrs) {
        if row < self.scroll_top || row > self.scroll_bottom {
            return;
        }
        let saved_top = self.scroll_top;
        self.scroll_top = row;
        self.scroll_down(n, left, right, attrs);
        self.scroll_top = saved_top;
    }

    /// Delete `n` lines at `row` within the scroll region (DL).
    pub fn delete_lines(&mut self, row: usize, n: usize, left: usize, right: usize, attrs: SgrAttrs) {
        if row < self.scroll_top || row > self.scroll_bottom {
            return;
        }
        let saved_top = self.scroll_top;
        self.scroll_top = row;
        // DL never pushes to scrollback; force the in-place path by
        // scrolling with the restricted top.
        let span = self.scroll_bottom - self.scroll_top + 1;
        let n = n.min(span);
        let full_width = left == 0 && right >= self.cols - 1;
        if full_width {
            let start = self.y_base + self.scroll_top;
            self.lines.shift_elements(start + n, span - n, -(n as isize));
            for r in self.scroll_bottom + 1 - n..=self.scroll_bottom {
                if let Some(line) = self.line_mut(r) {
                    line.reset_keeping_width(attrs);
                }
            }
        } else {
            self.scroll_rect_up(n, left, right, attrs);
        }
        self.dirty.mark_range(self.scroll_top, self.scroll_bottom);
        self.scroll_top = saved_top;
    }

    /// Drop all scrollback lines (ED 3).
    pub fn clear_scrollback(&mut self) {
        if self.y_base == 0 {
            return;
        }
        let dropped = self.y_base;
        self.lines.trim_start(dropped);
        self.lines_top += dropped as u64;
        self.y_base = 0;
        self.y_disp = 0;
        self.dirty.mark_all();
    }

    /// Set the rendered scroll position (absolute logical index).
    pub fn scroll_display_to(&mut self, y: usize) {
        self.y_disp = y.min(self.y_base);
        self.dirty.mark_all();
    }

    /// Move the rendered position by a signed number of lines.
    pub fn scroll_display_by(&mut self, delta: isize) {
        let target = self.y_disp as isize + delta;
        self.scroll_display_to(target.max(0) as usize);
    }

    // ── Region / margin bookkeeping ─────────────────────────────────

    /// Set the vertical scroll region (DECSTBM), clamped and validated.
    pub fn set_scroll_region(&mut self, top: usize, bottom: usize) {
        let top = top.min(self.rows - 1);
        let bottom = bottom.min(self.rows - 1);
        if top < bottom {
            self.scroll_top = top;
            self.scroll_bottom = bottom;
        } else if top == 0 && bottom == 0 {
            self.scroll_top = 0;
            self.scroll_bottom = self.rows - 1;
        }
    }

    /// Set horizontal margins (DECSLRM), clamped and validated.
    pub fn set_margins(&mut self, left: usize, right: usize) {
        let left = left.min(self.cols - 1);
        let right = right.min(self.cols - 1);
        if left < right {
            self.margin_left = left;
            self.margin_right = right;
        }
    }

    // ── Resize ──────────────────────────────────────────────────────

    /// Resize to new dimensions, preserving content where possible.
    ///
    /// Width changes pad or truncate each retained line. Shrinking the
    /// height pushes rows above the cursor into scrollback (dropping
    /// trailing blank rows first); growing reveals scrollback before
    /// appending blanks. Regions and margins reset to the full screen.
    pub fn resize(&mut self, new_cols: usize, new_rows: usize, attrs: SgrAttrs) {
        let new_cols = new_cols.max(2);
        let new_rows = new_rows.max(1);

        if new_cols != self.cols {
            for i in 0..self.lines.len() {
                if let Some(line) = self.lines.get_mut(i) {
                    line.resize(new_cols, attrs);
                }
            }
            let old_cols = self.cols;
            self.cols = new_cols;
            // Stops beyond the new width drop; growing re-seeds the
            // configured interval across the new columns.
            self.tab_stops.resize(new_cols, false);
            for c in old_cols..new_cols {
                if c % self.tab_interval == 0 {
                    self.tab_stops[c] = true;
                }
            }
        }

        if new_rows > self.rows {
            let mut needed = new_rows - self.rows;
            // Reveal scrollback first so bottom content stays anchored.
            let reveal = needed.min(self.y_base);
            self.y_base -= reveal;
            self.cursor.y += reveal;
            needed -= reveal;
            self.lines.set_max_len(new_rows + self.scrollback);
            // With scrollback exhausted the ring has room for the remaining
            // rows: the capacity just grew by the height delta.
            for _ in 0..needed {
                self.lines.push(BufferLine::blank(self.cols, attrs));
            }
        } else if new_rows < self.rows {
            let mut excess = self.rows - new_rows;
            // Drop trailing blank rows below the cursor first.
            while excess > 0
                && self.cursor.y < self.rows - 1
                && self
                    .line(self.rows - 1)
                    .is_some_and(|l| l.trimmed_length() == 0)
            {
                let last = self.y_base + self.rows - 1;
                self.lines.splice(last, 1, []);
                self.rows -= 1;
                excess -= 1;
            }
            // The rest scrolls into scrollback (or is dropped without it).
            if excess > 0 {
                if self.has_scrollback() {
                    self.y_base += excess;
                } else {
                    self.lines.trim_start(excess);
                    self.lines_top += excess as u64;
                }
                self.cursor.y = self.cursor.y.saturating_sub(excess);
            }
            let dropped = self.lines.set_max_len(new_rows + self.scrollback);
            self.y_base = self.y_base.saturating_sub(dropped);
            self.y_disp = self.y_disp.saturating_sub(dropped);
            self.lines_top += dropped as u64;
        } else {
            self.lines.set_max_len(new_rows + self.scrollback);
        }

        self.rows = new_rows;
        self.scroll_top = 0;
        self.scroll_bottom = new_rows - 1;
        self.margin_left = 0;
        self.margin_right = self.cols - 1;
        self.cursor.x = self.cursor.x.min(self.cols);
        self.cursor.y = self.cursor.y.min(new_rows - 1);
        self.y_disp = self.y_disp.min(self.y_base);
        if !self.is_user_scrolling() {
            self.y_disp = self.y_base;
        }
        self.dirty.resize(new_rows);
    }

    /// Blank every retained line (alt-buffer clears, RIS).
    pub fn clear_all(&mut self, attrs: SgrAttrs) {
        for i in 0..self.lines.len() {
            if let Some(line) = self.lines.get_mut(i) {
                line.reset_keeping_width(attrs);
            }
        }
        self.dirty.mark_all();
    }
}

impl BufferLine {
    /// Reset contents to blanks without changing the cell count.
    pub(crate) fn reset_keeping_width(&mut self, attrs: SgrAttrs) {
        let cols = self.len();
        self.reset(cols, attrs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put(buffer: &mut Buffer, row: usize, text: &str) {
        for (i, ch) in text.chars().enumerate() {
            buffer
                .line_mut(row)
                .unwrap()
                .cell_mut(i)
                .unwrap()
                .set_content(ch, 1);
        }
    }

    fn row_text(buffer: &Buffer, row: usize) -> String {
        let line = buffer.line(row).unwrap();
        line.text(0, line.len())
    }

    #[test]
    fn new_buffer_materializes_viewport() {
        let buffer = Buffer::new(10, 4, 100, 8);
        assert_eq!(buffer.total_lines(), 4);
        assert_eq!(buffer.y_base, 0);
        assert_eq!(buffer.scroll_bottom, 3);
        assert_eq!(buffer.margin_right, 9);
    }

    #[test]
    fn scroll_up_grows_scrollback() {
        let mut buffer = Buffer::new(4, 2, 10, 8);
        put(&mut buffer, 0, "AA");
        put(&mut buffer, 1, "BB");
        buffer.scroll_up(1, 0, 3, SgrAttrs::default());
        assert_eq!(buffer.y_base, 1);
        assert_eq!(buffer.y_disp, 1);
        assert_eq!(buffer.total_lines(), 3);
        // Old row 0 is now scrollback line 0.
        assert_eq!(buffer.line_abs(0).unwrap().text(0, 4), "AA  ");
        assert_eq!(row_text(&buffer, 0), "BB  ");
        assert_eq!(row_text(&buffer, 1), "    ");
    }

    #[test]
    fn scroll_up_recycles_when_full() {
        let mut buffer = Buffer::new(4, 2, 1, 8);
        put(&mut buffer, 0, "AA");
        buffer.scroll_up(1, 0, 3, SgrAttrs::default()); // fills ring (3 lines max)
        assert_eq!(buffer.total_lines(), 3);
        let base_before = buffer.y_base;
        buffer.scroll_up(1, 0, 3, SgrAttrs::default()); // must recycle
        assert_eq!(buffer.total_lines(), 3);
        assert_eq!(buffer.y_base, base_before);
        assert_eq!(buffer.lines_top, 1);
    }

    #[test]
    fn scroll_up_within_region_shifts_in_place() {
        let mut buffer = Buffer::new(4, 4, 10, 8);
        for (row, text) in ["AA", "BB", "CC", "DD"].iter().enumerate() {
            put(&mut buffer, row, text);
        }
        buffer.set_scroll_region(1, 2);
        buffer.scroll_up(1, 0, 3, SgrAttrs::default());
        // No scrollback growth; B gone, C moved up, blank at row 2.
        assert_eq!(buffer.y_base, 0);
        assert_eq!(row_text(&buffer, 0), "AA  ");
        assert_eq!(row_text(&buffer, 1), "CC  ");
        assert_eq!(row_text(&buffer, 2), "    ");
        assert_eq!(row_text(&buffer, 3), "DD  ");
    }

    #[test]
    fn scroll_down_blanks_top_of_region() {
        let mut buffer = Buffer::new(4, 3, 10, 8);
        for (row, text) in ["AA", "BB", "CC"].iter().enumerate() {
            put(&mut buffer, row, text);
        }
        buffer.scroll_down(1, 0, 3, SgrAttrs::default());
        assert_eq!(row_text(&buffer, 0), "    ");
        assert_eq!(row_text(&buffer, 1), "AA  ");
        assert_eq!(row_text(&buffer, 2), "BB  ");
    }

    #[test]
    fn margin_restricted_scroll_touches_only_margin_columns() {
        let mut buffer = Buffer::new(6, 3, 10, 8);
        for (row, text) in ["aaaaaa", "bbbbbb", "cccccc"].iter().enumerate() {
            put(&mut buffer, row, text);
        }
        buffer.scroll_up(1, 2, 3, SgrAttrs::default());
        assert_eq!(row_text(&buffer, 0), "aabbaa");
        assert_eq!(row_text(&buffer, 1), "bbccbb");
        assert_eq!(row_text(&buffer, 2), "cc  cc");
    }

    #[test]
    fn insert_and_delete_lines_respect_region() {
        let mut buffer = Buffer::new(4, 4, 10, 8);
        for (row, text) in ["AA", "BB", "CC", "DD"].iter().enumerate() {
            put(&mut buffer, row, text);
        }
        buffer.set_scroll_region(0, 2);
        buffer.insert_lines(1, 1, 0, 3, SgrAttrs::default());
        assert_eq!(row_text(&buffer, 1), "    ");
        assert_eq!(row_text(&buffer, 2), "BB  ");
        assert_eq!(row_text(&buffer, 3), "DD  "); // outside region, untouched

        buffer.delete_lines(1, 1, 0, 3, SgrAttrs::default());
        assert_eq!(row_text(&buffer, 1), "BB  ");
        assert_eq!(row_text(&buffer, 2), "    ");
    }

    #[test]
    fn clear_scrollback_rebases() {
        let mut buffer = Buffer::new(4, 2, 10, 8);
        for _ in 0..3 {
            buffer.scroll_up(1, 0, 3, SgrAttrs::default());
        }
        assert_eq!(buffer.y_base, 3);
        buffer.clear_scrollback();
        assert_eq!(buffer.y_base, 0);
        assert_eq!(buffer.y_disp, 0);
        assert_eq!(buffer.total_lines(), 2);
        assert_eq!(buffer.lines_top, 3);
    }

    #[test]
    fn user_scroll_position_tracks_and_clamps() {
        let mut buffer = Buffer::new(4, 2, 10, 8);
        for _ in 0..4 {
            buffer.scroll_up(1, 0, 3, SgrAttrs::default());
        }
        buffer.scroll_display_by(-2);
        assert_eq!(buffer.y_disp, 2);
        assert!(buffer.is_user_scrolling());
        // New output does not move the display while scrolled back.
        buffer.scroll_up(1, 0, 3, SgrAttrs::default());
        assert_eq!(buffer.y_disp, 2);
        buffer.scroll_display_by(100);
        assert_eq!(buffer.y_disp, buffer.y_base);
    }

    #[test]
    fn resize_width_pads_and_truncates() {
        let mut buffer = Buffer::new(4, 2, 10, 8);
        put(&mut buffer, 0, "ABCD");
        buffer.resize(6, 2, SgrAttrs::default());
        assert_eq!(row_text(&buffer, 0), "ABCD  ");
        buffer.resize(3, 2, SgrAttrs::default());
        assert_eq!(row_text(&buffer, 0), "ABC");
    }

    #[test]
    fn resize_shrink_rows_pushes_to_scrollback() {
        let mut buffer = Buffer::new(4, 4, 10, 8);
        for (row, text) in ["AA", "BB", "CC", "DD"].iter().enumerate() {
            put(&mut buffer, row, text);
        }
        buffer.cursor.y = 3;
        buffer.resize(4, 2, SgrAttrs::default());
        assert_eq!(buffer.rows(), 2);
        assert_eq!(buffer.y_base, 2);
        assert_eq!(buffer.cursor.y, 1);
        assert_eq!(row_text(&buffer, 0), "CC  ");
        assert_eq!(row_text(&buffer, 1), "DD  ");
    }

    #[test]
    fn resize_shrink_drops_trailing_blanks_first() {
        let mut buffer = Buffer::new(4, 4, 10, 8);
        put(&mut buffer, 0, "AA");
        buffer.cursor.y = 0;
        buffer.resize(4, 2, SgrAttrs::default());
        // Blank bottom rows were dropped; nothing went to scrollback.
        assert_eq!(buffer.y_base, 0);
        assert_eq!(row_text(&buffer, 0), "AA  ");
    }

    #[test]
    fn resize_grow_reveals_scrollback() {
        let mut buffer = Buffer::new(4, 2, 10, 8);
        put(&mut buffer, 0, "AA");
        put(&mut buffer, 1, "BB");
        buffer.scroll_up(1, 0, 3, SgrAttrs::default());
        assert_eq!(buffer.y_base, 1);
        buffer.resize(4, 3, SgrAttrs::default());
        assert_eq!(buffer.y_base, 0);
        assert_eq!(row_text(&buffer, 0), "AA  ");
        assert_eq!(row_text(&buffer, 1), "BB  ");
    }

    #[test]
    fn resize_round_trip_preserves_content() {
        let mut buffer = Buffer::new(6, 4, 100, 8);
        put(&mut buffer, 0, "hello");
        put(&mut buffer, 1, "world");
        buffer.resize(10, 6, SgrAttrs::default());
        buffer.resize(6, 4, SgrAttrs::default());
        assert_eq!(buffer.cols(), 6);
        assert_eq!(buffer.rows(), 4);
        assert_eq!(row_text(&buffer, 0), "hello ");
        assert_eq!(row_text(&buffer, 1), "world ");
    }

    #[test]
    fn tab_stops_default_interval() {
        let buffer = Buffer::new(20, 2, 0, 8);
        assert_eq!(buffer.next_tab_stop(0, 19), 8);
        assert_eq!(buffer.next_tab_stop(8, 19), 16);
        assert_eq!(buffer.next_tab_stop(16, 19), 19);
        assert_eq!(buffer.prev_tab_stop(10, 0), 8);
        assert_eq!(buffer.prev_tab_stop(8, 0), 0);
    }

    #[test]
    fn tab_stop_editing() {
        let mut buffer = Buffer::new(20, 2, 0, 8);
        buffer.set_tab_stop(3);
        assert_eq!(buffer.next_tab_stop(0, 19), 3);
        buffer.clear_tab_stop(3);
        buffer.clear_tab_stop(8);
        assert_eq!(buffer.next_tab_stop(0, 19), 16);
        buffer.clear_all_tab_stops();
        assert_eq!(buffer.next_tab_stop(0, 19), 19);
    }

    #[test]
    fn scroll_region_validation() {
        let mut buffer = Buffer::new(10, 5, 0, 8);
        buffer.set_scroll_region(1, 3);
        assert_eq!((buffer.scroll_top, buffer.scroll_bottom), (1, 3));
        // Degenerate region is rejected.
        buffer.set_scroll_region(3, 3);
        assert_eq!((buffer.scroll_top, buffer.scroll_bottom), (1, 3));
        // Zero/zero resets to full.
        buffer.set_scroll_region(0, 0);
        assert_eq!((buffer.scroll_top, buffer.scroll_bottom), (0, 4));
        // Out-of-range clamps.
        buffer.set_scroll_region(1, 99);
        assert_eq!((buffer.scroll_top, buffer.scroll_bottom), (1, 4));
    }
}
