//! OSC and DCS handling: titles, palette, hyperlinks, clipboard,
//! notifications, DECRQSS, and sixel passthrough.

use super::{DcsTarget, Host, Terminal};
use crate::cell::{Color, SgrFlags};
use crate::color::Rgb;
use crate::modes::DecModes;
use crate::parser::Params;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

impl<H: Host> Terminal<H> {
    pub(crate) fn handle_osc(&mut self, data: &[u8]) {
        let text = String::from_utf8_lossy(data);
        let (code, args) = match text.split_once(';') {
            Some((code, args)) => (code, args),
            None => (text.as_ref(), ""),
        };
        let Ok(code) = code.parse::<u32>() else {
            tracing::debug!("OSC without numeric code ignored");
            return;
        };

        match code {
            0 => self.set_title(true, true, args),
            1 => self.set_title(true, false, args),
            2 => self.set_title(false, true, args),
            4 => self.osc_palette(args),
            6 => tracing::debug!("OSC 6 (document) ignored"),
            7 => {
                let args = args.to_owned();
                self.report_host_directory(&args);
            }
            8 => self.osc_hyperlink(args),
            10 => self.osc_dynamic_color(10, args),
            11 => self.osc_dynamic_color(11, args),
            12 => self.osc_dynamic_color(12, args),
            52 => self.osc_clipboard(args),
            104 => self.osc_reset_palette(args),
            112 => self.cursor_color = Rgb::from_hex(0xffffff),
            777 => self.osc_notify(args),
            1337 => self.osc_iterm_image(args),
            other => tracing::debug!(code = other, "unhandled OSC"),
        }
    }

    fn report_host_directory(&mut self, args: &str) {
        // OSC 7 carries a file://host/path URL; strip scheme and host.
        let path = match args.strip_prefix("file://") {
            Some(rest) => match rest.find('/') {
                Some(at) => &rest[at..],
                None => rest,
            },
            None => args,
        };
        let path = path.to_owned();
        self.with_host(|host| host.report_directory(&path));
    }

    /// OSC 4: `index;spec` pairs; a `?` spec queries.
    fn osc_palette(&mut self, args: &str) {
        let mut parts = args.split(';');
        while let (Some(index), Some(spec)) = (parts.next(), parts.next()) {
            let Ok(index) = index.trim().parse::<usize>() else {
                continue;
            };
            if index > 255 {
                continue;
            }
            if spec == "?" {
                let color = self.palette[index];
                self.send_osc(&format!("4;{index};{color}"));
            } else if let Some(color) = Rgb::parse(spec) {
                self.palette[index] = color;
                self.active_buffer_mut().dirty.mark_all();
            } else {
                tracing::debug!(index, spec, "unparseable palette spec");
            }
        }
    }

    fn osc_reset_palette(&mut self, args: &str) {
        let scheme = self.options().color_scheme;
        let defaults = crate::color::default_palette(scheme);
        if args.is_empty() {
            self.palette = defaults;
        } else {
            for index in args.split(';').filter_map(|s| s.trim().parse::<usize>().ok()) {
                if index <= 255 {
                    self.palette[index] = defaults[index];
                }
            }
        }
        self.active_buffer_mut().dirty.mark_all();
    }

    /// OSC 10/11/12: dynamic fg/bg/cursor colors; `?` queries.
    fn osc_dynamic_color(&mut self, code: u32, args: &str) {
        // Extra arguments apply to consecutive codes (10;fg;bg).
        for (offset, spec) in args.split(';').enumerate() {
            let code = code + offset as u32;
            if code > 12 {
                break;
            }
            if spec == "?" {
                let color = match code {
                    10 => self.fg_color,
                    11 => self.bg_color,
                    _ => self.cursor_color,
                };
                self.send_osc(&format!("{code};{color}"));
            } else if let Some(color) = Rgb::parse(spec) {
                match code {
                    10 => self.fg_color = color,
                    11 => self.bg_color = color,
                    _ => self.cursor_color = color,
                }
                self.active_buffer_mut().dirty.mark_all();
            }
        }
    }

    /// OSC 8: `params;uri`. An empty URI closes the active hyperlink.
    fn osc_hyperlink(&mut self, args: &str) {
        let (params, uri) = args.split_once(';').unwrap_or(("", args));
        if uri.is_empty() {
            self.current_link = 0;
            return;
        }
        let id = params.split(':').find_map(|kv| kv.strip_prefix("id="));
        self.current_link = self.atoms.intern_hyperlink(id, uri);
    }

    /// OSC 52: clipboard write (base64). Reads are never served.
    fn osc_clipboard(&mut self, args: &str) {
        let Some((_target, payload)) = args.split_once(';') else {
            return;
        };
        if payload == "?" {
            // A read would leak whatever the user last copied; decline
            // silently even for trusted processes.
            return;
        }
        if !self.host_trusted() {
            return;
        }
        match BASE64.decode(payload.as_bytes()) {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes).into_owned();
                self.with_host(|host| host.clipboard_copy(&text));
            }
            Err(_) => tracing::debug!("OSC 52 payload was not valid base64"),
        }
    }

    fn osc_notify(&mut self, args: &str) {
        let mut parts = args.splitn(3, ';');
        if parts.next() != Some("notify") {
            return;
        }
        let title = parts.next().unwrap_or("").to_owned();
        let body = parts.next().unwrap_or("").to_owned();
        self.with_host(|host| host.notify(&title, &body));
    }

    /// OSC 1337 inline images (iTerm2): reshaped into a graphics store +
    /// display command so the Kitty machinery handles placement.
    fn osc_iterm_image(&mut self, args: &str) {
        let Some(rest) = args.strip_prefix("File=") else {
            tracing::debug!("unsupported OSC 1337 payload");
            return;
        };
        let Some((meta, payload)) = rest.split_once(':') else {
            return;
        };
        let mut inline = false;
        let mut cells_w = 0usize;
        let mut cells_h = 0usize;
        for kv in meta.split(';') {
            let Some((key, value)) = kv.split_once('=') else {
                continue;
            };
            match key {
                "inline" => inline = value == "1",
                "width" => {
                    cells_w = parse_iterm_extent(value, self.cols(), super::CELL_PIXEL_WIDTH);
                }
                "height" => {
                    cells_h = parse_iterm_extent(value, self.rows(), super::CELL_PIXEL_HEIGHT);
                }
                _ => {}
            }
        }
        if !inline {
            // Download-only transfers have nowhere to go in the engine.
            return;
        }
        let mut control = String::from("a=T,f=100,q=2");
        if cells_w > 0 {
            control.push_str(&format!(",c={cells_w}"));
        }
        if cells_h > 0 {
            control.push_str(&format!(",r={cells_h}"));
        }
        control.push(';');
        let mut apc = control.into_bytes();
        apc.extend_from_slice(payload.as_bytes());
        let ctx = self.graphics_context();
        let outcome = self.graphics.accept(&apc, &ctx);
        self.apply_graphics_outcome(outcome);
    }

    fn with_host(&mut self, f: impl FnOnce(&mut H)) {
        f(&mut self.host);
    }

    // ── DCS ─────────────────────────────────────────────────────────

    pub(crate) fn handle_dcs_hook(&mut self, _params: &Params, collect: &[u8], final_byte: u8) {
        self.dcs = match (collect, final_byte) {
            (b"$", b'q') => DcsTarget::RequestStatus(Vec::new()),
            (b"", b'q') => DcsTarget::Sixel(Vec::new()),
            _ => {
                tracing::debug!(
                    collect = %String::from_utf8_lossy(collect),
                    final_byte = %(final_byte as char),
                    "unhandled DCS"
                );
                DcsTarget::Ignored
            }
        };
    }

    pub(crate) fn handle_dcs_unhook(&mut self, target: DcsTarget) {
        match target {
            DcsTarget::RequestStatus(body) => self.request_status(&body),
            DcsTarget::Sixel(data) => self.with_host(|host| host.sixel(&data)),
            DcsTarget::None | DcsTarget::Ignored => {}
        }
    }

    /// DECRQSS: report a setting as `DCS 1 $ r <value> ST`.
    fn request_status(&mut self, setting: &[u8]) {
        let reply = match setting {
            b"m" => Some(format!("{}m", self.sgr_report())),
            b"r" => {
                let b = self.active_buffer();
                Some(format!("{};{}r", b.scroll_top + 1, b.scroll_bottom + 1))
            }
            b"s" => {
                let b = self.active_buffer();
                Some(format!("{};{}s", b.margin_left + 1, b.margin_right + 1))
            }
            b" q" => Some(format!("{} q", self.cursor_style.to_param())),
            b"\"p" => Some("64;1\"p".to_owned()),
            _ => None,
        };
        match reply {
            Some(body) => self.send_dcs(&format!("1$r{body}")),
            None => self.send_dcs("0$r"),
        }
    }

    /// The SGR parameter string that reproduces the current attribute.
    pub(crate) fn sgr_report(&self) -> String {
        let mut parts = vec!["0".to_owned()];
        let flags = self.attrs.flags;
        for (flag, code) in [
            (SgrFlags::BOLD, 1),
            (SgrFlags::DIM, 2),
            (SgrFlags::ITALIC, 3),
            (SgrFlags::UNDERLINE, 4),
            (SgrFlags::BLINK, 5),
            (SgrFlags::INVERSE, 7),
            (SgrFlags::INVISIBLE, 8),
            (SgrFlags::CROSSED_OUT, 9),
        ] {
            if flags.contains(flag) {
                parts.push(code.to_string());
            }
        }
        push_color_params(&mut parts, self.attrs.fg, 30, 38);
        push_color_params(&mut parts, self.attrs.bg, 40, 48);
        if let Some(color) = self.attrs.underline_color {
            push_color_params(&mut parts, color, 0, 58);
        }
        parts.join(";")
    }

    // ── Reverse-video aware color resolution (renderer helper) ──────

    /// Resolve a cell color to RGB for the renderer, honoring reverse
    /// video and the palette.
    #[must_use]
    pub fn resolve_color(&self, color: Color, foreground: bool) -> Rgb {
        let reverse = self.modes.contains(DecModes::REVERSE_VIDEO);
        match color {
            Color::Ansi(index) => self.palette[index as usize],
            Color::Rgb(r, g, b) => Rgb::from_rgb8(r, g, b),
            Color::Default => {
                if foreground != reverse {
                    self.fg_color
                } else {
                    self.bg_color
                }
            }
            Color::DefaultInverted => {
                if foreground != reverse {
                    self.bg_color
                } else {
                    self.fg_color
                }
            }
        }
    }
}

fn push_color_params(parts: &mut Vec<String>, color: Color, base: u16, extended: u16) {
    match color {
        Color::Default | Color::DefaultInverted => {}
        Color::Ansi(n @ 0..=7) if base != 0 => parts.push((base + n as u16).to_string()),
        Color::Ansi(n @ 8..=15) if base != 0 => {
            parts.push((base + 60 + (n as u16 - 8)).to_string());
        }
        Color::Ansi(n) => {
            parts.push(extended.to_string());
            parts.push("5".to_owned());
            parts.push(n.to_string());
        }
        Color::Rgb(r, g, b) => {
            parts.push(extended.to_string());
            parts.push("2".to_owned());
            parts.push(r.to_string());
            parts.push(g.to_string());
            parts.push(b.to_string());
        }
    }
}

/// iTerm2 width/height values: `N` cells, `Npx` pixels, `N%` of the view.
fn parse_iterm_extent(value: &str, total_cells: usize, cell_px: u32) -> usize {
    if value == "auto" {
        return 0;
    }
    if let Some(px) = value.strip_suffix("px") {
        return px
            .parse::<usize>()
            .map(|px| px.div_ceil(cell_px as usize).max(1))
            .unwrap_or(0);
    }
    if let Some(percent) = value.strip_suffix('%') {
        return percent
            .parse::<usize>()
            .map(|p| (total_cells * p / 100).max(1))
            .unwrap_or(0);
    }
    value.parse::<usize>().unwrap_or(0)
}
