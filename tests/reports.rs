//! Byte-exact response tests: device attributes, status reports, DECRQSS,
//! DECRQM, keyboard/mouse protocol output, and the C1 transmission mode.

mod common;

use common::{term, term_with};
use stormterm_core::keyboard::{KeyCode, KeyEvent, KeyEventKind, Modifiers};
use stormterm_core::Options;

#[test]
fn primary_device_attributes() {
    let mut t = term(80, 24);
    t.feed(b"\x1b[c");
    assert_eq!(t.host_mut().take_sent(), b"\x1b[?62;22c");
}

#[test]
fn primary_da_advertises_sixel_when_enabled() {
    let mut t = term_with(Options {
        enable_sixel_reported: true,
        ..Options::default()
    });
    t.feed(b"\x1b[c");
    assert_eq!(t.host_mut().take_sent(), b"\x1b[?62;4;22c");
}

#[test]
fn secondary_device_attributes() {
    let mut t = term(80, 24);
    t.feed(b"\x1b[>c");
    assert_eq!(t.host_mut().take_sent(), b"\x1b[>41;354;0c");
}

#[test]
fn device_status_reports() {
    let mut t = term(80, 24);
    t.feed(b"\x1b[5n");
    assert_eq!(t.host_mut().take_sent(), b"\x1b[0n");
    t.feed(b"\x1b[3;5H\x1b[6n");
    assert_eq!(t.host_mut().take_sent(), b"\x1b[3;5R");
    t.feed(b"\x1b[?6n");
    assert_eq!(t.host_mut().take_sent(), b"\x1b[?3;5;1R");
}

#[test]
fn eight_bit_c1_changes_report_framing() {
    let mut t = term(80, 24);
    t.feed(b"\x1b G\x1b[5n"); // S8C1T
    assert_eq!(t.host_mut().take_sent(), [0x9b, b'0', b'n']);
    t.feed(b"\x1b F\x1b[5n"); // back to 7-bit
    assert_eq!(t.host_mut().take_sent(), b"\x1b[0n");
}

// ── DECRQM ──────────────────────────────────────────────────────────

#[test]
fn decrqm_reports_mode_state() {
    let mut t = term(80, 24);
    t.feed(b"\x1b[?2004$p");
    assert_eq!(t.host_mut().take_sent(), b"\x1b[?2004;2$y");
    t.feed(b"\x1b[?2004h\x1b[?2004$p");
    assert_eq!(t.host_mut().take_sent(), b"\x1b[?2004;1$y");
    t.feed(b"\x1b[?31337$p");
    assert_eq!(t.host_mut().take_sent(), b"\x1b[?31337;0$y");
    t.feed(b"\x1b[4h\x1b[4$p");
    assert_eq!(t.host_mut().take_sent(), b"\x1b[4;1$y");
}

// ── DECRQSS ─────────────────────────────────────────────────────────

#[test]
fn decrqss_reports_margins_and_region() {
    let mut t = term(80, 24);
    t.feed(b"\x1b[3;10r\x1bP$qr\x1b\\");
    assert_eq!(t.host_mut().take_sent(), b"\x1bP1$r3;10r\x1b\\");
    t.feed(b"\x1b[?69h\x1b[5;70s\x1bP$qs\x1b\\");
    assert_eq!(t.host_mut().take_sent(), b"\x1bP1$r5;70s\x1b\\");
}

#[test]
fn decrqss_cursor_style_and_conformance() {
    let mut t = term(80, 24);
    t.feed(b"\x1b[4 q\x1bP$q q\x1b\\");
    assert_eq!(t.host_mut().take_sent(), b"\x1bP1$r4 q\x1b\\");
    t.feed(b"\x1bP$q\"p\x1b\\");
    assert_eq!(t.host_mut().take_sent(), b"\x1bP1$r64;1\"p\x1b\\");
    t.feed(b"\x1bP$qZZ\x1b\\");
    assert_eq!(t.host_mut().take_sent(), b"\x1bP0$r\x1b\\");
}

#[test]
fn decrqss_sgr_round_trips() {
    let mut t = term(80, 24);
    t.feed(b"\x1b[1;3;38;2;1;2;3;48;5;100m");
    t.feed(b"\x1bP$qm\x1b\\");
    let sent = t.host_mut().take_sent();
    let text = String::from_utf8(sent).unwrap();
    let body = text
        .strip_prefix("\x1bP1$r")
        .and_then(|s| s.strip_suffix("\x1b\\"))
        .expect("DECRQSS reply frame");
    assert!(body.ends_with('m'));

    // Replaying the report reproduces the attribute on fresh cells.
    let mut replay = term(80, 24);
    replay.feed(format!("\x1b[{body}X").as_bytes());
    replay.feed(b"X");
    let original = {
        t.feed(b"Y");
        common::cell(&t, 0, 0).attrs
    };
    assert_eq!(common::cell(&replay, 0, 0).attrs, original);
}

// ── Kitty keyboard protocol state ───────────────────────────────────

#[test]
fn kitty_flags_push_query_pop() {
    let mut t = term(80, 24);
    t.feed(b"\x1b[?u");
    assert_eq!(t.host_mut().take_sent(), b"\x1b[?0u");
    t.feed(b"\x1b[>5u\x1b[?u");
    assert_eq!(t.host_mut().take_sent(), b"\x1b[?5u");
    t.feed(b"\x1b[<1u\x1b[?u");
    assert_eq!(t.host_mut().take_sent(), b"\x1b[?0u");
}

#[test]
fn kitty_flag_stack_is_per_buffer() {
    let mut t = term(80, 24);
    t.feed(b"\x1b[>1u\x1b[?1049h\x1b[?u");
    assert_eq!(t.host_mut().take_sent(), b"\x1b[?0u");
    t.feed(b"\x1b[?1049l\x1b[?u");
    assert_eq!(t.host_mut().take_sent(), b"\x1b[?1u");
}

#[test]
fn key_encoding_follows_protocol_state() {
    let mut t = term(80, 24);
    let esc = KeyEvent::new(KeyCode::Escape);
    assert_eq!(t.encode_key(&esc).unwrap(), vec![0x1b]);
    t.feed(b"\x1b[>1u");
    assert_eq!(t.encode_key(&esc).unwrap(), b"\x1b[27u");
}

#[test]
fn app_cursor_mode_switches_arrow_form() {
    let mut t = term(80, 24);
    let up = KeyEvent::new(KeyCode::Up);
    assert_eq!(t.encode_key(&up).unwrap(), b"\x1b[A");
    t.feed(b"\x1b[?1h");
    assert_eq!(t.encode_key(&up).unwrap(), b"\x1bOA");
}

#[test]
fn release_events_only_with_report_events() {
    let mut t = term(80, 24);
    let release = KeyEvent::new(KeyCode::Char('a'))
        .with_modifiers(Modifiers::CTRL)
        .with_kind(KeyEventKind::Release);
    assert_eq!(t.encode_key(&release), None);
    t.feed(b"\x1b[>3u"); // disambiguate + report events
    assert_eq!(t.encode_key(&release).unwrap(), b"\x1b[97;5:3u");
}

// ── Focus and paste ─────────────────────────────────────────────────

#[test]
fn focus_reports_gated_by_mode() {
    let mut t = term(80, 24);
    t.focus_changed(true);
    assert!(t.host_mut().take_sent().is_empty());
    t.feed(b"\x1b[?1004h");
    t.focus_changed(true);
    assert_eq!(t.host_mut().take_sent(), b"\x1b[I");
    t.focus_changed(false);
    assert_eq!(t.host_mut().take_sent(), b"\x1b[O");
}

#[test]
fn bracketed_paste_wraps_text() {
    let mut t = term(80, 24);
    t.paste("plain");
    assert_eq!(t.host_mut().take_sent(), b"plain");
    t.feed(b"\x1b[?2004h");
    t.paste("wrapped");
    assert_eq!(t.host_mut().take_sent(), b"\x1b[200~wrapped\x1b[201~");
}

// ── Window ops ──────────────────────────────────────────────────────

#[test]
fn window_size_reports() {
    let mut t = term(80, 24);
    t.feed(b"\x1b[18t");
    assert_eq!(t.host_mut().take_sent(), b"\x1b[8;24;80t");
    t.feed(b"\x1b[14t");
    assert_eq!(t.host_mut().take_sent(), b"\x1b[4;384;640t");
    t.feed(b"\x1b[8;30;100t");
    assert_eq!(t.host_mut().resize_requests.last(), Some(&(100, 30)));
}

#[test]
fn title_stack_push_pop() {
    let mut t = term(80, 24);
    t.feed(b"\x1b]2;first\x07\x1b[22t\x1b]2;second\x07");
    assert_eq!(t.title(), "second");
    t.feed(b"\x1b[23t");
    assert_eq!(t.title(), "first");
}

#[test]
fn title_report_gated_by_trust() {
    let mut t = term(80, 24);
    t.feed(b"\x1b]2;secret\x07\x1b[21t");
    assert_eq!(t.host_mut().take_sent(), b"\x1b]lsecret\x1b\\");
    t.host_mut().trusted = false;
    t.feed(b"\x1b[21t");
    assert!(t.host_mut().take_sent().is_empty());
}

// ── Palette queries ─────────────────────────────────────────────────

#[test]
fn osc_palette_query_round_trips() {
    let mut t = term(80, 24);
    t.feed(b"\x1b]4;1;rgb:ff/00/00\x07\x1b]4;1;?\x07");
    assert_eq!(t.host_mut().take_sent(), b"\x1b]4;1;rgb:ffff/0000/0000\x1b\\");
}

#[test]
fn osc_dynamic_color_query() {
    let mut t = term(80, 24);
    t.feed(b"\x1b]10;#123456\x07\x1b]10;?\x07");
    assert_eq!(
        t.host_mut().take_sent(),
        b"\x1b]10;rgb:1200/3400/5600\x1b\\"
    );
}

#[test]
fn osc_104_resets_palette_entry() {
    let mut t = term(80, 24);
    let original = t.palette_color(1);
    t.feed(b"\x1b]4;1;rgb:12/34/56\x07");
    assert_ne!(t.palette_color(1), original);
    t.feed(b"\x1b]104;1\x07");
    assert_eq!(t.palette_color(1), original);
}

// ── Mouse protocol variants ─────────────────────────────────────────

#[test]
fn mouse_protocol_variants_encode_distinctly() {
    use stormterm_core::{MouseAction, MouseButton, MouseEvent, MouseModifiers};

    let press = MouseEvent {
        button: Some(MouseButton::Left),
        action: MouseAction::Press,
        col: 2,
        row: 3,
        pixel: None,
        modifiers: MouseModifiers::default(),
    };

    let mut t = term(80, 24);
    t.feed(b"\x1b[?1000h");
    t.mouse_event(&press);
    assert_eq!(t.host_mut().take_sent(), [0x1b, b'[', b'M', 32, 35, 36]);

    t.feed(b"\x1b[?1015h");
    t.mouse_event(&press);
    assert_eq!(t.host_mut().take_sent(), b"\x1b[32;3;4M");

    t.feed(b"\x1b[?1006h");
    t.mouse_event(&press);
    assert_eq!(t.host_mut().take_sent(), b"\x1b[<0;3;4M");
}

#[test]
fn motion_events_filtered_by_mode() {
    use stormterm_core::{MouseAction, MouseButton, MouseEvent, MouseModifiers};

    let mut t = term(80, 24);
    t.feed(b"\x1b[?1000h\x1b[?1006h");
    let motion = MouseEvent {
        button: Some(MouseButton::Left),
        action: MouseAction::Motion,
        col: 4,
        row: 4,
        pixel: None,
        modifiers: MouseModifiers::default(),
    };
    t.mouse_event(&motion);
    assert!(t.host_mut().take_sent().is_empty()); // 1000 has no motion

    t.feed(b"\x1b[?1003h");
    t.mouse_event(&motion);
    assert_eq!(t.host_mut().take_sent(), b"\x1b[<32;5;5M");
    // Same cell again: deduplicated.
    t.mouse_event(&motion);
    assert!(t.host_mut().take_sent().is_empty());
}

#[test]
fn wheel_fallback_in_alt_screen() {
    use stormterm_core::{MouseAction, MouseButton, MouseEvent, MouseModifiers};

    let mut t = term(80, 24);
    let wheel = MouseEvent {
        button: Some(MouseButton::WheelUp),
        action: MouseAction::Press,
        col: 0,
        row: 0,
        pixel: None,
        modifiers: MouseModifiers::default(),
    };
    t.mouse_event(&wheel);
    assert!(t.host_mut().take_sent().is_empty()); // normal screen: host scrolls

    t.feed(b"\x1b[?1049h");
    t.mouse_event(&wheel);
    assert_eq!(t.host_mut().take_sent(), b"\x1b[A");
    t.feed(b"\x1b[?1h");
    t.mouse_event(&wheel);
    assert_eq!(t.host_mut().take_sent(), b"\x1bOA");
}
