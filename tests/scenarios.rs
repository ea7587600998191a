//! End-to-end scenarios driven through `Terminal::feed` with literal byte
//! streams, including the cross-cutting boundary cases around wrap,
//! scrollback, SGR color, mouse reporting, checksums, and graphics.

mod common;

use common::{cell, row_text, term, term_with};
use stormterm_core::cell::AtomPayload;
use stormterm_core::{Color, Options};

// ── S1: basic print ─────────────────────────────────────────────────

#[test]
fn print_advances_cursor() {
    let mut t = term(80, 24);
    t.feed(b"ABC");
    assert_eq!(row_text(&t, 0), "ABC");
    assert_eq!(t.cursor(), (3, 0));
    for (col, ch) in ['A', 'B', 'C'].into_iter().enumerate() {
        assert_eq!(cell(&t, 0, col).content(), Some(ch));
    }
}

// ── S2: CSI cursor position ─────────────────────────────────────────

#[test]
fn cup_positions_then_prints() {
    let mut t = term(80, 24);
    t.feed(b"\x1b[5;10Habc");
    assert_eq!(t.cursor(), (12, 4));
    assert_eq!(cell(&t, 4, 9).content(), Some('a'));
    assert_eq!(cell(&t, 4, 10).content(), Some('b'));
    assert_eq!(cell(&t, 4, 11).content(), Some('c'));
}

// ── S3: erase in line keeps the erase background ────────────────────

#[test]
fn erase_line_right_from_cursor() {
    let mut t = term(80, 24);
    t.feed(b"Hello, world!");
    t.feed(b"\x1b[44m"); // blue background becomes the erase attribute
    t.feed(b"\x1b[1;8H\x1b[K");
    assert_eq!(row_text(&t, 0), "Hello,");
    for (col, ch) in "Hello, ".chars().enumerate() {
        let c = cell(&t, 0, col);
        assert_eq!(c.content(), Some(ch));
        assert_eq!(c.attrs.bg, Color::Default, "col {col} untouched");
    }
    for col in 7..80 {
        let c = cell(&t, 0, col);
        assert_eq!(c.content(), Some(' '));
        assert_eq!(c.attrs.bg, Color::Ansi(4));
        assert_eq!(c.attrs.fg, Color::Default);
    }
}

// ── S4: scroll on LF at the bottom ──────────────────────────────────

#[test]
fn linefeed_at_bottom_scrolls_into_scrollback() {
    let mut t = term_with(Options {
        cols: 80,
        rows: 3,
        convert_eol: true,
        ..Options::default()
    });
    t.feed(b"A\nB\nC\nD");
    assert_eq!(row_text(&t, 0), "B");
    assert_eq!(row_text(&t, 1), "C");
    assert_eq!(row_text(&t, 2), "D");

    let buffer = t.active_buffer();
    assert_eq!(buffer.y_base, 1);
    assert_eq!(buffer.line_abs(0).unwrap().text(0, 1), "A");

    let dirty = t.dirty_lines();
    for row in 0..3 {
        assert!(dirty.is_dirty(row), "row {row} must be dirty after scroll");
    }
}

// ── S5: SGR truecolor ───────────────────────────────────────────────

#[test]
fn sgr_truecolor_and_reset() {
    let mut t = term(80, 24);
    t.feed(b"\x1b[38;2;10;20;30mX\x1b[39mY");
    assert_eq!(cell(&t, 0, 0).attrs.fg, Color::Rgb(10, 20, 30));
    assert_eq!(cell(&t, 0, 1).attrs.fg, Color::Default);
}

#[test]
fn sgr_truecolor_colon_form() {
    let mut t = term(80, 24);
    t.feed(b"\x1b[38:2:10:20:30mX\x1b[48:5:100mY");
    assert_eq!(cell(&t, 0, 0).attrs.fg, Color::Rgb(10, 20, 30));
    assert_eq!(cell(&t, 0, 1).attrs.bg, Color::Ansi(100));
}

// ── S6: SGR mouse reporting ─────────────────────────────────────────

#[test]
fn sgr_mouse_press_release() {
    use stormterm_core::{MouseAction, MouseButton, MouseEvent, MouseModifiers};

    let mut t = term(80, 24);
    t.feed(b"\x1b[?1006h\x1b[?1002h");
    let press = MouseEvent {
        button: Some(MouseButton::Left),
        action: MouseAction::Press,
        col: 5,
        row: 7,
        pixel: None,
        modifiers: MouseModifiers::default(),
    };
    t.mouse_event(&press);
    assert_eq!(t.host_mut().take_sent(), b"\x1b[<0;6;8M");

    let release = MouseEvent {
        action: MouseAction::Release,
        ..press
    };
    t.mouse_event(&release);
    assert_eq!(t.host_mut().take_sent(), b"\x1b[<0;6;8m");
}

// ── S7: DECRQCRA checksum ───────────────────────────────────────────

#[test]
fn checksum_report_sums_rectangle() {
    let mut t = term(80, 24);
    t.feed(b"ABC");
    t.host_mut().take_sent();
    t.feed(b"\x1b[1;0;1;1;1;3*y");
    assert_eq!(t.host_mut().take_sent(), b"\x1bP1!~00c6\x1b\\");
}

#[test]
fn checksum_refused_when_untrusted() {
    let mut t = term(80, 24);
    t.host_mut().trusted = false;
    t.feed(b"ABC\x1b[1;0;1;1;1;3*y");
    assert!(t.host_mut().take_sent().is_empty());
}

// ── S8: Kitty placeholder placement ─────────────────────────────────

#[test]
fn kitty_placeholder_creates_placement() {
    use base64::Engine as _;

    let mut t = term(80, 24);
    let payload = base64::engine::general_purpose::STANDARD.encode([0u8; 2 * 2 * 4]);
    let apc = format!("\x1b_Ga=T,f=32,s=2,v=2,i=1,U=1,c=2,r=2;{payload}\x1b\\");
    t.feed(apc.as_bytes());
    assert!(t.graphics().cache().contains(1));

    // Print the placeholder with the image id in the foreground color.
    t.feed(b"\x1b[38;5;1m");
    t.feed("\u{10EEEE}".to_string().as_bytes());

    let placement = t
        .graphics()
        .placements()
        .find(|p| !p.is_virtual && p.image_id == 1)
        .expect("placeholder placement");
    assert_eq!((placement.col, placement.row), (0, 0));
    assert_eq!((placement.cols, placement.rows), (2, 2));

    let atom = cell(&t, 0, 0).atom;
    assert_ne!(atom, 0);
    match t.atoms().get(atom) {
        Some(AtomPayload::ImagePlacement { image_id, .. }) => assert_eq!(*image_id, 1),
        other => panic!("expected image placement atom, got {other:?}"),
    }
}

// ── Wrap semantics ──────────────────────────────────────────────────

#[test]
fn autowrap_sets_wrapped_flag() {
    let mut t = term(4, 3);
    t.feed(b"abcdEF");
    assert_eq!(row_text(&t, 0), "abcd");
    assert_eq!(row_text(&t, 1), "EF");
    assert!(t.active_buffer().line(1).unwrap().is_wrapped);
    assert_eq!(t.cursor(), (2, 1));
}

#[test]
fn wrap_disabled_overwrites_last_column() {
    let mut t = term(4, 3);
    t.feed(b"\x1b[?7labcdEF");
    assert_eq!(row_text(&t, 0), "abcF");
    assert_eq!(t.cursor(), (4, 0));
}

#[test]
fn reverse_wraparound_backspace() {
    let mut t = term(4, 3);
    t.feed(b"\x1b[?45habcde");
    // Cursor wrapped to row 1 after 'e'.
    assert_eq!(t.cursor(), (1, 1));
    t.feed(b"\x08\x08");
    assert_eq!(t.cursor(), (3, 0));
}

#[test]
fn wide_char_never_splits_across_margin() {
    let mut t = term(5, 3);
    t.feed("abcd中".as_bytes());
    // The wide char cannot start in the last column; it wraps whole.
    assert_eq!(cell(&t, 0, 4).content(), Some(' '));
    assert_eq!(cell(&t, 1, 0).content(), Some('中'));
    assert!(cell(&t, 1, 0).is_wide());
    assert!(cell(&t, 1, 1).is_wide_continuation());
}

#[test]
fn combining_mark_attaches_to_previous_cell() {
    let mut t = term(10, 3);
    t.feed("e\u{0301}x".as_bytes());
    assert_eq!(cell(&t, 0, 0).grapheme(), "e\u{0301}");
    assert_eq!(cell(&t, 0, 1).content(), Some('x'));
    assert_eq!(t.cursor(), (2, 0));
}

#[test]
fn zwj_is_skipped() {
    let mut t = term(10, 3);
    t.feed("a\u{200D}b".as_bytes());
    assert_eq!(cell(&t, 0, 0).content(), Some('a'));
    assert_eq!(cell(&t, 0, 1).content(), Some('b'));
    assert_eq!(t.cursor(), (2, 0));
}

#[test]
fn utf8_split_across_feeds() {
    let mut t = term(10, 3);
    let bytes = "é".as_bytes();
    t.feed(&bytes[..1]);
    t.feed(&bytes[1..]);
    assert_eq!(cell(&t, 0, 0).content(), Some('é'));
}

// ── Editing and regions ─────────────────────────────────────────────

#[test]
fn insert_and_delete_lines_in_region() {
    let mut t = term_with(Options {
        cols: 10,
        rows: 5,
        convert_eol: true,
        ..Options::default()
    });
    t.feed(b"one\ntwo\nthree\nfour\nfive");
    t.feed(b"\x1b[2;4r"); // region rows 2..4 (1-based)
    t.feed(b"\x1b[2;1H\x1b[L");
    assert_eq!(row_text(&t, 0), "one");
    assert_eq!(row_text(&t, 1), "");
    assert_eq!(row_text(&t, 2), "two");
    assert_eq!(row_text(&t, 3), "three");
    assert_eq!(row_text(&t, 4), "five"); // outside the region

    t.feed(b"\x1b[M");
    assert_eq!(row_text(&t, 1), "two");
    assert_eq!(row_text(&t, 3), "");
}

#[test]
fn ich_dch_respect_right_margin() {
    let mut t = term(10, 3);
    t.feed(b"abcdefghij");
    t.feed(b"\x1b[?69h\x1b[3;8s"); // margins cols 3..8 (1-based)
    t.feed(b"\x1b[1;4H\x1b[2@");
    assert_eq!(row_text(&t, 0), "abc  defij");
    t.feed(b"\x1b[2P");
    assert_eq!(row_text(&t, 0), "abcdef  ij");
}

#[test]
fn decic_decdc_insert_delete_columns() {
    let mut t = term_with(Options {
        cols: 6,
        rows: 2,
        convert_eol: true,
        ..Options::default()
    });
    t.feed(b"aabbcc\nddeeff");
    t.feed(b"\x1b[1;3H\x1b['}"); // insert one column at col 3
    assert_eq!(row_text(&t, 0), "aa bbc");
    assert_eq!(row_text(&t, 1), "dd eef");
    t.feed(b"\x1b[1;3H\x1b['~");
    assert_eq!(row_text(&t, 0), "aabbc");
    assert_eq!(row_text(&t, 1), "ddeef");
}

#[test]
fn insert_mode_shifts_text() {
    let mut t = term(10, 2);
    t.feed(b"abc\x1b[4h\x1b[1;1HX");
    assert_eq!(row_text(&t, 0), "Xabc");
    t.feed(b"\x1b[4l");
}

#[test]
fn ed3_clears_scrollback() {
    let mut t = term_with(Options {
        cols: 10,
        rows: 2,
        convert_eol: true,
        ..Options::default()
    });
    t.feed(b"a\nb\nc\nd");
    assert!(t.active_buffer().y_base > 0);
    t.feed(b"\x1b[3J");
    let buffer = t.active_buffer();
    assert_eq!(buffer.y_base, 0);
    assert_eq!(buffer.total_lines(), 2);
}

#[test]
fn rep_repeats_last_graphic_char() {
    let mut t = term(10, 2);
    t.feed(b"x\x1b[3b");
    assert_eq!(row_text(&t, 0), "xxxx");
}

#[test]
fn decaln_fills_screen() {
    let mut t = term(4, 2);
    t.feed(b"\x1b#8");
    assert_eq!(row_text(&t, 0), "EEEE");
    assert_eq!(row_text(&t, 1), "EEEE");
    assert_eq!(t.cursor(), (0, 0));
}

#[test]
fn charset_line_drawing() {
    let mut t = term(10, 2);
    t.feed(b"\x1b(0lqk\x1b(B");
    assert_eq!(cell(&t, 0, 0).content(), Some('\u{250c}'));
    assert_eq!(cell(&t, 0, 1).content(), Some('\u{2500}'));
    assert_eq!(cell(&t, 0, 2).content(), Some('\u{2510}'));
    t.feed(b"a");
    assert_eq!(cell(&t, 0, 3).content(), Some('a'));
}

#[test]
fn tab_stops_set_and_clear() {
    let mut t = term(40, 2);
    t.feed(b"\t");
    assert_eq!(t.cursor().0, 8);
    t.feed(b"\x1b[1;5H\x1bH\x1b[1;1H\t");
    assert_eq!(t.cursor().0, 4); // custom stop at col 5 (1-based)
    t.feed(b"\x1b[3g\x1b[1;1H\t");
    assert_eq!(t.cursor().0, 39); // all stops cleared: jump to the edge
}

// ── Alternate buffer ────────────────────────────────────────────────

#[test]
fn alt_buffer_1049_saves_and_restores() {
    let mut t = term(20, 5);
    t.feed(b"shell output\x1b[2;3H");
    let cursor_before = t.cursor();
    t.feed(b"\x1b[?1049h");
    assert!(t.is_alt_active());
    assert_eq!(row_text(&t, 0), "");
    t.feed(b"\x1b[Hfullscreen");
    assert_eq!(row_text(&t, 0), "fullscreen");
    t.feed(b"\x1b[?1049l");
    assert!(!t.is_alt_active());
    assert_eq!(row_text(&t, 0), "shell output");
    assert_eq!(t.cursor(), cursor_before);
}

#[test]
fn alt_buffer_has_no_scrollback() {
    let mut t = term_with(Options {
        cols: 10,
        rows: 2,
        convert_eol: true,
        ..Options::default()
    });
    t.feed(b"\x1b[?47h");
    t.feed(b"a\nb\nc\nd");
    let buffer = t.active_buffer();
    assert_eq!(buffer.y_base, 0);
    assert_eq!(buffer.total_lines(), 2);
}

// ── Origin mode and margins ─────────────────────────────────────────

#[test]
fn origin_mode_cup_is_region_relative() {
    let mut t = term(20, 10);
    t.feed(b"\x1b[3;8r\x1b[?6h\x1b[1;1HX");
    assert_eq!(cell(&t, 2, 0).content(), Some('X'));
    // DSR 6 reports region-relative coordinates in origin mode.
    t.host_mut().take_sent();
    t.feed(b"\x1b[6n");
    assert_eq!(t.host_mut().take_sent(), b"\x1b[1;2R");
}

#[test]
fn cursor_motion_clamps_to_region() {
    let mut t = term(20, 10);
    t.feed(b"\x1b[3;8r\x1b[5;1H\x1b[99A");
    assert_eq!(t.cursor().1, 2); // clamped at scroll_top
    t.feed(b"\x1b[99B");
    assert_eq!(t.cursor().1, 7); // clamped at scroll_bottom
}

// ── Hyperlinks and atom GC ──────────────────────────────────────────

#[test]
fn hyperlink_atoms_cover_exact_range() {
    let mut t = term(20, 3);
    t.feed(b"\x1b]8;;https://example.com\x1b\\ab\x1b]8;;\x1b\\cd");
    let a = cell(&t, 0, 0).atom;
    assert_ne!(a, 0);
    assert_eq!(cell(&t, 0, 1).atom, a);
    assert_eq!(cell(&t, 0, 2).atom, 0);
    assert_eq!(cell(&t, 0, 3).atom, 0);
    match t.atoms().get(a) {
        Some(AtomPayload::Hyperlink { uri, .. }) => assert_eq!(uri, "https://example.com"),
        other => panic!("expected hyperlink, got {other:?}"),
    }
}

#[test]
fn unreferenced_link_atoms_are_collected() {
    let mut t = term(20, 3);
    t.feed(b"\x1b]8;;https://gone.example\x1b\\zz\x1b]8;;\x1b\\");
    let atom = cell(&t, 0, 0).atom;
    // Overwrite the linked cells, leaving the atom unreferenced.
    t.feed(b"\x1b[1;1H  ");
    t.collect_atoms();
    assert!(t.atoms().get(atom).is_none());
}

// ── Title, bell, notifications ──────────────────────────────────────

#[test]
fn osc_title_and_bell() {
    let mut t = term(20, 3);
    t.feed(b"\x1b]2;my title\x07\x07");
    assert_eq!(t.title(), "my title");
    assert_eq!(t.host_mut().titles, vec!["my title"]);
    assert_eq!(t.host_mut().bells, 1);
}

#[test]
fn osc_notification() {
    let mut t = term(20, 3);
    t.feed(b"\x1b]777;notify;Title;Body text\x1b\\");
    assert_eq!(
        t.host_mut().notifications,
        vec![("Title".to_owned(), "Body text".to_owned())]
    );
}

#[test]
fn osc_clipboard_respects_trust() {
    let mut t = term(20, 3);
    t.feed(b"\x1b]52;c;aGVsbG8=\x07");
    assert_eq!(t.host_mut().clipboard, vec!["hello"]);

    t.host_mut().trusted = false;
    t.feed(b"\x1b]52;c;aGVsbG8=\x07");
    assert_eq!(t.host_mut().clipboard.len(), 1);
}

// ── Resize round trip ───────────────────────────────────────────────

#[test]
fn resize_round_trip_preserves_content() {
    let mut t = term(20, 5);
    t.feed(b"keep me");
    t.resize(30, 8);
    t.resize(20, 5);
    assert_eq!(t.cols(), 20);
    assert_eq!(t.rows(), 5);
    assert_eq!(row_text(&t, 0), "keep me");
}

#[test]
fn deccolm_resizes_when_allowed() {
    let mut t = term(80, 24);
    t.feed(b"\x1b[?3h");
    assert_eq!(t.cols(), 80); // not allowed yet
    t.feed(b"\x1b[?40h\x1b[?3h");
    assert_eq!(t.cols(), 132);
    assert_eq!(t.host_mut().resize_requests.last(), Some(&(132, 24)));
    t.feed(b"\x1b[?3l");
    assert_eq!(t.cols(), 80);
}

// ── Sixel passthrough ───────────────────────────────────────────────

#[test]
fn sixel_payload_reaches_host() {
    let mut t = term(20, 5);
    t.feed(b"\x1bPq#0;2;0;0;0~~\x1b\\");
    assert_eq!(t.host_mut().sixel_payloads.len(), 1);
    assert_eq!(t.host_mut().sixel_payloads[0], b"#0;2;0;0;0~~");
}

// ── Save/restore round trip (DECSC/DECRC) ───────────────────────────

#[test]
fn save_restore_cursor_round_trip() {
    let mut t = term(40, 10);
    t.feed(b"\x1b[4;7H\x1b[1;31m\x1b[?6h\x1b[?45h\x1b7");
    let cursor = t.cursor();
    t.feed(b"\x1b[0m\x1b[?6l\x1b[?45l\x1b[1;1H");
    t.feed(b"\x1b8");
    assert_eq!(t.cursor(), cursor);
    assert!(t.modes().contains(stormterm_core::DecModes::ORIGIN));
    assert!(t.modes().contains(stormterm_core::DecModes::REVERSE_WRAP));
    // The restored attribute is the saved bold red foreground.
    t.feed(b"Q");
    let q = t
        .active_buffer()
        .line(t.cursor().1)
        .unwrap()
        .cell(t.cursor().0 - 1)
        .cloned()
        .unwrap();
    assert_eq!(q.attrs.fg, Color::Ansi(1));
    assert!(q.attrs.flags.contains(stormterm_core::SgrFlags::BOLD));
}

// ── Malformed input never corrupts state ────────────────────────────

#[test]
fn malformed_sequences_recover() {
    let mut t = term(20, 5);
    t.feed(b"\x1b[999;999;999;999zok");
    assert_eq!(row_text(&t, 0), "ok");
    t.feed(b"\x1b]does-not-parse\x07still fine");
    assert!(row_text(&t, 0).contains("still fine"));
    t.feed(&[0x1b, b'[', 0x18, b'X']); // CAN aborts the CSI
    assert!(row_text(&t, 0).contains('X'));
}
