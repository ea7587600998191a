#![forbid(unsafe_code)]

//! Host-agnostic VT/ANSI terminal engine.
//!
//! `stormterm-core` is the platform-independent interior of a terminal
//! emulator: it consumes host-process output bytes and maintains the
//! logical state of the character grid, cursor, selection, and scrollback.
//! Rendering, PTY I/O, and the platform event loop live in the host.
//!
//! # Primary responsibilities
//!
//! - **Parser**: VT500-series escape-sequence state machine
//!   (ground/ESC/CSI/OSC/DCS/APC).
//! - **Buffers**: normal (with scrollback ring) and alternate screen,
//!   margins, scroll regions, tab stops.
//! - **Dispatcher**: the CSI/ESC/OSC/DCS handler table mutating buffer
//!   state and emitting reports through the host `send` callback.
//! - **Encoders**: mouse protocols and the legacy + Kitty progressive
//!   keyboard protocol, bit-exact.
//! - **Graphics**: Kitty image transmission, placements, placeholders,
//!   and a byte-budget LRU cache.
//! - **Selection**: word/expression/line/range selection with soft-wrap
//!   aware text extraction.
//!
//! # Design principles
//!
//! - **No I/O**: the engine only reads bytes the host feeds it (the one
//!   exception is Kitty file transmission, which applies a path policy).
//! - **Deterministic**: identical byte sequences produce identical state.
//! - **Never fatal**: malformed input degrades to logged no-ops.
//!
//! # Example
//!
//! ```
//! use stormterm_core::{NullHost, Options, Terminal};
//!
//! let mut term = Terminal::new(Options::default(), NullHost);
//! term.feed(b"\x1b[1;31mhello\x1b[0m");
//! let (x, y) = term.cursor();
//! assert_eq!((x, y), (5, 0));
//! ```

pub mod buffer;
pub mod cell;
pub mod charset;
pub mod color;
pub mod cursor;
pub mod dirty;
pub mod keyboard;
pub mod kitty;
pub mod line;
pub mod modes;
pub mod mouse;
pub mod parser;
pub mod ring;
pub mod selection;
pub mod stats;
pub mod term;
pub mod width;

pub use buffer::Buffer;
pub use cell::{AtomId, AtomPayload, AtomRegistry, Cell, CellFlags, Color, SgrAttrs, SgrFlags};
pub use charset::{Charset, Charsets};
pub use color::{NamedScheme, Rgb, default_palette};
pub use cursor::{Cursor, CursorStyle, SavedCursor};
pub use dirty::DirtyLines;
pub use keyboard::{KeyCode, KeyEvent, KeyEventKind, KittyFlags, Modifiers};
pub use kitty::{Graphics, Placement};
pub use line::{BufferLine, PlacementRef, RenderMode};
pub use modes::{AnsiModes, DecModes, Modes, MouseEncoding, MouseMode};
pub use mouse::{MouseAction, MouseButton, MouseEvent, MouseModifiers};
pub use parser::{Dispatch, Params, Parser};
pub use ring::LineRing;
pub use selection::{Position, Selection};
pub use stats::{Stats, StatsSnapshot};
pub use term::{Host, NullHost, Options, Terminal};
