//! VT/ANSI escape-sequence parser.
//!
//! A byte-driven state machine following the published VT500-series parser
//! diagram (Paul Flo Williams model): ground, escape, CSI, OSC, DCS, and
//! SOS/PM/APC string states. For every consumed byte it invokes at most one
//! dispatch callback on the [`Dispatch`] implementation, plus parameter
//! accumulation.
//!
//! Printable runs are handed over as raw byte slices; UTF-8 decoding
//! (including partial sequences spanning feeds) is the printer's concern,
//! which keeps the state machine byte-oriented and restartable.
//!
//! Malformed sequences never wedge the machine: unknown or over-long input
//! degrades to the ignore states and returns to ground on the final byte.

use smallvec::SmallVec;

/// Upper bound on retained parameters; further parameters are dropped.
const MAX_PARAMS: usize = 32;
/// Upper bound on collected intermediate/private-marker bytes.
const MAX_COLLECT: usize = 8;

/// Numeric parameters of a CSI/DCS sequence.
///
/// Parameters are `;`-separated groups; `:` continues a group with
/// subparameters (extended SGR color). Missing values are stored as 0 and
/// interpreted against each command's documented default at dispatch time.
#[derive(Debug, Clone, Default)]
pub struct Params {
    values: SmallVec<[i32; MAX_PARAMS]>,
    /// `is_sub[k]` marks `values[k]` as a `:` continuation of `values[k-1]`.
    is_sub: SmallVec<[bool; MAX_PARAMS]>,
}

impl Params {
    fn clear(&mut self) {
        self.values.clear();
        self.is_sub.clear();
    }

    fn push(&mut self, value: i32, sub: bool) {
        if self.values.len() < MAX_PARAMS {
            self.values.push(value);
            self.is_sub.push(sub);
        }
    }

    /// Number of top-level parameter groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.is_sub.iter().filter(|&&s| !s).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// First value of group `index`, or `None` if absent.
    #[must_use]
    pub fn raw(&self, index: usize) -> Option<i32> {
        self.group(index).first().copied()
    }

    /// First value of group `index`, with absent *or zero* mapping to
    /// `default` (the common "default parameter" rule).
    #[must_use]
    pub fn get(&self, index: usize, default: i32) -> i32 {
        match self.raw(index) {
            None | Some(0) => default,
            Some(v) => v,
        }
    }

    /// The full group at `index` including `:` subparameters.
    #[must_use]
    pub fn group(&self, index: usize) -> &[i32] {
        let mut seen = 0usize;
        let mut start = None;
        for (k, &sub) in self.is_sub.iter().enumerate() {
            if !sub {
                if let Some(s) = start {
                    return &self.values[s..k];
                }
                if seen == index {
                    start = Some(k);
                }
                seen += 1;
            }
        }
        match start {
            Some(s) => &self.values[s..],
            None => &[],
        }
    }

    /// Iterate top-level groups in order.
    pub fn iter_groups(&self) -> impl Iterator<Item = &[i32]> {
        (0..self.len()).map(|i| self.group(i))
    }
}

/// Receiver for parser events.
///
/// The default implementations ignore string payloads so simple consumers
/// only implement the callbacks they care about.
pub trait Dispatch {
    /// A run of printable bytes (UTF-8; may end mid-sequence).
    fn print(&mut self, bytes: &[u8]);
    /// A C0 control byte.
    fn execute(&mut self, byte: u8);
    /// Complete CSI sequence.
    fn csi_dispatch(&mut self, params: &Params, collect: &[u8], final_byte: u8);
    /// Complete non-CSI escape sequence.
    fn esc_dispatch(&mut self, collect: &[u8], final_byte: u8);

    fn osc_start(&mut self) {}
    fn osc_put(&mut self, _byte: u8) {}
    /// OSC terminated (`success`) or aborted by CAN/SUB.
    fn osc_end(&mut self, _success: bool) {}

    fn dcs_hook(&mut self, _params: &Params, _collect: &[u8], _final_byte: u8) {}
    fn dcs_put(&mut self, _byte: u8) {}
    fn dcs_unhook(&mut self) {}

    fn apc_start(&mut self) {}
    fn apc_put(&mut self, _byte: u8) {}
    /// APC terminated (`success`) or aborted by CAN/SUB.
    fn apc_end(&mut self, _success: bool) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum State {
    #[default]
    Ground,
    Escape,
    EscapeIntermediate,
    CsiEntry,
    CsiParam,
    CsiIntermediate,
    CsiIgnore,
    DcsEntry,
    DcsParam,
    DcsIntermediate,
    DcsPassthrough,
    DcsIgnore,
    OscString,
    ApcString,
    SosPmString,
}

/// The parser state machine.
#[derive(Debug, Clone, Default)]
pub struct Parser {
    state: State,
    params: Params,
    collect: SmallVec<[u8; MAX_COLLECT]>,
    collect_overflow: bool,
    /// Current numeric parameter being accumulated.
    cur: i32,
    /// Whether the current parameter has seen a digit or separator.
    pending: bool,
    /// The parameter being accumulated is a `:` subparameter.
    cur_is_sub: bool,
}

impl Parser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hard-reset to ground (RIS and teardown paths).
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Drive the machine over a chunk of bytes.
    pub fn advance<D: Dispatch>(&mut self, dispatch: &mut D, bytes: &[u8]) {
        let mut i = 0;
        while i < bytes.len() {
            if self.state == State::Ground {
                // Fast path: hand over the longest printable run unsplit.
                let start = i;
                while i < bytes.len() && is_printable(bytes[i]) {
                    i += 1;
                }
                if i > start {
                    dispatch.print(&bytes[start..i]);
                    continue;
                }
            }
            self.step(dispatch, bytes[i]);
            i += 1;
        }
    }

    fn step<D: Dispatch>(&mut self, dispatch: &mut D, byte: u8) {
        // CAN and SUB abort any sequence from any state.
        if byte == 0x18 || byte == 0x1a {
            self.abort(dispatch);
            return;
        }

        match self.state {
            State::Ground => match byte {
                0x1b => self.enter_escape(),
                0x00..=0x1f => dispatch.execute(byte),
                0x7f => {}
                _ => dispatch.print(std::slice::from_ref(&byte)),
            },
            State::Escape => match byte {
                0x1b => self.enter_escape(),
                0x20..=0x2f => {
                    self.push_collect(byte);
                    self.state = State::EscapeIntermediate;
                }
                b'[' => self.enter(State::CsiEntry),
                b']' => {
                    self.state = State::OscString;
                    dispatch.osc_start();
                }
                b'P' => self.enter(State::DcsEntry),
                b'_' => {
                    self.state = State::ApcString;
                    dispatch.apc_start();
                }
                b'X' | b'^' => self.state = State::SosPmString,
                0x30..=0x7e => {
                    self.state = State::Ground;
                    dispatch.esc_dispatch(&self.collect, byte);
                }
                0x00..=0x1f => dispatch.execute(byte),
                _ => self.state = State::Ground,
            },
            State::EscapeIntermediate => match byte {
                0x1b => self.enter_escape(),
                0x20..=0x2f => self.push_collect(byte),
                0x30..=0x7e => {
                    self.state = State::Ground;
                    dispatch.esc_dispatch(&self.collect, byte);
                }
                0x00..=0x1f => dispatch.execute(byte),
                _ => self.state = State::Ground,
            },
            State::CsiEntry | State::CsiParam => match byte {
                0x1b => self.enter_escape(),
                b'0'..=b'9' => {
                    self.cur = self.cur.saturating_mul(10).saturating_add((byte - b'0') as i32);
                    self.pending = true;
                    self.state = State::CsiParam;
                }
                b';' => {
                    self.finish_param();
                    self.state = State::CsiParam;
                }
                b':' => {
                    self.finish_param();
                    self.cur_is_sub = true;
                    self.state = State::CsiParam;
                }
                0x3c..=0x3f if self.state == State::CsiEntry => {
                    self.push_collect(byte);
                    self.state = State::CsiParam;
                }
                0x3c..=0x3f => self.state = State::CsiIgnore,
                0x20..=0x2f => {
                    self.push_collect(byte);
                    self.state = State::CsiIntermediate;
                }
                0x40..=0x7e => self.dispatch_csi(dispatch, byte),
                0x00..=0x1f => dispatch.execute(byte),
                _ => self.state = State::CsiIgnore,
            },
            State::CsiIntermediate => match byte {
                0x1b => self.enter_escape(),
                0x20..=0x2f => self.push_collect(byte),
                0x30..=0x3f => self.state = State::CsiIgnore,
                0x40..=0x7e => self.dispatch_csi(dispatch, byte),
                0x00..=0x1f => dispatch.execute(byte),
                _ => self.state = State::CsiIgnore,
            },
            State::CsiIgnore => match byte {
                0x1b => self.enter_escape(),
                0x40..=0x7e => self.state = State::Ground,
                0x00..=0x1f => dispatch.execute(byte),
                _ => {}
            },
            State::DcsEntry | State::DcsParam => match byte {
                0x1b => self.enter_escape(),
                b'0'..=b'9' => {
                    self.cur = self.cur.saturating_mul(10).saturating_add((byte - b'0') as i32);
                    self.pending = true;
                    self.state = State::DcsParam;
                }
                b';' => {
                    self.finish_param();
                    self.state = State::DcsParam;
                }
                b':' => {
                    self.finish_param();
                    self.cur_is_sub = true;
                    self.state = State::DcsParam;
                }
                0x3c..=0x3f if self.state == State::DcsEntry => {
                    self.push_collect(byte);
                    self.state = State::DcsParam;
                }
                0x3c..=0x3f => self.state = State::DcsIgnore,
                0x20..=0x2f => {
                    self.push_collect(byte);
                    self.state = State::DcsIntermediate;
                }
                0x40..=0x7e => self.hook_dcs(dispatch, byte),
                _ => {}
            },
            State::DcsIntermediate => match byte {
                0x1b => self.enter_escape(),
                0x20..=0x2f => self.push_collect(byte),
                0x30..=0x3f => self.state = State::DcsIgnore,
                0x40..=0x7e => self.hook_dcs(dispatch, byte),
                _ => {}
            },
            State::DcsPassthrough => match byte {
                0x1b => {
                    dispatch.dcs_unhook();
                    self.enter_escape();
                }
                _ => dispatch.dcs_put(byte),
            },
            State::DcsIgnore => match byte {
                0x1b => self.enter_escape(),
                _ => {}
            },
            State::OscString => match byte {
                0x07 => {
                    self.state = State::Ground;
                    dispatch.osc_end(true);
                }
                0x1b => {
                    dispatch.osc_end(true);
                    self.enter_escape();
                }
                0x00..=0x06 | 0x08..=0x1a | 0x1c..=0x1f => {}
                _ => dispatch.osc_put(byte),
            },
            State::ApcString => match byte {
                0x07 => {
                    // Kitty in practice also accepts BEL termination.
                    self.state = State::Ground;
                    dispatch.apc_end(true);
                }
                0x1b => {
                    dispatch.apc_end(true);
                    self.enter_escape();
                }
                0x00..=0x1f => {}
                _ => dispatch.apc_put(byte),
            },
            State::SosPmString => {
                if byte == 0x1b {
                    self.enter_escape();
                }
                // Content is consumed and discarded.
            }
        }
    }

    fn enter(&mut self, state: State) {
        self.params.clear();
        self.collect.clear();
        self.collect_overflow = false;
        self.cur = 0;
        self.pending = false;
        self.cur_is_sub = false;
        self.state = state;
    }

    fn enter_escape(&mut self) {
        self.enter(State::Escape);
    }

    fn abort<D: Dispatch>(&mut self, dispatch: &mut D) {
        match self.state {
            State::OscString => dispatch.osc_end(false),
            State::ApcString => dispatch.apc_end(false),
            State::DcsPassthrough => dispatch.dcs_unhook(),
            _ => {}
        }
        self.state = State::Ground;
    }

    fn push_collect(&mut self, byte: u8) {
        if self.collect.len() < MAX_COLLECT {
            self.collect.push(byte);
        } else {
            self.collect_overflow = true;
        }
    }

    fn finish_param(&mut self) {
        self.params.push(self.cur, self.cur_is_sub);
        self.cur = 0;
        self.pending = false;
        self.cur_is_sub = false;
    }

    fn flush_params(&mut self) {
        if self.pending || self.cur_is_sub || !self.params.is_empty() {
            self.finish_param();
        }
    }

    fn dispatch_csi<D: Dispatch>(&mut self, dispatch: &mut D, final_byte: u8) {
        self.flush_params();
        self.state = State::Ground;
        if self.collect_overflow {
            tracing::debug!(final_byte, "CSI with oversized collect ignored");
            return;
        }
        dispatch.csi_dispatch(&self.params, &self.collect, final_byte);
    }

    fn hook_dcs<D: Dispatch>(&mut self, dispatch: &mut D, final_byte: u8) {
        self.flush_params();
        if self.collect_overflow {
            tracing::debug!(final_byte, "DCS with oversized collect ignored");
            self.state = State::DcsIgnore;
            return;
        }
        self.state = State::DcsPassthrough;
        dispatch.dcs_hook(&self.params, &self.collect, final_byte);
    }
}

#[inline]
fn is_printable(byte: u8) -> bool {
    // 0x20..=0x7E plus everything with the high bit set (UTF-8 data).
    byte >= 0x20 && byte != 0x7f
}
