//! Shared test harness: a host that records everything the engine emits.
#![allow(dead_code)] // each test binary uses a subset of the helpers

use stormterm_core::{Host, Options, Terminal};

#[derive(Debug, Default)]
pub struct RecordingHost {
    pub sent: Vec<u8>,
    pub titles: Vec<String>,
    pub bells: usize,
    pub trusted: bool,
    pub clipboard: Vec<String>,
    pub notifications: Vec<(String, String)>,
    pub resize_requests: Vec<(usize, usize)>,
    pub directories: Vec<String>,
    pub sixel_payloads: Vec<Vec<u8>>,
}

impl RecordingHost {
    pub fn trusted() -> Self {
        Self {
            trusted: true,
            ..Self::default()
        }
    }

    pub fn take_sent(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.sent)
    }
}

impl Host for RecordingHost {
    fn send(&mut self, bytes: &[u8]) {
        self.sent.extend_from_slice(bytes);
    }

    fn is_process_trusted(&self) -> bool {
        self.trusted
    }

    fn set_title(&mut self, title: &str) {
        self.titles.push(title.to_owned());
    }

    fn bell(&mut self) {
        self.bells += 1;
    }

    fn notify(&mut self, title: &str, body: &str) {
        self.notifications.push((title.to_owned(), body.to_owned()));
    }

    fn clipboard_copy(&mut self, text: &str) {
        self.clipboard.push(text.to_owned());
    }

    fn request_resize(&mut self, cols: usize, rows: usize) {
        self.resize_requests.push((cols, rows));
    }

    fn report_directory(&mut self, path: &str) {
        self.directories.push(path.to_owned());
    }

    fn sixel(&mut self, data: &[u8]) {
        self.sixel_payloads.push(data.to_vec());
    }
}

pub fn term(cols: usize, rows: usize) -> Terminal<RecordingHost> {
    let options = Options {
        cols,
        rows,
        ..Options::default()
    };
    Terminal::new(options, RecordingHost::trusted())
}

pub fn term_with(options: Options) -> Terminal<RecordingHost> {
    Terminal::new(options, RecordingHost::trusted())
}

/// The text content of a visible row, trailing blanks trimmed.
pub fn row_text(term: &Terminal<RecordingHost>, row: usize) -> String {
    let buffer = term.active_buffer();
    let line = buffer.line(row).expect("row in range");
    let mut text = line.text(0, buffer.cols());
    while text.ends_with(' ') {
        text.pop();
    }
    text
}

/// A single visible cell.
pub fn cell(
    term: &Terminal<RecordingHost>,
    row: usize,
    col: usize,
) -> stormterm_core::Cell {
    term.active_buffer()
        .line(row)
        .and_then(|line| line.cell(col).cloned())
        .expect("cell in range")
}
