//! Drives the record parser from a byte stream
//!
//! Text lines are read until the parser asks for a binary block, then blocks
//! of exactly the requested size follow until the stream ends on a record
//! boundary.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use tracing::{debug, info};

use super::error::{ConvertError, Result};
use super::parser::{ParserState, RecordParser};
use crate::tptp::sink::TraceSink;

pub struct Scanner<R> {
    reader: R,
    total_len: Option<u64>,
    consumed: u64,
    last_percent: Option<u64>,
    line: Vec<u8>,
}

impl<R: BufRead> Scanner<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            total_len: None,
            consumed: 0,
            last_percent: None,
            line: Vec::new(),
        }
    }

    /// Enables progress reporting against a known input length.
    pub fn with_total_len(mut self, total_len: u64) -> Self {
        self.total_len = Some(total_len);
        self
    }

    pub fn bytes_consumed(&self) -> u64 {
        self.consumed
    }

    /// Feeds the whole stream to `parser` and closes the trace.
    pub fn run<S: TraceSink>(&mut self, parser: &mut RecordParser<S>) -> Result<()> {
        let mut needed = 0;
        while parser.state().is_text() {
            let line = self.next_line(parser.state())?;
            needed = parser.input_line(&line)?;
        }
        debug!(offset = self.consumed, "text section done");

        let mut block = Vec::new();
        loop {
            block.resize(needed, 0);
            if !self.next_block(&mut block, parser.state())? {
                break;
            }
            needed = parser.input_record(&block)?;
            self.report_progress();
        }

        parser.finish()
    }

    fn next_line(&mut self, state: ParserState) -> Result<String> {
        self.line.clear();
        let read = self.reader.read_until(b'\n', &mut self.line)?;
        self.consumed += read as u64;

        if read == 0 {
            return Err(ConvertError::eof(format!("input ended in state {state}")));
        }
        if self.line.pop() != Some(b'\n') {
            return Err(ConvertError::eof(format!(
                "unterminated text line in state {state}"
            )));
        }
        if self.line.last() == Some(&b'\r') {
            self.line.pop();
        }

        match std::str::from_utf8(&self.line) {
            Ok(line) => Ok(line.to_string()),
            Err(_) => Err(ConvertError::malformed_line(
                state.name(),
                String::from_utf8_lossy(&self.line),
            )),
        }
    }

    /// Fills `block` completely. Returns false on a clean end of stream, which
    /// is only allowed between action records.
    fn next_block(&mut self, block: &mut [u8], state: ParserState) -> Result<bool> {
        let mut filled = 0;
        while filled < block.len() {
            match self.reader.read(&mut block[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        self.consumed += filled as u64;

        if filled == block.len() {
            return Ok(true);
        }
        if filled == 0 && state == ParserState::ParsingRecords {
            return Ok(false);
        }
        Err(ConvertError::eof(format!(
            "got {filled} of {} bytes in state {state}",
            block.len()
        )))
    }

    fn report_progress(&mut self) {
        let Some(total) = self.total_len.filter(|total| *total > 0) else {
            return;
        };
        let percent = (self.consumed.min(total) * 100) / total;
        if self.last_percent != Some(percent) {
            self.last_percent = Some(percent);
            info!(percent, "progress");
        }
    }
}

/// Opens `path` and scans it to the end.
pub fn scan_file<S: TraceSink>(path: &Path, parser: &mut RecordParser<S>) -> Result<u64> {
    let file = File::open(path).map_err(|e| ConvertError::io(path, e))?;
    let total_len = file
        .metadata()
        .map_err(|e| ConvertError::io(path, e))?
        .len();

    let mut scanner = Scanner::new(BufReader::new(file)).with_total_len(total_len);
    scanner.run(parser)?;
    Ok(scanner.bytes_consumed())
}
