//! Record parser for method-trace captures
//!
//! A capture is a text section (version, options, threads, methods) followed
//! by a binary section (header, optional padding, fixed-size action records).
//! The parser consumes one text line or one binary block at a time and tells
//! the caller how many bytes it needs next; zero means "another text line".

use byteorder::{ByteOrder, LittleEndian};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::error::{ConvertError, Result};
use super::types::{ActionRecord, HeaderRecord, RecordLayout, HEADER_SIZE, SUPPORTED_VERSION};
use crate::tptp::adapter::TraceAdapter;
use crate::tptp::sink::TraceSink;

fn pattern(re: &str) -> Regex {
    Regex::new(re).expect("static trace grammar")
}

// Separators and option tokens are ASCII only; names may carry any non-space
// character.
static VERSION_MARKER: Lazy<Regex> =
    Lazy::new(|| pattern(r"^[[:space:]]*\*[[:space:]]*version[[:space:]]*$"));
static VERSION: Lazy<Regex> = Lazy::new(|| pattern(r"^[[:space:]]*([0-9]+)[[:space:]]*$"));
static OPTION: Lazy<Regex> = Lazy::new(|| {
    pattern(r"^[[:space:]]*([[:word:]\-]+)[[:space:]]*=[[:space:]]*([[:word:]\-]+)[[:space:]]*$")
});
static THREADS_MARKER: Lazy<Regex> =
    Lazy::new(|| pattern(r"^[[:space:]]*\*[[:space:]]*threads[[:space:]]*$"));
static THREAD: Lazy<Regex> = Lazy::new(|| {
    pattern(r"^[[:space:]]*([0-9]+)(?:[[:space:]]+([^[:space:]](?:.*[^[:space:]])?))?[[:space:]]*$")
});
static METHODS_MARKER: Lazy<Regex> =
    Lazy::new(|| pattern(r"^[[:space:]]*\*[[:space:]]*methods[[:space:]]*$"));
static METHOD: Lazy<Regex> = Lazy::new(|| {
    pattern(concat!(
        r"^[[:space:]]*0x([0-9a-f]{8})",
        r"[[:space:]]+([^[:space:]]+)[[:space:]]+([^[:space:]]+)[[:space:]]+([^[:space:]]+)",
        r"(?:[[:space:]]+([^[:space:]]+)[[:space:]]+(-?[0-9]+))?[[:space:]]*$",
    ))
});
static END_MARKER: Lazy<Regex> =
    Lazy::new(|| pattern(r"^[[:space:]]*\*[[:space:]]*end[[:space:]]*$"));

/// Parser states, in the order a capture walks through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    ExpectVersion,
    ParsingVersion,
    ParsingOptions,
    ParsingThreads,
    ParsingMethods,
    ExpectHeadRecord,
    ExpectBlank,
    ParsingRecords,
}

impl ParserState {
    pub fn name(self) -> &'static str {
        match self {
            ParserState::ExpectVersion => "EXPECT_VERSION",
            ParserState::ParsingVersion => "PARSING_VERSION",
            ParserState::ParsingOptions => "PARSING_OPTIONS",
            ParserState::ParsingThreads => "PARSING_THREADS",
            ParserState::ParsingMethods => "PARSING_METHODS",
            ParserState::ExpectHeadRecord => "EXPECT_HEAD_RECORD",
            ParserState::ExpectBlank => "EXPECT_BLANK",
            ParserState::ParsingRecords => "PARSING_RECORDS",
        }
    }

    pub fn is_text(self) -> bool {
        matches!(
            self,
            ParserState::ExpectVersion
                | ParserState::ParsingVersion
                | ParserState::ParsingOptions
                | ParserState::ParsingThreads
                | ParserState::ParsingMethods
        )
    }
}

impl std::fmt::Display for ParserState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

pub struct RecordParser<S> {
    state: ParserState,
    layout: RecordLayout,
    adapter: TraceAdapter<S>,
}

impl<S: TraceSink> RecordParser<S> {
    pub fn new(adapter: TraceAdapter<S>) -> Self {
        Self {
            state: ParserState::ExpectVersion,
            layout: RecordLayout::default(),
            adapter,
        }
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    pub fn layout(&self) -> RecordLayout {
        self.layout
    }

    pub fn adapter(&self) -> &TraceAdapter<S> {
        &self.adapter
    }

    pub fn into_adapter(self) -> TraceAdapter<S> {
        self.adapter
    }

    /// Consumes one text line (without its newline).
    ///
    /// Returns 0 to continue with text, or the size of the first binary block.
    pub fn input_line(&mut self, line: &str) -> Result<usize> {
        let (next, needed) = self.transition_line(line)?;
        self.state = next;
        Ok(needed)
    }

    fn transition_line(&mut self, line: &str) -> Result<(ParserState, usize)> {
        let state = self.state;
        let malformed = || ConvertError::malformed_line(state.name(), line);

        match state {
            ParserState::ExpectVersion => {
                if !VERSION_MARKER.is_match(line) {
                    return Err(malformed());
                }
                Ok((ParserState::ParsingVersion, 0))
            }

            ParserState::ParsingVersion => {
                let caps = VERSION.captures(line).ok_or_else(malformed)?;
                // Digits only, so a value past u64 is just another unsupported version.
                let version = caps[1].parse::<u64>().unwrap_or(u64::MAX);
                if version != u64::from(SUPPORTED_VERSION) {
                    return Err(ConvertError::UnsupportedVersion {
                        what: "key file",
                        version,
                    });
                }
                self.adapter.record_format_version(SUPPORTED_VERSION);
                Ok((ParserState::ParsingOptions, 0))
            }

            ParserState::ParsingOptions => {
                if let Some(caps) = OPTION.captures(line) {
                    let (key, value) = (&caps[1], &caps[2]);
                    if key == "clock" {
                        self.layout = RecordLayout::from_clock_option(value)
                            .ok_or_else(malformed)?;
                    }
                    debug!(key, value, "option");
                    return Ok((ParserState::ParsingOptions, 0));
                }
                if THREADS_MARKER.is_match(line) {
                    return Ok((ParserState::ParsingThreads, 0));
                }
                Err(malformed())
            }

            ParserState::ParsingThreads => {
                if let Some(caps) = THREAD.captures(line) {
                    let thread_id: u32 = caps[1].parse().map_err(|_| malformed())?;
                    let name = caps.get(2).map_or("", |m| m.as_str());
                    self.adapter.register_thread(thread_id, name);
                    return Ok((ParserState::ParsingThreads, 0));
                }
                if METHODS_MARKER.is_match(line) {
                    return Ok((ParserState::ParsingMethods, 0));
                }
                Err(malformed())
            }

            ParserState::ParsingMethods => {
                if let Some(caps) = METHOD.captures(line) {
                    let address = u32::from_str_radix(&caps[1], 16).map_err(|_| malformed())?;
                    let source_file = caps.get(5).map(|m| m.as_str());
                    let source_line = match caps.get(6) {
                        Some(m) => {
                            let line_no: i64 = m.as_str().parse().map_err(|_| malformed())?;
                            u32::try_from(line_no).ok()
                        }
                        None => None,
                    };
                    self.adapter.register_method(
                        address,
                        &caps[2],
                        &caps[3],
                        &caps[4],
                        source_file,
                        source_line,
                    )?;
                    return Ok((ParserState::ParsingMethods, 0));
                }
                if END_MARKER.is_match(line) {
                    return Ok((ParserState::ExpectHeadRecord, HEADER_SIZE));
                }
                Err(malformed())
            }

            ParserState::ExpectHeadRecord
            | ParserState::ExpectBlank
            | ParserState::ParsingRecords => Err(ConvertError::IllegalState(format!(
                "text line received in binary state {state}"
            ))),
        }
    }

    /// Consumes one binary block of the size requested by the previous call.
    ///
    /// Returns the size of the next block.
    pub fn input_record(&mut self, block: &[u8]) -> Result<usize> {
        let (next, needed) = self.transition_record(block)?;
        self.state = next;
        Ok(needed)
    }

    fn transition_record(&mut self, block: &[u8]) -> Result<(ParserState, usize)> {
        match self.state {
            ParserState::ExpectHeadRecord => {
                let header = HeaderRecord::from_bytes(block)?;
                if u32::from(header.version) != SUPPORTED_VERSION {
                    return Err(ConvertError::UnsupportedVersion {
                        what: "data file",
                        version: header.version.into(),
                    });
                }
                let padding = header.padding_len()?;
                self.adapter.record_capture_header(
                    header.version,
                    header.offset,
                    header.start_time_usec,
                )?;

                if padding == 0 {
                    Ok((ParserState::ParsingRecords, self.layout.size()))
                } else {
                    Ok((ParserState::ExpectBlank, padding))
                }
            }

            ParserState::ExpectBlank => {
                // The header extension starts with the declared record size.
                if block.len() >= 2 {
                    let declared = LittleEndian::read_u16(&block[0..2]) as usize;
                    if declared != 0 && declared != self.layout.size() {
                        return Err(ConvertError::malformed_record(format!(
                            "declared record size {declared} does not match the {} byte {:?} layout",
                            self.layout.size(),
                            self.layout
                        )));
                    }
                }
                Ok((ParserState::ParsingRecords, self.layout.size()))
            }

            ParserState::ParsingRecords => {
                let record = ActionRecord::decode(self.layout, block)?;
                self.adapter.record_action(
                    record.thread_id,
                    record.method_address,
                    record.action,
                    record.delta_time_usec,
                )?;
                Ok((ParserState::ParsingRecords, self.layout.size()))
            }

            state => Err(ConvertError::IllegalState(format!(
                "binary block received in text state {state}"
            ))),
        }
    }

    /// Closes the trace once the binary section is exhausted.
    pub fn finish(&mut self) -> Result<()> {
        if self.state != ParserState::ParsingRecords {
            return Err(ConvertError::eof(format!(
                "input ended in state {}",
                self.state
            )));
        }
        self.adapter.finish()
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use crate::config::ConverterConfig;
    use crate::dmtrace::types::HEADER_MAGIC;
    use crate::tptp::sink::{RecordingSink, TraceEvent};

    fn parser() -> RecordParser<RecordingSink> {
        RecordParser::new(TraceAdapter::new(
            RecordingSink::new(),
            &ConverterConfig::default(),
        ))
    }

    fn feed_text(parser: &mut RecordParser<RecordingSink>, lines: &[&str]) -> usize {
        let mut needed = 0;
        for line in lines {
            needed = parser.input_line(line).unwrap();
        }
        needed
    }

    fn header(version: u16, offset: u16, start: u64) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&HEADER_MAGIC.to_le_bytes());
        data.extend_from_slice(&version.to_le_bytes());
        data.extend_from_slice(&offset.to_le_bytes());
        data.extend_from_slice(&start.to_le_bytes());
        data
    }

    fn record(thread: u16, method_word: u32, delta: u32) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&thread.to_le_bytes());
        data.extend_from_slice(&method_word.to_le_bytes());
        data.extend_from_slice(&delta.to_le_bytes());
        data
    }

    const TEXT: &[&str] = &[
        "*version",
        "3",
        "data-file-overflow=false",
        "clock=wall",
        "*threads",
        "1\tmain",
        "7 Binder Thread #1 ",
        "9",
        "*methods",
        "0x00001000\tcom/example/Foo\trun\t()V\tFoo.java\t12",
        "0x00002000\tcom/example/Foo\t<init>\t()V",
    ];

    #[test]
    fn test_input_line__text_section__then_walks_states() {
        let mut parser = parser();
        assert_eq!(feed_text(&mut parser, TEXT), 0);
        assert_eq!(parser.state(), ParserState::ParsingMethods);
        assert_eq!(parser.input_line("*end").unwrap(), HEADER_SIZE);
        assert_eq!(parser.state(), ParserState::ExpectHeadRecord);

        let adapter = parser.adapter();
        assert_eq!(adapter.thread_count(), 3);
        assert_eq!(adapter.thread(7).unwrap().name, "Binder Thread #1");
        assert_eq!(adapter.thread(9).unwrap().name, "");
        assert_eq!(adapter.class_count(), 1);
        assert_eq!(adapter.method(0x1000).unwrap().source_line, Some(12));
        assert_eq!(adapter.method(0x2000).unwrap().name, "-init-");
    }

    #[test]
    fn test_input_line__missing_version_marker__then_malformed() {
        let mut parser = parser();
        let err = parser.input_line("version 3").unwrap_err();
        assert!(matches!(
            err,
            ConvertError::MalformedLine { state: "EXPECT_VERSION", .. }
        ));
    }

    #[test]
    fn test_input_line__version_four__then_unsupported() {
        let mut parser = parser();
        parser.input_line(" * version ").unwrap();
        let err = parser.input_line("4").unwrap_err();
        assert!(matches!(
            err,
            ConvertError::UnsupportedVersion { version: 4, .. }
        ));
        assert!(parser.adapter().sink().events().is_empty());
    }

    #[test]
    fn test_input_line__oversized_version__then_unsupported() {
        let mut parser = parser();
        parser.input_line("*version").unwrap();
        let err = parser.input_line("99999999999999999999999").unwrap_err();
        assert!(matches!(
            err,
            ConvertError::UnsupportedVersion {
                version: u64::MAX,
                ..
            }
        ));
    }

    #[test]
    fn test_input_line__leading_zero_version__then_accepted() {
        let mut parser = parser();
        feed_text(&mut parser, &["*version", "003"]);
        assert_eq!(parser.state(), ParserState::ParsingOptions);
    }

    #[test]
    fn test_input_line__non_ascii_option_key__then_malformed() {
        let mut parser = parser();
        feed_text(&mut parser, &["*version", "3"]);
        let err = parser.input_line("clé=valeur").unwrap_err();
        assert!(matches!(
            err,
            ConvertError::MalformedLine { state: "PARSING_OPTIONS", .. }
        ));
    }

    #[test]
    fn test_input_line__non_ascii_separator__then_malformed() {
        let mut parser = parser();
        feed_text(&mut parser, &["*version", "3", "*threads"]);
        assert!(parser.input_line("1\u{3000}main").is_err());
        assert!(parser.input_line("\u{3000}*methods").is_err());
    }

    #[test]
    fn test_input_line__non_ascii_thread_name__then_kept() {
        let mut parser = parser();
        feed_text(&mut parser, &["*version", "3", "*threads", "4 渲染线程"]);
        assert_eq!(parser.adapter().thread(4).unwrap().name, "渲染线程");
    }

    #[test]
    fn test_input_line__garbage_option__then_malformed() {
        let mut parser = parser();
        feed_text(&mut parser, &["*version", "3"]);
        assert!(parser.input_line("not an option").is_err());
    }

    #[test]
    fn test_input_line__dual_clock__then_layout_negotiated() {
        let mut parser = parser();
        feed_text(&mut parser, &["*version", "3", "clock = dual"]);
        assert_eq!(parser.layout(), RecordLayout::DualClock);
    }

    #[test]
    fn test_input_line__unknown_clock__then_malformed() {
        let mut parser = parser();
        feed_text(&mut parser, &["*version", "3"]);
        assert!(parser.input_line("clock=sundial").is_err());
    }

    #[test]
    fn test_input_line__bad_thread_line__then_malformed() {
        let mut parser = parser();
        feed_text(&mut parser, &["*version", "3", "*threads"]);
        let err = parser.input_line("main 1").unwrap_err();
        assert!(matches!(
            err,
            ConvertError::MalformedLine { state: "PARSING_THREADS", .. }
        ));
    }

    #[test]
    fn test_input_line__method_with_five_fields__then_malformed() {
        let mut parser = parser();
        feed_text(&mut parser, &["*version", "3", "*threads", "*methods"]);
        assert!(parser
            .input_line("0x00001000 a/B run ()V B.java")
            .is_err());
        assert!(parser.input_line("0x1000 a/B run ()V").is_err());
    }

    #[test]
    fn test_input_line__invalid_method_name__then_fatal() {
        let mut parser = parser();
        feed_text(&mut parser, &["*version", "3", "*threads", "*methods"]);
        // The grammar splits on whitespace, so an invalid name has to contain
        // other forbidden characters to reach the name check.
        let err = parser
            .input_line("0x00001000 a/B lambda<0> ()V")
            .unwrap_err();
        assert!(matches!(err, ConvertError::InvalidMethodName(_)));
    }

    #[test]
    fn test_input_line__negative_source_line__then_no_line_number() {
        let mut parser = parser();
        feed_text(&mut parser, &["*version", "3", "*threads", "*methods"]);
        parser
            .input_line("0x00001000 a/B run ()V B.java -1")
            .unwrap();
        assert_eq!(parser.adapter().method(0x1000).unwrap().source_line, None);
    }

    #[test]
    fn test_input_line__in_binary_state__then_illegal_state() {
        let mut parser = parser();
        feed_text(&mut parser, TEXT);
        parser.input_line("*end").unwrap();
        assert!(matches!(
            parser.input_line("*end"),
            Err(ConvertError::IllegalState(_))
        ));
    }

    #[test]
    fn test_input_record__in_text_state__then_illegal_state() {
        let mut parser = parser();
        assert!(matches!(
            parser.input_record(&[0u8; 16]),
            Err(ConvertError::IllegalState(_))
        ));
    }

    #[test]
    fn test_input_record__header_without_padding__then_records_requested() {
        let mut parser = parser();
        feed_text(&mut parser, TEXT);
        parser.input_line("*end").unwrap();

        let needed = parser.input_record(&header(3, 16, 1_000_000)).unwrap();
        assert_eq!(needed, 10);
        assert_eq!(parser.state(), ParserState::ParsingRecords);
    }

    #[test]
    fn test_input_record__header_with_padding__then_blank_requested() {
        let mut parser = parser();
        feed_text(&mut parser, TEXT);
        parser.input_line("*end").unwrap();

        assert_eq!(parser.input_record(&header(3, 32, 0)).unwrap(), 16);
        assert_eq!(parser.state(), ParserState::ExpectBlank);

        let mut padding = vec![0u8; 16];
        padding[0..2].copy_from_slice(&10u16.to_le_bytes());
        assert_eq!(parser.input_record(&padding).unwrap(), 10);
        assert_eq!(parser.state(), ParserState::ParsingRecords);
    }

    #[test]
    fn test_input_record__declared_size_mismatch__then_malformed() {
        let mut parser = parser();
        feed_text(&mut parser, TEXT);
        parser.input_line("*end").unwrap();
        parser.input_record(&header(3, 32, 0)).unwrap();

        let mut padding = vec![0u8; 16];
        padding[0..2].copy_from_slice(&14u16.to_le_bytes());
        assert!(matches!(
            parser.input_record(&padding),
            Err(ConvertError::MalformedRecord(_))
        ));
    }

    #[test]
    fn test_input_record__offset_below_header__then_invalid_offset() {
        let mut parser = parser();
        feed_text(&mut parser, TEXT);
        parser.input_line("*end").unwrap();
        assert!(matches!(
            parser.input_record(&header(3, 12, 0)),
            Err(ConvertError::InvalidOffset(12))
        ));
    }

    #[test]
    fn test_input_record__header_version_mismatch__then_unsupported_before_output() {
        let mut parser = parser();
        feed_text(&mut parser, TEXT);
        parser.input_line("*end").unwrap();
        assert!(matches!(
            parser.input_record(&header(4, 16, 0)),
            Err(ConvertError::UnsupportedVersion { version: 4, .. })
        ));
        assert!(parser.adapter().sink().events().is_empty());
    }

    #[test]
    fn test_input_record__action_records__then_forwarded_to_adapter() {
        let mut parser = parser();
        feed_text(&mut parser, TEXT);
        parser.input_line("*end").unwrap();
        parser.input_record(&header(3, 16, 1_000_000)).unwrap();
        parser.input_record(&record(1, 0x1000, 500_000)).unwrap();
        parser.input_record(&record(1, 0x1001, 600_000)).unwrap();
        parser.finish().unwrap();

        let adapter = parser.into_adapter();
        assert_eq!(adapter.stats().method_entries, 1);
        assert_eq!(adapter.stats().method_exits, 1);
        let events = adapter.into_sink().into_events();
        assert_eq!(events.last(), Some(&TraceEvent::End));
    }

    #[test]
    fn test_finish__before_records__then_unexpected_eof() {
        let mut parser = parser();
        feed_text(&mut parser, TEXT);
        assert!(matches!(
            parser.finish(),
            Err(ConvertError::UnexpectedEof(_))
        ));
    }
}
