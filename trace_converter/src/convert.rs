//! Capture-to-trace conversion entry points

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::ConverterConfig;
use crate::dmtrace::error::{ConvertError, ConvertWarning, Result};
use crate::dmtrace::parser::RecordParser;
use crate::dmtrace::scanner::{scan_file, Scanner};
use crate::tptp::adapter::TraceAdapter;
use crate::tptp::sink::TraceSink;
use crate::tptp::xml::XmlTraceWriter;

const SOURCE_EXTENSION: &str = "trace";
const DEST_EXTENSION: &str = "trcxml";

/// What a finished conversion saw.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionSummary {
    pub bytes_read: u64,
    pub threads: usize,
    pub classes: usize,
    pub methods: usize,
    pub action_records: u64,
    pub method_entries: u64,
    pub method_exits: u64,
    pub dropped_exits: u64,
    pub warnings: Vec<ConvertWarning>,
}

impl ConversionSummary {
    fn collect<S: TraceSink>(adapter: &TraceAdapter<S>, bytes_read: u64) -> Self {
        let stats = adapter.stats();
        Self {
            bytes_read,
            threads: adapter.thread_count(),
            classes: adapter.class_count(),
            methods: adapter.method_count(),
            action_records: stats.action_records,
            method_entries: stats.method_entries,
            method_exits: stats.method_exits,
            dropped_exits: stats.dropped_exits,
            warnings: adapter.warnings().to_vec(),
        }
    }

    pub fn log(&self) {
        info!(
            bytes = self.bytes_read,
            threads = self.threads,
            classes = self.classes,
            methods = self.methods,
            records = self.action_records,
            entries = self.method_entries,
            exits = self.method_exits,
            "conversion finished"
        );
        if !self.warnings.is_empty() {
            warn!(count = self.warnings.len(), "conversion finished with warnings");
        }
    }
}

/// Derives `<name>.trcxml` from a capture path, replacing a `.trace`
/// extension when there is one.
pub fn default_destination(source: &Path) -> PathBuf {
    let is_trace = source
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(SOURCE_EXTENSION));
    if is_trace {
        return source.with_extension(DEST_EXTENSION);
    }

    let mut dest = OsString::from(source.as_os_str());
    dest.push(".");
    dest.push(DEST_EXTENSION);
    PathBuf::from(dest)
}

/// Converts a capture read from `reader` into events on `sink`.
pub fn convert_reader<R: BufRead, S: TraceSink>(
    reader: R,
    sink: S,
    config: &ConverterConfig,
) -> Result<(ConversionSummary, S)> {
    let mut parser = RecordParser::new(TraceAdapter::new(sink, config));
    let mut scanner = Scanner::new(reader);
    scanner.run(&mut parser)?;

    let adapter = parser.into_adapter();
    let summary = ConversionSummary::collect(&adapter, scanner.bytes_consumed());
    Ok((summary, adapter.into_sink()))
}

/// Converts the capture at `source` into a TPTP XML file at `dest`.
///
/// A destination left over from a failed conversion is removed.
pub fn convert_file(
    source: &Path,
    dest: &Path,
    config: &ConverterConfig,
) -> Result<ConversionSummary> {
    ensure_distinct(source, dest)?;

    let output = File::create(dest).map_err(|e| ConvertError::io(dest, e))?;
    info!(source = %source.display(), dest = %dest.display(), "converting");

    let result = write_trace(source, dest, output, config);
    if result.is_err() {
        if let Err(e) = fs::remove_file(dest) {
            warn!(dest = %dest.display(), error = %e, "failed to remove partial output");
        }
    }
    result
}

/// Refuses a destination that resolves to the source capture, which
/// `File::create` would truncate before it is read.
fn ensure_distinct(source: &Path, dest: &Path) -> Result<()> {
    let source_path = fs::canonicalize(source).map_err(|e| ConvertError::io(source, e))?;
    let Ok(dest_path) = fs::canonicalize(dest) else {
        return Ok(());
    };
    if source_path == dest_path {
        return Err(ConvertError::IllegalState(format!(
            "destination {} is the source capture",
            dest.display()
        )));
    }
    Ok(())
}

fn write_trace(
    source: &Path,
    dest: &Path,
    output: File,
    config: &ConverterConfig,
) -> Result<ConversionSummary> {
    let writer = XmlTraceWriter::new(BufWriter::new(output));
    let mut parser = RecordParser::new(TraceAdapter::new(writer, config));
    let bytes_read = scan_file(source, &mut parser)?;

    let adapter = parser.into_adapter();
    let summary = ConversionSummary::collect(&adapter, bytes_read);
    let mut out = adapter.into_sink().into_inner();
    out.flush().map_err(|e| ConvertError::io(dest, e))?;
    Ok(summary)
}
