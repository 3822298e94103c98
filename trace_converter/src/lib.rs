pub mod app;
pub mod config;
pub mod convert;
pub mod dmtrace;
pub mod tptp;

pub use config::{ConverterConfig, PreambleConfig};
pub use convert::{convert_file, convert_reader, default_destination, ConversionSummary};
pub use dmtrace::{ConvertError, ConvertWarning};
