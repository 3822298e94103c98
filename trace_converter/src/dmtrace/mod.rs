//! Android method-trace capture reader

pub mod error;
pub mod parser;
pub mod scanner;
pub mod types;

pub use error::{ConvertError, ConvertWarning, Result};
pub use parser::{ParserState, RecordParser};
pub use scanner::{scan_file, Scanner};
pub use types::{
    ActionRecord, HeaderRecord, MethodAction, RecordLayout, HEADER_MAGIC, HEADER_SIZE,
    SUPPORTED_VERSION,
};
