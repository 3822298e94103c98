//! TPTP trace model and writers

pub mod adapter;
pub mod items;
pub mod sink;
pub mod xml;

pub use adapter::{normalize_class_name, normalize_method_name, AdapterStats, TraceAdapter};
pub use items::{CallFrame, ClassEntry, MethodEntry, ThreadEntry};
pub use sink::{RecordingSink, Timestamp, TraceEvent, TraceSink};
pub use xml::{escape_attr, XmlTraceWriter};
