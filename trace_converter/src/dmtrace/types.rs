//! Fixed-layout decoders for the binary section of a method-trace capture.
//!
//! All multi-byte fields are little-endian.

use byteorder::{ByteOrder, LittleEndian};

use super::error::{ConvertError, Result};

/// "SLOW" read as a little-endian u32.
pub const HEADER_MAGIC: u32 = 0x574f_4c53;

/// Size of the binary header block.
pub const HEADER_SIZE: usize = 16;

/// The only capture format version understood by the converter.
pub const SUPPORTED_VERSION: u32 = 3;

/// The two low bits of the method word carry the action.
pub const METHOD_ACTION_MASK: u32 = 0x03;

/// Binary header - 16 bytes
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct HeaderRecord {
    pub magic: u32,            // 0x574f4c53 ('SLOW')
    pub version: u16,          // format version
    pub offset: u16,           // offset to the first action record
    pub start_time_usec: u64,  // gettimeofday() at capture start
}

impl HeaderRecord {
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() != HEADER_SIZE {
            return Err(ConvertError::malformed_record(format!(
                "header block must be {HEADER_SIZE} bytes, got {}",
                buf.len()
            )));
        }

        let magic = LittleEndian::read_u32(&buf[0..4]);
        if magic != HEADER_MAGIC {
            return Err(ConvertError::InvalidMagic {
                expected: HEADER_MAGIC,
                got: magic,
            });
        }

        Ok(HeaderRecord {
            magic,
            version: LittleEndian::read_u16(&buf[4..6]),
            offset: LittleEndian::read_u16(&buf[6..8]),
            start_time_usec: LittleEndian::read_u64(&buf[8..16]),
        })
    }

    /// Number of bytes between the end of the header and the first action record.
    pub fn padding_len(&self) -> Result<usize> {
        let offset = self.offset as usize;
        if offset < HEADER_SIZE {
            return Err(ConvertError::InvalidOffset(self.offset));
        }
        Ok(offset - HEADER_SIZE)
    }
}

/// Method action packed into the low bits of the method word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodAction {
    /// method entry
    Entry,
    /// method exit
    Exit,
    /// method "exited" when unrolled by exception handling
    ExitException,
    /// (reserved)
    Reserved,
}

impl TryFrom<u32> for MethodAction {
    type Error = ConvertError;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            0 => Ok(MethodAction::Entry),
            1 => Ok(MethodAction::Exit),
            2 => Ok(MethodAction::ExitException),
            3 => Ok(MethodAction::Reserved),
            other => Err(ConvertError::malformed_record(format!(
                "unknown method action {other}"
            ))),
        }
    }
}

impl std::fmt::Display for MethodAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MethodAction::Entry => write!(f, "ENTRY"),
            MethodAction::Exit => write!(f, "EXIT"),
            MethodAction::ExitException => write!(f, "EXIT_EXCEPTION"),
            MethodAction::Reserved => write!(f, "RESERVED"),
        }
    }
}

/// Byte layout of one action record, negotiated from the `clock` option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordLayout {
    /// u16 thread, u32 method|action, u32 delta
    #[default]
    SingleClock,
    /// u16 thread, u32 method|action, u32 thread-cpu delta, u32 wall delta
    DualClock,
}

impl RecordLayout {
    pub const fn size(self) -> usize {
        match self {
            RecordLayout::SingleClock => 10,
            RecordLayout::DualClock => 14,
        }
    }

    /// Maps the value of a `clock=` option line. `None` for unknown clocks.
    pub fn from_clock_option(value: &str) -> Option<Self> {
        match value {
            "wall" | "thread-cpu" => Some(RecordLayout::SingleClock),
            "dual" => Some(RecordLayout::DualClock),
            _ => None,
        }
    }
}

/// One decoded action record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionRecord {
    pub thread_id: u32,
    /// Method address with the action bits masked off.
    pub method_address: u32,
    pub action: MethodAction,
    /// Microseconds since capture start; the wall clock on dual-clock captures.
    pub delta_time_usec: u32,
}

impl ActionRecord {
    pub fn decode(layout: RecordLayout, buf: &[u8]) -> Result<Self> {
        if buf.len() != layout.size() {
            return Err(ConvertError::malformed_record(format!(
                "action record must be {} bytes, got {}",
                layout.size(),
                buf.len()
            )));
        }

        let thread_id = LittleEndian::read_u16(&buf[0..2]) as u32;
        let method_word = LittleEndian::read_u32(&buf[2..6]);
        let action = MethodAction::try_from(method_word & METHOD_ACTION_MASK)?;
        let method_address = method_word & !METHOD_ACTION_MASK;

        // Dual-clock records carry the thread-cpu delta at [6..10]; only the
        // wall delta is used.
        let delta_time_usec = match layout {
            RecordLayout::SingleClock => LittleEndian::read_u32(&buf[6..10]),
            RecordLayout::DualClock => LittleEndian::read_u32(&buf[10..14]),
        };

        Ok(ActionRecord {
            thread_id,
            method_address,
            action,
            delta_time_usec,
        })
    }
}
