//! Synthetic capture fixtures shared by the integration tests.
#![allow(dead_code)]

use trace_converter::dmtrace::HEADER_MAGIC;

pub const ENTRY: u32 = 0;
pub const EXIT: u32 = 1;
pub const EXIT_EXCEPTION: u32 = 2;

/// Builds the text section of a capture.
pub fn text_section(threads: &[(u32, &str)], methods: &[(u32, &str, &str, &str)]) -> String {
    let mut text = String::from("*version\n3\ndata-file-overflow=false\nclock=wall\n*threads\n");
    for (id, name) in threads {
        text.push_str(&format!("{id}\t{name}\n"));
    }
    text.push_str("*methods\n");
    for (address, class, method, signature) in methods {
        text.push_str(&format!("0x{address:08x}\t{class}\t{method}\t{signature}\n"));
    }
    text.push_str("*end\n");
    text
}

pub fn header(version: u16, offset: u16, start_time_usec: u64) -> Vec<u8> {
    let mut data = Vec::with_capacity(usize::from(offset));
    data.extend_from_slice(&HEADER_MAGIC.to_le_bytes());
    data.extend_from_slice(&version.to_le_bytes());
    data.extend_from_slice(&offset.to_le_bytes());
    data.extend_from_slice(&start_time_usec.to_le_bytes());
    data
}

pub fn record(thread: u16, address: u32, action: u32, delta_usec: u32) -> Vec<u8> {
    let mut data = Vec::with_capacity(10);
    data.extend_from_slice(&thread.to_le_bytes());
    data.extend_from_slice(&(address | action).to_le_bytes());
    data.extend_from_slice(&delta_usec.to_le_bytes());
    data
}

/// Text section, a 16-byte header starting at `start_time_usec`, then records.
pub fn capture(text: &str, start_time_usec: u64, records: &[Vec<u8>]) -> Vec<u8> {
    let mut data = text.as_bytes().to_vec();
    data.extend_from_slice(&header(3, 16, start_time_usec));
    for record in records {
        data.extend_from_slice(record);
    }
    data
}
