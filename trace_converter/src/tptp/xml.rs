//! TPTP XML trace writer
//!
//! One element per line, attributes in the order the desktop tool emits them.

use std::borrow::Cow;
use std::io::Write;

use super::sink::{Timestamp, TraceSink};
use crate::dmtrace::error::Result;

/// Escapes the five XML special characters for use inside attribute values.
pub fn escape_attr(value: &str) -> Cow<'_, str> {
    if !value.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(value);
    }

    let mut escaped = String::with_capacity(value.len() + 8);
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    Cow::Owned(escaped)
}

pub struct XmlTraceWriter<W: Write> {
    out: W,
}

impl<W: Write> XmlTraceWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> TraceSink for XmlTraceWriter<W> {
    fn start(&mut self) -> Result<()> {
        writeln!(self.out, r#"<?xml version="1.0" encoding="utf-8"?>"#)?;
        writeln!(self.out, "<TRACE>")?;
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        writeln!(self.out, "</TRACE>")?;
        self.flush()
    }

    fn node(
        &mut self,
        node_id: &str,
        hostname: &str,
        ip: &str,
        timezone: i32,
        time: Timestamp,
    ) -> Result<()> {
        writeln!(
            self.out,
            r#"<node nodeId="{}" hostname="{}" ipaddress="{}" timezone="{timezone}" time="{time}"/>"#,
            escape_attr(node_id),
            escape_attr(hostname),
            escape_attr(ip),
        )?;
        Ok(())
    }

    fn process_create(
        &mut self,
        process_id: &str,
        pid: u32,
        node_id_ref: &str,
        time: Timestamp,
    ) -> Result<()> {
        writeln!(
            self.out,
            r#"<processCreate processId="{}" pid="{pid}" nodeIdRef="{}" time="{time}"/>"#,
            escape_attr(process_id),
            escape_attr(node_id_ref),
        )?;
        Ok(())
    }

    fn agent_create(
        &mut self,
        agent_id: &str,
        version: &str,
        process_id_ref: &str,
        agent_name: &str,
        agent_type: &str,
        agent_parameters: &str,
        time: Timestamp,
    ) -> Result<()> {
        writeln!(
            self.out,
            r#"<agentCreate agentId="{}" version="{}" processIdRef="{}" agentName="{}" agentType="{}" agentParameters="{}" time="{time}"/>"#,
            escape_attr(agent_id),
            escape_attr(version),
            escape_attr(process_id_ref),
            escape_attr(agent_name),
            escape_attr(agent_type),
            escape_attr(agent_parameters),
        )?;
        Ok(())
    }

    fn agent_destroy(&mut self, agent_id_ref: &str, time: Timestamp) -> Result<()> {
        writeln!(
            self.out,
            r#"<agentDestroy agentIdRef="{}" time="{time}"/>"#,
            escape_attr(agent_id_ref),
        )?;
        Ok(())
    }

    fn trace_start(&mut self, trace_id: &str, agent_id_ref: &str, time: Timestamp) -> Result<()> {
        writeln!(
            self.out,
            r#"<traceStart traceId="{}" agentIdRef="{}" time="{time}"/>"#,
            escape_attr(trace_id),
            escape_attr(agent_id_ref),
        )?;
        Ok(())
    }

    fn trace_end(&mut self, time: Timestamp) -> Result<()> {
        writeln!(self.out, r#"<traceEnd time="{time}"/>"#)?;
        Ok(())
    }

    fn option(&mut self, key: &str, value: &str) -> Result<()> {
        writeln!(
            self.out,
            r#"<option key="{}" value="{}"/>"#,
            escape_attr(key),
            escape_attr(value),
        )?;
        Ok(())
    }

    fn thread_start(
        &mut self,
        thread_id: u32,
        time: Timestamp,
        name: &str,
        group: Option<&str>,
        parent: Option<&str>,
    ) -> Result<()> {
        write!(
            self.out,
            r#"<threadStart threadId="{thread_id}" time="{time}" threadName="{}""#,
            escape_attr(name),
        )?;
        if let Some(group) = group {
            write!(self.out, r#" groupName="{}""#, escape_attr(group))?;
        }
        if let Some(parent) = parent {
            write!(self.out, r#" parentName="{}""#, escape_attr(parent))?;
        }
        writeln!(self.out, "/>")?;
        Ok(())
    }

    fn thread_end(&mut self, thread_id: u32, time: Timestamp) -> Result<()> {
        writeln!(
            self.out,
            r#"<threadEnd threadIdRef="{thread_id}" time="{time}"/>"#
        )?;
        Ok(())
    }

    fn class_def(
        &mut self,
        class_id: u32,
        name: &str,
        source_name: Option<&str>,
        time: Timestamp,
    ) -> Result<()> {
        write!(self.out, r#"<classDef name="{}""#, escape_attr(name))?;
        if let Some(source) = source_name {
            write!(self.out, r#" sourceName="{}""#, escape_attr(source))?;
        }
        writeln!(self.out, r#" classId="{class_id}" time="{time}"/>"#)?;
        Ok(())
    }

    fn method_def(
        &mut self,
        method_id: u32,
        name: &str,
        signature: &str,
        start_line: Option<u32>,
        end_line: Option<u32>,
        class_id: u32,
    ) -> Result<()> {
        write!(
            self.out,
            r#"<methodDef name="{}" signature="{}""#,
            escape_attr(name),
            escape_attr(signature),
        )?;
        if let Some(line) = start_line {
            write!(self.out, r#" startLineNumber="{line}""#)?;
        }
        if let Some(line) = end_line {
            write!(self.out, r#" endLineNumber="{line}""#)?;
        }
        writeln!(
            self.out,
            r#" methodId="{method_id}" classIdRef="{class_id}"/>"#
        )?;
        Ok(())
    }

    fn method_entry(
        &mut self,
        thread_id: u32,
        class_id: u32,
        method_id: u32,
        time: Timestamp,
        ticket: Option<u32>,
        stack_depth: Option<u32>,
    ) -> Result<()> {
        write!(
            self.out,
            r#"<methodEntry threadIdRef="{thread_id}" time="{time}" methodIdRef="{method_id}" classIdRef="{class_id}""#
        )?;
        if let Some(ticket) = ticket {
            write!(self.out, r#" ticket="{ticket}""#)?;
        }
        if let Some(depth) = stack_depth {
            write!(self.out, r#" stackDepth="{depth}""#)?;
        }
        writeln!(self.out, "/>")?;
        Ok(())
    }

    fn method_exit(
        &mut self,
        thread_id: u32,
        class_id: u32,
        method_id: u32,
        time: Timestamp,
        ticket: Option<u32>,
    ) -> Result<()> {
        write!(
            self.out,
            r#"<methodExit threadIdRef="{thread_id}" methodIdRef="{method_id}" classIdRef="{class_id}""#
        )?;
        if let Some(ticket) = ticket {
            write!(self.out, r#" ticket="{ticket}""#)?;
        }
        writeln!(self.out, r#" time="{time}"/>"#)?;
        Ok(())
    }
}
