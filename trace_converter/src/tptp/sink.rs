//! Event sink abstraction
//!
//! The adapter resolves every event fully (ids, tickets, absolute times) and
//! hands it to a [`TraceSink`]. The sink owns formatting and the write target.

use std::fmt;

use crate::dmtrace::error::Result;

/// Absolute UTC time split into whole seconds and nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct Timestamp {
    pub sec: u64,
    pub nsec: u32,
}

impl Timestamp {
    pub const fn from_micros(usec: u64) -> Self {
        Timestamp {
            sec: usec / 1_000_000,
            nsec: ((usec % 1_000_000) * 1_000) as u32,
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.sec, self.nsec)
    }
}

/// Receiver of resolved trace events, one operation per event kind.
pub trait TraceSink {
    fn start(&mut self) -> Result<()>;

    fn end(&mut self) -> Result<()>;

    fn node(
        &mut self,
        node_id: &str,
        hostname: &str,
        ip: &str,
        timezone: i32,
        time: Timestamp,
    ) -> Result<()>;

    fn process_create(
        &mut self,
        process_id: &str,
        pid: u32,
        node_id_ref: &str,
        time: Timestamp,
    ) -> Result<()>;

    #[allow(clippy::too_many_arguments)]
    fn agent_create(
        &mut self,
        agent_id: &str,
        version: &str,
        process_id_ref: &str,
        agent_name: &str,
        agent_type: &str,
        agent_parameters: &str,
        time: Timestamp,
    ) -> Result<()>;

    fn agent_destroy(&mut self, agent_id_ref: &str, time: Timestamp) -> Result<()>;

    fn trace_start(&mut self, trace_id: &str, agent_id_ref: &str, time: Timestamp) -> Result<()>;

    fn trace_end(&mut self, time: Timestamp) -> Result<()>;

    fn option(&mut self, key: &str, value: &str) -> Result<()>;

    fn thread_start(
        &mut self,
        thread_id: u32,
        time: Timestamp,
        name: &str,
        group: Option<&str>,
        parent: Option<&str>,
    ) -> Result<()>;

    fn thread_end(&mut self, thread_id: u32, time: Timestamp) -> Result<()>;

    fn class_def(
        &mut self,
        class_id: u32,
        name: &str,
        source_name: Option<&str>,
        time: Timestamp,
    ) -> Result<()>;

    fn method_def(
        &mut self,
        method_id: u32,
        name: &str,
        signature: &str,
        start_line: Option<u32>,
        end_line: Option<u32>,
        class_id: u32,
    ) -> Result<()>;

    fn method_entry(
        &mut self,
        thread_id: u32,
        class_id: u32,
        method_id: u32,
        time: Timestamp,
        ticket: Option<u32>,
        stack_depth: Option<u32>,
    ) -> Result<()>;

    fn method_exit(
        &mut self,
        thread_id: u32,
        class_id: u32,
        method_id: u32,
        time: Timestamp,
        ticket: Option<u32>,
    ) -> Result<()>;
}

/// Owned copy of one sink call, as captured by [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    Start,
    End,
    Node {
        node_id: String,
        hostname: String,
        ip: String,
        timezone: i32,
        time: Timestamp,
    },
    ProcessCreate {
        process_id: String,
        pid: u32,
        node_id_ref: String,
        time: Timestamp,
    },
    AgentCreate {
        agent_id: String,
        version: String,
        process_id_ref: String,
        agent_name: String,
        agent_type: String,
        agent_parameters: String,
        time: Timestamp,
    },
    AgentDestroy {
        agent_id_ref: String,
        time: Timestamp,
    },
    TraceStart {
        trace_id: String,
        agent_id_ref: String,
        time: Timestamp,
    },
    TraceEnd {
        time: Timestamp,
    },
    Option {
        key: String,
        value: String,
    },
    ThreadStart {
        thread_id: u32,
        time: Timestamp,
        name: String,
        group: Option<String>,
        parent: Option<String>,
    },
    ThreadEnd {
        thread_id: u32,
        time: Timestamp,
    },
    ClassDef {
        class_id: u32,
        name: String,
        source_name: Option<String>,
        time: Timestamp,
    },
    MethodDef {
        method_id: u32,
        name: String,
        signature: String,
        start_line: Option<u32>,
        end_line: Option<u32>,
        class_id: u32,
    },
    MethodEntry {
        thread_id: u32,
        class_id: u32,
        method_id: u32,
        time: Timestamp,
        ticket: Option<u32>,
        stack_depth: Option<u32>,
    },
    MethodExit {
        thread_id: u32,
        class_id: u32,
        method_id: u32,
        time: Timestamp,
        ticket: Option<u32>,
    },
}

/// In-memory sink that records every call in order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Vec<TraceEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<TraceEvent> {
        self.events
    }

    fn push(&mut self, event: TraceEvent) -> Result<()> {
        self.events.push(event);
        Ok(())
    }
}

impl TraceSink for RecordingSink {
    fn start(&mut self) -> Result<()> {
        self.push(TraceEvent::Start)
    }

    fn end(&mut self) -> Result<()> {
        self.push(TraceEvent::End)
    }

    fn node(
        &mut self,
        node_id: &str,
        hostname: &str,
        ip: &str,
        timezone: i32,
        time: Timestamp,
    ) -> Result<()> {
        self.push(TraceEvent::Node {
            node_id: node_id.to_string(),
            hostname: hostname.to_string(),
            ip: ip.to_string(),
            timezone,
            time,
        })
    }

    fn process_create(
        &mut self,
        process_id: &str,
        pid: u32,
        node_id_ref: &str,
        time: Timestamp,
    ) -> Result<()> {
        self.push(TraceEvent::ProcessCreate {
            process_id: process_id.to_string(),
            pid,
            node_id_ref: node_id_ref.to_string(),
            time,
        })
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
        self.push(TraceEvent::AgentCreate {
            agent_id: agent_id.to_string(),
            version: version.to_string(),
            process_id_ref: process_id_ref.to_string(),
            agent_name: agent_name.to_string(),
            agent_type: agent_type.to_string(),
            agent_parameters: agent_parameters.to_string(),
            time,
        })
    }

    fn agent_destroy(&mut self, agent_id_ref: &str, time: Timestamp) -> Result<()> {
        self.push(TraceEvent::AgentDestroy {
            agent_id_ref: agent_id_ref.to_string(),
            time,
        })
    }

    fn trace_start(&mut self, trace_id: &str, agent_id_ref: &str, time: Timestamp) -> Result<()> {
        self.push(TraceEvent::TraceStart {
            trace_id: trace_id.to_string(),
            agent_id_ref: agent_id_ref.to_string(),
            time,
        })
    }

    fn trace_end(&mut self, time: Timestamp) -> Result<()> {
        self.push(TraceEvent::TraceEnd { time })
    }

    fn option(&mut self, key: &str, value: &str) -> Result<()> {
        self.push(TraceEvent::Option {
            key: key.to_string(),
            value: value.to_string(),
        })
    }

    fn thread_start(
        &mut self,
        thread_id: u32,
        time: Timestamp,
        name: &str,
        group: Option<&str>,
        parent: Option<&str>,
    ) -> Result<()> {
        self.push(TraceEvent::ThreadStart {
            thread_id,
            time,
            name: name.to_string(),
            group: group.map(str::to_string),
            parent: parent.map(str::to_string),
        })
    }

    fn thread_end(&mut self, thread_id: u32, time: Timestamp) -> Result<()> {
        self.push(TraceEvent::ThreadEnd { thread_id, time })
    }

    fn class_def(
        &mut self,
        class_id: u32,
        name: &str,
        source_name: Option<&str>,
        time: Timestamp,
    ) -> Result<()> {
        self.push(TraceEvent::ClassDef {
            class_id,
            name: name.to_string(),
            source_name: source_name.map(str::to_string),
            time,
        })
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
        self.push(TraceEvent::MethodDef {
            method_id,
            name: name.to_string(),
            signature: signature.to_string(),
            start_line,
            end_line,
            class_id,
        })
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
        self.push(TraceEvent::MethodEntry {
            thread_id,
            class_id,
            method_id,
            time,
            ticket,
            stack_depth,
        })
    }

    fn method_exit(
        &mut self,
        thread_id: u32,
        class_id: u32,
        method_id: u32,
        time: Timestamp,
        ticket: Option<u32>,
    ) -> Result<()> {
        self.push(TraceEvent::MethodExit {
            thread_id,
            class_id,
            method_id,
            time,
            ticket,
        })
    }
}
