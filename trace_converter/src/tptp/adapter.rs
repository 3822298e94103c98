//! Adapts capture records to TPTP trace events
//!
//! Interns classes and methods into dense ids, tracks one call stack per
//! thread, resolves relative deltas against the capture start time, and emits
//! each definition exactly once, right before its first reference.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use super::items::{ClassEntry, MethodEntry, ThreadEntry};
use super::sink::{Timestamp, TraceSink};
use crate::config::{ConverterConfig, PreambleConfig, TRACE_OPTIONS};
use crate::dmtrace::error::{ConvertError, ConvertWarning, Result};
use crate::dmtrace::types::MethodAction;

static METHOD_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_$]+$").expect("method name pattern"));

/// Counters reported once the conversion is over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdapterStats {
    pub action_records: u64,
    pub method_entries: u64,
    pub method_exits: u64,
    pub dropped_exits: u64,
}

pub struct TraceAdapter<S> {
    sink: S,
    preamble: PreambleConfig,
    start_time_usec: Option<u64>,
    last_time_usec: u64,
    finished: bool,
    threads: HashMap<u32, ThreadEntry>,
    // classes[id - 1]
    classes: Vec<ClassEntry>,
    class_ids: HashMap<String, u32>,
    methods: HashMap<u32, MethodEntry>,
    next_method_id: u32,
    warnings: Vec<ConvertWarning>,
    stats: AdapterStats,
}

/// Rewrites `java/lang/String` into `java.lang.String`.
pub fn normalize_class_name(name: &str) -> String {
    name.replace('/', ".")
}

/// Rewrites constructor names into tokens the target tool accepts and rejects
/// anything else that is not a plain identifier.
pub fn normalize_method_name(name: &str) -> Result<String> {
    match name {
        "<init>" => Ok("-init-".to_string()),
        "<clinit>" => Ok("-clinit-".to_string()),
        other if METHOD_NAME.is_match(other) => Ok(other.to_string()),
        other => Err(ConvertError::InvalidMethodName(other.to_string())),
    }
}

impl<S: TraceSink> TraceAdapter<S> {
    pub fn new(sink: S, config: &ConverterConfig) -> Self {
        Self {
            sink,
            preamble: config.preamble.clone(),
            start_time_usec: None,
            last_time_usec: 0,
            finished: false,
            threads: HashMap::new(),
            classes: Vec::new(),
            class_ids: HashMap::new(),
            methods: HashMap::new(),
            next_method_id: 1,
            warnings: Vec::new(),
            stats: AdapterStats::default(),
        }
    }

    pub fn record_format_version(&mut self, version: u32) {
        info!(version, "key file version");
    }

    /// Registers a thread. The first registration of an id wins.
    pub fn register_thread(&mut self, thread_id: u32, name: &str) {
        if self.threads.contains_key(&thread_id) {
            self.warn(ConvertWarning::DuplicateThread {
                thread_id,
                name: name.to_string(),
            });
            return;
        }

        debug!(thread_id, name, "add thread");
        self.threads
            .insert(thread_id, ThreadEntry::new(thread_id, name));
    }

    /// Registers a method and interns its class.
    ///
    /// Registering an address again replaces the method's metadata but keeps
    /// the id it was given the first time.
    pub fn register_method(
        &mut self,
        address: u32,
        class_name: &str,
        method_name: &str,
        signature: &str,
        source_file: Option<&str>,
        source_line: Option<u32>,
    ) -> Result<()> {
        let method_name = normalize_method_name(method_name)?;
        let class_id = self.intern_class(class_name, source_file);

        match self.methods.get_mut(&address) {
            Some(existing) => {
                debug!(address, method = %method_name, "method re-registered");
                existing.name = method_name;
                existing.signature = signature.to_string();
                existing.class_id = class_id;
                existing.source_line = source_line;
            }
            None => {
                let id = self.next_method_id;
                self.next_method_id += 1;
                self.methods.insert(
                    address,
                    MethodEntry {
                        id,
                        address,
                        name: method_name,
                        signature: signature.to_string(),
                        class_id,
                        source_line,
                        defined: false,
                    },
                );
            }
        }

        Ok(())
    }

    fn intern_class(&mut self, class_name: &str, source_file: Option<&str>) -> u32 {
        let name = normalize_class_name(class_name);
        let id = match self.class_ids.get(&name) {
            Some(&id) => id,
            None => {
                let id = self.classes.len() as u32 + 1;
                debug!(class_id = id, class = %name, "add class");
                self.classes.push(ClassEntry::new(id, name.clone()));
                self.class_ids.insert(name, id);
                id
            }
        };

        let class = &mut self.classes[id as usize - 1];
        if class.source_name.is_none() {
            class.source_name = source_file.map(str::to_string);
        }
        id
    }

    /// Establishes the time epoch and emits the trace preamble.
    pub fn record_capture_header(
        &mut self,
        version: u16,
        offset: u16,
        start_time_usec: u64,
    ) -> Result<()> {
        if self.start_time_usec.is_some() {
            return Err(ConvertError::DuplicateHeader);
        }

        info!(
            version,
            offset,
            start_time_usec,
            threads = self.threads.len(),
            classes = self.classes.len(),
            methods = self.methods.len(),
            "data file header"
        );
        self.start_time_usec = Some(start_time_usec);
        self.last_time_usec = start_time_usec;

        let time = Timestamp::from_micros(start_time_usec);
        let p = &self.preamble;
        self.sink.start()?;
        self.sink
            .node(&p.node_id, &p.hostname, &p.ip_address, p.timezone, time)?;
        self.sink
            .process_create(&p.process_id, p.pid, &p.node_id, time)?;
        self.sink.agent_create(
            &p.agent_id,
            &p.agent_version,
            &p.process_id,
            &p.agent_name,
            &p.agent_type,
            &p.agent_parameters,
            time,
        )?;
        self.sink.trace_start(&p.trace_id, &p.agent_id, time)?;

        for (key, value) in TRACE_OPTIONS {
            self.sink.option(key, value)?;
        }
        Ok(())
    }

    /// Applies one method action to the owning thread's call stack.
    pub fn record_action(
        &mut self,
        thread_id: u32,
        method_address: u32,
        action: MethodAction,
        delta_time_usec: u32,
    ) -> Result<()> {
        let start = self.start_time_usec.ok_or_else(|| {
            ConvertError::IllegalState("method action before capture header".into())
        })?;
        if action == MethodAction::Reserved {
            return Err(ConvertError::ReservedAction {
                thread_id,
                method_address,
            });
        }

        let time_usec = start.checked_add(u64::from(delta_time_usec)).ok_or_else(|| {
            ConvertError::malformed_record(format!(
                "start time {start} plus delta {delta_time_usec} overflows"
            ))
        })?;
        self.last_time_usec = time_usec;
        self.stats.action_records += 1;
        let time = Timestamp::from_micros(time_usec);

        let thread = self
            .threads
            .get_mut(&thread_id)
            .ok_or(ConvertError::ThreadNotFound(thread_id))?;
        if !thread.started {
            self.sink
                .thread_start(thread_id, time, &thread.name, None, None)?;
            thread.started = true;
        }

        let method = self
            .methods
            .get_mut(&method_address)
            .ok_or(ConvertError::MethodNotFound(method_address))?;
        let class = method
            .class_id
            .checked_sub(1)
            .and_then(|index| self.classes.get_mut(index as usize))
            .ok_or(ConvertError::ClassNotFound(method.class_id))?;

        if !class.defined {
            self.sink
                .class_def(class.id, &class.name, class.source_name.as_deref(), time)?;
            class.defined = true;
        }
        if !method.defined {
            self.sink.method_def(
                method.id,
                &method.name,
                &method.signature,
                method.source_line,
                None,
                method.class_id,
            )?;
            method.defined = true;
        }

        match action {
            MethodAction::Entry => {
                let frame = thread.push_call(method.id);
                self.sink.method_entry(
                    thread_id,
                    class.id,
                    method.id,
                    time,
                    Some(frame.ticket),
                    Some(thread.depth() as u32),
                )?;
                self.stats.method_entries += 1;
            }
            MethodAction::Exit | MethodAction::ExitException => {
                let Some(&frame) = thread.current_call() else {
                    let warning = ConvertWarning::StackUnderflow {
                        thread_id,
                        method: method.name.clone(),
                    };
                    self.stats.dropped_exits += 1;
                    self.warn(warning);
                    return Ok(());
                };

                if frame.method_id != method.id {
                    debug!(
                        thread_id,
                        expected = frame.method_id,
                        actual = method.id,
                        "exit does not match the active call"
                    );
                }
                self.sink
                    .method_exit(thread_id, class.id, method.id, time, Some(frame.ticket))?;
                thread.pop_call();
                self.stats.method_exits += 1;
            }
            MethodAction::Reserved => unreachable!("rejected above"),
        }
        Ok(())
    }

    /// Emits the closing events stamped with the last observed time.
    pub fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Err(ConvertError::IllegalState("trace already finished".into()));
        }
        if self.start_time_usec.is_none() {
            return Err(ConvertError::IllegalState(
                "finish before capture header".into(),
            ));
        }
        self.finished = true;

        let time = Timestamp::from_micros(self.last_time_usec);
        self.sink.trace_end(time)?;
        self.sink.agent_destroy(&self.preamble.agent_id, time)?;
        self.sink.end()
    }

    fn warn(&mut self, warning: ConvertWarning) {
        warn!("{warning}");
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[ConvertWarning] {
        &self.warnings
    }

    pub fn stats(&self) -> AdapterStats {
        self.stats
    }

    pub fn thread(&self, thread_id: u32) -> Option<&ThreadEntry> {
        self.threads.get(&thread_id)
    }

    pub fn class(&self, class_id: u32) -> Option<&ClassEntry> {
        class_id
            .checked_sub(1)
            .and_then(|index| self.classes.get(index as usize))
    }

    pub fn method(&self, address: u32) -> Option<&MethodEntry> {
        self.methods.get(&address)
    }

    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}
