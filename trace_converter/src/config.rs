//! Converter configuration
//!
//! The preamble identity values have no meaning inside the capture; the
//! desktop tool only needs them to be present and consistent.

/// Identity values written in the trace preamble.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreambleConfig {
    pub node_id: String,
    pub hostname: String,
    pub ip_address: String,
    /// Offset from UTC in minutes.
    pub timezone: i32,
    pub pid: u32,
    pub process_id: String,
    pub agent_id: String,
    pub agent_version: String,
    pub agent_name: String,
    pub agent_type: String,
    pub agent_parameters: String,
    pub trace_id: String,
}

impl Default for PreambleConfig {
    fn default() -> Self {
        Self {
            node_id: String::new(),
            hostname: "localhost".into(),
            ip_address: "127.0.0.1".into(),
            timezone: -480,
            pid: 3812,
            process_id: "b83695a9-0ba4-4061-b4ad-f59fcebf0e43".into(),
            agent_id: "e08d817f-869c-40b9-b2c5-6796929ee60c".into(),
            agent_version: "2.000".into(),
            agent_name: "org.eclipse.tptp.jvmti".into(),
            agent_type: "Profiler".into(),
            agent_parameters: "server=controlled".into(),
            trace_id: "6307309-4467-46c0-a44c-b513e3d652a7".into(),
        }
    }
}

/// Options the target tool expects right after `traceStart`, in order.
pub const TRACE_OPTIONS: &[(&str, &str)] = &[
    ("FILTERS", "false"),
    ("OPTIONS", "true"),
    ("TICKET", "true"),
    ("TIMESTAMPS", "true"),
    ("TRACE_IDREFS", "false"),
    ("CPU_TIME", "true"),
    ("org.eclipse.tptp.platform.jvmti.client.ATTR_EXEC_DATA", "true"),
    ("org.eclipse.tptp.platform.jvmti.client.ATTR_EXEC_FLOW", "true"),
    ("org.eclipse.tptp.platform.jvmti.client.ATTR_EXEC_AUTO_POLLING", "true"),
    ("org.eclipse.tptp.platform.jvmti.client.ATTR_EXEC_MANUAL_POLLING", "false"),
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConverterConfig {
    pub preamble: PreambleConfig,
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;

    #[test]
    fn test_preamble_config__default__then_uses_reference_identity() {
        let config = PreambleConfig::default();
        assert_eq!(config.hostname, "localhost");
        assert_eq!(config.ip_address, "127.0.0.1");
        assert_eq!(config.timezone, -480);
        assert_eq!(config.pid, 3812);
        assert_eq!(config.agent_name, "org.eclipse.tptp.jvmti");
        assert!(config.node_id.is_empty());
    }

    #[test]
    fn test_trace_options__then_ticket_and_timestamps_enabled() {
        assert_eq!(TRACE_OPTIONS.len(), 10);
        assert!(TRACE_OPTIONS.contains(&("TICKET", "true")));
        assert!(TRACE_OPTIONS.contains(&("TIMESTAMPS", "true")));
        assert_eq!(TRACE_OPTIONS[0], ("FILTERS", "false"));
    }
}
