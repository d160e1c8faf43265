//! Mutable state threaded through one run

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::constants::log_format::EXEC_PREFIX;
use crate::log_sink::LogSink;

/// Value bound to a workflow variable
///
/// Nodes only ever store strings today; the other variants exist so a
/// variable read can fail on type rather than on a runtime cast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableValue {
    String(String),
    Number(f64),
    Bool(bool),
}

impl VariableValue {
    /// The string payload, if this is a string value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            VariableValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for VariableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableValue::String(s) => f.write_str(s),
            VariableValue::Number(n) => write!(f, "{n}"),
            VariableValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<String> for VariableValue {
    fn from(value: String) -> Self {
        VariableValue::String(value)
    }
}

impl From<&str> for VariableValue {
    fn from(value: &str) -> Self {
        VariableValue::String(value.to_string())
    }
}

/// Variables, last HTTP response and execution log for one run
///
/// A fresh context is created for every Execute action and dropped after it.
#[derive(Debug, Default)]
pub struct ExecutionContext {
    variables: HashMap<String, VariableValue>,
    last_response_body: String,
    last_status_code: u16,
    execution_log: String,
    sink: Option<Arc<LogSink>>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context that mirrors its log lines into a shared sink
    pub fn with_sink(sink: Arc<LogSink>) -> Self {
        Self {
            sink: Some(sink),
            ..Self::default()
        }
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<VariableValue>) {
        self.variables.insert(name.into(), value.into());
    }

    /// Look up a variable. `None` when it was never set.
    pub fn get_variable(&self, name: &str) -> Option<&VariableValue> {
        self.variables.get(name)
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn variables(&self) -> &HashMap<String, VariableValue> {
        &self.variables
    }

    /// Append a line to the execution log and mirror it to the sink
    pub fn log(&mut self, message: impl AsRef<str>) {
        let message = message.as_ref();
        self.execution_log.push_str(message);
        self.execution_log.push('\n');

        if let Some(sink) = &self.sink {
            sink.append(format!("{EXEC_PREFIX}{message}"));
        }
        log::info!("{}", message);
    }

    /// Full execution log, one line per entry
    pub fn execution_log(&self) -> &str {
        &self.execution_log
    }

    pub fn log_lines(&self) -> impl Iterator<Item = &str> {
        self.execution_log.lines()
    }

    pub fn last_response_body(&self) -> &str {
        &self.last_response_body
    }

    pub fn last_status_code(&self) -> u16 {
        self.last_status_code
    }

    pub fn set_last_response(&mut self, body: impl Into<String>, status_code: u16) {
        self.last_response_body = body.into();
        self.last_status_code = status_code;
    }

    pub(crate) fn set_last_response_body(&mut self, body: impl Into<String>) {
        self.last_response_body = body.into();
    }

    /// Reset everything except the sink
    pub fn clear(&mut self) {
        self.variables.clear();
        self.last_response_body.clear();
        self.last_status_code = 0;
        self.execution_log.clear();
    }
}
