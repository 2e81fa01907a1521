//! Run state and step records
//!
//! A `RunState` is the client-side view of one server-side run: its status,
//! when we started watching it, when it ended, and the ordered step log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Envelope status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Error,
}

impl RunStatus {
    /// Returns true once no further polling should occur
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Error)
    }

    /// Parse a wire status; unknown values are `None`
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "running" => Some(RunStatus::Running),
            "completed" => Some(RunStatus::Completed),
            "error" => Some(RunStatus::Error),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a single reported step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Running,
    Success,
    Error,
}

impl StepStatus {
    /// Parse a wire status, coercing anything unrecognized to `Running`
    pub fn from_wire(s: &str) -> Self {
        match s {
            "success" => StepStatus::Success,
            "error" => StepStatus::Error,
            _ => StepStatus::Running,
        }
    }
}

/// One reported unit of work. Immutable once appended to a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepEvent {
    pub time: String,
    pub name: String,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
}

impl StepEvent {
    pub fn new(name: impl Into<String>, status: StepStatus) -> Self {
        Self {
            time: Utc::now().to_rfc3339(),
            name: name.into(),
            status,
            message: None,
            request: None,
            response: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_request(mut self, request: Value) -> Self {
        self.request = Some(request);
        self
    }

    pub fn with_response(mut self, response: Value) -> Self {
        self.response = Some(response);
        self
    }

    /// Normalize one raw wire event. Never fails; missing fields default.
    pub fn from_wire(raw: &Value) -> Self {
        let text = |key: &str| raw.get(key).and_then(Value::as_str).map(str::to_string);
        let payload = |key: &str| raw.get(key).filter(|v| !v.is_null()).cloned();

        Self {
            time: text("time").unwrap_or_default(),
            name: text("name").unwrap_or_default(),
            status: StepStatus::from_wire(raw.get("status").and_then(Value::as_str).unwrap_or("")),
            message: text("message"),
            request: payload("request"),
            response: payload("response"),
        }
    }
}

/// Accumulated view of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunState {
    pub status: RunStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub steps: Vec<StepEvent>,
    #[serde(default)]
    pub cursor: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RunState {
    /// Fresh state for a newly accepted run identifier
    pub fn new() -> Self {
        Self::started_at(Utc::now())
    }

    pub fn started_at(start_time: DateTime<Utc>) -> Self {
        Self {
            status: RunStatus::Running,
            start_time,
            end_time: None,
            steps: Vec::new(),
            cursor: 0,
            result: None,
            params: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn last_step(&self) -> Option<&StepEvent> {
        self.steps.last()
    }

    /// Wall-clock duration of the run, if it has ended
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.end_time.map(|end| end - self.start_time)
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}
