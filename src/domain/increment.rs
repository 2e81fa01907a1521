//! Normalized server increments
//!
//! Whatever the backend sends is converted here into a strict `Increment`.
//! Nothing past this boundary sees raw JSON except the opaque step payloads
//! and the `result`/`params` carry-through fields.

use chrono::{DateTime, Utc};
use log::warn;
use serde_json::Value;

use super::run::{RunStatus, StepEvent};

/// One unit of progress reported by the backend
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Increment {
    /// Envelope status, `None` when absent or unrecognized
    pub status: Option<RunStatus>,
    /// Next cursor, `None` when absent or not a non-negative integer
    pub next_cursor: Option<u64>,
    /// New events in server order
    pub events: Vec<StepEvent>,
    /// Server-reported end time
    pub end_time: Option<DateTime<Utc>>,
    pub result: Option<Value>,
    pub params: Option<Value>,
}

impl Increment {
    /// Normalize a long-poll events body: `{status, nextCursor, events[], endTime?}`
    pub fn from_wire(body: &Value) -> Self {
        let events = body
            .get("events")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(StepEvent::from_wire).collect())
            .unwrap_or_default();

        Self {
            status: parse_status(body),
            next_cursor: body.get("nextCursor").and_then(parse_cursor),
            events,
            end_time: parse_end_time(body),
            result: carried(body, "result"),
            params: carried(body, "params"),
        }
    }

    /// Normalize a snapshot body `{status, startTime?, endTime?, steps[], result?}`
    /// relative to how many steps the caller has already consumed.
    pub fn from_snapshot(body: &Value, cursor: u64) -> Self {
        let steps = body.get("steps").and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[]);
        let consumed = usize::try_from(cursor).unwrap_or(usize::MAX);
        let events = steps.iter().skip(consumed).map(StepEvent::from_wire).collect();

        Self {
            status: parse_status(body),
            next_cursor: Some(steps.len() as u64),
            events,
            end_time: parse_end_time(body),
            result: carried(body, "result"),
            params: carried(body, "params"),
        }
    }

    pub fn running(next_cursor: u64, events: Vec<StepEvent>) -> Self {
        Self {
            status: Some(RunStatus::Running),
            next_cursor: Some(next_cursor),
            events,
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: RunStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_end_time(mut self, end_time: DateTime<Utc>) -> Self {
        self.end_time = Some(end_time);
        self
    }

    /// True if the server explicitly says the run is over
    pub fn reports_terminal(&self) -> bool {
        self.status.is_some_and(|s| s.is_terminal()) || self.end_time.is_some()
    }
}

// Integral floats such as `2.0` count; fractions and negatives do not.
fn parse_cursor(raw: &Value) -> Option<u64> {
    if let Some(cursor) = raw.as_u64() {
        return Some(cursor);
    }
    raw.as_f64()
        .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
        .map(|f| f as u64)
}

fn parse_status(body: &Value) -> Option<RunStatus> {
    body.get("status").and_then(Value::as_str).and_then(RunStatus::from_wire)
}

fn carried(body: &Value, key: &str) -> Option<Value> {
    body.get(key).filter(|v| !v.is_null()).cloned()
}

// A present but unparseable endTime still ends the run; the detection time stands in.
fn parse_end_time(body: &Value) -> Option<DateTime<Utc>> {
    let raw = body.get("endTime")?;
    if raw.is_null() {
        return None;
    }
    let text = match raw.as_str() {
        Some(s) if s.trim().is_empty() => return None,
        Some(s) => s.to_string(),
        None => raw.to_string(),
    };
    match DateTime::parse_from_rfc3339(&text) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(e) => {
            warn!("Unparseable endTime {:?} ({}), using detection time", text, e);
            Some(Utc::now())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StepStatus;
    use serde_json::json;

    #[test]
    fn test_from_wire_full_body() {
        let body = json!({
            "runKey": "rk-1",
            "status": "running",
            "nextCursor": 2,
            "events": [
                {"seq": 1, "time": "t1", "name": "Token", "status": "success"},
                {"seq": 2, "time": "t2", "name": "Hash", "status": "pending"}
            ]
        });
        let inc = Increment::from_wire(&body);
        assert_eq!(inc.status, Some(RunStatus::Running));
        assert_eq!(inc.next_cursor, Some(2));
        assert_eq!(inc.events.len(), 2);
        assert_eq!(inc.events[1].status, StepStatus::Running);
        assert!(inc.end_time.is_none());
        assert!(!inc.reports_terminal());
    }

    #[test]
    fn test_from_wire_malformed_body_degrades() {
        let inc = Increment::from_wire(&json!({"status": "weird", "nextCursor": "7", "events": {}}));
        assert_eq!(inc.status, None);
        assert_eq!(inc.next_cursor, None);
        assert!(inc.events.is_empty());

        let inc = Increment::from_wire(&json!(null));
        assert_eq!(inc, Increment::default());
    }

    #[test]
    fn test_from_wire_negative_cursor_ignored() {
        let inc = Increment::from_wire(&json!({"nextCursor": -3}));
        assert_eq!(inc.next_cursor, None);
    }

    #[test]
    fn test_from_wire_integral_float_cursor() {
        let inc = Increment::from_wire(&json!({"nextCursor": 2.0}));
        assert_eq!(inc.next_cursor, Some(2));

        let inc = Increment::from_wire(&json!({"nextCursor": 2.5}));
        assert_eq!(inc.next_cursor, None);

        let inc = Increment::from_wire(&json!({"nextCursor": -1.0}));
        assert_eq!(inc.next_cursor, None);
    }

    #[test]
    fn test_from_wire_end_time() {
        let inc = Increment::from_wire(&json!({"endTime": "2025-03-01T12:00:00Z"}));
        let expected = DateTime::parse_from_rfc3339("2025-03-01T12:00:00Z").unwrap();
        assert_eq!(inc.end_time, Some(expected.with_timezone(&Utc)));
        assert!(inc.reports_terminal());

        assert!(Increment::from_wire(&json!({"endTime": null})).end_time.is_none());
        assert!(Increment::from_wire(&json!({"endTime": ""})).end_time.is_none());
    }

    #[test]
    fn test_from_wire_unparseable_end_time_is_still_terminal() {
        let inc = Increment::from_wire(&json!({"endTime": "yesterday"}));
        assert!(inc.end_time.is_some());
        assert!(inc.reports_terminal());
    }

    #[test]
    fn test_from_wire_carries_result_and_params() {
        let inc = Increment::from_wire(&json!({"result": {"ok": true}, "params": null}));
        assert_eq!(inc.result, Some(json!({"ok": true})));
        assert!(inc.params.is_none());
    }

    #[test]
    fn test_from_snapshot_skips_consumed_steps() {
        let body = json!({
            "status": "running",
            "steps": [
                {"name": "a", "status": "success"},
                {"name": "b", "status": "success"},
                {"name": "c", "status": "running"}
            ]
        });
        let inc = Increment::from_snapshot(&body, 2);
        assert_eq!(inc.next_cursor, Some(3));
        assert_eq!(inc.events.len(), 1);
        assert_eq!(inc.events[0].name, "c");
    }

    #[test]
    fn test_from_snapshot_shrunken_log() {
        let body = json!({"status": "completed", "steps": [{"name": "a"}]});
        let inc = Increment::from_snapshot(&body, 5);
        assert!(inc.events.is_empty());
        assert_eq!(inc.next_cursor, Some(1));
        assert!(inc.reports_terminal());
    }

    #[test]
    fn test_from_snapshot_missing_steps() {
        let inc = Increment::from_snapshot(&json!({"status": "running"}), 0);
        assert!(inc.events.is_empty());
        assert_eq!(inc.next_cursor, Some(0));
    }
}
