//! Identifier extraction from step payloads.

use std::fmt;

use serde_json::Value;

use crate::domain::StepEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HighlightKey {
    Token,
    HashData,
    SessionId,
    PaymentId,
    OrderId,
}

impl HighlightKey {
    pub const ALL: [HighlightKey; 5] = [
        HighlightKey::Token,
        HighlightKey::HashData,
        HighlightKey::SessionId,
        HighlightKey::PaymentId,
        HighlightKey::OrderId,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HighlightKey::Token => "TOKEN",
            HighlightKey::HashData => "HASHDATA",
            HighlightKey::SessionId => "SESSIONID",
            HighlightKey::PaymentId => "PAYMENTID",
            HighlightKey::OrderId => "ORDERID",
        }
    }

    /// Candidate (side, field) lookups; the first non-null one is used.
    fn sources(&self) -> &'static [(Side, &'static str)] {
        match self {
            HighlightKey::Token => &[
                (Side::Response, "cardToken"),
                (Side::Request, "token"),
                (Side::Response, "token"),
            ],
            HighlightKey::HashData => &[(Side::Request, "hashData"), (Side::Response, "hashData")],
            HighlightKey::SessionId => &[
                (Side::Request, "threeDSessionID"),
                (Side::Response, "threeDSessionID"),
                (Side::Request, "sessionId"),
                (Side::Response, "sessionId"),
            ],
            HighlightKey::PaymentId => &[(Side::Response, "paymentId"), (Side::Request, "paymentId")],
            HighlightKey::OrderId => &[
                (Side::Response, "orderId"),
                (Side::Request, "orderId"),
                (Side::Response, "orderID"),
            ],
        }
    }
}

impl fmt::Display for HighlightKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Clone, Copy)]
enum Side {
    Request,
    Response,
}

/// Distinct identifier values per key, in first-seen order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Highlights {
    entries: Vec<(HighlightKey, Vec<String>)>,
}

impl Highlights {
    pub fn get(&self, key: HighlightKey) -> &[String] {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, values)| values.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Non-empty keys in canonical key order
    pub fn iter(&self) -> impl Iterator<Item = (HighlightKey, &[String])> {
        HighlightKey::ALL
            .into_iter()
            .map(|key| (key, self.get(key)))
            .filter(|(_, values)| !values.is_empty())
    }

    fn push(&mut self, key: HighlightKey, value: String) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => {
                if !values.contains(&value) {
                    values.push(value);
                }
            }
            None => self.entries.push((key, vec![value])),
        }
    }
}

pub fn collect_highlights(steps: &[StepEvent]) -> Highlights {
    let mut highlights = Highlights::default();
    for step in steps {
        for key in HighlightKey::ALL {
            if let Some(value) = pick(step, key) {
                highlights.push(key, value);
            }
        }
    }
    highlights
}

fn pick(step: &StepEvent, key: HighlightKey) -> Option<String> {
    let found = key.sources().iter().find_map(|(side, field)| {
        let payload = match side {
            Side::Request => step.request.as_ref(),
            Side::Response => step.response.as_ref(),
        }?;
        payload.get(*field).filter(|v| !v.is_null())
    })?;

    match found {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
