use std::fmt;

use crate::domain::StepEvent;

/// Coarse grouping of steps by what the step name says it does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Flow,
    Hash,
    Token,
    Payment,
    Cancel,
    Refund,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Flow => "Flow",
            Category::Hash => "Hash",
            Category::Token => "Token",
            Category::Payment => "Payment",
            Category::Cancel => "Cancel",
            Category::Refund => "Refund",
            Category::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// First match wins, so "payment token" is a Token step.
const RULES: &[(Category, &[&str])] = &[
    (Category::Hash, &["hash"]),
    (Category::Token, &["token"]),
    (Category::Payment, &["pay", "ödeme"]),
    (Category::Cancel, &["cancel", "iptal"]),
    (Category::Refund, &["refund", "iade"]),
    (Category::Flow, &["başlat", "start", "akış"]),
];

pub fn categorize(step_name: &str) -> Category {
    let name = step_name.to_lowercase();
    RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| name.contains(k)))
        .map(|(category, _)| *category)
        .unwrap_or(Category::Other)
}

/// Group steps by category. Groups appear in the order their first step did.
pub fn group_by_category(steps: &[StepEvent]) -> Vec<(Category, Vec<&StepEvent>)> {
    let mut groups: Vec<(Category, Vec<&StepEvent>)> = Vec::new();
    for step in steps {
        let category = categorize(&step.name);
        match groups.iter_mut().find(|(c, _)| *c == category) {
            Some((_, members)) => members.push(step),
            None => groups.push((category, vec![step])),
        }
    }
    groups
}
