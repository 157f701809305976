//! Keyword triage for incoming messages.
//!
//! Matching is a lower-cased substring search, not word-boundary aware:
//! "unsaddled" contains "sad" and classifies as depression, and a negated
//! phrase such as "I don't want to die" still trips the crisis check. Both
//! behaviours are kept as-is; crisis detection errs toward false positives.

mod keywords;

use once_cell::sync::Lazy;
use serde::Serialize;
use std::fmt;

use keywords::{CRISIS_TRIGGERS, TOPIC_TRIGGERS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    Anxiety,
    Depression,
    Stress,
}

impl Topic {
    pub const ALL: [Topic; 3] = [Topic::Anxiety, Topic::Depression, Topic::Stress];

    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Anxiety => "anxiety",
            Topic::Depression => "depression",
            Topic::Stress => "stress",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trigger substrings per topic plus the crisis phrases. Built once and
/// only read afterwards.
#[derive(Debug, Clone)]
pub struct KeywordTable {
    topics: Vec<(Topic, Vec<String>)>,
    crisis: Vec<String>,
}

static STANDARD_TABLE: Lazy<KeywordTable> = Lazy::new(|| {
    KeywordTable::new(
        TOPIC_TRIGGERS
            .iter()
            .map(|(topic, words)| (*topic, words.iter().map(|w| w.to_string()).collect()))
            .collect(),
        CRISIS_TRIGGERS.iter().map(|w| w.to_string()).collect(),
    )
});

impl KeywordTable {
    /// Triggers are lower-cased on construction so lookups only have to
    /// fold the input.
    pub fn new(topics: Vec<(Topic, Vec<String>)>, crisis: Vec<String>) -> Self {
        let topics = topics
            .into_iter()
            .map(|(topic, words)| (topic, words.iter().map(|w| w.to_lowercase()).collect()))
            .collect();
        let crisis = crisis.iter().map(|w| w.to_lowercase()).collect();
        Self { topics, crisis }
    }

    pub fn standard() -> &'static KeywordTable {
        &STANDARD_TABLE
    }

    pub fn detect_topic(&self, text: &str) -> Option<Topic> {
        let lowered = text.to_lowercase();
        self.topics
            .iter()
            .find(|(_, words)| words.iter().any(|w| lowered.contains(w.as_str())))
            .map(|(topic, _)| *topic)
    }

    pub fn is_crisis(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        self.crisis.iter().any(|w| lowered.contains(w.as_str()))
    }
}

pub fn detect_topic(text: &str) -> Option<Topic> {
    KeywordTable::standard().detect_topic(text)
}

pub fn is_crisis(text: &str) -> bool {
    KeywordTable::standard().is_crisis(text)
}
