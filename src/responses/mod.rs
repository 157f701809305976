use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::chance::{choose, Chance};
use crate::classifier::Topic;

pub const QUIET_PROMPT: &str = "I notice you're being quiet. Would you like to share?";

pub const QUIET_SUGGESTIONS: [&str; 3] = [
    "I'm feeling...",
    "What's on my mind is...",
    "I need help with...",
];

pub const CRISIS_MESSAGE: &str = "I'm deeply concerned. Please contact a crisis hotline immediately. \
In the US: call/text 988. International help: https://www.opencounseling.com/suicide-hotlines";

pub const TROUBLE_MESSAGE: &str = "I'm having trouble understanding. Could you rephrase that?";

pub const FOLLOW_UP_SUGGESTIONS: [&str; 3] = [
    "Tell me more about that",
    "How does this make you feel?",
    "What else is on your mind?",
];

const EMPATHETIC_RESPONSES: &[&str] = &[
    "I hear you. Would you like to share more about that?",
    "That sounds important. Tell me more.",
    "I'm listening. How does that make you feel?",
    "You're being very open. I appreciate that.",
    "Let's explore that together. What else comes to mind?",
];

const TOPIC_RESPONSES: &[(Topic, &[&str])] = &[
    (
        Topic::Anxiety,
        &[
            "Anxiety can feel overwhelming. Let's break this down together.",
            "What you're feeling is valid. Would you like to explore coping strategies?",
        ],
    ),
    (
        Topic::Depression,
        &[
            "I'm sorry you're feeling this way. You're not alone in this.",
            "Depression can make things feel heavy. What small thing might help today?",
        ],
    ),
    (
        Topic::Stress,
        &[
            "Stress can really build up. What's one thing that might relieve some pressure?",
            "Let's identify what's within your control right now.",
        ],
    ),
];

pub fn topic_suggestions(topic: Topic) -> Vec<String> {
    vec![
        format!("More about my {topic}"),
        "How this affects my daily life".to_string(),
        "Coping strategies".to_string(),
    ]
}

pub fn follow_up_suggestions() -> Vec<String> {
    FOLLOW_UP_SUGGESTIONS.iter().map(|s| s.to_string()).collect()
}

pub fn quiet_suggestions() -> Vec<String> {
    QUIET_SUGGESTIONS.iter().map(|s| s.to_string()).collect()
}

/// Canned replies: a generic empathetic list plus per-topic lists.
#[derive(Debug, Clone)]
pub struct ResponsePool {
    empathetic: Vec<String>,
    topics: HashMap<Topic, Vec<String>>,
}

static STANDARD_POOL: Lazy<ResponsePool> = Lazy::new(|| ResponsePool {
    empathetic: EMPATHETIC_RESPONSES.iter().map(|s| s.to_string()).collect(),
    topics: TOPIC_RESPONSES
        .iter()
        .map(|(topic, lines)| (*topic, lines.iter().map(|s| s.to_string()).collect()))
        .collect(),
});

impl ResponsePool {
    /// Rejects empty lists and blank entries; a reply drawn from the pool
    /// must never be empty.
    pub fn new(empathetic: Vec<String>, topics: HashMap<Topic, Vec<String>>) -> Result<Self> {
        if empathetic.is_empty() {
            bail!("empathetic response list is empty");
        }
        if empathetic.iter().any(|s| s.trim().is_empty()) {
            bail!("empathetic response list contains a blank entry");
        }
        for (topic, lines) in &topics {
            if lines.iter().any(|s| s.trim().is_empty()) {
                bail!("responses for {topic} contain a blank entry");
            }
        }
        Ok(Self { empathetic, topics })
    }

    pub fn standard() -> ResponsePool {
        STANDARD_POOL.clone()
    }

    pub fn empathetic(&self) -> &[String] {
        &self.empathetic
    }

    pub fn for_topic(&self, topic: Topic) -> &[String] {
        self.topics.get(&topic).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn empathetic_reply(&self, chance: &dyn Chance) -> &str {
        choose(chance, &self.empathetic)
            .map(String::as_str)
            .unwrap_or(TROUBLE_MESSAGE)
    }

    /// `None` when the topic has no candidates.
    pub fn topic_reply(&self, topic: Topic, chance: &dyn Chance) -> Option<&str> {
        choose(chance, self.for_topic(topic)).map(String::as_str)
    }
}
