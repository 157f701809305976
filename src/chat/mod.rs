//! Reply pipeline for a single message.
//!
//! Steps run in a fixed order and the first one that answers wins:
//! empty input, crisis phrase, topic shortcut, model generation, canned
//! fallback.

use std::sync::Arc;
use tracing::{debug, error};

use crate::chance::{Chance, ThreadChance};
use crate::classifier::{KeywordTable, Topic};
use crate::config::DEFAULT_TOPIC_SHORTCUT;
use crate::inference::{generate_reply, ModelHandle};
use crate::responses::{
    follow_up_suggestions, quiet_suggestions, topic_suggestions, ResponsePool, CRISIS_MESSAGE,
    QUIET_PROMPT,
};

/// Which step produced the reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Quiet,
    Crisis,
    Topic(Topic),
    Generated,
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub response: String,
    /// `None` on the crisis route.
    pub suggestions: Option<Vec<String>>,
    pub urgent: bool,
    pub route: Route,
}

impl ChatReply {
    fn quiet() -> Self {
        Self {
            response: QUIET_PROMPT.to_string(),
            suggestions: Some(quiet_suggestions()),
            urgent: false,
            route: Route::Quiet,
        }
    }

    fn crisis() -> Self {
        Self {
            response: CRISIS_MESSAGE.to_string(),
            suggestions: None,
            urgent: true,
            route: Route::Crisis,
        }
    }
}

pub struct ChatService {
    keywords: KeywordTable,
    pool: ResponsePool,
    model: ModelHandle,
    chance: Arc<dyn Chance>,
    topic_shortcut: f64,
}

impl ChatService {
    pub fn new(
        keywords: KeywordTable,
        pool: ResponsePool,
        model: ModelHandle,
        chance: Arc<dyn Chance>,
    ) -> Self {
        Self {
            keywords,
            pool,
            model,
            chance,
            topic_shortcut: DEFAULT_TOPIC_SHORTCUT,
        }
    }

    /// Standard tables with thread-local randomness.
    pub fn standard(model: ModelHandle) -> Self {
        Self::new(
            KeywordTable::standard().clone(),
            ResponsePool::standard(),
            model,
            Arc::new(ThreadChance),
        )
    }

    /// Probability of answering a detected topic from the canned list
    /// instead of the model. Clamped to `[0, 1]`.
    pub fn with_topic_shortcut(mut self, probability: f64) -> Self {
        self.topic_shortcut = if probability.is_finite() {
            probability.clamp(0.0, 1.0)
        } else {
            DEFAULT_TOPIC_SHORTCUT
        };
        self
    }

    pub fn model_available(&self) -> bool {
        self.model.is_available()
    }

    pub fn respond(&self, message: &str) -> ChatReply {
        let text = message.trim();

        if text.is_empty() {
            return ChatReply::quiet();
        }

        if self.keywords.is_crisis(text) {
            debug!("crisis phrase detected");
            return ChatReply::crisis();
        }

        if let Some(reply) = self.try_topic_shortcut(text) {
            return reply;
        }

        let (response, route) = self.generate_or_fallback(text);
        debug!(?route, "reply assembled");
        ChatReply {
            response,
            suggestions: Some(follow_up_suggestions()),
            urgent: false,
            route,
        }
    }

    fn try_topic_shortcut(&self, text: &str) -> Option<ChatReply> {
        let topic = self.keywords.detect_topic(text)?;
        if self.chance.draw() >= self.topic_shortcut {
            debug!(%topic, "topic detected, deferring to generation");
            return None;
        }
        let response = self.pool.topic_reply(topic, self.chance.as_ref())?;
        debug!(%topic, "topic shortcut");
        Some(ChatReply {
            response: response.to_string(),
            suggestions: Some(topic_suggestions(topic)),
            urgent: false,
            route: Route::Topic(topic),
        })
    }

    fn generate_or_fallback(&self, text: &str) -> (String, Route) {
        match &self.model {
            ModelHandle::Available(generator) => match generate_reply(generator.as_ref(), text) {
                Ok(reply) => (reply, Route::Generated),
                Err(err) => {
                    error!("Generation error: {err}");
                    (self.fallback(), Route::Fallback)
                }
            },
            ModelHandle::Unavailable => (self.fallback(), Route::Fallback),
        }
    }

    fn fallback(&self) -> String {
        self.pool.empathetic_reply(self.chance.as_ref()).to_string()
    }
}
