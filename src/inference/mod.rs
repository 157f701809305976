pub mod seq2seq;

use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::ModelSettings;

/// Boundary markers some tokenizers leave in decoded text even with
/// special tokens skipped.
const BOUNDARY_MARKERS: &[&str] = &["<s>", "</s>", "<pad>"];

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("tokenizer error: {0}")]
    Tokenize(String),
    #[error("model error: {0}")]
    Model(#[from] candle::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("model produced no text")]
    EmptyOutput,
    #[error("model lock poisoned")]
    Poisoned,
}

/// Sampling parameters for reply generation.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    pub max_length: usize,
    pub temperature: f64,
    pub top_p: f64,
    pub num_beams: usize,
    pub do_sample: bool,
    pub max_input_tokens: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_length: 150,
            temperature: 0.7,
            top_p: 0.9,
            num_beams: 3,
            do_sample: true,
            max_input_tokens: 512,
        }
    }
}

/// A text-to-text model. Implementations return the raw decoded output;
/// `generate_reply` applies the conversational clean-up.
pub trait Generator: Send + Sync {
    fn complete(&self, text: &str) -> Result<String, GenerationError>;
}

pub fn generate_reply(generator: &dyn Generator, text: &str) -> Result<String, GenerationError> {
    let raw = generator.complete(text)?;
    polish_reply(&raw)
}

/// Strips boundary markers, trims, and makes sure the reply ends like a
/// sentence.
pub fn polish_reply(raw: &str) -> Result<String, GenerationError> {
    let mut text = raw.to_string();
    for marker in BOUNDARY_MARKERS {
        text = text.replace(marker, "");
    }
    let mut text = text.trim().to_string();
    if text.is_empty() {
        return Err(GenerationError::EmptyOutput);
    }
    if !text.ends_with(&['.', '!', '?'][..]) {
        text.push('.');
    }
    Ok(text)
}

/// Whether the generation model loaded. Decided once at startup.
#[derive(Clone)]
pub enum ModelHandle {
    Available(Arc<dyn Generator>),
    Unavailable,
}

impl ModelHandle {
    /// Never fails: a load error leaves the handle unavailable for the
    /// life of the process.
    pub fn load(settings: &ModelSettings) -> Self {
        if settings.disabled {
            warn!("model loading disabled; replies will use canned responses");
            return ModelHandle::Unavailable;
        }

        info!(model = %settings.describe_source(), "Loading tokenizer and model...");
        match seq2seq::Seq2SeqGenerator::from_settings(settings) {
            Ok(generator) => {
                info!("Model loaded successfully!");
                ModelHandle::Available(Arc::new(generator))
            }
            Err(err) => {
                error!("Error loading model: {err:#}");
                ModelHandle::Unavailable
            }
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, ModelHandle::Available(_))
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelHandle::Available(_) => f.write_str("ModelHandle::Available"),
            ModelHandle::Unavailable => f.write_str("ModelHandle::Unavailable"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    struct Echo(&'static str);

    impl Generator for Echo {
        fn complete(&self, _text: &str) -> Result<String, GenerationError> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn appends_period_when_unpunctuated() {
        assert_eq!(polish_reply("that sounds hard").unwrap(), "that sounds hard.");
        assert_eq!(polish_reply("really?").unwrap(), "really?");
        assert_eq!(polish_reply("wow!").unwrap(), "wow!");
        assert_eq!(polish_reply("done.").unwrap(), "done.");
    }

    #[test]
    fn strips_markers_and_whitespace() {
        assert_eq!(
            polish_reply("<s> I understand </s><pad>").unwrap(),
            "I understand."
        );
    }

    #[test]
    fn blank_output_is_an_error() {
        assert!(matches!(polish_reply("  </s> "), Err(GenerationError::EmptyOutput)));
    }

    #[test]
    fn generate_reply_polishes_model_output() {
        let reply = generate_reply(&Echo("  tell me more "), "hi").unwrap();
        assert_eq!(reply, "tell me more.");
    }

    #[test]
    fn default_generation_parameters() {
        let cfg = GenerationConfig::default();
        assert_eq!(cfg.max_length, 150);
        assert_eq!(cfg.num_beams, 3);
        assert!(cfg.do_sample);
        assert!((cfg.temperature - 0.7).abs() < f64::EPSILON);
        assert!((cfg.top_p - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn disabled_model_is_unavailable() {
        let settings = ModelSettings {
            disabled: true,
            ..ModelSettings::default()
        };
        assert!(!ModelHandle::load(&settings).is_available());
    }

    #[test]
    fn missing_snapshot_degrades_to_unavailable() {
        let settings = ModelSettings {
            model_dir: Some(PathBuf::from("does/not/exist")),
            ..ModelSettings::default()
        };
        assert!(!ModelHandle::load(&settings).is_available());
    }
}
