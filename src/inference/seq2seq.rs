use anyhow::{anyhow, Context, Result};
use candle::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::generation::{LogitsProcessor, Sampling};
use candle_transformers::models::t5::{self, T5ForConditionalGeneration};
use rand::{thread_rng, Rng};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokenizers::{Tokenizer, TruncationParams};
use tracing::{debug, info, warn};

use super::{GenerationConfig, GenerationError, Generator};
use crate::config::ModelSettings;

const TOKENIZER_FILE: &str = "tokenizer.json";
const CONFIG_FILE: &str = "config.json";
const WEIGHTS_FILE: &str = "model.safetensors";
const WEIGHTS_INDEX_FILE: &str = "model.safetensors.index.json";

// ---------------------------------------------------------
// Snapshot files
// ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub tokenizer: PathBuf,
    pub config: PathBuf,
    pub weights: Vec<PathBuf>,
}

impl ModelFiles {
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let tokenizer = dir.join(TOKENIZER_FILE);
        if !tokenizer.exists() {
            return Err(anyhow!("{TOKENIZER_FILE} not found under {}", dir.display()));
        }
        let config = dir.join(CONFIG_FILE);
        if !config.exists() {
            return Err(anyhow!("{CONFIG_FILE} not found under {}", dir.display()));
        }

        let single = dir.join(WEIGHTS_FILE);
        let weights = if single.exists() {
            vec![single]
        } else {
            let index = dir.join(WEIGHTS_INDEX_FILE);
            if !index.exists() {
                return Err(anyhow!("no model weights found under {}", dir.display()));
            }
            shard_names(&index)?
                .into_iter()
                .map(|name| dir.join(name))
                .collect()
        };

        Ok(Self {
            tokenizer,
            config,
            weights,
        })
    }

    pub fn from_hub(model_id: &str) -> Result<Self> {
        let api = hf_hub::api::sync::Api::new().context("hf-hub client init failed")?;
        let repo = api.model(model_id.to_string());

        let tokenizer = repo
            .get(TOKENIZER_FILE)
            .with_context(|| format!("fetching {TOKENIZER_FILE} for {model_id}"))?;
        let config = repo
            .get(CONFIG_FILE)
            .with_context(|| format!("fetching {CONFIG_FILE} for {model_id}"))?;

        let weights = match repo.get(WEIGHTS_FILE) {
            Ok(path) => vec![path],
            Err(single_err) => {
                let index = repo.get(WEIGHTS_INDEX_FILE).map_err(|_| {
                    anyhow!("fetching {WEIGHTS_FILE} for {model_id}: {single_err}")
                })?;
                shard_names(&index)?
                    .into_iter()
                    .map(|name| repo.get(&name).with_context(|| format!("fetching shard {name}")))
                    .collect::<Result<Vec<_>>>()?
            }
        };

        Ok(Self {
            tokenizer,
            config,
            weights,
        })
    }
}

fn shard_names(index_path: &Path) -> Result<Vec<String>> {
    let index_json: serde_json::Value = serde_json::from_slice(&fs::read(index_path)?)?;
    let mut names = index_json["weight_map"]
        .as_object()
        .ok_or_else(|| anyhow!("{WEIGHTS_INDEX_FILE}: weight_map is not an object"))?
        .values()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| anyhow!("invalid shard entry in {WEIGHTS_INDEX_FILE}"))
        })
        .collect::<Result<Vec<_>>>()?;
    names.sort();
    names.dedup();
    Ok(names)
}

// ---------------------------------------------------------
// Device selection
// ---------------------------------------------------------
pub fn select_device(preference: &str) -> Result<Device> {
    let trimmed = preference.trim();
    let lower = trimmed.to_ascii_lowercase();
    if lower.is_empty() || lower == "cpu" {
        Ok(Device::Cpu)
    } else if lower.starts_with("cuda") || lower.starts_with("gpu") {
        let ordinal = trimmed
            .split(':')
            .nth(1)
            .and_then(|part| part.parse::<usize>().ok())
            .unwrap_or(0);
        Device::new_cuda(ordinal).map_err(|err| {
            anyhow!(
                "requested CUDA device {} but initialization failed: {err}. Build with the \
                 `cuda` feature and ensure CUDA libraries are available.",
                ordinal
            )
        })
    } else {
        warn!("unrecognized CHAT_MODEL_DEVICE value '{}', using cpu", trimmed);
        Ok(Device::Cpu)
    }
}

// ---------------------------------------------------------
// Encoder/decoder generator
// ---------------------------------------------------------
pub struct Seq2SeqGenerator {
    model: Mutex<T5ForConditionalGeneration>,
    tokenizer: Tokenizer,
    device: Device,
    decoder_start: u32,
    eos: u32,
    params: GenerationConfig,
}

struct Candidate {
    tokens: Vec<u32>,
    score: f64,
}

impl Seq2SeqGenerator {
    pub fn from_settings(settings: &ModelSettings) -> Result<Self> {
        let files = match &settings.model_dir {
            Some(dir) => ModelFiles::from_dir(dir)?,
            None => ModelFiles::from_hub(&settings.model_id)?,
        };
        let device = select_device(&settings.device)?;
        Self::load(&files, device, settings.generation.clone())
    }

    pub fn load(files: &ModelFiles, device: Device, params: GenerationConfig) -> Result<Self> {
        let mut tokenizer = Tokenizer::from_file(&files.tokenizer).map_err(|e| {
            anyhow!("Tokenizer load failed ({}): {e}", files.tokenizer.display())
        })?;
        tokenizer.with_padding(None);
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: params.max_input_tokens,
                ..Default::default()
            }))
            .map_err(|e| anyhow!("Tokenizer truncation config failed: {e}"))?;

        let mut config: t5::Config = serde_json::from_slice(&fs::read(&files.config)?)
            .with_context(|| format!("parsing {}", files.config.display()))?;
        config.use_cache = true;

        debug!(shards = files.weights.len(), "mapping seq2seq weights");
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&files.weights, DType::F32, &device)? };
        let model = T5ForConditionalGeneration::load(vb, &config)?;

        let decoder_start = config
            .decoder_start_token_id
            .unwrap_or(config.pad_token_id) as u32;
        let eos = config.eos_token_id as u32;

        info!(?device, max_length = params.max_length, "seq2seq model ready");

        Ok(Self {
            model: Mutex::new(model),
            tokenizer,
            device,
            decoder_start,
            eos,
            params,
        })
    }

    fn sampler(&self) -> LogitsProcessor {
        let sampling = if self.params.do_sample {
            Sampling::TopP {
                p: self.params.top_p,
                temperature: self.params.temperature,
            }
        } else {
            Sampling::ArgMax
        };
        LogitsProcessor::from_sampling(thread_rng().gen(), sampling)
    }

    fn sample_candidate(
        &self,
        model: &mut T5ForConditionalGeneration,
        encoder_output: &Tensor,
    ) -> Result<Candidate, GenerationError> {
        model.clear_kv_cache();
        let mut sampler = self.sampler();
        let mut output = vec![self.decoder_start];
        let mut log_prob = 0f64;
        let mut steps = 0usize;

        for step in 0..self.params.max_length {
            let ctx = if step == 0 {
                Tensor::new(output.as_slice(), &self.device)?.unsqueeze(0)?
            } else {
                let last = output.last().copied().unwrap_or(self.decoder_start);
                Tensor::new(&[last], &self.device)?.unsqueeze(0)?
            };

            let logits = model
                .decode(&ctx, encoder_output)?
                .squeeze(0)?
                .to_dtype(DType::F32)?;
            let next = sampler.sample(&logits)?;
            log_prob += token_log_prob(&logits, next, self.params.temperature)?;
            steps += 1;

            if next == self.eos {
                break;
            }
            output.push(next);
        }

        Ok(Candidate {
            tokens: output.split_off(1),
            score: log_prob / steps.max(1) as f64,
        })
    }
}

/// Log-probability of `token` under the temperature-scaled distribution.
fn token_log_prob(logits: &Tensor, token: u32, temperature: f64) -> candle::Result<f64> {
    let scaled = (logits / temperature.max(1e-5))?;
    let probs = candle_nn::ops::softmax_last_dim(&scaled)?;
    let p = probs.get(token as usize)?.to_scalar::<f32>()?;
    Ok(f64::from(p.max(f32::MIN_POSITIVE)).ln())
}

impl Generator for Seq2SeqGenerator {
    /// Samples `num_beams` candidates from one encoder pass and returns the
    /// one with the best mean token log-probability.
    fn complete(&self, text: &str) -> Result<String, GenerationError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| GenerationError::Tokenize(e.to_string()))?;
        let ids = encoding.get_ids();
        if ids.is_empty() {
            return Err(GenerationError::Tokenize("input produced no tokens".into()));
        }
        let input = Tensor::new(ids, &self.device)?.unsqueeze(0)?;

        let mut model = self.model.lock().map_err(|_| GenerationError::Poisoned)?;
        let encoder_output = model.encode(&input)?;

        let rounds = if self.params.do_sample {
            self.params.num_beams.max(1)
        } else {
            1
        };

        let mut best: Option<Candidate> = None;
        for _ in 0..rounds {
            let candidate = self.sample_candidate(&mut model, &encoder_output)?;
            if candidate.tokens.is_empty() {
                continue;
            }
            if best.as_ref().map_or(true, |b| candidate.score > b.score) {
                best = Some(candidate);
            }
        }
        drop(model);

        let best = best.ok_or(GenerationError::EmptyOutput)?;
        debug!(tokens = best.tokens.len(), score = best.score, "seq2seq candidate chosen");
        self.tokenizer
            .decode(&best.tokens, true)
            .map_err(|e| GenerationError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::generate_reply;

    #[test]
    fn cpu_device_selection() {
        assert!(matches!(select_device("cpu").unwrap(), Device::Cpu));
        assert!(matches!(select_device("").unwrap(), Device::Cpu));
        assert!(matches!(select_device("tpu").unwrap(), Device::Cpu));
    }

    #[test]
    fn snapshot_dir_requires_tokenizer() {
        let err = ModelFiles::from_dir(Path::new("does/not/exist")).unwrap_err();
        assert!(err.to_string().contains(TOKENIZER_FILE));
    }

    #[test]
    fn log_prob_of_certain_token_is_near_zero() {
        let logits = Tensor::new(&[0f32, 50.0, 0.0], &Device::Cpu).unwrap();
        let lp = token_log_prob(&logits, 1, 1.0).unwrap();
        assert!(lp.abs() < 1e-3);
        assert!(token_log_prob(&logits, 0, 1.0).unwrap() < -10.0);
    }

    #[test]
    fn run_local_snapshot_generation() {
        let snapshot = PathBuf::from("models/flan-t5-base");
        if !snapshot.join(WEIGHTS_FILE).exists() {
            eprintln!(
                "seq2seq snapshot missing under {}, skipping test",
                snapshot.display()
            );
            return;
        }
        let files = ModelFiles::from_dir(&snapshot).expect("snapshot files");
        let generator = Seq2SeqGenerator::load(&files, Device::Cpu, GenerationConfig::default())
            .expect("failed to load seq2seq model");
        let reply = generate_reply(&generator, "I had a long day at work").expect("generation failed");
        assert!(!reply.is_empty());
        assert!(reply.ends_with(&['.', '!', '?'][..]));
    }
}
