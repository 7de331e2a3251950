// Qwen2 loader and backend on Candle
//
// Fetches tokenizer/config/weights from the Hugging Face Hub (sync API,
// cached locally by hf-hub), builds the causal-LM graph, and wraps it in
// the TextGeneration trait. A SamplingPipeline around the shared backend
// provides the high-level completion path; wrapping it can fail without
// sinking the load.

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::generation::{LogitsProcessor, Sampling};
use candle_transformers::models::qwen2::{Config, ModelForCausalLM};
use rand::Rng;
use tokenizers::{PaddingParams, Tokenizer};

use super::LoaderOptions;
use crate::models::generation::{
    GenerationParams, ModelHandle, PromptCompletion, SharedBackend, TextGeneration,
};

// Qwen2 end-of-text fallback ID, used only if the tokenizer somehow lacks
// both special tokens.
const QWEN_EOS_ID: u32 = 151643;

/// Load one Qwen2 candidate from the Hub and wrap it in a handle.
pub fn load(model_id: &str, options: &LoaderOptions) -> Result<ModelHandle> {
    let api = hf_hub::api::sync::Api::new().context("Hub API initialization failed")?;
    let repo = api.model(model_id.to_string());

    let tokenizer_path = repo
        .get("tokenizer.json")
        .context("failed to fetch tokenizer.json")?;
    let config_path = repo
        .get("config.json")
        .context("failed to fetch config.json")?;
    let weights_path = repo
        .get("model.safetensors")
        .context("failed to fetch model.safetensors")?;

    let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
        .map_err(|e| anyhow::anyhow!("failed to load tokenizer: {e}"))?;
    ensure_pad_token(&mut tokenizer);

    let config_str =
        std::fs::read_to_string(&config_path).context("failed to read config.json")?;
    let config: Config = serde_json::from_str(&config_str).context("failed to parse config.json")?;

    let (device, dtype) = select_device(options.force_cpu);
    tracing::info!("Loading {} on {:?} ({:?})", model_id, device, dtype);

    let vb = unsafe {
        VarBuilder::from_mmaped_safetensors(&[weights_path], dtype, &device)
            .context("failed to load model weights")?
    };
    let model = ModelForCausalLM::new(&config, vb).context("failed to build Qwen model")?;

    let eos_id = tokenizer
        .token_to_id("<|endoftext|>")
        .or_else(|| tokenizer.token_to_id("<|im_end|>"))
        .unwrap_or(QWEN_EOS_ID);
    let im_end_id = tokenizer.token_to_id("<|im_end|>");

    let backend: SharedBackend = Arc::new(Mutex::new(Box::new(QwenBackend {
        model_id: model_id.to_string(),
        model,
        tokenizer,
        device,
        eos_id,
        im_end_id,
    })));

    // The pipeline wrapper is optional: if probing it fails the handle
    // still works through the low-level path.
    let pipeline = match SamplingPipeline::wrap(backend.clone()) {
        Ok(p) => Some(Box::new(p) as Box<dyn PromptCompletion>),
        Err(e) => {
            tracing::warn!("pipeline wrapper unavailable for {}: {:#}", model_id, e);
            None
        }
    };

    Ok(ModelHandle::from_parts(model_id, backend, pipeline))
}

/// Qwen checkpoints ship without a pad token; default it to EOS so
/// padded batches tokenize cleanly.
fn ensure_pad_token(tokenizer: &mut Tokenizer) {
    if tokenizer.get_padding().is_none() {
        let pad_id = tokenizer
            .token_to_id("<|endoftext|>")
            .unwrap_or(QWEN_EOS_ID);
        tokenizer.with_padding(Some(PaddingParams {
            pad_id,
            pad_token: "<|endoftext|>".to_string(),
            ..PaddingParams::default()
        }));
    }
}

/// Pick the compute device: CUDA, then Metal on macOS, then CPU.
/// Accelerators run BF16/F16, the CPU stays in F32.
fn select_device(force_cpu: bool) -> (Device, DType) {
    if force_cpu {
        return (Device::Cpu, DType::F32);
    }

    #[cfg(feature = "cuda")]
    {
        match Device::new_cuda(0) {
            Ok(device) => return (device, DType::BF16),
            Err(e) => tracing::warn!("CUDA unavailable, trying next device: {e}"),
        }
    }

    #[cfg(target_os = "macos")]
    {
        match Device::new_metal(0) {
            Ok(device) => return (device, DType::F16),
            Err(e) => tracing::warn!("Metal unavailable, falling back to CPU: {e}"),
        }
    }

    (Device::Cpu, DType::F32)
}

enum TokenSampler {
    Greedy,
    Sampled(LogitsProcessor),
}

impl TokenSampler {
    fn next_token(&mut self, logits: &Tensor) -> Result<u32> {
        match self {
            Self::Greedy => Ok(logits.argmax(0)?.to_scalar::<u32>()?),
            Self::Sampled(processor) => Ok(processor.sample(logits)?),
        }
    }
}

struct QwenBackend {
    model_id: String,
    model: ModelForCausalLM,
    tokenizer: Tokenizer,
    device: Device,
    eos_id: u32,
    im_end_id: Option<u32>,
}

impl QwenBackend {
    fn is_stop_token(&self, token: u32) -> bool {
        token == self.eos_id || self.im_end_id == Some(token)
    }

    /// Autoregressive decode loop shared by greedy and sampled paths.
    /// The KV cache is cleared up front, the full prompt runs at offset
    /// zero, then one token per step.
    fn decode_loop(
        &mut self,
        input_ids: &[u32],
        max_new_tokens: usize,
        mut sampler: TokenSampler,
    ) -> Result<Vec<u32>> {
        if input_ids.is_empty() {
            anyhow::bail!("empty prompt");
        }

        self.model.clear_kv_cache();

        let mut output_ids = input_ids.to_vec();

        let prompt = Tensor::new(input_ids, &self.device)
            .context("failed to build prompt tensor")?
            .unsqueeze(0)?;
        let logits = self
            .model
            .forward(&prompt, 0)
            .context("prompt forward pass failed")?;
        let logits = logits.squeeze(0)?.squeeze(0)?.to_dtype(DType::F32)?;

        let mut token = sampler.next_token(&logits)?;
        if self.is_stop_token(token) || max_new_tokens == 0 {
            return Ok(output_ids);
        }
        output_ids.push(token);

        let mut seqlen_offset = input_ids.len();
        for _ in 1..max_new_tokens {
            let step = Tensor::new(&[token], &self.device)?.unsqueeze(0)?;
            let logits = self
                .model
                .forward(&step, seqlen_offset)
                .context("forward pass failed")?;
            seqlen_offset += 1;

            let logits = logits.squeeze(0)?.squeeze(0)?.to_dtype(DType::F32)?;
            token = sampler.next_token(&logits)?;
            if self.is_stop_token(token) {
                break;
            }
            output_ids.push(token);
        }

        Ok(output_ids)
    }
}

impl TextGeneration for QwenBackend {
    fn generate(&mut self, input_ids: &[u32], max_new_tokens: usize) -> Result<Vec<u32>> {
        self.decode_loop(input_ids, max_new_tokens, TokenSampler::Greedy)
    }

    fn generate_sampled(
        &mut self,
        input_ids: &[u32],
        params: &GenerationParams,
    ) -> Result<Vec<u32>> {
        let sampler = if params.sample && params.temperature > 0.0 {
            let seed = rand::thread_rng().gen();
            TokenSampler::Sampled(LogitsProcessor::from_sampling(
                seed,
                Sampling::TopK {
                    k: params.top_k,
                    temperature: params.temperature,
                },
            ))
        } else {
            TokenSampler::Greedy
        };
        self.decode_loop(input_ids, params.max_new_tokens, sampler)
    }

    fn tokenize(&self, text: &str, max_len: usize) -> Result<Vec<u32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow::anyhow!("tokenization failed: {e}"))?;
        let mut ids = encoding.get_ids().to_vec();
        ids.truncate(max_len);
        Ok(ids)
    }

    fn decode_tokens(&self, tokens: &[u32]) -> Result<String> {
        self.tokenizer
            .decode(tokens, true)
            .map_err(|e| anyhow::anyhow!("decode failed: {e}"))
    }

    fn name(&self) -> &str {
        &self.model_id
    }
}

/// High-level completion over the shared backend: tokenize, sample,
/// decode in one call, returning the full text with the prompt echo.
pub struct SamplingPipeline {
    backend: SharedBackend,
}

impl SamplingPipeline {
    /// Wrap the backend, probing the tokenizer once so a broken setup
    /// surfaces here instead of on the first request.
    pub fn wrap(backend: SharedBackend) -> Result<Self> {
        {
            let guard = backend
                .lock()
                .map_err(|_| anyhow::anyhow!("backend lock poisoned"))?;
            let probe = guard.tokenize("{}", 8)?;
            if probe.is_empty() {
                anyhow::bail!("tokenizer produced no tokens for probe input");
            }
        }
        Ok(Self { backend })
    }
}

impl PromptCompletion for SamplingPipeline {
    fn complete(&mut self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let mut backend = self
            .backend
            .lock()
            .map_err(|_| anyhow::anyhow!("backend lock poisoned"))?;
        let input_ids = backend.tokenize(prompt, params.max_input_tokens)?;
        let output_ids = backend.generate_sampled(&input_ids, params)?;
        backend.decode_tokens(&output_ids)
    }
}
