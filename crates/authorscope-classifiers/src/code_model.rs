//! Neural code authorship classifier
//!
//! A BERT-family encoder mean-pools the token states of one snippet; a
//! projection head (ReLU) and a two-way linear classifier produce the logits.
//! The encoder lives under the key mapping table's submodule path so that
//! checkpoints exported from the training wrapper load by name.

use crate::classifier::{AuthorshipClassifier, ParameterInfo};
use crate::key_remap::{KeyMappingTable, KeyRemapper, LoadReport};
use crate::model_config::{CodeModelConfig, DeviceSpec, ModelSource};
use crate::scoring::{self, CODE_LABELS};
use async_trait::async_trait;
use authorscope_core::{Error, PredictionResult, Result, TextSample};
use candle_core::{DType, Device, Tensor, D};
use candle_nn::{Linear, Module, VarBuilder, VarMap};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokenizers::{Tokenizer, TruncationParams};
use tracing::{debug, info, warn};

/// Number of output classes
pub const NUM_CLASSES: usize = 2;

const KEY_MAPPING_FILE: &str = "key_mapping.json";

/// Encoder, projection head and classifier
pub struct CodeAuthorshipModel {
    encoder: BertModel,
    projection: Linear,
    classifier: Linear,
}

impl CodeAuthorshipModel {
    /// Build the module tree, placing the encoder at `encoder_path`
    pub fn new(
        vb: VarBuilder,
        config: &BertConfig,
        projection_dim: usize,
        encoder_path: &str,
    ) -> candle_core::Result<Self> {
        let encoder = BertModel::load(vb.pp(encoder_path), config)?;
        let projection =
            candle_nn::linear(config.hidden_size, projection_dim, vb.pp("text_projection"))?;
        let classifier = candle_nn::linear(projection_dim, NUM_CLASSES, vb.pp("classifier"))?;
        Ok(Self {
            encoder,
            projection,
            classifier,
        })
    }

    /// Logits of shape `(batch, 2)`
    pub fn forward(
        &self,
        input_ids: &Tensor,
        token_type_ids: &Tensor,
        attention_mask: &Tensor,
    ) -> candle_core::Result<Tensor> {
        let hidden = self
            .encoder
            .forward(input_ids, token_type_ids, Some(attention_mask))?;
        let pooled = hidden.mean(1)?;
        let projected = self.projection.forward(&pooled)?.relu()?;
        self.classifier.forward(&projected)
    }
}

/// Code classifier backed by [`CodeAuthorshipModel`]
pub struct CodeAuthorshipClassifier {
    name: String,
    tokenizer: Tokenizer,
    model: CodeAuthorshipModel,
    device: Device,
    parameters: Vec<ParameterInfo>,
    load_report: LoadReport,
}

impl CodeAuthorshipClassifier {
    /// Resolve, build and load the configured model.
    ///
    /// Blocking: may download from the HuggingFace Hub.
    pub fn load(config: &CodeModelConfig) -> Result<Self> {
        let start = Instant::now();
        let device = select_device(config.inference.device)?;
        info!("Loading code model '{}' on {:?}", config.name, device);

        let model_dir = resolve_model_dir(&config.source)?;
        let bert_config: BertConfig = parse_json_config(&model_dir.join("config.json"))?;
        let tokenizer = load_tokenizer(&model_dir, config.inference.max_length)?;
        let table = load_key_mapping(config.key_mapping.as_deref(), &model_dir)?;

        let mut varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let model =
            CodeAuthorshipModel::new(vb, &bert_config, config.projection_dim, &table.submodule)
                .map_err(|e| Error::load(format!("Failed to build code model: {}", e)))?;

        let saved = read_weights(&model_dir, &device)?;
        let load_report = KeyRemapper::new(table).load_into(&saved, &mut varmap)?;
        let parameters = collect_parameters(&varmap)?;

        info!(
            "Code model '{}' loaded in {:?} ({} parameters, {} strategy)",
            config.name,
            start.elapsed(),
            parameters.len(),
            load_report.strategy
        );

        Ok(Self {
            name: config.name.clone(),
            tokenizer,
            model,
            device,
            parameters,
            load_report,
        })
    }

    /// How saved tensors were matched to the live model
    pub fn load_report(&self) -> &LoadReport {
        &self.load_report
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Score a sample synchronously
    pub fn predict(&self, sample: &TextSample) -> Result<PredictionResult> {
        let start = Instant::now();

        let encoding = self
            .tokenizer
            .encode(sample.as_str(), true)
            .map_err(|e| Error::inference(format!("Tokenization failed: {}", e)))?;
        debug!(tokens = encoding.get_ids().len(), "Encoded code sample");

        let input_ids = self.row_tensor(encoding.get_ids(), "input ids")?;
        let token_type_ids = self.row_tensor(encoding.get_type_ids(), "token types")?;
        let attention_mask = self.row_tensor(encoding.get_attention_mask(), "attention mask")?;

        let logits = self
            .model
            .forward(&input_ids, &token_type_ids, &attention_mask)
            .map_err(|e| Error::inference(format!("Model forward pass failed: {}", e)))?;

        let probabilities = to_probabilities(&logits)?;
        let mut result =
            scoring::from_distribution(&probabilities, &CODE_LABELS, sample.char_len())?;
        result.latency_us = start.elapsed().as_micros() as u64;
        Ok(result)
    }

    fn row_tensor(&self, values: &[u32], what: &str) -> Result<Tensor> {
        Tensor::new(values, &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(|e| Error::inference(format!("Failed to create {} tensor: {}", what, e)))
    }
}

#[async_trait]
impl AuthorshipClassifier for CodeAuthorshipClassifier {
    async fn classify(&self, sample: &TextSample) -> Result<PredictionResult> {
        self.predict(sample)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn labels(&self) -> &[&'static str] {
        &CODE_LABELS
    }

    fn parameters(&self) -> &[ParameterInfo] {
        &self.parameters
    }
}

/// Pick the compute device, preferring a GPU under `auto`
pub fn select_device(spec: DeviceSpec) -> Result<Device> {
    match spec {
        DeviceSpec::Cpu => Ok(Device::Cpu),
        DeviceSpec::Cuda => Device::new_cuda(0)
            .map_err(|e| Error::load(format!("Failed to initialize CUDA: {}", e))),
        DeviceSpec::Metal => Device::new_metal(0)
            .map_err(|e| Error::load(format!("Failed to initialize Metal: {}", e))),
        DeviceSpec::Auto => {
            if candle_core::utils::cuda_is_available() {
                if let Ok(device) = Device::new_cuda(0) {
                    return Ok(device);
                }
                warn!("CUDA reported available but failed to initialize, using CPU");
            } else if candle_core::utils::metal_is_available() {
                if let Ok(device) = Device::new_metal(0) {
                    return Ok(device);
                }
                warn!("Metal reported available but failed to initialize, using CPU");
            }
            Ok(Device::Cpu)
        }
    }
}

fn resolve_model_dir(source: &ModelSource) -> Result<PathBuf> {
    match source {
        ModelSource::Local { path } => {
            if !path.is_dir() {
                return Err(Error::load(format!(
                    "Model directory does not exist: {}",
                    path.display()
                )));
            }
            Ok(path.clone())
        }
        ModelSource::HuggingFace { repo, revision } => download_from_huggingface(repo, revision),
    }
}

fn download_from_huggingface(repo: &str, revision: &str) -> Result<PathBuf> {
    info!("Downloading model from HuggingFace: {}@{}", repo, revision);

    let api = hf_hub::api::sync::Api::new()
        .map_err(|e| Error::load(format!("Failed to initialize HuggingFace API: {}", e)))?;
    let repo_obj = api.repo(hf_hub::Repo::with_revision(
        repo.to_string(),
        hf_hub::RepoType::Model,
        revision.to_string(),
    ));

    let config_path = repo_obj
        .get("config.json")
        .map_err(|e| Error::load(format!("Failed to download config.json: {}", e)))?;

    let found_weights = ["model.safetensors", "pytorch_model.bin"]
        .iter()
        .any(|file| match repo_obj.get(file) {
            Ok(_) => {
                debug!("Found weight file: {}", file);
                true
            }
            Err(_) => false,
        });
    if !found_weights {
        return Err(Error::load(
            "No model weights found (tried model.safetensors, pytorch_model.bin)",
        ));
    }

    let found_tokenizer = ["tokenizer.json", "vocab.txt"]
        .iter()
        .any(|file| repo_obj.get(file).is_ok());
    if !found_tokenizer {
        return Err(Error::load(
            "No tokenizer found (tried tokenizer.json, vocab.txt)",
        ));
    }

    if repo_obj.get(KEY_MAPPING_FILE).is_ok() {
        debug!("Found {}", KEY_MAPPING_FILE);
    }

    let model_dir = config_path
        .parent()
        .ok_or_else(|| Error::load("Invalid HuggingFace cache path"))?;
    info!("Model available at: {}", model_dir.display());
    Ok(model_dir.to_path_buf())
}

fn parse_json_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| Error::load(format!("Failed to read config {}: {}", path.display(), e)))?;
    serde_json::from_str(&contents)
        .map_err(|e| Error::load(format!("Failed to parse config {}: {}", path.display(), e)))
}

fn load_tokenizer(model_dir: &Path, max_length: usize) -> Result<Tokenizer> {
    let mut tokenizer = read_tokenizer(model_dir)?;
    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length,
            ..Default::default()
        }))
        .map_err(|e| Error::load(format!("Failed to configure truncation: {}", e)))?;
    tokenizer.with_padding(None);
    Ok(tokenizer)
}

fn read_tokenizer(model_dir: &Path) -> Result<Tokenizer> {
    let tokenizer_json = model_dir.join("tokenizer.json");
    if tokenizer_json.exists() {
        debug!("Loading tokenizer from tokenizer.json");
        return Tokenizer::from_file(&tokenizer_json)
            .map_err(|e| Error::load(format!("Failed to load tokenizer.json: {}", e)));
    }

    let vocab_path = model_dir.join("vocab.txt");
    if vocab_path.exists() {
        debug!("Building tokenizer from vocab.txt");

        use tokenizers::models::wordpiece::WordPiece;
        use tokenizers::normalizers::BertNormalizer;
        use tokenizers::pre_tokenizers::bert::BertPreTokenizer;
        use tokenizers::processors::bert::BertProcessing;

        let wordpiece = WordPiece::from_file(vocab_path.to_string_lossy().as_ref())
            .unk_token("[UNK]".to_string())
            .build()
            .map_err(|e| Error::load(format!("Failed to build WordPiece model: {}", e)))?;

        let mut tokenizer = Tokenizer::new(wordpiece);
        tokenizer.with_normalizer(Some(BertNormalizer::default()));
        tokenizer.with_pre_tokenizer(Some(BertPreTokenizer));
        tokenizer.with_post_processor(Some(BertProcessing::new(
            ("[SEP]".to_string(), 102),
            ("[CLS]".to_string(), 101),
        )));
        return Ok(tokenizer);
    }

    Err(Error::load(format!(
        "No tokenizer found in {} (tried tokenizer.json, vocab.txt)",
        model_dir.display()
    )))
}

/// Explicit path, then `key_mapping.json` beside the weights, then the built-in table
fn load_key_mapping(explicit: Option<&Path>, model_dir: &Path) -> Result<KeyMappingTable> {
    if let Some(path) = explicit {
        info!("Using key mapping {}", path.display());
        return KeyMappingTable::from_file(path);
    }
    let bundled = model_dir.join(KEY_MAPPING_FILE);
    if bundled.exists() {
        info!("Using key mapping {}", bundled.display());
        return KeyMappingTable::from_file(bundled);
    }
    debug!("Using built-in key mapping");
    Ok(KeyMappingTable::default())
}

fn read_weights(model_dir: &Path, device: &Device) -> Result<HashMap<String, Tensor>> {
    let safetensors = model_dir.join("model.safetensors");
    let pytorch = model_dir.join("pytorch_model.bin");

    let raw: Vec<(String, Tensor)> = if safetensors.exists() {
        debug!("Reading {}", safetensors.display());
        candle_core::safetensors::load(&safetensors, &Device::Cpu)
            .map_err(|e| Error::load(format!("Failed to read model.safetensors: {}", e)))?
            .into_iter()
            .collect()
    } else if pytorch.exists() {
        debug!("Reading {}", pytorch.display());
        candle_core::pickle::read_all(&pytorch)
            .map_err(|e| Error::load(format!("Failed to read pytorch_model.bin: {}", e)))?
    } else {
        return Err(Error::load(format!(
            "No model weights found in {} (tried model.safetensors, pytorch_model.bin)",
            model_dir.display()
        )));
    };

    raw.into_iter()
        .map(|(name, tensor)| {
            let tensor = tensor
                .to_dtype(DType::F32)
                .and_then(|t| t.to_device(device))
                .map_err(|e| Error::load(format!("Failed to convert '{}': {}", name, e)))?;
            Ok((name, tensor))
        })
        .collect()
}

fn collect_parameters(varmap: &VarMap) -> Result<Vec<ParameterInfo>> {
    let data = varmap
        .data()
        .lock()
        .map_err(|e| Error::internal(format!("Parameter map lock poisoned: {}", e)))?;
    let mut parameters: Vec<ParameterInfo> = data
        .iter()
        .map(|(name, var)| ParameterInfo {
            name: name.clone(),
            shape: var.as_tensor().dims().to_vec(),
        })
        .collect();
    parameters.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(parameters)
}

fn to_probabilities(logits: &Tensor) -> Result<Vec<f64>> {
    let probs: Vec<f32> = candle_nn::ops::softmax(logits, D::Minus1)
        .and_then(|p| p.squeeze(0))
        .and_then(|p| p.to_vec1())
        .map_err(|e| Error::inference(format!("Softmax failed: {}", e)))?;
    Ok(probs.into_iter().map(f64::from).collect())
}
