use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub models: ModelsConfig,
    pub limits: LimitsConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Recognition model identifier (also the result's `model_id`).
    pub asr_model: String,

    /// Voice-activity model identifier reported by `/models`.
    pub vad_model: String,

    /// Punctuation/normalization model identifier.
    pub punc_model: String,

    /// Diarization model identifier; `None` disables speaker attribution.
    pub spk_model: Option<String>,

    pub enable_spk: bool,

    /// Base URL of the inference runtime hosting the models.
    pub runtime_url: String,

    /// Inference device ("auto", "cpu", "cuda").
    pub device: String,

    /// Serialize inference calls through a single slot when the backend is
    /// not reentrant.
    pub serialize_inference: bool,

    /// Per-call timeout toward the model runtime, in seconds.
    pub timeout_secs: u64,
}

impl ModelsConfig {
    /// Resolve "auto" to a concrete device at startup.
    pub fn resolve_device(&self) -> String {
        if self.device == "auto" {
            "cpu".to_string()
        } else {
            self.device.clone()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Upload/download size ceiling in megabytes.
    pub max_file_size_mb: usize,

    /// Whole-request deadline in seconds.
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Gap threshold for merging adjacent same-speaker segments.
    pub merge_gap_ms: u64,

    /// VAD pre-merge window in seconds (caps merged span length).
    pub vad_merge_length_s: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "echoscript".to_string(),
            http: HttpConfig {
                bind: "0.0.0.0".to_string(),
                port: 8080,
            },
        }
    }
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            asr_model: "paraformer-zh".to_string(),
            vad_model: "energy-vad".to_string(),
            punc_model: "rule-punc".to_string(),
            spk_model: Some("cam++".to_string()),
            enable_spk: true,
            runtime_url: "http://127.0.0.1:6006".to_string(),
            device: "auto".to_string(),
            serialize_inference: false,
            timeout_secs: 120,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 100,
            request_timeout_secs: 600,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            merge_gap_ms: 2000,
            vad_merge_length_s: 8,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("ECHOSCRIPT").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
