use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub corpus: CorpusConfig,
    pub index: IndexConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    pub history: HistoryConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub domains: DomainConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    pub cache_path: PathBuf,
    #[serde(default = "default_ngram_min")]
    pub ngram_min: usize,
    #[serde(default = "default_ngram_max")]
    pub ngram_max: usize,
    #[serde(default = "default_max_features")]
    pub max_features: usize,
}

fn default_ngram_min() -> usize {
    2
}
fn default_ngram_max() -> usize {
    4
}
fn default_max_features() -> usize {
    50_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f64,
    #[serde(default = "default_window_chars")]
    pub window_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_similarity: default_min_similarity(),
            window_chars: default_window_chars(),
            overlap_chars: default_overlap_chars(),
            max_context_chars: default_max_context_chars(),
        }
    }
}

fn default_top_k() -> usize {
    2
}
fn default_min_similarity() -> f64 {
    0.15
}
fn default_window_chars() -> usize {
    600
}
fn default_overlap_chars() -> usize {
    100
}
fn default_max_context_chars() -> usize {
    1000
}

/// Settings for the Ollama-compatible generation backend and the gateway
/// queue in front of it.
#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_num_ctx")]
    pub num_ctx: u32,
    #[serde(default = "default_num_predict")]
    pub num_predict: u32,
    #[serde(default = "default_sampling_top_k")]
    pub top_k: u32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_repeat_penalty")]
    pub repeat_penalty: f32,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
    #[serde(default = "default_submit_timeout_secs")]
    pub submit_timeout_secs: u64,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            temperature: 0.0,
            num_ctx: default_num_ctx(),
            num_predict: default_num_predict(),
            top_k: default_sampling_top_k(),
            top_p: default_top_p(),
            repeat_penalty: default_repeat_penalty(),
            connect_timeout_secs: default_connect_timeout_secs(),
            read_timeout_secs: default_read_timeout_secs(),
            submit_timeout_secs: default_submit_timeout_secs(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:11434".to_string()
}
fn default_model() -> String {
    "qwen3:8b".to_string()
}
fn default_num_ctx() -> u32 {
    2048
}
fn default_num_predict() -> u32 {
    400
}
fn default_sampling_top_k() -> u32 {
    20
}
fn default_top_p() -> f32 {
    0.9
}
fn default_repeat_penalty() -> f32 {
    1.1
}
fn default_connect_timeout_secs() -> u64 {
    10
}
fn default_read_timeout_secs() -> u64 {
    240
}
fn default_submit_timeout_secs() -> u64 {
    300
}
fn default_queue_capacity() -> usize {
    1
}

impl GenerationConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_secs(self.submit_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HistoryConfig {
    pub path: PathBuf,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

fn default_max_entries() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

/// Keyword lexicon for coarse question classification.
#[derive(Debug, Deserialize, Clone)]
pub struct DomainConfig {
    #[serde(default = "default_domain")]
    pub default: String,
    #[serde(default = "default_domain_rules")]
    pub rules: Vec<DomainRule>,
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            default: default_domain(),
            rules: default_domain_rules(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DomainRule {
    pub name: String,
    pub keywords: Vec<String>,
}

fn default_domain() -> String {
    "ทั่วไป".to_string()
}

fn default_domain_rules() -> Vec<DomainRule> {
    vec![
        DomainRule {
            name: "ภาษีมูลค่าเพิ่ม".to_string(),
            keywords: vec!["vat".to_string(), "ภาษีมูลค่าเพิ่ม".to_string()],
        },
        DomainRule {
            name: "เงินได้บุคคลธรรมดา".to_string(),
            keywords: vec!["เงินเดือน".to_string(), "บุคคลธรรมดา".to_string()],
        },
    ]
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;

    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate index
    if config.index.ngram_min == 0 || config.index.ngram_min > config.index.ngram_max {
        anyhow::bail!("index.ngram_min must be >= 1 and <= index.ngram_max");
    }
    if config.index.max_features == 0 {
        anyhow::bail!("index.max_features must be > 0");
    }

    // Validate retrieval
    let retrieval = &config.retrieval;
    if retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if !(0.0..=1.0).contains(&retrieval.min_similarity) {
        anyhow::bail!("retrieval.min_similarity must be in [0.0, 1.0]");
    }
    if retrieval.overlap_chars >= retrieval.window_chars {
        anyhow::bail!("retrieval.overlap_chars must be < retrieval.window_chars");
    }
    if retrieval.max_context_chars == 0 {
        anyhow::bail!("retrieval.max_context_chars must be > 0");
    }

    // Validate generation
    let generation = &config.generation;
    if generation.connect_timeout_secs == 0
        || generation.read_timeout_secs == 0
        || generation.submit_timeout_secs == 0
    {
        anyhow::bail!("generation timeouts must be > 0");
    }
    if generation.queue_capacity == 0 {
        anyhow::bail!("generation.queue_capacity must be >= 1");
    }

    if config.history.max_entries == 0 {
        anyhow::bail!("history.max_entries must be >= 1");
    }

    Ok(())
}
