//! Settings loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `graphrag.toml` +
//! `graphrag.<env>.toml` + `APP_*` env vars (nested with `__`), plus the
//! provider's conventional `SILICONFLOW_API_KEY`. The result is one immutable
//! [`Settings`] value that is handed to every component explicitly.
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Values that ship in `.env` templates and must never reach the provider.
pub const PLACEHOLDER_API_KEYS: &[&str] = &["sk-your-key-here"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub llm: LlmSettings,
    pub chunking: ChunkingSettings,
    pub retrieval: RetrievalSettings,
    pub paths: PathSettings,
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    /// Model used for entity/relation extraction during the build.
    pub extract_model: String,
    /// Model used for routing and answer generation.
    pub chat_model: String,
    pub embedding_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.siliconflow.cn/v1".to_string(),
            extract_model: "Qwen/Qwen2.5-72B-Instruct".to_string(),
            chat_model: "Qwen/Qwen2.5-72B-Instruct".to_string(),
            embedding_model: "BAAI/bge-large-zh-v1.5".to_string(),
            temperature: 0.1,
            max_tokens: 2048,
            request_timeout_secs: 120,
            max_retries: 2,
        }
    }
}

// Hand-written so the key never ends up in logs.
impl fmt::Debug for LlmSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("extract_model", &self.extract_model)
            .field("chat_model", &self.chat_model)
            .field("embedding_model", &self.embedding_model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl LlmSettings {
    /// Returns the API key, rejecting absent, blank and placeholder values.
    pub fn require_api_key(&self) -> Result<&str> {
        let key = self.api_key.as_deref().map(str::trim).unwrap_or_default();
        if key.is_empty() {
            return Err(Error::Configuration(
                "SILICONFLOW_API_KEY is not set (or set APP_LLM__API_KEY)".to_string(),
            ));
        }
        if PLACEHOLDER_API_KEYS.iter().any(|p| key.contains(p)) {
            return Err(Error::Configuration(
                "SILICONFLOW_API_KEY still holds the template placeholder".to_string(),
            ));
        }
        Ok(key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    /// Window size in characters.
    pub chunk_size: usize,
    /// Characters carried over from the previous window.
    pub chunk_overlap: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self { chunk_size: 600, chunk_overlap: 100 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
    pub max_graph_depth: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { top_k: 5, max_graph_depth: 2 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    pub corpus: String,
    pub graph_artifact: String,
    pub vector_artifact: String,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            corpus: "data/input.txt".to_string(),
            graph_artifact: "graph_data.json".to_string(),
            vector_artifact: "vector_store.json".to_string(),
        }
    }
}

/// Fully resolved filesystem locations for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub corpus: PathBuf,
    pub graph: PathBuf,
    pub vector: PathBuf,
}

impl PathSettings {
    pub fn resolve(&self, base: &Path) -> ArtifactPaths {
        ArtifactPaths {
            corpus: resolve_with_base(base, &self.corpus),
            graph: resolve_with_base(base, &self.graph_artifact),
            vector: resolve_with_base(base, &self.vector_artifact),
        }
    }
}

impl Settings {
    /// Load using `RUST_ENV` (dev/prod/test) to pick the overlay file.
    pub fn load() -> Result<Self> {
        Self::load_with(None)
    }

    /// Same as [`Settings::load`] but with an explicit base file in place of
    /// `graphrag.toml`.
    pub fn load_with(config_file: Option<&Path>) -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        let base = config_file.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("graphrag.toml"));

        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file(base));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("graphrag.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("graphrag.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("graphrag.test.toml")),
            _ => {}
        }
        figment = figment
            .merge(Env::prefixed("APP_").split("__"))
            .merge(Env::raw().only(&["SILICONFLOW_API_KEY"]).map(|_| "llm.api_key".into()));

        let settings = Self::from_figment(&figment)?;
        tracing::debug!(env = %env_name, ?settings, "settings loaded");
        Ok(settings)
    }

    pub fn from_figment(figment: &Figment) -> Result<Self> {
        let settings: Settings = figment.extract().map_err(|e| Error::Configuration(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        let c = &self.chunking;
        if c.chunk_size == 0 {
            return Err(Error::Configuration("chunking.chunk_size must be positive".to_string()));
        }
        if c.chunk_overlap >= c.chunk_size {
            return Err(Error::Configuration(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunk_size ({})",
                c.chunk_overlap, c.chunk_size
            )));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::Configuration("retrieval.top_k must be positive".to_string()));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(Error::Configuration(format!(
                "llm.temperature must be within [0, 2], got {}",
                self.llm.temperature
            )));
        }
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
