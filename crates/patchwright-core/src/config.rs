//! TOML configuration
//!
//! Every field has a default, so a missing file (or an empty one) yields a
//! working configuration. Values are validated once after loading.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::index::languages::LanguageRegistry;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Parent directory of persisted collections
    #[serde(default = "default_runtime_dir")]
    pub runtime_dir: PathBuf,
    #[serde(default)]
    pub editor: EditorConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub shell: ShellConfig,
    /// Where saved patches go (default: `<runtime_dir>/patches`)
    #[serde(default)]
    pub patch_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            runtime_dir: default_runtime_dir(),
            editor: EditorConfig::default(),
            index: IndexConfig::default(),
            embedding: EmbeddingConfig::default(),
            generation: GenerationConfig::default(),
            shell: ShellConfig::default(),
            patch_dir: None,
        }
    }
}

fn default_runtime_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("patchwright")
}

/// Limits for `run_shell_cmd`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellConfig {
    /// Wall-clock limit for one call, covering every command in it
    #[serde(default = "default_shell_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_response_chars")]
    pub max_output_chars: usize,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_shell_timeout(),
            max_output_chars: default_max_response_chars(),
        }
    }
}

fn default_shell_timeout() -> u64 {
    120
}

/// Output limits for the edit engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditorConfig {
    #[serde(default = "default_max_response_chars")]
    pub max_response_chars: usize,
    #[serde(default = "default_snippet_context_lines")]
    pub snippet_context_lines: usize,
    #[serde(default = "default_max_directory_entries")]
    pub max_directory_entries: usize,
    #[serde(default = "default_directory_view_depth")]
    pub directory_view_depth: usize,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_response_chars: default_max_response_chars(),
            snippet_context_lines: default_snippet_context_lines(),
            max_directory_entries: default_max_directory_entries(),
            directory_view_depth: default_directory_view_depth(),
        }
    }
}

fn default_max_response_chars() -> usize {
    32_000
}
fn default_snippet_context_lines() -> usize {
    4
}
fn default_max_directory_entries() -> usize {
    50
}
fn default_directory_view_depth() -> usize {
    2
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// File extensions to index (without the dot)
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Target chunk size in bytes
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Bytes shared between consecutive chunks
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// Files read, parsed, and inserted per batch
    #[serde(default = "default_file_batch_size")]
    pub file_batch_size: usize,
    /// Texts per embedding request
    #[serde(default = "default_embed_batch_size")]
    pub embed_batch_size: usize,
    #[serde(default = "default_collection")]
    pub default_collection: String,
    /// Key persisted collections by a digest of the indexed file set
    #[serde(default)]
    pub content_hash_key: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            file_batch_size: default_file_batch_size(),
            embed_batch_size: default_embed_batch_size(),
            default_collection: default_collection(),
            content_hash_key: false,
        }
    }
}

fn default_extensions() -> Vec<String> {
    vec!["py".to_string(), "java".to_string()]
}
fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    256
}
fn default_file_batch_size() -> usize {
    1000
}
fn default_embed_batch_size() -> usize {
    64
}
fn default_collection() -> String {
    "project_knowledge_db".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// `openai`, `fastembed`, or `hashed`
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_embedding_url")]
    pub api_url: String,
    #[serde(default = "default_openai_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
    /// Vector size for the hashed provider
    #[serde(default = "default_hashed_dims")]
    pub dims: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            api_url: default_embedding_url(),
            api_key_env: default_openai_key_env(),
            timeout_secs: default_embedding_timeout(),
            dims: default_hashed_dims(),
        }
    }
}

impl EmbeddingConfig {
    /// Model name with the provider-specific default filled in
    pub fn model_or_default(&self) -> String {
        if let Some(model) = &self.model {
            return model.clone();
        }
        match self.provider.as_str() {
            "fastembed" => "bge-small-en-v1.5".to_string(),
            "hashed" => format!("hashed-{}", self.dims),
            _ => "text-embedding-3-small".to_string(),
        }
    }
}

fn default_embedding_provider() -> String {
    "openai".to_string()
}
fn default_embedding_url() -> String {
    "https://api.openai.com/v1/embeddings".to_string()
}
fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_embedding_timeout() -> u64 {
    30
}
fn default_hashed_dims() -> usize {
    512
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// `openai` or `anthropic`
    #[serde(default = "default_api_format")]
    pub api_format: String,
    #[serde(default = "default_generation_url")]
    pub api_url: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default = "default_openai_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_format: default_api_format(),
            api_url: default_generation_url(),
            model: default_generation_model(),
            api_key_env: default_openai_key_env(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_generation_timeout(),
        }
    }
}

fn default_api_format() -> String {
    "openai".to_string()
}
fn default_generation_url() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}
fn default_generation_model() -> String {
    "gpt-4o".to_string()
}
fn default_max_tokens() -> usize {
    4096
}
fn default_generation_timeout() -> u64 {
    60
}

impl Config {
    /// Default config file location (`<config dir>/patchwright/config.toml`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("patchwright").join("config.toml"))
    }

    pub fn patch_dir(&self) -> PathBuf {
        self.patch_dir
            .clone()
            .unwrap_or_else(|| self.runtime_dir.join("patches"))
    }

    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Load from `path` if given, else from the default location if it exists,
    /// else fall back to defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.editor.max_response_chars == 0 {
            bail!("editor.max_response_chars must be > 0");
        }
        if self.editor.max_directory_entries == 0 {
            bail!("editor.max_directory_entries must be > 0");
        }
        if self.shell.timeout_secs == 0 || self.shell.max_output_chars == 0 {
            bail!("shell.timeout_secs and shell.max_output_chars must be > 0");
        }

        let index = &self.index;
        if index.chunk_size == 0 {
            bail!("index.chunk_size must be > 0");
        }
        if index.chunk_overlap >= index.chunk_size {
            bail!(
                "index.chunk_overlap ({}) must be smaller than index.chunk_size ({})",
                index.chunk_overlap,
                index.chunk_size
            );
        }
        if index.file_batch_size == 0 || index.embed_batch_size == 0 {
            bail!("index batch sizes must be > 0");
        }
        if index.extensions.is_empty() {
            bail!("index.extensions must list at least one extension");
        }
        let registry = LanguageRegistry::builtin();
        for ext in &index.extensions {
            if registry.get(ext).is_none() {
                bail!(
                    "index.extensions: no grammar registered for '{}'. Known: {}",
                    ext,
                    registry.extensions().join(", ")
                );
            }
        }

        match self.embedding.provider.as_str() {
            "openai" | "fastembed" => {}
            "hashed" => {
                if self.embedding.dims == 0 {
                    bail!("embedding.dims must be > 0 for the hashed provider");
                }
            }
            other => bail!(
                "Unknown embedding provider: '{}'. Must be openai, fastembed, or hashed.",
                other
            ),
        }

        match self.generation.api_format.as_str() {
            "openai" | "anthropic" => {}
            other => bail!(
                "Unknown generation api_format: '{}'. Must be openai or anthropic.",
                other
            ),
        }

        Ok(())
    }
}
