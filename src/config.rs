use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub knowledge: KnowledgeConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub openai: OpenAIConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub company: CompanyConfig,
    #[serde(default)]
    pub gmail: GmailConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KnowledgeConfig {
    pub source_dir: PathBuf,
    #[serde(default = "default_glob")]
    pub glob: String,
    #[serde(default = "default_split_levels")]
    pub split_levels: Vec<usize>,
}

fn default_glob() -> String {
    "**/*.md".to_string()
}
fn default_split_levels() -> Vec<usize> {
    vec![1, 2, 3]
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_persist_directory")]
    pub persist_directory: PathBuf,
    #[serde(default = "default_collection_name")]
    pub collection_name: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            persist_directory: default_persist_directory(),
            collection_name: default_collection_name(),
        }
    }
}

impl StoreConfig {
    /// SQLite file holding every collection under `persist_directory`.
    pub fn db_path(&self) -> PathBuf {
        self.persist_directory.join("store.sqlite")
    }
}

fn default_persist_directory() -> PathBuf {
    PathBuf::from("data/embeddings")
}
fn default_collection_name() -> String {
    "knowledge_base".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct OpenAIConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_openai_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl OpenAIConfig {
    /// The configured key, falling back to `OPENAI_API_KEY`.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            dims: default_dims(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_embedding_model() -> String {
    "text-embedding-ada-002".to_string()
}
fn default_dims() -> usize {
    1536
}
fn default_batch_size() -> usize {
    64
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default = "default_chat_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_chat_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: default_chat_model(),
            temperature: 0.0,
            top_k: default_top_k(),
            timeout_secs: default_chat_timeout_secs(),
        }
    }
}

fn default_chat_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_top_k() -> usize {
    3
}
fn default_chat_timeout_secs() -> u64 {
    60
}

/// Static grounding text about the company answering the mail.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct CompanyConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub context_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GmailConfig {
    #[serde(default = "default_token_path")]
    pub token_path: PathBuf,
    #[serde(default = "default_gmail_base_url")]
    pub base_url: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GmailConfig {
    fn default() -> Self {
        Self {
            token_path: default_token_path(),
            base_url: default_gmail_base_url(),
            max_results: default_max_results(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_token_path() -> PathBuf {
    PathBuf::from("token.json")
}
fn default_gmail_base_url() -> String {
    "https://gmail.googleapis.com/gmail/v1".to_string()
}
fn default_max_results() -> usize {
    3
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Relative paths are anchored at the config file's directory
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    config.knowledge.source_dir = anchor(base, &config.knowledge.source_dir);
    config.store.persist_directory = anchor(base, &config.store.persist_directory);
    config.gmail.token_path = anchor(base, &config.gmail.token_path);

    if let Some(file) = config.company.context_file.clone() {
        let file = anchor(base, &file);
        let text = std::fs::read_to_string(&file)
            .with_context(|| format!("Failed to read company context: {}", file.display()))?;
        config.company.context = text.trim().to_string();
        config.company.context_file = Some(file);
    }

    validate(&config)?;
    Ok(config)
}

fn anchor(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() || base.as_os_str().is_empty() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn validate(config: &Config) -> Result<()> {
    if config.knowledge.split_levels.is_empty() {
        bail!("knowledge.split_levels must name at least one heading level");
    }
    if let Some(level) = config
        .knowledge
        .split_levels
        .iter()
        .find(|l| !(1..=6).contains(*l))
    {
        bail!("knowledge.split_levels entries must be in 1..=6, got {}", level);
    }

    if config.store.collection_name.trim().is_empty() {
        bail!("store.collection_name must not be empty");
    }

    if config.embedding.dims == 0 {
        bail!("embedding.dims must be > 0");
    }
    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }

    if config.chat.top_k < 1 {
        bail!("chat.top_k must be >= 1");
    }
    if !(0.0..=2.0).contains(&config.chat.temperature) {
        bail!("chat.temperature must be in [0.0, 2.0]");
    }

    if config.gmail.max_results < 1 {
        bail!("gmail.max_results must be >= 1");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("mailrag.toml");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_defaults_applied() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, "[knowledge]\nsource_dir = \"kb\"\n");
        let cfg = load_config(&path).unwrap();

        assert_eq!(cfg.knowledge.glob, "**/*.md");
        assert_eq!(cfg.knowledge.split_levels, vec![1, 2, 3]);
        assert_eq!(cfg.embedding.model, "text-embedding-ada-002");
        assert_eq!(cfg.embedding.dims, 1536);
        assert_eq!(cfg.chat.top_k, 3);
        assert_eq!(cfg.chat.temperature, 0.0);
        assert_eq!(cfg.gmail.max_results, 3);
        assert_eq!(cfg.gmail.token_path, tmp.path().join("token.json"));
        assert_eq!(
            cfg.store.db_path(),
            tmp.path().join("data/embeddings/store.sqlite")
        );
    }

    #[test]
    fn test_relative_paths_follow_config_file() {
        let tmp = TempDir::new().unwrap();
        let abs = tmp.path().join("elsewhere");
        let path = write_config(
            &tmp,
            &format!(
                "[knowledge]\nsource_dir = \"../knowledge\"\n\n[store]\npersist_directory = \"{}\"\n",
                abs.display()
            ),
        );
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.knowledge.source_dir, tmp.path().join("../knowledge"));
        assert_eq!(cfg.store.persist_directory, abs);
        assert_eq!(cfg.gmail.token_path, tmp.path().join("token.json"));
    }

    #[test]
    fn test_company_context_file_is_read() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("company.txt"), "  We sell widgets.\n").unwrap();
        let path = write_config(
            &tmp,
            "[knowledge]\nsource_dir = \"kb\"\n\n[company]\nname = \"Acme\"\ncontext_file = \"company.txt\"\n",
        );
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.company.name.as_deref(), Some("Acme"));
        assert_eq!(cfg.company.context, "We sell widgets.");
    }

    #[test]
    fn test_rejects_bad_split_level() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            "[knowledge]\nsource_dir = \"kb\"\nsplit_levels = [1, 7]\n",
        );
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("split_levels"));
    }

    #[test]
    fn test_rejects_zero_top_k() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, "[knowledge]\nsource_dir = \"kb\"\n\n[chat]\ntop_k = 0\n");
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/nonexistent/mailrag.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
