use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

use scribe_transcription::{
    AssemblyAiConfig, WhisperConfig, DEFAULT_BASE_URL, DEFAULT_WHISPER_MODEL, OPENAI_BASE_URL,
};

/// Configuration for Scribe Studio
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Transcription vendor connection
    pub assemblyai: AssemblyAiSettings,

    /// OpenAI connection, used when `processing.provider = "whisper"`
    #[serde(default)]
    pub openai: OpenAiSettings,

    /// Batch processing settings
    pub processing: ProcessingConfig,

    /// HTTP API settings
    pub server: ServerConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyAiSettings {
    /// API key sent in the Authorization header
    pub api_key: Option<String>,

    /// API root, overridable for proxies and tests
    pub base_url: String,

    /// Timeout for a single HTTP request (seconds)
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiSettings {
    /// Bearer token for the transcription endpoint
    pub api_key: Option<String>,

    pub base_url: String,

    /// Whisper model name
    pub model: String,

    /// Timeout for the whole transcription request (seconds)
    pub request_timeout_seconds: u64,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: OPENAI_BASE_URL.to_string(),
            model: DEFAULT_WHISPER_MODEL.to_string(),
            request_timeout_seconds: 600,
        }
    }
}

/// Which vendor transcribes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    AssemblyAi,
    Whisper,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AssemblyAi => "assemblyai",
            Self::Whisper => "whisper",
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "assemblyai" => Ok(Self::AssemblyAi),
            "whisper" | "openai" => Ok(Self::Whisper),
            other => Err(anyhow!("Unknown provider: {} (expected assemblyai or whisper)", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Transcription vendor
    #[serde(default)]
    pub provider: ProviderKind,

    /// Maximum number of concurrent transcriptions
    pub max_workers: usize,

    /// Where payloads and subtitle files are written
    pub output_dir: PathBuf,

    /// Media extensions picked up when a directory is given
    pub supported_extensions: Vec<String>,

    /// Raw option config applied under every request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_options: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    /// Upload size limit for multipart requests (MB)
    pub max_upload_mb: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default level when RUST_LOG is not set
    pub level: String,
}

impl AppConfig {
    /// Load configuration from the first config file found, else from the
    /// environment. Environment overrides apply in both cases.
    pub fn load() -> Result<Self> {
        let config_paths = [
            "scribe-studio.toml",
            "config/scribe-studio.toml",
            "/etc/scribe-studio/config.toml",
        ];

        for path in &config_paths {
            if Path::new(path).exists() {
                match Self::from_file(path) {
                    Ok(config) => return Ok(config),
                    Err(e) => tracing::warn!("Failed to parse config file {}: {}", path, e),
                }
            }
        }

        Self::from_env()
    }

    /// Load a specific TOML file, then apply environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config_str = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Cannot read config {}: {}", path.display(), e))?;
        let mut config: Self = toml::from_str(&config_str)?;
        config.apply_env_overrides();
        tracing::info!("📄 Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Defaults plus environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(api_key) = std::env::var("ASSEMBLYAI_API_KEY") {
            if !api_key.trim().is_empty() {
                self.assemblyai.api_key = Some(api_key);
            }
        }

        if let Ok(base_url) = std::env::var("SCRIBE_ASSEMBLYAI_BASE_URL") {
            self.assemblyai.base_url = base_url;
        }

        if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
            if !api_key.trim().is_empty() {
                self.openai.api_key = Some(api_key);
            }
        }

        if let Ok(provider) = std::env::var("SCRIBE_PROVIDER") {
            match provider.parse() {
                Ok(provider) => self.processing.provider = provider,
                Err(_) => tracing::warn!("Ignoring invalid SCRIBE_PROVIDER={}", provider),
            }
        }

        if let Ok(workers) = std::env::var("SCRIBE_WORKERS") {
            match workers.parse() {
                Ok(workers) => self.processing.max_workers = workers,
                Err(_) => tracing::warn!("Ignoring invalid SCRIBE_WORKERS={}", workers),
            }
        }

        if let Ok(output_dir) = std::env::var("SCRIBE_OUTPUT_DIR") {
            self.processing.output_dir = PathBuf::from(output_dir);
        }

        if let Ok(log_level) = std::env::var("SCRIBE_LOG_LEVEL") {
            self.logging.level = log_level;
        }

        if let Ok(port) = std::env::var("SCRIBE_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("Ignoring invalid SCRIBE_PORT={}", port),
            }
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.processing.max_workers == 0 {
            return Err(anyhow!("max_workers must be greater than 0"));
        }

        match self.processing.provider {
            ProviderKind::AssemblyAi if self.assemblyai_api_key().is_none() => {
                return Err(anyhow!(
                    "AssemblyAI API key required (set ASSEMBLYAI_API_KEY or assemblyai.api_key)"
                ));
            }
            ProviderKind::Whisper if self.openai_api_key().is_none() => {
                return Err(anyhow!(
                    "OpenAI API key required (set OPENAI_API_KEY or openai.api_key)"
                ));
            }
            _ => {}
        }

        if let Some(options) = &self.processing.default_options {
            if !options.is_object() {
                return Err(anyhow!("processing.default_options must be a table"));
            }
        }

        tracing::info!("✅ Configuration validation passed");
        Ok(())
    }

    /// API key if set and not blank
    pub fn assemblyai_api_key(&self) -> Option<&str> {
        self.assemblyai
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    /// Vendor client settings
    pub fn assemblyai_config(&self) -> Result<AssemblyAiConfig> {
        let api_key = self
            .assemblyai_api_key()
            .ok_or_else(|| anyhow!("AssemblyAI API key not configured"))?;

        Ok(AssemblyAiConfig::new(api_key)
            .with_base_url(self.assemblyai.base_url.clone())
            .with_request_timeout(Duration::from_secs(self.assemblyai.request_timeout_seconds)))
    }

    pub fn openai_api_key(&self) -> Option<&str> {
        self.openai
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    /// Whisper client settings
    pub fn whisper_config(&self) -> Result<WhisperConfig> {
        let api_key = self
            .openai_api_key()
            .ok_or_else(|| anyhow!("OpenAI API key not configured"))?;

        Ok(WhisperConfig::new(api_key)
            .with_base_url(self.openai.base_url.clone())
            .with_model(self.openai.model.clone())
            .with_request_timeout(Duration::from_secs(self.openai.request_timeout_seconds)))
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        let (vendor_url, api_key) = match self.processing.provider {
            ProviderKind::AssemblyAi => (&self.assemblyai.base_url, self.assemblyai_api_key()),
            ProviderKind::Whisper => (&self.openai.base_url, self.openai_api_key()),
        };
        format!(
            "Scribe Studio Configuration:\n\
            - Workers: {}\n\
            - Provider: {}\n\
            - Vendor: {}\n\
            - API Key: {}\n\
            - Output Directory: {}\n\
            - Supported Extensions: {}\n\
            - Server: {}:{}",
            self.processing.max_workers,
            self.processing.provider.as_str(),
            vendor_url,
            if api_key.is_some() { "set" } else { "missing" },
            self.processing.output_dir.display(),
            self.processing.supported_extensions.join(", "),
            self.server.host,
            self.server.port
        )
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            assemblyai: AssemblyAiSettings {
                api_key: None,
                base_url: DEFAULT_BASE_URL.to_string(),
                request_timeout_seconds: 120,
            },
            openai: OpenAiSettings::default(),
            processing: ProcessingConfig {
                provider: ProviderKind::default(),
                max_workers: num_cpus::get().min(8),
                output_dir: PathBuf::from("./output"),
                supported_extensions: [
                    "mp3", "wav", "m4a", "aac", "flac", "ogg", "opus", "webm", "mp4", "mov", "mkv",
                ]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
                default_options: None,
            },
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3001,
                max_upload_mb: 200,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: AppConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.config.processing.max_workers = workers;
        self
    }

    pub fn with_output_dir(mut self, dir: PathBuf) -> Self {
        self.config.processing.output_dir = dir;
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.config.assemblyai.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.assemblyai.base_url = base_url.into();
        self
    }

    pub fn with_provider(mut self, provider: ProviderKind) -> Self {
        self.config.processing.provider = provider;
        self
    }

    pub fn with_openai_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.config.openai.api_key = Some(api_key.into());
        self
    }

    pub fn with_openai_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.openai.base_url = base_url.into();
        self
    }

    pub fn with_default_options(mut self, options: Value) -> Self {
        self.config.processing.default_options = Some(options);
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
