use config::{Config, ConfigError, Environment, File};
use secrecy::Secret;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub agent: AgentConfig,
    pub memory: MemoryConfig,
    pub browser: BrowserConfig,
    pub models: ModelsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub enable_metrics: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8000,
            allowed_origins: vec!["*".into()],
            enable_metrics: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AgentConfig {
    /// Hard cap on run-loop steps before the task is stopped.
    pub max_steps: usize,
    /// Attach a page screenshot to every decision prompt.
    pub use_vision: bool,
    /// Re-plan every N steps when a planner model is configured.
    pub planner_interval: usize,
    /// Prime prompts with long-term memory and record facts after runs.
    pub enable_memory: bool,
    /// Identity used to key long-term memory.
    pub user_id: String,
    /// Optional bound on how long `ask` waits for an operator, in seconds.
    pub ask_timeout_secs: Option<u64>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: 100,
            use_vision: false,
            planner_interval: 5,
            enable_memory: true,
            user_id: "default".into(),
            ask_timeout_secs: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct MemoryConfig {
    /// Directory holding `<user>_long_term_memory.json`. Falls back to the
    /// platform data directory when unset.
    pub directory: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BrowserConfig {
    pub executable_path: Option<String>,
    pub headless: bool,
    pub permissions: Vec<String>,
    pub user_data_dir: Option<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            executable_path: None,
            headless: false,
            permissions: vec![
                "geolocation".into(),
                "notifications".into(),
                "camera".into(),
                "microphone".into(),
                "clipboard-read".into(),
                "clipboard-write".into(),
            ],
            user_data_dir: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ModelsConfig {
    pub chat: ModelConfig,
    pub planner: Option<ModelConfig>,
    pub vision: Option<ModelConfig>,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            chat: ModelConfig::default(),
            planner: None,
            vision: Some(ModelConfig {
                provider: "openai_compatible".into(),
                model: "gemini-2.0-flash".into(),
                base_url: Some("https://generativelanguage.googleapis.com/v1beta/openai".into()),
                api_key_env: Some("GOOGLE_API_KEY".into()),
                ..ModelConfig::default()
            }),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ModelConfig {
    /// `openai`, `anthropic` or `openai_compatible`.
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<Secret<String>>,
    /// Environment variable consulted when `api_key` is unset.
    pub api_key_env: Option<String>,
    pub temperature: Option<f32>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "openai".into(),
            model: "gpt-4.1".into(),
            base_url: None,
            api_key: None,
            api_key_env: None,
            temperature: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct LoggingConfig {
    pub json: bool,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("BROWZEE_ENV").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(File::with_name("config/local").required(false))
            // Map BROWZEE__SERVER__PORT=8000 to server.port
            .add_source(Environment::with_prefix("BROWZEE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.server.port, 8000);
        assert_eq!(cfg.agent.max_steps, 100);
        assert!(cfg.agent.enable_memory);
        assert!(cfg.browser.permissions.contains(&"geolocation".to_string()));
        assert_eq!(cfg.models.chat.model, "gpt-4.1");
    }

    #[test]
    fn test_partial_source_keeps_defaults() {
        let cfg: AppConfig = Config::builder()
            .add_source(config::File::from_str(
                "[agent]\nmax_steps = 7\n[server]\nport = 9100\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(cfg.agent.max_steps, 7);
        assert_eq!(cfg.server.port, 9100);
        assert_eq!(cfg.server.host, "127.0.0.1");
        assert_eq!(cfg.agent.user_id, "default");
    }
}
