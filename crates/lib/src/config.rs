//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.relay/config.json`) and environment.
//! Built once at startup and passed by value into the server; business logic never reads env.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default inference endpoint (Hugging Face hosted GPT-2).
pub const DEFAULT_LLM_ENDPOINT: &str =
    "https://api-inference.huggingface.co/models/openai-community/gpt2";

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// HTTP + WebSocket server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Remote text-generation endpoint and credential.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Response composition options.
    #[serde(default)]
    pub conversation: ConversationConfig,
}

/// Server bind and port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Port for HTTP and WebSocket (default 5050). Overridden by RELAY_PORT or EXPRESS_PORT env.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bind address (default "0.0.0.0").
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_port() -> u16 {
    5050
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
        }
    }
}

/// Generation endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmConfig {
    /// Full URL of the text-generation model endpoint.
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    /// Bearer credential. Overridden by HUGGINGFACE_API_TOKEN env.
    #[serde(default)]
    pub api_token: Option<String>,
}

fn default_llm_endpoint() -> String {
    DEFAULT_LLM_ENDPOINT.to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            api_token: None,
        }
    }
}

/// Whether the generation call happens for requests an override rule will answer anyway.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GenerationPolicy {
    /// Always call the model first; overrides are applied on top of its reply.
    /// A generation fault therefore also hides the override replies.
    #[default]
    Always,

    /// Skip the model call when a text-replacing override is certain to apply.
    SkipOverridden,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationConfig {
    #[serde(default)]
    pub generation: GenerationPolicy,
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

/// Resolve the generation bearer token: env HUGGINGFACE_API_TOKEN overrides config.
pub fn resolve_api_token(config: &Config) -> Option<String> {
    token_from(non_empty_env("HUGGINGFACE_API_TOKEN"), config)
}

fn token_from(env: Option<String>, config: &Config) -> Option<String> {
    env.map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            config
                .llm
                .api_token
                .as_ref()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
}

/// Resolve the listen port: env RELAY_PORT (or EXPRESS_PORT, read by older deployments)
/// overrides config when it parses as a port.
pub fn resolve_port(config: &Config) -> u16 {
    port_from(
        non_empty_env("RELAY_PORT").or_else(|| non_empty_env("EXPRESS_PORT")),
        config,
    )
}

fn port_from(raw: Option<String>, config: &Config) -> u16 {
    let Some(raw) = raw.filter(|s| !s.trim().is_empty()) else {
        return config.server.port;
    };
    match raw.trim().parse::<u16>() {
        Ok(port) => port,
        Err(_) => {
            log::warn!("ignoring invalid port override {:?}", raw);
            config.server.port
        }
    }
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("RELAY_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".relay").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Load config from the given path (or the default). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 5050);
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.llm.endpoint, DEFAULT_LLM_ENDPOINT);
        assert!(config.llm.api_token.is_none());
        assert_eq!(config.conversation.generation, GenerationPolicy::Always);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: Config = serde_json::from_str(
            r#"{ "server": { "port": 8080 }, "conversation": { "generation": "skipOverridden" } }"#,
        )
        .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.llm.endpoint, DEFAULT_LLM_ENDPOINT);
        assert_eq!(
            config.conversation.generation,
            GenerationPolicy::SkipOverridden
        );
    }

    #[test]
    fn load_missing_file_gives_defaults() {
        let path = std::env::temp_dir().join(format!(
            "relay-config-missing-{}.json",
            uuid::Uuid::new_v4()
        ));
        let (config, used) = load_config(Some(path.clone())).unwrap();
        assert_eq!(used, path);
        assert_eq!(config.server.port, 5050);
    }

    #[test]
    fn load_invalid_file_is_error() {
        let path = std::env::temp_dir().join(format!(
            "relay-config-invalid-{}.json",
            uuid::Uuid::new_v4()
        ));
        std::fs::write(&path, b"{ not json").unwrap();
        let err = load_config(Some(path.clone())).unwrap_err();
        assert!(format!("{:#}", err).contains("parsing config"));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn token_env_overrides_config() {
        let mut config = Config::default();
        config.llm.api_token = Some("hf_config".to_string());
        assert_eq!(
            token_from(Some("hf_env".to_string()), &config).as_deref(),
            Some("hf_env")
        );
        assert_eq!(token_from(None, &config).as_deref(), Some("hf_config"));
        assert_eq!(
            token_from(Some("  ".to_string()), &config).as_deref(),
            Some("hf_config")
        );
    }

    #[test]
    fn blank_config_token_is_none() {
        let mut config = Config::default();
        assert_eq!(token_from(None, &config), None);
        config.llm.api_token = Some("   ".to_string());
        assert_eq!(token_from(None, &config), None);
        config.llm.api_token = Some(" hf_padded ".to_string());
        assert_eq!(token_from(None, &config).as_deref(), Some("hf_padded"));
    }

    #[test]
    fn port_override_valid_invalid_absent() {
        let mut config = Config::default();
        config.server.port = 8080;
        assert_eq!(port_from(Some("9090".to_string()), &config), 9090);
        assert_eq!(port_from(Some(" 9091 ".to_string()), &config), 9091);
        assert_eq!(port_from(Some("not-a-port".to_string()), &config), 8080);
        assert_eq!(port_from(Some("70000".to_string()), &config), 8080);
        assert_eq!(port_from(Some("".to_string()), &config), 8080);
        assert_eq!(port_from(None, &config), 8080);
        assert_eq!(port_from(None, &Config::default()), 5050);
    }
}
