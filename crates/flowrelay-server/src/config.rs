use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

pub const DEFAULT_WELCOME_MESSAGE: &str = "Hi! How can I help you today?";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub flowise_base_url: String,
    pub flowise_api_key: Option<String>,
    pub chatflow_id: String,
    /// Persona instruction sent with every prediction; the client's default
    /// applies when unset
    pub system_message: Option<String>,
    pub welcome_message: String,
    /// Development mode: terminal error events carry the raw upstream
    /// message instead of the redacted phrase
    pub dev_mode: bool,
}

#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    #[serde(default)]
    server: ServerSection,
    flowise: Option<FlowiseSection>,
    #[serde(default)]
    chat: ChatSection,
}

#[derive(Debug, Deserialize)]
struct ServerSection {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default)]
    dev_mode: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            dev_mode: false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FlowiseSection {
    base_url: String,
    #[serde(default)]
    api_key: Option<String>,
    chatflow_id: String,
}

#[derive(Debug, Deserialize, Default)]
struct ChatSection {
    #[serde(default)]
    system_message: Option<String>,
    #[serde(default)]
    welcome_message: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl ServerConfig {
    pub fn load() -> anyhow::Result<Self> {
        if let Some(file_config) = load_from_file()? {
            let flowise = file_config
                .flowise
                .ok_or_else(|| anyhow::anyhow!("Config file is missing the [flowise] section"))?;
            return Ok(Self {
                host: file_config.server.host,
                port: file_config.server.port,
                flowise_base_url: flowise.base_url,
                flowise_api_key: flowise.api_key,
                chatflow_id: flowise.chatflow_id,
                system_message: file_config.chat.system_message,
                welcome_message: file_config
                    .chat
                    .welcome_message
                    .unwrap_or_else(|| DEFAULT_WELCOME_MESSAGE.to_string()),
                dev_mode: file_config.server.dev_mode,
            });
        }

        Self::from_env()
    }

    fn from_env() -> anyhow::Result<Self> {
        let flowise_base_url = env::var("FLOWISE_BASE_URL")
            .map_err(|_| anyhow::anyhow!("FLOWISE_BASE_URL is not set"))?;
        let chatflow_id = env::var("FLOWISE_CHATFLOW_ID")
            .map_err(|_| anyhow::anyhow!("FLOWISE_CHATFLOW_ID is not set"))?;

        let host = env::var("FLOWRELAY_SERVER_HOST").unwrap_or_else(|_| default_host());
        let port = env::var("FLOWRELAY_SERVER_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or_else(default_port);
        let dev_mode = env::var("FLOWRELAY_DEV_MODE")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(Self {
            host,
            port,
            flowise_base_url,
            flowise_api_key: env::var("FLOWISE_API_KEY").ok(),
            chatflow_id,
            system_message: env::var("FLOWRELAY_SYSTEM_MESSAGE").ok(),
            welcome_message: env::var("FLOWRELAY_WELCOME_MESSAGE")
                .unwrap_or_else(|_| DEFAULT_WELCOME_MESSAGE.to_string()),
            dev_mode,
        })
    }
}

fn load_from_file() -> anyhow::Result<Option<FileConfig>> {
    let config_path = env::var("FLOWRELAY_SERVER_CONFIG").ok();
    let path = if let Some(path) = config_path {
        Some(path)
    } else if Path::new("server.toml").exists() {
        Some("server.toml".to_string())
    } else {
        None
    };

    let Some(path) = path else {
        return Ok(None);
    };

    let contents = fs::read_to_string(&path)
        .map_err(|err| anyhow::anyhow!("Failed to read config {}: {}", path, err))?;
    let parsed: FileConfig = toml::from_str(&contents)
        .map_err(|err| anyhow::anyhow!("Failed to parse config {}: {}", path, err))?;
    Ok(Some(parsed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_config_applies_section_defaults() {
        let parsed: FileConfig = toml::from_str(
            r#"
            [flowise]
            base_url = "http://localhost:4000"
            chatflow_id = "flow-1"
            "#,
        )
        .unwrap();

        assert_eq!(parsed.server.host, "0.0.0.0");
        assert_eq!(parsed.server.port, 3000);
        assert!(!parsed.server.dev_mode);
        let flowise = parsed.flowise.unwrap();
        assert_eq!(flowise.base_url, "http://localhost:4000");
        assert!(flowise.api_key.is_none());
        assert!(parsed.chat.welcome_message.is_none());
    }

    #[test]
    fn file_config_reads_all_sections() {
        let parsed: FileConfig = toml::from_str(
            r#"
            [server]
            host = "127.0.0.1"
            port = 8080
            dev_mode = true

            [flowise]
            base_url = "http://flowise:3000"
            api_key = "secret"
            chatflow_id = "flow-2"

            [chat]
            system_message = "Be terse"
            welcome_message = "Hello!"
            "#,
        )
        .unwrap();

        assert_eq!(parsed.server.port, 8080);
        assert!(parsed.server.dev_mode);
        assert_eq!(parsed.flowise.unwrap().api_key.as_deref(), Some("secret"));
        assert_eq!(parsed.chat.system_message.as_deref(), Some("Be terse"));
        assert_eq!(parsed.chat.welcome_message.as_deref(), Some("Hello!"));
    }
}
