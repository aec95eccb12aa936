use crate::error::{ConfigError, Result};
use scraper::Selector;
use serde::Deserialize;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_directory")]
    pub directory: String,
    #[serde(default = "default_log_filename")]
    pub filename: String,
}

/// Where chapter content lives on the hosting site.
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Element hosting the encapsulated (shadow root) article.
    #[serde(default = "default_host_selector")]
    pub host_selector: String,
    /// Designated content node inside the shadow root.
    #[serde(default = "default_content_selector")]
    pub content_selector: String,
    /// Conventional containers tried in order when no shadow root exists.
    #[serde(default = "default_fallback_selectors")]
    pub fallback_selectors: Vec<String>,
    /// Substring identifying post links on the host.
    #[serde(default = "default_post_url_pattern")]
    pub post_url_pattern: String,
    /// Lowercase fragments that mark a "next chapter" link.
    #[serde(default = "default_next_link_labels")]
    pub next_link_labels: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Pages processed per invocation before the walk suspends; unlimited when absent.
    #[serde(default)]
    pub stop_after: Option<usize>,

    #[serde(default = "default_state_file")]
    pub state_file: String,

    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_accept_language")]
    pub accept_language: String,

    #[serde(default)]
    pub site: SiteConfig,

    #[serde(default)]
    pub logging: LogConfig,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: default_log_directory(),
            filename: default_log_filename(),
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            host_selector: default_host_selector(),
            content_selector: default_content_selector(),
            fallback_selectors: default_fallback_selectors(),
            post_url_pattern: default_post_url_pattern(),
            next_link_labels: default_next_link_labels(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
            max_pages: default_max_pages(),
            stop_after: None,
            state_file: default_state_file(),
            output_dir: default_output_dir(),
            user_agent: default_user_agent(),
            accept_language: default_accept_language(),
            site: SiteConfig::default(),
            logging: LogConfig::default(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::FileRead)?;
        Self::from_toml(&content)
    }

    /// Loads `path` when it exists, otherwise falls back to built-in defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            let config = Config::default();
            config.validate()?;
            Ok(config)
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::Parse)?;

        config.validate()?;
        info!("Configuration loaded successfully");
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.max_pages == 0 {
            return Err(ConfigError::InvalidValue(
                "max_pages must be greater than 0".to_string(),
            )
            .into());
        }

        if self.stop_after == Some(0) {
            return Err(ConfigError::InvalidValue(
                "stop_after must be greater than 0 when set".to_string(),
            )
            .into());
        }

        if self.state_file.is_empty() {
            return Err(ConfigError::MissingField("state_file".to_string()).into());
        }

        if self.output_dir.is_empty() {
            return Err(ConfigError::MissingField("output_dir".to_string()).into());
        }

        if self.site.post_url_pattern.is_empty() {
            return Err(ConfigError::MissingField("site.post_url_pattern".to_string()).into());
        }

        if self.site.next_link_labels.iter().any(|l| l.trim().is_empty()) {
            return Err(ConfigError::InvalidValue(
                "site.next_link_labels cannot contain empty labels".to_string(),
            )
            .into());
        }

        let selectors = [&self.site.host_selector, &self.site.content_selector]
            .into_iter()
            .chain(self.site.fallback_selectors.iter());
        for selector in selectors {
            Selector::parse(selector).map_err(|e| {
                ConfigError::InvalidValue(format!("invalid selector {:?}: {}", selector, e))
            })?;
        }

        Ok(())
    }
}

fn default_delay_ms() -> u64 {
    2000
}

fn default_max_pages() -> usize {
    5
}

fn default_state_file() -> String {
    ".scraper-state.json".to_string()
}

fn default_output_dir() -> String {
    "Chapters_Untranslated".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36".to_string()
}

fn default_accept_language() -> String {
    "en-US,en;q=0.7".to_string()
}

fn default_host_selector() -> String {
    ".article-host".to_string()
}

fn default_content_selector() -> String {
    ".fr-view".to_string()
}

fn default_fallback_selectors() -> Vec<String> {
    vec![
        ".kfds-c-post-content".to_string(),
        "[data-testid=\"post-content\"]".to_string(),
        ".post-body".to_string(),
    ]
}

fn default_post_url_pattern() -> String {
    "ko-fi.com/post".to_string()
}

fn default_next_link_labels() -> Vec<String> {
    vec!["next chapter".to_string(), ">> next".to_string()]
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_directory() -> String {
    "logs".to_string()
}

fn default_log_filename() -> String {
    "scraper.log".to_string()
}
