use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chat_socket::BackoffPolicy;
use serde::{Deserialize, Serialize};
use tracing::info;

// =============================================================================
// File config (figment-deserialized from defaults / config.toml / env vars)
// =============================================================================
//
//   config.toml:     [widget]
//                    agent_key = "apollo"
//
//   env var:         WIDGET_WIDGET__AGENT_KEY=apollo   (double underscore = nesting)
//
//   CLI flags (--page-url, --chat-url) override both.

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub widget: WidgetFileConfig,
    #[serde(default)]
    pub connection: ConnectionFileConfig,
    #[serde(default)]
    pub questions: QuestionsFileConfig,
}

/// Per-deployment settings (lives under `[widget]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WidgetFileConfig {
    #[serde(default)]
    pub chat_url: Option<String>,
    #[serde(default)]
    pub phone_submit_url: Option<String>,
    #[serde(default)]
    pub agent_key: Option<String>,
    #[serde(default)]
    pub agent_name: Option<String>,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub page_url: Option<String>,
    #[serde(default = "default_company_name")]
    pub company_name: String,
    #[serde(default = "default_introduction_text")]
    pub introduction_text: String,
    #[serde(default = "default_input_placeholder")]
    pub input_placeholder: String,
    #[serde(default = "default_question_count")]
    pub show_number_of_questions: usize,
    #[serde(default = "default_question_count")]
    pub collect_mobile_after_number_of_question: usize,
}

impl Default for WidgetFileConfig {
    fn default() -> Self {
        Self {
            chat_url: None,
            phone_submit_url: None,
            agent_key: None,
            agent_name: None,
            project_name: None,
            page_url: None,
            company_name: default_company_name(),
            introduction_text: default_introduction_text(),
            input_placeholder: default_input_placeholder(),
            show_number_of_questions: default_question_count(),
            collect_mobile_after_number_of_question: default_question_count(),
        }
    }
}

/// Socket tunables (lives under `[connection]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectionFileConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_wait_timeout_ms")]
    pub wait_timeout_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for ConnectionFileConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            wait_timeout_ms: default_wait_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Suggested questions (lives under `[questions]` in config.toml).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct QuestionsFileConfig {
    #[serde(default)]
    pub default: Vec<String>,
    #[serde(default)]
    pub projects: Vec<ProjectQuestions>,
}

/// Questions used when the page URL contains `url`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectQuestions {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub questions: Vec<String>,
}

fn default_company_name() -> String {
    "Assistant".to_string()
}
fn default_introduction_text() -> String {
    "### Welcome! Ask me anything.".to_string()
}
fn default_input_placeholder() -> String {
    "Type your question here...".to_string()
}
fn default_question_count() -> usize {
    3
}
fn default_max_retries() -> u32 {
    chat_socket::MAX_RETRIES
}
fn default_base_delay_ms() -> u64 {
    1000
}
fn default_max_delay_ms() -> u64 {
    30_000
}
fn default_wait_timeout_ms() -> u64 {
    5000
}
fn default_poll_interval_ms() -> u64 {
    500
}

/// Build a figment that layers: defaults → config.toml → WIDGET_* env vars.
///
/// Env vars use double-underscore for nesting into sections:
///   `WIDGET_WIDGET__CHAT_URL=wss://...`  →  `widget.chat_url`
///   `WIDGET_CONNECTION__MAX_RETRIES=3`   →  `connection.max_retries = 3`
pub fn load_config(data_dir: &Path) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(data_dir.join("config.toml")))
        .merge(Env::prefixed("WIDGET_").split("__"))
}

/// Values given on the command line; they win over every other layer.
#[derive(Clone, Debug, Default)]
pub struct CliOverrides {
    pub page_url: Option<String>,
    pub chat_url: Option<String>,
}

impl CliOverrides {
    pub fn apply(&self, figment: figment::Figment) -> figment::Figment {
        let mut figment = figment;
        if let Some(url) = &self.page_url {
            figment = figment.merge(("widget.page_url", url));
        }
        if let Some(url) = &self.chat_url {
            figment = figment.merge(("widget.chat_url", url));
        }
        figment
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting `widget.{0}`")]
    Missing(&'static str),
}

// =============================================================================
// Runtime config (validated view used by the session)
// =============================================================================

#[derive(Clone, Debug)]
pub struct WidgetConfig {
    pub chat_url: String,
    pub phone_submit_url: String,
    pub agent_key: String,
    pub agent_name: String,
    pub project_name: String,
    pub page_url: String,
    pub company_name: String,
    pub introduction_text: String,
    pub input_placeholder: String,
    pub show_number_of_questions: usize,
    pub collect_mobile_after_number_of_question: usize,
}

fn required(value: &Option<String>, field: &'static str) -> Result<String, ConfigError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(ConfigError::Missing(field))
}

impl WidgetConfig {
    pub fn from_file(fc: &WidgetFileConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            chat_url: required(&fc.chat_url, "chat_url")?,
            phone_submit_url: required(&fc.phone_submit_url, "phone_submit_url")?,
            agent_key: required(&fc.agent_key, "agent_key")?,
            agent_name: required(&fc.agent_name, "agent_name")?,
            project_name: required(&fc.project_name, "project_name")?,
            page_url: required(&fc.page_url, "page_url")?,
            company_name: fc.company_name.clone(),
            introduction_text: fc.introduction_text.clone(),
            input_placeholder: fc.input_placeholder.clone(),
            show_number_of_questions: fc.show_number_of_questions,
            collect_mobile_after_number_of_question: fc.collect_mobile_after_number_of_question,
        })
    }
}

#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    pub backoff: BackoffPolicy,
    /// Total time to wait for the socket before a send gives up.
    pub wait_timeout: Duration,
    pub poll_interval: Duration,
}

impl ConnectionConfig {
    pub fn from_file(fc: &ConnectionFileConfig) -> Self {
        Self {
            backoff: BackoffPolicy {
                base: Duration::from_millis(fc.base_delay_ms),
                max_delay: Duration::from_millis(fc.max_delay_ms),
                max_retries: fc.max_retries,
            },
            wait_timeout: Duration::from_millis(fc.wait_timeout_ms),
            poll_interval: Duration::from_millis(fc.poll_interval_ms),
        }
    }
}

// =============================================================================
// Directory layout (not tunable via figment, derived from --data-dir)
// =============================================================================

#[derive(Clone, Debug)]
pub struct WidgetPaths {
    pub data_dir: PathBuf,
}

impl WidgetPaths {
    pub fn new(custom_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = match custom_dir {
            Some(dir) => dir,
            None => dirs::home_dir()
                .context("Could not find home directory")?
                .join(".chat-widget"),
        };

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;

        info!("Data directory: {}", data_dir.display());

        Ok(Self { data_dir })
    }

    pub fn config_toml_path(&self) -> PathBuf {
        self.data_dir.join("config.toml")
    }

    pub fn guest_id_path(&self) -> PathBuf {
        self.data_dir.join("guest_id")
    }
}
