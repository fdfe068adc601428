//! OpenAI-compatible chat-completions producer.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

use super::DeckProducer;
use super::prompt::{CONTENT_SYSTEM_PROMPT, OUTLINE_SYSTEM_PROMPT, strip_code_fence};
use crate::types::{Deck, Outline, Slide};
use crate::{Error, ErrorKind, Result, TRACING_TARGET_GENERATE};

/// Default endpoint of the hosted model.
pub const DEFAULT_BASE_URL: &str = "https://api.deepseek.com";

/// Default chat model.
pub const DEFAULT_MODEL: &str = "deepseek-chat";

/// Default sampling temperature; low to keep JSON output stable.
pub const DEFAULT_TEMPERATURE: f32 = 0.1;

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Configuration of the OpenAI-compatible producer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(clap::Args))]
pub struct OpenAiConfig {
    /// API key sent as a bearer token.
    #[cfg_attr(
        feature = "config",
        arg(long = "llm-api-key", env = "LLM_API_KEY", default_value = "", hide_env_values = true)
    )]
    #[serde(default)]
    pub llm_api_key: String,

    /// Base URL of the chat-completions API.
    #[cfg_attr(
        feature = "config",
        arg(long = "llm-base-url", env = "LLM_BASE_URL", default_value = DEFAULT_BASE_URL)
    )]
    #[serde(default = "default_base_url")]
    pub llm_base_url: String,

    /// Model identifier.
    #[cfg_attr(
        feature = "config",
        arg(long = "llm-model", env = "LLM_MODEL", default_value = DEFAULT_MODEL)
    )]
    #[serde(default = "default_model")]
    pub llm_model: String,

    /// Sampling temperature.
    #[cfg_attr(
        feature = "config",
        arg(long = "llm-temperature", env = "LLM_TEMPERATURE", default_value_t = DEFAULT_TEMPERATURE)
    )]
    #[serde(default = "default_temperature")]
    pub llm_temperature: f32,

    /// Request timeout in seconds.
    #[cfg_attr(
        feature = "config",
        arg(long = "llm-timeout", env = "LLM_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)
    )]
    #[serde(default = "default_timeout_secs")]
    pub llm_timeout: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_owned()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_owned()
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            llm_api_key: String::new(),
            llm_base_url: default_base_url(),
            llm_model: default_model(),
            llm_temperature: default_temperature(),
            llm_timeout: default_timeout_secs(),
        }
    }
}

impl OpenAiConfig {
    /// Creates a configuration for the default endpoint with the given key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            llm_api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.llm_base_url = base_url.into();
        self
    }

    /// Sets the model identifier.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.llm_model = model.into();
        self
    }

    /// Returns the request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout)
    }

    /// Returns the full chat-completions endpoint.
    pub fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.llm_base_url.trim_end_matches('/')
        )
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.llm_api_key.trim().is_empty() {
            return Err(Error::configuration().with_message("LLM_API_KEY is not set"));
        }
        let base_url = Url::parse(&self.llm_base_url).map_err(|e| {
            Error::configuration()
                .with_message(format!("invalid base url '{}'", self.llm_base_url))
                .with_source(e)
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(Error::configuration().with_message("base url must use http or https"));
        }
        if self.llm_model.trim().is_empty() {
            return Err(Error::configuration().with_message("model name cannot be empty"));
        }
        if !(0.0..=2.0).contains(&self.llm_temperature) {
            return Err(Error::configuration().with_message("temperature must be within 0.0..=2.0"));
        }
        if self.llm_timeout == 0 {
            return Err(Error::configuration().with_message("timeout must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Models sometimes answer with the bare slide list instead of a deck.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ContentReply {
    Deck(Deck),
    Slides(Vec<Slide>),
}

/// Producer backed by an OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiProducer {
    http: Client,
    config: OpenAiConfig,
}

impl OpenAiProducer {
    /// Creates a producer, failing fast on invalid configuration.
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        config.validate()?;

        let http = Client::builder()
            .timeout(config.timeout())
            .user_agent(format!("deckflow/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        tracing::info!(
            target: TRACING_TARGET_GENERATE,
            base_url = %config.llm_base_url,
            model = %config.llm_model,
            "OpenAI-compatible producer created"
        );

        Ok(Self { http, config })
    }

    /// Returns the producer configuration.
    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.config.llm_model,
            temperature: self.config.llm_temperature,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        };

        let response = self
            .http
            .post(self.config.completions_url())
            .bearer_auth(&self.config.llm_api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::new(status_kind(status))
                .with_message(format!("completion request returned {status}: {body}")));
        }

        let response: ChatResponse = response.json().await?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| Error::external_error().with_message("completion returned no content"))
    }
}

fn status_kind(status: StatusCode) -> ErrorKind {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ErrorKind::Authentication,
        StatusCode::TOO_MANY_REQUESTS => ErrorKind::RateLimited,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ErrorKind::Timeout,
        s if s.is_server_error() => ErrorKind::ServiceUnavailable,
        _ => ErrorKind::ExternalError,
    }
}

fn parse_outline(reply: &str) -> Result<Outline> {
    let outline: Outline = serde_json::from_str(strip_code_fence(reply))?;
    if outline.is_empty() {
        return Err(Error::external_error().with_message("model returned an outline without sections"));
    }
    Ok(outline)
}

fn parse_content(reply: &str, outline: &Outline) -> Result<Deck> {
    let deck = match serde_json::from_str(strip_code_fence(reply))? {
        ContentReply::Deck(deck) => deck,
        ContentReply::Slides(slides) => Deck::new(outline.main_topic.clone(), slides),
    };
    if deck.slides.is_empty() {
        return Err(Error::external_error().with_message("model returned a deck without slides"));
    }
    Ok(deck)
}

#[async_trait::async_trait]
impl DeckProducer for OpenAiProducer {
    async fn produce_outline(&self, prompt: &str) -> Result<Outline> {
        let reply = self.complete(OUTLINE_SYSTEM_PROMPT, prompt).await?;
        parse_outline(&reply)
    }

    async fn produce_content(&self, outline: &Outline, prompt: &str) -> Result<Deck> {
        let outline_json = serde_json::to_string(outline)?;
        let user = format!("Request: {prompt}\n\nOutline JSON:\n{outline_json}");
        let reply = self.complete(CONTENT_SYSTEM_PROMPT, &user).await?;
        parse_content(&reply, outline)
    }

    fn producer_name(&self) -> &str {
        "openai"
    }
}
