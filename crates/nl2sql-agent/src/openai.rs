use std::time::Duration;

use anyhow::{Context, Result};
use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessageArgs,
        ChatCompletionRequestUserMessageContent, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use nl2sql_core::workflow::{SafetyVerdict, SqlAgent, Translation};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{prompts, reply};

pub const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL: &str = "mixtral-8x7b-32768";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Connection settings for an OpenAI-compatible chat endpoint.
#[derive(Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct LlmSettings {
    pub api_key: String,
    pub model: String,
    pub api_base: Option<String>,
}

impl LlmSettings {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            model: DEFAULT_MODEL.to_string(),
            api_base: Some(GROQ_API_BASE.to_string()),
        }
    }
}

impl std::fmt::Debug for LlmSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmSettings")
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

/// SQL agent backed by chat completions at temperature 0.
pub struct OpenAiSqlAgent {
    client: Client<OpenAIConfig>,
    settings: LlmSettings,
}

impl OpenAiSqlAgent {
    pub fn new(settings: LlmSettings) -> Result<Self> {
        let mut config = OpenAIConfig::new().with_api_key(&settings.api_key);
        if let Some(base) = &settings.api_base {
            config = config.with_api_base(base);
        }
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("building http client")?;
        let client = Client::with_config(config).with_http_client(http);
        Ok(Self { client, settings })
    }

    async fn complete(&self, prompt: prompts::Prompt) -> Result<String> {
        let system = ChatCompletionRequestMessage::System(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(ChatCompletionRequestSystemMessageContent::Text(
                    prompt.system,
                ))
                .build()
                .context("building system message")?,
        );

        let user = ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessageArgs::default()
                .content(ChatCompletionRequestUserMessageContent::Text(prompt.user))
                .build()
                .context("building user message")?,
        );

        let req = CreateChatCompletionRequestArgs::default()
            .model(self.settings.model.clone())
            .temperature(0.0)
            .messages(vec![system, user])
            .build()
            .context("building chat completion request")?;

        let resp = self
            .client
            .chat()
            .create(req)
            .await
            .context("chat completion failed")?;

        let choice = resp
            .choices
            .into_iter()
            .next()
            .context("model returned no choices")?;
        let content = choice.message.content.unwrap_or_default();
        debug!(chars = content.len(), "model replied");
        Ok(content)
    }
}

#[async_trait]
impl SqlAgent for OpenAiSqlAgent {
    fn name(&self) -> &'static str {
        "openai"
    }

    #[instrument(skip_all, fields(model = %self.settings.model))]
    async fn translate(&self, question: &str, schema: &str) -> Result<Translation> {
        let content = self.complete(prompts::translate(question, schema)).await?;
        reply::parse_json(&content).context("parsing translation")
    }

    #[instrument(skip_all, fields(model = %self.settings.model))]
    async fn assess(&self, sql: &str) -> Result<SafetyVerdict> {
        let content = self.complete(prompts::safety(sql)).await?;
        reply::parse_json(&content).context("parsing safety verdict")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_default_to_groq() {
        let settings = LlmSettings::new("key".into());
        assert_eq!(settings.model, DEFAULT_MODEL);
        assert_eq!(settings.api_base.as_deref(), Some(GROQ_API_BASE));
    }

    #[test]
    fn settings_debug_hides_api_key() {
        let settings = LlmSettings::new("gsk_secret".into());
        assert!(!format!("{settings:?}").contains("gsk_secret"));
    }

    #[test]
    fn agent_builds_without_network() {
        let agent = OpenAiSqlAgent::new(LlmSettings::new("key".into())).expect("agent");
        assert_eq!(agent.name(), "openai");
    }
}
