use std::sync::Arc;

use async_trait::async_trait;
use nl2sql_agent::openai::{LlmSettings, OpenAiSqlAgent, DEFAULT_MODEL, GROQ_API_BASE};
use nl2sql_core::workflow::{SafetyVerdict, SqlAgent, Translation};
use tracing::warn;

use crate::config::Config;

/// Pick the SQL agent for this process. Without an API key the service still
/// starts so the database can be configured; conversions then fail.
pub fn build_agent(config: &Config) -> Arc<dyn SqlAgent> {
    if let Some(settings) = resolve_llm_settings(config, |name| std::env::var(name).ok()) {
        match OpenAiSqlAgent::new(settings) {
            Ok(agent) => return Arc::new(agent),
            Err(err) => warn!("failed to init LLM agent: {err:#}"),
        }
    } else {
        warn!("no LLM API key configured; set NL2SQL_LLM_API_KEY or GROQ_API_KEY");
    }
    Arc::new(OfflineAgent)
}

/// Merge the `[llm]` section with environment fallbacks. `None` when no API
/// key is available anywhere.
pub fn resolve_llm_settings(
    config: &Config,
    env: impl Fn(&str) -> Option<String>,
) -> Option<LlmSettings> {
    let llm = config.llm.clone().unwrap_or_default();
    let api_key = llm
        .api_key
        .or_else(|| env("NL2SQL_LLM_API_KEY"))
        .or_else(|| env("GROQ_API_KEY"))?;

    Some(LlmSettings {
        api_key,
        model: llm.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        api_base: Some(llm.endpoint.unwrap_or_else(|| GROQ_API_BASE.to_string())),
    })
}

/// Agent used when no provider is configured.
pub struct OfflineAgent;

#[async_trait]
impl SqlAgent for OfflineAgent {
    fn name(&self) -> &'static str {
        "offline"
    }

    async fn translate(&self, _question: &str, _schema: &str) -> anyhow::Result<Translation> {
        anyhow::bail!("no LLM API key configured")
    }

    async fn assess(&self, _sql: &str) -> anyhow::Result<SafetyVerdict> {
        anyhow::bail!("no LLM API key configured")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmConfig;

    #[test]
    fn config_key_wins_over_environment() {
        let config = Config {
            llm: Some(LlmConfig {
                api_key: Some("from-config".into()),
                model: Some("llama-3.3-70b-versatile".into()),
                endpoint: None,
            }),
            ..Config::default()
        };
        let settings =
            resolve_llm_settings(&config, |_| Some("from-env".into())).expect("settings");
        assert_eq!(settings.api_key, "from-config");
        assert_eq!(settings.model, "llama-3.3-70b-versatile");
        assert_eq!(settings.api_base.as_deref(), Some(GROQ_API_BASE));
    }

    #[test]
    fn falls_back_to_groq_key() {
        let settings = resolve_llm_settings(&Config::default(), |name| {
            (name == "GROQ_API_KEY").then(|| "gsk".to_string())
        })
        .expect("settings");
        assert_eq!(settings.api_key, "gsk");
        assert_eq!(settings.model, DEFAULT_MODEL);
    }

    #[test]
    fn no_key_means_no_settings() {
        assert!(resolve_llm_settings(&Config::default(), |_| None).is_none());
    }

    #[tokio::test]
    async fn offline_agent_refuses_work() {
        let err = OfflineAgent.translate("q", "").await.expect_err("offline");
        assert!(err.to_string().contains("no LLM API key"));
    }
}
