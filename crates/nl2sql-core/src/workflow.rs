use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

/// Reply to a translation request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Translation {
    pub sql_query: String,
    /// `high`, `medium` or `low` as judged by the model.
    #[serde(default)]
    pub confidence: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
}

/// Reply to a safety review of a generated query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SafetyVerdict {
    pub is_safe: bool,
    #[serde(default)]
    pub concerns: Vec<String>,
    #[serde(default)]
    pub suggested_fix: Option<String>,
}

/// Contract for any SQL-writing model (hosted LLM, stub).
#[async_trait]
pub trait SqlAgent: Send + Sync {
    /// Short name used for logging.
    fn name(&self) -> &'static str;

    /// Turn a question into SQL for the given schema description.
    async fn translate(&self, question: &str, schema: &str) -> Result<Translation>;

    /// Review a query for injection, performance and data-exposure risks.
    async fn assess(&self, sql: &str) -> Result<SafetyVerdict>;
}

/// State carried through the translate → assess workflow.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryState {
    pub natural_language_query: String,
    pub schema_info: String,
    pub sql_query: String,
    pub is_safe: bool,
    pub error_message: String,
    pub suggested_fix: String,
}

/// Where the workflow ends after the safety check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Warning,
}

impl QueryState {
    pub fn new(question: impl Into<String>, schema_info: impl Into<String>) -> Self {
        Self {
            natural_language_query: question.into(),
            schema_info: schema_info.into(),
            ..Self::default()
        }
    }

    pub fn outcome(&self) -> Outcome {
        if self.is_safe {
            Outcome::Success
        } else {
            Outcome::Warning
        }
    }

    /// The generated query when it passed review, the suggested fix otherwise.
    pub fn recommended_sql(&self) -> &str {
        match self.outcome() {
            Outcome::Success => &self.sql_query,
            Outcome::Warning => &self.suggested_fix,
        }
    }
}

/// Two-step query pipeline. Built once and shared by all requests.
#[derive(Clone)]
pub struct Workflow {
    agent: Arc<dyn SqlAgent>,
}

impl Workflow {
    pub fn new(agent: Arc<dyn SqlAgent>) -> Self {
        Self { agent }
    }

    pub fn agent_name(&self) -> &'static str {
        self.agent.name()
    }

    #[instrument(skip_all, fields(agent = self.agent.name()))]
    pub async fn run(&self, question: &str, schema_info: &str) -> Result<QueryState> {
        let state = QueryState::new(question, schema_info);
        let state = self.convert(state).await?;
        let state = self.safety_check(state).await?;
        match state.outcome() {
            Outcome::Success => info!("generated query passed review"),
            Outcome::Warning => warn!(concerns = %state.error_message, "generated query flagged"),
        }
        Ok(state)
    }

    async fn convert(&self, mut state: QueryState) -> Result<QueryState> {
        let translation = self
            .agent
            .translate(&state.natural_language_query, &state.schema_info)
            .await?;
        state.sql_query = translation.sql_query;
        Ok(state)
    }

    async fn safety_check(&self, mut state: QueryState) -> Result<QueryState> {
        let verdict = self.agent.assess(&state.sql_query).await?;
        state.is_safe = verdict.is_safe;
        if verdict.is_safe {
            state.error_message.clear();
            state.suggested_fix = state.sql_query.clone();
        } else {
            state.error_message = verdict.concerns.join(", ");
            state.suggested_fix = verdict.suggested_fix.unwrap_or_default();
        }
        Ok(state)
    }
}

/// Canned agent for tests and offline smoke checks.
#[derive(Debug, Clone)]
pub struct StubSqlAgent {
    pub translation: Translation,
    pub verdict: SafetyVerdict,
}

impl StubSqlAgent {
    /// Agent that always returns `sql` and approves it.
    pub fn approving(sql: impl Into<String>) -> Self {
        Self {
            translation: Translation {
                sql_query: sql.into(),
                confidence: Some("high".into()),
                explanation: None,
            },
            verdict: SafetyVerdict {
                is_safe: true,
                concerns: Vec::new(),
                suggested_fix: None,
            },
        }
    }

    /// Agent that returns `sql` and rejects it with the given concerns and fix.
    pub fn rejecting(sql: impl Into<String>, concerns: &[&str], fix: impl Into<String>) -> Self {
        Self {
            translation: Translation {
                sql_query: sql.into(),
                confidence: Some("low".into()),
                explanation: None,
            },
            verdict: SafetyVerdict {
                is_safe: false,
                concerns: concerns.iter().map(|c| c.to_string()).collect(),
                suggested_fix: Some(fix.into()),
            },
        }
    }
}

#[async_trait]
impl SqlAgent for StubSqlAgent {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn translate(&self, _question: &str, _schema: &str) -> Result<Translation> {
        Ok(self.translation.clone())
    }

    async fn assess(&self, _sql: &str) -> Result<SafetyVerdict> {
        Ok(self.verdict.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn safe_query_is_its_own_fix() {
        let workflow = Workflow::new(Arc::new(StubSqlAgent::approving(
            "SELECT * FROM dogs ORDER BY rating DESC LIMIT 5",
        )));
        let state = workflow
            .run("top 5 dogs by rating", "CREATE TABLE dogs (...);")
            .await
            .expect("workflow");

        assert_eq!(state.outcome(), Outcome::Success);
        assert_eq!(state.error_message, "");
        assert_eq!(state.suggested_fix, state.sql_query);
        assert_eq!(
            state.recommended_sql(),
            "SELECT * FROM dogs ORDER BY rating DESC LIMIT 5"
        );
        assert_eq!(state.natural_language_query, "top 5 dogs by rating");
    }

    #[tokio::test]
    async fn unsafe_query_recommends_fix() {
        let workflow = Workflow::new(Arc::new(StubSqlAgent::rejecting(
            "SELECT * FROM dogs",
            &["no LIMIT clause", "selects every column"],
            "SELECT id, name FROM dogs LIMIT 100",
        )));
        let state = workflow.run("all dogs", "").await.expect("workflow");

        assert_eq!(state.outcome(), Outcome::Warning);
        assert_eq!(state.error_message, "no LIMIT clause, selects every column");
        assert_eq!(state.sql_query, "SELECT * FROM dogs");
        assert_eq!(state.recommended_sql(), "SELECT id, name FROM dogs LIMIT 100");
    }

    struct FailingAgent;

    #[async_trait]
    impl SqlAgent for FailingAgent {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn translate(&self, _question: &str, _schema: &str) -> Result<Translation> {
            anyhow::bail!("model unavailable")
        }

        async fn assess(&self, _sql: &str) -> Result<SafetyVerdict> {
            unreachable!("assess must not run after a failed translation")
        }
    }

    #[tokio::test]
    async fn translation_failure_stops_the_workflow() {
        let workflow = Workflow::new(Arc::new(FailingAgent));
        let err = workflow.run("q", "").await.expect_err("should fail");
        assert!(err.to_string().contains("model unavailable"));
    }
}
