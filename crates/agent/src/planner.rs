//! Planner adapter: prompt assembly, the LLM call, and tolerant decoding.

use chrono::Local;
use parley_config::{BotConfig, ConfigError, LlmConfig};
use parley_core::error::ProviderError;
use parley_core::event::Event;
use parley_core::message::Message;
use parley_core::provider::{Provider, ProviderRequest};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::action::ActionRecord;
use crate::context::UnreadSummary;
use crate::parse::{self, ParseError};
use crate::prompts::{self, DecisionInput};

#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The cycle was superseded while waiting on the model.
    #[error("planning cancelled")]
    Cancelled,

    #[error("model returned an empty response")]
    EmptyResponse,

    #[error("could not decode model response: {0}")]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// What the planner sees for one decision.
pub struct PlanningInput {
    pub messages: Vec<Message>,
    pub actions: Vec<ActionRecord>,
    pub unread: UnreadSummary,
    pub incoming: Option<Event>,
}

pub struct Planner {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    think: Option<bool>,
    system_prompt: String,
}

impl Planner {
    /// Build a planner. Missing API key, base URL, or model is fatal here,
    /// never per call.
    pub fn new(
        provider: Arc<dyn Provider>,
        llm: &LlmConfig,
        bot: &BotConfig,
    ) -> Result<Self, PlannerError> {
        let credentials = llm.require()?;
        Ok(Self {
            provider,
            model: credentials.model,
            temperature: llm.temperature,
            think: llm.disable_think.then_some(false),
            system_prompt: prompts::system_prompt(bot, llm),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, input: &PlanningInput) -> ProviderRequest {
        let mut messages = Vec::with_capacity(input.messages.len() + 2);
        messages.push(Message::system(&self.system_prompt));
        messages.extend(input.messages.iter().cloned());
        messages.push(Message::user(prompts::decision_prompt(&DecisionInput {
            actions: &input.actions,
            unread: &input.unread,
            incoming: input.incoming.as_ref(),
            now: Local::now(),
        })));

        let mut request = ProviderRequest::new(&self.model, messages);
        request.temperature = self.temperature;
        request.think = self.think;
        request
    }

    /// Ask the model for the next action and decode it into a flat
    /// `{"action": ..., ...}` object.
    pub async fn decide(
        &self,
        input: &PlanningInput,
        cancel: &CancellationToken,
    ) -> Result<Value, PlannerError> {
        let request = self.build_request(input);

        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(PlannerError::Cancelled),
            response = self.provider.complete(request) => response?,
        };

        let text = parse::strip_think_tags(&response.text);
        let text = text.trim();
        if text.is_empty() {
            return Err(PlannerError::EmptyResponse);
        }

        if let Some(usage) = response.usage {
            info!(
                model = %response.model,
                unread = input.unread.total,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                total_tokens = usage.total_tokens,
                "Generated action"
            );
        }
        debug!(response = %text, "Raw planner response");

        Ok(parse::parse_action_payload(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parley_core::provider::{ProviderResponse, Usage};
    use std::sync::Mutex;

    struct MockProvider {
        reply: String,
        seen: Mutex<Vec<ProviderRequest>>,
    }

    impl MockProvider {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.into(),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Provider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }

        async fn complete(
            &self,
            request: ProviderRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            self.seen.lock().unwrap().push(request);
            Ok(ProviderResponse {
                text: self.reply.clone(),
                usage: Some(Usage::default()),
                model: "mock-model".into(),
            })
        }
    }

    struct NeverProvider;

    #[async_trait]
    impl Provider for NeverProvider {
        fn name(&self) -> &str {
            "never"
        }

        async fn complete(&self, _: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            std::future::pending().await
        }
    }

    fn llm() -> LlmConfig {
        LlmConfig {
            api_key: Some("sk".into()),
            base_url: Some("http://localhost".into()),
            model: Some("test-model".into()),
            ..LlmConfig::default()
        }
    }

    fn input() -> PlanningInput {
        PlanningInput {
            messages: vec![Message::assistant("earlier reply")],
            actions: vec![],
            unread: UnreadSummary::default(),
            incoming: None,
        }
    }

    #[test]
    fn missing_model_is_fatal_at_construction() {
        let config = LlmConfig {
            model: None,
            ..llm()
        };
        let result = Planner::new(MockProvider::new("{}"), &config, &BotConfig::default());
        assert!(matches!(result, Err(PlannerError::Config(_))));
    }

    #[tokio::test]
    async fn decide_assembles_prompt_and_flattens() {
        let provider = MockProvider::new(
            r#"{"action":"send_message","parameters":{"channelId":"c1","content":"hi"}}"#,
        );
        let config = LlmConfig {
            disable_think: true,
            ..llm()
        };
        let planner = Planner::new(provider.clone(), &config, &BotConfig::default()).unwrap();

        let value = planner
            .decide(&input(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            value,
            serde_json::json!({"action": "send_message", "channelId": "c1", "content": "hi"})
        );

        let seen = provider.seen.lock().unwrap();
        let request = &seen[0];
        assert_eq!(request.model, "test-model");
        assert_eq!(request.think, Some(false));
        assert_eq!(request.messages.len(), 3);
        assert_eq!(request.messages[0].role, parley_core::Role::System);
        assert_eq!(request.messages[1].content, "earlier reply");
        assert!(request.messages[2].content.contains("History actions:"));
    }

    #[tokio::test]
    async fn think_only_response_is_empty() {
        let planner =
            Planner::new(MockProvider::new("<think>hmm</think>  "), &llm(), &BotConfig::default())
                .unwrap();
        let err = planner
            .decide(&input(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PlannerError::EmptyResponse));
    }

    #[tokio::test]
    async fn prose_response_is_parse_error() {
        let planner =
            Planner::new(MockProvider::new("I think I will wait."), &llm(), &BotConfig::default())
                .unwrap();
        let err = planner
            .decide(&input(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PlannerError::Parse(ParseError::NoJson)));
    }

    #[tokio::test]
    async fn cancellation_interrupts_pending_call() {
        let planner = Planner::new(Arc::new(NeverProvider), &llm(), &BotConfig::default()).unwrap();
        let token = CancellationToken::new();
        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            cancel.cancel();
        });

        let err = planner.decide(&input(), &token).await.unwrap_err();
        assert!(matches!(err, PlannerError::Cancelled));
    }
}
