use std::sync::Arc;

use async_trait::async_trait;
use parley_core::{LLMProvider, Message, Role};
use tracing::{info, warn};

use crate::{
    ContextStrategy, SessionUpdate, StrategyInput, StrategyResult, join, model_view, partition,
};

pub const SUMMARY_SYSTEM_PROMPT: &str = "You compress conversations. Summarize the conversation below so it can replace the original messages. Keep every fact about the user, decisions made, open questions, tool results that matter, and the current goal. Write in the third person, be concise, and do not add anything that was not said.";

/// Prefix carried by every summary message.
pub const SUMMARY_PREFIX: &str = "Summary of the earlier conversation:\n";

/// Compresses older conversational messages into a single summary once the
/// history is over budget.
///
/// The most recent `keep_recent` messages are sent verbatim. The summary is
/// returned as a session update with the `summary` role so later turns can
/// fold it into the next summary; the original messages stay in the session.
pub struct SummarizationStrategy {
    provider: Arc<dyn LLMProvider>,
    keep_recent: usize,
}

impl SummarizationStrategy {
    pub const DEFAULT_KEEP_RECENT: usize = 5;

    #[must_use]
    pub fn new(provider: Arc<dyn LLMProvider>, keep_recent: usize) -> Self {
        Self {
            provider,
            keep_recent,
        }
    }

    async fn summarize(&self, older: &[Message]) -> anyhow::Result<String> {
        let transcript = older
            .iter()
            .map(|m| format!("{}: {}", m.role, m.render()))
            .collect::<Vec<_>>()
            .join("\n");
        let request = vec![
            Message::system(SUMMARY_SYSTEM_PROMPT),
            Message::user(transcript),
        ];
        let response = self.provider.chat(&request, &[]).await?;
        let summary = response.content.trim();
        if summary.is_empty() {
            anyhow::bail!("model returned an empty summary");
        }
        Ok(summary.to_string())
    }
}

impl std::fmt::Debug for SummarizationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SummarizationStrategy")
            .field("model", &self.provider.model_info().name)
            .field("keep_recent", &self.keep_recent)
            .finish()
    }
}

#[async_trait]
impl ContextStrategy for SummarizationStrategy {
    fn name(&self) -> &'static str {
        "summarization"
    }

    async fn fit(&self, input: StrategyInput<'_>) -> anyhow::Result<StrategyResult> {
        let view = model_view(input.messages);
        if input.fits(&view) {
            return Ok(StrategyResult::send_only(view));
        }

        let (system, convo) = partition(input.messages);
        let (summaries, rest): (Vec<Message>, Vec<Message>) =
            convo.into_iter().partition(|m| m.role == Role::Summary);

        let mut split = rest.len().saturating_sub(self.keep_recent);
        // Never open the recent segment with results whose call was compressed.
        while split > 0 && split < rest.len() && rest[split].role == Role::Tool {
            split -= 1;
        }
        if split == 0 {
            return Ok(StrategyResult::send_only(view));
        }

        let mut older = summaries;
        older.extend_from_slice(&rest[..split]);
        let recent = &rest[split..];

        let text = match self.summarize(&older).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Summarization failed, sending full history: {e}");
                return Ok(StrategyResult::send_only(view));
            }
        };
        info!(
            "Summarized {} older message(s), keeping {} recent",
            older.len(),
            recent.len()
        );

        let summary = Message::summary(format!("{SUMMARY_PREFIX}{text}"));
        let mut conversational = vec![summary.for_model()];
        conversational.extend(model_view(recent));

        Ok(StrategyResult {
            messages: join(&model_view(&system), &conversational),
            session_update: Some(SessionUpdate {
                messages: vec![summary],
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{conversation, roles};
    use parley_core::testing::{ScriptedProvider, Step};
    use parley_core::{ChatResponse, HeuristicTokenCounter, ToolCall, ToolResultPart};

    async fn fit(
        provider: &Arc<ScriptedProvider>,
        messages: &[Message],
        max_tokens: usize,
    ) -> StrategyResult {
        fit_keeping(provider, 5, messages, max_tokens).await
    }

    async fn fit_keeping(
        provider: &Arc<ScriptedProvider>,
        keep_recent: usize,
        messages: &[Message],
        max_tokens: usize,
    ) -> StrategyResult {
        let counter = HeuristicTokenCounter::default();
        let provider: Arc<dyn LLMProvider> = provider.clone();
        SummarizationStrategy::new(provider, keep_recent)
            .fit(StrategyInput {
                messages,
                system_prompt: Some("You are terse."),
                tools: &[],
                counter: &counter,
                max_tokens,
            })
            .await
            .unwrap_or_else(|e| panic!("fit failed: {e}"))
    }

    #[tokio::test]
    async fn under_budget_is_untouched_and_model_not_called() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let messages = conversation(8);
        let result = fit(&provider, &messages, 100_000).await;
        assert_eq!(result.messages, messages);
        assert!(result.session_update.is_none());
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn compresses_oldest_three_of_eight() {
        let provider = Arc::new(ScriptedProvider::new(vec![Step::Respond(
            ChatResponse::text("The user asked three questions."),
        )]));
        let messages = conversation(8);
        let result = fit(&provider, &messages, 100).await;

        // system + summary + 5 recent
        assert_eq!(result.messages.len(), 7);
        assert_eq!(result.messages[0].role, Role::System);
        assert_eq!(result.messages[1].role, Role::User);
        assert!(result.messages[1].text().starts_with(SUMMARY_PREFIX));
        assert_eq!(result.messages[2..], messages[4..]);

        let update = result
            .session_update
            .unwrap_or_else(|| panic!("expected a session update"));
        assert_eq!(update.messages.len(), 1);
        assert_eq!(update.messages[0].role, Role::Summary);

        let request = &provider.requests()[0];
        assert_eq!(request[0].text(), SUMMARY_SYSTEM_PROMPT);
        assert!(request[1].text().contains("question 0"));
        assert!(request[1].text().contains("question 2"));
        assert!(!request[1].text().contains("answer 3"));
    }

    #[tokio::test]
    async fn existing_summary_is_folded_into_older_segment() {
        let provider = Arc::new(ScriptedProvider::new(vec![Step::Respond(
            ChatResponse::text("merged"),
        )]));
        let mut messages = conversation(8);
        messages.insert(3, Message::summary(format!("{SUMMARY_PREFIX}the user likes tea")));
        let result = fit(&provider, &messages, 100).await;

        assert_eq!(result.messages.len(), 7);
        assert!(result.messages.iter().all(|m| m.role != Role::Summary));
        let transcript = provider.requests()[0][1].text();
        assert!(transcript.starts_with("summary:"));
        assert!(transcript.contains("the user likes tea"));
    }

    #[tokio::test]
    async fn model_failure_falls_back_to_full_history() {
        let provider = Arc::new(ScriptedProvider::new(vec![Step::Fail(
            "rate limited".to_string(),
        )]));
        let messages = conversation(8);
        let result = fit(&provider, &messages, 100).await;
        assert_eq!(result.messages, messages);
        assert!(result.session_update.is_none());
    }

    #[tokio::test]
    async fn recent_segment_never_starts_with_tool_results() {
        let provider = Arc::new(ScriptedProvider::new(vec![Step::Respond(
            ChatResponse::text("short"),
        )]));
        let mut messages = conversation(4);
        messages.push(Message::assistant_with_tool_calls(
            "",
            vec![ToolCall::new("c1", "bash", "{}")],
        ));
        messages.push(Message::tool_results(vec![ToolResultPart {
            tool_call_id: "c1".to_string(),
            name: "bash".to_string(),
            content: "x".repeat(200),
            is_error: false,
        }]));
        messages.extend([
            Message::assistant("a"),
            Message::user("b"),
            Message::assistant("c"),
            Message::user("d"),
        ]);
        let result = fit(&provider, &messages, 100).await;
        let convo_roles = roles(&result.messages[2..]);
        assert_eq!(convo_roles[0], Role::Assistant);
        assert_eq!(convo_roles[1], Role::Tool);
        assert_eq!(result.messages.len(), 2 + 6);
    }

    #[tokio::test]
    async fn keeping_nothing_recent_compresses_everything() {
        let provider = Arc::new(ScriptedProvider::new(vec![Step::Respond(
            ChatResponse::text("all of it"),
        )]));
        let messages = conversation(8);
        let result = fit_keeping(&provider, 0, &messages, 10).await;

        assert_eq!(roles(&result.messages), [Role::System, Role::User]);
        assert!(result.messages[1].text().ends_with("all of it"));
        assert!(provider.requests()[0][1].text().contains("answer 7"));
        assert!(result.session_update.is_some());
    }
}
