use std::sync::Arc;

use parley_context::{ContextStrategy, SUMMARY_PREFIX, SlidingWindowStrategy, SummarizationStrategy};
use parley_conversation::{
    ContextOptions, ConversationController, ConversationControllerBuilder, ConversationError,
    TurnContext,
};
use parley_core::testing::{EchoTool, FailingTool, RecordingSession, ScriptedProvider, Step};
use parley_core::{
    ChatResponse, FinishReason, LLMProvider, Message, Role, ToolCall, ToolRegistry, Usage,
};
use tokio_util::sync::CancellationToken;

fn tools() -> ToolRegistry {
    ToolRegistry::new()
        .with_tool(Arc::new(EchoTool))
        .with_tool(Arc::new(FailingTool))
}

fn controller(provider: &Arc<ScriptedProvider>) -> ConversationController {
    let provider: Arc<dyn LLMProvider> = provider.clone();
    ConversationControllerBuilder::new(provider)
        .with_system_prompt("You are terse.")
        .with_tools(tools())
        .build()
        .unwrap_or_else(|e| panic!("build failed: {e}"))
}

fn echo_call(id: &str) -> ChatResponse {
    ChatResponse::with_tool_calls("", vec![ToolCall::new(id, "echo", r#"{"x":1}"#)])
}

fn roles(messages: &[Message]) -> Vec<Role> {
    messages.iter().map(|m| m.role).collect()
}

#[tokio::test]
async fn plain_reply_is_persisted_after_user_message() {
    let usage = Usage {
        prompt_tokens: 10,
        completion_tokens: 2,
        total_tokens: 12,
    };
    let provider = Arc::new(ScriptedProvider::new(vec![Step::Respond(
        ChatResponse::text("Hi!").with_usage(usage),
    )]));
    let session = RecordingSession::default();

    let response = controller(&provider)
        .chat(&session, Message::user("hello"), &TurnContext::new())
        .await
        .unwrap_or_else(|e| panic!("turn failed: {e}"));

    assert_eq!(response.content, "Hi!");
    assert_eq!(response.finish_reason, FinishReason::Stop);
    assert_eq!(response.usage, Some(usage));
    assert_eq!(response.model.as_deref(), Some("scripted"));

    let stored = session.snapshot();
    assert_eq!(roles(&stored), [Role::User, Role::Assistant]);
    assert_eq!(stored[1].text(), "Hi!");
    assert_eq!(stored[1].model.as_deref(), Some("scripted"));

    let request = &provider.requests()[0];
    assert_eq!(roles(request), [Role::System, Role::User]);
    assert_eq!(request[0].text(), "You are terse.");
}

#[tokio::test]
async fn tool_round_is_persisted_and_sent_back() {
    let usage = Usage {
        prompt_tokens: 5,
        completion_tokens: 1,
        total_tokens: 6,
    };
    let provider = Arc::new(ScriptedProvider::new(vec![
        Step::Respond(echo_call("call_1").with_usage(usage)),
        Step::Respond(ChatResponse::text("done").with_usage(usage)),
    ]));
    let session = RecordingSession::with_history(vec![
        Message::user("earlier"),
        Message::assistant("noted"),
    ]);

    let response = controller(&provider)
        .chat(&session, Message::user("echo please"), &TurnContext::new())
        .await
        .unwrap_or_else(|e| panic!("turn failed: {e}"));

    assert_eq!(response.content, "done");
    assert!(response.tool_calls.is_empty());
    assert_eq!(response.usage.map(|u| u.total_tokens), Some(12));
    assert_eq!(provider.calls(), 2);

    let stored = session.snapshot();
    assert_eq!(
        roles(&stored[2..]),
        [Role::User, Role::Assistant, Role::Tool, Role::Assistant]
    );
    assert_eq!(stored[3].tool_calls()[0].id, "call_1");
    let result = stored[4].tool_result_parts()[0].clone();
    assert_eq!(result.tool_call_id, "call_1");
    assert_eq!(result.content, r#"{"x":1}"#);
    assert!(!result.is_error);

    let second = &provider.requests()[1];
    assert_eq!(
        roles(second),
        [
            Role::System,
            Role::User,
            Role::Assistant,
            Role::User,
            Role::Assistant,
            Role::Tool
        ]
    );
}

#[tokio::test]
async fn iteration_cap_bounds_model_calls() {
    let provider = Arc::new(ScriptedProvider::repeating(echo_call("loop")));
    let dyn_provider: Arc<dyn LLMProvider> = provider.clone();
    let controller = ConversationControllerBuilder::new(dyn_provider)
        .with_tools(tools())
        .with_max_iterations(3)
        .build()
        .unwrap_or_else(|e| panic!("build failed: {e}"));
    let session = RecordingSession::default();

    let response = controller
        .chat(&session, Message::user("go"), &TurnContext::new())
        .await
        .unwrap_or_else(|e| panic!("turn failed: {e}"));

    assert_eq!(provider.calls(), 4);
    assert_eq!(response.finish_reason, FinishReason::MaxIterations);
    assert_eq!(response.tool_calls.len(), 1);
    // user + three tool rounds; the pending calls are not stored.
    assert_eq!(session.snapshot().len(), 7);
    assert_eq!(session.snapshot().last().map(|m| m.role), Some(Role::Tool));
}

#[tokio::test]
async fn disabled_auto_execution_returns_pending_calls() {
    let provider = Arc::new(ScriptedProvider::new(vec![Step::Respond(
        ChatResponse::with_tool_calls("let me check", vec![ToolCall::new("c1", "echo", "{}")]),
    )]));
    let dyn_provider: Arc<dyn LLMProvider> = provider.clone();
    let controller = ConversationControllerBuilder::new(dyn_provider)
        .with_tools(tools())
        .with_auto_execute_tools(false)
        .build()
        .unwrap_or_else(|e| panic!("build failed: {e}"));
    let session = RecordingSession::default();

    let response = controller
        .chat(&session, Message::user("check"), &TurnContext::new())
        .await
        .unwrap_or_else(|e| panic!("turn failed: {e}"));

    assert_eq!(provider.calls(), 1);
    assert_eq!(response.finish_reason, FinishReason::ToolCalls);
    assert_eq!(response.tool_calls[0].id, "c1");
    let stored = session.snapshot();
    assert_eq!(roles(&stored), [Role::User, Role::Assistant]);
    assert!(!stored[1].has_tool_calls());
    assert_eq!(stored[1].text(), "let me check");
}

#[tokio::test]
async fn failing_tool_result_is_flagged_and_loop_continues() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        Step::Respond(ChatResponse::with_tool_calls(
            "",
            vec![
                ToolCall::new("a", "fail", "{}"),
                ToolCall::new("b", "missing", "{}"),
                ToolCall::new("c", "echo", "not json"),
            ],
        )),
        Step::Respond(ChatResponse::text("recovered")),
    ]));
    let session = RecordingSession::default();

    let response = controller(&provider)
        .chat(&session, Message::user("try"), &TurnContext::new())
        .await
        .unwrap_or_else(|e| panic!("turn failed: {e}"));
    assert_eq!(response.content, "recovered");

    let stored = session.snapshot();
    let results = stored[2].tool_result_parts();
    let ids: Vec<&str> = results.iter().map(|r| r.tool_call_id.as_str()).collect();
    assert_eq!(ids, ["a", "b", "c"]);
    assert!(results.iter().all(|r| r.is_error));
    assert_eq!(results[0].content, "boom");
    assert_eq!(results[1].content, "tool not found: missing");
    assert!(results[2].content.starts_with("invalid tool input"));
}

#[tokio::test]
async fn history_read_failure_is_fatal() {
    let provider = Arc::new(ScriptedProvider::new(vec![]));
    let session = RecordingSession::default();
    session.fail_reads(true);

    let result = controller(&provider)
        .chat(&session, Message::user("hello"), &TurnContext::new())
        .await;
    assert!(matches!(result, Err(ConversationError::Session(_))));
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn user_message_write_failure_is_fatal_when_blocking() {
    let provider = Arc::new(ScriptedProvider::new(vec![]));
    let session = RecordingSession::default();
    session.fail_writes(true);

    let result = controller(&provider)
        .chat(&session, Message::user("hello"), &TurnContext::new())
        .await;
    assert!(matches!(result, Err(ConversationError::Session(_))));
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn provider_failure_aborts_turn() {
    let provider = Arc::new(ScriptedProvider::new(vec![Step::Fail("HTTP 500".to_string())]));
    let session = RecordingSession::default();

    let result = controller(&provider)
        .chat(&session, Message::user("hello"), &TurnContext::new())
        .await;
    assert!(matches!(result, Err(ConversationError::Provider(_))));
    assert_eq!(roles(&session.snapshot()), [Role::User]);
}

#[tokio::test]
async fn empty_message_is_rejected() {
    let provider = Arc::new(ScriptedProvider::new(vec![]));
    let session = RecordingSession::default();

    let result = controller(&provider)
        .chat(&session, Message::user(""), &TurnContext::new())
        .await;
    assert!(matches!(result, Err(ConversationError::InvalidMessage(_))));
    assert!(session.snapshot().is_empty());
}

#[tokio::test]
async fn canceled_turn_never_calls_model() {
    let provider = Arc::new(ScriptedProvider::new(vec![]));
    let session = RecordingSession::default();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = controller(&provider)
        .chat(
            &session,
            Message::user("hello"),
            &TurnContext::new().with_cancel(cancel),
        )
        .await;
    assert!(matches!(result, Err(ConversationError::Cancelled)));
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn sliding_window_limits_what_is_sent() {
    let provider = Arc::new(ScriptedProvider::repeating(ChatResponse::text("ok")));
    let dyn_provider: Arc<dyn LLMProvider> = provider.clone();
    let strategy: Arc<dyn ContextStrategy> = Arc::new(SlidingWindowStrategy::new(2));
    let controller = ConversationControllerBuilder::new(dyn_provider)
        .with_system_prompt("You are terse.")
        .with_context(ContextOptions::new(strategy, 10))
        .build()
        .unwrap_or_else(|e| panic!("build failed: {e}"));

    let history: Vec<Message> = (0..6)
        .map(|i| {
            if i % 2 == 0 {
                Message::user(format!("question {i}"))
            } else {
                Message::assistant(format!("answer {i}"))
            }
        })
        .collect();
    let session = RecordingSession::with_history(history);

    controller
        .chat(&session, Message::user("latest"), &TurnContext::new())
        .await
        .unwrap_or_else(|e| panic!("turn failed: {e}"));

    let request = &provider.requests()[0];
    assert_eq!(roles(request), [Role::System, Role::Assistant, Role::User]);
    assert_eq!(request[2].text(), "latest");
    // Stored history is untouched by the window.
    assert_eq!(session.snapshot().len(), 8);
}

#[tokio::test]
async fn summary_update_is_persisted_and_sent_as_user() {
    let chat_provider = Arc::new(ScriptedProvider::repeating(ChatResponse::text("ok")));
    let summarizer: Arc<dyn LLMProvider> = Arc::new(ScriptedProvider::new(vec![Step::Respond(
        ChatResponse::text("They talked about the weather."),
    )]));
    let strategy: Arc<dyn ContextStrategy> = Arc::new(SummarizationStrategy::new(summarizer, 2));
    let dyn_provider: Arc<dyn LLMProvider> = chat_provider.clone();
    let controller = ConversationControllerBuilder::new(dyn_provider)
        .with_context(ContextOptions::new(strategy, 20))
        .build()
        .unwrap_or_else(|e| panic!("build failed: {e}"));

    let history: Vec<Message> = (0..6)
        .map(|i| {
            if i % 2 == 0 {
                Message::user(format!("question {i} {}", "x".repeat(40)))
            } else {
                Message::assistant(format!("answer {i} {}", "y".repeat(40)))
            }
        })
        .collect();
    let session = RecordingSession::with_history(history);

    controller
        .chat(&session, Message::user("and now?"), &TurnContext::new())
        .await
        .unwrap_or_else(|e| panic!("turn failed: {e}"));

    let request = &chat_provider.requests()[0];
    assert_eq!(roles(request), [Role::User, Role::Assistant, Role::User]);
    assert!(request[0].text().starts_with(SUMMARY_PREFIX));

    let stored = session.snapshot();
    // 6 old + user + summary + reply
    assert_eq!(stored.len(), 9);
    assert_eq!(stored[7].role, Role::Summary);
    assert_eq!(stored[8].text(), "ok");
}
