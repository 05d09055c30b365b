//! Multi-turn conversation with a persistent session.

use std::io::Write;
use std::sync::Arc;

use parley_conversation::{ConversationController, TurnContext};
use parley_core::{ChatEvent, ChatResponse, Message, Session};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{RuntimeOptions, build_runtime};

const DEFAULT_SESSION: &str = "cli:default";

#[derive(Debug, Clone)]
pub struct ChatInput {
    /// Single message to send (interactive mode when absent)
    pub message: Option<String>,
    pub model: Option<String>,
    /// Session key to resume or create
    pub session: Option<String>,
    /// Memory owner; the configured default otherwise
    pub owner: Option<String>,
    pub stream: bool,
    pub tools: bool,
    pub reset: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ChatStrategy;

impl super::CommandStrategy for ChatStrategy {
    type Input = ChatInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let runtime = build_runtime(RuntimeOptions {
            model: input.model.as_deref(),
            tools: input.tools,
        })
        .await?;

        let key = input.session.as_deref().unwrap_or(DEFAULT_SESSION);
        if input.reset {
            runtime.sessions.clear(key).await?;
        }
        let session = runtime.sessions.open(key);
        let owner = input
            .owner
            .unwrap_or_else(|| runtime.config.memory.default_owner.clone());
        info!("Starting conversation session {key} for {owner}");

        let chat = Chat {
            controller: &runtime.controller,
            session,
            owner,
            stream: input.stream,
        };

        if let Some(message) = input.message {
            chat.turn(&message).await?;
        } else {
            chat.run_interactive().await?;
        }
        Ok(())
    }
}

struct Chat<'a> {
    controller: &'a ConversationController,
    session: Arc<dyn Session>,
    owner: String,
    stream: bool,
}

impl Chat<'_> {
    async fn run_interactive(&self) -> anyhow::Result<()> {
        println!("=== Conversation Session: {} ===", self.session.id());
        println!("Type 'exit', 'quit', or Ctrl+D to end the session.\n");

        loop {
            print!("> ");
            std::io::stdout().flush()?;

            let mut line = String::new();
            if std::io::stdin().read_line(&mut line)? == 0 {
                println!();
                break;
            }
            let line = line.trim();
            if matches!(line, "exit" | "quit" | "q") {
                break;
            }
            if line.is_empty() {
                continue;
            }

            if let Err(e) = self.turn(line).await {
                eprintln!("Error: {e}");
            }
        }

        let stored = self.session.messages(None).await?.len();
        println!("\nSession ended with {stored} stored message(s).");
        Ok(())
    }

    /// One turn; Ctrl+C cancels it.
    async fn turn(&self, text: &str) -> anyhow::Result<()> {
        let cancel = CancellationToken::new();
        let watcher = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            })
        };

        let ctx = TurnContext::for_owner(self.owner.clone()).with_cancel(cancel);
        let result = if self.stream {
            self.streamed_turn(text, ctx).await
        } else {
            self.controller
                .chat(self.session.as_ref(), Message::user(text), &ctx)
                .await
                .map_err(anyhow::Error::from)
                .inspect(|response| println!("\n{}\n", response.content))
        };
        watcher.abort();

        let response = result?;
        for call in &response.tool_calls {
            println!("(pending tool call {} {})", call.name, call.input);
        }
        if let Some(usage) = response.usage {
            debug!(
                "Tokens: {} prompt + {} completion = {} total",
                usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
            );
        }
        Ok(())
    }

    async fn streamed_turn(&self, text: &str, ctx: TurnContext) -> anyhow::Result<ChatResponse> {
        let mut events = self
            .controller
            .chat_stream(self.session.clone(), Message::user(text), ctx);
        let mut stdout = std::io::stdout();
        writeln!(stdout)?;

        while let Some(event) = events.recv().await {
            match event {
                ChatEvent::ContentDelta(delta) => {
                    write!(stdout, "{delta}")?;
                    stdout.flush()?;
                }
                ChatEvent::ToolUseStart { name, .. } => {
                    writeln!(stdout, "\n[running {name}]")?;
                }
                ChatEvent::ThinkingDelta(_)
                | ChatEvent::ToolUseDelta { .. }
                | ChatEvent::ToolUseStop { .. } => {}
                ChatEvent::Complete(response) => {
                    writeln!(stdout, "\n")?;
                    return Ok(response);
                }
                ChatEvent::Error(message) => {
                    writeln!(stdout)?;
                    anyhow::bail!(message);
                }
            }
        }
        anyhow::bail!("stream ended without a result")
    }
}
