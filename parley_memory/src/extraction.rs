use std::collections::HashSet;
use std::sync::Arc;

use parley_core::{LLMProvider, Message, content_hash};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::json::first_json_object;

pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"You extract durable facts about the user from one exchange of a conversation. Only keep facts that will still matter later: preferences, personal details, plans, relationships, ongoing projects. Ignore greetings, small talk, and anything the assistant said that the user did not confirm. Write each fact as a short third-person sentence.
Respond with a single JSON object and nothing else:
{"facts": ["<fact>", ...]}
Return {"facts": []} when there is nothing worth remembering."#;

#[derive(Debug, Deserialize)]
struct Extracted {
    #[serde(default)]
    facts: Vec<String>,
}

/// Turns a user message and the assistant's reply into memory candidates.
pub struct FactExtractor {
    provider: Arc<dyn LLMProvider>,
}

impl FactExtractor {
    #[must_use]
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }

    /// Facts worth storing for `owner_id`, duplicates removed.
    ///
    /// Unusable model output yields no facts; only the model call itself can
    /// fail.
    pub async fn extract(
        &self,
        owner_id: &str,
        user_message: &str,
        assistant_reply: &str,
    ) -> anyhow::Result<Vec<String>> {
        if user_message.trim().is_empty() {
            return Ok(Vec::new());
        }

        let request = vec![
            Message::system(EXTRACTION_SYSTEM_PROMPT),
            Message::user(format!(
                "User: {user_message}\nAssistant: {assistant_reply}"
            )),
        ];
        let response = self.provider.chat(&request, &[]).await?;

        let Some(extracted) = first_json_object::<Extracted>(&response.content) else {
            warn!("Fact extraction returned no JSON object");
            return Ok(Vec::new());
        };

        let mut seen = HashSet::new();
        let facts: Vec<String> = extracted
            .facts
            .into_iter()
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .filter(|f| seen.insert(content_hash(owner_id, f)))
            .collect();

        debug!("Extracted {} fact(s) for {owner_id}", facts.len());
        Ok(facts)
    }
}
