//! LLM-backed fact extraction.
//!
//! Extraction is best-effort: an exhausted quota, a provider failure, or
//! malformed output all yield an empty list so the conversation never
//! stalls on memory.

use once_cell::sync::Lazy;
use regex::Regex;
use sakhi_core::{Fact, HistoryTurn, QuotaGovernor, SakhiResult, Tier};
use sakhi_llm::{GenerationMode, GenerationProvider};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

const EXTRACTION_INSTRUCTIONS: &str = r#"You are an expert at extracting personal information from conversations.

Your task is to identify and structure facts about:
- People (names, relationships, characteristics)
- Events (dates, activities, plans)
- Preferences (likes, dislikes, habits)
- Emotions (feelings, concerns, worries)
- Projects (work, hobbies, goals)

Return your response in this EXACT JSON format:
{
  "facts": [
    {
      "entity": "Name or thing being discussed",
      "relation": "friend|family|colleague|project|event|preference|emotion",
      "attribute": "Specific characteristic or detail",
      "value": "The value or description",
      "context": "The exact sentence or phrase from the message"
    }
  ]
}

Guidelines:
- Extract ALL meaningful personal information
- Be specific about entities (use actual names)
- Include emotional context when present
- Capture relationships between entities
- If no facts found, return empty array
- Only extract facts explicitly stated, don't infer"#;

static FENCED_JSON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").expect("fenced-json pattern is valid")
});

static BARE_JSON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("bare-json pattern is valid"));

/// Raw tuple shape the model is asked to produce. Missing fields default to
/// empty and are rejected during validation rather than at parse time.
#[derive(Debug, Deserialize)]
struct ExtractedTuple {
    #[serde(default)]
    entity: String,
    #[serde(default)]
    relation: String,
    #[serde(default)]
    attribute: String,
    #[serde(default)]
    value: String,
    #[serde(default)]
    context: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExtractionPayload {
    #[serde(default)]
    facts: Vec<ExtractedTuple>,
}

/// Extracts structured facts from user messages via the generation service.
///
/// Charges the heavy tier per call; returned facts are not yet stored and
/// carry no embedding.
pub struct FactExtractor {
    generator: Arc<dyn GenerationProvider>,
    quota: Arc<QuotaGovernor>,
    history_turns: usize,
}

impl FactExtractor {
    pub fn new(
        generator: Arc<dyn GenerationProvider>,
        quota: Arc<QuotaGovernor>,
        history_turns: usize,
    ) -> Self {
        Self {
            generator,
            quota,
            history_turns,
        }
    }

    /// Extract facts from `message`, using the tail of `recent_history` for
    /// pronoun and reference resolution.
    pub async fn extract(
        &self,
        user_id: Uuid,
        message: &str,
        recent_history: &[HistoryTurn],
    ) -> SakhiResult<Vec<Fact>> {
        if message.trim().is_empty() {
            return Ok(Vec::new());
        }

        if !self.quota.try_consume(Tier::Heavy) {
            tracing::warn!(user_id = %user_id, "heavy tier exhausted, skipping fact extraction");
            return Ok(Vec::new());
        }

        let prompt = self.build_prompt(message, recent_history);
        match self
            .generator
            .generate(EXTRACTION_INSTRUCTIONS, &prompt, GenerationMode::Structured)
            .await
        {
            Ok(output) => {
                let facts = parse_extraction_output(user_id, message, &output);
                tracing::debug!(user_id = %user_id, count = facts.len(), "extracted facts");
                Ok(facts)
            }
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "fact extraction call failed");
                Ok(Vec::new())
            }
        }
    }

    fn build_prompt(&self, message: &str, recent_history: &[HistoryTurn]) -> String {
        let mut prompt = format!("Extract personal facts from this message:\n\n\"{}\"\n", message);

        if !recent_history.is_empty() {
            let start = recent_history.len().saturating_sub(self.history_turns);
            let history_text: Vec<String> = recent_history[start..]
                .iter()
                .map(|turn| format!("{}: {}", turn.role.as_db_str(), turn.content))
                .collect();
            prompt.push_str(&format!(
                "\nRecent conversation context:\n{}\n",
                history_text.join("\n")
            ));
        }

        prompt.push_str("\nProvide extracted facts in the JSON format specified.");
        prompt
    }
}

/// Parse model output into facts. Any shape problem yields an empty list.
fn parse_extraction_output(user_id: Uuid, original_message: &str, output: &str) -> Vec<Fact> {
    let json_str = match FENCED_JSON
        .captures(output)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .or_else(|| BARE_JSON.find(output).map(|m| m.as_str()))
    {
        Some(s) => s,
        None => return Vec::new(),
    };

    let payload: ExtractionPayload = match serde_json::from_str(json_str) {
        Ok(p) => p,
        Err(e) => {
            tracing::debug!(error = %e, "unparseable extraction output");
            return Vec::new();
        }
    };

    payload
        .facts
        .into_iter()
        .filter(|t| !t.entity.trim().is_empty() && !t.value.trim().is_empty())
        .map(|t| {
            let context = t
                .context
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| original_message.to_string());
            Fact::new(user_id, t.entity, t.relation, t.attribute, t.value, context)
        })
        .collect()
}

impl std::fmt::Debug for FactExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactExtractor")
            .field("history_turns", &self.history_turns)
            .finish()
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================
