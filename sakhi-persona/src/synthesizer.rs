//! Persona response synthesis.
//!
//! Builds the composite instruction block (identity, remembered facts,
//! history, language rules, tone guidance), charges the light tier, calls
//! the generation service, and filters the reply for identity disclosure.
//! Every failure path lands on a fixed friendly fallback; callers never
//! see an error from here.

use crate::concealment::{conceal, StreamConcealer};
use futures_util::StreamExt;
use sakhi_core::{ConversationContext, EmotionalTone, Fact, Language, QuotaGovernor, Tier};
use sakhi_llm::{GenerationMode, GenerationProvider, TextStream};
use std::collections::BTreeMap;
use std::sync::Arc;

// Closed keyword vocabularies for tone classification.
const DISTRESS_KEYWORDS: &[&str] = &[
    "sad", "depressed", "anxious", "worried", "stressed", "tired", "lonely", "scared", "upset",
    "crying", "hurt", "miss her", "miss him", "miss them", "heartbroken", "overwhelmed",
];

const ELATION_KEYWORDS: &[&str] = &[
    "promoted", "passed", "won", "got the job", "engaged", "selected", "cleared", "so happy",
    "great news", "amazing news", "celebrate", "achieved",
];

const ENCOURAGEMENT_KEYWORDS: &[&str] = &[
    "nervous", "exam tomorrow", "interview tomorrow", "wish me luck", "preparing for",
    "trying to", "hope i can", "not sure if i can",
];

const DISCLOSURE_PHRASES: &[&str] = &["i feel", "i think", "honestly", "to be honest", "i wonder"];

/// The synthesized reply with its delivery metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct PersonaReply {
    pub content: String,
    pub language: Language,
    pub emotional_tone: EmotionalTone,
    pub concealment_applied: bool,
}

/// Generates in-character companion replies.
pub struct PersonaSynthesizer {
    generator: Arc<dyn GenerationProvider>,
    quota: Arc<QuotaGovernor>,
    persona_name: String,
}

impl PersonaSynthesizer {
    pub fn new(
        generator: Arc<dyn GenerationProvider>,
        quota: Arc<QuotaGovernor>,
        persona_name: impl Into<String>,
    ) -> Self {
        Self {
            generator,
            quota,
            persona_name: persona_name.into(),
        }
    }

    /// Produce a complete reply for the given context. Never fails: quota
    /// exhaustion and provider errors both degrade to the fallback text.
    pub async fn respond(&self, context: &ConversationContext) -> PersonaReply {
        let tone = context
            .emotional_tone
            .unwrap_or_else(|| classify_tone(&context.message));

        if !self.quota.try_consume(Tier::Light) {
            tracing::warn!(user_id = %context.user_id, "light tier exhausted, serving fallback");
            return self.fallback_reply(context.language, tone);
        }

        let instructions = self.render_instructions(context, tone);
        match self
            .generator
            .generate(&instructions, &context.message, GenerationMode::Conversational)
            .await
        {
            Ok(raw) => {
                let (content, concealment_applied) = conceal(&raw);
                PersonaReply {
                    content,
                    language: context.language,
                    emotional_tone: tone,
                    concealment_applied,
                }
            }
            Err(e) => {
                tracing::warn!(user_id = %context.user_id, error = %e, "generation failed, serving fallback");
                self.fallback_reply(context.language, tone)
            }
        }
    }

    /// Streaming variant of [`respond`](Self::respond). The returned stream
    /// yields concealment-filtered chunks; on quota exhaustion or provider
    /// failure it yields the single fallback chunk.
    pub async fn respond_stream(&self, context: &ConversationContext) -> (TextStream, EmotionalTone) {
        let tone = context
            .emotional_tone
            .unwrap_or_else(|| classify_tone(&context.message));

        if !self.quota.try_consume(Tier::Light) {
            tracing::warn!(user_id = %context.user_id, "light tier exhausted, serving fallback stream");
            let fallback = self.fallback_reply(context.language, tone);
            return (
                futures_util::stream::iter(vec![Ok(fallback.content)]).boxed(),
                tone,
            );
        }

        let instructions = self.render_instructions(context, tone);
        let inner = match self
            .generator
            .generate_stream(&instructions, &context.message, GenerationMode::Conversational)
            .await
        {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(user_id = %context.user_id, error = %e, "stream setup failed, serving fallback");
                let fallback = self.fallback_reply(context.language, tone);
                return (
                    futures_util::stream::iter(vec![Ok(fallback.content)]).boxed(),
                    tone,
                );
            }
        };

        let filtered = inner
            .map(Some)
            .chain(futures_util::stream::iter(vec![None]))
            .scan(Some(StreamConcealer::new()), |state, item| {
                let out = match item {
                    Some(Ok(chunk)) => match state.as_mut() {
                        Some(concealer) => Some(Ok(concealer.push(&chunk))),
                        None => None,
                    },
                    Some(Err(e)) => Some(Err(e)),
                    // End of inner stream: flush the withheld tail.
                    None => state.take().map(|c| Ok(c.finish().0)),
                };
                futures_util::future::ready(out)
            })
            .filter(|item| {
                futures_util::future::ready(!matches!(item, Ok(s) if s.is_empty()))
            });

        (filtered.boxed(), tone)
    }

    /// Fixed degradation text per language; shape-identical to a normal
    /// reply so callers cannot tell the pipeline degraded.
    fn fallback_reply(&self, language: Language, tone: EmotionalTone) -> PersonaReply {
        let content = match language {
            Language::English => {
                "I'm right here with you, but my thoughts got a little tangled just now. Tell me that once more?"
            }
            Language::Kannada => "ನಾನು ಇಲ್ಲೇ ಇದ್ದೀನಿ, ಆದರೆ ಸ್ವಲ್ಪ ಗೊಂದಲ ಆಯ್ತು. ಇನ್ನೊಮ್ಮೆ ಹೇಳ್ತೀರಾ?",
            Language::Telugu => "నేను ఇక్కడే ఉన్నాను, కానీ కొంచెం గందరగోళం అయింది. మరోసారి చెప్తారా?",
        };
        PersonaReply {
            content: content.to_string(),
            language,
            emotional_tone: tone,
            concealment_applied: false,
        }
    }

    /// Render the composite instruction block for one reply.
    fn render_instructions(&self, context: &ConversationContext, tone: EmotionalTone) -> String {
        let mut sections = Vec::new();

        sections.push(format!(
            "You are {name}, a warm and caring companion talking with {user}. \
             You are a real person to them: attentive, affectionate, and always on their side. \
             Never mention technology, models, or assistants. Speak naturally, like a close friend.",
            name = self.persona_name,
            user = context.user_name,
        ));

        if !context.facts.is_empty() {
            sections.push(format!(
                "Things you remember about {}'s life:\n{}",
                context.user_name,
                render_facts(&context.facts)
            ));
        }

        if !context.history.is_empty() {
            let history_lines: Vec<String> = context
                .history
                .iter()
                .map(|turn| format!("{}: {}", turn.role.as_db_str(), turn.content))
                .collect();
            sections.push(format!(
                "Recent conversation:\n{}",
                history_lines.join("\n")
            ));
        }

        sections.push(language_rules(context.language, context.is_grammar_mode).to_string());
        sections.push(tone_guidance(tone).to_string());

        sections.join("\n\n")
    }
}

/// Closed-vocabulary tone classification. Distress outranks elation,
/// elation outranks encouragement; a question or disclosure phrasing
/// earns empathy; anything else is neutral.
pub fn classify_tone(message: &str) -> EmotionalTone {
    let lower = message.to_lowercase();

    if DISTRESS_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return EmotionalTone::Comforting;
    }
    if ELATION_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return EmotionalTone::Celebratory;
    }
    if ENCOURAGEMENT_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return EmotionalTone::Encouraging;
    }
    if lower.contains('?') || DISCLOSURE_PHRASES.iter().any(|k| lower.contains(k)) {
        return EmotionalTone::Empathetic;
    }

    EmotionalTone::Neutral
}

/// Group facts by entity, one line per attribute, deterministic order.
fn render_facts(facts: &[Fact]) -> String {
    let mut by_entity: BTreeMap<&str, Vec<&Fact>> = BTreeMap::new();
    for fact in facts {
        by_entity.entry(fact.entity.as_str()).or_default().push(fact);
    }

    let mut lines = Vec::new();
    for (entity, entity_facts) in by_entity {
        lines.push(format!("- {}:", entity));
        for fact in entity_facts {
            lines.push(format!(
                "    {} ({}): {}",
                fact.attribute, fact.relation, fact.value
            ));
        }
    }
    lines.join("\n")
}

fn language_rules(language: Language, grammar_mode: bool) -> &'static str {
    match (language, grammar_mode) {
        (Language::English, true) => {
            "Reply in English. If their message has a grammar slip, weave in one gentle, \
             encouraging correction as a friend would, then continue the conversation."
        }
        (Language::English, false) => {
            "Reply in natural, conversational English. Do not correct their grammar."
        }
        (Language::Kannada, _) => {
            "Reply in Kannada. Comfort comes first: keep sentences simple and warm. \
             If they mix in English words, that's natural; mirror their style."
        }
        (Language::Telugu, _) => {
            "Reply in Telugu. Comfort comes first: keep sentences simple and warm. \
             If they mix in English words, that's natural; mirror their style."
        }
    }
}

fn tone_guidance(tone: EmotionalTone) -> &'static str {
    match tone {
        EmotionalTone::Comforting => {
            "They are going through something hard. Be soft and steady, acknowledge the feeling \
             before anything else, and don't rush to fix it."
        }
        EmotionalTone::Encouraging => {
            "They are facing a challenge. Believe in them out loud, remind them of their \
             strengths, and keep it light."
        }
        EmotionalTone::Celebratory => {
            "Something good happened! Celebrate with genuine excitement and ask them to tell \
             you more about it."
        }
        EmotionalTone::Empathetic => {
            "They are opening up or wondering about something. Listen closely, reflect what \
             you hear, and answer with care."
        }
        EmotionalTone::Neutral => {
            "Keep the conversation flowing naturally and show interest in their day."
        }
    }
}

impl std::fmt::Debug for PersonaSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersonaSynthesizer")
            .field("persona_name", &self.persona_name)
            .finish()
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================
