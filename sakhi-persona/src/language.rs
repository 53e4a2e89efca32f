//! Two-stage language detection.
//!
//! Stage 1 inspects Unicode script ranges and settles most inputs without
//! any network traffic. Stage 2 asks the generation service to classify
//! ambiguous text. Detection never fails: when both stages come up short
//! the result is the default language at zero confidence.

use once_cell::sync::Lazy;
use regex::Regex;
use sakhi_core::{CompanionConfig, Language, QuotaGovernor, Tier};
use sakhi_llm::{GenerationMode, GenerationProvider};
use serde::Deserialize;
use std::sync::Arc;

const DETECTION_INSTRUCTIONS: &str =
    "You are a language detection expert. Respond only with JSON.";

// Unicode blocks for the supported native scripts.
const KANNADA_RANGE: (u32, u32) = (0x0C80, 0x0CFF);
const TELUGU_RANGE: (u32, u32) = (0x0C00, 0x0C7F);

static FENCED_JSON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").expect("fenced-json pattern is valid")
});

static BARE_JSON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("bare-json pattern is valid"));

/// How a detection result was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionMethod {
    /// Settled by script-range inspection alone.
    Script,
    /// Settled by the generation-service fallback.
    Model,
    /// Neither stage was confident; default language was assumed.
    Default,
}

/// A language verdict with its confidence and provenance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub language: Language,
    pub confidence: f32,
    pub method: DetectionMethod,
}

impl Detection {
    fn default_language() -> Self {
        Self {
            language: Language::default(),
            confidence: 0.0,
            method: DetectionMethod::Default,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ModelVerdict {
    #[serde(default)]
    language: String,
    #[serde(default)]
    confidence: f32,
}

/// Detects the primary language of user messages.
pub struct LanguageDetector {
    generator: Arc<dyn GenerationProvider>,
    quota: Arc<QuotaGovernor>,
    confidence_threshold: f32,
    script_ratio_threshold: f32,
    native_script_confidence: f32,
}

impl LanguageDetector {
    pub fn new(
        generator: Arc<dyn GenerationProvider>,
        quota: Arc<QuotaGovernor>,
        config: &CompanionConfig,
    ) -> Self {
        Self {
            generator,
            quota,
            confidence_threshold: config.confidence_threshold,
            script_ratio_threshold: config.script_ratio_threshold,
            native_script_confidence: config.native_script_confidence,
        }
    }

    /// Detect the language of `text`. Always returns a verdict.
    pub async fn detect(&self, text: &str) -> Detection {
        if text.trim().is_empty() {
            return Detection::default_language();
        }

        let script = self.detect_by_script(text);
        if script.confidence >= self.confidence_threshold {
            return script;
        }

        // The script stage was unsure; ask the model, charging the light
        // tier since classification rides the fast conversational model.
        if !self.quota.try_consume(Tier::Light) {
            tracing::debug!("light tier exhausted, skipping model language detection");
            return Detection::default_language();
        }

        match self.detect_by_model(text).await {
            Some(verdict) if verdict.confidence >= self.confidence_threshold => verdict,
            _ => Detection::default_language(),
        }
    }

    /// Script-range inspection over the alphanumeric characters of `text`.
    fn detect_by_script(&self, text: &str) -> Detection {
        let mut kannada = 0usize;
        let mut telugu = 0usize;
        let mut ascii = 0usize;
        let mut total = 0usize;

        for ch in text.chars() {
            if ch.is_whitespace() || !ch.is_alphanumeric() {
                continue;
            }
            total += 1;

            let cp = ch as u32;
            if (KANNADA_RANGE.0..=KANNADA_RANGE.1).contains(&cp) {
                kannada += 1;
            } else if (TELUGU_RANGE.0..=TELUGU_RANGE.1).contains(&cp) {
                telugu += 1;
            } else if cp < 128 {
                ascii += 1;
            }
        }

        if total == 0 {
            return Detection::default_language();
        }

        let kannada_ratio = kannada as f32 / total as f32;
        let telugu_ratio = telugu as f32 / total as f32;

        if kannada_ratio > self.script_ratio_threshold {
            return Detection {
                language: Language::Kannada,
                confidence: self.native_script_confidence,
                method: DetectionMethod::Script,
            };
        }
        if telugu_ratio > self.script_ratio_threshold {
            return Detection {
                language: Language::Telugu,
                confidence: self.native_script_confidence,
                method: DetectionMethod::Script,
            };
        }

        // Latin text is only a guess: discount the ratio so mixed or
        // romanized input falls through to the model stage.
        let ascii_ratio = ascii as f32 / total as f32;
        if ascii_ratio > 0.7 {
            return Detection {
                language: Language::English,
                confidence: ascii_ratio * 0.8,
                method: DetectionMethod::Script,
            };
        }

        Detection::default_language()
    }

    async fn detect_by_model(&self, text: &str) -> Option<Detection> {
        let prompt = format!(
            r#"Identify the primary language of this text. Respond with ONLY a JSON object in this exact format:

{{
  "language": "english" | "kannada" | "telugu",
  "confidence": 0.0 to 1.0
}}

Text to analyze: "{}"

Rules:
- If the text is primarily in English (even with some Indian language words), return "english"
- If the text is primarily in Kannada script, return "kannada"
- If the text is primarily in Telugu script, return "telugu"
- Confidence should be 1.0 if you're certain, lower if mixed or unclear
- Return ONLY the JSON, no other text"#,
            text
        );

        let output = match self
            .generator
            .generate(DETECTION_INSTRUCTIONS, &prompt, GenerationMode::Structured)
            .await
        {
            Ok(o) => o,
            Err(e) => {
                tracing::warn!(error = %e, "model language detection failed");
                return None;
            }
        };

        parse_model_verdict(&output)
    }
}

fn parse_model_verdict(output: &str) -> Option<Detection> {
    let json_str = FENCED_JSON
        .captures(output)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .or_else(|| BARE_JSON.find(output).map(|m| m.as_str()))?;

    let verdict: ModelVerdict = serde_json::from_str(json_str).ok()?;

    let language = match verdict.language.to_lowercase().as_str() {
        "english" => Language::English,
        "kannada" => Language::Kannada,
        "telugu" => Language::Telugu,
        _ => return None,
    };

    Some(Detection {
        language,
        confidence: verdict.confidence.clamp(0.0, 1.0),
        method: DetectionMethod::Model,
    })
}

impl std::fmt::Debug for LanguageDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanguageDetector")
            .field("confidence_threshold", &self.confidence_threshold)
            .field("script_ratio_threshold", &self.script_ratio_threshold)
            .finish()
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use sakhi_llm::MockGenerationProvider;

    fn make_detector(mock: Arc<MockGenerationProvider>) -> LanguageDetector {
        make_detector_with_light_cap(mock, 14_000)
    }

    fn make_detector_with_light_cap(
        mock: Arc<MockGenerationProvider>,
        light_cap: u32,
    ) -> LanguageDetector {
        LanguageDetector::new(
            mock,
            Arc::new(QuotaGovernor::new(1_000, light_cap)),
            &CompanionConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_kannada_script_detected_without_model_call() {
        let mock = Arc::new(MockGenerationProvider::new("unused"));
        let detector = make_detector(mock.clone());

        let result = detector.detect("ನಮಸ್ಕಾರ ಹೇಗಿದ್ದೀರಾ").await;
        assert_eq!(result.language, Language::Kannada);
        assert!(result.confidence >= 0.9);
        assert_eq!(result.method, DetectionMethod::Script);
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_telugu_script_detected_without_model_call() {
        let mock = Arc::new(MockGenerationProvider::new("unused"));
        let detector = make_detector(mock.clone());

        let result = detector.detect("నమస్కారం ఎలా ఉన్నారు").await;
        assert_eq!(result.language, Language::Telugu);
        assert!(result.confidence >= 0.9);
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_plain_english_detected_by_script_stage() {
        let mock = Arc::new(MockGenerationProvider::new("unused"));
        let detector = make_detector(mock.clone());

        let result = detector.detect("Hello, how are you doing today?").await;
        assert_eq!(result.language, Language::English);
        assert_eq!(result.method, DetectionMethod::Script);
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_input_defaults_without_model_call() {
        let mock = Arc::new(MockGenerationProvider::new("unused"));
        let detector = make_detector(mock.clone());

        let result = detector.detect("   ").await;
        assert_eq!(result.language, Language::English);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.method, DetectionMethod::Default);
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_mixed_script_falls_to_model_stage() {
        let mock = Arc::new(MockGenerationProvider::new(
            r#"{"language": "kannada", "confidence": 0.9}"#,
        ));
        let detector = make_detector(mock.clone());

        // Half Latin, half Kannada: neither ratio clears its threshold.
        let result = detector.detect("hello friend how are you ಸರಿ ಸರಿ").await;
        assert_eq!(mock.call_count(), 1);
        assert_eq!(result.language, Language::Kannada);
        assert_eq!(result.method, DetectionMethod::Model);
    }

    #[tokio::test]
    async fn test_model_low_confidence_defaults() {
        let mock = Arc::new(MockGenerationProvider::new(
            r#"{"language": "telugu", "confidence": 0.4}"#,
        ));
        let detector = make_detector(mock);

        let result = detector.detect("hello friend how are you ಸರಿ ಸರಿ").await;
        assert_eq!(result.language, Language::English);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.method, DetectionMethod::Default);
    }

    #[tokio::test]
    async fn test_model_failure_defaults_instead_of_erroring() {
        let mock = Arc::new(MockGenerationProvider::new("unused"));
        mock.push_error(sakhi_core::SakhiError::Llm(
            sakhi_core::LlmError::ProviderNotConfigured,
        ));
        let detector = make_detector(mock);

        let result = detector.detect("hello friend how are you ಸರಿ ಸರಿ").await;
        assert_eq!(result.language, Language::English);
        assert_eq!(result.method, DetectionMethod::Default);
    }

    #[tokio::test]
    async fn test_quota_exhausted_skips_model_stage() {
        let mock = Arc::new(MockGenerationProvider::new(
            r#"{"language": "kannada", "confidence": 0.9}"#,
        ));
        let detector = make_detector_with_light_cap(mock.clone(), 0);

        let result = detector.detect("hello friend how are you ಸರಿ ಸರಿ").await;
        assert_eq!(result.language, Language::English);
        assert_eq!(result.method, DetectionMethod::Default);
        assert_eq!(mock.call_count(), 0);
    }

    #[test]
    fn test_parse_model_verdict_fenced() {
        let output = "```json\n{\"language\": \"telugu\", \"confidence\": 0.85}\n```";
        let verdict = parse_model_verdict(output).unwrap();
        assert_eq!(verdict.language, Language::Telugu);
        assert!((verdict.confidence - 0.85).abs() < 1e-6);
    }

    #[test]
    fn test_parse_model_verdict_clamps_confidence() {
        let output = r#"{"language": "english", "confidence": 3.5}"#;
        let verdict = parse_model_verdict(output).unwrap();
        assert_eq!(verdict.confidence, 1.0);
    }

    #[test]
    fn test_parse_model_verdict_unknown_language() {
        let output = r#"{"language": "french", "confidence": 0.9}"#;
        assert!(parse_model_verdict(output).is_none());
    }

    #[test]
    fn test_parse_model_verdict_garbage() {
        assert!(parse_model_verdict("not json at all").is_none());
    }
}
