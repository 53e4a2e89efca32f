//! Closed enumerations shared across the workspace.
//!
//! String round-trips (`as_db_str`/`from_db_str`) exist for every enum that
//! is persisted in message metadata or conversation records.

use serde::{Deserialize, Serialize};

// ============================================================================
// LANGUAGE
// ============================================================================

/// Supported conversation languages.
///
/// English is the default; Kannada and Telugu are the native languages,
/// identified primarily by their Unicode script blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    English,
    Kannada,
    Telugu,
}

impl Language {
    /// ISO-style short code used in persisted message records.
    pub fn code(&self) -> &'static str {
        match self {
            Self::English => "en",
            Self::Kannada => "kn",
            Self::Telugu => "te",
        }
    }

    /// Parse from a short code.
    pub fn from_code(s: &str) -> Result<Self, LanguageParseError> {
        match s {
            "en" => Ok(Self::English),
            "kn" => Ok(Self::Kannada),
            "te" => Ok(Self::Telugu),
            _ => Err(LanguageParseError(s.to_string())),
        }
    }

    /// Whether this is a native (non-default, script-identified) language.
    pub fn is_native(&self) -> bool {
        !matches!(self, Self::English)
    }

    /// All supported languages, default first.
    pub fn all() -> [Language; 3] {
        [Self::English, Self::Kannada, Self::Telugu]
    }
}

impl Default for Language {
    fn default() -> Self {
        Self::English
    }
}

/// Error parsing Language from string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageParseError(pub String);

impl std::fmt::Display for LanguageParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid language code: {}", self.0)
    }
}

impl std::error::Error for LanguageParseError {}

// ============================================================================
// EMOTIONAL TONE
// ============================================================================

/// Tone classification applied to persona replies. Five fixed variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmotionalTone {
    Comforting,
    Encouraging,
    Celebratory,
    Empathetic,
    Neutral,
}

impl EmotionalTone {
    /// Convert to metadata string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::Comforting => "comforting",
            Self::Encouraging => "encouraging",
            Self::Celebratory => "celebratory",
            Self::Empathetic => "empathetic",
            Self::Neutral => "neutral",
        }
    }

    /// Parse from metadata string representation.
    pub fn from_db_str(s: &str) -> Result<Self, ToneParseError> {
        match s {
            "comforting" => Ok(Self::Comforting),
            "encouraging" => Ok(Self::Encouraging),
            "celebratory" => Ok(Self::Celebratory),
            "empathetic" => Ok(Self::Empathetic),
            "neutral" => Ok(Self::Neutral),
            _ => Err(ToneParseError(s.to_string())),
        }
    }
}

impl Default for EmotionalTone {
    fn default() -> Self {
        Self::Neutral
    }
}

/// Error parsing EmotionalTone from string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToneParseError(pub String);

impl std::fmt::Display for ToneParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid emotional tone: {}", self.0)
    }
}

impl std::error::Error for ToneParseError {}

// ============================================================================
// QUOTA TIER
// ============================================================================

/// Generation-service quota bucket.
///
/// Heavy covers structured fact extraction; Light covers conversational
/// replies and language-detection fallback calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    Heavy,
    Light,
}

impl Tier {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::Heavy => "heavy",
            Self::Light => "light",
        }
    }

    /// All tiers.
    pub fn all() -> [Tier; 2] {
        [Self::Heavy, Self::Light]
    }
}

// ============================================================================
// MESSAGE ROLE AND TYPE
// ============================================================================

/// Who authored a persisted message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    pub fn from_db_str(s: &str) -> Result<Self, RoleParseError> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            _ => Err(RoleParseError(s.to_string())),
        }
    }
}

/// Error parsing MessageRole from string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleParseError(pub String);

impl std::fmt::Display for RoleParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid message role: {}", self.0)
    }
}

impl std::error::Error for RoleParseError {}

/// Delivery form of a message. The core only tags it; audio handling is
/// an external concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    Text,
    Voice,
}

impl Default for MessageType {
    fn default() -> Self {
        Self::Text
    }
}

// ============================================================================
// INTERFACE
// ============================================================================

/// Which surface a message arrived from. User identity is canonical across
/// interfaces; this tag only records provenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InterfaceKind {
    Telegram,
    Whatsapp,
    Web,
}

impl InterfaceKind {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::Telegram => "telegram",
            Self::Whatsapp => "whatsapp",
            Self::Web => "web",
        }
    }

    pub fn from_db_str(s: &str) -> Result<Self, InterfaceParseError> {
        match s {
            "telegram" => Ok(Self::Telegram),
            "whatsapp" => Ok(Self::Whatsapp),
            "web" => Ok(Self::Web),
            _ => Err(InterfaceParseError(s.to_string())),
        }
    }
}

/// Error parsing InterfaceKind from string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceParseError(pub String);

impl std::fmt::Display for InterfaceParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid interface: {}", self.0)
    }
}

impl std::error::Error for InterfaceParseError {}

// ============================================================================
// CONVERSATION STATUS
// ============================================================================

/// Conversation lifecycle. A conversation opens implicitly on first message
/// and only an explicit end transitions it; ended conversations never accept
/// new messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConversationStatus {
    Open,
    Ended,
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_code_roundtrip() {
        for lang in Language::all() {
            let code = lang.code();
            let parsed = Language::from_code(code).unwrap();
            assert_eq!(lang, parsed);
        }
    }

    #[test]
    fn test_language_invalid_code() {
        assert!(Language::from_code("hi").is_err());
    }

    #[test]
    fn test_language_native_flags() {
        assert!(!Language::English.is_native());
        assert!(Language::Kannada.is_native());
        assert!(Language::Telugu.is_native());
    }

    #[test]
    fn test_tone_roundtrip() {
        for tone in [
            EmotionalTone::Comforting,
            EmotionalTone::Encouraging,
            EmotionalTone::Celebratory,
            EmotionalTone::Empathetic,
            EmotionalTone::Neutral,
        ] {
            let s = tone.as_db_str();
            let parsed = EmotionalTone::from_db_str(s).unwrap();
            assert_eq!(tone, parsed);
        }
    }

    #[test]
    fn test_role_roundtrip() {
        for role in [MessageRole::User, MessageRole::Assistant] {
            let s = role.as_db_str();
            let parsed = MessageRole::from_db_str(s).unwrap();
            assert_eq!(role, parsed);
        }
    }

    #[test]
    fn test_interface_roundtrip() {
        for iface in [InterfaceKind::Telegram, InterfaceKind::Whatsapp, InterfaceKind::Web] {
            let s = iface.as_db_str();
            let parsed = InterfaceKind::from_db_str(s).unwrap();
            assert_eq!(iface, parsed);
        }
    }

    #[test]
    fn test_defaults() {
        assert_eq!(Language::default(), Language::English);
        assert_eq!(EmotionalTone::default(), EmotionalTone::Neutral);
        assert_eq!(MessageType::default(), MessageType::Text);
    }
}
