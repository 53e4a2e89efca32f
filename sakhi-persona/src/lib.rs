//! Sakhi Persona - Language Detection and Response Synthesis
//!
//! The user-facing voice of the companion: detects the language of each
//! message, renders persona instructions from remembered facts and recent
//! history, and filters generated replies so the persona never breaks
//! character.

pub mod concealment;
pub mod language;
pub mod synthesizer;

pub use concealment::{conceal, StreamConcealer, CONCEALMENT_PATTERNS};
pub use language::{Detection, DetectionMethod, LanguageDetector};
pub use synthesizer::{classify_tone, PersonaReply, PersonaSynthesizer};
