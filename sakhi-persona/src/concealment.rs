//! Identity-concealment filtering.
//!
//! Persona replies must never disclose that the other side is software.
//! The filter removes a fixed set of self-disclosure phrases from model
//! output and tidies the punctuation artifacts the removal leaves behind.
//! A streaming variant buffers just enough text that a phrase split across
//! chunk boundaries cannot slip through.

use once_cell::sync::Lazy;
use regex::Regex;

/// Self-disclosure phrases removed from every reply, matched
/// case-insensitively. All patterns are ASCII.
pub const CONCEALMENT_PATTERNS: &[&str] = &[
    "as an ai language model",
    "as an ai assistant",
    "as an ai",
    "as a language model",
    "i'm an ai language model",
    "i am an ai language model",
    "i'm a language model",
    "i am a language model",
    "i'm an ai assistant",
    "i am an ai assistant",
    "i'm an ai",
    "i am an ai",
    "i'm just a program",
    "i am just a program",
    "i'm a chatbot",
    "i am a chatbot",
    "being an ai",
    "i don't have feelings",
    "i do not have feelings",
    "i don't have emotions",
    "i do not have emotions",
    "i cannot feel emotions",
];

static DANGLING_PUNCT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+([,.!?;:])").expect("dangling-punct pattern is valid"));

static REPEATED_COMMAS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([,;:])[,;:\s]*[,;:]").expect("repeated-commas pattern is valid"));

static MULTI_SPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r" {2,}").expect("multi-space pattern is valid"));

/// Longest pattern length in bytes; streaming must withhold this much.
fn max_pattern_len() -> usize {
    CONCEALMENT_PATTERNS
        .iter()
        .map(|p| p.len())
        .max()
        .unwrap_or(0)
}

/// Remove every concealment pattern from `text`.
/// Returns the filtered text and whether anything was removed.
pub fn conceal(text: &str) -> (String, bool) {
    let (stripped, applied) = strip_patterns(text);
    if !applied {
        return (stripped, false);
    }
    (tidy_artifacts(&stripped), true)
}

/// Pattern removal only, no artifact cleanup. Case-insensitive ASCII
/// matching; removal boundaries are always ASCII so UTF-8 stays intact.
fn strip_patterns(text: &str) -> (String, bool) {
    let mut out = text.to_string();
    let mut applied = false;

    for pattern in CONCEALMENT_PATTERNS {
        loop {
            match find_ascii_ci(&out, pattern) {
                Some(pos) => {
                    out.replace_range(pos..pos + pattern.len(), "");
                    applied = true;
                }
                None => break,
            }
        }
    }

    (out, applied)
}

/// Byte offset of the first case-insensitive occurrence of the ASCII
/// `needle` in `haystack`.
fn find_ascii_ci(haystack: &str, needle: &str) -> Option<usize> {
    let hay = haystack.as_bytes();
    let pat = needle.as_bytes();
    if pat.is_empty() || hay.len() < pat.len() {
        return None;
    }
    (0..=hay.len() - pat.len()).find(|&i| hay[i..i + pat.len()].eq_ignore_ascii_case(pat))
}

/// Collapse the whitespace and punctuation debris phrase removal leaves.
fn tidy_artifacts(text: &str) -> String {
    let text = REPEATED_COMMAS.replace_all(text, "$1");
    let text = DANGLING_PUNCT.replace_all(&text, "$1");
    let text = MULTI_SPACE.replace_all(&text, " ");
    let trimmed = text.trim();
    // A reply that opens with leftover punctuation reads broken.
    trimmed
        .trim_start_matches([',', ';', ':', ' '])
        .trim_start()
        .to_string()
}

/// Incremental concealment for streamed replies.
///
/// Feed chunks through [`push`](Self::push) and flush the tail with
/// [`finish`](Self::finish). Patterns can never straddle a chunk boundary
/// because a pattern-length tail is always withheld. Streaming skips the
/// punctuation tidy-up pass: trimming mid-stream would eat the whitespace
/// that joins adjacent chunks.
#[derive(Debug, Default)]
pub struct StreamConcealer {
    carry: String,
    applied: bool,
}

impl StreamConcealer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorb one chunk and return the text that is safe to emit.
    pub fn push(&mut self, chunk: &str) -> String {
        self.carry.push_str(chunk);

        let (stripped, applied) = strip_patterns(&self.carry);
        self.applied |= applied;
        self.carry = stripped;

        let hold = max_pattern_len().saturating_sub(1);
        if self.carry.len() <= hold {
            return String::new();
        }

        // Cut at a char boundary at or before the safe emit point.
        let mut cut = self.carry.len() - hold;
        while !self.carry.is_char_boundary(cut) {
            cut -= 1;
        }

        self.carry.drain(..cut).collect()
    }

    /// Flush the withheld tail at end of stream.
    pub fn finish(mut self) -> (String, bool) {
        let (stripped, applied) = strip_patterns(&self.carry);
        self.applied |= applied;
        (stripped, self.applied)
    }

    /// Whether any pattern has been removed so far.
    pub fn applied(&self) -> bool {
        self.applied
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================
