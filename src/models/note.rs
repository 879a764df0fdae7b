//! Note model and title derivation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where a note's content came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NoteSource {
    /// Typed by the user
    Manual,
    /// Saved from a chat exchange
    Chat,
    /// Produced by the text generation backend
    Generated,
}

impl fmt::Display for NoteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manual => write!(f, "manual"),
            Self::Chat => write!(f, "chat"),
            Self::Generated => write!(f, "generated"),
        }
    }
}

impl FromStr for NoteSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "manual" => Ok(Self::Manual),
            "chat" => Ok(Self::Chat),
            "generated" => Ok(Self::Generated),
            _ => Err(format!("Unknown note source: {}", s)),
        }
    }
}

/// A free-text note filed under a category path
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Note {
    pub id: String,
    pub title: String,
    pub content: String,
    /// Category names from root to leaf; empty means uncategorized
    #[serde(default)]
    pub category_path: Vec<String>,
    /// Creation or last modification instant
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Confidence of an automatic categorization, 0.0 - 1.0
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_confidence: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<NoteSource>,
}

impl Note {
    /// Create a manual note stamped with the current time
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        category_path: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            category_path,
            timestamp: Utc::now(),
            tags: Vec::new(),
            ai_confidence: None,
            source: Some(NoteSource::Manual),
        }
    }

    /// Replace the tag set. Duplicates are dropped, first occurrence wins.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.clear();
        for tag in tags {
            let tag = tag.into();
            if !self.tags.contains(&tag) {
                self.tags.push(tag);
            }
        }
        self
    }

    /// Set the categorization confidence, clamped to 0.0 - 1.0
    pub fn with_ai_confidence(mut self, confidence: f32) -> Self {
        self.ai_confidence = Some(confidence.clamp(0.0, 1.0));
        self
    }

    /// True if the note is filed under `path` or one of its descendants.
    ///
    /// An empty `path` matches every note.
    pub fn is_under(&self, path: &[String]) -> bool {
        self.category_path.starts_with(path)
    }

    /// Case-insensitive match on title, content and tags.
    ///
    /// `needle` must already be lowercased.
    pub(crate) fn matches_lowercase(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || self.content.to_lowercase().contains(needle)
            || self.tags.iter().any(|t| t.to_lowercase().contains(needle))
    }
}

// ============================================================================
// Title derivation
// ============================================================================

const SHORT_CONTENT_CHARS: usize = 20;
const QUESTION_MAX_CHARS: usize = 50;
const FIRST_LINE_MAX_CHARS: usize = 60;
const FALLBACK_CHARS: usize = 50;
const MIN_WORD_BREAK_CHARS: usize = 30;

/// Derive a display title from note content.
///
/// Short content is used as-is. Q&A content (`Q: ...` followed by a blank
/// line and `A: ...`) is titled by its question. Otherwise the first line is
/// used when it is short enough, and as a last resort the first 50 characters
/// are cut at a word boundary.
pub fn derive_title(content: &str) -> String {
    let content = content.trim();
    if content.chars().count() <= SHORT_CONTENT_CHARS {
        return content.to_string();
    }

    if content.starts_with("Q:") {
        if let Some(question_end) = content.find("\n\nA:") {
            let question = content[2..question_end].trim();
            if question.chars().count() <= QUESTION_MAX_CHARS {
                return question.to_string();
            }
            return format!("{}...", take_chars(question, QUESTION_MAX_CHARS - 3));
        }
    }

    let first_line = content.lines().next().unwrap_or("").trim();
    if !first_line.is_empty()
        && first_line.chars().count() <= FIRST_LINE_MAX_CHARS
        && !first_line.starts_with("Q:")
    {
        return first_line.to_string();
    }

    if content.chars().count() > FALLBACK_CHARS {
        let truncated = take_chars(content, FALLBACK_CHARS);
        if let Some(space) = truncated.rfind(' ') {
            if truncated[..space].chars().count() > MIN_WORD_BREAK_CHARS {
                return format!("{}...", &truncated[..space]);
            }
        }
        return format!("{}...", truncated);
    }

    content.to_string()
}

/// Prefix of `s` holding at most `n` chars
fn take_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
