//! Token-budgeted conversation buffer for LLM agents.
//!
//! `turnbuf` keeps the most recent part of a conversation inside an estimated
//! token budget. The core abstraction is [`BoundedMemory`](memory::BoundedMemory):
//! an ordered store of [`Turn`]s that, after every mutation, truncates any turn
//! larger than a per-turn ceiling and then evicts the oldest turns until the
//! running total fits the effective limit.
//!
//! Token counts are an *estimate* derived from character counts (see
//! [`context::budget`]). They are deterministic, so eviction decisions are
//! reproducible across processes, but they are not tokenizer-exact.
//!
//! # Getting started
//!
//! ```
//! use turnbuf::prelude::*;
//!
//! let config = MemoryConfig::default()
//!     .with_capacity(1_000)
//!     .with_reserve_fraction(0.6)
//!     .with_turn_ceiling(500);
//! let mut memory = BoundedMemory::new(config).unwrap();
//!
//! memory
//!     .add(
//!         vec![
//!             Turn::user("Summarize the release notes."),
//!             Turn::assistant("Sure, here is the summary."),
//!         ],
//!         false,
//!     )
//!     .unwrap();
//! assert_eq!(memory.size(), 2);
//!
//! // Persist, then resume in another process.
//! let state = memory.export();
//! let json = serde_json::to_string(&state).unwrap();
//!
//! let mut resumed = BoundedMemory::new(MemoryConfig::default()).unwrap();
//! resumed.import_json(&json, true).unwrap();
//! assert_eq!(resumed.snapshot(), memory.snapshot());
//! ```
//!
//! # Where to find things
//!
//! - **The buffer itself:** [`memory::BoundedMemory`]: add, delete, clear,
//!   snapshot, export, import.
//! - **Budget arithmetic:** [`context::budget`] for the estimator,
//!   [`context::truncate`] for lossy per-turn shortening, and
//!   [`context::eviction`] for the compaction pass that ties them together.
//! - **Configuration:** [`config::MemoryConfig`], including environment
//!   overrides.
//! - **Persistence:** [`state::MemoryState`] is the serializable snapshot;
//!   [`store::MemoryStore`] writes one snapshot per session to disk.
//!
//! # Concurrency
//!
//! A buffer belongs to exactly one conversation. Every mutating method takes
//! `&mut self`; hosts that share a session across tasks wrap the buffer in
//! their own lock.

pub mod config;
pub mod context;
pub mod error;
pub mod memory;
pub mod prelude;
pub mod state;
pub mod store;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

pub use error::{MemoryError, Result};

// ── Turn types ─────────────────────────────────────────────────────

/// Sender category of a turn.
#[derive(Serialize, Deserialize, JsonSchema, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
    Other,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
            Role::Other => write!(f, "other"),
        }
    }
}

/// One typed block of structured turn content.
#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Thinking {
        thinking: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        output: serde_json::Value,
    },
    Image {
        url: String,
    },
}

/// Turn content: plain text or a sequence of typed blocks.
///
/// The buffer only ever looks at the [`render`](Content::render)ed form, so
/// sizing and truncation treat both variants the same way.
#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl Content {
    /// Render the content to the string the estimator and truncator consume.
    ///
    /// Text renders verbatim; blocks render as their compact JSON array.
    pub fn render(&self) -> Cow<'_, str> {
        match self {
            Content::Text(text) => Cow::Borrowed(text),
            Content::Blocks(blocks) => {
                Cow::Owned(serde_json::to_string(blocks).unwrap_or_default())
            }
        }
    }

    /// Plain text, if this is the `Text` variant.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text(text) => Some(text),
            Content::Blocks(_) => None,
        }
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Content::Text(text)
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Content::Text(text.to_string())
    }
}

impl From<Vec<ContentBlock>> for Content {
    fn from(blocks: Vec<ContentBlock>) -> Self {
        Content::Blocks(blocks)
    }
}

/// One message in the conversation.
#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, PartialEq)]
pub struct Turn {
    /// Stable identity used for de-duplication.
    pub id: String,
    pub role: Role,
    pub content: Content,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// RFC 3339 creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl Turn {
    /// Create a turn with a fresh UUID identity and the current timestamp.
    pub fn new(role: Role, content: impl Into<Content>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            name: None,
            url: None,
            timestamp: Some(chrono::Utc::now().to_rfc3339()),
        }
    }

    pub fn system(content: impl Into<Content>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<Content>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<Content>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn tool(content: impl Into<Content>) -> Self {
        Self::new(Role::Tool, content)
    }

    /// Replace the generated identity.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Estimated token cost of this turn's content.
    pub fn estimated_tokens(&self) -> usize {
        context::estimate_tokens(&self.content.render())
    }

    /// Check that this is a usable turn value.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(MemoryError::InvalidInput(format!(
                "{} turn has an empty id",
                self.role
            )));
        }
        Ok(())
    }
}
