//! Convenience re-exports for common `turnbuf` types.
//!
//! ```ignore
//! use turnbuf::prelude::*;
//! ```
//!
//! Compaction internals (ceiling enforcement, eviction helpers) are left
//! out; import those from [`crate::context`] when needed.

// ── Core types ──────────────────────────────────────────────────────
pub use crate::{Content, ContentBlock, MemoryError, Result, Role, Turn};

// ── Buffer ──────────────────────────────────────────────────────────
pub use crate::config::MemoryConfig;
pub use crate::memory::{AddReport, BoundedMemory};

// ── Context accounting ──────────────────────────────────────────────
pub use crate::context::{BudgetUsage, CompactionReport, TRUNCATION_MARKER, estimate_tokens};

// ── Persistence ─────────────────────────────────────────────────────
pub use crate::state::MemoryState;
pub use crate::store::MemoryStore;
