//! Token accounting for the buffer: estimation, truncation, and compaction.
//!
//! The three pieces are layered:
//!
//! 1. **[`budget`]** estimates the token cost of rendered content with a
//!    character-ratio heuristic that adapts to markup and binary payloads.
//!
//! 2. **[`truncate`]** shortens a single oversized turn to fit a ceiling,
//!    appending [`TRUNCATION_MARKER`] so readers can tell content was cut.
//!
//! 3. **[`eviction`]** runs the compaction pass: ceiling enforcement first,
//!    then oldest-first eviction until the running total fits the effective
//!    limit.
//!
//! [`BoundedMemory`](crate::memory::BoundedMemory) runs the compaction pass
//! after every add and import.

pub mod budget;
pub mod eviction;
pub mod truncate;

// Re-export commonly used items at the module level.
pub use budget::{BudgetUsage, ContentKind, estimate_tokens};
pub use eviction::{CompactionReport, compact};
pub use truncate::{TRUNCATION_MARKER, truncate_turn};
