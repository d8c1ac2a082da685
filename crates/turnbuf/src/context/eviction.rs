//! Compaction pass: per-turn ceiling enforcement, then oldest-first eviction.
//!
//! The order matters. Truncating a turn changes the running total, and the
//! eviction loop must see the post-truncation total or it would drop more
//! history than necessary.

use std::collections::VecDeque;

use tracing::{debug, info};

use crate::Turn;
use crate::context::truncate::{fits_ceiling, truncate_in_place};

/// What one compaction pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompactionReport {
    /// Turns whose content was truncated to the per-turn ceiling.
    pub truncated: usize,
    /// Turns removed from the front of the buffer.
    pub evicted: usize,
    /// Estimated tokens released by truncation and eviction together.
    pub tokens_freed: usize,
}

impl CompactionReport {
    /// True when the pass left the buffer untouched.
    pub fn is_noop(&self) -> bool {
        self.truncated == 0 && self.evicted == 0
    }

    /// Fold another report into this one.
    pub fn absorb(&mut self, other: CompactionReport) {
        self.truncated += other.truncated;
        self.evicted += other.evicted;
        self.tokens_freed += other.tokens_freed;
    }
}

/// Truncate every turn above `turn_ceiling`, adjusting `total` by the exact
/// delta of each replacement.
pub fn enforce_turn_ceiling(
    turns: &mut VecDeque<Turn>,
    total: &mut usize,
    turn_ceiling: usize,
) -> CompactionReport {
    let mut report = CompactionReport::default();

    for turn in turns.iter_mut() {
        let before = turn.estimated_tokens();
        if fits_ceiling(turn, before, turn_ceiling) {
            continue;
        }
        let after = truncate_in_place(turn, before, turn_ceiling);
        *total = total.saturating_sub(before) + after;
        report.truncated += 1;
        report.tokens_freed += before.saturating_sub(after);
    }

    report
}

/// Remove turns from the front until `total` fits `effective_limit` or the
/// buffer is empty.
pub fn evict_oldest(
    turns: &mut VecDeque<Turn>,
    total: &mut usize,
    effective_limit: usize,
) -> CompactionReport {
    let mut report = CompactionReport::default();

    while *total > effective_limit {
        let Some(removed) = turns.pop_front() else {
            break;
        };
        let tokens = removed.estimated_tokens();
        *total = total.saturating_sub(tokens);
        report.evicted += 1;
        report.tokens_freed += tokens;
        debug!(
            "Evicted {} turn {} (~{} tokens), total now ~{}",
            removed.role, removed.id, tokens, total
        );
    }

    report
}

/// Run the full compaction pass: [`enforce_turn_ceiling`] then
/// [`evict_oldest`].
///
/// Both steps always run. Relative order of the surviving turns is never
/// changed.
pub fn compact(
    turns: &mut VecDeque<Turn>,
    total: &mut usize,
    turn_ceiling: usize,
    effective_limit: usize,
) -> CompactionReport {
    let mut report = enforce_turn_ceiling(turns, total, turn_ceiling);
    report.absorb(evict_oldest(turns, total, effective_limit));

    if !report.is_noop() {
        info!(
            "Compaction: truncated {}, evicted {}, freed ~{}; {} turns, ~{} tokens (limit: {})",
            report.truncated,
            report.evicted,
            report.tokens_freed,
            turns.len(),
            total,
            effective_limit,
        );
    }

    report
}
