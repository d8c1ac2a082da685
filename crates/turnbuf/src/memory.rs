//! The token-budgeted conversation buffer.
//!
//! [`BoundedMemory`] holds the turns of one conversation, oldest first, and a
//! running estimate of their token cost. Every add and import ends with a
//! compaction pass (see [`crate::context::eviction`]), so after any public
//! method returns:
//!
//! - the running total equals the sum of per-turn estimates;
//! - the total fits the effective limit, or the buffer is empty;
//! - every turn fits the per-turn ceiling;
//! - ids are unique unless the caller asked for duplicates;
//! - surviving turns keep their relative order.

use std::collections::{BTreeSet, HashSet, VecDeque};

use tracing::{debug, info, warn};

use crate::config::{MemoryConfig, validate_reserve_fraction};
use crate::context::budget::BudgetUsage;
use crate::context::eviction::{CompactionReport, compact};
use crate::context::truncate::{fits_ceiling, truncate_in_place};
use crate::state::MemoryState;
use crate::{MemoryError, Result, Turn};

/// Outcome of an [`add`](BoundedMemory::add).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddReport {
    /// Turns appended to the buffer (before compaction).
    pub added: usize,
    /// Incoming turns dropped because their id was already present.
    pub duplicates_dropped: usize,
    /// What the compaction pass after the append changed.
    pub compaction: CompactionReport,
}

/// Bounded, ordered store of conversation turns kept within a token budget.
///
/// Not internally synchronized: one instance belongs to one conversation and
/// all mutation goes through `&mut self`.
///
/// # Example
///
/// ```
/// use turnbuf::prelude::*;
///
/// let config = MemoryConfig::default()
///     .with_capacity(1_000)
///     .with_reserve_fraction(0.6)
///     .with_turn_ceiling(500);
/// let mut memory = BoundedMemory::new(config).unwrap();
///
/// // Four turns of 100, 100, 100 and 400 estimated tokens.
/// let turns: Vec<Turn> = [100_usize, 100, 100, 400]
///     .iter()
///     .map(|tokens| Turn::user("x".repeat(tokens * 3)))
///     .collect();
/// let report = memory.add(turns, false).unwrap();
///
/// // 700 > 600, so the oldest turn was evicted.
/// assert_eq!(report.compaction.evicted, 1);
/// assert_eq!(memory.size(), 3);
/// assert_eq!(memory.estimated_tokens(), 600);
/// ```
#[derive(Debug, Clone)]
pub struct BoundedMemory {
    turns: VecDeque<Turn>,
    estimated_tokens: usize,
    config: MemoryConfig,
}

impl BoundedMemory {
    /// Create an empty buffer. Fails if the reserve fraction is outside `(0, 1]`.
    pub fn new(config: MemoryConfig) -> Result<Self> {
        config.validate()?;
        debug!(
            "BoundedMemory: capacity {}, effective limit {}, turn ceiling {}",
            config.capacity_tokens,
            config.effective_limit(),
            config.per_turn_ceiling_tokens,
        );
        Ok(Self {
            turns: VecDeque::new(),
            estimated_tokens: 0,
            config,
        })
    }

    // ── Inspection ─────────────────────────────────────────────────

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// `floor(capacity_tokens * reserve_fraction)`.
    pub fn effective_limit(&self) -> usize {
        self.config.effective_limit()
    }

    /// Running estimated token total.
    pub fn estimated_tokens(&self) -> usize {
        self.estimated_tokens
    }

    pub fn usage(&self) -> BudgetUsage {
        BudgetUsage {
            turns: self.turns.len(),
            estimated_tokens: self.estimated_tokens,
            effective_limit: self.effective_limit(),
        }
    }

    /// Number of turns held.
    pub fn size(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Borrowing iterator over the turns, oldest first.
    pub fn turns(&self) -> impl ExactSizeIterator<Item = &Turn> + DoubleEndedIterator {
        self.turns.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Turn> {
        self.turns.get(index)
    }

    /// Copy of the current turns, oldest first. Mutating the result has no
    /// effect on the buffer.
    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.iter().cloned().collect()
    }

    // ── Mutation ───────────────────────────────────────────────────

    /// Append turns and run one compaction pass for the whole batch.
    ///
    /// Every turn is validated first; an invalid one fails the call with
    /// [`MemoryError::InvalidInput`] and nothing is appended. Unless
    /// `allow_duplicates`, a turn whose id is already in the buffer (or
    /// earlier in the same batch) is dropped silently.
    pub fn add(
        &mut self,
        turns: impl IntoIterator<Item = Turn>,
        allow_duplicates: bool,
    ) -> Result<AddReport> {
        let incoming: Vec<Turn> = turns.into_iter().collect();
        for (position, turn) in incoming.iter().enumerate() {
            turn.validate().map_err(|e| at_position(position, e))?;
        }

        let mut report = AddReport::default();
        let mut seen: HashSet<String> = if allow_duplicates {
            HashSet::new()
        } else {
            self.turns.iter().map(|t| t.id.clone()).collect()
        };

        for turn in incoming {
            if !allow_duplicates && !seen.insert(turn.id.clone()) {
                debug!("Dropping duplicate turn {}", turn.id);
                report.duplicates_dropped += 1;
                continue;
            }
            self.append(turn);
            report.added += 1;
        }

        report.compaction = self.compact();
        Ok(report)
    }

    /// Append a single turn, dropping it if its id is already present.
    pub fn push(&mut self, turn: Turn) -> Result<AddReport> {
        self.add([turn], false)
    }

    /// Add from an untyped JSON value: one turn object, an array of them, or
    /// `null` (a no-op).
    ///
    /// Any element that is not a turn fails the whole call with
    /// [`MemoryError::InvalidInput`] before anything is appended.
    pub fn add_value(
        &mut self,
        value: serde_json::Value,
        allow_duplicates: bool,
    ) -> Result<AddReport> {
        let turns = match value {
            serde_json::Value::Null => return Ok(AddReport::default()),
            serde_json::Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| {
                    serde_json::from_value::<Turn>(item).map_err(|e| {
                        MemoryError::InvalidInput(format!("element {i} is not a turn: {e}"))
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            object @ serde_json::Value::Object(_) => vec![
                serde_json::from_value::<Turn>(object)
                    .map_err(|e| MemoryError::InvalidInput(format!("not a turn: {e}")))?,
            ],
            other => {
                return Err(MemoryError::InvalidInput(format!(
                    "expected a turn or an array of turns, got {}",
                    json_kind(&other)
                )));
            }
        };
        self.add(turns, allow_duplicates)
    }

    /// Remove every turn and reset the running total.
    pub fn clear(&mut self) {
        self.turns.clear();
        self.estimated_tokens = 0;
    }

    /// Remove the turns at the given zero-based positions.
    ///
    /// All-or-nothing: if any index is `>= size()` the call fails with
    /// [`MemoryError::OutOfRange`] listing every offending index and the
    /// buffer is unchanged. Repeated indices name the same turn once.
    /// Returns the removed turns in their original order.
    pub fn delete(&mut self, indices: &[usize]) -> Result<Vec<Turn>> {
        let size = self.turns.len();
        let invalid: BTreeSet<usize> = indices.iter().copied().filter(|&i| i >= size).collect();
        if !invalid.is_empty() {
            return Err(MemoryError::OutOfRange {
                indices: invalid.into_iter().collect(),
                size,
            });
        }

        let targets: BTreeSet<usize> = indices.iter().copied().collect();
        let mut removed = Vec::with_capacity(targets.len());
        // Highest first so earlier removals don't shift later positions.
        for index in targets.into_iter().rev() {
            if let Some(turn) = self.turns.remove(index) {
                self.estimated_tokens = self
                    .estimated_tokens
                    .saturating_sub(turn.estimated_tokens());
                removed.push(turn);
            }
        }
        removed.reverse();

        debug!(
            "Deleted {} turn(s); {}",
            removed.len(),
            self.usage().to_log_string()
        );
        Ok(removed)
    }

    /// Query-based retrieval is not supported by this buffer; always fails
    /// with [`MemoryError::NotImplemented`].
    pub fn retrieve(&self, _query: &str) -> Result<Vec<Turn>> {
        Err(MemoryError::NotImplemented("retrieve"))
    }

    // ── Persistence ────────────────────────────────────────────────

    /// Export turns plus `capacity_tokens` and `reserve_fraction`.
    ///
    /// The per-turn ceiling is runtime-local and not part of the state.
    pub fn export(&self) -> MemoryState {
        MemoryState {
            turns: self.snapshot(),
            capacity_tokens: Some(self.config.capacity_tokens),
            reserve_fraction: Some(self.config.reserve_fraction),
        }
    }

    /// Replace the buffer with a previously exported state.
    ///
    /// Configuration values present in `state` replace the current ones.
    /// Turns are appended one at a time (ceiling applied per append, no
    /// de-duplication), then a final compaction pass runs.
    ///
    /// With `strict`, a reserve fraction outside `(0, 1]` or a turn with an
    /// empty id fails the call with [`MemoryError::InvalidInput`] and the
    /// buffer is untouched. Without it, such values are logged and skipped.
    pub fn import(&mut self, state: MemoryState, strict: bool) -> Result<CompactionReport> {
        let capacity_tokens = state
            .capacity_tokens
            .unwrap_or(self.config.capacity_tokens);
        let reserve_fraction = match state.reserve_fraction {
            Some(fraction) => match validate_reserve_fraction(fraction) {
                Ok(()) => fraction,
                Err(e) if strict => return Err(e),
                Err(e) => {
                    warn!("Keeping current reserve_fraction: {e}");
                    self.config.reserve_fraction
                }
            },
            None => self.config.reserve_fraction,
        };

        let mut turns = Vec::with_capacity(state.turns.len());
        for (position, turn) in state.turns.into_iter().enumerate() {
            match turn.validate() {
                Ok(()) => turns.push(turn),
                Err(e) if strict => return Err(at_position(position, e)),
                Err(e) => warn!("Skipping turn {position} on import: {e}"),
            }
        }

        self.config.capacity_tokens = capacity_tokens;
        self.config.reserve_fraction = reserve_fraction;
        self.clear();

        let ceiling = self.config.per_turn_ceiling_tokens;
        let mut report = CompactionReport::default();
        for mut turn in turns {
            let before = turn.estimated_tokens();
            if !fits_ceiling(&turn, before, ceiling) {
                let after = truncate_in_place(&mut turn, before, ceiling);
                report.truncated += 1;
                report.tokens_freed += before.saturating_sub(after);
            }
            self.append(turn);
        }
        report.absorb(self.compact());

        info!(
            "Loaded {} turns (~{} tokens, limit: {})",
            self.turns.len(),
            self.estimated_tokens,
            self.effective_limit(),
        );
        Ok(report)
    }

    /// Parse a JSON snapshot (see [`MemoryState::from_json`]) and
    /// [`import`](Self::import) it.
    pub fn import_json(&mut self, json: &str, strict: bool) -> Result<CompactionReport> {
        let state = MemoryState::from_json(json, strict)?;
        self.import(state, strict)
    }

    // ── Internals ──────────────────────────────────────────────────

    fn append(&mut self, turn: Turn) {
        self.estimated_tokens += turn.estimated_tokens();
        self.turns.push_back(turn);
    }

    fn compact(&mut self) -> CompactionReport {
        let effective_limit = self.config.effective_limit();
        compact(
            &mut self.turns,
            &mut self.estimated_tokens,
            self.config.per_turn_ceiling_tokens,
            effective_limit,
        )
    }
}

fn at_position(position: usize, err: MemoryError) -> MemoryError {
    match err {
        MemoryError::InvalidInput(msg) => {
            MemoryError::InvalidInput(format!("turn {position}: {msg}"))
        }
        other => other,
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::truncate::TRUNCATION_MARKER;
    use crate::{Content, Role};

    fn memory(capacity: usize, fraction: f64, ceiling: usize) -> BoundedMemory {
        BoundedMemory::new(
            MemoryConfig::new()
                .with_capacity(capacity)
                .with_reserve_fraction(fraction)
                .with_turn_ceiling(ceiling),
        )
        .unwrap()
    }

    /// A text turn estimating to exactly `tokens`.
    fn sized(id: &str, tokens: usize) -> Turn {
        Turn::user("x".repeat(tokens * 3)).with_id(id)
    }

    fn ids(memory: &BoundedMemory) -> Vec<String> {
        memory.turns().map(|t| t.id.clone()).collect()
    }

    fn recomputed(memory: &BoundedMemory) -> usize {
        memory.turns().map(Turn::estimated_tokens).sum()
    }

    #[test]
    fn new_rejects_bad_fraction() {
        let err = BoundedMemory::new(MemoryConfig::new().with_reserve_fraction(0.0)).unwrap_err();
        assert!(matches!(err, MemoryError::InvalidInput(_)));
    }

    #[test]
    fn starts_empty() {
        let m = memory(1000, 0.6, 500);
        assert_eq!(m.size(), 0);
        assert!(m.is_empty());
        assert_eq!(m.estimated_tokens(), 0);
        assert_eq!(m.effective_limit(), 600);
    }

    #[test]
    fn add_evicts_oldest_over_limit() {
        let mut m = memory(1000, 0.6, 500);
        let report = m
            .add(
                vec![sized("a", 100), sized("b", 100), sized("c", 100), sized("d", 400)],
                false,
            )
            .unwrap();

        assert_eq!(report.added, 4);
        assert_eq!(report.compaction.evicted, 1);
        assert_eq!(ids(&m), ["b", "c", "d"]);
        assert_eq!(m.estimated_tokens(), 600);
        assert_eq!(m.estimated_tokens(), recomputed(&m));
    }

    #[test]
    fn add_truncates_oversized_turn() {
        let mut m = memory(10_000, 1.0, 500);
        let text: String = ('a'..='z').cycle().take(1800).collect();
        let report = m.add([Turn::user(text.clone()).with_id("big")], false).unwrap();

        assert_eq!(report.compaction.truncated, 1);
        let stored = m.get(0).unwrap();
        assert_eq!(stored.id, "big");
        let body = stored
            .content
            .as_text()
            .unwrap()
            .strip_suffix(TRUNCATION_MARKER)
            .unwrap();
        assert_eq!(body.chars().count(), 1500);
        assert!(text.starts_with(body));
        assert_eq!(m.estimated_tokens(), stored.estimated_tokens());
    }

    #[test]
    fn duplicates_are_dropped_by_default() {
        let mut m = memory(1000, 1.0, 500);
        m.add([sized("a", 10)], false).unwrap();
        let report = m.add([sized("a", 20), sized("b", 5)], false).unwrap();

        assert_eq!(report.duplicates_dropped, 1);
        assert_eq!(report.added, 1);
        assert_eq!(ids(&m), ["a", "b"]);
        assert_eq!(m.estimated_tokens(), 15);
    }

    #[test]
    fn duplicates_within_batch_are_dropped() {
        let mut m = memory(1000, 1.0, 500);
        let report = m.add([sized("a", 10), sized("a", 10)], false).unwrap();
        assert_eq!(report.duplicates_dropped, 1);
        assert_eq!(m.size(), 1);
    }

    #[test]
    fn duplicates_allowed_on_request() {
        let mut m = memory(1000, 1.0, 500);
        m.add([sized("a", 10)], false).unwrap();
        m.add([sized("a", 10), sized("a", 10)], true).unwrap();
        assert_eq!(ids(&m), ["a", "a", "a"]);
        assert_eq!(m.estimated_tokens(), 30);
    }

    #[test]
    fn invalid_turn_rejects_whole_batch() {
        let mut m = memory(1000, 1.0, 500);
        let err = m
            .add([sized("a", 10), Turn::user("no id").with_id("")], false)
            .unwrap_err();
        assert!(matches!(err, MemoryError::InvalidInput(ref msg) if msg.contains("turn 1")));
        assert!(m.is_empty());
    }

    #[test]
    fn push_adds_single_turn() {
        let mut m = memory(1000, 1.0, 500);
        m.push(sized("a", 1)).unwrap();
        m.push(sized("a", 1)).unwrap();
        assert_eq!(m.size(), 1);
    }

    #[test]
    fn add_value_accepts_object_and_array() {
        let mut m = memory(1000, 1.0, 500);
        m.add_value(
            serde_json::json!({"id": "a", "role": "user", "content": "hello"}),
            false,
        )
        .unwrap();
        m.add_value(
            serde_json::json!([
                {"id": "b", "role": "assistant", "content": [{"type": "text", "text": "hi"}]},
                {"id": "c", "role": "system", "content": "rules", "name": "sys"}
            ]),
            false,
        )
        .unwrap();
        assert_eq!(ids(&m), ["a", "b", "c"]);
        assert_eq!(m.get(2).unwrap().name.as_deref(), Some("sys"));
        assert!(matches!(m.get(1).unwrap().content, Content::Blocks(_)));
    }

    #[test]
    fn add_value_null_is_noop() {
        let mut m = memory(1000, 1.0, 500);
        let report = m.add_value(serde_json::Value::Null, false).unwrap();
        assert_eq!(report, AddReport::default());
    }

    #[test]
    fn add_value_rejects_non_turns() {
        let mut m = memory(1000, 1.0, 500);
        let err = m.add_value(serde_json::json!(42), false).unwrap_err();
        assert!(matches!(err, MemoryError::InvalidInput(ref msg) if msg.contains("a number")));

        let err = m
            .add_value(
                serde_json::json!([
                    {"id": "a", "role": "user", "content": "ok"},
                    {"role": "user"}
                ]),
                false,
            )
            .unwrap_err();
        assert!(matches!(err, MemoryError::InvalidInput(ref msg) if msg.contains("element 1")));
        assert!(m.is_empty());
    }

    #[test]
    fn snapshot_is_a_copy() {
        let mut m = memory(1000, 1.0, 500);
        m.add([sized("a", 10)], false).unwrap();
        let mut snap = m.snapshot();
        snap[0].content = Content::Text("changed".into());
        snap.clear();
        assert_eq!(m.size(), 1);
        assert_eq!(m.get(0).unwrap().estimated_tokens(), 10);
    }

    #[test]
    fn clear_resets_total() {
        let mut m = memory(1000, 1.0, 500);
        m.add([sized("a", 10), sized("b", 20)], false).unwrap();
        m.clear();
        assert_eq!(m.size(), 0);
        assert_eq!(m.estimated_tokens(), 0);
    }

    #[test]
    fn delete_removes_highest_first() {
        let mut m = memory(1000, 1.0, 500);
        m.add([sized("a", 10), sized("b", 20), sized("c", 30)], false)
            .unwrap();
        let removed = m.delete(&[0, 2]).unwrap();

        assert_eq!(ids(&m), ["b"]);
        assert_eq!(m.estimated_tokens(), 20);
        let removed_ids: Vec<&str> = removed.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(removed_ids, ["a", "c"]);
    }

    #[test]
    fn delete_out_of_range_changes_nothing() {
        let mut m = memory(1000, 1.0, 500);
        m.add([sized("a", 10), sized("b", 20)], false).unwrap();
        let before = m.snapshot();

        let err = m.delete(&[5, 0, 2, 5]).unwrap_err();
        match err {
            MemoryError::OutOfRange { indices, size } => {
                assert_eq!(indices, vec![2, 5]);
                assert_eq!(size, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(m.snapshot(), before);
        assert_eq!(m.estimated_tokens(), 30);
    }

    #[test]
    fn delete_repeated_index_removes_once() {
        let mut m = memory(1000, 1.0, 500);
        m.add([sized("a", 10), sized("b", 20)], false).unwrap();
        m.delete(&[1, 1]).unwrap();
        assert_eq!(ids(&m), ["a"]);
    }

    #[test]
    fn retrieve_always_fails() {
        let mut m = memory(1000, 1.0, 500);
        assert!(matches!(m.retrieve("x"), Err(MemoryError::NotImplemented("retrieve"))));
        m.add([sized("a", 10)], false).unwrap();
        assert!(matches!(m.retrieve(""), Err(MemoryError::NotImplemented(_))));
    }

    #[test]
    fn export_carries_budget_but_not_ceiling() {
        let mut m = memory(1000, 0.6, 500);
        m.add([sized("a", 10)], false).unwrap();
        let state = m.export();
        assert_eq!(state.capacity_tokens, Some(1000));
        assert_eq!(state.reserve_fraction, Some(0.6));
        assert_eq!(state.turns, m.snapshot());

        let json = serde_json::to_value(&state).unwrap();
        assert!(json.get("per_turn_ceiling_tokens").is_none());
    }

    #[test]
    fn import_round_trips() {
        let mut m = memory(1000, 0.6, 500);
        m.add(
            [
                sized("a", 100),
                Turn::assistant("z".repeat(2400)).with_id("big").with_name("bot"),
                Turn::tool("done").with_id("t").with_url("https://example.com"),
            ],
            false,
        )
        .unwrap();

        let mut resumed = memory(50, 0.5, 500);
        resumed.import(m.export(), true).unwrap();

        assert_eq!(resumed.snapshot(), m.snapshot());
        assert_eq!(resumed.config(), m.config());
        assert_eq!(resumed.estimated_tokens(), m.estimated_tokens());
    }

    #[test]
    fn import_keeps_config_when_absent() {
        let mut m = memory(2000, 0.5, 500);
        let state = MemoryState {
            turns: vec![sized("a", 10)],
            capacity_tokens: None,
            reserve_fraction: None,
        };
        m.import(state, true).unwrap();
        assert_eq!(m.config().capacity_tokens, 2000);
        assert_eq!(m.effective_limit(), 1000);
        assert_eq!(m.size(), 1);
    }

    #[test]
    fn import_applies_new_budget_and_compacts() {
        let mut m = memory(10_000, 1.0, 500);
        let state = MemoryState {
            turns: vec![sized("a", 100), sized("b", 80), sized("c", 900)],
            capacity_tokens: Some(1000),
            reserve_fraction: Some(0.6),
        };
        let report = m.import(state, true).unwrap();

        assert_eq!(m.effective_limit(), 600);
        assert_eq!(report.truncated, 1);
        // a(100) + b(80) + c(~513) > 600: the oldest goes, b + c fits.
        assert_eq!(ids(&m), ["b", "c"]);
        assert_eq!(m.estimated_tokens(), recomputed(&m));
        assert!(m.estimated_tokens() <= 600);
    }

    #[test]
    fn import_replaces_existing_turns() {
        let mut m = memory(1000, 1.0, 500);
        m.add([sized("old", 10)], false).unwrap();
        m.import(
            MemoryState {
                turns: vec![sized("new", 10)],
                capacity_tokens: None,
                reserve_fraction: None,
            },
            true,
        )
        .unwrap();
        assert_eq!(ids(&m), ["new"]);
    }

    #[test]
    fn import_does_not_deduplicate() {
        let mut m = memory(1000, 1.0, 500);
        let state = MemoryState {
            turns: vec![sized("a", 10), sized("a", 10)],
            capacity_tokens: None,
            reserve_fraction: None,
        };
        m.import(state, true).unwrap();
        assert_eq!(m.size(), 2);
    }

    #[test]
    fn strict_import_rejects_bad_fraction() {
        let mut m = memory(1000, 1.0, 500);
        m.add([sized("keep", 10)], false).unwrap();
        let state = MemoryState {
            turns: vec![],
            capacity_tokens: Some(10),
            reserve_fraction: Some(1.5),
        };
        assert!(matches!(m.import(state, true), Err(MemoryError::InvalidInput(_))));
        assert_eq!(ids(&m), ["keep"]);
        assert_eq!(m.config().capacity_tokens, 1000);
    }

    #[test]
    fn lenient_import_ignores_bad_values() {
        let mut m = memory(1000, 0.8, 500);
        let state = MemoryState {
            turns: vec![sized("a", 10), Turn::user("x").with_id("")],
            capacity_tokens: Some(500),
            reserve_fraction: Some(-1.0),
        };
        m.import(state, false).unwrap();
        assert_eq!(m.config().capacity_tokens, 500);
        assert!((m.config().reserve_fraction - 0.8).abs() < f64::EPSILON);
        assert_eq!(ids(&m), ["a"]);
    }

    #[test]
    fn roles_and_metadata_survive_truncation() {
        let mut m = memory(100_000, 1.0, 50);
        m.add(
            [Turn::new(Role::Other, "y".repeat(600))
                .with_id("o")
                .with_name("n")
                .with_url("u")],
            false,
        )
        .unwrap();
        let turn = m.get(0).unwrap();
        assert_eq!(turn.role, Role::Other);
        assert_eq!(turn.name.as_deref(), Some("n"));
        assert_eq!(turn.url.as_deref(), Some("u"));
        assert!(turn.timestamp.is_some());
    }

    #[test]
    fn usage_reports_current_state() {
        let mut m = memory(1000, 0.6, 500);
        m.add([sized("a", 300)], false).unwrap();
        let usage = m.usage();
        assert_eq!(usage.turns, 1);
        assert_eq!(usage.estimated_tokens, 300);
        assert_eq!(usage.effective_limit, 600);
    }
}
