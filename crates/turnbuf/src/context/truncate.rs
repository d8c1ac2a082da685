//! Per-turn truncation: shorten one oversized turn to fit a token ceiling.
//!
//! Truncation keeps a prefix of the rendered content proportional to
//! `max_tokens / estimate` and appends [`TRUNCATION_MARKER`]. Structured
//! content is rendered first, so the result is always plain text. The
//! operation is lossy and one-way.

use tracing::warn;

use crate::context::budget::estimate_tokens;
use crate::{Content, Turn};

/// Notice appended to every truncated turn.
///
/// Both the truncator and the "already truncated?" check reference this
/// constant so they can't drift out of sync.
pub const TRUNCATION_MARKER: &str = "\n\n[... Content truncated due to size ...]";

/// Whether `turn` (whose estimate is `current`) already satisfies `max_tokens`.
///
/// A truncation product counts as fitting when the body before the marker
/// fits: the marker itself adds a few tokens that would otherwise make every
/// truncated turn look oversized again.
///
/// The check looks only at the text, so a caller-supplied turn that happens
/// to end with [`TRUNCATION_MARKER`] gets the same allowance and may sit up
/// to `TRUNCATION_MARKER`'s own estimate (plus one for rounding) above
/// `max_tokens` without being truncated.
pub fn fits_ceiling(turn: &Turn, current: usize, max_tokens: usize) -> bool {
    if current <= max_tokens {
        return true;
    }
    match &turn.content {
        Content::Text(text) => text
            .strip_suffix(TRUNCATION_MARKER)
            .is_some_and(|body| estimate_tokens(body) <= max_tokens),
        Content::Blocks(_) => false,
    }
}

/// Truncate `turn` so its content fits `max_tokens`.
///
/// Returns the turn untouched when it already fits, so calling this twice is
/// the same as calling it once. Role, id, and metadata are always preserved;
/// only the content changes.
pub fn truncate_turn(mut turn: Turn, max_tokens: usize) -> Turn {
    let current = turn.estimated_tokens();
    if fits_ceiling(&turn, current, max_tokens) {
        return turn;
    }
    truncate_in_place(&mut turn, current, max_tokens);
    turn
}

/// Replace the content of a turn known to exceed `max_tokens` and return the
/// new estimate.
pub(crate) fn truncate_in_place(turn: &mut Turn, current: usize, max_tokens: usize) -> usize {
    turn.content = truncated_content(&turn.content, current, max_tokens);
    let after = turn.estimated_tokens();
    warn!(
        "Truncated {} turn {} from {} to {} tokens (removed ~{} tokens)",
        turn.role,
        turn.id,
        current,
        after,
        current.saturating_sub(after),
    );
    after
}

/// Keep the first `floor(len * max_tokens / current)` characters of the
/// rendering and append the marker. `current` must exceed `max_tokens`.
fn truncated_content(content: &Content, current: usize, max_tokens: usize) -> Content {
    let rendered = content.render();
    let len = rendered.chars().count();
    let keep = (len as u128 * max_tokens as u128 / current.max(1) as u128) as usize;

    let mut text: String = rendered.chars().take(keep).collect();
    text.push_str(TRUNCATION_MARKER);
    Content::Text(text)
}
