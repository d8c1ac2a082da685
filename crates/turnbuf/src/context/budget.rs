//! Token estimation from character counts.
//!
//! Estimates are cheap and deterministic: the rendered content
//! is classified as markup, binary-like, or text, and the character count is
//! divided by a per-kind ratio. Lengths are counted in Unicode scalar values,
//! not bytes, so multi-byte text is not over-charged.

/// Characters per token for natural-language text (conservative).
pub const TEXT_CHARS_PER_TOKEN: usize = 3;

/// Characters per token for HTML documents (denser markup).
pub const MARKUP_CHARS_PER_TOKEN: usize = 4;

/// Characters per token for data URIs and other base64/binary-like payloads.
pub const BINARY_CHARS_PER_TOKEN: usize = 5;

/// Raw-to-stripped length ratio above which content counts as binary-like.
const PADDING_RATIO_THRESHOLD: usize = 10;

/// How a piece of rendered content is charged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// Starts with an HTML document marker.
    Markup,
    /// A `data:` URI, or content that is mostly padding around a small core.
    Binary,
    /// Everything else.
    Text,
}

impl ContentKind {
    /// Classify rendered content.
    pub fn classify(text: &str) -> Self {
        if text.starts_with("<!DOCTYPE html>") || text.starts_with("<html") {
            return ContentKind::Markup;
        }
        if text.starts_with("data:") || is_mostly_padding(text) {
            return ContentKind::Binary;
        }
        ContentKind::Text
    }

    /// Characters charged per estimated token.
    pub fn chars_per_token(self) -> usize {
        match self {
            ContentKind::Markup => MARKUP_CHARS_PER_TOKEN,
            ContentKind::Binary => BINARY_CHARS_PER_TOKEN,
            ContentKind::Text => TEXT_CHARS_PER_TOKEN,
        }
    }
}

/// `len / len(trimmed) > 10` in integer arithmetic. Whitespace-only content
/// has an empty core and counts as padding.
fn is_mostly_padding(text: &str) -> bool {
    let len = text.chars().count();
    if len == 0 {
        return false;
    }
    match text.trim().chars().count() {
        0 => true,
        core => len / core > PADDING_RATIO_THRESHOLD,
    }
}

/// Estimate the token cost of rendered content. Never fails; empty content
/// costs zero.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / ContentKind::classify(text).chars_per_token()
}

/// Snapshot of buffer usage at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetUsage {
    /// Number of turns held.
    pub turns: usize,
    /// Running estimated total.
    pub estimated_tokens: usize,
    /// Effective limit the total is kept under.
    pub effective_limit: usize,
}

impl BudgetUsage {
    /// Usage as a fraction of the effective limit (0.0 to 1.0+).
    pub fn usage_pct(&self) -> f64 {
        if self.effective_limit > 0 {
            self.estimated_tokens as f64 / self.effective_limit as f64
        } else if self.estimated_tokens == 0 {
            0.0
        } else {
            1.0
        }
    }

    /// Format as a short log-friendly string.
    pub fn to_log_string(&self) -> String {
        format!(
            "memory: {} turns, ~{} tokens ({:.0}% of {})",
            self.turns,
            self.estimated_tokens,
            self.usage_pct() * 100.0,
            self.effective_limit,
        )
    }
}
