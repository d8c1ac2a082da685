//! Persistable snapshot of a buffer.
//!
//! [`MemoryState`] is what [`BoundedMemory::export`](crate::memory::BoundedMemory::export)
//! produces and [`BoundedMemory::import`](crate::memory::BoundedMemory::import)
//! consumes: the ordered turns plus the budget configuration. The per-turn
//! ceiling is not stored; a resumed session uses the ceiling of the
//! process that resumes it.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{MemoryError, Result, Turn};

/// Serializable buffer state.
#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, PartialEq)]
pub struct MemoryState {
    /// Turns, oldest first.
    #[serde(default)]
    pub turns: Vec<Turn>,
    /// Nominal token budget at export time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity_tokens: Option<usize>,
    /// Usable fraction of capacity at export time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reserve_fraction: Option<f64>,
}

impl MemoryState {
    /// JSON Schema describing the persisted document.
    pub fn json_schema() -> serde_json::Value {
        let schema = schemars::schema_for!(MemoryState);
        serde_json::to_value(schema)
            .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}))
    }

    /// Parse a JSON snapshot.
    ///
    /// With `strict`, the document is validated against
    /// [`json_schema`](Self::json_schema) first and every violation is
    /// reported in a single [`MemoryError::InvalidInput`]. Without it, turn
    /// records that don't deserialize and configuration values of the wrong
    /// type are logged and skipped.
    pub fn from_json(json: &str, strict: bool) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        if strict {
            validate_against_schema(&value)?;
            Ok(serde_json::from_value(value)?)
        } else {
            Self::from_value_lenient(value)
        }
    }

    /// Serialize as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn from_value_lenient(value: serde_json::Value) -> Result<Self> {
        let serde_json::Value::Object(mut fields) = value else {
            return Err(MemoryError::InvalidInput(
                "snapshot must be a JSON object".to_string(),
            ));
        };

        let mut turns = Vec::new();
        match fields.remove("turns") {
            Some(serde_json::Value::Array(records)) => {
                for (i, record) in records.into_iter().enumerate() {
                    match serde_json::from_value::<Turn>(record) {
                        Ok(turn) => turns.push(turn),
                        Err(e) => warn!("Skipping unreadable turn record {i}: {e}"),
                    }
                }
            }
            Some(serde_json::Value::Null) | None => {}
            Some(other) => warn!("Ignoring non-array turns field: {other}"),
        }

        let capacity_tokens = match fields.remove("capacity_tokens") {
            Some(v) => v.as_u64().and_then(|n| usize::try_from(n).ok()).or_else(|| {
                warn!("Ignoring capacity_tokens={v}: not a non-negative integer");
                None
            }),
            None => None,
        };
        let reserve_fraction = match fields.remove("reserve_fraction") {
            Some(v) => v.as_f64().or_else(|| {
                warn!("Ignoring reserve_fraction={v}: not a number");
                None
            }),
            None => None,
        };

        Ok(Self {
            turns,
            capacity_tokens,
            reserve_fraction,
        })
    }
}

/// Check a raw document against the [`MemoryState`] schema.
pub fn validate_against_schema(value: &serde_json::Value) -> Result<()> {
    let schema = MemoryState::json_schema();
    let validator = jsonschema::validator_for(&schema)
        .map_err(|e| MemoryError::InvalidInput(format!("snapshot schema is invalid: {e}")))?;

    let errors: Vec<String> = validator
        .iter_errors(value)
        .map(|e| format!("  - {}: {e}", e.instance_path()))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(MemoryError::InvalidInput(format!(
            "snapshot does not match schema:\n{}",
            errors.join("\n")
        )))
    }
}
