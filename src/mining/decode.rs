//! Schema-checked decoding of the model's extraction response.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::fallback::extract_themes;
use crate::error::{ExtractionError, ExtractionResult};
use crate::models::{clamp_score, Argument, Comment, Stance, GENERAL_CLAUSE};

const DEFAULT_CONFIDENCE: f64 = 50.0;

/// One element of the model's JSON array, before validation.
#[derive(Debug, Deserialize)]
struct ExtractionRecord {
    #[serde(default)]
    comment: Option<Value>,
    #[serde(default)]
    argument: String,
    #[serde(default)]
    stance: String,
    #[serde(default)]
    clause: Option<String>,
    #[serde(default)]
    citation: Option<String>,
    #[serde(default)]
    confidence: Option<Value>,
    #[serde(default)]
    themes: Vec<String>,
}

/// Slice from the first `[` to the last `]` of a completion.
pub fn locate_json_array(completion: &str) -> Result<&str, String> {
    let start = completion.find('[');
    let end = completion.rfind(']');
    match (start, end) {
        (Some(start), Some(end)) if end > start => Ok(&completion[start..=end]),
        _ => Err(format!(
            "No JSON array found in response. First 100 chars: '{}'",
            completion.chars().take(100).collect::<String>()
        )),
    }
}

/// Accept numbers and numeric strings.
fn number_field(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').parse().ok(),
        _ => None,
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

impl ExtractionRecord {
    /// Validate against the batch and build an argument.
    fn into_argument(self, batch: &[Comment]) -> Option<Argument> {
        let text = self.argument.trim();
        if text.is_empty() {
            debug!("Rejecting extraction record with empty argument");
            return None;
        }

        // 1-based index into the batch
        let index = self.comment.as_ref().and_then(number_field)?;
        if index.fract() != 0.0 || index < 1.0 || index > batch.len() as f64 {
            debug!(index, "Rejecting extraction record with out-of-range comment");
            return None;
        }
        let comment = &batch[index as usize - 1];

        let clause = non_empty(self.clause.as_deref())
            .or_else(|| non_empty(comment.policy_clause.as_deref()))
            .unwrap_or(GENERAL_CLAUSE)
            .to_string();

        let confidence = self
            .confidence
            .as_ref()
            .and_then(number_field)
            .map(|c| clamp_score(c, 0.0, 100.0))
            .unwrap_or(DEFAULT_CONFIDENCE);

        let mut themes = extract_themes(text);
        themes.extend(
            self.themes
                .iter()
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty()),
        );
        if themes.len() > 1 {
            themes.remove("general");
        }

        let stance = Stance::coerce(&self.stance);
        let mut argument = Argument::new(comment, text, stance, clause, confidence);
        argument.themes = themes;
        if let Some(hint) = non_empty(self.citation.as_deref()) {
            argument = argument.with_reference_hint(hint);
        }
        Some(argument)
    }
}

/// Decode a completion into arguments for `batch`.
///
/// Malformed elements are dropped individually; a response with no usable
/// element is a transient failure so the caller can fall back.
pub fn decode_completion(
    completion: &str,
    batch: &[Comment],
    batch_index: usize,
) -> ExtractionResult<Vec<Argument>> {
    let transient = |message: String| ExtractionError::Transient {
        batch: batch_index,
        message,
    };

    let span = locate_json_array(completion).map_err(transient)?;
    let items: Vec<Value> = serde_json::from_str(span)
        .map_err(|e| transient(format!("Invalid JSON array: {}", e)))?;

    let arguments: Vec<Argument> = items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<ExtractionRecord>(item) {
            Ok(record) => record.into_argument(batch),
            Err(e) => {
                debug!(error = %e, "Rejecting malformed extraction record");
                None
            }
        })
        .collect();

    if arguments.is_empty() {
        return Err(transient("Response contained no valid arguments".to_string()));
    }

    Ok(arguments)
}
