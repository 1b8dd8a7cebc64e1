//! Clause aggregation.
//!
//! Folds all arguments of a run into one [`ClauseAggregate`] per clause.
//! The fold builds a fresh map on every call and reads nothing but its
//! input, so aggregating the same arguments twice gives equal results.

use std::collections::{BTreeMap, HashSet};

use crate::models::{normalize_text, Argument, ClauseAggregate, SampleComment, Stance};

/// Maximum sample comments kept per clause.
pub const MAX_SAMPLES: usize = 3;
/// Sample comments longer than this many characters are truncated.
pub const SAMPLE_MAX_CHARS: usize = 100;

/// `1 - |support - objection| / total`, or 0 for an empty clause.
pub fn controversy_score(support: usize, objection: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let score = 1.0 - support.abs_diff(objection) as f64 / total as f64;
    score.clamp(0.0, 1.0)
}

/// Cut to [`SAMPLE_MAX_CHARS`] characters, appending an ellipsis when cut.
pub fn truncate_sample(text: &str) -> String {
    if text.chars().count() > SAMPLE_MAX_CHARS {
        let head: String = text.chars().take(SAMPLE_MAX_CHARS).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

/// Accumulator for one clause during the fold.
#[derive(Debug)]
struct ClauseAccumulator {
    aggregate: ClauseAggregate,
    seen_samples: HashSet<String>,
}

impl ClauseAccumulator {
    fn new(clause_id: &str) -> Self {
        Self {
            aggregate: ClauseAggregate::new(clause_id),
            seen_samples: HashSet::new(),
        }
    }

    fn add(mut self, argument: &Argument) -> Self {
        let agg = &mut self.aggregate;
        agg.total += 1;
        match argument.stance {
            Stance::Support => agg.support_count += 1,
            Stance::Objection => agg.objection_count += 1,
            Stance::Neutral => {}
        }
        agg.themes.extend(argument.themes.iter().cloned());

        let n = agg.total as f64;
        agg.confidence_score = (agg.confidence_score * (n - 1.0) + argument.confidence) / n;

        if agg.sample_comments.len() < MAX_SAMPLES {
            let key = normalize_text(&argument.text);
            if !key.is_empty() && self.seen_samples.insert(key) {
                agg.sample_comments.push(SampleComment {
                    text: truncate_sample(argument.text.trim()),
                    source: argument.source.clone(),
                });
            }
        }
        self
    }

    fn finish(self) -> ClauseAggregate {
        let mut agg = self.aggregate;
        agg.controversy_score =
            controversy_score(agg.support_count, agg.objection_count, agg.total);
        agg.heat_score = agg.total as f64;
        agg
    }
}

/// Group arguments by clause and compute per-clause statistics.
pub fn aggregate(arguments: &[Argument]) -> BTreeMap<String, ClauseAggregate> {
    let accumulators = arguments.iter().fold(
        BTreeMap::<String, ClauseAccumulator>::new(),
        |mut acc, argument| {
            let entry = acc
                .remove(&argument.clause_id)
                .unwrap_or_else(|| ClauseAccumulator::new(&argument.clause_id));
            acc.insert(argument.clause_id.clone(), entry.add(argument));
            acc
        },
    );

    accumulators
        .into_iter()
        .map(|(clause_id, acc)| (clause_id, acc.finish()))
        .collect()
}
