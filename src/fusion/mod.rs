//! Cross-source fusion statistics over extracted arguments.
//!
//! Arguments are grouped by normalized text so the same point raised by
//! several commenters can be weighted, cross-validated, and flagged when
//! it looks like coordinated repetition.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::models::{normalize_text, Argument};

/// Distinct source comments above which a repeated argument is flagged.
pub const DEFAULT_ECHO_THRESHOLD: usize = 10;

/// Weight bonus per distinct source comment.
const DIVERSITY_BONUS: f64 = 0.1;

/// Fusion statistics for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FusionReport {
    /// Argument id → weight.
    pub weights: BTreeMap<String, f64>,
    /// Ids of arguments repeated by suspiciously many sources.
    pub echo_chambers: Vec<String>,
    /// Argument id → raised more than once.
    pub cross_validated: BTreeMap<String, bool>,
}

fn group_by_text(arguments: &[Argument]) -> HashMap<String, Vec<&Argument>> {
    let mut groups: HashMap<String, Vec<&Argument>> = HashMap::new();
    for arg in arguments {
        groups.entry(normalize_text(&arg.text)).or_default().push(arg);
    }
    groups
}

fn distinct_sources(group: &[&Argument]) -> usize {
    group
        .iter()
        .map(|a| a.source_comment_id.as_str())
        .collect::<BTreeSet<_>>()
        .len()
}

/// Weight = mean normalized confidence × (1 + 0.1 × distinct sources).
pub fn argument_weights(arguments: &[Argument]) -> BTreeMap<String, f64> {
    let mut weights = BTreeMap::new();
    for group in group_by_text(arguments).values() {
        let mean = group.iter().map(|a| a.confidence / 100.0).sum::<f64>() / group.len() as f64;
        let weight = mean * (1.0 + distinct_sources(group) as f64 * DIVERSITY_BONUS);
        for arg in group {
            weights.insert(arg.id.clone(), weight);
        }
    }
    weights
}

/// Ids of arguments whose text is shared by more than `threshold` sources.
pub fn detect_echo_chambers(arguments: &[Argument], threshold: usize) -> Vec<String> {
    let groups = group_by_text(arguments);
    let flagged: BTreeSet<String> = groups
        .values()
        .filter(|group| distinct_sources(group) > threshold)
        .flat_map(|group| group.iter().map(|a| a.id.clone()))
        .collect();

    // Keep input order for stable output
    arguments
        .iter()
        .filter(|a| flagged.contains(&a.id))
        .map(|a| a.id.clone())
        .collect()
}

/// Argument id → whether its text appears in more than one argument.
pub fn cross_validate(arguments: &[Argument]) -> BTreeMap<String, bool> {
    let mut result = BTreeMap::new();
    for group in group_by_text(arguments).values() {
        let validated = group.len() > 1;
        for arg in group {
            result.insert(arg.id.clone(), validated);
        }
    }
    result
}

/// All fusion statistics with the default echo threshold.
pub fn fuse(arguments: &[Argument]) -> FusionReport {
    FusionReport {
        weights: argument_weights(arguments),
        echo_chambers: detect_echo_chambers(arguments, DEFAULT_ECHO_THRESHOLD),
        cross_validated: cross_validate(arguments),
    }
}
