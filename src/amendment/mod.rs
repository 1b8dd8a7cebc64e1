//! Amendment suggestions derived from clause aggregates.

use std::collections::{BTreeMap, HashMap};

use uuid::Uuid;

use crate::models::{AmendmentSuggestion, Argument, ClauseAggregate, Stance, SuggestionKind};

/// Default number of suggestions returned.
pub const DEFAULT_LIMIT: usize = 10;
/// Bounds applied to a caller-supplied limit.
pub const MIN_LIMIT: usize = 5;
pub const MAX_LIMIT: usize = 10;

/// Minimum votes on the winning side before a one-sided suggestion is made.
const MIN_DOMINANT_COUNT: usize = 2;
/// Themes named in an objection summary.
const TOP_THEMES: usize = 3;

/// Clamp a caller-supplied limit to the supported range.
pub fn effective_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(MIN_LIMIT, MAX_LIMIT)
}

/// Most frequent themes among a clause's objections, most frequent first,
/// ties broken alphabetically.
fn objection_themes(clause_args: &[&Argument]) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for arg in clause_args.iter().filter(|a| a.stance == Stance::Objection) {
        for theme in &arg.themes {
            *counts.entry(theme.as_str()).or_default() += 1;
        }
    }

    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(TOP_THEMES)
        .map(|(theme, _)| theme.to_string())
        .collect()
}

/// Highest-confidence argument with the given stance; earliest wins ties.
fn top_argument<'a>(clause_args: &[&'a Argument], stance: Stance) -> Option<&'a Argument> {
    clause_args
        .iter()
        .copied()
        .filter(|a| a.stance == stance)
        .fold(None, |best: Option<&Argument>, arg| match best {
            Some(b) if b.confidence >= arg.confidence => Some(b),
            _ => Some(arg),
        })
}

fn objection_response(agg: &ClauseAggregate, clause_args: &[&Argument]) -> AmendmentSuggestion {
    let themes = objection_themes(clause_args);
    let theme_list = if themes.is_empty() {
        "general".to_string()
    } else {
        themes.join(", ")
    };
    let dominant = themes.first().map(String::as_str).unwrap_or("general");
    let citation_refs = top_argument(clause_args, Stance::Objection)
        .map(|a| a.citation_ids.clone())
        .unwrap_or_default();

    AmendmentSuggestion {
        id: Uuid::new_v4().to_string(),
        clause_id: agg.clause_id.clone(),
        kind: SuggestionKind::ObjectionResponse,
        summary: format!("Address concerns regarding {}", dominant),
        details: format!(
            "Clause {} drew {} objections against {} supporting arguments, primarily concerning {}. Consider revising it to address these concerns.",
            agg.clause_id, agg.objection_count, agg.support_count, theme_list
        ),
        suggested_change: format!(
            "Revise clause {} to better address {} concerns",
            agg.clause_id, theme_list
        ),
        citation_refs,
        confidence: normalized_confidence(agg),
    }
}

fn support_acknowledgment(agg: &ClauseAggregate, clause_args: &[&Argument]) -> AmendmentSuggestion {
    let citation_refs = top_argument(clause_args, Stance::Support)
        .map(|a| a.citation_ids.clone())
        .unwrap_or_default();

    AmendmentSuggestion {
        id: Uuid::new_v4().to_string(),
        clause_id: agg.clause_id.clone(),
        kind: SuggestionKind::SupportAcknowledgment,
        summary: "Positive reception".to_string(),
        details: format!(
            "Clause {} received {} supporting arguments against {} objections.",
            agg.clause_id, agg.support_count, agg.objection_count
        ),
        suggested_change: format!("Retain clause {} as currently worded", agg.clause_id),
        citation_refs,
        confidence: normalized_confidence(agg),
    }
}

fn balanced_review(agg: &ClauseAggregate) -> AmendmentSuggestion {
    AmendmentSuggestion {
        id: Uuid::new_v4().to_string(),
        clause_id: agg.clause_id.clone(),
        kind: SuggestionKind::BalancedReview,
        summary: "Mixed or limited feedback requires further consultation".to_string(),
        details: format!(
            "Clause {} received {} supporting and {} objecting arguments out of {}. The feedback is balanced or too sparse to act on.",
            agg.clause_id, agg.support_count, agg.objection_count, agg.total
        ),
        suggested_change: format!(
            "Conduct further consultation on clause {} considering all feedback",
            agg.clause_id
        ),
        citation_refs: Vec::new(),
        confidence: normalized_confidence(agg),
    }
}

fn normalized_confidence(agg: &ClauseAggregate) -> f64 {
    (agg.confidence_score / 100.0).clamp(0.0, 1.0)
}

/// Suggestion for a single clause; the first matching rule wins.
pub fn suggest_for_clause(agg: &ClauseAggregate, clause_args: &[&Argument]) -> AmendmentSuggestion {
    if agg.objection_count > agg.support_count && agg.objection_count >= MIN_DOMINANT_COUNT {
        objection_response(agg, clause_args)
    } else if agg.support_count > agg.objection_count && agg.support_count >= MIN_DOMINANT_COUNT {
        support_acknowledgment(agg, clause_args)
    } else {
        balanced_review(agg)
    }
}

/// Ranked suggestions, one per clause, highest impact first.
///
/// Impact is `|support - objection| × total`; equal impact orders by
/// clause id. At most [`effective_limit`] suggestions are returned.
pub fn suggest(
    aggregates: &BTreeMap<String, ClauseAggregate>,
    arguments: &[Argument],
    limit: Option<usize>,
) -> Vec<AmendmentSuggestion> {
    let mut by_clause: HashMap<&str, Vec<&Argument>> = HashMap::new();
    for arg in arguments {
        by_clause.entry(arg.clause_id.as_str()).or_default().push(arg);
    }

    let mut ranked: Vec<&ClauseAggregate> = aggregates.values().collect();
    ranked.sort_by(|a, b| {
        b.impact()
            .cmp(&a.impact())
            .then_with(|| a.clause_id.cmp(&b.clause_id))
    });

    ranked
        .into_iter()
        .take(effective_limit(limit))
        .map(|agg| {
            let clause_args = by_clause
                .get(agg.clause_id.as_str())
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            suggest_for_clause(agg, clause_args)
        })
        .collect()
}
