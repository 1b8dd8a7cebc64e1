//! Deterministic keyword extractor used when the primary strategy fails.

use std::collections::BTreeSet;

use crate::models::{normalize_text, Argument, Comment, Stance, GENERAL_CLAUSE};

/// Words indicating agreement with a clause.
pub const SUPPORT_KEYWORDS: &[&str] = &[
    "support", "agree", "good", "benefit", "positive", "favor", "welcome", "approve",
];

/// Words indicating opposition to a clause.
pub const OBJECTION_KEYWORDS: &[&str] = &[
    "oppose", "against", "disagree", "bad", "negative", "concern", "problem", "issue", "harm",
    "reject",
];

/// Theme labels and the phrases that signal them.
pub const THEME_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "privacy",
        &["privacy", "personal data", "surveillance", "monitoring"],
    ),
    (
        "economic",
        &["cost", "expense", "money", "financial", "economy", "business"],
    ),
    ("legal", &["law", "legal", "constitution", "rights"]),
    ("technical", &["technology", "technical", "system", "software"]),
    (
        "implementation",
        &["implement", "process", "procedure", "execute"],
    ),
];

const BASE_CONFIDENCE: f64 = 50.0;
const PER_KEYWORD_CONFIDENCE: f64 = 5.0;
const MAX_CONFIDENCE: f64 = 90.0;
const NO_MATCH_CONFIDENCE: f64 = 30.0;

/// Endings accepted after a keyword ("concerns", "supported", "agreement").
const INFLECTIONS: &[&str] = &[
    "", "s", "es", "d", "ed", "ing", "er", "ers", "ment", "ments", "ful", "ly",
];

/// Inflected forms that carry no stance ("goods", "issued").
const NON_STANCE_FORMS: &[&str] = &["goods", "issued", "issuing", "issuer", "issuers"];

fn is_inflection_of(word: &str, keyword: &str) -> bool {
    word.strip_prefix(keyword)
        .map(|rest| INFLECTIONS.contains(&rest))
        .unwrap_or(false)
        && !NON_STANCE_FORMS.contains(&word)
}

/// Distinct keywords appearing in `text` as whole words or inflections.
///
/// "agree" does not fire inside "disagree", and "harm" does not fire
/// inside "harmonise".
fn matching_keywords<'k>(text: &str, keywords: &[&'k str]) -> BTreeSet<&'k str> {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    keywords
        .iter()
        .copied()
        .filter(|kw| words.iter().any(|w| is_inflection_of(w, kw)))
        .collect()
}

/// Keyword-scored stance and confidence for a text.
///
/// Ties, including the no-match case, resolve to support.
pub fn score_stance(text: &str) -> (Stance, f64) {
    let support = matching_keywords(text, SUPPORT_KEYWORDS).len();
    let objection = matching_keywords(text, OBJECTION_KEYWORDS).len();

    let (stance, matched) = if objection > support {
        (Stance::Objection, objection)
    } else {
        (Stance::Support, support)
    };

    let confidence = if support + objection == 0 {
        NO_MATCH_CONFIDENCE
    } else {
        (BASE_CONFIDENCE + PER_KEYWORD_CONFIDENCE * matched as f64).min(MAX_CONFIDENCE)
    };

    (stance, confidence)
}

/// Theme labels found in a text; `{"general"}` when none match.
pub fn extract_themes(text: &str) -> BTreeSet<String> {
    let lower = text.to_lowercase();
    let themes: BTreeSet<String> = THEME_KEYWORDS
        .iter()
        .filter(|(_, phrases)| phrases.iter().any(|p| lower.contains(*p)))
        .map(|(theme, _)| theme.to_string())
        .collect();

    if themes.is_empty() {
        BTreeSet::from(["general".to_string()])
    } else {
        themes
    }
}

/// One argument per comment, classified by keyword presence.
pub fn extract_fallback(comments: &[Comment]) -> Vec<Argument> {
    comments
        .iter()
        .map(|comment| {
            let (stance, confidence) = score_stance(&comment.text);
            let clause = comment
                .policy_clause
                .clone()
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| GENERAL_CLAUSE.to_string());
            let text = comment.text.split_whitespace().collect::<Vec<_>>().join(" ");

            Argument::new(comment, text, stance, clause, confidence)
                .with_themes(extract_themes(&normalize_text(&comment.text)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_objection_only_comment() {
        let (stance, confidence) = score_stance(
            "I strongly oppose and disagree with this, it will harm small businesses",
        );
        assert_eq!(stance, Stance::Objection);
        assert!(confidence >= 55.0);
        assert_eq!(confidence, 65.0);
    }

    #[test]
    fn test_disagree_does_not_count_as_agree() {
        let matched = matching_keywords("I disagree", SUPPORT_KEYWORDS);
        assert!(matched.is_empty());
    }

    #[test]
    fn test_inflections_match() {
        let matched =
            matching_keywords("Serious concerns; I supported it before", &["concern", "support"]);
        assert_eq!(matched.len(), 2);
    }

    #[test]
    fn test_unrelated_words_sharing_a_prefix_do_not_match() {
        let text = "We must harmonise the rules on goods; the badge was issued";
        assert!(matching_keywords(text, OBJECTION_KEYWORDS).is_empty());
        assert!(matching_keywords(text, SUPPORT_KEYWORDS).is_empty());
        assert_eq!(score_stance(text), (Stance::Support, 30.0));
    }

    #[test]
    fn test_agreement_and_harmful_match() {
        let matched = matching_keywords(
            "Broad agreement, though harmful issues remain",
            &["agree", "harm", "issue"],
        );
        assert_eq!(matched.len(), 3);
    }

    #[test]
    fn test_tie_defaults_to_support() {
        let (stance, confidence) = score_stance("Good idea but a real problem");
        assert_eq!(stance, Stance::Support);
        assert_eq!(confidence, 55.0);
    }

    #[test]
    fn test_no_match_confidence() {
        let (stance, confidence) = score_stance("The weather is mild today");
        assert_eq!(stance, Stance::Support);
        assert_eq!(confidence, 30.0);
    }

    #[test]
    fn test_confidence_capped_at_ninety() {
        let (_, confidence) = score_stance(
            "support agree good benefit positive favor welcome approve",
        );
        assert_eq!(confidence, 90.0);
    }

    #[test]
    fn test_extract_themes() {
        let themes = extract_themes("surveillance costs will hurt the economy");
        assert!(themes.contains("privacy"));
        assert!(themes.contains("economic"));
        assert_eq!(
            extract_themes("nothing to see"),
            BTreeSet::from(["general".to_string()])
        );
    }

    #[test]
    fn test_extract_fallback_clause_defaults() {
        let comments = vec![
            Comment::new("a", "I support   this", "portal").with_clause("Section 3"),
            Comment::new("b", "I oppose this", "email"),
        ];
        let args = extract_fallback(&comments);
        assert_eq!(args.len(), 2);
        assert_eq!(args[0].clause_id, "Section 3");
        assert_eq!(args[0].text, "I support this");
        assert_eq!(args[1].clause_id, GENERAL_CLAUSE);
        assert_eq!(args[1].stance, Stance::Objection);
        assert_eq!(args[1].source_comment_id, "b");
    }

    #[test]
    fn test_extract_fallback_does_not_mutate_input() {
        let comments = vec![Comment::new("a", "  spaced   text ", "portal")];
        let before = comments.clone();
        let _ = extract_fallback(&comments);
        assert_eq!(comments, before);
    }
}
