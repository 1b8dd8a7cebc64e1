//! Citation matching.
//!
//! Scans argument text for structural references ("Section 12A",
//! "Article 21") and named instruments ("Data Protection Act"). Matches
//! are structural only: URLs and ids are synthesized deterministically
//! from the matched title and are not checked against any legal database.

use std::collections::BTreeMap;

use regex::Regex;
use sha2::{Digest, Sha256};

use crate::models::{Argument, Citation};

/// Relevance of a section/article/clause reference.
pub const SECTION_RELEVANCE: f64 = 0.9;
/// Relevance of a named act, law, regulation or code.
pub const NAMED_LAW_RELEVANCE: f64 = 0.8;
/// Relevance of the whole-document fallback citation.
pub const GENERAL_RELEVANCE: f64 = 0.5;

pub const SECTION_LABEL: &str = "statutory_reference";
pub const NAMED_LAW_LABEL: &str = "named_law";
pub const GENERAL_LABEL: &str = "policy_document";

/// Sentence-opening words the named-law pattern can pick up because they
/// are capitalized. Never part of an instrument's title.
const LEADING_STOP_WORDS: &[&str] = &[
    "a", "an", "and", "by", "for", "in", "its", "of", "on", "our", "per", "see", "that", "the",
    "these", "this", "those", "to", "under",
];

const GENERAL_TITLE: &str = "Policy Document (General Reference)";
const URL_BASE: &str = "edict://citations";

/// Pure pattern-based citation finder.
#[derive(Debug, Clone)]
pub struct CitationMatcher {
    section_regex: Regex,
    named_law_regex: Regex,
}

impl Default for CitationMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl CitationMatcher {
    pub fn new() -> Self {
        // Keyword is case-insensitive, the letter suffix is not ("12A", not "12a")
        let section_regex = Regex::new(r"\b((?i:section|article|clause))\s+(\d+[A-Z]*)")
            .expect("Invalid section regex");

        // Two or more capitalized words, allowing short lowercase connectors,
        // ending in an instrument noun
        let named_law_regex = Regex::new(
            r"\b[A-Z][A-Za-z]*(?:\s+(?:(?:of|to|and|the|for|on|in)\s+)*[A-Z][A-Za-z]*)*\s+(?:Act|Law|Regulation|Code)\b",
        )
        .expect("Invalid named law regex");

        Self {
            section_regex,
            named_law_regex,
        }
    }

    /// Citations for one argument, never empty.
    ///
    /// The argument's text and its reference hint are both scanned. Each
    /// distinct title yields one citation; with no match a single general
    /// citation to the policy document is returned.
    pub fn find_citations(&self, argument: &Argument) -> Vec<Citation> {
        let mut haystacks = vec![argument.text.as_str()];
        if let Some(hint) = argument.reference_hint.as_deref() {
            haystacks.push(hint);
        }

        let mut found: Vec<Citation> = Vec::new();
        let mut push = |citation: Citation| {
            if !found.iter().any(|c| c.title == citation.title) {
                found.push(citation);
            }
        };

        for text in &haystacks {
            for caps in self.section_regex.captures_iter(text) {
                let title = format!("{} {}", capitalize(&caps[1]), &caps[2]);
                push(synthesize(title, SECTION_LABEL, SECTION_RELEVANCE));
            }
            for m in self.named_law_regex.find_iter(text) {
                if let Some(title) = named_law_title(m.as_str()) {
                    push(synthesize(title, NAMED_LAW_LABEL, NAMED_LAW_RELEVANCE));
                }
            }
        }

        if found.is_empty() {
            found.push(general_citation());
        }
        found
    }
}

/// Normalized title for a named-law match, or `None` when only the
/// instrument noun is left ("The Act").
fn named_law_title(matched: &str) -> Option<String> {
    let words: Vec<&str> = matched
        .split_whitespace()
        .skip_while(|w| LEADING_STOP_WORDS.contains(&w.to_lowercase().as_str()))
        .collect();
    (words.len() >= 2).then(|| words.join(" "))
}

/// Citation referencing the policy document as a whole.
pub fn general_citation() -> Citation {
    Citation {
        id: "cit_policy_document".to_string(),
        title: GENERAL_TITLE.to_string(),
        url: format!("{}/{}", URL_BASE, GENERAL_LABEL.replace('_', "-")),
        source_label: GENERAL_LABEL.to_string(),
        relevance_score: GENERAL_RELEVANCE,
    }
}

fn capitalize(word: &str) -> String {
    let lower = word.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn slugify(title: &str) -> String {
    title
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// Citation with an id and URL derived from its title.
fn synthesize(title: String, source_label: &str, relevance_score: f64) -> Citation {
    let digest = hex::encode(Sha256::digest(title.as_bytes()));
    Citation {
        id: format!("cit_{}", &digest[..12]),
        url: format!(
            "{}/{}/{}",
            URL_BASE,
            source_label.replace('_', "-"),
            slugify(&title)
        ),
        title,
        source_label: source_label.to_string(),
        relevance_score,
    }
}

/// Run the matcher over every argument, filling `citation_ids`.
///
/// Returns the updated arguments and the citations deduplicated by id
/// (ids are title-derived, so this is deduplication by title).
pub fn link_citations(
    matcher: &CitationMatcher,
    arguments: Vec<Argument>,
) -> (Vec<Argument>, BTreeMap<String, Citation>) {
    let mut index = BTreeMap::new();
    let arguments = arguments
        .into_iter()
        .map(|mut argument| {
            for citation in matcher.find_citations(&argument) {
                if !argument.citation_ids.contains(&citation.id) {
                    argument.citation_ids.push(citation.id.clone());
                }
                index.entry(citation.id.clone()).or_insert(citation);
            }
            argument
        })
        .collect();
    (arguments, index)
}
