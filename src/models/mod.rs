//! Shared data model for the argument mining pipeline.
//!
//! Comments and policy clauses come from the external ingestion layer and
//! are read-only here. Arguments, citations, clause aggregates and
//! amendment suggestions are produced fresh on every analysis run.


use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fusion::FusionReport;

/// Sentinel clause id for arguments not anchored to a known clause.
pub const GENERAL_CLAUSE: &str = "general";

/// A public comment on a policy document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    /// Unique comment identifier.
    pub id: String,
    /// Raw comment text.
    pub text: String,
    /// Where the comment came from (portal, email, social...).
    pub source: String,
    /// When the comment was submitted.
    pub timestamp: DateTime<Utc>,
    /// Clause the commenter tagged, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_clause: Option<String>,
}

impl Comment {
    /// Create a comment stamped with the current time.
    pub fn new(
        id: impl Into<String>,
        text: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            source: source.into(),
            timestamp: Utc::now(),
            policy_clause: None,
        }
    }

    /// Tag the comment with a policy clause.
    pub fn with_clause(mut self, clause: impl Into<String>) -> Self {
        self.policy_clause = Some(clause.into());
        self
    }

    /// Override the submission timestamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// A structural unit of the policy document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyClause {
    pub id: String,
    pub text: String,
    /// Human label such as "Section 7(a)".
    pub section_label: String,
}

impl PolicyClause {
    pub fn new(
        id: impl Into<String>,
        text: impl Into<String>,
        section_label: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            section_label: section_label.into(),
        }
    }
}

/// Position an argument takes toward its clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stance {
    Support,
    Objection,
    Neutral,
}

impl Stance {
    /// Get the stance name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Stance::Support => "support",
            Stance::Objection => "objection",
            Stance::Neutral => "neutral",
        }
    }

    /// Lenient parse used on model output; anything unrecognised is neutral.
    pub fn coerce(s: &str) -> Self {
        s.parse().unwrap_or(Stance::Neutral)
    }
}

impl std::fmt::Display for Stance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Stance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "support" | "supports" | "supporting" | "for" | "pro" => Ok(Stance::Support),
            "objection" | "object" | "oppose" | "opposition" | "against" | "con" => {
                Ok(Stance::Objection)
            }
            "neutral" | "mixed" | "none" => Ok(Stance::Neutral),
            _ => Err(format!("Unknown stance: {}", s)),
        }
    }
}

/// Clamp a confidence value into `[min, max]`, mapping NaN to `min`.
pub fn clamp_score(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() {
        min
    } else {
        value.clamp(min, max)
    }
}

/// A structured, clause-anchored argument mined from one comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    pub id: String,
    pub text: String,
    pub stance: Stance,
    /// Known clause id or [`GENERAL_CLAUSE`].
    pub clause_id: String,
    pub themes: BTreeSet<String>,
    /// Confidence in `[0, 100]`.
    pub confidence: f64,
    /// Filled in by citation matching.
    #[serde(default)]
    pub citation_ids: Vec<String>,
    pub source_comment_id: String,
    /// Source label of the originating comment.
    pub source: String,
    /// Reference text the model attributed to the argument, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_hint: Option<String>,
}

impl Argument {
    /// Create an argument for a comment. Confidence is clamped to `[0, 100]`.
    pub fn new(
        comment: &Comment,
        text: impl Into<String>,
        stance: Stance,
        clause_id: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            stance,
            clause_id: clause_id.into(),
            themes: BTreeSet::new(),
            confidence: clamp_score(confidence, 0.0, 100.0),
            citation_ids: Vec::new(),
            source_comment_id: comment.id.clone(),
            source: comment.source.clone(),
            reference_hint: None,
        }
    }

    /// Set the theme labels.
    pub fn with_themes<I, S>(mut self, themes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.themes = themes.into_iter().map(Into::into).collect();
        self
    }

    /// Attach the model's reference text.
    pub fn with_reference_hint(mut self, hint: impl Into<String>) -> Self {
        let hint = hint.into();
        self.reference_hint = (!hint.trim().is_empty()).then_some(hint);
        self
    }
}

/// A structured reference backing an argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub id: String,
    pub title: String,
    pub url: String,
    /// Match category: statutory reference, named law or policy document.
    pub source_label: String,
    /// Relevance in `[0, 1]`.
    pub relevance_score: f64,
}

/// A comment excerpt shown alongside a clause aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleComment {
    pub text: String,
    pub source: String,
}

/// Per-clause statistics derived from all arguments of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClauseAggregate {
    pub clause_id: String,
    pub support_count: usize,
    pub objection_count: usize,
    /// All arguments, neutral included.
    pub total: usize,
    /// `1 - |support - objection| / total`, in `[0, 1]`.
    pub controversy_score: f64,
    /// Argument volume; only comparable within one run.
    pub heat_score: f64,
    pub themes: BTreeSet<String>,
    /// At most three, deduplicated.
    pub sample_comments: Vec<SampleComment>,
    /// Running mean of argument confidence, in `[0, 100]`.
    pub confidence_score: f64,
}

impl ClauseAggregate {
    /// Empty aggregate for a clause.
    pub fn new(clause_id: impl Into<String>) -> Self {
        Self {
            clause_id: clause_id.into(),
            support_count: 0,
            objection_count: 0,
            total: 0,
            controversy_score: 0.0,
            heat_score: 0.0,
            themes: BTreeSet::new(),
            sample_comments: Vec::new(),
            confidence_score: 0.0,
        }
    }

    /// Proxy for how much an amendment to this clause matters.
    pub fn impact(&self) -> usize {
        self.support_count.abs_diff(self.objection_count) * self.total
    }
}

/// Kind of amendment suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    ObjectionResponse,
    SupportAcknowledgment,
    BalancedReview,
}

impl SuggestionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionKind::ObjectionResponse => "objection_response",
            SuggestionKind::SupportAcknowledgment => "support_acknowledgment",
            SuggestionKind::BalancedReview => "balanced_review",
        }
    }
}

impl std::fmt::Display for SuggestionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A ranked, citation-backed recommendation for one clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmendmentSuggestion {
    pub id: String,
    pub clause_id: String,
    pub kind: SuggestionKind,
    pub summary: String,
    pub details: String,
    pub suggested_change: String,
    pub citation_refs: Vec<String>,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
}

/// Lowercase and collapse whitespace, for deduplicating texts.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// A batch whose arguments are missing from a run's result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchFailure {
    pub batch_index: usize,
    pub message: String,
}

/// Output of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Content hash of the input comments.
    pub cache_key: String,
    /// Whether the arguments came from the result cache.
    pub cache_hit: bool,
    pub arguments: Vec<Argument>,
    /// Citations referenced by `arguments`, keyed by id.
    pub citations: BTreeMap<String, Citation>,
    pub clause_aggregates: BTreeMap<String, ClauseAggregate>,
    pub suggestions: Vec<AmendmentSuggestion>,
    pub fusion: FusionReport,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_batches: Vec<BatchFailure>,
    #[serde(default)]
    pub cancelled: bool,
}

impl AnalysisResult {
    /// Result for a run with nothing to analyze.
    pub fn empty(cache_key: impl Into<String>) -> Self {
        Self {
            cache_key: cache_key.into(),
            cache_hit: false,
            arguments: Vec::new(),
            citations: BTreeMap::new(),
            clause_aggregates: BTreeMap::new(),
            suggestions: Vec::new(),
            fusion: FusionReport::default(),
            failed_batches: Vec::new(),
            cancelled: false,
        }
    }

    /// True when no batch failed and the run was not cancelled.
    pub fn is_complete(&self) -> bool {
        self.failed_batches.is_empty() && !self.cancelled
    }
}
