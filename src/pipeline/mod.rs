//! Analysis pipeline.
//!
//! One run threads a comment set through every stage:
//!
//! ```text
//! comments ─► cache? ─► extract ─► resolve clauses ─► cite ─► aggregate ─► suggest
//!                                                                   └────► fuse
//! ```
//!
//! Only extraction is cached. Everything after it is recomputed from the
//! (possibly cached) arguments on each run.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::aggregate::aggregate;
use crate::amendment::{effective_limit, suggest};
use crate::cache::{fingerprint, ResultCache};
use crate::citation::{link_citations, CitationMatcher};
use crate::config::Config;
use crate::error::{AppError, AppResult, ExtractionError};
use crate::fusion::fuse;
use crate::mining::{ArgumentExtractor, CancellationFlag};
use crate::models::{AnalysisResult, Argument, BatchFailure, Comment, PolicyClause, GENERAL_CLAUSE};

/// Caller-owned pipeline state, shared across runs.
#[derive(Clone)]
pub struct AnalysisPipeline {
    extractor: ArgumentExtractor,
    matcher: CitationMatcher,
    cache: Option<Arc<ResultCache>>,
}

impl AnalysisPipeline {
    pub fn new(extractor: ArgumentExtractor, cache: Option<Arc<ResultCache>>) -> Self {
        Self {
            extractor,
            matcher: CitationMatcher::new(),
            cache,
        }
    }

    /// Build the extractor and, when enabled, open the result cache.
    pub async fn from_config(config: &Config) -> Self {
        let extractor = ArgumentExtractor::from_config(config);
        let cache = if config.cache.enabled {
            Some(Arc::new(ResultCache::from_config(&config.cache).await))
        } else {
            None
        };
        Self::new(extractor, cache)
    }

    pub fn cache(&self) -> Option<&Arc<ResultCache>> {
        self.cache.as_ref()
    }

    /// Analyze a comment set against the policy's clauses.
    ///
    /// Transient extraction failures, unknown clauses and cache problems
    /// are recovered internally. An error is returned only when no batch
    /// produced any arguments.
    pub async fn run_analysis(
        &self,
        comments: &[Comment],
        clauses: &[PolicyClause],
        limit: Option<usize>,
        cancel: &CancellationFlag,
    ) -> AppResult<AnalysisResult> {
        let start = Instant::now();
        let cache_key = fingerprint(comments)?;

        if comments.is_empty() {
            debug!("No comments to analyze");
            return Ok(AnalysisResult::empty(cache_key));
        }

        let cached = match &self.cache {
            Some(cache) => cache.get::<Vec<Argument>>(&cache_key).await,
            None => None,
        };

        let cache_hit = cached.is_some();
        let (extracted, failed_batches, cancelled) = match cached {
            Some(arguments) => (arguments, Vec::new(), false),
            None => {
                let outcome = self.extractor.extract(comments, cancel).await;

                if outcome.arguments.is_empty()
                    && !outcome.cancelled
                    && !outcome.failures.is_empty()
                {
                    let mut failures = outcome.failures;
                    return Err(AppError::Extraction(failures.remove(0)));
                }

                if outcome.is_complete() {
                    if let Some(cache) = &self.cache {
                        if let Err(e) = cache.set(&cache_key, &outcome.arguments).await {
                            warn!(key = %cache_key, error = %e, "Failed to write result cache");
                        }
                    }
                }

                let failed = outcome
                    .failures
                    .iter()
                    .map(|failure| BatchFailure {
                        batch_index: failure_batch(failure),
                        message: failure.to_string(),
                    })
                    .collect();
                (outcome.arguments, failed, outcome.cancelled)
            }
        };

        let resolved = resolve_clauses(extracted, clauses);
        let (arguments, citations) = link_citations(&self.matcher, resolved);
        let clause_aggregates = aggregate(&arguments);
        let suggestions = suggest(&clause_aggregates, &arguments, limit);
        let fusion = fuse(&arguments);

        info!(
            key = %cache_key,
            cache_hit,
            comments = comments.len(),
            arguments = arguments.len(),
            clauses = clause_aggregates.len(),
            suggestions = suggestions.len(),
            limit = effective_limit(limit),
            failed_batches = failed_batches.len(),
            cancelled,
            latency_ms = start.elapsed().as_millis(),
            "Analysis run completed"
        );

        Ok(AnalysisResult {
            cache_key,
            cache_hit,
            arguments,
            citations,
            clause_aggregates,
            suggestions,
            fusion,
            failed_batches,
            cancelled,
        })
    }
}

fn failure_batch(failure: &ExtractionError) -> usize {
    match failure {
        ExtractionError::Transient { batch, .. }
        | ExtractionError::Unavailable { batch, .. }
        | ExtractionError::Cancelled { batch } => *batch,
        ExtractionError::InvalidClauseReference { .. } => 0,
    }
}

/// Map each argument's clause reference onto a known clause id.
///
/// Ids match first, then section labels (case-insensitive). Anything else
/// becomes [`GENERAL_CLAUSE`].
pub fn resolve_clauses(arguments: Vec<Argument>, clauses: &[PolicyClause]) -> Vec<Argument> {
    let by_id: HashMap<&str, &str> = clauses
        .iter()
        .map(|c| (c.id.as_str(), c.id.as_str()))
        .collect();
    let by_label: HashMap<String, &str> = clauses
        .iter()
        .map(|c| (c.section_label.trim().to_lowercase(), c.id.as_str()))
        .collect();

    arguments
        .into_iter()
        .map(|mut argument| {
            if argument.clause_id == GENERAL_CLAUSE {
                return argument;
            }
            let reference = argument.clause_id.trim();
            let resolved = by_id
                .get(reference)
                .or_else(|| by_label.get(&reference.to_lowercase()))
                .copied();

            match resolved {
                Some(id) => argument.clause_id = id.to_string(),
                None => {
                    let err = ExtractionError::InvalidClauseReference {
                        clause_id: argument.clause_id.clone(),
                    };
                    warn!(clause_id = %argument.clause_id, error = %err, "Remapping argument to general clause");
                    argument.clause_id = GENERAL_CLAUSE.to_string();
                }
            }
            argument
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::config::ExtractionConfig;
    use crate::langbase::{CompletionBackend, Message};
    use crate::error::LangbaseResult;
    use crate::models::{Stance, SuggestionKind};

    struct CountingBackend {
        calls: AtomicUsize,
        reply: String,
    }

    #[async_trait]
    impl CompletionBackend for CountingBackend {
        async fn complete(&self, _messages: Vec<Message>) -> LangbaseResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.clone())
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    fn section_three_comments() -> Vec<Comment> {
        let support = [
            "I support this clause",
            "We agree with the proposal",
            "Strong support from our association",
            "I agree, it is overdue",
            "Full support for section three",
            "Residents agree with the change",
        ];
        let objection = [
            "I oppose this clause",
            "This raises a serious concern",
            "We oppose the new fees",
            "My concern is enforcement",
        ];
        support
            .iter()
            .chain(objection.iter())
            .enumerate()
            .map(|(i, text)| Comment::new(format!("c{i}"), *text, "portal").with_clause("Section 3"))
            .collect()
    }

    fn section_three() -> Vec<PolicyClause> {
        vec![PolicyClause::new("Section 3", "Fees apply.", "Section 3")]
    }

    #[tokio::test]
    async fn test_section_three_scenario() {
        let pipeline = AnalysisPipeline::new(
            ArgumentExtractor::fallback_only(ExtractionConfig::default()),
            None,
        );
        let result = pipeline
            .run_analysis(&section_three_comments(), &section_three(), None, &CancellationFlag::new())
            .await
            .unwrap();

        let agg = &result.clause_aggregates["Section 3"];
        assert_eq!(agg.support_count, 6);
        assert_eq!(agg.objection_count, 4);
        assert_eq!(agg.total, 10);
        assert!((agg.controversy_score - 0.8).abs() < 1e-9);

        assert_eq!(result.suggestions.len(), 1);
        assert_eq!(result.suggestions[0].kind, SuggestionKind::SupportAcknowledgment);
        assert!(!result.cache_hit);
        assert!(result.is_complete());
    }

    #[tokio::test]
    async fn test_every_argument_is_cited() {
        let pipeline = AnalysisPipeline::new(
            ArgumentExtractor::fallback_only(ExtractionConfig::default()),
            None,
        );
        let result = pipeline
            .run_analysis(&section_three_comments(), &[], None, &CancellationFlag::new())
            .await
            .unwrap();

        for arg in &result.arguments {
            assert!(!arg.citation_ids.is_empty());
            for id in &arg.citation_ids {
                assert!(result.citations.contains_key(id));
            }
        }
    }

    #[tokio::test]
    async fn test_empty_input_short_circuits() {
        let cache = Arc::new(ResultCache::in_memory(chrono::Duration::hours(24)));
        let pipeline = AnalysisPipeline::new(
            ArgumentExtractor::fallback_only(ExtractionConfig::default()),
            Some(Arc::clone(&cache)),
        );
        let result = pipeline
            .run_analysis(&[], &[], None, &CancellationFlag::new())
            .await
            .unwrap();

        assert!(result.arguments.is_empty());
        assert!(result.suggestions.is_empty());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_second_identical_run_hits_cache() {
        let backend = Arc::new(CountingBackend {
            calls: AtomicUsize::new(0),
            reply: r#"[{"comment": 1, "argument": "Fees are too high", "stance": "objection", "clause": "Section 3", "confidence": 80}]"#.to_string(),
        });
        let extractor = ArgumentExtractor::new(
            Some(backend.clone() as Arc<dyn CompletionBackend>),
            ExtractionConfig::default(),
            Duration::from_secs(5),
        );
        let cache = Arc::new(ResultCache::in_memory(chrono::Duration::hours(24)));
        let pipeline = AnalysisPipeline::new(extractor, Some(cache));
        let comments = vec![Comment::new("c1", "The fees are too high", "email")];

        let first = pipeline
            .run_analysis(&comments, &section_three(), None, &CancellationFlag::new())
            .await
            .unwrap();
        let second = pipeline
            .run_analysis(&comments, &section_three(), None, &CancellationFlag::new())
            .await
            .unwrap();

        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert!(!first.cache_hit);
        assert!(second.cache_hit);
        assert_eq!(first.cache_key, second.cache_key);
        assert_eq!(first.arguments, second.arguments);
        assert_eq!(first.clause_aggregates, second.clause_aggregates);
    }

    #[tokio::test]
    async fn test_cancelled_run_is_not_cached() {
        let cache = Arc::new(ResultCache::in_memory(chrono::Duration::hours(24)));
        let pipeline = AnalysisPipeline::new(
            ArgumentExtractor::fallback_only(ExtractionConfig::default()),
            Some(Arc::clone(&cache)),
        );
        let cancel = CancellationFlag::new();
        cancel.cancel();

        let result = pipeline
            .run_analysis(&section_three_comments(), &section_three(), None, &cancel)
            .await
            .unwrap();

        assert!(result.cancelled);
        assert!(!result.is_complete());
        assert!(result.arguments.is_empty());
        assert_eq!(result.failed_batches.len(), 1);
        assert!(cache.is_empty().await);
    }

    #[test]
    fn test_resolve_clauses() {
        let comment = Comment::new("c", "text", "portal");
        let clauses = vec![PolicyClause::new("s7a", "Data retention.", "Section 7(a)")];
        let args = vec![
            Argument::new(&comment, "by id", Stance::Support, "s7a", 50.0),
            Argument::new(&comment, "by label", Stance::Support, "section 7(a)", 50.0),
            Argument::new(&comment, "unknown", Stance::Support, "Section 99", 50.0),
            Argument::new(&comment, "general", Stance::Support, GENERAL_CLAUSE, 50.0),
        ];

        let resolved: Vec<String> = resolve_clauses(args, &clauses)
            .into_iter()
            .map(|a| a.clause_id)
            .collect();
        assert_eq!(resolved, vec!["s7a", "s7a", "general", "general"]);
    }

    #[test]
    fn test_resolve_without_clause_list() {
        let comment = Comment::new("c", "text", "portal");
        let args = vec![Argument::new(&comment, "x", Stance::Neutral, "Section 3", 50.0)];
        assert_eq!(resolve_clauses(args, &[])[0].clause_id, GENERAL_CLAUSE);
    }
}
