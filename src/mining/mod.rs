//! Argument extraction.
//!
//! Comments are split into fixed-size batches. Each batch is sent to the
//! primary (LLM) strategy; any transient failure there, including a
//! timeout or an unusable response, routes the batch to the deterministic
//! keyword fallback instead of failing the run:
//!
//! ```text
//! batch ──► Primary (CompletionBackend) ──Ok──► arguments
//!                     │
//!                     └──Err(Transient)──► Fallback (keywords) ──► arguments
//! ```
//!
//! Batches run concurrently on a bounded worker pool. Output order follows
//! batch order but callers should not rely on it; every argument carries
//! its `source_comment_id`.

mod decode;
mod fallback;

pub use decode::{decode_completion, locate_json_array};
pub use fallback::{
    extract_fallback, extract_themes, score_stance, OBJECTION_KEYWORDS, SUPPORT_KEYWORDS,
    THEME_KEYWORDS,
};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::{Config, ExtractionConfig};
use crate::error::{ExtractionError, ExtractionResult};
use crate::langbase::{CompletionBackend, LangbaseClient, Message, PipeBackend};
use crate::models::{Argument, Comment};
use crate::prompts::{format_comment_batch, ARGUMENT_EXTRACTION_PROMPT};

/// Which strategy produced a batch's arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStrategy {
    /// LLM-backed structured extraction.
    Primary,
    /// Keyword-presence heuristic.
    Fallback,
}

impl ExtractionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionStrategy::Primary => "primary",
            ExtractionStrategy::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for ExtractionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-batch bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub index: usize,
    pub strategy: ExtractionStrategy,
    pub comment_count: usize,
    pub argument_count: usize,
}

/// Everything an extraction run produced.
#[derive(Debug, Default)]
pub struct ExtractionOutcome {
    pub arguments: Vec<Argument>,
    pub reports: Vec<BatchReport>,
    /// `Unavailable` or `Cancelled` errors, one per affected batch.
    pub failures: Vec<ExtractionError>,
    pub cancelled: bool,
}

impl ExtractionOutcome {
    /// True when every batch produced arguments.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }

    /// Number of batches that used the given strategy.
    pub fn batches_using(&self, strategy: ExtractionStrategy) -> usize {
        self.reports.iter().filter(|r| r.strategy == strategy).count()
    }
}

/// Cooperative cancellation shared between a caller and a running extraction.
///
/// Checked before each batch starts; batches already in flight finish.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

enum BatchResult {
    Done(BatchReport, Vec<Argument>),
    Cancelled(usize),
}

/// Converts comments into clause-anchored arguments.
#[derive(Clone)]
pub struct ArgumentExtractor {
    backend: Option<Arc<dyn CompletionBackend>>,
    config: ExtractionConfig,
    timeout: Duration,
}

impl ArgumentExtractor {
    /// Create an extractor. `backend = None` runs fallback-only.
    pub fn new(
        backend: Option<Arc<dyn CompletionBackend>>,
        config: ExtractionConfig,
        timeout: Duration,
    ) -> Self {
        Self {
            backend,
            config: ExtractionConfig {
                batch_size: config.batch_size.max(1),
                max_concurrency: config.max_concurrency.max(1),
            },
            timeout,
        }
    }

    /// Extractor that never calls a backend.
    pub fn fallback_only(config: ExtractionConfig) -> Self {
        Self::new(None, config, Duration::ZERO)
    }

    /// Build from application config, wiring the Langbase pipe when an API
    /// key is present.
    pub fn from_config(config: &Config) -> Self {
        let timeout = Duration::from_millis(config.request.timeout_ms);
        let backend: Option<Arc<dyn CompletionBackend>> =
            match LangbaseClient::new(&config.langbase, config.request.clone()) {
                Ok(client) => Some(Arc::new(PipeBackend::new(
                    client,
                    config.pipes.argument_extraction.clone(),
                ))),
                Err(e) => {
                    warn!(error = %e, "Primary extraction disabled, using keyword fallback only");
                    None
                }
            };
        Self::new(backend, config.extraction.clone(), timeout)
    }

    /// Whether a primary backend is configured.
    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    pub fn batch_size(&self) -> usize {
        self.config.batch_size
    }

    /// Extract arguments from all comments.
    ///
    /// Never fails as a whole: batches that could not be extracted or were
    /// skipped after cancellation are listed in `failures`.
    pub async fn extract(
        &self,
        comments: &[Comment],
        cancel: &CancellationFlag,
    ) -> ExtractionOutcome {
        let start = Instant::now();
        let permits = Arc::new(Semaphore::new(self.config.max_concurrency));
        let mut tasks = JoinSet::new();
        let mut task_batches = HashMap::new();

        for (index, chunk) in comments.chunks(self.config.batch_size).enumerate() {
            let batch: Arc<[Comment]> = chunk.into();
            let backend = self.backend.clone();
            let permits = Arc::clone(&permits);
            let cancel = cancel.clone();
            let timeout = self.timeout;

            let handle = tasks.spawn(async move {
                if cancel.is_cancelled() {
                    return BatchResult::Cancelled(index);
                }
                let Ok(_permit) = permits.acquire_owned().await else {
                    return BatchResult::Cancelled(index);
                };
                if cancel.is_cancelled() {
                    return BatchResult::Cancelled(index);
                }

                let (strategy, arguments) =
                    extract_batch(backend, Arc::clone(&batch), index, timeout).await;
                let report = BatchReport {
                    index,
                    strategy,
                    comment_count: batch.len(),
                    argument_count: arguments.len(),
                };
                BatchResult::Done(report, arguments)
            });
            task_batches.insert(handle.id(), index);
        }

        let mut done: Vec<(BatchReport, Vec<Argument>)> = Vec::new();
        let mut outcome = ExtractionOutcome::default();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(BatchResult::Done(report, arguments)) => done.push((report, arguments)),
                Ok(BatchResult::Cancelled(index)) => {
                    debug!(batch = index, "Batch skipped after cancellation");
                    outcome.cancelled = true;
                    outcome
                        .failures
                        .push(ExtractionError::Cancelled { batch: index });
                }
                Err(join_error) => {
                    let index = task_batches.get(&join_error.id()).copied().unwrap_or(0);
                    warn!(batch = index, error = %join_error, "Batch extraction task failed");
                    outcome.failures.push(ExtractionError::Unavailable {
                        batch: index,
                        message: join_error.to_string(),
                    });
                }
            }
        }

        done.sort_by_key(|(report, _)| report.index);
        for (report, arguments) in done {
            outcome.reports.push(report);
            outcome.arguments.extend(arguments);
        }

        info!(
            comments = comments.len(),
            arguments = outcome.arguments.len(),
            primary_batches = outcome.batches_using(ExtractionStrategy::Primary),
            fallback_batches = outcome.batches_using(ExtractionStrategy::Fallback),
            failures = outcome.failures.len(),
            latency_ms = start.elapsed().as_millis(),
            "Argument extraction completed"
        );

        outcome
    }
}

/// Messages for one primary call. Backends whose pipe already stores the
/// extraction prompt only receive the numbered comments.
fn primary_messages(backend: &dyn CompletionBackend, batch: &[Comment]) -> Vec<Message> {
    let comments = Message::user(format_comment_batch(
        batch
            .iter()
            .map(|c| (c.text.as_str(), c.policy_clause.as_deref())),
    ));

    if backend.stores_system_prompt() {
        vec![comments]
    } else {
        vec![Message::system(ARGUMENT_EXTRACTION_PROMPT), comments]
    }
}

/// Run the primary strategy for one batch.
async fn extract_primary(
    backend: &dyn CompletionBackend,
    batch: &[Comment],
    index: usize,
    timeout: Duration,
) -> ExtractionResult<Vec<Argument>> {
    let messages = primary_messages(backend, batch);

    let completion = match tokio::time::timeout(timeout, backend.complete(messages)).await {
        Ok(Ok(completion)) => completion,
        Ok(Err(e)) => {
            return Err(ExtractionError::Transient {
                batch: index,
                message: e.to_string(),
            })
        }
        Err(_) => {
            return Err(ExtractionError::Transient {
                batch: index,
                message: format!("Timed out after {}ms", timeout.as_millis()),
            })
        }
    };

    decode_completion(&completion, batch, index)
}

/// Pick a strategy for one batch: primary when available and successful,
/// otherwise fallback.
///
/// The primary attempt runs in its own task, so a panicking backend is a
/// transient failure of that attempt and the batch still falls back.
async fn extract_batch(
    backend: Option<Arc<dyn CompletionBackend>>,
    batch: Arc<[Comment]>,
    index: usize,
    timeout: Duration,
) -> (ExtractionStrategy, Vec<Argument>) {
    let Some(backend) = backend else {
        return (ExtractionStrategy::Fallback, extract_fallback(&batch));
    };
    let backend_name = backend.name().to_string();

    let attempt = {
        let batch = Arc::clone(&batch);
        tokio::spawn(
            async move { extract_primary(backend.as_ref(), &batch, index, timeout).await },
        )
    };
    let primary = match attempt.await {
        Ok(result) => result,
        Err(join_error) => Err(ExtractionError::Transient {
            batch: index,
            message: join_error.to_string(),
        }),
    };

    match primary {
        Ok(arguments) => {
            debug!(batch = index, backend = %backend_name, "Primary extraction succeeded");
            (ExtractionStrategy::Primary, arguments)
        }
        Err(e) => {
            warn!(batch = index, error = %e, "Primary extraction failed, using fallback");
            (ExtractionStrategy::Fallback, extract_fallback(&batch))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LangbaseError, LangbaseResult};
    use crate::langbase::MessageRole;
    use crate::models::Stance;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    /// Backend returning a fixed completion and counting calls.
    struct FixedBackend {
        completion: String,
        calls: AtomicUsize,
    }

    impl FixedBackend {
        fn new(completion: &str) -> Self {
            Self {
                completion: completion.to_string(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CompletionBackend for FixedBackend {
        async fn complete(&self, _messages: Vec<Message>) -> LangbaseResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.completion.clone())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct FailingBackend;

    #[async_trait]
    impl CompletionBackend for FailingBackend {
        async fn complete(&self, _messages: Vec<Message>) -> LangbaseResult<String> {
            Err(LangbaseError::Api {
                status: 503,
                message: "overloaded".to_string(),
            })
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    struct SlowBackend;

    #[async_trait]
    impl CompletionBackend for SlowBackend {
        async fn complete(&self, _messages: Vec<Message>) -> LangbaseResult<String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("[]".to_string())
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    struct PanickingBackend;

    #[async_trait]
    impl CompletionBackend for PanickingBackend {
        async fn complete(&self, _messages: Vec<Message>) -> LangbaseResult<String> {
            panic!("backend bug");
        }

        fn name(&self) -> &str {
            "panicking"
        }
    }

    struct StoredPromptBackend;

    #[async_trait]
    impl CompletionBackend for StoredPromptBackend {
        async fn complete(&self, _messages: Vec<Message>) -> LangbaseResult<String> {
            Ok("[]".to_string())
        }

        fn name(&self) -> &str {
            "stored-prompt"
        }

        fn stores_system_prompt(&self) -> bool {
            true
        }
    }

    fn comments(n: usize) -> Vec<Comment> {
        (0..n)
            .map(|i| {
                let text = if i % 2 == 0 {
                    "I support this clause"
                } else {
                    "I oppose this clause, it is a problem"
                };
                Comment::new(format!("c-{i}"), text, "portal").with_clause("Section 3")
            })
            .collect()
    }

    fn config(batch_size: usize) -> ExtractionConfig {
        ExtractionConfig {
            batch_size,
            max_concurrency: 2,
        }
    }

    #[test]
    fn test_strategy_display() {
        assert_eq!(ExtractionStrategy::Primary.to_string(), "primary");
        assert_eq!(ExtractionStrategy::Fallback.as_str(), "fallback");
    }

    #[test]
    fn test_zero_batch_size_is_coerced() {
        let extractor = ArgumentExtractor::fallback_only(config(0));
        assert_eq!(extractor.batch_size(), 1);
    }

    #[tokio::test]
    async fn test_fallback_only_batches() {
        let extractor = ArgumentExtractor::fallback_only(config(3));
        let outcome = extractor.extract(&comments(7), &CancellationFlag::new()).await;

        assert!(outcome.is_complete());
        assert_eq!(outcome.arguments.len(), 7);
        assert_eq!(outcome.reports.len(), 3);
        assert_eq!(outcome.batches_using(ExtractionStrategy::Fallback), 3);
        assert_eq!(outcome.reports[2].comment_count, 1);
    }

    #[tokio::test]
    async fn test_primary_success() {
        let backend = Arc::new(FixedBackend::new(
            r#"Here: [{"comment": 1, "argument": "Backs the clause", "stance": "support", "clause": "Section 3", "citation": "", "confidence": 88}]"#,
        ));
        let extractor = ArgumentExtractor::new(
            Some(backend.clone()),
            config(2),
            Duration::from_secs(5),
        );

        let outcome = extractor.extract(&comments(4), &CancellationFlag::new()).await;

        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
        assert_eq!(outcome.batches_using(ExtractionStrategy::Primary), 2);
        assert_eq!(outcome.arguments.len(), 2);
        assert!(outcome.arguments.iter().all(|a| a.confidence == 88.0));
        assert_eq!(outcome.arguments[0].source_comment_id, "c-0");
        assert_eq!(outcome.arguments[1].source_comment_id, "c-2");
    }

    #[tokio::test]
    async fn test_unparseable_response_falls_back() {
        let backend = Arc::new(FixedBackend::new("I cannot help with that."));
        let extractor = ArgumentExtractor::new(Some(backend), config(10), Duration::from_secs(5));

        let outcome = extractor.extract(&comments(2), &CancellationFlag::new()).await;

        assert!(outcome.is_complete());
        assert_eq!(outcome.batches_using(ExtractionStrategy::Fallback), 1);
        assert_eq!(outcome.arguments[1].stance, Stance::Objection);
    }

    #[tokio::test]
    async fn test_backend_error_falls_back() {
        let extractor = ArgumentExtractor::new(
            Some(Arc::new(FailingBackend)),
            config(10),
            Duration::from_secs(5),
        );
        let outcome = extractor.extract(&comments(3), &CancellationFlag::new()).await;
        assert_eq!(outcome.arguments.len(), 3);
        assert_eq!(outcome.reports[0].strategy, ExtractionStrategy::Fallback);
    }

    #[tokio::test]
    async fn test_timeout_falls_back() {
        let extractor = ArgumentExtractor::new(
            Some(Arc::new(SlowBackend)),
            config(10),
            Duration::from_millis(20),
        );
        let outcome = extractor.extract(&comments(2), &CancellationFlag::new()).await;
        assert!(outcome.is_complete());
        assert_eq!(outcome.reports[0].strategy, ExtractionStrategy::Fallback);
    }

    #[tokio::test]
    async fn test_panicking_backend_falls_back() {
        let extractor = ArgumentExtractor::new(
            Some(Arc::new(PanickingBackend)),
            config(2),
            Duration::from_secs(5),
        );
        let outcome = extractor.extract(&comments(4), &CancellationFlag::new()).await;

        assert!(outcome.is_complete());
        assert!(outcome.failures.is_empty());
        assert_eq!(outcome.arguments.len(), 4);
        assert_eq!(outcome.batches_using(ExtractionStrategy::Fallback), 2);
        assert_eq!(outcome.arguments[1].stance, Stance::Objection);
    }

    #[tokio::test]
    async fn test_single_comment_survives_panicking_backend() {
        let extractor = ArgumentExtractor::new(
            Some(Arc::new(PanickingBackend)),
            config(10),
            Duration::from_secs(5),
        );
        let comments = vec![Comment::new("c-1", "I strongly oppose this", "portal")];
        let outcome = extractor.extract(&comments, &CancellationFlag::new()).await;

        assert_eq!(outcome.arguments.len(), 1);
        assert_eq!(outcome.arguments[0].source_comment_id, "c-1");
        assert_eq!(outcome.reports[0].strategy, ExtractionStrategy::Fallback);
    }

    #[test]
    fn test_stored_prompt_is_not_resent() {
        let batch = comments(1);

        let plain = FixedBackend::new("[]");
        let messages = primary_messages(&plain, &batch);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, ARGUMENT_EXTRACTION_PROMPT);

        let messages = primary_messages(&StoredPromptBackend, &batch);
        assert_eq!(messages.len(), 1);
        assert!(matches!(messages[0].role, MessageRole::User));
        assert!(messages[0].content.contains("1. [Section 3] I support this clause"));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let extractor = ArgumentExtractor::fallback_only(config(2));
        let cancel = CancellationFlag::new();
        cancel.cancel();

        let outcome = extractor.extract(&comments(5), &cancel).await;

        assert!(outcome.cancelled);
        assert!(!outcome.is_complete());
        assert!(outcome.arguments.is_empty());
        assert_eq!(outcome.failures.len(), 3);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let extractor = ArgumentExtractor::fallback_only(config(50));
        let outcome = extractor.extract(&[], &CancellationFlag::new()).await;
        assert!(outcome.is_complete());
        assert!(outcome.reports.is_empty());
    }
}
