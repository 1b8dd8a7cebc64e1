//! Langbase Pipes client and the completion seam used by the extractor.

mod client;
mod types;

#[cfg(test)]
#[path = "types_tests.rs"]
mod types_tests;

pub use client::LangbaseClient;
pub use types::*;

use async_trait::async_trait;

use crate::error::LangbaseResult;

/// A text-completion backend for the primary extraction strategy.
///
/// Implementations return the raw completion text; decoding is the
/// extractor's job.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Run the conversation and return the model's completion text.
    async fn complete(&self, messages: Vec<Message>) -> LangbaseResult<String>;

    /// Human-readable backend name for logs.
    fn name(&self) -> &str;

    /// Whether the backend already holds the extraction system prompt, so
    /// callers send only the user message.
    fn stores_system_prompt(&self) -> bool {
        false
    }
}

/// [`CompletionBackend`] that runs a named Langbase pipe.
#[derive(Clone)]
pub struct PipeBackend {
    client: LangbaseClient,
    pipe_name: String,
}

impl PipeBackend {
    /// Bind a client to a pipe name.
    pub fn new(client: LangbaseClient, pipe_name: impl Into<String>) -> Self {
        Self {
            client,
            pipe_name: pipe_name.into(),
        }
    }
}

#[async_trait]
impl CompletionBackend for PipeBackend {
    async fn complete(&self, messages: Vec<Message>) -> LangbaseResult<String> {
        let request = PipeRequest::new(&self.pipe_name, messages);
        let response = self.client.call_pipe(request).await?;
        Ok(response.completion)
    }

    fn name(&self) -> &str {
        &self.pipe_name
    }

    // The pipe is upserted with the extraction prompt as its system message
    fn stores_system_prompt(&self) -> bool {
        true
    }
}
