//! # Edict Argument Mining
//!
//! Turns unstructured public comments on a policy document into
//! clause-anchored arguments, per-clause statistics and ranked amendment
//! suggestions.
//!
//! ## Stages
//!
//! - **Argument extraction**: LLM-backed structured extraction through
//!   Langbase Pipes, with a deterministic keyword fallback per batch
//! - **Citation matching**: statutory and named-law references found in
//!   argument text
//! - **Clause aggregation**: support, objection, controversy and heat per
//!   clause
//! - **Amendment suggestions**: ranked, citation-backed recommendations
//! - **Fusion**: cross-source weights, cross-validation and echo chamber
//!   detection
//!
//! ## Architecture
//!
//! ```text
//! comments → AnalysisPipeline → ArgumentExtractor → Langbase Pipes (HTTP)
//!                   ↓                  ↓
//!             ResultCache (JSON)   keyword fallback
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use edict_mining::{AnalysisPipeline, CancellationFlag, Config};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let pipeline = AnalysisPipeline::from_config(&config).await;
//!     let result = pipeline
//!         .run_analysis(&comments, &clauses, None, &CancellationFlag::new())
//!         .await?;
//!     println!("{}", serde_json::to_string_pretty(&result)?);
//!     Ok(())
//! }
//! ```

/// Clause aggregation.
pub mod aggregate;
/// Amendment suggestion generation.
pub mod amendment;
/// Persistent result cache.
pub mod cache;
/// Citation matching.
pub mod citation;
/// Configuration management.
pub mod config;
/// Error types and result aliases for the application.
pub mod error;
/// Cross-source fusion statistics.
pub mod fusion;
/// Langbase API client and the completion backend seam.
pub mod langbase;
/// Argument extraction.
pub mod mining;
/// Shared data model.
pub mod models;
/// End-to-end analysis runs.
pub mod pipeline;
/// System prompts for Langbase pipes.
pub mod prompts;

pub use cache::ResultCache;
pub use config::Config;
pub use error::{AppError, AppResult};
pub use mining::{ArgumentExtractor, CancellationFlag, ExtractionStrategy};
pub use models::{AnalysisResult, Argument, Comment, PolicyClause};
pub use pipeline::AnalysisPipeline;
