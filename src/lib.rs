// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # factcards
//!
//! Answers natural-language questions by pairing a chat-completion LLM with
//! the Wikidata knowledge graph, and returns the answer as study flashcards.
//!
//! ## Architecture
//!
//! - **Extraction** (`extract`, `patterns`): question to themes or a chain of triplets
//! - **Resolution** (`resolve`): terms to canonical `Q`/`P` ids via entity search
//! - **Retrieval** (`retrieve`, `graph`): SPARQL facts per theme or per hop
//! - **Synthesis** (`synthesize`, `flashcard`): facts back through the LLM into
//!   a summary, key facts and quiz questions
//! - **Engine** (`pipeline`): runs the stages and reports a tagged outcome
//!
//! ## Library usage
//!
//! ```no_run
//! use factcards::config::Config;
//! use factcards::pipeline::{KnowledgeEngine, PipelineOutcome};
//!
//! let config = Config::default().with_env_overrides();
//! let engine = KnowledgeEngine::from_config(&config).unwrap();
//! if let PipelineOutcome::Answered(report) = engine.answer("Who directed Inception?") {
//!     println!("{}", report.answer.summary);
//! }
//! ```

pub mod config;
pub mod error;
pub mod extract;
pub mod flashcard;
pub mod graph;
pub mod identifier;
pub mod llm;
pub mod paths;
pub mod patterns;
pub mod pipeline;
pub mod resolve;
pub mod retrieve;
pub mod synthesize;

#[cfg(test)]
mod testing;
