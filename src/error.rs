//! Rich diagnostic error types for factcards.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text so users know what went wrong and how to
//! fix it. Per-item pipeline failures (one theme, one hop) are values of
//! [`PipelineError`] collected into the outcome rather than returned as `Err`.

use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;

use crate::identifier::IdKind;
use crate::llm::LlmError;

/// Top-level error type for factcards.
#[derive(Debug, Error, Diagnostic)]
pub enum FactcardsError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Pipeline(#[from] PipelineError),
}

// ---------------------------------------------------------------------------
// Graph errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    #[error("request to {url} failed: {message}")]
    #[diagnostic(
        code(factcards::graph::transport),
        help(
            "The knowledge graph endpoint could not be reached. \
             Check your network connection and the `graph` endpoints in the config."
        )
    )]
    Transport { url: String, message: String },

    #[error("{url} returned HTTP {status}")]
    #[diagnostic(
        code(factcards::graph::status),
        help(
            "The endpoint rejected the request. HTTP 429 means the query service \
             is rate limiting you; 400 usually means a malformed SPARQL query."
        )
    )]
    Status { url: String, status: u16 },

    #[error("malformed response from {url}: {message}")]
    #[diagnostic(
        code(factcards::graph::parse),
        help("The endpoint answered with a body that is not the expected JSON shape.")
    )]
    Parse { url: String, message: String },
}

pub type GraphResult<T> = std::result::Result<T, GraphError>;

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("cannot determine home directory")]
    #[diagnostic(
        code(factcards::config::no_home),
        help("Set the HOME environment variable or pass --config explicitly.")
    )]
    NoHome,

    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(factcards::config::read),
        help("Create one with `factcards config init` or pass --config <path>.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {message}")]
    #[diagnostic(
        code(factcards::config::parse),
        help("Check the TOML syntax (or the JSON syntax for a legacy keys.json file).")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(factcards::config::write),
        help("Ensure you have write permissions to the config directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("config file already exists: {path}")]
    #[diagnostic(
        code(factcards::config::exists),
        help("Pass --force to overwrite it.")
    )]
    AlreadyExists { path: String },

    #[error("no LLM API key configured")]
    #[diagnostic(
        code(factcards::config::missing_api_key),
        help(
            "Set `llm.api_key` in the config file, or export FACTCARDS_API_KEY \
             (OPENROUTER_API_KEY is also honoured)."
        )
    )]
    MissingApiKey,

    #[error("invalid configuration: {message}")]
    #[diagnostic(code(factcards::config::invalid))]
    Invalid { message: String },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// ---------------------------------------------------------------------------
// Pipeline errors
// ---------------------------------------------------------------------------

/// Stage failures of the question-to-answer pipeline.
///
/// `ExtractionFailed` and `SynthesisFailed` end a query. `ResolutionFailed` and
/// `RetrievalFailed` are per-item and only ever recorded as issues next to a
/// result.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic, Serialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum PipelineError {
    #[error("extraction failed: {reason}")]
    #[diagnostic(
        code(factcards::pipeline::extraction_failed),
        help("The LLM was unreachable or did not return a usable JSON list.")
    )]
    ExtractionFailed { reason: String },

    #[error("could not resolve {kind} \"{term}\": {reason}")]
    #[diagnostic(code(factcards::pipeline::resolution_failed))]
    ResolutionFailed {
        term: String,
        kind: IdKind,
        reason: String,
    },

    #[error("retrieval for {target} failed: {reason}")]
    #[diagnostic(code(factcards::pipeline::retrieval_failed))]
    RetrievalFailed { target: String, reason: String },

    #[error("synthesis failed: {reason}")]
    #[diagnostic(
        code(factcards::pipeline::synthesis_failed),
        help("The LLM could not be reached for the final answer.")
    )]
    SynthesisFailed { reason: String },
}

impl PipelineError {
    /// Whether this failure ends the query.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::ExtractionFailed { .. } | Self::SynthesisFailed { .. }
        )
    }
}

/// Convenience alias for functions returning factcards results.
pub type FactcardsResult<T> = std::result::Result<T, FactcardsError>;
