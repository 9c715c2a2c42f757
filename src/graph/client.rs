//! Blocking HTTP client for the Wikidata search API and query service.
//!
//! Uses `ureq` with a per-agent timeout. Every failure (transport, non-2xx,
//! unexpected body) is reported as a [`GraphError`]; callers decide whether it
//! is fatal.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::config::GraphConfig;
use crate::error::{GraphError, GraphResult};
use crate::identifier::IdKind;
use crate::llm::{is_timeout, preview};

use super::{GraphBackend, Row, SearchHit};

const SPARQL_RESULTS_JSON: &str = "application/sparql-results+json";

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SparqlResponse {
    results: SparqlResults,
}

#[derive(Deserialize)]
struct SparqlResults {
    #[serde(default)]
    bindings: Vec<BTreeMap<String, SparqlTerm>>,
}

#[derive(Deserialize)]
struct SparqlTerm {
    value: String,
}

/// Client for `wbsearchentities` and the SPARQL endpoint.
pub struct WikidataClient {
    config: GraphConfig,
    agent: ureq::Agent,
}

impl WikidataClient {
    pub fn new(config: GraphConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(&config.user_agent)
            .build();
        Self { config, agent }
    }

    fn map_error(&self, url: &str, err: ureq::Error) -> GraphError {
        match err {
            ureq::Error::Status(status, _) => GraphError::Status {
                url: url.to_string(),
                status,
            },
            ureq::Error::Transport(transport) => GraphError::Transport {
                url: url.to_string(),
                message: if is_timeout(&transport) {
                    format!("timed out after {}s", self.config.timeout_secs)
                } else {
                    transport.to_string()
                },
            },
        }
    }

    fn parse_error(url: &str, err: impl std::fmt::Display) -> GraphError {
        GraphError::Parse {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}

impl GraphBackend for WikidataClient {
    fn search(&self, term: &str, kind: IdKind) -> GraphResult<Vec<SearchHit>> {
        let url = &self.config.search_api;
        tracing::debug!(term, kind = %kind, "wbsearchentities");

        let response = self
            .agent
            .get(url)
            .query("action", "wbsearchentities")
            .query("search", term)
            .query("language", &self.config.language)
            .query("format", "json")
            .query("type", kind.search_type())
            .call()
            .map_err(|e| self.map_error(url, e))?;

        let body = response
            .into_string()
            .map_err(|e| Self::parse_error(url, e))?;
        let parsed: SearchResponse = serde_json::from_str(&body)
            .map_err(|e| Self::parse_error(url, format!("{e} in {}", preview(&body, 120))))?;
        Ok(parsed.search)
    }

    fn select(&self, query: &str) -> GraphResult<Vec<Row>> {
        let url = &self.config.sparql_endpoint;
        tracing::debug!(query, "SPARQL select");

        let response = self
            .agent
            .get(url)
            .query("query", query)
            .query("format", "json")
            .set("Accept", SPARQL_RESULTS_JSON)
            .call()
            .map_err(|e| self.map_error(url, e))?;

        let parsed: SparqlResponse = response
            .into_json()
            .map_err(|e| Self::parse_error(url, e))?;

        Ok(parsed
            .results
            .bindings
            .into_iter()
            .map(|binding| binding.into_iter().map(|(k, v)| (k, v.value)).collect())
            .collect())
    }
}

impl std::fmt::Debug for WikidataClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WikidataClient")
            .field("sparql_endpoint", &self.config.sparql_endpoint)
            .field("search_api", &self.config.search_api)
            .finish()
    }
}
