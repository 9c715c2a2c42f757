//! Knowledge graph access: Wikidata entity search and SPARQL SELECT.
//!
//! [`GraphBackend`] is the seam between the pipeline and the network. The
//! production implementation is [`WikidataClient`]; tests substitute fakes.

pub mod client;
pub mod sparql;

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::GraphResult;
use crate::identifier::IdKind;

pub use client::WikidataClient;

/// One hit from `wbsearchentities`, in rank order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SearchHit {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A SPARQL result row: variable name to bound value. Unbound variables are absent.
pub type Row = BTreeMap<String, String>;

/// Read access to a Wikidata-like graph.
pub trait GraphBackend: Send + Sync {
    /// Search entities (`kind = Entity`) or properties by label.
    fn search(&self, term: &str, kind: IdKind) -> GraphResult<Vec<SearchHit>>;

    /// Run a SPARQL SELECT query.
    fn select(&self, query: &str) -> GraphResult<Vec<Row>>;
}
