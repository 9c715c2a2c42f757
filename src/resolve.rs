//! Term to identifier resolution against the graph's entity search.

use crate::error::PipelineError;
use crate::graph::GraphBackend;
use crate::identifier::{IdKind, Identifier};

/// Maps natural-language terms to canonical ids.
///
/// Canonical input (`Q42`, `P57`) is returned as-is without a network call.
/// Everything else goes through `wbsearchentities`, taking the top hit.
pub struct Resolver<'a> {
    graph: &'a dyn GraphBackend,
}

impl<'a> Resolver<'a> {
    pub fn new(graph: &'a dyn GraphBackend) -> Self {
        Self { graph }
    }

    /// Best-effort lookup; `None` means the slot could not be grounded.
    pub fn resolve(&self, term: &str, kind: IdKind) -> Option<Identifier> {
        self.try_resolve(term, kind).ok()
    }

    /// Like [`resolve`](Self::resolve), keeping the reason for a miss.
    ///
    /// Never fails hard: every error is a [`PipelineError::ResolutionFailed`]
    /// the caller may record and move past.
    pub fn try_resolve(&self, term: &str, kind: IdKind) -> Result<Identifier, PipelineError> {
        let miss = |reason: String| {
            tracing::warn!(term, kind = %kind, %reason, "resolution failed");
            PipelineError::ResolutionFailed {
                term: term.to_string(),
                kind,
                reason,
            }
        };

        let term = term.trim();
        if term.is_empty() {
            return Err(miss("empty term".into()));
        }

        if let Some(id) = Identifier::parse_canonical(term) {
            if id.kind() != kind {
                return Err(miss(format!("{id} is not a {kind} id")));
            }
            tracing::debug!(%id, "canonical id, no lookup needed");
            return Ok(id);
        }

        let hits = self
            .graph
            .search(term, kind)
            .map_err(|e| miss(e.to_string()))?;
        let first = hits.first().ok_or_else(|| miss("no search hits".into()))?;
        let id = Identifier::parse_canonical(&first.id)
            .filter(|id| id.kind() == kind)
            .ok_or_else(|| miss(format!("top hit has unexpected id \"{}\"", first.id)))?;

        tracing::debug!(term, %id, "resolved");
        Ok(id)
    }
}
