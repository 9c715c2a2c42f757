//! Fact retrieval: SPARQL queries for resolved ids and hop chains.
//!
//! A failed query costs only the facts of that id or hop. It is recorded as a
//! [`PipelineError::RetrievalFailed`] issue and the batch carries on.

use std::fmt;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::extract::Triplet;
use crate::graph::sparql::{self, hop_vars, theme_vars};
use crate::graph::{GraphBackend, Row};
use crate::identifier::{IdKind, Identifier, is_canonical};
use crate::resolve::Resolver;

/// A human-readable `(subject, relation, object)` statement from the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fact {
    pub subject: String,
    pub relation: String,
    pub object: String,
    /// Short description of the object, when the graph has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Fact {
    pub fn new(
        subject: impl Into<String>,
        relation: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            relation: relation.into(),
            object: object.into(),
            detail: None,
        }
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.subject, self.relation, self.object)?;
        if let Some(detail) = &self.detail {
            write!(f, " ({detail})")?;
        }
        Ok(())
    }
}

/// Facts gathered by one retrieval pass, plus the per-item failures met on the way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Retrieval {
    pub facts: Vec<Fact>,
    pub issues: Vec<PipelineError>,
}

impl Retrieval {
    fn absorb(&mut self, result: Result<Vec<Fact>, PipelineError>) {
        match result {
            Ok(facts) => self.facts.extend(facts),
            Err(issue) => self.issues.push(issue),
        }
    }
}

/// A theme and the entity it resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTheme {
    pub theme: String,
    pub id: Identifier,
}

/// Runs `f` over `items`, on the rayon pool when `parallel` is set.
/// Output order always matches input order.
pub(crate) fn fan_out<T, R, F>(parallel: bool, items: &[T], f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync + Send,
{
    if parallel && items.len() > 1 {
        items.par_iter().map(f).collect()
    } else {
        items.iter().map(f).collect()
    }
}

/// Issues SPARQL queries and turns result rows into [`Fact`]s.
pub struct Retriever<'a> {
    graph: &'a dyn GraphBackend,
    language: String,
    top_k: usize,
    parallel: bool,
}

impl<'a> Retriever<'a> {
    pub fn new(graph: &'a dyn GraphBackend, language: &str, settings: &PipelineConfig) -> Self {
        Self {
            graph,
            language: language.to_string(),
            top_k: settings.top_k,
            parallel: settings.parallel,
        }
    }

    /// Top-K property/value facts for every resolved theme, in theme order.
    pub fn themes(&self, themes: &[ResolvedTheme]) -> Retrieval {
        let results = fan_out(self.parallel, themes, |t| self.theme_facts(&t.theme, t.id));
        let mut retrieval = Retrieval::default();
        for result in results {
            retrieval.absorb(result);
        }
        tracing::info!(
            themes = themes.len(),
            facts = retrieval.facts.len(),
            failures = retrieval.issues.len(),
            "theme retrieval done"
        );
        retrieval
    }

    /// Facts about a single entity. Rows without both labels are dropped.
    pub fn theme_facts(&self, theme: &str, id: Identifier) -> Result<Vec<Fact>, PipelineError> {
        let query = sparql::theme_facts(id, &self.language, self.top_k);
        let rows = self.select(&query, id)?;
        let subject = self.display_label(theme, id);

        let facts: Vec<Fact> = rows
            .iter()
            .filter_map(|row| {
                let relation = labelled(row, theme_vars::PROPERTY_LABEL)?;
                let object = labelled(row, theme_vars::VALUE_LABEL)?;
                Some(Fact {
                    subject: subject.clone(),
                    relation: relation.to_string(),
                    object: object.to_string(),
                    detail: labelled(row, theme_vars::VALUE_DESCRIPTION).map(String::from),
                })
            })
            .collect();
        tracing::debug!(%id, facts = facts.len(), "theme facts");
        Ok(facts)
    }

    /// Walk a hop chain. Each hop's first answer seeds the next hop's subject.
    ///
    /// The walk stops at the first hop whose subject or relation cannot be
    /// resolved, whose query fails or comes back empty, or whose answer cannot
    /// be resolved back to an entity. Facts from completed hops are kept.
    pub fn chain(&self, triplets: &[Triplet], resolver: &Resolver<'_>) -> Retrieval {
        let mut retrieval = Retrieval::default();
        let mut carried: Option<(Identifier, String)> = None;

        for (index, hop) in triplets.iter().enumerate() {
            let (subject, subject_label) = match carried.take() {
                Some(seed) => seed,
                None if index == 0 => {
                    let Some(term) = hop.subject.as_deref() else {
                        break;
                    };
                    match resolver.try_resolve(term, IdKind::Entity) {
                        Ok(id) => (id, self.display_label(term, id)),
                        Err(issue) => {
                            retrieval.issues.push(issue);
                            break;
                        }
                    }
                }
                None => break,
            };

            let relation = match resolver.try_resolve(&hop.relation, IdKind::Property) {
                Ok(id) => id,
                Err(issue) => {
                    retrieval.issues.push(issue);
                    break;
                }
            };
            let relation_label = self.display_label(&hop.relation, relation);

            let query = sparql::hop(subject, relation, &self.language, self.top_k);
            let rows = match self.select(&query, subject) {
                Ok(rows) => rows,
                Err(issue) => {
                    retrieval.issues.push(issue);
                    break;
                }
            };

            let mut answers: Vec<String> = Vec::new();
            for row in &rows {
                let Some(label) = item_label(row) else {
                    continue;
                };
                let fact = match row.get(hop_vars::DIRECTION).map(String::as_str) {
                    Some(hop_vars::REVERSE) => {
                        Fact::new(label.clone(), relation_label.clone(), subject_label.clone())
                    }
                    _ => Fact::new(subject_label.clone(), relation_label.clone(), label.clone()),
                };
                if !retrieval.facts.contains(&fact) {
                    retrieval.facts.push(fact);
                }
                if !answers.contains(&label) {
                    answers.push(label);
                }
            }
            tracing::info!(
                hop = index + 1,
                %subject,
                %relation,
                answers = answers.len(),
                "hop retrieved"
            );

            let is_last = index + 1 == triplets.len();
            if is_last {
                break;
            }
            let Some(next) = answers.into_iter().next() else {
                tracing::info!(hop = index + 1, "hop has no answer, chain ends");
                break;
            };
            match resolver.try_resolve(&next, IdKind::Entity) {
                Ok(id) => carried = Some((id, next)),
                Err(issue) => {
                    retrieval.issues.push(issue);
                    break;
                }
            }
        }

        retrieval
    }

    fn select(&self, query: &str, target: Identifier) -> Result<Vec<Row>, PipelineError> {
        self.graph.select(query).map_err(|e| {
            tracing::warn!(%target, error = %e, "SPARQL query failed");
            PipelineError::RetrievalFailed {
                target: target.to_string(),
                reason: e.to_string(),
            }
        })
    }

    /// The term itself for free text; the graph label for a canonical id.
    fn display_label(&self, term: &str, id: Identifier) -> String {
        if !is_canonical(term) {
            return term.trim().to_string();
        }
        self.graph
            .select(&sparql::label(id, &self.language))
            .inspect_err(|e| tracing::warn!(%id, error = %e, "label query failed"))
            .ok()
            .and_then(|rows| rows.into_iter().next())
            .and_then(|mut row| row.remove("label"))
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| id.to_string())
    }
}

/// A bound, non-empty value that is not a bare id left by the label service.
fn labelled<'r>(row: &'r Row, var: &str) -> Option<&'r str> {
    row.get(var)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty() && !is_canonical(v))
}

/// The label of a hop answer: its `itemLabel`, or the literal itself for
/// non-entity values such as dates.
fn item_label(row: &Row) -> Option<String> {
    if let Some(label) = labelled(row, hop_vars::ITEM_LABEL) {
        if !label.starts_with("http://") && !label.starts_with("https://") {
            return Some(tidy_literal(label));
        }
    }
    let item = row.get(hop_vars::ITEM)?.trim();
    if item.is_empty() || item.starts_with("http://") || item.starts_with("https://") {
        return None;
    }
    Some(tidy_literal(item))
}

/// `2010-07-08T00:00:00Z` reads better as `2010-07-08`.
fn tidy_literal(value: &str) -> String {
    value
        .strip_suffix("T00:00:00Z")
        .unwrap_or(value)
        .trim_start_matches('+')
        .to_string()
}
