//! Engine facade: question in, flashcard answer out.
//!
//! [`KnowledgeEngine`] owns the LLM and graph backends and runs one query
//! through extract, resolve, retrieve and synthesize. Stages only move
//! forward. Per-item failures are collected as issues on the outcome; only a
//! failed extraction or a synthesis call that produced no text ends the query.

use std::sync::Arc;

use serde::Serialize;

use crate::config::{Config, Mode};
use crate::error::{FactcardsResult, PipelineError};
use crate::extract::{Extraction, Extractor, Triplet};
use crate::graph::{GraphBackend, WikidataClient};
use crate::identifier::{IdKind, Identifier};
use crate::llm::{ChatBackend, ChatClient};
use crate::resolve::Resolver;
use crate::retrieve::{Fact, ResolvedTheme, Retrieval, Retriever, fan_out};
use crate::synthesize::{SynthesizedAnswer, Synthesizer};

/// Where the answer's content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Synthesized from knowledge-graph facts.
    Graph,
    /// No facts were found; the LLM answered from general knowledge.
    LlmOnly,
}

/// A completed query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub answer: SynthesizedAnswer,
    pub source: Source,
    /// The extraction the facts were retrieved for.
    pub extraction: Extraction,
    pub facts: Vec<Fact>,
    /// Non-fatal failures met on the way.
    pub issues: Vec<PipelineError>,
}

/// Result of one query through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PipelineOutcome {
    Answered(Report),
    /// Nothing extracted from the question resolved to a graph id.
    NoResult {
        extraction: Extraction,
        issues: Vec<PipelineError>,
    },
    /// A terminal stage failure.
    Failed {
        error: PipelineError,
        issues: Vec<PipelineError>,
    },
}

impl PipelineOutcome {
    /// The synthesized answer, if the query got that far.
    pub fn answer(&self) -> Option<&SynthesizedAnswer> {
        match self {
            Self::Answered(report) => Some(&report.answer),
            _ => None,
        }
    }

    pub fn issues(&self) -> &[PipelineError] {
        match self {
            Self::Answered(report) => &report.issues,
            Self::NoResult { issues, .. } | Self::Failed { issues, .. } => issues,
        }
    }
}

/// What resolve + retrieve produced for one extraction.
enum Gathered {
    NoIds(Vec<PipelineError>),
    Facts(Retrieval),
}

/// The question-answering engine.
///
/// Holds no per-query state; concurrent calls to [`answer`](Self::answer)
/// are independent.
pub struct KnowledgeEngine {
    llm: Arc<dyn ChatBackend>,
    graph: Arc<dyn GraphBackend>,
    config: Config,
}

impl KnowledgeEngine {
    pub fn new(llm: Arc<dyn ChatBackend>, graph: Arc<dyn GraphBackend>, config: Config) -> Self {
        Self { llm, graph, config }
    }

    /// Validate `config` and build the HTTP clients it describes.
    pub fn from_config(config: &Config) -> FactcardsResult<Self> {
        config.validate()?;
        let llm = ChatClient::new(config.llm.clone())?;
        let graph = WikidataClient::new(config.graph.clone());
        tracing::info!(
            model = llm.model(),
            sparql = %config.graph.sparql_endpoint,
            mode = %config.pipeline.mode,
            "knowledge engine ready"
        );
        Ok(Self::new(Arc::new(llm), Arc::new(graph), config.clone()))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Answer `prompt` in the configured mode.
    pub fn answer(&self, prompt: &str) -> PipelineOutcome {
        self.answer_with_mode(prompt, self.config.pipeline.mode)
    }

    pub fn answer_with_mode(&self, prompt: &str, mode: Mode) -> PipelineOutcome {
        tracing::info!(%mode, prompt, "answering");

        let extraction = match self.extract(prompt, mode) {
            Ok(extraction) => extraction,
            Err(error) => {
                return PipelineOutcome::Failed {
                    error,
                    issues: Vec::new(),
                };
            }
        };

        let mut issues = Vec::new();
        let mut current = (extraction.clone(), self.gather(&extraction));

        let triplets_came_up_empty = matches!(extraction, Extraction::Triplets(_))
            && match &current.1 {
                Gathered::NoIds(_) => true,
                Gathered::Facts(retrieval) => retrieval.facts.is_empty(),
            };
        if mode == Mode::Auto && triplets_came_up_empty {
            tracing::info!("triplet chain found no facts, falling back to themes");
            match self.extractor().themes(prompt) {
                Ok(themes) => {
                    issues.extend(take_issues(current.1));
                    let themes = Extraction::Themes(themes);
                    current = (themes.clone(), self.gather(&themes));
                }
                Err(issue) => issues.push(issue),
            }
        }

        let (extraction, gathered) = current;
        let retrieval = match gathered {
            Gathered::NoIds(more) => {
                issues.extend(more);
                tracing::info!(issues = issues.len(), "no identifiers resolved");
                return PipelineOutcome::NoResult { extraction, issues };
            }
            Gathered::Facts(retrieval) => retrieval,
        };
        issues.extend(retrieval.issues);
        let facts = retrieval.facts;

        let source = if facts.is_empty() {
            Source::LlmOnly
        } else {
            Source::Graph
        };
        tracing::info!(facts = facts.len(), ?source, "synthesizing");

        let synthesizer = Synthesizer::new(self.llm.as_ref(), self.config.llm.json_mode);
        match synthesizer.synthesize(prompt, &facts) {
            Ok(answer) => PipelineOutcome::Answered(Report {
                answer,
                source,
                extraction,
                facts,
                issues,
            }),
            Err(error) => PipelineOutcome::Failed { error, issues },
        }
    }

    /// Run the extraction stage alone.
    pub fn extract(&self, text: &str, mode: Mode) -> Result<Extraction, PipelineError> {
        self.extractor().extract(text, mode)
    }

    /// Resolve a single term.
    pub fn resolve(&self, term: &str, kind: IdKind) -> Result<Identifier, PipelineError> {
        Resolver::new(self.graph.as_ref()).try_resolve(term, kind)
    }

    fn extractor(&self) -> Extractor<'_> {
        Extractor::new(
            self.llm.as_ref(),
            &self.config.pipeline,
            self.config.llm.json_mode,
        )
    }

    fn retriever(&self) -> Retriever<'_> {
        Retriever::new(
            self.graph.as_ref(),
            &self.config.graph.language,
            &self.config.pipeline,
        )
    }

    fn gather(&self, extraction: &Extraction) -> Gathered {
        match extraction {
            Extraction::Themes(themes) => self.gather_themes(themes),
            Extraction::Triplets(triplets) => self.gather_chain(triplets),
        }
    }

    fn gather_themes(&self, themes: &[String]) -> Gathered {
        let resolver = Resolver::new(self.graph.as_ref());
        let outcomes = fan_out(self.config.pipeline.parallel, themes, |theme| {
            resolver.try_resolve(theme, IdKind::Entity)
        });

        let mut issues = Vec::new();
        let mut resolved = Vec::new();
        for (theme, outcome) in themes.iter().zip(outcomes) {
            match outcome {
                Ok(id) => resolved.push(ResolvedTheme {
                    theme: theme.clone(),
                    id,
                }),
                Err(issue) => issues.push(issue),
            }
        }
        tracing::info!(
            themes = themes.len(),
            resolved = resolved.len(),
            "theme resolution done"
        );
        if resolved.is_empty() {
            return Gathered::NoIds(issues);
        }

        let mut retrieval = self.retriever().themes(&resolved);
        issues.append(&mut retrieval.issues);
        retrieval.issues = issues;
        Gathered::Facts(retrieval)
    }

    /// A chain whose first hop never resolved has no ids to query.
    fn gather_chain(&self, triplets: &[Triplet]) -> Gathered {
        let resolver = Resolver::new(self.graph.as_ref());
        let retrieval = self.retriever().chain(triplets, &resolver);
        let never_queried = retrieval.facts.is_empty()
            && !retrieval.issues.is_empty()
            && retrieval
                .issues
                .iter()
                .all(|issue| matches!(issue, PipelineError::ResolutionFailed { .. }));
        if never_queried {
            Gathered::NoIds(retrieval.issues)
        } else {
            Gathered::Facts(retrieval)
        }
    }
}

fn take_issues(gathered: Gathered) -> Vec<PipelineError> {
    match gathered {
        Gathered::NoIds(issues) => issues,
        Gathered::Facts(retrieval) => retrieval.issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::testing::{FakeGraph, ScriptedChat, row};

    const INCEPTION_TRIPLETS: &str =
        r#"{"triplets": [{"entity": "Inception", "relation": "director", "object": "?"}]}"#;

    const NOLAN_ANSWER: &str = r#"{
        "facts": ["Inception was directed by Christopher Nolan."],
        "questions": [{"question": "Who directed Inception?",
                       "options": ["Christopher Nolan", "James Cameron", "Ridley Scott"],
                       "correct_answer": "Christopher Nolan"}],
        "summary": "Christopher Nolan directed Inception."
    }"#;

    fn config(mode: Mode) -> Config {
        Config {
            pipeline: PipelineConfig {
                mode,
                parallel: false,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn inception_graph() -> FakeGraph {
        FakeGraph::new()
            .with_hit("Inception", IdKind::Entity, "Q25188")
            .with_hit("director", IdKind::Property, "P57")
            .with_rows(
                "wd:Q25188 wdt:P57 ?item",
                vec![row(&[
                    ("item", "http://www.wikidata.org/entity/Q25191"),
                    ("itemLabel", "Christopher Nolan"),
                    ("direction", "forward"),
                ])],
            )
    }

    fn engine(llm: &Arc<ScriptedChat>, graph: &Arc<FakeGraph>, mode: Mode) -> KnowledgeEngine {
        KnowledgeEngine::new(llm.clone(), graph.clone(), config(mode))
    }

    #[test]
    fn who_directed_inception_end_to_end() {
        let llm = Arc::new(ScriptedChat::new([INCEPTION_TRIPLETS, NOLAN_ANSWER]));
        let graph = Arc::new(inception_graph());
        let outcome = engine(&llm, &graph, Mode::Triplets).answer("Who directed Inception?");

        let PipelineOutcome::Answered(report) = outcome else {
            panic!("expected an answer, got {outcome:?}");
        };
        assert_eq!(report.source, Source::Graph);
        assert_eq!(
            report.facts,
            vec![Fact::new("Inception", "director", "Christopher Nolan")]
        );
        assert!(report.issues.is_empty());
        assert_eq!(report.answer.summary, "Christopher Nolan directed Inception.");
        assert!(!report.answer.fallback);

        assert!(
            graph
                .queries()
                .iter()
                .any(|q| q.contains("wd:Q25188 wdt:P57 ?item"))
        );
        let requests = llm.requests();
        assert_eq!(requests.len(), 2);
        assert!(
            requests[1]
                .user_content()
                .contains("- Inception director Christopher Nolan")
        );
    }

    #[test]
    fn extraction_failure_ends_the_query() {
        let llm = Arc::new(ScriptedChat::new(["I cannot help with that."]));
        let graph = Arc::new(FakeGraph::new());
        let outcome = engine(&llm, &graph, Mode::Themes).answer("Photosynthesis");

        assert!(matches!(
            outcome,
            PipelineOutcome::Failed {
                error: PipelineError::ExtractionFailed { .. },
                ..
            }
        ));
        assert!(graph.searches().is_empty());
        assert_eq!(llm.requests().len(), 1);
    }

    #[test]
    fn no_resolvable_theme_is_no_result() {
        let llm = Arc::new(ScriptedChat::new([r#"{"themes": ["Xyzzy", "Plugh"]}"#]));
        let graph = Arc::new(FakeGraph::new());
        let outcome = engine(&llm, &graph, Mode::Themes).answer("xyzzy plugh");

        let PipelineOutcome::NoResult { extraction, issues } = outcome else {
            panic!("expected no result, got {outcome:?}");
        };
        assert_eq!(extraction.len(), 2);
        assert_eq!(issues.len(), 2);
        assert!(graph.queries().is_empty());
        // no synthesis call
        assert_eq!(llm.requests().len(), 1);
    }

    #[test]
    fn zero_facts_synthesizes_from_general_knowledge() {
        let llm = Arc::new(ScriptedChat::new([
            r#"{"themes": ["Photosynthesis"]}"#,
            r#"{"facts": [], "questions": [], "summary": "Not from the graph: plants make sugar."}"#,
        ]));
        let graph = Arc::new(FakeGraph::new().with_hit("Photosynthesis", IdKind::Entity, "Q11982"));
        let outcome = engine(&llm, &graph, Mode::Themes).answer("Photosynthesis");

        let PipelineOutcome::Answered(report) = outcome else {
            panic!("expected an answer, got {outcome:?}");
        };
        assert_eq!(report.source, Source::LlmOnly);
        assert!(report.facts.is_empty());
        assert!(
            llm.requests()[1]
                .user_content()
                .contains("No verified facts were found")
        );
    }

    #[test]
    fn partial_theme_failures_become_issues() {
        let llm = Arc::new(ScriptedChat::new([
            r#"{"themes": ["Deep Learning", "Nonexistent Thing"]}"#,
            "Deep learning is a branch of machine learning.",
        ]));
        let graph = Arc::new(
            FakeGraph::new()
                .with_hit("Deep Learning", IdKind::Entity, "Q197536")
                .with_rows(
                    "wd:Q197536 ",
                    vec![row(&[
                        ("propertyLabel", "subclass of"),
                        ("valueLabel", "machine learning"),
                    ])],
                ),
        );
        let outcome = engine(&llm, &graph, Mode::Themes).answer("deep learning");

        let PipelineOutcome::Answered(report) = outcome else {
            panic!("expected an answer, got {outcome:?}");
        };
        assert_eq!(
            report.facts,
            vec![Fact::new("Deep Learning", "subclass of", "machine learning")]
        );
        assert!(matches!(
            report.issues.as_slice(),
            [PipelineError::ResolutionFailed { term, .. }] if term == "Nonexistent Thing"
        ));
        assert!(report.answer.fallback);
        assert_eq!(
            report.answer.summary,
            "Deep learning is a branch of machine learning."
        );
    }

    #[test]
    fn synthesis_failure_keeps_issues() {
        let llm = Arc::new(ScriptedChat::new([INCEPTION_TRIPLETS]));
        let graph = Arc::new(inception_graph());
        let outcome = engine(&llm, &graph, Mode::Triplets).answer("Who directed Inception?");
        assert!(matches!(
            outcome,
            PipelineOutcome::Failed {
                error: PipelineError::SynthesisFailed { .. },
                ..
            }
        ));
    }

    #[test]
    fn auto_mode_falls_back_to_themes_once() {
        let llm = Arc::new(ScriptedChat::new([
            r#"{"triplets": [{"entity": "Zork", "relation": "director", "object": "?"}]}"#,
            r#"{"themes": ["Inception"]}"#,
            NOLAN_ANSWER,
        ]));
        let graph = Arc::new(
            FakeGraph::new()
                .with_hit("Inception", IdKind::Entity, "Q25188")
                .with_rows(
                    "wd:Q25188 ?p",
                    vec![row(&[
                        ("propertyLabel", "director"),
                        ("valueLabel", "Christopher Nolan"),
                        ("valueDescription", "British-American filmmaker"),
                    ])],
                ),
        );
        let outcome = engine(&llm, &graph, Mode::Auto).answer("Who made Zork?");

        let PipelineOutcome::Answered(report) = outcome else {
            panic!("expected an answer, got {outcome:?}");
        };
        assert!(matches!(report.extraction, Extraction::Themes(_)));
        assert_eq!(report.facts.len(), 1);
        assert_eq!(
            report.facts[0].detail.as_deref(),
            Some("British-American filmmaker")
        );
        // the failed triplet resolution is still reported
        assert!(matches!(
            report.issues.first(),
            Some(PipelineError::ResolutionFailed { term, .. }) if term == "Zork"
        ));
        assert_eq!(llm.requests().len(), 3);
    }

    #[test]
    fn auto_mode_triplet_extraction_failure_is_terminal() {
        let llm = Arc::new(ScriptedChat::new([
            "I'm not sure how to break that down.",
            r#"{"themes": ["Zork"]}"#,
        ]));
        let graph = Arc::new(FakeGraph::new());
        let outcome = engine(&llm, &graph, Mode::Auto).answer("Who made Zork?");
        assert!(matches!(
            outcome,
            PipelineOutcome::Failed {
                error: PipelineError::ExtractionFailed { .. },
                ..
            }
        ));
        // no theme pass after a failed extraction
        assert_eq!(llm.requests().len(), 1);
        assert!(graph.searches().is_empty());
    }

    #[test]
    fn explicit_triplet_mode_does_not_fall_back() {
        let llm = Arc::new(ScriptedChat::new([
            r#"{"triplets": [{"entity": "Zork", "relation": "director", "object": "?"}]}"#,
        ]));
        let graph = Arc::new(FakeGraph::new());
        let outcome = engine(&llm, &graph, Mode::Triplets).answer("Who made Zork?");
        assert!(matches!(outcome, PipelineOutcome::NoResult { .. }));
        assert_eq!(llm.requests().len(), 1);
    }

    #[test]
    fn outcome_serializes_with_tags() {
        let outcome = PipelineOutcome::Failed {
            error: PipelineError::ExtractionFailed {
                reason: "empty".into(),
            },
            issues: vec![PipelineError::ResolutionFailed {
                term: "x".into(),
                kind: IdKind::Entity,
                reason: "no search hits".into(),
            }],
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], "failed");
        assert_eq!(json["error"]["stage"], "extraction_failed");
        assert_eq!(json["issues"][0]["kind"], "entity");
    }
}
