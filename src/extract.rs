//! Theme and triplet extraction: free text to graph-ready terms.
//!
//! Two modes share one entry point, [`Extractor::extract`]:
//! - **themes**: up to N concept strings, the dominant theme first;
//! - **triplets**: an ordered chain of `(entity, relation, object)` hops.
//!
//! Every failure (transport, unparsable output, nothing usable) is reported as
//! [`PipelineError::ExtractionFailed`].

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{Mode, PipelineConfig};
use crate::error::PipelineError;
use crate::identifier::Identifier;
use crate::llm::json::{Parsed, parse_fenced, take_list};
use crate::llm::{ChatBackend, ChatRequest};
use crate::patterns;

/// Leading marker of an ungrounded slot (`?`, `?x`, `?director`).
pub const PLACEHOLDER: char = '?';

/// One reasoning step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Triplet {
    /// Free-text name or canonical id. `None` means "the previous hop's answer".
    pub subject: Option<String>,
    /// Free-text property label or canonical property id.
    pub relation: String,
    /// Known object, if the model grounded it.
    pub object: Option<String>,
}

impl Triplet {
    /// A lookup of `relation` on a named subject with an unknown object.
    pub fn lookup(subject: &str, relation: Identifier) -> Self {
        Self {
            subject: Some(subject.to_string()),
            relation: relation.to_string(),
            object: None,
        }
    }
}

/// What the extractor produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", content = "items", rename_all = "lowercase")]
pub enum Extraction {
    Themes(Vec<String>),
    Triplets(Vec<Triplet>),
}

impl Extraction {
    pub fn len(&self) -> usize {
        match self {
            Self::Themes(t) => t.len(),
            Self::Triplets(t) => t.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Deserialize)]
struct RawTriplet {
    #[serde(default, alias = "subject")]
    entity: Option<Value>,
    #[serde(default, alias = "predicate", alias = "property")]
    relation: Option<Value>,
    #[serde(default)]
    object: Option<Value>,
}

fn themes_instruction(max: usize) -> String {
    format!(
        "Extract a list of up to {max} related high-level topics (themes) from the prompt. \
         The first item must be the theme the prompt is about. \
         Focus on real-world concepts such as fields (e.g., Artificial Intelligence), \
         methods (e.g., Convolutional Neural Networks), or technologies (e.g., Deep Learning). \
         Answer with a JSON object {{\"themes\": [\"...\"]}} and nothing else. \
         No explanations or markdown."
    )
}

const TRIPLETS_INSTRUCTION: &str = "Decompose the question into the chain of Wikidata lookups needed to answer it. \
     Answer with a JSON object {\"triplets\": [{\"entity\": \"...\", \"relation\": \"...\", \"object\": \"...\"}]} and nothing else. \
     \"entity\" is the Wikidata item name (or Q-id) the step starts from; \
     \"relation\" is the Wikidata property label (or P-id); \
     \"object\" is the value if you are certain of it, otherwise \"?\". \
     When a step starts from the previous step's answer, use \"?\" as its entity. \
     Use as few steps as possible. No explanations or markdown.";

/// Calls the LLM to turn a question into themes or triplets.
pub struct Extractor<'a> {
    llm: &'a dyn ChatBackend,
    max_themes: usize,
    json_mode: bool,
    patterns: bool,
}

impl<'a> Extractor<'a> {
    pub fn new(llm: &'a dyn ChatBackend, settings: &PipelineConfig, json_mode: bool) -> Self {
        Self {
            llm,
            max_themes: settings.max_themes,
            json_mode,
            patterns: settings.patterns,
        }
    }

    /// Extract in `mode`; `Auto` picks triplets for factual questions.
    pub fn extract(&self, text: &str, mode: Mode) -> Result<Extraction, PipelineError> {
        match mode {
            Mode::Themes => self.themes(text).map(Extraction::Themes),
            Mode::Triplets => self.triplets(text).map(Extraction::Triplets),
            Mode::Auto if patterns::looks_factual(text) => {
                self.triplets(text).map(Extraction::Triplets)
            }
            Mode::Auto => self.themes(text).map(Extraction::Themes),
        }
    }

    /// Ordered, de-duplicated themes, at most `max_themes`.
    pub fn themes(&self, text: &str) -> Result<Vec<String>, PipelineError> {
        let items = self.ask_for_list(themes_instruction(self.max_themes), text, "themes")?;

        let mut seen = HashSet::new();
        let themes: Vec<String> = items
            .iter()
            .filter_map(scalar_text)
            .filter(|t| seen.insert(t.to_lowercase()))
            .take(self.max_themes)
            .collect();

        if themes.is_empty() {
            return Err(failed("the model returned no themes"));
        }
        tracing::info!(count = themes.len(), ?themes, "extracted themes");
        Ok(themes)
    }

    /// The hop chain, with ungrounded hops removed.
    pub fn triplets(&self, text: &str) -> Result<Vec<Triplet>, PipelineError> {
        if self.patterns {
            if let Some(triplet) = patterns::match_question(text) {
                tracing::info!(?triplet, "question matched a fixed pattern");
                return Ok(vec![triplet]);
            }
        }

        let items = self.ask_for_list(TRIPLETS_INSTRUCTION.to_string(), text, "triplets")?;
        let raw: Vec<RawTriplet> = items
            .into_iter()
            .filter_map(|item| match serde_json::from_value(item) {
                Ok(t) => Some(t),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping malformed triplet");
                    None
                }
            })
            .collect();

        let triplets = ground_chain(raw);
        if triplets.is_empty() {
            return Err(failed("the model returned no grounded triplets"));
        }
        tracing::info!(count = triplets.len(), ?triplets, "extracted triplets");
        Ok(triplets)
    }

    fn ask_for_list(
        &self,
        instruction: String,
        text: &str,
        key: &str,
    ) -> Result<Vec<Value>, PipelineError> {
        let request = ChatRequest::new(instruction, text).json(self.json_mode);
        let content = self
            .llm
            .complete(&request)
            .map_err(|e| failed(&e.to_string()))?;

        match parse_fenced::<Value>(&content) {
            Parsed::Json(value) => {
                take_list(value, key).ok_or_else(|| failed(&format!("no JSON list of {key}")))
            }
            Parsed::Fallback { error, .. } => {
                Err(failed(&format!("output is not JSON: {error}")))
            }
        }
    }
}

/// Drop hops that cannot be grounded.
///
/// A placeholder relation drops the hop. A placeholder entity is allowed only
/// after an earlier hop was kept, in which case the hop chains from it.
fn ground_chain(raw: Vec<RawTriplet>) -> Vec<Triplet> {
    let mut chain: Vec<Triplet> = Vec::new();
    for hop in raw {
        let Some(relation) = hop.relation.as_ref().and_then(grounded) else {
            tracing::warn!("dropping hop with ungrounded relation");
            continue;
        };
        let subject = hop.entity.as_ref().and_then(grounded);
        if subject.is_none() && chain.is_empty() {
            tracing::warn!(relation = %relation, "dropping leading hop with ungrounded entity");
            continue;
        }
        chain.push(Triplet {
            subject,
            relation,
            object: hop.object.as_ref().and_then(grounded),
        });
    }
    chain
}

fn grounded(value: &Value) -> Option<String> {
    scalar_text(value).filter(|s| !s.starts_with(PLACEHOLDER))
}

fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn failed(reason: &str) -> PipelineError {
    PipelineError::ExtractionFailed {
        reason: reason.to_string(),
    }
}
