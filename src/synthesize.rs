//! Answer synthesis: retrieved facts back through the LLM into a study card set.
//!
//! The model is asked for `{"facts": [...], "questions": [...], "summary": "..."}`.
//! Output that does not parse is not an error: the raw text becomes the summary
//! and the answer is flagged as a fallback.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PipelineError;
use crate::llm::json::{Parsed, parse_fenced};
use crate::llm::{ChatBackend, ChatRequest};
use crate::retrieve::Fact;

/// A multiple-choice quiz question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub correct_answer: String,
}

/// The pipeline's final artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesizedAnswer {
    pub summary: String,
    pub facts: Vec<String>,
    pub questions: Vec<QuizQuestion>,
    /// Set when the model's output was not the requested JSON and `summary`
    /// holds its raw text.
    #[serde(default)]
    pub fallback: bool,
}

impl SynthesizedAnswer {
    /// Degraded answer carrying the model's raw text.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self {
            summary: raw.into(),
            facts: Vec::new(),
            questions: Vec::new(),
            fallback: true,
        }
    }
}

#[derive(Deserialize)]
struct RawAnswer {
    #[serde(default, alias = "answer")]
    summary: Option<String>,
    #[serde(default)]
    facts: Vec<Value>,
    #[serde(default)]
    questions: Vec<RawQuestion>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawQuestion {
    Full {
        question: String,
        #[serde(default)]
        options: Vec<Value>,
        #[serde(default, alias = "answer", alias = "correct")]
        correct_answer: Option<Value>,
    },
    Plain(String),
}

const SYSTEM_INSTRUCTION: &str = "You are an educational assistant that turns knowledge-graph facts into study flashcards. \
     Using the facts relevant to the original question:\n\
     1. List the key facts as short, clear sentences.\n\
     2. Write 1-3 multiple-choice questions, each with 3-4 options and the correct answer.\n\
     3. Write a concise summary that answers the question.\n\
     Answer only with a JSON object of this shape:\n\
     {\"facts\": [\"...\"], \"questions\": [{\"question\": \"...\", \"options\": [\"...\"], \"correct_answer\": \"...\"}], \"summary\": \"...\"}";

const NO_FACTS_NOTE: &str = "No verified facts were found in the knowledge graph for this question. \
     Answer from general knowledge, keep the facts list to what you are confident of, \
     and say in the summary that the answer is not backed by the knowledge graph.";

/// Builds the final LLM request and interprets its answer.
pub struct Synthesizer<'a> {
    llm: &'a dyn ChatBackend,
    json_mode: bool,
}

impl<'a> Synthesizer<'a> {
    pub fn new(llm: &'a dyn ChatBackend, json_mode: bool) -> Self {
        Self { llm, json_mode }
    }

    /// Fails only when the LLM produced no text at all.
    pub fn synthesize(
        &self,
        question: &str,
        facts: &[Fact],
    ) -> Result<SynthesizedAnswer, PipelineError> {
        let request = ChatRequest::new(SYSTEM_INSTRUCTION, user_content(question, facts))
            .json(self.json_mode);
        let content = self.llm.complete(&request).map_err(|e| {
            tracing::warn!(error = %e, "synthesis call failed");
            PipelineError::SynthesisFailed {
                reason: e.to_string(),
            }
        })?;

        let answer = interpret(&content);
        if answer.fallback {
            tracing::warn!("synthesis output was not JSON, using raw text as summary");
        } else {
            tracing::info!(
                facts = answer.facts.len(),
                questions = answer.questions.len(),
                "synthesized answer"
            );
        }
        Ok(answer)
    }
}

/// The question followed by the facts as a bullet list, or the no-facts note.
pub fn user_content(question: &str, facts: &[Fact]) -> String {
    let mut content = format!("Original question: {}\n\n", question.trim());
    if facts.is_empty() {
        content.push_str(NO_FACTS_NOTE);
    } else {
        content.push_str("Facts:\n");
        for fact in facts {
            content.push_str("- ");
            content.push_str(&fact.to_string());
            content.push('\n');
        }
    }
    content
}

/// Parse model output into an answer, degrading to the raw text.
pub fn interpret(content: &str) -> SynthesizedAnswer {
    match parse_fenced::<RawAnswer>(content) {
        Parsed::Json(raw) => SynthesizedAnswer {
            summary: raw.summary.unwrap_or_default().trim().to_string(),
            facts: raw.facts.iter().filter_map(text_of).collect(),
            questions: raw.questions.into_iter().filter_map(normalize).collect(),
            fallback: false,
        },
        Parsed::Fallback { raw, .. } => SynthesizedAnswer::from_raw(raw),
    }
}

fn normalize(question: RawQuestion) -> Option<QuizQuestion> {
    let q = match question {
        RawQuestion::Full {
            question,
            options,
            correct_answer,
        } => QuizQuestion {
            question: question.trim().to_string(),
            options: options.iter().filter_map(text_of).collect(),
            correct_answer: correct_answer.as_ref().and_then(text_of).unwrap_or_default(),
        },
        RawQuestion::Plain(question) => QuizQuestion {
            question: question.trim().to_string(),
            options: Vec::new(),
            correct_answer: String::new(),
        },
    };
    (!q.question.is_empty()).then_some(q)
}

fn text_of(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Null => return None,
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedChat;

    #[test]
    fn prose_output_degrades_to_fallback() {
        let llm = ScriptedChat::new(["Paris is a city."]);
        let answer = Synthesizer::new(&llm, true)
            .synthesize("What is Paris?", &[])
            .unwrap();
        assert!(answer.facts.is_empty());
        assert!(answer.questions.is_empty());
        assert_eq!(answer.summary, "Paris is a city.");
        assert!(answer.fallback);
    }

    #[test]
    fn fenced_json_answer_is_parsed() {
        let llm = ScriptedChat::new([r#"```json
{
  "facts": ["Inception's director is Christopher Nolan"],
  "questions": [
    {"question": "Who directed Inception?",
     "options": ["Christopher Nolan", "Denis Villeneuve", "Ridley Scott"],
     "correct_answer": "Christopher Nolan"}
  ],
  "summary": "Inception was directed by Christopher Nolan."
}
```"#]);
        let facts = [Fact::new("Inception", "director", "Christopher Nolan")];
        let answer = Synthesizer::new(&llm, true)
            .synthesize("Who directed Inception?", &facts)
            .unwrap();

        assert!(!answer.fallback);
        assert_eq!(answer.facts, vec!["Inception's director is Christopher Nolan"]);
        assert_eq!(answer.questions.len(), 1);
        assert_eq!(answer.questions[0].options.len(), 3);
        assert_eq!(answer.questions[0].correct_answer, "Christopher Nolan");
        assert!(answer.summary.contains("Christopher Nolan"));

        let request = &llm.requests()[0];
        assert!(request.json_mode);
        assert!(request.user_content().starts_with("Original question: Who directed Inception?"));
        assert!(request.user_content().contains("- Inception director Christopher Nolan"));
    }

    #[test]
    fn legacy_answer_key_and_plain_questions() {
        let answer = interpret(
            r#"{"facts": [], "questions": ["Why?", "  "], "answer": "Because."}"#,
        );
        assert_eq!(answer.summary, "Because.");
        assert_eq!(
            answer.questions,
            vec![QuizQuestion {
                question: "Why?".into(),
                options: vec![],
                correct_answer: String::new(),
            }]
        );
        assert!(!answer.fallback);
    }

    #[test]
    fn non_object_json_is_a_fallback() {
        let answer = interpret("[\"just\", \"a\", \"list\"]");
        assert!(answer.fallback);
        assert_eq!(answer.summary, "[\"just\", \"a\", \"list\"]");
    }

    #[test]
    fn empty_fact_list_uses_the_no_facts_prompt() {
        let content = user_content("Who directed Inception?", &[]);
        assert!(content.contains("No verified facts were found"));
        assert!(!content.contains("Facts:"));
    }

    #[test]
    fn unreachable_llm_is_synthesis_failure() {
        let llm = ScriptedChat::failing();
        let result = Synthesizer::new(&llm, true).synthesize("q", &[]);
        assert!(matches!(result, Err(PipelineError::SynthesisFailed { .. })));
    }

    #[test]
    fn numeric_options_are_stringified() {
        let answer = interpret(
            r#"{"summary": "s", "questions": [{"question": "Year?", "options": [1999, 2003], "answer": 1999}]}"#,
        );
        assert_eq!(answer.questions[0].options, vec!["1999", "2003"]);
        assert_eq!(answer.questions[0].correct_answer, "1999");
    }
}
