//! In-process fakes for the LLM and graph backends, used by unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::error::{GraphError, GraphResult};
use crate::graph::{GraphBackend, Row, SearchHit};
use crate::identifier::IdKind;
use crate::llm::{ChatBackend, ChatRequest, LlmError, LlmResult};

/// Replies with canned completions in order, recording every request.
/// Once the script runs out, every call fails as unreachable.
pub struct ScriptedChat {
    replies: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedChat {
    pub fn new<'a>(replies: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(String::from).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self::new([])
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl ChatBackend for ScriptedChat {
    fn complete(&self, request: &ChatRequest) -> LlmResult<String> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LlmError::Unavailable {
                url: "scripted://chat".into(),
                message: "no scripted reply left".into(),
            })
    }
}

enum Canned {
    Rows(Vec<Row>),
    Fail,
}

/// Graph fake: search hits by `(lowercased term, kind)`, query answers by
/// substring match on the query text. Unmatched queries return no rows.
#[derive(Default)]
pub struct FakeGraph {
    hits: HashMap<(String, IdKind), Vec<String>>,
    failing_terms: Vec<String>,
    answers: Vec<(String, Canned)>,
    searches: Mutex<Vec<(String, IdKind)>>,
    queries: Mutex<Vec<String>>,
}

impl FakeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hit(mut self, term: &str, kind: IdKind, id: &str) -> Self {
        self.hits
            .entry((term.to_lowercase(), kind))
            .or_default()
            .push(id.to_string());
        self
    }

    pub fn with_failing_search(mut self, term: &str) -> Self {
        self.failing_terms.push(term.to_lowercase());
        self
    }

    pub fn with_rows(mut self, needle: &str, rows: Vec<Row>) -> Self {
        self.answers.push((needle.to_string(), Canned::Rows(rows)));
        self
    }

    pub fn with_failing_query(mut self, needle: &str) -> Self {
        self.answers.push((needle.to_string(), Canned::Fail));
        self
    }

    pub fn searches(&self) -> Vec<(String, IdKind)> {
        self.searches.lock().unwrap().clone()
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

impl GraphBackend for FakeGraph {
    fn search(&self, term: &str, kind: IdKind) -> GraphResult<Vec<SearchHit>> {
        self.searches.lock().unwrap().push((term.to_string(), kind));
        let key = term.to_lowercase();
        if self.failing_terms.contains(&key) {
            return Err(GraphError::Transport {
                url: "fake://search".into(),
                message: "connection reset".into(),
            });
        }
        Ok(self
            .hits
            .get(&(key, kind))
            .map(|ids| {
                ids.iter()
                    .map(|id| SearchHit {
                        id: id.clone(),
                        label: Some(term.to_string()),
                        description: None,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    fn select(&self, query: &str) -> GraphResult<Vec<Row>> {
        self.queries.lock().unwrap().push(query.to_string());
        match self.answers.iter().find(|(needle, _)| query.contains(needle)) {
            Some((_, Canned::Rows(rows))) => Ok(rows.clone()),
            Some((_, Canned::Fail)) => Err(GraphError::Status {
                url: "fake://sparql".into(),
                status: 500,
            }),
            None => Ok(Vec::new()),
        }
    }
}

/// Build a result row from `(variable, value)` pairs.
pub fn row(pairs: &[(&str, &str)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
