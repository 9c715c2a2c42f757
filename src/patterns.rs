//! Fixed question patterns that map straight to a one-hop triplet.
//!
//! Covers the film questions the LLM would otherwise be asked to decompose
//! ("Who is the director of Inception", "Inception released in ..."). The
//! relation word maps to a property id through [`RELATION_MAP`], so neither
//! the LLM nor the property search is needed.

use std::sync::LazyLock;

use regex::Regex;

use crate::extract::Triplet;
use crate::identifier::Identifier;

/// Relation keywords and the Wikidata property they denote.
///
/// Keys are stems matched as substrings, so verb forms map too:
/// `directed` and `director` both contain `direct`, `starred` contains `star`.
pub const RELATION_MAP: [(&str, u64); 7] = [
    ("direct", 57),
    ("star", 161),
    ("cast", 161),
    ("actor", 161),
    ("release", 577),
    ("date", 577),
    ("year", 577),
];

/// `instance of`, used when a relation word has no mapping.
pub const FALLBACK_PROPERTY: u64 = 31;

static PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s]").expect("static regex"));

static RELATION_OF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:who|what)\s+(?:is|are|was|were)\s+(?:the\s+)?(director|star|cast|release date)s?\s+of\s+(.+)",
    )
    .expect("static regex")
});

static SUBJECT_VERB: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(.*?)\s+(directed|starred|stars?|released)(?:\s+(?:by|in|on)\b.*)?$")
        .expect("static regex")
});

const WH_WORDS: [&str; 7] = ["who", "what", "which", "when", "where", "how", "whom"];
const AUXILIARIES: [&str; 6] = ["is", "are", "was", "were", "has", "had"];

/// Property for a relation word, falling back to `instance of`.
pub fn relation_for(word: &str) -> Identifier {
    let word = word.to_lowercase();
    RELATION_MAP
        .iter()
        .find(|(key, _)| word.contains(key))
        .map(|(_, p)| Identifier::property(*p))
        .unwrap_or(Identifier::property(FALLBACK_PROPERTY))
}

/// Try the fixed patterns against a question.
pub fn match_question(question: &str) -> Option<Triplet> {
    let clean = PUNCTUATION.replace_all(question.trim(), "");
    let clean = clean.trim();

    if let Some(caps) = RELATION_OF.captures(clean) {
        let entity = caps[2].trim();
        if !entity.is_empty() {
            return Some(Triplet::lookup(entity, relation_for(&caps[1])));
        }
    }

    if let Some(caps) = SUBJECT_VERB.captures(clean) {
        let entity = strip_trailing_auxiliary(caps[1].trim());
        let first = entity
            .split_whitespace()
            .next()
            .map(str::to_lowercase)
            .unwrap_or_default();
        if !entity.is_empty() && !WH_WORDS.contains(&first.as_str()) {
            return Some(Triplet::lookup(entity, relation_for(&caps[2])));
        }
    }

    None
}

/// Whether a question reads like a single factual lookup rather than a topic.
pub fn looks_factual(question: &str) -> bool {
    let first = question
        .split_whitespace()
        .next()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .unwrap_or_default();
    WH_WORDS.contains(&first.as_str()) || match_question(question).is_some()
}

fn strip_trailing_auxiliary(entity: &str) -> &str {
    match entity.rsplit_once(char::is_whitespace) {
        Some((head, last)) if AUXILIARIES.contains(&last.to_lowercase().as_str()) => head.trim(),
        _ => entity,
    }
}
