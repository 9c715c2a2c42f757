//! Canonical Wikidata identifiers: entities (`Q42`) and properties (`P57`).

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Serialize, Serializer};

/// Wikidata ids never carry leading zeros, so `Q007` is not one.
static CANONICAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[PQ][1-9]\d*$").expect("static regex"));

/// Which identifier space a term belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IdKind {
    /// An item (`Q…`).
    Entity,
    /// A property (`P…`).
    Property,
}

impl IdKind {
    /// Value of the `type` parameter for `wbsearchentities`.
    pub fn search_type(self) -> &'static str {
        match self {
            Self::Entity => "item",
            Self::Property => "property",
        }
    }

    fn prefix(self) -> char {
        match self {
            Self::Entity => 'Q',
            Self::Property => 'P',
        }
    }
}

impl fmt::Display for IdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entity => f.write_str("entity"),
            Self::Property => f.write_str("property"),
        }
    }
}

/// A canonical graph identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Identifier {
    kind: IdKind,
    number: u64,
}

impl Identifier {
    pub fn entity(number: u64) -> Self {
        Self {
            kind: IdKind::Entity,
            number,
        }
    }

    pub fn property(number: u64) -> Self {
        Self {
            kind: IdKind::Property,
            number,
        }
    }

    /// Parse a term that is already canonical (`Q<digits>` / `P<digits>`).
    ///
    /// Surrounding whitespace is ignored; anything else (lowercase prefix,
    /// `wd:` prefixes, trailing text) is not canonical.
    pub fn parse_canonical(term: &str) -> Option<Self> {
        let term = term.trim();
        if !CANONICAL.is_match(term) {
            return None;
        }
        let kind = if term.starts_with('Q') {
            IdKind::Entity
        } else {
            IdKind::Property
        };
        let number = term[1..].parse().ok()?;
        Some(Self { kind, number })
    }

    /// Parse the last path segment of an entity IRI such as
    /// `http://www.wikidata.org/entity/Q42`.
    pub fn from_iri(iri: &str) -> Option<Self> {
        iri.rsplit('/').next().and_then(Self::parse_canonical)
    }

    pub fn kind(&self) -> IdKind {
        self.kind
    }

    pub fn number(&self) -> u64 {
        self.number
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.prefix(), self.number)
    }
}

impl FromStr for Identifier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_canonical(s).ok_or_else(|| format!("not a canonical identifier: {s:?}"))
    }
}

impl Serialize for Identifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Whether a string looks like a bare canonical id (unlabeled graph value).
pub fn is_canonical(term: &str) -> bool {
    CANONICAL.is_match(term.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_entities_and_properties() {
        let q = Identifier::parse_canonical("Q25188").unwrap();
        assert_eq!(q.kind(), IdKind::Entity);
        assert_eq!(q.number(), 25188);
        assert_eq!(q.to_string(), "Q25188");

        let p: Identifier = "P57".parse().unwrap();
        assert_eq!(p, Identifier::property(57));
    }

    #[test]
    fn rejects_non_canonical_terms() {
        for term in ["Inception", "q42", "Q", "Q42x", "wd:Q42", "P-5", ""] {
            assert!(Identifier::parse_canonical(term).is_none(), "{term}");
        }
    }

    #[test]
    fn leading_zeros_are_not_canonical() {
        for term in ["Q007", "P057", "Q0"] {
            assert!(!is_canonical(term), "{term}");
            assert!(Identifier::parse_canonical(term).is_none(), "{term}");
        }
    }

    #[test]
    fn canonical_text_survives_parse_and_display() {
        for term in ["Q42", "P57", "Q25188", "P1082"] {
            assert_eq!(Identifier::parse_canonical(term).unwrap().to_string(), term);
        }
    }

    #[test]
    fn overflowing_number_is_not_canonical() {
        assert!(Identifier::parse_canonical("Q99999999999999999999999").is_none());
    }

    #[test]
    fn extracts_identifier_from_entity_iri() {
        let id = Identifier::from_iri("http://www.wikidata.org/entity/Q42").unwrap();
        assert_eq!(id, Identifier::entity(42));
        assert!(Identifier::from_iri("http://example.org/thing").is_none());
    }

    #[test]
    fn serializes_as_plain_string() {
        let json = serde_json::to_string(&Identifier::property(161)).unwrap();
        assert_eq!(json, "\"P161\"");
    }
}
