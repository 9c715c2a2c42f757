//! SPARQL query text for the Wikidata query service.
//!
//! All identifiers are interpolated from [`Identifier`] values, and the
//! language tag is validated by the config, so no user text reaches a query.

use crate::identifier::Identifier;

/// Variables bound by [`theme_facts`].
pub mod theme_vars {
    pub const PROPERTY_LABEL: &str = "propertyLabel";
    pub const VALUE_LABEL: &str = "valueLabel";
    pub const VALUE_DESCRIPTION: &str = "valueDescription";
}

/// Variables bound by [`hop`].
pub mod hop_vars {
    pub const ITEM: &str = "item";
    pub const ITEM_LABEL: &str = "itemLabel";
    pub const DIRECTION: &str = "direction";
    pub const FORWARD: &str = "forward";
    pub const REVERSE: &str = "reverse";
}

/// Top-`limit` statements about `subject`, one sampled value per property,
/// with English labels and an optional value description.
pub fn theme_facts(subject: Identifier, language: &str, limit: usize) -> String {
    format!(
        r#"SELECT ?propertyLabel (SAMPLE(?valLabel) AS ?valueLabel) (SAMPLE(?valDescription) AS ?valueDescription) WHERE {{
  wd:{subject} ?p ?statement .
  ?statement ?ps ?value .
  ?property wikibase:claim ?p ;
            wikibase:statementProperty ?ps .
  OPTIONAL {{
    ?value schema:description ?valDescription .
    FILTER(LANG(?valDescription) = "{language}")
  }}
  SERVICE wikibase:label {{
    bd:serviceParam wikibase:language "{language}" .
    ?property rdfs:label ?propertyLabel .
    ?value rdfs:label ?valLabel .
  }}
}}
GROUP BY ?propertyLabel
LIMIT {limit}"#
    )
}

/// One multi-hop step: values reachable from `subject` through `property`
/// in either direction.
///
/// The forward branch finds what `subject` has (`Inception director ?item`),
/// the reverse branch what has `subject` (`?item director Nolan`).
pub fn hop(subject: Identifier, property: Identifier, language: &str, limit: usize) -> String {
    format!(
        r#"SELECT ?item ?itemLabel ?direction WHERE {{
  {{
    wd:{subject} wdt:{property} ?item .
    BIND("forward" AS ?direction)
  }}
  UNION
  {{
    ?item wdt:{property} wd:{subject} .
    BIND("reverse" AS ?direction)
  }}
  SERVICE wikibase:label {{ bd:serviceParam wikibase:language "{language}" . }}
}}
LIMIT {limit}"#
    )
}

/// The label of an entity or property.
pub fn label(id: Identifier, language: &str) -> String {
    format!(
        r#"SELECT ?label WHERE {{
  wd:{id} rdfs:label ?label .
  FILTER(LANG(?label) = "{language}")
}}
LIMIT 1"#
    )
}
