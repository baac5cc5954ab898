//! Inline citation markup.
//!
//! Answers cite evidence as `<cit>SOURCE - ID</cit>`. Source names may
//! themselves contain `" - "`, so the identifier is taken after the last
//! separator.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static CITATION: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"(?s)<cit>(.*?)</cit>"));

/// One `(source, id)` pair cited in an answer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Citation {
    /// Source document name.
    pub source: String,
    /// Evidence identifier.
    pub id: String,
}

impl Citation {
    /// Renders the citation markup.
    #[must_use]
    pub fn render(&self) -> String {
        format!("<cit>{} - {}</cit>", self.source, self.id)
    }
}

/// Extracts citations in order of appearance. Malformed tags are skipped.
#[must_use]
pub fn parse_citations(answer: &str) -> Vec<Citation> {
    let Ok(re) = CITATION.as_ref() else {
        return Vec::new();
    };
    re.captures_iter(answer)
        .filter_map(|caps| {
            let (source, id) = caps[1].rsplit_once(" - ")?;
            let (source, id) = (source.trim(), id.trim());
            (!source.is_empty() && !id.is_empty()).then(|| Citation {
                source: source.to_string(),
                id: id.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_citations() {
        let answer = "Bids close 15 June <cit>City Transit - c-1</cit>, bonds are 5% <cit>City Transit - c-7</cit>.";
        let cites = parse_citations(answer);
        assert_eq!(cites.len(), 2);
        assert_eq!(cites[0].source, "City Transit");
        assert_eq!(cites[1].id, "c-7");
    }

    #[test]
    fn test_source_with_separator() {
        let cites = parse_citations("<cit>Health - Phase 2 - chunk_9</cit>");
        assert_eq!(
            cites,
            vec![Citation {
                source: "Health - Phase 2".to_string(),
                id: "chunk_9".to_string(),
            }]
        );
    }

    #[test]
    fn test_malformed_citations_skipped() {
        assert!(parse_citations("<cit>no separator</cit> <cit> - x</cit> <cit>open").is_empty());
    }

    #[test]
    fn test_render_round_trip() {
        let cite = Citation {
            source: "City Transit".to_string(),
            id: "c-1".to_string(),
        };
        assert_eq!(parse_citations(&cite.render()), vec![cite]);
    }
}
