use kbrag_core::agent::CompiledAgentConfig;
use kbrag_core::types::QueryTerms;
use kbrag_text::tokenize;

/// Expands queries through the agent's synonym groups. A group fires when
/// any member (single word or phrase) occurs in the query; every other
/// member's terms are then added as expansion terms.
#[derive(Debug, Clone, Default)]
pub struct QueryExpander {
    /// Each group as tokenized members.
    groups: Vec<Vec<Vec<String>>>,
}

impl QueryExpander {
    pub fn new(agent: &CompiledAgentConfig) -> Self {
        let groups = agent
            .synonym_groups()
            .iter()
            .map(|group| group.iter().map(|m| tokenize(m)).filter(|t| !t.is_empty()).collect())
            .collect();
        Self { groups }
    }

    pub fn expand(&self, query: &str) -> QueryTerms {
        let literal = tokenize(query);
        let mut terms = QueryTerms::new(query.trim().to_lowercase(), literal);
        for group in &self.groups {
            if !group.iter().any(|member| contains_phrase(&terms.literal, member)) {
                continue;
            }
            for term in group.iter().flatten() {
                if !terms.literal.contains(term) && !terms.expanded.contains(term) {
                    terms.expanded.push(term.clone());
                }
            }
        }
        terms
    }
}

fn contains_phrase(haystack: &[String], phrase: &[String]) -> bool {
    !phrase.is_empty() && haystack.windows(phrase.len()).any(|w| w == phrase)
}
