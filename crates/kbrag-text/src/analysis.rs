/// English stop words dropped by `tokenize`.
pub const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is", "it", "its", "of", "on",
    "that", "the", "to", "was", "will", "with", "or", "but", "not", "this", "these", "they", "them", "their", "there",
    "then", "than", "so", "if", "when", "where", "why", "how", "what", "which", "who", "whom", "whose", "can", "could",
    "should", "would", "may", "might", "must", "shall", "do", "does", "did", "have", "had", "having",
];

pub fn is_stop_word(term: &str) -> bool {
    STOP_WORDS.contains(&term)
}

/// Lower-cased alphanumeric runs with stop words removed.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .filter(|t| !is_stop_word(t))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_punctuation_and_drops_stop_words() {
        assert_eq!(tokenize("What is the typical CPM for Retail-display?"), vec!["typical", "cpm", "retail", "display"]);
    }

    #[test]
    fn keeps_numbers() {
        assert_eq!(tokenize("$8-15 CTR 0.9%"), vec!["8", "15", "ctr", "0", "9"]);
    }

    #[test]
    fn empty_input() {
        assert!(tokenize("  ,.; ").is_empty());
    }
}
