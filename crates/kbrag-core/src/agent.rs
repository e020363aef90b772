//! Per-agent RAG configuration.
//!
//! `AgentRagConfig` is the plain data an agent ships with (usually a TOML or
//! JSON file). `CompiledAgentConfig` validates it once, compiles the regex
//! tables and is then shared read-only by the chunker, the query expander
//! and the engine. Swapping agents means swapping the compiled object.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::{DocumentPurpose, DocumentType};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentRagConfig {
    pub agent_id: String,
    pub kb_path: String,
    pub excluded_files: Vec<String>,
    pub deprioritized_files: Vec<String>,
    /// Canonical term -> variants. Expansion is symmetric.
    pub synonym_mappings: BTreeMap<String, Vec<String>>,
    /// Document type name -> regexes matched against filename, then content.
    pub document_type_patterns: BTreeMap<String, Vec<String>>,
    /// Purpose name -> regexes matched against the filename.
    pub document_purpose_patterns: BTreeMap<String, Vec<String>>,
    /// Topic label -> case-insensitive keywords.
    pub topic_keywords: BTreeMap<String, Vec<String>>,
    /// Workflow step number (as a string key) -> keywords.
    pub step_keywords: BTreeMap<String, Vec<String>>,
    pub vertical_patterns: BTreeMap<String, Vec<String>>,
    pub metric_patterns: BTreeMap<String, Vec<String>>,
}

impl AgentRagConfig {
    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        use figment::providers::{Format, Toml};
        if !path.exists() {
            return Err(Error::NotFound(format!("agent config {}", path.display())));
        }
        let cfg = figment::Figment::new().merge(Toml::file(path)).extract()?;
        Ok(cfg)
    }
}

#[derive(Debug)]
pub struct CompiledAgentConfig {
    config: AgentRagConfig,
    excluded: HashSet<String>,
    deprioritized: HashSet<String>,
    document_types: Vec<(DocumentType, Vec<Regex>)>,
    purposes: Vec<(DocumentPurpose, Vec<Regex>)>,
    topics: Vec<(String, Vec<String>)>,
    steps: Vec<(u32, Vec<String>)>,
    verticals: Vec<(String, Vec<Regex>)>,
    metrics: Vec<(String, Vec<Regex>)>,
    synonym_groups: Vec<Vec<String>>,
}

impl CompiledAgentConfig {
    /// Validate and compile. Any malformed field is a `Configuration` error.
    pub fn new(config: AgentRagConfig) -> Result<Self> {
        if config.kb_path.trim().is_empty() {
            return Err(Error::config(format!("agent '{}' has an empty kb_path", config.agent_id)));
        }

        let mut document_types = Vec::new();
        for (name, patterns) in &config.document_type_patterns {
            document_types.push((name.parse::<DocumentType>()?, compile_all(name, patterns)?));
        }
        document_types.sort_by_key(|(t, _)| *t);

        let mut purposes = Vec::new();
        for (name, patterns) in &config.document_purpose_patterns {
            purposes.push((name.parse::<DocumentPurpose>()?, compile_all(name, patterns)?));
        }
        purposes.sort_by_key(|(p, _)| *p);

        let mut steps = Vec::new();
        for (key, keywords) in &config.step_keywords {
            let step = key
                .trim()
                .parse::<u32>()
                .map_err(|_| Error::config(format!("step key '{key}' is not a non-negative integer")))?;
            steps.push((step, lowercase_keywords(keywords)));
        }

        let topics = config
            .topic_keywords
            .iter()
            .map(|(topic, keywords)| (topic.clone(), lowercase_keywords(keywords)))
            .collect();

        let verticals = config
            .vertical_patterns
            .iter()
            .map(|(name, patterns)| Ok((name.clone(), compile_all(name, patterns)?)))
            .collect::<Result<Vec<_>>>()?;
        let metrics = config
            .metric_patterns
            .iter()
            .map(|(name, patterns)| Ok((name.clone(), compile_all(name, patterns)?)))
            .collect::<Result<Vec<_>>>()?;

        let mut synonym_groups = Vec::new();
        for (canonical, variants) in &config.synonym_mappings {
            let canonical = canonical.trim().to_lowercase();
            if canonical.is_empty() {
                return Err(Error::config("synonym_mappings contains an empty canonical term"));
            }
            let mut group = vec![canonical];
            for v in lowercase_keywords(variants) {
                if !group.contains(&v) {
                    group.push(v);
                }
            }
            if group.len() > 1 {
                synonym_groups.push(group);
            }
        }

        let excluded = config.excluded_files.iter().map(|f| f.to_lowercase()).collect();
        let deprioritized = config.deprioritized_files.iter().map(|f| f.to_lowercase()).collect();
        debug!(
            agent = %config.agent_id,
            document_types = document_types.len(),
            synonym_groups = synonym_groups.len(),
            "agent configuration compiled"
        );

        Ok(Self {
            config,
            excluded,
            deprioritized,
            document_types,
            purposes,
            topics,
            steps,
            verticals,
            metrics,
            synonym_groups,
        })
    }

    pub fn config(&self) -> &AgentRagConfig {
        &self.config
    }

    pub fn agent_id(&self) -> &str {
        &self.config.agent_id
    }

    pub fn kb_path(&self) -> &str {
        &self.config.kb_path
    }

    pub fn is_excluded(&self, filename: &str) -> bool {
        matches_file_list(&self.excluded, filename)
    }

    pub fn is_deprioritized(&self, filename: &str) -> bool {
        matches_file_list(&self.deprioritized, filename)
    }

    /// Filename patterns take precedence over content patterns; within each
    /// pass the first type in declaration order wins.
    pub fn document_type(&self, filename: &str, content: &str) -> DocumentType {
        let by_name = self
            .document_types
            .iter()
            .find(|(_, patterns)| patterns.iter().any(|re| re.is_match(filename)));
        let by_content = || {
            self.document_types
                .iter()
                .find(|(_, patterns)| patterns.iter().any(|re| re.is_match(content)))
        };
        by_name
            .or_else(by_content)
            .map(|(t, _)| *t)
            .unwrap_or(DocumentType::General)
    }

    pub fn document_purpose(&self, filename: &str) -> DocumentPurpose {
        self.purposes
            .iter()
            .find(|(_, patterns)| patterns.iter().any(|re| re.is_match(filename)))
            .map(|(p, _)| *p)
            .unwrap_or_default()
    }

    /// `content_lower` must already be lower-cased.
    pub fn topics(&self, content_lower: &str) -> BTreeSet<String> {
        self.topics
            .iter()
            .filter(|(_, keywords)| keywords.iter().any(|k| content_lower.contains(k.as_str())))
            .map(|(topic, _)| topic.clone())
            .collect()
    }

    /// `content_lower` must already be lower-cased.
    pub fn steps(&self, content_lower: &str) -> BTreeSet<u32> {
        self.steps
            .iter()
            .filter(|(_, keywords)| keywords.iter().any(|k| content_lower.contains(k.as_str())))
            .map(|(step, _)| *step)
            .collect()
    }

    pub fn verticals(&self, content: &str) -> BTreeSet<String> {
        matching_names(&self.verticals, content)
    }

    pub fn metrics(&self, content: &str) -> BTreeSet<String> {
        matching_names(&self.metrics, content)
    }

    /// Lower-cased synonym groups; every member expands to all others.
    pub fn synonym_groups(&self) -> &[Vec<String>] {
        &self.synonym_groups
    }
}

fn compile_all(name: &str, patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            RegexBuilder::new(p)
                .case_insensitive(true)
                .build()
                .map_err(|e| Error::config(format!("invalid pattern '{p}' for '{name}': {e}")))
        })
        .collect()
}

fn lowercase_keywords(keywords: &[String]) -> Vec<String> {
    keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}

fn matching_names(table: &[(String, Vec<Regex>)], content: &str) -> BTreeSet<String> {
    table
        .iter()
        .filter(|(_, patterns)| patterns.iter().any(|re| re.is_match(content)))
        .map(|(name, _)| name.clone())
        .collect()
}

/// Entries match either the KB-relative path or the bare file name.
fn matches_file_list(list: &HashSet<String>, filename: &str) -> bool {
    let lower = filename.to_lowercase();
    if list.contains(&lower) {
        return true;
    }
    Path::new(&lower)
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|base| list.contains(base))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AgentRagConfig {
        let mut cfg = AgentRagConfig {
            agent_id: "mpa".into(),
            kb_path: "kb/mpa".into(),
            excluded_files: vec!["Draft_Notes.txt".into()],
            deprioritized_files: vec!["legacy_benchmarks.txt".into()],
            ..Default::default()
        };
        cfg.document_type_patterns.insert("benchmark".into(), vec!["benchmark".into()]);
        cfg.document_type_patterns.insert("playbook".into(), vec!["playbook".into()]);
        cfg.document_purpose_patterns.insert("definitive".into(), vec!["^core_".into()]);
        cfg.document_purpose_patterns.insert("example".into(), vec!["example".into()]);
        cfg.topic_keywords.insert("budget".into(), vec!["Budget".into(), "spend".into()]);
        cfg.step_keywords.insert("3".into(), vec!["channel mix".into()]);
        cfg.vertical_patterns.insert("RETAIL".into(), vec![r"\bretail\b".into()]);
        cfg.metric_patterns.insert("CPM".into(), vec![r"\bcpm\b".into()]);
        cfg.synonym_mappings.insert("cpm".into(), vec!["cost per mille".into(), "CPM ".into()]);
        cfg
    }

    #[test]
    fn compiles_and_matches_tables() {
        let agent = CompiledAgentConfig::new(sample()).expect("compile");
        let text = "Retail budget guidance: typical CPM ranges for the channel mix step";
        let lower = text.to_lowercase();
        assert_eq!(agent.topics(&lower).into_iter().collect::<Vec<_>>(), vec!["budget"]);
        assert_eq!(agent.steps(&lower).into_iter().collect::<Vec<_>>(), vec![3]);
        assert!(agent.verticals(text).contains("RETAIL"));
        assert!(agent.metrics(text).contains("CPM"));
    }

    #[test]
    fn file_lists_match_basename_case_insensitively() {
        let agent = CompiledAgentConfig::new(sample()).expect("compile");
        assert!(agent.is_excluded("draft_notes.txt"));
        assert!(agent.is_excluded("sub/dir/Draft_Notes.txt"));
        assert!(!agent.is_excluded("notes.txt"));
        assert!(agent.is_deprioritized("legacy_benchmarks.txt"));
    }

    #[test]
    fn filename_type_wins_over_content() {
        let agent = CompiledAgentConfig::new(sample()).expect("compile");
        assert_eq!(agent.document_type("retail_playbook.md", "benchmark table"), DocumentType::Playbook);
        assert_eq!(agent.document_type("notes.md", "benchmark table"), DocumentType::Benchmark);
        assert_eq!(agent.document_type("notes.md", "nothing here"), DocumentType::General);
    }

    #[test]
    fn purpose_defaults_to_reference() {
        let agent = CompiledAgentConfig::new(sample()).expect("compile");
        assert_eq!(agent.document_purpose("core_rules.md"), DocumentPurpose::Definitive);
        assert_eq!(agent.document_purpose("worked_example.md"), DocumentPurpose::Example);
        assert_eq!(agent.document_purpose("misc.md"), DocumentPurpose::Reference);
    }

    #[test]
    fn synonym_groups_are_normalized() {
        let agent = CompiledAgentConfig::new(sample()).expect("compile");
        assert_eq!(agent.synonym_groups(), &[vec!["cpm".to_string(), "cost per mille".to_string()]]);
    }

    #[test]
    fn rejects_malformed_fields() {
        let mut cfg = sample();
        cfg.kb_path = " ".into();
        assert!(matches!(CompiledAgentConfig::new(cfg), Err(Error::Configuration(_))));

        let mut cfg = sample();
        cfg.step_keywords.insert("three".into(), vec!["x".into()]);
        assert!(CompiledAgentConfig::new(cfg).is_err());

        let mut cfg = sample();
        cfg.vertical_patterns.insert("BAD".into(), vec!["(".into()]);
        assert!(CompiledAgentConfig::new(cfg).is_err());

        let mut cfg = sample();
        cfg.document_type_patterns.insert("spreadsheet".into(), vec!["xls".into()]);
        assert!(CompiledAgentConfig::new(cfg).is_err());
    }

    #[test]
    fn parses_from_json() {
        let json = r#"{"agent_id":"ca","kb_path":"kb/ca","excluded_files":["a.txt"]}"#;
        let cfg = AgentRagConfig::from_json_str(json).expect("json");
        assert_eq!(cfg.agent_id, "ca");
        assert_eq!(cfg.excluded_files, vec!["a.txt"]);
        assert!(cfg.synonym_mappings.is_empty());
    }
}
