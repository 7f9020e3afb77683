use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z][A-Za-z'-]*").unwrap());

/// One lexicon entry: the canonical term, accepted aliases, the topical
/// domain it belongs to, and an optional one-line gloss used by knowledge
/// enrichment.
#[derive(Debug, Clone)]
pub struct LexiconEntry {
    pub term: &'static str,
    pub aliases: &'static [&'static str],
    pub domain: &'static str,
    pub gloss: Option<&'static str>,
}

/// A term found in a chunk, attached to `extra_data.extracted_terms`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractedTerm {
    pub term: String,
    pub kind: String,
    pub confidence: f64,
    pub domain: String,
}

/// Capability interface: extract domain terminology from text.
pub trait TermExtractor: Send + Sync {
    fn extract(&self, text: &str) -> Vec<ExtractedTerm>;
}

// Default domain vocabulary: water resources. Aliases map variant phrasings
// onto one canonical term; the consistency score treats co-occurring variants
// as divergent usage.
const HYDROLOGY_LEXICON: &[LexiconEntry] = &[
    LexiconEntry { term: "hydrology", aliases: &[], domain: "hydrology", gloss: Some("the study of the movement and distribution of water") },
    LexiconEntry { term: "precipitation", aliases: &["rainfall"], domain: "hydrology", gloss: Some("water falling from the atmosphere to the surface") },
    LexiconEntry { term: "runoff", aliases: &["surface runoff", "streamflow"], domain: "hydrology", gloss: Some("water draining over land into channels") },
    LexiconEntry { term: "evaporation", aliases: &["evapotranspiration"], domain: "hydrology", gloss: None },
    LexiconEntry { term: "infiltration", aliases: &["percolation"], domain: "hydrology", gloss: None },
    LexiconEntry { term: "watershed", aliases: &["catchment", "drainage basin"], domain: "hydrology", gloss: Some("the land area draining to a common outlet") },
    LexiconEntry { term: "groundwater", aliases: &["aquifer"], domain: "hydrology", gloss: None },
    LexiconEntry { term: "water level", aliases: &["stage height"], domain: "hydrology", gloss: None },
    LexiconEntry { term: "discharge", aliases: &["flow rate"], domain: "hydrology", gloss: Some("the volume of water passing a point per unit time") },
    LexiconEntry { term: "sediment", aliases: &["silt load"], domain: "hydrology", gloss: None },
    LexiconEntry { term: "river", aliases: &[], domain: "hydrology", gloss: None },
    LexiconEntry { term: "dam", aliases: &["embankment dam"], domain: "engineering", gloss: Some("a barrier impounding water") },
    LexiconEntry { term: "reservoir", aliases: &[], domain: "engineering", gloss: Some("an impounded body of water held for later use") },
    LexiconEntry { term: "levee", aliases: &["dike"], domain: "engineering", gloss: None },
    LexiconEntry { term: "floodgate", aliases: &["sluice gate"], domain: "engineering", gloss: None },
    LexiconEntry { term: "pumping station", aliases: &[], domain: "engineering", gloss: None },
    LexiconEntry { term: "spillway", aliases: &[], domain: "engineering", gloss: None },
    LexiconEntry { term: "irrigation", aliases: &[], domain: "management", gloss: Some("artificial application of water to land") },
    LexiconEntry { term: "drainage", aliases: &[], domain: "management", gloss: None },
    LexiconEntry { term: "water supply", aliases: &[], domain: "management", gloss: None },
    LexiconEntry { term: "monitoring", aliases: &["gauging"], domain: "management", gloss: None },
    LexiconEntry { term: "forecasting", aliases: &[], domain: "management", gloss: None },
    LexiconEntry { term: "flood", aliases: &["flooding", "inundation"], domain: "flood-control", gloss: None },
    LexiconEntry { term: "flood control", aliases: &[], domain: "flood-control", gloss: None },
    LexiconEntry { term: "drought", aliases: &[], domain: "flood-control", gloss: None },
    LexiconEntry { term: "water quality", aliases: &[], domain: "environment", gloss: None },
    LexiconEntry { term: "ecosystem", aliases: &[], domain: "environment", gloss: None },
    LexiconEntry { term: "pollution", aliases: &["contamination"], domain: "environment", gloss: None },
    LexiconEntry { term: "erosion", aliases: &[], domain: "environment", gloss: None },
];

#[derive(Debug, Clone)]
struct OwnedEntry {
    term: String,
    aliases: Vec<String>,
    domain: String,
    gloss: Option<String>,
}

/// Domain terminology lookup shared by the Enhance and Evaluate stages.
#[derive(Debug)]
pub struct TermLexicon {
    entries: Vec<OwnedEntry>,
    // lowercase phrase (term or alias) -> entry index
    phrase_index: HashMap<String, usize>,
    // lowercase single words appearing in any term or alias
    word_set: BTreeSet<String>,
}

impl TermLexicon {
    /// The built-in lexicon for the configured domain, plus any extra terms
    /// from configuration (attributed to the configured domain, no aliases).
    pub fn builtin(domain: &str, extra_terms: &[String]) -> Self {
        let mut entries: Vec<OwnedEntry> = HYDROLOGY_LEXICON
            .iter()
            .map(|e| OwnedEntry {
                term: e.term.to_string(),
                aliases: e.aliases.iter().map(|a| a.to_string()).collect(),
                domain: e.domain.to_string(),
                gloss: e.gloss.map(|g| g.to_string()),
            })
            .collect();
        for term in extra_terms {
            let term = term.trim().to_lowercase();
            if !term.is_empty() && !entries.iter().any(|e| e.term == term) {
                entries.push(OwnedEntry {
                    term,
                    aliases: Vec::new(),
                    domain: domain.to_string(),
                    gloss: None,
                });
            }
        }

        let mut phrase_index = HashMap::new();
        let mut word_set = BTreeSet::new();
        for (i, entry) in entries.iter().enumerate() {
            phrase_index.insert(entry.term.clone(), i);
            for alias in &entry.aliases {
                phrase_index.insert(alias.to_lowercase(), i);
            }
            for phrase in std::iter::once(&entry.term).chain(entry.aliases.iter()) {
                for word in phrase.split_whitespace() {
                    word_set.insert(word.to_lowercase());
                }
            }
        }
        Self {
            entries,
            phrase_index,
            word_set,
        }
    }

    /// True when a single token belongs to the domain vocabulary.
    pub fn contains_word(&self, word: &str) -> bool {
        self.word_set.contains(&word.to_lowercase())
    }

    pub fn gloss(&self, term: &str) -> Option<&str> {
        self.phrase_index
            .get(&term.to_lowercase())
            .and_then(|&i| self.entries[i].gloss.as_deref())
    }

    pub fn domain_of(&self, term: &str) -> Option<&str> {
        self.phrase_index
            .get(&term.to_lowercase())
            .map(|&i| self.entries[i].domain.as_str())
    }

    /// Alias variants of the canonical term for `phrase`, the phrase itself
    /// excluded. Used by the consistency score.
    pub fn variants_of(&self, phrase: &str) -> Vec<String> {
        let lower = phrase.to_lowercase();
        match self.phrase_index.get(&lower) {
            None => Vec::new(),
            Some(&i) => {
                let entry = &self.entries[i];
                std::iter::once(entry.term.clone())
                    .chain(entry.aliases.iter().map(|a| a.to_lowercase()))
                    .filter(|v| *v != lower)
                    .collect()
            }
        }
    }

    /// Topical tags for a text: every domain whose vocabulary appears.
    pub fn domain_tags(&self, text: &str) -> Vec<String> {
        let lower = text.to_lowercase();
        let mut tags = BTreeSet::new();
        for entry in &self.entries {
            if lower.contains(&entry.term)
                || entry.aliases.iter().any(|a| lower.contains(&a.to_lowercase()))
            {
                tags.insert(entry.domain.clone());
            }
        }
        tags.into_iter().collect()
    }

    fn lookup(&self, phrase: &str) -> Option<(usize, bool)> {
        let lower = phrase.to_lowercase();
        self.phrase_index
            .get(&lower)
            .map(|&i| (i, self.entries[i].term == lower))
    }
}

/// Built-in term extractor: scans unigram, bigram and trigram windows against
/// the lexicon. Canonical terms score higher than aliases.
pub struct LexiconTermExtractor {
    lexicon: Arc<TermLexicon>,
}

impl LexiconTermExtractor {
    pub fn new(lexicon: Arc<TermLexicon>) -> Self {
        Self { lexicon }
    }
}

impl TermExtractor for LexiconTermExtractor {
    fn extract(&self, text: &str) -> Vec<ExtractedTerm> {
        let words: Vec<&str> = WORD_RE.find_iter(text).map(|m| m.as_str()).collect();
        let mut seen = BTreeSet::new();
        let mut terms = Vec::new();
        for start in 0..words.len() {
            for len in (1..=3).rev() {
                if start + len > words.len() {
                    continue;
                }
                let phrase = words[start..start + len].join(" ");
                if let Some((index, canonical)) = self.lexicon.lookup(&phrase) {
                    let entry = &self.lexicon.entries[index];
                    let key = phrase.to_lowercase();
                    if seen.insert(key.clone()) {
                        terms.push(ExtractedTerm {
                            term: key,
                            kind: if canonical { "term".to_string() } else { "alias".to_string() },
                            confidence: if canonical { 0.9 } else { 0.8 },
                            domain: entry.domain.clone(),
                        });
                    }
                    break;
                }
            }
        }
        terms
    }
}
