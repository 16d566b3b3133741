//! Multi-facet text index
//!
//! `StringIndex` maps normalized, lowercased strings to record identifiers
//! across four facets (value, word, phrase, substring), with a reverse
//! index so that one identifier's contributions can be removed without
//! rescanning the whole structure. Retrieval is exact by default, or fuzzy
//! via string-similarity ranking over a facet's keys.
//!
//! Phrase and substring expansion is deliberately combinatorial (O(n²)
//! entries per input string): memory is traded for exact substring and
//! phrase recall with no query-time scanning. Callers index short curated
//! name strings, not documents.

use std::collections::{BTreeSet, HashMap};

use smallvec::SmallVec;
use tracing::debug;

use crate::error::ParseError;
use crate::normalize::norm;

/// Minimum similarity (0-100 scale) for a fuzzy key match
pub const DEFAULT_MIN_RATIO: f64 = 70.0;

/// One of the four lookup structures maintained by the index
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Facet {
    Value,
    Word,
    Phrase,
    Substring,
}

impl Facet {
    /// All facets, in display order
    pub const ALL: [Facet; 4] = [Facet::Value, Facet::Word, Facet::Phrase, Facet::Substring];

    pub fn as_str(&self) -> &'static str {
        match self {
            Facet::Value => "value",
            Facet::Word => "word",
            Facet::Phrase => "phrase",
            Facet::Substring => "substring",
        }
    }
}

impl std::str::FromStr for Facet {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "value" => Ok(Facet::Value),
            "word" => Ok(Facet::Word),
            "phrase" => Ok(Facet::Phrase),
            "substring" => Ok(Facet::Substring),
            other => Err(ParseError::UnknownFacet(other.to_string())),
        }
    }
}

/// Boolean combination of results across values and facets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Operator {
    #[default]
    And,
    Or,
}

impl std::str::FromStr for Operator {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "and" => Ok(Operator::And),
            "or" => Ok(Operator::Or),
            other => Err(ParseError::UnknownOperator(other.to_string())),
        }
    }
}

/// Options for [`StringIndex::get`]
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Facets to consult (all four by default)
    pub facets: SmallVec<[Facet; 4]>,
    /// Combination operator across values and across facets
    pub operator: Operator,
    /// Rank facet keys by string similarity instead of exact lookup
    pub fuzzy: bool,
    /// Similarity cutoff (0-100) for fuzzy matches
    pub min_ratio: f64,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            facets: SmallVec::from_slice(&Facet::ALL),
            operator: Operator::And,
            fuzzy: false,
            min_ratio: DEFAULT_MIN_RATIO,
        }
    }
}

impl SearchOptions {
    pub fn facet(facet: Facet) -> Self {
        Self {
            facets: SmallVec::from_slice(&[facet]),
            ..Self::default()
        }
    }

    pub fn operator(mut self, operator: Operator) -> Self {
        self.operator = operator;
        self
    }

    pub fn fuzzy(mut self, fuzzy: bool) -> Self {
        self.fuzzy = fuzzy;
        self
    }
}

type IdSet = BTreeSet<String>;

/// Four-facet string index with reverse bookkeeping for removal
#[derive(Debug, Default)]
pub struct StringIndex {
    values: HashMap<String, IdSet>,
    words: HashMap<String, IdSet>,
    phrases: HashMap<String, IdSet>,
    substrings: HashMap<String, IdSet>,
    /// identifier -> the (facet, key) entries it contributed
    reverse: HashMap<String, BTreeSet<(Facet, String)>>,
}

impl StringIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn facet_map(&self, facet: Facet) -> &HashMap<String, IdSet> {
        match facet {
            Facet::Value => &self.values,
            Facet::Word => &self.words,
            Facet::Phrase => &self.phrases,
            Facet::Substring => &self.substrings,
        }
    }

    fn facet_map_mut(&mut self, facet: Facet) -> &mut HashMap<String, IdSet> {
        match facet {
            Facet::Value => &mut self.values,
            Facet::Word => &mut self.words,
            Facet::Phrase => &mut self.phrases,
            Facet::Substring => &mut self.substrings,
        }
    }

    /// Number of keys currently held by a facet
    pub fn facet_len(&self, facet: Facet) -> usize {
        self.facet_map(facet).len()
    }

    /// Identifiers that currently have index entries
    pub fn indexed_ids(&self) -> BTreeSet<String> {
        self.reverse.keys().cloned().collect()
    }

    /// True when the identifier has at least one index entry
    pub fn contains_id(&self, id: &str) -> bool {
        self.reverse.contains_key(id)
    }

    /// Index a text value under one or more identifiers.
    ///
    /// The value is normalized (NFC, whitespace collapse) and lowercased,
    /// then expanded into all four facets.
    pub fn add<I, S>(&mut self, value: &str, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let real_value = norm(value).to_lowercase();
        let ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        if real_value.is_empty() || ids.is_empty() {
            return;
        }
        debug!(value = %real_value, ids = ?ids, "indexing");

        self.insert_entry(Facet::Value, real_value.clone(), &ids);

        let words: Vec<&str> = real_value.split(' ').collect();
        for word in &words {
            self.insert_entry(Facet::Word, (*word).to_string(), &ids);
        }

        // Every contiguous span of two or more words; single words are not
        // duplicated into the phrase facet.
        for start in 0..words.len() {
            for end in (start + 1)..words.len() {
                let phrase = words[start..=end].join(" ");
                self.insert_entry(Facet::Phrase, phrase, &ids);
            }
        }

        // Every contiguous span of two or more characters.
        let chars: Vec<char> = real_value.chars().collect();
        for start in 0..chars.len() {
            for end in (start + 1)..chars.len() {
                let substring: String = chars[start..=end].iter().collect();
                self.insert_entry(Facet::Substring, substring, &ids);
            }
        }
    }

    fn insert_entry(&mut self, facet: Facet, key: String, ids: &[String]) {
        let entry = self.facet_map_mut(facet).entry(key.clone()).or_default();
        for id in ids {
            entry.insert(id.clone());
        }
        for id in ids {
            self.reverse
                .entry(id.clone())
                .or_default()
                .insert((facet, key.clone()));
        }
    }

    /// Remove every entry the given identifiers contributed.
    ///
    /// Facet keys whose identifier sets empty out are deleted entirely.
    /// Identifiers that were never indexed are a silent no-op.
    pub fn drop<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for id in ids {
            let id = id.as_ref();
            let Some(entries) = self.reverse.remove(id) else {
                continue;
            };
            debug!(id = %id, entries = entries.len(), "unindexing");
            for (facet, key) in entries {
                let map = self.facet_map_mut(facet);
                if let Some(set) = map.get_mut(&key) {
                    set.remove(id);
                    if set.is_empty() {
                        map.remove(&key);
                    }
                }
            }
        }
    }

    /// Look up identifiers matching the given values.
    ///
    /// Results are combined across the values list and, separately, across
    /// the requested facets, using the configured operator: `And` is set
    /// intersection (short-circuiting to empty when any non-fuzzy value or
    /// facet produced no matches at all), `Or` is union. Absent keys are a
    /// miss, never an error.
    pub fn get<S: AsRef<str>>(&self, values: &[S], options: &SearchOptions) -> IdSet {
        let real_values: Vec<String> = values
            .iter()
            .map(|v| v.as_ref().to_lowercase())
            .collect();
        let mut facet_results: Vec<IdSet> = Vec::new();
        for facet in &options.facets {
            if let Some(ids) = self.get_facet(*facet, &real_values, options) {
                facet_results.push(ids);
            }
        }
        if facet_results.len() != options.facets.len()
            && options.operator == Operator::And
            && !options.fuzzy
        {
            return IdSet::new();
        }
        combine(facet_results, options.operator)
    }

    /// Resolve one facet across all query values; `None` when every value
    /// missed (so the caller can distinguish "no matches at all").
    fn get_facet(
        &self,
        facet: Facet,
        values: &[String],
        options: &SearchOptions,
    ) -> Option<IdSet> {
        let mut per_value: Vec<IdSet> = Vec::new();
        for value in values {
            let ids = if options.fuzzy {
                self.get_fuzzy(facet, value, options.min_ratio)
            } else {
                self.facet_map(facet).get(value).cloned().unwrap_or_default()
            };
            if !ids.is_empty() {
                per_value.push(ids);
            }
        }
        if per_value.is_empty() {
            return None;
        }
        if per_value.len() != values.len() && options.operator == Operator::And && !options.fuzzy {
            return Some(IdSet::new());
        }
        Some(combine(per_value, options.operator))
    }

    /// Rank every key of a facet against the query value and union the
    /// identifier sets of keys scoring at or above the cutoff.
    fn get_fuzzy(&self, facet: Facet, value: &str, min_ratio: f64) -> IdSet {
        let mut results = IdSet::new();
        for (key, ids) in self.facet_map(facet) {
            let score = similarity_ratio(value, key);
            if score >= min_ratio {
                results.extend(ids.iter().cloned());
            }
        }
        results
    }
}

/// String similarity on a 0-100 scale (normalized Levenshtein)
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b) * 100.0
}

fn combine(sets: Vec<IdSet>, operator: Operator) -> IdSet {
    let mut iter = sets.into_iter();
    let Some(first) = iter.next() else {
        return IdSet::new();
    };
    match operator {
        Operator::And => iter.fold(first, |acc, s| acc.intersection(&s).cloned().collect()),
        Operator::Or => iter.fold(first, |mut acc, s| {
            acc.extend(s);
            acc
        }),
    }
}
