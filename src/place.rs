//! Place records
//!
//! A [`Place`] aggregates one or more cited names/strings (and typed
//! [`Connection`] relationships) believed to denote a single real-world
//! location. Places keep their opaque constructed identifier — unlike cited
//! strings they carry no single content-derived slug.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::CitedString;
use crate::error::{GazetteerError, Result, VocabularyError};
use crate::ident;

/// Default controlled vocabulary for connection terms (SKOS mapping
/// relations).
pub const DEFAULT_VOCABULARY: [&str; 5] = [
    "broadMatch",
    "closeMatch",
    "exactMatch",
    "narrowMatch",
    "relatedMatch",
];

/// A typed relationship from a place to another record, constrained to a
/// controlled vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    id: String,
    #[serde(default)]
    prior_ids: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    term: Option<String>,
}

impl Connection {
    pub fn new(term: &str) -> Result<Self> {
        let mut connection = Self {
            id: format!("Connection.{}", Uuid::new_v4()),
            prior_ids: BTreeSet::new(),
            context: None,
            target: None,
            term: None,
        };
        connection.set_term(term)?;
        Ok(connection)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn term(&self) -> Option<&str> {
        self.term.as_deref()
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Set the relationship term, validated against the default vocabulary.
    pub fn set_term(&mut self, term: &str) -> Result<()> {
        self.set_term_in(term, &DEFAULT_VOCABULARY)
    }

    /// Set the relationship term against a caller-supplied vocabulary.
    pub fn set_term_in(&mut self, term: &str, vocabulary: &[&str]) -> Result<()> {
        if !vocabulary.contains(&term) {
            let mut valid: Vec<String> = vocabulary.iter().map(|s| s.to_string()).collect();
            valid.sort();
            return Err(GazetteerError::Vocabulary(VocabularyError {
                term: term.to_string(),
                valid,
            }));
        }
        self.term = Some(term.to_string());
        Ok(())
    }

    pub fn set_context(&mut self, context: &str) {
        self.context = Some(context.to_string());
    }

    pub fn set_target(&mut self, target: &str) {
        self.target = Some(target.to_string());
    }

    pub(crate) fn assign_id(&mut self, value: &str) -> Result<()> {
        let valid = ident::coerce(value).map_err(GazetteerError::Id)?;
        if valid != self.id {
            self.prior_ids.insert(std::mem::replace(&mut self.id, valid));
        }
        Ok(())
    }
}

/// A composite record holding the names, strings, and connections of one
/// real-world location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    id: String,
    #[serde(default)]
    prior_ids: BTreeSet<String>,
    #[serde(default)]
    names: BTreeMap<String, CitedString>,
    #[serde(default)]
    strings: BTreeMap<String, CitedString>,
    #[serde(default)]
    connections: BTreeMap<String, Connection>,
}

impl Default for Place {
    fn default() -> Self {
        Self::new()
    }
}

impl Place {
    pub fn new() -> Self {
        Self {
            id: format!("Place.{}", Uuid::new_v4()),
            prior_ids: BTreeSet::new(),
            names: BTreeMap::new(),
            strings: BTreeMap::new(),
            connections: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn prior_ids(&self) -> &BTreeSet<String> {
        &self.prior_ids
    }

    pub fn names(&self) -> &BTreeMap<String, CitedString> {
        &self.names
    }

    pub fn strings(&self) -> &BTreeMap<String, CitedString> {
        &self.strings
    }

    pub fn connections(&self) -> &BTreeMap<String, Connection> {
        &self.connections
    }

    /// Number of contained names and strings.
    pub fn len(&self) -> usize {
        self.names.len() + self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.strings.is_empty()
    }

    /// Add a contained name, resolving identifier collisions within this
    /// place's name map.
    pub fn add_name(&mut self, mut name: CitedString) -> Result<()> {
        if self.names.contains_key(name.id()) {
            let unique =
                ident::uniquify(name.id(), self.names.keys().map(String::as_str));
            name.assign_id(&unique)?;
        }
        self.names.insert(name.id().to_string(), name);
        Ok(())
    }

    /// Add a contained string, resolving identifier collisions within this
    /// place's string map.
    pub fn add_string(&mut self, mut string: CitedString) -> Result<()> {
        if self.strings.contains_key(string.id()) {
            let unique =
                ident::uniquify(string.id(), self.strings.keys().map(String::as_str));
            string.assign_id(&unique)?;
        }
        self.strings.insert(string.id().to_string(), string);
        Ok(())
    }

    /// Add a typed relationship.
    pub fn add_connection(&mut self, mut connection: Connection) -> Result<()> {
        if self.connections.contains_key(connection.id()) {
            let unique =
                ident::uniquify(connection.id(), self.connections.keys().map(String::as_str));
            connection.assign_id(&unique)?;
        }
        self.connections
            .insert(connection.id().to_string(), connection);
        Ok(())
    }

    /// Fold another place's contents into this one.
    pub fn absorb(&mut self, other: Place) -> Result<()> {
        for (_, name) in other.names {
            self.add_name(name)?;
        }
        for (_, string) in other.strings {
            self.add_string(string)?;
        }
        for (_, connection) in other.connections {
            self.add_connection(connection)?;
        }
        Ok(())
    }

    /// Display label: sorted, deduplicated union of the constituent
    /// names'/strings' labels, joined with `/`.
    pub fn label(&self) -> String {
        let labels: BTreeSet<&str> = self
            .names
            .values()
            .chain(self.strings.values())
            .map(CitedString::label)
            .collect();
        labels.into_iter().collect::<Vec<_>>().join("/")
    }

    /// Text values this place contributes to a collection's index:
    /// recursively, the indexable text of every contained name and string.
    pub fn indexable_text(&self) -> Vec<String> {
        self.names
            .values()
            .chain(self.strings.values())
            .flat_map(CitedString::indexable_text)
            .collect()
    }

    pub(crate) fn assign_id(&mut self, value: &str) -> Result<()> {
        let valid = ident::coerce(value).map_err(GazetteerError::Id)?;
        if valid != self.id {
            self.prior_ids.insert(std::mem::replace(&mut self.id, valid));
        }
        Ok(())
    }
}

impl std::fmt::Display for Place {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)?;
        if !self.names.is_empty() {
            let names: Vec<&str> = self.names.values().map(CitedString::label).collect();
            write!(f, "\n GeographicNames: {}", names.join("; "))?;
        }
        if !self.strings.is_empty() {
            let strings: Vec<&str> = self.strings.values().map(CitedString::label).collect();
            write!(f, "\n GeographicStrings: {}", strings.join("; "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cited(attested: &str) -> CitedString {
        CitedString::new(Some(attested), [attested]).unwrap()
    }

    #[test]
    fn test_empty_place() {
        let p = Place::new();
        assert!(p.is_empty());
        assert!(p.id().starts_with("Place."));
        assert_eq!(p.label(), "");
    }

    #[test]
    fn test_add_name_and_string() {
        let mut p = Place::new();
        p.add_name(cited("Moontown")).unwrap();
        p.add_string(cited("landing strip")).unwrap();
        assert_eq!(p.names().len(), 1);
        assert_eq!(p.strings().len(), 1);
        assert!(p.names().contains_key("moontown"));
        assert!(p.strings().contains_key("landing-strip"));
    }

    #[test]
    fn test_collision_within_place() {
        let mut p = Place::new();
        p.add_name(cited("Moontown")).unwrap();
        p.add_name(cited("Moontown")).unwrap();
        assert_eq!(p.names().len(), 2);
        assert!(p.names().contains_key("moontown"));
        assert!(p.names().contains_key("moontown.1"));
    }

    #[test]
    fn test_label_sorted_dedup_union() {
        let mut p = Place::new();
        p.add_name(cited("Moontown Airport")).unwrap();
        p.add_string(cited("3M5")).unwrap();
        p.add_string(cited("Moontown Airport")).unwrap();
        assert_eq!(p.label(), "3M5/Moontown Airport");
    }

    #[test]
    fn test_indexable_text_recurses() {
        let mut p = Place::new();
        p.add_name(cited("Moontown Airport")).unwrap();
        p.add_string(cited("3M5")).unwrap();
        let text = p.indexable_text();
        assert!(text.contains(&"Moontown Airport".to_string()));
        assert!(text.contains(&"3M5".to_string()));
    }

    #[test]
    fn test_connection_vocabulary() {
        let c = Connection::new("closeMatch").unwrap();
        assert_eq!(c.term(), Some("closeMatch"));
        let err = Connection::new("nearMatch").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("nearMatch"));
        assert!(msg.contains("closeMatch"));
    }

    #[test]
    fn test_add_connection() {
        let mut p = Place::new();
        let mut c = Connection::new("closeMatch").unwrap();
        c.set_target("moontown-airport");
        p.add_connection(c).unwrap();
        assert_eq!(p.connections().len(), 1);
    }

    #[test]
    fn test_absorb_merges_submaps() {
        let mut a = Place::new();
        a.add_name(cited("Moontown")).unwrap();
        let mut b = Place::new();
        b.add_name(cited("Moontown")).unwrap();
        b.add_string(cited("3M5")).unwrap();
        a.absorb(b).unwrap();
        assert_eq!(a.names().len(), 2);
        assert_eq!(a.strings().len(), 1);
    }
}
