//! Named-entity model
//!
//! A [`CitedString`] is a cited name/string record: an optional authoritative
//! "attested" form plus a non-empty set of "romanized" forms, with a stable
//! human-legible identifier derived from its content. The closed [`Entity`]
//! union covers the three record kinds the collection stores; merge-rule and
//! parse-rule selection is exhaustive pattern matching, never a runtime
//! string lookup.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{GazetteerError, IdError, Result, ValidationError};
use crate::ident;
use crate::normalize::{norm, slugify};
use crate::place::Place;

/// A cited string: attested form, romanized forms, identifier lifecycle.
///
/// The identifier is always derived from the attested form when present and
/// non-empty, otherwise from the lexicographically first romanized form.
/// Every supersession is archived in `prior_ids`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitedString {
    id: String,
    #[serde(default)]
    prior_ids: BTreeSet<String>,
    /// The form exactly as it appears in a cited source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    attested: Option<String>,
    /// Transliterated/Latin-script renderings; sorted and deduplicated
    romanized: BTreeSet<String>,
    /// Open-extension escape hatch for caller-supplied fields
    #[serde(default, flatten)]
    extra: BTreeMap<String, String>,
    #[serde(default = "default_cleanup", skip_serializing_if = "is_true")]
    cleanup: bool,
}

fn default_cleanup() -> bool {
    true
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_true(v: &bool) -> bool {
    *v
}

impl CitedString {
    /// Construct with normalization enabled (the default).
    ///
    /// At least one romanized form must survive normalization; blank forms
    /// are silently dropped. The initial identifier is an opaque seed that
    /// is immediately superseded by the derived slug and archived.
    pub fn new<I, S>(attested: Option<&str>, romanized: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::build(attested, romanized, true, "CitedString")
    }

    /// Construct with cleanup disabled: values are stored and compared
    /// verbatim, with no normalization or blank-dropping.
    pub fn new_raw<I, S>(attested: Option<&str>, romanized: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::build(attested, romanized, false, "CitedString")
    }

    pub(crate) fn build<I, S>(
        attested: Option<&str>,
        romanized: I,
        cleanup: bool,
        seed_kind: &str,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entity = Self {
            id: format!("{seed_kind}.{}", Uuid::new_v4()),
            prior_ids: BTreeSet::new(),
            attested: None,
            romanized: BTreeSet::new(),
            extra: BTreeMap::new(),
            cleanup,
        };
        for value in romanized {
            entity.insert_romanized(value.as_ref());
        }
        if entity.romanized.is_empty() {
            return Err(ValidationError::NoRomanizedForms.into());
        }
        if let Some(value) = attested {
            entity.store_attested(value);
        }
        entity.regenerate_id()?;
        Ok(entity)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn prior_ids(&self) -> &BTreeSet<String> {
        &self.prior_ids
    }

    pub fn attested(&self) -> Option<&str> {
        self.attested.as_deref()
    }

    pub fn romanized(&self) -> &BTreeSet<String> {
        &self.romanized
    }

    pub fn extra(&self) -> &BTreeMap<String, String> {
        &self.extra
    }

    /// Display label: the attested form when present, else the first
    /// romanized form.
    pub fn label(&self) -> &str {
        match self.attested.as_deref() {
            Some(a) if !a.is_empty() => a,
            _ => self
                .romanized
                .iter()
                .next()
                .map(String::as_str)
                .unwrap_or_default(),
        }
    }

    /// Set the attested form.
    ///
    /// Under cleanup, the value is normalized and a blank result is a
    /// no-op. Writing a value that normalizes identically to the current
    /// one causes no identifier churn.
    pub fn set_attested(&mut self, value: &str) -> Result<()> {
        if self.store_attested(value) {
            self.regenerate_id()?;
        }
        Ok(())
    }

    fn store_attested(&mut self, value: &str) -> bool {
        let val = if self.cleanup {
            let v = norm(value);
            if v.is_empty() {
                return false;
            }
            v
        } else {
            value.to_string()
        };
        if self.attested.as_deref() == Some(val.as_str()) {
            return false;
        }
        self.attested = Some(val);
        true
    }

    /// Merge one or more romanized forms into the set (union, re-sorted).
    ///
    /// Blank forms are dropped under cleanup. A changed set regenerates the
    /// identifier; re-adding existing forms causes no churn.
    pub fn add_romanized<I, S>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut dirty = false;
        for value in values {
            dirty |= self.insert_romanized(value.as_ref());
        }
        if dirty {
            self.regenerate_id()?;
        }
        Ok(())
    }

    fn insert_romanized(&mut self, value: &str) -> bool {
        let val = if self.cleanup {
            let v = norm(value);
            if v.is_empty() {
                return false;
            }
            v
        } else {
            value.to_string()
        };
        self.romanized.insert(val)
    }

    /// Attach or overwrite a caller-supplied extension field.
    ///
    /// Extension fields participate in indexing but never in identifier
    /// derivation; entities already stored in a collection must be
    /// reindexed after this.
    pub fn set_extra(&mut self, key: &str, value: &str) {
        self.extra.insert(key.to_string(), value.to_string());
    }

    /// Replace the identifier, archiving the current one.
    ///
    /// The new value passes through the repair cascade. Used by owning
    /// collections when resolving collisions; the owner is responsible for
    /// rekeying its map in the same operation.
    pub(crate) fn assign_id(&mut self, value: &str) -> Result<()> {
        let valid = ident::coerce(value).map_err(GazetteerError::Id)?;
        if valid != self.id {
            self.prior_ids.insert(std::mem::replace(&mut self.id, valid));
        }
        Ok(())
    }

    /// Derive the most useful possible identifier for this record.
    fn regenerate_id(&mut self) -> Result<()> {
        let base = match self.attested.as_deref() {
            Some(a) if !a.is_empty() => a,
            _ => self
                .romanized
                .iter()
                .next()
                .map(String::as_str)
                .unwrap_or_default(),
        };
        let slug = slugify(base);
        if slug.is_empty() {
            return Err(IdError::Degenerate {
                original: base.to_string(),
            }
            .into());
        }
        let slug = ident::coerce(&slug).map_err(GazetteerError::Id)?;
        if slug != self.id {
            debug!(old = %self.id, new = %slug, "identifier superseded");
            self.prior_ids.insert(std::mem::replace(&mut self.id, slug));
        }
        Ok(())
    }

    /// Text values this record contributes to a collection's index.
    pub fn indexable_text(&self) -> Vec<String> {
        let mut values: Vec<String> = Vec::new();
        if let Some(a) = self.attested.as_deref() {
            values.push(a.to_string());
        }
        values.extend(self.romanized.iter().cloned());
        values.extend(self.extra.values().cloned());
        values
    }
}

/// The closed union of record kinds a collection stores.
///
/// Serialized with an `object_type` tag; each record carries `id`,
/// `prior_ids`, and its public fields, set-valued fields as ordered lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "object_type")]
pub enum Entity {
    GeographicName(CitedString),
    GeographicString(CitedString),
    Place(Place),
}

impl Entity {
    /// Construct a geographic name record.
    pub fn name<I, S>(attested: Option<&str>, romanized: I) -> Result<Entity>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Entity::GeographicName(CitedString::build(
            attested,
            romanized,
            true,
            "GeographicName",
        )?))
    }

    /// Construct a geographic string record.
    pub fn string<I, S>(attested: Option<&str>, romanized: I) -> Result<Entity>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Entity::GeographicString(CitedString::build(
            attested,
            romanized,
            true,
            "GeographicString",
        )?))
    }

    /// The kind name used as the serialization tag.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Entity::GeographicName(_) => "GeographicName",
            Entity::GeographicString(_) => "GeographicString",
            Entity::Place(_) => "Place",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Entity::GeographicName(cs) | Entity::GeographicString(cs) => cs.id(),
            Entity::Place(p) => p.id(),
        }
    }

    pub fn prior_ids(&self) -> &BTreeSet<String> {
        match self {
            Entity::GeographicName(cs) | Entity::GeographicString(cs) => cs.prior_ids(),
            Entity::Place(p) => p.prior_ids(),
        }
    }

    pub fn label(&self) -> String {
        match self {
            Entity::GeographicName(cs) | Entity::GeographicString(cs) => cs.label().to_string(),
            Entity::Place(p) => p.label(),
        }
    }

    /// Text values this entity contributes to a collection's index.
    pub fn indexable_text(&self) -> Vec<String> {
        match self {
            Entity::GeographicName(cs) | Entity::GeographicString(cs) => cs.indexable_text(),
            Entity::Place(p) => p.indexable_text(),
        }
    }

    /// The cited string inside a non-place entity.
    pub fn as_cited(&self) -> Option<&CitedString> {
        match self {
            Entity::GeographicName(cs) | Entity::GeographicString(cs) => Some(cs),
            Entity::Place(_) => None,
        }
    }

    pub fn as_place(&self) -> Option<&Place> {
        match self {
            Entity::Place(p) => Some(p),
            _ => None,
        }
    }

    pub(crate) fn assign_id(&mut self, value: &str) -> Result<()> {
        match self {
            Entity::GeographicName(cs) | Entity::GeographicString(cs) => cs.assign_id(value),
            Entity::Place(p) => p.assign_id(value),
        }
    }
}
