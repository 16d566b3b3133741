//! Gazetteer collection
//!
//! A [`Gazetteer`] owns the entity store (identifier → entity) and one
//! [`StringIndex`] over every entity's indexable text. All mutating
//! operations keep the two structures consistent: every stored identifier
//! has exactly the index entries its current text implies, and no index
//! entry names an absent identifier.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, info};

use crate::entity::{CitedString, Entity};
use crate::error::{MergeError, ParseError, Result, ValidationError};
use crate::ident;
use crate::index::{Operator, SearchOptions, StringIndex};
use crate::place::Place;

/// One resolvable lookup criterion for [`Gazetteer::get`]
#[derive(Debug, Clone)]
pub enum LookupCriterion {
    /// Filter the store's identifiers directly
    Id(Vec<String>),
    /// Delegate to the text index (all facets, union within the criterion)
    Text(Vec<String>),
}

impl LookupCriterion {
    /// Parse a criterion from its CLI-facing kind name. Unknown kinds are
    /// a fatal configuration error, never an empty result.
    pub fn from_kind(kind: &str, values: Vec<String>) -> Result<Self> {
        match kind {
            "id" => Ok(LookupCriterion::Id(values)),
            "text" => Ok(LookupCriterion::Text(values)),
            other => Err(ParseError::UnknownCriterion(other.to_string()).into()),
        }
    }
}

/// A collection of place, geographic-name, and geographic-string records
#[derive(Debug, Default, Serialize)]
pub struct Gazetteer {
    contents: BTreeMap<String, Entity>,
    #[serde(skip)]
    index: StringIndex,
}

impl Gazetteer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    pub fn contents(&self) -> &BTreeMap<String, Entity> {
        &self.contents
    }

    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.contents.get(id)
    }

    /// Identifiers currently carrying index entries; exposed for
    /// consistency checks.
    pub fn indexed_ids(&self) -> BTreeSet<String> {
        self.index.indexed_ids()
    }

    /// Add an entity, resolving identifier collisions against the store,
    /// and index its full indexable text. Returns the identifier the
    /// entity was stored under.
    pub fn add(&mut self, mut entity: Entity) -> Result<String> {
        if self.contents.contains_key(entity.id()) {
            let unique = ident::uniquify(entity.id(), self.contents.keys().map(String::as_str));
            entity.assign_id(&unique)?;
        }
        let id = entity.id().to_string();
        info!(id = %id, kind = entity.kind_name(), "adding entity");
        self.contents.insert(id.clone(), entity);
        self.reindex_one(&id)?;
        Ok(id)
    }

    /// Remove an entity and drop its index contributions. Absent
    /// identifiers are a no-op.
    pub fn remove(&mut self, id: &str) {
        if self.contents.remove(id).is_some() {
            info!(id = %id, "removing entity");
            self.index.drop([id]);
        }
    }

    /// Re-derive and index the indexable text of the given identifiers.
    ///
    /// Used after any out-of-band mutation of a stored entity; unknown
    /// identifiers are an error.
    pub fn reindex<S: AsRef<str>>(&mut self, ids: &[S]) -> Result<()> {
        for id in ids {
            self.reindex_one(id.as_ref())?;
        }
        Ok(())
    }

    fn reindex_one(&mut self, id: &str) -> Result<()> {
        let entity = self
            .contents
            .get(id)
            .ok_or_else(|| ValidationError::UnknownId(id.to_string()))?;
        let values = entity.indexable_text();
        debug!(id = %id, values = values.len(), "indexing entity text");
        for value in values {
            self.index.add(&value, [id]);
        }
        Ok(())
    }

    /// Resolve entities matching the given criteria.
    ///
    /// Per-criterion identifier sets are combined with the requested
    /// operator (`And` intersects and short-circuits to empty when any
    /// criterion resolves nothing; `Or` unions).
    pub fn get(
        &self,
        criteria: &[LookupCriterion],
        operator: Operator,
    ) -> BTreeMap<String, &Entity> {
        let mut sets: Vec<BTreeSet<String>> = Vec::new();
        for criterion in criteria {
            let ids = match criterion {
                LookupCriterion::Id(values) => values
                    .iter()
                    .filter(|id| self.contents.contains_key(id.as_str()))
                    .cloned()
                    .collect(),
                LookupCriterion::Text(values) => self
                    .index
                    .get(values, &SearchOptions::default().operator(Operator::Or)),
            };
            if ids.is_empty() && operator == Operator::And {
                return BTreeMap::new();
            }
            sets.push(ids);
        }
        let mut iter = sets.into_iter();
        let Some(first) = iter.next() else {
            return BTreeMap::new();
        };
        let ids = match operator {
            Operator::And => iter.fold(first, |acc, s| acc.intersection(&s).cloned().collect()),
            Operator::Or => iter.fold(first, |mut acc, s| {
                acc.extend(s);
                acc
            }),
        };
        ids.into_iter()
            .filter_map(|id| self.contents.get(&id).map(|e| (id.clone(), e)))
            .collect()
    }

    /// Search the index with the gazetteer's search options; identifiers
    /// only. Used by alignment.
    pub fn find_text<S: AsRef<str>>(&self, values: &[S], options: &SearchOptions) -> BTreeSet<String> {
        self.index.get(values, options)
    }

    /// Merge two or more entities into one.
    ///
    /// The target kind is a place when any input is a place or the inputs
    /// span kinds; a uniform cited-string kind is preserved only when the
    /// romanized-form intersection across all inputs is non-empty,
    /// otherwise the merge upgrades to a place. Conflicting non-empty
    /// attested forms abort the merge before any collection mutation.
    /// Returns the merged entity's identifier.
    pub fn merge<S: AsRef<str>>(&mut self, ids: &[S]) -> Result<String> {
        if ids.len() < 2 {
            return Err(MergeError::TooFewInputs(ids.len()).into());
        }
        let mut entities: Vec<&Entity> = Vec::with_capacity(ids.len());
        for id in ids {
            let id = id.as_ref();
            entities.push(
                self.contents
                    .get(id)
                    .ok_or_else(|| ValidationError::UnknownId(id.to_string()))?,
            );
        }

        let target = self.fold_entities(&entities)?;
        info!(
            inputs = ids.len(),
            kind = target.kind_name(),
            "merging entities"
        );
        let new_id = self.add(target)?;
        for id in ids {
            self.remove(id.as_ref());
        }
        Ok(new_id)
    }

    /// Fold the inputs into a fresh target entity; pure with respect to
    /// the collection, so a failed fold leaves no partial merge state.
    fn fold_entities(&self, entities: &[&Entity]) -> Result<Entity> {
        let kinds: BTreeSet<&str> = entities.iter().map(|e| e.kind_name()).collect();
        let any_place = entities.iter().any(|e| matches!(e, Entity::Place(_)));
        let same_kind_target = !any_place && kinds.len() == 1 && {
            // Same-kind merges must denote literally-matching romanizations.
            let mut shared: BTreeSet<&String> = entities[0]
                .as_cited()
                .map(|cs| cs.romanized().iter().collect())
                .unwrap_or_default();
            for entity in &entities[1..] {
                if let Some(cs) = entity.as_cited() {
                    shared = shared
                        .intersection(&cs.romanized().iter().collect())
                        .copied()
                        .collect();
                }
            }
            !shared.is_empty()
        };

        if same_kind_target {
            let mut target = entities[0]
                .as_cited()
                .expect("same-kind target is a cited string")
                .clone();
            for entity in &entities[1..] {
                let source = entity.as_cited().expect("uniform kind checked above");
                target = merge_cited(target, source)?;
            }
            Ok(match entities[0] {
                Entity::GeographicName(_) => Entity::GeographicName(target),
                _ => Entity::GeographicString(target),
            })
        } else {
            let mut place = Place::new();
            for entity in entities {
                match entity {
                    Entity::GeographicName(cs) => place.add_name(cs.clone())?,
                    Entity::GeographicString(cs) => place.add_string(cs.clone())?,
                    Entity::Place(p) => place.absorb(p.clone())?,
                }
            }
            Ok(Entity::Place(place))
        }
    }

    /// Wrap each entity into a fresh place containing just that entity.
    ///
    /// Net effect: same content, new containing kind; store and index stay
    /// consistent throughout. Returns the new place identifiers.
    pub fn promote<S: AsRef<str>>(&mut self, ids: &[S]) -> Result<Vec<String>> {
        // Validate up front so a bad identifier leaves the collection
        // untouched.
        for id in ids {
            let id = id.as_ref();
            let entity = self
                .contents
                .get(id)
                .ok_or_else(|| ValidationError::UnknownId(id.to_string()))?;
            if matches!(entity, Entity::Place(_)) {
                return Err(MergeError::AlreadyPlace(id.to_string()).into());
            }
        }
        let mut new_ids = Vec::with_capacity(ids.len());
        for id in ids {
            let id = id.as_ref();
            let entity = self.contents.get(id).expect("validated above");
            let mut place = Place::new();
            match entity {
                Entity::GeographicName(cs) => place.add_name(cs.clone())?,
                Entity::GeographicString(cs) => place.add_string(cs.clone())?,
                Entity::Place(_) => unreachable!("validated above"),
            }
            info!(id = %id, place = place.id(), "promoting entity to place");
            let new_id = self.add(Entity::Place(place))?;
            self.remove(id);
            new_ids.push(new_id);
        }
        Ok(new_ids)
    }
}

impl std::fmt::Display for Gazetteer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for entity in self.contents.values() {
            if !first {
                writeln!(f)?;
            }
            first = false;
            match entity {
                Entity::Place(place) => write!(f, "{place}")?,
                other => write!(f, "{}: {}", other.kind_name(), other.label())?,
            }
        }
        Ok(())
    }
}

/// Merge one cited string into another of the same kind: attested forms
/// must be equal or one-sided, romanized sets union.
fn merge_cited(mut target: CitedString, source: &CitedString) -> Result<CitedString> {
    match (target.attested(), source.attested()) {
        (Some(t), Some(s)) if t != s => {
            return Err(MergeError::AttestedConflict {
                left: t.to_string(),
                right: s.to_string(),
            }
            .into());
        }
        (None, Some(s)) => {
            let s = s.to_string();
            target.set_attested(&s)?;
        }
        _ => {}
    }
    let forms: Vec<String> = source.romanized().iter().cloned().collect();
    target.add_romanized(forms)?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string_entity(value: &str) -> Entity {
        Entity::string(None, [value]).unwrap()
    }

    fn sample() -> Gazetteer {
        let mut gaz = Gazetteer::new();
        for value in [
            "Moontown",
            "Cedar Mountain",
            "Chestnut Knob",
            "Hambrick Branch",
            "Moontown Airport",
        ] {
            gaz.add(string_entity(value)).unwrap();
        }
        gaz
    }

    fn store_and_index_consistent(gaz: &Gazetteer) -> bool {
        let stored: BTreeSet<String> = gaz.contents().keys().cloned().collect();
        stored == gaz.indexed_ids()
    }

    #[test]
    fn test_add() {
        let mut gaz = sample();
        assert_eq!(gaz.len(), 5);
        gaz.add(string_entity("Moontown Road")).unwrap();
        assert_eq!(gaz.len(), 6);
        assert!(store_and_index_consistent(&gaz));
    }

    #[test]
    fn test_add_doublet_renames() {
        let mut gaz = sample();
        let id = gaz.add(string_entity("Moontown")).unwrap();
        assert_eq!(gaz.len(), 6);
        assert_eq!(id, "moontown.1");
        assert!(store_and_index_consistent(&gaz));
    }

    #[test]
    fn test_get_by_id() {
        let gaz = sample();
        let entries = gaz.get(
            &[LookupCriterion::Id(vec!["chestnut-knob".to_string()])],
            Operator::And,
        );
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_get_by_text() {
        let gaz = sample();
        let entries = gaz.get(
            &[LookupCriterion::Text(vec!["moon".to_string()])],
            Operator::And,
        );
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_get_unknown_criterion_kind() {
        let err = LookupCriterion::from_kind("shape", vec![]).unwrap_err();
        assert!(err.to_string().contains("shape"));
    }

    #[test]
    fn test_remove() {
        let mut gaz = sample();
        gaz.remove("chestnut-knob");
        assert_eq!(gaz.len(), 4);
        assert!(gaz.entity("chestnut-knob").is_none());
        assert!(store_and_index_consistent(&gaz));
        // absent identifier: no-op
        gaz.remove("chestnut-knob");
        assert_eq!(gaz.len(), 4);
    }

    #[test]
    fn test_merge_same_kind_with_shared_romanized() {
        let mut gaz = Gazetteer::new();
        gaz.add(Entity::string(Some("Moontown"), ["Moontown"]).unwrap())
            .unwrap();
        gaz.add(Entity::string(None, ["Moontown", "Muntown"]).unwrap())
            .unwrap();
        let id = gaz
            .merge(&["moontown", "moontown.1"])
            .expect("merge should succeed");
        assert_eq!(gaz.len(), 1);
        let merged = gaz.entity(&id).unwrap();
        assert_eq!(merged.kind_name(), "GeographicString");
        let cs = merged.as_cited().unwrap();
        assert_eq!(cs.attested(), Some("Moontown"));
        assert_eq!(cs.romanized().len(), 2);
        assert!(store_and_index_consistent(&gaz));
    }

    #[test]
    fn test_merge_disjoint_romanized_upgrades_to_place() {
        let mut gaz = Gazetteer::new();
        gaz.add(string_entity("Berry Road")).unwrap();
        gaz.add(string_entity("Berry Rd")).unwrap();
        let id = gaz.merge(&["berry-road", "berry-rd"]).unwrap();
        assert_eq!(gaz.len(), 1);
        let merged = gaz.entity(&id).unwrap();
        assert_eq!(merged.kind_name(), "Place");
        assert_eq!(merged.as_place().unwrap().strings().len(), 2);
        assert!(store_and_index_consistent(&gaz));
    }

    #[test]
    fn test_merge_attested_conflict_aborts_cleanly() {
        let mut gaz = Gazetteer::new();
        gaz.add(Entity::string(Some("Berry Road"), ["Berry Road"]).unwrap())
            .unwrap();
        gaz.add(Entity::string(Some("Berry Rd."), ["Berry Road"]).unwrap())
            .unwrap();
        let err = gaz.merge(&["berry-road", "berry-rd"]).unwrap_err();
        assert!(err.to_string().contains("differing attested forms"));
        // no partial merge state
        assert_eq!(gaz.len(), 2);
        assert!(store_and_index_consistent(&gaz));
    }

    #[test]
    fn test_merge_mixed_kinds_builds_place() {
        let mut gaz = Gazetteer::new();
        gaz.add(Entity::name(Some("Moontown Airport"), ["Moontown Airport"]).unwrap())
            .unwrap();
        gaz.add(Entity::string(Some("3M5"), ["3M5"]).unwrap())
            .unwrap();
        let id = gaz.merge(&["moontown-airport", "_3m5"]).unwrap();
        let merged = gaz.entity(&id).unwrap();
        let place = merged.as_place().unwrap();
        assert_eq!(place.names().len(), 1);
        assert_eq!(place.strings().len(), 1);
        assert!(store_and_index_consistent(&gaz));
    }

    #[test]
    fn test_merge_too_few_inputs() {
        let mut gaz = sample();
        let err = gaz.merge(&["moontown"]).unwrap_err();
        assert!(matches!(
            err,
            crate::error::GazetteerError::Merge(MergeError::TooFewInputs(1))
        ));
    }

    #[test]
    fn test_merge_unknown_id() {
        let mut gaz = sample();
        let err = gaz.merge(&["moontown", "atlantis"]).unwrap_err();
        assert!(err.to_string().contains("atlantis"));
        assert_eq!(gaz.len(), 5);
    }

    #[test]
    fn test_promote() {
        let mut gaz = sample();
        let new_ids = gaz.promote(&["moontown"]).unwrap();
        assert_eq!(gaz.len(), 5);
        let place = gaz.entity(&new_ids[0]).unwrap().as_place().unwrap();
        assert_eq!(place.strings().len(), 1);
        assert!(store_and_index_consistent(&gaz));
    }

    #[test]
    fn test_promote_place_rejected() {
        let mut gaz = sample();
        let ids = gaz.promote(&["moontown"]).unwrap();
        let err = gaz.promote(&[ids[0].as_str()]).unwrap_err();
        assert!(matches!(
            err,
            crate::error::GazetteerError::Merge(MergeError::AlreadyPlace(_))
        ));
    }

    #[test]
    fn test_reindex_unknown_id() {
        let mut gaz = sample();
        let err = gaz.reindex(&["atlantis"]).unwrap_err();
        assert!(err.to_string().contains("atlantis"));
    }

    #[test]
    fn test_find_text_excludes_removed() {
        let mut gaz = sample();
        gaz.remove("moontown-airport");
        let hits = gaz.find_text(
            &["airport"],
            &SearchOptions::default().operator(Operator::Or),
        );
        assert!(hits.is_empty());
    }
}
