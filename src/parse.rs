//! Load/save codecs
//!
//! Two input shapes feed the collection: delimited plain text (one cited
//! string per item) and JSON (either a bare list of structured records or
//! a saved gazetteer document `{"contents": {id: record, ...}}`). Records
//! follow the `object_type` contract: the tag may be omitted (defaulting
//! to the geographic-string kind) and at least one of `attested` /
//! `romanized` must be present.

use serde_json::Value;

use crate::entity::{CitedString, Entity};
use crate::error::{ParseError, Result, ValidationError};
use crate::gazetteer::Gazetteer;
use crate::ident;
use crate::normalize::slug_words;
use crate::place::Place;

/// Which field a parsed plain-text item lands in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetField {
    #[default]
    Attested,
    Romanized,
}

/// Kind of cited string a parser emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CitedKind {
    Name,
    #[default]
    String,
}

impl CitedKind {
    fn wrap(self, cs: CitedString) -> Entity {
        match self {
            CitedKind::Name => Entity::GeographicName(cs),
            CitedKind::String => Entity::GeographicString(cs),
        }
    }
}

/// Parses delimited text into cited strings, one per item
#[derive(Debug, Clone)]
pub struct StringParser {
    pub delimiter: char,
    pub kind: CitedKind,
    pub field: TargetField,
}

impl Default for StringParser {
    fn default() -> Self {
        Self {
            delimiter: ',',
            kind: CitedKind::String,
            field: TargetField::Attested,
        }
    }
}

impl StringParser {
    pub fn new(delimiter: char, kind: CitedKind, field: TargetField) -> Self {
        Self {
            delimiter,
            kind,
            field,
        }
    }

    /// Parse delimited text; identifiers are uniquified in input order
    /// within the batch.
    pub fn parse(&self, source: &str) -> Result<Vec<Entity>> {
        let mut results: Vec<Entity> = Vec::new();
        for item in source.trim().split(self.delimiter) {
            let entity = match self.field {
                TargetField::Romanized => {
                    self.kind.wrap(CitedString::new(None, [item])?)
                }
                TargetField::Attested => {
                    let romanized = slug_words(item);
                    let mut cs = CitedString::new(None, [romanized.as_str()])?;
                    cs.set_attested(item)?;
                    self.kind.wrap(cs)
                }
            };
            push_unique(&mut results, entity)?;
        }
        Ok(results)
    }
}

/// Uniquify an entity's identifier against a batch accumulated so far.
fn push_unique(batch: &mut Vec<Entity>, mut entity: Entity) -> Result<()> {
    let existing: Vec<&str> = batch.iter().map(Entity::id).collect();
    if existing.contains(&entity.id()) {
        let unique = ident::uniquify(entity.id(), existing);
        entity.assign_id(&unique)?;
    }
    batch.push(entity);
    Ok(())
}

/// Build one entity from a structured record.
///
/// A record with `name`/`names`/`string`/`strings` keys is a place record;
/// otherwise it is a cited-string record whose kind comes from the
/// optional `object_type` tag (default: geographic string). A cited-string
/// record must carry `attested` or `romanized`; an attested-only record
/// derives its romanized form by word-slugging the attested one.
pub fn entity_from_record(record: &Value) -> Result<Entity> {
    let Value::Object(map) = record else {
        return Err(ValidationError::EmptyRecord.into());
    };

    let place_keys = ["name", "names", "string", "strings"];
    if place_keys.iter().any(|k| map.contains_key(*k)) {
        return place_from_record(record).map(Entity::Place);
    }

    let kind = match map.get("object_type").and_then(Value::as_str) {
        None | Some("") | Some("GeographicString") | Some("CitedString") => CitedKind::String,
        Some("GeographicName") => CitedKind::Name,
        Some(other) => return Err(ParseError::UnknownObjectType(other.to_string()).into()),
    };
    cited_from_record(map).map(|cs| kind.wrap(cs))
}

fn cited_from_record(map: &serde_json::Map<String, Value>) -> Result<CitedString> {
    let attested = map.get("attested").and_then(Value::as_str).filter(|a| !a.is_empty());
    let romanized: Vec<String> = match map.get("romanized") {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };
    let romanized = if romanized.is_empty() {
        let attested = attested.ok_or(ValidationError::EmptyRecord)?;
        vec![slug_words(attested)]
    } else {
        romanized
    };
    let mut cs = CitedString::new(attested, romanized)?;
    for (key, value) in map {
        match key.as_str() {
            "object_type" | "attested" | "romanized" | "id" | "prior_ids" | "cleanup" => {}
            _ => {
                if let Some(v) = value.as_str() {
                    cs.set_extra(key, v);
                }
            }
        }
    }
    Ok(cs)
}

fn place_from_record(record: &Value) -> Result<Place> {
    let Value::Object(map) = record else {
        return Err(ValidationError::EmptyRecord.into());
    };
    let mut place = Place::new();
    for (key, kind, field) in [
        ("name", CitedKind::Name, TargetField::Attested),
        ("names", CitedKind::Name, TargetField::Attested),
        ("string", CitedKind::String, TargetField::Attested),
        ("strings", CitedKind::String, TargetField::Attested),
        ("attested", CitedKind::String, TargetField::Attested),
        ("romanized", CitedKind::String, TargetField::Romanized),
    ] {
        let Some(value) = map.get(key) else { continue };
        match value {
            Value::String(s) => place_add_item(&mut place, kind, field, s)?,
            Value::Array(items) => {
                for item in items {
                    match item {
                        Value::String(s) => place_add_item(&mut place, kind, field, s)?,
                        Value::Object(_) => {
                            let cs = match entity_from_record(item)? {
                                Entity::GeographicName(cs) | Entity::GeographicString(cs) => cs,
                                Entity::Place(_) => return Err(ValidationError::EmptyRecord.into()),
                            };
                            match kind {
                                CitedKind::Name => place.add_name(cs)?,
                                CitedKind::String => place.add_string(cs)?,
                            }
                        }
                        _ => return Err(ValidationError::EmptyRecord.into()),
                    }
                }
            }
            _ => return Err(ValidationError::EmptyRecord.into()),
        }
    }
    if place.is_empty() {
        return Err(ValidationError::EmptyRecord.into());
    }
    Ok(place)
}

fn place_add_item(
    place: &mut Place,
    kind: CitedKind,
    field: TargetField,
    value: &str,
) -> Result<()> {
    let cs = match field {
        TargetField::Romanized => CitedString::new(None, [value])?,
        TargetField::Attested => {
            let romanized = slug_words(value);
            let mut cs = CitedString::new(None, [romanized.as_str()])?;
            cs.set_attested(value)?;
            cs
        }
    };
    match kind {
        CitedKind::Name => place.add_name(cs),
        CitedKind::String => place.add_string(cs),
    }
}

/// Load a gazetteer from JSON text: either a saved document
/// `{"contents": {...}}` or a bare list of structured records.
pub fn gazetteer_from_json(text: &str) -> Result<Gazetteer> {
    let value: Value = serde_json::from_str(text)?;
    let mut gaz = Gazetteer::new();
    match &value {
        Value::Object(map) if map.contains_key("contents") => {
            let Some(Value::Object(contents)) = map.get("contents") else {
                return Err(ValidationError::EmptyRecord.into());
            };
            for record in contents.values() {
                let entity: Entity = serde_json::from_value(record.clone())?;
                gaz.add(entity)?;
            }
        }
        Value::Array(records) => {
            let mut batch: Vec<Entity> = Vec::new();
            for record in records {
                push_unique(&mut batch, entity_from_record(record)?)?;
            }
            for entity in batch {
                gaz.add(entity)?;
            }
        }
        _ => return Err(ValidationError::EmptyRecord.into()),
    }
    Ok(gaz)
}

/// Load a gazetteer from delimited plain text, one cited string per line
/// (or per `delimiter` occurrence).
pub fn gazetteer_from_text(text: &str, delimiter: char) -> Result<Gazetteer> {
    let parser = StringParser::new(delimiter, CitedKind::String, TargetField::Attested);
    let mut gaz = Gazetteer::new();
    for entity in parser.parse(text)? {
        gaz.add(entity)?;
    }
    Ok(gaz)
}

/// Serialize a gazetteer to its saved-document JSON form.
pub fn gazetteer_to_json(gaz: &Gazetteer) -> Result<String> {
    Ok(serde_json::to_string_pretty(gaz)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_delimited_romanized() {
        let parser = StringParser::new(',', CitedKind::String, TargetField::Romanized);
        let entities = parser
            .parse("Moontown, Cedar Mountain, Chestnut Knob, Hambrick Branch, Moontown Airport")
            .unwrap();
        assert_eq!(entities.len(), 5);
        let ids: Vec<&str> = entities.iter().map(Entity::id).collect();
        assert_eq!(
            ids,
            [
                "moontown",
                "cedar-mountain",
                "chestnut-knob",
                "hambrick-branch",
                "moontown-airport"
            ]
        );
        // items are normalized before storage
        let cs = entities[1].as_cited().unwrap();
        assert_eq!(
            cs.romanized().iter().collect::<Vec<_>>(),
            ["Cedar Mountain"]
        );
    }

    #[test]
    fn test_parse_delimited_attested_derives_romanized() {
        let parser = StringParser::default();
        let entities = parser.parse("Moontown, Moontown Airport").unwrap();
        let cs = entities[1].as_cited().unwrap();
        assert_eq!(cs.attested(), Some("Moontown Airport"));
        assert_eq!(
            cs.romanized().iter().collect::<Vec<_>>(),
            ["Moontown Airport"]
        );
    }

    #[test]
    fn test_parse_doublets_uniquified_in_order() {
        let parser = StringParser::new(',', CitedKind::String, TargetField::Romanized);
        let entities = parser
            .parse("Moontown, Moontown Airport, Moontown Road, Moontown")
            .unwrap();
        assert_eq!(entities.len(), 4);
        let mut ids: Vec<&str> = entities.iter().map(Entity::id).collect();
        ids.sort_unstable();
        assert_eq!(
            ids,
            ["moontown", "moontown-airport", "moontown-road", "moontown.1"]
        );
    }

    #[test]
    fn test_record_defaults_to_string_kind() {
        let e = entity_from_record(&json!({"romanized": "Moontown"})).unwrap();
        assert_eq!(e.kind_name(), "GeographicString");
        assert_eq!(e.id(), "moontown");
    }

    #[test]
    fn test_record_object_type_name() {
        let e = entity_from_record(&json!({
            "object_type": "GeographicName",
            "attested": "Moontown"
        }))
        .unwrap();
        assert_eq!(e.kind_name(), "GeographicName");
        let cs = e.as_cited().unwrap();
        assert_eq!(cs.romanized().iter().collect::<Vec<_>>(), ["Moontown"]);
    }

    #[test]
    fn test_record_unknown_object_type() {
        let err = entity_from_record(&json!({
            "object_type": "Mountain",
            "attested": "Moontown"
        }))
        .unwrap_err();
        assert!(err.to_string().contains("Mountain"));
    }

    #[test]
    fn test_record_missing_both_fields() {
        let err = entity_from_record(&json!({"fish": "minnow"})).unwrap_err();
        assert!(matches!(
            err,
            crate::error::GazetteerError::Validation(ValidationError::EmptyRecord)
        ));
    }

    #[test]
    fn test_record_extra_fields_carried() {
        let e = entity_from_record(&json!({
            "attested": "Moontown",
            "wikipedia": "https://en.wikipedia.org/wiki/Moontown,_Alabama"
        }))
        .unwrap();
        let cs = e.as_cited().unwrap();
        assert!(cs.extra().contains_key("wikipedia"));
    }

    #[test]
    fn test_place_record() {
        let e = entity_from_record(&json!({
            "name": "Moontown",
            "strings": ["3M5", "landing strip"]
        }))
        .unwrap();
        let place = e.as_place().unwrap();
        assert_eq!(place.names().len(), 1);
        assert_eq!(place.strings().len(), 2);
        assert_eq!(place.names()["moontown"].romanized().iter().next().unwrap(), "Moontown");
    }

    #[test]
    fn test_load_record_list() {
        let text = json!([
            {"attested": "Moontown"},
            {"attested": "Cedar Mountain"},
            {"attested": "Moontown"}
        ])
        .to_string();
        let gaz = gazetteer_from_json(&text).unwrap();
        assert_eq!(gaz.len(), 3);
        assert!(gaz.entity("moontown").is_some());
        assert!(gaz.entity("moontown.1").is_some());
    }

    #[test]
    fn test_saved_document_roundtrip() {
        let mut gaz = Gazetteer::new();
        gaz.add(Entity::name(Some("Moontown"), ["Moontown"]).unwrap())
            .unwrap();
        gaz.add(Entity::string(Some("3M5"), ["3M5"]).unwrap())
            .unwrap();
        gaz.merge(&["moontown", "_3m5"]).unwrap();

        let text = gazetteer_to_json(&gaz).unwrap();
        let loaded = gazetteer_from_json(&text).unwrap();
        assert_eq!(loaded.len(), gaz.len());
        for (id, entity) in gaz.contents() {
            let restored = loaded.entity(id).expect("identifier survives reload");
            assert_eq!(restored, entity);
        }
        // the index is rebuilt on load
        assert_eq!(loaded.indexed_ids(), gaz.indexed_ids());
    }

    #[test]
    fn test_load_text() {
        let gaz = gazetteer_from_text("Moontown\nCedar Mountain\n", '\n').unwrap();
        assert_eq!(gaz.len(), 2);
        assert!(gaz.entity("moontown").is_some());
    }
}
