//! Integration tests for collection curation over realistic fixture data
//!
//! The fixture is a 20-record extract of name readings around one small
//! airport, including two independent readings of "Berry Road" and four
//! records (a string, two names, one code) that all denote the airport.

use std::collections::BTreeSet;

use choros::entity::Entity;
use choros::gazetteer::LookupCriterion;
use choros::index::Operator;
use choros::parse::{gazetteer_from_json, gazetteer_to_json};
use choros::Gazetteer;

const MOONTOWN_NAMES: &str = include_str!("data/moontown_names.json");

fn moontown() -> Gazetteer {
    gazetteer_from_json(MOONTOWN_NAMES).expect("fixture parses")
}

fn assert_store_index_consistent(gaz: &Gazetteer) {
    let stored: BTreeSet<String> = gaz.contents().keys().cloned().collect();
    assert_eq!(
        stored,
        gaz.indexed_ids(),
        "stored identifiers and indexed identifiers must correspond exactly"
    );
}

#[test]
fn test_load_derives_ids_from_attested() {
    let gaz = moontown();
    assert_eq!(gaz.len(), 20);
    for id in [
        "moontown",
        "moontown-airport",
        "madison-county-sky-park",
        "landing-strip",
        "_3m5",
        "berry-road",
        "berry-road.1",
        "chestnut-knob",
        "owens-cross-roads",
    ] {
        assert!(gaz.entity(id).is_some(), "expected identifier {id}");
    }
    assert_store_index_consistent(&gaz);
}

#[test]
fn test_get_by_id_and_text() {
    let gaz = moontown();
    let entries = gaz.get(
        &[LookupCriterion::Id(vec!["chestnut-knob".to_string()])],
        Operator::And,
    );
    assert_eq!(entries.len(), 1);

    let entries = gaz.get(
        &[LookupCriterion::Text(vec!["moon".to_string()])],
        Operator::And,
    );
    assert_eq!(entries.len(), 3, "Moontown, Moontown Airport, Moontown Road");
}

#[test]
fn test_remove_keeps_index_consistent() {
    let mut gaz = moontown();
    gaz.remove("chestnut-knob");
    assert_eq!(gaz.len(), 19);
    let entries = gaz.get(
        &[LookupCriterion::Id(vec!["chestnut-knob".to_string()])],
        Operator::And,
    );
    assert!(entries.is_empty());
    assert_store_index_consistent(&gaz);
}

#[test]
fn test_airport_merge_builds_place() {
    let mut gaz = moontown();
    let merge_ids = [
        "_3m5",
        "landing-strip",
        "madison-county-sky-park",
        "moontown-airport",
    ];
    let new_id = gaz.merge(&merge_ids).expect("airport merge succeeds");
    // four originals removed, one place added
    assert_eq!(gaz.len(), 17);
    for id in merge_ids {
        assert!(gaz.entity(id).is_none(), "{id} should have been removed");
    }
    let place = gaz
        .entity(&new_id)
        .expect("merged entity stored")
        .as_place()
        .expect("mixed-kind merge must produce a place");
    assert_eq!(place.names().len(), 2);
    assert_eq!(place.strings().len(), 2);

    // the place answers for all of its constituents' text
    let entries = gaz.get(
        &[LookupCriterion::Text(vec![
            "sky".to_string(),
            "strip".to_string(),
            "airport".to_string(),
        ])],
        Operator::And,
    );
    assert_eq!(entries.len(), 1);
    assert!(entries.contains_key(&new_id));
    assert_store_index_consistent(&gaz);
}

#[test]
fn test_merge_then_promote_everything() {
    let mut gaz = moontown();
    gaz.merge(&[
        "_3m5",
        "landing-strip",
        "madison-county-sky-park",
        "moontown-airport",
    ])
    .unwrap();
    gaz.merge(&["berry-road", "berry-road.1"]).unwrap();

    let plain: Vec<String> = gaz
        .contents()
        .iter()
        .filter(|(_, e)| e.as_place().is_none())
        .map(|(id, _)| id.clone())
        .collect();
    gaz.promote(&plain).unwrap();

    assert_eq!(gaz.len(), 16);
    assert!(gaz.contents().values().all(|e| e.as_place().is_some()));
    assert_store_index_consistent(&gaz);
}

#[test]
fn test_same_kind_duplicate_merge_keeps_kind() {
    let mut gaz = moontown();
    // both Berry Road readings carry the identical romanized form, so the
    // merge may stay a name rather than upgrade to a place
    let id = gaz.merge(&["berry-road", "berry-road.1"]).unwrap();
    assert_eq!(gaz.len(), 19);
    let merged = gaz.entity(&id).unwrap();
    assert_eq!(merged.kind_name(), "GeographicName");
    assert_eq!(merged.as_cited().unwrap().attested(), Some("Berry Road"));
    assert_store_index_consistent(&gaz);
}

#[test]
fn test_saved_document_roundtrip_preserves_fields() {
    let mut gaz = moontown();
    gaz.merge(&[
        "_3m5",
        "landing-strip",
        "madison-county-sky-park",
        "moontown-airport",
    ])
    .unwrap();

    let saved = gazetteer_to_json(&gaz).unwrap();
    let loaded = gazetteer_from_json(&saved).unwrap();
    assert_eq!(loaded.len(), gaz.len());
    for (id, entity) in gaz.contents() {
        assert_eq!(loaded.entity(id), Some(entity));
    }
    assert_store_index_consistent(&loaded);
}

#[test]
fn test_added_duplicate_is_renamed_not_replaced() {
    let mut gaz = moontown();
    gaz.add(Entity::name(Some("Moontown"), ["Moontown"]).unwrap())
        .unwrap();
    assert_eq!(gaz.len(), 21);
    assert!(gaz.entity("moontown.1").is_some());
    assert_store_index_consistent(&gaz);
}
