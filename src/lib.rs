//! choros - Curated gazetteer of geographic names
//!
//! This crate curates collections of geographic name/string records and
//! de-duplicates them by text similarity. Its core is a multi-facet
//! in-memory text index (exact, word, phrase, substring, and fuzzy lookup
//! with cheap removal) and an entity-identity model that derives stable,
//! human-legible identifiers from normalized text and defines merge
//! semantics for records judged to denote the same real-world place.
//!
//! ## Quick Start
//!
//! ```rust
//! use choros::entity::Entity;
//! use choros::gazetteer::Gazetteer;
//!
//! let mut gaz = Gazetteer::new();
//! gaz.add(Entity::string(Some("Moontown"), ["Moontown"]).unwrap()).unwrap();
//! gaz.add(Entity::string(Some("Moontown Airport"), ["Moontown Airport"]).unwrap()).unwrap();
//! let hits = gaz.get(
//!     &[choros::gazetteer::LookupCriterion::Text(vec!["moon".into()])],
//!     choros::index::Operator::Or,
//! );
//! assert_eq!(hits.len(), 2);
//! ```

// Core error handling
pub mod error;

// Text normalization and identifier derivation
pub mod ident;
pub mod normalize;

// Multi-facet text index
pub mod index;

// Entity model: cited strings, places, connections
pub mod entity;
pub mod place;

// The collection and its maintenance operations
pub mod gazetteer;

// Duplicate-candidate discovery
pub mod align;

// Load/save codecs
pub mod parse;

// Interactive curation sessions
pub mod manager;

// Public re-exports for the common path
pub use align::{AlignmentCriterion, ExternalLocator, ExternalMatch, SelfAligner};
pub use entity::{CitedString, Entity};
pub use error::{GazetteerError, Result};
pub use gazetteer::{Gazetteer, LookupCriterion};
pub use index::{Facet, Operator, SearchOptions, StringIndex};
pub use manager::Manager;
pub use place::{Connection, Place};
