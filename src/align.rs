//! Duplicate-candidate alignment
//!
//! [`SelfAligner`] discovers duplicate-candidate entities inside one
//! collection by querying its text index per configured criterion and
//! combining the per-criterion results with a boolean operator. The
//! [`ExternalLocator`] trait is the contract an external gazetteer-alignment
//! collaborator implements; this crate consumes it, never implements it.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::entity::Entity;
use crate::error::{ParseError, Result};
use crate::gazetteer::Gazetteer;
use crate::index::{Facet, Operator, SearchOptions};
use crate::normalize::norm;

/// One configured alignment criterion.
///
/// Criteria are a closed set; names arriving as strings (CLI, config) are
/// parsed with [`AlignmentCriterion::from_name`], and unknown names are a
/// fatal configuration error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignmentCriterion {
    /// Match on shared indexed text values
    Text { fuzzy: bool },
}

impl AlignmentCriterion {
    pub fn from_name(name: &str, fuzzy: bool) -> Result<Self> {
        match name {
            "text" => Ok(AlignmentCriterion::Text { fuzzy }),
            other => Err(ParseError::UnknownAlignmentCriterion(other.to_string()).into()),
        }
    }
}

/// Finds duplicate candidates within a single collection
#[derive(Debug, Clone)]
pub struct SelfAligner {
    criteria: Vec<AlignmentCriterion>,
    operator: Operator,
}

impl Default for SelfAligner {
    /// Text criterion, exact matching, `and` combination.
    fn default() -> Self {
        Self {
            criteria: vec![AlignmentCriterion::Text { fuzzy: false }],
            operator: Operator::And,
        }
    }
}

impl SelfAligner {
    pub fn new(criteria: Vec<AlignmentCriterion>, operator: Operator) -> Self {
        Self { criteria, operator }
    }

    /// Compute duplicate candidates for one entity.
    ///
    /// Per criterion, the collection's index is queried with the entity's
    /// unique normalized text values (value facet, union within the
    /// criterion); criterion results are combined with the aligner's
    /// operator and the entity's own identifier is excluded.
    pub fn align_object(&self, gaz: &Gazetteer, entity: &Entity) -> Vec<String> {
        let values = unique_strings(entity);
        let mut combined: Option<BTreeSet<String>> = None;
        for criterion in &self.criteria {
            let matches = match criterion {
                AlignmentCriterion::Text { fuzzy } => gaz.find_text(
                    &values,
                    &SearchOptions::facet(Facet::Value)
                        .operator(Operator::Or)
                        .fuzzy(*fuzzy),
                ),
            };
            combined = Some(match (combined, self.operator) {
                (None, _) => matches,
                (Some(acc), Operator::And) => acc.intersection(&matches).cloned().collect(),
                (Some(mut acc), Operator::Or) => {
                    acc.extend(matches);
                    acc
                }
            });
        }
        let mut results: Vec<String> = combined
            .unwrap_or_default()
            .into_iter()
            .filter(|id| id != entity.id())
            .collect();
        results.sort();
        debug!(id = %entity.id(), candidates = results.len(), "aligned entity");
        results
    }

    /// Collection-wide self-alignment scan.
    ///
    /// Every entity's candidate set is computed; duplicate candidate
    /// batches are suppressed (the batch key is the sorted union of the
    /// candidates and the source identifier) so that A↔B is reported once,
    /// not as both A→{B} and B→{A}.
    pub fn scan(&self, gaz: &Gazetteer) -> BTreeMap<String, Vec<String>> {
        let mut results: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut prior_batches: BTreeSet<Vec<String>> = BTreeSet::new();
        for (id, entity) in gaz.contents() {
            let matches = self.align_object(gaz, entity);
            if matches.is_empty() {
                continue;
            }
            let mut batch = matches.clone();
            batch.push(id.clone());
            batch.sort();
            if prior_batches.insert(batch) {
                results.insert(id.clone(), matches);
            }
        }
        results
    }
}

/// The entity's indexable text, normalized and deduplicated.
fn unique_strings(entity: &Entity) -> Vec<String> {
    let values: BTreeSet<String> = entity
        .indexable_text()
        .iter()
        .map(|v| norm(v))
        .filter(|v| !v.is_empty())
        .collect();
    values.into_iter().collect()
}

/// An externally-sourced candidate match: a caller-assignable stable
/// identifier plus a raw attribute bag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalMatch {
    pub id: String,
    pub attributes: BTreeMap<String, String>,
}

/// Contract for an external gazetteer-alignment collaborator.
///
/// Given the indexable text of one entity, an implementation returns zero
/// or more candidate matches. Results are folded into alignment
/// bookkeeping as ordinary entity-shaped data; they reach the collection's
/// store only through the ordinary add/merge interface, after the fact.
pub trait ExternalLocator {
    fn locate(&mut self, values: &[String]) -> Result<Vec<ExternalMatch>>;
}
