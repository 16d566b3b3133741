//! Curation session manager
//!
//! [`Manager`] sits between the command shell and the collection: it holds
//! the (optional) loaded gazetteer, the numbered display context the user
//! refers to, and the alignment review cursor, and renders every operation
//! as a human-readable response string. Presentation lives here and in the
//! CLI; the core's typed errors propagate through untouched.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use crate::align::SelfAligner;
use crate::entity::Entity;
use crate::error::{ParseError, Result};
use crate::gazetteer::{Gazetteer, LookupCriterion};
use crate::index::Operator;
use crate::parse::{entity_from_record, gazetteer_from_json, gazetteer_from_text, gazetteer_to_json};

/// Characters stripped from labels when building the display sort key
static RX_SORT_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"[,()\s]+").expect("static pattern"));

const NO_GAZETTEER: &str = "No gazetteer is loaded.";
const CONTEXT_LOST: &str = "Context has been lost. Execute \"contents\" or \"find\" to refresh.";

/// One numbered entry in the display context
#[derive(Debug, Clone)]
struct ContextEntry {
    id: String,
    label: String,
    kind: &'static str,
}

impl ContextEntry {
    fn from_entity(id: &str, entity: &Entity) -> Self {
        Self {
            id: id.to_string(),
            label: entity.label(),
            kind: entity.kind_name(),
        }
    }

    fn sort_key(&self) -> String {
        RX_SORT_KEY.replace_all(&self.label, "").to_lowercase()
    }
}

/// An alignment candidate awaiting review
#[derive(Debug, Clone)]
struct AlignmentEntry {
    source: ContextEntry,
    matches: Vec<ContextEntry>,
}

/// Session state for interactive gazetteer curation
#[derive(Debug, Default)]
pub struct Manager {
    gaz: Option<Gazetteer>,
    context: Option<BTreeMap<usize, ContextEntry>>,
    alignments: BTreeMap<usize, AlignmentEntry>,
    reviewed: BTreeSet<usize>,
}

impl Manager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gazetteer(&self) -> Option<&Gazetteer> {
        self.gaz.as_ref()
    }

    /// Run the collection-wide self-alignment scan and stage the results
    /// for review.
    pub fn align_self(&mut self) -> Result<String> {
        self.align_self_with(SelfAligner::default())
    }

    /// Like [`Manager::align_self`] with an explicitly configured aligner.
    pub fn align_self_with(&mut self, aligner: SelfAligner) -> Result<String> {
        let Some(gaz) = self.gaz.as_ref() else {
            return Ok(NO_GAZETTEER.to_string());
        };
        let results = aligner.scan(gaz);
        let mut candidates: Vec<AlignmentEntry> = results
            .into_iter()
            .map(|(id, matches)| {
                let source = ContextEntry::from_entity(&id, gaz.entity(&id).expect("scanned id"));
                let matches = matches
                    .iter()
                    .map(|mid| {
                        ContextEntry::from_entity(mid, gaz.entity(mid).expect("matched id"))
                    })
                    .collect();
                AlignmentEntry { source, matches }
            })
            .collect();
        candidates.sort_by_key(|c| c.source.sort_key());
        self.alignments = candidates
            .into_iter()
            .enumerate()
            .map(|(i, c)| (i + 1, c))
            .collect();
        self.reviewed.clear();

        let qty = self.alignments.len();
        let mut msg = if qty == 1 {
            format!("{qty} object in the gazetteer has ")
        } else {
            format!("{qty} objects in the gazetteer have ")
        };
        msg.push_str("possible matches with other objects.");
        if qty > 0 {
            msg.push_str(" Use \"review\" to merge matches selectively.");
        }
        Ok(msg)
    }

    /// Present the next unreviewed alignment candidate and stage its
    /// matches in the display context (the source as entry 0).
    pub fn review_matches(&mut self) -> Result<String> {
        if self.gaz.is_none() {
            return Ok(NO_GAZETTEER.to_string());
        }
        let total = self.alignments.len();
        let next = self
            .alignments
            .iter()
            .find(|(anum, _)| !self.reviewed.contains(*anum));
        let Some((anum, alignment)) = next else {
            return Ok("No unreviewed alignment candidates remain.".to_string());
        };
        let anum = *anum;
        let source = alignment.source.clone();
        let matches = alignment.matches.clone();
        let mut msg = format!(
            "Alignment candidate {anum} of {total}:\n\t0: {} [{}] (id={})\nPossible matches:\n",
            source.label, source.kind, source.id
        );
        msg.push_str(&self.render_list(matches, true, "\t"));
        if let Some(context) = self.context.as_mut() {
            context.insert(0, source);
        }
        self.reviewed.insert(anum);
        Ok(msg)
    }

    /// List the collection's contents as a fresh numbered context.
    pub fn contents(&mut self) -> Result<String> {
        let Some(gaz) = self.gaz.as_ref() else {
            return Ok(NO_GAZETTEER.to_string());
        };
        let entries: Vec<ContextEntry> = gaz
            .contents()
            .iter()
            .map(|(id, e)| ContextEntry::from_entity(id, e))
            .collect();
        Ok(self.render_list(entries, false, ""))
    }

    /// Erase the loaded gazetteer from memory.
    pub fn drop_gazetteer(&mut self) -> Result<String> {
        let Some(gaz) = self.gaz.take() else {
            return Ok(NO_GAZETTEER.to_string());
        };
        self.context = None;
        self.alignments.clear();
        self.reviewed.clear();
        Ok(format!(
            "Erased current gazetteer from memory ({} objects).",
            gaz.len()
        ))
    }

    /// Show one context entry's full record.
    pub fn examine(&self, number: usize) -> Result<String> {
        let Some(gaz) = self.gaz.as_ref() else {
            return Ok(NO_GAZETTEER.to_string());
        };
        let Some(context) = self.context.as_ref() else {
            return Ok(CONTEXT_LOST.to_string());
        };
        let Some(entry) = context.get(&number) else {
            return Ok(self.context_out_of_range(&[number]));
        };
        let entity = gaz
            .entity(&entry.id)
            .ok_or_else(|| crate::error::ValidationError::UnknownId(entry.id.clone()))?;
        Ok(format!(
            "{}\n{}",
            entry.label,
            serde_json::to_string_pretty(entity)?
        ))
    }

    /// Search the gazetteer for matching character strings.
    pub fn find(&mut self, targets: Vec<String>) -> Result<String> {
        let Some(gaz) = self.gaz.as_ref() else {
            return Ok(NO_GAZETTEER.to_string());
        };
        let entries: Vec<ContextEntry> = gaz
            .get(&[LookupCriterion::Text(targets)], Operator::Or)
            .iter()
            .map(|(id, e)| ContextEntry::from_entity(id, e))
            .collect();
        Ok(self.render_list(entries, false, ""))
    }

    /// JSON representation of the whole gazetteer.
    pub fn json(&self) -> Result<String> {
        let Some(gaz) = self.gaz.as_ref() else {
            return Ok(NO_GAZETTEER.to_string());
        };
        gazetteer_to_json(gaz)
    }

    /// Number of objects in the gazetteer.
    pub fn len(&self) -> Result<String> {
        let Some(gaz) = self.gaz.as_ref() else {
            return Ok(NO_GAZETTEER.to_string());
        };
        Ok(format!(
            "There are {} objects in the gazetteer.",
            gaz.len()
        ))
    }

    /// Load a gazetteer from file; format from the argument or the file
    /// extension.
    pub fn load(&mut self, path: &str, format: Option<&str>) -> Result<String> {
        let format = resolve_format(path, format)?;
        let text = std::fs::read_to_string(path)?;
        let gaz = match format {
            FileFormat::Json => gazetteer_from_json(&text)?,
            FileFormat::Txt => gazetteer_from_text(&text, '\n')?,
        };
        info!(path = %path, objects = gaz.len(), "loaded gazetteer");
        let count = gaz.len();
        self.gaz = Some(gaz);
        self.context = None;
        self.alignments.clear();
        self.reviewed.clear();
        Ok(format!("Read {count} objects from {path}."))
    }

    /// Merge the entities behind the given context numbers.
    pub fn merge(&mut self, numbers: &[usize]) -> Result<String> {
        if self.gaz.is_none() {
            return Ok(NO_GAZETTEER.to_string());
        }
        let Some(context) = self.context.as_ref() else {
            return Ok(CONTEXT_LOST.to_string());
        };
        let missing: Vec<usize> = numbers
            .iter()
            .copied()
            .filter(|n| !context.contains_key(n))
            .collect();
        if !missing.is_empty() {
            return Ok(self.context_out_of_range(&missing));
        }
        let ids: Vec<String> = numbers
            .iter()
            .map(|n| context[n].id.clone())
            .collect();
        let gaz = self.gaz.as_mut().expect("checked above");
        let new_id = gaz.merge(&ids)?;
        let entity = gaz
            .entity(&new_id)
            .ok_or_else(|| crate::error::ValidationError::UnknownId(new_id.clone()))?;
        let msg = format!(
            "Merged {} objects to new object \"{}\":\n{}",
            ids.len(),
            entity.label(),
            serde_json::to_string_pretty(entity)?
        );
        self.context = None;
        Ok(msg)
    }

    /// Create a new entity from `field:value` arguments (a single bare
    /// value becomes the attested form).
    pub fn new_entity(&mut self, kind: &str, data: &[String]) -> Result<String> {
        let Some(gaz) = self.gaz.as_mut() else {
            return Ok(NO_GAZETTEER.to_string());
        };
        let object_type = match kind.to_lowercase().as_str() {
            "name" | "geographicname" => "GeographicName",
            "string" | "geographicstring" => "GeographicString",
            other => return Err(ParseError::UnknownObjectType(other.to_string()).into()),
        };
        let mut record = serde_json::Map::new();
        record.insert(
            "object_type".to_string(),
            serde_json::Value::String(object_type.to_string()),
        );
        if data.len() == 1 && !data[0].contains(':') {
            record.insert(
                "attested".to_string(),
                serde_json::Value::String(data[0].clone()),
            );
        } else {
            for element in data {
                let (key, value) = element
                    .split_once(':')
                    .ok_or_else(|| ParseError::BadFieldPair(element.clone()))?;
                record.insert(
                    key.to_string(),
                    serde_json::Value::String(value.to_string()),
                );
            }
        }
        let entity = entity_from_record(&serde_json::Value::Object(record))?;
        let kind_name = entity.kind_name();
        let id = gaz.add(entity)?;
        self.context = None;
        Ok(format!("Created {kind_name} with id={id}"))
    }

    /// Promote the entities behind the given context numbers to places.
    pub fn promote(&mut self, numbers: &[usize]) -> Result<String> {
        if self.gaz.is_none() {
            return Ok(NO_GAZETTEER.to_string());
        }
        let Some(context) = self.context.as_ref() else {
            return Ok(CONTEXT_LOST.to_string());
        };
        let missing: Vec<usize> = numbers
            .iter()
            .copied()
            .filter(|n| !context.contains_key(n))
            .collect();
        if !missing.is_empty() {
            return Ok(self.context_out_of_range(&missing));
        }
        let ids: Vec<String> = numbers
            .iter()
            .map(|n| context[n].id.clone())
            .collect();
        let gaz = self.gaz.as_mut().expect("checked above");
        gaz.promote(&ids)?;
        self.context = None;
        Ok(format!("Promoted {} to Place(s).", ids.len()))
    }

    /// Remove a single object from the gazetteer.
    pub fn remove(&mut self, number: usize) -> Result<String> {
        if self.gaz.is_none() {
            return Ok(NO_GAZETTEER.to_string());
        }
        let Some(context) = self.context.as_ref() else {
            return Ok(CONTEXT_LOST.to_string());
        };
        let Some(entry) = context.get(&number).cloned() else {
            return Ok(self.context_out_of_range(&[number]));
        };
        let gaz = self.gaz.as_mut().expect("checked above");
        gaz.remove(&entry.id);
        self.context = None;
        Ok(format!(
            "Removed \"{}\" object from the gazetteer.",
            entry.label
        ))
    }

    /// Save the gazetteer to file; format from the argument or the file
    /// extension.
    pub fn save(&mut self, path: &str, format: Option<&str>) -> Result<String> {
        let Some(gaz) = self.gaz.as_ref() else {
            return Ok(NO_GAZETTEER.to_string());
        };
        let format = resolve_format(path, format)?;
        let result = match format {
            FileFormat::Json => gazetteer_to_json(gaz)?,
            FileFormat::Txt => gaz.to_string(),
        };
        std::fs::write(path, result)?;
        info!(path = %path, objects = gaz.len(), "saved gazetteer");
        Ok(format!("Saved {} objects to {path}.", gaz.len()))
    }

    /// Plain-text representation of the gazetteer.
    pub fn text(&self) -> Result<String> {
        let Some(gaz) = self.gaz.as_ref() else {
            return Ok(NO_GAZETTEER.to_string());
        };
        Ok(gaz.to_string())
    }

    /// Render entries as a numbered list and store them as the current
    /// display context.
    fn render_list(&mut self, mut entries: Vec<ContextEntry>, include_id: bool, prefix: &str) -> String {
        entries.sort_by_key(ContextEntry::sort_key);
        let mut context = BTreeMap::new();
        let mut lines = String::new();
        for (i, entry) in entries.into_iter().enumerate() {
            let n = i + 1;
            if n > 1 {
                lines.push('\n');
            }
            if include_id {
                let _ = write!(
                    lines,
                    "{prefix}{n}: {} [{}] (id={})",
                    entry.label, entry.kind, entry.id
                );
            } else {
                let _ = write!(lines, "{prefix}{n}: {} [{}]", entry.label, entry.kind);
            }
            context.insert(n, entry);
        }
        self.context = Some(context);
        lines
    }

    fn context_out_of_range(&self, bad: &[usize]) -> String {
        let nums: Vec<usize> = self
            .context
            .as_ref()
            .map(|c| c.keys().copied().collect())
            .unwrap_or_default();
        let bad: Vec<String> = bad.iter().map(ToString::to_string).collect();
        match (nums.first(), nums.last()) {
            (Some(first), Some(last)) => format!(
                "Context number out of range ({}). Valid numbers are currently from {first} to {last}.",
                bad.join(", ")
            ),
            _ => format!("Context number out of range ({}).", bad.join(", ")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileFormat {
    Json,
    Txt,
}

fn resolve_format(path: &str, format: Option<&str>) -> Result<FileFormat> {
    let name = match format {
        Some(f) => f.to_string(),
        None => Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_string(),
    };
    match name.as_str() {
        "json" => Ok(FileFormat::Json),
        "txt" => Ok(FileFormat::Txt),
        other => Err(ParseError::UnknownFormat(other.to_string()).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn write_strings_file(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("strings.txt");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(
            f,
            "Moontown\nCedar Mountain\nChestnut Knob\nHambrick Branch\nMoontown Airport"
        )
        .unwrap();
        path
    }

    fn loaded_manager(dir: &tempfile::TempDir) -> Manager {
        let path = write_strings_file(dir);
        let mut m = Manager::new();
        m.load(path.to_str().unwrap(), Some("txt")).unwrap();
        m
    }

    #[test]
    fn test_no_gazetteer_messages() {
        let mut m = Manager::new();
        assert_eq!(m.contents().unwrap(), NO_GAZETTEER);
        assert_eq!(m.len().unwrap(), NO_GAZETTEER);
        assert_eq!(m.json().unwrap(), NO_GAZETTEER);
        assert_eq!(m.drop_gazetteer().unwrap(), NO_GAZETTEER);
    }

    #[test]
    fn test_load_and_len() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = loaded_manager(&dir);
        let msg = m.len().unwrap();
        assert_eq!(msg, "There are 5 objects in the gazetteer.");
    }

    #[test]
    fn test_contents_sorted_by_label() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = loaded_manager(&dir);
        let r = m.contents().unwrap();
        assert_eq!(
            r,
            "1: Cedar Mountain [GeographicString]\n\
             2: Chestnut Knob [GeographicString]\n\
             3: Hambrick Branch [GeographicString]\n\
             4: Moontown [GeographicString]\n\
             5: Moontown Airport [GeographicString]"
        );
    }

    #[test]
    fn test_find_refreshes_context() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = loaded_manager(&dir);
        let r = m.find(vec!["Moontown".to_string()]).unwrap();
        assert_eq!(
            r,
            "1: Moontown [GeographicString]\n2: Moontown Airport [GeographicString]"
        );
    }

    #[test]
    fn test_examine_requires_context() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = loaded_manager(&dir);
        assert_eq!(m.examine(1).unwrap(), CONTEXT_LOST);
        m.contents().unwrap();
        let r = m.examine(4).unwrap();
        assert!(r.starts_with("Moontown\n"));
        assert!(r.contains("\"object_type\": \"GeographicString\""));
    }

    #[test]
    fn test_context_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = loaded_manager(&dir);
        m.contents().unwrap();
        let r = m.examine(12).unwrap();
        assert_eq!(
            r,
            "Context number out of range (12). Valid numbers are currently from 1 to 5."
        );
    }

    #[test]
    fn test_merge_via_context() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = loaded_manager(&dir);
        m.find(vec!["Moontown".to_string()]).unwrap();
        let r = m.merge(&[1, 2]).unwrap();
        assert!(r.starts_with("Merged 2 objects to new object "));
        assert_eq!(m.len().unwrap(), "There are 4 objects in the gazetteer.");
        // context is consumed by the mutation
        assert_eq!(m.merge(&[1, 2]).unwrap(), CONTEXT_LOST);
    }

    #[test]
    fn test_remove_via_context() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = loaded_manager(&dir);
        m.contents().unwrap();
        let r = m.remove(2).unwrap();
        assert_eq!(r, "Removed \"Chestnut Knob\" object from the gazetteer.");
        assert_eq!(m.len().unwrap(), "There are 4 objects in the gazetteer.");
    }

    #[test]
    fn test_promote_via_context() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = loaded_manager(&dir);
        m.contents().unwrap();
        let r = m.promote(&[1]).unwrap();
        assert_eq!(r, "Promoted 1 to Place(s).");
        assert_eq!(m.len().unwrap(), "There are 5 objects in the gazetteer.");
    }

    #[test]
    fn test_new_entity() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = loaded_manager(&dir);
        let r = m.new_entity("string", &["Moontown Road".to_string()]).unwrap();
        assert_eq!(r, "Created GeographicString with id=moontown-road");
        let r = m
            .new_entity("name", &["attested:Berry Road".to_string()])
            .unwrap();
        assert_eq!(r, "Created GeographicName with id=berry-road");
    }

    #[test]
    fn test_align_and_review() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doublets.txt");
        std::fs::write(&path, "Moontown\nBerry Road\nBerry Road\nCedar Mountain\n").unwrap();
        let mut m = Manager::new();
        m.load(path.to_str().unwrap(), Some("txt")).unwrap();
        let r = m.align_self().unwrap();
        assert_eq!(
            r,
            "1 object in the gazetteer has possible matches with other objects. \
             Use \"review\" to merge matches selectively."
        );
        let r = m.review_matches().unwrap();
        assert!(r.starts_with("Alignment candidate 1 of 1:"));
        assert!(r.contains("Possible matches:"));
        assert!(r.contains("(id=berry-road"));
        let r = m.review_matches().unwrap();
        assert_eq!(r, "No unreviewed alignment candidates remain.");
    }

    #[test]
    fn test_save_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = loaded_manager(&dir);
        let out = dir.path().join("out.json");
        let r = m.save(out.to_str().unwrap(), None).unwrap();
        assert!(r.starts_with("Saved 5 objects to "));
        let mut m2 = Manager::new();
        let r = m2.load(out.to_str().unwrap(), None).unwrap();
        assert!(r.starts_with("Read 5 objects from "));
    }

    #[test]
    fn test_unknown_format() {
        let mut m = Manager::new();
        let err = m.load("places.csv", None).unwrap_err();
        assert!(err.to_string().contains("csv"));
    }
}
