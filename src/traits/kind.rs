//! The closed set of trait variants.
//!
//! Every variant answers the same three questions: how raw inputs (and the
//! updates already made earlier in the pass) turn into per-item changes, how a
//! snapshot value is archived, and how an archived value is read back.
//!
//! | Kind | Raw value | Snapshot value |
//! |------|-----------|----------------|
//! | **Text** | string or `null` | string |
//! | **Flag** | bool or `null` | bool |
//! | **Media** | list of `{note, name}` records or `null` | non-empty list |
//! | **Reference** | note string or `null` | canonical note string |
//! | **BackReference** | derived only | list of referring item notes |

use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};

use crate::error::{Error, Result};
use crate::model::note::Note;
use crate::store::archive::Snapshot;
use crate::traits::{Change, Changes, Updates};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraitKind {
    /// Free text.
    Text,
    /// Boolean marker.
    Flag,
    /// Tagged records pointing at stored resources.
    Media,
    /// Pointer from an item to another item.
    Reference,
    /// Inverse of the named reference trait: which items point here.
    BackReference { reference: String },
}

impl TraitKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Flag => "flag",
            Self::Media => "media",
            Self::Reference => "reference",
            Self::BackReference { .. } => "back-reference",
        }
    }

    /// Traits whose same-note updates this kind consumes.
    pub fn dependencies(&self) -> Vec<&str> {
        match self {
            Self::BackReference { reference } => vec![reference.as_str()],
            _ => Vec::new(),
        }
    }

    /// Checks one raw value submitted at `note` and returns its canonical form.
    ///
    /// `Ok(None)` is a tombstone.
    pub fn validate(&self, trait_name: &str, note: Note, value: &Value) -> Result<Option<Value>> {
        let invalid = |reason: String| Error::invalid_value(trait_name, reason);

        match (self, value) {
            (Self::BackReference { reference }, _) => Err(invalid(format!(
                "derived from `{reference}` and cannot be written directly"
            ))),
            (_, Value::Null) => Ok(None),
            (Self::Text, Value::String(_)) | (Self::Flag, Value::Bool(_)) => {
                Ok(Some(value.clone()))
            }
            (Self::Reference, Value::String(text)) => {
                let target = parse_past_note(text, note).map_err(invalid)?;
                Ok(Some(Value::String(target.to_string())))
            }
            (Self::Media, Value::Array(records)) => {
                validate_media(records, note).map_err(invalid)
            }
            (Self::Text, _) => Err(invalid(format!("expected a string, got {value}"))),
            (Self::Flag, _) => Err(invalid(format!("expected a boolean, got {value}"))),
            (Self::Reference, _) => Err(invalid(format!("expected a note string, got {value}"))),
            (Self::Media, _) => Err(invalid(format!("expected a list of records, got {value}"))),
        }
    }

    /// Computes this trait's changes for one note.
    ///
    /// `current` reads an item's present value. Every input is validated before
    /// `current` is called, so a rejected value leaves no trace.
    pub fn derive<F>(
        &self,
        trait_name: &str,
        note: Note,
        inputs: Option<&BTreeMap<Note, Value>>,
        updates: &Updates,
        mut current: F,
    ) -> Result<Changes>
    where
        F: FnMut(Note) -> Result<Option<Value>>,
    {
        if let Self::BackReference { reference } = self {
            if let Some(item) = inputs.and_then(|inputs| inputs.keys().next()) {
                return Err(Error::invalid_value(
                    trait_name,
                    format!("derived from `{reference}`, but a value was submitted for {item}"),
                ));
            }
            let Some(reference_changes) = updates.get(reference) else {
                return Ok(Changes::new());
            };
            return derive_back_references(trait_name, reference_changes, current);
        }

        let validated = inputs
            .into_iter()
            .flatten()
            .map(|(item, raw)| Ok((*item, self.validate(trait_name, note, raw)?)))
            .collect::<Result<Vec<_>>>()?;

        validated
            .into_iter()
            .map(|(item, new)| {
                let old = current(item)?;
                Ok((item, Change { old, new }))
            })
            .collect()
    }

    /// Converts a snapshot value into its archived form.
    pub fn serialise(&self, value: Value) -> Value {
        value
    }

    /// Converts archived values back into snapshot values.
    pub fn deserialise(&self, archived: Snapshot) -> Snapshot {
        archived
    }
}

/// Parses `text` as a note no later than `note`.
fn parse_past_note(text: &str, note: Note) -> std::result::Result<Note, String> {
    let target: Note = text.parse().map_err(|err| format!("{err}"))?;
    if target > note {
        return Err(format!("{target} does not exist yet at {note}"));
    }
    Ok(target)
}

fn validate_media(records: &[Value], note: Note) -> std::result::Result<Option<Value>, String> {
    let mut seen = HashSet::new();
    let mut canonical = Vec::with_capacity(records.len());

    for record in records {
        let fields = record
            .as_object()
            .ok_or_else(|| format!("expected a record, got {record}"))?;
        let (Some(Value::String(at)), Some(Value::String(name))) =
            (fields.get("note"), fields.get("name"))
        else {
            return Err(format!(
                "records need string `note` and `name` fields, got {record}"
            ));
        };

        let at = parse_past_note(at, note)?;
        if !seen.insert((at, name.clone())) {
            return Err(format!("duplicate record for resource `{name}` at {at}"));
        }

        let mut fields: Map<String, Value> = fields.clone();
        fields.insert("note".into(), Value::String(at.to_string()));
        canonical.push(Value::Object(fields));
    }

    Ok((!canonical.is_empty()).then_some(Value::Array(canonical)))
}

/// Moves each re-pointed child from its old target's list to its new one.
fn derive_back_references<F>(
    trait_name: &str,
    reference_changes: &Changes,
    mut current: F,
) -> Result<Changes>
where
    F: FnMut(Note) -> Result<Option<Value>>,
{
    let mut changes = Changes::new();

    for (child, change) in reference_changes {
        let child = Value::String(child.to_string());

        if let Some(old_target) = target_of(trait_name, change.old.as_ref())? {
            let entry = pending(&mut changes, old_target, &mut current)?;
            entry.new = without_child(entry.new.take(), &child);
        }
        if let Some(new_target) = target_of(trait_name, change.new.as_ref())? {
            let entry = pending(&mut changes, new_target, &mut current)?;
            entry.new = Some(with_child(entry.new.take(), child));
        }
    }

    Ok(changes)
}

fn target_of(trait_name: &str, value: Option<&Value>) -> Result<Option<Note>> {
    match value {
        None => Ok(None),
        Some(Value::String(text)) => Ok(Some(text.parse()?)),
        Some(other) => Err(Error::invalid_value(
            trait_name,
            format!("reference value {other} is not a note string"),
        )),
    }
}

/// The change being built for `target`, seeded with its current children.
fn pending<'a, F>(changes: &'a mut Changes, target: Note, current: &mut F) -> Result<&'a mut Change>
where
    F: FnMut(Note) -> Result<Option<Value>>,
{
    if !changes.contains_key(&target) {
        let children = current(target)?;
        changes.insert(
            target,
            Change {
                old: children.clone(),
                new: children,
            },
        );
    }
    Ok(changes.entry(target).or_default())
}

fn without_child(children: Option<Value>, child: &Value) -> Option<Value> {
    let Some(Value::Array(mut children)) = children else {
        return None;
    };
    children.retain(|existing| existing != child);
    (!children.is_empty()).then_some(Value::Array(children))
}

fn with_child(children: Option<Value>, child: Value) -> Value {
    let mut children = match children {
        Some(Value::Array(children)) => children,
        _ => Vec::new(),
    };
    if !children.contains(&child) {
        children.push(child);
    }
    Value::Array(children)
}
