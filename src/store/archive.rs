//! Per-item trait histories and their point-in-time projection.
//!
//! An [`Archive`] holds, for every item of one chunk, the ordered sequence of
//! `(note, value)` pairs a trait has recorded for it. A `None` value is a
//! tombstone: the trait explicitly had no value from that note on.
//!
//! On disk an archive is a JSON object mapping item → note → value, with
//! tombstones written as `null`:
//!
//! ```json
//! { "12": { "12": "draft", "40-1": "final", "95": null } }
//! ```

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

use crate::error::{Error, Result};
use crate::model::note::Note;

/// One recorded value: the note it was written at, and the value or a tombstone.
pub type ArchiveEntry = (Note, Option<Value>);

/// Current value per item, as of some note.
pub type Snapshot = BTreeMap<Note, Value>;

/// Append-only histories of one trait for the items of one chunk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Archive {
    items: BTreeMap<Note, Vec<ArchiveEntry>>,
}

impl Archive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items with at least one recorded entry.
    pub fn items(&self) -> impl Iterator<Item = &Note> {
        self.items.keys()
    }

    /// The recorded history of `item`, oldest first.
    pub fn history(&self, item: &Note) -> &[ArchiveEntry] {
        self.items.get(item).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn histories(&self) -> impl Iterator<Item = (&Note, &[ArchiveEntry])> {
        self.items.iter().map(|(item, history)| (item, history.as_slice()))
    }

    /// Appends a value for `item` at `note`.
    ///
    /// Notes within one item's history must be strictly increasing.
    pub fn append(&mut self, item: Note, note: Note, value: Option<Value>) -> Result<()> {
        let history = self.items.entry(item).or_default();
        if let Some((last, _)) = history.last() {
            if *last >= note {
                return Err(Error::ArchiveOutOfOrder {
                    item,
                    last: *last,
                    note,
                });
            }
        }
        history.push((note, value));
        Ok(())
    }
}

/// Value of every item as of `note`, or as of the latest entry when `note` is
/// `None`.
///
/// An item is left out when it has no entry at or before `note`, or when its
/// entry there is a tombstone. Histories are assumed sorted by note, which
/// [`Archive::append`] guarantees.
pub fn index_archive(archive: &Archive, note: Option<Note>) -> Snapshot {
    archive
        .histories()
        .filter_map(|(item, history)| {
            let entry = match note {
                None => history.last(),
                Some(note) => {
                    let end = history.partition_point(|(at, _)| *at <= note);
                    end.checked_sub(1).map(|index| &history[index])
                }
            };
            let value = entry?.1.clone()?;
            Some((*item, value))
        })
        .collect()
}

impl Serialize for Archive {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        struct History<'a>(&'a [ArchiveEntry]);

        impl Serialize for History<'_> {
            fn serialize<S: Serializer>(
                &self,
                serializer: S,
            ) -> std::result::Result<S::Ok, S::Error> {
                serializer.collect_map(self.0.iter().map(|(note, value)| (note, value)))
            }
        }

        let mut map = serializer.serialize_map(Some(self.items.len()))?;
        for (item, history) in &self.items {
            map.serialize_entry(item, &History(history))?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Archive {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        // Inner maps are keyed by parsed notes, so histories come back in note
        // order regardless of how the file orders its keys.
        let NoteMap(raw) = NoteMap::<NoteMap<Option<Value>>>::deserialize(deserializer)?;
        Ok(Self {
            items: raw
                .into_iter()
                .map(|(item, NoteMap(history))| (item, history.into_iter().collect()))
                .collect(),
        })
    }
}

/// Map keyed by notes in their canonical text form. Two keys naming the same
/// note would silently drop an entry, so both duplicates and non-canonical
/// spellings such as `1-0` are rejected.
struct NoteMap<V>(BTreeMap<Note, V>);

impl<'de, V: Deserialize<'de>> Deserialize<'de> for NoteMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct NoteMapVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for NoteMapVisitor<V> {
            type Value = NoteMap<V>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object keyed by note strings")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut entries = BTreeMap::new();
                while let Some((key, value)) = map.next_entry::<String, V>()? {
                    let note: Note = key.parse().map_err(de::Error::custom)?;
                    if note.to_string() != key {
                        return Err(de::Error::custom(format!(
                            "note key `{key}` should be written `{note}`"
                        )));
                    }
                    if entries.insert(note, value).is_some() {
                        return Err(de::Error::custom(format!("duplicate note key `{key}`")));
                    }
                }
                Ok(NoteMap(entries))
            }
        }

        deserializer.deserialize_map(NoteMapVisitor(PhantomData))
    }
}
