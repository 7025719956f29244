//! CLI `update` command: apply one note of inputs and save.

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Read;

use keepsake::config::KeepsakeConfig;
use keepsake::{Inputs, Note, Resource, Resources};

/// Item key standing for the note being written, so new items can be created.
const NEW_ITEM: &str = "new";

pub fn update(
    config: &KeepsakeConfig,
    inputs_path: &str,
    note: Option<Note>,
    resource_specs: &[String],
) -> Result<()> {
    let raw = read_inputs(inputs_path)?;
    let resources = resource_specs
        .iter()
        .map(|spec| parse_resource(spec))
        .collect::<Result<Resources>>()?;

    let mut engine = super::open_engine(config)?;
    let note = match note {
        Some(note) => note,
        None => engine
            .note_at(chrono::Utc::now().timestamp())
            .context("failed to allocate a note")?,
    };
    let inputs = resolve_items(raw, note)?;

    let updates = engine
        .update(note, inputs, resources)
        .with_context(|| format!("failed to apply note {note}"))?;
    engine.save().context("failed to save engine")?;

    super::print_json(&serde_json::json!({ "note": note, "updates": updates }))
}

fn read_inputs(path: &str) -> Result<BTreeMap<String, BTreeMap<String, Value>>> {
    let contents = if path == "-" {
        let mut contents = String::new();
        std::io::stdin()
            .read_to_string(&mut contents)
            .context("failed to read inputs from stdin")?;
        contents
    } else {
        std::fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?
    };
    serde_json::from_str(&contents).context("inputs must be a JSON object of {trait: {item: value}}")
}

/// Parses item keys as notes, replacing [`NEW_ITEM`] with `note`.
fn resolve_items(raw: BTreeMap<String, BTreeMap<String, Value>>, note: Note) -> Result<Inputs> {
    raw.into_iter()
        .map(|(trait_name, values)| {
            let values = values
                .into_iter()
                .map(|(item, value)| {
                    let item = if item == NEW_ITEM {
                        note
                    } else {
                        item.parse()
                            .with_context(|| format!("bad item key in `{trait_name}`"))?
                    };
                    Ok((item, value))
                })
                .collect::<Result<BTreeMap<Note, Value>>>()?;
            Ok((trait_name, values))
        })
        .collect()
}

/// Parses `name:content-type:path` and reads the file.
fn parse_resource(spec: &str) -> Result<(String, Resource)> {
    let mut parts = spec.splitn(3, ':');
    let (Some(name), Some(content_type), Some(path)) = (parts.next(), parts.next(), parts.next())
    else {
        bail!("resource must be given as name:content-type:path, got {spec:?}");
    };

    let bytes = std::fs::read(path).with_context(|| format!("failed to read resource file {path}"))?;
    Ok((
        name.to_string(),
        Resource {
            content_type: content_type.to_string(),
            bytes,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_item_key_becomes_the_written_note() {
        let raw: BTreeMap<String, BTreeMap<String, Value>> =
            serde_json::from_value(json!({"text": {"new": "hi", "4-1": "there"}})).unwrap();
        let inputs = resolve_items(raw, Note::new(9, 0)).unwrap();

        assert_eq!(inputs["text"][&Note::new(9, 0)], json!("hi"));
        assert_eq!(inputs["text"][&Note::new(4, 1)], json!("there"));
    }

    #[test]
    fn bad_item_keys_are_reported() {
        let raw: BTreeMap<String, BTreeMap<String, Value>> =
            serde_json::from_value(json!({"text": {"soon": "x"}})).unwrap();
        assert!(resolve_items(raw, Note::new(1, 0)).is_err());
    }

    #[test]
    fn resource_spec_needs_three_parts() {
        assert!(parse_resource("photo:image/png").is_err());

        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), b"png").unwrap();
        let spec = format!("photo:image/png:{}", tmp.path().display());
        let (name, resource) = parse_resource(&spec).unwrap();
        assert_eq!(name, "photo");
        assert_eq!(resource.content_type, "image/png");
        assert_eq!(resource.bytes, b"png");
    }
}
