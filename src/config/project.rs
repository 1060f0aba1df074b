//! Project-config canonicalisation
//!
//! Project config is diffed and stored by a layer that does not keep object
//! key order and cannot tell an object from a list. Before link fields are
//! written there, their settings are normalised and every object is packed
//! into an ordered list of `[key, value]` pairs under [`ASSOC_KEY`].

use crate::error::{Error, Result};
use crate::field::LinkTypeSettings;
use crate::link::LinkTypeRegistry;
use log::debug;
use serde_json::{Map, Value};

/// Marker key of a packed associative structure
pub const ASSOC_KEY: &str = "__assoc__";

/// Whether an object is a packed associative structure.
fn is_packed(object: &Map<String, Value>) -> bool {
    if object.len() != 1 {
        return false;
    }
    object
        .get(ASSOC_KEY)
        .and_then(Value::as_array)
        .is_some_and(|pairs| {
            pairs.iter().all(|pair| {
                pair.as_array()
                    .is_some_and(|pair| pair.len() == 2 && pair[0].is_string())
            })
        })
}

/// Key/value pairs of a packed object, in stored order.
fn into_pairs(mut object: Map<String, Value>) -> Vec<(String, Value)> {
    let Some(Value::Array(pairs)) = object.remove(ASSOC_KEY) else {
        return Vec::new();
    };
    pairs
        .into_iter()
        .filter_map(|pair| match pair {
            Value::Array(mut pair) => {
                let value = pair.pop()?;
                match pair.pop()? {
                    Value::String(key) => Some((key, value)),
                    _ => None,
                }
            }
            _ => None,
        })
        .collect()
}

/// Pack every object in `value`, recursively, with keys sorted.
///
/// Every object is packed, including one that already looks packed, so
/// [`unpack_associative`] always gives back exactly the value that was
/// packed. Pack plain values only; [`rebuild_fields`] unpacks stored fields
/// before packing them again.
pub fn pack_associative(value: Value) -> Value {
    match value {
        Value::Object(object) => {
            let mut entries: Vec<(String, Value)> = object.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            assoc(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, pack_associative(value))),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(pack_associative).collect()),
        scalar => scalar,
    }
}

/// Reverse of [`pack_associative`]. Plain objects are walked as well.
///
/// In a config that was never packed, an object whose only key is
/// [`ASSOC_KEY`] holding `[key, value]` pairs is read as packed.
pub fn unpack_associative(value: Value) -> Value {
    match value {
        Value::Object(object) if is_packed(&object) => Value::Object(
            into_pairs(object)
                .into_iter()
                .map(|(key, value)| (key, unpack_associative(value)))
                .collect(),
        ),
        Value::Object(object) => Value::Object(
            object
                .into_iter()
                .map(|(key, value)| (key, unpack_associative(value)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(unpack_associative).collect()),
        scalar => scalar,
    }
}

fn assoc(pairs: impl Iterator<Item = (String, Value)>) -> Value {
    let pairs = pairs
        .map(|(key, value)| Value::Array(vec![Value::String(key), value]))
        .collect();
    let mut object = Map::new();
    object.insert(ASSOC_KEY.to_string(), Value::Array(pairs));
    Value::Object(object)
}

/// Canonicalise every link field under `fields.<uid>` of a project config.
///
/// Each `settings.linkTypes` entry is re-serialised through its link type,
/// then the field is packed. Fields of other types are left untouched.
/// Returns the number of link fields rewritten.
///
/// # Errors
///
/// Returns [`Error::UnknownLinkType`] when a field names an unregistered
/// link type, or [`Error::Serialize`] when a link-type entry is malformed.
pub fn rebuild_fields(project: &mut Value, registry: &LinkTypeRegistry, field_type: &str) -> Result<usize> {
    let Some(fields) = project.get_mut("fields").and_then(Value::as_object_mut) else {
        return Ok(0);
    };

    let mut rebuilt = 0;
    for (uid, field) in fields.iter_mut() {
        let plain = unpack_associative(field.clone());
        if plain.get("type").and_then(Value::as_str) != Some(field_type) {
            continue;
        }
        *field = pack_associative(canonical_field(plain, registry)?);
        debug!("Canonicalised link field {uid} in project config");
        rebuilt += 1;
    }
    Ok(rebuilt)
}

fn canonical_field(mut field: Value, registry: &LinkTypeRegistry) -> Result<Value> {
    let Some(link_types) = field
        .get_mut("settings")
        .and_then(|settings| settings.get_mut("linkTypes"))
    else {
        return Ok(field);
    };

    let entries: Vec<Value> = match link_types.take() {
        Value::Array(entries) => entries,
        // Keyed by handle
        Value::Object(entries) => entries
            .into_iter()
            .map(|(handle, mut entry)| {
                if let Some(object) = entry.as_object_mut() {
                    object
                        .entry("handle")
                        .or_insert_with(|| Value::String(handle));
                }
                entry
            })
            .collect(),
        Value::Null => Vec::new(),
        other => vec![other],
    };

    let mut canonical = Vec::with_capacity(entries.len());
    for entry in entries {
        let settings: LinkTypeSettings = serde_json::from_value(entry)?;
        let link_type = registry
            .get(&settings.handle)
            .ok_or_else(|| Error::UnknownLinkType(settings.handle.clone()))?;
        canonical.push(link_type.settings_config(&settings)?);
    }
    *link_types = Value::Array(canonical);
    Ok(field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn project() -> Value {
        json!({
            "fields": {
                "uid-link": {
                    "type": "linkfield.LinkField",
                    "handle": "cta",
                    "settings": {
                        "multipleLinks": false,
                        "linkTypes": [
                            {"handle": "url", "enabled": true},
                            {"sources": ["section:news"], "handle": "entry", "placeholder": {"b": 1, "a": 2}}
                        ]
                    }
                },
                "uid-text": {"type": "craft.PlainText", "settings": {"z": 1, "a": 2}}
            }
        })
    }

    #[test]
    fn test_pack_sorts_keys() {
        let packed = pack_associative(json!({"b": 1, "a": {"d": [{"y": 1, "x": 2}]}}));
        assert_eq!(
            packed,
            json!({"__assoc__": [
                ["a", {"__assoc__": [["d", [{"__assoc__": [["x", 2], ["y", 1]]}]]]}],
                ["b", 1]
            ]})
        );
    }

    #[test]
    fn test_pack_is_reversible() {
        let original = json!({"b": [1, {"c": null}], "a": "text"});
        let packed = pack_associative(original.clone());
        assert_eq!(unpack_associative(packed), original);
    }

    #[test]
    fn test_marker_key_in_settings_survives_packing() {
        let original = json!({"placeholder": {"__assoc__": [["a", 1]]}});
        let packed = pack_associative(original.clone());

        assert_eq!(
            packed,
            json!({"__assoc__": [["placeholder", {"__assoc__": [["__assoc__", [["a", 1]]]]}]]})
        );
        assert_eq!(unpack_associative(packed), original);
    }

    #[test]
    fn test_rebuild_keeps_marker_key_in_packed_field() {
        let registry = LinkTypeRegistry::with_defaults();
        let field = json!({
            "type": "linkfield.LinkField",
            "settings": {"linkTypes": [{"handle": "url", "placeholder": {"__assoc__": [["a", 1]]}}]}
        });
        let mut project = json!({"fields": {"f": pack_associative(field)}});

        rebuild_fields(&mut project, &registry, "linkfield.LinkField").unwrap();
        let once = project.clone();
        rebuild_fields(&mut project, &registry, "linkfield.LinkField").unwrap();

        assert_eq!(project, once);
        let plain = unpack_associative(project["fields"]["f"].clone());
        assert_eq!(
            plain["settings"]["linkTypes"][0]["placeholder"],
            json!({"__assoc__": [["a", 1]]})
        );
    }

    #[test]
    fn test_rebuild_link_fields_only() {
        let registry = LinkTypeRegistry::with_defaults();
        let mut project = project();

        let rebuilt = rebuild_fields(&mut project, &registry, "linkfield.LinkField").unwrap();

        assert_eq!(rebuilt, 1);
        assert_eq!(project["fields"]["uid-text"], json!({"type": "craft.PlainText", "settings": {"z": 1, "a": 2}}));

        let field = unpack_associative(project["fields"]["uid-link"].clone());
        assert_eq!(
            field["settings"]["linkTypes"][1],
            json!({"handle": "entry", "enabled": true, "sources": ["section:news"], "placeholder": {"a": 2, "b": 1}})
        );
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let registry = LinkTypeRegistry::with_defaults();
        let mut once = project();
        rebuild_fields(&mut once, &registry, "linkfield.LinkField").unwrap();
        let mut twice = once.clone();
        rebuild_fields(&mut twice, &registry, "linkfield.LinkField").unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_rebuild_keyed_link_types() {
        let registry = LinkTypeRegistry::with_defaults();
        let mut project = json!({"fields": {"f": {
            "type": "linkfield.LinkField",
            "settings": {"linkTypes": {"email": {"enabled": false}}}
        }}});

        rebuild_fields(&mut project, &registry, "linkfield.LinkField").unwrap();

        let field = unpack_associative(project["fields"]["f"].clone());
        assert_eq!(
            field["settings"]["linkTypes"],
            json!([{"handle": "email", "enabled": false}])
        );
    }

    #[test]
    fn test_rebuild_unknown_link_type() {
        let registry = LinkTypeRegistry::with_defaults();
        let mut project = json!({"fields": {"f": {
            "type": "linkfield.LinkField",
            "settings": {"linkTypes": [{"handle": "fax"}]}
        }}});

        let err = rebuild_fields(&mut project, &registry, "linkfield.LinkField").unwrap_err();
        assert!(matches!(err, Error::UnknownLinkType(handle) if handle == "fax"));
    }

    #[test]
    fn test_rebuild_without_fields() {
        let registry = LinkTypeRegistry::with_defaults();
        let mut project = json!({"sections": {}});
        assert_eq!(rebuild_fields(&mut project, &registry, "linkfield.LinkField").unwrap(), 0);
    }
}
