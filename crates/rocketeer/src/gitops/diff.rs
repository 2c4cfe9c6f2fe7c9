//! Change detection between a desired resource and the stored one.
//!
//! Two resources are equal when their projections are equal. A projection keeps
//! the user-owned metadata and the kind body as seen through
//! [`ResourceBody::comparable`]; identity and store-managed metadata are left out.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use super::resource::{Manifest, ResourceBody};

/// The comparable view of a resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Projection<B> {
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    /// Untyped metadata such as `finalizers`.
    pub metadata: BTreeMap<String, Value>,
    pub body: B,
}

impl<B: ResourceBody> Projection<B> {
    /// Projects `manifest`, normalising its body against the desired body.
    pub fn of(manifest: &Manifest<B>, desired: &B) -> Self {
        Self {
            labels: manifest.metadata.labels.clone(),
            annotations: manifest.metadata.annotations.clone(),
            metadata: manifest.metadata.user_fields(),
            body: manifest.body.comparable(desired),
        }
    }
}

/// A single differing field, addressed by a dotted path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    pub path: String,
    /// `None` when the field is absent on that side.
    pub desired: Option<Value>,
    pub current: Option<Value>,
}

impl std::fmt::Display for FieldChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let show = |v: &Option<Value>| match v {
            Some(v) => v.to_string(),
            None => "<absent>".to_string(),
        };
        write!(
            f,
            "{}: {} -> {}",
            self.path,
            show(&self.current),
            show(&self.desired)
        )
    }
}

/// Returns true if `current` already matches `desired`.
pub fn equal<B: ResourceBody>(desired: &Manifest<B>, current: &Manifest<B>) -> bool {
    Projection::of(desired, &desired.body) == Projection::of(current, &desired.body)
}

/// Lists the fields where `current` differs from `desired`.
pub fn diff<B: ResourceBody>(desired: &Manifest<B>, current: &Manifest<B>) -> Vec<FieldChange> {
    let desired_json = to_json(&Projection::of(desired, &desired.body));
    let current_json = to_json(&Projection::of(current, &desired.body));

    let mut changes = Vec::new();
    walk("", Some(&desired_json), Some(&current_json), &mut changes);
    changes
}

fn to_json<B: Serialize>(projection: &Projection<B>) -> Value {
    let mut metadata: serde_json::Map<String, Value> = projection
        .metadata
        .iter()
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    metadata.insert("labels".to_string(), serde_json::json!(projection.labels));
    metadata.insert("annotations".to_string(), serde_json::json!(projection.annotations));

    let mut object = serde_json::Map::new();
    object.insert("metadata".to_string(), Value::Object(metadata));
    match serde_json::to_value(&projection.body) {
        Ok(Value::Object(body)) => object.extend(body),
        Ok(other) => {
            object.insert("body".to_string(), other);
        }
        Err(e) => {
            object.insert("body".to_string(), Value::String(format!("<unserializable: {}>", e)));
        }
    }
    Value::Object(object)
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

fn walk(path: &str, desired: Option<&Value>, current: Option<&Value>, out: &mut Vec<FieldChange>) {
    match (desired, current) {
        (Some(Value::Object(d)), Some(Value::Object(c))) => {
            let keys: std::collections::BTreeSet<&String> = d.keys().chain(c.keys()).collect();
            for key in keys {
                walk(&join(path, key), d.get(key), c.get(key), out);
            }
        }
        (Some(Value::Array(d)), Some(Value::Array(c))) => {
            for i in 0..d.len().max(c.len()) {
                walk(&format!("{}[{}]", path, i), d.get(i), c.get(i), out);
            }
        }
        (d, c) if d == c => {}
        (d, c) => out.push(FieldChange {
            path: path.to_string(),
            desired: d.cloned(),
            current: c.cloned(),
        }),
    }
}
