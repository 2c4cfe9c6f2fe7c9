//! Builders for descriptor documents.

#![allow(dead_code)]

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};

/// Builder for a single YAML descriptor.
pub struct DescriptorBuilder {
    api_version: String,
    kind: String,
    name: String,
    namespace: Option<String>,
    labels: BTreeMap<String, String>,
    metadata: Map<String, Value>,
    fields: Map<String, Value>,
}

impl DescriptorBuilder {
    pub fn new(api_version: &str, kind: &str, name: &str) -> Self {
        Self {
            api_version: api_version.to_string(),
            kind: kind.to_string(),
            name: name.to_string(),
            namespace: None,
            labels: BTreeMap::new(),
            metadata: Map::new(),
            fields: Map::new(),
        }
    }

    /// Set `metadata.namespace`.
    pub fn namespace(mut self, namespace: &str) -> Self {
        self.namespace = Some(namespace.to_string());
        self
    }

    pub fn label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key.to_string(), value.to_string());
        self
    }

    /// Set an extra `metadata` field such as `finalizers`.
    pub fn metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    /// Set a top-level field such as `data` or `spec`.
    pub fn field(mut self, key: &str, value: Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }

    /// Add one `data` entry (ConfigMap style).
    pub fn data(mut self, key: &str, value: &str) -> Self {
        let data = self
            .fields
            .entry("data")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(map) = data {
            map.insert(key.to_string(), Value::String(value.to_string()));
        }
        self
    }

    pub fn to_value(&self) -> Value {
        let mut metadata = self.metadata.clone();
        metadata.insert("name".to_string(), json!(self.name));
        if let Some(ns) = &self.namespace {
            metadata.insert("namespace".to_string(), json!(ns));
        }
        if !self.labels.is_empty() {
            metadata.insert("labels".to_string(), json!(self.labels));
        }

        let mut document = Map::new();
        document.insert("apiVersion".to_string(), json!(self.api_version));
        document.insert("kind".to_string(), json!(self.kind));
        document.insert("metadata".to_string(), Value::Object(metadata));
        document.extend(self.fields.clone());
        Value::Object(document)
    }

    pub fn to_yaml(&self) -> String {
        serde_yaml::to_string(&self.to_value()).expect("Failed to serialize descriptor")
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&self.to_value()).expect("Failed to serialize descriptor")
    }
}

pub fn config_map(name: &str) -> DescriptorBuilder {
    DescriptorBuilder::new("v1", "ConfigMap", name)
}

pub fn secret(name: &str) -> DescriptorBuilder {
    DescriptorBuilder::new("v1", "Secret", name).field("type", json!("Opaque"))
}

pub fn service(name: &str, port: u16) -> DescriptorBuilder {
    DescriptorBuilder::new("v1", "Service", name).field(
        "spec",
        json!({ "selector": { "app": name }, "ports": [{ "port": port, "targetPort": port }] }),
    )
}

pub fn deployment(name: &str, image: &str) -> DescriptorBuilder {
    DescriptorBuilder::new("apps/v1", "Deployment", name).field(
        "spec",
        json!({
            "replicas": 2,
            "selector": { "matchLabels": { "app": name } },
            "template": {
                "metadata": { "labels": { "app": name } },
                "spec": { "containers": [{ "name": name, "image": image }] }
            }
        }),
    )
}

pub fn route(name: &str, service: &str) -> DescriptorBuilder {
    DescriptorBuilder::new("route.openshift.io/v1", "Route", name).field(
        "spec",
        json!({ "to": { "kind": "Service", "name": service }, "tls": { "termination": "edge" } }),
    )
}

pub fn image_stream(name: &str) -> DescriptorBuilder {
    DescriptorBuilder::new("image.openshift.io/v1", "ImageStream", name)
        .field("spec", json!({ "lookupPolicy": { "local": true } }))
}

pub fn deployment_config(name: &str, image: &str) -> DescriptorBuilder {
    DescriptorBuilder::new("apps.openshift.io/v1", "DeploymentConfig", name).field(
        "spec",
        json!({
            "replicas": 1,
            "selector": { "app": name },
            "template": {
                "metadata": { "labels": { "app": name } },
                "spec": { "containers": [{ "name": name, "image": image }] }
            },
            "triggers": [{ "type": "ConfigChange" }]
        }),
    )
}

pub fn build_config(name: &str, uri: &str) -> DescriptorBuilder {
    DescriptorBuilder::new("build.openshift.io/v1", "BuildConfig", name).field(
        "spec",
        json!({
            "source": { "type": "Git", "git": { "uri": uri, "ref": "main" } },
            "strategy": { "type": "Docker", "dockerStrategy": {} },
            "output": { "to": { "kind": "ImageStreamTag", "name": format!("{}:latest", name) } }
        }),
    )
}
