//! First decoding pass: reads only the envelope of a descriptor.
//!
//! The envelope is `apiVersion`, `kind`, `metadata.name` and `metadata.namespace`.
//! Everything else is left for the typed decode in the reconciler, so a
//! descriptor of an unknown kind is never rejected for its body.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::error::DescriptorError;
use super::resource::ResourceKind;

/// Maximum length of a DNS-1123 subdomain.
const MAX_NAME_LEN: usize = 253;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    #[serde(default)]
    api_version: Option<String>,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    metadata: Option<EnvelopeMeta>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeMeta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    namespace: Option<String>,
}

/// A kind tag as read from a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum KindTag {
    Known(ResourceKind),
    Other(String),
}

impl KindTag {
    pub fn parse(tag: &str) -> Self {
        match tag.parse::<ResourceKind>() {
            Ok(kind) => KindTag::Known(kind),
            Err(_) => KindTag::Other(tag.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            KindTag::Known(kind) => kind.as_str(),
            KindTag::Other(tag) => tag,
        }
    }
}

impl fmt::Display for KindTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who a descriptor describes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceIdentity {
    pub kind: KindTag,
    pub name: String,
    pub namespace: Option<String>,
}

impl ResourceIdentity {
    /// Replaces the namespace with the one the resource is applied to.
    pub fn scoped_to(mut self, namespace: &str) -> Self {
        self.namespace = Some(namespace.to_string());
        self
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} {}/{}", self.kind, ns, self.name),
            None => write!(f, "{} {}", self.kind, self.name),
        }
    }
}

/// Result of classifying a descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub api_version: Option<String>,
    pub identity: ResourceIdentity,
}

impl Classified {
    pub fn tag(&self) -> &KindTag {
        &self.identity.kind
    }
}

static RE_DNS_SUBDOMAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$").unwrap()
});

/// Checks that `name` is a valid DNS-1123 subdomain.
pub fn validate_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("name must not be empty".to_string());
    }
    if name.len() > MAX_NAME_LEN {
        return Err(format!("name is longer than {} characters", MAX_NAME_LEN));
    }
    if !RE_DNS_SUBDOMAIN.is_match(name) {
        return Err(format!(
            "'{}' is not a valid DNS-1123 subdomain (lowercase alphanumerics, '-' and '.')",
            name
        ));
    }
    Ok(())
}

/// Decodes the envelope of a YAML or JSON payload and resolves its kind.
pub fn classify(payload: &[u8]) -> Result<Classified, DescriptorError> {
    let envelope: Envelope = serde_yaml::from_slice(payload)
        .map_err(|e| DescriptorError::Envelope(e.to_string()))?;

    let kind = envelope
        .kind
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .ok_or_else(|| DescriptorError::Envelope("missing 'kind'".to_string()))?;

    let metadata = envelope
        .metadata
        .ok_or_else(|| DescriptorError::Envelope("missing 'metadata'".to_string()))?;
    let name = metadata
        .name
        .ok_or_else(|| DescriptorError::Envelope("missing 'metadata.name'".to_string()))?;
    validate_name(&name).map_err(DescriptorError::Envelope)?;

    Ok(Classified {
        api_version: envelope.api_version,
        identity: ResourceIdentity {
            kind: KindTag::parse(&kind),
            name,
            namespace: metadata.namespace.filter(|ns| !ns.is_empty()),
        },
    })
}
