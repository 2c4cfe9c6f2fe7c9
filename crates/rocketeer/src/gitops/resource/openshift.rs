//! OpenShift kinds: ImageStream, BuildConfig and Route.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::meta::{IntOrString, ObjectReference};

type Extra = BTreeMap<String, serde_json::Value>;

// ============================================================================
// ImageStream
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageStreamBody {
    #[serde(default)]
    pub spec: ImageStreamSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageStreamSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup_policy: Option<LookupPolicy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker_image_repository: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<TagReference>,

    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LookupPolicy {
    #[serde(default)]
    pub local: bool,
}

/// A tag tracked by an image stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagReference {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<ObjectReference>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_policy: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_policy: Option<serde_json::Value>,

    #[serde(flatten)]
    pub extra: Extra,
}

// ============================================================================
// BuildConfig
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildConfigBody {
    #[serde(default)]
    pub spec: BuildConfigSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildConfigSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub triggers: Vec<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_policy: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<BuildSource>,

    #[serde(default)]
    pub strategy: BuildStrategy,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<BuildOutput>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub successful_builds_history_limit: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_builds_history_limit: Option<i32>,

    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildSource {
    /// `Git`, `Dockerfile`, `Binary`, ...
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<GitBuildSource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_dir: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dockerfile: Option<String>,

    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitBuildSource {
    pub uri: String,

    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub git_ref: Option<String>,

    /// Proxy settings.
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildStrategy {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub strategy_type: Option<String>,

    /// `sourceStrategy`, `dockerStrategy`, ...
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<ObjectReference>,

    #[serde(flatten)]
    pub extra: Extra,
}

// ============================================================================
// Route
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteBody {
    #[serde(default)]
    pub spec: RouteSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default)]
    pub to: RouteTargetReference,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternate_backends: Vec<RouteTargetReference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<RoutePort>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wildcard_policy: Option<String>,

    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteTargetReference {
    #[serde(default)]
    pub kind: String,

    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePort {
    pub target_port: IntOrString,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub termination: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure_edge_termination_policy: Option<String>,

    /// Certificates and keys, kept verbatim.
    #[serde(flatten)]
    pub extra: Extra,
}

impl RouteBody {
    /// Drops the host the router generated when the descriptor left it empty.
    pub fn without_generated_host(&self, desired: &Self) -> Self {
        let mut body = self.clone();
        if desired.spec.host.is_none() {
            body.spec.host = None;
        }
        body
    }
}
