//! K8s-style resource types reconciled from descriptors.
//!
//! The set of kinds is closed: every descriptor either resolves to one of the
//! [`ResourceKind`] variants or is ignored. Each kind is a [`Manifest`] around a
//! kind-specific body implementing [`ResourceBody`].

pub mod apps;
pub mod core_v1;
pub mod meta;
pub mod openshift;

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub use apps::{
    Container, ContainerPort, DeploymentBody, DeploymentConfigBody, DeploymentConfigSpec,
    DeploymentSpec, DeploymentTriggerPolicy, EnvVar, ImageChangeParams, LabelSelector, PodSpec,
    PodTemplateSpec, TemplateMeta,
};
pub use core_v1::{ConfigMapBody, SecretBody, ServiceBody, ServicePort, ServiceSpec};
pub use meta::{ByteString, IntOrString, ObjectMeta, ObjectReference};
pub use openshift::{
    BuildConfigBody, BuildConfigSpec, BuildOutput, BuildSource, BuildStrategy, GitBuildSource,
    ImageStreamBody, ImageStreamSpec, LookupPolicy, RouteBody, RoutePort, RouteSpec,
    RouteTargetReference, TagReference, TlsConfig,
};

/// The kind of a managed resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    ConfigMap,
    Secret,
    Deployment,
    DeploymentConfig,
    ImageStream,
    BuildConfig,
    Route,
    Service,
}

impl ResourceKind {
    /// Returns all resource kinds.
    pub fn all() -> &'static [ResourceKind] {
        &[
            ResourceKind::ConfigMap,
            ResourceKind::Secret,
            ResourceKind::Deployment,
            ResourceKind::DeploymentConfig,
            ResourceKind::ImageStream,
            ResourceKind::BuildConfig,
            ResourceKind::Route,
            ResourceKind::Service,
        ]
    }

    /// Returns the kind tag as written in descriptors.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::ConfigMap => "ConfigMap",
            ResourceKind::Secret => "Secret",
            ResourceKind::Deployment => "Deployment",
            ResourceKind::DeploymentConfig => "DeploymentConfig",
            ResourceKind::ImageStream => "ImageStream",
            ResourceKind::BuildConfig => "BuildConfig",
            ResourceKind::Route => "Route",
            ResourceKind::Service => "Service",
        }
    }

    /// Default `apiVersion` used when building a resource of this kind.
    pub fn default_api_version(&self) -> &'static str {
        match self {
            ResourceKind::ConfigMap | ResourceKind::Secret | ResourceKind::Service => "v1",
            ResourceKind::Deployment => "apps/v1",
            ResourceKind::DeploymentConfig => "apps.openshift.io/v1",
            ResourceKind::ImageStream => "image.openshift.io/v1",
            ResourceKind::BuildConfig => "build.openshift.io/v1",
            ResourceKind::Route => "route.openshift.io/v1",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResourceKind {
    type Err = String;

    /// Kind tags are case-sensitive, as in the Kubernetes API.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::all()
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("Unknown resource kind: {}", s))
    }
}

/// A generic K8s-style resource: type meta, object meta and a typed body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest<B> {
    pub api_version: String,

    pub kind: String,

    pub metadata: ObjectMeta,

    #[serde(flatten)]
    pub body: B,

    /// Observed state written by the store. Never compared, never sent by descriptors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<serde_json::Value>,
}

impl<B: ResourceBody> Manifest<B> {
    /// Creates a new resource with the given name and body.
    pub fn new(name: impl Into<String>, body: B) -> Self {
        Self {
            api_version: B::KIND.default_api_version().to_string(),
            kind: B::KIND.to_string(),
            metadata: ObjectMeta::new(name),
            body,
            status: None,
        }
    }

    /// Returns the name of the resource.
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Wraps this manifest into the closed [`ManagedResource`] sum type.
    pub fn into_managed(self) -> ManagedResource {
        B::wrap(self)
    }
}

/// Kind-specific payload of a [`Manifest`].
pub trait ResourceBody:
    Serialize + DeserializeOwned + Clone + PartialEq + fmt::Debug + Send + Sync + 'static
{
    /// Kind tag this body decodes from.
    const KIND: ResourceKind;

    /// Wraps a typed manifest into a [`ManagedResource`].
    fn wrap(manifest: Manifest<Self>) -> ManagedResource;

    /// Extracts a typed manifest; `None` if the resource is of another kind.
    fn unwrap(resource: ManagedResource) -> Option<Manifest<Self>>;

    /// The body as seen by change detection, relative to the desired body.
    ///
    /// Called on both sides of a comparison (for the desired side with itself).
    /// Kinds whose store fills in fields the descriptor left out override this.
    fn comparable(&self, _desired: &Self) -> Self {
        self.clone()
    }
}

/// A decoded resource of one of the recognized kinds.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ManagedResource {
    ConfigMap(Manifest<ConfigMapBody>),
    Secret(Manifest<SecretBody>),
    Deployment(Manifest<DeploymentBody>),
    DeploymentConfig(Manifest<DeploymentConfigBody>),
    ImageStream(Manifest<ImageStreamBody>),
    BuildConfig(Manifest<BuildConfigBody>),
    Route(Manifest<RouteBody>),
    Service(Manifest<ServiceBody>),
}

macro_rules! each_variant {
    ($value:expr, $r:ident => $body:expr) => {
        match $value {
            ManagedResource::ConfigMap($r) => $body,
            ManagedResource::Secret($r) => $body,
            ManagedResource::Deployment($r) => $body,
            ManagedResource::DeploymentConfig($r) => $body,
            ManagedResource::ImageStream($r) => $body,
            ManagedResource::BuildConfig($r) => $body,
            ManagedResource::Route($r) => $body,
            ManagedResource::Service($r) => $body,
        }
    };
}

impl ManagedResource {
    /// Returns the kind of this resource.
    pub fn kind(&self) -> ResourceKind {
        match self {
            ManagedResource::ConfigMap(_) => ResourceKind::ConfigMap,
            ManagedResource::Secret(_) => ResourceKind::Secret,
            ManagedResource::Deployment(_) => ResourceKind::Deployment,
            ManagedResource::DeploymentConfig(_) => ResourceKind::DeploymentConfig,
            ManagedResource::ImageStream(_) => ResourceKind::ImageStream,
            ManagedResource::BuildConfig(_) => ResourceKind::BuildConfig,
            ManagedResource::Route(_) => ResourceKind::Route,
            ManagedResource::Service(_) => ResourceKind::Service,
        }
    }

    /// Returns the metadata of this resource.
    pub fn metadata(&self) -> &ObjectMeta {
        each_variant!(self, r => &r.metadata)
    }

    /// Returns the mutable metadata of this resource.
    pub fn metadata_mut(&mut self) -> &mut ObjectMeta {
        each_variant!(self, r => &mut r.metadata)
    }

    /// Returns the name of this resource.
    pub fn name(&self) -> &str {
        &self.metadata().name
    }

    /// Returns the namespace of this resource, if set.
    pub fn namespace(&self) -> Option<&str> {
        self.metadata().namespace.as_deref()
    }

    /// Returns the store's version token, if any.
    pub fn resource_version(&self) -> Option<&str> {
        self.metadata().resource_version.as_deref()
    }
}

macro_rules! impl_resource_body {
    ($body:ty, $variant:ident $(, { $($overrides:tt)* })?) => {
        impl ResourceBody for $body {
            const KIND: ResourceKind = ResourceKind::$variant;

            fn wrap(manifest: Manifest<Self>) -> ManagedResource {
                ManagedResource::$variant(manifest)
            }

            fn unwrap(resource: ManagedResource) -> Option<Manifest<Self>> {
                match resource {
                    ManagedResource::$variant(manifest) => Some(manifest),
                    _ => None,
                }
            }

            $($($overrides)*)?
        }

        impl From<Manifest<$body>> for ManagedResource {
            fn from(manifest: Manifest<$body>) -> Self {
                ManagedResource::$variant(manifest)
            }
        }
    };
}

impl_resource_body!(ConfigMapBody, ConfigMap);
impl_resource_body!(SecretBody, Secret, {
    fn comparable(&self, _desired: &Self) -> Self {
        self.with_string_data_merged()
    }
});
impl_resource_body!(DeploymentBody, Deployment);
impl_resource_body!(DeploymentConfigBody, DeploymentConfig);
impl_resource_body!(ImageStreamBody, ImageStream);
impl_resource_body!(BuildConfigBody, BuildConfig);
impl_resource_body!(RouteBody, Route, {
    fn comparable(&self, desired: &Self) -> Self {
        self.without_generated_host(desired)
    }
});
impl_resource_body!(ServiceBody, Service, {
    fn comparable(&self, desired: &Self) -> Self {
        self.without_allocated_ips(desired)
    }
});

/// Type aliases for each managed kind.
pub type ConfigMap = Manifest<ConfigMapBody>;
pub type Secret = Manifest<SecretBody>;
pub type Deployment = Manifest<DeploymentBody>;
pub type DeploymentConfig = Manifest<DeploymentConfigBody>;
pub type ImageStream = Manifest<ImageStreamBody>;
pub type BuildConfig = Manifest<BuildConfigBody>;
pub type Route = Manifest<RouteBody>;
pub type Service = Manifest<ServiceBody>;
