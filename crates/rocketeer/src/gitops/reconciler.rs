//! Resource reconciler: decode → get → create or update, per kind.
//!
//! One [`KindHandler`] is registered per [`ResourceKind`]. The generic
//! [`TypedHandler`] does the work for every kind; kinds only differ in their body
//! type and in how that body is compared (see [`ResourceBody::comparable`]).

use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::diff;
use super::error::DescriptorError;
use super::report::Outcome;
use super::resource::{
    BuildConfigBody, ConfigMapBody, DeploymentBody, DeploymentConfigBody, ImageStreamBody,
    Manifest, ResourceBody, ResourceKind, RouteBody, SecretBody, ServiceBody,
};
use crate::store::{ResourceStore, StoreError, StoreOp};

/// What to do when the stored resource already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApplyPolicy {
    /// Update only when the stored projection differs from the descriptor.
    #[default]
    SkipUnchanged,
    /// Always send the descriptor as an overwrite update.
    AlwaysUpdate,
}

/// Everything a handler needs for one descriptor.
pub struct ApplyContext<'a> {
    pub store: &'a dyn ResourceStore,
    /// Namespace the resource is applied to, regardless of the file.
    pub namespace: &'a str,
    pub policy: ApplyPolicy,
    pub store_timeout: Duration,
}

/// Applies descriptors of one kind.
#[async_trait]
pub trait KindHandler: Send + Sync {
    fn kind(&self) -> ResourceKind;

    async fn apply(&self, ctx: &ApplyContext<'_>, payload: &[u8]) -> Outcome;
}

/// The [`KindHandler`] for body type `B`.
pub struct TypedHandler<B> {
    _body: PhantomData<fn() -> B>,
}

impl<B> Default for TypedHandler<B> {
    fn default() -> Self {
        Self { _body: PhantomData }
    }
}

impl<B: ResourceBody> TypedHandler<B> {
    /// Decodes the payload into the desired state for `namespace`.
    pub fn desired(&self, payload: &[u8], namespace: &str) -> Result<Manifest<B>, DescriptorError> {
        let mut desired: Manifest<B> =
            serde_yaml::from_slice(payload).map_err(|e| DescriptorError::Decode {
                kind: B::KIND.to_string(),
                message: e.to_string(),
            })?;

        desired.metadata.namespace = Some(namespace.to_string());
        desired.metadata.clear_store_managed();
        desired.status = None;
        Ok(desired)
    }

    async fn get(&self, ctx: &ApplyContext<'_>, name: &str) -> Result<Option<Manifest<B>>, StoreError> {
        let found = bounded(ctx.store_timeout, ctx.store.get(B::KIND, name, ctx.namespace)).await?;
        match found {
            None => Ok(None),
            Some(resource) => {
                let actual = resource.kind();
                B::unwrap(resource).map(Some).ok_or(StoreError::KindMismatch {
                    expected: B::KIND,
                    actual,
                })
            }
        }
    }
}

#[async_trait]
impl<B: ResourceBody> KindHandler for TypedHandler<B> {
    fn kind(&self) -> ResourceKind {
        B::KIND
    }

    async fn apply(&self, ctx: &ApplyContext<'_>, payload: &[u8]) -> Outcome {
        let mut desired = match self.desired(payload, ctx.namespace) {
            Ok(desired) => desired,
            Err(e) => return Outcome::Failed(e),
        };
        let name = desired.metadata.name.clone();
        let store_error = |op, source| {
            Outcome::Failed(DescriptorError::Store {
                op,
                kind: B::KIND.to_string(),
                name: name.clone(),
                source,
            })
        };

        let current = match self.get(ctx, &name).await {
            Ok(current) => current,
            Err(e) => return store_error(StoreOp::Get, e),
        };

        let Some(current) = current else {
            return match bounded(ctx.store_timeout, ctx.store.create(&desired.into_managed())).await {
                Ok(_) => {
                    info!(kind = %B::KIND, name = %name, "created");
                    Outcome::Created
                }
                Err(e) => store_error(StoreOp::Create, e),
            };
        };

        desired.metadata.resource_version = current.metadata.resource_version.clone();

        let unchanged = diff::equal(&desired, &current);
        if unchanged && ctx.policy == ApplyPolicy::SkipUnchanged {
            debug!(kind = %B::KIND, name = %name, "unchanged, skipping update");
            return Outcome::SkippedNoOp;
        }
        if unchanged {
            debug!(kind = %B::KIND, name = %name, "unchanged, updating anyway");
        } else {
            for change in diff::diff(&desired, &current) {
                debug!(kind = %B::KIND, name = %name, "{}", change);
            }
        }

        match bounded(ctx.store_timeout, ctx.store.update(&desired.into_managed())).await {
            Ok(_) => {
                info!(kind = %B::KIND, name = %name, "updated");
                Outcome::Updated
            }
            Err(e) => store_error(StoreOp::Update, e),
        }
    }
}

/// Bounds a store call by `timeout`.
async fn bounded<T>(
    timeout: Duration,
    call: impl Future<Output = Result<T, StoreError>>,
) -> Result<T, StoreError> {
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(timeout.as_secs())),
    }
}

/// Dispatches descriptors to the handler of their kind.
pub struct ResourceReconciler {
    store: Arc<dyn ResourceStore>,
    handlers: HashMap<ResourceKind, Box<dyn KindHandler>>,
    policy: ApplyPolicy,
    store_timeout: Duration,
}

impl ResourceReconciler {
    /// Creates a reconciler with a handler for every managed kind.
    pub fn new(store: Arc<dyn ResourceStore>, policy: ApplyPolicy, store_timeout: Duration) -> Self {
        let mut reconciler = Self {
            store,
            handlers: HashMap::new(),
            policy,
            store_timeout,
        };
        reconciler.register(TypedHandler::<ConfigMapBody>::default());
        reconciler.register(TypedHandler::<SecretBody>::default());
        reconciler.register(TypedHandler::<DeploymentBody>::default());
        reconciler.register(TypedHandler::<DeploymentConfigBody>::default());
        reconciler.register(TypedHandler::<ImageStreamBody>::default());
        reconciler.register(TypedHandler::<BuildConfigBody>::default());
        reconciler.register(TypedHandler::<RouteBody>::default());
        reconciler.register(TypedHandler::<ServiceBody>::default());
        reconciler
    }

    /// Registers a handler, replacing any previous one for the same kind.
    pub fn register(&mut self, handler: impl KindHandler + 'static) {
        self.handlers.insert(handler.kind(), Box::new(handler));
    }

    /// Applies one descriptor of a known kind into `namespace`.
    pub async fn reconcile(&self, kind: ResourceKind, namespace: &str, payload: &[u8]) -> Outcome {
        let Some(handler) = self.handlers.get(&kind) else {
            warn!(kind = %kind, "no handler registered");
            return Outcome::Unrecognized {
                kind: kind.to_string(),
            };
        };

        let ctx = ApplyContext {
            store: self.store.as_ref(),
            namespace,
            policy: self.policy,
            store_timeout: self.store_timeout,
        };
        handler.apply(&ctx, payload).await
    }
}
