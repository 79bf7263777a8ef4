//! Element proxies over local providers.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::VabError;
use crate::path::ElementPath;
use crate::provider::ModelProvider;
use crate::value::Value;

/// Client-side handle on a subtree of a provider's model.
///
/// Every path given to a proxy is relative to the proxy's base path; the
/// proxy composes the two before forwarding.
pub trait ElementProxy {
    /// Reads the element at the relative path.
    fn read(&self, path: &ElementPath) -> Result<Value, VabError>;

    /// Overwrites the existing element at the relative path.
    fn update(&self, path: &ElementPath, value: Value) -> Result<(), VabError>;

    /// Creates a new element at the relative path.
    fn create(&self, path: &ElementPath, value: Value) -> Result<(), VabError>;

    /// Deletes the element at the relative path.
    fn delete(&self, path: &ElementPath) -> Result<(), VabError>;

    /// Deletes the matching member from the collection at the relative path.
    fn delete_value(&self, path: &ElementPath, value: &Value) -> Result<(), VabError>;

    /// Invokes the function at the relative path.
    fn invoke(&self, path: &ElementPath, params: Vec<Value>) -> Result<Value, VabError>;

    /// The base path this proxy is scoped to.
    fn address_path(&self) -> &ElementPath;
}

/// Proxy onto a provider living in the same process.
///
/// The provider sits behind a shared handle, so deep proxies and the
/// hosting side observe the same tree.
#[derive(Debug)]
pub struct LocalProxy<P> {
    provider: Arc<Mutex<P>>,
    base: ElementPath,
}

impl<P> Clone for LocalProxy<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            base: self.base.clone(),
        }
    }
}

impl<P: ModelProvider> LocalProxy<P> {
    /// Root-scoped proxy over a shared provider.
    pub fn new(provider: Arc<Mutex<P>>) -> Self {
        Self {
            provider,
            base: ElementPath::root(),
        }
    }

    /// Proxy scoped to `base` over a shared provider.
    pub fn with_base(provider: Arc<Mutex<P>>, base: ElementPath) -> Self {
        Self { provider, base }
    }

    /// A proxy scoped to a sub-path. The provider handle is shared; the
    /// returned proxy is a lightweight view, not a copy of any state.
    #[must_use]
    pub fn deep_proxy(&self, relative: &ElementPath) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            base: self.base.join(relative),
        }
    }

    fn guard(&self) -> Result<MutexGuard<'_, P>, VabError> {
        self.provider
            .lock()
            .map_err(|_| VabError::Provider("provider lock poisoned".into()))
    }
}

impl<P: ModelProvider> ElementProxy for LocalProxy<P> {
    fn read(&self, path: &ElementPath) -> Result<Value, VabError> {
        self.guard()?.get(&self.base.join(path))
    }

    fn update(&self, path: &ElementPath, value: Value) -> Result<(), VabError> {
        self.guard()?.set(&self.base.join(path), value)
    }

    fn create(&self, path: &ElementPath, value: Value) -> Result<(), VabError> {
        self.guard()?.create(&self.base.join(path), value)
    }

    fn delete(&self, path: &ElementPath) -> Result<(), VabError> {
        self.guard()?.delete(&self.base.join(path))
    }

    fn delete_value(&self, path: &ElementPath, value: &Value) -> Result<(), VabError> {
        self.guard()?.delete_value(&self.base.join(path), value)
    }

    fn invoke(&self, path: &ElementPath, params: Vec<Value>) -> Result<Value, VabError> {
        self.guard()?.invoke(&self.base.join(path), params)
    }

    fn address_path(&self) -> &ElementPath {
        &self.base
    }
}
