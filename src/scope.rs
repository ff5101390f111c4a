use std::{collections::BTreeMap, sync::Arc};

use once_cell::sync::OnceCell;
use parking_lot::{Mutex, ReentrantMutex};
use tracing::debug;

use crate::{
    errors::ProvisionErrorKind,
    key::Key,
    provider::{BoxProvider, Instance, Provide, ProvideResult},
};

/// Instance-identity policy configured on a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum ScopePolicy {
    /// Fresh instance per provision.
    #[default]
    NoScope,
    /// One instance per container.
    Singleton,
    /// A named scope from the container's scope map.
    Scoped(&'static str),
}

/// Whether a singleton is constructed at seal time or on first demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadStrategy {
    #[default]
    Lazy,
    Eager,
}

/// Seal-time construction policy for the whole container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stage {
    /// Only `Eager` bindings are constructed at seal.
    #[default]
    Development,
    /// Every singleton is constructed at seal.
    Production,
}

/// Transformer from an unscoped provider into a scoped one.
pub trait Scope: Send + Sync {
    #[must_use]
    fn name(&self) -> &'static str;

    #[must_use]
    fn wrap(&self, key: &Key, unscoped: BoxProvider) -> BoxProvider;
}

/// External scope decision a provisioning context can carry: where the
/// current request/session storage for a named scope lives.
pub trait ScopeStrategy: Send + Sync {
    #[must_use]
    fn storage(&self, scope_name: &'static str) -> Option<Arc<ScopeStorage>>;
}

/// One region's instance map for a local scope.
#[derive(Default)]
pub struct ScopeStorage {
    values: Mutex<BTreeMap<Key, Instance>>,
}

impl ScopeStorage {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn get_or_provide(&self, key: &Key, cx: &mut crate::context::ProvisionContext, unscoped: &BoxProvider) -> ProvideResult {
        if let Some(instance) = self.values.lock().get(key) {
            debug!("Found in scope storage");
            return Ok(instance.clone());
        }
        let instance = unscoped.provide(cx)?;
        Ok(self.values.lock().entry(key.clone()).or_insert(instance).clone())
    }
}

/// Container-lifetime identity: per-provider double-checked cache behind a
/// coarse re-entrant monitor shared by every singleton of one container, so
/// singletons constructing singletons cannot deadlock.
#[derive(Clone)]
pub(crate) struct SingletonScope {
    monitor: Arc<ReentrantMutex<()>>,
}

impl SingletonScope {
    #[must_use]
    pub(crate) fn new(monitor: Arc<ReentrantMutex<()>>) -> Self {
        Self { monitor }
    }
}

impl Scope for SingletonScope {
    fn name(&self) -> &'static str {
        "singleton"
    }

    fn wrap(&self, _key: &Key, unscoped: BoxProvider) -> BoxProvider {
        let cell: Arc<OnceCell<Instance>> = Arc::new(OnceCell::new());
        let monitor = self.monitor.clone();
        BoxProvider::from_fn(move |cx| {
            if let Some(instance) = cell.get() {
                debug!("Singleton found in cache");
                return Ok(instance.clone());
            }
            let _guard = monitor.lock();
            cell.get_or_try_init(|| unscoped.provide(cx)).cloned()
        })
    }
}

/// Request/session-local identity: instances are shared within one entered
/// region and dropped when it exits.
///
/// The provider first consults the provisioning context's [`ScopeStrategy`]
/// for externally-carried storage, then the scope's own entered region;
/// provisioning outside any region fails with
/// [`ProvisionErrorKind::OutOfScope`].
#[derive(Clone)]
pub struct LocalScope {
    name: &'static str,
    state: Arc<LocalState>,
}

#[derive(Default)]
struct LocalState {
    active: Mutex<Option<Arc<ScopeStorage>>>,
}

impl LocalScope {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Arc::new(LocalState::default()),
        }
    }

    /// Opens a region; the previous region's instances, if any, are
    /// discarded.
    #[must_use = "the region ends when the guard drops"]
    pub fn enter(&self) -> LocalScopeGuard {
        *self.state.active.lock() = Some(Arc::new(ScopeStorage::new()));
        debug!(scope = self.name, "Scope entered");
        LocalScopeGuard { scope: self.clone() }
    }

    pub fn exit(&self) {
        *self.state.active.lock() = None;
        debug!(scope = self.name, "Scope exited");
    }
}

impl Scope for LocalScope {
    fn name(&self) -> &'static str {
        self.name
    }

    fn wrap(&self, key: &Key, unscoped: BoxProvider) -> BoxProvider {
        let key = key.clone();
        let name = self.name;
        let state = self.state.clone();
        BoxProvider::from_fn(move |cx| {
            let strategy_storage = cx.scope_strategy().cloned().and_then(|strategy| strategy.storage(name));
            if let Some(storage) = strategy_storage {
                return storage.get_or_provide(&key, cx, &unscoped);
            }
            let active = state.active.lock().clone();
            match active {
                Some(storage) => storage.get_or_provide(&key, cx, &unscoped),
                None => Err(ProvisionErrorKind::OutOfScope {
                    scope: name,
                    key: key.clone(),
                }),
            }
        })
    }
}

pub struct LocalScopeGuard {
    scope: LocalScope,
}

impl Drop for LocalScopeGuard {
    fn drop(&mut self) {
        self.scope.exit();
    }
}

/// Applies a binding's scope policy, producing the provider the container
/// serves requests from.
pub(crate) fn apply_policy(
    policy: &ScopePolicy,
    key: &Key,
    raw: BoxProvider,
    singleton: &SingletonScope,
    named: &BTreeMap<&'static str, Arc<dyn Scope>>,
) -> Result<BoxProvider, ProvisionErrorKind> {
    match policy {
        ScopePolicy::NoScope => Ok(raw),
        ScopePolicy::Singleton => Ok(singleton.wrap(key, raw)),
        ScopePolicy::Scoped(name) => match named.get(name) {
            Some(scope) => Ok(scope.wrap(key, raw)),
            None => Err(ProvisionErrorKind::UnknownScope {
                scope: name,
                key: key.clone(),
            }),
        },
    }
}
