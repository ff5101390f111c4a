use core::fmt::{self, Debug, Formatter};
use std::{borrow::Cow, collections::BTreeMap, sync::Arc};

use crate::{
    any::TypeInfo,
    deferred::CycleBreaker,
    dependency::Dependency,
    key::Key,
    provider::BoxProvider,
    scope::{LoadStrategy, ScopePolicy},
};

/// The rule associating a key with a construction strategy and scope.
#[derive(Clone)]
pub struct Binding {
    pub(crate) key: Key,
    pub(crate) source: Cow<'static, str>,
    pub(crate) factory: BoxProvider,
    pub(crate) scoped: BoxProvider,
    pub(crate) scope: ScopePolicy,
    pub(crate) load: LoadStrategy,
    pub(crate) dependencies: Vec<Dependency>,
    pub(crate) breaker: Option<Arc<CycleBreaker>>,
}

impl Binding {
    #[inline]
    #[must_use]
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Where this binding was configured; diagnostics only.
    #[inline]
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[inline]
    #[must_use]
    pub fn scope(&self) -> ScopePolicy {
        self.scope
    }

    #[inline]
    #[must_use]
    pub fn load(&self) -> LoadStrategy {
        self.load
    }

    #[inline]
    #[must_use]
    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }
}

impl Debug for Binding {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("key", &self.key)
            .field("source", &self.source)
            .field("scope", &self.scope)
            .field("load", &self.load)
            .finish_non_exhaustive()
    }
}

/// The sealed binding map: one binding per key, iterable in
/// configuration-insertion order, with a secondary raw-type index for
/// listing.
pub(crate) struct BindingTable {
    entries: BTreeMap<Key, Binding>,
    order: Vec<Key>,
    by_raw: BTreeMap<TypeInfo, Vec<Key>>,
}

impl BindingTable {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            order: Vec::new(),
            by_raw: BTreeMap::new(),
        }
    }

    /// Inserts a binding; a duplicate key is refused and the existing
    /// binding's source is returned for the diagnostic.
    pub(crate) fn insert(&mut self, binding: Binding) -> Result<(), Cow<'static, str>> {
        if let Some(existing) = self.entries.get(&binding.key) {
            return Err(existing.source.clone());
        }
        let key = binding.key.clone();
        if let Some(raw) = key.raw() {
            self.by_raw.entry(raw).or_default().push(key.clone());
        }
        self.order.push(key.clone());
        self.entries.insert(key, binding);
        Ok(())
    }

    #[inline]
    #[must_use]
    pub(crate) fn get(&self, key: &Key) -> Option<&Binding> {
        self.entries.get(key)
    }

    #[must_use]
    pub(crate) fn find_by_raw_type(&self, raw: &TypeInfo) -> Vec<&Binding> {
        self.by_raw
            .get(raw)
            .map(|keys| keys.iter().filter_map(|key| self.entries.get(key)).collect())
            .unwrap_or_default()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Binding> {
        self.order.iter().filter_map(|key| self.entries.get(key))
    }

    pub(crate) fn keys(&self) -> impl Iterator<Item = &Key> {
        self.order.iter()
    }

    /// Display names of the qualifiers under which bindings to `raw` exist,
    /// for missing-binding suggestions.
    #[must_use]
    pub(crate) fn qualifiers_for_raw(&self, raw: Option<TypeInfo>) -> Vec<String> {
        let Some(raw) = raw else {
            return Vec::new();
        };
        self.find_by_raw_type(&raw)
            .into_iter()
            .filter_map(|binding| binding.key.qualifier().map(crate::key::Qualifier::display_name))
            .collect()
    }
}
