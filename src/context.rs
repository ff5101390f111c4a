use core::fmt::{self, Display, Formatter};
use std::{borrow::Cow, sync::Arc};

use once_cell::sync::OnceCell;

use crate::{
    any::TypeInfo,
    container::Container,
    errors::{CyclePath, ProvisionErrorKind},
    key::{Key, Qualifier},
    provider::Instance,
    provider_of::Provider,
    resolver,
    scope::ScopeStrategy,
};

/// What kind of member the current resolution happens on behalf of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Constructor,
    Field,
    Method,
    Static,
}

/// The member on whose behalf the current resolution happens; attached to
/// runtime diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionPoint {
    pub target: TypeInfo,
    pub member: &'static str,
    pub kind: MemberKind,
}

impl Display for InjectionPoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.kind {
            MemberKind::Constructor => write!(f, "constructor `{}` of {}", self.member, self.target),
            MemberKind::Field => write!(f, "field `{}` of {}", self.member, self.target),
            MemberKind::Method => write!(f, "method `{}` of {}", self.member, self.target),
            MemberKind::Static => write!(f, "static member `{}` of {}", self.member, self.target),
        }
    }
}

pub(crate) type Slot = Arc<OnceCell<Instance>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FramePhase {
    Constructing,
    InjectingMembers,
}

/// One in-progress construction, keyed by the binding being built.
pub(crate) struct ConstructionFrame {
    pub(crate) key: Key,
    pub(crate) slot: Slot,
    pub(crate) phase: FramePhase,
}

/// Per-entry-call resolution state, threaded `&mut` through the whole
/// resolution so one logical graph spans user-authored providers.
///
/// A context is created on the stack by each public entry point and never
/// shared across threads.
pub struct ProvisionContext {
    pub(crate) container: Container,
    pub(crate) frames: Vec<ConstructionFrame>,
    pub(crate) point: Option<InjectionPoint>,
    pub(crate) strategy: Option<Arc<dyn ScopeStrategy>>,
}

impl ProvisionContext {
    #[must_use]
    pub(crate) fn new(container: Container) -> Self {
        let strategy = container.inner.strategy.clone();
        Self {
            container,
            frames: Vec::new(),
            point: None,
            strategy,
        }
    }

    /// The container this resolution runs against.
    #[inline]
    #[must_use]
    pub fn container(&self) -> &Container {
        &self.container
    }

    /// Resolves a shared dependency through the full mechanism.
    pub fn get<T: Send + Sync + 'static>(&mut self) -> Result<Arc<T>, ProvisionErrorKind> {
        self.get_by_key(Key::of::<T>())
    }

    /// Resolves a shared dependency under a qualifier.
    pub fn get_with<T: Send + Sync + 'static>(&mut self, qualifier: Qualifier) -> Result<Arc<T>, ProvisionErrorKind> {
        self.get_by_key(Key::of::<T>().with_qualifier(qualifier))
    }

    /// Resolves a shared dependency under a name qualifier.
    pub fn get_named<T: Send + Sync + 'static>(&mut self, name: impl Into<Cow<'static, str>>) -> Result<Arc<T>, ProvisionErrorKind> {
        self.get_with(Qualifier::named(name))
    }

    pub fn get_by_key<T: Send + Sync + 'static>(&mut self, key: Key) -> Result<Arc<T>, ProvisionErrorKind> {
        let instance = resolver::resolve(self, &key)?;
        downcast_shared(&key, instance)
    }

    /// Resolves an owned fresh instance from an unscoped binding.
    pub fn get_transient<T: Send + Sync + 'static>(&mut self) -> Result<T, ProvisionErrorKind> {
        self.get_transient_by_key(Key::of::<T>())
    }

    pub fn get_transient_by_key<T: Send + Sync + 'static>(&mut self, key: Key) -> Result<T, ProvisionErrorKind> {
        let instance = resolver::resolve_transient(self, &key)?;
        let shared = downcast_shared::<T>(&key, instance)?;
        Arc::try_unwrap(shared).map_err(|_| ProvisionErrorKind::NotTransient { key })
    }

    /// A bound accessor for `T`; created without materialising `T`.
    pub fn provider<T: Send + Sync + 'static>(&mut self) -> Result<Provider<T>, ProvisionErrorKind> {
        self.provider_by_key(Key::of::<T>())
    }

    pub fn provider_by_key<T: Send + Sync + 'static>(&mut self, key: Key) -> Result<Provider<T>, ProvisionErrorKind> {
        resolver::ensure_resolvable(&self.container, &key)?;
        Ok(Provider::new(self.container.clone(), key))
    }

    /// Applies the member levels of `T`'s injection plan to an existing
    /// instance within this resolution graph.
    pub fn inject_members<T: 'static>(&mut self, target: &T) -> Result<(), ProvisionErrorKind> {
        resolver::inject_members_dyn(self, TypeInfo::of::<T>(), target)
    }

    /// The member currently being provisioned, for diagnostics.
    #[inline]
    #[must_use]
    pub fn injection_point(&self) -> Option<&InjectionPoint> {
        self.point.as_ref()
    }

    /// The strategy a scope may consult for external scope decisions.
    #[inline]
    #[must_use]
    pub fn scope_strategy(&self) -> Option<&Arc<dyn ScopeStrategy>> {
        self.strategy.as_ref()
    }

    pub(crate) fn with_point<R>(&mut self, point: InjectionPoint, f: impl FnOnce(&mut Self) -> R) -> R {
        let previous = self.point.replace(point);
        let out = f(self);
        self.point = previous;
        out
    }

    pub(crate) fn find_frame(&self, key: &Key) -> Option<(usize, Slot, FramePhase)> {
        self.frames
            .iter()
            .position(|frame| frame.key == *key)
            .map(|ix| (ix, self.frames[ix].slot.clone(), self.frames[ix].phase))
    }

    pub(crate) fn push_frame(&mut self, key: Key) -> Slot {
        let slot: Slot = Arc::new(OnceCell::new());
        self.frames.push(ConstructionFrame {
            key,
            slot: slot.clone(),
            phase: FramePhase::Constructing,
        });
        slot
    }

    pub(crate) fn set_top_phase(&mut self, phase: FramePhase) {
        if let Some(frame) = self.frames.last_mut() {
            frame.phase = phase;
        }
    }

    pub(crate) fn pop_frame(&mut self) {
        self.frames.pop();
    }

    pub(crate) fn cycle_path(&self, from: usize, requested: &Key) -> CyclePath {
        debug_assert_eq!(&self.frames[from].key, requested);
        CyclePath(self.frames[from..].iter().map(|frame| frame.key.clone()).collect())
    }
}

pub(crate) fn downcast_shared<T: Send + Sync + 'static>(key: &Key, instance: Instance) -> Result<Arc<T>, ProvisionErrorKind> {
    let actual = (*instance).type_id();
    instance.downcast::<T>().map_err(|_| ProvisionErrorKind::IncorrectType {
        key: key.clone(),
        expected: TypeInfo::of::<T>(),
        actual,
    })
}
