use core::marker::PhantomData;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::provider::Instance;

/// A reference slot that starts empty and is filled once the outer
/// construction of a cyclic dependency completes.
///
/// Proxy objects registered with
/// [`with_cycle_proxy`](crate::BindingBuilder::with_cycle_proxy) hold one of
/// these and forward their method calls through [`Deferred::get`].
pub struct Deferred<T> {
    slot: Arc<OnceCell<Instance>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Send + Sync + 'static> Deferred<T> {
    pub(crate) fn new(slot: Arc<OnceCell<Instance>>) -> Self {
        Self { slot, _marker: PhantomData }
    }

    /// The real instance, once the outer construction has installed it.
    #[must_use]
    pub fn try_get(&self) -> Option<Arc<T>> {
        self.slot.get().and_then(|instance| instance.clone().downcast::<T>().ok())
    }

    /// The real instance.
    ///
    /// # Panics
    /// Panics if called before the outer construction completed; a proxy
    /// method must not run inside the constructor chain it breaks.
    #[must_use]
    pub fn get(&self) -> Arc<T> {
        self.try_get()
            .expect("deferred reference used before its construction completed")
    }
}

/// Type-erased proxy factory stored on a binding; produces the
/// deferred-reference proxy for re-entrant requests during construction.
pub(crate) struct CycleBreaker(Box<dyn Fn(Arc<OnceCell<Instance>>) -> Instance + Send + Sync>);

impl CycleBreaker {
    pub(crate) fn new<T, F>(f: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(Deferred<T>) -> T + Send + Sync + 'static,
    {
        Self(Box::new(move |slot| Arc::new(f(Deferred::new(slot))) as Instance))
    }

    #[must_use]
    pub(crate) fn proxy(&self, slot: Arc<OnceCell<Instance>>) -> Instance {
        (self.0)(slot)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use once_cell::sync::OnceCell;

    use super::{CycleBreaker, Deferred};
    use crate::provider::Instance;

    #[test]
    fn test_empty_then_filled() {
        let slot: Arc<OnceCell<Instance>> = Arc::new(OnceCell::new());
        let deferred = Deferred::<u32>::new(slot.clone());

        assert!(deferred.try_get().is_none());

        slot.set(Arc::new(7_u32) as Instance).unwrap();
        assert_eq!(*deferred.get(), 7);
    }

    #[test]
    #[should_panic(expected = "before its construction completed")]
    fn test_get_before_construction_panics() {
        let slot: Arc<OnceCell<Instance>> = Arc::new(OnceCell::new());
        Deferred::<u32>::new(slot).get();
    }

    #[test]
    fn test_breaker_produces_forwarding_proxy() {
        struct Holder(Deferred<u32>);

        let breaker = CycleBreaker::new(Holder);
        let slot: Arc<OnceCell<Instance>> = Arc::new(OnceCell::new());

        let proxy = breaker.proxy(slot.clone());
        let holder = proxy.downcast::<Holder>().unwrap();

        slot.set(Arc::new(11_u32) as Instance).unwrap();
        assert_eq!(*holder.0.get(), 11);
    }
}
