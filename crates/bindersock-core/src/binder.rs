//! Remote-object references.
//!
//! A reference is an `Arc` to a trait object. Identity is the identity of
//! the allocation: two references denote the same remote object exactly when
//! they point at the same `Arc` allocation, regardless of which interface
//! they are viewed through. Contents are never compared.
//!
//! Absent references are `None`. Every operation that accepts a reference
//! takes an `Option` so that "null" can be marshalled and rejected
//! explicitly.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::RpcResult;

/// Base of every object that can cross the RPC boundary.
#[async_trait]
pub trait Binder: Send + Sync + 'static {
    /// Interface descriptor, used in logs and for transaction routing.
    fn descriptor(&self) -> &'static str;

    /// Liveness probe.
    ///
    /// Local objects are always alive. Proxies for objects in other
    /// processes report `DeadObject` once the peer is gone.
    async fn ping(&self) -> RpcResult<()> {
        Ok(())
    }
}

/// Strong reference to any remote-invokable object.
pub type SpBinder = Arc<dyn Binder>;

/// Reference identity between two binders.
pub fn same_binder(a: &SpBinder, b: &SpBinder) -> bool {
    Arc::ptr_eq(a, b)
}

/// Reference identity across interface views.
///
/// `same_object(&session, &binder)` holds when `binder` is `session` upcast
/// to [`SpBinder`].
pub fn same_object<T: ?Sized, U: ?Sized>(a: &Arc<T>, b: &Arc<U>) -> bool {
    Arc::as_ptr(a).cast::<()>() == Arc::as_ptr(b).cast::<()>()
}

/// An object with no interface of its own.
///
/// Handed out where the suite only needs something with identity, such as
/// the singleton returned by `always_give_me_the_same_binder`.
#[derive(Debug, Default)]
pub struct LocalBinder;

impl LocalBinder {
    /// Create a new object as a shared reference.
    pub fn new_ref() -> SpBinder {
        Arc::new(Self)
    }
}

impl Binder for LocalBinder {
    fn descriptor(&self) -> &'static str {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_per_allocation() {
        let a = LocalBinder::new_ref();
        let a2 = Arc::clone(&a);
        let b = LocalBinder::new_ref();

        assert!(same_binder(&a, &a2));
        assert!(!same_binder(&a, &b));
    }

    #[test]
    fn identity_survives_upcast() {
        let concrete = Arc::new(LocalBinder);
        let erased: SpBinder = concrete.clone();

        assert!(same_object(&concrete, &erased));
        assert!(!same_object(&concrete, &LocalBinder::new_ref()));
    }

    #[tokio::test]
    async fn local_objects_are_alive() {
        assert_eq!(LocalBinder::new_ref().ping().await, Ok(()));
    }
}
