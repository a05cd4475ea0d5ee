//! Serialized, re-entrancy guarded access to a controller.
//!
//! [`SharedController`] is the instance-wide guard: calls from other threads
//! queue on the lock, and a call that re-enters the controller from inside a
//! running operation (for example from a token authority or secondary
//! rewarder callback on the same thread) is rejected with
//! [`AuthError::Reentrant`] instead of deadlocking.

use std::cell::RefCell;

use parking_lot::ReentrantMutex;
use tracing::warn;
use trickle_core::error::{AuthError, TrickleError};
use trickle_core::store::RewardStore;

use crate::controller::RewardController;

/// A controller behind the instance-wide guard.
pub struct SharedController<S: RewardStore> {
    inner: ReentrantMutex<RefCell<RewardController<S>>>,
}

impl<S: RewardStore> SharedController<S> {
    pub fn new(controller: RewardController<S>) -> Self {
        Self { inner: ReentrantMutex::new(RefCell::new(controller)) }
    }

    /// Run a mutating operation with exclusive access.
    pub fn with<T>(
        &self,
        op: impl FnOnce(&mut RewardController<S>) -> Result<T, TrickleError>,
    ) -> Result<T, TrickleError> {
        let guard = self.inner.lock();
        let mut controller = guard.try_borrow_mut().map_err(|_| {
            warn!("controller: re-entrant call rejected");
            AuthError::Reentrant
        })?;
        op(&mut controller)
    }

    /// Run a query. Queries may run while no operation is in progress.
    pub fn read<T>(&self, query: impl FnOnce(&RewardController<S>) -> T) -> Result<T, TrickleError> {
        let guard = self.inner.lock();
        let controller = guard.try_borrow().map_err(|_| AuthError::Reentrant)?;
        Ok(query(&controller))
    }

    pub fn into_inner(self) -> RewardController<S> {
        self.inner.into_inner().into_inner()
    }
}
