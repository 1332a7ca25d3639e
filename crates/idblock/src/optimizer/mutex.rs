use core::fmt;

use crate::error::Error;

#[cfg(not(feature = "parking-lot"))]
pub(crate) use std::sync::{Mutex, MutexGuard, PoisonError};

#[cfg(feature = "parking-lot")]
pub(crate) use parking_lot::{Mutex, MutexGuard};

/// The single guarded region holding an optimizer's counters.
///
/// Nothing outside the guard can touch the state, and the source call that
/// decides a refill happens while the guard is held.
#[derive(Debug)]
pub(crate) struct StateCell<S> {
    #[cfg(feature = "cache-padded")]
    inner: crossbeam_utils::CachePadded<Mutex<S>>,
    #[cfg(not(feature = "cache-padded"))]
    inner: Mutex<S>,
}

impl<S> StateCell<S> {
    pub(crate) fn new(state: S) -> Self {
        Self {
            #[cfg(feature = "cache-padded")]
            inner: crossbeam_utils::CachePadded::new(Mutex::new(state)),
            #[cfg(not(feature = "cache-padded"))]
            inner: Mutex::new(state),
        }
    }

    pub(crate) fn lock<E: fmt::Debug>(&self) -> Result<MutexGuard<'_, S>, Error<E>> {
        #[cfg(feature = "parking-lot")]
        {
            Ok(self.inner.lock())
        }
        #[cfg(not(feature = "parking-lot"))]
        {
            Ok(self.inner.lock()?)
        }
    }
}
