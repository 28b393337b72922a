//! Per-operation in-flight flags.
//!
//! A mutating operation holds a [`FlightGuard`] for as long as its request is
//! outstanding. A second call of the same kind fails fast with
//! `StorefrontError::InFlight` instead of issuing an overlapping request.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Operation, StorefrontError};

#[derive(Debug)]
pub(crate) struct InFlight {
    operation: Operation,
    busy: AtomicBool,
}

impl InFlight {
    pub(crate) const fn new(operation: Operation) -> Self {
        Self {
            operation,
            busy: AtomicBool::new(false),
        }
    }

    /// Claim the flag, or fail if a request of this kind is outstanding.
    pub(crate) fn try_begin(&self) -> Result<FlightGuard<'_>, StorefrontError> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| StorefrontError::InFlight(self.operation))?;
        Ok(FlightGuard { busy: &self.busy })
    }

    pub(crate) fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Releases the flag on drop, on every exit path.
#[derive(Debug)]
pub(crate) struct FlightGuard<'a> {
    busy: &'a AtomicBool,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}
