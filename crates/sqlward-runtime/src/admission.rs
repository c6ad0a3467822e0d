//! Bounded-concurrency admission control.
//!
//! Every unit of database work holds one [`AdmissionSlot`] for its duration.
//! Slots are released when dropped, so every exit path gives its slot back.

use sqlward_core::CallContext;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionError {
    /// The caller's context finished while waiting for a slot.
    #[error("connection slots exhausted: all {capacity} slots are in use")]
    Exhausted { capacity: usize },

    #[error("admission pool capacity must be greater than zero")]
    ZeroCapacity,

    #[error("admission pool is closed")]
    Closed,
}

/// A fixed-capacity pool of execution slots.
#[derive(Debug, Clone)]
pub struct AdmissionPool {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// Exclusive hold on one slot until dropped.
#[derive(Debug)]
pub struct AdmissionSlot {
    _permit: OwnedSemaphorePermit,
}

impl AdmissionPool {
    /// A zero-capacity pool would block every call forever, so it is refused.
    pub fn new(capacity: usize) -> Result<Self, AdmissionError> {
        if capacity == 0 {
            return Err(AdmissionError::ZeroCapacity);
        }
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Wait for a free slot, giving up when `ctx` is cancelled or expires.
    pub async fn acquire(&self, ctx: &CallContext) -> Result<AdmissionSlot, AdmissionError> {
        if self.available() == 0 {
            debug!(capacity = self.capacity, "waiting for an admission slot");
        }
        let permit = tokio::select! {
            biased;
            permit = self.semaphore.clone().acquire_owned() => {
                permit.map_err(|_| AdmissionError::Closed)?
            }
            _ = ctx.done() => {
                warn!(capacity = self.capacity, "gave up waiting for an admission slot");
                return Err(AdmissionError::Exhausted {
                    capacity: self.capacity,
                });
            }
        };
        debug!(available = self.available(), "admission slot acquired");
        Ok(AdmissionSlot { _permit: permit })
    }
}
