//! Per-prediction claims shared by every cadence.
//!
//! A prediction is processed by at most one worker at a time. The claim is
//! released when the guard drops, whether the work finished or bailed out.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Default)]
pub struct ClaimSet {
    inner: Arc<Mutex<HashSet<i64>>>,
}

/// Held while a prediction is being fetched, evaluated and written.
#[derive(Debug)]
pub struct Claim {
    id: i64,
    set: ClaimSet,
}

impl ClaimSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `id`, or `None` if another worker holds it.
    pub fn try_claim(&self, id: i64) -> Option<Claim> {
        if self.lock().insert(id) {
            Some(Claim {
                id,
                set: self.clone(),
            })
        } else {
            None
        }
    }

    pub fn is_claimed(&self, id: i64) -> bool {
        self.lock().contains(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<i64>> {
        // The set holds plain ids; a panic elsewhere cannot leave it half-updated.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Claim {
    pub fn id(&self) -> i64 {
        self.id
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        self.set.lock().remove(&self.id);
    }
}
