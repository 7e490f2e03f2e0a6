//! Per-category serialization of rating writes
//!
//! Ratings within a category form a strict chain, so every writer of a
//! category goes through that category's lock. Different categories never
//! contend.

use crate::error::{LedgerError, Result};
use crate::types::Category;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Lazily created async mutex per category
#[derive(Debug, Default)]
pub struct CategoryLocks {
    locks: Mutex<HashMap<Category, Arc<AsyncMutex<()>>>>,
}

/// Held for as long as the category must stay exclusive
pub type CategoryGuard = OwnedMutexGuard<()>;

impl CategoryLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, category: &str) -> Result<Arc<AsyncMutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| LedgerError::persistence("Failed to acquire category lock table"))?;
        Ok(locks
            .entry(category.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone())
    }

    /// Wait until the category is free and take it
    pub async fn acquire(&self, category: &str) -> Result<CategoryGuard> {
        let lock = self.lock_for(category)?;
        Ok(lock.lock_owned().await)
    }

    /// Take the category only if nobody holds it
    #[cfg(test)]
    pub(crate) fn try_acquire(&self, category: &str) -> Result<Option<CategoryGuard>> {
        let lock = self.lock_for(category)?;
        Ok(lock.try_lock_owned().ok())
    }
}
