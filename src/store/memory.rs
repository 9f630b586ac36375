use crate::error::StoreError;
use crate::state::BucketState;
use crate::store::Store;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Simple in-memory bucket store.
///
/// One lock guards the whole map, so every operation is serialized process-wide. Clones share
/// the same map. This is the reference behavior other backends should match.
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    data: Arc<Mutex<HashMap<String, BucketState>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored buckets.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // Every mutation is a single insert, so a poisoned map is still consistent.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, BucketState>> {
        self.data.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn get(&self, id: &str) -> Result<BucketState, StoreError> {
        self.lock().get(id).cloned().ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }

    async fn create(&self, state: &BucketState) -> Result<(), StoreError> {
        let mut guard = self.lock();
        if guard.contains_key(&state.id) {
            return Err(StoreError::AlreadyExists { id: state.id.clone() });
        }
        guard.insert(state.id.clone(), state.clone());
        Ok(())
    }

    async fn update(&self, state: &BucketState) -> Result<u64, StoreError> {
        let mut guard = self.lock();
        let stored = guard
            .get_mut(&state.id)
            .ok_or_else(|| StoreError::NotFound { id: state.id.clone() })?;

        // Optimistic lock check
        if stored.revision != state.revision {
            return Err(StoreError::RevisionMismatch {
                id: state.id.clone(),
                expected: state.revision,
                found: stored.revision,
            });
        }

        let revision = state.revision + 1;
        *stored = BucketState { revision, ..state.clone() };
        Ok(revision)
    }
}
