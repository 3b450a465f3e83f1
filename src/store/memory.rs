use crate::core::{CspPolicy, PolicyId};
use crate::error::CspError;
use crate::store::{PolicySnapshot, PolicyStore};
use arc_swap::ArcSwap;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::sync::Arc;

/// Process-local policy store.
///
/// Readers load the current snapshot without locking. Writers are
/// serialized, build the next snapshot from the current one and publish it
/// in a single swap, so a reader can never see two base policies.
pub struct InMemoryPolicyStore {
    current: ArcSwap<PolicySnapshot>,
    write_lock: Mutex<()>,
}

impl Default for InMemoryPolicyStore {
    fn default() -> Self {
        Self {
            current: ArcSwap::from_pointee(PolicySnapshot::default()),
            write_lock: Mutex::new(()),
        }
    }
}

impl InMemoryPolicyStore {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads policies in order. Later base flags win over earlier ones.
    pub fn with_policies(
        policies: impl IntoIterator<Item = CspPolicy>,
    ) -> Result<Self, CspError> {
        let store = Self::new();
        for policy in policies {
            store.insert(policy)?;
        }
        Ok(store)
    }

    pub fn from_json(json: &str) -> Result<Self, CspError> {
        let policies: Vec<CspPolicy> = serde_json::from_str(json)?;
        Self::with_policies(policies)
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&mut IndexMap<PolicyId, Arc<CspPolicy>>) -> Result<T, CspError>,
    ) -> Result<T, CspError> {
        let _guard = self.write_lock.lock();
        let mut next = self.current.load().to_map();
        let result = f(&mut next)?;
        self.current.store(Arc::new(PolicySnapshot::from_map(next)));
        Ok(result)
    }
}

fn clear_other_base_flags(policies: &mut IndexMap<PolicyId, Arc<CspPolicy>>, keep: PolicyId) {
    for (id, policy) in policies.iter_mut() {
        if *id != keep && policy.is_base_policy() {
            log::debug!("Clearing base flag on policy {} ({})", id, policy.title());
            Arc::make_mut(policy).set_base_policy(false);
        }
    }
}

impl PolicyStore for InMemoryPolicyStore {
    #[inline]
    fn snapshot(&self) -> Arc<PolicySnapshot> {
        self.current.load_full()
    }

    fn insert(&self, policy: CspPolicy) -> Result<PolicyId, CspError> {
        policy.validate()?;
        let id = policy.id();

        self.write(|policies| {
            if policies.contains_key(&id) {
                return Err(CspError::ValidationError(format!(
                    "Policy {} already exists",
                    id
                )));
            }
            if policy.is_base_policy() {
                clear_other_base_flags(policies, id);
            }
            policies.insert(id, Arc::new(policy));
            Ok(id)
        })
    }

    fn update(&self, policy: CspPolicy) -> Result<(), CspError> {
        policy.validate()?;
        let id = policy.id();

        self.write(|policies| {
            let slot = policies
                .get_mut(&id)
                .ok_or_else(|| CspError::PolicyNotFound(id.to_string()))?;
            let is_base = policy.is_base_policy();
            *slot = Arc::new(policy);
            if is_base {
                clear_other_base_flags(policies, id);
            }
            Ok(())
        })
    }

    fn remove(&self, id: PolicyId) -> Result<Arc<CspPolicy>, CspError> {
        self.write(|policies| {
            policies
                .shift_remove(&id)
                .ok_or_else(|| CspError::PolicyNotFound(id.to_string()))
        })
    }

    fn set_base_policy(&self, id: PolicyId) -> Result<(), CspError> {
        self.write(|policies| {
            let policy = policies
                .get_mut(&id)
                .ok_or_else(|| CspError::PolicyNotFound(id.to_string()))?;
            if !policy.is_base_policy() {
                Arc::make_mut(policy).set_base_policy(true);
            }
            clear_other_base_flags(policies, id);
            log::info!("Policy {} is now the base policy", id);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CspPolicyBuilder;

    #[test]
    fn writes_publish_new_snapshots() {
        let store = InMemoryPolicyStore::new();
        let before = store.snapshot();

        let id = store
            .insert(CspPolicyBuilder::new().title("a").build_unchecked())
            .unwrap();

        assert!(before.is_empty());
        assert_eq!(store.snapshot().len(), 1);
        assert_eq!(store.get(id).unwrap().title(), "a");
    }

    #[test]
    fn failed_write_leaves_snapshot_untouched() {
        let store = InMemoryPolicyStore::new();
        let policy = CspPolicyBuilder::new().title("a").build_unchecked();
        let duplicate = policy.clone();

        store.insert(policy).unwrap();
        let before = store.snapshot();
        assert!(store.insert(duplicate).is_err());
        assert!(Arc::ptr_eq(&before, &store.snapshot()));
    }
}
