//! Policy records and how the header middleware picks the policies that
//! apply to a request.

pub mod memory;

pub use memory::InMemoryPolicyStore;

use crate::core::{CspPolicy, DeliveryMethod, PolicyId};
use crate::error::CspError;
use indexmap::IndexMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionCriteria {
    /// Live requests only see policies marked live; draft requests see all.
    pub is_live: bool,
    pub delivery_method: DeliveryMethod,
    pub page_policy: Option<PolicyId>,
}

impl SelectionCriteria {
    #[inline]
    pub fn new(is_live: bool, delivery_method: DeliveryMethod) -> Self {
        Self {
            is_live,
            delivery_method,
            page_policy: None,
        }
    }

    #[inline]
    pub fn with_page_policy(mut self, page_policy: Option<PolicyId>) -> Self {
        self.page_policy = page_policy;
        self
    }
}

#[derive(Debug, Clone)]
pub struct PolicySelection {
    pub policy: Arc<CspPolicy>,
    pub merge_from: Option<Arc<CspPolicy>>,
}

#[derive(Debug, Clone, Default)]
pub struct PolicySnapshot {
    policies: IndexMap<PolicyId, Arc<CspPolicy>>,
}

impl PolicySnapshot {
    pub(crate) fn from_map(policies: IndexMap<PolicyId, Arc<CspPolicy>>) -> Self {
        Self { policies }
    }

    pub(crate) fn to_map(&self) -> IndexMap<PolicyId, Arc<CspPolicy>> {
        self.policies.clone()
    }

    #[inline]
    pub fn get(&self, id: PolicyId) -> Option<&Arc<CspPolicy>> {
        self.policies.get(&id)
    }

    #[inline]
    pub fn policies(&self) -> impl Iterator<Item = &Arc<CspPolicy>> {
        self.policies.values()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    pub fn base_policy(&self) -> Option<&Arc<CspPolicy>> {
        self.policies.values().find(|p| p.is_base_policy())
    }

    /// Picks the base policy for `criteria` and merges the page policy over
    /// it when one is linked and eligible. Without a base policy only the
    /// page policy is served; other policies never apply site-wide.
    ///
    /// Policies must be enabled, use the requested delivery method and, on
    /// live requests, be live. Ties among base candidates go to the lowest
    /// title.
    pub fn select(&self, criteria: &SelectionCriteria) -> Option<PolicySelection> {
        let base = self
            .policies
            .values()
            .filter(|p| p.is_base_policy() && is_eligible(p, criteria))
            .min_by(|a, b| {
                b.is_base_policy()
                    .cmp(&a.is_base_policy())
                    .then(b.is_enabled().cmp(&a.is_enabled()))
                    .then_with(|| a.title().cmp(b.title()))
            })
            .cloned();

        let page = criteria.page_policy.and_then(|id| match self.policies.get(&id) {
            Some(policy) if is_eligible(policy, criteria) => Some(policy.clone()),
            Some(_) => {
                log::debug!("Page policy {} is not eligible for this request", id);
                None
            }
            None => {
                log::warn!("Page policy {} does not exist", id);
                None
            }
        });

        match (page, base) {
            (Some(page), Some(base)) if page.id() != base.id() => Some(PolicySelection {
                policy: page,
                merge_from: Some(base),
            }),
            (Some(policy), _) | (None, Some(policy)) => Some(PolicySelection {
                policy,
                merge_from: None,
            }),
            (None, None) => None,
        }
    }
}

fn is_eligible(policy: &CspPolicy, criteria: &SelectionCriteria) -> bool {
    policy.is_enabled()
        && policy.delivery_method() == criteria.delivery_method
        && (!criteria.is_live || policy.is_live())
}

/// Storage seam for policy records. Reads hand out consistent snapshots;
/// writes keep at most one policy flagged as base.
pub trait PolicyStore: Send + Sync {
    fn snapshot(&self) -> Arc<PolicySnapshot>;

    /// Stores a new policy. If it is flagged as base, every other policy
    /// loses the flag in the same write.
    fn insert(&self, policy: CspPolicy) -> Result<PolicyId, CspError>;

    /// Replaces an existing policy, with the same base-flag handling as
    /// [`insert`](Self::insert).
    fn update(&self, policy: CspPolicy) -> Result<(), CspError>;

    fn remove(&self, id: PolicyId) -> Result<Arc<CspPolicy>, CspError>;

    fn set_base_policy(&self, id: PolicyId) -> Result<(), CspError>;

    fn get(&self, id: PolicyId) -> Option<Arc<CspPolicy>> {
        self.snapshot().get(id).cloned()
    }

    fn select(&self, criteria: &SelectionCriteria) -> Option<PolicySelection> {
        self.snapshot().select(criteria)
    }
}
