//! Access level resolution and permission entailment.

use std::collections::{BTreeMap, BTreeSet};

use access_decision_sdk::{AccessLevel, ResourcePolicy, UserContext};

/// Determines the privilege ceiling a subject may hold on a resource,
/// independent of momentary risk.
#[derive(Debug, Clone, Default)]
pub struct AccessLevelResolver {
    default_permission_levels: BTreeMap<String, AccessLevel>,
}

impl AccessLevelResolver {
    #[must_use]
    pub fn new(default_permission_levels: BTreeMap<String, AccessLevel>) -> Self {
        Self {
            default_permission_levels,
        }
    }

    /// Minimum level entailing `permission` on this resource. The policy's own
    /// map wins over the defaults; a permission mapped to `Denied` is never
    /// grantable.
    fn required_level(&self, policy: &ResourcePolicy, permission: &str) -> Option<AccessLevel> {
        policy
            .permissions
            .get(permission)
            .or_else(|| self.default_permission_levels.get(permission))
            .copied()
            .filter(|level| *level != AccessLevel::Denied)
    }

    /// Resolve the access tier for `user` on the resource governed by `policy`.
    ///
    /// The result is the user's entitlement for the policy's resource class,
    /// lowered to the highest level any known requested permission needs.
    /// `Denied` when the user has no entitlement for the class or when none of
    /// the requested permissions is grantable within the entitlement.
    #[must_use]
    pub fn resolve(
        &self,
        user: &UserContext,
        policy: &ResourcePolicy,
        requested: &BTreeSet<String>,
    ) -> AccessLevel {
        let ceiling = user.entitlement_for(&policy.resource_class);
        if ceiling == AccessLevel::Denied {
            return AccessLevel::Denied;
        }

        let mut needed = AccessLevel::Denied;
        let mut any_within_ceiling = false;
        for level in requested
            .iter()
            .filter_map(|permission| self.required_level(policy, permission))
        {
            needed = needed.max(level);
            any_within_ceiling |= level <= ceiling;
        }

        if any_within_ceiling {
            ceiling.min(needed)
        } else {
            AccessLevel::Denied
        }
    }

    /// Requested permissions entailed by `level` on this resource.
    #[must_use]
    pub fn entailed_permissions(
        &self,
        level: AccessLevel,
        policy: &ResourcePolicy,
        requested: &BTreeSet<String>,
    ) -> BTreeSet<String> {
        if level == AccessLevel::Denied {
            return BTreeSet::new();
        }
        requested
            .iter()
            .filter(|permission| {
                self.required_level(policy, permission)
                    .is_some_and(|required| required <= level)
            })
            .cloned()
            .collect()
    }
}
