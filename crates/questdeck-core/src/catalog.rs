//! Seams to the surrounding application: the challenge catalog and the
//! administrator capability.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::CatalogError;
use crate::model::{Category, Challenge, ChallengeId, ChallengePatch, UserId};

/// Canonical challenge store plus the user and completion data the rotation
/// core reads.
pub trait Catalog: Send + Sync {
    /// All challenges of `category`.
    fn list_by_category(&self, category: Category) -> Result<Vec<Challenge>, CatalogError>;

    /// Every non-administrator user.
    fn list_user_ids(&self) -> Result<Vec<UserId>, CatalogError>;

    /// Ids of the challenges `user_id` has completed.
    fn get_completed_ids(&self, user_id: &str) -> Result<HashSet<ChallengeId>, CatalogError>;

    fn get_challenge(&self, challenge_id: &str) -> Result<Option<Challenge>, CatalogError>;

    /// Apply `patch` and return the updated record.
    ///
    /// # Errors
    /// [`CatalogError::NotFound`] when no such challenge exists.
    fn update_challenge(
        &self,
        challenge_id: &str,
        patch: &ChallengePatch,
    ) -> Result<Challenge, CatalogError>;

    /// Remove a challenge. Returns `false` if it was already gone.
    fn delete_challenge(&self, challenge_id: &str) -> Result<bool, CatalogError>;
}

/// Decides who may edit or delete catalog items.
pub trait AdminPolicy: Send + Sync {
    fn is_admin(&self, user_id: &str) -> bool;
}

/// Fixed administrator list, usually taken from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticAdmins {
    user_ids: HashSet<UserId>,
}

impl StaticAdmins {
    pub fn new<I, S>(user_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<UserId>,
    {
        Self {
            user_ids: user_ids.into_iter().map(Into::into).collect(),
        }
    }
}

impl AdminPolicy for StaticAdmins {
    fn is_admin(&self, user_id: &str) -> bool {
        self.user_ids.contains(user_id)
    }
}

/// Grants the capability if any inner policy does.
#[derive(Clone, Default)]
pub struct AnyAdmin {
    policies: Vec<Arc<dyn AdminPolicy>>,
}

impl AnyAdmin {
    pub fn new(policies: Vec<Arc<dyn AdminPolicy>>) -> Self {
        Self { policies }
    }
}

impl AdminPolicy for AnyAdmin {
    fn is_admin(&self, user_id: &str) -> bool {
        self.policies.iter().any(|p| p.is_admin(user_id))
    }
}
