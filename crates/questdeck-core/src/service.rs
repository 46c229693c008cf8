//! Caller-facing entry points: the user read path and the administrator
//! mutation path.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rand_pcg::Mcg128Xsl64;
use tracing::{info, warn};

use crate::cache::LocalCache;
use crate::catalog::{AdminPolicy, Catalog};
use crate::completion;
use crate::error::{CoreError, Result, ValidationError};
use crate::model::{CachedSelection, Category, Challenge, ChallengePatch};
use crate::propagation::{PropagationConfig, PropagationReport, Propagator};
use crate::rotation::RotationConfig;
use crate::sampler::{rng_from_seed, sample};

/// Rotation, completion filtering and admin propagation wired to one
/// catalog and one snapshot cache.
pub struct ChallengeService {
    catalog: Arc<dyn Catalog>,
    admins: Arc<dyn AdminPolicy>,
    cache: LocalCache,
    propagator: Propagator,
    rotation: RotationConfig,
    rng: Mutex<Mcg128Xsl64>,
}

impl ChallengeService {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        admins: Arc<dyn AdminPolicy>,
        cache: LocalCache,
        rotation: RotationConfig,
        propagation: PropagationConfig,
    ) -> Self {
        let rng = Mutex::new(rng_from_seed(rotation.seed));
        Self {
            propagator: Propagator::new(cache.clone(), propagation).with_admins(admins.clone()),
            catalog,
            admins,
            cache,
            rotation,
            rng,
        }
    }

    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    pub fn rotation(&self) -> &RotationConfig {
        &self.rotation
    }

    /// The user's current challenges for `category`, rotated if stale and
    /// minus anything already completed.
    ///
    /// Never fails: a broken catalog or store degrades to the previous
    /// snapshot, or to an empty list when there is none.
    pub fn get_visible_challenges(&self, user_id: &str, category: Category) -> Vec<Challenge> {
        self.get_visible_challenges_at(user_id, category, Utc::now())
    }

    /// [`get_visible_challenges`](Self::get_visible_challenges) at a fixed instant.
    pub fn get_visible_challenges_at(
        &self,
        user_id: &str,
        category: Category,
        now: DateTime<Utc>,
    ) -> Vec<Challenge> {
        let selection = match self.current_selection(user_id, category, now) {
            Ok(selection) => selection,
            Err(e) => {
                warn!(user_id, %category, error = %e, "no selection available");
                return Vec::new();
            }
        };

        match self.catalog.get_completed_ids(user_id) {
            Ok(completed) => completion::visible(&selection, &completed),
            Err(e) => {
                warn!(user_id, %category, error = %e, "completion lookup failed");
                Vec::new()
            }
        }
    }

    /// Load the user's snapshot, resampling it first when the rotation
    /// boundary has passed.
    ///
    /// An unreadable snapshot counts as absent. If the catalog cannot be
    /// queried the stale snapshot is kept; without one the error is
    /// returned. A failed write is logged and the fresh draw is still
    /// returned.
    ///
    /// # Errors
    /// Returns the catalog error when rotation is due, the pool cannot be
    /// fetched, and no prior snapshot exists.
    pub fn current_selection(
        &self,
        user_id: &str,
        category: Category,
        now: DateTime<Utc>,
    ) -> Result<CachedSelection> {
        let existing = self.cache.load(user_id, category).unwrap_or_else(|e| {
            warn!(user_id, %category, error = %e, "treating unreadable snapshot as absent");
            None
        });

        let last = existing.as_ref().map(|s| s.timestamp);
        if !self.rotation.is_due(category, last, now) {
            if let Some(selection) = existing {
                return Ok(selection);
            }
        }

        let pool = match self.catalog.list_by_category(category) {
            Ok(pool) => dedup_by_id(pool),
            Err(e) => {
                return match existing {
                    Some(stale) => {
                        warn!(user_id, %category, error = %e, "rotation skipped, keeping stale snapshot");
                        Ok(stale)
                    }
                    None => Err(e.into()),
                }
            }
        };

        let items = sample(&pool, self.rotation.target_count(category), &mut *self.rng());
        let selection = CachedSelection::new(user_id, category, items, now);
        if let Err(e) = self.cache.save(&selection) {
            warn!(user_id, %category, error = %e, "rotated snapshot not persisted");
        }
        info!(
            user_id,
            %category,
            items = selection.items.len(),
            pool = pool.len(),
            "selection rotated"
        );
        Ok(selection)
    }

    /// Edit a catalog challenge and patch every snapshot holding it.
    ///
    /// # Errors
    /// [`CoreError::Unauthorized`] for non-administrators, a validation error
    /// for an empty patch, and catalog errors from the update or user list.
    pub async fn admin_edit_challenge(
        &self,
        actor: &str,
        challenge_id: &str,
        patch: ChallengePatch,
    ) -> Result<PropagationReport> {
        self.authorize(actor, "edit challenges")?;
        if patch.is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "patch".into(),
                message: "no fields to update".into(),
            }
            .into());
        }

        self.catalog.update_challenge(challenge_id, &patch)?;
        info!(actor, challenge_id, "challenge edited");
        self.propagator
            .on_edit(self.catalog.as_ref(), challenge_id, &patch)
            .await
    }

    /// Delete a catalog challenge and replace it in every snapshot holding
    /// it.
    ///
    /// Deleting an already-deleted challenge still propagates, so the call
    /// doubles as a backfill for users a previous attempt failed on.
    ///
    /// # Errors
    /// [`CoreError::Unauthorized`] for non-administrators, catalog errors
    /// from the delete, user list, or pool queries.
    pub async fn admin_delete_challenge(
        &self,
        actor: &str,
        challenge_id: &str,
    ) -> Result<PropagationReport> {
        self.authorize(actor, "delete challenges")?;

        if self.catalog.delete_challenge(challenge_id)? {
            info!(actor, challenge_id, "challenge deleted");
        } else {
            info!(actor, challenge_id, "challenge already gone, re-propagating");
        }
        self.propagator
            .on_delete(self.catalog.as_ref(), challenge_id)
            .await
    }

    fn authorize(&self, actor: &str, action: &'static str) -> Result<()> {
        if self.admins.is_admin(actor) {
            Ok(())
        } else {
            warn!(actor, action, "rejected non-admin mutation");
            Err(CoreError::Unauthorized {
                user_id: actor.to_string(),
                action,
            })
        }
    }

    fn rng(&self) -> MutexGuard<'_, Mcg128Xsl64> {
        self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Keep the first occurrence of each id, preserving order.
fn dedup_by_id(pool: Vec<Challenge>) -> Vec<Challenge> {
    let mut seen = HashSet::with_capacity(pool.len());
    pool.into_iter().filter(|c| seen.insert(c.id.clone())).collect()
}
