//! Fan-out of administrator catalog mutations into every user's snapshots.
//!
//! Each user is one independent unit of work: load both category snapshots,
//! patch or replace the affected slot, save. Units run as blocking tasks on
//! the tokio pool, bounded by a semaphore, and never share a storage key. A
//! failing unit is reported back and leaves the others alone; the user's
//! prior snapshot stays in effect until a later write succeeds.
//!
//! Candidate pools for replacements are fetched once per call, before any
//! unit is dispatched.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rand::prelude::*;
use rand_pcg::Mcg128Xsl64;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::cache::LocalCache;
use crate::catalog::{AdminPolicy, Catalog};
use crate::error::{CoreError, Result};
use crate::model::{CachedSelection, Category, Challenge, ChallengeId, ChallengePatch, UserId};
use crate::sampler::{rng_from_seed, sample_one};

/// Configuration for propagation fan-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropagationConfig {
    /// Maximum number of user units in flight
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Random seed for replacement draws (None = random)
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_max_concurrency() -> usize {
    8
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            seed: None,
        }
    }
}

/// Outcome of one propagation call, for caller-driven retry or backfill.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropagationReport {
    /// Users whose snapshots were rewritten
    pub updated_user_count: usize,
    /// Users whose unit failed, sorted
    pub failed_user_ids: Vec<UserId>,
}

/// What happened to a slot during a delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotChange {
    Replaced { slot: usize, with: ChallengeId },
    /// No eligible substitute; the selection shrank by one.
    Removed { slot: usize },
}

/// Overwrite the mutable fields of `challenge_id` in place.
///
/// Returns `None` when the selection does not reference the challenge.
/// Slot order, ids, and the timestamp are preserved.
pub fn patch_selection(
    selection: &CachedSelection,
    challenge_id: &str,
    patch: &ChallengePatch,
) -> Option<CachedSelection> {
    let slot = selection.position_of(challenge_id)?;
    let mut patched = selection.clone();
    patched.items[slot].apply_patch(patch);
    Some(patched)
}

/// Replace the deleted `challenge_id` with a random eligible item from
/// `pool`, or drop its slot when none is eligible.
///
/// Eligible items share the selection's category, are not the deleted item,
/// and are not already in the selection. Returns `None` when the selection
/// does not reference the challenge.
pub fn replace_in_selection<R: Rng + ?Sized>(
    selection: &CachedSelection,
    challenge_id: &str,
    pool: &[Challenge],
    rng: &mut R,
) -> Option<(CachedSelection, SlotChange)> {
    let slot = selection.position_of(challenge_id)?;
    let taken = selection.ids();
    let eligible: Vec<&Challenge> = pool
        .iter()
        .filter(|c| c.category == selection.category)
        .filter(|c| c.id != challenge_id && !taken.contains(c.id.as_str()))
        .collect();

    let mut updated = selection.clone();
    let change = match sample_one(&eligible, rng) {
        Some(replacement) => {
            updated.items[slot] = replacement.clone();
            SlotChange::Replaced {
                slot,
                with: replacement.id.clone(),
            }
        }
        None => {
            updated.items.remove(slot);
            SlotChange::Removed { slot }
        }
    };
    Some((updated, change))
}

enum Mutation {
    Edit {
        challenge_id: ChallengeId,
        patch: ChallengePatch,
    },
    Delete {
        challenge_id: ChallengeId,
        pools: HashMap<Category, Vec<Challenge>>,
    },
}

impl Mutation {
    fn challenge_id(&self) -> &str {
        match self {
            Mutation::Edit { challenge_id, .. } | Mutation::Delete { challenge_id, .. } => {
                challenge_id
            }
        }
    }

    fn apply<R: Rng + ?Sized>(
        &self,
        selection: &CachedSelection,
        rng: &mut R,
    ) -> Option<CachedSelection> {
        match self {
            Mutation::Edit {
                challenge_id,
                patch,
            } => patch_selection(selection, challenge_id, patch),
            Mutation::Delete {
                challenge_id,
                pools,
            } => {
                let pool = pools
                    .get(&selection.category)
                    .map(Vec::as_slice)
                    .unwrap_or(&[]);
                let (updated, change) = replace_in_selection(selection, challenge_id, pool, rng)?;
                debug!(
                    user_id = %selection.user_id,
                    category = %selection.category,
                    ?change,
                    "deleted challenge swapped out"
                );
                Some(updated)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitOutcome {
    Updated,
    Untouched,
    Failed,
}

fn apply_to_user<R: Rng + ?Sized>(
    cache: &LocalCache,
    user_id: &str,
    mutation: &Mutation,
    rng: &mut R,
) -> UnitOutcome {
    let mut updated = false;

    for category in Category::ALL {
        let selection = match cache.load(user_id, category) {
            Ok(Some(selection)) => selection,
            Ok(None) => continue,
            // Next read rotates a corrupt snapshot anyway.
            Err(e) if e.is_corrupt() => {
                debug!(user_id, %category, error = %e, "skipping corrupt snapshot");
                continue;
            }
            Err(e) => {
                warn!(user_id, %category, error = %e, "snapshot read failed during propagation");
                return UnitOutcome::Failed;
            }
        };

        let Some(next) = mutation.apply(&selection, rng) else {
            continue;
        };
        if let Err(e) = cache.save(&next) {
            warn!(user_id, %category, error = %e, "snapshot write failed during propagation");
            return UnitOutcome::Failed;
        }
        updated = true;
    }

    if updated {
        UnitOutcome::Updated
    } else {
        UnitOutcome::Untouched
    }
}

/// Pushes catalog edits and deletes into materialized snapshots.
#[derive(Clone)]
pub struct Propagator {
    cache: LocalCache,
    config: PropagationConfig,
    admins: Option<Arc<dyn AdminPolicy>>,
}

impl Propagator {
    pub fn new(cache: LocalCache, config: PropagationConfig) -> Self {
        Self {
            cache,
            config,
            admins: None,
        }
    }

    /// Also skip users `admins` recognizes, on top of the catalog's own
    /// non-administrator listing.
    pub fn with_admins(mut self, admins: Arc<dyn AdminPolicy>) -> Self {
        self.admins = Some(admins);
        self
    }

    pub fn config(&self) -> &PropagationConfig {
        &self.config
    }

    /// Rewrite the mutable fields of `challenge_id` in every snapshot that
    /// holds it.
    ///
    /// # Errors
    /// Fails before touching any snapshot if the user list cannot be read.
    pub async fn on_edit(
        &self,
        catalog: &dyn Catalog,
        challenge_id: &str,
        patch: &ChallengePatch,
    ) -> Result<PropagationReport> {
        let user_ids = self.audience(catalog)?;
        let mutation = Mutation::Edit {
            challenge_id: challenge_id.to_string(),
            patch: patch.clone(),
        };
        self.fan_out(user_ids, mutation).await
    }

    /// Replace or drop `challenge_id` in every snapshot that holds it.
    ///
    /// # Errors
    /// Fails before touching any snapshot if the user list or a candidate
    /// pool cannot be read.
    pub async fn on_delete(
        &self,
        catalog: &dyn Catalog,
        challenge_id: &str,
    ) -> Result<PropagationReport> {
        let user_ids = self.audience(catalog)?;
        let mut pools = HashMap::new();
        for category in Category::ALL {
            pools.insert(category, catalog.list_by_category(category)?);
        }
        let mutation = Mutation::Delete {
            challenge_id: challenge_id.to_string(),
            pools,
        };
        self.fan_out(user_ids, mutation).await
    }

    fn audience(&self, catalog: &dyn Catalog) -> Result<Vec<UserId>> {
        let mut user_ids = catalog.list_user_ids()?;
        if let Some(admins) = &self.admins {
            user_ids.retain(|user_id| !admins.is_admin(user_id));
        }
        Ok(user_ids)
    }

    async fn fan_out(&self, user_ids: Vec<UserId>, mutation: Mutation) -> Result<PropagationReport> {
        let mutation = Arc::new(mutation);
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut seeder = rng_from_seed(self.config.seed);
        let mut units = JoinSet::new();

        for user_id in user_ids.iter().cloned() {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| CoreError::Custom("propagation semaphore closed".into()))?;
            let cache = self.cache.clone();
            let mutation = Arc::clone(&mutation);
            let mut rng = Mcg128Xsl64::seed_from_u64(seeder.gen());

            units.spawn_blocking(move || {
                let _permit = permit;
                let outcome = apply_to_user(&cache, &user_id, &mutation, &mut rng);
                (user_id, outcome)
            });
        }

        let mut report = PropagationReport::default();
        let mut settled = HashSet::new();
        while let Some(joined) = units.join_next().await {
            match joined {
                Ok((user_id, outcome)) => {
                    match outcome {
                        UnitOutcome::Updated => report.updated_user_count += 1,
                        UnitOutcome::Untouched => {}
                        UnitOutcome::Failed => report.failed_user_ids.push(user_id.clone()),
                    }
                    settled.insert(user_id);
                }
                Err(e) => warn!(error = %e, "propagation unit aborted"),
            }
        }

        // Units that panicked never reported back.
        for user_id in user_ids {
            if !settled.contains(&user_id) && !report.failed_user_ids.contains(&user_id) {
                report.failed_user_ids.push(user_id);
            }
        }
        report.failed_user_ids.sort();

        info!(
            challenge_id = mutation.challenge_id(),
            updated = report.updated_user_count,
            failed = report.failed_user_ids.len(),
            "catalog mutation propagated"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn challenge(id: &str, category: Category) -> Challenge {
        Challenge {
            id: id.to_string(),
            title: format!("Title {id}"),
            text: format!("Text {id}"),
            category,
            character: "fox".to_string(),
            allows_drawing: false,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn daily(ids: &[&str]) -> CachedSelection {
        CachedSelection::new(
            "u1",
            Category::Daily,
            ids.iter().map(|id| challenge(id, Category::Daily)).collect(),
            Utc.with_ymd_and_hms(2024, 1, 3, 8, 0, 0).unwrap(),
        )
    }

    fn ids(selection: &CachedSelection) -> Vec<&str> {
        selection.items.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn patch_changes_fields_in_place() {
        let sel = daily(&["a", "b"]);
        let patch = ChallengePatch {
            title: Some("Renamed".into()),
            character: Some("bear".into()),
            ..Default::default()
        };
        let patched = patch_selection(&sel, "b", &patch).unwrap();

        assert_eq!(ids(&patched), vec!["a", "b"]);
        assert_eq!(patched.items[1].title, "Renamed");
        assert_eq!(patched.items[1].character, "bear");
        assert_eq!(patched.items[1].text, "Text b");
        assert_eq!(patched.items[0], sel.items[0]);
        assert_eq!(patched.timestamp, sel.timestamp);
    }

    #[test]
    fn patch_skips_unrelated_selection() {
        let patch = ChallengePatch {
            title: Some("x".into()),
            ..Default::default()
        };
        assert!(patch_selection(&daily(&["a"]), "z", &patch).is_none());
    }

    #[test]
    fn delete_replaces_slot_from_eligible_pool() {
        let sel = daily(&["a", "b"]);
        let pool = vec![
            challenge("a", Category::Daily),
            challenge("b", Category::Daily),
            challenge("c", Category::Daily),
            challenge("d", Category::Daily),
        ];
        for seed in 0..20 {
            let mut rng = rng_from_seed(Some(seed));
            let (updated, change) = replace_in_selection(&sel, "a", &pool, &mut rng).unwrap();
            let got = ids(&updated);
            assert!(got == vec!["c", "b"] || got == vec!["d", "b"], "got {got:?}");
            assert!(matches!(change, SlotChange::Replaced { slot: 0, .. }));
            assert_eq!(updated.timestamp, sel.timestamp);
        }
    }

    #[test]
    fn delete_without_candidates_drops_the_slot() {
        let sel = daily(&["a"]);
        let pool = vec![challenge("a", Category::Daily)];
        let mut rng = rng_from_seed(Some(1));
        let (updated, change) = replace_in_selection(&sel, "a", &pool, &mut rng).unwrap();
        assert!(updated.items.is_empty());
        assert_eq!(change, SlotChange::Removed { slot: 0 });
    }

    #[test]
    fn delete_ignores_other_categories_and_taken_ids() {
        let sel = daily(&["a", "b", "c"]);
        let pool = vec![
            challenge("b", Category::Daily),
            challenge("c", Category::Daily),
            challenge("w", Category::Weekly),
        ];
        let mut rng = rng_from_seed(Some(3));
        let (updated, change) = replace_in_selection(&sel, "b", &pool, &mut rng).unwrap();
        assert_eq!(ids(&updated), vec!["a", "c"]);
        assert_eq!(change, SlotChange::Removed { slot: 1 });
    }

    #[test]
    fn delete_skips_unrelated_selection() {
        let mut rng = rng_from_seed(Some(1));
        assert!(replace_in_selection(&daily(&["a"]), "z", &[], &mut rng).is_none());
    }
}
