//! Hides completed challenges from a selection.
//!
//! Filtering is presentation only. A completed item keeps its slot in the
//! stored selection until the next rotation or an administrator replacement,
//! so a user who finishes everything sees an empty list until then.

use std::collections::HashSet;

use crate::model::{CachedSelection, Challenge, ChallengeId};

/// Items of `selection` whose ids are not in `completed_ids`, in slot order.
pub fn visible(selection: &CachedSelection, completed_ids: &HashSet<ChallengeId>) -> Vec<Challenge> {
    selection
        .items
        .iter()
        .filter(|c| !completed_ids.contains(&c.id))
        .cloned()
        .collect()
}
