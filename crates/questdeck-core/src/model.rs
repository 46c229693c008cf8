//! Catalog records and per-user snapshots.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub type UserId = String;
pub type ChallengeId = String;

/// Rotation cadence a challenge belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Daily,
    Weekly,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Daily, Category::Weekly];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Daily => "daily",
            Category::Weekly => "weekly",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Category::Daily),
            "weekly" => Ok(Category::Weekly),
            other => Err(ValidationError::UnknownCategory(other.to_string())),
        }
    }
}

/// A catalog record. `id` never changes; everything else is editable by the
/// administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
    pub id: ChallengeId,
    pub title: String,
    pub text: String,
    pub category: Category,
    /// Mascot presenting the challenge.
    pub character: String,
    pub allows_drawing: bool,
    pub created_at: DateTime<Utc>,
}

impl Challenge {
    /// Overwrite the mutable fields present in `patch`.
    pub fn apply_patch(&mut self, patch: &ChallengePatch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(text) = &patch.text {
            self.text = text.clone();
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(character) = &patch.character {
            self.character = character.clone();
        }
        if let Some(allows_drawing) = patch.allows_drawing {
            self.allows_drawing = allows_drawing;
        }
    }
}

/// Subset of a challenge's mutable fields sent with an administrator edit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allows_drawing: Option<bool>,
}

impl ChallengePatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.text.is_none()
            && self.category.is_none()
            && self.character.is_none()
            && self.allows_drawing.is_none()
    }
}

/// A user's materialized selection for one category.
///
/// Items are ordered by slot; ids are unique within a selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedSelection {
    pub user_id: UserId,
    pub category: Category,
    pub items: Vec<Challenge>,
    pub timestamp: DateTime<Utc>,
}

impl CachedSelection {
    pub fn new(
        user_id: impl Into<UserId>,
        category: Category,
        items: Vec<Challenge>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            category,
            items,
            timestamp,
        }
    }

    /// Slot index holding `challenge_id`, if any.
    pub fn position_of(&self, challenge_id: &str) -> Option<usize> {
        self.items.iter().position(|c| c.id == challenge_id)
    }

    pub fn contains(&self, challenge_id: &str) -> bool {
        self.position_of(challenge_id).is_some()
    }

    pub fn ids(&self) -> HashSet<&str> {
        self.items.iter().map(|c| c.id.as_str()).collect()
    }

    pub fn has_unique_ids(&self) -> bool {
        self.ids().len() == self.items.len()
    }
}

/// A user's completion of a challenge. Owned by the surrounding app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRecord {
    pub user_id: UserId,
    pub challenge_id: ChallengeId,
    pub completed_at: DateTime<Utc>,
}
