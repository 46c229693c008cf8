//! Rotation boundaries for cached selections.
//!
//! Daily selections turn over when the local calendar date changes. Weekly
//! selections only turn over on a Monday, and only once at least seven whole
//! days have passed since the snapshot was taken; on any other weekday the
//! snapshot is kept no matter how old it is.

use chrono::{DateTime, Datelike, FixedOffset, Local, Offset, TimeZone, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::model::Category;

/// Minimum age, in whole days, before a weekly snapshot may rotate.
pub const WEEKLY_MIN_AGE_DAYS: i64 = 7;

/// Decide whether a category's snapshot must be resampled.
///
/// `last` is the snapshot timestamp, `None` when no snapshot exists. Both
/// instants are read in their own time zone, so callers should convert them
/// to the user's local zone first.
pub fn should_rotate<Tz: TimeZone>(
    category: Category,
    last: Option<&DateTime<Tz>>,
    now: &DateTime<Tz>,
) -> bool {
    let Some(last) = last else {
        return true;
    };

    match category {
        Category::Daily => last.date_naive() != now.date_naive(),
        Category::Weekly => {
            let elapsed = now.clone().signed_duration_since(last.clone());
            now.weekday() == Weekday::Mon && elapsed.num_days() >= WEEKLY_MIN_AGE_DAYS
        }
    }
}

/// Rotation settings: how many items each category holds and which local
/// zone defines a calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationConfig {
    #[serde(default = "default_daily_count")]
    pub daily_count: usize,
    #[serde(default = "default_weekly_count")]
    pub weekly_count: usize,
    /// Offset east of UTC in minutes. Unset means the host's local zone.
    #[serde(default)]
    pub utc_offset_minutes: Option<i32>,
    /// Seed for rotation sampling (None = entropy)
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_daily_count() -> usize {
    2
}
fn default_weekly_count() -> usize {
    3
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            daily_count: default_daily_count(),
            weekly_count: default_weekly_count(),
            utc_offset_minutes: None,
            seed: None,
        }
    }
}

impl RotationConfig {
    /// Number of slots a full selection of `category` holds.
    pub fn target_count(&self, category: Category) -> usize {
        match category {
            Category::Daily => self.daily_count,
            Category::Weekly => self.weekly_count,
        }
    }

    /// Fixed zone used to read calendar dates and weekdays, or `None` to
    /// follow the host's local zone.
    pub fn offset(&self) -> Option<FixedOffset> {
        let minutes = self.utc_offset_minutes?;
        Some(FixedOffset::east_opt(minutes.saturating_mul(60)).unwrap_or_else(|| {
            tracing::warn!(minutes, "utc offset out of range, falling back to UTC");
            Utc.fix()
        }))
    }

    /// [`should_rotate`] evaluated in the configured local zone.
    ///
    /// Without a fixed offset each instant is read with the host offset in
    /// effect at that instant, so DST changes land on the right date.
    pub fn is_due(&self, category: Category, last: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match self.offset() {
            Some(offset) => is_due_in(&offset, category, last, now),
            None => is_due_in(&Local, category, last, now),
        }
    }
}

/// [`should_rotate`] with both instants converted into `tz`.
pub fn is_due_in<Tz: TimeZone>(
    tz: &Tz,
    category: Category,
    last: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    let last = last.map(|t| t.with_timezone(tz));
    should_rotate(category, last.as_ref(), &now.with_timezone(tz))
}
