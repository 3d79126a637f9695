//! Renewal-period policy.
//!
//! Expiry is computed, not stored as a duration: every pass issued in the
//! same cycle expires at the next occurrence of a fixed calendar cutoff.
//! The default cutoff is May 31, the end of the academic year.

use crate::error::AllocationError;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A fixed day-of-month cutoff that validity windows run to.
///
/// `next_cutoff` is pure and shared by admission and renewal, so all passes
/// issued in one cycle share a single expiry regardless of when each holder
/// applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenewalPolicy {
    month: u32,
    day: u32,
}

impl RenewalPolicy {
    /// Creates a policy with the given cutoff month (1-12) and day of month.
    ///
    /// The date must exist in every calendar year, so February 29 is
    /// rejected along with out-of-range values.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::InvalidCutoff`] if the date does not exist
    /// in a non-leap year.
    pub fn new(month: u32, day: u32) -> Result<Self, AllocationError> {
        // 2001 is not a leap year, so any date valid there is valid everywhere.
        match NaiveDate::from_ymd_opt(2001, month, day) {
            Some(_) => Ok(Self { month, day }),
            None => Err(AllocationError::InvalidCutoff { month, day }),
        }
    }

    /// Cutoff month (1-12)
    #[must_use]
    pub const fn month(&self) -> u32 {
        self.month
    }

    /// Cutoff day of month
    #[must_use]
    pub const fn day(&self) -> u32 {
        self.day
    }

    /// The first cutoff strictly after `now`.
    ///
    /// Returns the end of the cutoff day in the current year, rolling to the
    /// same calendar date next year once `now` has passed it.
    #[must_use]
    pub fn next_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let this_year = self.cutoff_for_year(now.year());
        if this_year > now {
            this_year
        } else {
            self.cutoff_for_year(now.year() + 1)
        }
    }

    /// End of the cutoff day (23:59:59 UTC) in the given year.
    #[allow(clippy::expect_used)]
    fn cutoff_for_year(&self, year: i32) -> DateTime<Utc> {
        // (month, day) is validated at construction to exist in every year.
        NaiveDate::from_ymd_opt(year, self.month, self.day)
            .and_then(|date| date.and_hms_opt(23, 59, 59))
            .expect("validated cutoff date should exist in every year")
            .and_utc()
    }
}

impl Default for RenewalPolicy {
    /// May 31, the end-of-academic-year cutoff
    fn default() -> Self {
        Self { month: 5, day: 31 }
    }
}
