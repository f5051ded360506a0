//! Work-time estimator
//!
//! Maps a purchase price and an hourly wage to the work time needed to
//! afford it, with a message tier the UI shows alongside the numbers.

use serde::{Deserialize, Serialize};

/// Hours in one working day for the days conversion
const HOURS_PER_WORK_DAY: i64 = 8;

/// Message tier selected from the estimated hours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateTier {
    /// 2 hours or less
    Quick,
    /// Up to a full shift (8 hours)
    Moderate,
    /// Up to three working days (24 hours)
    ThinkTwice,
    /// More than 24 hours
    Heavy,
}

impl EstimateTier {
    /// Tier thresholds on whole hours
    fn from_hours(hours: i64) -> Self {
        if hours <= 2 {
            EstimateTier::Quick
        } else if hours <= 8 {
            EstimateTier::Moderate
        } else if hours <= 24 {
            EstimateTier::ThinkTwice
        } else {
            EstimateTier::Heavy
        }
    }

    /// User-facing message for this tier
    pub fn message(&self) -> &'static str {
        match self {
            EstimateTier::Quick => "that's quick money! go for it bestie 💅",
            EstimateTier::Moderate => "a few hours of work - worth it? 🤔",
            EstimateTier::ThinkTwice => "that's like 1-3 days of work... think twice! 💭",
            EstimateTier::Heavy => "bestie... that's a lot of work hours 😬",
        }
    }
}

/// Work-time estimate for a purchase
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WorkTimeEstimate {
    /// Whole hours of work needed (rounded up, at least 1)
    pub hours: i64,
    /// Whole working days needed (8-hour days, rounded up, at least 1)
    pub days: i64,
    /// Message tier
    pub tier: EstimateTier,
}

/// Estimate the work time a purchase costs
///
/// Returns None when either input is non-positive or not finite; the
/// caller suppresses output rather than showing a nonsensical figure.
pub fn estimate(price: f64, hourly_wage: f64) -> Option<WorkTimeEstimate> {
    if !(price.is_finite() && hourly_wage.is_finite()) {
        return None;
    }
    if price <= 0.0 || hourly_wage <= 0.0 {
        return None;
    }

    let hours = (price / hourly_wage).ceil() as i64;
    let hours = hours.max(1);
    let days = (hours + HOURS_PER_WORK_DAY - 1) / HOURS_PER_WORK_DAY;

    Some(WorkTimeEstimate {
        hours,
        days,
        tier: EstimateTier::from_hours(hours),
    })
}
