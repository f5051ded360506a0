//! Savings goal model, progress messaging, and aggregate statistics

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Emoji choices offered by clients when creating or editing a goal
///
/// The server does not restrict stored emoji to this list; it only
/// publishes the list for pickers.
pub const EMOJI_OPTIONS: [&str; 10] =
    ["🎯", "💰", "🏠", "🚗", "✈️", "🎮", "📱", "👟", "🎧", "💻"];

/// Emoji applied when a goal is created without one
pub const DEFAULT_EMOJI: &str = "🎯";

/// A savings goal persisted in the database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: Uuid,
    /// Owning user, when authentication is in front of this service
    pub user_id: Option<String>,
    pub title: String,
    /// Strictly positive; enforced at creation and edit
    pub target_amount: f64,
    /// Never exceeds `target_amount`; money added past the target is clamped
    pub current_amount: f64,
    pub emoji: String,
    pub deadline: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Goal {
    /// Create a new goal starting at zero saved
    pub fn new(
        title: String,
        target_amount: f64,
        emoji: Option<String>,
        deadline: Option<NaiveDate>,
        user_id: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            title,
            target_amount,
            current_amount: 0.0,
            emoji: emoji.unwrap_or_else(|| DEFAULT_EMOJI.to_string()),
            deadline,
            created_at: now,
            updated_at: now,
        }
    }

    /// Progress toward the target as a percentage, capped at 100
    pub fn progress_percent(&self) -> f64 {
        if self.target_amount <= 0.0 {
            return 100.0;
        }
        (self.current_amount / self.target_amount * 100.0).min(100.0)
    }

    /// Whether the saved amount has reached the target
    pub fn is_complete(&self) -> bool {
        self.current_amount >= self.target_amount
    }

    /// Encouragement line for the current progress band
    pub fn motivational_message(&self) -> &'static str {
        let percentage = self.progress_percent();
        if percentage >= 100.0 {
            "goal crushed! you're a savings legend"
        } else if percentage >= 75.0 {
            "so close bestie! the finish line is right there"
        } else if percentage >= 50.0 {
            "halfway there! keep that momentum going"
        } else if percentage >= 25.0 {
            "making moves! small steps, big dreams"
        } else {
            "every rupee counts! you got this bestie"
        }
    }
}

/// Result of crediting money toward a goal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AddMoneyOutcome {
    /// Saved amount after the credit, clamped at the target
    pub new_amount: f64,
    /// True only when this credit crossed the target (false→true edge)
    pub completed: bool,
}

/// Credit `delta` toward a goal, clamping at the target
///
/// The completion flag fires only when the goal was incomplete before
/// and complete after; topping up an already-complete goal never
/// re-signals.
pub fn apply_add_money(current: f64, target: f64, delta: f64) -> AddMoneyOutcome {
    let new_amount = (current + delta).min(target);
    AddMoneyOutcome {
        new_amount,
        completed: new_amount >= target && current < target,
    }
}

/// Headline numbers for the stats strip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalStats {
    /// Sum of current amounts over goals touched this calendar month
    pub saved_this_month: f64,
    pub completed_goals: usize,
    pub total_goals: usize,
    /// Days since the first goal was created, at least 1; 0 with no goals
    pub streak_days: i64,
}

/// Compute the stats strip from the full goal list
pub fn compute_stats(goals: &[Goal], now: DateTime<Utc>) -> GoalStats {
    let saved_this_month = goals
        .iter()
        .filter(|g| g.updated_at.month() == now.month() && g.updated_at.year() == now.year())
        .map(|g| g.current_amount)
        .sum();

    let completed_goals = goals.iter().filter(|g| g.is_complete()).count();

    let streak_days = match goals.iter().map(|g| g.created_at).min() {
        Some(first) => (now - first).num_days().max(1),
        None => 0,
    };

    GoalStats {
        saved_this_month,
        completed_goals,
        total_goals: goals.len(),
        streak_days,
    }
}
