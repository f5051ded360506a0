//! Savings goal API handlers
//!
//! CRUD plus incremental add-money against the persisted goals, the
//! stats strip, and the emoji picker choices. Add-money is the only
//! path that mutates `current_amount`, so the completion edge can only
//! fire there; field edits never re-signal.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ssb_common::events::SsbEvent;

use crate::db::goals as goals_db;
use crate::error::{ApiError, ApiResult};
use crate::models::goal::{self, Goal, GoalStats, EMOJI_OPTIONS};
use crate::AppState;

/// Goal representation served to clients
///
/// The stored record plus derived progress and the message for the
/// current progress band.
#[derive(Debug, Serialize)]
pub struct GoalView {
    #[serde(flatten)]
    pub goal: Goal,
    pub progress_percent: f64,
    pub message: &'static str,
}

impl From<Goal> for GoalView {
    fn from(goal: Goal) -> Self {
        let progress_percent = goal.progress_percent();
        let message = goal.motivational_message();
        Self {
            goal,
            progress_percent,
            message,
        }
    }
}

/// POST /api/goals request
#[derive(Debug, Deserialize)]
pub struct CreateGoalRequest {
    pub title: String,
    pub target_amount: f64,
    pub emoji: Option<String>,
    pub deadline: Option<NaiveDate>,
}

/// PATCH /api/goals/{id} request; absent fields stay unchanged
#[derive(Debug, Deserialize)]
pub struct UpdateGoalRequest {
    pub title: Option<String>,
    pub target_amount: Option<f64>,
    pub emoji: Option<String>,
    pub deadline: Option<NaiveDate>,
}

/// POST /api/goals/{id}/add request
#[derive(Debug, Deserialize)]
pub struct AddMoneyRequest {
    pub amount: f64,
}

/// POST /api/goals/{id}/add response
#[derive(Debug, Serialize)]
pub struct AddMoneyResponse {
    pub goal: GoalView,
    /// True only when this credit crossed the target
    pub completed: bool,
}

/// GET /api/goals
///
/// All goals, newest first.
pub async fn list_goals(State(state): State<AppState>) -> ApiResult<Json<Vec<GoalView>>> {
    let goals = goals_db::list_goals(&state.db).await?;
    Ok(Json(goals.into_iter().map(GoalView::from).collect()))
}

/// POST /api/goals
///
/// Create a goal starting at zero saved.
pub async fn create_goal(
    State(state): State<AppState>,
    Json(request): Json<CreateGoalRequest>,
) -> ApiResult<Json<GoalView>> {
    let title = request.title.trim();
    if title.is_empty() {
        return Err(ApiError::BadRequest("title must not be empty".to_string()));
    }
    if !request.target_amount.is_finite() || request.target_amount <= 0.0 {
        return Err(ApiError::BadRequest(
            "target_amount must be a positive number".to_string(),
        ));
    }

    let goal = Goal::new(
        title.to_string(),
        request.target_amount,
        request.emoji.filter(|e| !e.trim().is_empty()),
        request.deadline,
        None,
    );
    goals_db::insert_goal(&state.db, &goal).await?;

    tracing::info!(goal_id = %goal.id, title = %goal.title, "Goal created");
    state.event_bus.emit_lossy(SsbEvent::GoalCreated {
        goal_id: goal.id,
        title: goal.title.clone(),
        timestamp: Utc::now(),
    });

    Ok(Json(GoalView::from(goal)))
}

/// PATCH /api/goals/{id}
///
/// Partial field edit. Lowering the target below an already-saved
/// amount is allowed and never fires the completion signal.
pub async fn update_goal(
    State(state): State<AppState>,
    Path(goal_id): Path<Uuid>,
    Json(request): Json<UpdateGoalRequest>,
) -> ApiResult<Json<GoalView>> {
    let mut goal = goals_db::get_goal(&state.db, goal_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Goal not found: {}", goal_id)))?;

    if let Some(title) = request.title {
        let title = title.trim();
        if title.is_empty() {
            return Err(ApiError::BadRequest("title must not be empty".to_string()));
        }
        goal.title = title.to_string();
    }
    if let Some(target_amount) = request.target_amount {
        if !target_amount.is_finite() || target_amount <= 0.0 {
            return Err(ApiError::BadRequest(
                "target_amount must be a positive number".to_string(),
            ));
        }
        goal.target_amount = target_amount;
    }
    if let Some(emoji) = request.emoji {
        if !emoji.trim().is_empty() {
            goal.emoji = emoji;
        }
    }
    if let Some(deadline) = request.deadline {
        goal.deadline = Some(deadline);
    }
    goal.updated_at = Utc::now();

    goals_db::update_goal(&state.db, &goal).await?;

    tracing::info!(goal_id = %goal.id, "Goal updated");
    state.event_bus.emit_lossy(SsbEvent::GoalUpdated {
        goal_id: goal.id,
        timestamp: Utc::now(),
    });

    Ok(Json(GoalView::from(goal)))
}

/// DELETE /api/goals/{id}
pub async fn delete_goal(
    State(state): State<AppState>,
    Path(goal_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let deleted = goals_db::delete_goal(&state.db, goal_id).await?;
    if !deleted {
        return Err(ApiError::NotFound(format!("Goal not found: {}", goal_id)));
    }

    tracing::info!(goal_id = %goal_id, "Goal deleted");
    state.event_bus.emit_lossy(SsbEvent::GoalDeleted {
        goal_id,
        timestamp: Utc::now(),
    });

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/goals/{id}/add
///
/// Credit money toward a goal, clamping at the target. The completion
/// signal fires exactly once, on the false→true edge.
pub async fn add_money(
    State(state): State<AppState>,
    Path(goal_id): Path<Uuid>,
    Json(request): Json<AddMoneyRequest>,
) -> ApiResult<Json<AddMoneyResponse>> {
    if !request.amount.is_finite() || request.amount <= 0.0 {
        return Err(ApiError::BadRequest(
            "amount must be a positive number".to_string(),
        ));
    }

    let mut goal = goals_db::get_goal(&state.db, goal_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Goal not found: {}", goal_id)))?;

    let outcome = goal::apply_add_money(goal.current_amount, goal.target_amount, request.amount);
    let now = Utc::now();
    goals_db::set_current_amount(&state.db, goal.id, outcome.new_amount, now).await?;
    goal.current_amount = outcome.new_amount;
    goal.updated_at = now;

    tracing::info!(
        goal_id = %goal.id,
        amount = request.amount,
        new_amount = outcome.new_amount,
        "Money added to goal"
    );
    state.event_bus.emit_lossy(SsbEvent::GoalUpdated {
        goal_id: goal.id,
        timestamp: now,
    });
    if outcome.completed {
        tracing::info!(goal_id = %goal.id, title = %goal.title, "Goal completed");
        state.event_bus.emit_lossy(SsbEvent::GoalCompleted {
            goal_id: goal.id,
            title: goal.title.clone(),
            timestamp: now,
        });
    }

    Ok(Json(AddMoneyResponse {
        goal: GoalView::from(goal),
        completed: outcome.completed,
    }))
}

/// GET /api/goals/stats
pub async fn goal_stats(State(state): State<AppState>) -> ApiResult<Json<GoalStats>> {
    let goals = goals_db::list_goals(&state.db).await?;
    Ok(Json(goal::compute_stats(&goals, Utc::now())))
}

/// GET /api/goals/emoji-options
///
/// Emoji choices for goal pickers.
pub async fn emoji_options() -> Json<[&'static str; 10]> {
    Json(EMOJI_OPTIONS)
}

/// Build savings goal routes
pub fn goal_routes() -> Router<AppState> {
    Router::new()
        .route("/api/goals", get(list_goals).post(create_goal))
        .route("/api/goals/stats", get(goal_stats))
        .route("/api/goals/emoji-options", get(emoji_options))
        .route("/api/goals/:goal_id", patch(update_goal).delete(delete_goal))
        .route("/api/goals/:goal_id/add", post(add_money))
}
