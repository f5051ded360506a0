//! Savings goal database operations
//!
//! Goals are the only persisted aggregate; every column is stored as
//! TEXT or REAL and parsed back into the model on read. Timestamps are
//! RFC3339 strings, deadlines are bare `YYYY-MM-DD` dates.

use chrono::NaiveDate;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use ssb_common::Result;

use crate::models::Goal;

/// Insert a new goal
pub async fn insert_goal(pool: &SqlitePool, goal: &Goal) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO savings_goals (
            id, user_id, title, target_amount, current_amount,
            emoji, deadline, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(goal.id.to_string())
    .bind(&goal.user_id)
    .bind(&goal.title)
    .bind(goal.target_amount)
    .bind(goal.current_amount)
    .bind(&goal.emoji)
    .bind(goal.deadline.map(|d| d.to_string()))
    .bind(goal.created_at.to_rfc3339())
    .bind(goal.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// List all goals, newest first
pub async fn list_goals(pool: &SqlitePool) -> Result<Vec<Goal>> {
    let rows = sqlx::query(
        r#"
        SELECT id, user_id, title, target_amount, current_amount,
               emoji, deadline, created_at, updated_at
        FROM savings_goals
        ORDER BY created_at DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(goal_from_row).collect()
}

/// Load a single goal by id
pub async fn get_goal(pool: &SqlitePool, goal_id: Uuid) -> Result<Option<Goal>> {
    let row = sqlx::query(
        r#"
        SELECT id, user_id, title, target_amount, current_amount,
               emoji, deadline, created_at, updated_at
        FROM savings_goals
        WHERE id = ?
        "#,
    )
    .bind(goal_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(goal_from_row).transpose()
}

/// Persist edited goal fields
pub async fn update_goal(pool: &SqlitePool, goal: &Goal) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE savings_goals
        SET title = ?, target_amount = ?, current_amount = ?,
            emoji = ?, deadline = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&goal.title)
    .bind(goal.target_amount)
    .bind(goal.current_amount)
    .bind(&goal.emoji)
    .bind(goal.deadline.map(|d| d.to_string()))
    .bind(goal.updated_at.to_rfc3339())
    .bind(goal.id.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

/// Persist a new saved amount after crediting money
pub async fn set_current_amount(
    pool: &SqlitePool,
    goal_id: Uuid,
    amount: f64,
    updated_at: chrono::DateTime<chrono::Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE savings_goals
        SET current_amount = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(amount)
    .bind(updated_at.to_rfc3339())
    .bind(goal_id.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

/// Delete a goal; returns false when no row matched
pub async fn delete_goal(pool: &SqlitePool, goal_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM savings_goals WHERE id = ?")
        .bind(goal_id.to_string())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Parse one savings_goals row into the model
fn goal_from_row(row: &SqliteRow) -> Result<Goal> {
    let id_str: String = row.get("id");
    let id = Uuid::parse_str(&id_str)
        .map_err(|e| ssb_common::Error::Internal(format!("Failed to parse goal id: {}", e)))?;

    let deadline: Option<String> = row.get("deadline");
    let deadline = deadline
        .map(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d"))
        .transpose()
        .map_err(|e| ssb_common::Error::Internal(format!("Failed to parse deadline: {}", e)))?;

    let created_at: String = row.get("created_at");
    let created_at = chrono::DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| ssb_common::Error::Internal(format!("Failed to parse created_at: {}", e)))?
        .with_timezone(&chrono::Utc);

    let updated_at: String = row.get("updated_at");
    let updated_at = chrono::DateTime::parse_from_rfc3339(&updated_at)
        .map_err(|e| ssb_common::Error::Internal(format!("Failed to parse updated_at: {}", e)))?
        .with_timezone(&chrono::Utc);

    Ok(Goal {
        id,
        user_id: row.get("user_id"),
        title: row.get("title"),
        target_amount: row.get("target_amount"),
        current_amount: row.get("current_amount"),
        emoji: row.get("emoji"),
        deadline,
        created_at,
        updated_at,
    })
}
