//! Work-time estimator endpoint

use axum::{routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::estimator::{self, EstimateTier};
use crate::AppState;

/// POST /api/estimate request
#[derive(Debug, Deserialize)]
pub struct EstimateRequest {
    pub price: f64,
    pub hourly_wage: f64,
}

/// POST /api/estimate response
#[derive(Debug, Serialize)]
pub struct EstimateResponse {
    pub hours: i64,
    pub days: i64,
    pub tier: EstimateTier,
    pub message: String,
}

/// POST /api/estimate
///
/// Convert a purchase price into hours and days of work at the given
/// wage. Both inputs must be positive and finite.
pub async fn estimate_work_time(
    Json(request): Json<EstimateRequest>,
) -> ApiResult<Json<EstimateResponse>> {
    let estimate = estimator::estimate(request.price, request.hourly_wage).ok_or_else(|| {
        ApiError::BadRequest("price and hourly_wage must be positive numbers".to_string())
    })?;

    Ok(Json(EstimateResponse {
        hours: estimate.hours,
        days: estimate.days,
        tier: estimate.tier,
        message: estimate.tier.message().to_string(),
    }))
}

/// Build estimator routes
pub fn estimator_routes() -> Router<AppState> {
    Router::new().route("/api/estimate", post(estimate_work_time))
}
