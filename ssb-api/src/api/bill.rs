//! Bill session API handlers
//!
//! Upload → extraction lifecycle plus the assignment ledger operations.
//! The live session sits behind `state.bill`; every handler takes the
//! lock for a short critical section and derives shares and the grand
//! total on read. The gateway call itself runs on a spawned task and
//! never holds the lock.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ssb_common::events::SsbEvent;

use crate::error::{ApiError, ApiResult};
use crate::extraction::orchestrator;
use crate::extraction::ExtractionFailure;
use crate::models::{BillSession, ExtractionState, LineItem, StoredImage};
use crate::AppState;

/// Upload size cap in bytes (5 MB)
const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// POST /api/bill/image request
///
/// The image travels as base64 in the JSON body; multipart is not
/// needed for receipt-sized files under the 5 MB cap.
#[derive(Debug, Deserialize)]
pub struct UploadImageRequest {
    pub file_name: Option<String>,
    pub content_type: String,
    pub data_base64: String,
}

/// Response for requests that started an extraction (202)
#[derive(Debug, Serialize)]
pub struct ExtractionAccepted {
    pub session_id: Uuid,
    pub state: ExtractionState,
    pub request_id: u64,
}

/// POST /api/bill/items request
#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub name: String,
    pub price: f64,
    pub quantity: i64,
}

/// POST /api/bill/participants request
#[derive(Debug, Deserialize)]
pub struct AddParticipantRequest {
    pub name: String,
}

/// Stored image summary in the snapshot (the bytes stay on disk)
#[derive(Debug, Serialize)]
pub struct ImageInfo {
    pub id: Uuid,
    pub content_type: String,
    pub size_bytes: u64,
}

/// Participant with their derived share
#[derive(Debug, Serialize)]
pub struct ParticipantView {
    pub id: Uuid,
    pub display_name: String,
    pub share: f64,
}

/// GET /api/bill response
#[derive(Debug, Serialize)]
pub struct BillSnapshot {
    pub session_id: Uuid,
    pub state: ExtractionState,
    pub image: Option<ImageInfo>,
    pub items: Vec<LineItem>,
    pub participants: Vec<ParticipantView>,
    pub grand_total: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<ExtractionFailure>,
}

/// Build the full snapshot from the session under the caller's lock
fn bill_snapshot(session: &BillSession) -> BillSnapshot {
    let participants = session
        .participants
        .iter()
        .map(|p| ParticipantView {
            id: p.id,
            display_name: p.display_name.clone(),
            share: session.share_of(p.id),
        })
        .collect();

    BillSnapshot {
        session_id: session.session_id,
        state: session.state,
        image: session.image.as_ref().map(|img| ImageInfo {
            id: img.id,
            content_type: img.content_type.clone(),
            size_bytes: img.size_bytes,
        }),
        items: session.items.clone(),
        participants,
        grand_total: session.grand_total(),
        failure: session.failure.clone(),
    }
}

/// File extension for a stored upload, from the declared content type
fn extension_for(content_type: &str) -> &str {
    match content_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "bin",
    }
}

/// Inline data URL for the gateway request
fn data_url(content_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", content_type, BASE64.encode(bytes))
}

/// GET /api/bill
///
/// Full session snapshot: state, items with assignees, participants
/// with shares, and the grand total.
pub async fn get_bill(State(state): State<AppState>) -> Json<BillSnapshot> {
    let session = state.bill.read().await;
    Json(bill_snapshot(&session))
}

/// POST /api/bill/image
///
/// Validate the upload gates, store the image under the data folder,
/// discard the previous session, and start extraction. Returns 202;
/// the outcome arrives via SSE or by polling GET /api/bill.
pub async fn upload_image(
    State(state): State<AppState>,
    Json(request): Json<UploadImageRequest>,
) -> ApiResult<(StatusCode, Json<ExtractionAccepted>)> {
    // Upload gates run before any async work
    if !request.content_type.starts_with("image/") {
        return Err(ApiError::BadRequest(
            "please upload an image file".to_string(),
        ));
    }
    let bytes = BASE64
        .decode(request.data_base64.as_bytes())
        .map_err(|_| ApiError::BadRequest("invalid base64 image data".to_string()))?;
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(ApiError::BadRequest(
            "please upload an image under 5mb".to_string(),
        ));
    }

    let mut session = state.bill.write().await;
    if session.is_extracting() {
        return Err(ApiError::Conflict(
            "Extraction already in progress".to_string(),
        ));
    }

    // Store the image durably before the session leaves Idle
    let image_id = Uuid::new_v4();
    let path = state
        .data_folder
        .join("uploads")
        .join(format!("{}.{}", image_id, extension_for(&request.content_type)));
    tokio::fs::write(&path, &bytes).await?;

    let image = StoredImage {
        id: image_id,
        content_type: request.content_type.clone(),
        size_bytes: bytes.len() as u64,
        path,
    };
    let image_url = data_url(&request.content_type, &bytes);
    let request_id = session.start_new_upload(image);
    let session_id = session.session_id;
    drop(session);

    tracing::info!(
        session_id = %session_id,
        request_id,
        file_name = request.file_name.as_deref().unwrap_or("(unnamed)"),
        "Receipt uploaded, extraction started"
    );
    state.event_bus.emit_lossy(SsbEvent::ExtractionStarted {
        session_id,
        request_id,
        timestamp: Utc::now(),
    });

    tokio::spawn(orchestrator::run_extraction(
        state.clone(),
        request_id,
        image_url,
    ));

    Ok((
        StatusCode::ACCEPTED,
        Json(ExtractionAccepted {
            session_id,
            state: ExtractionState::Extracting,
            request_id,
        }),
    ))
}

/// POST /api/bill/extract
///
/// Re-run extraction against the already-stored image (retry after a
/// failure without re-uploading). Participants and the image survive;
/// items are replaced wholesale when the new outcome lands.
pub async fn retry_extraction(
    State(state): State<AppState>,
) -> ApiResult<(StatusCode, Json<ExtractionAccepted>)> {
    let mut session = state.bill.write().await;
    if session.is_extracting() {
        return Err(ApiError::Conflict(
            "Extraction already in progress".to_string(),
        ));
    }
    let (path, content_type) = match &session.image {
        Some(image) => (image.path.clone(), image.content_type.clone()),
        None => {
            return Err(ApiError::BadRequest(
                "no stored image to extract from".to_string(),
            ))
        }
    };

    // Re-read and re-encode before the state transition, so a disk
    // error cannot leave the session stuck in Extracting
    let bytes = tokio::fs::read(&path).await?;
    let image_url = data_url(&content_type, &bytes);

    let request_id = session.start_retry().ok_or_else(|| {
        ApiError::BadRequest("no stored image to extract from".to_string())
    })?;
    let session_id = session.session_id;
    drop(session);

    tracing::info!(session_id = %session_id, request_id, "Extraction retry started");
    state.event_bus.emit_lossy(SsbEvent::ExtractionStarted {
        session_id,
        request_id,
        timestamp: Utc::now(),
    });

    tokio::spawn(orchestrator::run_extraction(
        state.clone(),
        request_id,
        image_url,
    ));

    Ok((
        StatusCode::ACCEPTED,
        Json(ExtractionAccepted {
            session_id,
            state: ExtractionState::Extracting,
            request_id,
        }),
    ))
}

/// POST /api/bill/reset
///
/// Discard the session in full (image, items, participants) and return
/// to Idle. Any in-flight gateway call becomes stale and its outcome
/// is dropped.
pub async fn reset_bill(State(state): State<AppState>) -> Json<BillSnapshot> {
    let mut session = state.bill.write().await;
    let discarded_session_id = session.reset();
    let snapshot = bill_snapshot(&session);
    drop(session);

    tracing::info!(session_id = %discarded_session_id, "Bill session reset");
    state.event_bus.emit_lossy(SsbEvent::BillSessionReset {
        session_id: discarded_session_id,
        timestamp: Utc::now(),
    });

    Json(snapshot)
}

/// POST /api/bill/items
///
/// Manual item entry. Unlike extraction seeding, invalid values are
/// rejected here rather than sanitized.
pub async fn add_item(
    State(state): State<AppState>,
    Json(request): Json<AddItemRequest>,
) -> ApiResult<Json<LineItem>> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("item name must not be empty".to_string()));
    }
    if !request.price.is_finite() || request.price < 0.0 {
        return Err(ApiError::BadRequest(
            "price must be a non-negative number".to_string(),
        ));
    }
    if request.quantity < 1 {
        return Err(ApiError::BadRequest("quantity must be at least 1".to_string()));
    }

    let mut session = state.bill.write().await;
    let item = session.add_item(name.to_string(), request.price, request.quantity);

    Ok(Json(item))
}

/// POST /api/bill/participants
pub async fn add_participant(
    State(state): State<AppState>,
    Json(request): Json<AddParticipantRequest>,
) -> ApiResult<Json<crate::models::Participant>> {
    let mut session = state.bill.write().await;
    let participant = session.add_participant(&request.name).ok_or_else(|| {
        ApiError::BadRequest("participant name must not be empty".to_string())
    })?;

    Ok(Json(participant))
}

/// DELETE /api/bill/participants/{participant_id}
///
/// Removes the participant and strips them from every item's
/// assignees. Unknown ids are a silent no-op.
pub async fn remove_participant(
    State(state): State<AppState>,
    Path(participant_id): Path<Uuid>,
) -> StatusCode {
    let mut session = state.bill.write().await;
    session.remove_participant(participant_id);
    StatusCode::NO_CONTENT
}

/// POST /api/bill/items/{item_id}/toggle/{participant_id}
pub async fn toggle_assignment(
    State(state): State<AppState>,
    Path((item_id, participant_id)): Path<(u64, Uuid)>,
) -> StatusCode {
    let mut session = state.bill.write().await;
    session.toggle_assignment(item_id, participant_id);
    StatusCode::NO_CONTENT
}

/// POST /api/bill/items/{item_id}/assign/{participant_id}
///
/// Strictly additive (the drag-and-drop drop target).
pub async fn assign_item(
    State(state): State<AppState>,
    Path((item_id, participant_id)): Path<(u64, Uuid)>,
) -> StatusCode {
    let mut session = state.bill.write().await;
    session.assign(item_id, participant_id);
    StatusCode::NO_CONTENT
}

/// DELETE /api/bill/items/{item_id}/assignees/{participant_id}
pub async fn unassign_item(
    State(state): State<AppState>,
    Path((item_id, participant_id)): Path<(u64, Uuid)>,
) -> StatusCode {
    let mut session = state.bill.write().await;
    session.unassign(item_id, participant_id);
    StatusCode::NO_CONTENT
}

/// Build bill session routes
pub fn bill_routes() -> Router<AppState> {
    Router::new()
        .route("/api/bill", get(get_bill))
        .route("/api/bill/image", post(upload_image))
        .route("/api/bill/extract", post(retry_extraction))
        .route("/api/bill/reset", post(reset_bill))
        .route("/api/bill/items", post(add_item))
        .route("/api/bill/participants", post(add_participant))
        .route("/api/bill/participants/:participant_id", delete(remove_participant))
        .route("/api/bill/items/:item_id/toggle/:participant_id", post(toggle_assignment))
        .route("/api/bill/items/:item_id/assign/:participant_id", post(assign_item))
        .route("/api/bill/items/:item_id/assignees/:participant_id", delete(unassign_item))
}
