//! Extraction task orchestration
//!
//! Runs the gateway call spawned by the upload and retry endpoints and
//! applies its outcome to the live bill session. The session lock is
//! held only while applying the outcome, never across the network call.
//!
//! Stale-response discard: every upload, retry, and reset bumps the
//! session's monotonic request id. An outcome is applied only if its
//! request id still matches the session's; otherwise the user has moved
//! on and the result is dropped on the floor.

use chrono::Utc;
use tracing::{debug, info, warn};

use ssb_common::events::SsbEvent;

use super::normalizer;
use super::ExtractionFailure;
use crate::AppState;

/// Run one extraction request to completion
///
/// Spawned onto the runtime by the upload and retry handlers; never
/// returns an error because every outcome (including failure) is state
/// to record, not a condition to propagate.
pub async fn run_extraction(state: AppState, request_id: u64, image_url: String) {
    match state.gateway.extract_items(&image_url).await {
        Ok(raw) => {
            let candidates = normalizer::normalize(&raw);

            let mut session = state.bill.write().await;
            if session.request_id != request_id {
                debug!(
                    "Discarding stale extraction result (request {} superseded by {})",
                    request_id, session.request_id
                );
                return;
            }
            let item_count = session.complete_extraction(candidates);
            let session_id = session.session_id;
            drop(session);

            info!("Extraction completed with {} item(s)", item_count);
            state.event_bus.emit_lossy(SsbEvent::ExtractionCompleted {
                session_id,
                request_id,
                item_count,
                timestamp: Utc::now(),
            });
        }
        Err(e) => {
            let failure = ExtractionFailure::from_error(&e);

            let mut session = state.bill.write().await;
            if session.request_id != request_id {
                debug!(
                    "Discarding stale extraction failure (request {} superseded by {})",
                    request_id, session.request_id
                );
                return;
            }
            session.fail_extraction(failure.clone());
            let session_id = session.session_id;
            drop(session);

            *state.last_error.write().await = Some(failure.message.clone());

            warn!("Extraction failed: {}", failure.message);
            state.event_bus.emit_lossy(SsbEvent::ExtractionFailed {
                session_id,
                request_id,
                kind: failure.kind.as_str().to_string(),
                message: failure.message,
                timestamp: Utc::now(),
            });
        }
    }
}
