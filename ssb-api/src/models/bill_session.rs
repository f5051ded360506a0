//! Bill session state machine and assignment ledger
//!
//! The session progresses through IDLE → EXTRACTING → {DONE, FAILED};
//! an explicit reset is the only path back to IDLE. The ledger half holds
//! the extracted items, the participants, and the many-to-many assignment
//! relation between them, with per-person shares and the grand total
//! derived on every read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::extraction::normalizer::ItemCandidate;
use crate::extraction::ExtractionFailure;

/// Extraction workflow state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExtractionState {
    /// No upload in progress and no extraction outcome held
    Idle,
    /// Gateway call in flight
    Extracting,
    /// Extraction finished; zero items is still a valid outcome
    Done,
    /// Gateway call failed; the stored image is retained for retry
    Failed,
}

/// State transition event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub session_id: Uuid,
    pub old_state: ExtractionState,
    pub new_state: ExtractionState,
    pub transitioned_at: DateTime<Utc>,
}

/// A bill line item with its assignees
///
/// `assignees` is the single source of truth for the assignment relation;
/// shares are derived from it on read and never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Session-local sequential identifier
    pub id: u64,
    pub name: String,
    /// Non-negative; sanitized at seeding
    pub unit_price: f64,
    /// At least 1; sanitized at seeding
    pub quantity: i64,
    /// Participants splitting this item, in assignment order
    pub assignees: Vec<Uuid>,
}

impl LineItem {
    /// Total cost of this line (price × quantity)
    pub fn line_total(&self) -> f64 {
        self.unit_price * self.quantity as f64
    }
}

/// A person splitting the bill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: Uuid,
    pub display_name: String,
}

/// Receipt image stored under the data folder
#[derive(Debug, Clone)]
pub struct StoredImage {
    pub id: Uuid,
    pub content_type: String,
    pub size_bytes: u64,
    pub path: PathBuf,
}

/// The live bill session (aggregate root)
///
/// Exactly one session exists at a time. Starting a new upload or an
/// explicit reset discards the previous contents in full; there is no
/// undo. `request_id` increases monotonically across uploads and resets
/// so that a gateway response arriving late is recognized as stale and
/// discarded rather than applied to the wrong session.
#[derive(Debug)]
pub struct BillSession {
    pub session_id: Uuid,
    pub state: ExtractionState,
    pub image: Option<StoredImage>,
    pub items: Vec<LineItem>,
    pub participants: Vec<Participant>,
    /// Monotonic extraction request counter, never reused
    pub request_id: u64,
    /// Failure record while in the Failed state
    pub failure: Option<ExtractionFailure>,
    pub created_at: DateTime<Utc>,
    pub extraction_started_at: Option<DateTime<Utc>>,
    pub extraction_ended_at: Option<DateTime<Utc>>,
    next_item_id: u64,
}

impl BillSession {
    /// Create a fresh idle session
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            state: ExtractionState::Idle,
            image: None,
            items: Vec::new(),
            participants: Vec::new(),
            request_id: 0,
            failure: None,
            created_at: Utc::now(),
            extraction_started_at: None,
            extraction_ended_at: None,
            next_item_id: 1,
        }
    }

    /// Transition to new state
    pub fn transition_to(&mut self, new_state: ExtractionState) -> StateTransition {
        let transition = StateTransition {
            session_id: self.session_id,
            old_state: self.state,
            new_state,
            transitioned_at: Utc::now(),
        };
        self.state = new_state;

        // Set end time for terminal extraction outcomes
        match new_state {
            ExtractionState::Done | ExtractionState::Failed => {
                self.extraction_ended_at = Some(Utc::now());
            }
            _ => {}
        }

        transition
    }

    /// Whether a gateway call is currently in flight
    pub fn is_extracting(&self) -> bool {
        self.state == ExtractionState::Extracting
    }

    // ========================================================================
    // Extraction orchestration
    // ========================================================================

    /// Begin extraction for a newly uploaded image
    ///
    /// Discards the previous session contents in full, stores the image,
    /// and enters EXTRACTING. Returns the request id the spawned gateway
    /// call must present when applying its outcome.
    pub fn start_new_upload(&mut self, image: StoredImage) -> u64 {
        self.discard_contents();
        self.session_id = Uuid::new_v4();
        self.image = Some(image);
        self.begin_extraction()
    }

    /// Re-run extraction against the already-stored image
    ///
    /// Keeps participants and the image; returns None when no image is
    /// stored. Items are replaced wholesale when the new outcome lands.
    pub fn start_retry(&mut self) -> Option<u64> {
        self.image.as_ref()?;
        Some(self.begin_extraction())
    }

    /// Apply a successful extraction outcome
    ///
    /// Replaces the session items wholesale with the sanitized candidates.
    /// Returns the number of items seeded; zero is a valid outcome.
    pub fn complete_extraction(&mut self, candidates: Vec<ItemCandidate>) -> usize {
        self.items.clear();
        for candidate in candidates {
            let id = self.alloc_item_id();
            self.items.push(LineItem {
                id,
                name: candidate.name,
                unit_price: candidate.price.max(0.0),
                quantity: candidate.quantity.max(1),
                assignees: Vec::new(),
            });
        }
        self.failure = None;
        self.transition_to(ExtractionState::Done);
        self.items.len()
    }

    /// Apply a failed extraction outcome
    ///
    /// Items stay empty and the stored image is retained so the user can
    /// retry without re-uploading.
    pub fn fail_extraction(&mut self, failure: ExtractionFailure) {
        self.failure = Some(failure);
        self.transition_to(ExtractionState::Failed);
    }

    /// Reset back to IDLE, discarding image, items, and participants
    ///
    /// Returns the id of the discarded session. The request counter is
    /// bumped so any in-flight gateway response is discarded as stale.
    pub fn reset(&mut self) -> Uuid {
        let old_session_id = self.session_id;
        self.discard_contents();
        self.session_id = Uuid::new_v4();
        self.request_id += 1;
        self.transition_to(ExtractionState::Idle);
        self.extraction_started_at = None;
        self.extraction_ended_at = None;
        old_session_id
    }

    fn begin_extraction(&mut self) -> u64 {
        self.failure = None;
        self.request_id += 1;
        self.extraction_started_at = Some(Utc::now());
        self.extraction_ended_at = None;
        self.transition_to(ExtractionState::Extracting);
        self.request_id
    }

    fn discard_contents(&mut self) {
        self.image = None;
        self.items.clear();
        self.participants.clear();
        self.failure = None;
        self.next_item_id = 1;
    }

    fn alloc_item_id(&mut self) -> u64 {
        let id = self.next_item_id;
        self.next_item_id += 1;
        id
    }

    // ========================================================================
    // Assignment ledger
    // ========================================================================

    /// Add a manually entered line item
    ///
    /// The caller validates price and quantity; extraction seeding goes
    /// through `complete_extraction` instead.
    pub fn add_item(&mut self, name: String, unit_price: f64, quantity: i64) -> LineItem {
        let id = self.alloc_item_id();
        let item = LineItem {
            id,
            name,
            unit_price,
            quantity,
            assignees: Vec::new(),
        };
        self.items.push(item.clone());
        item
    }

    /// Add a participant; blank or whitespace-only names are rejected
    pub fn add_participant(&mut self, name: &str) -> Option<Participant> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return None;
        }

        let participant = Participant {
            id: Uuid::new_v4(),
            display_name: trimmed.to_string(),
        };
        self.participants.push(participant.clone());
        Some(participant)
    }

    /// Remove a participant and strip them from every item's assignees
    ///
    /// Idempotent: unknown ids are a silent no-op.
    pub fn remove_participant(&mut self, participant_id: Uuid) {
        self.participants.retain(|p| p.id != participant_id);
        for item in &mut self.items {
            item.assignees.retain(|id| *id != participant_id);
        }
    }

    /// Toggle an item's assignment to a participant
    ///
    /// Silent no-op if either id does not exist in the session.
    pub fn toggle_assignment(&mut self, item_id: u64, participant_id: Uuid) {
        if !self.participant_exists(participant_id) {
            return;
        }
        if let Some(item) = self.items.iter_mut().find(|i| i.id == item_id) {
            if item.assignees.contains(&participant_id) {
                item.assignees.retain(|id| *id != participant_id);
            } else {
                item.assignees.push(participant_id);
            }
        }
    }

    /// Strictly additive assignment (the drag-and-drop drop target)
    ///
    /// No effect if already assigned; silent no-op on unknown ids.
    pub fn assign(&mut self, item_id: u64, participant_id: Uuid) {
        if !self.participant_exists(participant_id) {
            return;
        }
        if let Some(item) = self.items.iter_mut().find(|i| i.id == item_id) {
            if !item.assignees.contains(&participant_id) {
                item.assignees.push(participant_id);
            }
        }
    }

    /// Strictly subtractive unassignment; idempotent
    pub fn unassign(&mut self, item_id: u64, participant_id: Uuid) {
        if let Some(item) = self.items.iter_mut().find(|i| i.id == item_id) {
            item.assignees.retain(|id| *id != participant_id);
        }
    }

    /// Amount this participant owes across all assigned items
    ///
    /// Each item contributes `unit_price × quantity / |assignees|`.
    /// Returns 0 for a participant with no assignments (or an unknown id).
    pub fn share_of(&self, participant_id: Uuid) -> f64 {
        self.items
            .iter()
            .filter(|item| item.assignees.contains(&participant_id))
            .map(|item| item.line_total() / item.assignees.len() as f64)
            .sum()
    }

    /// Bill total over all items, assigned or not
    pub fn grand_total(&self) -> f64 {
        self.items.iter().map(LineItem::line_total).sum()
    }

    fn participant_exists(&self, participant_id: Uuid) -> bool {
        self.participants.iter().any(|p| p.id == participant_id)
    }
}

impl Default for BillSession {
    fn default() -> Self {
        Self::new()
    }
}
