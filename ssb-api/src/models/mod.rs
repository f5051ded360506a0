//! Data models for the squad save bot service

pub mod bill_session;
pub mod goal;

pub use bill_session::{
    BillSession, ExtractionState, LineItem, Participant, StateTransition, StoredImage,
};
pub use goal::{Goal, GoalStats};
