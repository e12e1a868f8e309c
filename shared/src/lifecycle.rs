//! Status transition tables for rolls and batches
//!
//! Every status change in the engine goes through [`next_roll_status`] or
//! [`next_batch_status`]. A pair that is not listed is an invalid transition,
//! including repeating an event that has already been applied.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{BatchStatus, RollStatus, ScanType};

/// Events that drive a roll through its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollEvent {
    /// Issue scan: roll taken out for an order
    Issue,
    /// Receive scan: roll returned to stock
    Receive,
    Move,
    Audit,
    QualityCheck,
    /// Whole roll reserved for a customer order
    Allocate,
    /// Part of the roll reserved, some length still free
    PartiallyAllocate,
    /// Roll cut up or consumed in-house
    Consume,
    /// Bound to a shipment
    Ship,
    /// Shipment confirmed delivered
    Deliver,
    /// Dispatch confirmed after a direct lookup
    ConfirmDispatch,
    MarkDamaged,
}

impl RollEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            RollEvent::Issue => "issue",
            RollEvent::Receive => "receive",
            RollEvent::Move => "move",
            RollEvent::Audit => "audit",
            RollEvent::QualityCheck => "quality_check",
            RollEvent::Allocate => "allocate",
            RollEvent::PartiallyAllocate => "partially_allocate",
            RollEvent::Consume => "consume",
            RollEvent::Ship => "ship",
            RollEvent::Deliver => "deliver",
            RollEvent::ConfirmDispatch => "confirm_dispatch",
            RollEvent::MarkDamaged => "mark_damaged",
        }
    }
}

impl From<ScanType> for RollEvent {
    fn from(scan: ScanType) -> Self {
        match scan {
            ScanType::Issue => RollEvent::Issue,
            ScanType::Receive => RollEvent::Receive,
            ScanType::Move => RollEvent::Move,
            ScanType::Audit => RollEvent::Audit,
            ScanType::QualityCheck => RollEvent::QualityCheck,
        }
    }
}

/// Events that drive a production batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchEvent {
    Complete,
    SubmitForQualityCheck,
    Approve,
}

impl BatchEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchEvent::Complete => "complete",
            BatchEvent::SubmitForQualityCheck => "submit_for_quality_check",
            BatchEvent::Approve => "approve",
        }
    }
}

/// Rejected (state, event) pair
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot {event} a {subject} in status {from}")]
pub struct TransitionError {
    pub subject: &'static str,
    pub from: &'static str,
    pub event: &'static str,
}

/// Roll transition table
pub fn next_roll_status(current: RollStatus, event: RollEvent) -> Result<RollStatus, TransitionError> {
    use RollEvent as E;
    use RollStatus as S;

    let next = match (current, event) {
        // History-only scans are accepted in every status and change nothing
        (status, E::Move | E::Audit | E::QualityCheck) => status,

        (S::Available | S::PartiallyAllocated, E::Issue) => S::Allocated,
        (S::Allocated | S::PartiallyAllocated, E::Receive) => S::Available,

        (S::Available | S::PartiallyAllocated, E::Allocate) => S::Allocated,
        (S::Available | S::PartiallyAllocated, E::PartiallyAllocate) => S::PartiallyAllocated,
        (S::Allocated | S::PartiallyAllocated, E::Consume) => S::Used,

        (S::Allocated, E::Ship) => S::Shipped,
        (S::Available | S::Allocated, E::ConfirmDispatch) => S::Shipped,
        (S::Shipped, E::Deliver) => S::Delivered,

        (S::Available | S::Allocated | S::PartiallyAllocated | S::Shipped, E::MarkDamaged) => {
            S::Damaged
        }

        _ => {
            return Err(TransitionError {
                subject: "roll",
                from: current.as_str(),
                event: event.as_str(),
            })
        }
    };

    Ok(next)
}

/// Batch transition table
pub fn next_batch_status(
    current: BatchStatus,
    event: BatchEvent,
) -> Result<BatchStatus, TransitionError> {
    match (current, event) {
        (BatchStatus::InProgress, BatchEvent::Complete) => Ok(BatchStatus::Completed),
        (BatchStatus::Completed, BatchEvent::SubmitForQualityCheck) => Ok(BatchStatus::QualityCheck),
        (BatchStatus::QualityCheck, BatchEvent::Approve) => Ok(BatchStatus::Approved),
        _ => Err(TransitionError {
            subject: "batch",
            from: current.as_str(),
            event: event.as_str(),
        }),
    }
}
