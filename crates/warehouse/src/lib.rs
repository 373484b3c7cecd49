//! Warehouse documents and line reconciliation.
//!
//! This crate contains business rules for goods receipts, transfers and pick
//! lists, implemented purely as deterministic domain logic (no IO, no HTTP, no
//! storage).

pub mod document;
pub mod line;
pub mod transfer;

pub use document::{Document, DocumentKind, NewLine};
pub use line::{
    AllocationPolicy, DocumentLine, ExternalOrderKind, ExternalOrderRef, LineError, LineRecord,
    LineStatus, allocate, can_add_remaining, compute_status,
};
pub use transfer::{
    NewTransfer, QcStatus, SerialTransfer, TransferItem, TransferPriority, TransferStatus,
};
