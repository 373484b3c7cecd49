//! `forgewms-core`: domain building blocks shared by every crate.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod error;
pub mod id;
pub mod version;

pub use error::{DomainError, DomainResult};
pub use id::{DocumentId, LineId, TenantId, TransferId, UserId};
pub use version::{ExpectedVersion, Versioned};

/// Quantities are exact decimals (ERP quantities are not always integral).
pub use rust_decimal::Decimal as Quantity;
