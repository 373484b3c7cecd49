//! Repository interfaces for documents, lines and serial transfers.
//!
//! The store is the single source of truth. Every read and write is scoped by
//! tenant, and every line/transfer write carries an [`ExpectedVersion`] so a
//! caller that lost a race gets `Conflict` instead of silently overwriting.

pub mod in_memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use forgewms_core::{DocumentId, ExpectedVersion, LineId, TenantId, TransferId};
use forgewms_warehouse::{Document, DocumentLine, SerialTransfer, TransferStatus};

pub use in_memory::{InMemoryDocumentStore, InMemoryTransferStore};
pub use postgres::{PostgresDocumentStore, PostgresTransferStore};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("version conflict: expected {expected:?}, found {actual}")]
    Conflict {
        expected: ExpectedVersion,
        actual: u64,
    },

    #[error("already exists: {0}")]
    Duplicate(String),

    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Persist a freshly drafted document with all of its lines.
    async fn insert_document(&self, tenant_id: TenantId, document: &Document) -> Result<(), StoreError>;

    async fn load_document(&self, tenant_id: TenantId, id: DocumentId) -> Result<Document, StoreError>;

    async fn load_line(&self, tenant_id: TenantId, line_id: LineId) -> Result<DocumentLine, StoreError>;

    /// Compare-and-set write of one line.
    ///
    /// `expected` is checked against the *stored* version; on success the
    /// stored line is replaced by `line` (which carries the new version).
    async fn save_line(
        &self,
        tenant_id: TenantId,
        line: &DocumentLine,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError>;
}

#[async_trait]
pub trait TransferStore: Send + Sync {
    async fn insert_transfer(&self, transfer: &SerialTransfer) -> Result<(), StoreError>;

    async fn load_transfer(&self, tenant_id: TenantId, id: TransferId) -> Result<SerialTransfer, StoreError>;

    /// All transfers of the tenant in `status`, in no particular order.
    async fn list_by_status(
        &self,
        tenant_id: TenantId,
        status: TransferStatus,
    ) -> Result<Vec<SerialTransfer>, StoreError>;

    async fn save_transfer(
        &self,
        transfer: &SerialTransfer,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError>;

    async fn delete_transfer(&self, tenant_id: TenantId, id: TransferId) -> Result<(), StoreError>;
}
