//! Drafting warehouse documents.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use forgewms_auth::{AuthzError, Capability, UserIdentity, require};
use forgewms_core::{DocumentId, DomainError, LineId, Quantity, Versioned};
use forgewms_warehouse::{Document, DocumentKind, ExternalOrderRef, LineStatus, NewLine};

use crate::store::{DocumentStore, StoreError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("store error: {0}")]
    Store(String),
}

impl From<AuthzError> for DocumentError {
    fn from(value: AuthzError) -> Self {
        DocumentError::Forbidden(value.to_string())
    }
}

impl From<StoreError> for DocumentError {
    fn from(value: StoreError) -> Self {
        DocumentError::Store(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DraftDocumentRequest {
    pub kind: DocumentKind,
    pub number: String,
    #[serde(default)]
    pub lines: Vec<NewLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DraftedLine {
    pub id: LineId,
    pub line_no: u32,
    pub item_code: String,
    pub ordered_quantity: Quantity,
    pub status: LineStatus,
    pub version: u64,
    pub external_ref: Option<ExternalOrderRef>,
}

/// What a caller gets back after drafting: enough to allocate against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DraftedDocument {
    pub id: DocumentId,
    pub kind: DocumentKind,
    pub number: String,
    pub status: LineStatus,
    pub created_at: DateTime<Utc>,
    pub lines: Vec<DraftedLine>,
}

impl From<&Document> for DraftedDocument {
    fn from(document: &Document) -> Self {
        Self {
            id: document.id_typed(),
            kind: document.kind(),
            number: document.number().to_string(),
            status: document.status(),
            created_at: document.created_at(),
            lines: document
                .lines()
                .iter()
                .map(|line| DraftedLine {
                    id: line.id_typed(),
                    line_no: line.line_no(),
                    item_code: line.item_code().to_string(),
                    ordered_quantity: line.ordered_quantity(),
                    status: line.status(),
                    version: line.version(),
                    external_ref: line.external_ref().cloned(),
                })
                .collect(),
        }
    }
}

#[derive(Clone)]
pub struct DocumentService {
    store: Arc<dyn DocumentStore>,
}

impl core::fmt::Debug for DocumentService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DocumentService").finish_non_exhaustive()
    }
}

impl DocumentService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Draft a document and its lines in one write.
    #[tracing::instrument(skip(self, user, request), fields(tenant_id = %user.tenant_id, number = %request.number), err)]
    pub async fn draft(
        &self,
        user: &UserIdentity,
        request: DraftDocumentRequest,
    ) -> Result<Document, DocumentError> {
        require(user, &Capability::WAREHOUSE_OPERATOR)?;
        if request.lines.is_empty() {
            return Err(DomainError::validation("a document needs at least one line").into());
        }

        let mut document = Document::draft(user.tenant_id, request.kind, request.number, Utc::now())?;
        for line in request.lines {
            document.push_line(line)?;
        }

        self.store.insert_document(user.tenant_id, &document).await?;
        tracing::info!(
            document_id = %document.id_typed(),
            lines = document.lines().len(),
            "document drafted"
        );
        Ok(document)
    }
}
