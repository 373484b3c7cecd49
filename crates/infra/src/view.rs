//! Read side: a document with derived statuses and ERP enrichment.
//!
//! Reading never writes. Statuses are recomputed from the stored quantities
//! on every call, so two reads with no allocation in between agree.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use forgewms_auth::{AuthzError, Capability, UserIdentity, require};
use forgewms_core::{DocumentId, LineId, Quantity, Versioned};
use forgewms_warehouse::{Document, DocumentKind, ExternalOrderRef, LineStatus};

use crate::enricher::{EnrichedLine, Enricher, Enrichment};
use crate::store::{DocumentStore, StoreError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ViewError {
    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("store error: {0}")]
    Store(String),
}

impl From<AuthzError> for ViewError {
    fn from(value: AuthzError) -> Self {
        ViewError::Forbidden(value.to_string())
    }
}

impl From<StoreError> for ViewError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(what) => ViewError::NotFound(what),
            other => ViewError::Store(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineView {
    pub id: LineId,
    pub line_no: u32,
    pub item_code: String,
    pub description: Option<String>,
    pub bin_location: Option<String>,
    pub ordered_quantity: Quantity,
    pub fulfilled_quantity: Quantity,
    pub remaining_quantity: Quantity,
    pub status: LineStatus,
    pub can_add_remaining: bool,
    pub version: u64,
    pub external_ref: Option<ExternalOrderRef>,
    pub enrichment: Enrichment,
}

impl From<EnrichedLine> for LineView {
    fn from(e: EnrichedLine) -> Self {
        let line = &e.line;
        Self {
            id: line.id_typed(),
            line_no: line.line_no(),
            item_code: e.item_code().to_string(),
            description: e.description().map(str::to_string),
            bin_location: line.bin_location().map(str::to_string),
            ordered_quantity: line.ordered_quantity(),
            fulfilled_quantity: line.fulfilled_quantity(),
            remaining_quantity: line.remaining(),
            status: e.status(),
            can_add_remaining: e.can_add_remaining(),
            version: line.version(),
            external_ref: line.external_ref().cloned(),
            enrichment: e.enrichment,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentView {
    pub id: DocumentId,
    pub kind: DocumentKind,
    pub number: String,
    pub status: LineStatus,
    pub created_at: DateTime<Utc>,
    pub lines: Vec<LineView>,
}

#[derive(Clone)]
pub struct DocumentViewService {
    store: Arc<dyn DocumentStore>,
    enricher: Enricher,
}

impl core::fmt::Debug for DocumentViewService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DocumentViewService")
            .field("enricher", &self.enricher)
            .finish_non_exhaustive()
    }
}

impl DocumentViewService {
    pub fn new(store: Arc<dyn DocumentStore>, enricher: Enricher) -> Self {
        Self { store, enricher }
    }

    #[tracing::instrument(skip(self, user), fields(tenant_id = %user.tenant_id), err)]
    pub async fn view_document(
        &self,
        user: &UserIdentity,
        document_id: DocumentId,
    ) -> Result<DocumentView, ViewError> {
        require(user, &Capability::DASHBOARD)?;
        let document: Document = self.store.load_document(user.tenant_id, document_id).await?;
        let status = document.status();

        let enriched = self
            .enricher
            .enrich_all(user.tenant_id, document.lines().to_vec())
            .await;

        Ok(DocumentView {
            id: document.id_typed(),
            kind: document.kind(),
            number: document.number().to_string(),
            status,
            created_at: document.created_at(),
            lines: enriched.into_iter().map(LineView::from).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use forgewms_auth::Role;
    use forgewms_core::TenantId;
    use forgewms_erp::{ExternalLineSnapshot, InMemoryErp};
    use forgewms_warehouse::ExternalOrderKind;

    use crate::cache::SnapshotCache;
    use crate::store::InMemoryDocumentStore;

    async fn fixture() -> (Arc<InMemoryDocumentStore>, DocumentViewService, Document) {
        let tenant = TenantId::new();
        let linked = ExternalOrderRef::new(ExternalOrderKind::PurchaseOrder, 501, 0);

        let mut doc = Document::draft(tenant, DocumentKind::GoodsReceipt, "GRPO-7", Utc::now()).unwrap();
        doc.add_line("LOCAL-A", Quantity::from(4), Some(linked.clone())).unwrap();
        doc.add_line("LOCAL-B", Quantity::ZERO, None).unwrap();

        let store = Arc::new(InMemoryDocumentStore::new());
        store.insert_document(tenant, &doc).await.unwrap();

        let erp = Arc::new(InMemoryErp::new());
        erp.insert_line(ExternalLineSnapshot {
            key: linked,
            item_code: "A00001".into(),
            description: Some("Printer".into()),
            customer_code: Some("V1010".into()),
            customer_name: Some("Acme Supplies".into()),
            quantity: Quantity::from(4),
            open_quantity: Some(Quantity::from(4)),
            fetched_at: Utc::now(),
        });

        let enricher = Enricher::new(
            erp,
            Arc::new(SnapshotCache::new(Duration::from_secs(30))),
            Duration::from_secs(1),
        );
        let svc = DocumentViewService::new(store.clone(), enricher);
        (store, svc, doc)
    }

    #[tokio::test]
    async fn view_derives_statuses_and_enriches() {
        let (_store, svc, doc) = fixture().await;
        let user = UserIdentity::new(doc.tenant_id(), "clerk", vec![Role::USER]);

        let view = svc.view_document(&user, doc.id_typed()).await.unwrap();
        assert_eq!(view.status, LineStatus::Open);
        assert_eq!(view.lines.len(), 2);

        let first = &view.lines[0];
        assert_eq!(first.item_code, "A00001");
        assert_eq!(first.status, LineStatus::Open);
        assert!(first.can_add_remaining);
        assert!(matches!(first.enrichment, Enrichment::Enriched { .. }));

        let second = &view.lines[1];
        assert_eq!(second.item_code, "LOCAL-B");
        assert_eq!(second.status, LineStatus::Closed);
        assert!(!second.can_add_remaining);
        assert_eq!(second.enrichment, Enrichment::NotLinked);
    }

    #[tokio::test]
    async fn repeated_reads_agree_and_never_write() {
        let (store, svc, doc) = fixture().await;
        let user = UserIdentity::new(doc.tenant_id(), "clerk", vec![Role::USER]);

        let first = svc.view_document(&user, doc.id_typed()).await.unwrap();
        let second = svc.view_document(&user, doc.id_typed()).await.unwrap();

        assert_eq!(first.status, second.status);
        assert_eq!(
            first.lines.iter().map(|l| l.status).collect::<Vec<_>>(),
            second.lines.iter().map(|l| l.status).collect::<Vec<_>>()
        );
        assert_eq!(store.line_writes(), 0);
    }

    #[tokio::test]
    async fn inactive_user_is_forbidden() {
        let (_store, svc, doc) = fixture().await;
        let mut user = UserIdentity::new(doc.tenant_id(), "gone", vec![Role::ADMIN]);
        user.active = false;
        assert!(matches!(
            svc.view_document(&user, doc.id_typed()).await,
            Err(ViewError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn unknown_document_is_not_found() {
        let (_store, svc, doc) = fixture().await;
        let user = UserIdentity::new(doc.tenant_id(), "clerk", vec![Role::USER]);
        assert!(matches!(
            svc.view_document(&user, DocumentId::new()).await,
            Err(ViewError::NotFound(_))
        ));
    }
}
