//! Allocation against persisted lines.
//!
//! Each attempt is: load the line, run the pure [`allocate`], then
//! compare-and-set the result against the version that was loaded. A lost
//! race reloads and tries again; a business-rule failure returns at once
//! without writing anything.

use std::sync::Arc;

use thiserror::Error;

use forgewms_auth::{AuthzError, Capability, UserIdentity, require};
use forgewms_core::{DocumentId, ExpectedVersion, LineId, Quantity, Versioned};
use forgewms_warehouse::{AllocationPolicy, DocumentLine, LineError, allocate, can_add_remaining};

use crate::store::{DocumentStore, StoreError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AllocationError {
    #[error(transparent)]
    Line(#[from] LineError),

    #[error("line {0} is already closed")]
    LineClosed(LineId),

    #[error("line {line_id} was modified concurrently ({attempts} attempts)")]
    ConcurrentModification { line_id: LineId, attempts: u32 },

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("store error: {0}")]
    Store(String),
}

impl From<AuthzError> for AllocationError {
    fn from(value: AuthzError) -> Self {
        AllocationError::Forbidden(value.to_string())
    }
}

#[derive(Clone)]
pub struct AllocationService {
    store: Arc<dyn DocumentStore>,
    policy: AllocationPolicy,
    max_retries: u32,
}

impl core::fmt::Debug for AllocationService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AllocationService")
            .field("policy", &self.policy)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl AllocationService {
    pub fn new(store: Arc<dyn DocumentStore>, policy: AllocationPolicy, max_retries: u32) -> Self {
        Self {
            store,
            policy,
            max_retries,
        }
    }

    pub fn policy(&self) -> &AllocationPolicy {
        &self.policy
    }

    /// Allocate `quantity` to one line of `document_id`.
    #[tracing::instrument(
        skip(self, user),
        fields(tenant_id = %user.tenant_id, user = %user.username),
        err
    )]
    pub async fn allocate(
        &self,
        user: &UserIdentity,
        document_id: DocumentId,
        line_id: LineId,
        quantity: Quantity,
    ) -> Result<DocumentLine, AllocationError> {
        self.with_retries(user, document_id, line_id, |_line| Ok(quantity))
            .await
    }

    /// Allocate whatever is still open on the line.
    #[tracing::instrument(
        skip(self, user),
        fields(tenant_id = %user.tenant_id, user = %user.username),
        err
    )]
    pub async fn add_remaining(
        &self,
        user: &UserIdentity,
        document_id: DocumentId,
        line_id: LineId,
    ) -> Result<DocumentLine, AllocationError> {
        self.with_retries(user, document_id, line_id, |line| {
            if !can_add_remaining(line) {
                return Err(AllocationError::LineClosed(line.id_typed()));
            }
            Ok(line.remaining())
        })
        .await
    }

    async fn with_retries<F>(
        &self,
        user: &UserIdentity,
        document_id: DocumentId,
        line_id: LineId,
        quantity_for: F,
    ) -> Result<DocumentLine, AllocationError>
    where
        F: Fn(&DocumentLine) -> Result<Quantity, AllocationError>,
    {
        require(user, &Capability::WAREHOUSE_OPERATOR)?;
        let tenant_id = user.tenant_id;
        let attempts = self.max_retries.saturating_add(1);

        for attempt in 1..=attempts {
            let current = self
                .store
                .load_line(tenant_id, line_id)
                .await
                .map_err(store_error)?;
            if current.document_id() != document_id {
                return Err(AllocationError::NotFound(format!(
                    "line {line_id} in document {document_id}"
                )));
            }

            let quantity = quantity_for(&current)?;
            let next = allocate(&current, quantity, &self.policy)?;

            match self
                .store
                .save_line(tenant_id, &next, ExpectedVersion::Exact(current.version()))
                .await
            {
                Ok(()) => {
                    tracing::info!(
                        %line_id,
                        %quantity,
                        fulfilled = %next.fulfilled_quantity(),
                        status = %next.status(),
                        attempt,
                        "allocated"
                    );
                    return Ok(next);
                }
                Err(err) if err.is_conflict() => {
                    tracing::debug!(%line_id, attempt, error = %err, "allocation lost a race; retrying");
                }
                Err(err) => return Err(store_error(err)),
            }
        }

        tracing::warn!(%line_id, attempts, "allocation retries exhausted");
        Err(AllocationError::ConcurrentModification { line_id, attempts })
    }
}

fn store_error(err: StoreError) -> AllocationError {
    match err {
        StoreError::NotFound(what) => AllocationError::NotFound(what),
        other => AllocationError::Store(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use forgewms_auth::Role;
    use forgewms_core::TenantId;
    use forgewms_warehouse::{Document, DocumentKind, LineStatus};
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::store::InMemoryDocumentStore;

    fn qty(n: i64) -> Quantity {
        Quantity::from(n)
    }

    fn operator(tenant_id: TenantId) -> UserIdentity {
        UserIdentity::new(tenant_id, "op", vec![Role::WAREHOUSE_OPERATOR])
    }

    async fn seeded(ordered: &[i64]) -> (Arc<InMemoryDocumentStore>, Document) {
        let tenant = TenantId::new();
        let mut doc = Document::draft(tenant, DocumentKind::GoodsReceipt, "GRPO-1", Utc::now()).unwrap();
        for (i, o) in ordered.iter().enumerate() {
            doc.add_line(format!("ITEM-{i}"), qty(*o), None).unwrap();
        }
        let store = Arc::new(InMemoryDocumentStore::new());
        store.insert_document(tenant, &doc).await.unwrap();
        (store, doc)
    }

    fn service(store: Arc<dyn DocumentStore>) -> AllocationService {
        AllocationService::new(store, AllocationPolicy::default(), 3)
    }

    #[tokio::test]
    async fn allocation_persists_new_quantity() {
        let (store, doc) = seeded(&[10]).await;
        let line_id = doc.lines()[0].id_typed();
        let user = operator(doc.tenant_id());

        let line = service(store.clone())
            .allocate(&user, doc.id_typed(), line_id, qty(4))
            .await
            .unwrap();
        assert_eq!(line.fulfilled_quantity(), qty(4));

        let stored = store.load_line(doc.tenant_id(), line_id).await.unwrap();
        assert_eq!(stored.fulfilled_quantity(), qty(4));
        assert_eq!(stored.version(), 1);
    }

    #[tokio::test]
    async fn over_allocation_writes_nothing() {
        let (store, doc) = seeded(&[3]).await;
        let line_id = doc.lines()[0].id_typed();
        let err = service(store.clone())
            .allocate(&operator(doc.tenant_id()), doc.id_typed(), line_id, qty(4))
            .await
            .unwrap_err();

        assert!(matches!(err, AllocationError::Line(LineError::OverAllocation { .. })));
        assert_eq!(store.line_writes(), 0);
    }

    #[tokio::test]
    async fn invalid_quantity_is_rejected_before_any_write() {
        let (store, doc) = seeded(&[3]).await;
        let err = service(store.clone())
            .allocate(&operator(doc.tenant_id()), doc.id_typed(), doc.lines()[0].id_typed(), qty(0))
            .await
            .unwrap_err();
        assert!(matches!(err, AllocationError::Line(LineError::InvalidQuantity(_))));
        assert_eq!(store.line_writes(), 0);
    }

    #[tokio::test]
    async fn zero_ordered_line_cannot_be_allocated() {
        let (store, doc) = seeded(&[0]).await;
        let err = service(store)
            .allocate(&operator(doc.tenant_id()), doc.id_typed(), doc.lines()[0].id_typed(), qty(1))
            .await
            .unwrap_err();
        assert!(matches!(err, AllocationError::Line(LineError::OverAllocation { .. })));
    }

    #[tokio::test]
    async fn requires_warehouse_operator_capability() {
        let (store, doc) = seeded(&[3]).await;
        let user = UserIdentity::new(doc.tenant_id(), "viewer", vec![Role::USER]);
        let err = service(store.clone())
            .allocate(&user, doc.id_typed(), doc.lines()[0].id_typed(), qty(1))
            .await
            .unwrap_err();
        assert!(matches!(err, AllocationError::Forbidden(_)));
        assert_eq!(store.line_writes(), 0);

        let admin = UserIdentity::new(doc.tenant_id(), "root", vec![Role::ADMIN]);
        assert!(
            service(store)
                .allocate(&admin, doc.id_typed(), doc.lines()[0].id_typed(), qty(1))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn line_must_belong_to_the_document() {
        let (store, doc) = seeded(&[3]).await;
        let err = service(store)
            .allocate(&operator(doc.tenant_id()), DocumentId::new(), doc.lines()[0].id_typed(), qty(1))
            .await
            .unwrap_err();
        assert!(matches!(err, AllocationError::NotFound(_)));
    }

    #[tokio::test]
    async fn other_tenants_cannot_see_the_line() {
        let (store, doc) = seeded(&[3]).await;
        let err = service(store)
            .allocate(&operator(TenantId::new()), doc.id_typed(), doc.lines()[0].id_typed(), qty(1))
            .await
            .unwrap_err();
        assert!(matches!(err, AllocationError::NotFound(_)));
    }

    #[tokio::test]
    async fn add_remaining_closes_the_line_then_refuses() {
        let (store, doc) = seeded(&[7]).await;
        let svc = service(store);
        let user = operator(doc.tenant_id());
        let line_id = doc.lines()[0].id_typed();

        svc.allocate(&user, doc.id_typed(), line_id, qty(2)).await.unwrap();
        let line = svc.add_remaining(&user, doc.id_typed(), line_id).await.unwrap();
        assert_eq!(line.fulfilled_quantity(), qty(7));
        assert_eq!(line.status(), LineStatus::Closed);

        let err = svc.add_remaining(&user, doc.id_typed(), line_id).await.unwrap_err();
        assert_eq!(err, AllocationError::LineClosed(line_id));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_allocations_sum_exactly() {
        let (store, doc) = seeded(&[100]).await;
        let svc = AllocationService::new(store.clone(), AllocationPolicy::default(), 64);
        let line_id = doc.lines()[0].id_typed();

        let mut handles = Vec::new();
        for q in [10, 20, 30, 40] {
            let svc = svc.clone();
            let user = operator(doc.tenant_id());
            let doc_id = doc.id_typed();
            handles.push(tokio::spawn(async move {
                svc.allocate(&user, doc_id, line_id, qty(q)).await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        let stored = store.load_line(doc.tenant_id(), line_id).await.unwrap();
        assert_eq!(stored.fulfilled_quantity(), qty(100));
        assert_eq!(stored.status(), LineStatus::Closed);
        assert_eq!(store.line_writes(), 4);
    }

    /// Delegates reads but reports a conflict on every write.
    struct AlwaysConflicting {
        inner: InMemoryDocumentStore,
        saves: AtomicU32,
    }

    #[async_trait]
    impl DocumentStore for AlwaysConflicting {
        async fn insert_document(&self, tenant_id: TenantId, document: &Document) -> Result<(), StoreError> {
            self.inner.insert_document(tenant_id, document).await
        }

        async fn load_document(&self, tenant_id: TenantId, id: DocumentId) -> Result<Document, StoreError> {
            self.inner.load_document(tenant_id, id).await
        }

        async fn load_line(&self, tenant_id: TenantId, line_id: LineId) -> Result<DocumentLine, StoreError> {
            self.inner.load_line(tenant_id, line_id).await
        }

        async fn save_line(
            &self,
            _tenant_id: TenantId,
            line: &DocumentLine,
            expected: ExpectedVersion,
        ) -> Result<(), StoreError> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Conflict {
                expected,
                actual: line.version() + 10,
            })
        }
    }

    #[tokio::test]
    async fn exhausted_retries_surface_concurrent_modification() {
        let tenant = TenantId::new();
        let mut doc = Document::draft(tenant, DocumentKind::PickList, "PL-9", Utc::now()).unwrap();
        let line_id = doc.add_line("A", qty(5), None).unwrap();
        let store = Arc::new(AlwaysConflicting {
            inner: InMemoryDocumentStore::new(),
            saves: AtomicU32::new(0),
        });
        store.insert_document(tenant, &doc).await.unwrap();

        let err = AllocationService::new(store.clone(), AllocationPolicy::default(), 3)
            .allocate(&operator(tenant), doc.id_typed(), line_id, qty(1))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            AllocationError::ConcurrentModification {
                line_id,
                attempts: 4
            }
        );
        assert_eq!(store.saves.load(Ordering::SeqCst), 4);
        let stored = store.load_line(tenant, line_id).await.unwrap();
        assert_eq!(stored.fulfilled_quantity(), Quantity::ZERO);
    }
}
