use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use forgewms_core::{DocumentId, ExpectedVersion, LineId, TenantId, TransferId, Versioned};
use forgewms_warehouse::{Document, DocumentKind, DocumentLine, SerialTransfer, TransferStatus};

use super::{DocumentStore, StoreError, TransferStore};

fn poisoned() -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

#[derive(Debug, Clone)]
struct DocumentHeader {
    kind: DocumentKind,
    number: String,
    created_at: DateTime<Utc>,
    line_ids: Vec<LineId>,
}

#[derive(Debug, Default)]
struct Tables {
    documents: HashMap<(TenantId, DocumentId), DocumentHeader>,
    lines: HashMap<(TenantId, LineId), DocumentLine>,
}

/// In-memory tenant-isolated document store.
///
/// Intended for tests/dev. Counts line writes so callers can assert that a
/// read path never writes.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    tables: RwLock<Tables>,
    line_writes: AtomicU64,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `save_line` calls so far.
    pub fn line_writes(&self) -> u64 {
        self.line_writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn insert_document(&self, tenant_id: TenantId, document: &Document) -> Result<(), StoreError> {
        if document.tenant_id() != tenant_id {
            return Err(StoreError::NotFound(format!("document {}", document.id_typed())));
        }

        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        let key = (tenant_id, document.id_typed());
        if tables.documents.contains_key(&key) {
            return Err(StoreError::Duplicate(format!("document {}", document.id_typed())));
        }

        tables.documents.insert(
            key,
            DocumentHeader {
                kind: document.kind(),
                number: document.number().to_string(),
                created_at: document.created_at(),
                line_ids: document.lines().iter().map(|l| l.id_typed()).collect(),
            },
        );
        for line in document.lines() {
            tables.lines.insert((tenant_id, line.id_typed()), line.clone());
        }
        Ok(())
    }

    async fn load_document(&self, tenant_id: TenantId, id: DocumentId) -> Result<Document, StoreError> {
        let tables = self.tables.read().map_err(|_| poisoned())?;
        let header = tables
            .documents
            .get(&(tenant_id, id))
            .ok_or_else(|| StoreError::NotFound(format!("document {id}")))?;

        let lines = header
            .line_ids
            .iter()
            .map(|line_id| {
                tables
                    .lines
                    .get(&(tenant_id, *line_id))
                    .cloned()
                    .ok_or_else(|| StoreError::Backend(format!("dangling line {line_id}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Document::from_parts(
            id,
            tenant_id,
            header.kind,
            header.number.clone(),
            lines,
            header.created_at,
        )
        .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn load_line(&self, tenant_id: TenantId, line_id: LineId) -> Result<DocumentLine, StoreError> {
        let tables = self.tables.read().map_err(|_| poisoned())?;
        tables
            .lines
            .get(&(tenant_id, line_id))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("line {line_id}")))
    }

    async fn save_line(
        &self,
        tenant_id: TenantId,
        line: &DocumentLine,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        let stored = tables
            .lines
            .get_mut(&(tenant_id, line.id_typed()))
            .ok_or_else(|| StoreError::NotFound(format!("line {}", line.id_typed())))?;

        if stored.document_id() != line.document_id() {
            return Err(StoreError::Backend(format!(
                "line {} cannot move between documents",
                line.id_typed()
            )));
        }
        if !expected.matches(stored.version()) {
            return Err(StoreError::Conflict {
                expected,
                actual: stored.version(),
            });
        }

        *stored = line.clone();
        self.line_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// In-memory tenant-isolated transfer store.
#[derive(Debug, Default)]
pub struct InMemoryTransferStore {
    transfers: RwLock<HashMap<(TenantId, TransferId), SerialTransfer>>,
}

impl InMemoryTransferStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransferStore for InMemoryTransferStore {
    async fn insert_transfer(&self, transfer: &SerialTransfer) -> Result<(), StoreError> {
        let mut map = self.transfers.write().map_err(|_| poisoned())?;
        let key = (transfer.tenant_id(), transfer.id_typed());
        if map.contains_key(&key) {
            return Err(StoreError::Duplicate(format!("transfer {}", transfer.id_typed())));
        }
        map.insert(key, transfer.clone());
        Ok(())
    }

    async fn load_transfer(&self, tenant_id: TenantId, id: TransferId) -> Result<SerialTransfer, StoreError> {
        let map = self.transfers.read().map_err(|_| poisoned())?;
        map.get(&(tenant_id, id))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("transfer {id}")))
    }

    async fn list_by_status(
        &self,
        tenant_id: TenantId,
        status: TransferStatus,
    ) -> Result<Vec<SerialTransfer>, StoreError> {
        let map = self.transfers.read().map_err(|_| poisoned())?;
        Ok(map
            .iter()
            .filter(|((tenant, _), t)| *tenant == tenant_id && t.status() == status)
            .map(|(_, t)| t.clone())
            .collect())
    }

    async fn save_transfer(
        &self,
        transfer: &SerialTransfer,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError> {
        let mut map = self.transfers.write().map_err(|_| poisoned())?;
        let stored = map
            .get_mut(&(transfer.tenant_id(), transfer.id_typed()))
            .ok_or_else(|| StoreError::NotFound(format!("transfer {}", transfer.id_typed())))?;
        if !expected.matches(stored.version()) {
            return Err(StoreError::Conflict {
                expected,
                actual: stored.version(),
            });
        }
        *stored = transfer.clone();
        Ok(())
    }

    async fn delete_transfer(&self, tenant_id: TenantId, id: TransferId) -> Result<(), StoreError> {
        let mut map = self.transfers.write().map_err(|_| poisoned())?;
        map.remove(&(tenant_id, id))
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("transfer {id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forgewms_core::Quantity;
    use forgewms_warehouse::{AllocationPolicy, allocate};

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn seeded(tenant_id: TenantId) -> (InMemoryDocumentStore, Document) {
        let mut doc = Document::draft(tenant_id, DocumentKind::PickList, "PL-1", Utc::now()).unwrap();
        doc.add_line("A", Quantity::from(5), None).unwrap();
        doc.add_line("B", Quantity::from(1), None).unwrap();
        let store = InMemoryDocumentStore::new();
        (store, doc)
    }

    #[tokio::test]
    async fn documents_are_tenant_isolated() {
        let tenant = test_tenant_id();
        let (store, doc) = seeded(tenant);
        store.insert_document(tenant, &doc).await.unwrap();

        let loaded = store.load_document(tenant, doc.id_typed()).await.unwrap();
        assert_eq!(loaded, doc);

        let other = test_tenant_id();
        assert!(matches!(
            store.load_document(other, doc.id_typed()).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.load_line(other, doc.lines()[0].id_typed()).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn save_line_is_compare_and_set() {
        let tenant = test_tenant_id();
        let (store, doc) = seeded(tenant);
        store.insert_document(tenant, &doc).await.unwrap();

        let line = store.load_line(tenant, doc.lines()[0].id_typed()).await.unwrap();
        let next = allocate(&line, Quantity::from(2), &AllocationPolicy::default()).unwrap();
        store
            .save_line(tenant, &next, ExpectedVersion::Exact(line.version()))
            .await
            .unwrap();

        // A second writer still holding the old version loses.
        let stale = allocate(&line, Quantity::from(1), &AllocationPolicy::default()).unwrap();
        let err = store
            .save_line(tenant, &stale, ExpectedVersion::Exact(line.version()))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::Conflict {
                expected: ExpectedVersion::Exact(0),
                actual: 1
            }
        );

        let stored = store.load_line(tenant, line.id_typed()).await.unwrap();
        assert_eq!(stored.fulfilled_quantity(), Quantity::from(2));
        assert_eq!(store.line_writes(), 1);
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let tenant = test_tenant_id();
        let (store, doc) = seeded(tenant);
        store.insert_document(tenant, &doc).await.unwrap();
        assert!(matches!(
            store.insert_document(tenant, &doc).await,
            Err(StoreError::Duplicate(_))
        ));
    }
}
