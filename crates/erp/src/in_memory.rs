use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;

use forgewms_warehouse::{ExternalOrderRef, SerialTransfer};

use crate::{
    ErpError, ErpOrderSource, ErpTransferPoster, ErpWarehouses, ExternalLineSnapshot, ItemCatalog,
    ItemDetails, Warehouse,
};

/// In-memory ERP for tests/dev.
///
/// Lines are keyed by the exact external reference; inserting twice under one
/// key simulates an ERP that broke its own uniqueness guarantee.
#[derive(Debug)]
pub struct InMemoryErp {
    lines: RwLock<HashMap<ExternalOrderRef, Vec<ExternalLineSnapshot>>>,
    items: RwLock<HashMap<String, ItemDetails>>,
    warehouses: RwLock<Vec<Warehouse>>,
    posted: RwLock<Vec<(String, SerialTransfer)>>,
    next_doc_num: AtomicU64,
    reject_postings: AtomicBool,
}

impl Default for InMemoryErp {
    fn default() -> Self {
        Self {
            lines: RwLock::new(HashMap::new()),
            items: RwLock::new(HashMap::new()),
            warehouses: RwLock::new(Vec::new()),
            posted: RwLock::new(Vec::new()),
            next_doc_num: AtomicU64::new(1000),
            reject_postings: AtomicBool::new(false),
        }
    }
}

impl InMemoryErp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_line(&self, snapshot: ExternalLineSnapshot) {
        if let Ok(mut lines) = self.lines.write() {
            lines.entry(snapshot.key.clone()).or_default().push(snapshot);
        }
    }

    pub fn clear_lines(&self) {
        if let Ok(mut lines) = self.lines.write() {
            lines.clear();
        }
    }

    pub fn insert_item(&self, item: ItemDetails) {
        if let Ok(mut items) = self.items.write() {
            items.insert(item.item_code.clone(), item);
        }
    }

    pub fn insert_warehouse(&self, warehouse: Warehouse) {
        if let Ok(mut warehouses) = self.warehouses.write() {
            warehouses.push(warehouse);
        }
    }

    /// Make every subsequent posting fail (simulates an ERP outage).
    pub fn reject_postings(&self, reject: bool) {
        self.reject_postings.store(reject, Ordering::SeqCst);
    }

    /// Transfers posted so far, with the document numbers handed out.
    pub fn posted(&self) -> Vec<(String, SerialTransfer)> {
        self.posted.read().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ErpOrderSource for InMemoryErp {
    async fn fetch_line_candidates(
        &self,
        key: &ExternalOrderRef,
    ) -> Result<Vec<ExternalLineSnapshot>, ErpError> {
        let lines = self
            .lines
            .read()
            .map_err(|_| ErpError::Transport("lock poisoned".to_string()))?;
        Ok(lines.get(key).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl ItemCatalog for InMemoryErp {
    async fn item_details(&self, item_code: &str) -> Result<ItemDetails, ErpError> {
        let items = self
            .items
            .read()
            .map_err(|_| ErpError::Transport("lock poisoned".to_string()))?;
        items
            .get(item_code)
            .cloned()
            .ok_or_else(|| ErpError::NotFound(format!("item {item_code}")))
    }
}

#[async_trait]
impl ErpWarehouses for InMemoryErp {
    async fn warehouses(&self) -> Result<Vec<Warehouse>, ErpError> {
        let warehouses = self
            .warehouses
            .read()
            .map_err(|_| ErpError::Transport("lock poisoned".to_string()))?;
        Ok(warehouses.clone())
    }
}

#[async_trait]
impl ErpTransferPoster for InMemoryErp {
    async fn post_stock_transfer(&self, transfer: &SerialTransfer) -> Result<String, ErpError> {
        if self.reject_postings.load(Ordering::SeqCst) {
            return Err(ErpError::Rejected {
                status: 503,
                message: "ERP unavailable".to_string(),
            });
        }
        let doc_num = self.next_doc_num.fetch_add(1, Ordering::SeqCst).to_string();
        let mut posted = self
            .posted
            .write()
            .map_err(|_| ErpError::Transport("lock poisoned".to_string()))?;
        posted.push((doc_num.clone(), transfer.clone()));
        Ok(doc_num)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use forgewms_core::{Quantity, TenantId, UserId};
    use forgewms_warehouse::{ExternalOrderKind, NewTransfer, TransferPriority};

    fn snapshot(key: &ExternalOrderRef, item: &str) -> ExternalLineSnapshot {
        ExternalLineSnapshot {
            key: key.clone(),
            item_code: item.to_string(),
            description: Some("Widget".into()),
            customer_code: Some("C001".into()),
            customer_name: Some("ACME".into()),
            quantity: Quantity::from(5),
            open_quantity: Some(Quantity::from(5)),
            fetched_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn fetch_line_finds_inserted_line() {
        let erp = InMemoryErp::new();
        let key = ExternalOrderRef::new(ExternalOrderKind::SalesOrder, 42, 0);
        erp.insert_line(snapshot(&key, "A-1"));

        let line = erp.fetch_line(&key).await.unwrap();
        assert_eq!(line.item_code, "A-1");
    }

    #[tokio::test]
    async fn unknown_key_is_not_found() {
        let erp = InMemoryErp::new();
        let key = ExternalOrderRef::new(ExternalOrderKind::PurchaseOrder, 1, 1);
        assert!(matches!(erp.fetch_line(&key).await, Err(ErpError::NotFound(_))));
    }

    #[tokio::test]
    async fn duplicate_lines_surface_as_ambiguous_match() {
        let erp = InMemoryErp::new();
        let key = ExternalOrderRef::new(ExternalOrderKind::SalesOrder, 42, 3);
        erp.insert_line(snapshot(&key, "FIRST"));
        erp.insert_line(snapshot(&key, "SECOND"));

        let m = erp.fetch_line_match(&key).await.unwrap();
        assert_eq!(m.snapshot.item_code, "FIRST");
        assert_eq!(m.candidates, 2);
    }

    #[tokio::test]
    async fn warehouses_come_back_in_insertion_order() {
        let erp = InMemoryErp::new();
        assert!(erp.warehouses().await.unwrap().is_empty());

        erp.insert_warehouse(Warehouse::new("01", "General"));
        erp.insert_warehouse(Warehouse::new("02", "Returns"));
        let codes: Vec<String> = erp.warehouses().await.unwrap().into_iter().map(|w| w.code).collect();
        assert_eq!(codes, vec!["01", "02"]);
    }

    #[tokio::test]
    async fn postings_get_sequential_numbers_until_rejected() {
        let erp = InMemoryErp::new();
        let transfer = SerialTransfer::create(NewTransfer {
            tenant_id: TenantId::new(),
            number: "ST-1".into(),
            owner: UserId::new(),
            from_warehouse: "WH001".into(),
            to_warehouse: "WH002".into(),
            priority: TransferPriority::Normal,
            notes: None,
            created_at: Utc::now(),
        })
        .unwrap();

        assert_eq!(erp.post_stock_transfer(&transfer).await.unwrap(), "1000");
        assert_eq!(erp.post_stock_transfer(&transfer).await.unwrap(), "1001");

        erp.reject_postings(true);
        assert!(erp.post_stock_transfer(&transfer).await.is_err());
        assert_eq!(erp.posted().len(), 2);
    }
}
