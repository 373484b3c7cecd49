use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use forgewms_erp::{ErpError, ErpWarehouses, Warehouse};

/// Warehouse list for the transfer pickers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WarehouseList {
    pub warehouses: Vec<Warehouse>,
    /// True when the ERP did not answer and the offline defaults are shown.
    pub fallback: bool,
}

/// Reads warehouses from the ERP, falling back to a fixed list.
#[derive(Clone)]
pub struct WarehouseDirectory {
    source: Arc<dyn ErpWarehouses>,
    timeout: Duration,
}

impl core::fmt::Debug for WarehouseDirectory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WarehouseDirectory")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl WarehouseDirectory {
    pub fn new(source: Arc<dyn ErpWarehouses>, timeout: Duration) -> Self {
        Self { source, timeout }
    }

    /// Never fails: an ERP error, a timeout or an empty answer all yield
    /// [`Warehouse::offline_defaults`].
    #[tracing::instrument(skip(self))]
    pub async fn list(&self) -> WarehouseList {
        let result = match tokio::time::timeout(self.timeout, self.source.warehouses()).await {
            Ok(result) => result,
            Err(_) => Err(ErpError::Timeout),
        };

        match result {
            Ok(warehouses) if !warehouses.is_empty() => WarehouseList {
                warehouses,
                fallback: false,
            },
            Ok(_) => {
                tracing::warn!("ERP returned no warehouses; using offline defaults");
                WarehouseList::offline()
            }
            Err(err) => {
                tracing::warn!(error = %err, "warehouse list fell back to offline defaults");
                WarehouseList::offline()
            }
        }
    }
}

impl WarehouseList {
    fn offline() -> Self {
        Self {
            warehouses: Warehouse::offline_defaults(),
            fallback: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use forgewms_erp::InMemoryErp;

    struct Hanging;

    #[async_trait]
    impl ErpWarehouses for Hanging {
        async fn warehouses(&self) -> Result<Vec<Warehouse>, ErpError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(vec![Warehouse::new("late", "Late")])
        }
    }

    #[tokio::test]
    async fn erp_warehouses_are_returned_as_is() {
        let erp = Arc::new(InMemoryErp::new());
        erp.insert_warehouse(Warehouse::new("01", "General"));

        let list = WarehouseDirectory::new(erp, Duration::from_secs(1)).list().await;
        assert!(!list.fallback);
        assert_eq!(list.warehouses, vec![Warehouse::new("01", "General")]);
    }

    #[tokio::test]
    async fn empty_erp_answer_falls_back() {
        let list = WarehouseDirectory::new(Arc::new(InMemoryErp::new()), Duration::from_secs(1))
            .list()
            .await;
        assert!(list.fallback);
        assert_eq!(list.warehouses.len(), 3);
        assert_eq!(list.warehouses[0], Warehouse::new("WH001", "Main Warehouse"));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_erp_falls_back_after_timeout() {
        let list = WarehouseDirectory::new(Arc::new(Hanging), Duration::from_millis(200))
            .list()
            .await;
        assert!(list.fallback);
        assert_eq!(list.warehouses, Warehouse::offline_defaults());
    }
}
