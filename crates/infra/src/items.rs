use std::sync::Arc;
use std::time::Duration;

use forgewms_core::DomainError;
use forgewms_erp::{ErpError, ItemCatalog, ItemDetails};

/// Item name/UoM lookup that never fails because of the ERP.
#[derive(Clone)]
pub struct ItemLookup {
    catalog: Arc<dyn ItemCatalog>,
    timeout: Duration,
}

impl core::fmt::Debug for ItemLookup {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ItemLookup")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ItemLookup {
    pub fn new(catalog: Arc<dyn ItemCatalog>, timeout: Duration) -> Self {
        Self { catalog, timeout }
    }

    /// ERP item details, or placeholder details flagged `fallback` when the ERP
    /// does not answer. Only an empty code is an error.
    #[tracing::instrument(skip(self))]
    pub async fn lookup_item(&self, item_code: &str) -> Result<ItemDetails, DomainError> {
        let code = item_code.trim();
        if code.is_empty() {
            return Err(DomainError::validation("item code is required"));
        }

        let result = match tokio::time::timeout(self.timeout, self.catalog.item_details(code)).await {
            Ok(result) => result,
            Err(_) => Err(ErpError::Timeout),
        };

        match result {
            Ok(details) => Ok(details),
            Err(err) => {
                tracing::warn!(item_code = %code, error = %err, "item lookup fell back to placeholder");
                Ok(ItemDetails::fallback(code))
            }
        }
    }
}
