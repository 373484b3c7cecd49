use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ErpError;

/// Item master data as displayed next to a scanned code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDetails {
    pub item_code: String,
    pub item_name: String,
    pub unit_of_measure: String,
    /// True when the ERP could not be reached and placeholder values are shown.
    #[serde(default)]
    pub fallback: bool,
}

impl ItemDetails {
    /// Placeholder shown when the ERP is unavailable.
    pub fn fallback(item_code: &str) -> Self {
        Self {
            item_code: item_code.to_string(),
            item_name: format!("Item {item_code}"),
            unit_of_measure: "EA".to_string(),
            fallback: true,
        }
    }
}

#[async_trait]
pub trait ItemCatalog: Send + Sync {
    async fn item_details(&self, item_code: &str) -> Result<ItemDetails, ErpError>;
}
