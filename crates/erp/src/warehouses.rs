use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ErpError;

/// A warehouse as offered in the transfer from/to pickers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    pub code: String,
    pub name: String,
}

impl Warehouse {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }

    /// Fixed list shown while the ERP is offline.
    pub fn offline_defaults() -> Vec<Warehouse> {
        vec![
            Warehouse::new("WH001", "Main Warehouse"),
            Warehouse::new("WH002", "Secondary Warehouse"),
            Warehouse::new("WH003", "Storage Warehouse"),
        ]
    }
}

#[async_trait]
pub trait ErpWarehouses: Send + Sync {
    async fn warehouses(&self) -> Result<Vec<Warehouse>, ErpError>;
}
