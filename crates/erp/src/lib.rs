//! ERP (SAP Business One) integration boundary.
//!
//! The warehouse side only ever *reads* order master data from the ERP, plus a
//! single write: posting an approved stock transfer. Both directions are
//! expressed as async traits so the services can run against the in-memory
//! ERP in tests and the Service Layer client in production.

pub mod error;
pub mod in_memory;
pub mod items;
pub mod service_layer;
pub mod snapshot;
pub mod source;
pub mod warehouses;

pub use error::ErpError;
pub use in_memory::InMemoryErp;
pub use items::{ItemCatalog, ItemDetails};
pub use service_layer::{ServiceLayerClient, ServiceLayerConfig};
pub use snapshot::{ExternalLineSnapshot, LineMatch, select_match};
pub use source::{ErpOrderSource, ErpTransferPoster};
pub use warehouses::{ErpWarehouses, Warehouse};
