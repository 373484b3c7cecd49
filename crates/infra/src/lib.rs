//! Infrastructure layer: stores, ERP enrichment, configuration and the
//! services that tie them to the warehouse domain.

pub mod allocation;
pub mod cache;
pub mod config;
pub mod documents;
pub mod enricher;
pub mod items;
pub mod store;
pub mod transfers;
pub mod view;
pub mod warehouses;

pub use allocation::{AllocationError, AllocationService};
pub use cache::SnapshotCache;
pub use config::{ConfigError, EngineConfig};
pub use documents::{
    DocumentError, DocumentService, DraftDocumentRequest, DraftedDocument, DraftedLine,
};
pub use enricher::{EnrichedLine, Enricher, Enrichment};
pub use items::ItemLookup;
pub use store::{
    DocumentStore, InMemoryDocumentStore, InMemoryTransferStore, PostgresDocumentStore,
    PostgresTransferStore, StoreError, TransferStore,
};
pub use transfers::{
    CreateTransferRequest, QcQueue, TransferError, TransferItemRequest, TransferService,
};
pub use view::{DocumentView, DocumentViewService, LineView, ViewError};
pub use warehouses::{WarehouseDirectory, WarehouseList};
