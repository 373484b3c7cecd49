//! Service wiring: stores, ERP backends and the services built on them.

use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use forgewms_erp::{
    ErpOrderSource, ErpTransferPoster, ErpWarehouses, InMemoryErp, ItemCatalog,
    ServiceLayerClient,
};
use forgewms_infra::{
    AllocationService, DocumentService, DocumentStore, DocumentViewService, EngineConfig,
    Enricher, InMemoryDocumentStore, InMemoryTransferStore, ItemLookup, PostgresDocumentStore,
    PostgresTransferStore, SnapshotCache, TransferService, TransferStore, WarehouseDirectory,
};

/// The ERP roles; usually one client plays all of them.
#[derive(Clone)]
pub struct ErpBackends {
    pub orders: Arc<dyn ErpOrderSource>,
    pub items: Arc<dyn ItemCatalog>,
    pub poster: Arc<dyn ErpTransferPoster>,
    pub warehouses: Arc<dyn ErpWarehouses>,
}

impl ErpBackends {
    pub fn from_client<C>(client: Arc<C>) -> Self
    where
        C: ErpOrderSource + ItemCatalog + ErpTransferPoster + ErpWarehouses + 'static,
    {
        Self {
            orders: client.clone(),
            items: client.clone(),
            warehouses: client.clone(),
            poster: client,
        }
    }
}

#[derive(Clone)]
pub struct AppServices {
    pub documents: Arc<dyn DocumentStore>,
    pub drafts: DocumentService,
    pub views: DocumentViewService,
    pub allocations: AllocationService,
    pub transfers: TransferService,
    pub items: ItemLookup,
    pub warehouses: WarehouseDirectory,
}

impl AppServices {
    pub fn assemble(
        config: &EngineConfig,
        documents: Arc<dyn DocumentStore>,
        transfers: Arc<dyn TransferStore>,
        erp: ErpBackends,
    ) -> Self {
        let cache = Arc::new(SnapshotCache::new(config.snapshot_ttl));
        let enricher = Enricher::new(erp.orders, cache, config.erp_timeout);
        let items = ItemLookup::new(erp.items, config.erp_timeout);

        Self {
            drafts: DocumentService::new(documents.clone()),
            views: DocumentViewService::new(documents.clone(), enricher),
            allocations: AllocationService::new(
                documents.clone(),
                config.allocation_policy,
                config.max_retries,
            ),
            transfers: TransferService::new(transfers, erp.poster, items.clone()),
            items,
            warehouses: WarehouseDirectory::new(erp.warehouses, config.erp_timeout),
            documents,
        }
    }

    /// Everything in memory (dev/test).
    pub fn in_memory(config: &EngineConfig, erp: Arc<InMemoryErp>) -> Self {
        Self::assemble(
            config,
            Arc::new(InMemoryDocumentStore::new()),
            Arc::new(InMemoryTransferStore::new()),
            ErpBackends::from_client(erp),
        )
    }
}

/// Pick backends from configuration: Postgres when `DATABASE_URL` is set,
/// the Service Layer when SAP settings are present, in-memory otherwise.
pub async fn build_services(config: &EngineConfig) -> anyhow::Result<AppServices> {
    let erp = match &config.erp {
        Some(sl) => {
            tracing::info!(base_url = %sl.base_url, "using SAP Business One Service Layer");
            let client = ServiceLayerClient::new(sl.clone()).context("failed to build ERP client")?;
            ErpBackends::from_client(Arc::new(client))
        }
        None => {
            tracing::warn!("SAP_B1_BASE_URL not set; using in-memory ERP");
            ErpBackends::from_client(Arc::new(InMemoryErp::new()))
        }
    };

    let (documents, transfers): (Arc<dyn DocumentStore>, Arc<dyn TransferStore>) =
        match &config.database_url {
            Some(url) => {
                let pool = PgPoolOptions::new()
                    .max_connections(10)
                    .connect(url)
                    .await
                    .context("failed to connect to Postgres")?;
                tracing::info!("using Postgres stores");
                (
                    Arc::new(PostgresDocumentStore::new(pool.clone())),
                    Arc::new(PostgresTransferStore::new(pool)),
                )
            }
            None => {
                tracing::warn!("DATABASE_URL not set; using in-memory stores");
                (
                    Arc::new(InMemoryDocumentStore::new()),
                    Arc::new(InMemoryTransferStore::new()),
                )
            }
        };

    Ok(AppServices::assemble(config, documents, transfers, erp))
}
