//! Serial-number transfer workflow with QC approval and ERP posting.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use forgewms_auth::{AuthzError, Capability, UserIdentity, require};
use forgewms_core::{DomainError, ExpectedVersion, TransferId, Versioned};
use forgewms_erp::{ErpError, ErpTransferPoster};
use forgewms_warehouse::{NewTransfer, SerialTransfer, TransferPriority, TransferStatus};

use crate::items::ItemLookup;
use crate::store::{StoreError, TransferStore};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("transfer {0} was modified concurrently")]
    ConcurrentModification(TransferId),

    #[error("ERP posting failed: {0}")]
    Erp(#[from] ErpError),

    #[error("store error: {0}")]
    Store(String),
}

impl From<AuthzError> for TransferError {
    fn from(value: AuthzError) -> Self {
        TransferError::Forbidden(value.to_string())
    }
}

impl From<StoreError> for TransferError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(what) => TransferError::NotFound(what),
            other => TransferError::Store(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferItemRequest {
    pub item_code: String,
    #[serde(default)]
    pub item_name: Option<String>,
    pub quantity: u32,
    #[serde(default)]
    pub unit_of_measure: Option<String>,
    #[serde(default)]
    pub serials: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTransferRequest {
    pub number: String,
    pub from_warehouse: String,
    pub to_warehouse: String,
    #[serde(default)]
    pub priority: TransferPriority,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub items: Vec<TransferItemRequest>,
}

/// How many of the approver's own decisions the QC queue shows.
pub const RECENT_DECISIONS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QcQueue {
    pub pending: Vec<SerialTransfer>,
    pub recent_decisions: Vec<SerialTransfer>,
}

#[derive(Clone)]
pub struct TransferService {
    store: Arc<dyn TransferStore>,
    poster: Arc<dyn ErpTransferPoster>,
    items: ItemLookup,
}

impl core::fmt::Debug for TransferService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TransferService")
            .field("items", &self.items)
            .finish_non_exhaustive()
    }
}

impl TransferService {
    pub fn new(
        store: Arc<dyn TransferStore>,
        poster: Arc<dyn ErpTransferPoster>,
        items: ItemLookup,
    ) -> Self {
        Self {
            store,
            poster,
            items,
        }
    }

    /// Draft a transfer owned by `user`. Missing item names/UoM are filled from
    /// the item catalog (placeholders if the ERP is down).
    #[tracing::instrument(skip(self, user, request), fields(tenant_id = %user.tenant_id, number = %request.number), err)]
    pub async fn create(
        &self,
        user: &UserIdentity,
        request: CreateTransferRequest,
    ) -> Result<SerialTransfer, TransferError> {
        require(user, &Capability::SERIAL_TRANSFER)?;

        let mut transfer = SerialTransfer::create(NewTransfer {
            tenant_id: user.tenant_id,
            number: request.number,
            owner: user.user_id,
            from_warehouse: request.from_warehouse,
            to_warehouse: request.to_warehouse,
            priority: request.priority,
            notes: request.notes,
            created_at: Utc::now(),
        })?;

        for item in request.items {
            let (name, uom) = match (item.item_name, item.unit_of_measure) {
                (Some(name), uom) => (Some(name), uom),
                (None, uom) => {
                    let details = self.items.lookup_item(&item.item_code).await?;
                    (Some(details.item_name), uom.or(Some(details.unit_of_measure)))
                }
            };
            transfer.add_item(item.item_code.clone(), name, item.quantity, uom)?;
            for serial in item.serials {
                transfer.add_serial(&item.item_code, serial)?;
            }
        }

        self.store.insert_transfer(&transfer).await?;
        tracing::info!(transfer_id = %transfer.id_typed(), "transfer created");
        Ok(transfer)
    }

    pub async fn get(&self, user: &UserIdentity, id: TransferId) -> Result<SerialTransfer, TransferError> {
        require(user, &Capability::SERIAL_TRANSFER)?;
        Ok(self.store.load_transfer(user.tenant_id, id).await?)
    }

    #[tracing::instrument(skip(self, user), fields(tenant_id = %user.tenant_id), err)]
    pub async fn submit(&self, user: &UserIdentity, id: TransferId) -> Result<SerialTransfer, TransferError> {
        require(user, &Capability::SERIAL_TRANSFER)?;
        let mut transfer = self.store.load_transfer(user.tenant_id, id).await?;
        if transfer.owner() != user.user_id && !user.is_supervisor() {
            return Err(TransferError::Forbidden(
                "only the owner or a supervisor can submit a transfer".to_string(),
            ));
        }

        let expected = ExpectedVersion::Exact(transfer.version());
        transfer.submit()?;
        self.save(&transfer, expected).await?;
        Ok(transfer)
    }

    /// Approve and post to the ERP.
    ///
    /// The approval is claimed with a compare-and-set write before the ERP is
    /// called, so of two concurrent approvals only one ever posts. If posting
    /// fails the claim is reverted and the transfer is `Submitted` again.
    #[tracing::instrument(skip(self, user, notes), fields(tenant_id = %user.tenant_id), err)]
    pub async fn approve_and_post(
        &self,
        user: &UserIdentity,
        id: TransferId,
        notes: Option<String>,
    ) -> Result<SerialTransfer, TransferError> {
        require(user, &Capability::QC_DASHBOARD)?;
        let mut transfer = self.store.load_transfer(user.tenant_id, id).await?;
        let expected = ExpectedVersion::Exact(transfer.version());

        transfer.qc_approve(user.user_id, notes, Utc::now())?;
        self.save(&transfer, expected).await?;
        let claimed = ExpectedVersion::Exact(transfer.version());

        let doc_num = match self.poster.post_stock_transfer(&transfer).await {
            Ok(doc_num) => doc_num,
            Err(err) => {
                tracing::error!(transfer_id = %id, error = %err, "ERP posting failed; reverting approval");
                transfer.revert_approval()?;
                if let Err(revert_err) = self.save(&transfer, claimed).await {
                    tracing::error!(transfer_id = %id, error = %revert_err, "approval could not be reverted");
                }
                return Err(err.into());
            }
        };
        transfer.mark_posted(doc_num.clone())?;

        if let Err(err) = self.save(&transfer, claimed).await {
            // The ERP document exists; the local record needs a manual fix.
            tracing::error!(transfer_id = %id, erp_document = %doc_num, error = %err, "posted to ERP but not saved");
            return Err(err);
        }
        tracing::info!(transfer_id = %id, erp_document = %doc_num, "transfer posted");
        Ok(transfer)
    }

    #[tracing::instrument(skip(self, user, notes), fields(tenant_id = %user.tenant_id), err)]
    pub async fn reject(
        &self,
        user: &UserIdentity,
        id: TransferId,
        notes: &str,
    ) -> Result<SerialTransfer, TransferError> {
        require(user, &Capability::QC_DASHBOARD)?;
        let mut transfer = self.store.load_transfer(user.tenant_id, id).await?;
        let expected = ExpectedVersion::Exact(transfer.version());
        transfer.qc_reject(user.user_id, notes, Utc::now())?;
        self.save(&transfer, expected).await?;
        Ok(transfer)
    }

    /// Transfers of one status, newest first.
    pub async fn list(
        &self,
        user: &UserIdentity,
        status: TransferStatus,
    ) -> Result<Vec<SerialTransfer>, TransferError> {
        require(user, &Capability::SERIAL_TRANSFER)?;
        let mut transfers = self.store.list_by_status(user.tenant_id, status).await?;
        transfers.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(transfers)
    }

    /// QC work queue: transfers waiting for a decision, plus the caller's own
    /// most recent decisions.
    #[tracing::instrument(skip(self, user), fields(tenant_id = %user.tenant_id), err)]
    pub async fn qc_queue(&self, user: &UserIdentity) -> Result<QcQueue, TransferError> {
        require(user, &Capability::QC_DASHBOARD)?;
        let mut pending = self
            .store
            .list_by_status(user.tenant_id, TransferStatus::Submitted)
            .await?;
        pending.sort_by(|a, b| b.created_at().cmp(&a.created_at()));

        let mut decided = Vec::new();
        for status in [TransferStatus::Posted, TransferStatus::QcApproved, TransferStatus::Rejected] {
            decided.extend(
                self.store
                    .list_by_status(user.tenant_id, status)
                    .await?
                    .into_iter()
                    .filter(|t| t.qc_approver() == Some(user.user_id)),
            );
        }
        decided.sort_by(|a, b| b.qc_decided_at().cmp(&a.qc_decided_at()));
        decided.truncate(RECENT_DECISIONS);

        Ok(QcQueue {
            pending,
            recent_decisions: decided,
        })
    }

    #[tracing::instrument(skip(self, user), fields(tenant_id = %user.tenant_id), err)]
    pub async fn delete(&self, user: &UserIdentity, id: TransferId) -> Result<(), TransferError> {
        require(user, &Capability::SERIAL_TRANSFER)?;
        let transfer = self.store.load_transfer(user.tenant_id, id).await?;
        transfer.ensure_deletable(user.user_id, user.is_supervisor())?;
        self.store.delete_transfer(user.tenant_id, id).await?;
        Ok(())
    }

    async fn save(&self, transfer: &SerialTransfer, expected: ExpectedVersion) -> Result<(), TransferError> {
        match self.store.save_transfer(transfer, expected).await {
            Ok(()) => Ok(()),
            Err(err) if err.is_conflict() => Err(TransferError::ConcurrentModification(transfer.id_typed())),
            Err(err) => Err(err.into()),
        }
    }
}
