//! Serial-number stock transfer with a QC gate.
//!
//! Lifecycle: `Draft → Submitted → QcApproved → Posted`, or
//! `Submitted → Rejected`. Every accepted transition bumps `version`; a
//! rejected one leaves the transfer untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use forgewms_core::{DomainError, TenantId, TransferId, UserId, Versioned};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Draft,
    Submitted,
    QcApproved,
    Posted,
    Rejected,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Draft => "draft",
            TransferStatus::Submitted => "submitted",
            TransferStatus::QcApproved => "qc_approved",
            TransferStatus::Posted => "posted",
            TransferStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s.trim() {
            "draft" => Ok(TransferStatus::Draft),
            "submitted" => Ok(TransferStatus::Submitted),
            "qc_approved" => Ok(TransferStatus::QcApproved),
            "posted" => Ok(TransferStatus::Posted),
            "rejected" => Ok(TransferStatus::Rejected),
            other => Err(DomainError::validation(format!("unknown transfer status: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferPriority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QcStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

/// One item of a transfer with its scanned serial numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferItem {
    pub item_code: String,
    pub item_name: Option<String>,
    /// Expected number of serials for this item.
    pub quantity: u32,
    pub unit_of_measure: String,
    pub qc_status: QcStatus,
    /// Duplicates are kept so the operator can review and remove them.
    pub serials: Vec<String>,
}

/// Input for [`SerialTransfer::create`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransfer {
    pub tenant_id: TenantId,
    pub number: String,
    pub owner: UserId,
    pub from_warehouse: String,
    pub to_warehouse: String,
    #[serde(default)]
    pub priority: TransferPriority,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialTransfer {
    id: TransferId,
    tenant_id: TenantId,
    number: String,
    owner: UserId,
    from_warehouse: String,
    to_warehouse: String,
    priority: TransferPriority,
    notes: Option<String>,
    status: TransferStatus,
    items: Vec<TransferItem>,
    qc_approver: Option<UserId>,
    qc_decided_at: Option<DateTime<Utc>>,
    qc_notes: Option<String>,
    erp_document_number: Option<String>,
    created_at: DateTime<Utc>,
    version: u64,
}

impl SerialTransfer {
    pub fn create(input: NewTransfer) -> Result<Self, DomainError> {
        let from = input.from_warehouse.trim();
        let to = input.to_warehouse.trim();
        if input.number.trim().is_empty() || from.is_empty() || to.is_empty() {
            return Err(DomainError::validation(
                "transfer number, from and to warehouse are required",
            ));
        }
        if from == to {
            return Err(DomainError::validation(
                "from and to warehouses must be different",
            ));
        }

        Ok(Self {
            id: TransferId::new(),
            tenant_id: input.tenant_id,
            number: input.number.trim().to_string(),
            owner: input.owner,
            from_warehouse: from.to_string(),
            to_warehouse: to.to_string(),
            priority: input.priority,
            notes: input.notes,
            status: TransferStatus::Draft,
            items: Vec::new(),
            qc_approver: None,
            qc_decided_at: None,
            qc_notes: None,
            erp_document_number: None,
            created_at: input.created_at,
            version: 0,
        })
    }

    pub fn id_typed(&self) -> TransferId {
        self.id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn owner(&self) -> UserId {
        self.owner
    }

    pub fn from_warehouse(&self) -> &str {
        &self.from_warehouse
    }

    pub fn to_warehouse(&self) -> &str {
        &self.to_warehouse
    }

    pub fn priority(&self) -> TransferPriority {
        self.priority
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn status(&self) -> TransferStatus {
        self.status
    }

    pub fn items(&self) -> &[TransferItem] {
        &self.items
    }

    pub fn qc_approver(&self) -> Option<UserId> {
        self.qc_approver
    }

    pub fn qc_decided_at(&self) -> Option<DateTime<Utc>> {
        self.qc_decided_at
    }

    pub fn qc_notes(&self) -> Option<&str> {
        self.qc_notes.as_deref()
    }

    pub fn erp_document_number(&self) -> Option<&str> {
        self.erp_document_number.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn ensure_status(&self, expected: TransferStatus, action: &str) -> Result<(), DomainError> {
        if self.status != expected {
            return Err(DomainError::invariant(format!(
                "only {expected:?} transfers can be {action} (current: {:?})",
                self.status
            )));
        }
        Ok(())
    }

    pub fn add_item(
        &mut self,
        item_code: impl Into<String>,
        item_name: Option<String>,
        quantity: u32,
        unit_of_measure: Option<String>,
    ) -> Result<(), DomainError> {
        self.ensure_status(TransferStatus::Draft, "edited")?;
        let item_code = item_code.into();
        if item_code.trim().is_empty() {
            return Err(DomainError::validation("item code cannot be empty"));
        }
        if quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if self.items.iter().any(|i| i.item_code == item_code) {
            return Err(DomainError::conflict(format!("item {item_code} already on transfer")));
        }

        self.items.push(TransferItem {
            item_code,
            item_name,
            quantity,
            unit_of_measure: unit_of_measure.unwrap_or_else(|| "EA".to_string()),
            qc_status: QcStatus::Pending,
            serials: Vec::new(),
        });
        self.version += 1;
        Ok(())
    }

    pub fn add_serial(&mut self, item_code: &str, serial: impl Into<String>) -> Result<(), DomainError> {
        self.ensure_status(TransferStatus::Draft, "edited")?;
        let serial = serial.into();
        if serial.trim().is_empty() {
            return Err(DomainError::validation("serial number cannot be empty"));
        }
        let item = self
            .items
            .iter_mut()
            .find(|i| i.item_code == item_code)
            .ok_or_else(DomainError::not_found)?;
        item.serials.push(serial.trim().to_string());
        self.version += 1;
        Ok(())
    }

    pub fn submit(&mut self) -> Result<(), DomainError> {
        self.ensure_status(TransferStatus::Draft, "submitted")?;
        if self.items.is_empty() {
            return Err(DomainError::validation("cannot submit a transfer without items"));
        }
        if let Some(item) = self
            .items
            .iter()
            .find(|i| i.serials.len() != i.quantity as usize)
        {
            return Err(DomainError::validation(format!(
                "item {} has {} serials, expected {}",
                item.item_code,
                item.serials.len(),
                item.quantity
            )));
        }

        self.status = TransferStatus::Submitted;
        self.version += 1;
        Ok(())
    }

    pub fn qc_approve(
        &mut self,
        approver: UserId,
        notes: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.ensure_status(TransferStatus::Submitted, "approved")?;

        self.status = TransferStatus::QcApproved;
        self.qc_approver = Some(approver);
        self.qc_decided_at = Some(at);
        self.qc_notes = notes.filter(|n| !n.trim().is_empty());
        for item in &mut self.items {
            item.qc_status = QcStatus::Approved;
        }
        self.version += 1;
        Ok(())
    }

    pub fn mark_posted(&mut self, erp_document_number: impl Into<String>) -> Result<(), DomainError> {
        self.ensure_status(TransferStatus::QcApproved, "posted")?;
        let number = erp_document_number.into();
        if number.trim().is_empty() {
            return Err(DomainError::validation("ERP document number cannot be empty"));
        }

        self.status = TransferStatus::Posted;
        self.erp_document_number = Some(number);
        self.version += 1;
        Ok(())
    }

    /// Undo an approval whose ERP posting failed; the transfer goes back to
    /// the QC queue with no decision recorded.
    pub fn revert_approval(&mut self) -> Result<(), DomainError> {
        self.ensure_status(TransferStatus::QcApproved, "reverted")?;

        self.status = TransferStatus::Submitted;
        self.qc_approver = None;
        self.qc_decided_at = None;
        self.qc_notes = None;
        for item in &mut self.items {
            item.qc_status = QcStatus::Pending;
        }
        self.version += 1;
        Ok(())
    }

    pub fn qc_reject(
        &mut self,
        approver: UserId,
        notes: &str,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.ensure_status(TransferStatus::Submitted, "rejected")?;
        if notes.trim().is_empty() {
            return Err(DomainError::validation("QC notes are required for rejection"));
        }

        self.status = TransferStatus::Rejected;
        self.qc_approver = Some(approver);
        self.qc_decided_at = Some(at);
        self.qc_notes = Some(notes.trim().to_string());
        for item in &mut self.items {
            item.qc_status = QcStatus::Rejected;
        }
        self.version += 1;
        Ok(())
    }

    /// Only drafts can be deleted, by their owner or a supervisor.
    pub fn ensure_deletable(&self, actor: UserId, is_supervisor: bool) -> Result<(), DomainError> {
        if self.owner != actor && !is_supervisor {
            return Err(DomainError::forbidden("only the owner or a supervisor can delete a transfer"));
        }
        self.ensure_status(TransferStatus::Draft, "deleted")
    }
}

impl Versioned for SerialTransfer {
    fn version(&self) -> u64 {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_transfer(owner: UserId) -> SerialTransfer {
        SerialTransfer::create(NewTransfer {
            tenant_id: TenantId::new(),
            number: "ST-0001".to_string(),
            owner,
            from_warehouse: "WH001".to_string(),
            to_warehouse: "WH002".to_string(),
            priority: TransferPriority::Normal,
            notes: None,
            created_at: Utc::now(),
        })
        .unwrap()
    }

    fn submitted_transfer() -> SerialTransfer {
        let mut t = new_transfer(UserId::new());
        t.add_item("PHONE-1", Some("Handset".into()), 2, None).unwrap();
        t.add_serial("PHONE-1", "SN-1").unwrap();
        t.add_serial("PHONE-1", "SN-2").unwrap();
        t.submit().unwrap();
        t
    }

    #[test]
    fn same_source_and_destination_is_rejected() {
        let err = SerialTransfer::create(NewTransfer {
            tenant_id: TenantId::new(),
            number: "ST-1".to_string(),
            owner: UserId::new(),
            from_warehouse: "WH001".to_string(),
            to_warehouse: " WH001 ".to_string(),
            priority: TransferPriority::default(),
            notes: None,
            created_at: Utc::now(),
        })
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn submit_requires_serial_count_to_match_quantity() {
        let mut t = new_transfer(UserId::new());
        t.add_item("PHONE-1", None, 2, None).unwrap();
        t.add_serial("PHONE-1", "SN-1").unwrap();
        let before = t.clone();

        let err = t.submit().unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(t, before);
    }

    #[test]
    fn submit_requires_items() {
        let mut t = new_transfer(UserId::new());
        assert!(t.submit().is_err());
    }

    #[test]
    fn duplicate_serials_are_kept_for_review() {
        let mut t = new_transfer(UserId::new());
        t.add_item("PHONE-1", None, 2, None).unwrap();
        t.add_serial("PHONE-1", "SN-1").unwrap();
        t.add_serial("PHONE-1", "SN-1").unwrap();
        assert_eq!(t.items()[0].serials.len(), 2);
        assert_eq!(t.items()[0].unit_of_measure, "EA");
    }

    #[test]
    fn approve_then_post() {
        let mut t = submitted_transfer();
        let approver = UserId::new();
        t.qc_approve(approver, Some("looks good".into()), Utc::now()).unwrap();
        assert_eq!(t.status(), TransferStatus::QcApproved);
        assert!(t.items().iter().all(|i| i.qc_status == QcStatus::Approved));

        t.mark_posted("4711").unwrap();
        assert_eq!(t.status(), TransferStatus::Posted);
        assert_eq!(t.erp_document_number(), Some("4711"));
        assert_eq!(t.qc_approver(), Some(approver));
    }

    #[test]
    fn reverted_approval_returns_to_queue() {
        let mut t = submitted_transfer();
        let before = t.version();
        t.qc_approve(UserId::new(), Some("ok".into()), Utc::now()).unwrap();
        t.revert_approval().unwrap();

        assert_eq!(t.status(), TransferStatus::Submitted);
        assert!(t.qc_approver().is_none());
        assert!(t.qc_decided_at().is_none());
        assert!(t.items().iter().all(|i| i.qc_status == QcStatus::Pending));
        assert_eq!(t.version(), before + 2);

        // Only an approved transfer can be reverted.
        assert!(t.revert_approval().is_err());
    }

    #[test]
    fn status_text_roundtrips() {
        for status in [
            TransferStatus::Draft,
            TransferStatus::Submitted,
            TransferStatus::QcApproved,
            TransferStatus::Posted,
            TransferStatus::Rejected,
        ] {
            assert_eq!(TransferStatus::parse(status.as_str()).unwrap(), status);
            assert_eq!(
                serde_json::to_value(status).unwrap(),
                serde_json::Value::String(status.as_str().to_string())
            );
        }
        assert!(TransferStatus::parse("archived").is_err());
    }

    #[test]
    fn cannot_approve_a_draft() {
        let mut t = new_transfer(UserId::new());
        let err = t.qc_approve(UserId::new(), None, Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn rejection_requires_notes() {
        let mut t = submitted_transfer();
        assert!(t.qc_reject(UserId::new(), "   ", Utc::now()).is_err());
        assert_eq!(t.status(), TransferStatus::Submitted);

        t.qc_reject(UserId::new(), "damaged packaging", Utc::now()).unwrap();
        assert_eq!(t.status(), TransferStatus::Rejected);
        assert!(t.items().iter().all(|i| i.qc_status == QcStatus::Rejected));
    }

    #[test]
    fn items_are_frozen_after_submit() {
        let mut t = submitted_transfer();
        assert!(t.add_item("OTHER", None, 1, None).is_err());
        assert!(t.add_serial("PHONE-1", "SN-3").is_err());
    }

    #[test]
    fn deletion_rules() {
        let owner = UserId::new();
        let stranger = UserId::new();
        let t = new_transfer(owner);

        assert!(t.ensure_deletable(owner, false).is_ok());
        assert!(t.ensure_deletable(stranger, true).is_ok());
        assert!(matches!(
            t.ensure_deletable(stranger, false).unwrap_err(),
            DomainError::Forbidden(_)
        ));

        let submitted = submitted_transfer();
        let owner = submitted.owner();
        assert!(submitted.ensure_deletable(owner, false).is_err());
    }

    #[test]
    fn every_accepted_transition_bumps_version() {
        let t = submitted_transfer();
        // add_item + 2 serials + submit
        assert_eq!(t.version(), 4);
    }
}
