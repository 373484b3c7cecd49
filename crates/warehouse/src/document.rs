//! Receipt, transfer and pick-list documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use forgewms_core::{DocumentId, DomainError, LineId, Quantity, TenantId};

use crate::line::{DocumentLine, ExternalOrderRef, LineStatus};

/// Kind of warehouse document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// Goods receipt against a purchase order (GRPO).
    GoodsReceipt,
    /// Inventory transfer between warehouses or bins.
    Transfer,
    /// Pick list fulfilling a sales order.
    PickList,
}

/// Line input when drafting a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLine {
    pub item_code: String,
    pub ordered_quantity: Quantity,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub bin_location: Option<String>,
    #[serde(default)]
    pub external_ref: Option<ExternalOrderRef>,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::GoodsReceipt => "goods_receipt",
            DocumentKind::Transfer => "transfer",
            DocumentKind::PickList => "pick_list",
        }
    }

    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s {
            "goods_receipt" => Ok(DocumentKind::GoodsReceipt),
            "transfer" => Ok(DocumentKind::Transfer),
            "pick_list" => Ok(DocumentKind::PickList),
            other => Err(DomainError::validation(format!("unknown document kind '{other}'"))),
        }
    }
}

/// An ordered sequence of lines. Its status is derived from the lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    id: DocumentId,
    tenant_id: TenantId,
    kind: DocumentKind,
    number: String,
    lines: Vec<DocumentLine>,
    created_at: DateTime<Utc>,
}

impl Document {
    /// Start drafting a document with no lines.
    pub fn draft(
        tenant_id: TenantId,
        kind: DocumentKind,
        number: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let number = number.into();
        if number.trim().is_empty() {
            return Err(DomainError::validation("document number cannot be empty"));
        }
        Ok(Self {
            id: DocumentId::new(),
            tenant_id,
            kind,
            number,
            lines: Vec::new(),
            created_at,
        })
    }

    /// Rebuild a document from storage. Lines are kept in line-number order.
    pub fn from_parts(
        id: DocumentId,
        tenant_id: TenantId,
        kind: DocumentKind,
        number: String,
        mut lines: Vec<DocumentLine>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if let Some(stray) = lines.iter().find(|l| l.document_id() != id) {
            return Err(DomainError::invariant(format!(
                "line {} belongs to document {}",
                stray.id_typed(),
                stray.document_id()
            )));
        }
        lines.sort_by_key(|l| l.line_no());
        Ok(Self {
            id,
            tenant_id,
            kind,
            number,
            lines,
            created_at,
        })
    }

    /// Append a line; line numbers are assigned sequentially from 1.
    pub fn add_line(
        &mut self,
        item_code: impl Into<String>,
        ordered: Quantity,
        external_ref: Option<ExternalOrderRef>,
    ) -> Result<LineId, DomainError> {
        self.push_line(NewLine {
            item_code: item_code.into(),
            ordered_quantity: ordered,
            description: None,
            bin_location: None,
            external_ref,
        })
    }

    /// Append a fully described line.
    pub fn push_line(&mut self, input: NewLine) -> Result<LineId, DomainError> {
        let next_line_no = (self.lines.len() as u32) + 1;
        let mut line =
            DocumentLine::draft(self.id, next_line_no, input.item_code, input.ordered_quantity)?;
        if let Some(description) = input.description.filter(|d| !d.trim().is_empty()) {
            line = line.with_description(description);
        }
        if let Some(bin) = input.bin_location.filter(|b| !b.trim().is_empty()) {
            line = line.with_bin_location(bin);
        }
        if let Some(r) = input.external_ref {
            line = line.with_external_ref(r);
        }
        let id = line.id_typed();
        self.lines.push(line);
        Ok(id)
    }

    pub fn id_typed(&self) -> DocumentId {
        self.id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn lines(&self) -> &[DocumentLine] {
        &self.lines
    }

    pub fn line(&self, line_id: LineId) -> Option<&DocumentLine> {
        self.lines.iter().find(|l| l.id_typed() == line_id)
    }

    pub fn open_lines(&self) -> impl Iterator<Item = &DocumentLine> {
        self.lines.iter().filter(|l| l.status() == LineStatus::Open)
    }

    /// CLOSED iff every line is CLOSED (an empty document is trivially closed).
    pub fn status(&self) -> LineStatus {
        if self.lines.iter().all(|l| l.status() == LineStatus::Closed) {
            LineStatus::Closed
        } else {
            LineStatus::Open
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line::{AllocationPolicy, ExternalOrderKind, allocate};

    fn qty(n: i64) -> Quantity {
        Quantity::from(n)
    }

    fn test_document() -> Document {
        Document::draft(TenantId::new(), DocumentKind::GoodsReceipt, "GRPO-0001", Utc::now()).unwrap()
    }

    #[test]
    fn lines_are_numbered_sequentially() {
        let mut doc = test_document();
        doc.add_line("A", qty(1), None).unwrap();
        doc.add_line("B", qty(2), None).unwrap();
        let numbers: Vec<u32> = doc.lines().iter().map(|l| l.line_no()).collect();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[test]
    fn document_closes_only_when_every_line_closes() {
        let mut doc = test_document();
        let a = doc.add_line("A", qty(2), None).unwrap();
        doc.add_line("B", qty(0), None).unwrap();
        assert_eq!(doc.status(), LineStatus::Open);
        assert_eq!(doc.open_lines().count(), 1);

        let filled = allocate(doc.line(a).unwrap(), qty(2), &AllocationPolicy::default()).unwrap();
        let lines: Vec<DocumentLine> = doc
            .lines()
            .iter()
            .map(|l| if l.id_typed() == a { filled.clone() } else { l.clone() })
            .collect();
        let doc = Document::from_parts(
            doc.id_typed(),
            doc.tenant_id(),
            doc.kind(),
            doc.number().to_string(),
            lines,
            doc.created_at(),
        )
        .unwrap();
        assert_eq!(doc.status(), LineStatus::Closed);
    }

    #[test]
    fn status_is_stable_across_reads() {
        let mut doc = test_document();
        doc.add_line("A", qty(3), None).unwrap();
        let first = doc.status();
        let second = doc.status();
        assert_eq!(first, second);
        assert_eq!(doc.lines()[0].fulfilled_quantity(), Quantity::ZERO);
    }

    #[test]
    fn from_parts_rejects_foreign_lines() {
        let doc = test_document();
        let foreign = DocumentLine::draft(DocumentId::new(), 1, "X", qty(1)).unwrap();
        let err = Document::from_parts(
            doc.id_typed(),
            doc.tenant_id(),
            doc.kind(),
            doc.number().to_string(),
            vec![foreign],
            doc.created_at(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn blank_number_is_rejected() {
        let err = Document::draft(TenantId::new(), DocumentKind::PickList, " ", Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn pushed_line_keeps_its_details() {
        let mut doc = test_document();
        let input: NewLine = serde_json::from_value(serde_json::json!({
            "item_code": "A00001",
            "ordered_quantity": "4.5",
            "description": "Printer",
            "bin_location": "  ",
            "external_ref": {"kind": "purchase_order", "order_id": 77, "line_number": 2}
        }))
        .unwrap();

        let id = doc.push_line(input).unwrap();
        let line = doc.line(id).unwrap();
        assert_eq!(line.ordered_quantity(), Quantity::new(45, 1));
        assert_eq!(line.description(), Some("Printer"));
        assert_eq!(line.bin_location(), None);
        assert_eq!(
            line.external_ref(),
            Some(&ExternalOrderRef::new(ExternalOrderKind::PurchaseOrder, 77, 2))
        );
    }

    #[test]
    fn kind_parses_its_own_name() {
        for kind in [DocumentKind::GoodsReceipt, DocumentKind::Transfer, DocumentKind::PickList] {
            assert_eq!(DocumentKind::parse(kind.as_str()).unwrap(), kind);
        }
    }
}
