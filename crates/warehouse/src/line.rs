//! Document lines and the line reconciliation engine.
//!
//! A line's status is never stored: it is derived from the ordered and
//! fulfilled quantities every time it is read. The only way to change
//! `fulfilled` is [`allocate`], which returns a new line and leaves its input
//! untouched, so a rejected allocation cannot leave a half-applied state behind.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use forgewms_core::{DocumentId, DomainError, LineId, Quantity, Versioned};

/// Open/closed status of a line (or of a whole document).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LineStatus {
    Open,
    Closed,
}

impl core::fmt::Display for LineStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            LineStatus::Open => f.write_str("OPEN"),
            LineStatus::Closed => f.write_str("CLOSED"),
        }
    }
}

/// Reconciliation failures. Both variants are raised before any mutation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LineError {
    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error(
        "over-allocation: requested {requested} with {fulfilled} already fulfilled of {ordered} ordered"
    )]
    OverAllocation {
        ordered: Quantity,
        fulfilled: Quantity,
        requested: Quantity,
    },
}

impl LineError {
    fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidQuantity(msg.into())
    }
}

impl From<LineError> for DomainError {
    fn from(value: LineError) -> Self {
        match value {
            LineError::InvalidQuantity(msg) => DomainError::Validation(msg),
            e @ LineError::OverAllocation { .. } => DomainError::InvariantViolation(e.to_string()),
        }
    }
}

/// How much over-fulfilment is tolerated.
///
/// The default tolerance is zero: anything above the ordered quantity is
/// rejected rather than clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationPolicy {
    tolerance: Quantity,
}

impl AllocationPolicy {
    pub fn strict() -> Self {
        Self {
            tolerance: Quantity::ZERO,
        }
    }

    pub fn with_tolerance(tolerance: Quantity) -> Result<Self, LineError> {
        if tolerance < Quantity::ZERO {
            return Err(LineError::invalid("tolerance cannot be negative"));
        }
        Ok(Self { tolerance })
    }

    /// Largest fulfilled quantity accepted for `ordered`.
    pub fn ceiling(&self, ordered: Quantity) -> Result<Quantity, LineError> {
        ordered
            .checked_add(self.tolerance)
            .ok_or_else(|| LineError::invalid("ordered quantity plus tolerance overflows"))
    }

    pub fn tolerance(&self) -> Quantity {
        self.tolerance
    }
}

impl Default for AllocationPolicy {
    fn default() -> Self {
        Self::strict()
    }
}

/// Which kind of ERP document a line was drafted against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExternalOrderKind {
    /// Sales order (pick lists).
    SalesOrder,
    /// Purchase order (goods receipts).
    PurchaseOrder,
    /// Inventory transfer request (transfers).
    TransferRequest,
}

impl ExternalOrderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExternalOrderKind::SalesOrder => "sales_order",
            ExternalOrderKind::PurchaseOrder => "purchase_order",
            ExternalOrderKind::TransferRequest => "transfer_request",
        }
    }

    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s {
            "sales_order" => Ok(ExternalOrderKind::SalesOrder),
            "purchase_order" => Ok(ExternalOrderKind::PurchaseOrder),
            "transfer_request" => Ok(ExternalOrderKind::TransferRequest),
            other => Err(DomainError::validation(format!("unknown external order kind '{other}'"))),
        }
    }
}

/// Exact join key into the ERP: external order id + line number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalOrderRef {
    pub kind: ExternalOrderKind,
    pub order_id: u64,
    pub line_number: u32,
}

impl ExternalOrderRef {
    pub fn new(kind: ExternalOrderKind, order_id: u64, line_number: u32) -> Self {
        Self {
            kind,
            order_id,
            line_number,
        }
    }
}

impl core::fmt::Display for ExternalOrderRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}#{}/{}", self.kind, self.order_id, self.line_number)
    }
}

/// Persisted shape of a line (what a store reads and writes).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRecord {
    pub id: LineId,
    pub document_id: DocumentId,
    pub line_no: u32,
    pub item_code: String,
    pub description: Option<String>,
    pub bin_location: Option<String>,
    pub ordered_quantity: Quantity,
    pub fulfilled_quantity: Quantity,
    pub external_ref: Option<ExternalOrderRef>,
    pub version: u64,
}

/// One line of a receipt, transfer or pick document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentLine {
    id: LineId,
    document_id: DocumentId,
    line_no: u32,
    item_code: String,
    description: Option<String>,
    bin_location: Option<String>,
    ordered: Quantity,
    fulfilled: Quantity,
    external_ref: Option<ExternalOrderRef>,
    version: u64,
}

impl DocumentLine {
    /// Draft a new, unfulfilled line.
    pub fn draft(
        document_id: DocumentId,
        line_no: u32,
        item_code: impl Into<String>,
        ordered: Quantity,
    ) -> Result<Self, LineError> {
        let item_code = item_code.into();
        if item_code.trim().is_empty() {
            return Err(LineError::invalid("item code cannot be empty"));
        }
        if ordered < Quantity::ZERO {
            return Err(LineError::invalid("ordered quantity cannot be negative"));
        }

        Ok(Self {
            id: LineId::new(),
            document_id,
            line_no,
            item_code,
            description: None,
            bin_location: None,
            ordered,
            fulfilled: Quantity::ZERO,
            external_ref: None,
            version: 0,
        })
    }

    /// Rebuild a line from storage.
    ///
    /// Only structural checks are applied here; tolerance is a property of the
    /// allocation policy in force, not of the stored record.
    pub fn rehydrate(record: LineRecord) -> Result<Self, LineError> {
        if record.ordered_quantity < Quantity::ZERO {
            return Err(LineError::invalid("stored ordered quantity is negative"));
        }
        if record.fulfilled_quantity < Quantity::ZERO {
            return Err(LineError::invalid("stored fulfilled quantity is negative"));
        }

        Ok(Self {
            id: record.id,
            document_id: record.document_id,
            line_no: record.line_no,
            item_code: record.item_code,
            description: record.description,
            bin_location: record.bin_location,
            ordered: record.ordered_quantity,
            fulfilled: record.fulfilled_quantity,
            external_ref: record.external_ref,
            version: record.version,
        })
    }

    pub fn to_record(&self) -> LineRecord {
        LineRecord {
            id: self.id,
            document_id: self.document_id,
            line_no: self.line_no,
            item_code: self.item_code.clone(),
            description: self.description.clone(),
            bin_location: self.bin_location.clone(),
            ordered_quantity: self.ordered,
            fulfilled_quantity: self.fulfilled,
            external_ref: self.external_ref.clone(),
            version: self.version,
        }
    }

    pub fn with_id(mut self, id: LineId) -> Self {
        self.id = id;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_bin_location(mut self, bin: impl Into<String>) -> Self {
        self.bin_location = Some(bin.into());
        self
    }

    pub fn with_external_ref(mut self, external_ref: ExternalOrderRef) -> Self {
        self.external_ref = Some(external_ref);
        self
    }

    pub fn id_typed(&self) -> LineId {
        self.id
    }

    pub fn document_id(&self) -> DocumentId {
        self.document_id
    }

    pub fn line_no(&self) -> u32 {
        self.line_no
    }

    pub fn item_code(&self) -> &str {
        &self.item_code
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn bin_location(&self) -> Option<&str> {
        self.bin_location.as_deref()
    }

    pub fn ordered_quantity(&self) -> Quantity {
        self.ordered
    }

    pub fn fulfilled_quantity(&self) -> Quantity {
        self.fulfilled
    }

    pub fn external_ref(&self) -> Option<&ExternalOrderRef> {
        self.external_ref.as_ref()
    }

    /// Derived status; recomputed on every call.
    pub fn status(&self) -> LineStatus {
        derive_status(self.ordered, self.fulfilled)
    }

    /// Unfulfilled remainder (zero once the line is closed).
    pub fn remaining(&self) -> Quantity {
        (self.ordered - self.fulfilled).max(Quantity::ZERO)
    }
}

impl Versioned for DocumentLine {
    fn version(&self) -> u64 {
        self.version
    }
}

fn derive_status(ordered: Quantity, fulfilled: Quantity) -> LineStatus {
    if fulfilled >= ordered {
        LineStatus::Closed
    } else {
        LineStatus::Open
    }
}

/// Validate a pair of quantities and derive the status they imply.
pub fn compute_status(
    ordered: Quantity,
    fulfilled: Quantity,
    policy: &AllocationPolicy,
) -> Result<LineStatus, LineError> {
    if ordered < Quantity::ZERO {
        return Err(LineError::invalid("ordered quantity cannot be negative"));
    }
    if fulfilled < Quantity::ZERO {
        return Err(LineError::invalid("fulfilled quantity cannot be negative"));
    }
    if fulfilled > policy.ceiling(ordered)? {
        return Err(LineError::invalid(format!(
            "fulfilled quantity {fulfilled} exceeds ordered quantity {ordered} beyond tolerance {}",
            policy.tolerance()
        )));
    }
    Ok(derive_status(ordered, fulfilled))
}

/// Whether the "add remaining" action may be offered for this line.
pub fn can_add_remaining(line: &DocumentLine) -> bool {
    line.status() == LineStatus::Open
}

/// Allocate `quantity` against a line, returning the updated line.
pub fn allocate(
    line: &DocumentLine,
    quantity: Quantity,
    policy: &AllocationPolicy,
) -> Result<DocumentLine, LineError> {
    if quantity <= Quantity::ZERO {
        return Err(LineError::invalid("allocated quantity must be positive"));
    }

    let over = LineError::OverAllocation {
        ordered: line.ordered,
        fulfilled: line.fulfilled,
        requested: quantity,
    };

    // Zero-quantity lines are closed from birth, tolerance or not.
    if line.ordered == Quantity::ZERO {
        return Err(over);
    }

    let fulfilled = line
        .fulfilled
        .checked_add(quantity)
        .ok_or_else(|| LineError::invalid("allocated quantity overflows"))?;
    if fulfilled > policy.ceiling(line.ordered)? {
        return Err(over);
    }

    compute_status(line.ordered, fulfilled, policy)?;

    let mut next = line.clone();
    next.fulfilled = fulfilled;
    next.version += 1;
    Ok(next)
}
