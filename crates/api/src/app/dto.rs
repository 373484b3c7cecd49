use core::str::FromStr;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use forgewms_core::{DocumentId, DomainError, LineId, Quantity, Versioned};
use forgewms_warehouse::{DocumentLine, LineStatus, can_add_remaining};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

/// Quantities travel as decimal strings (`"2.5"`).
#[derive(Debug, Deserialize)]
pub struct AllocateRequest {
    pub quantity: Quantity,
}

#[derive(Debug, Default, Deserialize)]
pub struct QcApproveRequest {
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QcRejectRequest {
    pub notes: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListTransfersQuery {
    #[serde(default)]
    pub status: Option<String>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct LineResponse {
    pub id: LineId,
    pub document_id: DocumentId,
    pub line_no: u32,
    pub item_code: String,
    pub ordered_quantity: Quantity,
    pub fulfilled_quantity: Quantity,
    pub remaining_quantity: Quantity,
    pub status: LineStatus,
    pub can_add_remaining: bool,
    pub version: u64,
}

impl From<&DocumentLine> for LineResponse {
    fn from(line: &DocumentLine) -> Self {
        Self {
            id: line.id_typed(),
            document_id: line.document_id(),
            line_no: line.line_no(),
            item_code: line.item_code().to_string(),
            ordered_quantity: line.ordered_quantity(),
            fulfilled_quantity: line.fulfilled_quantity(),
            remaining_quantity: line.remaining(),
            status: line.status(),
            can_add_remaining: can_add_remaining(line),
            version: line.version(),
        }
    }
}

// -------------------------
// Path helpers
// -------------------------

pub fn parse_id<T>(raw: &str) -> Result<T, axum::response::Response>
where
    T: FromStr<Err = DomainError>,
{
    raw.parse::<T>()
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string()))
}
