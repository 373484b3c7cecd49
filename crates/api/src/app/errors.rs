use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use forgewms_core::DomainError;
use forgewms_infra::{AllocationError, DocumentError, TransferError, ViewError};
use forgewms_warehouse::LineError;

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    let status = match &err {
        DomainError::Validation(_) | DomainError::InvalidId(_) => StatusCode::BAD_REQUEST,
        DomainError::InvariantViolation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DomainError::NotFound => StatusCode::NOT_FOUND,
        DomainError::Conflict(_) => StatusCode::CONFLICT,
        DomainError::Forbidden(_) => StatusCode::FORBIDDEN,
    };
    json_error(status, err.code(), err.to_string())
}

pub fn allocation_error_to_response(err: AllocationError) -> axum::response::Response {
    match err {
        AllocationError::Line(e @ LineError::InvalidQuantity(_)) => {
            json_error(StatusCode::BAD_REQUEST, "invalid_quantity", e.to_string())
        }
        AllocationError::Line(e @ LineError::OverAllocation { .. }) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "over_allocation", e.to_string())
        }
        e @ AllocationError::LineClosed(_) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "line_closed", e.to_string())
        }
        e @ AllocationError::ConcurrentModification { .. } => {
            json_error(StatusCode::CONFLICT, "concurrent_modification", e.to_string())
        }
        AllocationError::Forbidden(msg) => json_error(StatusCode::FORBIDDEN, "forbidden", msg),
        AllocationError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, "not_found", msg),
        AllocationError::Store(msg) => {
            tracing::error!(error = %msg, "allocation store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", "internal store error")
        }
    }
}

pub fn view_error_to_response(err: ViewError) -> axum::response::Response {
    match err {
        ViewError::Forbidden(msg) => json_error(StatusCode::FORBIDDEN, "forbidden", msg),
        ViewError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, "not_found", msg),
        ViewError::Store(msg) => {
            tracing::error!(error = %msg, "document read failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", "internal store error")
        }
    }
}

pub fn document_error_to_response(err: DocumentError) -> axum::response::Response {
    match err {
        DocumentError::Domain(e) => domain_error_to_response(e),
        DocumentError::Forbidden(msg) => json_error(StatusCode::FORBIDDEN, "forbidden", msg),
        DocumentError::Store(msg) => {
            tracing::error!(error = %msg, "document write failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", "internal store error")
        }
    }
}

pub fn transfer_error_to_response(err: TransferError) -> axum::response::Response {
    match err {
        TransferError::Domain(e) => domain_error_to_response(e),
        TransferError::Forbidden(msg) => json_error(StatusCode::FORBIDDEN, "forbidden", msg),
        TransferError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, "not_found", msg),
        e @ TransferError::ConcurrentModification(_) => {
            json_error(StatusCode::CONFLICT, "concurrent_modification", e.to_string())
        }
        TransferError::Erp(e) => json_error(StatusCode::BAD_GATEWAY, "erp_error", e.to_string()),
        TransferError::Store(msg) => {
            tracing::error!(error = %msg, "transfer store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", "internal store error")
        }
    }
}
