//! Postgres-backed document and transfer stores.
//!
//! Expected tables (owned by the deployment, not created here):
//!
//! | Table | Key | Notes |
//! |-------|-----|-------|
//! | `documents` | `(tenant_id, id)` | `kind`, `number`, `created_at` |
//! | `document_lines` | `(tenant_id, id)` | quantities as `NUMERIC`, `version BIGINT` |
//! | `serial_transfers` | `(tenant_id, id)` | `version BIGINT`, `status TEXT`, `payload JSONB` |
//!
//! Every query filters on `tenant_id`. Line and transfer writes are a single
//! conditional `UPDATE ... WHERE version = $expected`, so the version check and
//! the write are atomic without holding a row lock across round trips.
//!
//! ## Error Mapping
//!
//! | SQLx Error | Code | StoreError |
//! |------------|------|------------|
//! | Database (unique violation) | `23505` | `Duplicate` |
//! | Database (other) | any | `Backend` |
//! | anything else | n/a | `Backend` |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use forgewms_core::{
    DocumentId, ExpectedVersion, LineId, Quantity, TenantId, TransferId, Versioned,
};
use forgewms_warehouse::{
    Document, DocumentKind, DocumentLine, ExternalOrderKind, ExternalOrderRef, LineRecord,
    SerialTransfer, TransferStatus,
};

use super::{DocumentStore, StoreError, TransferStore};

#[derive(Debug, Clone)]
pub struct PostgresDocumentStore {
    pool: Arc<PgPool>,
}

impl PostgresDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

fn expected_param(expected: ExpectedVersion) -> Option<i64> {
    match expected {
        ExpectedVersion::Any => None,
        ExpectedVersion::Exact(v) => Some(v as i64),
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    #[instrument(
        skip(self, document),
        fields(tenant_id = %tenant_id, document_id = %document.id_typed(), lines = document.lines().len()),
        err
    )]
    async fn insert_document(&self, tenant_id: TenantId, document: &Document) -> Result<(), StoreError> {
        if document.tenant_id() != tenant_id {
            return Err(StoreError::NotFound(format!("document {}", document.id_typed())));
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query(
            r#"
            INSERT INTO documents (id, tenant_id, kind, number, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(document.id_typed().as_uuid())
        .bind(tenant_id.as_uuid())
        .bind(document.kind().as_str())
        .bind(document.number())
        .bind(document.created_at())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_document", e))?;

        for line in document.lines() {
            let record = line.to_record();
            let external = record.external_ref.as_ref();
            sqlx::query(
                r#"
                INSERT INTO document_lines (
                    id, tenant_id, document_id, line_no, item_code, description,
                    bin_location, ordered_quantity, fulfilled_quantity,
                    external_kind, external_order_id, external_line_number, version
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                "#,
            )
            .bind(record.id.as_uuid())
            .bind(tenant_id.as_uuid())
            .bind(record.document_id.as_uuid())
            .bind(record.line_no as i32)
            .bind(&record.item_code)
            .bind(&record.description)
            .bind(&record.bin_location)
            .bind(record.ordered_quantity)
            .bind(record.fulfilled_quantity)
            .bind(external.map(|r| r.kind.as_str()))
            .bind(external.map(|r| r.order_id as i64))
            .bind(external.map(|r| r.line_number as i32))
            .bind(record.version as i64)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_line", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, document_id = %id), err)]
    async fn load_document(&self, tenant_id: TenantId, id: DocumentId) -> Result<Document, StoreError> {
        let header = sqlx::query(
            r#"
            SELECT kind, number, created_at
            FROM documents
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_document", e))?
        .ok_or_else(|| StoreError::NotFound(format!("document {id}")))?;

        let kind: String = header.try_get("kind").map_err(decode_error)?;
        let number: String = header.try_get("number").map_err(decode_error)?;
        let created_at: DateTime<Utc> = header.try_get("created_at").map_err(decode_error)?;

        let rows = sqlx::query(
            r#"
            SELECT * FROM document_lines
            WHERE tenant_id = $1 AND document_id = $2
            ORDER BY line_no ASC
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_document_lines", e))?;

        let lines = rows
            .iter()
            .map(line_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        let kind = DocumentKind::parse(&kind).map_err(|e| StoreError::Backend(e.to_string()))?;
        Document::from_parts(id, tenant_id, kind, number, lines, created_at)
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, line_id = %line_id), err)]
    async fn load_line(&self, tenant_id: TenantId, line_id: LineId) -> Result<DocumentLine, StoreError> {
        let row = sqlx::query("SELECT * FROM document_lines WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id.as_uuid())
            .bind(line_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("load_line", e))?
            .ok_or_else(|| StoreError::NotFound(format!("line {line_id}")))?;
        line_from_row(&row)
    }

    #[instrument(
        skip(self, line),
        fields(tenant_id = %tenant_id, line_id = %line.id_typed(), expected = ?expected),
        err
    )]
    async fn save_line(
        &self,
        tenant_id: TenantId,
        line: &DocumentLine,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError> {
        let record = line.to_record();
        let result = sqlx::query(
            r#"
            UPDATE document_lines
            SET description = $1,
                bin_location = $2,
                ordered_quantity = $3,
                fulfilled_quantity = $4,
                version = $5
            WHERE tenant_id = $6
              AND id = $7
              AND document_id = $8
              AND ($9::BIGINT IS NULL OR version = $9)
            "#,
        )
        .bind(&record.description)
        .bind(&record.bin_location)
        .bind(record.ordered_quantity)
        .bind(record.fulfilled_quantity)
        .bind(record.version as i64)
        .bind(tenant_id.as_uuid())
        .bind(record.id.as_uuid())
        .bind(record.document_id.as_uuid())
        .bind(expected_param(expected))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("save_line", e))?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        // Nothing updated: either the line is gone or somebody else won.
        let current: Option<i64> =
            sqlx::query_scalar("SELECT version FROM document_lines WHERE tenant_id = $1 AND id = $2")
                .bind(tenant_id.as_uuid())
                .bind(record.id.as_uuid())
                .fetch_optional(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("save_line_version", e))?;

        match current {
            None => Err(StoreError::NotFound(format!("line {}", record.id))),
            Some(actual) => Err(StoreError::Conflict {
                expected,
                actual: actual as u64,
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PostgresTransferStore {
    pool: Arc<PgPool>,
}

impl PostgresTransferStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

fn transfer_payload(transfer: &SerialTransfer) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(transfer).map_err(|e| StoreError::Backend(format!("encode transfer: {e}")))
}

#[async_trait]
impl TransferStore for PostgresTransferStore {
    #[instrument(skip(self, transfer), fields(tenant_id = %transfer.tenant_id(), transfer_id = %transfer.id_typed()), err)]
    async fn insert_transfer(&self, transfer: &SerialTransfer) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO serial_transfers (id, tenant_id, number, status, version, payload)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(transfer.id_typed().as_uuid())
        .bind(transfer.tenant_id().as_uuid())
        .bind(transfer.number())
        .bind(transfer.status().as_str())
        .bind(transfer.version() as i64)
        .bind(transfer_payload(transfer)?)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_transfer", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, transfer_id = %id), err)]
    async fn load_transfer(&self, tenant_id: TenantId, id: TransferId) -> Result<SerialTransfer, StoreError> {
        let payload: serde_json::Value = sqlx::query_scalar(
            "SELECT payload FROM serial_transfers WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_transfer", e))?
        .ok_or_else(|| StoreError::NotFound(format!("transfer {id}")))?;

        serde_json::from_value(payload).map_err(|e| StoreError::Backend(format!("decode transfer: {e}")))
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, status = status.as_str()), err)]
    async fn list_by_status(
        &self,
        tenant_id: TenantId,
        status: TransferStatus,
    ) -> Result<Vec<SerialTransfer>, StoreError> {
        let payloads: Vec<serde_json::Value> = sqlx::query_scalar(
            "SELECT payload FROM serial_transfers WHERE tenant_id = $1 AND status = $2",
        )
        .bind(tenant_id.as_uuid())
        .bind(status.as_str())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_transfers", e))?;

        payloads
            .into_iter()
            .map(|p| {
                serde_json::from_value(p).map_err(|e| StoreError::Backend(format!("decode transfer: {e}")))
            })
            .collect()
    }

    #[instrument(
        skip(self, transfer),
        fields(tenant_id = %transfer.tenant_id(), transfer_id = %transfer.id_typed(), expected = ?expected),
        err
    )]
    async fn save_transfer(
        &self,
        transfer: &SerialTransfer,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE serial_transfers
            SET status = $1, version = $2, payload = $3
            WHERE tenant_id = $4 AND id = $5
              AND ($6::BIGINT IS NULL OR version = $6)
            "#,
        )
        .bind(transfer.status().as_str())
        .bind(transfer.version() as i64)
        .bind(transfer_payload(transfer)?)
        .bind(transfer.tenant_id().as_uuid())
        .bind(transfer.id_typed().as_uuid())
        .bind(expected_param(expected))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("save_transfer", e))?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        let current: Option<i64> =
            sqlx::query_scalar("SELECT version FROM serial_transfers WHERE tenant_id = $1 AND id = $2")
                .bind(transfer.tenant_id().as_uuid())
                .bind(transfer.id_typed().as_uuid())
                .fetch_optional(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("save_transfer_version", e))?;

        match current {
            None => Err(StoreError::NotFound(format!("transfer {}", transfer.id_typed()))),
            Some(actual) => Err(StoreError::Conflict {
                expected,
                actual: actual as u64,
            }),
        }
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, transfer_id = %id), err)]
    async fn delete_transfer(&self, tenant_id: TenantId, id: TransferId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM serial_transfers WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id.as_uuid())
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_transfer", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("transfer {id}")));
        }
        Ok(())
    }
}

fn decode_error(err: sqlx::Error) -> StoreError {
    StoreError::Backend(format!("failed to decode row: {err}"))
}

/// The three external columns are all set or all NULL; anything else is
/// treated as an unlinked line.
fn external_ref_from_columns(
    kind: Option<String>,
    order_id: Option<i64>,
    line_number: Option<i32>,
) -> Result<Option<ExternalOrderRef>, StoreError> {
    match (kind, order_id, line_number) {
        (Some(kind), Some(order_id), Some(line_number)) => {
            let kind = ExternalOrderKind::parse(&kind).map_err(|e| StoreError::Backend(e.to_string()))?;
            let order_id = u64::try_from(order_id)
                .map_err(|_| StoreError::Backend(format!("negative external order id {order_id}")))?;
            let line_number = u32::try_from(line_number)
                .map_err(|_| StoreError::Backend(format!("negative external line number {line_number}")))?;
            Ok(Some(ExternalOrderRef::new(kind, order_id, line_number)))
        }
        _ => Ok(None),
    }
}

fn line_from_row(row: &sqlx::postgres::PgRow) -> Result<DocumentLine, StoreError> {
    let external_ref = external_ref_from_columns(
        row.try_get("external_kind").map_err(decode_error)?,
        row.try_get("external_order_id").map_err(decode_error)?,
        row.try_get("external_line_number").map_err(decode_error)?,
    )?;

    let id: Uuid = row.try_get("id").map_err(decode_error)?;
    let document_id: Uuid = row.try_get("document_id").map_err(decode_error)?;
    let line_no: i32 = row.try_get("line_no").map_err(decode_error)?;
    let ordered_quantity: Quantity = row.try_get("ordered_quantity").map_err(decode_error)?;
    let fulfilled_quantity: Quantity = row.try_get("fulfilled_quantity").map_err(decode_error)?;
    let version: i64 = row.try_get("version").map_err(decode_error)?;

    DocumentLine::rehydrate(LineRecord {
        id: LineId::from_uuid(id),
        document_id: DocumentId::from_uuid(document_id),
        line_no: line_no as u32,
        item_code: row.try_get("item_code").map_err(decode_error)?,
        description: row.try_get("description").map_err(decode_error)?,
        bin_location: row.try_get("bin_location").map_err(decode_error)?,
        ordered_quantity,
        fulfilled_quantity,
        external_ref,
        version: version as u64,
    })
    .map_err(|e| StoreError::Backend(e.to_string()))
}

/// Map SQLx errors to `StoreError`.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code() {
                Some(code) if code.as_ref() == "23505" => StoreError::Duplicate(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => StoreError::Backend(format!("connection pool closed during {operation}")),
        other => StoreError::Backend(format!("sqlx error in {operation}: {other}")),
    }
}
