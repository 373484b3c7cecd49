//! SAP Business One Service Layer client.
//!
//! Session-cookie authentication (`POST /b1s/v1/Login`), one attempt per call,
//! bounded by the client timeout. An expired session is reported as
//! `Unauthorized` and the next call logs in again.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use tokio::sync::Mutex;

use forgewms_core::Quantity;
use forgewms_warehouse::{ExternalOrderKind, ExternalOrderRef, SerialTransfer};

use crate::{
    ErpError, ErpOrderSource, ErpTransferPoster, ErpWarehouses, ExternalLineSnapshot, ItemCatalog,
    ItemDetails, Warehouse,
};

const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Connection settings for the Service Layer.
#[derive(Clone)]
pub struct ServiceLayerConfig {
    pub base_url: String,
    pub company_db: String,
    pub username: String,
    pub password: String,
    pub timeout: Duration,
}

impl core::fmt::Debug for ServiceLayerConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ServiceLayerConfig")
            .field("base_url", &self.base_url)
            .field("company_db", &self.company_db)
            .field("username", &self.username)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ServiceLayerConfig {
    pub fn new(
        base_url: impl Into<String>,
        company_db: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            company_db: company_db.into(),
            username: username.into(),
            password: password.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug)]
pub struct ServiceLayerClient {
    http: Client,
    config: ServiceLayerConfig,
    logged_in: Mutex<bool>,
}

impl ServiceLayerClient {
    pub fn new(config: ServiceLayerConfig) -> Result<Self, ErpError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .cookie_store(true)
            .pool_max_idle_per_host(10)
            .build()?;
        Ok(Self {
            http,
            config,
            logged_in: Mutex::new(false),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/b1s/v1/{}", self.config.base_url, path)
    }

    async fn ensure_logged_in(&self) -> Result<(), ErpError> {
        let mut logged_in = self.logged_in.lock().await;
        if *logged_in {
            return Ok(());
        }

        let resp = self
            .http
            .post(self.url("Login"))
            .json(&json!({
                "CompanyDB": self.config.company_db,
                "UserName": self.config.username,
                "Password": self.config.password,
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            tracing::error!(%status, "service layer login failed");
            return Err(ErpError::Unauthorized(error_message(&body, status)));
        }

        tracing::info!(company_db = %self.config.company_db, "logged in to service layer");
        *logged_in = true;
        Ok(())
    }

    async fn get_json(&self, path: &str) -> Result<JsonValue, ErpError> {
        self.ensure_logged_in().await?;
        let resp = self.http.get(self.url(path)).send().await?;
        self.read_json(resp, path).await
    }

    async fn read_json(&self, resp: reqwest::Response, what: &str) -> Result<JsonValue, ErpError> {
        let status = resp.status();
        if status.is_success() {
            return resp.json::<JsonValue>().await.map_err(ErpError::from);
        }

        let body = resp.text().await.unwrap_or_default();
        match status {
            StatusCode::NOT_FOUND => Err(ErpError::NotFound(what.to_string())),
            StatusCode::UNAUTHORIZED => {
                *self.logged_in.lock().await = false;
                Err(ErpError::Unauthorized("session expired".to_string()))
            }
            _ => Err(ErpError::Rejected {
                status: status.as_u16(),
                message: error_message(&body, status),
            }),
        }
    }
}

fn entity_set(kind: ExternalOrderKind) -> &'static str {
    match kind {
        ExternalOrderKind::SalesOrder => "Orders",
        ExternalOrderKind::PurchaseOrder => "PurchaseOrders",
        ExternalOrderKind::TransferRequest => "InventoryTransferRequests",
    }
}

/// Service Layer error bodies look like `{"error": {"message": {"value": "..."}}}`.
fn error_message(body: &str, status: StatusCode) -> String {
    serde_json::from_str::<JsonValue>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message/value")
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| format!("HTTP {status}"))
}

#[derive(Debug, Deserialize)]
struct OrderHeader {
    #[serde(rename = "CardCode")]
    card_code: Option<String>,
    #[serde(rename = "CardName")]
    card_name: Option<String>,
    #[serde(rename = "DocumentLines", alias = "StockTransferLines", default)]
    lines: Vec<OrderLine>,
}

#[derive(Debug, Deserialize)]
struct OrderLine {
    #[serde(rename = "LineNum")]
    line_num: u32,
    #[serde(rename = "ItemCode")]
    item_code: String,
    #[serde(rename = "ItemDescription")]
    item_description: Option<String>,
    #[serde(rename = "Quantity")]
    quantity: f64,
    #[serde(rename = "RemainingOpenQuantity")]
    remaining_open_quantity: Option<f64>,
}

fn decimal(value: f64) -> Result<Quantity, ErpError> {
    Quantity::try_from(value).map_err(|e| ErpError::Decode(format!("quantity {value}: {e}")))
}

/// Turn an order document into the snapshots of the lines carrying `key`.
pub(crate) fn parse_order_lines(
    key: &ExternalOrderRef,
    body: JsonValue,
    fetched_at: DateTime<Utc>,
) -> Result<Vec<ExternalLineSnapshot>, ErpError> {
    let header: OrderHeader =
        serde_json::from_value(body).map_err(|e| ErpError::Decode(e.to_string()))?;

    header
        .lines
        .into_iter()
        .filter(|l| l.line_num == key.line_number)
        .map(|l| {
            Ok(ExternalLineSnapshot {
                key: key.clone(),
                item_code: l.item_code,
                description: l.item_description,
                customer_code: header.card_code.clone(),
                customer_name: header.card_name.clone(),
                quantity: decimal(l.quantity)?,
                open_quantity: l.remaining_open_quantity.map(decimal).transpose()?,
                fetched_at,
            })
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct WarehouseRow {
    #[serde(rename = "WarehouseCode")]
    code: String,
    #[serde(rename = "WarehouseName")]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WarehousePage {
    #[serde(default)]
    value: Vec<WarehouseRow>,
}

/// OData collection body (`{"value": [...]}`) to warehouses; a missing name
/// shows the code.
pub(crate) fn parse_warehouses(body: JsonValue) -> Result<Vec<Warehouse>, ErpError> {
    let page: WarehousePage =
        serde_json::from_value(body).map_err(|e| ErpError::Decode(e.to_string()))?;
    Ok(page
        .value
        .into_iter()
        .map(|row| {
            let name = row.name.filter(|n| !n.is_empty()).unwrap_or_else(|| row.code.clone());
            Warehouse { code: row.code, name }
        })
        .collect())
}

/// Build the `StockTransfers` payload for an approved serial transfer.
pub(crate) fn stock_transfer_payload(transfer: &SerialTransfer) -> JsonValue {
    let lines: Vec<JsonValue> = transfer
        .items()
        .iter()
        .map(|item| {
            let serials: Vec<JsonValue> = item
                .serials
                .iter()
                .map(|s| json!({ "InternalSerialNumber": s, "Quantity": 1 }))
                .collect();
            json!({
                "ItemCode": item.item_code,
                "Quantity": item.quantity,
                "FromWarehouseCode": transfer.from_warehouse(),
                "WarehouseCode": transfer.to_warehouse(),
                "SerialNumbers": serials,
            })
        })
        .collect();

    json!({
        "FromWarehouse": transfer.from_warehouse(),
        "ToWarehouse": transfer.to_warehouse(),
        "Comments": format!("Serial transfer {}", transfer.number()),
        "StockTransferLines": lines,
    })
}

#[async_trait]
impl ErpOrderSource for ServiceLayerClient {
    #[tracing::instrument(skip(self), fields(external_ref = %key))]
    async fn fetch_line_candidates(
        &self,
        key: &ExternalOrderRef,
    ) -> Result<Vec<ExternalLineSnapshot>, ErpError> {
        let path = format!("{}({})", entity_set(key.kind), key.order_id);
        let body = self.get_json(&path).await?;
        parse_order_lines(key, body, Utc::now())
    }
}

#[async_trait]
impl ItemCatalog for ServiceLayerClient {
    #[tracing::instrument(skip(self))]
    async fn item_details(&self, item_code: &str) -> Result<ItemDetails, ErpError> {
        // OData string literal: single quotes doubled, then URL-encoded.
        let literal = item_code.replace('\'', "''");
        let path = format!(
            "Items('{}')?$select=ItemCode,ItemName,SalesUnit",
            urlencoding::encode(&literal)
        );
        let body = self.get_json(&path).await?;

        let item_name = body
            .get("ItemName")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Item {item_code}"));
        let unit_of_measure = body
            .get("SalesUnit")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("EA")
            .to_string();

        Ok(ItemDetails {
            item_code: item_code.to_string(),
            item_name,
            unit_of_measure,
            fallback: false,
        })
    }
}

#[async_trait]
impl ErpWarehouses for ServiceLayerClient {
    #[tracing::instrument(skip(self))]
    async fn warehouses(&self) -> Result<Vec<Warehouse>, ErpError> {
        let body = self
            .get_json("Warehouses?$select=WarehouseCode,WarehouseName")
            .await?;
        let warehouses = parse_warehouses(body)?;
        tracing::debug!(count = warehouses.len(), "warehouses read from service layer");
        Ok(warehouses)
    }
}

#[async_trait]
impl ErpTransferPoster for ServiceLayerClient {
    #[tracing::instrument(skip(self, transfer), fields(transfer = %transfer.number()))]
    async fn post_stock_transfer(&self, transfer: &SerialTransfer) -> Result<String, ErpError> {
        self.ensure_logged_in().await?;
        let resp = self
            .http
            .post(self.url("StockTransfers"))
            .json(&stock_transfer_payload(transfer))
            .send()
            .await?;
        let body = self.read_json(resp, "StockTransfers").await?;

        body.get("DocNum")
            .or_else(|| body.get("DocEntry"))
            .and_then(|v| v.as_u64())
            .map(|n| n.to_string())
            .ok_or_else(|| ErpError::Decode("stock transfer response without DocNum".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forgewms_core::{TenantId, UserId};
    use forgewms_warehouse::{NewTransfer, TransferPriority};

    fn order_body() -> JsonValue {
        json!({
            "DocEntry": 77,
            "CardCode": "C20000",
            "CardName": "Norm Thompson",
            "DocumentLines": [
                { "LineNum": 0, "ItemCode": "A00001", "ItemDescription": "Printer", "Quantity": 4.0, "RemainingOpenQuantity": 4.0 },
                { "LineNum": 1, "ItemCode": "A00002", "ItemDescription": "Toner", "Quantity": 2.5, "RemainingOpenQuantity": 1.5 }
            ]
        })
    }

    #[test]
    fn parses_only_the_requested_line() {
        let key = ExternalOrderRef::new(ExternalOrderKind::SalesOrder, 77, 1);
        let lines = parse_order_lines(&key, order_body(), Utc::now()).unwrap();

        assert_eq!(lines.len(), 1);
        let line = &lines[0];
        assert_eq!(line.item_code, "A00002");
        assert_eq!(line.customer_name.as_deref(), Some("Norm Thompson"));
        assert_eq!(line.quantity, Quantity::new(25, 1));
        assert_eq!(line.open_quantity, Some(Quantity::new(15, 1)));
    }

    #[test]
    fn missing_line_yields_no_candidates() {
        let key = ExternalOrderRef::new(ExternalOrderKind::SalesOrder, 77, 9);
        assert!(parse_order_lines(&key, order_body(), Utc::now()).unwrap().is_empty());
    }

    #[test]
    fn malformed_document_is_a_decode_error() {
        let key = ExternalOrderRef::new(ExternalOrderKind::SalesOrder, 77, 0);
        let body = json!({ "DocumentLines": [{ "LineNum": "zero" }] });
        assert!(matches!(parse_order_lines(&key, body, Utc::now()), Err(ErpError::Decode(_))));
    }

    #[test]
    fn warehouse_page_maps_codes_and_names() {
        let body = json!({
            "odata.metadata": "$metadata#Warehouses",
            "value": [
                { "WarehouseCode": "01", "WarehouseName": "General Warehouse" },
                { "WarehouseCode": "02", "WarehouseName": null }
            ]
        });
        let warehouses = parse_warehouses(body).unwrap();
        assert_eq!(
            warehouses,
            vec![Warehouse::new("01", "General Warehouse"), Warehouse::new("02", "02")]
        );
        assert!(matches!(
            parse_warehouses(json!({ "value": [{ "WarehouseName": "no code" }] })),
            Err(ErpError::Decode(_))
        ));
    }

    #[test]
    fn error_message_prefers_service_layer_text() {
        let body = r#"{"error":{"code":-5002,"message":{"lang":"en-us","value":"Quantity falls into negative inventory"}}}"#;
        assert_eq!(
            error_message(body, StatusCode::BAD_REQUEST),
            "Quantity falls into negative inventory"
        );
        assert_eq!(error_message("", StatusCode::BAD_GATEWAY), "HTTP 502 Bad Gateway");
    }

    #[test]
    fn stock_transfer_payload_carries_serials() {
        let mut transfer = SerialTransfer::create(NewTransfer {
            tenant_id: TenantId::new(),
            number: "ST-9".into(),
            owner: UserId::new(),
            from_warehouse: "WH001".into(),
            to_warehouse: "WH002".into(),
            priority: TransferPriority::High,
            notes: None,
            created_at: Utc::now(),
        })
        .unwrap();
        transfer.add_item("PHONE", None, 1, None).unwrap();
        transfer.add_serial("PHONE", "SN-1").unwrap();

        let payload = stock_transfer_payload(&transfer);
        assert_eq!(payload["FromWarehouse"], "WH001");
        assert_eq!(payload["StockTransferLines"][0]["WarehouseCode"], "WH002");
        assert_eq!(
            payload["StockTransferLines"][0]["SerialNumbers"][0]["InternalSerialNumber"],
            "SN-1"
        );
    }

    #[test]
    fn config_trims_trailing_slash_and_hides_password() {
        let cfg = ServiceLayerConfig::new("https://sap:50000/", "SBODEMO", "manager", "s3cret");
        assert_eq!(cfg.base_url, "https://sap:50000");
        assert!(!format!("{cfg:?}").contains("s3cret"));
    }
}
