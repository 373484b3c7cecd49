//! External order enrichment.
//!
//! Decorates local lines with ERP descriptive data. Best-effort: an ERP
//! failure degrades the line to `Unavailable`, it never fails the read, and
//! nothing here writes to the store.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinSet;

use forgewms_core::{Quantity, TenantId};
use forgewms_erp::{ErpError, ErpOrderSource, LineMatch};
use forgewms_warehouse::{DocumentLine, ExternalOrderRef, LineStatus, can_add_remaining};

use crate::cache::SnapshotCache;

pub const DETAILS_UNAVAILABLE: &str = "details unavailable";

/// What the ERP contributed to a line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Enrichment {
    /// The line has no external order reference.
    NotLinked,
    Enriched {
        item_code: String,
        description: Option<String>,
        customer_code: Option<String>,
        customer_name: Option<String>,
        /// ERP quantity; shown next to, never instead of, the local quantities.
        external_quantity: Quantity,
        external_open_quantity: Option<Quantity>,
        fetched_at: DateTime<Utc>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        diagnostics: Vec<String>,
    },
    Unavailable {
        reason: String,
    },
}

impl Enrichment {
    fn from_match(m: LineMatch) -> Self {
        let mut diagnostics = Vec::new();
        if m.is_ambiguous() {
            diagnostics.push(format!(
                "{} ERP lines match {}; showing the first",
                m.candidates, m.snapshot.key
            ));
        }
        let s = m.snapshot;
        Enrichment::Enriched {
            item_code: s.item_code,
            description: s.description,
            customer_code: s.customer_code,
            customer_name: s.customer_name,
            external_quantity: s.quantity,
            external_open_quantity: s.open_quantity,
            fetched_at: s.fetched_at,
            diagnostics,
        }
    }

    fn unavailable(err: &ErpError) -> Self {
        let reason = match err {
            ErpError::NotFound(_) => format!("{DETAILS_UNAVAILABLE}: no matching ERP line"),
            ErpError::Timeout => format!("{DETAILS_UNAVAILABLE}: ERP timed out"),
            _ => DETAILS_UNAVAILABLE.to_string(),
        };
        Enrichment::Unavailable { reason }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Enrichment::Unavailable { .. })
    }
}

/// A local line plus whatever the ERP said about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedLine {
    pub line: DocumentLine,
    pub enrichment: Enrichment,
}

impl EnrichedLine {
    /// Always derived from the local quantities.
    pub fn status(&self) -> LineStatus {
        self.line.status()
    }

    pub fn can_add_remaining(&self) -> bool {
        can_add_remaining(&self.line)
    }

    /// ERP item code when enriched, otherwise the local one.
    pub fn item_code(&self) -> &str {
        match &self.enrichment {
            Enrichment::Enriched { item_code, .. } => item_code,
            _ => self.line.item_code(),
        }
    }

    /// ERP description when it has one, otherwise the local one.
    pub fn description(&self) -> Option<&str> {
        match &self.enrichment {
            Enrichment::Enriched {
                description: Some(d),
                ..
            } => Some(d),
            _ => self.line.description(),
        }
    }
}

#[derive(Clone)]
pub struct Enricher {
    source: Arc<dyn ErpOrderSource>,
    cache: Arc<SnapshotCache>,
    timeout: Duration,
}

impl core::fmt::Debug for Enricher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Enricher")
            .field("timeout", &self.timeout)
            .field("cache_ttl", &self.cache.ttl())
            .finish_non_exhaustive()
    }
}

impl Enricher {
    pub fn new(source: Arc<dyn ErpOrderSource>, cache: Arc<SnapshotCache>, timeout: Duration) -> Self {
        Self {
            source,
            cache,
            timeout,
        }
    }

    pub async fn enrich(&self, tenant_id: TenantId, line: DocumentLine) -> EnrichedLine {
        let enrichment = match line.external_ref() {
            None => Enrichment::NotLinked,
            Some(key) => {
                lookup(
                    self.source.clone(),
                    self.cache.clone(),
                    self.timeout,
                    tenant_id,
                    key.clone(),
                )
                .await
            }
        };
        EnrichedLine { line, enrichment }
    }

    /// Enrich every line concurrently; output order matches input order.
    #[tracing::instrument(skip(self, lines), fields(tenant_id = %tenant_id, lines = lines.len()))]
    pub async fn enrich_all(&self, tenant_id: TenantId, lines: Vec<DocumentLine>) -> Vec<EnrichedLine> {
        let mut slots: Vec<Option<Enrichment>> = vec![None; lines.len()];
        let mut tasks = JoinSet::new();

        for (idx, line) in lines.iter().enumerate() {
            match line.external_ref() {
                None => slots[idx] = Some(Enrichment::NotLinked),
                Some(key) => {
                    let source = self.source.clone();
                    let cache = self.cache.clone();
                    let key = key.clone();
                    let timeout = self.timeout;
                    tasks.spawn(async move {
                        (idx, lookup(source, cache, timeout, tenant_id, key).await)
                    });
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, enrichment)) => slots[idx] = Some(enrichment),
                Err(err) => tracing::error!(error = %err, "enrichment task failed"),
            }
        }

        lines
            .into_iter()
            .zip(slots)
            .map(|(line, slot)| EnrichedLine {
                line,
                enrichment: slot.unwrap_or_else(|| Enrichment::Unavailable {
                    reason: DETAILS_UNAVAILABLE.to_string(),
                }),
            })
            .collect()
    }
}

async fn lookup(
    source: Arc<dyn ErpOrderSource>,
    cache: Arc<SnapshotCache>,
    timeout: Duration,
    tenant_id: TenantId,
    key: ExternalOrderRef,
) -> Enrichment {
    if let Some(hit) = cache.get(tenant_id, &key) {
        return Enrichment::from_match(hit);
    }

    let result = match tokio::time::timeout(timeout, source.fetch_line_match(&key)).await {
        Ok(result) => result,
        Err(_) => Err(ErpError::Timeout),
    };

    match result {
        Ok(found) => {
            cache.put(tenant_id, key, found.clone());
            Enrichment::from_match(found)
        }
        Err(err) => {
            tracing::warn!(external_ref = %key, error = %err, "ERP enrichment unavailable");
            Enrichment::unavailable(&err)
        }
    }
}
