use async_trait::async_trait;

use forgewms_warehouse::{ExternalOrderRef, SerialTransfer};

use crate::{ErpError, ExternalLineSnapshot, LineMatch, select_match};

/// Read access to ERP order lines.
#[async_trait]
pub trait ErpOrderSource: Send + Sync {
    /// Every ERP line carrying `key` (normally zero or one).
    async fn fetch_line_candidates(
        &self,
        key: &ExternalOrderRef,
    ) -> Result<Vec<ExternalLineSnapshot>, ErpError>;

    /// The matching line plus how many candidates shared its key.
    async fn fetch_line_match(&self, key: &ExternalOrderRef) -> Result<LineMatch, ErpError> {
        let candidates = self.fetch_line_candidates(key).await?;
        select_match(key, candidates)
    }

    /// The single line for `(order id, line number)`, or `NotFound`.
    async fn fetch_line(&self, key: &ExternalOrderRef) -> Result<ExternalLineSnapshot, ErpError> {
        Ok(self.fetch_line_match(key).await?.snapshot)
    }
}

/// Write access used once a transfer passes QC.
#[async_trait]
pub trait ErpTransferPoster: Send + Sync {
    /// Post the transfer as an ERP stock transfer; returns the ERP document number.
    async fn post_stock_transfer(&self, transfer: &SerialTransfer) -> Result<String, ErpError>;
}
