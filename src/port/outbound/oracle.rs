//! Off-chain price oracle port.

use async_trait::async_trait;

use crate::error::Result;

/// Client for signed off-chain price updates.
///
/// Retries and timeouts are the implementation's concern; callers see a single
/// error once the client gives up.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// Latest price update payload for `feed_id`, ready to submit on chain.
    async fn price_update_payload(&self, feed_id: &str) -> Result<Vec<Vec<u8>>>;
}
