//! # Remote API Client
//!
//! The seam between the sync workers and the remote system of record.
//!
//! [`ApiClient`] is the trait the workers program against; [`HttpApiClient`]
//! is the production implementation. Tests substitute scripted fakes, so
//! every failure mode in §sync can be exercised without a server.
//!
//! ## Endpoints
//! ```text
//! POST {base}/api/v1/pos/sale/process        sale submission
//!      header Idempotency-Key: <queue item id>
//!
//! GET  {base}/api/v1/pos/pricing             full pricing snapshot
//! GET  {base}/api/v1/pos/pricing/sync        pricing delta
//!      ?lastSync=<cursor>
//! ```
//!
//! The server MUST treat repeated submissions with the same idempotency key
//! as a no-op after the first success; that contract is what makes
//! "timeout → mark failed → retry later" safe.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use atlas_core::{CustomerAllocations, PriceItem, PriceList, PricingUpdate, SalePayload};

use crate::config::RemoteConfig;
use crate::error::{SyncError, SyncResult};

// =============================================================================
// Client Trait
// =============================================================================

/// Remote calls the sync workers depend on.
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Submits one sale. `idempotency_key` is the queue item id; repeated
    /// calls with the same key must be server-side no-ops after the first
    /// success.
    async fn submit_sale(&self, idempotency_key: &str, payload: &SalePayload) -> SyncResult<()>;

    /// Fetches the complete pricing data set plus a fresh cursor.
    async fn fetch_pricing_full(&self) -> SyncResult<PricingUpdate>;

    /// Fetches pricing changes since `cursor`, including tombstones.
    async fn fetch_pricing_delta(&self, cursor: &str) -> SyncResult<PricingUpdate>;
}

// =============================================================================
// Wire Shapes
// =============================================================================
// The remote speaks camelCase JSON; these mirror it and convert into the
// core types at the boundary.

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PricingResponseWire {
    metadata: PricingMetadataWire,
    data: PricingDataWire,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PricingMetadataWire {
    synced_at: String,
    is_delta: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PricingDataWire {
    lists: Vec<PriceListWire>,
    items: Vec<PriceItemWire>,
    #[serde(default)]
    customer_allocations: CustomerAllocations,
    #[serde(default)]
    deleted_item_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceListWire {
    id: String,
    name: String,
    #[serde(default)]
    priority: i64,
    scope: atlas_core::ListScope,
    valid_from: Option<chrono::DateTime<chrono::Utc>>,
    valid_until: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default = "default_true")]
    is_active: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceItemWire {
    id: String,
    list_id: String,
    sku: String,
    unit_price_cents: i64,
}

fn default_true() -> bool {
    true
}

impl From<PricingResponseWire> for PricingUpdate {
    fn from(wire: PricingResponseWire) -> Self {
        PricingUpdate {
            cursor: wire.metadata.synced_at,
            is_delta: wire.metadata.is_delta,
            lists: wire
                .data
                .lists
                .into_iter()
                .map(|l| PriceList {
                    id: l.id,
                    name: l.name,
                    priority: l.priority,
                    scope: l.scope,
                    valid_from: l.valid_from,
                    valid_until: l.valid_until,
                    is_active: l.is_active,
                })
                .collect(),
            items: wire
                .data
                .items
                .into_iter()
                .map(|i| PriceItem {
                    id: i.id,
                    list_id: i.list_id,
                    sku: i.sku,
                    unit_price_cents: i.unit_price_cents,
                })
                .collect(),
            customer_allocations: wire.data.customer_allocations,
            deleted_item_ids: wire.data.deleted_item_ids,
        }
    }
}

/// Error body shape the remote uses for rejections.
#[derive(Debug, Deserialize)]
struct ErrorBodyWire {
    error: Option<String>,
    message: Option<String>,
}

// =============================================================================
// HTTP Client
// =============================================================================

/// Production [`ApiClient`] over HTTP.
pub struct HttpApiClient {
    http: reqwest::Client,
    base_url: String,
    request_timeout_secs: u64,
}

impl HttpApiClient {
    /// Builds a client from remote settings. Every request carries the
    /// configured connect and whole-request timeouts.
    pub fn new(config: &RemoteConfig) -> SyncResult<Self> {
        if config.base_url.is_empty() {
            return Err(SyncError::InvalidConfig(
                "remote.base_url is required for sync".into(),
            ));
        }

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(HttpApiClient {
            http,
            base_url: normalize_base_url(&config.base_url),
            request_timeout_secs: config.request_timeout_secs,
        })
    }

    /// Classifies a non-success status.
    ///
    /// 4xx means the server understood and refused: terminal. 408/429 are
    /// the transport-ish exceptions. Everything 5xx is the server's
    /// problem and worth retrying.
    async fn classify_failure(&self, response: reqwest::Response) -> SyncError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.is_client_error()
            && status != StatusCode::REQUEST_TIMEOUT
            && status != StatusCode::TOO_MANY_REQUESTS
        {
            let message = serde_json::from_str::<ErrorBodyWire>(&body)
                .ok()
                .and_then(|b| b.error.or(b.message))
                .unwrap_or_else(|| {
                    if body.is_empty() {
                        status.to_string()
                    } else {
                        body.clone()
                    }
                });

            return SyncError::Rejected {
                status: status.as_u16(),
                message,
            };
        }

        SyncError::Network(format!("HTTP {status}"))
    }

    /// Maps reqwest transport errors, preserving the configured bound in
    /// timeout reports.
    fn transport_error(&self, err: reqwest::Error) -> SyncError {
        if err.is_timeout() {
            SyncError::Timeout(self.request_timeout_secs)
        } else {
            SyncError::from(err)
        }
    }
}

#[async_trait]
impl ApiClient for HttpApiClient {
    async fn submit_sale(&self, idempotency_key: &str, payload: &SalePayload) -> SyncResult<()> {
        let url = format!("{}/api/v1/pos/sale/process", self.base_url);

        debug!(key = %idempotency_key, "Submitting sale");

        let response = self
            .http
            .post(&url)
            .header("Idempotency-Key", idempotency_key)
            .json(payload)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if response.status().is_success() {
            return Ok(());
        }

        Err(self.classify_failure(response).await)
    }

    async fn fetch_pricing_full(&self) -> SyncResult<PricingUpdate> {
        let url = format!("{}/api/v1/pos/pricing", self.base_url);

        debug!("Fetching full pricing snapshot");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            return Err(self.classify_failure(response).await);
        }

        let wire: PricingResponseWire = response.json().await.map_err(|e| self.transport_error(e))?;
        Ok(wire.into())
    }

    async fn fetch_pricing_delta(&self, cursor: &str) -> SyncResult<PricingUpdate> {
        let url = format!("{}/api/v1/pos/pricing/sync", self.base_url);

        debug!(cursor = %cursor, "Fetching pricing delta");

        let response = self
            .http
            .get(&url)
            .query(&[("lastSync", cursor)])
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            return Err(self.classify_failure(response).await);
        }

        let wire: PricingResponseWire = response.json().await.map_err(|e| self.transport_error(e))?;
        Ok(wire.into())
    }
}

/// Strips trailing slashes so endpoint paths join cleanly.
fn normalize_base_url(url: &str) -> String {
    let mut url = url.trim().to_string();
    while url.ends_with('/') {
        url.pop();
    }
    url
}

// =============================================================================
// Tests
// =============================================================================
